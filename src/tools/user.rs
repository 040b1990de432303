//! Role and privilege tools (DCL).

use crate::db::StatementRunner;
use crate::db::sql::{qualified, quote_literal, validate_identifier, validate_keywords};
use crate::error::DbResult;
use crate::models::Row;
use crate::tools::{NoArguments, default_schema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

const LIST_USERS_SQL: &str = "\
SELECT rolname::text AS username,
       rolsuper AS is_superuser,
       rolcreaterole AS can_create_role,
       rolcreatedb AS can_create_db,
       rolcanlogin AS can_login,
       rolconnlimit AS connection_limit,
       rolvaliduntil AS password_expiry
FROM pg_roles
WHERE rolname NOT LIKE 'pg\\_%'
ORDER BY rolname";

const LIST_PERMISSIONS_SQL: &str = "\
SELECT n.nspname::text AS schema,
       c.relname::text AS object_name,
       c.relkind::text AS object_type,
       r.rolname::text AS grantee,
       p.privilege_type::text AS privilege_type
FROM information_schema.role_table_grants p
JOIN pg_class c ON p.table_name = c.relname
JOIN pg_namespace n ON c.relnamespace = n.oid AND p.table_schema = n.nspname
JOIN pg_roles r ON p.grantee = r.rolname
WHERE r.rolname = $1
ORDER BY n.nspname, c.relname";

fn default_true() -> bool {
    true
}

/// Input for the create_user tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateUserInput {
    /// Role name
    pub username: String,
    /// Password (optional)
    #[serde(default)]
    pub password: Option<String>,
    /// Allow the role to log in. Default: true
    #[serde(default = "default_true")]
    pub can_login: bool,
    /// Allow the role to create databases
    #[serde(default)]
    pub can_create_db: bool,
    /// Allow the role to create other roles
    #[serde(default)]
    pub can_create_role: bool,
}

/// Input for the grant_permissions and revoke_permissions tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PrivilegeInput {
    /// Role name
    pub username: String,
    /// Privileges, e.g. "SELECT, INSERT" or "ALL"
    pub privileges: String,
    /// Object type: TABLE, DATABASE, SCHEMA, SEQUENCE, ...
    pub object_type: String,
    /// Object name
    pub object_name: String,
    /// Schema of the object, used when object_type is TABLE. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for the list_permissions tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListPermissionsInput {
    /// Role name
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListUsersOutput {
    pub users: Vec<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserMessageOutput {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListPermissionsOutput {
    pub permissions: Vec<Row>,
    pub user: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeAction {
    Grant,
    Revoke,
}

pub fn create_user_sql(input: &CreateUserInput) -> DbResult<String> {
    let username = validate_identifier("username", &input.username)?;

    let mut options = vec![if input.can_login { "LOGIN" } else { "NOLOGIN" }.to_string()];
    if input.can_create_db {
        options.push("CREATEDB".to_string());
    }
    if input.can_create_role {
        options.push("CREATEROLE".to_string());
    }
    if let Some(password) = input.password.as_deref().filter(|p| !p.is_empty()) {
        options.push(format!("PASSWORD {}", quote_literal(password)));
    }
    Ok(format!("CREATE ROLE {username} {}", options.join(" ")))
}

/// Build a GRANT or REVOKE statement. Returns the statement and the object
/// name as it appears in it.
pub fn privilege_sql(input: &PrivilegeInput, action: PrivilegeAction) -> DbResult<(String, String)> {
    let username = validate_identifier("username", &input.username)?;
    let privileges = validate_keywords("privileges", &input.privileges)?;
    let object_type = validate_keywords("object_type", &input.object_type)?;
    let object = if object_type.eq_ignore_ascii_case("TABLE") {
        qualified(&input.schema, &input.object_name, "object_name")?
    } else {
        validate_identifier("object_name", &input.object_name)?.to_string()
    };

    let sql = match action {
        PrivilegeAction::Grant => {
            format!("GRANT {privileges} ON {object_type} {object} TO {username}")
        }
        PrivilegeAction::Revoke => {
            format!("REVOKE {privileges} ON {object_type} {object} FROM {username}")
        }
    };
    Ok((sql, object))
}

/// Handler for role and privilege tools.
#[derive(Debug, Clone)]
pub struct UserToolHandler {
    runner: StatementRunner,
}

impl UserToolHandler {
    pub fn new(runner: StatementRunner) -> Self {
        Self { runner }
    }

    pub async fn list_users(&self, _input: NoArguments) -> DbResult<ListUsersOutput> {
        let users = self.runner.fetch(LIST_USERS_SQL, &[]).await?;
        Ok(ListUsersOutput { users })
    }

    pub async fn create_user(&self, input: CreateUserInput) -> DbResult<UserMessageOutput> {
        let sql = create_user_sql(&input)?;
        self.runner.execute(&sql, &[]).await?;
        info!(username = %input.username, "Role created");
        Ok(UserMessageOutput {
            message: format!("User {} created successfully", input.username),
        })
    }

    pub async fn grant_permissions(&self, input: PrivilegeInput) -> DbResult<UserMessageOutput> {
        let (sql, object) = privilege_sql(&input, PrivilegeAction::Grant)?;
        self.runner.execute(&sql, &[]).await?;
        Ok(UserMessageOutput {
            message: format!(
                "Granted {} on {} {} to {}",
                input.privileges.trim(),
                input.object_type.trim(),
                object,
                input.username
            ),
        })
    }

    pub async fn revoke_permissions(&self, input: PrivilegeInput) -> DbResult<UserMessageOutput> {
        let (sql, object) = privilege_sql(&input, PrivilegeAction::Revoke)?;
        self.runner.execute(&sql, &[]).await?;
        Ok(UserMessageOutput {
            message: format!(
                "Revoked {} on {} {} from {}",
                input.privileges.trim(),
                input.object_type.trim(),
                object,
                input.username
            ),
        })
    }

    pub async fn list_permissions(
        &self,
        input: ListPermissionsInput,
    ) -> DbResult<ListPermissionsOutput> {
        let permissions = self
            .runner
            .fetch(LIST_PERMISSIONS_SQL, &[input.username.as_str().into()])
            .await?;
        Ok(ListPermissionsOutput {
            permissions,
            user: input.username,
        })
    }
}
