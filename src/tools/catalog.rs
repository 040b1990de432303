//! The operation catalog: names, descriptions and JSON input schemas.
//!
//! Schemas are derived from each operation's input struct, so the advertised
//! required keys are exactly the fields without a default.

use crate::error::DbError;
use crate::tools::NoArguments;
use crate::tools::data::{BulkInsertInput, DeleteInput, InsertInput, UpdateInput};
use crate::tools::maintenance::{BackupInput, KillConnectionsInput, RestoreInput, VacuumInput};
use crate::tools::query::{ExecuteQueryInput, ExplainInput, ListTablesInput, TableInput};
use crate::tools::schema::{
    AlterTableInput, CreateIndexInput, CreateTableInput, DropIndexInput, DropTableInput,
    TableDdlInput,
};
use crate::tools::user::{CreateUserInput, ListPermissionsInput, PrivilegeInput};
use schemars::JsonSchema;
use serde_json::{Map, Value as JsonValue, json};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

/// A JSON object, as used for tool input schemas.
pub type JsonObject = Map<String, JsonValue>;

/// Generates the `Operation` enum and its name/description/schema tables.
///
/// Each line is `Variant => "wire_name", InputType, "description";`.
macro_rules! define_operations {
    ($($variant:ident => $name:literal, $input:ty, $description:literal;)+) => {
        /// Every operation the gateway can dispatch.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant,)+
        }

        impl Operation {
            /// All operations, in catalog order.
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)+];

            /// Name used on the wire.
            pub fn name(self) -> &'static str {
                match self {
                    $(Operation::$variant => $name,)+
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $(Operation::$variant => $description,)+
                }
            }

            fn build_schema(self) -> JsonObject {
                match self {
                    $(Operation::$variant => schema_object::<$input>(),)+
                }
            }
        }
    };
}

define_operations! {
    // Query
    ExecuteQuery => "execute_query", ExecuteQueryInput,
        "Execute a SQL query and return its rows. Use %s placeholders with params.";
    ExecuteExplain => "execute_explain", ExplainInput,
        "Get the execution plan for a query (EXPLAIN FORMAT JSON, not executed).";
    ListDatabases => "list_databases", NoArguments,
        "List all databases on the PostgreSQL server with size and encoding.";
    ListTables => "list_tables", ListTablesInput,
        "List all tables and views in a schema.";
    ListColumns => "list_columns", TableInput,
        "Get column information for a table.";
    GetTableInfo => "get_table_info", TableInput,
        "Get detailed information about a table: columns, indexes, constraints and size.";
    GetDatabaseSize => "get_database_size", NoArguments,
        "Get the size of the database and of its 50 largest tables.";

    // Schema (DDL)
    CreateTable => "create_table", CreateTableInput,
        "Create a new table from column definitions.";
    DropTable => "drop_table", DropTableInput,
        "Drop a table.";
    AlterTable => "alter_table", AlterTableInput,
        "Alter a table structure with an ALTER TABLE action.";
    CreateIndex => "create_index", CreateIndexInput,
        "Create an index on a table.";
    DropIndex => "drop_index", DropIndexInput,
        "Drop an index.";
    GetTableDdl => "get_table_ddl", TableDdlInput,
        "Generate a CREATE TABLE statement for an existing table.";

    // Data (DML)
    InsertData => "insert_data", InsertInput,
        "Insert a row into a table and return it.";
    BulkInsert => "bulk_insert", BulkInsertInput,
        "Insert multiple rows into a table in one transaction (all or nothing).";
    UpdateData => "update_data", UpdateInput,
        "Update rows in a table and return them.";
    DeleteData => "delete_data", DeleteInput,
        "Delete rows from a table and return them.";

    // Users (DCL)
    ListUsers => "list_users", NoArguments,
        "List all database users/roles.";
    CreateUser => "create_user", CreateUserInput,
        "Create a new database user.";
    GrantPermissions => "grant_permissions", PrivilegeInput,
        "Grant privileges on an object to a user.";
    RevokePermissions => "revoke_permissions", PrivilegeInput,
        "Revoke privileges on an object from a user.";
    ListPermissions => "list_permissions", ListPermissionsInput,
        "List table privileges held by a user.";

    // Maintenance
    VacuumAnalyze => "vacuum_analyze", VacuumInput,
        "Run VACUUM ANALYZE on a table or the entire database.";
    BackupDatabase => "backup_database", BackupInput,
        "Create a database backup with pg_dump.";
    RestoreDatabase => "restore_database", RestoreInput,
        "Restore the database from a backup with pg_restore.";
    KillConnections => "kill_connections", KillConnectionsInput,
        "Terminate all other sessions connected to a database.";
    GetActiveConnections => "get_active_connections", NoArguments,
        "Get information about active database sessions.";
    TestConnection => "test_connection", NoArguments,
        "Test the database connection and report server version and pool state.";
}

impl Operation {
    /// Look up an operation by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == name)
    }

    /// JSON schema of the operation's arguments.
    pub fn input_schema(self) -> Arc<JsonObject> {
        CATALOG[&self].schema.clone()
    }

    /// Argument keys that must be present.
    pub fn required_args(self) -> &'static [String] {
        &CATALOG[&self].required
    }
}

impl FromStr for Operation {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| DbError::unknown_operation(s))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

struct CatalogEntry {
    schema: Arc<JsonObject>,
    required: Vec<String>,
}

static CATALOG: LazyLock<HashMap<Operation, CatalogEntry>> = LazyLock::new(|| {
    Operation::ALL
        .iter()
        .map(|&op| {
            let schema = op.build_schema();
            let required = schema
                .get("required")
                .and_then(JsonValue::as_array)
                .map(|keys| {
                    keys.iter()
                        .filter_map(JsonValue::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let entry = CatalogEntry {
                schema: Arc::new(schema),
                required,
            };
            (op, entry)
        })
        .collect()
});

/// Object schema for `T`, without the `$schema` marker.
fn schema_object<T: JsonSchema>() -> JsonObject {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(JsonValue::Object(mut obj)) => {
            obj.remove("$schema");
            obj.entry("type").or_insert_with(|| json!("object"));
            obj.entry("properties").or_insert_with(|| json!({}));
            obj
        }
        _ => {
            let mut obj = JsonObject::new();
            obj.insert("type".to_string(), json!("object"));
            obj.insert("properties".to_string(), json!({}));
            obj
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn required(op: Operation) -> HashSet<&'static str> {
        op.required_args().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_catalog_is_complete_and_unique() {
        assert_eq!(Operation::ALL.len(), 28);
        let names: HashSet<_> = Operation::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names.len(), Operation::ALL.len());
    }

    #[test]
    fn test_name_round_trip() {
        for &op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
            assert!(!op.description().is_empty());
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "bogus".parse::<Operation>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: bogus");
    }

    #[test]
    fn test_schemas_are_objects() {
        for &op in Operation::ALL {
            let schema = op.input_schema();
            assert_eq!(schema.get("type"), Some(&json!("object")), "{op}");
            assert!(schema.get("properties").is_some(), "{op}");
            assert!(schema.get("$schema").is_none(), "{op}");
        }
    }

    #[test]
    fn test_required_args() {
        assert_eq!(required(Operation::ExecuteQuery), HashSet::from(["query"]));
        assert_eq!(
            required(Operation::UpdateData),
            HashSet::from(["table_name", "data", "where_clause"])
        );
        assert_eq!(
            required(Operation::CreateIndex),
            HashSet::from(["index_name", "table_name", "columns"])
        );
        assert_eq!(
            required(Operation::GrantPermissions),
            HashSet::from(["username", "privileges", "object_type", "object_name"])
        );
        assert_eq!(required(Operation::RestoreDatabase), HashSet::from(["backup_file"]));
        assert!(required(Operation::VacuumAnalyze).is_empty());
        assert!(required(Operation::BackupDatabase).is_empty());
        assert!(required(Operation::ListDatabases).is_empty());
    }

    #[test]
    fn test_defaults_documented_in_schema() {
        let schema = Operation::ListTables.input_schema();
        assert_eq!(schema["properties"]["schema"]["default"], json!("public"));
    }
}
