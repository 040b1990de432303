//! Schema definition tools (DDL).
//!
//! `create_table`, `drop_table`, `alter_table`, `create_index`, `drop_index`
//! and `get_table_ddl`. Names are checked against the identifier allow-list
//! before they are spliced into the statement; column types, constraints and
//! ALTER actions are free-form SQL fragments.

use crate::db::StatementRunner;
use crate::db::sql::{identifier_list, qualified, validate_identifier};
use crate::error::{DbError, DbResult};
use crate::models::Row;
use crate::tools::default_schema;
use crate::tools::query::LIST_COLUMNS_SQL;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

/// One column of a new table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ColumnSpec {
    /// Column name
    pub name: String,
    /// Column type, e.g. "INTEGER" or "VARCHAR(100)"
    #[serde(rename = "type")]
    pub data_type: String,
    /// Column constraints, e.g. "PRIMARY KEY" or "NOT NULL DEFAULT 0"
    #[serde(default)]
    pub constraints: Option<String>,
}

/// Input for the create_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateTableInput {
    /// Name of the table
    pub table_name: String,
    /// Column definitions
    pub columns: Vec<ColumnSpec>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for the drop_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DropTableInput {
    /// Table name
    pub table_name: String,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Also drop dependent objects
    #[serde(default)]
    pub cascade: bool,
}

/// Input for the alter_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AlterTableInput {
    /// Table name
    pub table_name: String,
    /// ALTER TABLE action, e.g. "ADD COLUMN email VARCHAR(100)"
    pub action: String,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for the create_index tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateIndexInput {
    /// Index name
    pub index_name: String,
    /// Table name
    pub table_name: String,
    /// Indexed column names, in order
    pub columns: Vec<String>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Create a UNIQUE index
    #[serde(default)]
    pub unique: bool,
}

/// Input for the drop_index tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DropIndexInput {
    /// Index name
    pub index_name: String,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Also drop dependent objects
    #[serde(default)]
    pub cascade: bool,
}

/// Input for the get_table_ddl tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableDdlInput {
    /// Table name
    pub table_name: String,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Result of a DDL statement.
#[derive(Debug, Clone, Serialize)]
pub struct DdlOutput {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDdlOutput {
    pub ddl: String,
}

// =============================================================================
// Statement builders
// =============================================================================

pub fn create_table_sql(input: &CreateTableInput) -> DbResult<String> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    if input.columns.is_empty() {
        return Err(DbError::validation("columns must not be empty"));
    }

    let mut defs = Vec::with_capacity(input.columns.len());
    for col in &input.columns {
        let name = validate_identifier("column name", &col.name)?;
        let data_type = col.data_type.trim();
        if data_type.is_empty() {
            return Err(DbError::validation(format!("column '{name}' has no type")));
        }
        match col.constraints.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => defs.push(format!("{name} {data_type} {c}")),
            _ => defs.push(format!("{name} {data_type}")),
        }
    }
    Ok(format!("CREATE TABLE {table} ({})", defs.join(", ")))
}

pub fn drop_table_sql(input: &DropTableInput) -> DbResult<String> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    Ok(with_cascade(format!("DROP TABLE {table}"), input.cascade))
}

pub fn alter_table_sql(input: &AlterTableInput) -> DbResult<String> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    let action = input.action.trim();
    if action.is_empty() {
        return Err(DbError::validation("action must not be empty"));
    }
    Ok(format!("ALTER TABLE {table} {action}"))
}

pub fn create_index_sql(input: &CreateIndexInput) -> DbResult<String> {
    let index = validate_identifier("index_name", &input.index_name)?;
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    let columns = identifier_list("columns", &input.columns)?;
    let unique = if input.unique { "UNIQUE " } else { "" };
    Ok(format!("CREATE {unique}INDEX {index} ON {table} ({columns})"))
}

pub fn drop_index_sql(input: &DropIndexInput) -> DbResult<String> {
    let index = qualified(&input.schema, &input.index_name, "index_name")?;
    Ok(with_cascade(format!("DROP INDEX {index}"), input.cascade))
}

fn with_cascade(sql: String, cascade: bool) -> String {
    if cascade { format!("{sql} CASCADE") } else { sql }
}

/// Rebuild a `CREATE TABLE` statement from `information_schema.columns` rows.
pub fn render_table_ddl(full_name: &str, columns: &[Row]) -> String {
    let text = |row: &Row, key: &str| -> Option<String> {
        match row.get(key) {
            Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    };

    let defs: Vec<String> = columns
        .iter()
        .map(|col| {
            let mut def = format!(
                "{} {}",
                text(col, "column_name").unwrap_or_default(),
                text(col, "data_type").unwrap_or_default()
            );
            if let Some(len) = text(col, "character_maximum_length") {
                def.push_str(&format!("({len})"));
            }
            if text(col, "is_nullable").as_deref() == Some("NO") {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = text(col, "column_default") {
                def.push_str(&format!(" DEFAULT {default}"));
            }
            def
        })
        .collect();

    format!("CREATE TABLE {full_name} (\n  {}\n);", defs.join(",\n  "))
}

// =============================================================================
// Handler
// =============================================================================

/// Handler for DDL tools.
#[derive(Debug, Clone)]
pub struct SchemaToolHandler {
    runner: StatementRunner,
}

impl SchemaToolHandler {
    pub fn new(runner: StatementRunner) -> Self {
        Self { runner }
    }

    pub async fn create_table(&self, input: CreateTableInput) -> DbResult<DdlOutput> {
        let sql = create_table_sql(&input)?;
        self.runner.execute(&sql, &[]).await?;
        info!(schema = %input.schema, table = %input.table_name, "Table created");
        Ok(DdlOutput {
            message: format!("Table {}.{} created successfully", input.schema, input.table_name),
        })
    }

    pub async fn drop_table(&self, input: DropTableInput) -> DbResult<DdlOutput> {
        let sql = drop_table_sql(&input)?;
        self.runner.execute(&sql, &[]).await?;
        info!(schema = %input.schema, table = %input.table_name, "Table dropped");
        Ok(DdlOutput {
            message: format!("Table {}.{} dropped successfully", input.schema, input.table_name),
        })
    }

    pub async fn alter_table(&self, input: AlterTableInput) -> DbResult<DdlOutput> {
        let sql = alter_table_sql(&input)?;
        self.runner.execute(&sql, &[]).await?;
        Ok(DdlOutput {
            message: format!("Table {}.{} altered successfully", input.schema, input.table_name),
        })
    }

    pub async fn create_index(&self, input: CreateIndexInput) -> DbResult<DdlOutput> {
        let sql = create_index_sql(&input)?;
        self.runner.execute(&sql, &[]).await?;
        Ok(DdlOutput {
            message: format!("Index {} created successfully", input.index_name),
        })
    }

    pub async fn drop_index(&self, input: DropIndexInput) -> DbResult<DdlOutput> {
        let sql = drop_index_sql(&input)?;
        self.runner.execute(&sql, &[]).await?;
        Ok(DdlOutput {
            message: format!("Index {} dropped successfully", input.index_name),
        })
    }

    pub async fn get_table_ddl(&self, input: TableDdlInput) -> DbResult<TableDdlOutput> {
        let full_name = qualified(&input.schema, &input.table_name, "table_name")?;
        let columns = self
            .runner
            .fetch(
                LIST_COLUMNS_SQL,
                &[input.schema.as_str().into(), input.table_name.as_str().into()],
            )
            .await?;
        if columns.is_empty() {
            return Err(DbError::validation(format!("Table {full_name} not found")));
        }
        Ok(TableDdlOutput {
            ddl: render_table_ddl(&full_name, &columns),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_input(value: JsonValue) -> CreateTableInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        let input = create_input(json!({
            "table_name": "t1",
            "columns": [
                {"name": "id", "type": "SERIAL", "constraints": "PRIMARY KEY"},
                {"name": "name", "type": "VARCHAR(100)"}
            ]
        }));
        assert_eq!(
            create_table_sql(&input).unwrap(),
            "CREATE TABLE public.t1 (id SERIAL PRIMARY KEY, name VARCHAR(100))"
        );
    }

    #[test]
    fn test_create_table_rejects_bad_names() {
        let input = create_input(json!({
            "table_name": "t1; DROP TABLE x",
            "columns": [{"name": "id", "type": "INTEGER"}]
        }));
        assert!(matches!(create_table_sql(&input), Err(DbError::Validation { .. })));

        let input = create_input(json!({
            "table_name": "t1",
            "columns": [{"name": "id int, x", "type": "INTEGER"}]
        }));
        assert!(create_table_sql(&input).is_err());

        let input = create_input(json!({"table_name": "t1", "columns": []}));
        assert!(create_table_sql(&input).is_err());
    }

    #[test]
    fn test_drop_table_sql() {
        let input: DropTableInput =
            serde_json::from_value(json!({"table_name": "t1", "schema": "app"})).unwrap();
        assert_eq!(drop_table_sql(&input).unwrap(), "DROP TABLE app.t1");

        let input: DropTableInput =
            serde_json::from_value(json!({"table_name": "t1", "cascade": true})).unwrap();
        assert_eq!(drop_table_sql(&input).unwrap(), "DROP TABLE public.t1 CASCADE");
    }

    #[test]
    fn test_alter_table_sql() {
        let input: AlterTableInput = serde_json::from_value(json!({
            "table_name": "t1",
            "action": "ADD COLUMN email VARCHAR(100)"
        }))
        .unwrap();
        assert_eq!(
            alter_table_sql(&input).unwrap(),
            "ALTER TABLE public.t1 ADD COLUMN email VARCHAR(100)"
        );

        let input: AlterTableInput =
            serde_json::from_value(json!({"table_name": "t1", "action": "  "})).unwrap();
        assert!(alter_table_sql(&input).is_err());
    }

    #[test]
    fn test_create_index_sql() {
        let input: CreateIndexInput = serde_json::from_value(json!({
            "index_name": "idx_t1_name",
            "table_name": "t1",
            "columns": ["name", "id"],
            "unique": true
        }))
        .unwrap();
        assert_eq!(
            create_index_sql(&input).unwrap(),
            "CREATE UNIQUE INDEX idx_t1_name ON public.t1 (name, id)"
        );

        let input: CreateIndexInput = serde_json::from_value(json!({
            "index_name": "idx",
            "table_name": "t1",
            "columns": ["lower(name)"]
        }))
        .unwrap();
        assert!(create_index_sql(&input).is_err());
    }

    #[test]
    fn test_drop_index_sql() {
        let input: DropIndexInput =
            serde_json::from_value(json!({"index_name": "idx", "cascade": true})).unwrap();
        assert_eq!(drop_index_sql(&input).unwrap(), "DROP INDEX public.idx CASCADE");
    }

    #[test]
    fn test_render_table_ddl() {
        let rows: Vec<Row> = serde_json::from_value(json!([
            {"column_name": "id", "data_type": "integer", "character_maximum_length": null,
             "is_nullable": "NO", "column_default": "nextval('t1_id_seq'::regclass)"},
            {"column_name": "name", "data_type": "character varying", "character_maximum_length": 100,
             "is_nullable": "YES", "column_default": null}
        ]))
        .unwrap();

        assert_eq!(
            render_table_ddl("public.t1", &rows),
            "CREATE TABLE public.t1 (\n  id integer NOT NULL DEFAULT nextval('t1_id_seq'::regclass),\n  name character varying(100)\n);"
        );
    }
}
