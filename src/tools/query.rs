//! Query and catalog introspection tools.
//!
//! `execute_query`, `execute_explain`, `list_databases`, `list_tables`,
//! `list_columns`, `get_table_info` and `get_database_size`.

use crate::db::StatementRunner;
use crate::db::sql::{bind_caller_sql, qualified, validate_identifier};
use crate::error::{DbError, DbResult};
use crate::models::{Row, SqlValue};
use crate::tools::{NoArguments, default_schema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

// information_schema columns are domain types (sql_identifier, cardinal_number,
// yes_or_no); they are cast to plain types so they decode as text and integers.

const LIST_DATABASES_SQL: &str = "\
SELECT datname::text AS name,
       pg_size_pretty(pg_database_size(datname)) AS size,
       pg_encoding_to_char(encoding)::text AS encoding
FROM pg_database
WHERE datistemplate = false
ORDER BY datname";

const LIST_TABLES_SQL: &str = "\
SELECT table_schema::text AS table_schema,
       table_name::text AS table_name,
       table_type::text AS table_type
FROM information_schema.tables
WHERE table_schema = $1
ORDER BY table_name";

pub(crate) const LIST_COLUMNS_SQL: &str = "\
SELECT column_name::text AS column_name,
       data_type::text AS data_type,
       character_maximum_length::int AS character_maximum_length,
       is_nullable::text AS is_nullable,
       column_default::text AS column_default
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position";

const LIST_INDEXES_SQL: &str = "\
SELECT indexname::text AS indexname, indexdef
FROM pg_indexes
WHERE schemaname = $1 AND tablename = $2";

const LIST_CONSTRAINTS_SQL: &str = "\
SELECT con.conname::text AS constraint_name,
       con.contype::text AS constraint_type,
       pg_get_constraintdef(con.oid) AS definition
FROM pg_constraint con
JOIN pg_class rel ON rel.oid = con.conrelid
JOIN pg_namespace nsp ON nsp.oid = rel.relnamespace
WHERE nsp.nspname = $1 AND rel.relname = $2";

const TABLE_SIZE_SQL: &str =
    "SELECT pg_size_pretty(pg_total_relation_size($1::regclass)) AS total_size";

const TABLE_SIZES_SQL: &str = "\
SELECT schemaname::text AS schemaname,
       tablename::text AS tablename,
       pg_size_pretty(pg_total_relation_size(format('%I.%I', schemaname, tablename)::regclass)) AS size,
       pg_total_relation_size(format('%I.%I', schemaname, tablename)::regclass) AS size_bytes
FROM pg_tables
WHERE schemaname NOT IN ('pg_catalog', 'information_schema')
ORDER BY size_bytes DESC
LIMIT 50";

const DATABASE_SIZE_SQL: &str =
    "SELECT pg_size_pretty(pg_database_size(current_database())) AS database_size";

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// SQL query to execute. Use %s (or $1, $2, ...) placeholders for params.
    pub query: String,
    /// Positional query parameters
    #[serde(default)]
    pub params: Vec<SqlValue>,
}

/// Input for the execute_explain tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainInput {
    /// SQL query to explain (not executed)
    pub query: String,
}

/// Input for tools scoped to one schema.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for tools scoped to one table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableInput {
    /// Table name
    pub table_name: String,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainOutput {
    /// First row of the EXPLAIN output, or null
    pub plan: Option<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDatabasesOutput {
    pub databases: Vec<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListTablesOutput {
    pub tables: Vec<Row>,
    pub schema: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListColumnsOutput {
    pub columns: Vec<Row>,
    pub table: String,
    pub schema: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInfoOutput {
    pub table: String,
    pub schema: String,
    pub columns: Vec<Row>,
    pub indexes: Vec<Row>,
    pub constraints: Vec<Row>,
    pub size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSizeOutput {
    pub database_size: String,
    pub tables: Vec<Row>,
}

/// Read a string column from the first row, if present.
pub(crate) fn first_string(rows: &[Row], column: &str) -> Option<String> {
    rows.first()
        .and_then(|row| row.get(column))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

/// Handler for query and introspection tools.
#[derive(Debug, Clone)]
pub struct QueryToolHandler {
    runner: StatementRunner,
}

impl QueryToolHandler {
    pub fn new(runner: StatementRunner) -> Self {
        Self { runner }
    }

    /// Run caller SQL and return every row.
    pub async fn execute_query(&self, input: ExecuteQueryInput) -> DbResult<QueryOutput> {
        let sql = bind_caller_sql(&input.query, 1, input.params.len())?;
        let rows = self.runner.fetch(&sql, &input.params).await?;
        let row_count = rows.len();
        info!(row_count, "Query executed");
        Ok(QueryOutput { rows, row_count })
    }

    /// Plan a query without running it.
    pub async fn execute_explain(&self, input: ExplainInput) -> DbResult<ExplainOutput> {
        let sql = format!("EXPLAIN (FORMAT JSON, ANALYZE FALSE) {}", input.query);
        let rows = self.runner.fetch(&sql, &[]).await?;
        Ok(ExplainOutput {
            plan: rows.into_iter().next(),
        })
    }

    pub async fn list_databases(&self, _input: NoArguments) -> DbResult<ListDatabasesOutput> {
        let databases = self.runner.fetch(LIST_DATABASES_SQL, &[]).await?;
        Ok(ListDatabasesOutput { databases })
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        validate_identifier("schema", &input.schema)?;
        let tables = self
            .runner
            .fetch(LIST_TABLES_SQL, &[input.schema.as_str().into()])
            .await?;
        Ok(ListTablesOutput {
            tables,
            schema: input.schema,
        })
    }

    pub async fn list_columns(&self, input: TableInput) -> DbResult<ListColumnsOutput> {
        qualified(&input.schema, &input.table_name, "table_name")?;
        let columns = self
            .runner
            .fetch(LIST_COLUMNS_SQL, &table_params(&input))
            .await?;
        Ok(ListColumnsOutput {
            columns,
            table: input.table_name,
            schema: input.schema,
        })
    }

    /// Columns, indexes, constraints and total size of one table.
    ///
    /// The four lookups run concurrently on separate connections; the first
    /// failure fails the whole call.
    pub async fn get_table_info(&self, input: TableInput) -> DbResult<TableInfoOutput> {
        let full_name = qualified(&input.schema, &input.table_name, "table_name")?;
        let params = table_params(&input);
        let size_params = [SqlValue::from(full_name)];

        let (columns, indexes, constraints, size) = futures_util::future::try_join4(
            self.runner.fetch(LIST_COLUMNS_SQL, &params),
            self.runner.fetch(LIST_INDEXES_SQL, &params),
            self.runner.fetch(LIST_CONSTRAINTS_SQL, &params),
            self.runner.fetch(TABLE_SIZE_SQL, &size_params),
        )
        .await?;

        Ok(TableInfoOutput {
            table: input.table_name,
            schema: input.schema,
            columns,
            indexes,
            constraints,
            size: first_string(&size, "total_size").unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    /// Database size plus the 50 largest user tables.
    pub async fn get_database_size(&self, _input: NoArguments) -> DbResult<DatabaseSizeOutput> {
        let (tables, db_size) = futures_util::future::try_join(
            self.runner.fetch(TABLE_SIZES_SQL, &[]),
            self.runner.fetch(DATABASE_SIZE_SQL, &[]),
        )
        .await?;

        let database_size = first_string(&db_size, "database_size")
            .ok_or_else(|| DbError::internal("pg_database_size returned no rows"))?;
        Ok(DatabaseSizeOutput {
            database_size,
            tables,
        })
    }
}

fn table_params(input: &TableInput) -> [SqlValue; 2] {
    [
        input.schema.as_str().into(),
        input.table_name.as_str().into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_query_input_defaults() {
        let input: ExecuteQueryInput =
            serde_json::from_value(json!({"query": "SELECT 1"})).unwrap();
        assert!(input.params.is_empty());

        let input: ExecuteQueryInput = serde_json::from_value(json!({
            "query": "SELECT * FROM t WHERE id = %s AND name = %s",
            "params": [1, "x"]
        }))
        .unwrap();
        assert_eq!(input.params, vec![SqlValue::Int(1), SqlValue::from("x")]);
    }

    #[test]
    fn test_table_input_default_schema() {
        let input: TableInput = serde_json::from_value(json!({"table_name": "t1"})).unwrap();
        assert_eq!(input.schema, "public");
        assert_eq!(
            table_params(&input),
            [SqlValue::from("public"), SqlValue::from("t1")]
        );
    }

    #[test]
    fn test_first_string() {
        let mut row = Row::new();
        row.insert("total_size".to_string(), json!("16 kB"));
        assert_eq!(first_string(&[row], "total_size").as_deref(), Some("16 kB"));
        assert_eq!(first_string(&[], "total_size"), None);
    }

    #[test]
    fn test_catalog_queries_use_native_placeholders() {
        for sql in [LIST_TABLES_SQL, LIST_COLUMNS_SQL, LIST_INDEXES_SQL, LIST_CONSTRAINTS_SQL] {
            assert!(sql.contains("$1"));
            assert!(!sql.contains("%s"));
        }
    }
}
