//! Data manipulation tools (DML).
//!
//! Values always travel as bound parameters; only validated column and table
//! names are spliced into the statement text.

use crate::db::StatementRunner;
use crate::db::sql::{bind_caller_sql, identifier_list, numbered_placeholders, qualified};
use crate::error::{DbError, DbResult};
use crate::models::{Row, SqlValue};
use crate::tools::default_schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::info;

/// Input for the insert_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertInput {
    /// Table name
    pub table_name: String,
    /// Column:value pairs
    pub data: Map<String, JsonValue>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for the bulk_insert tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BulkInsertInput {
    /// Table name
    pub table_name: String,
    /// Rows to insert; every row must carry the first row's columns
    pub data_list: Vec<Map<String, JsonValue>>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for the update_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInput {
    /// Table name
    pub table_name: String,
    /// Column:value pairs to set
    pub data: Map<String, JsonValue>,
    /// WHERE clause without the WHERE keyword. Use %s placeholders for where_params.
    pub where_clause: String,
    /// Parameters for the WHERE clause
    #[serde(default)]
    pub where_params: Vec<SqlValue>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

/// Input for the delete_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteInput {
    /// Table name
    pub table_name: String,
    /// WHERE clause without the WHERE keyword. Use %s placeholders for where_params.
    pub where_clause: String,
    /// Parameters for the WHERE clause
    #[serde(default)]
    pub where_params: Vec<SqlValue>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsertOutput {
    pub message: String,
    pub inserted_row: Option<Row>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkInsertOutput {
    pub message: String,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutput {
    pub message: String,
    pub updated_rows: Vec<Row>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutput {
    pub message: String,
    pub deleted_rows: Vec<Row>,
    pub row_count: usize,
}

/// SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

// =============================================================================
// Statement builders
// =============================================================================

fn require_columns(data: &Map<String, JsonValue>) -> DbResult<Vec<&str>> {
    if data.is_empty() {
        return Err(DbError::validation("data must contain at least one column"));
    }
    Ok(data.keys().map(String::as_str).collect())
}

fn require_where(where_clause: &str) -> DbResult<&str> {
    let clause = where_clause.trim();
    if clause.is_empty() {
        return Err(DbError::validation("where_clause must not be empty"));
    }
    Ok(clause)
}

pub fn insert_statement(input: &InsertInput) -> DbResult<Statement> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    let columns = require_columns(&input.data)?;
    let column_sql = identifier_list("column", &columns)?;
    let placeholders = numbered_placeholders(1, columns.len()).join(", ");

    Ok(Statement {
        sql: format!("INSERT INTO {table} ({column_sql}) VALUES ({placeholders}) RETURNING *"),
        params: input.data.values().cloned().map(SqlValue::from).collect(),
    })
}

/// One statement for the whole batch plus one parameter set per row.
///
/// Columns come from the first row; a later row missing any of them is
/// rejected before anything runs. Extra keys in later rows are ignored.
pub fn bulk_insert_statement(input: &BulkInsertInput) -> DbResult<(String, Vec<Vec<SqlValue>>)> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    let Some(first) = input.data_list.first() else {
        return Err(DbError::validation("No data provided"));
    };
    let columns = require_columns(first)?;
    let column_sql = identifier_list("column", &columns)?;
    let placeholders = numbered_placeholders(1, columns.len()).join(", ");

    let param_sets = input
        .data_list
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            columns
                .iter()
                .map(|col| {
                    row.get(*col).cloned().map(SqlValue::from).ok_or_else(|| {
                        DbError::validation(format!("row {idx} is missing column '{col}'"))
                    })
                })
                .collect::<DbResult<Vec<_>>>()
        })
        .collect::<DbResult<Vec<_>>>()?;

    Ok((
        format!("INSERT INTO {table} ({column_sql}) VALUES ({placeholders})"),
        param_sets,
    ))
}

pub fn update_statement(input: &UpdateInput) -> DbResult<Statement> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    let columns = require_columns(&input.data)?;
    identifier_list("column", &columns)?;
    let where_clause = require_where(&input.where_clause)?;

    let set_sql = columns
        .iter()
        .zip(numbered_placeholders(1, columns.len()))
        .map(|(col, p)| format!("{col} = {p}"))
        .collect::<Vec<_>>()
        .join(", ");
    let where_sql = bind_caller_sql(where_clause, columns.len() + 1, input.where_params.len())?;

    let mut params: Vec<SqlValue> = input.data.values().cloned().map(SqlValue::from).collect();
    params.extend(input.where_params.iter().cloned());

    Ok(Statement {
        sql: format!("UPDATE {table} SET {set_sql} WHERE {where_sql} RETURNING *"),
        params,
    })
}

pub fn delete_statement(input: &DeleteInput) -> DbResult<Statement> {
    let table = qualified(&input.schema, &input.table_name, "table_name")?;
    let where_clause = require_where(&input.where_clause)?;
    let where_sql = bind_caller_sql(where_clause, 1, input.where_params.len())?;

    Ok(Statement {
        sql: format!("DELETE FROM {table} WHERE {where_sql} RETURNING *"),
        params: input.where_params.clone(),
    })
}

// =============================================================================
// Handler
// =============================================================================

/// Handler for DML tools.
#[derive(Debug, Clone)]
pub struct DataToolHandler {
    runner: StatementRunner,
}

impl DataToolHandler {
    pub fn new(runner: StatementRunner) -> Self {
        Self { runner }
    }

    pub async fn insert_data(&self, input: InsertInput) -> DbResult<InsertOutput> {
        let stmt = insert_statement(&input)?;
        let rows = self.runner.fetch(&stmt.sql, &stmt.params).await?;
        let row_count = rows.len();
        Ok(InsertOutput {
            message: format!("Row inserted into {}.{}", input.schema, input.table_name),
            inserted_row: rows.into_iter().next(),
            row_count,
        })
    }

    /// Insert every row in one transaction; any failure leaves the table untouched.
    pub async fn bulk_insert(&self, input: BulkInsertInput) -> DbResult<BulkInsertOutput> {
        let (sql, param_sets) = bulk_insert_statement(&input)?;
        self.runner.run_many(&sql, &param_sets).await?;
        let row_count = param_sets.len();
        info!(row_count, table = %input.table_name, "Bulk insert committed");
        Ok(BulkInsertOutput {
            message: format!(
                "Inserted {row_count} rows into {}.{}",
                input.schema, input.table_name
            ),
            row_count,
        })
    }

    pub async fn update_data(&self, input: UpdateInput) -> DbResult<UpdateOutput> {
        let stmt = update_statement(&input)?;
        let updated_rows = self.runner.fetch(&stmt.sql, &stmt.params).await?;
        let row_count = updated_rows.len();
        Ok(UpdateOutput {
            message: format!(
                "Updated {row_count} rows in {}.{}",
                input.schema, input.table_name
            ),
            updated_rows,
            row_count,
        })
    }

    pub async fn delete_data(&self, input: DeleteInput) -> DbResult<DeleteOutput> {
        let stmt = delete_statement(&input)?;
        let deleted_rows = self.runner.fetch(&stmt.sql, &stmt.params).await?;
        let row_count = deleted_rows.len();
        Ok(DeleteOutput {
            message: format!(
                "Deleted {row_count} rows from {}.{}",
                input.schema, input.table_name
            ),
            deleted_rows,
            row_count,
        })
    }
}
