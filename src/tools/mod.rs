//! Domain tool handlers.
//!
//! - `query`: query execution and catalog introspection
//! - `schema`: DDL (tables, indexes, generated CREATE TABLE)
//! - `data`: DML (insert, bulk insert, update, delete)
//! - `user`: roles and privileges
//! - `maintenance`: vacuum, backup/restore, session management, connectivity
//! - `catalog`: operation names, descriptions and input schemas
//! - `process`: external executable runner used by backup/restore

pub mod catalog;
pub mod data;
pub mod maintenance;
pub mod process;
pub mod query;
pub mod schema;
pub mod user;

pub use catalog::Operation;
pub use data::DataToolHandler;
pub use maintenance::MaintenanceToolHandler;
pub use query::QueryToolHandler;
pub use schema::SchemaToolHandler;
pub use user::UserToolHandler;

use schemars::JsonSchema;
use serde::Deserialize;

/// Input for operations that take no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArguments {}

pub(crate) fn default_schema() -> String {
    "public".to_string()
}
