//! PostgreSQL MCP Server Library
//!
//! Administrative operations over a PostgreSQL database (queries, schema,
//! data, roles, maintenance) exposed as MCP tools through a pooled execution
//! gateway.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use gateway::OperationGateway;
pub use mcp::PgService;
