//! MCP server integration module.
//!
//! Bridges the MCP protocol (rmcp) to the operation gateway.

pub mod service;

pub use service::PgService;
