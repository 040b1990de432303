//! Data models for the PostgreSQL MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod envelope;
pub mod value;

pub use envelope::ResultEnvelope;
pub use value::{Row, SqlValue};

use serde_json::{Map, Value as JsonValue};

/// A named operation with its argument map, as handed over by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub name: String,
    pub arguments: Map<String, JsonValue>,
}

impl OperationRequest {
    pub fn new(name: impl Into<String>, arguments: Map<String, JsonValue>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
