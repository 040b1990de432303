//! Error types for the PostgreSQL MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every variant renders to a human-readable message, which is what callers see in
//! the `error` field of a failed result envelope.

use crate::config::DEFAULT_CONNECT_TIMEOUT_SECS;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection pool exhausted: no connection became available within {timeout_secs}s")]
    PoolExhausted { timeout_secs: u64 },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// Reported by the database server. The message is the server's own text.
    #[error("{message}")]
    Statement {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("{program} failed: {message}")]
    Subprocess { program: String, message: String },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Unknown tool: {name}")]
    UnknownOperation { name: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a pool exhausted error.
    pub fn pool_exhausted(timeout_secs: u64) -> Self {
        Self::PoolExhausted { timeout_secs }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a statement error with optional SQL state.
    pub fn statement(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Statement {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a subprocess error.
    pub fn subprocess(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Subprocess {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an unknown operation error.
    pub fn unknown_operation(name: impl Into<String>) -> Self {
        Self::UnknownOperation { name: name.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Statement { suggestion, .. } => Some(suggestion),
            Self::PoolExhausted { .. } => {
                Some("Retry later or raise the pool's max_connections")
            }
            _ => None,
        }
    }

    /// Get the SQLSTATE code reported by the server, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Statement { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Whether the connection that produced this error can no longer be trusted.
    ///
    /// Server-reported errors leave the session usable (after rollback); transport
    /// level failures do not.
    pub fn is_connection_broken(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection settings and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let suggestion = statement_suggestion(code.as_deref());
                DbError::statement(db_err.message(), code, suggestion)
            }
            sqlx::Error::RowNotFound => DbError::statement(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::pool_exhausted(DEFAULT_CONNECT_TIMEOUT_SECS),
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify the sslmode setting and server certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::validation(format!("Type not found: {}", type_name))
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::validation(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::connection(
                "Database worker crashed",
                "Retry the operation",
            ),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Hint for a server-reported error, keyed on its SQLSTATE.
fn statement_suggestion(code: Option<&str>) -> &'static str {
    match code {
        Some("42P01") => "Check the table name and schema; list_tables shows what exists",
        Some("42703") => "Check the column names; list_columns shows what exists",
        Some("42601") => "Check the SQL syntax near the reported position",
        Some("42501") => "The connected role lacks the privilege; see list_permissions",
        Some("23505") => "A row with the same unique key already exists",
        Some("23503") => "The referenced row does not exist or is still referenced",
        Some("23502") => "Supply a value for every NOT NULL column",
        Some("22P02" | "22007" | "22008") => "Check that each value matches its column type",
        Some("25006") => "The server runs in read-only mode; writes are rejected",
        Some("57014") => "The statement was cancelled; narrow the query or raise the timeout",
        _ => "Check the SQL syntax and referenced objects",
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operation_display() {
        let err = DbError::unknown_operation("bogus");
        assert_eq!(err.to_string(), "Unknown tool: bogus");
    }

    #[test]
    fn test_statement_display_is_server_message() {
        let err = DbError::statement(
            "relation \"missing\" does not exist",
            Some("42P01".to_string()),
            "Check the table name",
        );
        assert_eq!(err.to_string(), "relation \"missing\" does not exist");
        assert_eq!(err.sql_state(), Some("42P01"));
        assert_eq!(err.suggestion(), Some("Check the table name"));
    }

    #[test]
    fn test_pool_errors_display() {
        assert!(
            DbError::pool_exhausted(10)
                .to_string()
                .contains("within 10s")
        );
        assert_eq!(DbError::PoolClosed.to_string(), "Connection pool is closed");
    }

    #[test]
    fn test_subprocess_display() {
        let err = DbError::subprocess("pg_dump", "connection refused");
        assert_eq!(err.to_string(), "pg_dump failed: connection refused");
    }

    #[test]
    fn test_statement_suggestion_follows_sql_state() {
        assert!(statement_suggestion(Some("42P01")).contains("list_tables"));
        assert!(statement_suggestion(Some("22007")).contains("column type"));
        assert_eq!(
            statement_suggestion(None),
            "Check the SQL syntax and referenced objects"
        );
    }

    #[test]
    fn test_connection_broken_classification() {
        assert!(DbError::connection("reset by peer", "retry").is_connection_broken());
        assert!(!DbError::statement("syntax error", None, "fix it").is_connection_broken());
        assert!(!DbError::validation("missing").is_connection_broken());
    }

    #[test]
    fn test_from_sqlx_pool_errors() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::PoolExhausted { .. }));

        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, DbError::PoolClosed));
    }

    #[test]
    fn test_from_sqlx_io_error_is_broken() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: DbError = sqlx::Error::Io(io).into();
        assert!(err.is_connection_broken());
    }
}
