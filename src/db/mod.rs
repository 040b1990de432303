//! Database access layer.
//!
//! - `pool`: bounded connection pool with an explicit lifecycle
//! - `cursor`: scoped transaction over a checked-out connection
//! - `runner`: transactional and autocommit statement execution
//! - `params`: positional parameter binding
//! - `types`: result row decoding
//! - `sql`: identifier validation and SQL text helpers

pub mod cursor;
pub mod params;
pub mod pool;
pub mod runner;
pub mod sql;
pub mod types;

pub use cursor::TransactionalCursor;
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use runner::{NonTransactionalRunner, StatementRunner};
