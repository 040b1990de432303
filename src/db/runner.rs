//! Statement execution on top of the pool.
//!
//! `StatementRunner` wraps every call in a `TransactionalCursor`;
//! `NonTransactionalRunner` is for statements PostgreSQL refuses inside a
//! transaction block, such as `VACUUM`.

use crate::db::cursor::TransactionalCursor;
use crate::db::pool::ConnectionPool;
use crate::error::{DbError, DbResult};
use crate::models::{Row, SqlValue};
use std::sync::Arc;
use tracing::debug;

/// Runs single statements, each in its own transaction.
#[derive(Debug, Clone)]
pub struct StatementRunner {
    pool: Arc<ConnectionPool>,
}

impl StatementRunner {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Run a statement and return its rows. An empty result is an empty vector.
    pub async fn fetch(&self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let mut cursor = TransactionalCursor::begin(&self.pool).await?;
        let result = cursor.fetch_all(sql, params).await;
        cursor.finish(result).await
    }

    /// Run a statement without collecting rows. Returns rows affected.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        let mut cursor = TransactionalCursor::begin(&self.pool).await?;
        let result = cursor.execute(sql, params).await;
        cursor.finish(result).await
    }

    /// Run `sql` once per parameter set inside a single transaction.
    ///
    /// Either every set is applied or none is. Returns the total rows affected.
    pub async fn run_many(&self, sql: &str, param_sets: &[Vec<SqlValue>]) -> DbResult<u64> {
        debug!(sql = %sql, sets = param_sets.len(), "Running batch");
        let mut cursor = TransactionalCursor::begin(&self.pool).await?;
        let result = async {
            let mut total = 0;
            for params in param_sets {
                total += cursor.execute(sql, params).await?;
            }
            Ok::<u64, DbError>(total)
        }
        .await;
        cursor.finish(result).await
    }
}

/// Runs a parameterless statement in autocommit mode.
#[derive(Debug, Clone)]
pub struct NonTransactionalRunner {
    pool: Arc<ConnectionPool>,
}

impl NonTransactionalRunner {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Execute `sql` outside any transaction block. The connection is released
    /// whether or not the statement succeeds.
    pub async fn run(&self, sql: &str) -> DbResult<u64> {
        let mut conn = self.pool.acquire().await?;
        debug!(sql = %sql, "Executing outside a transaction");
        let result = conn.execute_settled(sql).await;
        self.pool.release(conn);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;

    fn closed_pool() -> Arc<ConnectionPool> {
        Arc::new(ConnectionPool::new(PoolConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_runners_report_closed_pool() {
        let pool = closed_pool();
        pool.close().await;

        let runner = StatementRunner::new(pool.clone());
        assert!(matches!(
            runner.fetch("SELECT 1", &[]).await,
            Err(DbError::PoolClosed)
        ));
        assert!(matches!(
            runner.run_many("SELECT 1", &[vec![], vec![]]).await,
            Err(DbError::PoolClosed)
        ));

        let vacuum = NonTransactionalRunner::new(pool);
        assert!(matches!(vacuum.run("VACUUM").await, Err(DbError::PoolClosed)));
    }
}
