//! Scoped transactions over a pooled connection.

use crate::db::params::{build_query, cast_string_params, describe_params};
use crate::db::pool::{ConnectionPool, PooledConnection};
use crate::db::types::rows_to_json;
use crate::error::{DbError, DbResult};
use crate::models::{Row, SqlValue};
use std::borrow::Cow;
use tracing::{debug, warn};

const DESCRIBE_SAVEPOINT: &str = "pg_mcp_describe";

/// A connection checked out of the pool with an open transaction.
///
/// Finish it with [`commit`](Self::commit), [`rollback`](Self::rollback) or
/// [`finish`](Self::finish); each returns the connection to the pool exactly
/// once. A cursor dropped before that (early return, panic, or the surrounding
/// future being cancelled) discards its connection instead: closing the session
/// aborts the transaction server-side, so no connection ever goes back to the
/// pool mid-transaction.
pub struct TransactionalCursor<'p> {
    pool: &'p ConnectionPool,
    conn: Option<PooledConnection>,
}

impl<'p> TransactionalCursor<'p> {
    /// Acquire a connection and open a transaction on it.
    pub async fn begin(pool: &'p ConnectionPool) -> DbResult<Self> {
        let mut conn = pool.acquire().await?;
        if let Err(e) = conn.execute_raw("BEGIN").await {
            pool.release(conn);
            return Err(e);
        }
        Ok(Self {
            pool,
            conn: Some(conn),
        })
    }

    fn connection(&mut self) -> DbResult<&mut PooledConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| DbError::internal("Transaction already finished"))
    }

    /// Cast the placeholders of string values the server would not accept
    /// as TEXT, e.g. a string bound for a `date` column.
    ///
    /// The statement is described under a savepoint: when the server cannot
    /// infer a type without the TEXT declaration, the text is used unchanged
    /// and the transaction stays usable.
    async fn typed_sql<'s>(
        &mut self,
        sql: &'s str,
        params: &[SqlValue],
    ) -> DbResult<Cow<'s, str>> {
        if !params.iter().any(|p| matches!(p, SqlValue::String(_))) {
            return Ok(Cow::Borrowed(sql));
        }

        let conn = self.connection()?;
        conn.execute_raw(&format!("SAVEPOINT {DESCRIBE_SAVEPOINT}")).await?;
        let described = describe_params(conn.as_mut()?, sql, params).await;
        match conn.track(described) {
            Ok(inferred) => {
                conn.execute_raw(&format!("RELEASE SAVEPOINT {DESCRIBE_SAVEPOINT}"))
                    .await?;
                Ok(cast_string_params(sql, params, &inferred))
            }
            Err(e) if e.is_connection_broken() => Err(e),
            Err(e) => {
                debug!(error = %e, "Parameter types not inferred; binding strings as text");
                conn.execute_raw(&format!("ROLLBACK TO SAVEPOINT {DESCRIBE_SAVEPOINT}"))
                    .await?;
                conn.execute_raw(&format!("RELEASE SAVEPOINT {DESCRIBE_SAVEPOINT}"))
                    .await?;
                Ok(Cow::Borrowed(sql))
            }
        }
    }

    /// Run a statement and collect every result row.
    pub async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        debug!(sql = %sql, params = params.len(), "Fetching rows");
        let sql = self.typed_sql(sql, params).await?;
        let conn = self.connection()?;
        let result = build_query(&sql, params)
            .fetch_all(conn.as_mut()?)
            .await
            .map_err(DbError::from);
        let rows = conn.track(result)?;
        Ok(rows_to_json(&rows))
    }

    /// Run a statement for its side effect. Returns rows affected.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        let sql = self.typed_sql(sql, params).await?;
        let conn = self.connection()?;
        let result = build_query(&sql, params)
            .execute(conn.as_mut()?)
            .await
            .map(|done| done.rows_affected())
            .map_err(DbError::from);
        conn.track(result)
    }

    /// Commit and release the connection.
    pub async fn commit(mut self) -> DbResult<()> {
        self.end("COMMIT").await
    }

    /// Roll back and release the connection.
    pub async fn rollback(mut self) -> DbResult<()> {
        self.end("ROLLBACK").await
    }

    /// Commit when `result` is `Ok`, roll back otherwise, and hand `result` back.
    ///
    /// A failed rollback is logged and the connection discarded; the caller
    /// still sees the statement's own error.
    pub async fn finish<T>(self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn end(&mut self, statement: &str) -> DbResult<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let result = conn.execute_settled(statement).await;
        if result.is_err() {
            // The transaction state is unknown; never reuse this session.
            conn.mark_broken();
        }
        self.pool.release(conn);
        result.map(|_| ())
    }
}

impl Drop for TransactionalCursor<'_> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            warn!("Transaction abandoned before commit or rollback; discarding connection");
            conn.mark_broken();
            self.pool.release(conn);
        }
    }
}
