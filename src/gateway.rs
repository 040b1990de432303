//! Operation gateway.
//!
//! Receives an operation name and argument map, dispatches to the owning
//! domain handler and folds every outcome into a [`ResultEnvelope`]. Nothing
//! raised inside a handler escapes `invoke`.

use crate::config::ExternalTools;
use crate::db::{ConnectionPool, StatementRunner};
use crate::error::{DbError, DbResult};
use crate::models::{OperationRequest, ResultEnvelope};
use crate::tools::{
    DataToolHandler, MaintenanceToolHandler, Operation, QueryToolHandler, SchemaToolHandler,
    UserToolHandler,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{Instrument, debug, error, info_span};
use uuid::Uuid;

/// Façade over the domain handlers. Cheap to clone; all clones share one pool.
#[derive(Debug, Clone)]
pub struct OperationGateway {
    pool: Arc<ConnectionPool>,
    query: QueryToolHandler,
    schema: SchemaToolHandler,
    data: DataToolHandler,
    user: UserToolHandler,
    maintenance: MaintenanceToolHandler,
}

impl OperationGateway {
    pub fn new(pool: Arc<ConnectionPool>, tools: ExternalTools) -> Self {
        let runner = StatementRunner::new(pool.clone());
        Self {
            query: QueryToolHandler::new(runner.clone()),
            schema: SchemaToolHandler::new(runner.clone()),
            data: DataToolHandler::new(runner.clone()),
            user: UserToolHandler::new(runner.clone()),
            maintenance: MaintenanceToolHandler::new(runner, tools),
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Run the named operation. Always returns an envelope.
    pub async fn invoke(&self, name: &str, args: Map<String, JsonValue>) -> ResultEnvelope {
        let span = info_span!(
            "invoke",
            operation = %name,
            request_id = %Uuid::new_v4()
        );

        async {
            match self.dispatch(name, args).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!(error = %e, "Operation failed");
                    ResultEnvelope::failure(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn invoke_request(&self, request: OperationRequest) -> ResultEnvelope {
        self.invoke(&request.name, request.arguments).await
    }

    async fn dispatch(&self, name: &str, args: Map<String, JsonValue>) -> DbResult<ResultEnvelope> {
        let op: Operation = name.parse()?;
        check_required(op, &args)?;
        debug!("Dispatching");

        let args = JsonValue::Object(args);
        match op {
            Operation::ExecuteQuery => wrap(self.query.execute_query(parse(op, args)?).await),
            Operation::ExecuteExplain => wrap(self.query.execute_explain(parse(op, args)?).await),
            Operation::ListDatabases => wrap(self.query.list_databases(parse(op, args)?).await),
            Operation::ListTables => wrap(self.query.list_tables(parse(op, args)?).await),
            Operation::ListColumns => wrap(self.query.list_columns(parse(op, args)?).await),
            Operation::GetTableInfo => wrap(self.query.get_table_info(parse(op, args)?).await),
            Operation::GetDatabaseSize => {
                wrap(self.query.get_database_size(parse(op, args)?).await)
            }

            Operation::CreateTable => wrap(self.schema.create_table(parse(op, args)?).await),
            Operation::DropTable => wrap(self.schema.drop_table(parse(op, args)?).await),
            Operation::AlterTable => wrap(self.schema.alter_table(parse(op, args)?).await),
            Operation::CreateIndex => wrap(self.schema.create_index(parse(op, args)?).await),
            Operation::DropIndex => wrap(self.schema.drop_index(parse(op, args)?).await),
            Operation::GetTableDdl => wrap(self.schema.get_table_ddl(parse(op, args)?).await),

            Operation::InsertData => wrap(self.data.insert_data(parse(op, args)?).await),
            Operation::BulkInsert => wrap(self.data.bulk_insert(parse(op, args)?).await),
            Operation::UpdateData => wrap(self.data.update_data(parse(op, args)?).await),
            Operation::DeleteData => wrap(self.data.delete_data(parse(op, args)?).await),

            Operation::ListUsers => wrap(self.user.list_users(parse(op, args)?).await),
            Operation::CreateUser => wrap(self.user.create_user(parse(op, args)?).await),
            Operation::GrantPermissions => {
                wrap(self.user.grant_permissions(parse(op, args)?).await)
            }
            Operation::RevokePermissions => {
                wrap(self.user.revoke_permissions(parse(op, args)?).await)
            }
            Operation::ListPermissions => wrap(self.user.list_permissions(parse(op, args)?).await),

            Operation::VacuumAnalyze => {
                wrap(self.maintenance.vacuum_analyze(parse(op, args)?).await)
            }
            Operation::BackupDatabase => {
                wrap(self.maintenance.backup_database(parse(op, args)?).await)
            }
            Operation::RestoreDatabase => {
                wrap(self.maintenance.restore_database(parse(op, args)?).await)
            }
            Operation::KillConnections => {
                wrap(self.maintenance.kill_connections(parse(op, args)?).await)
            }
            Operation::GetActiveConnections => {
                wrap(self.maintenance.get_active_connections(parse(op, args)?).await)
            }
            Operation::TestConnection => {
                wrap(self.maintenance.test_connection(parse(op, args)?).await)
            }
        }
    }
}

fn check_required(op: Operation, args: &Map<String, JsonValue>) -> DbResult<()> {
    match op.required_args().iter().find(|key| !args.contains_key(key.as_str())) {
        Some(key) => Err(DbError::validation(format!(
            "Missing required argument: {key}"
        ))),
        None => Ok(()),
    }
}

fn parse<T: DeserializeOwned>(op: Operation, args: JsonValue) -> DbResult<T> {
    serde_json::from_value(args)
        .map_err(|e| DbError::validation(format!("Invalid arguments for {op}: {e}")))
}

fn wrap<T: Serialize>(result: DbResult<T>) -> DbResult<ResultEnvelope> {
    result.map(|output| ResultEnvelope::from_output(&output))
}
