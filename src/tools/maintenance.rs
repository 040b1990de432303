//! Maintenance and utility tools.
//!
//! `vacuum_analyze` runs outside a transaction block. `backup_database` and
//! `restore_database` shell out to `pg_dump`/`pg_restore`; the rest are
//! ordinary catalog queries.

use crate::config::{ExternalTools, PoolConfig};
use crate::db::sql::qualified;
use crate::db::{NonTransactionalRunner, PoolStatus, StatementRunner};
use crate::error::{DbError, DbResult};
use crate::models::Row;
use crate::tools::process::run_command;
use crate::tools::query::first_string;
use crate::tools::{NoArguments, default_schema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing::info;

const TERMINATE_SQL: &str = "\
SELECT pg_terminate_backend(pid) AS terminated
FROM pg_stat_activity
WHERE datname = $1
  AND pid <> pg_backend_pid()";

const ACTIVE_CONNECTIONS_SQL: &str = "\
SELECT datname::text AS database,
       usename::text AS username,
       application_name,
       client_addr::text AS client_addr,
       state,
       query,
       query_start
FROM pg_stat_activity
WHERE pid <> pg_backend_pid()
ORDER BY query_start DESC NULLS LAST";

const CONNECTION_INFO_SQL: &str = "\
SELECT version() AS version,
       current_database()::text AS database,
       current_user::text AS \"user\"";

/// pg_dump output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    /// Compressed archive for pg_restore (default)
    #[default]
    Custom,
    /// Plain SQL script
    Plain,
    /// Directory archive
    Directory,
    /// Tar archive
    Tar,
}

impl DumpFormat {
    pub fn flag(self) -> &'static str {
        match self {
            Self::Custom => "-Fc",
            Self::Plain => "-Fp",
            Self::Directory => "-Fd",
            Self::Tar => "-Ft",
        }
    }
}

/// Input for the vacuum_analyze tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VacuumInput {
    /// Table name. Omit to vacuum the entire database.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Schema name. Default: public
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Run VACUUM FULL (rewrites the table, takes an exclusive lock)
    #[serde(default)]
    pub full: bool,
}

/// Input for the backup_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BackupInput {
    /// Output file path. Default: a timestamped file in the temp directory.
    #[serde(default)]
    pub output_file: Option<String>,
    /// Dump format. Default: custom
    #[serde(default)]
    pub format: DumpFormat,
}

/// Input for the restore_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RestoreInput {
    /// Path to the backup file
    pub backup_file: String,
    /// Drop database objects before recreating them
    #[serde(default)]
    pub clean: bool,
}

/// Input for the kill_connections tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct KillConnectionsInput {
    /// Database whose sessions to terminate. Default: the configured database.
    #[serde(default)]
    pub target_database: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceMessageOutput {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupOutput {
    pub message: String,
    pub backup_file: String,
    /// Human-readable size of the dump file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KillConnectionsOutput {
    pub message: String,
    pub terminated_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveConnectionsOutput {
    pub connections: Vec<Row>,
    pub connection_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestOutput {
    pub status: &'static str,
    pub version: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub host: String,
    pub port: u16,
    pub pool: PoolStatus,
}

// =============================================================================
// Command builders
// =============================================================================

pub fn vacuum_sql(input: &VacuumInput) -> DbResult<String> {
    let vacuum = if input.full { "VACUUM FULL" } else { "VACUUM" };
    match &input.table_name {
        Some(table) => {
            let table = qualified(&input.schema, table, "table_name")?;
            Ok(format!("{vacuum} ANALYZE {table}"))
        }
        None => Ok(format!("{vacuum} ANALYZE")),
    }
}

fn connection_args(config: &PoolConfig) -> Vec<String> {
    vec![
        "-h".to_string(),
        config.host.clone(),
        "-p".to_string(),
        config.port.to_string(),
        "-U".to_string(),
        config.user.clone(),
        "-d".to_string(),
        config.database.clone(),
    ]
}

pub fn dump_args(config: &PoolConfig, format: DumpFormat, output_file: &str) -> Vec<String> {
    let mut args = connection_args(config);
    args.push(format.flag().to_string());
    args.push("-f".to_string());
    args.push(output_file.to_string());
    args
}

pub fn restore_args(config: &PoolConfig, backup_file: &str, clean: bool) -> Vec<String> {
    let mut args = connection_args(config);
    if clean {
        args.push("--clean".to_string());
    }
    args.push(backup_file.to_string());
    args
}

/// Environment for libpq-based tools. The password never appears in arguments.
pub fn client_env(config: &PoolConfig) -> Vec<(&'static str, String)> {
    let mut env = vec![("PGSSLMODE", config.ssl_mode.as_str().to_string())];
    if !config.password.is_empty() {
        env.push(("PGPASSWORD", config.password.clone()));
    }
    env
}

pub fn default_backup_path(database: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    std::env::temp_dir().join(format!("backup_{database}_{timestamp}.dump"))
}

/// Count sessions for which `pg_terminate_backend` reported success.
pub fn count_terminated(rows: &[Row]) -> usize {
    rows.iter()
        .filter(|row| matches!(row.values().next(), Some(JsonValue::Bool(true))))
        .count()
}

async fn file_size(path: &str) -> Option<String> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.is_file()
        .then(|| humansize::format_size(meta.len(), humansize::WINDOWS))
}

// =============================================================================
// Handler
// =============================================================================

/// Handler for maintenance tools.
#[derive(Debug, Clone)]
pub struct MaintenanceToolHandler {
    runner: StatementRunner,
    vacuum: NonTransactionalRunner,
    tools: ExternalTools,
}

impl MaintenanceToolHandler {
    pub fn new(runner: StatementRunner, tools: ExternalTools) -> Self {
        let vacuum = NonTransactionalRunner::new(runner.pool().clone());
        Self {
            runner,
            vacuum,
            tools,
        }
    }

    fn config(&self) -> &PoolConfig {
        self.runner.pool().config()
    }

    pub async fn vacuum_analyze(&self, input: VacuumInput) -> DbResult<MaintenanceMessageOutput> {
        let sql = vacuum_sql(&input)?;
        self.vacuum.run(&sql).await?;
        let target = match &input.table_name {
            Some(table) => table.as_str(),
            None => "entire database",
        };
        Ok(MaintenanceMessageOutput {
            message: format!("VACUUM ANALYZE completed for {target}"),
        })
    }

    pub async fn backup_database(&self, input: BackupInput) -> DbResult<BackupOutput> {
        let config = self.config();
        let output_file = match input.output_file.filter(|f| !f.trim().is_empty()) {
            Some(file) => file,
            None => default_backup_path(&config.database)
                .to_string_lossy()
                .into_owned(),
        };

        let args = dump_args(config, input.format, &output_file);
        info!(file = %output_file, format = ?input.format, "Starting backup");
        run_command(
            &self.tools.pg_dump,
            &args,
            &client_env(config),
            self.tools.timeout,
        )
        .await?;

        let size = file_size(&output_file).await;
        info!(file = %output_file, size = ?size, "Backup finished");
        Ok(BackupOutput {
            message: "Database backup created successfully".to_string(),
            backup_file: output_file,
            size,
        })
    }

    pub async fn restore_database(
        &self,
        input: RestoreInput,
    ) -> DbResult<MaintenanceMessageOutput> {
        if input.backup_file.trim().is_empty() {
            return Err(DbError::validation("backup_file must not be empty"));
        }
        let config = self.config();
        let args = restore_args(config, &input.backup_file, input.clean);
        info!(file = %input.backup_file, clean = input.clean, "Starting restore");
        run_command(
            &self.tools.pg_restore,
            &args,
            &client_env(config),
            self.tools.timeout,
        )
        .await?;
        Ok(MaintenanceMessageOutput {
            message: "Database restored successfully".to_string(),
        })
    }

    /// Terminate every session on the target database except this one.
    pub async fn kill_connections(
        &self,
        input: KillConnectionsInput,
    ) -> DbResult<KillConnectionsOutput> {
        let database = input
            .target_database
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.config().database.clone());
        let rows = self
            .runner
            .fetch(TERMINATE_SQL, &[database.as_str().into()])
            .await?;
        let terminated_count = count_terminated(&rows);
        info!(database = %database, terminated_count, "Terminated sessions");
        Ok(KillConnectionsOutput {
            message: format!("Terminated {terminated_count} connections to {database}"),
            terminated_count,
        })
    }

    pub async fn get_active_connections(
        &self,
        _input: NoArguments,
    ) -> DbResult<ActiveConnectionsOutput> {
        let connections = self.runner.fetch(ACTIVE_CONNECTIONS_SQL, &[]).await?;
        let connection_count = connections.len();
        Ok(ActiveConnectionsOutput {
            connections,
            connection_count,
        })
    }

    pub async fn test_connection(&self, _input: NoArguments) -> DbResult<ConnectionTestOutput> {
        let rows = self.runner.fetch(CONNECTION_INFO_SQL, &[]).await?;
        let config = self.config();
        Ok(ConnectionTestOutput {
            status: "connected",
            version: first_string(&rows, "version"),
            database: first_string(&rows, "database"),
            user: first_string(&rows, "user"),
            host: config.host.clone(),
            port: config.port,
            pool: self.runner.pool().status().await,
        })
    }
}
