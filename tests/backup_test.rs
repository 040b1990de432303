//! Backup and restore against fake pg_dump / pg_restore executables.
#![cfg(unix)]

use pg_mcp_server::config::{ExternalTools, PoolConfig};
use pg_mcp_server::db::ConnectionPool;
use pg_mcp_server::gateway::OperationGateway;
use serde_json::{Map, Value as JsonValue, json};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn gateway(pg_dump: &Path, pg_restore: &Path, timeout: Duration) -> OperationGateway {
    let config = PoolConfig {
        database: "shop".to_string(),
        password: "s3cret".to_string(),
        ..PoolConfig::default()
    };
    let pool = Arc::new(ConnectionPool::new(config).unwrap());
    let tools = ExternalTools {
        pg_dump: pg_dump.to_string_lossy().into_owned(),
        pg_restore: pg_restore.to_string_lossy().into_owned(),
        timeout,
    };
    OperationGateway::new(pool, tools)
}

fn args(value: JsonValue) -> Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[tokio::test]
async fn test_backup_writes_file_and_reports_size() {
    let dir = tempfile::tempdir().unwrap();
    // Writes its arguments and the password it saw to the -f target.
    let dump = script(
        dir.path(),
        "pg_dump",
        r#"for last; do :; done
echo "$@ pw=$PGPASSWORD" > "$last""#,
    );
    let restore = script(dir.path(), "pg_restore", "exit 0");
    let gateway = gateway(&dump, &restore, Duration::from_secs(10));

    let target = dir.path().join("shop.sql");
    let env = gateway
        .invoke(
            "backup_database",
            args(json!({"output_file": target.to_string_lossy(), "format": "plain"})),
        )
        .await;

    assert!(env.success, "{:?}", env.error);
    assert_eq!(env.message.as_deref(), Some("Database backup created successfully"));
    assert_eq!(env.get("backup_file"), Some(&json!(target.to_string_lossy())));
    assert!(env.get("size").and_then(JsonValue::as_str).is_some());

    let written = std::fs::read_to_string(&target).unwrap();
    assert!(written.contains("-d shop"));
    assert!(written.contains("-Fp"));
    assert!(written.contains("pw=s3cret"));
}

#[tokio::test]
async fn test_backup_failure_carries_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let dump = script(
        dir.path(),
        "pg_dump",
        "echo 'connection to server failed' >&2; exit 1",
    );
    let restore = script(dir.path(), "pg_restore", "exit 0");
    let gateway = gateway(&dump, &restore, Duration::from_secs(10));

    let target = dir.path().join("out.dump");
    let env = gateway
        .invoke(
            "backup_database",
            args(json!({"output_file": target.to_string_lossy()})),
        )
        .await;

    assert!(!env.success);
    assert!(env.error.unwrap().ends_with("failed: connection to server failed"));
}

#[tokio::test]
async fn test_restore_passes_clean_flag() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("restore.log");
    let dump = script(dir.path(), "pg_dump", "exit 0");
    let restore = script(
        dir.path(),
        "pg_restore",
        &format!("echo \"$@\" > '{}'", log.display()),
    );
    let gateway = gateway(&dump, &restore, Duration::from_secs(10));

    let env = gateway
        .invoke(
            "restore_database",
            args(json!({"backup_file": "/backups/shop.dump", "clean": true})),
        )
        .await;

    assert!(env.success, "{:?}", env.error);
    assert_eq!(env.message.as_deref(), Some("Database restored successfully"));
    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(logged.contains("--clean"));
    assert!(logged.trim_end().ends_with("/backups/shop.dump"));
}

#[tokio::test]
async fn test_restore_timeout_is_a_failure_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let dump = script(dir.path(), "pg_dump", "exit 0");
    let restore = script(dir.path(), "pg_restore", "sleep 30");
    let gateway = gateway(&dump, &restore, Duration::from_secs(1));

    let started = std::time::Instant::now();
    let env = gateway
        .invoke("restore_database", args(json!({"backup_file": "x.dump"})))
        .await;

    assert!(!env.success);
    assert!(env.error.unwrap().contains("timed out after 1s"));
    assert!(started.elapsed() < Duration::from_secs(10));
}
