//! External executable invocation with a hard timeout.
//!
//! Used by the backup and restore operations to run `pg_dump`/`pg_restore`.

use crate::error::{DbError, DbResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Output from a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` with `args`, inheriting the environment plus `env`.
///
/// Succeeds only on a zero exit status. A non-zero exit reports the trimmed
/// stderr (or the exit status when stderr is empty). When `timeout` elapses the
/// child is killed and the call fails.
pub async fn run_command(
    program: &str,
    args: &[String],
    env: &[(&str, String)],
    timeout: Duration,
) -> DbResult<ProcessOutput> {
    debug!(program = %program, args = ?args, "Spawning process");

    let child = Command::new(program)
        .args(args)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DbError::subprocess(program, format!("failed to start: {e}")))?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(DbError::subprocess(program, format!("I/O error: {e}"))),
        Err(_) => {
            warn!(program = %program, timeout_secs = timeout.as_secs(), "Process timed out");
            return Err(DbError::subprocess(
                program,
                format!("timed out after {}s", timeout.as_secs()),
            ));
        }
    };

    let result = ProcessOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !output.status.success() {
        let stderr = result.stderr.trim();
        let message = if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr.to_string()
        };
        return Err(DbError::subprocess(program, message));
    }

    Ok(result)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    fn script(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_success_captures_stdout_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "ok.sh", r#"echo "$1 $PGPASSWORD""#);

        let output = run_command(
            path.to_str().unwrap(),
            &["hello".to_string()],
            &[("PGPASSWORD", "s3cret".to_string())],
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert_eq!(output.status, 0);
        assert_eq!(output.stdout.trim(), "hello s3cret");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "fail.sh", "echo 'database \"nope\" does not exist' >&2\nexit 1");

        let err = run_command(path.to_str().unwrap(), &[], &[], Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Subprocess { .. }));
        assert!(err.to_string().contains("database \"nope\" does not exist"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_stderr_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "quiet.sh", "exit 3");

        let err = run_command(path.to_str().unwrap(), &[], &[], Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "slow.sh", "sleep 30");

        let start = std::time::Instant::now();
        let err = run_command(path.to_str().unwrap(), &[], &[], Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run_command(
            "/nonexistent/pg_dump_missing",
            &[],
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
