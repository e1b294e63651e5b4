//! External command execution
//!
//! Every hub and rpm call goes through [`run`]: the child is killed when
//! its deadline passes, and failures carry the captured output.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::error::RemoteError;

/// Run `command` to completion and return its stdout
///
/// `display` is the command line used in logs and errors.
pub async fn run(
    mut command: Command,
    display: &str,
    deadline: Duration,
) -> Result<String, RemoteError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let command_line = display;
    tracing::debug!("Running: {command_line}");
    let output = match timeout(deadline, command.output()).await {
        Err(_) => {
            return Err(RemoteError::Timeout {
                command: display.to_string(),
                seconds: deadline.as_secs(),
            })
        }
        Ok(Err(e)) => {
            return Err(RemoteError::Spawn {
                command: display.to_string(),
                error: e.to_string(),
            })
        }
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(RemoteError::CommandFailed {
            command: display.to_string(),
            code: output.status.code(),
            stderr: if stderr.is_empty() {
                stdout.trim().to_string()
            } else {
                stderr
            },
        });
    }
    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run(sh("echo hello"), "echo", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_reports_exit_code_and_stderr() {
        let err = run(sh("echo oops >&2; exit 3"), "fail", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RemoteError::CommandFailed {
                command: "fail".to_string(),
                code: Some(3),
                stderr: "oops".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_run_falls_back_to_stdout_for_diagnostics() {
        let err = run(sh("echo GenericError; exit 1"), "koji", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GenericError"));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let err = run(sh("sleep 5"), "sleep", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let command = Command::new("/nonexistent/kojichain-test-binary");
        let err = run(command, "missing", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Spawn { .. }));
    }
}
