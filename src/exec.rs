//! Execution guard — the single path through which handlers run host
//! commands.
//!
//! The guard runs one short-lived command, captures both output streams as
//! trimmed text, and reports the exit code as data. It never turns a
//! non-zero exit into an error on its own; the calling handler applies an
//! [`ExitPolicy`]. Allow-listing is likewise the caller's concern (see
//! `validate`), so the same guard serves restricted tool invocations and
//! unrestricted read-only resource probes.
//!
//! Every call carries a bounded wait. A command that outlives the bound is
//! killed and reported as [`ServerError::Timeout`].

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::ServerError;

/// Default bounded wait for guarded commands, in seconds.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

/// Captured result of one guarded command invocation.
///
/// `stdout` and `stderr` are trimmed of leading/trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// How a handler interprets a non-zero exit from the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitPolicy {
    /// Non-zero exit with non-empty stderr is an execution error; non-zero
    /// exit with empty stderr returns stdout as-is. Some query commands
    /// signal "no results" through the exit code alone.
    LenientOnEmptyStderr,
    /// Any non-zero exit is an execution error. If stderr is empty the
    /// exit code itself becomes the diagnostic.
    Strict,
}

impl CommandOutput {
    /// Apply an exit policy, producing the payload or an `Execution` error.
    pub fn into_payload(self, policy: ExitPolicy) -> Result<String, ServerError> {
        if self.exit_code == 0 {
            return Ok(self.stdout);
        }
        match policy {
            ExitPolicy::LenientOnEmptyStderr => {
                if self.stderr.is_empty() {
                    Ok(self.stdout)
                } else {
                    Err(ServerError::Execution {
                        stderr: self.stderr,
                    })
                }
            }
            ExitPolicy::Strict => {
                let stderr = if self.stderr.is_empty() {
                    format!("command exited with status {}", self.exit_code)
                } else {
                    self.stderr
                };
                Err(ServerError::Execution { stderr })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Runs external commands with captured output and a bounded wait.
///
/// Holds no state between calls; cloning is cheap and the runner is shared
/// freely across sessions.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
        }
    }
}

impl CommandRunner {
    /// Create a runner with the default bounded wait.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the bounded wait applied to every invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `command` with `args`, capturing both streams.
    ///
    /// # Errors
    ///
    /// * `Execution` if the command could not be spawned (missing binary,
    ///   permission denied).
    /// * `Timeout` if the command outlives the bounded wait. The child is
    ///   killed on expiry.
    pub async fn run(&self, command: &str, args: &[String]) -> Result<CommandOutput, ServerError> {
        log::debug!("exec: {} {}", command, args.join(" "));

        let child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ServerError::Execution {
                stderr: format!("failed to start '{}': {}", command, e),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ServerError::Execution {
                stderr: format!("failed to collect output of '{}': {}", command, e),
            })?,
            Err(_) => {
                return Err(ServerError::Timeout {
                    command: command.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if exit_code != 0 {
            log::debug!("exec: {} exited {} (stderr: {})", command, exit_code, stderr);
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// Run a probe command, flattening any failure to a fallback string.
    ///
    /// Prompt handlers gather several independent snapshots; one missing
    /// probe should not sink the whole conversation template.
    pub async fn run_or(&self, command: &str, args: &[String], fallback: &str) -> String {
        match self.run(command, args).await {
            Ok(output) if !output.stdout.is_empty() => output.stdout,
            _ => fallback.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_captures_trimmed_stdout() {
        let runner = CommandRunner::new();
        let out = runner.run("echo", &args(&["X"])).await.unwrap();
        assert_eq!(out.stdout, "X");
        assert_eq!(out.stderr, "");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_captures_stderr_and_exit_code() {
        let runner = CommandRunner::new();
        let out = runner
            .run("sh", &args(&["-c", "echo oops >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "");
        assert_eq!(out.stderr, "oops");
        assert_eq!(out.exit_code, 3);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_execution_error() {
        let runner = CommandRunner::new();
        let err = runner
            .run("definitely-not-a-real-binary-7d3f", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution");
    }

    #[tokio::test]
    async fn test_timeout_kills_and_reports() {
        let runner = CommandRunner::new().with_timeout(Duration::from_millis(100));
        let err = runner.run("sleep", &args(&["5"])).await.unwrap_err();
        match err {
            ServerError::Timeout { command, .. } => assert_eq!(command, "sleep"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_or_falls_back_on_failure() {
        let runner = CommandRunner::new();
        let text = runner
            .run_or("definitely-not-a-real-binary-7d3f", &[], "(unavailable)")
            .await;
        assert_eq!(text, "(unavailable)");
    }

    #[test]
    fn test_lenient_policy_passes_empty_stderr_through() {
        let out = CommandOutput {
            stdout: "partial".into(),
            stderr: String::new(),
            exit_code: 1,
        };
        assert_eq!(
            out.into_payload(ExitPolicy::LenientOnEmptyStderr).unwrap(),
            "partial"
        );
    }

    #[test]
    fn test_lenient_policy_surfaces_stderr() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "Unit sshd.service not found.".into(),
            exit_code: 1,
        };
        let err = out
            .into_payload(ExitPolicy::LenientOnEmptyStderr)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unit sshd.service not found.");
    }

    #[test]
    fn test_strict_policy_rejects_silent_failures() {
        let out = CommandOutput {
            stdout: "stale".into(),
            stderr: String::new(),
            exit_code: 2,
        };
        let err = out.into_payload(ExitPolicy::Strict).unwrap_err();
        assert!(err.to_string().contains("status 2"));
    }
}
