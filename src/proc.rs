/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::proc
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Single seam for every external command Syn-Up-Core issues:
    a CommandRunner trait with a tokio-backed system runner.

  Security / Safety Notes:
    Stdin payloads (elevation secrets) are written once and
    never echoed into errors or logs. Timed-out children are
    killed on drop.

  Dependencies:
    tokio::process for async execution, tokio::time for fixed
    deadlines, async-trait for the runner seam.

  Operational Scope:
    Used by both source adapters and the privilege broker; test
    suites substitute scripted runners through the same trait.

  Revision History:
    2025-08-29 COD  Crafted command execution seam.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Bounded waits treated as definite failures
    - Reusable helpers for external command diagnostics
============================================================*/

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Result, SynupError};

/// One external command invocation with a fixed deadline.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new<I, S>(program: &str, args: I, deadline: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            timeout: deadline,
        }
    }

    /// Attach a stdin payload, written verbatim before waiting.
    pub fn with_stdin(mut self, payload: String) -> Self {
        self.stdin = Some(payload);
        self
    }

    /// Render `program arg…` for diagnostics.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a finished command. A non-zero status is data,
/// not an error; callers decide how to degrade.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Seam for issuing external commands; substituted in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: CommandRequest) -> Result<CommandOutput>;
}

/// Production runner backed by tokio::process.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, request: CommandRequest) -> Result<CommandOutput> {
        let mut command = Command::new(&request.program);
        command
            .args(&request.args)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|err| map_spawn_error(err, &request.program))?;

        if let Some(payload) = &request.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(payload.as_bytes()).await.map_err(|err| {
                    SynupError::Runtime(format!(
                        "Failed to write stdin for {}: {err}",
                        request.program
                    ))
                })?;
                // Dropping the handle closes the pipe.
            }
        }

        let seconds = request.timeout.as_secs();
        let output = match timeout(request.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|err| {
                SynupError::Runtime(format!("Failed to wait on {}: {err}", request.program))
            })?,
            Err(_) => {
                return Err(SynupError::Timeout {
                    command: request.display(),
                    seconds,
                })
            }
        };

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn map_spawn_error(err: io::Error, command: &str) -> SynupError {
    if err.kind() == io::ErrorKind::NotFound {
        SynupError::CommandMissing {
            command: command.into(),
        }
    } else {
        SynupError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_display_joins_program_and_args() {
        let request =
            CommandRequest::new("apt", ["list", "--upgradable"], Duration::from_secs(5));
        assert_eq!(request.display(), "apt list --upgradable");
        assert!(request.stdin.is_none());
    }

    #[tokio::test]
    async fn missing_program_maps_to_command_missing() {
        let runner = SystemRunner;
        let request = CommandRequest::new(
            "synup-definitely-not-a-real-binary",
            Vec::<String>::new(),
            Duration::from_secs(5),
        );
        let err = runner.run(request).await.unwrap_err();
        assert!(matches!(err, SynupError::CommandMissing { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_is_data_not_error() {
        let runner = SystemRunner;
        let request = CommandRequest::new("false", Vec::<String>::new(), Duration::from_secs(5));
        let output = runner.run(request).await.expect("ran");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn stdin_payload_reaches_the_child() {
        let runner = SystemRunner;
        let request = CommandRequest::new("cat", Vec::<String>::new(), Duration::from_secs(5))
            .with_stdin("sekrit\n".to_string());
        let output = runner.run(request).await.expect("ran");
        assert_eq!(output.stdout, "sekrit\n");
    }

    #[tokio::test]
    async fn elapsed_deadline_fails_closed() {
        let runner = SystemRunner;
        let request = CommandRequest::new("sleep", ["5"], Duration::from_millis(50));
        let err = runner.run(request).await.unwrap_err();
        assert!(matches!(err, SynupError::Timeout { .. }));
    }
}
