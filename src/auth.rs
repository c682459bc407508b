/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::auth
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Interactive elevation path: obtain an administrator secret
    from the presentation layer, verify it against sudo, and
    cache it for subsequent privileged commands.

  Security / Safety Notes:
    The secret lives in process memory only, is piped to sudo
    via stdin, never appears in logs or errors, and expires
    after a configurable trust window.

  Dependencies:
    CommandRunner seam for sudo invocations; AuthPrompt seam
    for the modal secret dialog.

  Operational Scope:
    Fallback strategy of the privilege broker when PolicyKit is
    disabled or the broker call fails.

  Revision History:
    2025-08-29 COD  Implemented sudo authentication path.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Verification failures cache nothing
    - Bounded waits on every sudo interaction
    - Explicit credential lifetime instead of unbounded trust
============================================================*/

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::logger::Logger;
use crate::proc::{CommandRequest, CommandRunner};

/// Presentation-layer seam for the modal secret dialog.
pub trait AuthPrompt: Send + Sync {
    /// Ask the user for the administrator secret. None means the
    /// dialog was cancelled.
    fn request_secret(&self, message: &str) -> Option<String>;

    /// Surface an authentication failure to the user.
    fn notify_failure(&self, message: &str);
}

#[derive(Default)]
struct CredentialState {
    secret: Option<String>,
    authenticated: bool,
    verified_at: Option<Instant>,
}

/// Handles sudo authentication with a session-scoped credential cache.
pub struct SudoAuthenticator {
    runner: Arc<dyn CommandRunner>,
    prompt: Arc<dyn AuthPrompt>,
    logger: Arc<Logger>,
    /// Trust window for a verified secret; None trusts it for the
    /// whole session.
    ttl: Option<Duration>,
    verify_deadline: Duration,
    command_deadline: Duration,
    /// Already elevated; sudo is skipped entirely.
    assume_root: bool,
    state: Mutex<CredentialState>,
}

impl SudoAuthenticator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        prompt: Arc<dyn AuthPrompt>,
        logger: Arc<Logger>,
        ttl: Option<Duration>,
        verify_deadline: Duration,
        command_deadline: Duration,
        assume_root: bool,
    ) -> Self {
        Self {
            runner,
            prompt,
            logger,
            ttl,
            verify_deadline,
            command_deadline,
            assume_root,
            state: Mutex::new(CredentialState::default()),
        }
    }

    /// Prompt for and verify the administrator secret. On success the
    /// secret is cached for the trust window; a wrong secret caches
    /// nothing and notifies the user once, with no retry loop.
    pub async fn authenticate(&self, message: &str) -> bool {
        let Some(secret) = self.prompt.request_secret(message) else {
            self.logger.info("AUTH", "Authentication dialog cancelled");
            return false;
        };

        let request = CommandRequest::new("sudo", ["-S", "true"], self.verify_deadline)
            .with_stdin(format!("{secret}\n"));
        match self.runner.run(request).await {
            Ok(output) if output.success() => {
                self.logger.info("AUTH", "Sudo authentication successful");
                let mut state = self.state.lock().expect("credential lock");
                state.secret = Some(secret);
                state.authenticated = true;
                state.verified_at = Some(Instant::now());
                true
            }
            Ok(_) => {
                self.logger.warn("AUTH", "Sudo authentication failed");
                self.prompt
                    .notify_failure("The password you entered is incorrect.");
                false
            }
            Err(err) => {
                self.logger
                    .error("AUTH", format!("Sudo verification error: {err}"));
                false
            }
        }
    }

    /// Return the cached secret if it is still inside the trust window,
    /// clearing it when expired.
    fn cached_secret(&self) -> Option<String> {
        let mut state = self.state.lock().expect("credential lock");
        if !state.authenticated {
            return None;
        }
        if let (Some(ttl), Some(verified_at)) = (self.ttl, state.verified_at) {
            if verified_at.elapsed() >= ttl {
                self.logger
                    .info("AUTH", "Cached credential expired; re-authentication required");
                *state = CredentialState::default();
                return None;
            }
        }
        state.secret.clone()
    }

    /// Run a command with elevated rights using the cached secret,
    /// prompting first when none is held.
    pub async fn run_sudo_command(&self, command: &[String]) -> (bool, String) {
        if self.assume_root {
            let request = match command.split_first() {
                Some((program, args)) => {
                    CommandRequest::new(program, args.to_vec(), self.command_deadline)
                }
                None => return (false, "Empty command".to_string()),
            };
            return self.execute(request).await;
        }

        let secret = match self.cached_secret() {
            Some(secret) => secret,
            None => {
                if !self
                    .authenticate("Administrator privileges required for this operation")
                    .await
                {
                    return (false, "Authentication failed".to_string());
                }
                match self.cached_secret() {
                    Some(secret) => secret,
                    None => return (false, "Authentication failed".to_string()),
                }
            }
        };

        let mut args: Vec<String> = vec!["-S".into()];
        args.extend(command.iter().cloned());
        let request = CommandRequest::new("sudo", args, self.command_deadline)
            .with_stdin(format!("{secret}\n"));
        self.execute(request).await
    }

    async fn execute(&self, request: CommandRequest) -> (bool, String) {
        let display = request.display();
        match self.runner.run(request).await {
            Ok(output) if output.success() => (true, output.stdout),
            Ok(output) => {
                self.logger.warn(
                    "SUDO",
                    format!("`{display}` exited {}: {}", output.status, output.stderr),
                );
                (false, output.stderr)
            }
            Err(err) => {
                self.logger
                    .error("SUDO", format!("`{display}` failed: {err}"));
                (false, err.to_string())
            }
        }
    }

    /// Drop any cached credential immediately.
    pub fn clear_credentials(&self) {
        let mut state = self.state.lock().expect("credential lock");
        *state = CredentialState::default();
    }
}
