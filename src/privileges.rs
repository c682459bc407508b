/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::privileges
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Privilege broker facade: selects between the PolicyKit
    broker path and the interactive sudo path, with per-call
    fallback from the former to the latter.

  Security / Safety Notes:
    Strategy selection happens once at construction from
    operator configuration and environment capability; a broker
    failure downgrades one call, never the whole session.

  Dependencies:
    polkit and auth modules; CommandRunner/AuthPrompt seams.

  Operational Scope:
    Owned by the apt adapter for cache refreshes and installs.
    The flatpak adapter needs no elevation (per-user installs).

  Revision History:
    2025-08-29 COD  Authored elevation strategy facade.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Two mutually exclusive strategies, explicit selection
    - Per-call degradation, no silent permanent downgrade
    - Credential lifecycle delegated to one owner
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthPrompt, SudoAuthenticator};
use crate::config::SynupConfig;
use crate::logger::Logger;
use crate::polkit::PolicyKitBroker;
use crate::proc::CommandRunner;

/// Unified entry point for privileged apt operations.
pub struct PrivilegeBroker {
    policykit: Option<PolicyKitBroker>,
    authenticator: SudoAuthenticator,
    policykit_for_cache: bool,
    policykit_for_install: bool,
    logger: Arc<Logger>,
}

impl PrivilegeBroker {
    /// `broker_available` is the pkexec capability probe result,
    /// evaluated once by the caller at startup.
    pub fn new(
        config: &SynupConfig,
        broker_available: bool,
        runner: Arc<dyn CommandRunner>,
        prompt: Arc<dyn AuthPrompt>,
        logger: Arc<Logger>,
        assume_root: bool,
    ) -> Self {
        let use_policykit = config.auth.use_policykit && broker_available;
        let policykit = use_policykit.then(|| {
            PolicyKitBroker::new(
                runner.clone(),
                logger.clone(),
                Duration::from_secs(config.timeouts.privileged_secs),
            )
        });
        let ttl = match config.auth.credential_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let authenticator = SudoAuthenticator::new(
            runner,
            prompt,
            logger.clone(),
            ttl,
            Duration::from_secs(config.timeouts.auth_secs),
            Duration::from_secs(config.timeouts.install_secs),
            assume_root,
        );
        Self {
            policykit,
            authenticator,
            policykit_for_cache: config.auth.policykit_for_cache,
            policykit_for_install: config.auth.policykit_for_install,
            logger,
        }
    }

    /// Refresh the apt package cache with elevation.
    pub async fn update_cache(&self) -> (bool, String) {
        if let Some(policykit) = self.policykit.as_ref().filter(|_| self.policykit_for_cache) {
            let (ok, output) = policykit.update_package_cache().await;
            if ok {
                return (true, output);
            }
            self.logger.warn(
                "ELEVATE",
                format!("PolicyKit cache refresh failed, trying sudo: {output}"),
            );
        }
        self.run_privileged(&["apt".into(), "update".into()]).await
    }

    /// Install the given package specs with elevation.
    pub async fn install_packages(&self, specs: &[String]) -> (bool, String) {
        if let Some(policykit) = self
            .policykit
            .as_ref()
            .filter(|_| self.policykit_for_install)
        {
            let (ok, output) = policykit.install_packages(specs).await;
            if ok {
                return (true, output);
            }
            self.logger.warn(
                "ELEVATE",
                format!("PolicyKit install failed, trying sudo: {output}"),
            );
        }
        let mut command: Vec<String> = vec!["apt".into(), "install".into(), "-y".into()];
        command.extend(specs.iter().cloned());
        self.run_privileged(&command).await
    }

    /// Run an arbitrary command through the interactive path.
    pub async fn run_privileged(&self, command: &[String]) -> (bool, String) {
        self.authenticator.run_sudo_command(command).await
    }

    /// Drop any cached interactive credential.
    pub fn clear_credentials(&self) {
        self.authenticator.clear_credentials();
    }
}
