/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::polkit
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    PolicyKit broker path: invoke pkexec for the two privileged
    operations Syn-Up performs, and generate the matching
    policy descriptor.

  Security / Safety Notes:
    No secrets are handled here; authentication is delegated to
    the system broker. Commands carry fixed deadlines.

  Dependencies:
    which for the pkexec capability probe.

  Operational Scope:
    Consulted by the privilege broker facade when the operator
    enables the PolicyKit strategy and pkexec is present.

  Revision History:
    2025-08-29 COD  Implemented PolicyKit broker path.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Declarative policy kept in lockstep with invoked actions
    - Broker failures degrade, they never abort the operation
    - Bounded execution for every privileged call
============================================================*/

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, SynupError};
use crate::logger::Logger;
use crate::proc::{CommandRequest, CommandRunner};

/// Action id covering `apt update`; re-authenticates on every use.
pub const ACTION_UPDATE_CACHE: &str = "io.synavera.synup.update-cache";
/// Action id covering `apt install`; authentication is retained.
pub const ACTION_INSTALL_PACKAGES: &str = "io.synavera.synup.install-packages";

/// Probe whether the pkexec broker executable is on PATH.
pub fn pkexec_available() -> bool {
    which::which("pkexec").is_ok()
}

/// Broker-path executor for privileged apt operations.
pub struct PolicyKitBroker {
    runner: Arc<dyn CommandRunner>,
    logger: Arc<Logger>,
    deadline: Duration,
}

impl PolicyKitBroker {
    pub fn new(runner: Arc<dyn CommandRunner>, logger: Arc<Logger>, deadline: Duration) -> Self {
        Self {
            runner,
            logger,
            deadline,
        }
    }

    /// Refresh the apt cache through the broker.
    pub async fn update_package_cache(&self) -> (bool, String) {
        self.run_pkexec(vec!["apt".into(), "update".into()]).await
    }

    /// Install the given package specs through the broker.
    pub async fn install_packages(&self, specs: &[String]) -> (bool, String) {
        let mut args: Vec<String> = vec!["apt".into(), "install".into(), "-y".into()];
        args.extend(specs.iter().cloned());
        self.run_pkexec(args).await
    }

    async fn run_pkexec(&self, args: Vec<String>) -> (bool, String) {
        let request = CommandRequest::new("pkexec", args, self.deadline);
        let display = request.display();
        match self.runner.run(request).await {
            Ok(output) if output.success() => (true, output.stdout),
            Ok(output) => {
                self.logger.warn(
                    "POLKIT",
                    format!("`{display}` exited {}: {}", output.status, output.stderr),
                );
                (false, output.stderr)
            }
            Err(err) => {
                self.logger.warn("POLKIT", format!("`{display}` failed: {err}"));
                (false, err.to_string())
            }
        }
    }
}

/// Render the policy descriptor matching the broker's action ids.
pub fn policy_file_content() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE policyconfig PUBLIC
 "-//freedesktop//DTD PolicyKit Policy Configuration 1.0//EN"
 "http://www.freedesktop.org/standards/PolicyKit/1/policyconfig.dtd">
<policyconfig>

  <vendor>Synavera</vendor>
  <vendor_url>https://github.com/Synavera-Discorporated/Syn-Up</vendor_url>

  <action id="{ACTION_UPDATE_CACHE}">
    <description>Update package cache</description>
    <message>Authentication required to update the package cache</message>
    <icon_name>system-software-update</icon_name>
    <defaults>
      <allow_any>no</allow_any>
      <allow_inactive>no</allow_inactive>
      <allow_active>auth_admin</allow_active>
    </defaults>
    <annotate key="org.freedesktop.policykit.exec.path">/usr/bin/apt</annotate>
    <annotate key="org.freedesktop.policykit.exec.allow_gui">true</annotate>
  </action>

  <action id="{ACTION_INSTALL_PACKAGES}">
    <description>Install or upgrade packages</description>
    <message>Authentication required to install or upgrade packages</message>
    <icon_name>system-software-update</icon_name>
    <defaults>
      <allow_any>no</allow_any>
      <allow_inactive>no</allow_inactive>
      <allow_active>auth_admin_keep</allow_active>
    </defaults>
    <annotate key="org.freedesktop.policykit.exec.path">/usr/bin/apt</annotate>
    <annotate key="org.freedesktop.policykit.exec.allow_gui">true</annotate>
  </action>

</policyconfig>
"#
    )
}

/// Save a copy of the policy descriptor for manual installation.
pub fn setup_policy(target_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(target_dir).map_err(|err| {
        SynupError::Filesystem(format!(
            "Failed to create policy directory {}: {err}",
            target_dir.display()
        ))
    })?;
    let path = target_dir.join("io.synavera.synup.policy");
    std::fs::write(&path, policy_file_content()).map_err(|err| {
        SynupError::Filesystem(format!(
            "Failed to write policy descriptor {}: {err}",
            path.display()
        ))
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::test_support::ScriptedRunner;

    fn quiet_logger() -> Arc<Logger> {
        Arc::new(Logger::new(None, false).expect("logger"))
    }

    #[test]
    fn policy_descriptor_names_both_actions() {
        let content = policy_file_content();
        assert!(content.contains(ACTION_UPDATE_CACHE));
        assert!(content.contains(ACTION_INSTALL_PACKAGES));
        // Installs retain authentication; cache refreshes do not.
        assert!(content.contains("auth_admin_keep"));
    }

    #[test]
    fn setup_policy_writes_descriptor_copy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = setup_policy(dir.path()).expect("setup");
        let body = std::fs::read_to_string(path).expect("readable");
        assert!(body.contains("<vendor>Synavera</vendor>"));
    }

    #[tokio::test]
    async fn cache_refresh_invokes_pkexec_apt_update() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok(0, "Hit: …")]));
        let broker = PolicyKitBroker::new(
            runner.clone(),
            quiet_logger(),
            Duration::from_secs(300),
        );
        let (ok, output) = broker.update_package_cache().await;
        assert!(ok);
        assert_eq!(output, "Hit: …");
        assert_eq!(runner.recorded(), vec!["pkexec apt update"]);
    }

    #[tokio::test]
    async fn install_passes_every_spec_after_the_flag() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok(0, "")]));
        let broker = PolicyKitBroker::new(
            runner.clone(),
            quiet_logger(),
            Duration::from_secs(300),
        );
        let (ok, _) = broker
            .install_packages(&["vim=2:9.1".to_string(), "curl".to_string()])
            .await;
        assert!(ok);
        assert_eq!(
            runner.recorded(),
            vec!["pkexec apt install -y vim=2:9.1 curl"]
        );
    }

    #[tokio::test]
    async fn broker_denial_reports_failure_with_stderr() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::fail(
            126,
            "Error executing command as another user: Not authorized",
        )]));
        let broker = PolicyKitBroker::new(runner, quiet_logger(), Duration::from_secs(300));
        let (ok, output) = broker.update_package_cache().await;
        assert!(!ok);
        assert!(output.contains("Not authorized"));
    }
}
