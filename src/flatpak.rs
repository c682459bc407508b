/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::flatpak
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Flatpak source adapter: enumerate updatable applications
    from configured remotes and install selected records.

  Security / Safety Notes:
    Flatpak operations run with user privileges only; no
    elevation is attempted.

  Dependencies:
    CommandRunner seam for flatpak invocations.

  Operational Scope:
    Registered with the update aggregator as the sandboxed-app
    source. Records carry the reverse-DNS application id as
    package_id and the human-readable title as name.

  Revision History:
    2025-08-29 COD  Crafted flatpak integration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Availability probe before any remote interaction
    - Tab-separated parsing, short rows dropped
    - Best-effort enrichment with placeholder degradation
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::logger::Logger;
use crate::proc::{CommandRequest, CommandRunner};
use crate::record::{SourceId, UpdateRecord, NO_DESCRIPTION, UNKNOWN};
use crate::source::UpdateSource;

/// Adapter for the sandboxed-application package manager.
pub struct FlatpakSource {
    runner: Arc<dyn CommandRunner>,
    logger: Arc<Logger>,
    query_deadline: Duration,
    install_deadline: Duration,
}

impl FlatpakSource {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        logger: Arc<Logger>,
        query_deadline: Duration,
        install_deadline: Duration,
    ) -> Self {
        Self {
            runner,
            logger,
            query_deadline,
            install_deadline,
        }
    }

    async fn run_flatpak(&self, args: &[&str], deadline: Duration) -> Option<String> {
        let request = CommandRequest::new("flatpak", args.to_vec(), deadline);
        let display = request.display();
        match self.runner.run(request).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                self.logger.debug(
                    "FLATPAK",
                    format!("`{display}` exited {}: {}", output.status, output.stderr),
                );
                None
            }
            Err(err) => {
                self.logger
                    .debug("FLATPAK", format!("`{display}` failed: {err}"));
                None
            }
        }
    }

    async fn is_available(&self) -> bool {
        self.run_flatpak(&["--version"], self.query_deadline)
            .await
            .is_some()
    }

    async fn current_version(&self, app_id: &str) -> String {
        if let Some(stdout) = self
            .run_flatpak(
                &["list", "--app", "--columns=application,version"],
                self.query_deadline,
            )
            .await
        {
            for line in stdout.lines() {
                let parts: Vec<&str> = line.split('\t').collect();
                if parts.len() >= 2 && parts[0] == app_id {
                    return parts[1].to_string();
                }
            }
        }
        UNKNOWN.to_string()
    }

    async fn app_description(&self, app_id: &str) -> String {
        if let Some(stdout) = self.run_flatpak(&["info", app_id], self.query_deadline).await {
            for line in stdout.lines() {
                if let Some(rest) = line.strip_prefix("Description:") {
                    return rest.trim().to_string();
                }
            }
        }
        NO_DESCRIPTION.to_string()
    }

    async fn app_size(&self, app_id: &str) -> String {
        if let Some(stdout) = self.run_flatpak(&["info", app_id], self.query_deadline).await {
            for line in stdout.lines() {
                if line.contains("Size:") {
                    if let Some((_, value)) = line.split_once(':') {
                        return value.trim().to_string();
                    }
                }
            }
        }
        UNKNOWN.to_string()
    }
}

#[async_trait]
impl UpdateSource for FlatpakSource {
    fn id(&self) -> SourceId {
        SourceId::Flatpak
    }

    async fn fetch_updates(&self) -> Vec<UpdateRecord> {
        self.logger.info("FLATPAK", "Checking for Flatpak updates...");

        if !self.is_available().await {
            self.logger
                .info("FLATPAK", "Flatpak is not installed or available");
            return Vec::new();
        }

        // Appstream refresh is mandatory for this source; without it
        // the remote listing is not trustworthy.
        if self
            .run_flatpak(&["update", "--appstream"], self.query_deadline)
            .await
            .is_none()
        {
            self.logger
                .error("FLATPAK", "Appstream refresh failed; skipping source");
            return Vec::new();
        }

        let Some(stdout) = self
            .run_flatpak(
                &[
                    "remote-ls",
                    "--updates",
                    "--columns=application,name,version,branch,origin",
                ],
                self.query_deadline,
            )
            .await
        else {
            return Vec::new();
        };

        let mut updates = Vec::new();
        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split('\t').collect();
            // Rows with fewer than five columns are dropped.
            if parts.len() < 5 {
                continue;
            }
            let app_id = parts[0].to_string();
            let app_name = parts[1].to_string();
            let version = parts[2].to_string();
            let branch = parts[3].to_string();
            let origin = parts[4].to_string();

            let current_version = self.current_version(&app_id).await;
            let description = self.app_description(&app_id).await;
            let size = self.app_size(&app_id).await;

            updates.push(UpdateRecord::flatpak(
                app_name,
                app_id,
                current_version,
                version,
                description,
                size,
                branch,
                origin,
            ));
        }

        self.logger
            .info("FLATPAK", format!("Found {} Flatpak updates", updates.len()));
        updates
    }

    async fn install(&self, record: &UpdateRecord) -> bool {
        self.logger.info(
            "FLATPAK",
            format!("Installing Flatpak app: {}", record.name),
        );

        // Commands take the application id, never the display name.
        let request = CommandRequest::new(
            "flatpak",
            vec!["update".to_string(), "-y".to_string(), record.package_id.clone()],
            self.install_deadline,
        );
        match self.runner.run(request).await {
            Ok(output) if output.success() => {
                self.logger.info(
                    "FLATPAK",
                    format!("Successfully updated {} ({})", record.name, record.package_id),
                );
                true
            }
            Ok(output) => {
                self.logger.error(
                    "FLATPAK",
                    format!(
                        "Failed to update {} ({}): {}",
                        record.name, record.package_id, output.stderr
                    ),
                );
                false
            }
            Err(err) => {
                self.logger.error(
                    "FLATPAK",
                    format!(
                        "Error installing Flatpak update {} ({}): {err}",
                        record.name, record.package_id
                    ),
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SynupError;
    use crate::proc::test_support::{Scripted, ScriptedRunner};

    fn quiet_logger() -> Arc<Logger> {
        Arc::new(Logger::new(None, false).expect("logger"))
    }

    fn source(runner: Arc<ScriptedRunner>) -> FlatpakSource {
        FlatpakSource::new(
            runner,
            quiet_logger(),
            Duration::from_secs(120),
            Duration::from_secs(600),
        )
    }

    const REMOTE_LS: &str = "org.gimp.GIMP\tGNU Image Manipulation Program\t2.10.38\tstable\tflathub\n\
        org.videolan.VLC\tVLC\t3.0.21\tstable\tflathub\n\
        org.broken.Row\tIncomplete\t1.0\n";

    #[tokio::test]
    async fn fetch_parses_tab_rows_and_drops_short_ones() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, "Flatpak 1.14.6"), // --version
            ScriptedRunner::ok(0, ""),               // update --appstream
            ScriptedRunner::ok(0, REMOTE_LS),        // remote-ls
            // GIMP enrichment: list, info, info
            ScriptedRunner::ok(0, "org.gimp.GIMP\t2.10.36\norg.videolan.VLC\t3.0.20"),
            ScriptedRunner::ok(0, "Description: Create images and edit photographs\nSize: 245 MB"),
            ScriptedRunner::ok(0, "Description: Create images and edit photographs\n  Installed Size: 245 MB"),
            // VLC enrichment
            ScriptedRunner::ok(0, "org.gimp.GIMP\t2.10.36\norg.videolan.VLC\t3.0.20"),
            ScriptedRunner::ok(0, "no description here"),
            ScriptedRunner::ok(0, "nothing useful"),
        ]));
        let updates = source(runner).fetch_updates().await;

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].name, "GNU Image Manipulation Program");
        assert_eq!(updates[0].package_id, "org.gimp.GIMP");
        assert_eq!(updates[0].current_version, "2.10.36");
        assert_eq!(updates[0].new_version, "2.10.38");
        assert_eq!(updates[0].branch.as_deref(), Some("stable"));
        assert_eq!(updates[0].origin.as_deref(), Some("flathub"));
        assert_eq!(updates[0].size, "245 MB");
        assert!(!updates[0].is_security);
        assert_eq!(updates[1].description, NO_DESCRIPTION);
        assert_eq!(updates[1].size, UNKNOWN);
    }

    #[tokio::test]
    async fn missing_tool_yields_empty_list() {
        let runner = Arc::new(ScriptedRunner::new(vec![Scripted::Error(
            SynupError::CommandMissing {
                command: "flatpak".into(),
            },
        )]));
        assert!(source(runner).fetch_updates().await.is_empty());
    }

    #[tokio::test]
    async fn failed_appstream_refresh_skips_the_source() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, "Flatpak 1.14.6"),
            ScriptedRunner::fail(1, "No remote refs found"),
        ]));
        assert!(source(runner).fetch_updates().await.is_empty());
    }

    #[tokio::test]
    async fn fetch_never_raises_on_garbage_output() {
        let runner = Arc::new(ScriptedRunner::new(vec![
            ScriptedRunner::ok(0, "Flatpak 1.14.6"),
            ScriptedRunner::ok(0, ""),
            ScriptedRunner::ok(0, "\u{0}\u{fffd} binary sludge"),
        ]));
        assert!(source(runner).fetch_updates().await.is_empty());
    }

    #[tokio::test]
    async fn install_uses_the_application_id() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::ok(0, "Updated")]));
        let record = UpdateRecord::flatpak(
            "GNU Image Manipulation Program".into(),
            "org.gimp.GIMP".into(),
            "2.10.36".into(),
            "2.10.38".into(),
            NO_DESCRIPTION.into(),
            "245 MB".into(),
            "stable".into(),
            "flathub".into(),
        );
        assert!(source(runner.clone()).install(&record).await);
        assert_eq!(runner.recorded(), vec!["flatpak update -y org.gimp.GIMP"]);
    }

    #[tokio::test]
    async fn failed_install_returns_false() {
        let runner = Arc::new(ScriptedRunner::new(vec![ScriptedRunner::fail(
            1,
            "error: org.gimp.GIMP not installed",
        )]));
        let record = UpdateRecord::flatpak(
            "GIMP".into(),
            "org.gimp.GIMP".into(),
            "2.10.36".into(),
            "2.10.38".into(),
            NO_DESCRIPTION.into(),
            UNKNOWN.into(),
            "stable".into(),
            "flathub".into(),
        );
        assert!(!source(runner).install(&record).await);
    }
}
