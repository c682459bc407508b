/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::apt
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    apt source adapter: refresh the package cache, enumerate
    upgradable packages with best-effort enrichment, and
    install selected records with elevation.

  Security / Safety Notes:
    Privileged operations are delegated to the PrivilegeBroker;
    metadata queries run with user rights only.

  Dependencies:
    CommandRunner seam for apt/apt-cache invocations.

  Operational Scope:
    Registered with the update aggregator as the system-package
    source. Every public operation fails open.

  Revision History:
    2025-08-29 COD  Crafted apt integration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Availability over freshness on cache refresh failure
    - Tolerant line-oriented parsing, short lines dropped
    - Degrading-specificity install attempts, bounded at two
============================================================*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::logger::Logger;
use crate::privileges::PrivilegeBroker;
use crate::proc::{CommandRequest, CommandRunner};
use crate::record::{format_size, SourceId, UpdateRecord, NO_DESCRIPTION, UNKNOWN};
use crate::source::UpdateSource;

/// Adapter for the system package manager.
pub struct AptSource {
    runner: Arc<dyn CommandRunner>,
    privileges: Arc<PrivilegeBroker>,
    logger: Arc<Logger>,
    query_deadline: Duration,
}

impl AptSource {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        privileges: Arc<PrivilegeBroker>,
        logger: Arc<Logger>,
        query_deadline: Duration,
    ) -> Self {
        Self {
            runner,
            privileges,
            logger,
            query_deadline,
        }
    }

    async fn query(&self, args: &[&str]) -> Option<String> {
        let program = args.first()?;
        let request = CommandRequest::new(program, args[1..].to_vec(), self.query_deadline);
        let display = request.display();
        match self.runner.run(request).await {
            Ok(output) => Some(output.stdout),
            Err(err) => {
                self.logger.debug("APT", format!("`{display}` failed: {err}"));
                None
            }
        }
    }

    /// Heuristic: a package is a security update when its policy
    /// output mentions a security channel.
    async fn is_security_update(&self, name: &str) -> bool {
        match self.query(&["apt-cache", "policy", name]).await {
            Some(stdout) => stdout.to_lowercase().contains("security"),
            None => false,
        }
    }

    async fn package_description(&self, name: &str) -> String {
        if let Some(stdout) = self.query(&["apt-cache", "show", name]).await {
            for line in stdout.lines() {
                if let Some(rest) = line.strip_prefix("Description:") {
                    return rest.trim().to_string();
                }
            }
        }
        NO_DESCRIPTION.to_string()
    }

    async fn package_size(&self, name: &str) -> String {
        if let Some(stdout) = self.query(&["apt-cache", "show", name]).await {
            for line in stdout.lines() {
                if let Some(rest) = line.strip_prefix("Size:") {
                    if let Ok(bytes) = rest.trim().parse::<u64>() {
                        return format_size(bytes);
                    }
                }
            }
        }
        UNKNOWN.to_string()
    }

    async fn build_record(&self, line: &str) -> Option<UpdateRecord> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        // Short lines are dropped, never an error.
        if parts.len() < 3 {
            return None;
        }
        let name = parts[0].split('/').next().unwrap_or(parts[0]).to_string();
        let new_version = parts[1].to_string();
        let current_version = parts
            .get(5)
            .map(|v| v.trim_end_matches(']').to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let is_security = self.is_security_update(&name).await;
        let description = self.package_description(&name).await;
        let size = self.package_size(&name).await;

        Some(UpdateRecord::apt(
            name,
            current_version,
            new_version,
            is_security,
            description,
            size,
        ))
    }
}

#[async_trait]
impl UpdateSource for AptSource {
    fn id(&self) -> SourceId {
        SourceId::Apt
    }

    async fn fetch_updates(&self) -> Vec<UpdateRecord> {
        self.logger.info("APT", "Checking for APT updates...");

        // Refresh the cache first; a failure degrades to stale data
        // rather than aborting the fetch.
        let (cache_ok, output) = self.privileges.update_cache().await;
        if !cache_ok {
            self.logger
                .error("APT", format!("Failed to update package lists: {output}"));
            self.logger
                .info("APT", "Continuing with existing package cache...");
        }

        let Some(stdout) = self.query(&["apt", "list", "--upgradable"]).await else {
            return Vec::new();
        };

        let mut updates = Vec::new();
        let body = stdout.trim();
        if body.is_empty() {
            return updates;
        }
        // First line is the `Listing...` header.
        for line in body.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(record) = self.build_record(line).await {
                updates.push(record);
            }
        }

        self.logger
            .info("APT", format!("Found {} APT updates", updates.len()));
        updates
    }

    async fn install(&self, record: &UpdateRecord) -> bool {
        self.logger
            .info("APT", format!("Installing APT package: {}", record.name));

        // Most specific spec first, bare name as the single fallback.
        let mut attempts = Vec::new();
        if !record.new_version.contains('=') && record.new_version != "unknown" {
            attempts.push(format!("{}={}", record.package_id, record.new_version));
        }
        attempts.push(record.package_id.clone());

        let total = attempts.len();
        for (attempt, spec) in attempts.into_iter().enumerate() {
            self.logger.info(
                "APT",
                format!("Installation attempt {}: {spec}", attempt + 1),
            );
            let (ok, output) = self.privileges.install_packages(&[spec.clone()]).await;
            if ok {
                self.logger
                    .info("APT", format!("Successfully installed {}", record.name));
                return true;
            }
            self.logger.warn(
                "APT",
                format!("Attempt {} failed for {spec}: {output}", attempt + 1),
            );
            if attempt + 1 < total {
                self.logger.info("APT", "Trying fallback installation method...");
            }
        }

        self.logger.error(
            "APT",
            format!("All installation attempts failed for {}", record.name),
        );
        false
    }
}
