/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Load and validate Syn-Up-Core configuration from TOML,
    covering elevation strategy, subprocess timeouts, and
    filesystem locations.

  Security / Safety Notes:
    Configuration never stores secrets; only policy toggles
    and timeout values are accepted.

  Dependencies:
    serde + toml for deserialisation, dirs for XDG paths.

  Operational Scope:
    Constructed once at startup and passed by reference to the
    aggregator, adapters, and privilege broker.

  Revision History:
    2025-08-29 COD  Authored configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults with operator override via file
    - Deterministic path resolution under XDG conventions
    - Validation at load time, not at point of use
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, SynupError};

/// Elevation strategy toggles mirrored by the privilege broker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Prefer the PolicyKit broker when pkexec is present.
    pub use_policykit: bool,
    /// Route cache refreshes through the broker.
    pub policykit_for_cache: bool,
    /// Route package installs through the broker.
    pub policykit_for_install: bool,
    /// Seconds a verified sudo secret stays trusted; 0 trusts it
    /// for the whole session.
    pub credential_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            use_policykit: true,
            policykit_for_cache: true,
            policykit_for_install: true,
            credential_ttl_secs: 900,
        }
    }
}

/// Fixed subprocess deadlines; elapsing one is a failure, never retried.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Read-only metadata queries (list, policy, show, info).
    pub query_secs: u64,
    /// Broker-mediated privileged commands.
    pub privileged_secs: u64,
    /// Per-record install commands.
    pub install_secs: u64,
    /// Interactive secret verification.
    pub auth_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_secs: 120,
            privileged_secs: 300,
            install_secs: 600,
            auth_secs: 10,
        }
    }
}

/// Top-level Syn-Up-Core configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynupConfig {
    pub auth: AuthConfig,
    pub timeouts: TimeoutConfig,
    /// Override for the log directory; defaults to the XDG data dir.
    pub log_dir: Option<PathBuf>,
}

impl SynupConfig {
    /// Load configuration from the given path, or from the default
    /// location when none is supplied. A missing default file yields
    /// built-in defaults; a missing explicit file is an error.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => {
                let raw = std::fs::read_to_string(explicit).map_err(|err| {
                    SynupError::Config(format!(
                        "Failed to read config {}: {err}",
                        explicit.display()
                    ))
                })?;
                Self::parse(&raw)
            }
            None => {
                let default_path = Self::default_path();
                match std::fs::read_to_string(&default_path) {
                    Ok(raw) => Self::parse(&raw),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        Ok(Self::default())
                    }
                    Err(err) => Err(SynupError::Config(format!(
                        "Failed to read config {}: {err}",
                        default_path.display()
                    ))),
                }
            }
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        let config: SynupConfig = toml::from_str(raw)
            .map_err(|err| SynupError::Config(format!("Invalid config TOML: {err}")))?;
        if config.timeouts.auth_secs == 0 {
            return Err(SynupError::Config(
                "timeouts.auth_secs must be greater than zero".into(),
            ));
        }
        Ok(config)
    }

    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synup")
            .join("config.toml")
    }

    /// Directory receiving session logs and the policy descriptor copy.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("synup")
        })
    }
}
