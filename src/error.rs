/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Up-Core error types to provide consistent
    diagnostics and exit semantics.

  Security / Safety Notes:
    Error contexts never embed cached elevation secrets; only
    command names and high-level reasons are exposed.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2025-08-29 COD  Established shared error definitions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Up-Core operations.
pub type Result<T> = std::result::Result<T, SynupError>;

/// Enumerates high-level error domains surfaced by Syn-Up-Core.
#[derive(Debug, Error)]
pub enum SynupError {
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynupError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynupError::CommandMissing { .. } => ExitCode::from(10),
            SynupError::Timeout { .. } => ExitCode::from(12),
            SynupError::Config(_) => ExitCode::from(20),
            SynupError::Filesystem(_) => ExitCode::from(40),
            SynupError::Io(_) => ExitCode::from(41),
            SynupError::Runtime(_) => ExitCode::from(50),
        }
    }
}
