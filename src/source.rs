/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::source
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Seam between the update aggregator and the per-ecosystem
    package source adapters.

  Security / Safety Notes:
    Implementations own their elevation strategy; the trait
    itself exposes no privileged surface.

  Dependencies:
    async-trait for object-safe async methods.

  Operational Scope:
    Implemented by the apt and flatpak adapters; stubbed by the
    aggregator test suite.

  Revision History:
    2025-08-29 COD  Introduced source adapter seam.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Fails-open contracts stated at the boundary
    - One owner per record, identified by SourceId
============================================================*/

use async_trait::async_trait;

use crate::record::{SourceId, UpdateRecord};

/// One package ecosystem the aggregator can query and install from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Stable identity; every record this source yields carries it.
    fn id(&self) -> SourceId;

    /// Enumerate available updates. Never fails: tool absence, parse
    /// trouble, and timeouts all degrade to an empty list plus a log
    /// entry.
    async fn fetch_updates(&self) -> Vec<UpdateRecord>;

    /// Install one record. Fails-open: returns false with the reason
    /// logged, never an error.
    async fn install(&self, record: &UpdateRecord) -> bool;
}
