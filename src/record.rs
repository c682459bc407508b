/*============================================================
  Synavera Project: Syn-Up
  Module: synup_core::record
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Canonical data model shared by both source adapters: one
    UpdateRecord per available update, plus count projections.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.

  Dependencies:
    serde for presentation-layer serialisation.

  Operational Scope:
    Records are built fresh on every refresh cycle, held by the
    aggregator for one session, and replaced wholesale on the
    next refresh. Installation consumes a record by reference;
    it never mutates one.

  Revision History:
    2025-08-29 COD  Introduced shared update record types.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Tagged variants instead of best-effort key lookup
    - Immutable records validated at construction
============================================================*/

use serde::Serialize;

/// Placeholder used when an enrichment sub-query fails.
pub const UNKNOWN: &str = "Unknown";
/// Placeholder used when no description could be retrieved.
pub const NO_DESCRIPTION: &str = "No description available";

/// Identifies which source adapter owns a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Apt,
    Flatpak,
}

impl SourceId {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Apt => "apt",
            SourceId::Flatpak => "flatpak",
        }
    }
}

/// Classification of an update candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Security,
    Regular,
    Application,
}

/// Canonical cross-source representation of one available update.
///
/// `package_id` is the identifier commands must use; `name` is what
/// the presentation layer shows. For apt both are equal; for flatpak
/// `package_id` is the reverse-DNS application id.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRecord {
    pub name: String,
    pub package_id: String,
    pub current_version: String,
    pub new_version: String,
    pub source: SourceId,
    pub kind: UpdateKind,
    pub is_security: bool,
    pub description: String,
    pub size: String,
    pub origin: Option<String>,
    pub branch: Option<String>,
}

impl UpdateRecord {
    /// Build an apt record; `package_id` equals the display name.
    pub fn apt(
        name: String,
        current_version: String,
        new_version: String,
        is_security: bool,
        description: String,
        size: String,
    ) -> Self {
        Self {
            package_id: name.clone(),
            name,
            current_version,
            new_version,
            source: SourceId::Apt,
            kind: if is_security {
                UpdateKind::Security
            } else {
                UpdateKind::Regular
            },
            is_security,
            description,
            size,
            origin: None,
            branch: None,
        }
    }

    /// Build a flatpak record; the application id differs from the
    /// human-readable name.
    #[allow(clippy::too_many_arguments)]
    pub fn flatpak(
        name: String,
        app_id: String,
        current_version: String,
        new_version: String,
        description: String,
        size: String,
        branch: String,
        origin: String,
    ) -> Self {
        Self {
            name,
            package_id: app_id,
            current_version,
            new_version,
            source: SourceId::Flatpak,
            kind: UpdateKind::Application,
            is_security: false,
            description,
            size,
            origin: Some(origin),
            branch: Some(branch),
        }
    }
}

/// Read-only projection over the aggregator's current list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateCounts {
    pub total: usize,
    pub apt: usize,
    pub flatpak: usize,
    pub security: usize,
}

impl UpdateCounts {
    pub fn from_records(records: &[UpdateRecord]) -> Self {
        let apt = records
            .iter()
            .filter(|r| r.source == SourceId::Apt)
            .count();
        let flatpak = records
            .iter()
            .filter(|r| r.source == SourceId::Flatpak)
            .count();
        let security = records.iter().filter(|r| r.is_security).count();
        Self {
            total: records.len(),
            apt,
            flatpak,
            security,
        }
    }
}

/// Format a raw byte count the way the apt adapter reports sizes.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} TB")
}
