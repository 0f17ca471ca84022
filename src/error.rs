//! Error handling for holdings reconciliation
//!
//! A single `thiserror` enum covers the whole crate. Per-taxon conditions
//! (ambiguous, unresolved, malformed names) never abort a run; they are
//! collected as [`TaxonDiagnostic`]s on the report. Source failures are fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::taxon::Taxon;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("'{name}' matches {} reference taxa", .matches.len())]
    AmbiguousTaxon { name: String, matches: Vec<Taxon> },

    #[error("'{name}' is not a reference taxon and has no alternate-scheme path")]
    UnresolvedTaxon { name: String },

    #[error("'{name}' is not a 'Genus species' name")]
    MalformedName { name: String },

    #[error("source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("source '{source_id}' is not registered")]
    UnknownSource { source_id: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ReconcileError {
    /// Convenience constructor used by source implementations.
    pub fn unavailable(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole run.
    ///
    /// Per-taxon conditions are reported and skipped; everything else means
    /// presence/absence claims can no longer be made for the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::AmbiguousTaxon { .. } | Self::UnresolvedTaxon { .. } | Self::MalformedName { .. }
        )
    }

    /// Diagnostic kind for per-taxon errors, `None` for fatal ones.
    pub fn diagnostic_kind(&self) -> Option<DiagnosticKind> {
        match self {
            Self::AmbiguousTaxon { .. } => Some(DiagnosticKind::Ambiguous),
            Self::UnresolvedTaxon { .. } => Some(DiagnosticKind::Unresolved),
            Self::MalformedName { .. } => Some(DiagnosticKind::Malformed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// More than one reference match; the taxon was skipped.
    Ambiguous,
    /// No reference match and no alternate path; carried under its literal name.
    Unresolved,
    /// Could not be split into genus and species; skipped.
    Malformed,
}

/// A per-taxon problem reported alongside a run's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonDiagnostic {
    pub name: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl TaxonDiagnostic {
    /// Build a diagnostic from a per-taxon error. Returns `None` for fatal errors.
    pub fn from_error(name: impl Into<String>, error: &ReconcileError) -> Option<Self> {
        let kind = error.diagnostic_kind()?;
        Some(Self {
            name: name.into(),
            kind,
            message: error.to_string(),
        })
    }
}
