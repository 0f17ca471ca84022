//! Taxon classification against the reference list
//!
//! A free-text "Genus species" name is split and looked up in the reference
//! store:
//!
//! - exactly one match: a reference taxon, expanded through its alternates
//! - zero matches: a non-reference taxon, resolved through the canonicals it
//!   is an alternate of (possibly none, in which case it is unverified)
//! - several matches: inconsistent source data, reported and skipped

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ReconcileError, Result};
use crate::ports::SpeciesReferenceStore;
use crate::synonym::SynonymGraph;
use crate::taxon::Taxon;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Reference(Taxon),
    NonReference {
        taxon: Taxon,
        /// Reference names this taxon is an alternate of, across schemes.
        canonicals: BTreeSet<Taxon>,
    },
}

impl Classification {
    /// The name as given (reference or literal).
    pub fn taxon(&self) -> &Taxon {
        match self {
            Self::Reference(taxon) => taxon,
            Self::NonReference { taxon, .. } => taxon,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Non-reference and reachable through no scheme: carried under its
    /// literal name only and flagged in output.
    pub fn is_unverified(&self) -> bool {
        matches!(self, Self::NonReference { canonicals, .. } if canonicals.is_empty())
    }
}

/// One input row of a record-mode run.
///
/// `metadata` holds the caller's own columns for the taxon (e.g. the
/// spreadsheet row) and is copied onto every output row for that taxon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRequest {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl SpeciesRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Rows already marked completed are not queried again.
    pub fn is_completed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("completed"))
    }
}

/// Routes input names to reference or non-reference handling.
pub struct TaxonClassifier<'a> {
    store: &'a dyn SpeciesReferenceStore,
    graph: &'a SynonymGraph,
}

impl<'a> TaxonClassifier<'a> {
    pub fn new(store: &'a dyn SpeciesReferenceStore, graph: &'a SynonymGraph) -> Self {
        Self { store, graph }
    }

    /// Classify a display name.
    ///
    /// Returns `MalformedName` or `AmbiguousTaxon` for per-taxon problems;
    /// store failures propagate unchanged.
    pub async fn classify(&self, name: &str) -> Result<Classification> {
        let taxon = Taxon::parse_display(name)?;
        self.classify_taxon(taxon).await
    }

    pub async fn classify_taxon(&self, taxon: Taxon) -> Result<Classification> {
        let mut matches = self.store.lookup_taxon(&taxon.genus, &taxon.species).await?;

        match matches.len() {
            1 => {
                let reference = matches.remove(0);
                tracing::debug!(taxon = %reference, "Reference taxon");
                Ok(Classification::Reference(reference))
            }
            0 => {
                let canonicals = self.graph.canonical_names(&taxon);
                if canonicals.is_empty() {
                    tracing::warn!(taxon = %taxon, "Not in reference taxonomy and no alternate path");
                } else {
                    tracing::debug!(
                        taxon = %taxon,
                        canonicals = canonicals.len(),
                        "Non-reference taxon resolved through alternates"
                    );
                }
                Ok(Classification::NonReference { taxon, canonicals })
            }
            _ => {
                tracing::warn!(taxon = %taxon, matches = matches.len(), "Ambiguous reference lookup");
                Err(ReconcileError::AmbiguousTaxon {
                    name: taxon.display_name(),
                    matches,
                })
            }
        }
    }
}
