//! OpenWings Reconcile - taxonomic synonym reconciliation of specimen holdings
//!
//! A species can be recorded under different genus/species spellings depending
//! on which taxonomy scheme an institution follows. This crate expands each
//! species into every name any scheme treats as equivalent, queries every
//! holdings source under all of them, and collapses the answers back into one
//! presence result and one ranked record selection per canonical species.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SpeciesReferenceStore          HoldingsSource × N           │
//! │  (reference list, synonyms)     (institutional records)      │
//! └──────────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼                              │
//! ┌──────────────────────────────┐              │
//! │ SynonymGraph (once per run)  │              │
//! └──────────────────────────────┘              │
//!                │                              │
//!                ▼                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ TaxonClassifier ─► SynonymExpander ─► PresenceAggregator     │
//! │                                    └► RecordSelector         │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Report assembly ─► exclusion / bands / masking               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use openwings_reconcile::{ReconcileConfig, Reconciler, Snapshot};
//!
//! let config = ReconcileConfig::from_file("config/reconcile.yaml")?;
//! let snapshot = Snapshot::from_file("config/snapshot.yaml")?;
//! let requests = snapshot.requests.clone();
//! let (reference, registry) = snapshot.into_stores();
//!
//! let reconciler = Reconciler::new(config, reference, &registry).await?;
//! let families = reconciler.presence_for_all_families().await?;
//! let records = reconciler.records_for_requests(&requests).await?;
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod ioc;
pub mod memory;
pub mod policy;
pub mod ports;
pub mod presence;
pub mod reconciler;
pub mod report;
pub mod selector;
pub mod synonym;
pub mod taxon;

// Re-export main types
pub use classify::{Classification, SpeciesRequest, TaxonClassifier};
pub use config::{PresenceSourceConfig, ReconcileConfig, RedactionConfig};
pub use error::{DiagnosticKind, ReconcileError, Result, TaxonDiagnostic};
pub use ioc::{FieldWidths, IocList};
pub use memory::{MemoryHoldingsSource, MemoryReferenceStore, Snapshot};
pub use policy::{apply_bands, mask_source, ExclusionPolicy, MaskedReports};
pub use ports::{HoldingRecord, HoldingsSource, SourceRegistry, SpeciesReferenceStore};
pub use presence::{Presence, PresenceAggregator, PresenceCell, PresenceRollup, TaxonPresence};
pub use reconciler::{RecordOutput, Reconciler};
pub use report::{
    family_counts, merge_down_uncollected, Band, FamilyCounts, FamilyReport, FamilySummary,
    PresenceReport, PresenceRow, RecordReport, RecordRow, RecordStatus, RecordTable,
    ReconciliationResult, RunInfo, UncollectedTaxon,
};
pub use selector::{RecordSelector, Selection, SelectionPolicy};
pub use synonym::{Expansion, ExpansionMode, SynonymExpander, SynonymGraph};
pub use taxon::{ReferenceTaxon, SynonymEdge, Taxon, TaxonomyScheme};
