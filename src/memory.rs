//! In-memory port implementations
//!
//! Used by tests and by the `reconcile` binary when running against a YAML
//! snapshot instead of live institutional databases. Both stores can be
//! switched offline to exercise the fatal `SourceUnavailable` path.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::classify::SpeciesRequest;
use crate::error::{ReconcileError, Result};
use crate::ports::{HoldingRecord, HoldingsSource, SourceRegistry, SpeciesReferenceStore};
use crate::taxon::{ReferenceTaxon, SynonymEdge, Taxon, TaxonomyScheme};

/// Reference list and synonym edges held in memory.
pub struct MemoryReferenceStore {
    taxa: Vec<ReferenceTaxon>,
    edges: Vec<SynonymEdge>,
    available: AtomicBool,
}

impl MemoryReferenceStore {
    pub fn new(taxa: Vec<ReferenceTaxon>, edges: Vec<SynonymEdge>) -> Self {
        Self {
            taxa,
            edges,
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ReconcileError::unavailable("reference", "store offline"))
        }
    }
}

#[async_trait]
impl SpeciesReferenceStore for MemoryReferenceStore {
    async fn lookup_taxon(&self, genus: &str, species: &str) -> Result<Vec<Taxon>> {
        self.check_available()?;
        Ok(self
            .taxa
            .iter()
            .filter(|r| r.taxon.genus == genus && r.taxon.species == species)
            .map(|r| r.taxon.clone())
            .collect())
    }

    async fn list_synonym_edges(&self, scheme: Option<TaxonomyScheme>) -> Result<Vec<SynonymEdge>> {
        self.check_available()?;
        Ok(self
            .edges
            .iter()
            .filter(|e| scheme.map_or(true, |s| e.scheme == s))
            .cloned()
            .collect())
    }

    async fn list_reference_taxa(&self, family: Option<&str>) -> Result<Vec<ReferenceTaxon>> {
        self.check_available()?;
        Ok(self
            .taxa
            .iter()
            .filter(|r| family.map_or(true, |f| r.family == f))
            .cloned()
            .collect())
    }

    async fn list_families(&self) -> Result<Vec<String>> {
        self.check_available()?;
        let families: BTreeSet<&str> = self.taxa.iter().map(|r| r.family.as_str()).collect();
        Ok(families.into_iter().map(String::from).collect())
    }
}

/// One institution's records held in memory.
pub struct MemoryHoldingsSource {
    id: String,
    records: RwLock<Vec<HoldingRecord>>,
    available: AtomicBool,
    queries: AtomicUsize,
}

impl MemoryHoldingsSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
            queries: AtomicUsize::new(0),
        }
    }

    /// Records are re-tagged with this source's id.
    pub fn with_records(id: impl Into<String>, records: Vec<HoldingRecord>) -> Self {
        let source = Self::new(id);
        let tagged = records
            .into_iter()
            .map(|mut r| {
                r.source_id = source.id.clone();
                r
            })
            .collect();
        Self {
            records: RwLock::new(tagged),
            ..source
        }
    }

    pub async fn add_record(&self, mut record: HoldingRecord) {
        record.source_id = self.id.clone();
        self.records.write().await.push(record);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `find_by_taxa` calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HoldingsSource for MemoryHoldingsSource {
    fn source_id(&self) -> &str {
        &self.id
    }

    async fn find_by_taxa(&self, taxa: &[Taxon]) -> Result<Vec<HoldingRecord>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(ReconcileError::unavailable(&self.id, "source offline"));
        }
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| taxa.contains(&r.taxon))
            .cloned()
            .collect())
    }
}

/// Reference data, holdings and optional record-mode requests in one YAML file.
///
/// ```yaml
/// reference:
///   taxa:
///     - { order: Passeriformes, family: Passeridae, genus: Passer, species: domesticus }
///   edges:
///     - scheme: 1
///       canonical: { genus: Passer, species: domesticus }
///       alternate: { genus: Passer, species: indicus }
/// sources:
///   amnh:
///     - { genus: Passer, species: indicus, catalog_number: "12345", year: 1998 }
/// requests:
///   - name: Passer domesticus
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    pub reference: ReferenceSnapshot,
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<HoldingRecord>>,
    #[serde(default)]
    pub requests: Vec<SpeciesRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceSnapshot {
    pub taxa: Vec<ReferenceTaxon>,
    #[serde(default)]
    pub edges: Vec<SynonymEdge>,
}

impl Snapshot {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build the reference store and a registry holding one source per key.
    pub fn into_stores(self) -> (Arc<MemoryReferenceStore>, SourceRegistry) {
        let reference = Arc::new(MemoryReferenceStore::new(
            self.reference.taxa,
            self.reference.edges,
        ));
        let mut registry = SourceRegistry::new();
        for (id, records) in self.sources {
            registry.register(Arc::new(MemoryHoldingsSource::with_records(id, records)));
        }
        (reference, registry)
    }
}
