//! Port traits for the two external collaborators
//!
//! The reconciliation core depends only on these traits. Backends (SQL views,
//! web APIs, in-memory snapshots) implement them; a query failure is returned
//! as [`ReconcileError::SourceUnavailable`] and is fatal for the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{ReconcileError, Result};
use crate::taxon::{ReferenceTaxon, SynonymEdge, Taxon, TaxonomyScheme};

/// Canonical taxon lookups and the synonym relation.
#[async_trait]
pub trait SpeciesReferenceStore: Send + Sync {
    /// Reference taxa with exactly this genus and species.
    ///
    /// More than one result means the reference data is inconsistent.
    async fn lookup_taxon(&self, genus: &str, species: &str) -> Result<Vec<Taxon>>;

    /// Synonym edges, optionally restricted to one scheme.
    async fn list_synonym_edges(&self, scheme: Option<TaxonomyScheme>) -> Result<Vec<SynonymEdge>>;

    /// Reference taxa, optionally restricted to one family.
    async fn list_reference_taxa(&self, family: Option<&str>) -> Result<Vec<ReferenceTaxon>>;

    /// Family names in name order, for batch runs.
    async fn list_families(&self) -> Result<Vec<String>>;
}

/// One institution's specimen records.
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    /// Stable identifier used in configuration and report columns.
    fn source_id(&self) -> &str;

    /// Records whose `(genus, species)` equals any of `taxa`. Arrival order
    /// carries no meaning.
    async fn find_by_taxa(&self, taxa: &[Taxon]) -> Result<Vec<HoldingRecord>>;
}

/// One specimen row as returned by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingRecord {
    #[serde(default)]
    pub source_id: String,
    /// The name as recorded by the institution (may be an alternate).
    #[serde(flatten)]
    pub taxon: Taxon,
    #[serde(default)]
    pub catalog_number: Option<String>,
    #[serde(default)]
    pub institution_code: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Source-provided precedence, lower first (e.g. preferred voucher type).
    #[serde(default)]
    pub rank: Option<i32>,
    /// Remaining source-specific columns.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl HoldingRecord {
    pub fn new(source_id: impl Into<String>, taxon: Taxon) -> Self {
        Self {
            source_id: source_id.into(),
            taxon,
            catalog_number: None,
            institution_code: None,
            sex: None,
            year: None,
            rank: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_catalog_number(mut self, catalog_number: impl Into<String>) -> Self {
        self.catalog_number = Some(catalog_number.into());
        self
    }

    pub fn with_institution_code(mut self, code: impl Into<String>) -> Self {
        self.institution_code = Some(code.into());
        self
    }

    pub fn with_sex(mut self, sex: impl Into<String>) -> Self {
        self.sex = Some(sex.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Selection order: rank ascending, sex ascending, year descending, with
    /// missing values last in every key. Remaining ties fall back to the
    /// record's own identity so that the order never depends on arrival.
    pub fn selection_cmp(&self, other: &Self) -> Ordering {
        nulls_last(&self.rank, &other.rank)
            .then_with(|| nulls_last(&self.sex, &other.sex))
            .then_with(|| nulls_last_desc(&self.year, &other.year))
            .then_with(|| self.identity_cmp(other))
    }

    fn identity_cmp(&self, other: &Self) -> Ordering {
        self.catalog_number
            .cmp(&other.catalog_number)
            .then_with(|| self.institution_code.cmp(&other.institution_code))
            .then_with(|| self.taxon.cmp(&other.taxon))
            .then_with(|| self.fields.cmp(&other.fields))
    }
}

fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn nulls_last_desc<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        _ => nulls_last(a, b),
    }
}

/// Registered holdings sources keyed by id. Immutable once the run starts.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn HoldingsSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own id, replacing any previous one.
    pub fn register(&mut self, source: Arc<dyn HoldingsSource>) {
        self.sources.insert(source.source_id().to_string(), source);
    }

    pub fn with_source(mut self, source: Arc<dyn HoldingsSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, source_id: &str) -> Result<Arc<dyn HoldingsSource>> {
        self.sources
            .get(source_id)
            .cloned()
            .ok_or_else(|| ReconcileError::UnknownSource {
                source_id: source_id.to_string(),
            })
    }

    /// Resolve ids in the given order.
    pub fn resolve(&self, ids: &[String]) -> Result<Vec<Arc<dyn HoldingsSource>>> {
        ids.iter().map(|id| self.get(id)).collect()
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.sources.contains_key(source_id)
    }

    pub fn source_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sources.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}
