//! SynonymGraph - bidirectional lookup over the synonym relation
//!
//! Edges are stored canonical → alternate by the reference store but must be
//! queried from both ends, so the builder produces two indices in one pass.
//! The same `(canonical, alternate)` pair may repeat across schemes; links are
//! kept per scheme and callers de-duplicate names by value.

use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::ports::SpeciesReferenceStore;
use crate::taxon::{SynonymEdge, Taxon, TaxonomyScheme};

/// One side of an edge as seen from the other side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemeLink {
    pub scheme: TaxonomyScheme,
    pub taxon: Taxon,
}

/// Read-only synonym indices for one run.
#[derive(Debug, Default, Clone)]
pub struct SynonymGraph {
    by_canonical: HashMap<Taxon, BTreeSet<SchemeLink>>,
    by_alternate: HashMap<Taxon, BTreeSet<SchemeLink>>,
    edge_count: usize,
}

impl SynonymGraph {
    /// Build both indices from an edge list. O(edges).
    ///
    /// Identity edges (alternate equal to canonical) add nothing to the
    /// relation and are skipped.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a SynonymEdge>) -> Self {
        let mut graph = Self::default();
        let mut identity = 0usize;

        for edge in edges {
            if edge.is_identity() {
                identity += 1;
                continue;
            }
            graph
                .by_canonical
                .entry(edge.canonical.clone())
                .or_default()
                .insert(SchemeLink {
                    scheme: edge.scheme,
                    taxon: edge.alternate.clone(),
                });
            graph
                .by_alternate
                .entry(edge.alternate.clone())
                .or_default()
                .insert(SchemeLink {
                    scheme: edge.scheme,
                    taxon: edge.canonical.clone(),
                });
            graph.edge_count += 1;
        }

        tracing::debug!(
            edges = graph.edge_count,
            identity_edges = identity,
            canonicals = graph.by_canonical.len(),
            alternates = graph.by_alternate.len(),
            "Synonym graph built"
        );

        graph
    }

    /// Load the full relation from the reference store and build the graph.
    ///
    /// A store failure is returned as-is: no partial graph is usable.
    pub async fn load(store: &dyn SpeciesReferenceStore) -> Result<Self> {
        let edges = store.list_synonym_edges(None).await?;
        tracing::info!(edges = edges.len(), "Loaded synonym edges");
        Ok(Self::from_edges(&edges))
    }

    /// `(scheme, alternate)` links for a canonical name.
    pub fn alternates_of(&self, canonical: &Taxon) -> impl Iterator<Item = &SchemeLink> {
        self.by_canonical.get(canonical).into_iter().flatten()
    }

    /// `(scheme, canonical)` links for an alternate name.
    pub fn canonicals_of(&self, alternate: &Taxon) -> impl Iterator<Item = &SchemeLink> {
        self.by_alternate.get(alternate).into_iter().flatten()
    }

    /// Distinct canonical names an alternate maps to, across all schemes.
    pub fn canonical_names(&self, alternate: &Taxon) -> BTreeSet<Taxon> {
        self.canonicals_of(alternate).map(|l| l.taxon.clone()).collect()
    }

    /// Distinct alternate names of a canonical, across all schemes.
    pub fn alternate_names(&self, canonical: &Taxon) -> BTreeSet<Taxon> {
        self.alternates_of(canonical).map(|l| l.taxon.clone()).collect()
    }

    /// Schemes under which `canonical` is known as `alternate`.
    pub fn schemes_linking(&self, canonical: &Taxon, alternate: &Taxon) -> BTreeSet<TaxonomyScheme> {
        self.alternates_of(canonical)
            .filter(|l| &l.taxon == alternate)
            .map(|l| l.scheme)
            .collect()
    }

    pub fn is_canonical(&self, taxon: &Taxon) -> bool {
        self.by_canonical.contains_key(taxon)
    }

    pub fn is_alternate(&self, taxon: &Taxon) -> bool {
        self.by_alternate.contains_key(taxon)
    }

    /// Number of non-identity edges indexed.
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }
}
