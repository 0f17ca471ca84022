//! Taxon identity types
//!
//! A [`Taxon`] is an exact `(genus, species)` pair. No case or whitespace
//! normalization is applied: callers supply canonical casing and equality is
//! byte-for-byte on both fields. Taxa are the join key for every stage.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ReconcileError, Result};

/// Immutable `(genus, species)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Taxon {
    pub genus: String,
    pub species: String,
}

impl Taxon {
    pub fn new(genus: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            genus: genus.into(),
            species: species.into(),
        }
    }

    /// Split a "Genus species" display name.
    ///
    /// Exactly two whitespace-separated tokens are required; anything else is
    /// a [`ReconcileError::MalformedName`].
    pub fn parse_display(name: &str) -> Result<Self> {
        let mut parts = name.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(genus), Some(species), None) => Ok(Self::new(genus, species)),
            _ => Err(ReconcileError::MalformedName {
                name: name.to_string(),
            }),
        }
    }

    /// "Genus species"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.genus, self.species)
    }
}

impl fmt::Display for Taxon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.genus, self.species)
    }
}

/// Identifier of one alternate classification scheme (1..7 in current data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyScheme(pub u16);

impl fmt::Display for TaxonomyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tax{}", self.0)
    }
}

/// "Under `scheme`, `canonical` is also known as `alternate`."
///
/// Stored canonical → alternate, queried in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SynonymEdge {
    pub scheme: TaxonomyScheme,
    pub canonical: Taxon,
    pub alternate: Taxon,
}

impl SynonymEdge {
    pub fn new(scheme: u16, canonical: Taxon, alternate: Taxon) -> Self {
        Self {
            scheme: TaxonomyScheme(scheme),
            canonical,
            alternate,
        }
    }

    /// Edges whose alternate equals the canonical name carry no synonym.
    pub fn is_identity(&self) -> bool {
        self.canonical == self.alternate
    }
}

/// A canonical taxon of the reference (IOC) list, with its higher ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTaxon {
    pub order: String,
    pub family: String,
    #[serde(flatten)]
    pub taxon: Taxon,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub common_name: Option<String>,
    #[serde(default)]
    pub breeding_regions: Option<String>,
    #[serde(default)]
    pub extinct: bool,
}

impl ReferenceTaxon {
    pub fn new(order: impl Into<String>, family: impl Into<String>, taxon: Taxon) -> Self {
        Self {
            order: order.into(),
            family: family.into(),
            taxon,
            authority: None,
            common_name: None,
            breeding_regions: None,
            extinct: false,
        }
    }
}
