//! Holdings presence aggregation
//!
//! Each source is queried once per taxon with the taxon's whole variant set.
//! Hits under any variant mean the institution holds the species.
//!
//! Presence is three-valued. A source that returned nothing for a taxon that
//! has no variants beyond its own name is `Undetermined` rather than `Absent`:
//! nothing beyond the literal name was ever asked, so it is not counted as a
//! confirmed absence.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::config::PresenceSourceConfig;
use crate::error::Result;
use crate::ports::{HoldingRecord, HoldingsSource};
use crate::synonym::Expansion;
use crate::taxon::Taxon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Present,
    Absent,
    Undetermined,
}

impl Presence {
    pub fn is_present(self) -> bool {
        self == Self::Present
    }
}

/// One source's answer for one taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceCell {
    pub source_id: String,
    pub presence: Presence,
    /// Variants under which the source had records.
    pub matched_variants: BTreeSet<Taxon>,
    pub record_count: usize,
}

impl PresenceCell {
    /// Reduce a source's rows for one expansion into a cell.
    pub fn reduce(source_id: &str, expansion: &Expansion, records: &[HoldingRecord]) -> Self {
        let matched_variants: BTreeSet<Taxon> = records
            .iter()
            .filter(|r| expansion.contains(&r.taxon))
            .map(|r| r.taxon.clone())
            .collect();
        let record_count = records
            .iter()
            .filter(|r| expansion.contains(&r.taxon))
            .count();

        let presence = if record_count > 0 {
            Presence::Present
        } else if expansion.has_alternates() {
            Presence::Absent
        } else {
            Presence::Undetermined
        };

        Self {
            source_id: source_id.to_string(),
            presence,
            matched_variants,
            record_count,
        }
    }

    /// Cell for a taxon that was never queried against this source.
    pub fn undetermined(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            presence: Presence::Undetermined,
            matched_variants: BTreeSet::new(),
            record_count: 0,
        }
    }
}

/// All presence cells for one subject taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonPresence {
    pub taxon: Taxon,
    pub variants: BTreeSet<Taxon>,
    pub cells: Vec<PresenceCell>,
    /// Carried under its literal name only (no reference or alternate match).
    #[serde(default)]
    pub unverified: bool,
}

impl TaxonPresence {
    pub fn cell(&self, source_id: &str) -> Option<&PresenceCell> {
        self.cells.iter().find(|c| c.source_id == source_id)
    }

    pub fn rollup(&self, collaborators: &HashSet<&str>) -> PresenceRollup {
        PresenceRollup::from_cells(&self.cells, collaborators)
    }
}

/// Roll-ups over a taxon's cells.
///
/// The two booleans are computed independently; counts keep `Undetermined`
/// separate from `Absent`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRollup {
    pub any_collaborator: bool,
    pub any_source: bool,
    pub present: usize,
    pub absent: usize,
    pub undetermined: usize,
}

impl PresenceRollup {
    pub fn from_cells(cells: &[PresenceCell], collaborators: &HashSet<&str>) -> Self {
        let mut rollup = Self::default();
        let mut collaborator_hits = 0usize;

        for cell in cells {
            match cell.presence {
                Presence::Present => {
                    rollup.present += 1;
                    if collaborators.contains(cell.source_id.as_str()) {
                        collaborator_hits += 1;
                    }
                }
                Presence::Absent => rollup.absent += 1,
                Presence::Undetermined => rollup.undetermined += 1,
            }
        }

        rollup.any_source = rollup.present > 0;
        rollup.any_collaborator = collaborator_hits > 0;
        rollup
    }
}

/// Queries every configured presence source for a taxon's variant set.
pub struct PresenceAggregator {
    sources: Vec<(PresenceSourceConfig, Arc<dyn HoldingsSource>)>,
}

impl PresenceAggregator {
    pub fn new(sources: Vec<(PresenceSourceConfig, Arc<dyn HoldingsSource>)>) -> Self {
        Self { sources }
    }

    pub fn source_configs(&self) -> impl Iterator<Item = &PresenceSourceConfig> {
        self.sources.iter().map(|(cfg, _)| cfg)
    }

    /// Query each source in column order. The first source failure aborts.
    pub async fn aggregate(&self, expansion: &Expansion, unverified: bool) -> Result<TaxonPresence> {
        let query = expansion.to_query();
        let mut cells = Vec::with_capacity(self.sources.len());

        for (config, source) in &self.sources {
            let records = source.find_by_taxa(&query).await?;
            let cell = PresenceCell::reduce(&config.id, expansion, &records);
            tracing::debug!(
                taxon = %expansion.subject,
                source = %config.id,
                presence = ?cell.presence,
                records = cell.record_count,
                "Presence"
            );
            cells.push(cell);
        }

        Ok(TaxonPresence {
            taxon: expansion.subject.clone(),
            variants: expansion.variants.clone(),
            cells,
            unverified,
        })
    }
}
