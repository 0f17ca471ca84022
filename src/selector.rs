//! Ranked record selection with source fallback
//!
//! Record sources form an explicit priority list. In fallback mode the list is
//! walked until a source yields at least one record; lower-priority sources
//! are never queried after that. In all-sources mode every source is queried
//! and kept separately for auditing.
//!
//! Within a source, records are ordered by rank, sex, then newest year first
//! and truncated to the configured maximum.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::ports::{HoldingRecord, HoldingsSource};
use crate::synonym::Expansion;

/// How many records and from which sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    pub max_records: usize,
    pub all_sources: bool,
}

/// Ordered, truncated records from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSelection {
    pub source_id: String,
    pub records: Vec<HoldingRecord>,
    /// Matches before truncation.
    pub total_matches: usize,
}

impl SourceSelection {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of walking the priority list for one taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// The first source in priority order with any records.
    pub chosen: Option<SourceSelection>,
    /// Every source actually queried, in priority order. In fallback mode
    /// this stops at the chosen source.
    pub queried: Vec<SourceSelection>,
}

impl Selection {
    /// No source in the chain had any record.
    pub fn is_missing(&self) -> bool {
        self.chosen.is_none()
    }

    pub fn records(&self) -> &[HoldingRecord] {
        self.chosen.as_ref().map(|s| s.records.as_slice()).unwrap_or(&[])
    }

    pub fn source_id(&self) -> Option<&str> {
        self.chosen.as_ref().map(|s| s.source_id.as_str())
    }

    pub fn for_source(&self, source_id: &str) -> Option<&SourceSelection> {
        self.queried.iter().find(|s| s.source_id == source_id)
    }
}

/// Sort into selection order and keep at most `max` records.
pub fn rank_records(mut records: Vec<HoldingRecord>, max: usize) -> Vec<HoldingRecord> {
    records.sort_by(|a, b| a.selection_cmp(b));
    records.truncate(max);
    records
}

pub struct RecordSelector {
    sources: Vec<Arc<dyn HoldingsSource>>,
    policy: SelectionPolicy,
}

impl RecordSelector {
    pub fn new(sources: Vec<Arc<dyn HoldingsSource>>, policy: SelectionPolicy) -> Self {
        Self { sources, policy }
    }

    pub async fn select(&self, expansion: &Expansion) -> Result<Selection> {
        let query = expansion.to_query();
        let mut selection = Selection {
            chosen: None,
            queried: Vec::new(),
        };

        for source in &self.sources {
            let found = source.find_by_taxa(&query).await?;
            let total_matches = found.len();
            let picked = SourceSelection {
                source_id: source.source_id().to_string(),
                records: rank_records(found, self.policy.max_records),
                total_matches,
            };

            tracing::debug!(
                taxon = %expansion.subject,
                source = %picked.source_id,
                matches = total_matches,
                kept = picked.records.len(),
                "Queried record source"
            );

            let hit = !picked.is_empty();
            if hit && selection.chosen.is_none() {
                selection.chosen = Some(picked.clone());
            }
            selection.queried.push(picked);

            if hit && !self.policy.all_sources {
                break;
            }
        }

        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHoldingsSource;
    use crate::taxon::Taxon;

    fn t(g: &str, s: &str) -> Taxon {
        Taxon::new(g, s)
    }

    fn rec(catalog: &str) -> HoldingRecord {
        HoldingRecord::new("", t("Passer", "domesticus")).with_catalog_number(catalog)
    }

    #[test]
    fn ordering_is_rank_then_sex_then_newest_year() {
        let records = vec![
            rec("a").with_rank(2).with_sex("female").with_year(2010),
            rec("b").with_rank(1).with_sex("male").with_year(1990),
            rec("c").with_rank(1).with_sex("female").with_year(1980),
            rec("d").with_rank(1).with_sex("female").with_year(2005),
            rec("e").with_sex("female").with_year(2020),
        ];
        let ranked = rank_records(records, 10);
        let order: Vec<&str> = ranked
            .iter()
            .map(|r| r.catalog_number.as_deref().unwrap())
            .collect();
        assert_eq!(order, vec!["d", "c", "b", "a", "e"]);
    }

    #[test]
    fn truncates_to_maximum() {
        let records: Vec<HoldingRecord> = (0..30).map(|i| rec(&format!("{:02}", i))).collect();
        assert_eq!(rank_records(records, 25).len(), 25);
    }

    #[test]
    fn full_ties_do_not_depend_on_arrival_order() {
        let forward = vec![rec("x").with_year(2000), rec("y").with_year(2000)];
        let backward = vec![rec("y").with_year(2000), rec("x").with_year(2000)];
        assert_eq!(rank_records(forward, 1), rank_records(backward, 1));
    }

    fn sources() -> (Arc<MemoryHoldingsSource>, Arc<MemoryHoldingsSource>, Arc<MemoryHoldingsSource>) {
        let tissues = Arc::new(MemoryHoldingsSource::new("tissues"));
        let vertnet = Arc::new(MemoryHoldingsSource::with_records(
            "vertnet",
            vec![rec("v1"), rec("v2")],
        ));
        let ala = Arc::new(MemoryHoldingsSource::with_records("ala", vec![rec("a1")]));
        (tissues, vertnet, ala)
    }

    fn chain(sources: &[Arc<MemoryHoldingsSource>]) -> Vec<Arc<dyn HoldingsSource>> {
        sources
            .iter()
            .map(|s| s.clone() as Arc<dyn HoldingsSource>)
            .collect()
    }

    #[tokio::test]
    async fn fallback_stops_at_first_source_with_records() {
        let (tissues, vertnet, ala) = sources();
        let selector = RecordSelector::new(
            chain(&[tissues, vertnet, ala.clone()]),
            SelectionPolicy {
                max_records: 25,
                all_sources: false,
            },
        );
        let selection = selector
            .select(&Expansion::identity(t("Passer", "domesticus")))
            .await
            .unwrap();

        assert_eq!(selection.source_id(), Some("vertnet"));
        assert_eq!(selection.records().len(), 2);
        assert_eq!(selection.queried.len(), 2);
        assert_eq!(ala.query_count(), 0);
    }

    #[tokio::test]
    async fn all_sources_mode_queries_everything() {
        let (tissues, vertnet, ala) = sources();
        let selector = RecordSelector::new(
            chain(&[tissues, vertnet, ala.clone()]),
            SelectionPolicy {
                max_records: 25,
                all_sources: true,
            },
        );
        let selection = selector
            .select(&Expansion::identity(t("Passer", "domesticus")))
            .await
            .unwrap();

        assert_eq!(selection.source_id(), Some("vertnet"));
        assert_eq!(selection.queried.len(), 3);
        assert_eq!(selection.for_source("ala").unwrap().records.len(), 1);
        assert!(selection.for_source("tissues").unwrap().is_empty());
        assert_eq!(ala.query_count(), 1);
    }

    #[tokio::test]
    async fn nothing_anywhere_is_missing() {
        let selector = RecordSelector::new(
            chain(&[Arc::new(MemoryHoldingsSource::new("tissues"))]),
            SelectionPolicy {
                max_records: 25,
                all_sources: false,
            },
        );
        let selection = selector
            .select(&Expansion::identity(t("Nonesuch", "fictus")))
            .await
            .unwrap();
        assert!(selection.is_missing());
        assert!(selection.records().is_empty());
    }
}
