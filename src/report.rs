//! Reconciliation report assembly
//!
//! The reference list is always the left side of the join: every reference
//! taxon gets a row, whether or not any source holds it. Record reports are
//! denormalized, one row per selected record with the caller's metadata
//! repeated, or a single row with no record when nothing was selected.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use uuid::Uuid;

use crate::classify::SpeciesRequest;
use crate::config::PresenceSourceConfig;
use crate::error::{Result, TaxonDiagnostic};
use crate::ports::HoldingRecord;
use crate::presence::{PresenceCell, PresenceRollup, TaxonPresence};
use crate::selector::{Selection, SourceSelection};
use crate::synonym::Expansion;
use crate::taxon::Taxon;

/// Name of the table holding each taxon's chosen records.
pub const SELECTED_TABLE: &str = "selected";

/// Identity of one run, standing in for dated output file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub generated_on: NaiveDate,
}

impl RunInfo {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_on: Utc::now().date_naive(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new()
    }
}

// ── Presence reports ──────────────────────────────────────────

/// One reference taxon across every presence source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRow {
    pub taxon: Taxon,
    pub variants: BTreeSet<Taxon>,
    pub cells: Vec<PresenceCell>,
    pub rollup: PresenceRollup,
    pub unverified: bool,
}

/// Per-taxon roll-up booleans only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub taxon: Taxon,
    pub any_collaborator: bool,
    pub any_source: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceReport {
    pub run: RunInfo,
    /// Family name for batch-scoped runs.
    pub scope: Option<String>,
    pub sources: Vec<PresenceSourceConfig>,
    pub rows: Vec<PresenceRow>,
    pub diagnostics: Vec<TaxonDiagnostic>,
}

impl PresenceReport {
    pub fn row(&self, taxon: &Taxon) -> Option<&PresenceRow> {
        self.rows.iter().find(|r| &r.taxon == taxon)
    }

    /// Wide matrix: one presence value per source, in source order.
    pub fn matrix(&self) -> Vec<(Taxon, Vec<crate::presence::Presence>)> {
        self.rows
            .iter()
            .map(|row| {
                (
                    row.taxon.clone(),
                    row.cells.iter().map(|c| c.presence).collect(),
                )
            })
            .collect()
    }

    pub fn summary(&self) -> Vec<SummaryRow> {
        self.rows
            .iter()
            .map(|row| SummaryRow {
                taxon: row.taxon.clone(),
                any_collaborator: row.rollup.any_collaborator,
                any_source: row.rollup.any_source,
            })
            .collect()
    }

    /// Counts for the one-line-per-family run summary.
    pub fn family_summary(&self) -> FamilySummary {
        let species = self.rows.len();
        let present_any = self.rows.iter().filter(|r| r.rollup.any_source).count();
        let present_collaborators = self
            .rows
            .iter()
            .filter(|r| r.rollup.any_collaborator)
            .count();
        FamilySummary {
            family: self.scope.clone().unwrap_or_default(),
            species,
            present_any,
            present_collaborators,
            missing_collaborators: species - present_collaborators,
            missing_any: species - present_any,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySummary {
    pub family: String,
    pub species: usize,
    pub present_any: usize,
    pub present_collaborators: usize,
    pub missing_collaborators: usize,
    pub missing_any: usize,
}

/// A presence report scoped to one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyReport {
    pub family: String,
    pub report: PresenceReport,
    pub summary: FamilySummary,
}

impl FamilyReport {
    pub fn new(report: PresenceReport) -> Self {
        let summary = report.family_summary();
        Self {
            family: summary.family.clone(),
            report,
            summary,
        }
    }
}

/// Distinct reference taxa each source holds, per family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyCounts {
    pub family: String,
    pub species: usize,
    pub by_source: Vec<(String, usize)>,
}

pub fn family_counts(reports: &[FamilyReport]) -> Vec<FamilyCounts> {
    reports
        .iter()
        .map(|family| {
            let by_source = family
                .report
                .sources
                .iter()
                .map(|source| {
                    let held = family
                        .report
                        .rows
                        .iter()
                        .filter(|row| {
                            row.cells
                                .iter()
                                .any(|c| c.source_id == source.id && c.presence.is_present())
                        })
                        .count();
                    (source.id.clone(), held)
                })
                .collect();
            FamilyCounts {
                family: family.family.clone(),
                species: family.report.rows.len(),
                by_source,
            }
        })
        .collect()
}

/// A taxon no collaborator holds, tagged with its family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncollectedTaxon {
    pub family: String,
    pub row: PresenceRow,
}

/// Consolidate, across families, every taxon with no collaborator holdings.
pub fn merge_down_uncollected(reports: &[FamilyReport]) -> Vec<UncollectedTaxon> {
    reports
        .iter()
        .flat_map(|family| {
            family
                .report
                .rows
                .iter()
                .filter(|row| !row.rollup.any_collaborator)
                .map(move |row| UncollectedTaxon {
                    family: family.family.clone(),
                    row: row.clone(),
                })
        })
        .collect()
}

/// Outer-join presence results onto the reference taxa.
///
/// Rows come out sorted by genus then species. A reference taxon without a
/// result gets `Undetermined` cells for every source.
pub fn assemble_presence(
    reference: &[Taxon],
    results: &[TaxonPresence],
    sources: &[PresenceSourceConfig],
) -> Vec<PresenceRow> {
    let collaborators: HashSet<&str> = sources
        .iter()
        .filter(|s| s.collaborator)
        .map(|s| s.id.as_str())
        .collect();
    let by_taxon: HashMap<&Taxon, &TaxonPresence> =
        results.iter().map(|r| (&r.taxon, r)).collect();

    let mut left: BTreeSet<&Taxon> = reference.iter().collect();
    left.extend(results.iter().map(|r| &r.taxon));

    left.into_iter()
        .map(|taxon| match by_taxon.get(taxon) {
            Some(result) => PresenceRow {
                taxon: taxon.clone(),
                variants: result.variants.clone(),
                cells: result.cells.clone(),
                rollup: result.rollup(&collaborators),
                unverified: result.unverified,
            },
            None => {
                let cells: Vec<PresenceCell> = sources
                    .iter()
                    .map(|s| PresenceCell::undetermined(&s.id))
                    .collect();
                PresenceRow {
                    taxon: taxon.clone(),
                    variants: BTreeSet::from([taxon.clone()]),
                    rollup: PresenceRollup::from_cells(&cells, &collaborators),
                    cells,
                    unverified: false,
                }
            }
        })
        .collect()
}

// ── Record reports ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Found,
    /// No source in the chain had any record.
    Missing,
    /// Withheld by the exclusion list, whatever the sources hold.
    Excluded,
}

/// Record-level outcome for one input taxon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Position among the processed requests.
    pub ordinal: usize,
    pub request: SpeciesRequest,
    pub taxon: Taxon,
    pub variants: BTreeSet<Taxon>,
    pub unverified: bool,
    pub selection: Selection,
    pub status: RecordStatus,
    /// Records dropped by exclusion.
    #[serde(default)]
    pub withheld: usize,
}

impl ReconciliationResult {
    pub fn new(
        ordinal: usize,
        request: SpeciesRequest,
        expansion: Expansion,
        unverified: bool,
        selection: Selection,
    ) -> Self {
        let status = if selection.is_missing() {
            RecordStatus::Missing
        } else {
            RecordStatus::Found
        };
        Self {
            ordinal,
            request,
            taxon: expansion.subject,
            variants: expansion.variants,
            unverified,
            selection,
            status,
            withheld: 0,
        }
    }

    /// Had at least one selected record before any exclusion.
    pub fn had_records(&self) -> bool {
        !self.selection.is_missing() || self.withheld > 0
    }
}

/// Record values other than the matched name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCells {
    /// The name the institution recorded (may be an alternate).
    pub matched: Taxon,
    pub values: BTreeMap<String, String>,
}

impl From<&HoldingRecord> for RecordCells {
    fn from(record: &HoldingRecord) -> Self {
        let mut values = record.fields.clone();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                values.insert(key.to_string(), value);
            }
        };
        put("catalog_number", record.catalog_number.clone());
        put("institution_code", record.institution_code.clone());
        put("sex", record.sex.clone());
        put("year", record.year.map(|y| y.to_string()));
        put("rank", record.rank.map(|r| r.to_string()));
        Self {
            matched: record.taxon.clone(),
            values,
        }
    }
}

/// Row shading. `Even` and `Odd` alternate between consecutive taxa;
/// excluded taxa are marked `Withheld` instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    #[default]
    Even,
    Odd,
    Withheld,
}

impl Band {
    pub fn for_ordinal(ordinal: usize) -> Self {
        if ordinal % 2 == 0 {
            Self::Even
        } else {
            Self::Odd
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub ordinal: usize,
    pub name: String,
    pub taxon: Taxon,
    pub metadata: BTreeMap<String, String>,
    pub source_id: Option<String>,
    pub record: Option<RecordCells>,
    pub status: RecordStatus,
    pub band: Band,
    pub unverified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTable {
    pub name: String,
    pub rows: Vec<RecordRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTaxon {
    pub ordinal: usize,
    pub name: String,
    pub taxon: Taxon,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordReport {
    pub run: RunInfo,
    pub all_sources: bool,
    pub tables: Vec<RecordTable>,
    pub missing: Vec<MissingTaxon>,
    pub diagnostics: Vec<TaxonDiagnostic>,
}

impl RecordReport {
    pub fn table(&self, name: &str) -> Option<&RecordTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn selected(&self) -> Option<&RecordTable> {
        self.table(SELECTED_TABLE)
    }

    /// SHA-256 over the tables and missing list, independent of run identity.
    ///
    /// Two runs over unchanged sources and synonym data give the same value.
    pub fn fingerprint(&self) -> Result<String> {
        let body = serde_json::to_vec(&(&self.tables, &self.missing))?;
        let mut hasher = Sha256::new();
        hasher.update(body);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Build the selected-record table, the per-source tables (all-sources mode
/// only) and the missing-taxa complement.
pub fn assemble_records(
    results: &[ReconciliationResult],
    record_sources: &[String],
    all_sources: bool,
) -> (Vec<RecordTable>, Vec<MissingTaxon>) {
    let mut tables = vec![RecordTable {
        name: SELECTED_TABLE.to_string(),
        rows: results
            .iter()
            .flat_map(|r| expand_rows(r, r.selection.chosen.as_ref()))
            .collect(),
    }];

    if all_sources {
        for source_id in record_sources {
            tables.push(RecordTable {
                name: source_id.clone(),
                rows: results
                    .iter()
                    .flat_map(|r| expand_rows(r, r.selection.for_source(source_id)))
                    .collect(),
            });
        }
    }

    let missing = results
        .iter()
        .filter(|r| !r.had_records())
        .map(|r| MissingTaxon {
            ordinal: r.ordinal,
            name: r.request.name.clone(),
            taxon: r.taxon.clone(),
            metadata: r.request.metadata.clone(),
        })
        .collect();

    (tables, missing)
}

/// Metadata row × M records, or one row without a record.
fn expand_rows(result: &ReconciliationResult, picked: Option<&SourceSelection>) -> Vec<RecordRow> {
    let row = |source_id: Option<String>, record: Option<RecordCells>, status| RecordRow {
        ordinal: result.ordinal,
        name: result.request.name.clone(),
        taxon: result.taxon.clone(),
        metadata: result.request.metadata.clone(),
        source_id,
        record,
        status,
        band: Band::default(),
        unverified: result.unverified,
    };

    match picked {
        Some(selection) if !selection.is_empty() && result.status != RecordStatus::Excluded => {
            selection
                .records
                .iter()
                .map(|rec| {
                    row(
                        Some(selection.source_id.clone()),
                        Some(RecordCells::from(rec)),
                        RecordStatus::Found,
                    )
                })
                .collect()
        }
        _ => {
            let status = match result.status {
                RecordStatus::Excluded => RecordStatus::Excluded,
                _ => RecordStatus::Missing,
            };
            vec![row(picked.map(|s| s.source_id.clone()), None, status)]
        }
    }
}
