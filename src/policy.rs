//! Output policies applied after selection
//!
//! - exclusion: withhold records for listed display names
//! - banding: alternate a two-valued marker between consecutive taxa
//! - masking: produce a copy of a record report with one source's values
//!   replaced by a redaction token

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::report::{Band, RecordReport, RecordStatus, ReconciliationResult};

/// Display names whose records are never shown.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    names: HashSet<String>,
}

impl ExclusionPolicy {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize(n.as_ref()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.names.contains(&normalize(name))
    }

    /// Force the result's record lists empty and mark it `Excluded`.
    ///
    /// Matches either the requested name or the resolved display name.
    /// Returns whether the result was excluded.
    pub fn apply(&self, result: &mut ReconciliationResult) -> bool {
        if !self.is_excluded(&result.request.name)
            && !self.is_excluded(&result.taxon.display_name())
        {
            return false;
        }

        result.withheld = result.selection.records().len();
        result.selection.chosen = None;
        for queried in &mut result.selection.queried {
            queried.records.clear();
        }
        result.status = RecordStatus::Excluded;
        tracing::info!(
            taxon = %result.taxon,
            withheld = result.withheld,
            "Excluded from record output"
        );
        true
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Set every row's band from its taxon ordinal.
///
/// All rows of one taxon share a band and the assignment is the same in every
/// table of the report. Excluded rows get [`Band::Withheld`] but keep their
/// ordinal, so the taxa after them alternate as if they were shaded.
pub fn apply_bands(report: &mut RecordReport) {
    for table in &mut report.tables {
        for row in &mut table.rows {
            row.band = match row.status {
                RecordStatus::Excluded => Band::Withheld,
                _ => Band::for_ordinal(row.ordinal),
            };
        }
    }
}

/// Unmasked and masked variants of one record report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskedReports {
    pub original: RecordReport,
    pub masked: RecordReport,
}

/// Replace every record value from `source_id` with `token`, keeping the
/// matched name and source id so rows still join.
pub fn mask_source(report: &RecordReport, source_id: &str, token: &str) -> MaskedReports {
    let mut masked = report.clone();
    let mut replaced = 0usize;

    for table in &mut masked.tables {
        for row in &mut table.rows {
            if row.source_id.as_deref() != Some(source_id) {
                continue;
            }
            if let Some(record) = row.record.as_mut() {
                for value in record.values.values_mut() {
                    *value = token.to_string();
                }
                replaced += 1;
            }
        }
    }

    tracing::debug!(source = %source_id, rows = replaced, "Masked record rows");

    MaskedReports {
        original: report.clone(),
        masked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SpeciesRequest;
    use crate::ports::HoldingRecord;
    use crate::report::{assemble_records, RunInfo};
    use crate::selector::{Selection, SourceSelection};
    use crate::synonym::Expansion;
    use crate::taxon::Taxon;

    fn result(ordinal: usize, name: &str, source: &str, n: usize) -> ReconciliationResult {
        let taxon = Taxon::parse_display(name).unwrap();
        let records: Vec<HoldingRecord> = (0..n)
            .map(|i| {
                HoldingRecord::new(source, taxon.clone())
                    .with_catalog_number(format!("{}-{}", source, i))
                    .with_institution_code("KU")
            })
            .collect();
        let chosen = (!records.is_empty()).then(|| SourceSelection {
            source_id: source.into(),
            total_matches: records.len(),
            records,
        });
        ReconciliationResult::new(
            ordinal,
            SpeciesRequest::new(name),
            Expansion::identity(taxon),
            false,
            Selection {
                queried: chosen.iter().cloned().collect(),
                chosen,
            },
        )
    }

    fn report(results: &[ReconciliationResult]) -> RecordReport {
        let (tables, missing) = assemble_records(results, &[], false);
        RecordReport {
            run: RunInfo::new(),
            all_sources: false,
            tables,
            missing,
            diagnostics: vec![],
        }
    }

    #[test]
    fn excluded_taxon_has_no_records_and_is_not_missing() {
        let policy = ExclusionPolicy::new(["Zosterops  nova"]);
        let mut excluded = result(0, "Zosterops nova", "tissues", 3);
        assert!(policy.apply(&mut excluded));
        assert_eq!(excluded.status, RecordStatus::Excluded);
        assert!(excluded.selection.records().is_empty());
        assert_eq!(excluded.withheld, 3);

        let report = report(&[excluded]);
        let rows = &report.selected().unwrap().rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RecordStatus::Excluded);
        assert!(rows[0].record.is_none());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn excluded_taxon_without_records_stays_missing() {
        let policy = ExclusionPolicy::new(["Zosterops nova"]);
        let mut excluded = result(0, "Zosterops nova", "tissues", 0);
        policy.apply(&mut excluded);
        assert_eq!(report(&[excluded]).missing.len(), 1);
    }

    #[test]
    fn other_taxa_are_untouched() {
        let policy = ExclusionPolicy::new(["Zosterops nova"]);
        let mut kept = result(0, "Passer domesticus", "tissues", 2);
        assert!(!policy.apply(&mut kept));
        assert_eq!(kept.status, RecordStatus::Found);
    }

    #[test]
    fn bands_alternate_between_taxa_not_rows() {
        let mut report = report(&[
            result(0, "Passer domesticus", "tissues", 2),
            result(1, "Passer montanus", "tissues", 0),
            result(2, "Corvus corax", "tissues", 3),
        ]);
        apply_bands(&mut report);
        let bands: Vec<Band> = report.tables[0].rows.iter().map(|r| r.band).collect();
        assert_eq!(
            bands,
            vec![
                Band::Even,
                Band::Even,
                Band::Odd,
                Band::Even,
                Band::Even,
                Band::Even,
            ]
        );
    }

    #[test]
    fn excluded_taxa_are_withheld_and_keep_their_slot() {
        let policy = ExclusionPolicy::new(["Passer montanus"]);
        let mut excluded = result(1, "Passer montanus", "tissues", 1);
        policy.apply(&mut excluded);
        let mut report = report(&[
            result(0, "Passer domesticus", "tissues", 1),
            excluded,
            result(2, "Corvus corax", "tissues", 1),
        ]);
        apply_bands(&mut report);

        let bands: Vec<Band> = report.tables[0].rows.iter().map(|r| r.band).collect();
        assert_eq!(bands, vec![Band::Even, Band::Withheld, Band::Even]);
    }

    #[test]
    fn masking_replaces_only_the_named_source() {
        let report = report(&[
            result(0, "Passer domesticus", "vertnet", 1),
            result(1, "Corvus corax", "tissues", 1),
        ]);
        let MaskedReports { original, masked } = mask_source(&report, "vertnet", "REDACTED");

        let rows = &masked.selected().unwrap().rows;
        let vertnet = rows[0].record.as_ref().unwrap();
        assert!(vertnet.values.values().all(|v| v == "REDACTED"));
        assert_eq!(vertnet.matched, Taxon::new("Passer", "domesticus"));
        assert_eq!(rows[0].source_id.as_deref(), Some("vertnet"));

        let tissues = rows[1].record.as_ref().unwrap();
        assert_eq!(tissues.values["catalog_number"], "tissues-0");

        let unmasked = original.selected().unwrap().rows[0].record.as_ref().unwrap();
        assert_eq!(unmasked.values["institution_code"], "KU");
    }
}
