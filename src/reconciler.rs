//! Run orchestration
//!
//! A [`Reconciler`] is built once per run: it validates the configuration,
//! resolves every configured source against the registry and loads the
//! synonym graph. The graph is read-only afterwards.
//!
//! Per-taxon problems become diagnostics on the report. Any source failure
//! aborts the run and no report is returned.

use std::collections::HashSet;
use std::sync::Arc;

use crate::classify::{Classification, SpeciesRequest, TaxonClassifier};
use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result, TaxonDiagnostic};
use crate::policy::{apply_bands, mask_source, ExclusionPolicy, MaskedReports};
use crate::ports::{SourceRegistry, SpeciesReferenceStore};
use crate::presence::{PresenceAggregator, TaxonPresence};
use crate::report::{
    assemble_presence, assemble_records, FamilyReport, PresenceReport, ReconciliationResult,
    RecordReport, RunInfo,
};
use crate::selector::{RecordSelector, SelectionPolicy};
use crate::synonym::{Expansion, SynonymExpander, SynonymGraph};
use crate::taxon::Taxon;

/// Output of a record-mode run.
#[derive(Debug, Clone)]
pub struct RecordOutput {
    pub report: RecordReport,
    /// Copy with the configured source's values redacted.
    pub masked: Option<RecordReport>,
}

pub struct Reconciler {
    config: ReconcileConfig,
    reference: Arc<dyn SpeciesReferenceStore>,
    graph: SynonymGraph,
    presence: PresenceAggregator,
    selector: RecordSelector,
    exclusions: ExclusionPolicy,
}

impl Reconciler {
    pub async fn new(
        config: ReconcileConfig,
        reference: Arc<dyn SpeciesReferenceStore>,
        registry: &SourceRegistry,
    ) -> Result<Self> {
        config.validate()?;

        let mut presence_sources = Vec::with_capacity(config.presence_sources.len());
        for source in &config.presence_sources {
            presence_sources.push((source.clone(), registry.get(&source.id)?));
        }
        let record_sources = registry.resolve(&config.record_sources)?;

        let graph = SynonymGraph::load(reference.as_ref()).await?;
        tracing::info!(
            edges = graph.edge_count(),
            presence_sources = presence_sources.len(),
            record_sources = record_sources.len(),
            expansion = ?config.expansion,
            "Reconciler ready"
        );

        let selector = RecordSelector::new(
            record_sources,
            SelectionPolicy {
                max_records: config.max_records_per_taxon,
                all_sources: config.all_sources,
            },
        );

        Ok(Self {
            presence: PresenceAggregator::new(presence_sources),
            exclusions: ExclusionPolicy::new(&config.excluded_names),
            selector,
            graph,
            reference,
            config,
        })
    }

    fn classifier(&self) -> TaxonClassifier<'_> {
        TaxonClassifier::new(self.reference.as_ref(), &self.graph)
    }

    fn expander(&self) -> SynonymExpander<'_> {
        SynonymExpander::new(&self.graph, self.config.expansion)
    }

    /// Classify and expand one taxon. `Ok(None)` means the taxon was reported
    /// and skipped.
    fn resolve(
        &self,
        name: &str,
        classified: Result<Classification>,
        diagnostics: &mut Vec<TaxonDiagnostic>,
    ) -> Result<Option<(Expansion, bool)>> {
        let classification = match classified {
            Ok(c) => c,
            Err(e) => {
                let Some(diagnostic) = TaxonDiagnostic::from_error(name, &e) else {
                    return Err(e);
                };
                tracing::warn!(taxon = %name, kind = ?diagnostic.kind, "Skipping taxon");
                diagnostics.push(diagnostic);
                return Ok(None);
            }
        };

        let unverified = classification.is_unverified();
        if unverified {
            let e = ReconcileError::UnresolvedTaxon {
                name: classification.taxon().display_name(),
            };
            if let Some(diagnostic) = TaxonDiagnostic::from_error(name, &e) {
                diagnostics.push(diagnostic);
            }
        }

        Ok(Some((self.expander().expand(&classification), unverified)))
    }

    /// Presence for a fixed list of reference taxa, outer-joined onto that list.
    pub async fn presence_for_taxa(
        &self,
        reference: &[Taxon],
        scope: Option<String>,
    ) -> Result<PresenceReport> {
        let classifier = self.classifier();
        let mut diagnostics = Vec::new();
        let mut results: Vec<TaxonPresence> = Vec::new();
        let mut seen = HashSet::new();

        for taxon in reference {
            if !seen.insert(taxon) {
                continue;
            }
            let name = taxon.display_name();
            let classified = classifier.classify_taxon(taxon.clone()).await;
            let Some((expansion, unverified)) =
                self.resolve(&name, classified, &mut diagnostics)?
            else {
                continue;
            };
            results.push(self.presence.aggregate(&expansion, unverified).await?);
        }

        let sources: Vec<_> = self.presence.source_configs().cloned().collect();
        Ok(PresenceReport {
            run: RunInfo::new(),
            rows: assemble_presence(reference, &results, &sources),
            scope,
            sources,
            diagnostics,
        })
    }

    /// Presence for free-text names. The left side of the join is every name
    /// that could be parsed and classified.
    pub async fn presence_for_species(&self, names: &[String]) -> Result<PresenceReport> {
        let classifier = self.classifier();
        let mut diagnostics = Vec::new();
        let mut subjects = Vec::new();
        let mut results = Vec::new();

        for name in names {
            let classified = classifier.classify(name).await;
            let Some((expansion, unverified)) =
                self.resolve(name, classified, &mut diagnostics)?
            else {
                continue;
            };
            if subjects.contains(&expansion.subject) {
                continue;
            }
            subjects.push(expansion.subject.clone());
            results.push(self.presence.aggregate(&expansion, unverified).await?);
        }

        let sources: Vec<_> = self.presence.source_configs().cloned().collect();
        Ok(PresenceReport {
            run: RunInfo::new(),
            rows: assemble_presence(&subjects, &results, &sources),
            scope: None,
            sources,
            diagnostics,
        })
    }

    pub async fn presence_for_family(&self, family: &str) -> Result<FamilyReport> {
        let taxa: Vec<Taxon> = self
            .reference
            .list_reference_taxa(Some(family))
            .await?
            .into_iter()
            .map(|r| r.taxon)
            .collect();

        let scope = Some(family.to_string());
        let report = FamilyReport::new(self.presence_for_taxa(&taxa, scope).await?);
        let s = &report.summary;
        tracing::info!(
            family = %s.family,
            species = s.species,
            present_any = s.present_any,
            present_collaborators = s.present_collaborators,
            missing_collaborators = s.missing_collaborators,
            missing_any = s.missing_any,
            "Family reconciled"
        );
        Ok(report)
    }

    /// One report per family, in family name order.
    pub async fn presence_for_all_families(&self) -> Result<Vec<FamilyReport>> {
        let families = self.reference.list_families().await?;
        tracing::info!(families = families.len(), "Starting family batch");

        let mut reports = Vec::with_capacity(families.len());
        for family in &families {
            reports.push(self.presence_for_family(family).await?);
        }
        Ok(reports)
    }

    /// Ranked record selection for each request, then exclusion, banding and
    /// masking.
    pub async fn records_for_requests(&self, requests: &[SpeciesRequest]) -> Result<RecordOutput> {
        let classifier = self.classifier();
        let mut diagnostics = Vec::new();
        let mut results: Vec<ReconciliationResult> = Vec::new();

        for request in requests {
            if request.is_completed() {
                tracing::debug!(taxon = %request.name, "Already completed, skipping");
                continue;
            }

            let classified = classifier.classify(&request.name).await;
            let Some((expansion, unverified)) =
                self.resolve(&request.name, classified, &mut diagnostics)?
            else {
                continue;
            };

            let selection = self.selector.select(&expansion).await?;
            let mut result = ReconciliationResult::new(
                results.len(),
                request.clone(),
                expansion,
                unverified,
                selection,
            );
            self.exclusions.apply(&mut result);
            results.push(result);
        }

        let (tables, missing) = assemble_records(
            &results,
            &self.config.record_sources,
            self.config.all_sources,
        );
        let mut report = RecordReport {
            run: RunInfo::new(),
            all_sources: self.config.all_sources,
            tables,
            missing,
            diagnostics,
        };
        apply_bands(&mut report);

        tracing::info!(
            taxa = results.len(),
            missing = report.missing.len(),
            diagnostics = report.diagnostics.len(),
            "Record selection complete"
        );

        Ok(match &self.config.redaction {
            Some(redaction) => {
                let MaskedReports { original, masked } =
                    mask_source(&report, &redaction.source, &redaction.token);
                RecordOutput {
                    report: original,
                    masked: Some(masked),
                }
            }
            None => RecordOutput {
                report,
                masked: None,
            },
        })
    }
}
