//! Holdings reconciliation runner
//!
//! Runs a family batch presence run and a record run against a YAML snapshot
//! and writes the reports to stdout as JSON.

use anyhow::{Context, Result};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use openwings_reconcile::{
    family_counts, merge_down_uncollected, IocList, ReconcileConfig, Reconciler, Snapshot,
};

/// Default configuration path
const DEFAULT_CONFIG_PATH: &str = "config/reconcile.yaml";

/// Default snapshot path
const DEFAULT_SNAPSHOT_PATH: &str = "config/snapshot.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "openwings_reconcile=info,reconcile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path =
        std::env::var("RECONCILE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let snapshot_path =
        std::env::var("RECONCILE_SNAPSHOT").unwrap_or_else(|_| DEFAULT_SNAPSHOT_PATH.to_string());

    tracing::info!(path = %config_path, "Loading configuration");
    let config = ReconcileConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    tracing::info!(path = %snapshot_path, "Loading snapshot");
    let mut snapshot = Snapshot::from_file(&snapshot_path)
        .with_context(|| format!("loading {}", snapshot_path))?;

    // Optional IOC master list replaces the snapshot's reference taxa
    if let Ok(ioc_path) = std::env::var("RECONCILE_IOC") {
        let list = IocList::from_file(&ioc_path).with_context(|| format!("loading {}", ioc_path))?;
        let widths = list.field_widths();
        tracing::info!(
            version = %list.version,
            order = widths.order,
            family = widths.family,
            genus = widths.genus,
            species = widths.species,
            authority = widths.authority,
            common_name = widths.common_name,
            breeding_regions = widths.breeding_regions,
            "IOC column widths"
        );
        snapshot.reference.taxa = list.taxa;
    }

    let requests = std::mem::take(&mut snapshot.requests);
    let (reference, registry) = snapshot.into_stores();
    let reconciler = Reconciler::new(config, reference, &registry).await?;

    let families = reconciler.presence_for_all_families().await?;
    let records = reconciler.records_for_requests(&requests).await?;
    let fingerprint = records.report.fingerprint()?;

    let output = json!({
        "families": families,
        "family_counts": family_counts(&families),
        "uncollected": merge_down_uncollected(&families),
        "records": records.report,
        "records_masked": records.masked,
        "fingerprint": fingerprint,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    tracing::info!(%fingerprint, "Done");
    Ok(())
}
