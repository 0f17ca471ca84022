//! Run configuration
//!
//! Loaded from YAML and validated once before a run. Connection details for
//! the institutional databases are not part of this file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ReconcileError, Result};
use crate::synonym::ExpansionMode;

/// Default redaction token for masked sources.
pub const DEFAULT_REDACTION_TOKEN: &str = "REDACTED";

/// Default maximum number of records selected per taxon.
pub const DEFAULT_MAX_RECORDS: usize = 25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Sources queried for presence, in report column order.
    pub presence_sources: Vec<PresenceSourceConfig>,
    /// Sources queried for records, highest priority first.
    #[serde(default)]
    pub record_sources: Vec<String>,
    #[serde(default = "default_max_records")]
    pub max_records_per_taxon: usize,
    /// Collect records from every record source instead of stopping at the
    /// first one with matches.
    #[serde(default)]
    pub all_sources: bool,
    #[serde(default)]
    pub expansion: ExpansionMode,
    /// Display names whose records are withheld from record reports.
    #[serde(default)]
    pub excluded_names: Vec<String>,
    #[serde(default)]
    pub redaction: Option<RedactionConfig>,
}

/// A presence source and whether it belongs to the collaborator subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSourceConfig {
    pub id: String,
    #[serde(default)]
    pub collaborator: bool,
}

/// Produce a masked copy of record reports for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    pub source: String,
    #[serde(default = "default_token")]
    pub token: String,
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_token() -> String {
    DEFAULT_REDACTION_TOKEN.to_string()
}

impl ReconcileConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ReconcileConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.presence_sources.is_empty() && self.record_sources.is_empty() {
            return Err(ReconcileError::Config("no sources configured".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.presence_sources {
            if !seen.insert(source.id.as_str()) {
                return Err(ReconcileError::Config(format!(
                    "duplicate presence source '{}'",
                    source.id
                )));
            }
        }

        let mut seen = HashSet::new();
        for id in &self.record_sources {
            if !seen.insert(id.as_str()) {
                return Err(ReconcileError::Config(format!(
                    "duplicate record source '{}'",
                    id
                )));
            }
        }

        if self.max_records_per_taxon == 0 {
            return Err(ReconcileError::Config(
                "max_records_per_taxon must be at least 1".into(),
            ));
        }

        if let Some(redaction) = &self.redaction {
            let known = self.record_sources.iter().any(|id| id == &redaction.source)
                || self.presence_sources.iter().any(|s| s.id == redaction.source);
            if !known {
                return Err(ReconcileError::Config(format!(
                    "redaction source '{}' is not a configured source",
                    redaction.source
                )));
            }
        }

        Ok(())
    }

    pub fn collaborator_ids(&self) -> HashSet<&str> {
        self.presence_sources
            .iter()
            .filter(|s| s.collaborator)
            .map(|s| s.id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
presence_sources:
  - { id: amnh, collaborator: true }
  - { id: lsumns, collaborator: true }
  - { id: vertnet }
record_sources: [tissues, vertnet, ala]
expansion: closure
excluded_names: ["Zosterops nova"]
redaction:
  source: vertnet
"#;

    #[test]
    fn test_parse_config() {
        let config = ReconcileConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.presence_sources.len(), 3);
        assert_eq!(config.max_records_per_taxon, DEFAULT_MAX_RECORDS);
        assert!(!config.all_sources);
        assert_eq!(config.expansion, ExpansionMode::Closure);
        assert_eq!(config.redaction.as_ref().unwrap().token, "REDACTED");
        assert_eq!(config.collaborator_ids(), HashSet::from(["amnh", "lsumns"]));
    }

    #[test]
    fn test_rejects_duplicate_source() {
        let yaml = r#"
presence_sources:
  - { id: amnh }
  - { id: amnh }
"#;
        let err = ReconcileConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate presence source 'amnh'"));
    }

    #[test]
    fn test_rejects_zero_max_records() {
        let yaml = r#"
presence_sources: []
record_sources: [tissues]
max_records_per_taxon: 0
"#;
        assert!(matches!(
            ReconcileConfig::from_yaml(yaml),
            Err(ReconcileError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_redaction_source() {
        let yaml = r#"
presence_sources: [{ id: amnh }]
redaction: { source: fmnh, token: "***" }
"#;
        assert!(ReconcileConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ReconcileConfig::from_file(file.path()).unwrap();
        assert_eq!(config.record_sources, vec!["tissues", "vertnet", "ala"]);
    }
}
