//! Report Schema Registry
//!
//! A declarative mapping from `(source, report_name)` to a target warehouse
//! table and its canonical column set, loaded once per run from a JSON
//! definition. The registry supplies naming rules to discovery and the
//! expected column set to validation; it is the single routing authority
//! (there is no hard-coded fallback map).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::RegistryError;

/// Top-level shape of the registry definition file
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryFile {
    pub sources: Vec<SourceDefinition>,
}

/// One upstream producer and the warehouse schema its reports land in
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    pub source_name: String,
    pub target_schema: String,
    pub reports: Vec<ReportDefinition>,
}

/// One logical report: where it goes and what columns it may carry
#[derive(Debug, Clone, Deserialize)]
pub struct ReportDefinition {
    pub report_name: String,
    pub target_table: String,
    pub columns: Vec<String>,
}

/// Routing data for one resolved `(source, report)` pair
#[derive(Debug, Clone, Copy)]
pub struct ResolvedReport<'a> {
    pub target_schema: &'a str,
    pub target_table: &'a str,
    pub expected_columns: &'a [String],
}

#[derive(Debug)]
struct SourceEntry {
    target_schema: String,
    reports: HashMap<String, ReportDefinition>,
}

/// Loaded registry, indexed for resolution
#[derive(Debug)]
pub struct Registry {
    sources: HashMap<String, SourceEntry>,
}

impl Registry {
    /// Load the registry from a JSON definition file.
    ///
    /// Any read or parse failure here is fatal to the run: callers must not
    /// begin discovery without a registry.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: RegistryFile =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), sources = file.sources.len(), "loaded registry definition");

        Ok(Self::from_definition(file))
    }

    /// Build a registry from an already-parsed definition.
    pub fn from_definition(file: RegistryFile) -> Self {
        let sources = file
            .sources
            .into_iter()
            .map(|source| {
                let reports = source
                    .reports
                    .into_iter()
                    .map(|report| (report.report_name.clone(), report))
                    .collect();
                (
                    source.source_name,
                    SourceEntry {
                        target_schema: source.target_schema,
                        reports,
                    },
                )
            })
            .collect();

        Self { sources }
    }

    /// Resolve a `(source, report_name)` pair to its routing data.
    ///
    /// An unknown pair yields [`RegistryError::UnknownReport`], which callers
    /// treat as a per-artifact skip, never a process abort.
    pub fn resolve(
        &self,
        source: &str,
        report_name: &str,
    ) -> Result<ResolvedReport<'_>, RegistryError> {
        let unknown = || RegistryError::UnknownReport {
            source_name: source.to_string(),
            report: report_name.to_string(),
        };

        let entry = self.sources.get(source).ok_or_else(unknown)?;
        let report = entry.reports.get(report_name).ok_or_else(unknown)?;

        Ok(ResolvedReport {
            target_schema: &entry.target_schema,
            target_table: &report.target_table,
            expected_columns: &report.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Registry {
        let file: RegistryFile = serde_json::from_str(
            r#"{
                "sources": [
                    {
                        "source_name": "affiliate",
                        "target_schema": "raw_affiliate",
                        "reports": [
                            {
                                "report_name": "Fee-Orders",
                                "target_table": "orders",
                                "columns": ["category", "name", "asin", "price"]
                            }
                        ]
                    }
                ]
            }"#,
        )
        .unwrap();
        Registry::from_definition(file)
    }

    #[test]
    fn test_resolve_known_report() {
        let registry = sample();
        let resolved = registry.resolve("affiliate", "Fee-Orders").unwrap();
        assert_eq!(resolved.target_schema, "raw_affiliate");
        assert_eq!(resolved.target_table, "orders");
        assert_eq!(resolved.expected_columns.len(), 4);
    }

    #[test]
    fn test_resolve_unknown_report() {
        let registry = sample();
        let err = registry.resolve("affiliate", "Fee-Unknown").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownReport { .. }));
    }

    #[test]
    fn test_resolve_unknown_source() {
        let registry = sample();
        let err = registry.resolve("nonesuch", "Fee-Orders").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownReport { .. }));
    }

    #[test]
    fn test_unknown_report_message_names_source_and_report() {
        let registry = sample();
        let err = registry.resolve("nonesuch", "Fee-Orders").unwrap_err();
        assert_eq!(err.to_string(), "unknown report Fee-Orders for source nonesuch");
    }

    #[test]
    fn test_load_missing_file_is_fatal_read() {
        let err = Registry::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Read { .. }));
    }

    #[test]
    fn test_load_bad_json_is_fatal_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Registry::load(&path).unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }
}
