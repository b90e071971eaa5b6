//! Discovery over a local landing directory
//!
//! Producers drop CSV exports named
//! `<dataYear>-<reportPrefix>-<reportSuffix>-<refreshYear>-<refreshMonth>-<refreshDay>.csv`,
//! six hyphen-delimited stem fields in total. The file name is the artifact
//! identity; the report prefix and suffix route it through the registry.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

use super::{ArtifactDescriptor, ArtifactLocation};
use crate::error::{DiscoveryError, RegistryError};
use crate::registry::Registry;

/// Fields parsed out of a conforming landing file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLandingName {
    /// Year the data inside the export refers to
    pub data_year: i32,
    /// `<prefix>-<suffix>`, the producer's report identifier
    pub report_name: String,
    /// Producer-declared refresh date
    pub refresh_date: NaiveDate,
}

/// Parse a landing file name against the six-field convention.
pub fn parse_landing_name(name: &str) -> Result<ParsedLandingName, DiscoveryError> {
    let path = Path::new(name);

    if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
        return Err(DiscoveryError::NotCsv {
            name: name.to_string(),
        });
    }

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();

    let fields: Vec<&str> = stem.split('-').collect();
    let [data_year, prefix, suffix, refresh_y, refresh_m, refresh_d] = fields[..] else {
        return Err(DiscoveryError::FieldCount {
            name: name.to_string(),
            found: fields.len(),
        });
    };

    let numeric = (
        data_year.parse::<i32>(),
        refresh_y.parse::<i32>(),
        refresh_m.parse::<u32>(),
        refresh_d.parse::<u32>(),
    );
    let (Ok(data_year), Ok(refresh_y), Ok(refresh_m), Ok(refresh_d)) = numeric else {
        return Err(DiscoveryError::NonNumericDate {
            name: name.to_string(),
        });
    };

    let refresh_date = NaiveDate::from_ymd_opt(refresh_y, refresh_m, refresh_d).ok_or(
        DiscoveryError::InvalidDate {
            name: name.to_string(),
        },
    )?;

    Ok(ParsedLandingName {
        data_year,
        report_name: format!("{prefix}-{suffix}"),
        refresh_date,
    })
}

/// Scan a landing directory and return a descriptor per conforming entry.
///
/// Entries that fail name validation or reference an unregistered report
/// are skipped with a diagnostic; the scan always covers the whole
/// directory. Entries come back sorted by file name so that application
/// order is stable across runs.
pub fn discover_local(
    dir: &Path,
    source: &str,
    registry: &Registry,
) -> Result<Vec<ArtifactDescriptor>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read landing directory {}", dir.display()))?;

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry.context("failed to read landing directory entry")?;
        if entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    warn!(
                        entry = %raw.to_string_lossy(),
                        "skipping landing entry with a non-UTF-8 name"
                    );
                },
            }
        }
    }
    names.sort();

    let mut descriptors = Vec::new();
    for name in names {
        let parsed = match parse_landing_name(&name) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(entry = %name, %reason, "skipping landing entry");
                continue;
            },
        };

        let resolved = match registry.resolve(source, &parsed.report_name) {
            Ok(resolved) => resolved,
            Err(RegistryError::UnknownReport { report, .. }) => {
                let reason = DiscoveryError::UnknownReport {
                    name: name.clone(),
                    report,
                };
                warn!(entry = %name, %reason, "skipping landing entry");
                continue;
            },
            Err(other) => return Err(other.into()),
        };

        debug!(
            entry = %name,
            report = %parsed.report_name,
            table = %resolved.target_table,
            "discovered landing artifact"
        );

        descriptors.push(ArtifactDescriptor {
            artifact_id: name.clone(),
            source: source.to_string(),
            report_name: parsed.report_name,
            target_schema: resolved.target_schema.to_string(),
            target_table: resolved.target_table.to_string(),
            refresh_ts: parsed
                .refresh_date
                .and_time(NaiveTime::MIN)
                .and_utc(),
            location: ArtifactLocation::Local(dir.join(&name)),
        });
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_name() {
        let parsed = parse_landing_name("2024-Fee-Orders-2024-01-15.csv").unwrap();
        assert_eq!(parsed.data_year, 2024);
        assert_eq!(parsed.report_name, "Fee-Orders");
        assert_eq!(parsed.refresh_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_rejects_wrong_extension() {
        let err = parse_landing_name("2024-Fee-Orders-2024-01-15.csv.bak").unwrap_err();
        assert!(matches!(err, DiscoveryError::NotCsv { .. }));

        let err = parse_landing_name("2024-Fee-Orders-2024-01-15.txt").unwrap_err();
        assert!(matches!(err, DiscoveryError::NotCsv { .. }));
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = parse_landing_name("bad-name.csv").unwrap_err();
        assert_eq!(
            err,
            DiscoveryError::FieldCount {
                name: "bad-name.csv".to_string(),
                found: 2,
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_numeric_dates() {
        let err = parse_landing_name("2024-Fee-Orders-2024-Jan-15.csv").unwrap_err();
        assert!(matches!(err, DiscoveryError::NonNumericDate { .. }));
    }

    #[test]
    fn test_parse_rejects_impossible_date() {
        let err = parse_landing_name("2024-Fee-Orders-2024-13-15.csv").unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidDate { .. }));
    }
}
