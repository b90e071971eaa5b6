//! Discovery over an object-store prefix
//!
//! Producers land exports under partitioned keys shaped like
//! `<schema>/source=<source>[_<apiVersion>]/report=<report>/run_ts=<YYYYMMDDHHMMSS>/<file>`.
//! The `run_ts` value is the artifact identity: one run of the upstream
//! extractor produces exactly one artifact per report.
//!
//! Listing is paginated by the store; the locator drains every page before
//! discovery is considered complete (see [`crate::storage::drain_listing`]).

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use super::{ArtifactDescriptor, ArtifactLocation};
use crate::error::{DiscoveryError, RegistryError};
use crate::registry::Registry;
use crate::storage::Storage;

/// Format of the `run_ts=` key segment
pub const RUN_TS_FORMAT: &str = "%Y%m%d%H%M%S";

/// Fields parsed out of a conforming object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedObjectKey {
    /// Source name as landed, api version suffix included
    pub source: String,
    pub report_name: String,
    /// Raw `run_ts` value; doubles as the artifact identity
    pub run_ts_raw: String,
    pub run_ts: DateTime<Utc>,
}

fn segment_value<'a>(
    key: &str,
    segments: &[&'a str],
    tag: &'static str,
) -> Result<&'a str, DiscoveryError> {
    segments
        .iter()
        .find_map(|segment| segment.strip_prefix(tag))
        .filter(|value| !value.is_empty())
        .ok_or(DiscoveryError::MalformedKey {
            key: key.to_string(),
            segment: tag,
        })
}

/// Parse an object key against the partitioned-path convention.
pub fn parse_object_key(key: &str) -> Result<ParsedObjectKey, DiscoveryError> {
    let segments: Vec<&str> = key.split('/').collect();

    // A conforming key names a file, not a "directory" placeholder.
    if segments.last().map_or(true, |last| last.is_empty() || last.contains('=')) {
        return Err(DiscoveryError::MalformedKey {
            key: key.to_string(),
            segment: "file",
        });
    }

    let source = segment_value(key, &segments, "source=")?;
    let report_name = segment_value(key, &segments, "report=")?;
    let run_ts_raw = segment_value(key, &segments, "run_ts=")?;

    let run_ts = NaiveDateTime::parse_from_str(run_ts_raw, RUN_TS_FORMAT)
        .map_err(|_| DiscoveryError::MalformedKey {
            key: key.to_string(),
            segment: "run_ts=",
        })?
        .and_utc();

    Ok(ParsedObjectKey {
        source: source.to_string(),
        report_name: report_name.to_string(),
        run_ts_raw: run_ts_raw.to_string(),
        run_ts,
    })
}

/// List the prefix to exhaustion and return a descriptor per conforming key.
///
/// Keys that fail convention or registry validation are skipped with a
/// diagnostic; the listing itself is fully drained before any key is
/// judged, so a truncated page can never hide artifacts.
pub async fn discover_objects(
    storage: &Storage,
    prefix: &str,
    registry: &Registry,
) -> Result<Vec<ArtifactDescriptor>> {
    let keys = storage.list_all(prefix).await?;

    let mut descriptors = Vec::new();
    for key in keys {
        let parsed = match parse_object_key(&key) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(%key, %reason, "skipping object");
                continue;
            },
        };

        let resolved = match registry.resolve(&parsed.source, &parsed.report_name) {
            Ok(resolved) => resolved,
            Err(RegistryError::UnknownReport { report, .. }) => {
                let reason = DiscoveryError::UnknownReport {
                    name: key.clone(),
                    report,
                };
                warn!(%key, %reason, "skipping object");
                continue;
            },
            Err(other) => return Err(other.into()),
        };

        debug!(
            %key,
            report = %parsed.report_name,
            table = %resolved.target_table,
            "discovered object artifact"
        );

        descriptors.push(ArtifactDescriptor {
            artifact_id: parsed.run_ts_raw,
            source: parsed.source,
            report_name: parsed.report_name,
            target_schema: resolved.target_schema.to_string(),
            target_table: resolved.target_table.to_string(),
            refresh_ts: parsed.run_ts,
            location: ArtifactLocation::Object(key),
        });
    }

    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_key() {
        let parsed =
            parse_object_key("raw/source=videoanalytics_v2/report=ChannelDaily/run_ts=20240115093000/data.csv")
                .unwrap();
        assert_eq!(parsed.source, "videoanalytics_v2");
        assert_eq!(parsed.report_name, "ChannelDaily");
        assert_eq!(parsed.run_ts_raw, "20240115093000");
        assert_eq!(parsed.run_ts.to_rfc3339(), "2024-01-15T09:30:00+00:00");
    }

    #[test]
    fn test_parse_rejects_missing_run_ts() {
        let err = parse_object_key("raw/source=videoanalytics_v2/report=ChannelDaily/data.csv")
            .unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::MalformedKey { segment: "run_ts=", .. }
        ));
    }

    #[test]
    fn test_parse_rejects_unparseable_run_ts() {
        let err = parse_object_key(
            "raw/source=videoanalytics_v2/report=ChannelDaily/run_ts=2024-01-15/data.csv",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::MalformedKey { segment: "run_ts=", .. }
        ));
    }

    #[test]
    fn test_parse_rejects_directory_placeholder() {
        let err = parse_object_key(
            "raw/source=videoanalytics_v2/report=ChannelDaily/run_ts=20240115093000/",
        )
        .unwrap_err();
        assert!(matches!(err, DiscoveryError::MalformedKey { segment: "file", .. }));
    }

    #[test]
    fn test_build_key_round_trips() {
        let run_ts = NaiveDateTime::parse_from_str("20240115093000", RUN_TS_FORMAT)
            .unwrap()
            .and_utc();
        let key = crate::storage::build_key(
            "raw",
            "videoanalytics",
            Some("v2"),
            "ChannelDaily",
            &run_ts,
            "data.csv",
        );

        let parsed = parse_object_key(&key).unwrap();
        assert_eq!(parsed.source, "videoanalytics_v2");
        assert_eq!(parsed.report_name, "ChannelDaily");
        assert_eq!(parsed.run_ts, run_ts);
    }
}
