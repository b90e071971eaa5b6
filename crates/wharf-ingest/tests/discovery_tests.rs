//! End-to-end discovery tests over a real landing directory

use std::fs;

use wharf_ingest::locator::{discover_local, ArtifactLocation};
use wharf_ingest::registry::{Registry, RegistryFile};

fn registry() -> Registry {
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
                        },
                        {
                            "report_name": "Fee-Earnings",
                            "target_table": "commissions",
                            "columns": ["category", "name", "asin", "price", "ad_fees"]
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
fn discovery_skips_malformed_entries_and_keeps_scanning() {
    let dir = tempfile::tempdir().unwrap();

    // One valid artifact, one wrong extension, one wrong field count.
    fs::write(dir.path().join("2024-Fee-Orders-2024-01-15.csv"), "category\nBooks\n").unwrap();
    fs::write(dir.path().join("2024-Fee-Orders-2024-01-15.csv.bak"), "stale").unwrap();
    fs::write(dir.path().join("bad-name.csv"), "category\n").unwrap();

    let descriptors = discover_local(dir.path(), "affiliate", &registry()).unwrap();

    assert_eq!(descriptors.len(), 1);
    let descriptor = &descriptors[0];
    assert_eq!(descriptor.artifact_id, "2024-Fee-Orders-2024-01-15.csv");
    assert_eq!(descriptor.report_name, "Fee-Orders");
    assert_eq!(descriptor.target_schema, "raw_affiliate");
    assert_eq!(descriptor.target_table, "orders");
    assert_eq!(descriptor.refresh_ts.to_rfc3339(), "2024-01-15T00:00:00+00:00");
    assert_eq!(
        descriptor.location,
        ArtifactLocation::Local(dir.path().join("2024-Fee-Orders-2024-01-15.csv"))
    );
}

#[test]
fn discovery_skips_unregistered_reports() {
    let dir = tempfile::tempdir().unwrap();

    fs::write(dir.path().join("2024-Fee-Mystery-2024-01-15.csv"), "category\n").unwrap();
    fs::write(dir.path().join("2024-Fee-Orders-2024-01-15.csv"), "category\n").unwrap();

    let descriptors = discover_local(dir.path(), "affiliate", &registry()).unwrap();

    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].report_name, "Fee-Orders");
}

#[test]
fn discovery_order_is_stable_by_name() {
    let dir = tempfile::tempdir().unwrap();

    fs::write(dir.path().join("2024-Fee-Orders-2024-02-01.csv"), "category\n").unwrap();
    fs::write(dir.path().join("2024-Fee-Earnings-2024-01-15.csv"), "category\n").unwrap();
    fs::write(dir.path().join("2024-Fee-Orders-2024-01-15.csv"), "category\n").unwrap();

    let descriptors = discover_local(dir.path(), "affiliate", &registry()).unwrap();

    let ids: Vec<&str> = descriptors.iter().map(|d| d.artifact_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "2024-Fee-Earnings-2024-01-15.csv",
            "2024-Fee-Orders-2024-01-15.csv",
            "2024-Fee-Orders-2024-02-01.csv",
        ]
    );
}

#[cfg(unix)]
#[test]
fn discovery_skips_non_utf8_names_and_keeps_scanning() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempfile::tempdir().unwrap();

    let mangled = OsStr::from_bytes(b"2024-Fee-Orders-2024-01-16\xff.csv");
    fs::write(dir.path().join(mangled), "category\n").unwrap();
    fs::write(dir.path().join("2024-Fee-Orders-2024-01-15.csv"), "category\n").unwrap();

    let descriptors = discover_local(dir.path(), "affiliate", &registry()).unwrap();

    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].artifact_id, "2024-Fee-Orders-2024-01-15.csv");
}

#[test]
fn discovery_of_empty_directory_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let descriptors = discover_local(dir.path(), "affiliate", &registry()).unwrap();
    assert!(descriptors.is_empty());
}
