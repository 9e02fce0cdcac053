//! Integration tests for legacy document conversion.

use std::path::PathBuf;

use chnav::application::digest::channel_digest;
use chnav::domain::{legacy, Database, Diagnostic, DocumentFormat, ViolationKind};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(name)
}

fn read(name: &str) -> String {
    std::fs::read_to_string(fixture(name)).expect("read fixture")
}

#[test]
fn given_legacy_and_explicit_twins_when_enumerating_then_identical_identifiers() {
    let explicit = Database::parse(&read("accelerator.json")).expect("explicit loads");
    let converted = Database::parse(&read("accelerator_legacy.json")).expect("legacy loads");

    let a: Vec<String> = explicit.enumerate_all().map(|c| c.identifier).collect();
    let b: Vec<String> = converted.enumerate_all().map(|c| c.identifier).collect();

    assert_eq!(a, b);
    assert_eq!(channel_digest(&explicit), channel_digest(&converted));
}

#[test]
fn given_legacy_document_when_loading_then_records_diagnostic() {
    let db = Database::parse(&read("accelerator_legacy.json")).expect("legacy loads");

    assert_eq!(db.format(), DocumentFormat::Legacy);
    assert_eq!(db.diagnostics(), &[Diagnostic::LegacyConverted]);
}

#[test]
fn given_explicit_document_when_loading_then_no_diagnostics() {
    let db = Database::parse(&read("accelerator.json")).expect("explicit loads");

    assert_eq!(db.format(), DocumentFormat::Explicit);
    assert!(db.diagnostics().is_empty());
}

#[test]
fn given_converted_document_when_reloading_then_loads_as_explicit() {
    let document: serde_json::Value =
        serde_json::from_str(&read("accelerator_legacy.json")).expect("valid JSON");

    let converted = legacy::convert(&document).expect("converts");
    let db = chnav::domain::load(&converted).expect("converted document validates");

    assert!(!legacy::is_legacy(&converted));
    assert_eq!(db.format(), DocumentFormat::Explicit);
    assert_eq!(db.channel_count(), 19);
    assert_eq!(db.schema().levels()[2].name, "device");
    assert!(db.schema().levels()[2].is_instance());
}

#[test]
fn given_legacy_without_definition_when_loading_then_legacy_structure_error() {
    let text = r#"{"naming_pattern": "{a}", "tree": {"X": {}}}"#;

    let err = Database::parse(text).unwrap_err();

    assert!(err.is_legacy_conversion());
    assert!(err.has_kind(ViolationKind::LegacyStructure));
}

#[test]
fn given_devices_without_type_when_loading_then_legacy_structure_error() {
    let text = r#"{
        "hierarchy_definition": ["system", "device"],
        "naming_pattern": "{system}:{device}",
        "tree": {"MAG": {"devices": {"_range": [1, 2]}}}
    }"#;

    let err = Database::parse(text).unwrap_err();

    assert!(err.is_legacy_conversion());
    assert_eq!(err.violations.len(), 1);
    assert!(err.violations[0].path.contains("devices"));
}
