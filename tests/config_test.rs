//! Integration tests for Settings loading with layered precedence.
//!
//! These tests run without a global config (temp directories only), so
//! they exercise project config merging over the compiled defaults.

use std::fs;

use tempfile::TempDir;

use chnav::application::ApplicationError;
use chnav::config::{project_config_path, Settings};

#[test]
fn given_project_config_when_loading_then_overrides_defaults() {
    // Arrange
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join(".chnav.toml"),
        r#"
database = "channels.json"

[preview]
depth = 5
"#,
    )
    .unwrap();

    // Act
    let settings = Settings::load(Some(project.path())).expect("load settings");

    // Assert
    assert_eq!(settings.database, Some(project.path().join("channels.json")));
    assert_eq!(settings.preview.depth, 5);
    assert_eq!(settings.preview.max_items, 10, "unspecified keep default");
}

#[test]
fn given_absolute_database_when_loading_then_kept_as_is() {
    let project = TempDir::new().unwrap();
    let db = project.path().join("elsewhere/db.json");
    fs::write(
        project_config_path(project.path()),
        format!("database = {:?}\n", db.to_string_lossy()),
    )
    .unwrap();

    let settings = Settings::load(Some(project.path())).expect("load settings");

    assert_eq!(settings.database, Some(db));
}

#[test]
fn given_enumerate_limit_when_loading_then_applied() {
    let project = TempDir::new().unwrap();
    fs::write(
        project_config_path(project.path()),
        "[enumerate]\nlimit = 100\n",
    )
    .unwrap();

    let settings = Settings::load(Some(project.path())).expect("load settings");

    assert_eq!(settings.enumerate.limit, Some(100));
}

#[test]
fn given_invalid_toml_when_loading_then_config_error() {
    let project = TempDir::new().unwrap();
    fs::write(project_config_path(project.path()), "[preview\ndepth = ").unwrap();

    let err = Settings::load(Some(project.path())).unwrap_err();

    assert!(matches!(err, ApplicationError::Config { .. }));
}

#[test]
fn given_loaded_settings_when_serializing_then_round_trips_through_toml() {
    let project = TempDir::new().unwrap();
    fs::write(
        project_config_path(project.path()),
        "[preview]\nmax_items = 3\n",
    )
    .unwrap();
    let settings = Settings::load(Some(project.path())).expect("load settings");

    let text = settings.to_toml().expect("serialize");
    let reparsed: Settings = toml::from_str(&text).expect("parse back");

    assert_eq!(reparsed, settings);
}
