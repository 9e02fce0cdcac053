//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/chnav/chnav.toml`
//! 3. Local config: `<project_dir>/.chnav.toml`
//! 4. Environment variables: `CHNAV_*` prefix (`__` separates sections)

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;

/// Tree preview limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PreviewSettings {
    /// Levels shown beneath the starting point
    pub depth: usize,
    /// Children shown per node
    pub max_items: usize,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            depth: 3,
            max_items: 10,
        }
    }
}

/// Enumeration output limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EnumerateSettings {
    /// Stop listing after this many channels (none = all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Raw settings for intermediate parsing (every field optional to detect
/// "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub database: Option<PathBuf>,
    pub preview: RawPreviewSettings,
    pub enumerate: RawEnumerateSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawPreviewSettings {
    pub depth: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawEnumerateSettings {
    pub limit: Option<usize>,
}

/// Unified configuration for chnav.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    /// Channel database used when `--db` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    pub preview: PreviewSettings,
    pub enumerate: EnumerateSettings,
}

/// Get the XDG config directory for chnav.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "chnav").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("chnav.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".chnav.toml")
}

/// Expand `~`, `$VAR` and `${VAR}`; unresolvable input is kept as is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins wherever it specifies a value.
    ///
    /// A relative `database` in the overlay is taken relative to `base_dir`,
    /// the directory of the file it came from.
    fn merge_with(&self, overlay: &RawSettings, base_dir: Option<&Path>) -> Self {
        let database = overlay.database.as_ref().map(|db| {
            let db = expand_path(db);
            match base_dir {
                Some(dir) if db.is_relative() => dir.join(db),
                _ => db,
            }
        });
        Self {
            database: database.or_else(|| self.database.clone()),
            preview: PreviewSettings {
                depth: overlay.preview.depth.unwrap_or(self.preview.depth),
                max_items: overlay.preview.max_items.unwrap_or(self.preview.max_items),
            },
            enumerate: EnumerateSettings {
                limit: overlay.enumerate.limit.or(self.enumerate.limit),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory for local config
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("loading global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw, global_path.parent());
            }
        }

        // 3. Project config
        if let Some(project) = project_dir {
            let local_path = project_config_path(project);
            if local_path.exists() {
                debug!("loading project config {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw, Some(project));
            }
        }

        // 4. Environment variables (explicit override)
        Self::apply_env_overrides(current)
    }

    /// Apply CHNAV_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        // Use config crate just for env var parsing
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("CHNAV")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("database") {
            settings.database = Some(expand_path(Path::new(&val)));
        }
        if let Some(val) = env_usize(&config, "preview.depth")? {
            settings.preview.depth = val;
        }
        if let Some(val) = env_usize(&config, "preview.max_items")? {
            settings.preview.max_items = val;
        }
        if let Some(val) = env_usize(&config, "enumerate.limit")? {
            settings.enumerate.limit = Some(val);
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# chnav configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/chnav/chnav.toml
#   Local:  <project_dir>/.chnav.toml
#   Env:    CHNAV_* environment variables, e.g. CHNAV_PREVIEW__DEPTH=5

# Channel database used when --db is not given.
# Relative paths are resolved against the directory of this file.
# database = "channels.json"

[preview]
# Levels shown beneath the starting point
# depth = 3

# Children shown per node before eliding the rest
# max_items = 10

[enumerate]
# Stop `chnav list` after this many channels
# limit = 1000
"#
        .to_string()
    }
}

fn env_usize(config: &Config, key: &str) -> Result<Option<usize>, ApplicationError> {
    match config.get_int(key) {
        Ok(val) => usize::try_from(val)
            .map(Some)
            .map_err(|_| ApplicationError::Config {
                message: format!("{key} must not be negative, got {val}"),
            }),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load(None).expect("load defaults");
        assert_eq!(settings.preview, PreviewSettings::default());
    }

    #[test]
    fn given_tilde_in_database_when_expanding_then_expands_to_home() {
        let home = std::env::var("HOME").expect("HOME should be set");
        let expanded = expand_path(Path::new("~/channels.json"));
        let expanded = expanded.to_string_lossy();
        assert!(
            expanded.starts_with(&home),
            "database should start with home dir: {}",
            expanded
        );
        assert!(!expanded.contains('~'));
    }

    #[test]
    fn given_env_var_in_path_when_expanding_then_expands_variable() {
        let home = std::env::var("HOME").expect("HOME should be set");
        let expanded = expand_path(Path::new("${HOME}/db.json"));
        assert!(expanded.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_overlay_when_merging_then_specified_values_win() {
        let base = Settings {
            database: Some(PathBuf::from("/data/base.json")),
            preview: PreviewSettings {
                depth: 2,
                max_items: 4,
            },
            enumerate: EnumerateSettings { limit: Some(10) },
        };
        let overlay = RawSettings {
            database: None,
            preview: RawPreviewSettings {
                depth: Some(6),
                max_items: None,
            },
            enumerate: RawEnumerateSettings::default(),
        };

        let result = base.merge_with(&overlay, None);

        assert_eq!(result.database, Some(PathBuf::from("/data/base.json")));
        assert_eq!(result.preview.depth, 6);
        assert_eq!(result.preview.max_items, 4);
        assert_eq!(result.enumerate.limit, Some(10));
    }

    #[test]
    fn given_relative_database_when_merging_then_resolves_against_config_dir() {
        let overlay = RawSettings {
            database: Some(PathBuf::from("channels.json")),
            ..RawSettings::default()
        };
        let result = Settings::default().merge_with(&overlay, Some(Path::new("/project")));
        assert_eq!(result.database, Some(PathBuf::from("/project/channels.json")));
    }

    #[test]
    fn given_template_when_parsing_then_is_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).expect("template parses");
        assert!(raw.database.is_none());
    }
}
