//! Channel catalog service
//!
//! Loads channel databases from disk, checks them, and migrates legacy
//! documents to the explicit form.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::application::digest::channel_digest;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{
    legacy, validate, Database, Diagnostic, DocumentFormat, SchemaError, ViolationKind,
};
use crate::infrastructure::traits::FileSystem;

/// Outcome of checking a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub format: DocumentFormat,
    pub levels: usize,
    /// Computed arithmetically from the expansions
    pub channels: u64,
    pub diagnostics: Vec<Diagnostic>,
    /// Filled by deep checks only
    pub enumeration: Option<EnumerationCheck>,
}

/// Results of a full enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationCheck {
    pub enumerated: u64,
    pub digest: String,
    /// Identifiers produced more than once, in first-repeat order
    pub duplicates: Vec<String>,
}

/// Service for loading and inspecting channel databases.
pub struct CatalogService {
    fs: Arc<dyn FileSystem>,
}

impl CatalogService {
    /// Create a new catalog service.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Load and validate the database stored at `path`.
    #[instrument(level = "debug", skip(self))]
    pub fn load(&self, path: &Path) -> ApplicationResult<Database> {
        let document = self.read_document(path)?;
        let db = crate::domain::load(&document)?;
        for diagnostic in db.diagnostics() {
            warn!("{}: {}", path.display(), diagnostic);
        }
        info!(
            "loaded {} database {} ({} levels, {} channels)",
            db.format(),
            path.display(),
            db.schema().len(),
            db.channel_count()
        );
        Ok(db)
    }

    /// Load `path` and summarize it; `deep` also enumerates every channel.
    pub fn check(&self, path: &Path, deep: bool) -> ApplicationResult<CheckReport> {
        let db = self.load(path)?;
        let enumeration = deep.then(|| {
            let duplicates = find_duplicates(&db);
            let (digest, enumerated) = channel_digest(&db);
            EnumerationCheck {
                enumerated,
                digest,
                duplicates,
            }
        });
        Ok(CheckReport {
            format: db.format(),
            levels: db.schema().len(),
            channels: db.channel_count(),
            diagnostics: db.diagnostics().to_vec(),
            enumeration,
        })
    }

    /// Convert a legacy document to the explicit form as pretty JSON.
    ///
    /// The converted document is validated before it is returned.
    #[instrument(level = "debug", skip(self))]
    pub fn convert(&self, path: &Path) -> ApplicationResult<String> {
        let document = self.read_document(path)?;
        if !legacy::is_legacy(&document) {
            return Err(ApplicationError::AlreadyExplicit(path.to_path_buf()));
        }
        let converted = legacy::convert(&document)?;
        validate(&converted, DocumentFormat::Legacy)?;
        debug!("converted {} to explicit form", path.display());
        serde_json::to_string_pretty(&converted).with_path_context("serialize converted", path)
    }

    fn read_document(&self, path: &Path) -> ApplicationResult<Value> {
        if !self.fs.is_file(path) {
            return Err(ApplicationError::DatabaseNotFound(path.to_path_buf()));
        }
        let text = self
            .fs
            .read_to_string(path)
            .with_path_context("read channel database", path)?;
        serde_json::from_str(&text).map_err(|e| {
            ApplicationError::Schema(SchemaError::single(
                DocumentFormat::Explicit,
                path.display().to_string(),
                ViolationKind::MalformedDocument,
                format!("not valid JSON: {}", e),
            ))
        })
    }
}

/// Identifiers enumerated more than once.
///
/// Keeps every identifier seen in memory; run it as an offline check, not
/// on a hot path.
pub fn find_duplicates(db: &Database) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for channel in db.enumerate_all() {
        if !seen.insert(channel.identifier.clone()) && reported.insert(channel.identifier.clone()) {
            duplicates.push(channel.identifier);
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_identifiers_colliding_after_skip_when_checking_then_reports_duplicate() {
        // Both branches drop their only distinguishing fragment.
        let db = crate::domain::load(&json!({
            "hierarchy": {
                "levels": [
                    {"name": "system", "type": "tree"},
                    {"name": "field", "type": "tree"}
                ],
                "naming_pattern": "{system}:{field}"
            },
            "tree": {
                "A": {"X": {"_channel_part": ""}, "Y": {"_channel_part": ""}}
            }
        }))
        .unwrap();
        assert_eq!(find_duplicates(&db), vec!["A".to_string()]);
    }
}
