//! The loaded channel database: validated schema, template and tree.

use std::fmt;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::domain::enumerate::Channels;
use crate::domain::error::{DocumentFormat, RenderContractViolation, SchemaError, ViolationKind};
use crate::domain::legacy;
use crate::domain::path::ResolvedPath;
use crate::domain::schema::Schema;
use crate::domain::template::NamingTemplate;
use crate::domain::tree::Node;
use crate::domain::validator::{validate, ValidatedSchema};

/// Non-fatal observation made while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The document used the implicit legacy structure and was converted
    LegacyConverted,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::LegacyConverted => write!(
                f,
                "document uses the legacy implicit structure and was converted; \
                 run `chnav convert` to migrate it to an explicit hierarchy"
            ),
        }
    }
}

/// Immutable after loading; share it freely across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    validated: ValidatedSchema,
    format: DocumentFormat,
    diagnostics: Vec<Diagnostic>,
}

/// Build a database from a parsed document, detecting its format.
#[instrument(level = "debug", skip_all)]
pub fn load(document: &Value) -> Result<Database, SchemaError> {
    if legacy::is_legacy(document) {
        let converted = legacy::convert(document)?;
        let validated = validate(&converted, DocumentFormat::Legacy)?;
        let diagnostic = Diagnostic::LegacyConverted;
        warn!("{}", diagnostic);
        return Ok(Database {
            validated,
            format: DocumentFormat::Legacy,
            diagnostics: vec![diagnostic],
        });
    }
    Ok(Database {
        validated: validate(document, DocumentFormat::Explicit)?,
        format: DocumentFormat::Explicit,
        diagnostics: Vec::new(),
    })
}

impl Database {
    /// Parse JSON text and [`load`] it.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let document: Value = serde_json::from_str(text).map_err(|e| {
            SchemaError::single(
                DocumentFormat::Explicit,
                "",
                ViolationKind::MalformedDocument,
                format!("not valid JSON: {}", e),
            )
        })?;
        load(&document)
    }

    pub fn schema(&self) -> &Schema {
        self.validated.schema()
    }

    pub fn template(&self) -> &NamingTemplate {
        self.validated.template()
    }

    pub fn root(&self) -> &Node {
        self.validated.root()
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Fresh lazy stream over every channel; call again to restart.
    pub fn enumerate_all(&self) -> Channels<'_> {
        Channels::new(self.schema(), self.template(), self.root())
    }

    /// Total channel count without enumerating.
    pub fn channel_count(&self) -> u64 {
        self.root().channel_count()
    }

    /// See [`NamingTemplate::render`].
    pub fn render(&self, path: &ResolvedPath) -> String {
        self.template().render(path)
    }

    pub fn try_render(&self, path: &ResolvedPath) -> Result<String, RenderContractViolation> {
        self.template().try_render(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sectors() -> Value {
        json!({
            "hierarchy": {
                "levels": [
                    {"name": "sector", "type": "instances"},
                    {"name": "device", "type": "instances"},
                    {"name": "property", "type": "tree"}
                ],
                "naming_pattern": "{sector}{device}{property}"
            },
            "tree": {
                "SECTOR": {
                    "_expansion": {"_type": "list", "_instances": ["0L", "1A"]},
                    "DEVICE": {
                        "_expansion": {"_type": "range", "_range": [1, 3], "_pattern": "{:02d}"},
                        ".S": {}
                    }
                }
            }
        })
    }

    #[test]
    fn given_nested_instances_when_enumerating_then_yields_product() {
        let db = load(&sectors()).unwrap();
        let ids: Vec<String> = db.enumerate_all().map(|c| c.identifier).collect();
        assert_eq!(
            ids,
            vec!["0L01.S", "0L02.S", "0L03.S", "1A01.S", "1A02.S", "1A03.S"]
        );
        assert_eq!(db.channel_count(), 6);
        assert_eq!(db.format(), DocumentFormat::Explicit);
        assert!(db.diagnostics().is_empty());
    }

    #[test]
    fn given_database_when_enumerating_twice_then_restarts() {
        let db = load(&sectors()).unwrap();
        let first: Vec<_> = db.enumerate_all().take(2).collect();
        let again: Vec<_> = db.enumerate_all().take(2).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn given_legacy_document_when_loading_then_records_diagnostic() {
        let db = load(&json!({
            "hierarchy_definition": ["device", "field"],
            "naming_pattern": "{device}:{field}",
            "tree": {"devices": ["H01", "H02"], "fields": {"POS": {}}}
        }))
        .unwrap();
        assert_eq!(db.format(), DocumentFormat::Legacy);
        assert_eq!(db.diagnostics(), &[Diagnostic::LegacyConverted]);
        assert_eq!(db.channel_count(), 2);
    }

    #[test]
    fn given_invalid_json_text_when_parsing_then_reports_malformed() {
        let err = Database::parse("{not json").unwrap_err();
        assert!(err.has_kind(ViolationKind::MalformedDocument));
    }

    #[test]
    fn given_shared_database_when_enumerating_concurrently_then_results_agree() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Database>();

        let db = load(&sectors()).unwrap();
        let counts: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| db.enumerate_all().count()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(counts.iter().all(|&n| n == 6));
    }
}
