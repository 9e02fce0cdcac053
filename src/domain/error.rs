//! Domain-level errors (no external dependencies)

use std::fmt;

use thiserror::Error;

/// Which loader variant produced a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Document with an explicit `hierarchy` section
    Explicit,
    /// Implicit structure converted by the legacy adapter
    Legacy,
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Explicit => write!(f, "explicit"),
            DocumentFormat::Legacy => write!(f, "legacy"),
        }
    }
}

/// Category of a schema violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    MalformedDocument,
    DuplicateLevel,
    UnknownPlaceholder,
    UnrenderedLevel,
    InvalidExpansion,
    InstanceNesting,
    LeafAmbiguity,
    OrphanedData,
    UnknownSeparatorKey,
    UnknownLevel,
    LegacyStructure,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::MalformedDocument => "malformed-document",
            ViolationKind::DuplicateLevel => "duplicate-level",
            ViolationKind::UnknownPlaceholder => "unknown-placeholder",
            ViolationKind::UnrenderedLevel => "unrendered-level",
            ViolationKind::InvalidExpansion => "invalid-expansion",
            ViolationKind::InstanceNesting => "instance-nesting",
            ViolationKind::LeafAmbiguity => "leaf-ambiguity",
            ViolationKind::OrphanedData => "orphaned-data",
            ViolationKind::UnknownSeparatorKey => "unknown-separator-key",
            ViolationKind::UnknownLevel => "unknown-level",
            ViolationKind::LegacyStructure => "legacy-structure",
        };
        write!(f, "{}", name)
    }
}

/// One actionable schema problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location in the document, e.g. `tree/MAG/QF/DEVICE` or `hierarchy/levels[2]`
    pub path: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.kind, self.message)
    }
}

/// Validation failure carrying every violation found in a document.
///
/// A document never loads partially: any violation aborts the load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", report(.origin, .violations))]
pub struct SchemaError {
    pub origin: DocumentFormat,
    pub violations: Vec<Violation>,
}

impl SchemaError {
    pub fn new(origin: DocumentFormat, violations: Vec<Violation>) -> Self {
        Self { origin, violations }
    }

    pub fn single(
        origin: DocumentFormat,
        path: impl Into<String>,
        kind: ViolationKind,
        message: impl Into<String>,
    ) -> Self {
        Self::new(origin, vec![Violation::new(path, kind, message)])
    }

    /// True when the failure stems from an old-format document rather than
    /// a schema authoring mistake.
    pub fn is_legacy_conversion(&self) -> bool {
        self.origin == DocumentFormat::Legacy
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

fn report(origin: &DocumentFormat, violations: &[Violation]) -> String {
    let mut out = format!(
        "{} document rejected with {} violation(s):",
        origin,
        violations.len()
    );
    for v in violations {
        out.push_str(&format!("\n  - {}", v));
    }
    out
}

/// A resolved path lacks a value the naming template needs.
///
/// Never caused by input data: enumeration and navigation only build
/// complete paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("resolved path has no entry for template level '{level}'")]
pub struct RenderContractViolation {
    pub level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_multiple_violations_when_displayed_then_lists_each_on_own_line() {
        let err = SchemaError::new(
            DocumentFormat::Explicit,
            vec![
                Violation::new(
                    "hierarchy/naming_pattern",
                    ViolationKind::UnknownPlaceholder,
                    "no level 'x'",
                ),
                Violation::new("tree/A", ViolationKind::OrphanedData, "no level left"),
            ],
        );
        let text = err.to_string();
        assert!(text.starts_with("explicit document rejected with 2 violation(s):"));
        assert!(
            text.contains("\n  - hierarchy/naming_pattern [unknown-placeholder]: no level 'x'")
        );
        assert!(text.contains("\n  - tree/A [orphaned-data]: no level left"));
    }

    #[test]
    fn given_legacy_origin_when_checked_then_reports_legacy_conversion() {
        let err = SchemaError::single(
            DocumentFormat::Legacy,
            "tree",
            ViolationKind::LegacyStructure,
            "x",
        );
        assert!(err.is_legacy_conversion());
        assert!(err.has_kind(ViolationKind::LegacyStructure));
        assert!(!err.has_kind(ViolationKind::OrphanedData));
    }
}
