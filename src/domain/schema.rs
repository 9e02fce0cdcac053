//! Schema model: the declared level sequence and the raw document shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Addressing mode of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    /// Finite named children taken from the tree payload
    Tree,
    /// Values generated from an expansion specification
    #[serde(alias = "instance")]
    Instances,
}

/// One rung of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub name: String,
    pub kind: LevelKind,
    pub description: Option<String>,
    /// Joins this level's value to the next rendered one
    pub separator: Option<String>,
    /// Browsable but never part of the rendered identifier
    pub navigation_only: bool,
}

impl Level {
    pub fn is_instance(&self) -> bool {
        self.kind == LevelKind::Instances
    }

    /// Whether a tree key names this level's instance container.
    pub fn is_container_key(&self, key: &str) -> bool {
        self.is_instance() && key.eq_ignore_ascii_case(&self.name)
    }
}

/// Ordered level sequence with unique names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    levels: Vec<Level>,
}

impl Schema {
    pub(crate) fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, idx: usize) -> &Level {
        &self.levels[idx]
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.name == name)
    }

    /// Instance level whose container key is `key`.
    pub fn container_level(&self, key: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.is_container_key(key))
    }
}

// ============================================================
// RAW DOCUMENT (explicit form)
// ============================================================

/// Top-level explicit document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawDocument {
    pub hierarchy: RawHierarchy,
    #[serde(default)]
    pub tree: Map<String, Value>,
}

/// The `hierarchy` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawHierarchy {
    /// Each entry deserializes on its own as a [`RawLevel`]
    pub levels: Vec<Value>,
    pub naming_pattern: RawPattern,
    /// Joins list-form patterns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    /// Per-level separator overrides keyed by level name
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub separators: Map<String, Value>,
}

/// One entry of `hierarchy.levels`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLevel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LevelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub navigation_only: bool,
}

/// Naming template as written: a pattern string or a list of level names.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawPattern {
    Text(String),
    Levels(Vec<String>),
}

// ============================================================
// TREE PAYLOAD METADATA
// ============================================================

pub const META_DESCRIPTION: &str = "_description";
pub const META_CHANNEL_PART: &str = "_channel_part";
pub const META_SEPARATOR: &str = "_separator";
pub const META_IS_LEAF: &str = "_is_leaf";
pub const META_LEVELS: &str = "_levels";
pub const META_EXPANSION: &str = "_expansion";

/// Keys starting with `_` carry metadata, never children.
pub fn is_meta_key(key: &str) -> bool {
    key.starts_with('_')
}

/// Child entries of a payload object in document order.
pub fn child_entries(obj: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    obj.iter().filter(|(k, _)| !is_meta_key(k))
}

/// Whether a payload value is an instance container.
pub fn is_instance_container(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.contains_key(META_EXPANSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_level_entries_when_deserializing_then_accepts_kind_aliases() {
        let raw: RawHierarchy = serde_json::from_value(json!({
            "levels": [
                {"name": "sector", "type": "instance"},
                {"name": "device", "type": "instances", "separator": "-"},
                {"name": "field", "type": "tree", "navigation_only": true}
            ],
            "naming_pattern": ["sector", "device"]
        }))
        .unwrap();
        let levels: Vec<RawLevel> = raw
            .levels
            .iter()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect();

        assert_eq!(levels[0].kind, LevelKind::Instances);
        assert_eq!(levels[1].separator.as_deref(), Some("-"));
        assert!(levels[2].navigation_only);
        assert_eq!(
            raw.naming_pattern,
            RawPattern::Levels(vec!["sector".into(), "device".into()])
        );
    }

    #[test]
    fn given_payload_object_when_listing_children_then_skips_metadata() {
        let obj = json!({"_description": "x", "A": {}, "_is_leaf": true, "B": {}});
        let keys: Vec<_> = child_entries(obj.as_object().unwrap())
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn given_instance_level_when_matching_container_key_then_ignores_case() {
        let level = Level {
            name: "device".into(),
            kind: LevelKind::Instances,
            description: None,
            separator: None,
            navigation_only: false,
        };
        assert!(level.is_container_key("DEVICE"));
        assert!(!level.is_container_key("DEVICES"));
    }
}
