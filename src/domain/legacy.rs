//! Legacy adapter: converts implicit-structure documents into the explicit
//! form.
//!
//! A legacy document has no `hierarchy` section. Its level names come from
//! `hierarchy_definition`; a `devices` key marks an instance level at the
//! depth it appears, and `fields`/`subfields` wrap the children of deeper
//! tree levels. The output is an explicit document that still has to pass
//! the validator.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::domain::error::{DocumentFormat, SchemaError, Violation, ViolationKind};
use crate::domain::schema::{is_meta_key, LevelKind, META_EXPANSION};

const DEVICES: &str = "devices";
const FLATTENED: [&str; 2] = ["fields", "subfields"];

/// Detection is purely structural: no `hierarchy` section means legacy.
pub fn is_legacy(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|obj| !obj.contains_key("hierarchy"))
}

/// Convert a legacy document into an explicit one.
pub fn convert(document: &Value) -> Result<Value, SchemaError> {
    let Some(obj) = document.as_object() else {
        return Err(SchemaError::single(
            DocumentFormat::Legacy,
            "",
            ViolationKind::MalformedDocument,
            "document must be a JSON object",
        ));
    };

    let mut converter = Converter::default();
    converter.read_definition(obj);
    let pattern = match obj.get("naming_pattern") {
        Some(p @ (Value::String(_) | Value::Array(_))) => p.clone(),
        Some(_) | None => {
            converter.report(
                "naming_pattern",
                "legacy document needs a 'naming_pattern' string or list",
            );
            Value::Null
        }
    };
    let tree = match obj.get("tree") {
        Some(Value::Object(tree)) => converter.convert_node(tree, 0, "tree"),
        _ => {
            converter.report("tree", "legacy document needs a 'tree' object");
            Map::new()
        }
    };

    if !converter.violations.is_empty() {
        return Err(SchemaError::new(
            DocumentFormat::Legacy,
            converter.violations,
        ));
    }

    let levels: Vec<Value> = converter
        .levels
        .iter()
        .zip(&converter.kinds)
        .map(|(name, kind)| json!({"name": name, "type": kind.unwrap_or(LevelKind::Tree)}))
        .collect();
    debug!(levels = levels.len(), "converted legacy document");

    let mut hierarchy = Map::new();
    hierarchy.insert("levels".into(), Value::Array(levels));
    hierarchy.insert("naming_pattern".into(), pattern);
    if let Some(sep) = obj.get("separator") {
        hierarchy.insert("separator".into(), sep.clone());
    }
    Ok(json!({"hierarchy": hierarchy, "tree": tree}))
}

#[derive(Default)]
struct Converter {
    levels: Vec<String>,
    kinds: Vec<Option<LevelKind>>,
    violations: Vec<Violation>,
}

impl Converter {
    fn report(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations
            .push(Violation::new(path, ViolationKind::LegacyStructure, message));
    }

    fn read_definition(&mut self, obj: &Map<String, Value>) {
        let names: Option<Vec<String>> = obj
            .get("hierarchy_definition")
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect()
            });
        match names {
            Some(names) if !names.is_empty() => {
                self.kinds = vec![None; names.len()];
                self.levels = names;
            }
            _ => self.report(
                "hierarchy_definition",
                "legacy document needs a non-empty 'hierarchy_definition' list of level names",
            ),
        }
    }

    /// Record that `depth` is used as `kind`; a level may only be one kind.
    fn mark(&mut self, depth: usize, kind: LevelKind, path: &str) -> bool {
        if depth >= self.levels.len() {
            if !self.levels.is_empty() {
                self.report(
                    path,
                    format!(
                        "tree is deeper than 'hierarchy_definition' ({} levels)",
                        self.levels.len()
                    ),
                );
            }
            return false;
        }
        match self.kinds[depth] {
            Some(existing) if existing != kind => {
                self.report(
                    path,
                    format!(
                        "level '{}' is used both as a tree level and as an instance level",
                        self.levels[depth]
                    ),
                );
                false
            }
            _ => {
                self.kinds[depth] = Some(kind);
                true
            }
        }
    }

    fn convert_node(
        &mut self,
        obj: &Map<String, Value>,
        depth: usize,
        path: &str,
    ) -> Map<String, Value> {
        let mut out: Map<String, Value> = obj
            .iter()
            .filter(|(k, _)| is_meta_key(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let children = self.flatten_children(obj, path);

        if let Some(devices) = obj.get(DEVICES) {
            let dpath = format!("{}/{}", path, DEVICES);
            if !self.mark(depth, LevelKind::Instances, &dpath) {
                return out;
            }
            let mut container = Map::new();
            if let Some(expansion) = self.convert_devices(devices, &dpath) {
                container.insert(META_EXPANSION.into(), expansion);
            }
            for (key, value) in children {
                let child = self.convert_child(value, depth + 1, &format!("{}/{}", path, key));
                container.insert(key, child);
            }
            out.insert(self.levels[depth].to_uppercase(), Value::Object(container));
            return out;
        }

        if !children.is_empty() && !self.mark(depth, LevelKind::Tree, path) {
            return out;
        }
        for (key, value) in children {
            let child = self.convert_child(value, depth + 1, &format!("{}/{}", path, key));
            out.insert(key, child);
        }
        out
    }

    fn convert_child(&mut self, value: &Value, depth: usize, path: &str) -> Value {
        match value {
            Value::Object(obj) => Value::Object(self.convert_node(obj, depth, path)),
            Value::Null => Value::Object(Map::new()),
            _ => {
                self.report(path, "tree entries must be objects");
                Value::Object(Map::new())
            }
        }
    }

    /// Direct children plus the entries of `fields`/`subfields` wrappers.
    fn flatten_children<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        path: &str,
    ) -> Vec<(String, &'a Value)> {
        let mut children: Vec<(String, &'a Value)> = Vec::new();
        for (key, value) in obj.iter().filter(|(k, _)| !is_meta_key(k)) {
            if key == DEVICES {
                continue;
            }
            if FLATTENED.contains(&key.as_str()) {
                let Some(inner) = value.as_object() else {
                    self.report(
                        format!("{}/{}", path, key),
                        format!("'{}' must be an object", key),
                    );
                    continue;
                };
                children.extend(inner.iter().map(|(k, v)| (k.clone(), v)));
            } else {
                children.push((key.clone(), value));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for (key, _) in &children {
            if !seen.insert(key.as_str()) {
                self.report(
                    format!("{}/{}", path, key),
                    format!("'{}' appears both directly and inside a field container", key),
                );
            }
        }
        children
    }

    fn convert_devices(&mut self, devices: &Value, path: &str) -> Option<Value> {
        match devices {
            Value::Array(names) => Some(json!({"_type": "list", "_instances": names})),
            Value::Object(spec) => {
                let kind = spec.get("_type").and_then(Value::as_str);
                let has_pattern = spec.contains_key("_pattern");
                match kind {
                    None if !has_pattern => {
                        self.report(path, "devices container has no '_type' or '_pattern'");
                        None
                    }
                    Some("range") if !has_pattern => {
                        self.report(path, "range devices container has no '_pattern'");
                        None
                    }
                    None => {
                        // A bare pattern with parts is the composite form.
                        let mut spec = spec.clone();
                        spec.insert("_type".into(), Value::String("pattern".into()));
                        Some(Value::Object(spec))
                    }
                    Some(_) => Some(Value::Object(spec.clone())),
                }
            }
            _ => {
                self.report(path, "devices must be an expansion object or a list of names");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_document_without_hierarchy_when_detecting_then_is_legacy() {
        assert!(is_legacy(&json!({"tree": {}})));
        assert!(!is_legacy(&json!({"hierarchy": {}, "tree": {}})));
        assert!(!is_legacy(&json!([1, 2])));
    }

    #[test]
    fn given_devices_and_fields_when_converting_then_builds_container_and_flattens() {
        let legacy = json!({
            "hierarchy_definition": ["system", "device", "field", "subfield"],
            "naming_pattern": "{system}:{device}:{field}:{subfield}",
            "tree": {
                "MAG": {
                    "devices": {"_type": "range", "_range": [1, 2], "_pattern": "M{:02d}"},
                    "fields": {
                        "CURRENT": {"subfields": {"SP": {}, "RB": {}}},
                        "STATUS": {}
                    }
                }
            }
        });
        let converted = convert(&legacy).unwrap();

        assert_eq!(converted["hierarchy"]["levels"][1]["type"], "instances");
        assert_eq!(converted["hierarchy"]["levels"][2]["type"], "tree");
        let container = &converted["tree"]["MAG"]["DEVICE"];
        assert_eq!(container["_expansion"]["_pattern"], "M{:02d}");
        assert!(container["CURRENT"]["SP"].is_object());
        assert!(container["STATUS"].is_object());
        assert!(container.get("fields").is_none());
    }

    #[test]
    fn given_device_name_list_when_converting_then_uses_list_expansion() {
        let legacy = json!({
            "hierarchy_definition": ["device", "field"],
            "naming_pattern": ["device", "field"],
            "tree": {"devices": ["H01", "H02"], "fields": {"POS": {}}}
        });
        let converted = convert(&legacy).unwrap();
        assert_eq!(
            converted["tree"]["DEVICE"]["_expansion"],
            json!({"_type": "list", "_instances": ["H01", "H02"]})
        );
    }

    #[test]
    fn given_devices_without_pattern_when_converting_then_fails_as_legacy_error() {
        let legacy = json!({
            "hierarchy_definition": ["system", "device"],
            "naming_pattern": "{system}:{device}",
            "tree": {"MAG": {"devices": {"_range": [1, 3]}}}
        });
        let err = convert(&legacy).unwrap_err();
        assert!(err.is_legacy_conversion());
        assert!(err.has_kind(ViolationKind::LegacyStructure));
        assert_eq!(err.violations[0].path, "tree/MAG/devices");
    }

    #[test]
    fn given_inconsistent_depths_when_converting_then_reports_every_conflict() {
        let legacy = json!({
            "hierarchy_definition": ["system", "device"],
            "naming_pattern": "{system}:{device}",
            "tree": {
                "MAG": {"devices": ["A"], "TOO_DEEP": {"X": {}}},
                "VAC": {"PUMP": {}}
            }
        });
        let err = convert(&legacy).unwrap_err();
        assert_eq!(err.violations.len(), 2);
    }
}
