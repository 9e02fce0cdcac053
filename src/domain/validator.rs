//! Schema validation: the single gate between a document and a usable
//! database.
//!
//! Every check runs over the whole document and all violations are reported
//! together. Nothing partially validated escapes this module.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::domain::error::{DocumentFormat, SchemaError, Violation, ViolationKind};
use crate::domain::expansion::Expansion;
use crate::domain::schema::{
    child_entries, is_instance_container, Level, RawDocument, RawLevel, Schema, META_CHANNEL_PART,
    META_DESCRIPTION, META_EXPANSION, META_IS_LEAF, META_LEVELS, META_SEPARATOR,
};
use crate::domain::template::NamingTemplate;
use crate::domain::tree::{Branch, Node};

/// A schema that passed every check, with its compiled tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSchema {
    schema: Schema,
    template: NamingTemplate,
    root: Node,
}

impl ValidatedSchema {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn template(&self) -> &NamingTemplate {
        &self.template
    }

    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// Validate an explicit document and compile its tree.
#[instrument(level = "debug", skip(document))]
pub fn validate(document: &Value, origin: DocumentFormat) -> Result<ValidatedSchema, SchemaError> {
    let raw: RawDocument = serde_json::from_value(document.clone()).map_err(|e| {
        SchemaError::single(
            origin,
            "hierarchy",
            ViolationKind::MalformedDocument,
            e.to_string(),
        )
    })?;

    let mut checker = Checker::default();
    let schema = checker.check_levels(&raw);
    let template = checker.check_template(&raw, &schema);

    if raw.tree.is_empty() {
        checker.report(
            "tree",
            ViolationKind::MalformedDocument,
            "tree payload is empty; the hierarchy names no channels",
        );
    }
    let root = {
        let mut compiler = Compiler {
            schema: &schema,
            checker: &mut checker,
        };
        let all: Vec<usize> = (0..schema.len()).collect();
        let levels = compiler.remaining_for(&raw.tree, &all, None, "tree");
        compiler.compile(&raw.tree, &levels, "tree")
    };
    if root.checked_channel_count().is_none() {
        checker.report(
            "tree",
            ViolationKind::InvalidExpansion,
            format!("tree generates more than {} channels", u64::MAX),
        );
    }

    if let Some(template) = &template {
        checker.check_unrendered(&schema, template, &root);
    }

    match (checker.violations.is_empty(), template) {
        (true, Some(template)) => {
            debug!(
                levels = schema.len(),
                channels = root.channel_count(),
                "schema validated"
            );
            Ok(ValidatedSchema {
                schema,
                template,
                root,
            })
        }
        _ => Err(SchemaError::new(origin, checker.violations)),
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
    /// Names of level entries that failed to parse
    unparsed: HashSet<String>,
}

impl Checker {
    fn report(&mut self, path: impl Into<String>, kind: ViolationKind, message: impl Into<String>) {
        self.violations.push(Violation::new(path, kind, message));
    }

    fn check_levels(&mut self, raw: &RawDocument) -> Schema {
        let hierarchy = &raw.hierarchy;
        if hierarchy.levels.is_empty() {
            self.report(
                "hierarchy/levels",
                ViolationKind::MalformedDocument,
                "no levels declared",
            );
        }

        let mut seen = HashSet::new();
        let mut levels: Vec<Level> = Vec::with_capacity(hierarchy.levels.len());
        for (i, entry) in hierarchy.levels.iter().enumerate() {
            let path = format!("hierarchy/levels[{}]", i);
            let raw_level: RawLevel = match serde_json::from_value(entry.clone()) {
                Ok(raw_level) => raw_level,
                Err(e) => {
                    if let Some(name) = entry.get("name").and_then(Value::as_str) {
                        self.unparsed.insert(name.to_string());
                    }
                    self.report(&path, ViolationKind::MalformedDocument, e.to_string());
                    continue;
                }
            };
            if raw_level.name.trim().is_empty() {
                self.report(&path, ViolationKind::MalformedDocument, "level name is empty");
            }
            if !seen.insert(raw_level.name.clone()) {
                self.report(
                    &path,
                    ViolationKind::DuplicateLevel,
                    format!("level '{}' is declared more than once", raw_level.name),
                );
            }
            levels.push(Level {
                name: raw_level.name,
                kind: raw_level.kind,
                description: raw_level.description,
                separator: raw_level.separator,
                navigation_only: raw_level.navigation_only,
            });
        }

        for (key, value) in &hierarchy.separators {
            let path = format!("hierarchy/separators/{}", key);
            let Some(level) = levels.iter_mut().find(|l| &l.name == key) else {
                if self.unparsed.contains(key) {
                    continue;
                }
                self.report(
                    path,
                    ViolationKind::UnknownSeparatorKey,
                    format!("separator override for undeclared level '{}'", key),
                );
                continue;
            };
            match value.as_str() {
                Some(sep) => level.separator = Some(sep.to_string()),
                None => self.report(
                    path,
                    ViolationKind::MalformedDocument,
                    "separator override must be a string",
                ),
            }
        }

        Schema::new(levels)
    }

    fn check_template(&mut self, raw: &RawDocument, schema: &Schema) -> Option<NamingTemplate> {
        let hierarchy = &raw.hierarchy;
        let pattern = &hierarchy.naming_pattern;
        let mut template = match NamingTemplate::from_raw(pattern, hierarchy.separator.as_deref()) {
            Ok(t) => t,
            Err(msg) => {
                self.report(
                    "hierarchy/naming_pattern",
                    ViolationKind::MalformedDocument,
                    msg,
                );
                return None;
            }
        };

        let mut referenced = HashSet::new();
        for name in template.levels() {
            if !referenced.insert(name) {
                self.report(
                    "hierarchy/naming_pattern",
                    ViolationKind::UnknownPlaceholder,
                    format!("placeholder '{{{}}}' appears more than once", name),
                );
                continue;
            }
            match schema.get(name) {
                None if self.unparsed.contains(name) => {}
                None => self.report(
                    "hierarchy/naming_pattern",
                    ViolationKind::UnknownPlaceholder,
                    format!("placeholder '{{{}}}' names no declared level", name),
                ),
                Some(level) if level.navigation_only => self.report(
                    "hierarchy/naming_pattern",
                    ViolationKind::UnknownPlaceholder,
                    format!(
                        "placeholder '{{{}}}' names a navigation-only level, \
                         which is never rendered",
                        name
                    ),
                ),
                Some(_) => {}
            }
        }

        for level in schema.levels() {
            if let Some(sep) = &level.separator {
                template.override_separator(&level.name, sep);
            }
        }
        Some(template)
    }

    /// Levels missing from the template must be navigation-only or offer at
    /// most one choice anywhere in the tree.
    fn check_unrendered(&mut self, schema: &Schema, template: &NamingTemplate, root: &Node) {
        let mut per_level = vec![0u64; schema.len()];
        root.max_choices(&mut per_level);
        for (idx, level) in schema.levels().iter().enumerate() {
            if level.navigation_only || template.references(&level.name) {
                continue;
            }
            if per_level[idx] > 1 {
                self.report(
                    format!("hierarchy/levels[{}]", idx),
                    ViolationKind::UnrenderedLevel,
                    format!(
                        "level '{}' offers up to {} choices but is not in the naming pattern; \
                         add it to the pattern or mark it navigation_only",
                        level.name, per_level[idx]
                    ),
                );
            }
        }
    }
}

/// Walks the tree payload and builds the compiled node structure.
struct Compiler<'a> {
    schema: &'a Schema,
    checker: &'a mut Checker,
}

impl Compiler<'_> {
    fn report(&mut self, path: impl Into<String>, kind: ViolationKind, message: impl Into<String>) {
        self.checker.report(path, kind, message);
    }

    /// Compile the children of `obj`, which choose `remaining[0]`.
    fn compile(&mut self, obj: &Map<String, Value>, remaining: &[usize], path: &str) -> Node {
        let children: Vec<(&String, &Value)> = child_entries(obj).collect();
        if children.is_empty() {
            return Node::End;
        }
        let Some((&level_idx, rest)) = remaining.split_first() else {
            self.report(
                path,
                ViolationKind::OrphanedData,
                format!(
                    "children [{}] sit beneath the last level of this branch",
                    children.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>().join(", ")
                ),
            );
            return Node::End;
        };
        let level = self.schema.level(level_idx);

        if level.is_instance() {
            return match children.iter().find(|(k, _)| level.is_container_key(k)) {
                Some((key, value)) => {
                    self.compile_instances(level_idx, key, value, &children, rest, path)
                }
                None => {
                    debug!(level = %level.name, path, "instance level absent beneath branch");
                    self.compile(obj, rest, path)
                }
            };
        }

        // An instance container where tree choices are expected means the
        // intermediate tree levels are absent for this branch.
        if let Some((key, _)) = children.iter().find(|(_, v)| is_instance_container(v)) {
            return match self.schema.container_level(key) {
                Some(target) => match remaining.iter().position(|&l| l == target) {
                    Some(pos) => self.compile(obj, &remaining[pos..], path),
                    None => {
                        self.report(
                            format!("{}/{}", path, key),
                            ViolationKind::InstanceNesting,
                            format!(
                                "instance container for level '{}' cannot appear at level '{}'",
                                self.schema.level(target).name,
                                level.name
                            ),
                        );
                        Node::End
                    }
                },
                None => {
                    self.report(
                        format!("{}/{}", path, key),
                        ViolationKind::UnknownLevel,
                        format!("instance container '{}' names no declared instance level", key),
                    );
                    Node::End
                }
            };
        }

        let branches = children
            .into_iter()
            .map(|(key, value)| self.compile_branch(level_idx, key, value, rest, path))
            .collect();
        Node::Tree {
            level: level_idx,
            branches,
        }
    }

    fn compile_instances(
        &mut self,
        level_idx: usize,
        key: &str,
        value: &Value,
        siblings: &[(&String, &Value)],
        rest: &[usize],
        path: &str,
    ) -> Node {
        let cpath = format!("{}/{}", path, key);

        for (other, other_value) in siblings.iter().filter(|(k, _)| k.as_str() != key) {
            if is_instance_container(other_value) {
                self.report(
                    format!("{}/{}", path, other),
                    ViolationKind::InstanceNesting,
                    format!(
                        "instance containers '{}' and '{}' are siblings; \
                         consecutive instance levels must nest ('{}' inside '{}')",
                        key, other, other, key
                    ),
                );
            } else {
                self.report(
                    format!("{}/{}", path, other),
                    ViolationKind::OrphanedData,
                    format!(
                        "'{}' sits beside instance container '{}'; \
                         data for later levels belongs inside the container",
                        other, key
                    ),
                );
            }
        }

        let Some(container) = value.as_object() else {
            self.report(
                &cpath,
                ViolationKind::MalformedDocument,
                "instance container must be an object",
            );
            return Node::End;
        };

        let expansion = match container.get(META_EXPANSION) {
            None => {
                self.report(
                    &cpath,
                    ViolationKind::InvalidExpansion,
                    format!(
                        "'{}' names instance level '{}' but has no '{}'",
                        key,
                        self.schema.level(level_idx).name,
                        META_EXPANSION
                    ),
                );
                None
            }
            Some(spec) => match Expansion::from_json(spec) {
                Ok(expansion) => Some(expansion),
                Err(errors) => {
                    for e in errors {
                        self.report(
                            format!("{}/{}", cpath, META_EXPANSION),
                            ViolationKind::InvalidExpansion,
                            e,
                        );
                    }
                    None
                }
            },
        };

        if container.contains_key(META_IS_LEAF) {
            self.report(
                &cpath,
                ViolationKind::LeafAmbiguity,
                "instance containers cannot carry a leaf marker; \
                 every generated value shares the subtree",
            );
        }
        let description = self.string_meta(container, META_DESCRIPTION, &cpath);
        let separator = self.string_meta(container, META_SEPARATOR, &cpath);

        let beneath = self.remaining_for(container, rest, Some(level_idx), &cpath);
        let next = self.compile(container, &beneath, &cpath);

        match expansion {
            Some(expansion) => Node::Instances {
                level: level_idx,
                container: key.to_string(),
                description,
                expansion,
                separator,
                next: Box::new(next),
            },
            None => Node::End,
        }
    }

    fn compile_branch(
        &mut self,
        level_idx: usize,
        key: &str,
        value: &Value,
        rest: &[usize],
        path: &str,
    ) -> Branch {
        let bpath = format!("{}/{}", path, key);
        let empty = Map::new();
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Null => &empty,
            _ => {
                self.report(
                    &bpath,
                    ViolationKind::MalformedDocument,
                    "tree entries must be objects",
                );
                &empty
            }
        };

        let is_leaf = match obj.get(META_IS_LEAF) {
            None => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.report(
                    &bpath,
                    ViolationKind::LeafAmbiguity,
                    format!("'{}' must be true or false", META_IS_LEAF),
                );
                None
            }
        };

        let beneath = self.remaining_for(obj, rest, Some(level_idx), &bpath);
        let next = self.compile(obj, &beneath, &bpath);

        if is_leaf == Some(false) && next.is_end() {
            self.report(
                &bpath,
                ViolationKind::OrphanedData,
                format!(
                    "'{}' is marked as not a leaf but has no children, so it names no channel",
                    key
                ),
            );
        }

        Branch {
            key: key.to_string(),
            channel_part: self.string_meta(obj, META_CHANNEL_PART, &bpath),
            separator: self.string_meta(obj, META_SEPARATOR, &bpath),
            description: self.string_meta(obj, META_DESCRIPTION, &bpath),
            addressable: is_leaf == Some(true) && !next.is_end(),
            next,
        }
    }

    /// Level sequence beneath `obj`: its `_levels` override, or `default`.
    fn remaining_for(
        &mut self,
        obj: &Map<String, Value>,
        default: &[usize],
        current: Option<usize>,
        path: &str,
    ) -> Vec<usize> {
        let Some(spec) = obj.get(META_LEVELS) else {
            return default.to_vec();
        };
        let lpath = format!("{}/{}", path, META_LEVELS);
        let Some(items) = spec.as_array() else {
            self.report(
                lpath,
                ViolationKind::MalformedDocument,
                format!("'{}' must be a list of level names", META_LEVELS),
            );
            return default.to_vec();
        };

        let mut levels = Vec::with_capacity(items.len());
        let mut floor = current;
        for item in items {
            let Some(name) = item.as_str() else {
                self.report(
                    &lpath,
                    ViolationKind::MalformedDocument,
                    format!("'{}' entries must be level names", META_LEVELS),
                );
                continue;
            };
            match self.schema.index_of(name) {
                None => self.report(
                    &lpath,
                    ViolationKind::UnknownLevel,
                    format!("'{}' is not a declared level", name),
                ),
                Some(idx) if floor.is_some_and(|f| idx <= f) => self.report(
                    &lpath,
                    ViolationKind::UnknownLevel,
                    format!("'{}' is out of order; levels must follow the declared sequence", name),
                ),
                Some(idx) => {
                    levels.push(idx);
                    floor = Some(idx);
                }
            }
        }
        levels
    }

    fn string_meta(&mut self, obj: &Map<String, Value>, key: &str, path: &str) -> Option<String> {
        match obj.get(key)? {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.report(
                    path,
                    ViolationKind::MalformedDocument,
                    format!("'{}' must be a string", key),
                );
                None
            }
        }
    }
}
