//! Incremental navigation over a database.
//!
//! Both queries are pure functions of the database and a prefix of
//! navigational keys. Bad input comes back as data, never as an error.

use std::fmt;

use crate::domain::database::Database;
use crate::domain::expansion::Expansion;
use crate::domain::path::{PathStep, ResolvedPath, Selection};
use crate::domain::schema::Level;
use crate::domain::tree::{Branch, Node};

/// Why a prefix does not lead anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationInvalid {
    /// Zero-based position of the offending value in the prefix
    pub depth: usize,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for NavigationInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' at position {} is not valid: {}",
            self.value,
            self.depth + 1,
            self.reason
        )
    }
}

/// Valid next choices after a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choices<'a> {
    /// Named children of a tree level
    Branches {
        level: &'a Level,
        branches: &'a [Branch],
    },
    /// Values of an instance level, described rather than listed
    Instances {
        level: &'a Level,
        expansion: &'a Expansion,
        description: Option<&'a str>,
    },
    /// The prefix ends at a leaf
    Terminal,
    Invalid(NavigationInvalid),
}

/// Outcome of resolving a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The prefix determines exactly one channel
    Leaf {
        identifier: String,
        path: ResolvedPath,
    },
    /// Further choices remain at these levels; `channel` is set when the
    /// prefix itself names an explicitly marked leaf
    Ambiguous {
        remaining_levels: Vec<String>,
        channel: Option<String>,
    },
    Invalid(NavigationInvalid),
}

/// Position reached by following a prefix.
struct Cursor<'a> {
    node: &'a Node,
    trail: Vec<Option<Selection>>,
    /// The last selected branch is itself a channel
    addressable: bool,
}

impl<'a> Cursor<'a> {
    fn choose(&mut self, level: usize, selection: Selection, addressable: bool, node: &'a Node) {
        self.trail[level] = Some(selection);
        self.addressable = addressable;
        self.node = node;
    }
}

impl Database {
    /// Valid next choices after `prefix`.
    pub fn children_at<S: AsRef<str>>(&self, prefix: &[S]) -> Choices<'_> {
        let cursor = match self.walk(prefix) {
            Ok(cursor) => cursor,
            Err(invalid) => return Choices::Invalid(invalid),
        };
        match cursor.node {
            Node::Tree { level, branches } => Choices::Branches {
                level: self.schema().level(*level),
                branches,
            },
            Node::Instances {
                level,
                expansion,
                description,
                ..
            } => Choices::Instances {
                level: self.schema().level(*level),
                expansion,
                description: description.as_deref(),
            },
            Node::End => Choices::Terminal,
        }
    }

    /// Resolve `prefix`, following forced single-choice levels to the end.
    pub fn resolve<S: AsRef<str>>(&self, prefix: &[S]) -> Resolution {
        let mut cursor = match self.walk(prefix) {
            Ok(cursor) => cursor,
            Err(invalid) => return Resolution::Invalid(invalid),
        };

        loop {
            if cursor.node.is_end() {
                let path = self.path_of(&cursor.trail);
                return Resolution::Leaf {
                    identifier: self.render(&path),
                    path,
                };
            }
            if cursor.addressable {
                return Resolution::Ambiguous {
                    remaining_levels: self.level_names(cursor.node),
                    channel: Some(self.render(&self.path_of(&cursor.trail))),
                };
            }
            match cursor.node {
                Node::Tree { level, branches } if branches.len() == 1 => {
                    let branch = &branches[0];
                    cursor.choose(*level, branch.selection(), branch.addressable, &branch.next);
                }
                Node::Instances {
                    level,
                    expansion,
                    separator,
                    next,
                    ..
                } if expansion.len() == 1 => {
                    let Some(value) = expansion.value(0) else {
                        break;
                    };
                    let selection = Selection {
                        key: value,
                        channel_part: None,
                        separator: separator.clone(),
                    };
                    cursor.choose(*level, selection, false, next);
                }
                _ => break,
            }
        }

        Resolution::Ambiguous {
            remaining_levels: self.level_names(cursor.node),
            channel: None,
        }
    }

    fn walk<S: AsRef<str>>(&self, prefix: &[S]) -> Result<Cursor<'_>, NavigationInvalid> {
        let mut cursor = Cursor {
            node: self.root(),
            trail: vec![None; self.schema().len()],
            addressable: false,
        };

        for (depth, value) in prefix.iter().map(AsRef::as_ref).enumerate() {
            let invalid = |reason: String| NavigationInvalid {
                depth,
                value: value.to_string(),
                reason,
            };
            match cursor.node {
                Node::End => {
                    return Err(invalid("the prefix already names a leaf channel".into()));
                }
                Node::Tree { level, branches } => {
                    let Some(branch) = branches.iter().find(|b| b.key == value) else {
                        return Err(invalid(format!(
                            "no such {} here; expected one of: {}",
                            self.schema().level(*level).name,
                            branches
                                .iter()
                                .map(|b| b.key.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        )));
                    };
                    cursor.choose(*level, branch.selection(), branch.addressable, &branch.next);
                }
                Node::Instances {
                    level,
                    expansion,
                    separator,
                    next,
                    ..
                } => {
                    if !expansion.contains(value) {
                        return Err(invalid(format!(
                            "not a generated {} value ({})",
                            self.schema().level(*level).name,
                            expansion
                        )));
                    }
                    let selection = Selection {
                        key: value.to_string(),
                        channel_part: None,
                        separator: separator.clone(),
                    };
                    cursor.choose(*level, selection, false, next);
                }
            }
        }
        Ok(cursor)
    }

    fn path_of(&self, trail: &[Option<Selection>]) -> ResolvedPath {
        let mut path = ResolvedPath::new();
        for (level, choice) in self.schema().levels().iter().zip(trail) {
            let step = match choice {
                Some(selection) => PathStep::Value(selection.clone()),
                None => PathStep::Skipped,
            };
            path.push(level.name.clone(), step);
        }
        path
    }

    fn level_names(&self, node: &Node) -> Vec<String> {
        node.levels_below()
            .into_iter()
            .map(|idx| self.schema().level(idx).name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::database::load;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn db() -> Database {
        load(&json!({
            "hierarchy": {
                "levels": [
                    {"name": "system", "type": "tree"},
                    {"name": "family", "type": "tree"},
                    {"name": "device", "type": "instances"},
                    {"name": "field", "type": "tree"}
                ],
                "naming_pattern": "{system}:{family}:{device}:{field}"
            },
            "tree": {
                "MAG": {
                    "QF": {
                        "_is_leaf": true,
                        "DEVICE": {
                            "_expansion": {"_type": "range", "_range": [1, 4], "_pattern": "QF{:02d}"},
                            "CURRENT": {},
                            "STATUS": {}
                        }
                    }
                },
                "VAC": {
                    "GAUGE": {
                        "DEVICE": {
                            "_expansion": {"_type": "list", "_instances": ["G1"]},
                            "PRESSURE": {}
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[rstest]
    fn given_root_when_asking_children_then_lists_systems(db: Database) {
        let Choices::Branches { level, branches } = db.children_at::<&str>(&[]) else {
            panic!("expected branches");
        };
        assert_eq!(level.name, "system");
        let keys: Vec<_> = branches.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, vec!["MAG", "VAC"]);
    }

    #[rstest]
    fn given_instance_level_when_asking_children_then_describes_expansion(db: Database) {
        let Choices::Instances { level, expansion, .. } = db.children_at(&["MAG", "QF"]) else {
            panic!("expected instances");
        };
        assert_eq!(level.name, "device");
        assert_eq!(expansion.len(), 4);
    }

    #[rstest]
    fn given_out_of_range_instance_when_navigating_then_invalid_at_depth(db: Database) {
        let Choices::Invalid(invalid) = db.children_at(&["MAG", "QF", "QF99"]) else {
            panic!("expected invalid");
        };
        assert_eq!(invalid.depth, 2);
        assert_eq!(invalid.value, "QF99");
    }

    #[rstest]
    fn given_full_path_when_resolving_then_leaf(db: Database) {
        let resolution = db.resolve(&["MAG", "QF", "QF03", "CURRENT"]);
        let Resolution::Leaf { identifier, .. } = resolution else {
            panic!("expected leaf, got {:?}", resolution);
        };
        assert_eq!(identifier, "MAG:QF:QF03:CURRENT");
        assert_eq!(db.children_at(&["MAG", "QF", "QF03", "CURRENT"]), Choices::Terminal);
    }

    #[rstest]
    fn given_forced_chain_when_resolving_then_follows_single_choices(db: Database) {
        let resolution = db.resolve(&["VAC"]);
        let Resolution::Leaf { identifier, .. } = resolution else {
            panic!("expected leaf, got {:?}", resolution);
        };
        assert_eq!(identifier, "VAC:GAUGE:G1:PRESSURE");
    }

    #[rstest]
    fn given_explicit_leaf_with_children_when_resolving_then_ambiguous_with_channel(db: Database) {
        assert_eq!(
            db.resolve(&["MAG"]),
            Resolution::Ambiguous {
                remaining_levels: vec!["device".into(), "field".into()],
                channel: Some("MAG:QF".into()),
            }
        );
    }

    #[rstest]
    fn given_prefix_past_leaf_when_resolving_then_invalid(db: Database) {
        let prefix = ["VAC", "GAUGE", "G1", "PRESSURE", "X"];
        let Resolution::Invalid(invalid) = db.resolve(&prefix) else {
            panic!("expected invalid");
        };
        assert_eq!(invalid.depth, 4);
    }

    #[rstest]
    fn given_unknown_key_when_resolving_then_lists_expected(db: Database) {
        let Resolution::Invalid(invalid) = db.resolve(&["RF"]) else {
            panic!("expected invalid");
        };
        assert_eq!(invalid.depth, 0);
        assert!(invalid.reason.contains("MAG, VAC"));
    }
}
