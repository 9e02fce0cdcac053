//! Depth-limited tree preview of a database, built from navigation queries.

use termtree::Tree;
use tracing::instrument;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{Choices, Database, Resolution};

/// How much of the hierarchy to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOptions {
    /// Levels shown beneath the starting point
    pub depth: usize,
    /// Children shown per node before eliding the rest
    pub max_items: usize,
    /// Navigational prefix to start from
    pub focus: Vec<String>,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            depth: 3,
            max_items: 10,
            focus: Vec::new(),
        }
    }
}

/// Build the preview tree.
///
/// Instance levels show their expansion once; the subtree beneath is shared
/// by every value, so it is expanded for the first value only.
#[instrument(level = "debug", skip(db))]
pub fn build_preview(db: &Database, opts: &PreviewOptions) -> ApplicationResult<Tree<String>> {
    let label = if opts.focus.is_empty() {
        format!("{} ({} channels)", db.template().as_str(), db.channel_count())
    } else {
        opts.focus.join(" / ")
    };
    let mut root = Tree::new(label);
    let mut prefix = opts.focus.clone();
    add_children(db, opts, &mut prefix, opts.depth, &mut root)?;
    Ok(root)
}

fn add_children(
    db: &Database,
    opts: &PreviewOptions,
    prefix: &mut Vec<String>,
    depth: usize,
    parent: &mut Tree<String>,
) -> ApplicationResult<()> {
    match db.children_at(prefix.as_slice()) {
        Choices::Invalid(invalid) => Err(ApplicationError::Navigation(invalid)),
        Choices::Terminal => Ok(()),
        _ if depth == 0 => {
            parent.push(Tree::new("…".to_string()));
            Ok(())
        }
        Choices::Branches { level, branches } => {
            for branch in branches.iter().take(opts.max_items) {
                let mut label = match &branch.channel_part {
                    Some(part) if part != &branch.key => format!("{} ({})", branch.key, part),
                    _ => branch.key.clone(),
                };
                prefix.push(branch.key.clone());
                if branch.is_channel() {
                    if let Some(id) = channel_at(db, prefix) {
                        label = format!("{}  → {}", label, id);
                    }
                }
                let mut child = Tree::new(label);
                add_children(db, opts, prefix, depth - 1, &mut child)?;
                prefix.pop();
                parent.push(child);
            }
            if branches.len() > opts.max_items {
                parent.push(Tree::new(format!(
                    "… {} more {}",
                    branches.len() - opts.max_items,
                    level.name
                )));
            }
            Ok(())
        }
        Choices::Instances {
            level, expansion, ..
        } => {
            let mut child = Tree::new(format!("<{}> {}", level.name, expansion));
            if let Some(first) = expansion.value(0) {
                prefix.push(first);
                add_children(db, opts, prefix, depth - 1, &mut child)?;
                prefix.pop();
            }
            parent.push(child);
            Ok(())
        }
    }
}

fn channel_at(db: &Database, prefix: &[String]) -> Option<String> {
    match db.resolve(prefix) {
        Resolution::Leaf { identifier, .. } => Some(identifier),
        Resolution::Ambiguous { channel, .. } => channel,
        Resolution::Invalid(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db() -> Database {
        crate::domain::load(&json!({
            "hierarchy": {
                "levels": [
                    {"name": "line", "type": "instances"},
                    {"name": "station", "type": "tree"},
                    {"name": "parameter", "type": "tree"}
                ],
                "naming_pattern": "LINE{line}:{station}:{parameter}"
            },
            "tree": {
                "LINE": {
                    "_expansion": {"_type": "range", "_range": [1, 5]},
                    "ASSEMBLY": {"SPEED": {}, "STATUS": {}},
                    "INSPECTION": {"STATUS": {}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn given_full_depth_when_previewing_then_shows_identifiers_of_first_instance() {
        let tree = build_preview(&db(), &PreviewOptions::default()).unwrap();
        let text = tree.to_string();
        assert!(text.contains("(15 channels)"));
        assert!(text.contains("<line> range 1..=5"));
        assert!(text.contains("SPEED  → LINE1:ASSEMBLY:SPEED"));
    }

    #[test]
    fn given_item_limit_when_previewing_then_elides_rest() {
        let opts = PreviewOptions {
            max_items: 1,
            ..PreviewOptions::default()
        };
        let text = build_preview(&db(), &opts).unwrap().to_string();
        assert!(text.contains("… 1 more station"));
        assert!(!text.contains("INSPECTION"));
    }

    #[test]
    fn given_depth_one_when_previewing_then_truncates() {
        let opts = PreviewOptions {
            depth: 1,
            ..PreviewOptions::default()
        };
        let text = build_preview(&db(), &opts).unwrap().to_string();
        assert!(text.contains("…"));
        assert!(!text.contains("ASSEMBLY"));
    }

    #[test]
    fn given_invalid_focus_when_previewing_then_navigation_error() {
        let opts = PreviewOptions {
            focus: vec!["9".into()],
            ..PreviewOptions::default()
        };
        let err = build_preview(&db(), &opts).unwrap_err();
        assert!(matches!(err, ApplicationError::Navigation(ref inv) if inv.depth == 0));
    }
}
