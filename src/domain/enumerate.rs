//! Lazy enumeration of every channel in a database.
//!
//! The traversal keeps an explicit stack of frames instead of recursing, so
//! memory stays proportional to hierarchy depth no matter how many
//! instances an expansion generates.

use crate::domain::expansion::ExpansionValues;
use crate::domain::path::{PathStep, ResolvedPath, Selection};
use crate::domain::schema::Schema;
use crate::domain::template::NamingTemplate;
use crate::domain::tree::{Branch, Node};

/// One enumerated channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub identifier: String,
    pub path: ResolvedPath,
}

enum Frame<'a> {
    Tree {
        level: usize,
        branches: &'a [Branch],
        cursor: usize,
    },
    Instances {
        level: usize,
        separator: Option<&'a str>,
        values: ExpansionValues<'a>,
        next: &'a Node,
    },
}

/// Depth-first, document-order stream of channels.
///
/// Explicitly marked leaves with children are yielded before their
/// descendants. Dropping the iterator early releases everything.
pub struct Channels<'a> {
    schema: &'a Schema,
    template: &'a NamingTemplate,
    stack: Vec<Frame<'a>>,
    /// Current selection per schema level
    trail: Vec<Option<Selection>>,
}

impl<'a> Channels<'a> {
    pub(crate) fn new(schema: &'a Schema, template: &'a NamingTemplate, root: &'a Node) -> Self {
        let mut channels = Self {
            schema,
            template,
            stack: Vec::with_capacity(schema.len()),
            trail: vec![None; schema.len()],
        };
        channels.push(root);
        channels
    }

    fn push(&mut self, node: &'a Node) {
        match node {
            Node::Tree { level, branches } => self.stack.push(Frame::Tree {
                level: *level,
                branches,
                cursor: 0,
            }),
            Node::Instances {
                level,
                expansion,
                separator,
                next,
                ..
            } => self.stack.push(Frame::Instances {
                level: *level,
                separator: separator.as_deref(),
                values: expansion.values(),
                next,
            }),
            Node::End => {}
        }
    }

    /// Set `level` and forget every deeper choice.
    fn select(&mut self, level: usize, selection: Selection) {
        self.trail[level] = Some(selection);
        for deeper in &mut self.trail[level + 1..] {
            *deeper = None;
        }
    }

    fn emit(&self) -> Channel {
        let mut path = ResolvedPath::new();
        for (level, choice) in self.schema.levels().iter().zip(&self.trail) {
            let step = match choice {
                Some(selection) => PathStep::Value(selection.clone()),
                None => PathStep::Skipped,
            };
            path.push(level.name.clone(), step);
        }
        Channel {
            identifier: self.template.render(&path),
            path,
        }
    }
}

impl<'a> Iterator for Channels<'a> {
    type Item = Channel;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            match frame {
                Frame::Tree {
                    level,
                    branches,
                    cursor,
                } => {
                    let branches: &'a [Branch] = *branches;
                    let Some(branch) = branches.get(*cursor) else {
                        self.stack.pop();
                        continue;
                    };
                    *cursor += 1;
                    let level = *level;
                    self.select(level, branch.selection());
                    if branch.is_leaf() {
                        return Some(self.emit());
                    }
                    self.push(&branch.next);
                    if branch.addressable {
                        return Some(self.emit());
                    }
                }
                Frame::Instances {
                    level,
                    separator,
                    values,
                    next,
                } => {
                    let Some(value) = values.next() else {
                        self.stack.pop();
                        continue;
                    };
                    let (level, next): (usize, &'a Node) = (*level, *next);
                    let selection = Selection {
                        key: value,
                        channel_part: None,
                        separator: separator.map(str::to_string),
                    };
                    self.select(level, selection);
                    if next.is_end() {
                        return Some(self.emit());
                    }
                    self.push(next);
                }
            }
        }
    }
}
