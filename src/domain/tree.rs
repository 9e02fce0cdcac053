//! Compiled concrete tree.
//!
//! Every branch owns the node beneath it, so branches of the same level may
//! continue with different level sequences (heterogeneous subtrees). Level
//! fields are indices into the schema's level list and strictly increase
//! along any root-to-leaf route.

use crate::domain::expansion::Expansion;
use crate::domain::path::Selection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Finite named choices of a tree level
    Tree { level: usize, branches: Vec<Branch> },
    /// Generated values of an instance level, all sharing `next`
    Instances {
        level: usize,
        /// Payload key of the instance container
        container: String,
        description: Option<String>,
        expansion: Expansion,
        separator: Option<String>,
        next: Box<Node>,
    },
    /// Nothing beneath: the route ends at a leaf
    End,
}

/// One choice at a tree level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub key: String,
    pub channel_part: Option<String>,
    pub separator: Option<String>,
    pub description: Option<String>,
    /// Explicitly marked leaf that also has children
    pub addressable: bool,
    pub next: Node,
}

impl Branch {
    /// Childless branches are implicit leaves.
    pub fn is_leaf(&self) -> bool {
        self.next.is_end()
    }

    /// Whether the branch itself names a channel.
    pub fn is_channel(&self) -> bool {
        self.is_leaf() || self.addressable
    }

    pub fn selection(&self) -> Selection {
        Selection {
            key: self.key.clone(),
            channel_part: self.channel_part.clone(),
            separator: self.separator.clone(),
        }
    }
}

impl Node {
    pub fn is_end(&self) -> bool {
        matches!(self, Node::End)
    }

    /// Schema index of the level this node chooses.
    pub fn level(&self) -> Option<usize> {
        match self {
            Node::Tree { level, .. } | Node::Instances { level, .. } => Some(*level),
            Node::End => None,
        }
    }

    /// Number of choices offered here.
    pub fn choice_count(&self) -> u64 {
        match self {
            Node::Tree { branches, .. } => branches.len() as u64,
            Node::Instances { expansion, .. } => expansion.len(),
            Node::End => 0,
        }
    }

    /// Channels reachable beneath this node, computed arithmetically.
    ///
    /// Validation rejects trees whose count exceeds `u64::MAX`, so every
    /// compiled node answers exactly.
    pub fn channel_count(&self) -> u64 {
        self.checked_channel_count().unwrap_or(u64::MAX)
    }

    /// Channel count, or `None` when it does not fit in a `u64`.
    pub fn checked_channel_count(&self) -> Option<u64> {
        match self {
            Node::Tree { branches, .. } => branches.iter().try_fold(0u64, |acc, b| {
                let here = if b.is_leaf() {
                    1
                } else {
                    b.next
                        .checked_channel_count()?
                        .checked_add(b.addressable as u64)?
                };
                acc.checked_add(here)
            }),
            Node::Instances {
                expansion, next, ..
            } => {
                let per_value = if next.is_end() {
                    1
                } else {
                    next.checked_channel_count()?
                };
                expansion.len().checked_mul(per_value)
            }
            Node::End => Some(0),
        }
    }

    /// Level indices that still offer choices somewhere beneath (and at)
    /// this node, in schema order.
    pub fn levels_below(&self) -> Vec<usize> {
        let mut levels = Vec::new();
        self.collect_levels(&mut levels);
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    fn collect_levels(&self, acc: &mut Vec<usize>) {
        match self {
            Node::Tree { level, branches } => {
                acc.push(*level);
                for b in branches {
                    b.next.collect_levels(acc);
                }
            }
            Node::Instances { level, next, .. } => {
                acc.push(*level);
                next.collect_levels(acc);
            }
            Node::End => {}
        }
    }

    /// Largest number of choices each level offers anywhere beneath.
    pub fn max_choices(&self, per_level: &mut [u64]) {
        match self {
            Node::Tree { level, branches } => {
                per_level[*level] = per_level[*level].max(branches.len() as u64);
                for b in branches {
                    b.next.max_choices(per_level);
                }
            }
            Node::Instances {
                level,
                expansion,
                next,
                ..
            } => {
                per_level[*level] = per_level[*level].max(expansion.len());
                next.max_choices(per_level);
            }
            Node::End => {}
        }
    }
}
