//! Resolved paths: one entry per schema level along a channel's route.

use std::fmt;

/// A concrete choice made at one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Navigational key (tree branch key or instance value)
    pub key: String,
    /// Rendered in place of `key` when set
    pub channel_part: Option<String>,
    /// Branch-specific separator following this value
    pub separator: Option<String>,
}

impl Selection {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            channel_part: None,
            separator: None,
        }
    }

    /// Text contributed to the identifier.
    pub fn fragment(&self) -> &str {
        self.channel_part.as_deref().unwrap_or(&self.key)
    }
}

/// What happened at one level of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Value(Selection),
    /// The level does not exist beneath this branch
    Skipped,
}

/// Fully determined route through the hierarchy, terminating at a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedPath {
    steps: Vec<(String, PathStep)>,
}

impl ResolvedPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: impl Into<String>, step: PathStep) {
        self.steps.push((level.into(), step));
    }

    pub fn with_value(mut self, level: impl Into<String>, key: impl Into<String>) -> Self {
        self.push(level, PathStep::Value(Selection::new(key)));
        self
    }

    pub fn with_selection(mut self, level: impl Into<String>, selection: Selection) -> Self {
        self.push(level, PathStep::Value(selection));
        self
    }

    pub fn with_skipped(mut self, level: impl Into<String>) -> Self {
        self.push(level, PathStep::Skipped);
        self
    }

    pub fn step(&self, level: &str) -> Option<&PathStep> {
        self.steps
            .iter()
            .find(|(name, _)| name == level)
            .map(|(_, step)| step)
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &PathStep)> {
        self.steps.iter().map(|(name, step)| (name.as_str(), step))
    }

    /// Navigational keys of the non-skipped levels, i.e. the prefix a caller
    /// feeds to the navigation index to reach this channel.
    pub fn choices(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|(_, step)| match step {
                PathStep::Value(sel) => Some(sel.key.as_str()),
                PathStep::Skipped => None,
            })
            .collect()
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (level, step) in &self.steps {
            if let PathStep::Value(sel) = step {
                if !first {
                    write!(f, " / ")?;
                }
                write!(f, "{}={}", level, sel.key)?;
                first = false;
            }
        }
        Ok(())
    }
}
