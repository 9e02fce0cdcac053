//! Naming compiler: renders a resolved path into a channel identifier.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::error::RenderContractViolation;
use crate::domain::path::{PathStep, ResolvedPath};
use crate::domain::schema::RawPattern;

/// Separator joining list-form patterns when none is configured.
pub const DEFAULT_SEPARATOR: &str = ":";

/// Ordered placeholders with the literal text around them.
///
/// The literal between two placeholders is the separator following the left
/// one; text before the first and after the last placeholder is kept verbatim.
/// A bracket pair enclosing exactly one placeholder, as in `[{device}]`,
/// belongs to that level and is dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    source: String,
    prefix: String,
    slots: Vec<Slot>,
    suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    level: String,
    open: String,
    close: String,
    separator: String,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("valid placeholder regex"))
}

impl NamingTemplate {
    /// Parse a pattern string such as `LINE{line}:{station}:{parameter}`.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let unbalanced = || format!("unbalanced brace in naming pattern '{}'", pattern);
        let mut names: Vec<String> = Vec::new();
        // literals[i] precedes names[i]; the last one is the suffix
        let mut literals: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(pattern) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let gap = &pattern[last..whole.start()];
            if gap.contains(['{', '}']) {
                return Err(unbalanced());
            }
            literal.push_str(gap);
            last = whole.end();
            match whole.as_str() {
                "{{" => literal.push('{'),
                "}}" => literal.push('}'),
                _ => {
                    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    if name.is_empty() {
                        return Err(format!("empty placeholder in naming pattern '{}'", pattern));
                    }
                    names.push(name.to_string());
                    literals.push(std::mem::take(&mut literal));
                }
            }
        }
        let tail = &pattern[last..];
        if tail.contains(['{', '}']) {
            return Err(unbalanced());
        }
        if names.is_empty() {
            return Err(format!("naming pattern '{}' references no level", pattern));
        }
        literal.push_str(tail);
        literals.push(literal);

        let mut slots = Vec::with_capacity(names.len());
        for (i, level) in names.into_iter().enumerate() {
            let (open, close) = take_wrapping(&mut literals, i);
            slots.push(Slot {
                level,
                open,
                close,
                separator: String::new(),
            });
        }
        let count = slots.len();
        for (i, slot) in slots.iter_mut().enumerate().take(count - 1) {
            slot.separator = std::mem::take(&mut literals[i + 1]);
        }

        Ok(Self {
            source: pattern.to_string(),
            prefix: std::mem::take(&mut literals[0]),
            slots,
            suffix: std::mem::take(&mut literals[count]),
        })
    }

    /// Join level names with `separator`.
    pub fn from_levels(levels: &[String], separator: &str) -> Result<Self, String> {
        if levels.is_empty() {
            return Err("naming pattern references no level".to_string());
        }
        let slots: Vec<Slot> = levels
            .iter()
            .enumerate()
            .map(|(i, level)| Slot {
                level: level.clone(),
                open: String::new(),
                close: String::new(),
                separator: if i + 1 < levels.len() {
                    separator.to_string()
                } else {
                    String::new()
                },
            })
            .collect();
        let source = levels
            .iter()
            .map(|l| format!("{{{}}}", l))
            .collect::<Vec<_>>()
            .join(separator);
        Ok(Self {
            source,
            prefix: String::new(),
            slots,
            suffix: String::new(),
        })
    }

    pub fn from_raw(raw: &RawPattern, separator: Option<&str>) -> Result<Self, String> {
        match raw {
            RawPattern::Text(pattern) => Self::parse(pattern),
            RawPattern::Levels(levels) => {
                Self::from_levels(levels, separator.unwrap_or(DEFAULT_SEPARATOR))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Referenced level names in template order.
    pub fn levels(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.level.as_str())
    }

    pub fn references(&self, level: &str) -> bool {
        self.slots.iter().any(|s| s.level == level)
    }

    /// Replace the separator following `level` (not applied to the last
    /// placeholder, which has no successor).
    pub(crate) fn override_separator(&mut self, level: &str, separator: &str) {
        let count = self.slots.len();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.level == level && i + 1 < count {
                slot.separator = separator.to_string();
            }
        }
    }

    /// Render `path`, dropping skipped or empty levels together with their
    /// separators and wrapping brackets.
    ///
    /// The output never contains a doubled separator at a join or a
    /// trailing separator, however many levels were skipped.
    pub fn try_render(&self, path: &ResolvedPath) -> Result<String, RenderContractViolation> {
        let mut out = self.prefix.clone();
        let mut pending: Option<&str> = None;

        for slot in &self.slots {
            let step = path.step(&slot.level).ok_or_else(|| RenderContractViolation {
                level: slot.level.clone(),
            })?;
            let selection = match step {
                PathStep::Value(selection) if !selection.fragment().is_empty() => selection,
                _ => {
                    // The brackets of a skipped level were the only join
                    // between its neighbours; its own separator takes over.
                    if pending == Some("") && !slot.open.is_empty() {
                        pending = Some(slot.separator.as_str());
                    }
                    continue;
                }
            };
            let piece = format!("{}{}{}", slot.open, selection.fragment(), slot.close);
            if let Some(separator) = pending.take() {
                push_separator(&mut out, separator, &piece);
            }
            out.push_str(&piece);
            pending = Some(selection.separator.as_deref().unwrap_or(&slot.separator));
        }

        out.push_str(&self.suffix);
        Ok(out)
    }

    /// Render `path`.
    ///
    /// # Panics
    /// When `path` lacks an entry for a templated level. Enumeration and
    /// navigation never produce such a path; hand-built paths should use
    /// [`NamingTemplate::try_render`].
    pub fn render(&self, path: &ResolvedPath) -> String {
        match self.try_render(path) {
            Ok(identifier) => identifier,
            Err(violation) => panic!("{}", violation),
        }
    }
}

/// Move a bracket pair enclosing placeholder `i` out of the literals around
/// it, returning the opening and closing halves.
fn take_wrapping(literals: &mut [String], i: usize) -> (String, String) {
    let openers: Vec<char> = literals[i]
        .chars()
        .rev()
        .take_while(|c| closer_for(*c).is_some())
        .collect();
    let depth = openers
        .iter()
        .zip(literals[i + 1].chars())
        .take_while(|(open, close)| closer_for(**open) == Some(*close))
        .count();
    if depth == 0 {
        return (String::new(), String::new());
    }
    // Brackets are ASCII, one byte each
    let split = literals[i].len() - depth;
    let open = literals[i].split_off(split);
    let close = literals[i + 1].drain(..depth).collect();
    (open, close)
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '<' => Some('>'),
        '{' => Some('}'),
        _ => None,
    }
}

fn push_separator(out: &mut String, separator: &str, next: &str) {
    if separator.is_empty()
        || out.is_empty()
        || out.ends_with(separator)
        || next.starts_with(separator)
    {
        return;
    }
    out.push_str(separator);
}
