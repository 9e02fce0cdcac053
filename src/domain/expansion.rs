//! Instance expansion specifications.
//!
//! An expansion describes a set of instance names without holding them:
//! values are addressed by index, so a level with millions of instances costs
//! nothing until a caller pulls a value.

use std::fmt;

use itertools::Itertools;
use serde_json::Value;

/// Brace format pattern, e.g. `QF{:02d}` or `S{}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatPattern {
    source: String,
    pieces: Vec<Piece>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Field(FieldSpec),
}

/// One `{...}` placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub width: usize,
    pub zero_pad: bool,
}

/// Value type a placeholder consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `{}`: integers and strings
    Any,
    /// `{:d}`, `{:03d}`
    Integer,
    /// `{:s}`
    Text,
}

/// Argument substituted into a placeholder.
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Int(i64),
    Text(&'a str),
}

impl FormatPattern {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut spec = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        spec.push(c);
                    }
                    if !closed {
                        return Err(format!("unclosed placeholder in pattern '{}'", source));
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Field(parse_field(&spec, source)?));
                }
                '}' => return Err(format!("unmatched '}}' in pattern '{}'", source)),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            pieces,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Field(f) => Some(f),
            Piece::Literal(_) => None,
        })
    }

    pub fn field_count(&self) -> usize {
        self.fields().count()
    }

    /// Substitute `args` into the placeholders in order.
    ///
    /// Missing arguments render as empty text.
    pub fn render(&self, args: &[Arg<'_>]) -> String {
        let mut out = String::new();
        let mut args = args.iter();
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Field(spec) => {
                    if let Some(arg) = args.next() {
                        out.push_str(&spec.format(*arg));
                    }
                }
            }
        }
        out
    }

    /// Split `text` into one slice per placeholder such that `accept` admits
    /// every slice. Returns the accepted indices, or `None` when the text
    /// cannot have been produced by this pattern.
    fn match_fields<'s, F>(&self, text: &'s str, mut accept: F) -> Option<Vec<u64>>
    where
        F: FnMut(usize, &'s str) -> Option<u64>,
    {
        let mut found = Vec::with_capacity(self.field_count());
        if self.match_from(0, 0, 0, text, &mut accept, &mut found) {
            Some(found)
        } else {
            None
        }
    }

    fn match_from<'s, F>(
        &self,
        piece_idx: usize,
        field_idx: usize,
        pos: usize,
        text: &'s str,
        accept: &mut F,
        found: &mut Vec<u64>,
    ) -> bool
    where
        F: FnMut(usize, &'s str) -> Option<u64>,
    {
        let Some(piece) = self.pieces.get(piece_idx) else {
            return pos == text.len();
        };
        match piece {
            Piece::Literal(lit) => {
                let next = pos + lit.len();
                text[pos..].starts_with(lit.as_str())
                    && self.match_from(piece_idx + 1, field_idx, next, text, accept, found)
            }
            Piece::Field(_) => {
                let ends = (pos..=text.len()).filter(|&end| text.is_char_boundary(end));
                for end in ends {
                    if let Some(idx) = accept(field_idx, &text[pos..end]) {
                        found.push(idx);
                        if self.match_from(piece_idx + 1, field_idx + 1, end, text, accept, found) {
                            return true;
                        }
                        found.pop();
                    }
                }
                false
            }
        }
    }
}

impl fmt::Display for FormatPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn parse_field(spec: &str, source: &str) -> Result<FieldSpec, String> {
    let unsupported = || format!("unsupported placeholder '{{{}}}' in pattern '{}'", spec, source);
    if spec.is_empty() {
        return Ok(FieldSpec {
            kind: FieldKind::Any,
            width: 0,
            zero_pad: false,
        });
    }
    let body = spec.strip_prefix(':').ok_or_else(unsupported)?;
    let (body, kind) = match body.chars().last() {
        Some('d') => (&body[..body.len() - 1], FieldKind::Integer),
        Some('s') => (&body[..body.len() - 1], FieldKind::Text),
        _ => (body, FieldKind::Any),
    };
    let zero_pad = body.starts_with('0');
    let width = if body.is_empty() {
        0
    } else {
        body.parse::<usize>().map_err(|_| unsupported())?
    };
    if zero_pad && kind == FieldKind::Text {
        return Err(unsupported());
    }
    Ok(FieldSpec {
        kind,
        width,
        zero_pad,
    })
}

impl FieldSpec {
    fn format(&self, arg: Arg<'_>) -> String {
        let width = self.width;
        match arg {
            Arg::Int(n) if self.zero_pad => format!("{:0width$}", n),
            Arg::Int(n) => format!("{:>width$}", n),
            Arg::Text(s) => format!("{:<width$}", s),
        }
    }

    fn accepts_integers(&self) -> bool {
        matches!(self.kind, FieldKind::Any | FieldKind::Integer)
    }

    fn accepts_text(&self) -> bool {
        matches!(self.kind, FieldKind::Any | FieldKind::Text)
    }

    /// Recover the integer this field rendered as `text`, if any.
    fn parse_int(&self, text: &str) -> Option<i64> {
        let n: i64 = text.trim_start().parse().ok()?;
        (self.format(Arg::Int(n)) == text).then_some(n)
    }
}

/// How an instance level generates its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// Inclusive integer range rendered through `pattern`
    Range {
        start: i64,
        end: i64,
        step: i64,
        pattern: FormatPattern,
    },
    /// Explicit values, optionally wrapped by `pattern`
    List {
        values: Vec<String>,
        pattern: Option<FormatPattern>,
    },
    /// Cartesian product of `parts` substituted into `pattern`;
    /// the first part varies slowest
    Composite {
        pattern: FormatPattern,
        parts: Vec<Expansion>,
    },
}

impl Expansion {
    /// Parse an `_expansion` object, collecting every problem found.
    pub fn from_json(value: &Value) -> Result<Self, Vec<String>> {
        let Some(obj) = value.as_object() else {
            return Err(vec!["expansion must be an object".to_string()]);
        };
        let pattern_src = match obj.get("_pattern") {
            None => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(_) => return Err(vec!["'_pattern' must be a string".to_string()]),
        };

        match obj.get("_type").and_then(Value::as_str) {
            Some("range") => Self::range_from_json(obj, pattern_src),
            Some("list") => Self::list_from_json(obj, pattern_src),
            Some("pattern") => Self::composite_from_json(obj, pattern_src),
            Some(other) => Err(vec![format!(
                "unknown expansion type '{}' (expected range, list or pattern)",
                other
            )]),
            None => Err(vec!["expansion has no '_type'".to_string()]),
        }
    }

    fn range_from_json(
        obj: &serde_json::Map<String, Value>,
        pattern_src: Option<&str>,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let bounds = obj
            .get("_range")
            .and_then(Value::as_array)
            .map(|a| a.iter().map(Value::as_i64).collect::<Vec<_>>());
        let (start, end) = match bounds.as_deref() {
            Some([Some(start), Some(end)]) => {
                if start > end {
                    errors.push(format!("range bounds out of order: {} > {}", start, end));
                }
                (*start, *end)
            }
            Some(_) => {
                errors.push("'_range' must hold exactly two integer bounds".to_string());
                (0, 0)
            }
            None => {
                errors.push("range expansion needs '_range': [start, end]".to_string());
                (0, 0)
            }
        };

        let step = match obj.get("_step") {
            None => 1,
            Some(v) => match v.as_i64() {
                Some(step) if step > 0 => step,
                _ => {
                    errors.push("'_step' must be a positive integer".to_string());
                    1
                }
            },
        };
        if start <= end && range_count(start, end, step) > i128::from(u64::MAX) {
            errors.push(format!(
                "range {}..={} generates more than {} values",
                start,
                end,
                u64::MAX
            ));
        }

        let pattern = match FormatPattern::parse(pattern_src.unwrap_or("{}")) {
            Ok(p) => {
                let fields: Vec<_> = p.fields().collect();
                if fields.len() != 1 {
                    errors.push(format!(
                        "range pattern '{}' must have exactly one placeholder, found {}",
                        p,
                        fields.len()
                    ));
                } else if !fields[0].accepts_integers() {
                    errors.push(format!("range pattern '{}' does not consume integers", p));
                }
                Some(p)
            }
            Err(e) => {
                errors.push(e);
                None
            }
        };

        match pattern {
            Some(pattern) if errors.is_empty() => Ok(Expansion::Range {
                start,
                end,
                step,
                pattern,
            }),
            _ => Err(errors),
        }
    }

    fn list_from_json(
        obj: &serde_json::Map<String, Value>,
        pattern_src: Option<&str>,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let values: Vec<String> = match obj.get("_instances").and_then(Value::as_array) {
            Some(items) => {
                let strings: Vec<String> = items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect();
                if strings.len() != items.len() {
                    errors.push("'_instances' may only hold strings or numbers".to_string());
                }
                strings
            }
            None => {
                errors.push("list expansion needs '_instances': [...]".to_string());
                Vec::new()
            }
        };
        if values.is_empty() && errors.is_empty() {
            errors.push("list expansion is empty".to_string());
        }
        let duplicates: Vec<&String> = values.iter().duplicates().collect();
        if !duplicates.is_empty() {
            errors.push(format!(
                "list expansion repeats {}",
                duplicates.iter().map(|d| format!("'{}'", d)).join(", ")
            ));
        }

        let pattern = match pattern_src.map(FormatPattern::parse).transpose() {
            Ok(Some(p)) => {
                let fields: Vec<_> = p.fields().collect();
                if fields.len() != 1 || !fields[0].accepts_text() {
                    errors.push(format!(
                        "list pattern '{}' must have exactly one string placeholder",
                        p
                    ));
                }
                Some(p)
            }
            Ok(None) => None,
            Err(e) => {
                errors.push(e);
                None
            }
        };

        if errors.is_empty() {
            Ok(Expansion::List { values, pattern })
        } else {
            Err(errors)
        }
    }

    fn composite_from_json(
        obj: &serde_json::Map<String, Value>,
        pattern_src: Option<&str>,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let parts: Vec<Expansion> = match obj.get("_parts").and_then(Value::as_array) {
            Some(items) if !items.is_empty() => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match Expansion::from_json(item) {
                    Ok(part) => Some(part),
                    Err(part_errors) => {
                        errors.extend(
                            part_errors
                                .into_iter()
                                .map(|e| format!("part {}: {}", i, e)),
                        );
                        None
                    }
                })
                .collect(),
            _ => {
                errors.push("pattern expansion needs a non-empty '_parts' list".to_string());
                Vec::new()
            }
        };

        let pattern = match pattern_src {
            Some(src) => match FormatPattern::parse(src) {
                Ok(p) => Some(p),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => {
                errors.push("pattern expansion needs '_pattern'".to_string());
                None
            }
        };

        let Some(pattern) = pattern else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        if pattern.field_count() != parts.len() {
            errors.push(format!(
                "pattern '{}' has {} placeholder(s) for {} part(s)",
                pattern,
                pattern.field_count(),
                parts.len()
            ));
        }
        for (i, (field, part)) in pattern.fields().zip(&parts).enumerate() {
            let is_range = matches!(part, Expansion::Range { .. });
            if field.kind == FieldKind::Integer && !is_range {
                errors.push(format!(
                    "placeholder {} consumes integers but part {} is not a range",
                    i, i
                ));
            }
        }
        if product_len(&parts).is_none() {
            errors.push(format!(
                "pattern expansion generates more than {} values",
                u64::MAX
            ));
        }

        if errors.is_empty() {
            Ok(Expansion::Composite { pattern, parts })
        } else {
            Err(errors)
        }
    }

    /// Number of generated values, computed without generating them.
    pub fn len(&self) -> u64 {
        match self {
            // Both counts are checked to fit when the expansion is parsed
            Expansion::Range {
                start, end, step, ..
            } => u64::try_from(range_count(*start, *end, *step)).unwrap_or(u64::MAX),
            Expansion::List { values, .. } => values.len() as u64,
            Expansion::Composite { parts, .. } => product_len(parts).unwrap_or(u64::MAX),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `index` in generation order.
    pub fn value(&self, index: u64) -> Option<String> {
        if index >= self.len() {
            return None;
        }
        let rendered = match self {
            Expansion::Range { start, step, pattern, .. } => {
                pattern.render(&[Arg::Int(range_value(*start, *step, index)?)])
            }
            Expansion::List { values, pattern } => {
                let raw = &values[index as usize];
                match pattern {
                    Some(p) => p.render(&[Arg::Text(raw)]),
                    None => raw.clone(),
                }
            }
            Expansion::Composite { pattern, parts } => {
                let indices = decompose(index, parts);
                let texts: Vec<String> = parts
                    .iter()
                    .zip(pattern.fields())
                    .zip(&indices)
                    .map(|((part, field), &i)| match (field.kind, part) {
                        (FieldKind::Integer, Expansion::Range { start, step, .. }) => {
                            range_value(*start, *step, i).map(|n| field.format(Arg::Int(n)))
                        }
                        _ => part.value(i).map(|v| field.format(Arg::Text(&v))),
                    })
                    .collect::<Option<_>>()?;
                let args: Vec<Arg<'_>> = texts.iter().map(|t| Arg::Text(t)).collect();
                render_preformatted(pattern, &args)
            }
        };
        Some(rendered)
    }

    /// Position of `value` in generation order, found without enumeration.
    pub fn index_of(&self, value: &str) -> Option<u64> {
        match self {
            Expansion::Range { pattern, .. } => {
                let field = *pattern.fields().next()?;
                pattern
                    .match_fields(value, |_, text| {
                        field.parse_int(text).and_then(|n| self.range_index(n))
                    })
                    .and_then(|found| found.first().copied())
            }
            Expansion::List { values, pattern } => match pattern {
                None => values.iter().position(|v| v == value).map(|i| i as u64),
                Some(_) => (0..values.len() as u64)
                    .find(|&i| self.value(i).as_deref() == Some(value)),
            },
            Expansion::Composite { pattern, parts } => {
                let fields: Vec<FieldSpec> = pattern.fields().copied().collect();
                let found = pattern.match_fields(value, |i, text| {
                    let (field, part) = (fields.get(i)?, parts.get(i)?);
                    match (field.kind, part) {
                        (FieldKind::Integer, Expansion::Range { .. }) => {
                            field.parse_int(text).and_then(|n| part.range_index(n))
                        }
                        _ => part.index_of(text.trim_end()),
                    }
                })?;
                compose(&found, parts)
            }
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index_of(value).is_some()
    }

    fn range_index(&self, n: i64) -> Option<u64> {
        match self {
            Expansion::Range {
                start, end, step, ..
            } if n >= *start && n <= *end => {
                let offset = i128::from(n) - i128::from(*start);
                let step = i128::from(*step);
                if offset % step == 0 {
                    u64::try_from(offset / step).ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Lazy iterator over all values in generation order.
    pub fn values(&self) -> ExpansionValues<'_> {
        ExpansionValues {
            expansion: self,
            next: 0,
        }
    }
}

/// Mixed-radix split of a composite index, first part slowest.
fn decompose(mut index: u64, parts: &[Expansion]) -> Vec<u64> {
    let mut indices = vec![0; parts.len()];
    for (slot, part) in indices.iter_mut().zip(parts).rev() {
        let len = part.len().max(1);
        *slot = index % len;
        index /= len;
    }
    indices
}

fn compose(indices: &[u64], parts: &[Expansion]) -> Option<u64> {
    indices
        .iter()
        .zip(parts)
        .try_fold(0u64, |acc, (&i, part)| acc.checked_mul(part.len())?.checked_add(i))
}

/// Number of values in an ordered range; i128 holds any i64 span.
fn range_count(start: i64, end: i64, step: i64) -> i128 {
    if end < start {
        0
    } else {
        (i128::from(end) - i128::from(start)) / i128::from(step) + 1
    }
}

fn range_value(start: i64, step: i64, index: u64) -> Option<i64> {
    let n = i128::from(start) + i128::from(index) * i128::from(step);
    i64::try_from(n).ok()
}

/// Size of the cartesian product of `parts`, `None` past `u64::MAX`.
fn product_len(parts: &[Expansion]) -> Option<u64> {
    parts.iter().try_fold(1u64, |acc, p| acc.checked_mul(p.len()))
}

/// Placeholders already carry their formatting; only splice the texts in.
fn render_preformatted(pattern: &FormatPattern, args: &[Arg<'_>]) -> String {
    let mut out = String::new();
    let mut args = args.iter();
    for piece in &pattern.pieces {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Field(_) => {
                if let Some(Arg::Text(t)) = args.next() {
                    out.push_str(t);
                }
            }
        }
    }
    out
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expansion::Range {
                start,
                end,
                step,
                pattern,
            } => {
                write!(f, "range {}..={}", start, end)?;
                if *step != 1 {
                    write!(f, " step {}", step)?;
                }
                write!(f, " as '{}'", pattern)?;
            }
            Expansion::List { values, pattern } => {
                let shown = values.iter().take(5).join(", ");
                let more = if values.len() > 5 { ", …" } else { "" };
                write!(f, "list [{}{}]", shown, more)?;
                if let Some(p) = pattern {
                    write!(f, " as '{}'", p)?;
                }
            }
            Expansion::Composite { pattern, parts } => {
                write!(f, "pattern '{}' over ({})", pattern, parts.iter().join("; "))?;
            }
        }
        write!(f, " ({} values)", self.len())
    }
}

/// Iterator returned by [`Expansion::values`].
pub struct ExpansionValues<'a> {
    expansion: &'a Expansion,
    next: u64,
}

impl Iterator for ExpansionValues<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.expansion.value(self.next)?;
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.expansion.len().saturating_sub(self.next);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
