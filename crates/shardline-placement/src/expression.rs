//! Inline node-expression evaluation.
//!
//! An expression is a comma-separated list of entries. Each entry is literal
//! text with zero or more placeholders, written `${...}` or `$->{...}`:
//!
//! - `0..3` / `3..0` inclusive integer range (ascending or descending)
//! - `0..<3` exclusive integer range
//! - `'a'..'c'` single-character range
//! - `[0, 2, 'x', 5..6]` list of literals and ranges
//! - `7` or `'suffix'` single value
//!
//! An entry expands to the cartesian product of its placeholders, leftmost
//! placeholder varying slowest, so `ds_${0..1}.t_${0..1}` yields
//! `ds_0.t_0, ds_0.t_1, ds_1.t_0, ds_1.t_1`.

use std::collections::HashSet;

use shardline_types::DataNode;
use tracing::debug;

use crate::PlacementError;

/// Largest number of values a single range may produce.
pub(crate) const MAX_RANGE_LEN: u64 = 65_536;

type Result<T> = std::result::Result<T, PlacementError>;

/// One piece of an entry: fixed text or the values of a placeholder.
#[derive(Debug)]
enum Segment {
    Literal(String),
    Values(Vec<String>),
}

/// Expand an inline expression into literal strings, preserving order.
///
/// Empty entries are skipped, so trailing commas are harmless.
pub fn split_and_evaluate(expression: &str) -> Result<Vec<String>> {
    let mut result = Vec::new();
    for entry in split_top_level(expression) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let segments = parse_segments(entry)?;
        result.extend(cartesian(&segments));
    }
    Ok(result)
}

/// Expand an expression and parse every literal as a [`DataNode`].
///
/// Every node's data source must appear in `data_source_names` and no node
/// may appear twice.
pub fn expand_data_nodes(expression: &str, data_source_names: &[String]) -> Result<Vec<DataNode>> {
    let literals = split_and_evaluate(expression)?;
    let mut seen = HashSet::with_capacity(literals.len());
    let mut nodes = Vec::with_capacity(literals.len());

    for literal in literals {
        let node = DataNode::parse(&literal)?;
        if !data_source_names
            .iter()
            .any(|each| each == node.data_source_name())
        {
            return Err(PlacementError::UnknownDataSource { data_node: literal });
        }
        if !seen.insert(node.clone()) {
            return Err(PlacementError::DuplicateDataNode { data_node: literal });
        }
        nodes.push(node);
    }

    debug!(expression, count = nodes.len(), "expanded data nodes");
    Ok(nodes)
}

/// Split on commas that are not nested in braces, brackets or quotes.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '{' | '[' => depth += 1,
                '}' | ']' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    parts.push(&input[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_segments(entry: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = entry;

    while let Some((start, open_len)) = find_placeholder(rest) {
        if start > 0 {
            segments.push(Segment::Literal(rest[..start].to_string()));
        }
        let body_start = start + open_len;
        let body_len = closing_brace(&rest[body_start..]).ok_or_else(|| {
            PlacementError::UnterminatedPlaceholder {
                expression: entry.to_string(),
            }
        })?;
        let body = &rest[body_start..body_start + body_len];
        if body.trim().is_empty() {
            return Err(PlacementError::EmptyPlaceholder {
                expression: entry.to_string(),
            });
        }
        segments.push(Segment::Values(evaluate_placeholder(body.trim())?));
        rest = &rest[body_start + body_len + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

/// Position and opener length of the next `${` or `$->{`.
fn find_placeholder(s: &str) -> Option<(usize, usize)> {
    s.match_indices('$').find_map(|(i, _)| {
        let tail = &s[i + 1..];
        if tail.starts_with('{') {
            Some((i, 2))
        } else if tail.starts_with("->{") {
            Some((i, 4))
        } else {
            None
        }
    })
}

/// Byte offset of the brace closing a placeholder body.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '{' => depth += 1,
                '}' if depth == 0 => return Some(i),
                '}' => depth -= 1,
                _ => {}
            },
        }
    }
    None
}

fn evaluate_placeholder(body: &str) -> Result<Vec<String>> {
    let mut values = Vec::new();

    if let Some(inner) = body.strip_prefix('[').and_then(|b| b.strip_suffix(']')) {
        for item in split_top_level(inner) {
            let item = item.trim();
            if item.is_empty() {
                return Err(invalid(body, "empty list item"));
            }
            evaluate_item(item, body, &mut values)?;
        }
    } else {
        evaluate_item(body, body, &mut values)?;
    }

    // Keep the first occurrence of each value.
    let mut seen = HashSet::with_capacity(values.len());
    values.retain(|v| seen.insert(v.clone()));
    Ok(values)
}

fn evaluate_item(item: &str, placeholder: &str, out: &mut Vec<String>) -> Result<()> {
    if let Some((lower, upper)) = split_range(item) {
        let (upper, exclusive) = match upper.trim_start().strip_prefix('<') {
            Some(u) => (u, true),
            None => (upper, false),
        };
        let (lower, upper) = (lower.trim(), upper.trim());

        if let (Ok(a), Ok(b)) = (lower.parse::<i64>(), upper.parse::<i64>()) {
            let values = range_values(a, b, exclusive, placeholder)?;
            out.extend(values.into_iter().map(|v| v.to_string()));
            return Ok(());
        }
        if let (Some(a), Some(b)) = (single_char(lower), single_char(upper)) {
            let values = range_values(i64::from(a as u32), i64::from(b as u32), exclusive, placeholder)?;
            for v in values {
                let c = u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| invalid(placeholder, "character range crosses invalid code points"))?;
                out.push(c.to_string());
            }
            return Ok(());
        }
        return Err(invalid(
            placeholder,
            "range bounds must be integers or quoted single characters",
        ));
    }

    if let Some(text) = unquote(item) {
        out.push(text.to_string());
    } else if item.parse::<i64>().is_ok() {
        out.push(item.to_string());
    } else {
        return Err(invalid(placeholder, &format!("unsupported value '{item}'")));
    }
    Ok(())
}

/// Split `lower..upper` at the first `..` outside quotes.
fn split_range(item: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let bytes = item.as_bytes();
    for (i, c) in item.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '.' && bytes.get(i + 1) == Some(&b'.') => {
                return Some((&item[..i], &item[i + 2..]));
            }
            None => {}
        }
    }
    None
}

fn range_values(lower: i64, upper: i64, exclusive: bool, placeholder: &str) -> Result<Vec<i64>> {
    let ascending = lower <= upper;
    let span = (i128::from(upper) - i128::from(lower)).unsigned_abs() + 1;
    let len = if exclusive { span - 1 } else { span };
    if len > u128::from(MAX_RANGE_LEN) {
        return Err(PlacementError::RangeTooLarge {
            placeholder: placeholder.to_string(),
            len: u64::try_from(len).unwrap_or(u64::MAX),
            limit: MAX_RANGE_LEN,
        });
    }
    // Bounded by MAX_RANGE_LEN above.
    let len = len as i64;
    Ok((0..len)
        .map(|step| if ascending { lower + step } else { lower - step })
        .collect())
}

fn unquote(s: &str) -> Option<&str> {
    let first = s.chars().next()?;
    if (first == '\'' || first == '"') && s.len() >= 2 && s.ends_with(first) {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = unquote(s)?.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn cartesian(segments: &[Segment]) -> Vec<String> {
    let mut acc = vec![String::new()];
    for segment in segments {
        acc = match segment {
            Segment::Literal(text) => acc
                .into_iter()
                .map(|mut prefix| {
                    prefix.push_str(text);
                    prefix
                })
                .collect(),
            Segment::Values(values) => acc
                .iter()
                .flat_map(|prefix| values.iter().map(move |v| format!("{prefix}{v}")))
                .collect(),
        };
    }
    acc
}

fn invalid(placeholder: &str, reason: &str) -> PlacementError {
    PlacementError::InvalidPlaceholder {
        placeholder: placeholder.to_string(),
        reason: reason.to_string(),
    }
}
