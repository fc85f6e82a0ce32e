//! Edit normalisation and application

use crate::parser::SourceRange;
use recast_foundation::{apply_edits, TextEdit};
use std::path::Path;

/// Outcome of applying one file's edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub text: String,
    pub applied: usize,
    pub skipped: Vec<TextEdit>,
}

/// Prepare edits for a single pass over one file
///
/// Exact duplicates collapse, edits nested inside another edit's replaced
/// range are dropped in favour of the enclosing edit, and insertions at the
/// same offset are concatenated in the order they were produced.
pub fn normalize_edits(edits: Vec<TextEdit>) -> Vec<TextEdit> {
    let mut unique: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if !unique.contains(&edit) {
            unique.push(edit);
        }
    }

    let nested: Vec<bool> = unique
        .iter()
        .map(|edit| unique.iter().any(|outer| outer.contains(edit)))
        .collect();
    let dropped = nested.iter().filter(|n| **n).count();
    if dropped > 0 {
        tracing::debug!(dropped, "Dropped edits nested inside enclosing edits");
    }

    let mut normalized: Vec<TextEdit> = Vec::with_capacity(unique.len());
    for (edit, is_nested) in unique.into_iter().zip(nested) {
        if is_nested {
            continue;
        }
        if edit.is_insert() {
            if let Some(existing) = normalized
                .iter_mut()
                .find(|e| e.is_insert() && e.start == edit.start)
            {
                existing.new_text.push_str(&edit.new_text);
                continue;
            }
        }
        normalized.push(edit);
    }

    normalized
}

/// Normalise and apply edits to one file's text
pub fn transform(file: &Path, source: &str, edits: Vec<TextEdit>) -> TransformResult {
    let normalized = normalize_edits(edits);
    let total = normalized.len();
    let (text, skipped) = apply_edits(source, &normalized);

    if !skipped.is_empty() {
        tracing::warn!(
            file = %file.display(),
            skipped = skipped.len(),
            total,
            "Some edits overlapped and were not applied"
        );
    }

    TransformResult {
        text,
        applied: total - skipped.len(),
        skipped,
    }
}

/// Apply edits that are relative to `range` of `source`, returning the
/// rewritten slice. Edits outside the range are ignored.
pub fn rewrite_slice(source: &str, range: SourceRange, edits: &[TextEdit]) -> String {
    let shifted: Vec<TextEdit> = edits
        .iter()
        .filter(|edit| range.start <= edit.start && edit.end <= range.end)
        .map(|edit| {
            TextEdit::replace(
                edit.start - range.start,
                edit.end - range.start,
                edit.new_text.clone(),
            )
        })
        .collect();
    apply_edits(range.slice(source), &normalize_edits(shifted)).0
}

/// Widen a range to whole lines when nothing but whitespace shares its
/// first and last line; the trailing line break is included.
/// A range that starts mid-line is returned unchanged.
pub fn whole_lines(text: &str, range: SourceRange) -> SourceRange {
    let line_start = text[..range.start].rfind('\n').map_or(0, |i| i + 1);
    if !text[line_start..range.start].trim().is_empty() {
        return range;
    }

    let line_end = text[range.end..]
        .find('\n')
        .map_or(text.len(), |i| range.end + i + 1);
    let end = if text[range.end..line_end].trim().is_empty() {
        line_end
    } else {
        range.end
    };

    SourceRange::new(line_start, end)
}

/// Leading whitespace of the line containing `offset`
pub fn line_indent(text: &str, offset: usize) -> &str {
    let line_start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &text[line_start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width.min(offset - line_start)]
}

/// Remove up to `width` columns of leading whitespace from every line but the first
pub fn dedent(text: &str, width: usize) -> String {
    let mut lines = text.split('\n');
    let mut result = lines.next().unwrap_or_default().to_string();
    for line in lines {
        result.push('\n');
        let strip = line
            .bytes()
            .take(width)
            .take_while(|b| *b == b' ' || *b == b'\t')
            .count();
        result.push_str(&line[strip..]);
    }
    result
}
