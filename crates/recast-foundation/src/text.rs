//! Text model shared by the applier, the move pipeline and job materialisation.
//!
//! All offsets are byte offsets into UTF-8 source text. Line and column numbers
//! are zero-based; columns count bytes from the start of the line.

use serde::{Deserialize, Serialize};

/// A single replacement of the byte range `start..end` with `new_text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextEdit {
    /// Start offset (inclusive)
    pub start: usize,
    /// End offset (exclusive)
    pub end: usize,
    /// Replacement text
    pub new_text: String,
    /// Description of what this edit does
    pub description: String,
}

impl TextEdit {
    pub fn replace(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            new_text: new_text.into(),
            description: String::new(),
        }
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self::replace(start, end, String::new())
    }

    pub fn insert(at: usize, new_text: impl Into<String>) -> Self {
        Self::replace(at, at, new_text)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_insert(&self) -> bool {
        self.start == self.end
    }

    /// Whether `other` lies entirely inside this edit's replaced range.
    ///
    /// An insertion sitting exactly on either boundary is not contained.
    pub fn contains(&self, other: &TextEdit) -> bool {
        if self.is_insert() || self == other {
            return false;
        }
        if other.is_insert() {
            return self.start < other.start && other.start < self.end;
        }
        self.start <= other.start && other.end <= self.end
    }
}

/// Location of an edit in the source file, as line/column pairs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EditLocation {
    /// Start line (0-based)
    pub start_line: u32,
    /// Start column (0-based)
    pub start_column: u32,
    /// End line (0-based)
    pub end_line: u32,
    /// End column (0-based)
    pub end_column: u32,
}

impl EditLocation {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// `[startLine, startColumn, endLine, endColumn]`, the compact form used on the wire.
    pub fn to_array(self) -> [u32; 4] {
        [
            self.start_line,
            self.start_column,
            self.end_line,
            self.end_column,
        ]
    }
}

/// Precomputed line table for a text snapshot.
///
/// Position to offset conversion is a table lookup; offset to position is a
/// binary search over line starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    line_ends: Vec<usize>,
    separator: &'static str,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut line_ends = Vec::new();
        let bytes = text.as_bytes();

        for (idx, byte) in bytes.iter().enumerate() {
            if *byte == b'\n' {
                let end = if idx > 0 && bytes[idx - 1] == b'\r' {
                    idx - 1
                } else {
                    idx
                };
                line_ends.push(end);
                line_starts.push(idx + 1);
            }
        }
        line_ends.push(text.len());

        let separator = if text.contains("\r\n") { "\r\n" } else { "\n" };

        Self {
            line_starts,
            line_ends,
            separator,
            len: text.len(),
        }
    }

    /// The dominant line separator of the text
    pub fn separator(&self) -> &'static str {
        self.separator
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Length of a line's content, excluding its separator
    pub fn line_length(&self, line: u32) -> Option<usize> {
        let line = line as usize;
        Some(self.line_ends.get(line)? - self.line_starts.get(line)?)
    }

    /// Offset of a line/column pair. Columns past the end of the line clamp to it.
    pub fn offset(&self, line: u32, column: u32) -> Option<usize> {
        let start = *self.line_starts.get(line as usize)?;
        let end = self.line_ends[line as usize];
        Some((start + column as usize).min(end))
    }

    /// Line/column pair of an offset. Offsets past the end clamp to the last position.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line as u32, (offset - self.line_starts[line]) as u32)
    }

    pub fn location(&self, start: usize, end: usize) -> EditLocation {
        let (start_line, start_column) = self.position(start);
        let (end_line, end_column) = self.position(end);
        EditLocation::new(start_line, start_column, end_line, end_column)
    }

    /// Offsets of a line/column location
    pub fn range(&self, location: &EditLocation) -> Option<(usize, usize)> {
        let start = self.offset(location.start_line, location.start_column)?;
        let end = self.offset(location.end_line, location.end_column)?;
        (start <= end).then_some((start, end))
    }

    /// The position just past the last character
    pub fn last_position(&self) -> (u32, u32) {
        self.position(self.len)
    }

    /// Location spanning the whole text
    pub fn full_location(&self) -> EditLocation {
        self.location(0, self.len)
    }
}

/// Apply non-overlapping edits to `source`, last offset first.
///
/// Edits are expected to be normalised already; an edit whose range falls
/// outside the text or overlaps a previously applied one is skipped and
/// reported back.
pub fn apply_edits(source: &str, edits: &[TextEdit]) -> (String, Vec<TextEdit>) {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    let mut result = source.to_string();
    let mut skipped = Vec::new();
    let mut floor = usize::MAX;

    for edit in sorted {
        let in_bounds = edit.start <= edit.end
            && edit.end <= source.len()
            && source.is_char_boundary(edit.start)
            && source.is_char_boundary(edit.end);

        if !in_bounds || edit.end > floor {
            tracing::warn!(
                start = edit.start,
                end = edit.end,
                description = %edit.description,
                "Skipping edit outside bounds or overlapping an applied edit"
            );
            skipped.push(edit.clone());
            continue;
        }

        result.replace_range(edit.start..edit.end, &edit.new_text);
        floor = edit.start;
    }

    (result, skipped)
}
