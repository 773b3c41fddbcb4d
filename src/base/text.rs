//! Conversions between editor positions and byte offsets.
//!
//! Editors address text by line and UTF-16 column, while the store and the
//! scanner work on UTF-8 byte offsets. Code points outside the basic
//! multilingual plane occupy two UTF-16 units (a surrogate pair) but four
//! UTF-8 bytes, so the two cannot be mixed without decoding the line.

use text_size::TextSize;

use super::Position;

/// Map a line/column position to a byte offset into `text`.
///
/// Walks newline boundaries to find the line, then decodes the line's code
/// points counting UTF-16 units. A column that lands inside a surrogate pair
/// snaps to the start of that code point. Returns `None` when the line does
/// not exist or the column lies past the end of the line.
///
/// # Example
/// ```
/// use weft::base::{Position, offset_at};
///
/// assert_eq!(offset_at("ab\ncd", Position::new(1, 1)).map(u32::from), Some(4));
/// assert_eq!(offset_at("ab\ncd", Position::new(2, 0)), None);
/// ```
pub fn offset_at(text: &str, position: Position) -> Option<TextSize> {
    let mut line_start = 0usize;
    for _ in 0..position.line {
        let next = text[line_start..].find('\n')?;
        line_start += next + 1;
    }

    let line_end = text[line_start..]
        .find('\n')
        .map_or(text.len(), |i| line_start + i);
    let line = &text[line_start..line_end];

    let byte_in_line = column_to_byte(line, position.column)?;
    TextSize::try_from(line_start + byte_in_line).ok()
}

/// Byte offset of a UTF-16 column within a single line.
fn column_to_byte(line: &str, column: usize) -> Option<usize> {
    let mut remaining = column;
    let mut bytes = 0usize;
    for c in line.chars() {
        if remaining == 0 {
            return Some(bytes);
        }
        let units = c.len_utf16();
        if remaining < units {
            return Some(bytes);
        }
        remaining -= units;
        bytes += c.len_utf8();
    }
    (remaining == 0).then_some(bytes)
}

/// Precomputed line starts for repeated offset → position conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// Number of lines, counting a trailing empty line after a final newline.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset into a line and UTF-16 column.
    ///
    /// Offsets past the end of `text` clamp to the end.
    pub fn position(&self, text: &str, offset: TextSize) -> Position {
        let offset = usize::from(offset).min(text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = text
            .get(start..offset)
            .map_or(0, |prefix| prefix.chars().map(char::len_utf16).sum());
        Position::new(line, column)
    }
}
