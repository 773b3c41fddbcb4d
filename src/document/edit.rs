//! Text edits and their application.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::base::{Position, Span, offset_at};

/// One change to a document: a full replacement or a replaced sub-range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    Full(String),
    Range { span: Span, text: String },
}

impl TextEdit {
    pub fn full(text: impl Into<String>) -> Self {
        Self::Full(text.into())
    }

    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Self::Range {
            span,
            text: text.into(),
        }
    }

    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self::replace(Span::at(at), text)
    }

    pub fn delete(span: Span) -> Self {
        Self::replace(span, String::new())
    }
}

/// Why an edit could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The document was never opened.
    #[error("unknown document: {}", .0.display())]
    UnknownDocument(PathBuf),

    /// A position does not exist in the text it was applied to.
    #[error("position {}:{} is outside the document", .0.line, .0.column)]
    InvalidPosition(Position),

    /// The range ends before it starts.
    #[error("edit range ends before it starts ({}:{} > {}:{})", .0.start.line, .0.start.column, .0.end.line, .0.end.column)]
    ReversedRange(Span),
}

impl EditError {
    pub fn unknown_document(path: impl AsRef<Path>) -> Self {
        Self::UnknownDocument(path.as_ref().to_path_buf())
    }
}

/// Apply `edits` in order, each against the text produced by the previous.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    let mut contents = text.to_owned();
    for edit in edits {
        match edit {
            TextEdit::Full(text) => contents.clone_from(text),
            TextEdit::Range { span, text } => {
                let start = offset_at(&contents, span.start)
                    .ok_or(EditError::InvalidPosition(span.start))?;
                let end =
                    offset_at(&contents, span.end).ok_or(EditError::InvalidPosition(span.end))?;
                let (start, end) = (usize::from(start), usize::from(end));
                if end < start {
                    return Err(EditError::ReversedRange(*span));
                }
                if end > contents.len() {
                    return Err(EditError::InvalidPosition(span.end));
                }
                contents.replace_range(start..end, text);
            }
        }
    }
    Ok(contents)
}

/// Lines of the pre-edit document whose analysis `edits` may invalidate.
///
/// `None` means the whole document. An edit that adds or removes lines
/// shifts everything below it, so the region extends to the end.
pub fn invalidated_lines(edits: &[TextEdit]) -> Option<RangeInclusive<usize>> {
    let mut region: Option<RangeInclusive<usize>> = None;
    for edit in edits {
        let TextEdit::Range { span, text } = edit else {
            return None;
        };
        let shifts_lines = span.start.line != span.end.line || text.contains('\n');
        let first = span.start.line.min(span.end.line);
        let last = if shifts_lines {
            usize::MAX
        } else {
            span.end.line.max(span.start.line)
        };
        region = Some(match region {
            None => first..=last,
            Some(r) => (*r.start()).min(first)..=(*r.end()).max(last),
        });
    }
    region
}
