//! Open documents: latest text and version per file, plus edit application.

mod edit;
mod store;

pub use edit::{EditError, TextEdit, apply_edits, invalidated_lines};
pub use store::{Document, DocumentStore};
