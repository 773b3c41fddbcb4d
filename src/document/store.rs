//! The store of open documents.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use super::edit::{EditError, TextEdit, apply_edits};
use crate::base::constants::UNKNOWN_VERSION;

/// Latest known state of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub version: i64,
    pub needs_reparse: bool,
    pub was_initially_compiled: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            text: String::new(),
            version: UNKNOWN_VERSION,
            needs_reparse: false,
            was_initially_compiled: false,
        }
    }
}

impl Document {
    /// True for the sentinel returned for files the store has never seen.
    pub fn is_unknown(&self) -> bool {
        self.version == UNKNOWN_VERSION
    }
}

/// Text and version of every open file, behind one lock.
///
/// Each accepted write bumps the stored version by exactly one, whatever
/// version the editor supplied. A supplied version that does not move
/// forward is logged and otherwise ignored.
#[derive(Debug, Default)]
pub struct DocumentStore {
    docs: Mutex<FxHashMap<PathBuf, Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole text of `file`, creating it if needed.
    pub fn add_or_replace(&self, file: &Path, version: i64, text: impl Into<String>) -> i64 {
        let mut docs = self.docs.lock();
        let doc = docs.entry(file.to_path_buf()).or_default();
        doc.text = text.into();
        doc.needs_reparse = true;
        let stored = bump_version(file, doc, version);
        debug!(file = %file.display(), version = stored, "document replaced");
        stored
    }

    /// Apply `edits` in order. On failure the document is left as it was.
    pub fn update(
        &self,
        file: &Path,
        version: i64,
        needs_reparse: bool,
        edits: &[TextEdit],
    ) -> Result<i64, EditError> {
        let mut docs = self.docs.lock();
        let doc = docs
            .get_mut(file)
            .ok_or_else(|| EditError::unknown_document(file))?;
        let text = apply_edits(&doc.text, edits)?;
        doc.text = text;
        doc.needs_reparse = needs_reparse;
        let stored = bump_version(file, doc, version);
        trace!(file = %file.display(), version = stored, edits = edits.len(), "document edited");
        Ok(stored)
    }

    /// Set the reparse flag, but only if `version` is still current.
    pub fn mark_reparse_needed(&self, file: &Path, version: i64, needs_reparse: bool) -> bool {
        let mut docs = self.docs.lock();
        match docs.get_mut(file) {
            Some(doc) if doc.version == version => {
                doc.needs_reparse = needs_reparse;
                true
            }
            _ => false,
        }
    }

    /// Record that the open document `file` took part in the initial full
    /// compile. Unknown files are left alone.
    pub fn mark_initially_compiled(&self, file: &Path) -> bool {
        match self.docs.lock().get_mut(file) {
            Some(doc) => {
                doc.was_initially_compiled = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, file: &Path) -> Option<Document> {
        let removed = self.docs.lock().remove(file);
        if removed.is_some() {
            debug!(file = %file.display(), "document removed");
        }
        removed
    }

    /// A copy of the document, or the `-1` sentinel if unknown.
    pub fn get(&self, file: &Path) -> Document {
        self.docs.lock().get(file).cloned().unwrap_or_default()
    }

    pub fn contains(&self, file: &Path) -> bool {
        self.docs.lock().contains_key(file)
    }

    pub fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<_> = self.docs.lock().keys().cloned().collect();
        files.sort();
        files
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn bump_version(file: &Path, doc: &mut Document, supplied: i64) -> i64 {
    let previous = doc.version;
    if previous != UNKNOWN_VERSION && supplied <= previous {
        warn!(
            file = %file.display(),
            supplied,
            stored = previous,
            "document version did not increase"
        );
    }
    doc.version = previous + 1;
    doc.version
}
