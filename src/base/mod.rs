//! Foundation types for the weft analysis core.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`Position`], [`Span`] - Line/column positions (UTF-16 columns)
//! - [`offset_at`], [`LineIndex`] - Position/byte offset conversion
//! - [`PackageName`] - Cheap-to-clone package identity
//! - Domain constants (file extensions, cache layout)
//!
//! This module has NO dependencies on other weft modules.

pub mod constants;
mod position;
mod text;

pub use position::{Position, Span};
pub use text::{LineIndex, offset_at};

// Re-export text-size types for convenience
pub use text_size::{self, TextSize};

/// Identity of a package, e.g. `std.collection`.
///
/// Package names are cloned into every graph edge and cache key, so they use
/// an inline small-string representation.
pub type PackageName = smol_str::SmolStr;

/// Check that every dot-separated segment of `name` is an identifier.
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name.split(constants::PACKAGE_SEPARATOR).all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c == '_' || unicode_ident::is_xid_start(c))
                && chars.all(unicode_ident::is_xid_continue)
        })
}

/// The package a dotted import path belongs to: everything before the last
/// segment, or the whole path when it has a single segment.
pub fn parent_package(path: &str) -> &str {
    path.rsplit_once(constants::PACKAGE_SEPARATOR)
        .map_or(path, |(parent, _)| parent)
}
