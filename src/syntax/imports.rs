//! Import declarations and their classification.

use smol_str::SmolStr;

use crate::base::{Span, parent_package};

/// One `import` declaration, classified by shape.
///
/// ```text
/// import a.b.C          Single   { path: "a.b.C" }
/// import a.b.C as D     Alias    { path: "a.b.C", alias: "D" }
/// import a.b.*          Wildcard { prefix: "a.b" }
/// import a.{b, c.D}     Multi    { prefix: "a", items: ["b", "c.D"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportSpec {
    Single { path: SmolStr },
    Alias { path: SmolStr, alias: SmolStr },
    Wildcard { prefix: SmolStr },
    Multi { prefix: SmolStr, items: Vec<SmolStr> },
}

impl ImportSpec {
    /// The fully qualified paths this import names.
    pub fn paths(&self) -> Vec<SmolStr> {
        match self {
            Self::Single { path } | Self::Alias { path, .. } => vec![path.clone()],
            Self::Wildcard { prefix } => vec![prefix.clone()],
            Self::Multi { prefix, items } => items
                .iter()
                .map(|item| SmolStr::from(format!("{prefix}.{item}")))
                .collect(),
        }
    }

    /// Candidate package names per imported path, most specific first.
    ///
    /// `import a.b.C` may import package `a.b.C` itself or member `C` of
    /// package `a.b`; a wildcard always names a package.
    pub fn package_candidates(&self) -> Vec<Vec<SmolStr>> {
        match self {
            Self::Wildcard { prefix } => vec![vec![prefix.clone()]],
            _ => self
                .paths()
                .into_iter()
                .map(|path| {
                    let parent = parent_package(&path);
                    if parent == path.as_str() {
                        vec![path]
                    } else {
                        let parent = SmolStr::from(parent);
                        vec![path, parent]
                    }
                })
                .collect(),
        }
    }

    /// The local name this import binds, if it binds exactly one.
    pub fn bound_name(&self) -> Option<&str> {
        match self {
            Self::Single { path } => path.rsplit('.').next(),
            Self::Alias { alias, .. } => Some(alias.as_str()),
            Self::Wildcard { .. } | Self::Multi { .. } => None,
        }
    }
}

/// An import together with where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub spec: ImportSpec,
    pub span: Span,
    /// `public import` re-exports the imported names.
    pub is_reexport: bool,
}
