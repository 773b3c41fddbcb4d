//! Per-package index shards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::base::{PackageName, Span};
use crate::compile::{CompilerInstance, Symbol, SymbolRef};

/// A subtype edge: `subtype <: supertype`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub subtype: SmolStr,
    /// Resolved id, or the name as written when it does not resolve.
    pub supertype: SmolStr,
}

/// An `extend` block adding interfaces to a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub target: SmolStr,
    pub interfaces: Vec<SmolStr>,
    pub file: PathBuf,
    pub span: Span,
}

/// Everything the index records about one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexShard {
    pub package: PackageName,
    pub symbols: Vec<Symbol>,
    pub refs: Vec<SymbolRef>,
    pub relations: Vec<Relation>,
    pub extends: Vec<Extension>,
}

impl IndexShard {
    pub fn from_instance(instance: &CompilerInstance) -> Self {
        let resolve = |name: &SmolStr| instance.resolve(name).cloned().unwrap_or_else(|| name.clone());

        let relations = instance
            .symbols
            .values()
            .flat_map(|symbol| {
                symbol.supertypes.iter().map(|supertype| Relation {
                    subtype: symbol.id.clone(),
                    supertype: resolve(supertype),
                })
            })
            .collect();

        let extends = instance
            .files
            .iter()
            .flat_map(|(file, summary)| {
                summary.extends.iter().map(|extend| Extension {
                    target: resolve(&extend.target),
                    interfaces: extend.interfaces.iter().map(resolve).collect(),
                    file: file.clone(),
                    span: extend.span,
                })
            })
            .collect();

        Self {
            package: instance.package.clone(),
            symbols: instance.symbols.values().cloned().collect(),
            refs: instance.refs.clone(),
            relations,
            extends,
        }
    }

    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.id == id)
    }
}
