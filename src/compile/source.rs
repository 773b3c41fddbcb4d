//! Reference compiler built on the header scanner.
//!
//! Compiling a package here means collecting its top-level declarations,
//! binding imported names against upstream export tables and resolving
//! identifier occurrences to symbols. There is no type checking.

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::trace;

use super::error::CompileError;
use super::instance::{
    CompilerInstance, ExportTable, ExportedSymbol, PackageSources, Symbol, SymbolRef,
    UpstreamObjects,
};
use super::PackageCompiler;
use crate::analysis::{AnalysisResult, FileAnalyzer, FileInputs};
use crate::base::PackageName;
use crate::base::constants::{DEFAULT_PACKAGE, PACKAGE_SEPARATOR};
use crate::syntax::{DeclKind, Diagnostic, ImportDecl, ImportSpec, SourceSummary, codes, scan};

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceCompiler;

impl SourceCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile already scanned files into an instance of `package`.
    pub fn build(
        &self,
        package: PackageName,
        files: Vec<(PathBuf, SourceSummary)>,
        upstream: &UpstreamObjects,
    ) -> Result<CompilerInstance, CompileError> {
        let mut tables = IndexMap::with_capacity(upstream.len());
        for (name, bytes) in upstream {
            let table: ExportTable =
                serde_json::from_slice(bytes).map_err(|e| CompileError::object(name.clone(), e))?;
            tables.insert(name.clone(), table);
        }

        let mut instance = CompilerInstance {
            package: package.clone(),
            import_packages: upstream.keys().cloned().collect(),
            in_degree: upstream.len(),
            is_in_module: true,
            ..CompilerInstance::default()
        };
        let mut reexports = Vec::new();

        for (path, summary) in files {
            let mut diagnostics = summary.diagnostics.clone();
            if let (Some(declared), Some(span)) = (&summary.package, summary.package_span)
                && *declared != package
            {
                diagnostics.push(
                    Diagnostic::error(
                        span,
                        format!("file declares package `{declared}` but belongs to `{package}`"),
                    )
                    .with_code(codes::PACKAGE_MISMATCH),
                );
            }

            for decl in &summary.declarations {
                match instance.symbols.get(&decl.name) {
                    Some(existing)
                        if existing.file != path
                            && !(existing.kind == DeclKind::Func && decl.kind == DeclKind::Func) =>
                    {
                        diagnostics.push(
                            Diagnostic::error(
                                decl.span,
                                format!(
                                    "`{}` is already declared in {}",
                                    decl.name,
                                    existing.file.display()
                                ),
                            )
                            .with_code(codes::DUPLICATE_DECLARATION),
                        );
                    }
                    Some(_) => {}
                    None => {
                        instance.symbols.insert(
                            decl.name.clone(),
                            Symbol {
                                id: qualify(&package, &decl.name),
                                name: decl.name.clone(),
                                kind: decl.kind,
                                file: path.clone(),
                                span: decl.span,
                                supertypes: decl.supertypes.clone(),
                            },
                        );
                    }
                }
            }

            for import in &summary.imports {
                let bound = bind_import(import, &package, &tables, &mut diagnostics);
                for (name, symbol) in bound {
                    if import.is_reexport {
                        reexports.push(ExportedSymbol {
                            name: name.clone(),
                            kind: symbol.kind,
                            origin: symbol.origin.clone(),
                        });
                    }
                    instance
                        .imported
                        .insert(name, qualify(&symbol.origin, &symbol.name));
                }
            }

            instance.diagnostics.insert(path.clone(), diagnostics);
            instance.files.insert(path, summary);
        }

        let mut refs = Vec::new();
        for (path, summary) in &instance.files {
            for reference in &summary.references {
                if let Some(target) = instance.resolve(&reference.name) {
                    refs.push(SymbolRef {
                        target: target.clone(),
                        file: path.clone(),
                        span: reference.span,
                    });
                }
            }
        }
        instance.refs = refs;

        let exports = ExportTable {
            package: package.clone(),
            symbols: instance
                .symbols
                .values()
                .map(|s| ExportedSymbol {
                    name: s.name.clone(),
                    kind: s.kind,
                    origin: package.clone(),
                })
                .chain(reexports)
                .collect(),
        };
        let object = serde_json::to_vec(&exports).map_err(|e| CompileError::object(package.clone(), e))?;
        instance.object = Arc::from(object);

        trace!(
            %package,
            files = instance.files.len(),
            symbols = instance.symbols.len(),
            refs = instance.refs.len(),
            "built package"
        );
        Ok(instance)
    }
}

impl PackageCompiler for SourceCompiler {
    fn compile(
        &self,
        sources: &PackageSources,
        upstream: &UpstreamObjects,
    ) -> Result<CompilerInstance, CompileError> {
        let files = sources
            .files
            .iter()
            .map(|file| (file.path.clone(), scan(&file.text)))
            .collect();
        self.build(sources.package.clone(), files, upstream)
    }
}

impl FileAnalyzer for SourceCompiler {
    /// Analyze the file on its own, as a package with no upstream.
    fn analyze(&self, inputs: &FileInputs) -> Result<AnalysisResult, CompileError> {
        let summary = scan(&inputs.text);
        let package = summary
            .package
            .clone()
            .unwrap_or_else(|| PackageName::from(DEFAULT_PACKAGE));
        let instance = self.build(
            package,
            vec![(inputs.file.clone(), summary.clone())],
            &UpstreamObjects::new(),
        )?;
        Ok(AnalysisResult::new(inputs, summary, &instance))
    }
}

fn qualify(package: &str, name: &str) -> SmolStr {
    SmolStr::from(format!("{package}{PACKAGE_SEPARATOR}{name}"))
}

/// Names an import binds, with the exported symbol each refers to.
fn bind_import<'t>(
    import: &ImportDecl,
    package: &PackageName,
    tables: &'t IndexMap<PackageName, ExportTable>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<(SmolStr, &'t ExportedSymbol)> {
    let mut bound = Vec::new();
    let mut unresolved = Vec::new();

    match &import.spec {
        ImportSpec::Wildcard { prefix } => match tables.get(prefix.as_str()) {
            Some(table) => bound.extend(table.symbols.iter().map(|s| (s.name.clone(), s))),
            None if prefix == package => {}
            None => unresolved.push(prefix.clone()),
        },
        spec => {
            let alias = match spec {
                ImportSpec::Alias { alias, .. } => Some(alias),
                _ => None,
            };
            for path in spec.paths() {
                if tables.contains_key(path.as_str()) || path == *package {
                    continue;
                }
                let (parent, member) = path
                    .rsplit_once(PACKAGE_SEPARATOR)
                    .unwrap_or(("", path.as_str()));
                if parent == package.as_str() {
                    continue;
                }
                match tables.get(parent).and_then(|t| t.get(member)) {
                    Some(symbol) => {
                        let name = alias.cloned().unwrap_or_else(|| SmolStr::from(member));
                        bound.push((name, symbol));
                    }
                    None => unresolved.push(path.clone()),
                }
            }
        }
    }

    for path in unresolved {
        diagnostics.push(
            Diagnostic::warning(import.span, format!("cannot resolve import `{path}`"))
                .with_code(codes::UNRESOLVED_IMPORT),
        );
    }
    bound
}
