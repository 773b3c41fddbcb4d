//! Header and top-level declaration scanner.
//!
//! The scanner walks the token stream once, tracking brace depth. At depth
//! zero it recognizes `package`, `import`, `extend` and named declarations;
//! at any depth it records identifier occurrences as candidate references.
//! It never fails: malformed constructs become diagnostics and scanning
//! resumes at the next token.

use smol_str::SmolStr;
use text_size::TextSize;

use super::diagnostic::{Diagnostic, codes};
use super::imports::{ImportDecl, ImportSpec};
use super::lexer::{Token, TokenKind, tokenize};
use crate::base::{LineIndex, PackageName, Position, Span};

/// Kind of a named top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DeclKind {
    Func,
    Class,
    Struct,
    Interface,
    Enum,
    TypeAlias,
    Let,
    Var,
    Const,
}

impl DeclKind {
    fn from_keyword(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::FuncKw => Self::Func,
            TokenKind::ClassKw => Self::Class,
            TokenKind::StructKw => Self::Struct,
            TokenKind::InterfaceKw => Self::Interface,
            TokenKind::EnumKw => Self::Enum,
            TokenKind::TypeKw => Self::TypeAlias,
            TokenKind::LetKw => Self::Let,
            TokenKind::VarKw => Self::Var,
            TokenKind::ConstKw => Self::Const,
            _ => return None,
        })
    }

    /// Whether declarations of this kind may list supertypes with `<:`.
    pub fn has_supertypes(self) -> bool {
        matches!(self, Self::Class | Self::Struct | Self::Interface | Self::Enum)
    }
}

/// A named top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: SmolStr,
    /// Span of the name.
    pub span: Span,
    pub supertypes: Vec<SmolStr>,
}

/// An `extend Target <: I1 & I2` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendDecl {
    pub target: SmolStr,
    pub span: Span,
    pub interfaces: Vec<SmolStr>,
}

/// An identifier occurrence that may refer to a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRef {
    pub name: SmolStr,
    pub span: Span,
}

/// Everything the scanner extracts from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSummary {
    pub package: Option<PackageName>,
    pub package_span: Option<Span>,
    pub imports: Vec<ImportDecl>,
    pub declarations: Vec<Declaration>,
    pub extends: Vec<ExtendDecl>,
    pub references: Vec<NameRef>,
    pub diagnostics: Vec<Diagnostic>,
    pub line_count: usize,
}

impl SourceSummary {
    /// The declaration whose name covers `position`.
    pub fn declaration_at(&self, position: Position) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.span.contains(position))
    }

    /// The reference covering `position`.
    pub fn reference_at(&self, position: Position) -> Option<&NameRef> {
        self.references.iter().find(|r| r.span.contains(position))
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Scan `text` into a [`SourceSummary`].
pub fn scan(text: &str) -> SourceSummary {
    Scanner::new(text).run()
}

struct Scanner<'a> {
    text: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
    index: LineIndex,
    seen_item: bool,
    summary: SourceSummary,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        let index = LineIndex::new(text);
        let summary = SourceSummary {
            line_count: index.line_count(),
            ..SourceSummary::default()
        };
        Self {
            text,
            tokens: tokenize(text),
            pos: 0,
            depth: 0,
            index,
            seen_item: false,
            summary,
        }
    }

    fn run(mut self) -> SourceSummary {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::LBrace => {
                    self.depth += 1;
                    self.pos += 1;
                }
                TokenKind::RBrace => {
                    if self.depth == 0 {
                        let span = self.span(token.offset, token.end());
                        self.summary.diagnostics.push(
                            Diagnostic::error(span, "unmatched `}`")
                                .with_code(codes::UNBALANCED_BRACES),
                        );
                    } else {
                        self.depth -= 1;
                    }
                    self.pos += 1;
                }
                TokenKind::PackageKw if self.depth == 0 => self.package(),
                TokenKind::ImportKw if self.depth == 0 => self.import(),
                TokenKind::ExtendKw if self.depth == 0 => self.extend(),
                kind if self.depth == 0 && kind.is_declaration_keyword() => self.declaration(),
                TokenKind::Ident => {
                    if !self.follows_dot() {
                        self.reference(self.pos);
                    }
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }

        if self.depth > 0 {
            let end = TextSize::of(self.text);
            let span = self.span(end, end);
            self.summary.diagnostics.push(
                Diagnostic::error(span, format!("{} unclosed `{{`", self.depth))
                    .with_code(codes::UNBALANCED_BRACES),
            );
        }
        self.summary
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).cloned()
    }

    fn peek_kind(&self, ahead: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| t.kind)
    }

    fn follows_dot(&self) -> bool {
        self.pos > 0 && self.tokens[self.pos - 1].kind == TokenKind::Dot
    }

    fn span(&self, start: TextSize, end: TextSize) -> Span {
        Span::new(
            self.index.position(self.text, start),
            self.index.position(self.text, end),
        )
    }

    fn token_span(&self, at: usize) -> Span {
        let token = &self.tokens[at];
        self.span(token.offset, token.end())
    }

    fn reference(&mut self, at: usize) {
        let span = self.token_span(at);
        self.summary.references.push(NameRef {
            name: self.tokens[at].text.into(),
            span,
        });
    }

    /// `Ident (. Ident)*`, leaving a trailing `.` unconsumed.
    fn path(&mut self) -> Option<(SmolStr, TextSize)> {
        let first = self.peek().filter(|t| t.kind == TokenKind::Ident)?;
        let mut path = String::from(first.text);
        let mut end = first.end();
        self.pos += 1;
        while self.peek_kind(0) == Some(TokenKind::Dot) && self.peek_kind(1) == Some(TokenKind::Ident)
        {
            let segment = &self.tokens[self.pos + 1];
            path.push('.');
            path.push_str(segment.text);
            end = segment.end();
            self.pos += 2;
        }
        Some((path.into(), end))
    }

    fn package(&mut self) {
        let keyword = self.tokens[self.pos].clone();
        self.pos += 1;
        let Some((name, end)) = self.path() else {
            let span = self.span(keyword.offset, keyword.end());
            self.summary.diagnostics.push(
                Diagnostic::error(span, "expected a package name after `package`")
                    .with_code(codes::MALFORMED_PACKAGE),
            );
            return;
        };

        let span = self.span(keyword.offset, end);
        if self.summary.package.is_some() || self.seen_item {
            self.summary.diagnostics.push(
                Diagnostic::warning(span, "`package` must be the first declaration in a file")
                    .with_code(codes::LATE_PACKAGE),
            );
            if self.summary.package.is_some() {
                return;
            }
        }
        self.summary.package = Some(name);
        self.summary.package_span = Some(span);
    }

    fn import(&mut self) {
        let keyword = self.tokens[self.pos].clone();
        let is_reexport = self.pos > 0
            && self.tokens[self.pos - 1].kind == TokenKind::Modifier
            && self.tokens[self.pos - 1].text == "public";
        self.seen_item = true;
        self.pos += 1;

        let Some((path, mut end)) = self.path() else {
            self.malformed_import(keyword.offset, keyword.end());
            return;
        };

        let spec = match (self.peek_kind(0), self.peek_kind(1)) {
            (Some(TokenKind::Dot), Some(TokenKind::Star)) => {
                end = self.tokens[self.pos + 1].end();
                self.pos += 2;
                ImportSpec::Wildcard { prefix: path }
            }
            (Some(TokenKind::Dot), Some(TokenKind::LBrace)) => {
                self.pos += 2;
                match self.import_items() {
                    Some((items, close)) => {
                        end = close;
                        ImportSpec::Multi {
                            prefix: path,
                            items,
                        }
                    }
                    None => {
                        let at = self.peek().map_or(end, |t| t.end());
                        self.malformed_import(keyword.offset, at);
                        return;
                    }
                }
            }
            (Some(TokenKind::Dot), _) => {
                self.pos += 1;
                self.malformed_import(keyword.offset, end);
                return;
            }
            (Some(TokenKind::AsKw), Some(TokenKind::Ident)) => {
                let alias = &self.tokens[self.pos + 1];
                end = alias.end();
                let alias = SmolStr::from(alias.text);
                self.pos += 2;
                ImportSpec::Alias { path, alias }
            }
            (Some(TokenKind::AsKw), _) => {
                self.pos += 1;
                self.malformed_import(keyword.offset, end);
                return;
            }
            _ => ImportSpec::Single { path },
        };

        let span = self.span(keyword.offset, end);
        self.summary.imports.push(ImportDecl {
            spec,
            span,
            is_reexport,
        });
    }

    /// Items of a multi-import, after the opening brace.
    fn import_items(&mut self) -> Option<(Vec<SmolStr>, TextSize)> {
        let mut items = Vec::new();
        loop {
            let (item, _) = self.path()?;
            if self.peek_kind(0) == Some(TokenKind::AsKw) && self.peek_kind(1) == Some(TokenKind::Ident)
            {
                self.pos += 2;
            }
            items.push(item);
            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => self.pos += 1,
                Some(t) if t.kind == TokenKind::RBrace => {
                    self.pos += 1;
                    return Some((items, t.end()));
                }
                _ => return None,
            }
        }
    }

    fn malformed_import(&mut self, start: TextSize, end: TextSize) {
        let span = self.span(start, end);
        self.summary.diagnostics.push(
            Diagnostic::error(span, "malformed import declaration").with_code(codes::MALFORMED_IMPORT),
        );
    }

    fn declaration(&mut self) {
        let Some(kind) = DeclKind::from_keyword(self.tokens[self.pos].kind) else {
            self.pos += 1;
            return;
        };
        self.seen_item = true;
        self.pos += 1;

        if self.peek_kind(0) != Some(TokenKind::Ident) {
            return;
        }
        let name_at = self.pos;
        let name = SmolStr::from(self.tokens[name_at].text);
        let span = self.token_span(name_at);
        self.pos += 1;

        let supertypes = if kind.has_supertypes() {
            self.skip_generics();
            self.supertypes()
        } else {
            Vec::new()
        };

        if kind != DeclKind::Func
            && self
                .summary
                .declarations
                .iter()
                .any(|d| d.name == name && d.kind != DeclKind::Func)
        {
            self.summary.diagnostics.push(
                Diagnostic::error(span, format!("duplicate declaration of `{name}`"))
                    .with_code(codes::DUPLICATE_DECLARATION),
            );
        }

        self.summary.declarations.push(Declaration {
            kind,
            name,
            span,
            supertypes,
        });
    }

    fn extend(&mut self) {
        let keyword = self.tokens[self.pos].clone();
        self.seen_item = true;
        self.pos += 1;
        self.skip_generics();

        let target_at = self.pos;
        let Some((target, end)) = self.path() else {
            return;
        };
        self.reference(target_at);
        self.skip_generics();
        let interfaces = self.supertypes();
        let span = self.span(keyword.offset, end);
        self.summary.extends.push(ExtendDecl {
            target,
            span,
            interfaces,
        });
    }

    /// `<: A & B.C & D`
    fn supertypes(&mut self) -> Vec<SmolStr> {
        let mut supertypes = Vec::new();
        if self.peek_kind(0) != Some(TokenKind::Subtype) {
            return supertypes;
        }
        self.pos += 1;
        loop {
            let at = self.pos;
            let Some((name, _)) = self.path() else {
                break;
            };
            self.reference(at);
            supertypes.push(name);
            self.skip_generics();
            if self.peek_kind(0) == Some(TokenKind::Amp) {
                self.pos += 1;
            } else {
                break;
            }
        }
        supertypes
    }

    /// Skip a `<...>` generic parameter list if one starts here.
    fn skip_generics(&mut self) {
        let opens = |t: &Token<'_>| t.kind == TokenKind::Other && t.text == "<";
        if !self.peek().is_some_and(|t| opens(&t)) {
            return;
        }
        let mut nesting = 0usize;
        while let Some(token) = self.peek() {
            match (token.kind, token.text) {
                (TokenKind::Other, "<") => nesting += 1,
                (TokenKind::Other, ">") => {
                    nesting -= 1;
                    if nesting == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                (TokenKind::LBrace | TokenKind::RBrace, _) => return,
                _ => {}
            }
            self.pos += 1;
        }
    }
}
