//! Logos-based lexer for source headers and top-level declarations
//!
//! Only the tokens the scanner cares about get their own kind; everything
//! else lexes as [`TokenKind::Other`] so malformed input never stops a scan.

use logos::Logos;
use text_size::TextSize;

/// A token with its kind, text, and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: TextSize,
}

impl Token<'_> {
    pub fn end(&self) -> TextSize {
        self.offset + TextSize::of(self.text)
    }
}

/// Lexer wrapping the logos-generated tokenizer
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, TokenKind>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer(input),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.inner.next()?.unwrap_or(TokenKind::Other);
        let span = self.inner.span();
        Some(Token {
            kind,
            text: self.inner.slice(),
            offset: TextSize::new(span.start as u32),
        })
    }
}

/// Tokenize an entire string into a Vec
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
pub enum TokenKind {
    // =========================================================================
    // HEADER KEYWORDS
    // =========================================================================
    #[token("package")]
    PackageKw,
    #[token("import")]
    ImportKw,
    #[token("as")]
    AsKw,

    // =========================================================================
    // MODIFIERS
    // =========================================================================
    #[token("public")]
    #[token("private")]
    #[token("protected")]
    #[token("internal")]
    #[token("open")]
    #[token("abstract")]
    #[token("sealed")]
    #[token("foreign")]
    #[token("unsafe")]
    Modifier,

    // =========================================================================
    // DECLARATION KEYWORDS
    // =========================================================================
    #[token("func")]
    FuncKw,
    #[token("class")]
    ClassKw,
    #[token("struct")]
    StructKw,
    #[token("interface")]
    InterfaceKw,
    #[token("enum")]
    EnumKw,
    #[token("type")]
    TypeKw,
    #[token("let")]
    LetKw,
    #[token("var")]
    VarKw,
    #[token("const")]
    ConstKw,
    #[token("extend")]
    ExtendKw,

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("*")]
    Star,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("<:")]
    Subtype,
    #[token("&")]
    Amp,
    #[token(";")]
    Semicolon,

    // =========================================================================
    // LITERALS AND NAMES
    // =========================================================================
    #[regex(r"[\p{XID_Start}_][\p{XID_Continue}]*")]
    Ident,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    StringLit,
    #[regex(r"[0-9][0-9a-zA-Z_.]*")]
    Number,

    /// Anything the scanner does not distinguish.
    Other,
}

impl TokenKind {
    /// Keywords that introduce a named top-level declaration.
    pub fn is_declaration_keyword(self) -> bool {
        matches!(
            self,
            Self::FuncKw
                | Self::ClassKw
                | Self::StructKw
                | Self::InterfaceKw
                | Self::EnumKw
                | Self::TypeKw
                | Self::LetKw
                | Self::VarKw
                | Self::ConstKw
        )
    }
}
