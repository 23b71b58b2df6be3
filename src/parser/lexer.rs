//! Logos-based lexer for the YANG compact syntax.
//!
//! YANG has no reserved words at the token level: statement keywords and
//! unquoted arguments are both "bare" strings, and the statement parser
//! decides which is which. The lexer therefore only distinguishes structure
//! (braces, semicolons, string concatenation) from text.

use logos::Logos;

use crate::base::Position;

/// A token with its kind, text, and start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    LBrace,
    RBrace,
    Semicolon,
    Plus,
    /// `"..."` with escape sequences and whitespace trimming rules.
    DoubleString,
    /// `'...'`, taken verbatim.
    SingleString,
    /// Keyword or unquoted argument.
    Bare,
    Error,
}

/// Lexer wrapping the logos-generated tokenizer, tracking line/column.
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: LogosToken::lexer(input),
            line: 0,
            column: 0,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let logos_token = self.inner.next()?;
        let text = self.inner.slice();
        let pos = Position::new(self.line, self.column);

        // Advance line/column over the token text.
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }

        let kind = match logos_token {
            Ok(t) => t.into(),
            Err(()) => TokenKind::Error,
        };

        Some(Token { kind, text, pos })
    }
}

/// Tokenize an entire string into a Vec.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    Lexer::new(input).collect()
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum LogosToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r"//[^\n]*", priority = 10)]
    LineComment,

    #[regex(r"/\*([^*]|\*[^/])*\*/", priority = 10)]
    BlockComment,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(";")]
    Semicolon,

    #[token("+", priority = 5)]
    Plus,

    #[regex(r#""([^"\\]|\\.)*""#)]
    DoubleString,

    #[regex(r"'[^']*'")]
    SingleString,

    // Anything up to whitespace, structure or a quote. Keywords and unquoted
    // arguments alike.
    #[regex(r#"[^ \t\r\n;{}"']+"#, priority = 1)]
    Bare,
}

impl From<LogosToken> for TokenKind {
    fn from(t: LogosToken) -> Self {
        match t {
            LogosToken::Whitespace => TokenKind::Whitespace,
            LogosToken::LineComment => TokenKind::LineComment,
            LogosToken::BlockComment => TokenKind::BlockComment,
            LogosToken::LBrace => TokenKind::LBrace,
            LogosToken::RBrace => TokenKind::RBrace,
            LogosToken::Semicolon => TokenKind::Semicolon,
            LogosToken::Plus => TokenKind::Plus,
            LogosToken::DoubleString => TokenKind::DoubleString,
            LogosToken::SingleString => TokenKind::SingleString,
            LogosToken::Bare => TokenKind::Bare,
        }
    }
}

impl TokenKind {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }
}
