//! Recursive-descent statement parser for the YANG compact syntax.
//!
//! Produces the generic [`Statement`] tree. Grammar per RFC 7950 section 6:
//! `statement = keyword [argument] (";" / "{" *statement "}")`, where the
//! argument is a bare word or one or more quoted strings joined with `+`.

use smol_str::SmolStr;

use super::lexer::{Token, TokenKind, tokenize};
use super::statement::{CoreStmt, Keyword, Statement};
use crate::base::{Position, Span};
use crate::error::{Error, Result};

/// Parse YANG text into its single top-level `module` or `submodule`
/// statement.
pub fn parse(text: &str) -> Result<Statement> {
    let mut p = YangParser {
        tokens: tokenize(text),
        pos: 0,
    };
    let root = p.parse_statement()?;
    if let Some(tok) = p.peek() {
        return Err(Error::parse(
            format!("unexpected '{}' after module statement", tok.text),
            Span::new(tok.pos, tok.pos),
        ));
    }
    match &root.keyword {
        Keyword::Core(CoreStmt::Module) | Keyword::Core(CoreStmt::Submodule) => Ok(root),
        other => Err(Error::parse(
            format!("expected 'module' or 'submodule', found '{other}'"),
            root.span,
        )),
    }
}

struct YangParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> YangParser<'a> {
    fn peek(&mut self) -> Option<&Token<'a>> {
        while self
            .tokens
            .get(self.pos)
            .is_some_and(|t| t.kind.is_trivia())
        {
            self.pos += 1;
        }
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        self.peek()?;
        let tok = self.tokens[self.pos].clone();
        self.pos += 1;
        Some(tok)
    }

    fn eof_error(&self) -> Error {
        let pos = self
            .tokens
            .last()
            .map(|t| t.pos)
            .unwrap_or(Position::new(0, 0));
        Error::parse("unexpected end of input", Span::new(pos, pos))
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let kw_tok = self.bump().ok_or_else(|| self.eof_error())?;
        if kw_tok.kind != TokenKind::Bare {
            return Err(Error::parse(
                format!("expected statement keyword, found '{}'", kw_tok.text),
                Span::new(kw_tok.pos, kw_tok.pos),
            ));
        }
        let keyword = keyword_from_text(kw_tok.text, kw_tok.pos)?;
        let start = kw_tok.pos;
        let mut stmt = Statement::new(keyword, Span::new(start, start));

        // Optional argument.
        match self.peek().map(|t| t.kind) {
            Some(TokenKind::Bare) => {
                let tok = self.bump().expect("peeked");
                stmt.arg = Some(SmolStr::new(tok.text));
            }
            Some(TokenKind::DoubleString) | Some(TokenKind::SingleString) => {
                stmt.arg = Some(self.parse_quoted_argument()?);
            }
            _ => {}
        }

        // Terminator: ';' or '{ substatements }'.
        let term = self.bump().ok_or_else(|| self.eof_error())?;
        match term.kind {
            TokenKind::Semicolon => {
                stmt.span = Span::new(start, term.pos);
            }
            TokenKind::LBrace => {
                loop {
                    let next_kind = match self.peek() {
                        Some(next) => next.kind,
                        None => return Err(self.eof_error()),
                    };
                    if next_kind == TokenKind::RBrace {
                        let close = self.bump().expect("peeked");
                        stmt.span = Span::new(start, close.pos);
                        break;
                    }
                    stmt.substmts.push(self.parse_statement()?);
                }
            }
            _ => {
                return Err(Error::parse(
                    format!("expected ';' or '{{', found '{}'", term.text),
                    Span::new(term.pos, term.pos),
                ));
            }
        }
        Ok(stmt)
    }

    /// One or more quoted strings joined by `+`.
    fn parse_quoted_argument(&mut self) -> Result<SmolStr> {
        let mut value = String::new();
        loop {
            let tok = self.bump().ok_or_else(|| self.eof_error())?;
            match tok.kind {
                TokenKind::DoubleString => {
                    let inner = &tok.text[1..tok.text.len() - 1];
                    value.push_str(&process_double_quoted(inner, tok.pos.column)?);
                }
                TokenKind::SingleString => {
                    value.push_str(&tok.text[1..tok.text.len() - 1]);
                }
                _ => {
                    return Err(Error::parse(
                        format!("expected quoted string, found '{}'", tok.text),
                        Span::new(tok.pos, tok.pos),
                    ));
                }
            }
            match self.peek().map(|t| t.kind) {
                Some(TokenKind::Plus) => {
                    self.bump();
                }
                _ => break,
            }
        }
        Ok(SmolStr::new(value))
    }
}

fn keyword_from_text(text: &str, pos: Position) -> Result<Keyword> {
    if let Some((prefix, name)) = text.split_once(':') {
        if !is_identifier(prefix) || !is_identifier(name) {
            return Err(Error::parse(
                format!("invalid extension keyword '{text}'"),
                Span::new(pos, pos),
            ));
        }
        return Ok(Keyword::Extension {
            prefix: SmolStr::new(prefix),
            name: SmolStr::new(name),
        });
    }
    match CoreStmt::from_str(text) {
        Some(kw) => Ok(Keyword::Core(kw)),
        None => Err(Error::parse(
            format!("unknown statement '{text}'"),
            Span::new(pos, pos),
        )),
    }
}

/// YANG identifier: `[_A-Za-z][._\-A-Za-z0-9]*`.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Apply the double-quoted string rules of RFC 7950 section 6.1.3: trim
/// trailing whitespace before each line break, strip continuation-line
/// indentation up to the column just past the opening quote, then substitute
/// the four escape sequences.
fn process_double_quoted(inner: &str, quote_column: usize) -> Result<String> {
    let indent_limit = quote_column + 1;
    let mut trimmed = String::with_capacity(inner.len());
    let mut lines = inner.split('\n').peekable();
    let mut first = true;
    while let Some(line) = lines.next() {
        let mut line = line;
        if !first {
            let mut stripped = 0;
            let mut bytes = line.char_indices();
            let mut cut = 0;
            for (idx, ch) in &mut bytes {
                if stripped >= indent_limit || !matches!(ch, ' ' | '\t') {
                    cut = idx;
                    break;
                }
                // A tab counts as 8 positions for the indentation rule.
                stripped += if ch == '\t' { 8 } else { 1 };
                cut = idx + ch.len_utf8();
            }
            line = &line[cut..];
        }
        if lines.peek().is_some() {
            trimmed.push_str(line.trim_end_matches([' ', '\t']));
            trimmed.push('\n');
        } else {
            trimmed.push_str(line);
        }
        first = false;
    }

    // Escape substitution after trimming.
    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            other => {
                return Err(Error::validation(
                    "invalid-escape",
                    format!(
                        "illegal escape sequence '\\{}' in double-quoted string",
                        other.map(String::from).unwrap_or_default()
                    ),
                ));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Statement {
        parse(text).expect("module should parse")
    }

    #[test]
    fn minimal_module() {
        let m = parse_ok("module m { namespace \"urn:m\"; prefix m; }");
        assert_eq!(m.keyword, Keyword::Core(CoreStmt::Module));
        assert_eq!(m.arg.as_deref(), Some("m"));
        assert_eq!(m.substmts.len(), 2);
        assert_eq!(m.find_arg(CoreStmt::Namespace).unwrap(), "urn:m");
    }

    #[test]
    fn extension_keyword_and_nesting() {
        let m = parse_ok("module m { namespace \"urn:m\"; prefix m; e:a; e:b \"one\"; }");
        let exts: Vec<_> = m.extensions().collect();
        assert_eq!(exts.len(), 2);
        assert!(matches!(
            &exts[0].keyword,
            Keyword::Extension { prefix, name } if prefix == "e" && name == "a"
        ));
        assert_eq!(exts[1].arg.as_deref(), Some("one"));
    }

    #[test]
    fn string_concatenation() {
        let m = parse_ok("module m { namespace \"urn:\" + 'm'; prefix m; }");
        assert_eq!(m.find_arg(CoreStmt::Namespace).unwrap(), "urn:m");
    }

    #[test]
    fn escapes_in_double_quotes() {
        let m = parse_ok(r#"module m { namespace "urn:m"; prefix m; description "a\nb\t\"c\""; }"#);
        assert_eq!(
            m.find_arg(CoreStmt::Description).unwrap(),
            "a\nb\t\"c\""
        );
    }

    #[test]
    fn single_quotes_are_verbatim() {
        let m = parse_ok(r#"module m { namespace 'urn:m'; prefix m; description 'a\nb'; }"#);
        assert_eq!(m.find_arg(CoreStmt::Description).unwrap(), r"a\nb");
    }

    #[test]
    fn unknown_keyword_is_an_error() {
        let err = parse("module m { bogus x; }").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn missing_terminator_is_an_error() {
        assert!(parse("module m { prefix m }").is_err());
    }

    #[test]
    fn statement_spans_cover_the_statement() {
        let m = parse_ok("module m {\n  prefix m;\n}");
        let prefix = m.find(CoreStmt::Prefix).unwrap();
        assert_eq!(prefix.span, Span::from_coords(1, 2, 1, 10));
    }
}
