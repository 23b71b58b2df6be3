//! `if-feature` predicate expressions.
//!
//! YANG 1.1 allows boolean expressions over feature names: `a and (not b or
//! c)`. YANG 1.0 arguments are a single name, which parses as the degenerate
//! expression.

use smol_str::SmolStr;

use crate::error::{Error, Result};

/// Parsed `if-feature` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureExpr {
    Ref {
        prefix: Option<SmolStr>,
        name: SmolStr,
    },
    Not(Box<FeatureExpr>),
    And(Box<FeatureExpr>, Box<FeatureExpr>),
    Or(Box<FeatureExpr>, Box<FeatureExpr>),
}

impl FeatureExpr {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text);
        let mut p = Parser { tokens, pos: 0 };
        let expr = p.expr()?;
        if p.pos != p.tokens.len() {
            return Err(invalid(text));
        }
        Ok(expr)
    }

    /// Evaluate against a feature lookup. The lookup receives the optional
    /// prefix and the feature name.
    pub fn eval(
        &self,
        lookup: &mut impl FnMut(Option<&str>, &str) -> Result<bool>,
    ) -> Result<bool> {
        Ok(match self {
            FeatureExpr::Ref { prefix, name } => lookup(prefix.as_deref(), name)?,
            FeatureExpr::Not(inner) => !inner.eval(lookup)?,
            FeatureExpr::And(lhs, rhs) => lhs.eval(lookup)? && rhs.eval(lookup)?,
            FeatureExpr::Or(lhs, rhs) => lhs.eval(lookup)? || rhs.eval(lookup)?,
        })
    }
}

fn invalid(text: &str) -> Error {
    Error::validation(
        "invalid-if-feature",
        format!("invalid if-feature expression '{text}'"),
    )
}

fn tokenize(text: &str) -> Vec<SmolStr> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        match c {
            '(' | ')' => {
                if !word.is_empty() {
                    tokens.push(SmolStr::new(&word));
                    word.clear();
                }
                tokens.push(SmolStr::new(c.to_string()));
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    tokens.push(SmolStr::new(&word));
                    word.clear();
                }
            }
            c => word.push(c),
        }
    }
    if !word.is_empty() {
        tokens.push(SmolStr::new(&word));
    }
    tokens
}

struct Parser {
    tokens: Vec<SmolStr>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&SmolStr> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self) -> Result<FeatureExpr> {
        let mut lhs = self.term()?;
        while self.peek().is_some_and(|t| t == "or") {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = FeatureExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<FeatureExpr> {
        let mut lhs = self.factor()?;
        while self.peek().is_some_and(|t| t == "and") {
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = FeatureExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<FeatureExpr> {
        let Some(tok) = self.peek().cloned() else {
            return Err(Error::validation(
                "invalid-if-feature",
                "unexpected end of if-feature expression",
            ));
        };
        self.pos += 1;
        match tok.as_str() {
            "not" => Ok(FeatureExpr::Not(Box::new(self.factor()?))),
            "(" => {
                let inner = self.expr()?;
                if self.peek().is_none_or(|t| t != ")") {
                    return Err(Error::validation(
                        "invalid-if-feature",
                        "missing ')' in if-feature expression",
                    ));
                }
                self.pos += 1;
                Ok(inner)
            }
            ")" | "and" | "or" => Err(Error::validation(
                "invalid-if-feature",
                format!("unexpected '{tok}' in if-feature expression"),
            )),
            name => Ok(match name.split_once(':') {
                Some((p, n)) => FeatureExpr::Ref {
                    prefix: Some(SmolStr::new(p)),
                    name: SmolStr::new(n),
                },
                None => FeatureExpr::Ref {
                    prefix: None,
                    name: SmolStr::new(name),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_with(expr: &str, enabled: &[&str]) -> bool {
        FeatureExpr::parse(expr)
            .unwrap()
            .eval(&mut |_, name| Ok(enabled.contains(&name)))
            .unwrap()
    }

    #[test]
    fn single_reference() {
        assert!(eval_with("ssh", &["ssh"]));
        assert!(!eval_with("ssh", &[]));
    }

    #[test]
    fn boolean_operators_and_precedence() {
        // 'and' binds tighter than 'or'.
        assert!(eval_with("a or b and c", &["a"]));
        assert!(!eval_with("a or b and c", &["b"]));
        assert!(eval_with("a or b and c", &["b", "c"]));
        assert!(eval_with("not a", &[]));
        assert!(eval_with("(a or b) and not c", &["b"]));
    }

    #[test]
    fn prefixed_reference() {
        let expr = FeatureExpr::parse("ext:feat").unwrap();
        assert_eq!(
            expr,
            FeatureExpr::Ref {
                prefix: Some("ext".into()),
                name: "feat".into()
            }
        );
    }

    #[test]
    fn malformed_expressions() {
        assert!(FeatureExpr::parse("a and").is_err());
        assert!(FeatureExpr::parse("(a").is_err());
        assert!(FeatureExpr::parse("a b").is_err());
    }
}
