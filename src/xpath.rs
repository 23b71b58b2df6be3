//! XPath 1.0 expression parsing for `when`/`must` conditions and the
//! restricted leafref path syntax.
//!
//! Expressions are parsed once at schema compile time into a tree. Prefixes
//! in node tests stay unresolved: binding them to modules is the data
//! validator's job, evaluated against instance data. The compiler only needs
//! the expression to be well-formed and the leafref subset to be walkable.

use smol_str::SmolStr;

use crate::error::{Error, Result};

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Literal(SmolStr),
    /// QName or function name, possibly prefixed.
    Name(Option<SmolStr>, SmolStr),
    Star,
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    At,
    Comma,
    Dot,
    DotDot,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Mod,
    Div,
}

fn tokenize(text: &str) -> Result<Vec<Tok>> {
    let mut toks = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let err = |msg: String| Error::validation("invalid-xpath", msg);
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            '@' => {
                toks.push(Tok::At);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '|' => {
                toks.push(Tok::Pipe);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '=' => {
                toks.push(Tok::Eq);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::NotEq);
                    i += 2;
                } else {
                    return Err(err("'!' without '='".into()));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::LtEq);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::GtEq);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    toks.push(Tok::DoubleSlash);
                    i += 2;
                } else {
                    toks.push(Tok::Slash);
                    i += 1;
                }
            }
            '.' => {
                if chars.get(i + 1) == Some(&'.') {
                    toks.push(Tok::DotDot);
                    i += 2;
                } else if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                    let (num, next) = lex_number(&chars, i);
                    toks.push(Tok::Number(num));
                    i = next;
                } else {
                    toks.push(Tok::Dot);
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j == chars.len() {
                    return Err(err("unterminated string literal".into()));
                }
                toks.push(Tok::Literal(chars[start..j].iter().collect::<String>().into()));
                i = j + 1;
            }
            c if c.is_ascii_digit() => {
                let (num, next) = lex_number(&chars, i);
                toks.push(Tok::Number(num));
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i;
                while j < chars.len()
                    && (chars[j].is_ascii_alphanumeric() || matches!(chars[j], '_' | '-' | '.'))
                {
                    j += 1;
                }
                let word: String = chars[start..j].iter().collect();
                // Operator names only occur where a binary operator is
                // expected: after an operand. Disambiguate on the previous
                // token, as XPath 1.0 prescribes.
                let after_operand = matches!(
                    toks.last(),
                    Some(
                        Tok::Number(_)
                            | Tok::Literal(_)
                            | Tok::Name(..)
                            | Tok::RParen
                            | Tok::RBracket
                            | Tok::Star
                            | Tok::Dot
                            | Tok::DotDot
                    )
                );
                if after_operand {
                    match word.as_str() {
                        "and" => {
                            toks.push(Tok::And);
                            i = j;
                            continue;
                        }
                        "or" => {
                            toks.push(Tok::Or);
                            i = j;
                            continue;
                        }
                        "mod" => {
                            toks.push(Tok::Mod);
                            i = j;
                            continue;
                        }
                        "div" => {
                            toks.push(Tok::Div);
                            i = j;
                            continue;
                        }
                        _ => {}
                    }
                }
                if chars.get(j) == Some(&':') && chars.get(j + 1) != Some(&':') {
                    // prefixed name (or prefix:*)
                    let mut k = j + 1;
                    if chars.get(k) == Some(&'*') {
                        toks.push(Tok::Name(Some(word.into()), "*".into()));
                        i = k + 1;
                        continue;
                    }
                    let nstart = k;
                    while k < chars.len()
                        && (chars[k].is_ascii_alphanumeric() || matches!(chars[k], '_' | '-' | '.'))
                    {
                        k += 1;
                    }
                    if k == nstart {
                        return Err(err(format!("missing local name after '{word}:'")));
                    }
                    toks.push(Tok::Name(
                        Some(word.into()),
                        chars[nstart..k].iter().collect::<String>().into(),
                    ));
                    i = k;
                } else {
                    toks.push(Tok::Name(None, word.into()));
                    i = j;
                }
            }
            other => return Err(err(format!("unexpected character '{other}'"))),
        }
    }
    Ok(toks)
}

fn lex_number(chars: &[char], mut i: usize) -> (f64, usize) {
    let start = i;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    let text: String = chars[start..i].iter().collect();
    (text.parse().unwrap_or(0.0), i)
}

// ============================================================================
// Expression tree
// ============================================================================

/// A compiled XPath expression: the original text plus its parse tree.
#[derive(Debug, Clone)]
pub struct XPathExpr {
    pub text: SmolStr,
    pub root: Expr,
}

impl XPathExpr {
    /// Parse an expression, keeping prefixes unresolved.
    pub fn parse(text: &str) -> Result<Self> {
        let toks = tokenize(text)?;
        let mut p = Parser { toks, pos: 0 };
        let root = p.or_expr()?;
        if p.pos != p.toks.len() {
            return Err(Error::validation(
                "invalid-xpath",
                format!("trailing input in expression '{text}'"),
            ));
        }
        Ok(Self {
            text: text.into(),
            root,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Negate(Box<Expr>),
    Literal(SmolStr),
    Number(f64),
    /// Function call; `current()` and the YANG additions arrive here too.
    Call {
        name: SmolStr,
        args: Vec<Expr>,
    },
    /// Location path, possibly rooted in a filter expression.
    Path(PathExpr),
}

#[derive(Debug, Clone)]
pub struct PathExpr {
    /// Primary expression the steps apply to, e.g. `current()` in
    /// `current()/../x`. Absent for plain location paths.
    pub base: Option<Box<Expr>>,
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Parent,
    SelfAxis,
    DescendantOrSelf,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// Possibly-prefixed name; `*` local part matches any name.
    Name {
        prefix: Option<SmolStr>,
        name: SmolStr,
    },
    /// `node()`, `text()`, `comment()`.
    NodeType(SmolStr),
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(Error::validation(
                "invalid-xpath",
                format!("expected {what}"),
            ))
        }
    }

    fn binary_chain(
        &mut self,
        next: fn(&mut Self) -> Result<Expr>,
        table: &[(Tok, BinaryOp)],
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in table {
                if self.eat(tok) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        self.binary_chain(Self::and_expr, &[(Tok::Or, BinaryOp::Or)])
    }

    fn and_expr(&mut self) -> Result<Expr> {
        self.binary_chain(Self::equality_expr, &[(Tok::And, BinaryOp::And)])
    }

    fn equality_expr(&mut self) -> Result<Expr> {
        self.binary_chain(
            Self::relational_expr,
            &[(Tok::Eq, BinaryOp::Eq), (Tok::NotEq, BinaryOp::NotEq)],
        )
    }

    fn relational_expr(&mut self) -> Result<Expr> {
        self.binary_chain(
            Self::additive_expr,
            &[
                (Tok::LtEq, BinaryOp::LtEq),
                (Tok::GtEq, BinaryOp::GtEq),
                (Tok::Lt, BinaryOp::Lt),
                (Tok::Gt, BinaryOp::Gt),
            ],
        )
    }

    fn additive_expr(&mut self) -> Result<Expr> {
        self.binary_chain(
            Self::multiplicative_expr,
            &[(Tok::Plus, BinaryOp::Add), (Tok::Minus, BinaryOp::Sub)],
        )
    }

    fn multiplicative_expr(&mut self) -> Result<Expr> {
        self.binary_chain(
            Self::unary_expr,
            &[
                (Tok::Star, BinaryOp::Mul),
                (Tok::Div, BinaryOp::Div),
                (Tok::Mod, BinaryOp::Mod),
            ],
        )
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        if self.eat(&Tok::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary_expr()?)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr> {
        self.binary_chain(Self::path_expr, &[(Tok::Pipe, BinaryOp::Union)])
    }

    fn path_expr(&mut self) -> Result<Expr> {
        // Primary expressions that may be followed by a path.
        let is_call = matches!(self.peek(), Some(Tok::Name(None, _)))
            && self.toks.get(self.pos + 1) == Some(&Tok::LParen);
        let base = if is_call {
            Some(self.function_call()?)
        } else {
            match self.peek().cloned() {
                Some(Tok::Literal(s)) => {
                    self.bump();
                    return Ok(Expr::Literal(s));
                }
                Some(Tok::Number(n)) => {
                    self.bump();
                    return Ok(Expr::Number(n));
                }
                Some(Tok::LParen) => {
                    self.bump();
                    let inner = self.or_expr()?;
                    self.expect(Tok::RParen, "')'")?;
                    Some(inner)
                }
                _ => None,
            }
        };

        match base {
            Some(expr) => {
                if matches!(self.peek(), Some(Tok::Slash) | Some(Tok::DoubleSlash)) {
                    let steps = self.steps(false)?;
                    Ok(Expr::Path(PathExpr {
                        base: Some(Box::new(expr)),
                        absolute: false,
                        steps,
                    }))
                } else {
                    Ok(expr)
                }
            }
            None => {
                let absolute =
                    matches!(self.peek(), Some(Tok::Slash) | Some(Tok::DoubleSlash));
                let steps = self.steps(absolute)?;
                Ok(Expr::Path(PathExpr {
                    base: None,
                    absolute,
                    steps,
                }))
            }
        }
    }

    fn function_call(&mut self) -> Result<Expr> {
        let name = match self.bump() {
            Some(Tok::Name(None, name)) => name,
            _ => return Err(Error::validation("invalid-xpath", "expected function name")),
        };
        self.expect(Tok::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&Tok::Comma) {
                    continue;
                }
                self.expect(Tok::RParen, "')'")?;
                break;
            }
        }
        Ok(Expr::Call { name, args })
    }

    /// Parse location steps. `leading_slash` consumes the initial '/' of an
    /// absolute path.
    fn steps(&mut self, leading_slash: bool) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        let mut first = true;
        loop {
            if first && leading_slash {
                match self.bump() {
                    Some(Tok::Slash) => {}
                    Some(Tok::DoubleSlash) => steps.push(descendant_step()),
                    _ => {
                        return Err(Error::validation(
                            "invalid-xpath",
                            "expected '/'",
                        ));
                    }
                }
            } else if !first {
                match self.peek() {
                    Some(Tok::Slash) => {
                        self.bump();
                    }
                    Some(Tok::DoubleSlash) => {
                        self.bump();
                        steps.push(descendant_step());
                    }
                    _ => break,
                }
            }
            first = false;

            let step = match self.peek() {
                Some(Tok::Dot) => {
                    self.bump();
                    Step {
                        axis: Axis::SelfAxis,
                        test: NodeTest::NodeType("node".into()),
                        predicates: Vec::new(),
                    }
                }
                Some(Tok::DotDot) => {
                    self.bump();
                    Step {
                        axis: Axis::Parent,
                        test: NodeTest::NodeType("node".into()),
                        predicates: Vec::new(),
                    }
                }
                Some(Tok::At) => {
                    self.bump();
                    let test = self.node_test()?;
                    Step {
                        axis: Axis::Attribute,
                        test,
                        predicates: Vec::new(),
                    }
                }
                Some(Tok::Star) | Some(Tok::Name(..)) => {
                    let test = self.node_test()?;
                    Step {
                        axis: Axis::Child,
                        test,
                        predicates: Vec::new(),
                    }
                }
                _ => {
                    if steps.is_empty() && leading_slash {
                        // Bare '/': the root itself.
                        break;
                    }
                    return Err(Error::validation(
                        "invalid-xpath",
                        "expected location step",
                    ));
                }
            };
            let mut step = step;
            while self.eat(&Tok::LBracket) {
                let pred = self.or_expr()?;
                self.expect(Tok::RBracket, "']'")?;
                step.predicates.push(pred);
            }
            steps.push(step);
        }
        Ok(steps)
    }

    fn node_test(&mut self) -> Result<NodeTest> {
        match self.bump() {
            Some(Tok::Star) => Ok(NodeTest::Name {
                prefix: None,
                name: "*".into(),
            }),
            Some(Tok::Name(prefix, name)) => {
                if prefix.is_none() && self.peek() == Some(&Tok::LParen) {
                    if matches!(name.as_str(), "node" | "text" | "comment") {
                        self.bump();
                        self.expect(Tok::RParen, "')'")?;
                        return Ok(NodeTest::NodeType(name));
                    }
                }
                Ok(NodeTest::Name { prefix, name })
            }
            _ => Err(Error::validation(
                "invalid-xpath",
                "expected node test",
            )),
        }
    }
}

fn descendant_step() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::NodeType("node".into()),
        predicates: Vec::new(),
    }
}

// ============================================================================
// Leafref path subset (RFC 7950 section 9.9.2)
// ============================================================================

/// A parsed leafref `path` argument.
#[derive(Debug, Clone)]
pub struct LeafrefPath {
    pub absolute: bool,
    /// Number of leading `../` steps (relative paths only).
    pub up: u32,
    pub steps: Vec<LeafrefStep>,
}

#[derive(Debug, Clone)]
pub struct LeafrefStep {
    pub prefix: Option<SmolStr>,
    pub name: SmolStr,
    pub predicates: Vec<LeafrefPredicate>,
}

/// `[key = current()/../rel/path]`
#[derive(Debug, Clone)]
pub struct LeafrefPredicate {
    pub key_prefix: Option<SmolStr>,
    pub key: SmolStr,
    pub rel_up: u32,
    pub rel_steps: Vec<(Option<SmolStr>, SmolStr)>,
}

impl LeafrefPath {
    pub fn parse(text: &str) -> Result<Self> {
        // Reuse the XPath parser; then narrow to the leafref subset.
        let expr = XPathExpr::parse(text).map_err(|_| invalid_path(text))?;
        let path = match expr.root {
            Expr::Path(p) if p.base.is_none() => p,
            _ => return Err(invalid_path(text)),
        };
        let mut up = 0u32;
        let mut steps = Vec::new();
        let mut counting_up = !path.absolute;
        for step in &path.steps {
            match step.axis {
                Axis::Parent if counting_up && step.predicates.is_empty() => up += 1,
                Axis::Child => {
                    counting_up = false;
                    let (prefix, name) = match &step.test {
                        NodeTest::Name { prefix, name } if name != "*" => {
                            (prefix.clone(), name.clone())
                        }
                        _ => return Err(invalid_path(text)),
                    };
                    let mut predicates = Vec::new();
                    for pred in &step.predicates {
                        predicates.push(leafref_predicate(pred).ok_or_else(|| invalid_path(text))?);
                    }
                    steps.push(LeafrefStep {
                        prefix,
                        name,
                        predicates,
                    });
                }
                _ => return Err(invalid_path(text)),
            }
        }
        if !path.absolute && up == 0 {
            return Err(invalid_path(text));
        }
        if steps.is_empty() {
            return Err(invalid_path(text));
        }
        Ok(LeafrefPath {
            absolute: path.absolute,
            up,
            steps,
        })
    }
}

fn leafref_predicate(pred: &Expr) -> Option<LeafrefPredicate> {
    let Expr::Binary {
        op: BinaryOp::Eq,
        lhs,
        rhs,
    } = pred
    else {
        return None;
    };
    // Left side: the key leaf name.
    let (key_prefix, key) = match &**lhs {
        Expr::Path(p) if !p.absolute && p.base.is_none() && p.steps.len() == 1 => {
            match &p.steps[0].test {
                NodeTest::Name { prefix, name } => (prefix.clone(), name.clone()),
                _ => return None,
            }
        }
        _ => return None,
    };
    // Right side: current()/../.../name
    let Expr::Path(p) = &**rhs else { return None };
    match p.base.as_deref() {
        Some(Expr::Call { name, args }) if name == "current" && args.is_empty() => {}
        _ => return None,
    }
    let mut rel_up = 0u32;
    let mut rel_steps = Vec::new();
    for step in &p.steps {
        match (step.axis, &step.test) {
            (Axis::Parent, _) if rel_steps.is_empty() => rel_up += 1,
            (Axis::Child, NodeTest::Name { prefix, name }) => {
                rel_steps.push((prefix.clone(), name.clone()));
            }
            _ => return None,
        }
    }
    if rel_up == 0 || rel_steps.is_empty() {
        return None;
    }
    Some(LeafrefPredicate {
        key_prefix,
        key,
        rel_up,
        rel_steps,
    })
}

fn invalid_path(text: &str) -> Error {
    Error::validation("invalid-leafref-path", format!("invalid path '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_expression() {
        let e = XPathExpr::parse("../type = 'switch' and count(port) > 0").unwrap();
        match e.root {
            Expr::Binary {
                op: BinaryOp::And, ..
            } => {}
            other => panic!("expected 'and' at the top, got {other:?}"),
        }
    }

    #[test]
    fn parses_true_function() {
        let e = XPathExpr::parse("true()").unwrap();
        match e.root {
            Expr::Call { name, args } => {
                assert_eq!(name, "true");
                assert!(args.is_empty());
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn keeps_prefixes_unresolved() {
        let e = XPathExpr::parse("/ex:system/ex:services/ex:ssh").unwrap();
        let Expr::Path(p) = e.root else { panic!() };
        assert!(p.absolute);
        assert_eq!(p.steps.len(), 3);
        assert!(
            matches!(&p.steps[0].test, NodeTest::Name { prefix: Some(p), .. } if p == "ex")
        );
    }

    #[test]
    fn operator_names_usable_as_node_names() {
        // 'and' only means conjunction after an operand.
        let e = XPathExpr::parse("and | or").unwrap();
        assert!(matches!(
            e.root,
            Expr::Binary {
                op: BinaryOp::Union,
                ..
            }
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(XPathExpr::parse("../ %% /x").is_err());
        assert!(XPathExpr::parse("a = ").is_err());
    }

    #[test]
    fn leafref_relative_path() {
        let p = LeafrefPath::parse("../interface/name").unwrap();
        assert!(!p.absolute);
        assert_eq!(p.up, 1);
        assert_eq!(p.steps.len(), 2);
        assert_eq!(p.steps[0].name, "interface");
    }

    #[test]
    fn leafref_absolute_with_predicate() {
        let p =
            LeafrefPath::parse("/ex:interface[ex:name = current()/../ex:ifname]/ex:address")
                .unwrap();
        assert!(p.absolute);
        assert_eq!(p.steps.len(), 2);
        let pred = &p.steps[0].predicates[0];
        assert_eq!(pred.key, "name");
        assert_eq!(pred.rel_up, 1);
        assert_eq!(pred.rel_steps[0].1, "ifname");
    }

    #[test]
    fn leafref_rejects_descendant_axis() {
        assert!(LeafrefPath::parse("//interface/name").is_err());
        assert!(LeafrefPath::parse("interface/name").is_err());
    }
}
