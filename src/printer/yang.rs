//! YANG compact-syntax emitter.

use crate::parser::statement::{CoreStmt, Keyword, Statement};

/// Print a module statement tree as YANG text.
pub fn print(stmt: &Statement) -> String {
    let mut out = String::new();
    print_stmt(stmt, 0, &mut out);
    out
}

fn print_stmt(stmt: &Statement, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(&stmt.keyword.to_string());
    if let Some(arg) = &stmt.arg {
        out.push(' ');
        if needs_quoting(&stmt.keyword, arg) {
            out.push('"');
            out.push_str(&escape(arg));
            out.push('"');
        } else {
            out.push_str(arg);
        }
    }
    if stmt.substmts.is_empty() {
        out.push_str(";\n");
        return;
    }
    out.push_str(" {\n");
    for sub in &stmt.substmts {
        print_stmt(sub, depth + 1, out);
    }
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str("}\n");
}

/// Keywords whose arguments print quoted even when no character forces it,
/// plus anything containing characters an unquoted string cannot carry.
fn needs_quoting(keyword: &Keyword, arg: &str) -> bool {
    if arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"' | '\'' | '\\'))
        || arg.contains("//")
        || arg.contains("/*")
    {
        return true;
    }
    match keyword {
        Keyword::Extension { .. } => true,
        Keyword::Core(kw) => matches!(
            kw,
            CoreStmt::Namespace
                | CoreStmt::Description
                | CoreStmt::Reference
                | CoreStmt::Contact
                | CoreStmt::Organization
                | CoreStmt::Presence
                | CoreStmt::Must
                | CoreStmt::When
                | CoreStmt::Pattern
                | CoreStmt::Range
                | CoreStmt::Length
                | CoreStmt::Path
                | CoreStmt::Default
                | CoreStmt::ErrorMessage
                | CoreStmt::ErrorAppTag
                | CoreStmt::Units
                | CoreStmt::Key
                | CoreStmt::Unique
                | CoreStmt::Refine
                | CoreStmt::Augment
                | CoreStmt::Revision
        ),
    }
}

fn escape(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    for c in arg.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::yang;

    #[test]
    fn print_reparses_to_the_same_tree() {
        let source = "module m {\n  namespace \"urn:m\";\n  prefix m;\n  container c {\n    presence \"test\";\n    leaf l {\n      type string;\n    }\n  }\n}\n";
        let stmt = yang::parse(source).unwrap();
        let printed = print(&stmt);
        let reparsed = yang::parse(&printed).unwrap();
        assert_eq!(stmt, reparsed);
    }

    #[test]
    fn escapes_embedded_quotes() {
        let source = r#"module m { namespace "urn:m"; prefix m; description "say \"hi\""; }"#;
        let stmt = yang::parse(source).unwrap();
        let printed = print(&stmt);
        let reparsed = yang::parse(&printed).unwrap();
        assert_eq!(stmt, reparsed);
    }
}
