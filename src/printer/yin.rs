//! YIN (XML) emitter.
//!
//! Output shape mirrors the reader exactly: two-space nesting, document
//! element attributes one per line aligned under the element name, extension
//! instances before a yin-element argument. Parsing YIN and printing it back
//! reproduces the input byte for byte.

use crate::parser::statement::{Keyword, Statement};
use crate::parser::yin::YinNamespace;

/// Print a module statement tree as YIN.
pub fn print(stmt: &Statement, namespaces: &[YinNamespace]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let keyword = stmt.keyword.to_string();
    out.push('<');
    out.push_str(&keyword);
    if let Some(arg) = &stmt.arg {
        out.push_str(" name=\"");
        out.push_str(&escape_attr(arg));
        out.push('"');
    }
    let pad = " ".repeat(keyword.len() + 2);
    for ns in namespaces {
        out.push('\n');
        out.push_str(&pad);
        match &ns.prefix {
            None => out.push_str("xmlns=\""),
            Some(p) => {
                out.push_str("xmlns:");
                out.push_str(p);
                out.push_str("=\"");
            }
        }
        out.push_str(&escape_attr(&ns.uri));
        out.push('"');
    }
    if stmt.substmts.is_empty() {
        out.push_str("/>\n");
        return out;
    }
    out.push_str(">\n");
    for sub in &stmt.substmts {
        print_stmt(sub, 1, &mut out);
    }
    out.push_str("</");
    out.push_str(&keyword);
    out.push_str(">\n");
    out
}

fn print_stmt(stmt: &Statement, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let name = stmt.keyword.to_string();
    out.push_str(&indent);
    out.push('<');
    out.push_str(&name);

    // Argument placement: attribute, child element, or (extensions parsed
    // without a definition) bare text content.
    let mut arg_element: Option<(String, &str)> = None;
    let mut arg_text: Option<&str> = None;
    match (&stmt.keyword, &stmt.arg) {
        (Keyword::Core(kw), Some(arg)) => match kw.yin_arg() {
            Some((attr, false)) => {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                out.push_str(&escape_attr(arg));
                out.push('"');
            }
            Some((elem, true)) => arg_element = Some((elem.to_string(), arg.as_str())),
            None => {}
        },
        (Keyword::Extension { prefix, .. }, Some(arg)) => match &stmt.ext_arg {
            Some(syntax) if !syntax.yin_element => {
                out.push(' ');
                out.push_str(&syntax.name);
                out.push_str("=\"");
                out.push_str(&escape_attr(arg));
                out.push('"');
            }
            Some(syntax) => {
                arg_element = Some((format!("{prefix}:{}", syntax.name), arg.as_str()));
            }
            None => arg_text = Some(arg.as_str()),
        },
        _ => {}
    }

    if stmt.substmts.is_empty() && arg_element.is_none() && arg_text.is_none() {
        out.push_str("/>\n");
        return;
    }
    out.push('>');

    if let Some(text) = arg_text {
        out.push_str(&escape_text(text));
        out.push_str("</");
        out.push_str(&name);
        out.push_str(">\n");
        return;
    }
    out.push('\n');

    let inner = "  ".repeat(depth + 1);
    match arg_element {
        Some((elem, value)) => {
            // Extension instances precede the argument element.
            let (exts, rest): (Vec<&Statement>, Vec<&Statement>) = stmt
                .substmts
                .iter()
                .partition(|s| s.is_extension());
            for sub in exts {
                print_stmt(sub, depth + 1, out);
            }
            out.push_str(&inner);
            out.push('<');
            out.push_str(&elem);
            out.push('>');
            out.push_str(&escape_text(value));
            out.push_str("</");
            out.push_str(&elem);
            out.push_str(">\n");
            for sub in rest {
                print_stmt(sub, depth + 1, out);
            }
        }
        None => {
            for sub in &stmt.substmts {
                print_stmt(sub, depth + 1, out);
            }
        }
    }

    out.push_str(&indent);
    out.push_str("</");
    out.push_str(&name);
    out.push_str(">\n");
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}
