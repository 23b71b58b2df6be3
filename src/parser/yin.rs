//! YIN (XML encoding of YANG) reader.
//!
//! Reads YIN into the same generic [`Statement`] tree as the YANG reader.
//! Works in two phases: quick-xml events are first collected into a small
//! element tree, which is then converted statement by statement using the
//! YIN argument table. The conversion needs the lookahead: an extension
//! instance's argument may arrive as a child element, distinguishable from a
//! nested extension instance only by its shape.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use smol_str::SmolStr;

use super::statement::{CoreStmt, ExtArgSyntax, Keyword, Statement};
use crate::base::{Position, Span};
use crate::error::{Error, Result};

/// An `xmlns` declaration from the document element, in source order. The
/// YIN printer re-emits these verbatim so a parse/print cycle is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YinNamespace {
    pub prefix: Option<SmolStr>,
    pub uri: SmolStr,
}

/// Parse YIN text into its `module`/`submodule` statement plus the document
/// element's namespace declarations.
pub fn parse(text: &str) -> Result<(Statement, Vec<YinNamespace>)> {
    let lines = LineIndex::new(text);
    let root = read_tree(text, &lines)?;
    let namespaces = root
        .attrs
        .iter()
        .filter_map(|(key, value)| {
            if key == "xmlns" {
                Some(YinNamespace {
                    prefix: None,
                    uri: value.clone(),
                })
            } else {
                key.strip_prefix("xmlns:").map(|p| YinNamespace {
                    prefix: Some(SmolStr::new(p)),
                    uri: value.clone(),
                })
            }
        })
        .collect();
    let stmt = convert(&root)?;
    match stmt.keyword {
        Keyword::Core(CoreStmt::Module) | Keyword::Core(CoreStmt::Submodule) => {
            Ok((stmt, namespaces))
        }
        ref other => Err(Error::parse(
            format!("expected 'module' or 'submodule' element, found '{other}'"),
            stmt.span,
        )),
    }
}

// ============================================================================
// Phase 1: XML element tree
// ============================================================================

#[derive(Debug)]
struct Element {
    prefix: Option<SmolStr>,
    name: SmolStr,
    /// Non-xmlns attributes in source order.
    attrs: Vec<(SmolStr, SmolStr)>,
    text: Option<String>,
    children: Vec<Element>,
    span: Span,
}

impl Element {
    fn is_text_only(&self) -> bool {
        self.children.is_empty() && self.attrs.is_empty() && self.text.is_some()
    }
}

struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { line_starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        Position::new(line, offset - self.line_starts[line])
    }
}

fn read_tree(text: &str, lines: &LineIndex) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    loop {
        let start_offset = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| xml_error(e.to_string(), start_offset, lines))?;
        let end_offset = reader.buffer_position() as usize;
        match event {
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Start(start) => {
                stack.push(element_from_start(&start, start_offset, end_offset, lines)?);
            }
            Event::Empty(start) => {
                let elem = element_from_start(&start, start_offset, end_offset, lines)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(elem),
                    None => return Ok(elem),
                }
            }
            Event::End(_) => {
                let elem = stack.pop().ok_or_else(|| {
                    xml_error("unbalanced end tag".into(), start_offset, lines)
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(elem),
                    None => return Ok(elem),
                }
            }
            Event::Text(t) => {
                let content = t
                    .unescape()
                    .map_err(|e| xml_error(e.to_string(), start_offset, lines))?;
                if content.trim().is_empty() {
                    continue;
                }
                match stack.last_mut() {
                    Some(parent) => {
                        parent
                            .text
                            .get_or_insert_with(String::new)
                            .push_str(&content);
                    }
                    None => {
                        return Err(xml_error(
                            "text outside the document element".into(),
                            start_offset,
                            lines,
                        ));
                    }
                }
            }
            Event::CData(c) => {
                let content = String::from_utf8_lossy(&c).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.text.get_or_insert_with(String::new).push_str(&content);
                }
            }
            Event::Eof => {
                return Err(xml_error("missing document element".into(), start_offset, lines));
            }
        }
    }
}

fn element_from_start(
    start: &BytesStart<'_>,
    start_offset: usize,
    end_offset: usize,
    lines: &LineIndex,
) -> Result<Element> {
    let raw_name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, name) = match raw_name.split_once(':') {
        Some((p, n)) => (Some(SmolStr::new(p)), SmolStr::new(n)),
        None => (None, SmolStr::new(&raw_name)),
    };
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| xml_error(e.to_string(), start_offset, lines))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| xml_error(e.to_string(), start_offset, lines))?;
        attrs.push((SmolStr::new(key), SmolStr::new(value)));
    }
    Ok(Element {
        prefix,
        name,
        attrs,
        text: None,
        children: Vec::new(),
        span: Span::new(lines.position(start_offset), lines.position(end_offset)),
    })
}

fn xml_error(message: String, offset: usize, lines: &LineIndex) -> Error {
    let pos = lines.position(offset);
    Error::parse(message, Span::new(pos, pos))
}

// ============================================================================
// Phase 2: element tree to statements
// ============================================================================

fn convert(elem: &Element) -> Result<Statement> {
    match &elem.prefix {
        Some(prefix) => convert_extension(elem, prefix.clone()),
        None => convert_core(elem),
    }
}

fn convert_core(elem: &Element) -> Result<Statement> {
    let kw = CoreStmt::from_str(&elem.name).ok_or_else(|| {
        Error::parse(format!("unknown YIN element '{}'", elem.name), elem.span)
    })?;
    let mut stmt = Statement::new(Keyword::Core(kw), elem.span);

    let mut arg_element: Option<&'static str> = None;
    match kw.yin_arg() {
        Some((attr_name, false)) => {
            stmt.arg = elem
                .attrs
                .iter()
                .find(|(k, _)| k == attr_name && !k.starts_with("xmlns"))
                .map(|(_, v)| v.clone());
            if stmt.arg.is_none() {
                return Err(Error::parse(
                    format!("'{}' element is missing its '{attr_name}' attribute", elem.name),
                    elem.span,
                ));
            }
        }
        Some((elem_name, true)) => arg_element = Some(elem_name),
        None => {}
    }

    for child in &elem.children {
        if let Some(arg_name) = arg_element {
            if child.prefix.is_none() && child.name == arg_name && stmt.arg.is_none() {
                stmt.arg = Some(SmolStr::new(child.text.as_deref().unwrap_or_default()));
                continue;
            }
        }
        stmt.substmts.push(convert(child)?);
    }
    if arg_element.is_some() && stmt.arg.is_none() {
        return Err(Error::parse(
            format!("'{}' element is missing its argument element", elem.name),
            elem.span,
        ));
    }
    Ok(stmt)
}

fn convert_extension(elem: &Element, prefix: SmolStr) -> Result<Statement> {
    let mut stmt = Statement::new(
        Keyword::Extension {
            prefix: prefix.clone(),
            name: SmolStr::new(&elem.name),
        },
        elem.span,
    );

    // A single non-xmlns attribute is the argument in attribute form.
    let plain_attrs: Vec<_> = elem
        .attrs
        .iter()
        .filter(|(k, _)| k != "xmlns" && !k.starts_with("xmlns:"))
        .collect();
    match plain_attrs.as_slice() {
        [] => {}
        [(name, value)] => {
            stmt.arg = Some(value.clone());
            stmt.ext_arg = Some(ExtArgSyntax {
                name: name.clone(),
                yin_element: false,
            });
        }
        _ => {
            return Err(Error::parse(
                format!(
                    "extension instance '{prefix}:{}' has more than one attribute",
                    elem.name
                ),
                elem.span,
            ));
        }
    }

    for child in &elem.children {
        // Argument in element form: a text-only child in the instance's own
        // namespace prefix, before any other interpretation.
        if stmt.arg.is_none()
            && child.prefix.as_ref() == Some(&prefix)
            && child.is_text_only()
        {
            stmt.arg = Some(SmolStr::new(child.text.as_deref().unwrap_or_default()));
            stmt.ext_arg = Some(ExtArgSyntax {
                name: child.name.clone(),
                yin_element: true,
            });
            continue;
        }
        stmt.substmts.push(convert(child)?);
    }
    Ok(stmt)
}
