//! Parsed schema representation (P-tree).
//!
//! Typed view of one module built from the generic statement tree. Nothing is
//! resolved here: type names, grouping references, augment targets and
//! prefixes are verbatim. The compiler consumes this form and produces the
//! compiled tree.
//!
//! Every carrier keeps its extension instances in source order; the compiled
//! tree inherits them unchanged.

use smol_str::SmolStr;

use crate::base::{Name, Span};
use crate::parser::yin::YinNamespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YangVersion {
    #[default]
    V1,
    V1_1,
}

/// Statement status. The ordering follows stability: `Current` <
/// `Deprecated` < `Obsolete`, so a cap is a `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedBy {
    System,
    User,
}

/// `max-elements` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxElements {
    Unbounded,
    Limited(u32),
}

/// An unresolved extension instance: prefix and name as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInstance {
    pub prefix: SmolStr,
    pub name: SmolStr,
    pub arg: Option<SmolStr>,
    pub children: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub module: Name,
    pub prefix: Name,
    pub revision: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedInclude {
    pub module: Name,
    pub revision: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedRevision {
    pub date: SmolStr,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
}

#[derive(Debug, Clone)]
pub struct ParsedWhen {
    pub condition: SmolStr,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedMust {
    pub condition: SmolStr,
    pub error_message: Option<SmolStr>,
    pub error_app_tag: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// `pattern` restriction with its modifier and error metadata.
#[derive(Debug, Clone)]
pub struct ParsedPattern {
    pub pattern: SmolStr,
    pub invert_match: bool,
    pub error_message: Option<SmolStr>,
    pub error_app_tag: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// `range` or `length` restriction expression, unparsed.
#[derive(Debug, Clone)]
pub struct ParsedRestriction {
    pub expr: SmolStr,
    pub error_message: Option<SmolStr>,
    pub error_app_tag: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedEnum {
    pub name: SmolStr,
    pub value: Option<i64>,
    pub if_features: Vec<SmolStr>,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedBit {
    pub name: SmolStr,
    pub position: Option<u32>,
    pub if_features: Vec<SmolStr>,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// A `type` reference with all restriction substatements, unresolved.
#[derive(Debug, Clone)]
pub struct ParsedType {
    pub prefix: Option<SmolStr>,
    pub name: SmolStr,
    pub range: Option<ParsedRestriction>,
    pub length: Option<ParsedRestriction>,
    pub patterns: Vec<ParsedPattern>,
    pub enums: Vec<ParsedEnum>,
    pub bits: Vec<ParsedBit>,
    pub fraction_digits: Option<u8>,
    pub path: Option<SmolStr>,
    pub require_instance: Option<bool>,
    pub bases: Vec<PrefixedName>,
    pub union_types: Vec<ParsedType>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// A possibly-prefixed reference, e.g. `e:two`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedName {
    pub prefix: Option<SmolStr>,
    pub name: SmolStr,
}

#[derive(Debug, Clone)]
pub struct ParsedTypedef {
    pub name: Name,
    pub ty: ParsedType,
    pub units: Option<SmolStr>,
    pub default: Option<SmolStr>,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedGrouping {
    pub name: Name,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub typedefs: Vec<ParsedTypedef>,
    pub groupings: Vec<ParsedGrouping>,
    pub children: Vec<ParsedNode>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// A `refine` inside `uses`. Only the YANG 1.1 Table 17 statements appear.
#[derive(Debug, Clone)]
pub struct ParsedRefine {
    pub target: SmolStr,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub presence: Option<SmolStr>,
    pub defaults: Vec<SmolStr>,
    pub musts: Vec<ParsedMust>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<MaxElements>,
    pub if_features: Vec<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedAugment {
    pub target: SmolStr,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub when: Option<ParsedWhen>,
    pub if_features: Vec<SmolStr>,
    pub children: Vec<ParsedNode>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedFeature {
    pub name: Name,
    pub if_features: Vec<SmolStr>,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParsedIdentity {
    pub name: Name,
    pub bases: Vec<PrefixedName>,
    pub if_features: Vec<SmolStr>,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// An `extension` definition: names the statement and describes its argument.
#[derive(Debug, Clone)]
pub struct ParsedExtensionDef {
    pub name: Name,
    /// Argument name and whether YIN carries it as a child element.
    pub argument: Option<(SmolStr, bool)>,
    pub status: Option<Status>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<ExtensionInstance>,
    pub span: Span,
}

/// A parsed schema node: shared metadata plus a kind-specific body.
#[derive(Debug, Clone)]
pub struct ParsedNode {
    pub name: Name,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub status: Option<Status>,
    pub config: Option<bool>,
    pub when: Option<ParsedWhen>,
    pub if_features: Vec<SmolStr>,
    pub musts: Vec<ParsedMust>,
    pub exts: Vec<ExtensionInstance>,
    pub body: ParsedNodeBody,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ParsedNodeBody {
    Container {
        presence: Option<SmolStr>,
        typedefs: Vec<ParsedTypedef>,
        groupings: Vec<ParsedGrouping>,
        children: Vec<ParsedNode>,
    },
    Leaf {
        ty: ParsedType,
        units: Option<SmolStr>,
        default: Option<SmolStr>,
        mandatory: Option<bool>,
    },
    LeafList {
        ty: ParsedType,
        units: Option<SmolStr>,
        defaults: Vec<SmolStr>,
        min_elements: Option<u32>,
        max_elements: Option<MaxElements>,
        ordered_by: Option<OrderedBy>,
    },
    List {
        key: Option<SmolStr>,
        uniques: Vec<SmolStr>,
        min_elements: Option<u32>,
        max_elements: Option<MaxElements>,
        ordered_by: Option<OrderedBy>,
        typedefs: Vec<ParsedTypedef>,
        groupings: Vec<ParsedGrouping>,
        children: Vec<ParsedNode>,
    },
    Choice {
        default: Option<SmolStr>,
        mandatory: Option<bool>,
        children: Vec<ParsedNode>,
    },
    Case {
        children: Vec<ParsedNode>,
    },
    Anyxml {
        mandatory: Option<bool>,
    },
    Anydata {
        mandatory: Option<bool>,
    },
    Uses {
        refines: Vec<ParsedRefine>,
        augments: Vec<ParsedAugment>,
    },
    /// `rpc` at module level, `action` inside data nodes.
    Rpc {
        is_action: bool,
        typedefs: Vec<ParsedTypedef>,
        groupings: Vec<ParsedGrouping>,
        input: Option<Box<ParsedNode>>,
        output: Option<Box<ParsedNode>>,
    },
    Notification {
        typedefs: Vec<ParsedTypedef>,
        groupings: Vec<ParsedGrouping>,
        children: Vec<ParsedNode>,
    },
    /// `input`/`output` of an rpc or action.
    RpcIo {
        output: bool,
        typedefs: Vec<ParsedTypedef>,
        groupings: Vec<ParsedGrouping>,
        children: Vec<ParsedNode>,
    },
}

impl ParsedNodeBody {
    /// Child nodes of kinds that nest data nodes directly.
    pub fn children(&self) -> &[ParsedNode] {
        match self {
            ParsedNodeBody::Container { children, .. }
            | ParsedNodeBody::List { children, .. }
            | ParsedNodeBody::Choice { children, .. }
            | ParsedNodeBody::Case { children, .. }
            | ParsedNodeBody::Notification { children, .. }
            | ParsedNodeBody::RpcIo { children, .. } => children,
            _ => &[],
        }
    }

    /// Mutable child nodes, for refine application on cloned subtrees.
    pub fn children_mut(&mut self) -> Option<&mut Vec<ParsedNode>> {
        match self {
            ParsedNodeBody::Container { children, .. }
            | ParsedNodeBody::List { children, .. }
            | ParsedNodeBody::Choice { children, .. }
            | ParsedNodeBody::Case { children, .. }
            | ParsedNodeBody::Notification { children, .. }
            | ParsedNodeBody::RpcIo { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Typedefs declared directly on this node, for scope-chain lookups.
    pub fn typedefs(&self) -> &[ParsedTypedef] {
        match self {
            ParsedNodeBody::Container { typedefs, .. }
            | ParsedNodeBody::List { typedefs, .. }
            | ParsedNodeBody::Rpc { typedefs, .. }
            | ParsedNodeBody::Notification { typedefs, .. }
            | ParsedNodeBody::RpcIo { typedefs, .. } => typedefs,
            _ => &[],
        }
    }

    /// Groupings declared directly on this node, for scope-chain lookups.
    pub fn groupings(&self) -> &[ParsedGrouping] {
        match self {
            ParsedNodeBody::Container { groupings, .. }
            | ParsedNodeBody::List { groupings, .. }
            | ParsedNodeBody::Rpc { groupings, .. }
            | ParsedNodeBody::Notification { groupings, .. }
            | ParsedNodeBody::RpcIo { groupings, .. } => groupings,
            _ => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ParsedNodeBody::Container { .. } => "container",
            ParsedNodeBody::Leaf { .. } => "leaf",
            ParsedNodeBody::LeafList { .. } => "leaf-list",
            ParsedNodeBody::List { .. } => "list",
            ParsedNodeBody::Choice { .. } => "choice",
            ParsedNodeBody::Case { .. } => "case",
            ParsedNodeBody::Anyxml { .. } => "anyxml",
            ParsedNodeBody::Anydata { .. } => "anydata",
            ParsedNodeBody::Uses { .. } => "uses",
            ParsedNodeBody::Rpc {
                is_action: false, ..
            } => "rpc",
            ParsedNodeBody::Rpc { is_action: true, .. } => "action",
            ParsedNodeBody::Notification { .. } => "notification",
            ParsedNodeBody::RpcIo { output: false, .. } => "input",
            ParsedNodeBody::RpcIo { output: true, .. } => "output",
        }
    }
}

/// One parsed module or submodule.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    pub name: Name,
    pub is_submodule: bool,
    pub yang_version: YangVersion,
    pub namespace: Option<SmolStr>,
    pub prefix: Option<Name>,
    /// Parent module name, submodules only.
    pub belongs_to: Option<Name>,
    pub imports: Vec<ParsedImport>,
    pub includes: Vec<ParsedInclude>,
    pub revisions: Vec<ParsedRevision>,
    pub organization: Option<SmolStr>,
    pub contact: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub features: Vec<ParsedFeature>,
    pub identities: Vec<ParsedIdentity>,
    pub typedefs: Vec<ParsedTypedef>,
    pub groupings: Vec<ParsedGrouping>,
    pub extensions: Vec<ParsedExtensionDef>,
    pub augments: Vec<ParsedAugment>,
    /// Top-level data nodes, rpcs and notifications, in source order.
    pub data: Vec<ParsedNode>,
    pub exts: Vec<ExtensionInstance>,
    /// Document-element namespace declarations, modules parsed from YIN only.
    pub yin_namespaces: Vec<YinNamespace>,
    pub span: Span,
}

impl ParsedModule {
    /// Revision to report for the module: the first (most recent) entry.
    pub fn revision(&self) -> Option<&SmolStr> {
        self.revisions.first().map(|r| &r.date)
    }

    /// Find an import by its prefix.
    pub fn import_by_prefix(&self, prefix: &str) -> Option<&ParsedImport> {
        self.imports.iter().find(|i| &*i.prefix == prefix)
    }
}
