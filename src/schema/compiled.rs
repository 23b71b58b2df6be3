//! Compiled schema representation (C-tree).
//!
//! Nodes live in an arena owned by the context; `NodeId` handles express the
//! parent/child graph without cyclic ownership. Types and patterns shared
//! along typedef chains are `Rc`-counted. Groupings and uses do not appear
//! here: expansions happened during compilation.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;
use smol_str::SmolStr;

use crate::base::Name;
use crate::schema::parsed::{MaxElements, Status};
use crate::xpath::{LeafrefPath, XPathExpr};

/// Index of a module within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

/// Handle of a compiled node in the context arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a compiled identity in the context arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId(pub u32);

impl IdentityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Qualified name: defining module plus interned local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub module: ModuleId,
    pub name: Name,
}

impl std::fmt::Display for QName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A compiled extension instance with its definition resolved.
#[derive(Debug, Clone)]
pub struct SchemaExt {
    /// Module defining the extension.
    pub def_module: ModuleId,
    pub name: Name,
    pub arg: Option<SmolStr>,
    pub children: Vec<SchemaExt>,
}

/// Compiled `when`: parsed XPath plus its context node. Shared between all
/// nodes of one uses expansion.
#[derive(Debug)]
pub struct SchemaWhen {
    pub expr: XPathExpr,
    /// Context node for relative paths; `None` means the node itself.
    pub context: Option<NodeId>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<SchemaExt>,
}

/// Compiled `must` constraint.
#[derive(Debug)]
pub struct SchemaMust {
    pub expr: XPathExpr,
    pub error_message: Option<SmolStr>,
    pub error_app_tag: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub exts: Vec<SchemaExt>,
}

/// Compiled pattern restriction: engine handle plus invert-match and error
/// metadata. Shared along typedef chains.
#[derive(Debug)]
pub struct SchemaPattern {
    pub source: SmolStr,
    pub invert_match: bool,
    pub error_message: Option<SmolStr>,
    pub error_app_tag: Option<SmolStr>,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub regex: Regex,
    pub exts: Vec<SchemaExt>,
}

impl SchemaPattern {
    /// Whether `value` satisfies this pattern, invert-match applied.
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value) != self.invert_match
    }
}

/// The 19 built-in YANG type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Binary,
    Bits,
    Boolean,
    Decimal64,
    Empty,
    Enumeration,
    IdentityRef,
    InstanceIdentifier,
    Int8,
    Int16,
    Int32,
    Int64,
    Leafref,
    String,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Union,
}

impl TypeKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "binary" => TypeKind::Binary,
            "bits" => TypeKind::Bits,
            "boolean" => TypeKind::Boolean,
            "decimal64" => TypeKind::Decimal64,
            "empty" => TypeKind::Empty,
            "enumeration" => TypeKind::Enumeration,
            "identityref" => TypeKind::IdentityRef,
            "instance-identifier" => TypeKind::InstanceIdentifier,
            "int8" => TypeKind::Int8,
            "int16" => TypeKind::Int16,
            "int32" => TypeKind::Int32,
            "int64" => TypeKind::Int64,
            "leafref" => TypeKind::Leafref,
            "string" => TypeKind::String,
            "uint8" => TypeKind::Uint8,
            "uint16" => TypeKind::Uint16,
            "uint32" => TypeKind::Uint32,
            "uint64" => TypeKind::Uint64,
            "union" => TypeKind::Union,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Binary => "binary",
            TypeKind::Bits => "bits",
            TypeKind::Boolean => "boolean",
            TypeKind::Decimal64 => "decimal64",
            TypeKind::Empty => "empty",
            TypeKind::Enumeration => "enumeration",
            TypeKind::IdentityRef => "identityref",
            TypeKind::InstanceIdentifier => "instance-identifier",
            TypeKind::Int8 => "int8",
            TypeKind::Int16 => "int16",
            TypeKind::Int32 => "int32",
            TypeKind::Int64 => "int64",
            TypeKind::Leafref => "leafref",
            TypeKind::String => "string",
            TypeKind::Uint8 => "uint8",
            TypeKind::Uint16 => "uint16",
            TypeKind::Uint32 => "uint32",
            TypeKind::Uint64 => "uint64",
            TypeKind::Union => "union",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
        )
    }
}

/// A value span of a `range` restriction. Decimal64 bounds are scaled by
/// `10^fraction-digits` so all numeric comparisons are integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpan {
    pub lo: i128,
    pub hi: i128,
}

/// A value span of a `length` restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthSpan {
    pub lo: u64,
    pub hi: u64,
}

/// One label of a compiled enumeration.
#[derive(Debug, Clone)]
pub struct EnumSpec {
    pub label: Name,
    pub value: i64,
    pub status: Status,
    pub exts: Vec<SchemaExt>,
}

/// One label of a compiled bits type.
#[derive(Debug, Clone)]
pub struct BitSpec {
    pub label: Name,
    pub position: u32,
    pub status: Status,
    pub exts: Vec<SchemaExt>,
}

/// A compiled type: fully intersected restrictions over a built-in kind.
///
/// Shared via `Rc` when a derived type adds no restrictions of its own; the
/// reference count doubles as the sharing count of the typedef chain.
#[derive(Debug)]
pub struct SchemaType {
    pub kind: TypeKind,
    /// Name of the typedef this type came from, for diagnostics. `None` for
    /// anonymous uses of a built-in.
    pub typedef: Option<Name>,
    pub details: TypeDetails,
    pub exts: Vec<SchemaExt>,
}

#[derive(Debug)]
pub enum TypeDetails {
    /// boolean, empty.
    Plain,
    /// The eight integer kinds.
    Integer { ranges: Vec<RangeSpan> },
    Decimal {
        fraction_digits: u8,
        ranges: Vec<RangeSpan>,
    },
    Str {
        lengths: Vec<LengthSpan>,
        patterns: Vec<Rc<SchemaPattern>>,
    },
    Binary { lengths: Vec<LengthSpan> },
    Enumeration { enums: Vec<EnumSpec> },
    Bits { bits: Vec<BitSpec> },
    Leafref {
        path: LeafrefPath,
        /// Module whose prefixes the path uses, i.e. where the path
        /// statement was written.
        path_module: ModuleId,
        require_instance: bool,
        /// Effective type of the target leaf, filled by the deferred
        /// resolver.
        realized: RefCell<Option<Rc<SchemaType>>>,
    },
    InstanceIdentifier { require_instance: bool },
    IdentityRef {
        bases: Vec<IdentityId>,
        /// All identities derived from every base, closed transitively.
        /// Filled by the deferred resolver.
        permitted: RefCell<Vec<IdentityId>>,
    },
    Union { members: Vec<Rc<SchemaType>> },
}

impl SchemaType {
    /// Plain built-in with no restrictions.
    pub fn plain(kind: TypeKind) -> Self {
        let details = match kind {
            TypeKind::Boolean | TypeKind::Empty => TypeDetails::Plain,
            k if k.is_integer() => TypeDetails::Integer {
                ranges: vec![kind_value_bounds(k)],
            },
            TypeKind::String => TypeDetails::Str {
                lengths: vec![LengthSpan { lo: 0, hi: u64::MAX }],
                patterns: Vec::new(),
            },
            TypeKind::Binary => TypeDetails::Binary {
                lengths: vec![LengthSpan { lo: 0, hi: u64::MAX }],
            },
            TypeKind::InstanceIdentifier => TypeDetails::InstanceIdentifier {
                require_instance: true,
            },
            _ => TypeDetails::Plain,
        };
        SchemaType {
            kind,
            typedef: None,
            details,
            exts: Vec::new(),
        }
    }

    pub fn patterns(&self) -> &[Rc<SchemaPattern>] {
        match &self.details {
            TypeDetails::Str { patterns, .. } => patterns,
            _ => &[],
        }
    }
}

/// Value bounds of an integer kind.
pub fn kind_value_bounds(kind: TypeKind) -> RangeSpan {
    let (lo, hi) = match kind {
        TypeKind::Int8 => (i8::MIN as i128, i8::MAX as i128),
        TypeKind::Int16 => (i16::MIN as i128, i16::MAX as i128),
        TypeKind::Int32 => (i32::MIN as i128, i32::MAX as i128),
        TypeKind::Int64 => (i64::MIN as i128, i64::MAX as i128),
        TypeKind::Uint8 => (0, u8::MAX as i128),
        TypeKind::Uint16 => (0, u16::MAX as i128),
        TypeKind::Uint32 => (0, u32::MAX as i128),
        TypeKind::Uint64 => (0, u64::MAX as i128),
        _ => (i128::MIN, i128::MAX),
    };
    RangeSpan { lo, hi }
}

/// Node kinds of the compiled tree, with their payloads.
#[derive(Debug)]
pub enum SchemaNodeKind {
    Container {
        presence: bool,
        /// Count of directly mandatory children, maintained by the
        /// mandatory-parents propagation.
        mandatory_children: u32,
    },
    Leaf {
        ty: Rc<SchemaType>,
        units: Option<SmolStr>,
        default: Option<SmolStr>,
    },
    LeafList {
        ty: Rc<SchemaType>,
        units: Option<SmolStr>,
        defaults: Vec<SmolStr>,
        min_elements: u32,
        max_elements: MaxElements,
        ordered_by_user: bool,
    },
    List {
        keys: Vec<NodeId>,
        uniques: Vec<Vec<NodeId>>,
        min_elements: u32,
        max_elements: MaxElements,
        ordered_by_user: bool,
    },
    Choice { default_case: Option<NodeId> },
    Case,
    AnyXml,
    AnyData,
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

impl SchemaNodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            SchemaNodeKind::Container { .. } => "container",
            SchemaNodeKind::Leaf { .. } => "leaf",
            SchemaNodeKind::LeafList { .. } => "leaf-list",
            SchemaNodeKind::List { .. } => "list",
            SchemaNodeKind::Choice { .. } => "choice",
            SchemaNodeKind::Case => "case",
            SchemaNodeKind::AnyXml => "anyxml",
            SchemaNodeKind::AnyData => "anydata",
            SchemaNodeKind::Rpc => "rpc",
            SchemaNodeKind::Action => "action",
            SchemaNodeKind::Input => "input",
            SchemaNodeKind::Output => "output",
            SchemaNodeKind::Notification => "notification",
        }
    }
}

/// A compiled schema node.
#[derive(Debug)]
pub struct SchemaNode {
    pub qname: QName,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub config: bool,
    pub status: Status,
    pub mandatory: bool,
    pub description: Option<SmolStr>,
    pub reference: Option<SmolStr>,
    pub when: Vec<Rc<SchemaWhen>>,
    pub musts: Vec<SchemaMust>,
    pub exts: Vec<SchemaExt>,
    pub kind: SchemaNodeKind,
}

impl SchemaNode {
    pub fn is_case(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::Case)
    }

    pub fn is_presence_container(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::Container { presence: true, .. })
    }

    /// Type of a leaf or leaf-list node.
    pub fn node_type(&self) -> Option<&Rc<SchemaType>> {
        match &self.kind {
            SchemaNodeKind::Leaf { ty, .. } | SchemaNodeKind::LeafList { ty, .. } => Some(ty),
            _ => None,
        }
    }
}

/// A compiled identity with its inheritance links.
#[derive(Debug)]
pub struct Identity {
    pub qname: QName,
    pub bases: Vec<IdentityId>,
    /// Identities directly derived from this one; back-filled while
    /// compiling derived identities, own module or importers alike.
    pub derived: Vec<IdentityId>,
    pub status: Status,
    pub exts: Vec<SchemaExt>,
}

/// A compiled feature with its resolved enablement.
#[derive(Debug)]
pub struct Feature {
    pub name: Name,
    pub enabled: bool,
    pub status: Status,
    pub exts: Vec<SchemaExt>,
}

/// The compiled half of one module.
#[derive(Debug, Default)]
pub struct SchemaModule {
    pub data: Vec<NodeId>,
    pub rpcs: Vec<NodeId>,
    pub notifications: Vec<NodeId>,
    pub identities: Vec<IdentityId>,
    pub features: Vec<Feature>,
    pub exts: Vec<SchemaExt>,
}

/// Arena of compiled nodes and identities for one context.
#[derive(Debug, Default)]
pub struct SchemaPool {
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) identities: Vec<Identity>,
}

impl SchemaPool {
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.index()]
    }

    pub fn identity(&self, id: IdentityId) -> &Identity {
        &self.identities[id.index()]
    }

    /// Chain of ancestors from the node's parent to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.node(id).parent;
        std::iter::from_fn(move || {
            let id = current?;
            current = self.node(id).parent;
            Some(id)
        })
    }

    /// Pre-order traversal of the subtree rooted at `id`, root included.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![id];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            let node = self.node(next);
            stack.extend(node.children.iter().rev().copied());
            Some(next)
        })
    }

    /// Whether `base` is among `id`'s bases, directly or transitively.
    pub fn is_derived_from(&self, id: IdentityId, base: IdentityId) -> bool {
        let mut stack: Vec<IdentityId> = self.identity(id).bases.clone();
        while let Some(current) = stack.pop() {
            if current == base {
                return true;
            }
            stack.extend(self.identity(current).bases.iter().copied());
        }
        false
    }

    /// All identities derived from `base`, transitively.
    pub fn derived_from_set(&self, base: IdentityId) -> Vec<IdentityId> {
        let mut out = Vec::new();
        let mut stack: Vec<IdentityId> = self.identity(base).derived.clone();
        while let Some(current) = stack.pop() {
            if out.contains(&current) {
                continue;
            }
            out.push(current);
            stack.extend(self.identity(current).derived.iter().copied());
        }
        out
    }
}
