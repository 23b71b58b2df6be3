//! Generic YANG statement tree.
//!
//! Both the YANG reader and the YIN reader produce this representation: an
//! ordered tree of statements carrying verbatim arguments. It is lossless with
//! respect to statement order and extension instances, which is what the
//! printers round-trip. The typed parsed module is built from it afterwards.

use smol_str::SmolStr;

use crate::base::Span;

/// One parsed statement: keyword, optional argument, ordered substatements.
#[derive(Debug, Clone)]
pub struct Statement {
    pub keyword: Keyword,
    pub arg: Option<SmolStr>,
    pub substmts: Vec<Statement>,
    pub span: Span,
    /// How an extension instance carries its argument in YIN. Recorded by the
    /// YIN reader and back-filled from the extension definition during
    /// compilation for modules parsed from YANG text.
    pub ext_arg: Option<ExtArgSyntax>,
}

/// Statement equality is structural: spans are layout, not content, and two
/// renderings of the same module must compare equal.
impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.keyword == other.keyword
            && self.arg == other.arg
            && self.ext_arg == other.ext_arg
            && self.substmts == other.substmts
    }
}

impl Eq for Statement {}

/// Argument syntax of an extension instance in YIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtArgSyntax {
    /// Attribute or element name carrying the argument.
    pub name: SmolStr,
    /// True when the argument is a child element rather than an attribute.
    pub yin_element: bool,
}

impl Statement {
    pub fn new(keyword: Keyword, span: Span) -> Self {
        Self {
            keyword,
            arg: None,
            substmts: Vec::new(),
            span,
            ext_arg: None,
        }
    }

    /// First substatement with the given core keyword.
    pub fn find(&self, kw: CoreStmt) -> Option<&Statement> {
        self.substmts
            .iter()
            .find(|s| s.keyword == Keyword::Core(kw))
    }

    /// Argument of the first substatement with the given keyword.
    pub fn find_arg(&self, kw: CoreStmt) -> Option<&SmolStr> {
        self.find(kw).and_then(|s| s.arg.as_ref())
    }

    /// All substatements with the given core keyword, in source order.
    pub fn all(&self, kw: CoreStmt) -> impl Iterator<Item = &Statement> {
        self.substmts
            .iter()
            .filter(move |s| s.keyword == Keyword::Core(kw))
    }

    /// All extension-instance substatements, in source order.
    pub fn extensions(&self) -> impl Iterator<Item = &Statement> {
        self.substmts
            .iter()
            .filter(|s| matches!(s.keyword, Keyword::Extension { .. }))
    }

    pub fn is_extension(&self) -> bool {
        matches!(self.keyword, Keyword::Extension { .. })
    }
}

/// Statement keyword: a core YANG statement or a prefixed extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Core(CoreStmt),
    Extension { prefix: SmolStr, name: SmolStr },
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Keyword::Core(kw) => f.write_str(kw.as_str()),
            Keyword::Extension { prefix, name } => write!(f, "{prefix}:{name}"),
        }
    }
}

macro_rules! core_statements {
    ($( $variant:ident => $text:literal ),+ $(,)?) => {
        /// Core YANG statement keywords (RFC 7950).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CoreStmt {
            $( $variant, )+
        }

        impl CoreStmt {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( CoreStmt::$variant => $text, )+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s {
                    $( $text => Some(CoreStmt::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

core_statements! {
    Action => "action",
    Anydata => "anydata",
    Anyxml => "anyxml",
    Argument => "argument",
    Augment => "augment",
    Base => "base",
    BelongsTo => "belongs-to",
    Bit => "bit",
    Case => "case",
    Choice => "choice",
    Config => "config",
    Contact => "contact",
    Container => "container",
    Default => "default",
    Description => "description",
    Enum => "enum",
    ErrorAppTag => "error-app-tag",
    ErrorMessage => "error-message",
    Extension => "extension",
    Feature => "feature",
    FractionDigits => "fraction-digits",
    Grouping => "grouping",
    Identity => "identity",
    IfFeature => "if-feature",
    Import => "import",
    Include => "include",
    Input => "input",
    Key => "key",
    Leaf => "leaf",
    LeafList => "leaf-list",
    Length => "length",
    List => "list",
    Mandatory => "mandatory",
    MaxElements => "max-elements",
    MinElements => "min-elements",
    Modifier => "modifier",
    Module => "module",
    Must => "must",
    Namespace => "namespace",
    Notification => "notification",
    OrderedBy => "ordered-by",
    Organization => "organization",
    Output => "output",
    Path => "path",
    Pattern => "pattern",
    Position => "position",
    Prefix => "prefix",
    Presence => "presence",
    Range => "range",
    Reference => "reference",
    Refine => "refine",
    RequireInstance => "require-instance",
    Revision => "revision",
    RevisionDate => "revision-date",
    Rpc => "rpc",
    Status => "status",
    Submodule => "submodule",
    Type => "type",
    Typedef => "typedef",
    Unique => "unique",
    Units => "units",
    Uses => "uses",
    Value => "value",
    When => "when",
    YangVersion => "yang-version",
    YinElement => "yin-element",
}

impl CoreStmt {
    /// YIN argument mapping: attribute/element name carrying the argument and
    /// whether the argument is a child element (RFC 7950 section 13).
    /// `None` for argument-less statements (`input`, `output`).
    pub fn yin_arg(&self) -> Option<(&'static str, bool)> {
        use CoreStmt::*;
        Some(match self {
            Action | Anydata | Anyxml | Argument | Base | Bit | Case | Choice | Container
            | Enum | Extension | Feature | Grouping | Identity | IfFeature | Leaf | LeafList
            | List | Module | Notification | Rpc | Submodule | Type | Typedef | Uses => {
                ("name", false)
            }
            Units => ("name", false),
            Augment | Refine => ("target-node", false),
            BelongsTo | Import | Include => ("module", false),
            Config | Default | ErrorAppTag | FractionDigits | Key | Length | Mandatory
            | MaxElements | MinElements | Modifier | OrderedBy | Path | Pattern | Position
            | Prefix | Presence | Range | RequireInstance | Status | Value | YangVersion
            | YinElement => ("value", false),
            Contact | Description | Organization | Reference => ("text", true),
            ErrorMessage => ("value", true),
            Must | When => ("condition", false),
            Namespace => ("uri", false),
            Revision | RevisionDate => ("date", false),
            Unique => ("tag", false),
            Input | Output => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_text_round_trips() {
        for kw in [
            CoreStmt::LeafList,
            CoreStmt::FractionDigits,
            CoreStmt::BelongsTo,
            CoreStmt::YinElement,
        ] {
            assert_eq!(CoreStmt::from_str(kw.as_str()), Some(kw));
        }
        assert_eq!(CoreStmt::from_str("no-such-stmt"), None);
    }

    #[test]
    fn yin_arg_table_spot_checks() {
        assert_eq!(CoreStmt::Namespace.yin_arg(), Some(("uri", false)));
        assert_eq!(CoreStmt::Description.yin_arg(), Some(("text", true)));
        assert_eq!(CoreStmt::ErrorMessage.yin_arg(), Some(("value", true)));
        assert_eq!(CoreStmt::Input.yin_arg(), None);
        assert_eq!(CoreStmt::Augment.yin_arg(), Some(("target-node", false)));
    }
}
