//! Builds the typed parsed module (P-tree) from the generic statement tree.
//!
//! Performs the structural checks that do not need cross-module knowledge:
//! statement cardinality, argument syntax of numbers and booleans, and the
//! required module header. Reference resolution is the compiler's job.

use smol_str::SmolStr;

use super::statement::{CoreStmt, Keyword, Statement};
use super::yin::YinNamespace;
use crate::base::Interner;
use crate::error::{Error, Result};
use crate::schema::parsed::*;

/// Build a [`ParsedModule`] from a `module`/`submodule` statement.
pub fn build_module(
    stmt: &Statement,
    yin_namespaces: Vec<YinNamespace>,
    interner: &mut Interner,
) -> Result<ParsedModule> {
    let mut b = Builder { interner };
    b.module(stmt, yin_namespaces)
}

struct Builder<'a> {
    interner: &'a mut Interner,
}

impl Builder<'_> {
    fn module(
        &mut self,
        stmt: &Statement,
        yin_namespaces: Vec<YinNamespace>,
    ) -> Result<ParsedModule> {
        let is_submodule = stmt.keyword == Keyword::Core(CoreStmt::Submodule);
        let name = self.name_arg(stmt)?;

        let mut module = ParsedModule {
            name,
            is_submodule,
            yang_version: YangVersion::V1,
            namespace: None,
            prefix: None,
            belongs_to: None,
            imports: Vec::new(),
            includes: Vec::new(),
            revisions: Vec::new(),
            organization: None,
            contact: None,
            description: None,
            reference: None,
            features: Vec::new(),
            identities: Vec::new(),
            typedefs: Vec::new(),
            groupings: Vec::new(),
            extensions: Vec::new(),
            augments: Vec::new(),
            data: Vec::new(),
            exts: collect_exts(stmt),
            yin_namespaces,
            span: stmt.span,
        };

        for sub in &stmt.substmts {
            let kw = match &sub.keyword {
                Keyword::Core(kw) => *kw,
                Keyword::Extension { .. } => continue,
            };
            match kw {
                CoreStmt::YangVersion => {
                    module.yang_version = match arg(sub)?.as_str() {
                        "1" => YangVersion::V1,
                        "1.1" => YangVersion::V1_1,
                        other => {
                            return Err(Error::parse(
                                format!("unsupported yang-version '{other}'"),
                                sub.span,
                            ));
                        }
                    };
                }
                CoreStmt::Namespace => module.namespace = Some(arg(sub)?),
                CoreStmt::Prefix => module.prefix = Some(self.intern(&arg(sub)?)),
                CoreStmt::BelongsTo => {
                    module.belongs_to = Some(self.intern(&arg(sub)?));
                    if let Some(p) = sub.find_arg(CoreStmt::Prefix) {
                        module.prefix = Some(self.intern(p));
                    }
                }
                CoreStmt::Import => module.imports.push(self.import(sub)?),
                CoreStmt::Include => module.includes.push(self.include(sub)?),
                CoreStmt::Revision => module.revisions.push(ParsedRevision {
                    date: arg(sub)?,
                    description: sub.find_arg(CoreStmt::Description).cloned(),
                    reference: sub.find_arg(CoreStmt::Reference).cloned(),
                    exts: collect_exts(sub),
                }),
                CoreStmt::Organization => module.organization = Some(arg(sub)?),
                CoreStmt::Contact => module.contact = Some(arg(sub)?),
                CoreStmt::Description => module.description = Some(arg(sub)?),
                CoreStmt::Reference => module.reference = Some(arg(sub)?),
                CoreStmt::Feature => module.features.push(self.feature(sub)?),
                CoreStmt::Identity => module.identities.push(self.identity(sub)?),
                CoreStmt::Typedef => module.typedefs.push(self.typedef(sub)?),
                CoreStmt::Grouping => module.groupings.push(self.grouping(sub)?),
                CoreStmt::Extension => module.extensions.push(self.extension_def(sub)?),
                CoreStmt::Augment => module.augments.push(self.augment(sub)?),
                CoreStmt::Container
                | CoreStmt::Leaf
                | CoreStmt::LeafList
                | CoreStmt::List
                | CoreStmt::Choice
                | CoreStmt::Anyxml
                | CoreStmt::Anydata
                | CoreStmt::Uses
                | CoreStmt::Rpc
                | CoreStmt::Notification => module.data.push(self.node(sub)?),
                other => {
                    return Err(Error::parse(
                        format!("statement '{}' not allowed at module level", other.as_str()),
                        sub.span,
                    ));
                }
            }
        }

        if !is_submodule {
            if module.namespace.is_none() {
                return Err(Error::parse("module is missing 'namespace'", stmt.span));
            }
            if module.prefix.is_none() {
                return Err(Error::parse("module is missing 'prefix'", stmt.span));
            }
        } else if module.belongs_to.is_none() {
            return Err(Error::parse("submodule is missing 'belongs-to'", stmt.span));
        }
        Ok(module)
    }

    fn import(&mut self, stmt: &Statement) -> Result<ParsedImport> {
        let prefix = stmt.find_arg(CoreStmt::Prefix).ok_or_else(|| {
            Error::parse("import is missing 'prefix'", stmt.span)
        })?;
        Ok(ParsedImport {
            module: self.name_arg(stmt)?,
            prefix: self.intern(prefix),
            revision: stmt.find_arg(CoreStmt::RevisionDate).cloned(),
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn include(&mut self, stmt: &Statement) -> Result<ParsedInclude> {
        Ok(ParsedInclude {
            module: self.name_arg(stmt)?,
            revision: stmt.find_arg(CoreStmt::RevisionDate).cloned(),
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn feature(&mut self, stmt: &Statement) -> Result<ParsedFeature> {
        Ok(ParsedFeature {
            name: self.name_arg(stmt)?,
            if_features: if_features(stmt),
            status: status(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn identity(&mut self, stmt: &Statement) -> Result<ParsedIdentity> {
        Ok(ParsedIdentity {
            name: self.name_arg(stmt)?,
            bases: stmt
                .all(CoreStmt::Base)
                .map(|b| Ok(prefixed_name(&arg(b)?)))
                .collect::<Result<_>>()?,
            if_features: if_features(stmt),
            status: status(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn typedef(&mut self, stmt: &Statement) -> Result<ParsedTypedef> {
        let ty_stmt = stmt.find(CoreStmt::Type).ok_or_else(|| {
            Error::parse("typedef is missing 'type'", stmt.span)
        })?;
        Ok(ParsedTypedef {
            name: self.name_arg(stmt)?,
            ty: self.type_ref(ty_stmt)?,
            units: stmt.find_arg(CoreStmt::Units).cloned(),
            default: stmt.find_arg(CoreStmt::Default).cloned(),
            status: status(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn grouping(&mut self, stmt: &Statement) -> Result<ParsedGrouping> {
        let mut typedefs = Vec::new();
        let mut groupings = Vec::new();
        let mut children = Vec::new();
        self.body_items(stmt, &mut typedefs, &mut groupings, &mut children)?;
        Ok(ParsedGrouping {
            name: self.name_arg(stmt)?,
            status: status(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            typedefs,
            groupings,
            children,
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn extension_def(&mut self, stmt: &Statement) -> Result<ParsedExtensionDef> {
        let argument = match stmt.find(CoreStmt::Argument) {
            Some(a) => {
                let yin_element = a
                    .find_arg(CoreStmt::YinElement)
                    .map(|v| v == "true")
                    .unwrap_or(false);
                Some((arg(a)?, yin_element))
            }
            None => None,
        };
        Ok(ParsedExtensionDef {
            name: self.name_arg(stmt)?,
            argument,
            status: status(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn augment(&mut self, stmt: &Statement) -> Result<ParsedAugment> {
        let mut children = Vec::new();
        for sub in &stmt.substmts {
            if let Keyword::Core(kw) = &sub.keyword {
                if is_data_keyword(*kw) || *kw == CoreStmt::Case {
                    children.push(self.node(sub)?);
                }
            }
        }
        Ok(ParsedAugment {
            target: arg(stmt)?,
            status: status(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            when: self.when(stmt)?,
            if_features: if_features(stmt),
            children,
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    fn when(&mut self, stmt: &Statement) -> Result<Option<ParsedWhen>> {
        Ok(match stmt.find(CoreStmt::When) {
            Some(w) => Some(ParsedWhen {
                condition: arg(w)?,
                description: w.find_arg(CoreStmt::Description).cloned(),
                reference: w.find_arg(CoreStmt::Reference).cloned(),
                exts: collect_exts(w),
                span: w.span,
            }),
            None => None,
        })
    }

    fn musts(&mut self, stmt: &Statement) -> Result<Vec<ParsedMust>> {
        stmt.all(CoreStmt::Must)
            .map(|m| {
                Ok(ParsedMust {
                    condition: arg(m)?,
                    error_message: m.find_arg(CoreStmt::ErrorMessage).cloned(),
                    error_app_tag: m.find_arg(CoreStmt::ErrorAppTag).cloned(),
                    description: m.find_arg(CoreStmt::Description).cloned(),
                    reference: m.find_arg(CoreStmt::Reference).cloned(),
                    exts: collect_exts(m),
                    span: m.span,
                })
            })
            .collect()
    }

    fn type_ref(&mut self, stmt: &Statement) -> Result<ParsedType> {
        let full = arg(stmt)?;
        let PrefixedName { prefix, name } = prefixed_name(&full);

        let restriction = |r: &Statement| -> Result<ParsedRestriction> {
            Ok(ParsedRestriction {
                expr: arg(r)?,
                error_message: r.find_arg(CoreStmt::ErrorMessage).cloned(),
                error_app_tag: r.find_arg(CoreStmt::ErrorAppTag).cloned(),
                description: r.find_arg(CoreStmt::Description).cloned(),
                reference: r.find_arg(CoreStmt::Reference).cloned(),
                exts: collect_exts(r),
                span: r.span,
            })
        };

        let mut ty = ParsedType {
            prefix,
            name,
            range: stmt.find(CoreStmt::Range).map(&restriction).transpose()?,
            length: stmt.find(CoreStmt::Length).map(&restriction).transpose()?,
            patterns: Vec::new(),
            enums: Vec::new(),
            bits: Vec::new(),
            fraction_digits: stmt
                .find(CoreStmt::FractionDigits)
                .map(|f| parse_number::<u8>(f, "fraction-digits"))
                .transpose()?,
            path: stmt.find_arg(CoreStmt::Path).cloned(),
            require_instance: stmt
                .find(CoreStmt::RequireInstance)
                .map(|r| parse_bool(r))
                .transpose()?,
            bases: stmt
                .all(CoreStmt::Base)
                .map(|b| Ok(prefixed_name(&arg(b)?)))
                .collect::<Result<_>>()?,
            union_types: stmt
                .all(CoreStmt::Type)
                .map(|t| self.type_ref(t))
                .collect::<Result<_>>()?,
            exts: collect_exts(stmt),
            span: stmt.span,
        };

        for p in stmt.all(CoreStmt::Pattern) {
            // Syntax check only; the compiled handle is built with the type.
            crate::schema::pattern::check(&arg(p)?).map_err(|e| e.with_span(p.span))?;
            let invert_match = match p.find_arg(CoreStmt::Modifier) {
                Some(m) if m == "invert-match" => true,
                Some(m) => {
                    return Err(Error::parse(
                        format!("unknown pattern modifier '{m}'"),
                        p.span,
                    ));
                }
                None => false,
            };
            ty.patterns.push(ParsedPattern {
                pattern: arg(p)?,
                invert_match,
                error_message: p.find_arg(CoreStmt::ErrorMessage).cloned(),
                error_app_tag: p.find_arg(CoreStmt::ErrorAppTag).cloned(),
                description: p.find_arg(CoreStmt::Description).cloned(),
                reference: p.find_arg(CoreStmt::Reference).cloned(),
                exts: collect_exts(p),
                span: p.span,
            });
        }
        for e in stmt.all(CoreStmt::Enum) {
            ty.enums.push(ParsedEnum {
                name: arg(e)?,
                value: e
                    .find(CoreStmt::Value)
                    .map(|v| parse_number::<i64>(v, "value"))
                    .transpose()?,
                if_features: if_features(e),
                status: status(e)?,
                description: e.find_arg(CoreStmt::Description).cloned(),
                reference: e.find_arg(CoreStmt::Reference).cloned(),
                exts: collect_exts(e),
                span: e.span,
            });
        }
        for b in stmt.all(CoreStmt::Bit) {
            ty.bits.push(ParsedBit {
                name: arg(b)?,
                position: b
                    .find(CoreStmt::Position)
                    .map(|p| parse_number::<u32>(p, "position"))
                    .transpose()?,
                if_features: if_features(b),
                status: status(b)?,
                description: b.find_arg(CoreStmt::Description).cloned(),
                reference: b.find_arg(CoreStmt::Reference).cloned(),
                exts: collect_exts(b),
                span: b.span,
            });
        }
        Ok(ty)
    }

    /// Shared scaffolding for data-node statements.
    fn node(&mut self, stmt: &Statement) -> Result<ParsedNode> {
        let kw = match &stmt.keyword {
            Keyword::Core(kw) => *kw,
            Keyword::Extension { .. } => {
                return Err(Error::Internal(
                    "extension instance passed to node builder".into(),
                ));
            }
        };
        let name = match kw {
            CoreStmt::Input => self.intern("input"),
            CoreStmt::Output => self.intern("output"),
            _ => self.name_arg(stmt)?,
        };
        let body = self.node_body(kw, stmt)?;
        Ok(ParsedNode {
            name,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            status: status(stmt)?,
            config: stmt
                .find(CoreStmt::Config)
                .map(|c| parse_bool(c))
                .transpose()?,
            when: self.when(stmt)?,
            if_features: if_features(stmt),
            musts: self.musts(stmt)?,
            exts: collect_exts(stmt),
            body,
            span: stmt.span,
        })
    }

    fn node_body(&mut self, kw: CoreStmt, stmt: &Statement) -> Result<ParsedNodeBody> {
        let mandatory = stmt
            .find(CoreStmt::Mandatory)
            .map(|m| parse_bool(m))
            .transpose()?;
        Ok(match kw {
            CoreStmt::Container => {
                let mut typedefs = Vec::new();
                let mut groupings = Vec::new();
                let mut children = Vec::new();
                self.body_items(stmt, &mut typedefs, &mut groupings, &mut children)?;
                ParsedNodeBody::Container {
                    presence: stmt.find_arg(CoreStmt::Presence).cloned(),
                    typedefs,
                    groupings,
                    children,
                }
            }
            CoreStmt::Leaf => ParsedNodeBody::Leaf {
                ty: self.required_type(stmt)?,
                units: stmt.find_arg(CoreStmt::Units).cloned(),
                default: stmt.find_arg(CoreStmt::Default).cloned(),
                mandatory,
            },
            CoreStmt::LeafList => ParsedNodeBody::LeafList {
                ty: self.required_type(stmt)?,
                units: stmt.find_arg(CoreStmt::Units).cloned(),
                defaults: stmt
                    .all(CoreStmt::Default)
                    .map(|d| arg(d))
                    .collect::<Result<_>>()?,
                min_elements: stmt
                    .find(CoreStmt::MinElements)
                    .map(|m| parse_number::<u32>(m, "min-elements"))
                    .transpose()?,
                max_elements: stmt
                    .find(CoreStmt::MaxElements)
                    .map(parse_max_elements)
                    .transpose()?,
                ordered_by: ordered_by(stmt)?,
            },
            CoreStmt::List => {
                let mut typedefs = Vec::new();
                let mut groupings = Vec::new();
                let mut children = Vec::new();
                self.body_items(stmt, &mut typedefs, &mut groupings, &mut children)?;
                ParsedNodeBody::List {
                    key: stmt.find_arg(CoreStmt::Key).cloned(),
                    uniques: stmt
                        .all(CoreStmt::Unique)
                        .map(|u| arg(u))
                        .collect::<Result<_>>()?,
                    min_elements: stmt
                        .find(CoreStmt::MinElements)
                        .map(|m| parse_number::<u32>(m, "min-elements"))
                        .transpose()?,
                    max_elements: stmt
                        .find(CoreStmt::MaxElements)
                        .map(parse_max_elements)
                        .transpose()?,
                    ordered_by: ordered_by(stmt)?,
                    typedefs,
                    groupings,
                    children,
                }
            }
            CoreStmt::Choice => {
                let mut children = Vec::new();
                for sub in &stmt.substmts {
                    if let Keyword::Core(k) = &sub.keyword {
                        if *k == CoreStmt::Case || is_short_case_keyword(*k) {
                            children.push(self.node(sub)?);
                        }
                    }
                }
                ParsedNodeBody::Choice {
                    default: stmt.find_arg(CoreStmt::Default).cloned(),
                    mandatory,
                    children,
                }
            }
            CoreStmt::Case => {
                let mut children = Vec::new();
                for sub in &stmt.substmts {
                    if let Keyword::Core(k) = &sub.keyword {
                        if is_data_keyword(*k) {
                            children.push(self.node(sub)?);
                        }
                    }
                }
                ParsedNodeBody::Case { children }
            }
            CoreStmt::Anyxml => ParsedNodeBody::Anyxml { mandatory },
            CoreStmt::Anydata => ParsedNodeBody::Anydata { mandatory },
            CoreStmt::Uses => {
                let mut refines = Vec::new();
                for r in stmt.all(CoreStmt::Refine) {
                    refines.push(self.refine(r)?);
                }
                let mut augments = Vec::new();
                for a in stmt.all(CoreStmt::Augment) {
                    augments.push(self.augment(a)?);
                }
                ParsedNodeBody::Uses { refines, augments }
            }
            CoreStmt::Rpc | CoreStmt::Action => {
                let mut typedefs = Vec::new();
                let mut groupings = Vec::new();
                for t in stmt.all(CoreStmt::Typedef) {
                    typedefs.push(self.typedef(t)?);
                }
                for g in stmt.all(CoreStmt::Grouping) {
                    groupings.push(self.grouping(g)?);
                }
                let input = stmt
                    .find(CoreStmt::Input)
                    .map(|i| self.node(i))
                    .transpose()?
                    .map(Box::new);
                let output = stmt
                    .find(CoreStmt::Output)
                    .map(|o| self.node(o))
                    .transpose()?
                    .map(Box::new);
                ParsedNodeBody::Rpc {
                    is_action: kw == CoreStmt::Action,
                    typedefs,
                    groupings,
                    input,
                    output,
                }
            }
            CoreStmt::Notification => {
                let mut typedefs = Vec::new();
                let mut groupings = Vec::new();
                let mut children = Vec::new();
                self.body_items(stmt, &mut typedefs, &mut groupings, &mut children)?;
                ParsedNodeBody::Notification {
                    typedefs,
                    groupings,
                    children,
                }
            }
            CoreStmt::Input | CoreStmt::Output => {
                let mut typedefs = Vec::new();
                let mut groupings = Vec::new();
                let mut children = Vec::new();
                self.body_items(stmt, &mut typedefs, &mut groupings, &mut children)?;
                ParsedNodeBody::RpcIo {
                    output: kw == CoreStmt::Output,
                    typedefs,
                    groupings,
                    children,
                }
            }
            other => {
                return Err(Error::parse(
                    format!("'{}' is not a schema node statement", other.as_str()),
                    stmt.span,
                ));
            }
        })
    }

    fn refine(&mut self, stmt: &Statement) -> Result<ParsedRefine> {
        Ok(ParsedRefine {
            target: arg(stmt)?,
            description: stmt.find_arg(CoreStmt::Description).cloned(),
            reference: stmt.find_arg(CoreStmt::Reference).cloned(),
            config: stmt
                .find(CoreStmt::Config)
                .map(|c| parse_bool(c))
                .transpose()?,
            mandatory: stmt
                .find(CoreStmt::Mandatory)
                .map(|m| parse_bool(m))
                .transpose()?,
            presence: stmt.find_arg(CoreStmt::Presence).cloned(),
            defaults: stmt
                .all(CoreStmt::Default)
                .map(|d| arg(d))
                .collect::<Result<_>>()?,
            musts: self.musts(stmt)?,
            min_elements: stmt
                .find(CoreStmt::MinElements)
                .map(|m| parse_number::<u32>(m, "min-elements"))
                .transpose()?,
            max_elements: stmt
                .find(CoreStmt::MaxElements)
                .map(parse_max_elements)
                .transpose()?,
            if_features: if_features(stmt),
            exts: collect_exts(stmt),
            span: stmt.span,
        })
    }

    /// Collect typedefs, groupings and data children of a block statement.
    fn body_items(
        &mut self,
        stmt: &Statement,
        typedefs: &mut Vec<ParsedTypedef>,
        groupings: &mut Vec<ParsedGrouping>,
        children: &mut Vec<ParsedNode>,
    ) -> Result<()> {
        for sub in &stmt.substmts {
            if let Keyword::Core(kw) = &sub.keyword {
                match kw {
                    CoreStmt::Typedef => typedefs.push(self.typedef(sub)?),
                    CoreStmt::Grouping => groupings.push(self.grouping(sub)?),
                    kw if is_data_keyword(*kw) => children.push(self.node(sub)?),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn required_type(&mut self, stmt: &Statement) -> Result<ParsedType> {
        let ty = stmt.find(CoreStmt::Type).ok_or_else(|| {
            Error::parse(
                format!(
                    "'{}' is missing its 'type' statement",
                    stmt.arg.as_deref().unwrap_or_default()
                ),
                stmt.span,
            )
        })?;
        self.type_ref(ty)
    }

    fn name_arg(&mut self, stmt: &Statement) -> Result<crate::base::Name> {
        Ok(self.intern(&arg(stmt)?))
    }

    fn intern(&mut self, s: &str) -> crate::base::Name {
        self.interner.intern(s)
    }
}

// ============================================================================
// Free helpers
// ============================================================================

fn arg(stmt: &Statement) -> Result<SmolStr> {
    stmt.arg.clone().ok_or_else(|| {
        Error::parse(
            format!("'{}' is missing its argument", stmt.keyword),
            stmt.span,
        )
    })
}

fn prefixed_name(s: &str) -> PrefixedName {
    match s.split_once(':') {
        Some((p, n)) => PrefixedName {
            prefix: Some(SmolStr::new(p)),
            name: SmolStr::new(n),
        },
        None => PrefixedName {
            prefix: None,
            name: SmolStr::new(s),
        },
    }
}

fn if_features(stmt: &Statement) -> Vec<SmolStr> {
    stmt.all(CoreStmt::IfFeature)
        .filter_map(|f| f.arg.clone())
        .collect()
}

fn status(stmt: &Statement) -> Result<Option<Status>> {
    match stmt.find(CoreStmt::Status) {
        None => Ok(None),
        Some(s) => match arg(s)?.as_str() {
            "current" => Ok(Some(Status::Current)),
            "deprecated" => Ok(Some(Status::Deprecated)),
            "obsolete" => Ok(Some(Status::Obsolete)),
            other => Err(Error::parse(
                format!("invalid status '{other}'"),
                s.span,
            )),
        },
    }
}

fn parse_bool(stmt: &Statement) -> Result<bool> {
    match arg(stmt)?.as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::parse(
            format!("'{}' expects 'true' or 'false', found '{other}'", stmt.keyword),
            stmt.span,
        )),
    }
}

fn parse_number<T: std::str::FromStr>(stmt: &Statement, what: &str) -> Result<T> {
    let text = arg(stmt)?;
    text.parse().map_err(|_| {
        Error::parse(
            format!("invalid {what} value '{text}'"),
            stmt.span,
        )
    })
}

fn parse_max_elements(stmt: &Statement) -> Result<MaxElements> {
    let text = arg(stmt)?;
    if text == "unbounded" {
        return Ok(MaxElements::Unbounded);
    }
    text.parse()
        .map(MaxElements::Limited)
        .map_err(|_| Error::parse(format!("invalid max-elements value '{text}'"), stmt.span))
}

fn ordered_by(stmt: &Statement) -> Result<Option<OrderedBy>> {
    match stmt.find(CoreStmt::OrderedBy) {
        None => Ok(None),
        Some(o) => match arg(o)?.as_str() {
            "system" => Ok(Some(OrderedBy::System)),
            "user" => Ok(Some(OrderedBy::User)),
            other => Err(Error::parse(
                format!("invalid ordered-by '{other}'"),
                o.span,
            )),
        },
    }
}

fn is_data_keyword(kw: CoreStmt) -> bool {
    matches!(
        kw,
        CoreStmt::Container
            | CoreStmt::Leaf
            | CoreStmt::LeafList
            | CoreStmt::List
            | CoreStmt::Choice
            | CoreStmt::Case
            | CoreStmt::Anyxml
            | CoreStmt::Anydata
            | CoreStmt::Uses
            | CoreStmt::Action
            | CoreStmt::Notification
    )
}

/// Choice children that are implicitly wrapped in a case of the same name.
fn is_short_case_keyword(kw: CoreStmt) -> bool {
    matches!(
        kw,
        CoreStmt::Container
            | CoreStmt::Leaf
            | CoreStmt::LeafList
            | CoreStmt::List
            | CoreStmt::Choice
            | CoreStmt::Anyxml
            | CoreStmt::Anydata
    )
}

/// Extension instances of a statement, nested extensions included.
fn collect_exts(stmt: &Statement) -> Vec<ExtensionInstance> {
    stmt.substmts
        .iter()
        .filter_map(|s| match &s.keyword {
            Keyword::Extension { prefix, name } => Some(ExtensionInstance {
                prefix: prefix.clone(),
                name: name.clone(),
                arg: s.arg.clone(),
                children: collect_exts(s),
                span: s.span,
            }),
            Keyword::Core(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::yang;

    fn build(text: &str) -> ParsedModule {
        let stmt = yang::parse(text).unwrap();
        let mut interner = Interner::new();
        build_module(&stmt, Vec::new(), &mut interner).unwrap()
    }

    #[test]
    fn builds_header_and_data() {
        let m = build(
            "module m { namespace \"urn:m\"; prefix m; \
             import other { prefix o; } \
             leaf l { type string; mandatory true; } }",
        );
        assert_eq!(&*m.name, "m");
        assert_eq!(m.imports.len(), 1);
        assert_eq!(&*m.imports[0].prefix, "o");
        assert_eq!(m.data.len(), 1);
        match &m.data[0].body {
            ParsedNodeBody::Leaf { ty, mandatory, .. } => {
                assert_eq!(ty.name, "string");
                assert_eq!(*mandatory, Some(true));
            }
            other => panic!("expected leaf, got {}", other.kind_name()),
        }
    }

    #[test]
    fn builds_typedef_chain_inputs() {
        let m = build(
            "module m { namespace \"urn:m\"; prefix m; \
             typedef t { type int32 { range \"1..10\"; } units meter; default 5; } }",
        );
        assert_eq!(m.typedefs.len(), 1);
        let td = &m.typedefs[0];
        assert_eq!(td.units.as_deref(), Some("meter"));
        assert_eq!(td.default.as_deref(), Some("5"));
        assert_eq!(td.ty.range.as_ref().unwrap().expr, "1..10");
    }

    #[test]
    fn uses_with_refine_and_augment() {
        let m = build(
            "module m { namespace \"urn:m\"; prefix m; \
             grouping g { container c; leaf l { type int8; } } \
             uses g { refine c { presence p; config false; } \
                      augment c { leaf a { type int8; } } } }",
        );
        assert_eq!(m.groupings.len(), 1);
        match &m.data[0].body {
            ParsedNodeBody::Uses { refines, augments } => {
                assert_eq!(refines.len(), 1);
                assert_eq!(refines[0].presence.as_deref(), Some("p"));
                assert_eq!(refines[0].config, Some(false));
                assert_eq!(augments.len(), 1);
                assert_eq!(augments[0].children.len(), 1);
            }
            other => panic!("expected uses, got {}", other.kind_name()),
        }
    }

    #[test]
    fn choice_keeps_short_cases() {
        let m = build(
            "module m { namespace \"urn:m\"; prefix m; \
             choice ch { default a; case a { leaf c { type string; } } leaf b { type int8; } } }",
        );
        match &m.data[0].body {
            ParsedNodeBody::Choice { default, children, .. } => {
                assert_eq!(default.as_deref(), Some("a"));
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected choice, got {}", other.kind_name()),
        }
    }

    #[test]
    fn extension_instances_preserved_in_order() {
        let m = build(
            "module m { namespace \"urn:m\"; prefix m; \
             e:a; e:b \"one\"; \
             container c { presence test { e:a; e:c \"one\"; } } }",
        );
        assert_eq!(m.exts.len(), 2);
        assert_eq!(m.exts[0].name, "a");
        assert_eq!(m.exts[1].arg.as_deref(), Some("one"));
    }

    #[test]
    fn rpc_with_input_output() {
        let m = build(
            "module m { namespace \"urn:m\"; prefix m; \
             rpc r { input { leaf i { type string; } } output { leaf o { type string; } } } }",
        );
        match &m.data[0].body {
            ParsedNodeBody::Rpc { input, output, .. } => {
                assert!(input.is_some());
                assert!(output.is_some());
            }
            other => panic!("expected rpc, got {}", other.kind_name()),
        }
    }
}
