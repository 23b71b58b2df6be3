//! Schema compiler: transforms parsed modules into the compiled tree.
//!
//! The compile context owns scratch arenas for everything the pass creates;
//! on success they are published into the context pool in one step, on error
//! they are dropped and the few in-place edits of already-published state
//! (augment child insertions, identity derived-from back-fill, mandatory
//! propagation into foreign containers) are undone from a recorded log. A
//! failed compilation leaves the context usable.

mod augment;
mod node;
mod types;
mod unres;
mod uses;
mod when;

use std::collections::VecDeque;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::debug;

use crate::base::Name;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::schema::compiled::{
    Feature, Identity, IdentityId, ModuleId, NodeId, QName, SchemaExt, SchemaModule,
    SchemaNode, SchemaPool,
};
use crate::schema::features::FeatureExpr;
use crate::schema::parsed::{
    ExtensionInstance, ParsedGrouping, ParsedModule, ParsedTypedef, Status,
};

/// Work items the primary pass could not complete.
#[derive(Debug)]
pub(crate) enum Unresolved {
    /// Resolve a leafref path and realize the target's type.
    Leafref { node: NodeId },
    /// Close an identityref's permitted-identity set under derived-from.
    IdentityrefPermitted { node: NodeId },
    /// Type-check the default(s) of a leaf or leaf-list.
    LeafDefault { node: NodeId },
    /// Resolve a choice default to one of its cases.
    ChoiceDefault { choice: NodeId, name: SmolStr },
    /// Apply a module-level augment whose target lives in another module.
    RemoteAugment { index: usize },
    /// Resolve `unique` arguments to descendant leaves.
    Unique { list: NodeId, args: Vec<SmolStr> },
}

/// Reversible edits applied to already-published state.
#[derive(Debug)]
pub(crate) enum UndoAction {
    /// A child id was pushed onto a published node.
    ChildAdded { parent: NodeId },
    /// A derived link was pushed onto a published identity.
    DerivedAdded { identity: IdentityId },
    /// Mandatory propagation reached a published container; previous flag
    /// and descendant count.
    MandatoryChanged {
        node: NodeId,
        mandatory: bool,
        count: u32,
    },
}

/// Lexical scope frame for typedef and grouping lookups. Frames chain from
/// the node outward to the module; each knows the module whose prefixes are
/// in effect, so grouping bodies expanded across modules resolve names in
/// their definition context.
#[derive(Clone, Copy)]
pub(crate) struct ScopeFrame<'a> {
    pub typedefs: &'a [ParsedTypedef],
    pub groupings: &'a [ParsedGrouping],
    pub module: usize,
    pub parent: Option<&'a ScopeFrame<'a>>,
}

impl<'a> ScopeFrame<'a> {
    pub fn module_root(world: &'a [Rc<ParsedModule>], module: usize) -> Self {
        ScopeFrame {
            typedefs: &world[module].typedefs,
            groupings: &world[module].groupings,
            module,
            parent: None,
        }
    }

    pub fn push(
        &'a self,
        typedefs: &'a [ParsedTypedef],
        groupings: &'a [ParsedGrouping],
    ) -> ScopeFrame<'a> {
        ScopeFrame {
            typedefs,
            groupings,
            module: self.module,
            parent: Some(self),
        }
    }

    /// Innermost typedef with the given name, with the frame it was found in.
    pub fn find_typedef(&self, name: &str) -> Option<(&'a ParsedTypedef, ScopeFrame<'a>)> {
        let mut frame = Some(*self);
        while let Some(f) = frame {
            if let Some(td) = f.typedefs.iter().find(|t| &*t.name == name) {
                return Some((td, f));
            }
            frame = f.parent.copied();
        }
        None
    }

    /// Innermost grouping with the given name, with the frame it was found in.
    pub fn find_grouping(&self, name: &str) -> Option<(&'a ParsedGrouping, ScopeFrame<'a>)> {
        let mut frame = Some(*self);
        while let Some(f) = frame {
            if let Some(g) = f.groupings.iter().find(|g| &*g.name == name) {
                return Some((g, f));
            }
            frame = f.parent.copied();
        }
        None
    }
}

/// Compile context for one module.
pub(crate) struct CompileCtx<'w, 'c> {
    pub ctx: &'c mut Context,
    /// Parsed form of every module in the context, target included.
    pub world: &'w [Rc<ParsedModule>],
    pub target: usize,
    pub parsed: Rc<ParsedModule>,

    node_base: usize,
    ident_base: usize,
    pub new_nodes: Vec<SchemaNode>,
    pub new_identities: Vec<Identity>,

    pub features: Vec<Feature>,
    pub data: Vec<NodeId>,
    pub rpcs: Vec<NodeId>,
    pub notifications: Vec<NodeId>,
    pub module_identities: Vec<IdentityId>,
    pub module_exts: Vec<SchemaExt>,

    pub deferred: VecDeque<Unresolved>,
    pub undo: Vec<UndoAction>,
    /// Groupings already expanded at least once, by address of the parsed
    /// definition.
    pub used_groupings: FxHashSet<usize>,
    /// Compiled-typedef cache: typedef address to (type, units, default).
    /// Doubles as the sharing pool for unrestricted derived types.
    pub type_memo: rustc_hash::FxHashMap<usize, (Rc<crate::schema::compiled::SchemaType>, Option<SmolStr>, Option<SmolStr>)>,
    /// Typedefs on the current resolution path, for cycle detection.
    pub typedef_stack: Vec<usize>,
    /// Groupings on the current expansion path, for cycle detection.
    pub grouping_stack: Vec<usize>,
}

impl<'w, 'c> CompileCtx<'w, 'c> {
    fn new(ctx: &'c mut Context, world: &'w [Rc<ParsedModule>], target: usize) -> Self {
        let node_base = ctx.pool.nodes.len();
        let ident_base = ctx.pool.identities.len();
        let parsed = Rc::clone(&world[target]);
        CompileCtx {
            ctx,
            world,
            target,
            parsed,
            node_base,
            ident_base,
            new_nodes: Vec::new(),
            new_identities: Vec::new(),
            features: Vec::new(),
            data: Vec::new(),
            rpcs: Vec::new(),
            notifications: Vec::new(),
            module_identities: Vec::new(),
            module_exts: Vec::new(),
            deferred: VecDeque::new(),
            undo: Vec::new(),
            used_groupings: FxHashSet::default(),
            type_memo: rustc_hash::FxHashMap::default(),
            typedef_stack: Vec::new(),
            grouping_stack: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Arena access across the published/scratch boundary
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        if id.index() < self.node_base {
            &self.ctx.pool.nodes[id.index()]
        } else {
            &self.new_nodes[id.index() - self.node_base]
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        if id.index() < self.node_base {
            &mut self.ctx.pool.nodes[id.index()]
        } else {
            &mut self.new_nodes[id.index() - self.node_base]
        }
    }

    pub fn is_published_node(&self, id: NodeId) -> bool {
        id.index() < self.node_base
    }

    pub fn alloc_node(&mut self, node: SchemaNode) -> NodeId {
        let id = NodeId((self.node_base + self.new_nodes.len()) as u32);
        self.new_nodes.push(node);
        id
    }

    pub fn identity(&self, id: IdentityId) -> &Identity {
        if id.index() < self.ident_base {
            &self.ctx.pool.identities[id.index()]
        } else {
            &self.new_identities[id.index() - self.ident_base]
        }
    }

    pub fn identity_mut(&mut self, id: IdentityId) -> &mut Identity {
        if id.index() < self.ident_base {
            &mut self.ctx.pool.identities[id.index()]
        } else {
            &mut self.new_identities[id.index() - self.ident_base]
        }
    }

    pub fn alloc_identity(&mut self, identity: Identity) -> IdentityId {
        let id = IdentityId((self.ident_base + self.new_identities.len()) as u32);
        self.new_identities.push(identity);
        id
    }

    // ------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------

    pub fn intern(&mut self, s: &str) -> Name {
        self.ctx.interner.intern(s)
    }

    /// Module index for a prefix as seen from `within`. `None` prefix means
    /// the module itself.
    pub fn resolve_prefix(&self, within: usize, prefix: Option<&str>) -> Result<usize> {
        let module = &self.world[within];
        let Some(prefix) = prefix else {
            return Ok(within);
        };
        if module.prefix.as_deref() == Some(prefix) {
            return Ok(within);
        }
        let import = module.import_by_prefix(prefix).ok_or_else(|| {
            Error::not_found("prefix", prefix.to_string())
        })?;
        self.ctx
            .module_index(&import.module)
            .ok_or_else(|| Error::not_found("module", import.module.to_string()))
    }

    /// Identity by (module, name), scratch identities of the target included.
    pub fn find_identity(&self, module: usize, name: &str) -> Option<IdentityId> {
        if module == self.target {
            for (offset, ident) in self.new_identities.iter().enumerate() {
                if &*ident.qname.name == name {
                    return Some(IdentityId((self.ident_base + offset) as u32));
                }
            }
        }
        self.ctx
            .identity_lookup
            .get(&(module as u32, SmolStr::new(name)))
            .copied()
    }

    /// Whether a feature, possibly in another module, is enabled.
    pub fn feature_enabled(&self, module: usize, name: &str) -> Result<bool> {
        if module == self.target {
            return self
                .features
                .iter()
                .find(|f| &*f.name == name)
                .map(|f| f.enabled)
                .ok_or_else(|| Error::not_found("feature", name.to_string()));
        }
        let compiled = self.ctx.modules[module]
            .compiled
            .as_ref()
            .ok_or_else(|| Error::not_found("feature", name.to_string()))?;
        compiled
            .features
            .iter()
            .find(|f| &*f.name == name)
            .map(|f| f.enabled)
            .ok_or_else(|| Error::not_found("feature", name.to_string()))
    }

    /// Evaluate an `if-feature` predicate in the prefix context of
    /// `def_module`.
    pub fn if_feature_satisfied(&self, def_module: usize, exprs: &[SmolStr]) -> Result<bool> {
        for text in exprs {
            let expr = FeatureExpr::parse(text)?;
            let ok = expr.eval(&mut |prefix, name| {
                let module = self.resolve_prefix(def_module, prefix)?;
                self.feature_enabled(module, name)
            })?;
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Compile extension instances, resolving their definitions through the
    /// prefix map of `def_module`.
    pub fn compile_exts(
        &mut self,
        exts: &[ExtensionInstance],
        def_module: usize,
    ) -> Result<Vec<SchemaExt>> {
        let mut out = Vec::with_capacity(exts.len());
        for ext in exts {
            let module = self.resolve_prefix(def_module, Some(&ext.prefix))?;
            let def = self.world[module]
                .extensions
                .iter()
                .find(|d| *d.name == *ext.name)
                .ok_or_else(|| {
                    Error::not_found("extension", format!("{}:{}", ext.prefix, ext.name))
                })?;
            match (&def.argument, &ext.arg) {
                (Some(_), None) => {
                    return Err(Error::validation(
                        "missing-extension-argument",
                        format!("extension '{}:{}' requires an argument", ext.prefix, ext.name),
                    ));
                }
                (None, Some(_)) => {
                    return Err(Error::validation(
                        "unexpected-extension-argument",
                        format!("extension '{}:{}' takes no argument", ext.prefix, ext.name),
                    ));
                }
                _ => {}
            }
            let name = self.intern(&ext.name);
            let children = self.compile_exts(&ext.children, def_module)?;
            out.push(SchemaExt {
                def_module: ModuleId(module as u32),
                name,
                arg: ext.arg.clone(),
                children,
            });
        }
        Ok(out)
    }

    /// Schema path of a compiled node, for diagnostics.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            let node = self.node(cid);
            parts.push(format!(
                "{}:{}",
                self.ctx.modules[node.qname.module.0 as usize].prefix_str(),
                node.qname.name
            ));
            current = node.parent;
        }
        let mut path = String::new();
        for part in parts.iter().rev() {
            path.push('/');
            path.push_str(part);
        }
        path
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.ctx.cancelled.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    pub fn target_module_id(&self) -> ModuleId {
        ModuleId(self.target as u32)
    }

    // ------------------------------------------------------------------
    // Pass orchestration
    // ------------------------------------------------------------------

    fn run(&mut self) -> Result<()> {
        debug!(module = &*self.parsed.name, "compiling module");
        self.check_cancelled()?;
        self.compile_features()?;
        self.compile_identities()?;
        let module_exts = self.parsed.exts.clone();
        self.module_exts = self.compile_exts(&module_exts, self.target)?;

        // Data nodes, rpcs and notifications, in source order.
        let parsed = Rc::clone(&self.parsed);
        let root = ScopeFrame::module_root(self.world, self.target);
        for pnode in &parsed.data {
            self.check_cancelled()?;
            self.compile_node(pnode, None, None, &root, None)?;
        }

        // Module-level augments: local targets now, foreign targets deferred.
        for (index, aug) in parsed.augments.iter().enumerate() {
            self.check_cancelled()?;
            if self.augment_is_local(aug)? {
                self.apply_augment(aug, &root)?;
            } else {
                self.deferred.push_back(Unresolved::RemoteAugment { index });
            }
        }

        // Self-check groupings never expanded; results are discarded.
        self.check_unused_groupings(&parsed, &root)?;

        self.resolve_deferred()?;
        Ok(())
    }

    fn compile_features(&mut self) -> Result<()> {
        let parsed = Rc::clone(&self.parsed);
        let enabled_names: Vec<SmolStr> = self
            .ctx
            .enabled
            .get(&*parsed.name)
            .cloned()
            .unwrap_or_default();

        // Resolve enablement to a fixed point over the module's own
        // features; if-feature references between them may point forward.
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unknown,
            Enabled,
            Disabled,
        }
        let mut states = vec![State::Unknown; parsed.features.len()];
        let mut remaining = parsed.features.len();
        while remaining > 0 {
            let mut progressed = false;
            for (i, feature) in parsed.features.iter().enumerate() {
                if states[i] != State::Unknown {
                    continue;
                }
                if !enabled_names.iter().any(|n| n.as_str() == &*feature.name) {
                    states[i] = State::Disabled;
                    remaining -= 1;
                    progressed = true;
                    continue;
                }
                // User-enabled: the if-feature predicate decides.
                let mut unresolved = false;
                let mut value = true;
                for text in &feature.if_features {
                    let expr = FeatureExpr::parse(text)?;
                    let result = expr.eval(&mut |prefix, name| {
                        let module = self.resolve_prefix(self.target, prefix)?;
                        if module == self.target {
                            let Some(j) =
                                parsed.features.iter().position(|f| &*f.name == name)
                            else {
                                return Err(Error::not_found("feature", name.to_string()));
                            };
                            return match states[j] {
                                State::Unknown => Err(Error::validation(
                                    "feature-pending",
                                    name.to_string(),
                                )),
                                State::Enabled => Ok(true),
                                State::Disabled => Ok(false),
                            };
                        }
                        self.feature_enabled(module, name)
                    });
                    match result {
                        Ok(v) => value = value && v,
                        Err(Error::Validation {
                            code: "feature-pending",
                            ..
                        }) => {
                            unresolved = true;
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                if unresolved {
                    continue;
                }
                states[i] = if value { State::Enabled } else { State::Disabled };
                remaining -= 1;
                progressed = true;
            }
            if !progressed {
                let stuck: Vec<_> = parsed
                    .features
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| states[*i] == State::Unknown)
                    .map(|(_, f)| f.name.to_string())
                    .collect();
                return Err(Error::cycle("if-feature", stuck.join(", ")));
            }
        }

        for (i, feature) in parsed.features.iter().enumerate() {
            let exts = self.compile_exts(&feature.exts, self.target)?;
            self.features.push(Feature {
                name: Rc::clone(&feature.name),
                enabled: states[i] == State::Enabled,
                status: feature.status.unwrap_or_default(),
                exts,
            });
        }
        Ok(())
    }

    fn compile_identities(&mut self) -> Result<()> {
        let parsed = Rc::clone(&self.parsed);
        let module_id = self.target_module_id();

        // First pass creates the identities so bases can point forward.
        let mut created = Vec::new();
        for identity in &parsed.identities {
            if !self.if_feature_satisfied(self.target, &identity.if_features)? {
                continue;
            }
            let qname = QName {
                module: module_id,
                name: Rc::clone(&identity.name),
            };
            let exts = self.compile_exts(&identity.exts, self.target)?;
            let id = self.alloc_identity(Identity {
                qname,
                bases: Vec::new(),
                derived: Vec::new(),
                status: identity.status.unwrap_or_default(),
                exts,
            });
            created.push((id, identity));
        }

        // Second pass resolves bases and back-fills derived links.
        for (id, identity) in &created {
            for base_ref in &identity.bases {
                let module =
                    self.resolve_prefix(self.target, base_ref.prefix.as_deref())?;
                let base = self.find_identity(module, &base_ref.name).ok_or_else(|| {
                    Error::not_found("identity", base_ref.name.to_string())
                })?;
                self.identity_mut(*id).bases.push(base);
                if base.index() < self.ident_base {
                    self.undo.push(UndoAction::DerivedAdded { identity: base });
                }
                self.identity_mut(base).derived.push(*id);
            }
        }

        // Cycles through bases are forbidden.
        for (id, identity) in &created {
            if self.identity_base_cycle(*id) {
                return Err(Error::cycle("identity base", identity.name.to_string()));
            }
            self.module_identities.push(*id);
        }
        Ok(())
    }

    fn identity_base_cycle(&self, start: IdentityId) -> bool {
        let mut stack: Vec<IdentityId> = self.identity(start).bases.clone();
        let mut seen = FxHashSet::default();
        while let Some(current) = stack.pop() {
            if current == start {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.identity(current).bases.iter().copied());
            }
        }
        false
    }
}

/// Compile one module. Imports must already be compiled; the caller
/// guarantees ordering and cycle detection over the import graph.
pub(crate) fn compile_module(ctx: &mut Context, target: usize) -> Result<()> {
    if ctx.modules[target].compiled.is_some() || ctx.modules[target].parsed.is_submodule {
        return Ok(());
    }
    let world: Vec<Rc<ParsedModule>> =
        ctx.modules.iter().map(|m| Rc::clone(&m.parsed)).collect();

    let mut cc = CompileCtx::new(ctx, &world, target);
    match cc.run() {
        Ok(()) => {
            let CompileCtx {
                ctx,
                new_nodes,
                new_identities,
                features,
                data,
                rpcs,
                notifications,
                module_identities,
                module_exts,
                ..
            } = cc;
            ctx.pool.nodes.extend(new_nodes);
            for ident in new_identities {
                let id = IdentityId(ctx.pool.identities.len() as u32);
                let key = (target as u32, SmolStr::new(&*ident.qname.name));
                ctx.identity_lookup.insert(key, id);
                ctx.pool.identities.push(ident);
            }
            ctx.modules[target].compiled = Some(SchemaModule {
                data,
                rpcs,
                notifications,
                identities: module_identities,
                features,
                exts: module_exts,
            });
            debug!(module = ctx.modules[target].name_str(), "module compiled");
            Ok(())
        }
        Err(err) => {
            let CompileCtx { ctx, undo, .. } = cc;
            rollback(&mut ctx.pool, undo);
            Err(err)
        }
    }
}

fn rollback(pool: &mut SchemaPool, undo: Vec<UndoAction>) {
    for action in undo.into_iter().rev() {
        match action {
            UndoAction::ChildAdded { parent } => {
                pool.nodes[parent.index()].children.pop();
            }
            UndoAction::DerivedAdded { identity } => {
                pool.identities[identity.index()].derived.pop();
            }
            UndoAction::MandatoryChanged {
                node,
                mandatory,
                count,
            } => {
                let restored = &mut pool.nodes[node.index()];
                restored.mandatory = mandatory;
                if let crate::schema::compiled::SchemaNodeKind::Container {
                    mandatory_children,
                    ..
                } = &mut restored.kind
                {
                    *mandatory_children = count;
                }
            }
        }
    }
}

/// Effective status resolution: explicit wins, then the status inherited
/// from a surrounding uses, then the parent's.
pub(crate) fn effective_status(
    explicit: Option<Status>,
    uses_status: Option<Status>,
    parent: Option<Status>,
) -> Status {
    explicit
        .or(uses_status)
        .or(parent)
        .unwrap_or_default()
}
