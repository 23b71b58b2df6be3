//! Grouping expansion: `uses`, `refine`, and the unused-grouping self-check.
//!
//! A `uses` clones the grouping's parsed children, applies each `refine` to
//! the clone, and compiles the result in the grouping's definition scope with
//! the uses' status flowing in. Expanded nodes belong to the using module; a
//! `when` on the uses attaches, shared, to every top-level expanded node.

use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::schema::compiled::{NodeId, SchemaNode, SchemaNodeKind, QName};
use crate::schema::parsed::{
    ParsedGrouping, ParsedModule, ParsedNode, ParsedNodeBody, ParsedRefine, Status,
};

use super::{CompileCtx, ScopeFrame};

impl<'w> CompileCtx<'w, '_> {
    /// Expand a `uses` node in place of itself.
    pub fn expand_uses<'a>(
        &mut self,
        pnode: &ParsedNode,
        parent: Option<NodeId>,
        uses_status: Option<Status>,
        scope: &'a ScopeFrame<'a>,
        mut child_set: Option<&mut Vec<NodeId>>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        let ParsedNodeBody::Uses { refines, augments } = &pnode.body else {
            return Err(Error::Internal("expand_uses on a non-uses node".into()));
        };

        let (grouping, def_frame) = self.resolve_grouping(&pnode.name, scope)?;
        let key = grouping as *const ParsedGrouping as usize;
        if self.grouping_stack.contains(&key) {
            return Err(Error::cycle("grouping", pnode.name.to_string()));
        }
        self.used_groupings.insert(key);
        trace!(uses = &*pnode.name, "expanding grouping");

        // Structural copy of the grouping body, refined before compilation.
        let mut children: Vec<ParsedNode> = grouping.children.clone();
        for refine in refines {
            apply_refine(&mut children, refine)?;
        }

        let status = pnode.status.or(uses_status);
        let gframe = def_frame.push(&grouping.typedefs, &grouping.groupings);
        let mut expanded: Vec<NodeId> = Vec::new();
        self.grouping_stack.push(key);
        let result = children.iter().try_for_each(|child| {
            self.compile_node(child, parent, status, &gframe, Some(&mut expanded))
                .map(drop)
        });
        self.grouping_stack.pop();
        result?;

        // Augments inside the uses re-target into the fresh expansion.
        for aug in augments {
            self.apply_uses_augment(aug, &expanded, scope.module)?;
        }

        // A when on the uses guards every expanded top-level node, shared.
        if let Some(when) = &pnode.when {
            let mut memo = None;
            for id in &expanded {
                let compiled = self.compile_when_shared(when, scope.module, parent, &mut memo)?;
                self.node_mut(*id).when.push(compiled);
            }
        }

        if let Some(set) = child_set.as_mut() {
            set.extend(expanded.iter().copied());
        }
        Ok(())
    }

    /// Nested-first grouping lookup; cross-module via the import map.
    fn resolve_grouping<'a>(
        &self,
        name: &str,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<(&'a ParsedGrouping, ScopeFrame<'a>)>
    where
        'w: 'a,
    {
        let (prefix, local) = match name.split_once(':') {
            Some((p, n)) => (Some(p), n),
            None => (None, name),
        };
        let module = self.resolve_prefix(scope.module, prefix)?;
        if module == scope.module {
            return scope
                .find_grouping(local)
                .ok_or_else(|| Error::not_found("grouping", name.to_string()));
        }
        let foreign = ScopeFrame::module_root(self.world, module);
        self.world[module]
            .groupings
            .iter()
            .find(|g| &*g.name == local)
            .map(|g| (g, foreign))
            .ok_or_else(|| Error::not_found("grouping", name.to_string()))
    }

    /// Compile every grouping that was never expanded into a throwaway
    /// subtree, so that defective bodies fail the module even when unused.
    /// Nothing of the scratch compilation survives.
    pub fn check_unused_groupings<'a>(
        &mut self,
        parsed: &'a Rc<ParsedModule>,
        root: &'a ScopeFrame<'a>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        for grouping in &parsed.groupings {
            self.check_grouping(grouping, root)?;
        }
        for node in &parsed.data {
            self.check_node_groupings(node, root)?;
        }
        Ok(())
    }

    fn check_node_groupings<'a>(
        &mut self,
        pnode: &'a ParsedNode,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        let typedefs = pnode.body.typedefs();
        let groupings = pnode.body.groupings();
        let inner = scope.push(typedefs, groupings);
        for grouping in groupings {
            self.check_grouping(grouping, &inner)?;
        }
        for child in pnode.body.children() {
            self.check_node_groupings(child, &inner)?;
        }
        if let ParsedNodeBody::Rpc { input, output, .. } = &pnode.body {
            for io in [input, output].into_iter().flatten() {
                self.check_node_groupings(io, &inner)?;
            }
        }
        Ok(())
    }

    fn check_grouping<'a>(
        &mut self,
        grouping: &'a ParsedGrouping,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        let key = grouping as *const ParsedGrouping as usize;
        if self.used_groupings.contains(&key) {
            return Ok(());
        }
        trace!(grouping = &*grouping.name, "self-checking unused grouping");

        let mark_nodes = self.new_nodes.len();
        let mark_deferred = self.deferred.len();
        let mark_undo = self.undo.len();

        // Scratch parent keeps the body out of the real module roots.
        let host = self.alloc_node(SchemaNode {
            qname: QName {
                module: self.target_module_id(),
                name: Rc::clone(&grouping.name),
            },
            parent: None,
            children: Vec::new(),
            config: true,
            status: Status::Current,
            mandatory: false,
            description: None,
            reference: None,
            when: Vec::new(),
            musts: Vec::new(),
            exts: Vec::new(),
            kind: SchemaNodeKind::Container {
                presence: true,
                mandatory_children: 0,
            },
        });
        let gframe = scope.push(&grouping.typedefs, &grouping.groupings);
        self.grouping_stack.push(key);
        let result = grouping.children.iter().try_for_each(|child| {
            self.compile_node(child, Some(host), None, &gframe, None).map(drop)
        });
        self.grouping_stack.pop();

        // Discard the throwaway subtree and anything it queued; undo any
        // leak into published state.
        self.new_nodes.truncate(mark_nodes);
        self.deferred.truncate(mark_deferred);
        while self.undo.len() > mark_undo {
            if let Some(action) = self.undo.pop() {
                match action {
                    super::UndoAction::ChildAdded { parent } => {
                        self.ctx.pool.nodes[parent.index()].children.pop();
                    }
                    super::UndoAction::DerivedAdded { identity } => {
                        self.ctx.pool.identities[identity.index()].derived.pop();
                    }
                    super::UndoAction::MandatoryChanged {
                        node,
                        mandatory,
                        count,
                    } => {
                        let restored = &mut self.ctx.pool.nodes[node.index()];
                        restored.mandatory = mandatory;
                        if let SchemaNodeKind::Container {
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
        result?;

        // Nested groupings of an unused grouping get the same treatment.
        for nested in &grouping.groupings {
            self.check_grouping(nested, &gframe)?;
        }
        Ok(())
    }
}

/// Apply one refine to the cloned grouping children. Only the statements of
/// YANG 1.1 Table 17 are accepted, each on the node kinds that carry them.
fn apply_refine(children: &mut Vec<ParsedNode>, refine: &ParsedRefine) -> Result<()> {
    let target = find_target(children, &refine.target).ok_or_else(|| {
        Error::not_found("refine target", refine.target.to_string())
    })?;
    let target_kind = target.body.kind_name();

    if let Some(d) = &refine.description {
        target.description = Some(d.clone());
    }
    if let Some(r) = &refine.reference {
        target.reference = Some(r.clone());
    }
    if let Some(c) = refine.config {
        target.config = Some(c);
    }
    target.if_features.extend(refine.if_features.iter().cloned());
    if !refine.musts.is_empty() {
        match &target.body {
            ParsedNodeBody::Container { .. }
            | ParsedNodeBody::Leaf { .. }
            | ParsedNodeBody::LeafList { .. }
            | ParsedNodeBody::List { .. }
            | ParsedNodeBody::Anyxml { .. }
            | ParsedNodeBody::Anydata { .. } => {
                target.musts.extend(refine.musts.iter().cloned());
            }
            _ => return Err(illegal(refine, target_kind, "must")),
        }
    }
    if let Some(p) = &refine.presence {
        match &mut target.body {
            ParsedNodeBody::Container { presence, .. } => *presence = Some(p.clone()),
            _ => return Err(illegal(refine, target_kind, "presence")),
        }
    }
    if let Some(m) = refine.mandatory {
        match &mut target.body {
            ParsedNodeBody::Leaf { mandatory, .. }
            | ParsedNodeBody::Anyxml { mandatory }
            | ParsedNodeBody::Anydata { mandatory }
            | ParsedNodeBody::Choice { mandatory, .. } => *mandatory = Some(m),
            _ => return Err(illegal(refine, target_kind, "mandatory")),
        }
    }
    if !refine.defaults.is_empty() {
        match &mut target.body {
            ParsedNodeBody::Leaf { default, .. } => {
                if refine.defaults.len() > 1 {
                    return Err(Error::validation(
                        "refine-multiple-defaults",
                        format!("refine of leaf '{}' has multiple defaults", target.name),
                    ));
                }
                *default = Some(refine.defaults[0].clone());
            }
            ParsedNodeBody::LeafList { defaults, .. } => {
                *defaults = refine.defaults.clone();
            }
            ParsedNodeBody::Choice { default, .. } => {
                if refine.defaults.len() > 1 {
                    return Err(Error::validation(
                        "refine-multiple-defaults",
                        format!("refine of choice '{}' has multiple defaults", target.name),
                    ));
                }
                *default = Some(refine.defaults[0].clone());
            }
            _ => return Err(illegal(refine, target_kind, "default")),
        }
    }
    if let Some(min) = refine.min_elements {
        match &mut target.body {
            ParsedNodeBody::LeafList { min_elements, .. }
            | ParsedNodeBody::List { min_elements, .. } => *min_elements = Some(min),
            _ => return Err(illegal(refine, target_kind, "min-elements")),
        }
    }
    if let Some(max) = refine.max_elements {
        match &mut target.body {
            ParsedNodeBody::LeafList { max_elements, .. }
            | ParsedNodeBody::List { max_elements, .. } => *max_elements = Some(max),
            _ => return Err(illegal(refine, target_kind, "max-elements")),
        }
    }
    Ok(())
}

fn illegal(refine: &ParsedRefine, target_kind: &str, stmt: &str) -> Error {
    Error::validation(
        "invalid-refine",
        format!(
            "refine '{}' applies '{stmt}' to a {target_kind}",
            refine.target
        ),
    )
}

/// Walk a descendant schema path through the cloned children. Prefixes are
/// ignored: the clone is entirely within one namespace.
fn find_target<'a>(
    children: &'a mut Vec<ParsedNode>,
    path: &str,
) -> Option<&'a mut ParsedNode> {
    let local = |s: &str| s.split_once(':').map(|(_, n)| n.to_string()).unwrap_or(s.to_string());
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let first = local(segments.next()?);
    let mut node = children.iter_mut().find(|c| *c.name == *first)?;
    for segment in segments {
        let name = local(segment);
        let kids = node.body.children_mut()?;
        node = kids.iter_mut().find(|c| *c.name == *name)?;
    }
    Some(node)
}
