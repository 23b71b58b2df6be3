//! Node compilation: dispatch over parsed-node kinds.
//!
//! Allocates the compiled node, wires parent/sibling links, resolves flag
//! inheritance and delegates to the type, when/must and uses machinery.
//! Mandatory propagation into non-presence container parents happens here as
//! nodes are emitted.

use std::rc::Rc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::schema::compiled::{
    NodeId, QName, SchemaNode, SchemaNodeKind,
};
use crate::schema::parsed::{
    MaxElements, OrderedBy, ParsedNode, ParsedNodeBody, Status,
};

use super::{CompileCtx, ScopeFrame, Unresolved, effective_status};

impl<'w> CompileCtx<'w, '_> {
    /// Compile one parsed node under `parent` (`None` for module roots).
    ///
    /// `uses_status` carries the effective status of a surrounding `uses` so
    /// expanded nodes inherit it when they carry none themselves. Returns the
    /// new node id, or `None` when the node was pruned (disabled feature) or
    /// expanded in place (`uses`).
    pub fn compile_node<'a>(
        &mut self,
        pnode: &'a ParsedNode,
        parent: Option<NodeId>,
        uses_status: Option<Status>,
        scope: &'a ScopeFrame<'a>,
        mut child_set: Option<&mut Vec<NodeId>>,
    ) -> Result<Option<NodeId>>
    where
        'w: 'a,
    {
        if !self.if_feature_satisfied(scope.module, &pnode.if_features)? {
            trace!(node = &*pnode.name, "pruned by if-feature");
            return Ok(None);
        }

        if let ParsedNodeBody::Uses { .. } = &pnode.body {
            self.expand_uses(pnode, parent, uses_status, scope, child_set)?;
            return Ok(None);
        }

        let config = self.effective_config(pnode, parent)?;
        let parent_status = parent.map(|p| self.node(p).status);
        let status = effective_status(pnode.status, uses_status, parent_status);

        let kind = self.initial_kind(pnode, scope, config)?;
        let mandatory = initial_mandatory(pnode, &kind);

        let qname = QName {
            module: self.target_module_id(),
            name: Rc::clone(&pnode.name),
        };
        let exts = self.compile_exts(&pnode.exts, scope.module)?;
        let musts = self.compile_musts(&pnode.musts, scope.module)?;
        let node = SchemaNode {
            qname,
            parent,
            children: Vec::new(),
            config,
            status,
            mandatory,
            description: pnode.description.clone(),
            reference: pnode.reference.clone(),
            when: Vec::new(),
            musts,
            exts,
            kind,
        };
        let id = self.alloc_node(node);
        self.link_child(parent, id, pnode)?;
        if let Some(set) = child_set.as_mut() {
            set.push(id);
        }

        if let Some(when) = &pnode.when {
            let compiled = self.compile_when(when, scope.module, None)?;
            self.node_mut(id).when.push(compiled);
        }

        self.compile_node_children(pnode, id, scope)?;
        self.finish_node(pnode, id)?;

        if mandatory {
            self.propagate_mandatory_parents(parent, true);
        }
        Ok(Some(id))
    }

    /// Kind payload known before children exist.
    fn initial_kind<'a>(
        &mut self,
        pnode: &'a ParsedNode,
        scope: &'a ScopeFrame<'a>,
        config: bool,
    ) -> Result<SchemaNodeKind>
    where
        'w: 'a,
    {
        Ok(match &pnode.body {
            ParsedNodeBody::Container { presence, .. } => SchemaNodeKind::Container {
                presence: presence.is_some(),
                mandatory_children: 0,
            },
            ParsedNodeBody::Leaf {
                ty,
                units,
                default,
                mandatory,
            } => {
                let (compiled, inherited_units, inherited_default) =
                    self.compile_type(ty, scope, &pnode.name)?;
                let default = default.clone().or(inherited_default);
                if default.is_some() && *mandatory == Some(true) {
                    return Err(Error::validation(
                        "mandatory-default",
                        format!("leaf '{}' is mandatory and has a default", pnode.name),
                    ));
                }
                SchemaNodeKind::Leaf {
                    ty: compiled,
                    units: units.clone().or(inherited_units),
                    default,
                }
            }
            ParsedNodeBody::LeafList {
                ty,
                units,
                defaults,
                min_elements,
                max_elements,
                ordered_by,
            } => {
                let (compiled, inherited_units, inherited_default) =
                    self.compile_type(ty, scope, &pnode.name)?;
                let defaults = if defaults.is_empty() {
                    inherited_default.into_iter().collect()
                } else {
                    defaults.clone()
                };
                if defaults.len() > 1
                    && self.world[scope.module].yang_version
                        == crate::schema::parsed::YangVersion::V1
                {
                    return Err(Error::validation(
                        "leaflist-multiple-defaults",
                        format!(
                            "leaf-list '{}' has multiple defaults, allowed since YANG 1.1",
                            pnode.name
                        ),
                    ));
                }
                let min = min_elements.unwrap_or(0);
                if !defaults.is_empty() && min > 0 {
                    return Err(Error::validation(
                        "default-with-min-elements",
                        format!(
                            "leaf-list '{}' has defaults and non-zero min-elements",
                            pnode.name
                        ),
                    ));
                }
                SchemaNodeKind::LeafList {
                    ty: compiled,
                    units: units.clone().or(inherited_units),
                    defaults,
                    min_elements: min,
                    max_elements: max_elements.unwrap_or(MaxElements::Unbounded),
                    ordered_by_user: *ordered_by == Some(OrderedBy::User) && config,
                }
            }
            ParsedNodeBody::List {
                min_elements,
                max_elements,
                ordered_by,
                ..
            } => SchemaNodeKind::List {
                keys: Vec::new(),
                uniques: Vec::new(),
                min_elements: min_elements.unwrap_or(0),
                max_elements: max_elements.unwrap_or(MaxElements::Unbounded),
                ordered_by_user: *ordered_by == Some(OrderedBy::User) && config,
            },
            ParsedNodeBody::Choice {
                default, mandatory, ..
            } => {
                if default.is_some() && *mandatory == Some(true) {
                    return Err(Error::validation(
                        "mandatory-choice-default",
                        format!("choice '{}' is mandatory and has a default case", pnode.name),
                    ));
                }
                SchemaNodeKind::Choice { default_case: None }
            }
            ParsedNodeBody::Case { .. } => SchemaNodeKind::Case,
            ParsedNodeBody::Anyxml { .. } => SchemaNodeKind::AnyXml,
            ParsedNodeBody::Anydata { .. } => SchemaNodeKind::AnyData,
            ParsedNodeBody::Rpc { is_action, .. } => {
                if *is_action {
                    SchemaNodeKind::Action
                } else {
                    SchemaNodeKind::Rpc
                }
            }
            ParsedNodeBody::Notification { .. } => SchemaNodeKind::Notification,
            ParsedNodeBody::RpcIo { output, .. } => {
                if *output {
                    SchemaNodeKind::Output
                } else {
                    SchemaNodeKind::Input
                }
            }
            ParsedNodeBody::Uses { .. } => {
                return Err(Error::Internal("uses reached kind dispatch".into()));
            }
        })
    }

    fn compile_node_children<'a>(
        &mut self,
        pnode: &'a ParsedNode,
        id: NodeId,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        match &pnode.body {
            ParsedNodeBody::Container {
                typedefs,
                groupings,
                children,
                ..
            }
            | ParsedNodeBody::List {
                typedefs,
                groupings,
                children,
                ..
            }
            | ParsedNodeBody::Notification {
                typedefs,
                groupings,
                children,
            }
            | ParsedNodeBody::RpcIo {
                typedefs,
                groupings,
                children,
                ..
            } => {
                let inner = scope.push(typedefs, groupings);
                for child in children {
                    self.compile_node(child, Some(id), None, &inner, None)?;
                }
            }
            ParsedNodeBody::Choice { children, .. } => {
                for child in children {
                    self.compile_choice_child(child, id, None, scope, None)?;
                }
            }
            ParsedNodeBody::Case { children } => {
                for child in children {
                    self.compile_node(child, Some(id), None, scope, None)?;
                }
            }
            ParsedNodeBody::Rpc {
                typedefs,
                groupings,
                input,
                output,
                ..
            } => {
                let inner = scope.push(typedefs, groupings);
                // Input and output exist even when implicit, as augment
                // targets and for symmetric traversal.
                match input {
                    Some(io) => {
                        self.compile_node(io, Some(id), None, &inner, None)?;
                    }
                    None => self.implicit_io(id, false),
                }
                match output {
                    Some(io) => {
                        self.compile_node(io, Some(id), None, &inner, None)?;
                    }
                    None => self.implicit_io(id, true),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn implicit_io(&mut self, rpc: NodeId, output: bool) {
        let name = self.intern(if output { "output" } else { "input" });
        let status = self.node(rpc).status;
        let node = SchemaNode {
            qname: QName {
                module: self.target_module_id(),
                name,
            },
            parent: Some(rpc),
            children: Vec::new(),
            config: !output,
            status,
            mandatory: false,
            description: None,
            reference: None,
            when: Vec::new(),
            musts: Vec::new(),
            exts: Vec::new(),
            kind: if output {
                SchemaNodeKind::Output
            } else {
                SchemaNodeKind::Input
            },
        };
        let id = self.alloc_node(node);
        self.node_mut(rpc).children.push(id);
    }

    /// Payload pieces that need the children: list keys, choice default,
    /// deferred checks.
    fn finish_node(&mut self, pnode: &ParsedNode, id: NodeId) -> Result<()> {
        match &pnode.body {
            ParsedNodeBody::List { key, uniques, .. } => {
                self.compile_list_keys(pnode, id, key.as_deref())?;
                if !uniques.is_empty() {
                    self.deferred.push_back(Unresolved::Unique {
                        list: id,
                        args: uniques.clone(),
                    });
                }
            }
            ParsedNodeBody::Choice { default, .. } => {
                if let Some(name) = default {
                    self.deferred.push_back(Unresolved::ChoiceDefault {
                        choice: id,
                        name: name.clone(),
                    });
                }
            }
            ParsedNodeBody::Leaf { .. } => {
                let has_default = matches!(
                    &self.node(id).kind,
                    SchemaNodeKind::Leaf { default: Some(_), .. }
                );
                if has_default {
                    self.deferred.push_back(Unresolved::LeafDefault { node: id });
                }
                self.defer_type_items(id);
            }
            ParsedNodeBody::LeafList { .. } => {
                let has_defaults = matches!(
                    &self.node(id).kind,
                    SchemaNodeKind::LeafList { defaults, .. } if !defaults.is_empty()
                );
                if has_defaults {
                    self.deferred.push_back(Unresolved::LeafDefault { node: id });
                }
                self.defer_type_items(id);
            }
            _ => {}
        }
        Ok(())
    }

    /// Queue leafref realisation and identityref closure for a terminal
    /// node's type.
    fn defer_type_items(&mut self, id: NodeId) {
        use crate::schema::compiled::TypeKind;
        let Some(ty) = self.node(id).node_type() else {
            return;
        };
        let mut kinds = vec![ty.kind];
        if let crate::schema::compiled::TypeDetails::Union { members } = &ty.details {
            kinds.extend(members.iter().map(|m| m.kind));
        }
        if kinds.contains(&TypeKind::Leafref) {
            self.deferred.push_back(Unresolved::Leafref { node: id });
        }
        if kinds.contains(&TypeKind::IdentityRef) {
            self.deferred
                .push_back(Unresolved::IdentityrefPermitted { node: id });
        }
    }

    fn compile_list_keys(
        &mut self,
        pnode: &ParsedNode,
        list: NodeId,
        key: Option<&str>,
    ) -> Result<()> {
        let list_config = self.node(list).config;
        let Some(key) = key else {
            if list_config {
                return Err(Error::validation(
                    "missing-key",
                    format!("configuration list '{}' has no key", pnode.name),
                )
                .with_path(self.path_of(list)));
            }
            return Ok(());
        };

        let mut keys = Vec::new();
        for key_name in key.split_whitespace() {
            let child = self
                .node(list)
                .children
                .iter()
                .copied()
                .find(|c| &*self.node(*c).qname.name == key_name)
                .ok_or_else(|| {
                    Error::not_found("key leaf", key_name.to_string())
                        .with_path(self.path_of(list))
                })?;
            match self.node(child).kind {
                SchemaNodeKind::Leaf { .. } => {}
                _ => {
                    return Err(Error::validation(
                        "invalid-key",
                        format!(
                            "key '{key_name}' of list '{}' is a {}, not a leaf",
                            pnode.name,
                            self.node(child).kind.name()
                        ),
                    ));
                }
            }
            if self.node(child).config != list_config {
                return Err(Error::validation(
                    "key-config-mismatch",
                    format!(
                        "key '{key_name}' config does not agree with list '{}'",
                        pnode.name
                    ),
                ));
            }
            if keys.contains(&child) {
                return Err(Error::validation(
                    "duplicate-key",
                    format!("leaf '{key_name}' listed twice in the key of '{}'", pnode.name),
                ));
            }
            // Key leaves are implicitly mandatory.
            self.node_mut(child).mandatory = true;
            keys.push(child);
        }
        if let SchemaNodeKind::List { keys: slot, .. } = &mut self.node_mut(list).kind {
            *slot = keys;
        }
        Ok(())
    }

    /// Compile a child of a choice, wrapping short-form children in their
    /// implicit case.
    pub fn compile_choice_child<'a>(
        &mut self,
        pnode: &'a ParsedNode,
        choice: NodeId,
        uses_status: Option<Status>,
        scope: &'a ScopeFrame<'a>,
        child_set: Option<&mut Vec<NodeId>>,
    ) -> Result<Option<NodeId>>
    where
        'w: 'a,
    {
        if matches!(pnode.body, ParsedNodeBody::Case { .. }) {
            return self.compile_node(pnode, Some(choice), uses_status, scope, child_set);
        }

        // Short case: the child names an implicit case around itself.
        if !self.if_feature_satisfied(scope.module, &pnode.if_features)? {
            return Ok(None);
        }
        let config = self.node(choice).config;
        let status = effective_status(pnode.status, uses_status, Some(self.node(choice).status));
        let case = SchemaNode {
            qname: QName {
                module: self.target_module_id(),
                name: Rc::clone(&pnode.name),
            },
            parent: Some(choice),
            children: Vec::new(),
            config,
            status,
            mandatory: false,
            description: None,
            reference: None,
            when: Vec::new(),
            musts: Vec::new(),
            exts: Vec::new(),
            kind: SchemaNodeKind::Case,
        };
        let case_id = self.alloc_node(case);
        self.link_child(Some(choice), case_id, pnode)?;
        if let Some(set) = child_set {
            set.push(case_id);
        }
        self.compile_node(pnode, Some(case_id), uses_status, scope, None)?;
        Ok(Some(case_id))
    }

    /// Wire a new node under its parent, or into the module roots. Enforces
    /// sibling name uniqueness.
    fn link_child(
        &mut self,
        parent: Option<NodeId>,
        id: NodeId,
        pnode: &ParsedNode,
    ) -> Result<()> {
        match parent {
            Some(parent) => {
                let duplicate = self
                    .node(parent)
                    .children
                    .iter()
                    .any(|c| *c != id && *self.node(*c).qname.name == *pnode.name);
                if duplicate {
                    return Err(Error::validation(
                        "duplicate-node-name",
                        format!("node '{}' already defined", pnode.name),
                    )
                    .with_path(self.path_of(parent)));
                }
                self.node_mut(parent).children.push(id);
                if self.is_published_node(parent) {
                    self.undo.push(super::UndoAction::ChildAdded { parent });
                }
            }
            None => {
                let duplicate_root = self
                    .data
                    .iter()
                    .chain(&self.rpcs)
                    .chain(&self.notifications)
                    .any(|c| *self.node(*c).qname.name == *pnode.name);
                if duplicate_root {
                    return Err(Error::validation(
                        "duplicate-node-name",
                        format!("top-level node '{}' already defined", pnode.name),
                    ));
                }
                match &pnode.body {
                    ParsedNodeBody::Rpc { .. } => self.rpcs.push(id),
                    ParsedNodeBody::Notification { .. } => self.notifications.push(id),
                    _ => self.data.push(id),
                }
            }
        }
        Ok(())
    }

    fn effective_config(&self, pnode: &ParsedNode, parent: Option<NodeId>) -> Result<bool> {
        let inherited = match parent {
            Some(p) => Some(self.node(p).config),
            None => None,
        };
        match &pnode.body {
            ParsedNodeBody::RpcIo { output, .. } => return Ok(!*output),
            ParsedNodeBody::Notification { .. } | ParsedNodeBody::Rpc { .. } => {
                return Ok(false);
            }
            _ => {}
        }
        if pnode.config == Some(true) && inherited == Some(false) {
            return Err(Error::validation(
                "invalid-config",
                format!(
                    "node '{}' is config true inside a config false subtree",
                    pnode.name
                ),
            ));
        }
        Ok(pnode.config.unwrap_or(inherited.unwrap_or(true)))
    }

    /// Maintain the mandatory flag of non-presence container ancestors as
    /// mandatory descendants appear (`add`) or disappear.
    ///
    /// The climb crosses containers only: presence containers absorb the
    /// obligation and choices never pass it upward. The climb can reach
    /// published ancestors (cross-module augments); their previous state
    /// goes on the undo log so a failed pass restores them.
    pub fn propagate_mandatory_parents(&mut self, parent: Option<NodeId>, add: bool) {
        let mut current = parent;
        while let Some(id) = current {
            let (presence, count, was_mandatory, next) = {
                let node = self.node(id);
                let SchemaNodeKind::Container {
                    presence,
                    mandatory_children,
                } = node.kind
                else {
                    break;
                };
                (presence, mandatory_children, node.mandatory, node.parent)
            };
            if presence {
                break;
            }
            if self.is_published_node(id) {
                self.undo.push(super::UndoAction::MandatoryChanged {
                    node: id,
                    mandatory: was_mandatory,
                    count,
                });
            }
            let node = self.node_mut(id);
            let SchemaNodeKind::Container {
                mandatory_children, ..
            } = &mut node.kind
            else {
                break;
            };
            if add {
                *mandatory_children += 1;
                if *mandatory_children > 1 {
                    break;
                }
                node.mandatory = true;
            } else {
                *mandatory_children = mandatory_children.saturating_sub(1);
                if *mandatory_children > 0 {
                    break;
                }
                node.mandatory = false;
            }
            current = next;
        }
    }
}

fn initial_mandatory(pnode: &ParsedNode, kind: &SchemaNodeKind) -> bool {
    match &pnode.body {
        ParsedNodeBody::Leaf { mandatory, .. }
        | ParsedNodeBody::Anyxml { mandatory }
        | ParsedNodeBody::Anydata { mandatory }
        | ParsedNodeBody::Choice { mandatory, .. } => *mandatory == Some(true),
        ParsedNodeBody::LeafList { .. } | ParsedNodeBody::List { .. } => {
            matches!(
                kind,
                SchemaNodeKind::LeafList { min_elements, .. }
                | SchemaNodeKind::List { min_elements, .. }
                    if *min_elements > 0
            )
        }
        _ => false,
    }
}
