//! Deferred resolution: the fixed-point pass over references that only
//! resolve once the tree exists.
//!
//! Each sweep processes every queued item; items that cannot resolve yet go
//! back on the queue, since another item (typically a cross-module augment)
//! may create what they need. A full sweep without progress with a non-empty
//! queue is a stall: compilation fails naming every remaining item.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::schema::compiled::{
    IdentityId, NodeId, SchemaNodeKind, SchemaType, TypeDetails, TypeKind,
};
use crate::xpath::LeafrefPath;

use super::{CompileCtx, ScopeFrame, Unresolved};
use super::types::{parse_decimal_value, parse_int_value};

impl CompileCtx<'_, '_> {
    pub fn resolve_deferred(&mut self) -> Result<()> {
        loop {
            let pending = self.deferred.len();
            if pending == 0 {
                return Ok(());
            }
            let mut progress = false;
            for _ in 0..pending {
                self.check_cancelled()?;
                let item = self.deferred.pop_front().expect("queue length checked");
                if self.resolve_item(&item)? {
                    progress = true;
                } else {
                    self.deferred.push_back(item);
                }
            }
            // New items enqueued by a sweep count as progress implicitly.
            if !progress && self.deferred.len() == pending {
                let names: Vec<String> =
                    self.deferred.iter().map(|i| self.describe(i)).collect();
                return Err(Error::validation(
                    "unresolved-references",
                    format!("unresolvable after fixed point: {}", names.join(", ")),
                ));
            }
            debug!(remaining = self.deferred.len(), "deferred sweep finished");
        }
    }

    /// Returns true when the item resolved, false to retry next sweep.
    fn resolve_item(&mut self, item: &Unresolved) -> Result<bool> {
        match item {
            Unresolved::Leafref { node } => self.resolve_leafref(*node),
            Unresolved::IdentityrefPermitted { node } => {
                self.resolve_identityref_permitted(*node);
                Ok(true)
            }
            Unresolved::LeafDefault { node } => self.check_node_defaults(*node),
            Unresolved::ChoiceDefault { choice, name } => {
                let local = name.split_once(':').map(|(_, n)| n).unwrap_or(name);
                let case = self
                    .node(*choice)
                    .children
                    .iter()
                    .copied()
                    .find(|c| &*self.node(*c).qname.name == local);
                match case {
                    Some(case) => {
                        if let SchemaNodeKind::Choice { default_case } =
                            &mut self.node_mut(*choice).kind
                        {
                            *default_case = Some(case);
                        }
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            Unresolved::RemoteAugment { index } => {
                let parsed = Rc::clone(&self.parsed);
                let aug = &parsed.augments[*index];
                let root = ScopeFrame::module_root(self.world, self.target);
                match self.apply_augment(aug, &root) {
                    Ok(()) => Ok(true),
                    // The target may be produced by another deferred item.
                    Err(Error::NotFound { .. }) => Ok(false),
                    Err(e) => Err(e),
                }
            }
            Unresolved::Unique { list, args } => self.resolve_uniques(*list, args),
        }
    }

    fn describe(&self, item: &Unresolved) -> String {
        match item {
            Unresolved::Leafref { node } => {
                format!("leafref path of {}", self.path_of(*node))
            }
            Unresolved::IdentityrefPermitted { node } => {
                format!("identityref of {}", self.path_of(*node))
            }
            Unresolved::LeafDefault { node } => {
                format!("default of {}", self.path_of(*node))
            }
            Unresolved::ChoiceDefault { choice, name } => {
                format!("default case '{name}' of {}", self.path_of(*choice))
            }
            Unresolved::RemoteAugment { index } => {
                format!("augment '{}'", self.parsed.augments[*index].target)
            }
            Unresolved::Unique { list, .. } => {
                format!("unique of {}", self.path_of(*list))
            }
        }
    }

    // ------------------------------------------------------------------
    // Leafref
    // ------------------------------------------------------------------

    fn resolve_leafref(&mut self, node: NodeId) -> Result<bool> {
        let Some(ty) = self.node(node).node_type() else {
            return Ok(true);
        };
        let ty = Rc::clone(ty);
        self.resolve_leafref_in(&ty, node)
    }

    fn resolve_leafref_in(&self, ty: &SchemaType, node: NodeId) -> Result<bool> {
        match &ty.details {
            TypeDetails::Leafref {
                path,
                path_module,
                realized,
                ..
            } => {
                if realized.borrow().is_some() {
                    return Ok(true);
                }
                let Some(target) = self.walk_leafref(path, path_module.0 as usize, node)?
                else {
                    return Ok(false);
                };
                if target == node {
                    return Err(Error::cycle("leafref", self.path_of(node)));
                }
                let target_ty = self
                    .node(target)
                    .node_type()
                    .ok_or_else(|| {
                        Error::validation(
                            "invalid-leafref-target",
                            format!(
                                "leafref of {} points at a {}",
                                self.path_of(node),
                                self.node(target).kind.name()
                            ),
                        )
                    })?;
                // A target that is itself an unrealized leafref retries
                // later; a realized one contributes its realized type.
                let effective = match &target_ty.details {
                    TypeDetails::Leafref {
                        realized: target_realized,
                        ..
                    } => match target_realized.borrow().as_ref() {
                        Some(t) => Rc::clone(t),
                        None => return Ok(false),
                    },
                    _ => Rc::clone(target_ty),
                };
                trace!(
                    node = %self.path_of(node),
                    target = %self.path_of(target),
                    "leafref resolved"
                );
                *realized.borrow_mut() = Some(effective);
                Ok(true)
            }
            TypeDetails::Union { members } => {
                let mut all = true;
                for member in members {
                    all &= self.resolve_leafref_in(member, node)?;
                }
                Ok(all)
            }
            _ => Ok(true),
        }
    }

    /// Walk a leafref path from its node. Returns `None` when a step does
    /// not (yet) exist.
    fn walk_leafref(
        &self,
        path: &LeafrefPath,
        path_module: usize,
        node: NodeId,
    ) -> Result<Option<NodeId>> {
        let mut current: Option<NodeId>;
        if path.absolute {
            current = None;
        } else {
            let mut at = Some(node);
            for _ in 0..path.up {
                at = match at {
                    Some(n) => self.data_parent(n),
                    None => return Ok(None),
                };
            }
            current = at;
        }

        for step in &path.steps {
            let module = self.resolve_prefix(path_module, step.prefix.as_deref())?;
            let next = match current {
                Some(parent) => self.data_child(parent, module, &step.name),
                None => self.module_top_level(module, &step.name),
            };
            let Some(next) = next else {
                return Ok(None);
            };
            current = Some(next);
        }
        Ok(current)
    }

    /// Parent for data purposes: choice and case are schema-only.
    fn data_parent(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.node(node).parent;
        while let Some(id) = current {
            match self.node(id).kind {
                SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case => {
                    current = self.node(id).parent;
                }
                _ => return Some(id),
            }
        }
        None
    }

    /// Like [`Self::data_child`], matching on name alone. Unique arguments
    /// may reach augmented children from other modules.
    fn data_child_any_module(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.node(parent).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            match node.kind {
                SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case => {
                    stack.extend(node.children.iter().rev().copied());
                }
                _ => {
                    if &*node.qname.name == name {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    /// Child for data purposes, diving through choice and case.
    fn data_child(&self, parent: NodeId, module: usize, name: &str) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.node(parent).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            match node.kind {
                SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case => {
                    stack.extend(node.children.iter().rev().copied());
                }
                _ => {
                    if node.qname.module.0 as usize == module && &*node.qname.name == name {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    fn module_top_level(&self, module: usize, name: &str) -> Option<NodeId> {
        let ids: Vec<NodeId> = if module == self.target {
            self.data.clone()
        } else {
            self.ctx.modules[module].compiled.as_ref()?.data.clone()
        };
        for id in ids {
            let node = self.node(id);
            match node.kind {
                SchemaNodeKind::Choice { .. } | SchemaNodeKind::Case => {
                    if let Some(found) = self.data_child(id, module, name) {
                        return Some(found);
                    }
                }
                _ => {
                    if &*node.qname.name == name {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Identityref closure
    // ------------------------------------------------------------------

    fn resolve_identityref_permitted(&mut self, node: NodeId) {
        let Some(ty) = self.node(node).node_type() else {
            return;
        };
        let ty = Rc::clone(ty);
        self.close_identityref(&ty);
    }

    fn close_identityref(&self, ty: &SchemaType) {
        match &ty.details {
            TypeDetails::IdentityRef { bases, permitted } => {
                let mut closed: Vec<IdentityId> = Vec::new();
                let total = self.total_identities();
                for candidate in (0..total).map(|i| IdentityId(i as u32)) {
                    let derived_from_all = bases
                        .iter()
                        .all(|base| self.identity_derived_from(candidate, *base));
                    if derived_from_all && !closed.contains(&candidate) {
                        closed.push(candidate);
                    }
                }
                *permitted.borrow_mut() = closed;
            }
            TypeDetails::Union { members } => {
                for member in members {
                    self.close_identityref(member);
                }
            }
            _ => {}
        }
    }

    fn total_identities(&self) -> usize {
        self.ctx.pool.identities.len() + self.new_identities.len()
    }

    fn identity_derived_from(&self, id: IdentityId, base: IdentityId) -> bool {
        let mut stack: Vec<IdentityId> = self.identity(id).bases.clone();
        while let Some(current) = stack.pop() {
            if current == base {
                return true;
            }
            stack.extend(self.identity(current).bases.iter().copied());
        }
        false
    }

    // ------------------------------------------------------------------
    // Defaults
    // ------------------------------------------------------------------

    fn check_node_defaults(&mut self, node: NodeId) -> Result<bool> {
        let (ty, defaults): (Rc<SchemaType>, Vec<smol_str::SmolStr>) =
            match &self.node(node).kind {
                SchemaNodeKind::Leaf { ty, default, .. } => (
                    Rc::clone(ty),
                    default.iter().cloned().collect(),
                ),
                SchemaNodeKind::LeafList { ty, defaults, .. } => {
                    (Rc::clone(ty), defaults.clone())
                }
                _ => return Ok(true),
            };
        for (i, default) in defaults.iter().enumerate() {
            if defaults[..i].contains(default) {
                return Err(Error::validation(
                    "duplicate-default",
                    format!(
                        "default '{default}' repeated on {}",
                        self.path_of(node)
                    ),
                ));
            }
            match self.check_value(&ty, default)? {
                true => {}
                false => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Check a default value against a compiled type. `Ok(false)` means the
    /// type is not fully realized yet (leafref chain).
    pub fn check_value(&self, ty: &SchemaType, value: &str) -> Result<bool> {
        let bad = |why: String| {
            Err(Error::validation(
                "invalid-value",
                format!("value '{value}' is not a valid {}: {why}", ty.kind.as_str()),
            ))
        };
        match &ty.details {
            TypeDetails::Integer { ranges } => {
                let v = parse_int_value(value)?;
                if !ranges.iter().any(|s| s.lo <= v && v <= s.hi) {
                    return bad("outside the permitted ranges".into());
                }
                Ok(true)
            }
            TypeDetails::Decimal {
                fraction_digits,
                ranges,
            } => {
                let v = parse_decimal_value(value, *fraction_digits)?;
                if !ranges.iter().any(|s| s.lo <= v && v <= s.hi) {
                    return bad("outside the permitted ranges".into());
                }
                Ok(true)
            }
            TypeDetails::Str { lengths, patterns } => {
                let len = value.chars().count() as u64;
                if !lengths.iter().any(|s| s.lo <= len && len <= s.hi) {
                    return bad(format!("length {len} outside the permitted lengths"));
                }
                for pattern in patterns {
                    if !pattern.matches(value) {
                        return bad(format!("does not satisfy pattern '{}'", pattern.source));
                    }
                }
                Ok(true)
            }
            TypeDetails::Binary { lengths } => {
                if value.len() % 4 != 0
                    || !value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
                {
                    return bad("not base64".into());
                }
                let padding = value.chars().rev().take_while(|c| *c == '=').count() as u64;
                let len = (value.len() as u64 / 4) * 3 - padding;
                if !lengths.iter().any(|s| s.lo <= len && len <= s.hi) {
                    return bad(format!("decoded length {len} outside the permitted lengths"));
                }
                Ok(true)
            }
            TypeDetails::Enumeration { enums } => {
                if !enums.iter().any(|e| &*e.label == value) {
                    return bad("not one of the enumeration labels".into());
                }
                Ok(true)
            }
            TypeDetails::Bits { bits } => {
                let mut seen: Vec<&str> = Vec::new();
                for label in value.split_whitespace() {
                    if !bits.iter().any(|b| &*b.label == label) {
                        return bad(format!("unknown bit '{label}'"));
                    }
                    if seen.contains(&label) {
                        return bad(format!("bit '{label}' repeated"));
                    }
                    seen.push(label);
                }
                Ok(true)
            }
            TypeDetails::IdentityRef { bases, .. } => {
                let (prefix, name) = match value.split_once(':') {
                    Some((p, n)) => (Some(p), n),
                    None => (None, value),
                };
                let module = self.resolve_prefix(self.target, prefix)?;
                let Some(id) = self.find_identity(module, name) else {
                    return bad("unknown identity".into());
                };
                let ok = bases
                    .iter()
                    .all(|base| self.identity_derived_from(id, *base));
                if !ok {
                    return bad("not derived from the required base".into());
                }
                Ok(true)
            }
            TypeDetails::Leafref { realized, .. } => match realized.borrow().as_ref() {
                Some(target) => self.check_value(target, value),
                None => Ok(false),
            },
            TypeDetails::InstanceIdentifier { .. } => Ok(true),
            TypeDetails::Union { members } => {
                let mut pending = false;
                for member in members {
                    match self.check_value(member, value) {
                        Ok(true) => return Ok(true),
                        Ok(false) => pending = true,
                        Err(_) => {}
                    }
                }
                if pending {
                    return Ok(false);
                }
                bad("no union member accepts the value".into())
            }
            TypeDetails::Plain => match ty.kind {
                TypeKind::Boolean => {
                    if value == "true" || value == "false" {
                        Ok(true)
                    } else {
                        bad("expected 'true' or 'false'".into())
                    }
                }
                TypeKind::Empty => bad("empty types cannot carry a value".into()),
                _ => Ok(true),
            },
        }
    }

    // ------------------------------------------------------------------
    // Unique
    // ------------------------------------------------------------------

    fn resolve_uniques(&mut self, list: NodeId, args: &[smol_str::SmolStr]) -> Result<bool> {
        let mut compiled: Vec<Vec<NodeId>> = Vec::new();
        for arg in args {
            let mut refs = Vec::new();
            for path in arg.split_whitespace() {
                let mut current = list;
                for segment in path.split('/').filter(|s| !s.is_empty()) {
                    let name = segment.split_once(':').map(|(_, n)| n).unwrap_or(segment);
                    match self.data_child_any_module(current, name) {
                        Some(f) => current = f,
                        None => return Ok(false),
                    }
                }
                if !matches!(self.node(current).kind, SchemaNodeKind::Leaf { .. }) {
                    return Err(Error::validation(
                        "invalid-unique",
                        format!(
                            "unique argument '{path}' of {} is not a leaf",
                            self.path_of(list)
                        ),
                    ));
                }
                refs.push(current);
            }
            compiled.push(refs);
        }
        if let SchemaNodeKind::List { uniques, .. } = &mut self.node_mut(list).kind {
            *uniques = compiled;
        }
        Ok(true)
    }
}
