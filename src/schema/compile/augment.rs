//! Augment resolution: grafting new children onto an existing schema path.
//!
//! Local targets apply during the primary pass; targets in imported modules
//! go through the deferred queue, where insertions into published nodes are
//! recorded for rollback. Augmenting a choice wraps short-form children into
//! implicit cases, like choice compilation itself.

use tracing::trace;

use crate::error::{Error, Result};
use crate::schema::compiled::{NodeId, SchemaNodeKind};
use crate::schema::parsed::{ParsedAugment, Status};

use super::{CompileCtx, ScopeFrame};

impl<'w> CompileCtx<'w, '_> {
    /// Whether a module-level augment targets the module being compiled.
    pub fn augment_is_local(&self, aug: &ParsedAugment) -> Result<bool> {
        let first = aug
            .target
            .split('/')
            .find(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::validation(
                    "invalid-augment-target",
                    format!("empty augment target '{}'", aug.target),
                )
            })?;
        let prefix = first.split_once(':').map(|(p, _)| p);
        Ok(self.resolve_prefix(self.target, prefix)? == self.target)
    }

    /// Apply a module-level augment. The target is an absolute schema path
    /// resolved through the augmenting module's prefixes.
    pub fn apply_augment<'a>(
        &mut self,
        aug: &ParsedAugment,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        if !self.if_feature_satisfied(scope.module, &aug.if_features)? {
            return Ok(());
        }
        let target = self.resolve_augment_target(&aug.target, scope.module)?;
        self.graft(aug, target, scope)
    }

    /// Apply an augment inside a `uses`, rooted at the expansion.
    pub fn apply_uses_augment(
        &mut self,
        aug: &ParsedAugment,
        expanded: &[NodeId],
        def_module: usize,
    ) -> Result<()> {
        if !self.if_feature_satisfied(def_module, &aug.if_features)? {
            return Ok(());
        }
        let mut segments = aug.target.split('/').filter(|s| !s.is_empty());
        let first = segments.next().ok_or_else(|| {
            Error::validation(
                "invalid-augment-target",
                format!("empty augment target '{}'", aug.target),
            )
        })?;
        let first_name = local_name(first);
        let mut current = expanded
            .iter()
            .copied()
            .find(|id| &*self.node(*id).qname.name == first_name)
            .ok_or_else(|| {
                Error::not_found("augment target", aug.target.to_string())
            })?;
        for segment in segments {
            let name = local_name(segment);
            current = self.child_by_name(current, name).ok_or_else(|| {
                Error::not_found("augment target", aug.target.to_string())
            })?;
        }
        let scope = ScopeFrame::module_root(self.world, def_module);
        self.graft(aug, current, &scope)
    }

    fn graft<'a>(
        &mut self,
        aug: &ParsedAugment,
        target: NodeId,
        scope: &'a ScopeFrame<'a>,
    ) -> Result<()>
    where
        'w: 'a,
    {
        trace!(target = %self.path_of(target), "applying augment");
        let target_node = self.node(target);
        let target_status = target_node.status;
        let remote = target_node.qname.module != self.target_module_id();
        let into_choice = matches!(target_node.kind, SchemaNodeKind::Choice { .. });
        match target_node.kind {
            SchemaNodeKind::Container { .. }
            | SchemaNodeKind::List { .. }
            | SchemaNodeKind::Choice { .. }
            | SchemaNodeKind::Case
            | SchemaNodeKind::Input
            | SchemaNodeKind::Output
            | SchemaNodeKind::Notification => {}
            ref other => {
                return Err(Error::validation(
                    "invalid-augment-target",
                    format!(
                        "augment target '{}' is a {}, which cannot take children",
                        aug.target,
                        other.name()
                    ),
                ));
            }
        }

        // Introduced nodes inherit at most the stability of the target.
        let cap = target_status.max(aug.status.unwrap_or(Status::Current));
        let status = if cap == Status::Current {
            None
        } else {
            Some(cap)
        };

        let mut introduced: Vec<NodeId> = Vec::new();
        for child in &aug.children {
            if into_choice {
                self.compile_choice_child(child, target, status, scope, Some(&mut introduced))?;
            } else {
                self.compile_node(child, Some(target), status, scope, Some(&mut introduced))?;
            }
        }

        // New obligations must not reach into a module compiled on its own:
        // its validity cannot change underneath it.
        if remote {
            for id in &introduced {
                if self.node(*id).mandatory {
                    return Err(Error::validation(
                        "mandatory-augment",
                        format!(
                            "augment of '{}' introduces mandatory node '{}' into another module",
                            aug.target,
                            self.node(*id).qname.name
                        ),
                    ));
                }
            }
        }

        if let Some(when) = &aug.when {
            let mut memo = None;
            for id in &introduced {
                let compiled =
                    self.compile_when_shared(when, scope.module, Some(target), &mut memo)?;
                self.node_mut(*id).when.push(compiled);
            }
        }
        Ok(())
    }

    /// Resolve an absolute schema path through this compilation's view of
    /// the world: the target module's scratch roots or a published module's
    /// compiled roots.
    pub fn resolve_augment_target(&self, path: &str, def_module: usize) -> Result<NodeId> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next().ok_or_else(|| {
            Error::validation(
                "invalid-augment-target",
                format!("empty augment target '{path}'"),
            )
        })?;

        let (first_module, first_name) = self.segment(first, def_module)?;
        let mut current = self
            .top_level(first_module, first_name)
            .ok_or_else(|| Error::not_found("augment target", path.to_string()))?;
        for segment in segments {
            let (_, name) = self.segment(segment, def_module)?;
            current = self
                .child_by_name(current, name)
                .ok_or_else(|| Error::not_found("augment target", path.to_string()))?;
        }
        Ok(current)
    }

    fn segment<'s>(&self, segment: &'s str, def_module: usize) -> Result<(usize, &'s str)> {
        match segment.split_once(':') {
            Some((prefix, name)) => {
                Ok((self.resolve_prefix(def_module, Some(prefix))?, name))
            }
            None => Ok((def_module, segment)),
        }
    }

    fn top_level(&self, module: usize, name: &str) -> Option<NodeId> {
        let ids: Vec<NodeId> = if module == self.target {
            self.data
                .iter()
                .chain(&self.rpcs)
                .chain(&self.notifications)
                .copied()
                .collect()
        } else {
            let compiled = self.ctx.modules[module].compiled.as_ref()?;
            compiled
                .data
                .iter()
                .chain(&compiled.rpcs)
                .chain(&compiled.notifications)
                .copied()
                .collect()
        };
        ids.into_iter()
            .find(|id| &*self.node(*id).qname.name == name)
    }

    fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|c| &*self.node(*c).qname.name == name)
    }
}

fn local_name(segment: &str) -> &str {
    segment.split_once(':').map(|(_, n)| n).unwrap_or(segment)
}
