//! `when` and `must` compilation.
//!
//! The XPath expression is parsed once into a tree; node-reference prefixes
//! stay unresolved for the data validator. A `when` on a `uses` is compiled
//! once and shared by every top-level node of the expansion through the
//! memo parameter.

use std::rc::Rc;

use crate::error::Result;
use crate::schema::compiled::{NodeId, SchemaMust, SchemaWhen};
use crate::schema::parsed::{ParsedMust, ParsedWhen};
use crate::xpath::XPathExpr;

use super::CompileCtx;

impl CompileCtx<'_, '_> {
    /// Compile a `when` statement. `context` is the XPath context node when
    /// it differs from the node carrying the constraint (uses and augment).
    pub fn compile_when(
        &mut self,
        when: &ParsedWhen,
        def_module: usize,
        context: Option<NodeId>,
    ) -> Result<Rc<SchemaWhen>> {
        let expr = XPathExpr::parse(&when.condition)?;
        let exts = self.compile_exts(&when.exts, def_module)?;
        Ok(Rc::new(SchemaWhen {
            expr,
            context,
            description: when.description.clone(),
            reference: when.reference.clone(),
            exts,
        }))
    }

    /// Memoised variant: the first call compiles, repeats reuse the shared
    /// compiled when.
    pub fn compile_when_shared(
        &mut self,
        when: &ParsedWhen,
        def_module: usize,
        context: Option<NodeId>,
        memo: &mut Option<Rc<SchemaWhen>>,
    ) -> Result<Rc<SchemaWhen>> {
        if let Some(shared) = memo {
            return Ok(Rc::clone(shared));
        }
        let compiled = self.compile_when(when, def_module, context)?;
        *memo = Some(Rc::clone(&compiled));
        Ok(compiled)
    }

    pub fn compile_musts(
        &mut self,
        musts: &[ParsedMust],
        def_module: usize,
    ) -> Result<Vec<SchemaMust>> {
        let mut out = Vec::with_capacity(musts.len());
        for must in musts {
            let expr = XPathExpr::parse(&must.condition)?;
            let exts = self.compile_exts(&must.exts, def_module)?;
            out.push(SchemaMust {
                expr,
                error_message: must.error_message.clone(),
                error_app_tag: must.error_app_tag.clone(),
                description: must.description.clone(),
                reference: must.reference.clone(),
                exts,
            });
        }
        Ok(out)
    }
}
