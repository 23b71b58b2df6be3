//! Context construction and assertion helpers.

use ryang::schema::compiled::{ModuleId, NodeId, SchemaNode};
use ryang::{Context, Error, Format, ModuleResolver};

use super::source_fixtures::{EXT_DEF, EXT_INC};

/// Resolver serving a fixed set of module sources by name.
pub struct StaticResolver {
    modules: Vec<(String, String, Format)>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, text: &str, format: Format) -> Self {
        self.modules.push((name.into(), text.into(), format));
        self
    }
}

impl ModuleResolver for StaticResolver {
    fn resolve(&self, name: &str, _revision: Option<&str>) -> Option<(String, Format)> {
        self.modules
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, text, format)| (text.clone(), *format))
    }
}

/// Context whose resolver serves the `ext-def` and `ext-inc` dependencies.
pub fn ext_context() -> Context {
    let mut ctx = Context::new();
    ctx.set_resolver(Box::new(
        StaticResolver::new()
            .with("ext-def", EXT_DEF, Format::Yang)
            .with("ext-inc", EXT_INC, Format::Yang),
    ));
    ctx
}

/// Parse and compile a YANG module in an [`ext_context`].
pub fn compile_yang(text: &str) -> (Context, ModuleId) {
    let mut ctx = ext_context();
    let id = ctx
        .parse_module(text, Format::Yang)
        .expect("module should compile");
    (ctx, id)
}

/// Parse a YANG module expected to fail compilation.
pub fn compile_yang_err(text: &str) -> Error {
    let mut ctx = ext_context();
    ctx.parse_module(text, Format::Yang)
        .expect_err("module should fail to compile")
}

/// Compiled node looked up by schema path, panicking with the path on miss.
pub fn node<'a>(ctx: &'a Context, path: &str) -> &'a SchemaNode {
    let id = ctx
        .find_node(path)
        .unwrap_or_else(|| panic!("node '{path}' not found"));
    ctx.pool().node(id)
}

pub fn node_id(ctx: &Context, path: &str) -> NodeId {
    ctx.find_node(path)
        .unwrap_or_else(|| panic!("node '{path}' not found"))
}

/// Structural comparison of two compiled subtrees; used by the
/// compile-twice idempotence check: same names, kinds and flags in the
/// same order.
pub fn assert_same_shape(a: &Context, b: &Context, a_id: NodeId, b_id: NodeId) {
    let na = a.pool().node(a_id);
    let nb = b.pool().node(b_id);
    assert_eq!(&*na.qname.name, &*nb.qname.name);
    assert_eq!(na.kind.name(), nb.kind.name());
    assert_eq!(na.config, nb.config);
    assert_eq!(na.mandatory, nb.mandatory);
    assert_eq!(na.status, nb.status);
    assert_eq!(na.children.len(), nb.children.len(), "children of {}", na.qname.name);
    for (ca, cb) in na.children.iter().zip(&nb.children) {
        assert_same_shape(a, b, *ca, *cb);
    }
}
