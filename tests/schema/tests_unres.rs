//! Deferred resolution, stalls, and context lifecycle behaviour.

use std::path::PathBuf;

use ryang::{CancelHandle, Context, Error, Format, ModuleResolver};

use crate::helpers::context_helpers::{
    StaticResolver, compile_yang, compile_yang_err, ext_context, node,
};
use crate::helpers::source_fixtures::EXT_DEF;

#[test]
fn unique_arguments_resolve_to_descendant_leaves() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         list server { key \"name\"; unique \"ip port\"; \
         leaf name { type string; } \
         leaf ip { type string; } \
         leaf port { type uint16; } } }",
    );
    let list = node(&ctx, "/m:server");
    let ryang::schema::compiled::SchemaNodeKind::List { uniques, .. } = &list.kind else {
        panic!("expected list");
    };
    assert_eq!(uniques.len(), 1);
    assert_eq!(uniques[0].len(), 2);
}

#[test]
fn unresolvable_unique_arguments_stall() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         list server { key \"name\"; unique \"val1f\"; \
         leaf name { type string; } \
         leaf val1 { type string; } } }",
    );
    let Error::Validation {
        code: "unresolved-references",
        message,
        ..
    } = err
    else {
        panic!("expected a stall, got {err}");
    };
    assert!(message.contains("unique"), "{message}");
}

#[test]
fn dangling_leafrefs_stall_with_their_path() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf broken { type leafref { path \"../missing\"; } } }",
    );
    let Error::Validation {
        code: "unresolved-references",
        message,
        ..
    } = err
    else {
        panic!("expected a stall, got {err}");
    };
    assert!(message.contains("leafref"), "{message}");
}

#[test]
fn mutually_recursive_leafrefs_never_settle() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf a { type leafref { path \"../b\"; } } \
         leaf b { type leafref { path \"../a\"; } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "unresolved-references", .. }
    ));
}

#[test]
fn missing_imports_are_not_found() {
    let mut ctx = Context::new();
    let err = ctx
        .parse_module(
            "module m { namespace \"urn:m\"; prefix m; import ghost { prefix g; } }",
            Format::Yang,
        )
        .expect_err("import cannot resolve");
    assert!(matches!(err, Error::NotFound { kind: "module", .. }));
}

#[test]
fn import_cycles_are_detected() {
    let a = "module a { namespace \"urn:a\"; prefix a; import b { prefix b; } }";
    let b = "module b { namespace \"urn:b\"; prefix b; import a { prefix a; } }";
    let mut ctx = Context::new();
    ctx.set_resolver(Box::new(
        StaticResolver::new()
            .with("a", a, Format::Yang)
            .with("b", b, Format::Yang),
    ));
    let err = ctx.parse_module(a, Format::Yang).expect_err("cycle");
    assert!(matches!(err, Error::Cycle { kind: "import", .. }));
}

#[test]
fn modules_load_once() {
    let mut ctx = ext_context();
    let source = "module m { namespace \"urn:m\"; prefix m; leaf l { type string; } }";
    ctx.parse_module(source, Format::Yang).unwrap();
    let err = ctx.parse_module(source, Format::Yang).expect_err("duplicate");
    assert!(matches!(err, Error::Validation { code: "module-exists", .. }));
}

#[test]
fn failed_compilations_leave_the_context_usable() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module good { namespace \"urn:good\"; prefix g; leaf l { type string; } }",
        Format::Yang,
    )
    .unwrap();
    ctx.parse_module(
        "module bad { namespace \"urn:bad\"; prefix b; leaf l { type no-such; } }",
        Format::Yang,
    )
    .expect_err("bad module");
    assert!(ctx.module_by_name("bad").is_none());
    assert!(ctx.find_node("/good:l").is_some());
    ctx.parse_module(
        "module more { namespace \"urn:more\"; prefix mo; leaf l { type string; } }",
        Format::Yang,
    )
    .expect("still usable");
}

struct CancellingResolver {
    handle: CancelHandle,
}

impl ModuleResolver for CancellingResolver {
    fn resolve(&self, name: &str, _revision: Option<&str>) -> Option<(String, Format)> {
        self.handle.cancel();
        if name == "ext-def" {
            Some((EXT_DEF.to_string(), Format::Yang))
        } else {
            None
        }
    }
}

#[test]
fn cancellation_unwinds_with_its_own_error_kind() {
    let mut ctx = Context::new();
    let handle = ctx.cancel_handle();
    ctx.set_resolver(Box::new(CancellingResolver { handle }));
    let err = ctx
        .parse_module(
            "module m { namespace \"urn:m\"; prefix m; \
             import ext-def { prefix e; } leaf l { type string; } }",
            Format::Yang,
        )
        .expect_err("cancelled mid-load");
    assert!(matches!(err, Error::Cancelled));
    assert!(ctx.module_by_name("m").is_none());
}

struct DirResolver {
    dir: PathBuf,
}

impl ModuleResolver for DirResolver {
    fn resolve(&self, name: &str, _revision: Option<&str>) -> Option<(String, Format)> {
        let path = self.dir.join(format!("{name}.yang"));
        std::fs::read_to_string(path).ok().map(|t| (t, Format::Yang))
    }
}

#[test]
fn resolvers_can_load_from_a_search_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ext-def.yang"), EXT_DEF).unwrap();

    let mut ctx = Context::new();
    ctx.set_resolver(Box::new(DirResolver {
        dir: dir.path().to_path_buf(),
    }));
    ctx.parse_module(
        "module m { namespace \"urn:m\"; prefix m; \
         import ext-def { prefix e; } \
         container c { e:a; } }",
        Format::Yang,
    )
    .expect("import loads from disk");
    assert!(ctx.find_node("/m:c").is_some());
}
