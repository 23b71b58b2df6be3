//! Augment resolution: local and cross-module targets, rollback on error.

use ryang::schema::compiled::SchemaNodeKind;
use ryang::{Error, Format};

use crate::helpers::context_helpers::{compile_yang, compile_yang_err, ext_context, node};

#[test]
fn local_augment_extends_a_container() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container top { leaf base { type string; } } \
         augment \"/top\" { leaf extra { type int8; } } }",
    );
    assert!(ctx.find_node("/m:top/extra").is_some());
}

#[test]
fn augment_when_guards_every_introduced_node() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container top; \
         augment \"/top\" { when \"true()\"; \
         leaf a { type string; } leaf b { type string; } } }",
    );
    let a = node(&ctx, "/m:top/a");
    let b = node(&ctx, "/m:top/b");
    assert_eq!(a.when.len(), 1);
    assert_eq!(b.when.len(), 1);
    assert!(std::rc::Rc::ptr_eq(&a.when[0], &b.when[0]));
}

#[test]
fn augmenting_a_choice_wraps_short_cases() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         choice ch { case a { leaf x { type string; } } } \
         augment \"/ch\" { leaf z { type string; } } }",
    );
    let z_case = node(&ctx, "/m:ch/z");
    assert!(z_case.is_case());
    assert!(ctx.find_node("/m:ch/z/z").is_some());
}

#[test]
fn cross_module_augment_goes_through_the_deferred_pass() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module base { namespace \"urn:base\"; prefix b; \
         container top { leaf name { type string; } } }",
        Format::Yang,
    )
    .unwrap();
    ctx.parse_module(
        "module add-on { namespace \"urn:add-on\"; prefix a; \
         import base { prefix b; } \
         augment \"/b:top\" { leaf extra { type int8; } } }",
        Format::Yang,
    )
    .unwrap();

    let extra = node(&ctx, "/base:top/extra");
    let top = node(&ctx, "/base:top");
    // The grafted node belongs to the augmenting module.
    assert_ne!(extra.qname.module, top.qname.module);
}

#[test]
fn cross_module_augments_must_not_add_mandatory_nodes() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module base { namespace \"urn:base\"; prefix b; \
         container top { leaf name { type string; } } }",
        Format::Yang,
    )
    .unwrap();
    let err = ctx
        .parse_module(
            "module add-on { namespace \"urn:add-on\"; prefix a; \
             import base { prefix b; } \
             augment \"/b:top\" { leaf extra { type int8; mandatory true; } } }",
            Format::Yang,
        )
        .expect_err("mandatory augment into a foreign module");
    assert!(matches!(
        err,
        Error::Validation { code: "mandatory-augment", .. }
    ));

    // The failed pass rolled its insertion back; base is untouched and the
    // context stays usable. The mandatory propagation that ran before the
    // rejection must be rolled back too.
    assert!(ctx.find_node("/base:top/extra").is_none());
    let top = node(&ctx, "/base:top");
    assert_eq!(top.children.len(), 1);
    assert!(!top.mandatory);
    let SchemaNodeKind::Container {
        mandatory_children, ..
    } = top.kind
    else {
        panic!("expected a container");
    };
    assert_eq!(mandatory_children, 0);
    ctx.parse_module(
        "module other { namespace \"urn:other\"; prefix o; leaf ok { type string; } }",
        Format::Yang,
    )
    .expect("context is usable after a failed pass");
}

#[test]
fn augment_targets_must_accept_children() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type string; } \
         augment \"/l\" { leaf x { type string; } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "invalid-augment-target", .. }
    ));
}

#[test]
fn augment_status_caps_introduced_nodes() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container top { status deprecated; } \
         augment \"/top\" { leaf extra { type string; } } }",
    );
    assert_eq!(
        node(&ctx, "/m:top/extra").status,
        ryang::schema::parsed::Status::Deprecated
    );
}

#[test]
fn augment_into_rpc_io_nodes() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         rpc run; \
         augment \"/run/input\" { leaf arg { type string; } } }",
    );
    let SchemaNodeKind::Leaf { .. } = node(&ctx, "/m:run/input/arg").kind else {
        panic!("expected leaf under input");
    };
}
