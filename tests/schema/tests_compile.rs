//! Node compilation: flag inheritance, linking, keys, mandatory
//! propagation.

use ryang::Error;
use ryang::schema::compiled::SchemaNodeKind;

use crate::helpers::context_helpers::{compile_yang, compile_yang_err, node};

#[test]
fn config_is_inherited_and_checked() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { config false; leaf l { type string; } } }",
    );
    assert!(!node(&ctx, "/m:a/l").config);

    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { config false; leaf l { type string; config true; } } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-config", .. }));
}

#[test]
fn sibling_names_must_be_unique() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { leaf l { type string; } leaf l { type int8; } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "duplicate-node-name", .. }
    ));
}

#[test]
fn mandatory_propagates_into_nonpresence_containers() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { container b { leaf l { type string; mandatory true; } } } }",
    );
    assert!(node(&ctx, "/m:a/b/l").mandatory);
    assert!(node(&ctx, "/m:a/b").mandatory);
    assert!(node(&ctx, "/m:a").mandatory);
}

#[test]
fn presence_containers_absorb_the_obligation() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { container b { presence \"exists\"; \
         leaf l { type string; mandatory true; } } } }",
    );
    assert!(!node(&ctx, "/m:a/b").mandatory);
    assert!(!node(&ctx, "/m:a").mandatory);
}

#[test]
fn choices_do_not_bubble_mandatory_upward() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { choice ch { case x { leaf l { type string; mandatory true; } } } } }",
    );
    assert!(!node(&ctx, "/m:a").mandatory);
    assert!(!node(&ctx, "/m:a/ch").mandatory);
}

#[test]
fn mandatory_choice_counts_like_any_mandatory_child() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container a { choice ch { mandatory true; \
         case x { leaf l { type string; } } } } }",
    );
    assert!(node(&ctx, "/m:a/ch").mandatory);
    assert!(node(&ctx, "/m:a").mandatory);
}

#[test]
fn list_keys_resolve_to_direct_leaves() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         list entries { key \"name\"; \
         leaf name { type string; } leaf value { type int32; } } }",
    );
    let list = node(&ctx, "/m:entries");
    let SchemaNodeKind::List { keys, .. } = &list.kind else {
        panic!("expected a list");
    };
    assert_eq!(keys.len(), 1);
    assert!(ctx.pool().node(keys[0]).mandatory);
    assert_eq!(&*ctx.pool().node(keys[0]).qname.name, "name");
}

#[test]
fn configuration_list_requires_a_key() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         list entries { leaf name { type string; } } }",
    );
    assert!(matches!(err, Error::Validation { code: "missing-key", .. }));
}

#[test]
fn key_must_exist_and_be_a_leaf() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         list entries { key \"nope\"; leaf name { type string; } } }",
    );
    assert!(matches!(err, Error::NotFound { kind: "key leaf", .. }));

    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         list entries { key \"names\"; leaf-list names { type string; } } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-key", .. }));
}

#[test]
fn rpc_gets_implicit_input_and_output() {
    let (ctx, id) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; rpc ping; }",
    );
    let compiled = ctx.module(id).compiled().unwrap();
    assert_eq!(compiled.rpcs.len(), 1);
    assert!(node(&ctx, "/m:ping/input").config);
    assert!(!node(&ctx, "/m:ping/output").config);
}

#[test]
fn notification_subtrees_are_state_data() {
    let (ctx, id) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         notification event { leaf severity { type string; } } }",
    );
    let compiled = ctx.module(id).compiled().unwrap();
    assert_eq!(compiled.notifications.len(), 1);
    assert!(!node(&ctx, "/m:event").config);
    assert!(!node(&ctx, "/m:event/severity").config);
}

#[test]
fn mandatory_leaf_with_default_is_rejected() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type string; mandatory true; default \"x\"; } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "mandatory-default", .. }
    ));
}
