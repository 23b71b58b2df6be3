//! Feature evaluation and if-feature gating.

use ryang::{Error, Format};

use crate::helpers::context_helpers::{compile_yang_err, ext_context};

#[test]
fn disabled_features_prune_gated_nodes() {
    let source = "module m { namespace \"urn:m\"; prefix m; \
         feature ssh; \
         leaf port { type uint16; if-feature ssh; } \
         leaf host { type string; } }";

    let mut ctx = ext_context();
    ctx.parse_module(source, Format::Yang).unwrap();
    assert!(ctx.find_node("/m:port").is_none());
    assert!(ctx.find_node("/m:host").is_some());

    let mut ctx = ext_context();
    ctx.enable_feature("m", "ssh");
    ctx.parse_module(source, Format::Yang).unwrap();
    assert!(ctx.find_node("/m:port").is_some());
}

#[test]
fn if_feature_expressions_combine() {
    let source = "module m { yang-version 1.1; namespace \"urn:m\"; prefix m; \
         feature a; feature b; \
         leaf l { type string; if-feature \"a and not b\"; } }";

    let mut ctx = ext_context();
    ctx.enable_feature("m", "a");
    ctx.parse_module(source, Format::Yang).unwrap();
    assert!(ctx.find_node("/m:l").is_some());

    let mut ctx = ext_context();
    ctx.enable_feature("m", "a");
    ctx.enable_feature("m", "b");
    ctx.parse_module(source, Format::Yang).unwrap();
    assert!(ctx.find_node("/m:l").is_none());
}

#[test]
fn features_gate_other_features() {
    let source = "module m { namespace \"urn:m\"; prefix m; \
         feature base; \
         feature extra { if-feature base; } \
         leaf l { type string; if-feature extra; } }";

    // Enabling extra without its prerequisite leaves it disabled.
    let mut ctx = ext_context();
    ctx.enable_feature("m", "extra");
    ctx.parse_module(source, Format::Yang).unwrap();
    assert!(ctx.find_node("/m:l").is_none());

    let mut ctx = ext_context();
    ctx.enable_feature("m", "base");
    ctx.enable_feature("m", "extra");
    ctx.parse_module(source, Format::Yang).unwrap();
    assert!(ctx.find_node("/m:l").is_some());
}

#[test]
fn features_resolve_across_imports() {
    let lib = "module lib { namespace \"urn:lib\"; prefix lib; feature tls; }";
    let app = "module app { namespace \"urn:app\"; prefix app; \
         import lib { prefix lib; } \
         leaf secure { type string; if-feature lib:tls; } }";

    let mut ctx = ext_context();
    ctx.enable_feature("lib", "tls");
    ctx.parse_module(lib, Format::Yang).unwrap();
    ctx.parse_module(app, Format::Yang).unwrap();
    assert!(ctx.find_node("/app:secure").is_some());
}

#[test]
fn unknown_features_are_not_found() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type string; if-feature ghost; } }",
    );
    assert!(matches!(err, Error::NotFound { kind: "feature", .. }));
}

#[test]
fn gated_enum_labels_disappear() {
    let source = "module m { yang-version 1.1; namespace \"urn:m\"; prefix m; \
         feature extended; \
         leaf l { type enumeration { enum basic; \
         enum extra { if-feature extended; } } } }";

    let mut ctx = ext_context();
    ctx.parse_module(source, Format::Yang).unwrap();
    let id = ctx.find_node("/m:l").unwrap();
    let node = ctx.pool().node(id);
    let ty = node.node_type().unwrap();
    let ryang::schema::compiled::TypeDetails::Enumeration { enums } = &ty.details else {
        panic!("expected enumeration");
    };
    assert_eq!(enums.len(), 1);
    assert_eq!(&*enums[0].label, "basic");
}
