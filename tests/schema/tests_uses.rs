//! Grouping expansion: uses, refine, uses-level augment, self-checks.

use std::rc::Rc;

use ryang::schema::compiled::{SchemaNodeKind, TypeDetails, TypeKind};
use ryang::{Error, Format};

use crate::helpers::context_helpers::{
    compile_yang, compile_yang_err, ext_context, node, node_id,
};
use crate::helpers::source_fixtures::EXT_YANG;

#[test]
fn uses_fixture_expands_with_refines_and_augment() {
    let mut ctx = ext_context();
    ctx.parse_module(EXT_YANG, Format::Yang).expect("fixture compiles");

    // refine "c": presence and config.
    let c = node(&ctx, "/ext:c");
    assert!(matches!(
        c.kind,
        SchemaNodeKind::Container { presence: true, .. }
    ));
    assert!(!c.config);

    // refine "l": mandatory; the identityref base survives expansion.
    let l = node(&ctx, "/ext:l");
    assert!(l.mandatory);
    let SchemaNodeKind::Leaf { ty, .. } = &l.kind else {
        panic!("expected leaf");
    };
    assert_eq!(ty.kind, TypeKind::IdentityRef);
    let TypeDetails::IdentityRef { bases, .. } = &ty.details else {
        panic!("expected identityref details");
    };
    assert_eq!(bases.len(), 1);

    // refine "ll1": cardinality.
    let SchemaNodeKind::LeafList {
        min_elements,
        max_elements,
        ..
    } = &node(&ctx, "/ext:ll1").kind
    else {
        panic!("expected leaf-list");
    };
    assert_eq!(*min_elements, 1);
    assert_eq!(
        *max_elements,
        ryang::schema::parsed::MaxElements::Limited(1)
    );

    // refine "ll2": replaced default sequence.
    let SchemaNodeKind::LeafList { defaults, .. } = &node(&ctx, "/ext:ll2").kind else {
        panic!("expected leaf-list");
    };
    let defaults: Vec<&str> = defaults.iter().map(|d| d.as_str()).collect();
    assert_eq!(defaults, vec!["1", "2"]);

    // augment "c": new child of type int8.
    let SchemaNodeKind::Leaf { ty, .. } = &node(&ctx, "/ext:c/a").kind else {
        panic!("expected leaf");
    };
    assert_eq!(ty.kind, TypeKind::Int8);
}

#[test]
fn choice_fixture_resolves_default_case_and_bits() {
    let mut ctx = ext_context();
    ctx.parse_module(EXT_YANG, Format::Yang).expect("fixture compiles");

    let SchemaNodeKind::Choice { default_case } = &node(&ctx, "/ext:ch").kind else {
        panic!("expected choice");
    };
    assert_eq!(*default_case, Some(node_id(&ctx, "/ext:ch/a")));

    let SchemaNodeKind::Leaf { ty, .. } = &node(&ctx, "/ext:ch/a/c").kind else {
        panic!("expected leaf");
    };
    let TypeDetails::Bits { bits } = &ty.details else {
        panic!("expected bits");
    };
    let table: Vec<(&str, u32)> = bits.iter().map(|b| (&*b.label, b.position)).collect();
    assert_eq!(table, vec![("zero", 0), ("one", 1)]);

    // The short-case leaf b sits inside its implicit case.
    let case_b = node(&ctx, "/ext:ch/b");
    assert!(case_b.is_case());
    let SchemaNodeKind::Leaf { ty, .. } = &node(&ctx, "/ext:ch/b/b").kind else {
        panic!("expected leaf");
    };
    let TypeDetails::Enumeration { enums } = &ty.details else {
        panic!("expected enumeration");
    };
    let table: Vec<(&str, i64)> = enums.iter().map(|e| (&*e.label, e.value)).collect();
    assert_eq!(table, vec![("one", 0), ("two", 2)]);
}

#[test]
fn when_on_uses_is_shared_by_all_expanded_children() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         grouping g { leaf a { type string; } leaf b { type string; } } \
         uses g { when \"true()\"; } }",
    );
    let a = node(&ctx, "/m:a");
    let b = node(&ctx, "/m:b");
    assert_eq!(a.when.len(), 1);
    assert_eq!(b.when.len(), 1);
    assert!(Rc::ptr_eq(&a.when[0], &b.when[0]));
}

#[test]
fn refine_statements_are_kind_checked() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         grouping g { leaf a { type string; } } \
         uses g { refine \"a\" { presence \"x\"; } } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-refine", .. }));
}

#[test]
fn refine_target_must_exist() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         grouping g { leaf a { type string; } } \
         uses g { refine \"missing\" { config false; } } }",
    );
    assert!(matches!(err, Error::NotFound { kind: "refine target", .. }));
}

#[test]
fn unknown_grouping_is_not_found() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; uses nothing; }",
    );
    assert!(matches!(err, Error::NotFound { kind: "grouping", .. }));
}

#[test]
fn self_referential_groupings_are_cycles() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         grouping g { container c { uses g; } } \
         uses g; }",
    );
    assert!(matches!(err, Error::Cycle { kind: "grouping", .. }));
}

#[test]
fn unused_groupings_are_still_checked() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         grouping broken { leaf x { type no-such-type; } } \
         leaf ok { type string; } }",
    );
    assert!(matches!(err, Error::NotFound { kind: "typedef", .. }));
}

#[test]
fn nested_groupings_resolve_innermost_first() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         grouping g { leaf outer { type string; } } \
         container c { \
           grouping g { leaf inner { type string; } } \
           uses g; } }",
    );
    assert!(ctx.find_node("/m:c/inner").is_some());
    assert!(ctx.find_node("/m:c/outer").is_none());
}

#[test]
fn cross_module_groupings_resolve_in_their_own_scope() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module lib { namespace \"urn:lib\"; prefix lib; \
         typedef port { type uint16 { range \"1..1024\"; } } \
         grouping endpoint { leaf port { type port; } } }",
        Format::Yang,
    )
    .unwrap();
    ctx.parse_module(
        "module app { namespace \"urn:app\"; prefix app; \
         import lib { prefix lib; } \
         uses lib:endpoint; }",
        Format::Yang,
    )
    .unwrap();
    let SchemaNodeKind::Leaf { ty, .. } = &node(&ctx, "/app:port").kind else {
        panic!("expected leaf");
    };
    assert_eq!(ty.kind, TypeKind::Uint16);
    assert_eq!(ty.typedef.as_deref(), Some("port"));
}
