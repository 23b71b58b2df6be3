//! Identity compilation and the derived-from closure.

use ryang::{Error, Format};

use crate::helpers::context_helpers::{compile_yang_err, ext_context};

#[test]
fn derived_from_closure_within_one_module() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module m { namespace \"urn:m\"; prefix m; \
         identity zero; \
         identity one { base zero; } \
         identity two { base zero; base one; } }",
        Format::Yang,
    )
    .unwrap();

    let zero = ctx.identity("m", "zero").unwrap();
    let one = ctx.identity("m", "one").unwrap();
    let two = ctx.identity("m", "two").unwrap();

    let from_zero = ctx.pool().derived_from_set(zero);
    assert!(from_zero.contains(&one));
    assert!(from_zero.contains(&two));
    let from_one = ctx.pool().derived_from_set(one);
    assert_eq!(from_one, vec![two]);

    assert!(ctx.pool().is_derived_from(two, zero));
    assert!(ctx.pool().is_derived_from(two, one));
    assert!(!ctx.pool().is_derived_from(zero, two));
}

#[test]
fn derived_from_links_back_fill_across_imports() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module idbase { namespace \"urn:idbase\"; prefix ib; \
         identity zero; \
         identity one { base zero; } }",
        Format::Yang,
    )
    .unwrap();
    ctx.parse_module(
        "module derived { namespace \"urn:derived\"; prefix d; \
         import idbase { prefix ib; } \
         identity two { base ib:zero; base ib:one; } }",
        Format::Yang,
    )
    .unwrap();

    let zero = ctx.identity("idbase", "zero").unwrap();
    let one = ctx.identity("idbase", "one").unwrap();
    let two = ctx.identity("derived", "two").unwrap();

    let from_zero = ctx.pool().derived_from_set(zero);
    assert!(from_zero.contains(&one));
    assert!(from_zero.contains(&two));
    assert!(ctx.pool().derived_from_set(one).contains(&two));
}

#[test]
fn identity_base_cycles_are_rejected() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         identity a { base b; } \
         identity b { base a; } }",
    );
    assert!(matches!(err, Error::Cycle { kind: "identity base", .. }));
}

#[test]
fn unknown_base_identity_is_not_found() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         identity a { base ghost; } }",
    );
    assert!(matches!(err, Error::NotFound { kind: "identity", .. }));
}

#[test]
fn identityref_defaults_check_derivation() {
    let mut ctx = ext_context();
    ctx.parse_module(
        "module m { namespace \"urn:m\"; prefix m; \
         identity proto; \
         identity tcp { base proto; } \
         leaf transport { type identityref { base proto; } default tcp; } }",
        Format::Yang,
    )
    .unwrap();

    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         identity proto; \
         identity tcp { base proto; } \
         identity other; \
         leaf transport { type identityref { base proto; } default other; } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-value", .. }));
}
