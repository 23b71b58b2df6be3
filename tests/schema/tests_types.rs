//! Type compilation: typedef chains, restriction intersection, sharing.

use std::rc::Rc;

use once_cell::sync::Lazy;
use rstest::rstest;
use ryang::Error;
use ryang::schema::compiled::{SchemaNodeKind, TypeDetails, TypeKind};

use crate::helpers::context_helpers::{compile_yang, compile_yang_err, node};

/// Scenario module: typedef-backed leaf with inherited units and default,
/// plus an invert-match pattern on a plain string leaf.
static LEAF_MODULE: Lazy<String> = Lazy::new(|| {
    "module m { namespace \"urn:m\"; prefix m; \
     typedef length { type int8; units meter; default 10; } \
     leaf l { type string { pattern \"[a-z]\" { modifier invert-match; } } \
              units \"petipivo\"; config false; mandatory true; } \
     leaf d { type length; default 1; } }"
        .to_string()
});

fn leaf_type<'a>(
    ctx: &'a ryang::Context,
    path: &str,
) -> &'a Rc<ryang::schema::compiled::SchemaType> {
    match &node(ctx, path).kind {
        SchemaNodeKind::Leaf { ty, .. } => ty,
        other => panic!("expected leaf at {path}, got {}", other.name()),
    }
}

#[test]
fn inherited_pattern_units_and_default() {
    let (ctx, _) = compile_yang(&LEAF_MODULE);

    let l = node(&ctx, "/m:l");
    assert!(l.mandatory);
    assert!(!l.config);
    let SchemaNodeKind::Leaf { ty, units, .. } = &l.kind else {
        panic!("expected leaf");
    };
    assert_eq!(units.as_deref(), Some("petipivo"));
    let patterns = ty.patterns();
    assert_eq!(patterns.len(), 1);
    assert!(patterns[0].invert_match);
    // invert-match: anything matching [a-z] is rejected.
    assert!(!patterns[0].matches("a"));
    assert!(patterns[0].matches("A"));

    let d = node(&ctx, "/m:d");
    let SchemaNodeKind::Leaf { ty, units, default } = &d.kind else {
        panic!("expected leaf");
    };
    assert_eq!(ty.kind, TypeKind::Int8);
    assert_eq!(ty.typedef.as_deref(), Some("length"));
    assert_eq!(units.as_deref(), Some("meter"));
    assert_eq!(default.as_deref(), Some("1"));
}

#[test]
fn default_violating_an_inverted_pattern_fails() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type string { pattern \"[a-z]\" { modifier invert-match; } } \
         default \"a\"; } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-value", .. }));
}

#[test]
fn unrestricted_derived_types_share_one_compiled_type() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         typedef t { type string; } \
         leaf a { type t; } leaf b { type t; } }",
    );
    let ta = leaf_type(&ctx, "/m:a");
    let tb = leaf_type(&ctx, "/m:b");
    assert!(Rc::ptr_eq(ta, tb));
}

#[rstest]
#[case("5..7", true)]
#[case("1..10", true)]
#[case("5..20", false)]
#[case("0..3", false)]
fn derived_ranges_must_be_subsets(#[case] range: &str, #[case] ok: bool) {
    let source = format!(
        "module m {{ namespace \"urn:m\"; prefix m; \
         typedef t {{ type int8 {{ range \"1..10\"; }} }} \
         leaf l {{ type t {{ range \"{range}\"; }} }} }}"
    );
    let mut ctx = crate::helpers::context_helpers::ext_context();
    let result = ctx.parse_module(&source, ryang::Format::Yang);
    assert_eq!(result.is_ok(), ok, "range {range}");
    if !ok {
        assert!(matches!(
            result.unwrap_err(),
            Error::Validation { code: "empty-range-intersection", .. }
        ));
    }
}

#[test]
fn typedef_chains_must_not_cycle() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         typedef a { type b; } typedef b { type a; } \
         leaf l { type a; } }",
    );
    assert!(matches!(err, Error::Cycle { kind: "typedef", .. }));
}

#[test]
fn enumeration_subset_keeps_base_values() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         typedef colors { type enumeration { enum red; enum green; enum blue; } } \
         leaf l { type colors { enum red; enum blue; } } }",
    );
    let ty = leaf_type(&ctx, "/m:l");
    let TypeDetails::Enumeration { enums } = &ty.details else {
        panic!("expected enumeration");
    };
    let table: Vec<(&str, i64)> = enums.iter().map(|e| (&*e.label, e.value)).collect();
    assert_eq!(table, vec![("red", 0), ("blue", 2)]);
}

#[test]
fn enumeration_subset_cannot_change_values() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         typedef colors { type enumeration { enum red; enum green; } } \
         leaf l { type colors { enum red { value 7; } } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "enum-value-mismatch", .. }
    ));
}

#[test]
fn enumeration_subset_requires_known_labels() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         typedef colors { type enumeration { enum red; } } \
         leaf l { type colors { enum black; } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "enum-not-in-base", .. }
    ));
}

#[test]
fn bit_positions_auto_assign_upward() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf flags { type bits { bit zero { position 0; } bit one; bit five { position 5; } bit six; } } }",
    );
    let ty = leaf_type(&ctx, "/m:flags");
    let TypeDetails::Bits { bits } = &ty.details else {
        panic!("expected bits");
    };
    let table: Vec<(&str, u32)> = bits.iter().map(|b| (&*b.label, b.position)).collect();
    assert_eq!(
        table,
        vec![("zero", 0), ("one", 1), ("five", 5), ("six", 6)]
    );
}

#[test]
fn decimal64_requires_fraction_digits() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; leaf l { type decimal64; } }",
    );
    assert!(matches!(err, Error::Validation { code: "incomplete-type", .. }));

    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type decimal64 { fraction-digits 2; range \"1.5..3.5\"; } default 2.25; } }",
    );
    let ty = leaf_type(&ctx, "/m:l");
    assert_eq!(ty.kind, TypeKind::Decimal64);
    let TypeDetails::Decimal { fraction_digits, ranges } = &ty.details else {
        panic!("expected decimal details");
    };
    assert_eq!(*fraction_digits, 2);
    assert_eq!((ranges[0].lo, ranges[0].hi), (150, 350));
}

#[test]
fn fraction_digits_set_once_per_chain() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         typedef t { type decimal64 { fraction-digits 2; } } \
         leaf l { type t { fraction-digits 4; } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "fraction-digits-redefined", .. }
    ));
}

#[test]
fn union_members_compile_and_check_defaults() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type union { type int8; type string { length \"1..3\"; } } default \"zz\"; } }",
    );
    let ty = leaf_type(&ctx, "/m:l");
    let TypeDetails::Union { members } = &ty.details else {
        panic!("expected union");
    };
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].kind, TypeKind::Int8);
    assert_eq!(members[1].kind, TypeKind::String);
}

#[test]
fn no_union_member_accepting_the_default_fails() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type union { type int8; type string { length \"1..3\"; } } \
         default \"zzzz\"; } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-value", .. }));
}

#[test]
fn leafref_realizes_the_target_type() {
    let (ctx, _) = compile_yang(
        "module m { namespace \"urn:m\"; prefix m; \
         container cfg { leaf name { type string; } \
         leaf alias { type leafref { path \"../name\"; } } } }",
    );
    let ty = leaf_type(&ctx, "/m:cfg/alias");
    assert_eq!(ty.kind, TypeKind::Leafref);
    let TypeDetails::Leafref { realized, require_instance, .. } = &ty.details else {
        panic!("expected leafref details");
    };
    assert!(*require_instance);
    let realized = realized.borrow();
    assert_eq!(realized.as_ref().unwrap().kind, TypeKind::String);
}

#[test]
fn length_restriction_bounds_defaults() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type string { length \"2..4\"; } default \"x\"; } }",
    );
    assert!(matches!(err, Error::Validation { code: "invalid-value", .. }));
}

#[test]
fn restrictions_must_match_the_kind() {
    let err = compile_yang_err(
        "module m { namespace \"urn:m\"; prefix m; \
         leaf l { type int8 { length \"1..2\"; } } }",
    );
    assert!(matches!(
        err,
        Error::Validation { code: "invalid-restriction", .. }
    ));
}
