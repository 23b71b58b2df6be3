//! Integration tests for the YANG statement reader.

use ryang::parser::statement::{CoreStmt, Keyword};
use ryang::parser::yang;

use crate::helpers::source_fixtures::EXT_YANG;

#[test]
fn parses_the_uses_fixture() {
    let module = yang::parse(EXT_YANG).unwrap();
    assert_eq!(module.arg.as_deref(), Some("ext"));
    assert_eq!(module.all(CoreStmt::Identity).count(), 3);
    assert_eq!(module.all(CoreStmt::Grouping).count(), 1);

    let uses = module.find(CoreStmt::Uses).unwrap();
    assert_eq!(uses.all(CoreStmt::Refine).count(), 4);
    assert_eq!(uses.all(CoreStmt::Augment).count(), 1);
    // The extension instance on the uses comes before the refines.
    assert!(matches!(
        &uses.substmts[0].keyword,
        Keyword::Extension { prefix, name } if prefix == "e" && name == "a"
    ));
}

#[test]
fn extension_instances_keep_source_order() {
    let module = yang::parse(
        "module m { namespace \"urn:m\"; prefix m; e:b \"one\"; e:a; e:c \"two\"; }",
    )
    .unwrap();
    let names: Vec<String> = module
        .extensions()
        .map(|s| s.keyword.to_string())
        .collect();
    assert_eq!(names, vec!["e:b", "e:a", "e:c"]);
}

#[test]
fn multiline_double_quoted_strings_are_trimmed() {
    // Continuation lines lose indentation up to the opening quote column;
    // trailing whitespace before the break goes too.
    let module = yang::parse(
        "module m {\n  namespace \"urn:m\";\n  prefix m;\n  description \"one   \n    two\";\n}",
    )
    .unwrap();
    let desc = module.find_arg(CoreStmt::Description).unwrap();
    assert_eq!(desc, "one\ntwo");
}

#[test]
fn rejects_unterminated_module() {
    assert!(yang::parse("module m { namespace \"urn:m\";").is_err());
}

#[test]
fn rejects_double_argument() {
    assert!(yang::parse("module m extra { }").is_err());
}
