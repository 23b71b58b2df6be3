//! Integration tests for the YIN reader.

use ryang::parser::statement::CoreStmt;
use ryang::parser::yin;

use crate::helpers::source_fixtures::EXT_YIN;

#[test]
fn parses_the_fullset_fixture() {
    let (module, namespaces) = yin::parse(EXT_YIN).unwrap();
    assert_eq!(module.arg.as_deref(), Some("ext"));

    // Document-element namespaces in declaration order.
    let uris: Vec<&str> = namespaces.iter().map(|n| n.uri.as_str()).collect();
    assert_eq!(
        uris,
        vec!["urn:ietf:params:xml:ns:yang:yin:1", "urn:ext", "urn:ext-def"]
    );

    // Three module-level extension instances, in order, with their args.
    let exts: Vec<_> = module.extensions().collect();
    assert_eq!(exts.len(), 3);
    assert_eq!(exts[0].arg, None);
    assert_eq!(exts[1].arg.as_deref(), Some("one"));
    assert_eq!(exts[2].arg.as_deref(), Some("one"));

    // yin-element arguments resolve to the <text> child.
    let import = module.find(CoreStmt::Import).unwrap();
    assert_eq!(import.find_arg(CoreStmt::Description).unwrap(), "desc");
    assert_eq!(import.find_arg(CoreStmt::Reference).unwrap(), "ref");

    // error-message nested under the pattern keeps its <value> argument.
    let leaf = module.find(CoreStmt::Leaf).unwrap();
    let ty = leaf.find(CoreStmt::Type).unwrap();
    let pattern = ty.find(CoreStmt::Pattern).unwrap();
    assert_eq!(pattern.find_arg(CoreStmt::ErrorMessage).unwrap(), "emsg");
    assert_eq!(
        pattern.find_arg(CoreStmt::Modifier).unwrap(),
        "invert-match"
    );
}

#[test]
fn rejects_unknown_elements() {
    let xml = r#"<module name="m" xmlns="urn:ietf:params:xml:ns:yang:yin:1">
  <namespace uri="urn:m"/>
  <prefix value="m"/>
  <bogus name="x"/>
</module>"#;
    assert!(yin::parse(xml).is_err());
}

#[test]
fn rejects_non_module_root() {
    assert!(yin::parse(r#"<container name="c"/>"#).is_err());
}
