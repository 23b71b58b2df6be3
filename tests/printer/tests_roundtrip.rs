//! Round-trip properties: YIN byte-exact, YANG structural, plus the
//! compile-twice idempotence check.

use ryang::Format;
use ryang::parser::yang;

use crate::helpers::context_helpers::{assert_same_shape, ext_context, node_id};
use crate::helpers::source_fixtures::{EXT_YANG, EXT_YIN};

#[test]
fn fullset_yin_round_trips_byte_exact() {
    let mut ctx = ext_context();
    let id = ctx.parse_module(EXT_YIN, Format::Yin).expect("fixture compiles");
    let printed = ctx.module(id).print(Format::Yin);
    assert_eq!(printed, EXT_YIN);
}

#[test]
fn inline_container_yin_round_trips_byte_exact() {
    let source = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<module name=\"ext\"\n\
        xmlns=\"urn:ietf:params:xml:ns:yang:yin:1\"\n\
        xmlns:x=\"urn:ext\"\n\
        xmlns:e=\"urn:ext-def\">\n\
  <namespace uri=\"urn:ext\"/>\n\
  <prefix value=\"x\"/>\n\
  <import module=\"ext-def\">\n\
    <prefix value=\"e\"/>\n\
  </import>\n\
  <container name=\"c\">\n\
    <presence value=\"test\">\n\
      <e:a/>\n\
      <e:b x=\"one\"/>\n\
      <e:c>\n\
        <e:y>one</e:y>\n\
      </e:c>\n\
    </presence>\n\
    <config value=\"false\">\n\
      <e:a/>\n\
    </config>\n\
    <description>\n\
      <e:a/>\n\
      <text>desc</text>\n\
    </description>\n\
  </container>\n\
</module>\n";
    let mut ctx = ext_context();
    let id = ctx.parse_module(source, Format::Yin).expect("module compiles");
    assert_eq!(ctx.module(id).print(Format::Yin), source);
}

#[test]
fn yang_fixture_round_trips_structurally() {
    let mut ctx = ext_context();
    let id = ctx.parse_module(EXT_YANG, Format::Yang).expect("fixture compiles");
    let printed = ctx.module(id).print(Format::Yang);
    let original = yang::parse(EXT_YANG).unwrap();
    let reparsed = yang::parse(&printed).unwrap();
    assert_eq!(original, reparsed);
}

#[test]
fn yang_module_prints_as_yin_with_extension_arguments() {
    let mut ctx = ext_context();
    let id = ctx.parse_module(EXT_YANG, Format::Yang).expect("fixture compiles");
    let yin = ctx.module(id).print(Format::Yin);
    // Argument syntax is back-filled from the extension definitions once
    // the module compiled.
    assert!(yin.contains("<e:b x=\"one\"/>"), "attribute-form argument:\n{yin}");
    assert!(yin.contains("<e:y>one</e:y>"), "element-form argument:\n{yin}");
    assert!(yin.contains("xmlns:e=\"urn:ext-def\""), "import namespace:\n{yin}");
}

#[test]
fn compiling_twice_yields_identical_trees() {
    let mut a = ext_context();
    let mut b = ext_context();
    a.parse_module(EXT_YANG, Format::Yang).unwrap();
    b.parse_module(EXT_YANG, Format::Yang).unwrap();
    for path in ["/ext:c", "/ext:l", "/ext:ll1", "/ext:ll2", "/ext:ch"] {
        assert_same_shape(&a, &b, node_id(&a, path), node_id(&b, path));
    }
}

#[test]
fn extension_instances_survive_compilation_in_order() {
    let mut ctx = ext_context();
    let id = ctx.parse_module(EXT_YIN, Format::Yin).unwrap();
    let compiled = ctx.module(id).compiled().unwrap();
    let names: Vec<&str> = compiled.exts.iter().map(|e| &*e.name).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(compiled.exts[0].arg, None);
    assert_eq!(compiled.exts[1].arg.as_deref(), Some("one"));
    assert_eq!(compiled.exts[2].arg.as_deref(), Some("one"));

    let zero = ctx.identity("ext", "zero").unwrap();
    let identity = ctx.pool().identity(zero);
    let names: Vec<&str> = identity.exts.iter().map(|e| &*e.name).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}
