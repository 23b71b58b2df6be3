//! Module sources shared across tests.

/// The extension-defining dependency of the `ext` fixtures.
pub const EXT_DEF: &str = "\
module ext-def {
  yang-version 1.1;
  namespace \"urn:ext-def\";
  prefix e;

  extension a;

  extension b {
    argument x;
  }

  extension c {
    argument y {
      yin-element true;
    }
  }
}
";

/// The submodule included by the fullset YIN fixture.
pub const EXT_INC: &str = "\
submodule ext-inc {
  yang-version 1.1;
  belongs-to ext {
    prefix x;
  }
}
";

/// Fullset YIN fixture; parse/print must reproduce it byte for byte.
pub const EXT_YIN: &str = include_str!("../fixtures/ext.yin");

/// Uses/refine/augment/choice fixture in YANG syntax.
pub const EXT_YANG: &str = include_str!("../fixtures/ext.yang");
