//! Regex provider for `pattern` restrictions.
//!
//! YANG patterns use W3C XML Schema regular expressions, which are implicitly
//! anchored: a value matches only when the whole value matches. The provider
//! anchors the translated expression accordingly before handing it to the
//! regex engine.

use regex::Regex;

use crate::error::{Error, Result};

/// Compile a pattern into a ready-to-match engine handle.
pub fn compile(source: &str) -> Result<Regex> {
    Regex::new(&anchored(source)).map_err(|e| {
        Error::validation(
            "invalid-pattern",
            format!("pattern '{source}' is not a valid regular expression: {e}"),
        )
    })
}

/// Syntax-check a pattern, discarding the compiled form. Same validation as
/// [`compile`], used where only validity matters.
pub fn check(source: &str) -> Result<()> {
    compile(source).map(drop)
}

fn anchored(source: &str) -> String {
    format!("^(?:{source})$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_pattern_compiles() {
        assert!(check("[a-z]").is_ok());
        assert!(check("[0-9a-fA-F]*").is_ok());
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let err = check("[a-").unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                code: "invalid-pattern",
                ..
            }
        ));
    }

    #[test]
    fn matching_is_anchored() {
        let re = compile("[a-z]").unwrap();
        assert!(re.is_match("a"));
        assert!(!re.is_match("ab"));
        assert!(!re.is_match("0a"));
    }
}
