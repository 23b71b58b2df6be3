//! Error types for parsing and schema compilation.

use thiserror::Error;

use crate::base::Span;

/// A convenience wrapper around `Result` for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or compiling YANG modules.
///
/// The first error aborts the current compilation pass. A failed pass
/// releases its partial state and leaves the context usable.
#[derive(Debug, Error)]
pub enum Error {
    /// Statement-level syntax error in YANG or YIN input.
    #[error("parse error at {span_display}: {message}", span_display = DisplaySpan(.span))]
    Parse {
        message: String,
        span: Option<Span>,
    },

    /// Semantic rule violation in an otherwise well-formed module.
    #[error("{code}: {message}{}", DisplayPath(.path))]
    Validation {
        /// Stable machine-readable code, e.g. `empty-range-intersection`.
        code: &'static str,
        message: String,
        /// Schema path of the offending statement, when known.
        path: Option<String>,
        span: Option<Span>,
    },

    /// Unresolved reference: import, typedef, grouping, augment target,
    /// leafref target, identity, feature or extension definition.
    #[error("{kind} '{name}' not found{}", DisplayPath(.path))]
    NotFound {
        kind: &'static str,
        name: String,
        path: Option<String>,
    },

    /// Typedef chain, grouping reference, identity base or import graph
    /// forms a cycle.
    #[error("circular {kind} chain through '{name}'")]
    Cycle { kind: &'static str, name: String },

    /// The context cancel flag was raised mid-compilation.
    #[error("compilation cancelled")]
    Cancelled,

    /// Invariant violation inside the compiler itself. Should never occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::Parse {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            path: None,
            span: None,
        }
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
            path: None,
        }
    }

    pub fn cycle(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Cycle {
            kind,
            name: name.into(),
        }
    }

    /// Attach a schema path to a validation or not-found error.
    pub fn with_path(mut self, schema_path: impl Into<String>) -> Self {
        match &mut self {
            Self::Validation { path, .. } | Self::NotFound { path, .. } => {
                *path = Some(schema_path.into());
            }
            _ => {}
        }
        self
    }

    /// Attach a source span to a parse or validation error.
    pub fn with_span(mut self, at: Span) -> Self {
        match &mut self {
            Self::Parse { span, .. } | Self::Validation { span, .. } => {
                *span = Some(at);
            }
            _ => {}
        }
        self
    }

    /// Severity of the diagnostic. Everything the compiler emits today is an
    /// error; the accessor exists so callers can filter uniformly.
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

struct DisplayPath<'a>(&'a Option<String>);

impl std::fmt::Display for DisplayPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(path) => write!(f, " (at {path})"),
            None => Ok(()),
        }
    }
}

struct DisplaySpan<'a>(&'a Option<Span>);

impl std::fmt::Display for DisplaySpan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(span) => write!(f, "{}", span.start),
            None => write!(f, "<unknown>"),
        }
    }
}
