//! # ryang
//!
//! Core library for YANG 1.0/1.1 parsing, schema compilation, and semantic
//! analysis (RFC 7950 / RFC 6020).
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! context   → Module registry, compilation entry points
//!   ↓
//! printer   → YANG/YIN emitters over the statement tree
//!   ↓
//! schema    → Parsed tree (P), compiled tree (C), the compiler
//!   ↓
//! parser    → Logos lexer, statement parsers (YANG + YIN), P-tree builder
//!   ↓
//! xpath     → XPath expressions, leafref paths
//!   ↓
//! base      → Primitives (Name interning, Span/Position)
//! ```
//!
//! The usual entry point is [`Context::parse_module`], which parses a
//! module, loads its imports through the configured [`ModuleResolver`],
//! compiles everything, and returns a handle to the registered module:
//!
//! ```
//! use ryang::{Context, Format};
//!
//! let mut ctx = Context::new();
//! let id = ctx
//!     .parse_module(
//!         "module hello { namespace \"urn:hello\"; prefix h; leaf greeting { type string; } }",
//!         Format::Yang,
//!     )
//!     .unwrap();
//! assert_eq!(ctx.module(id).name(), "hello");
//! ```

/// Foundation types: Name interning, Span/Position
pub mod base;

/// XPath expression parsing for when/must and leafref paths
pub mod xpath;

/// Parser: logos lexer, YANG/YIN statement readers, P-tree builder
pub mod parser;

/// Schema: parsed and compiled representations, the compiler
pub mod schema;

/// Printer: YANG/YIN emitters
pub mod printer;

/// Context: module registry and compilation entry points
pub mod context;

pub mod error;

// Re-export the types almost every consumer needs.
pub use base::{Interner, Name, Position, Span};
pub use context::{CancelHandle, Context, Format, Module, ModuleResolver};
pub use error::{Error, Result, Severity};
