//! Foundation types for the ryang toolchain.
//!
//! This module provides fundamental types used throughout the compiler:
//! - [`Name`], [`Interner`] - String interning
//! - [`Position`], [`Span`] - Line/column positions for statements
//!
//! This module has NO dependencies on other ryang modules.

mod intern;
mod position;

pub use intern::{Interner, Name};
pub use position::{Position, Span};
