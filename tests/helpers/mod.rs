//! Shared helpers for the integration suite.

pub mod context_helpers;
pub mod source_fixtures;
