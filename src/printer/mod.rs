//! Schema printers: emit the retained statement tree as YANG or YIN.
//!
//! Printing works from the statement tree, not the compiled tree, so
//! groupings, uses and extension instances come back out exactly where the
//! source put them. YIN output round-trips the YIN reader byte-exactly;
//! YANG output round-trips structurally.

pub mod yang;
pub mod yin;
