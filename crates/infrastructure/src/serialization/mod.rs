//! JSON helpers for human-readable output.
//!
//! Stable output means:
//! - Object keys in declaration or `BTreeMap` order
//! - 2-space indentation
//! - Trailing newline

mod json;

pub use json::*;
