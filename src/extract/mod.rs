//! Alert token template compilation and field extraction.
//!
//! An alert template interleaves literal text with `{{name}}` placeholders.
//! Compilation turns it into a single anchored regex whose non-greedy capture
//! groups line up with an ordered list of output field keys; extraction
//! applies that regex to a raw alert and coerces each capture to a typed
//! value.

pub mod cache;
pub mod fields;
pub mod pattern;

pub use cache::PatternCache;
pub use fields::{extract, template_matches};
pub use pattern::{compile, CompiledPattern, TemplateError};
