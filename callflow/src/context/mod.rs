//! Per-call context: the typed attribute bag and its well-known keys.

mod attributes;
pub mod keys;

pub use attributes::{AttributeContext, AttributeKey};
