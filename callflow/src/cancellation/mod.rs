//! Cooperative cancellation for in-flight calls.

mod token;

pub use token::{CancellationCause, CancellationToken};
