//! The typed middleware pipeline.
//!
//! An [`OperationStack`] carries one operation through five fixed phases,
//! each a [`Step`] of before/after [`Middleware`] around a baseline
//! [`Transform`]. [`defaults`] holds the stock pieces generated clients
//! assemble from.

pub mod defaults;
mod stack;
mod step;


pub use stack::OperationStack;
pub use step::{Chain, Flow, Middleware, Passthrough, Phase, Step, Transform};
