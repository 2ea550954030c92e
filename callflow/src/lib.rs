//! # Callflow
//!
//! The execution runtime for generated remote-call clients.
//!
//! Callflow carries one typed operation from input to output through a
//! fixed five-phase middleware pipeline:
//!
//! - **Typed pipeline**: Initialize, Serialize, Build, Finalize, and
//!   Deserialize steps with before/after middleware around each baseline
//! - **Retry engine**: classified failures, exponential backoff with full
//!   jitter, and a separate throttling curve
//! - **Replayable bodies**: buffered and seekable payloads replay across
//!   attempts; consumed one-shot streams fail the retry instead of
//!   silently re-sending nothing
//! - **Call context**: a typed attribute bag threads cross-cutting state
//!   through every middleware
//! - **Cancellation**: cooperative tokens raced against sends and backoff
//!   sleeps, with timeouts as a cancellation cause
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use callflow::prelude::*;
//!
//! let config = RuntimeConfiguration::builder("catalog", "catalog-client")
//!     .with_transport(transport)
//!     .with_endpoint(Endpoint::new("api.example.com"))
//!     .build()?;
//!
//! let stack: OperationStack<GetItemInput, GetItemOutput> =
//!     OperationStack::standard("GetItem", Method::Get, "/items", &config);
//!
//! let mut ctx = AttributeContext::new();
//! let output = stack.execute(&config, &mut ctx, input).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod body;
pub mod cancellation;
pub mod codec;
pub mod config;
pub mod context;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod retry;
pub mod testing;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::{BufferedStream, ByteStream, ForwardOnlyStream, ReplayableBody};
    pub use crate::cancellation::{CancellationCause, CancellationToken};
    pub use crate::codec::{Codec, JsonCodec};
    pub use crate::config::{
        IdempotencyTokenGenerator, RuntimeConfiguration, UuidTokenGenerator,
    };
    pub use crate::context::{keys, AttributeContext, AttributeKey};
    pub use crate::errors::{CallFailure, ClientError, ErrorKind};
    pub use crate::logging::{AttemptRecord, ClientLogMode, LogSink};
    pub use crate::middleware::{
        Flow, Middleware, OperationStack, Passthrough, Phase, Step, Transform,
    };
    pub use crate::retry::{
        DefaultClassifier, ErrorClassifier, JitterMode, RetryClass, RetryEngine, RetryReport,
        RetryStrategyOptions,
    };
    pub use crate::transport::{
        Endpoint, Method, NullTransport, OperationRequest, OperationResponse, Transport,
    };
}
