//! Middleware chain primitives.
//!
//! Each pipeline phase is a [`Step`]: an ordered `before` chain, one
//! baseline [`Transform`], and an ordered `after` chain. Middleware either
//! continue with a (possibly modified) value or short-circuit the attempt
//! by answering with a synthesized response.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::AttributeContext;
use crate::errors::{ClientError, MiddlewareSetupError};
use crate::transport::OperationResponse;

/// The fixed pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Prepare call-wide input state (defaults, idempotency tokens).
    Initialize,
    /// Turn the typed input into a wire request.
    Serialize,
    /// Stamp protocol-level request details.
    Build,
    /// Last touch before the transport (signing, endpoint resolution).
    Finalize,
    /// Turn the wire response into the typed output.
    Deserialize,
}

impl Phase {
    /// Returns a stable label for log records and span fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Serialize => "serialize",
            Self::Build => "build",
            Self::Finalize => "finalize",
            Self::Deserialize => "deserialize",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one middleware or one step.
///
/// `Respond` short-circuits the attempt: remaining middleware, later
/// phases, and the transport send are skipped, and the synthesized
/// response enters the pipeline at the deserialize phase.
#[derive(Debug)]
pub enum Flow<T> {
    /// Keep going with this value.
    Continue(T),
    /// Stop and treat this as the wire response.
    Respond(OperationResponse),
}

/// A named unit of work positioned around a phase's baseline transform.
#[async_trait]
pub trait Middleware<T: Send + 'static>: Send + Sync {
    /// Returns the middleware's name, used for anchored insertion and logs.
    fn name(&self) -> &str;

    /// Processes the in-flight value.
    async fn handle(
        &self,
        ctx: &mut AttributeContext,
        value: T,
    ) -> Result<Flow<T>, ClientError>;
}

/// A phase's baseline work: the type-changing transformation the
/// surrounding middleware decorate.
#[async_trait]
pub trait Transform<T: Send + 'static, U: Send + 'static>: Send + Sync {
    /// Applies the transformation.
    async fn apply(&self, ctx: &mut AttributeContext, value: T) -> Result<U, ClientError>;
}

/// The identity transform, the default for phases that keep their type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl<T: Send + 'static> Transform<T, T> for Passthrough {
    async fn apply(&self, _ctx: &mut AttributeContext, value: T) -> Result<T, ClientError> {
        Ok(value)
    }
}

/// An ordered list of middleware over one value type.
pub struct Chain<T: Send + 'static> {
    entries: Vec<Arc<dyn Middleware<T>>>,
}

impl<T: Send + 'static> Default for Chain<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Send + 'static> Chain<T> {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware at the end.
    pub fn append(&mut self, middleware: Arc<dyn Middleware<T>>) {
        self.entries.push(middleware);
    }

    /// Inserts a middleware immediately before the named anchor.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] when no middleware with that name
    /// is present.
    pub fn insert_before(
        &mut self,
        anchor: &str,
        middleware: Arc<dyn Middleware<T>>,
    ) -> Result<(), MiddlewareSetupError> {
        let index = self.position_of(anchor)?;
        self.entries.insert(index, middleware);
        Ok(())
    }

    /// Inserts a middleware immediately after the named anchor.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] when no middleware with that name
    /// is present.
    pub fn insert_after(
        &mut self,
        anchor: &str,
        middleware: Arc<dyn Middleware<T>>,
    ) -> Result<(), MiddlewareSetupError> {
        let index = self.position_of(anchor)?;
        self.entries.insert(index + 1, middleware);
        Ok(())
    }

    fn position_of(&self, anchor: &str) -> Result<usize, MiddlewareSetupError> {
        self.entries
            .iter()
            .position(|m| m.name() == anchor)
            .ok_or_else(|| {
                MiddlewareSetupError::new(format!("no middleware named '{anchor}' to anchor on"))
            })
    }

    /// Returns the middleware names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of middleware in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the chain holds no middleware.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the chain in order, threading the value through each entry.
    pub async fn run(
        &self,
        ctx: &mut AttributeContext,
        mut value: T,
    ) -> Result<Flow<T>, ClientError> {
        for middleware in &self.entries {
            match middleware.handle(ctx, value).await? {
                Flow::Continue(next) => value = next,
                Flow::Respond(response) => return Ok(Flow::Respond(response)),
            }
        }
        Ok(Flow::Continue(value))
    }
}

impl<T: Send + 'static> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|m| m.name()))
            .finish()
    }
}

/// One pipeline phase: `before` middleware, the baseline transform, then
/// `after` middleware over the transformed value.
pub struct Step<T: Send + 'static, U: Send + 'static> {
    phase: Phase,
    before: Chain<T>,
    transform: Arc<dyn Transform<T, U>>,
    after: Chain<U>,
}

impl<T: Send + 'static, U: Send + 'static> Step<T, U> {
    /// Creates a step with the given baseline transform.
    #[must_use]
    pub fn new(phase: Phase, transform: Arc<dyn Transform<T, U>>) -> Self {
        Self {
            phase,
            before: Chain::new(),
            transform,
            after: Chain::new(),
        }
    }

    /// Returns the phase this step implements.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Replaces the baseline transform.
    pub fn set_transform(&mut self, transform: Arc<dyn Transform<T, U>>) {
        self.transform = transform;
    }

    /// The middleware that run before the baseline transform.
    pub fn before(&mut self) -> &mut Chain<T> {
        &mut self.before
    }

    /// The middleware that run after the baseline transform.
    pub fn after(&mut self) -> &mut Chain<U> {
        &mut self.after
    }

    /// Runs the step: before chain, baseline transform, after chain.
    pub async fn run(&self, ctx: &mut AttributeContext, input: T) -> Result<Flow<U>, ClientError> {
        let value = match self.before.run(ctx, input).await? {
            Flow::Continue(value) => value,
            Flow::Respond(response) => return Ok(Flow::Respond(response)),
        };

        let transformed = self.transform.apply(ctx, value).await?;
        self.after.run(ctx, transformed).await
    }
}

impl<T: Send + 'static> Step<T, T> {
    /// Creates a step whose baseline is the identity transform.
    #[must_use]
    pub fn passthrough(phase: Phase) -> Self {
        Self::new(phase, Arc::new(Passthrough))
    }
}

impl<T: Send + 'static, U: Send + 'static> std::fmt::Debug for Step<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("phase", &self.phase)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}
