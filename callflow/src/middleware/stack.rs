//! The operation stack: five phases around one transport exchange.
//!
//! `execute` drives Initialize and Serialize once, then Build, Finalize,
//! the transport send, and Deserialize once per physical attempt, with the
//! retry engine deciding between attempts. The stack seals itself at the
//! first execute; mutating a sealed stack is a setup error, so generated
//! clients can share one stack per operation across calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cancellation::CancellationToken;
use crate::config::RuntimeConfiguration;
use crate::context::{keys, AttributeContext};
use crate::errors::{CallFailure, ClientError, MiddlewareSetupError};
use crate::logging::AttemptRecord;
use crate::middleware::defaults::{
    CodecSerializer, ContentLength, DecodeResponse, IdempotencyTokenMiddleware, ResolveEndpoint,
};
use crate::middleware::{Flow, Phase, Step, Transform};
use crate::retry::{RetryEngine, Verdict};
use crate::transport::{Method, OperationRequest, OperationResponse};

/// A typed pipeline for one operation shape.
///
/// `I` is the operation's input type, `O` its output type. The five phase
/// steps are assembled before the first call and frozen afterwards.
pub struct OperationStack<I: Send + 'static, O: Send + 'static> {
    id: String,
    initialize: Step<I, I>,
    serialize: Step<I, OperationRequest>,
    build: Step<OperationRequest, OperationRequest>,
    finalize: Step<OperationRequest, OperationRequest>,
    deserialize: Step<OperationResponse, O>,
    sealed: AtomicBool,
}

impl<I: Send + 'static, O: Send + 'static> OperationStack<I, O> {
    /// Creates a stack with the given serialize and deserialize baselines.
    /// The other phases start as passthrough steps.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        serializer: Arc<dyn Transform<I, OperationRequest>>,
        deserializer: Arc<dyn Transform<OperationResponse, O>>,
    ) -> Self {
        Self {
            id: id.into(),
            initialize: Step::passthrough(Phase::Initialize),
            serialize: Step::new(Phase::Serialize, serializer),
            build: Step::passthrough(Phase::Build),
            finalize: Step::passthrough(Phase::Finalize),
            deserialize: Step::new(Phase::Deserialize, deserializer),
            sealed: AtomicBool::new(false),
        }
    }

    /// Returns the operation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn guard_unsealed(&self, phase: Phase) -> Result<(), MiddlewareSetupError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(MiddlewareSetupError::new(format!(
                "cannot modify the {phase} step of '{}': the stack has already executed",
                self.id
            )));
        }
        Ok(())
    }

    /// The initialize step, mutable until the stack executes.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] once the stack is sealed.
    pub fn initialize_step(&mut self) -> Result<&mut Step<I, I>, MiddlewareSetupError> {
        self.guard_unsealed(Phase::Initialize)?;
        Ok(&mut self.initialize)
    }

    /// The serialize step, mutable until the stack executes.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] once the stack is sealed.
    pub fn serialize_step(
        &mut self,
    ) -> Result<&mut Step<I, OperationRequest>, MiddlewareSetupError> {
        self.guard_unsealed(Phase::Serialize)?;
        Ok(&mut self.serialize)
    }

    /// The build step, mutable until the stack executes.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] once the stack is sealed.
    pub fn build_step(
        &mut self,
    ) -> Result<&mut Step<OperationRequest, OperationRequest>, MiddlewareSetupError> {
        self.guard_unsealed(Phase::Build)?;
        Ok(&mut self.build)
    }

    /// The finalize step, mutable until the stack executes.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] once the stack is sealed.
    pub fn finalize_step(
        &mut self,
    ) -> Result<&mut Step<OperationRequest, OperationRequest>, MiddlewareSetupError> {
        self.guard_unsealed(Phase::Finalize)?;
        Ok(&mut self.finalize)
    }

    /// The deserialize step, mutable until the stack executes.
    ///
    /// # Errors
    ///
    /// Returns [`MiddlewareSetupError`] once the stack is sealed.
    pub fn deserialize_step(
        &mut self,
    ) -> Result<&mut Step<OperationResponse, O>, MiddlewareSetupError> {
        self.guard_unsealed(Phase::Deserialize)?;
        Ok(&mut self.deserialize)
    }

    /// Executes the pipeline for one call.
    ///
    /// Initialize and Serialize run once; each physical attempt clones the
    /// serialized request (stream bodies are shared handles, so a clone
    /// observes the same read position). The retry engine decides between
    /// attempts; cancellation is observed before each attempt, during the
    /// transport send, and during backoff sleeps.
    ///
    /// # Errors
    ///
    /// Returns a [`CallFailure`] carrying the terminal [`ClientError`],
    /// the attempt count, and the total elapsed time.
    pub async fn execute(
        &self,
        config: &RuntimeConfiguration,
        ctx: &mut AttributeContext,
        input: I,
    ) -> Result<O, CallFailure> {
        let started = Instant::now();
        self.sealed.store(true, Ordering::SeqCst);
        ctx.set(&keys::OPERATION_ID, self.id.clone());

        let cancel = ctx.get(&keys::CANCELLATION);
        let fail0 = |error: ClientError| CallFailure::new(error, 0, started.elapsed());

        // Initialize and Serialize run once per call, not per attempt.
        let input = match self.initialize.run(ctx, input).await.map_err(fail0)? {
            Flow::Continue(input) => input,
            Flow::Respond(response) => {
                // Synthesized before a request existed: deserialize it
                // directly, with no transport and no retries.
                return self.deserialize_once(ctx, response).await.map_err(fail0);
            }
        };

        let request = match self.serialize.run(ctx, input).await.map_err(fail0)? {
            Flow::Continue(request) => request,
            Flow::Respond(response) => {
                return self.deserialize_once(ctx, response).await.map_err(fail0);
            }
        };

        let engine = RetryEngine::new(config.retry_options.clone(), config.classifier.clone());
        let mut session = engine.begin().map_err(fail0)?;

        loop {
            if let Some(token) = &cancel {
                if token.is_cancelled() {
                    session.abort();
                    ctx.set(&keys::RETRY_REPORT, session.report());
                    return Err(CallFailure::new(
                        token.to_error().into(),
                        session.attempts_made(),
                        started.elapsed(),
                    ));
                }
            }

            let attempt = session.begin_attempt();
            let attempt_started = Instant::now();
            tracing::debug!(operation_id = %self.id, attempt, "starting attempt");

            let mut status_code = None;
            let outcome = self
                .run_attempt(config, ctx, request.clone(), cancel.as_ref(), &mut status_code)
                .await;

            let label = match &outcome {
                Ok(_) => "success".to_string(),
                Err(error) => error.kind().as_str().to_string(),
            };
            self.emit_record(
                config,
                attempt,
                &request,
                status_code,
                attempt_started.elapsed(),
                label,
            );

            let error = match outcome {
                Ok(output) => {
                    session.complete_success();
                    ctx.set(&keys::RETRY_REPORT, session.report());
                    return Ok(output);
                }
                Err(error) => error,
            };

            match session.complete_failure(error, &request.body) {
                Verdict::Surface(error) => {
                    ctx.set(&keys::RETRY_REPORT, session.report());
                    return Err(CallFailure::new(
                        error,
                        session.attempts_made(),
                        started.elapsed(),
                    ));
                }
                Verdict::Retry { delay } => {
                    tracing::debug!(
                        operation_id = %self.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after backoff"
                    );
                    match &cancel {
                        Some(token) => tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = token.cancelled() => {
                                session.abort();
                                ctx.set(&keys::RETRY_REPORT, session.report());
                                return Err(CallFailure::new(
                                    token.to_error().into(),
                                    session.attempts_made(),
                                    started.elapsed(),
                                ));
                            }
                        },
                        None => tokio::time::sleep(delay).await,
                    }
                }
            }
        }
    }

    /// Build, Finalize, the transport exchange, and Deserialize, for one
    /// attempt. A `Respond` from the request phases skips straight to
    /// Deserialize with the synthesized response.
    async fn run_attempt(
        &self,
        config: &RuntimeConfiguration,
        ctx: &mut AttributeContext,
        prepared: OperationRequest,
        cancel: Option<&Arc<CancellationToken>>,
        status_code: &mut Option<u16>,
    ) -> Result<O, ClientError> {
        let response = 'resp: {
            let built = match self.build.run(ctx, prepared).await? {
                Flow::Continue(request) => request,
                Flow::Respond(response) => break 'resp response,
            };

            let finalized = match self.finalize.run(ctx, built).await? {
                Flow::Continue(request) => request,
                Flow::Respond(response) => break 'resp response,
            };

            let send = config.transport.send(finalized);
            match cancel {
                Some(token) => tokio::select! {
                    result = send => result?,
                    () = token.cancelled() => return Err(token.to_error().into()),
                },
                None => send.await?,
            }
        };

        *status_code = Some(response.status);
        self.deserialize_once(ctx, response).await
    }

    async fn deserialize_once(
        &self,
        ctx: &mut AttributeContext,
        response: OperationResponse,
    ) -> Result<O, ClientError> {
        match self.deserialize.run(ctx, response).await? {
            Flow::Continue(output) => Ok(output),
            Flow::Respond(_) => Err(MiddlewareSetupError::new(
                "a deserialize middleware answered with a new response; responses cannot re-enter the pipeline",
            )
            .into()),
        }
    }

    fn emit_record(
        &self,
        config: &RuntimeConfiguration,
        attempt: u32,
        request: &OperationRequest,
        status_code: Option<u16>,
        elapsed: Duration,
        outcome: String,
    ) {
        let record = AttemptRecord {
            operation_id: self.id.clone(),
            attempt,
            method: config
                .log_mode
                .logs_request()
                .then(|| request.method.to_string()),
            path: config.log_mode.logs_request().then(|| request.path.clone()),
            status_code: if config.log_mode.logs_response() {
                status_code
            } else {
                None
            },
            elapsed,
            outcome,
        };
        config.log_sink.record(&record);
    }
}

impl<I, O> OperationStack<I, O>
where
    I: Serialize + Send + 'static,
    O: DeserializeOwned + Send + 'static,
{
    /// Assembles the standard stack for a serde-shaped operation: codec
    /// serialization and deserialization, idempotency token injection at
    /// initialize, endpoint resolution as the build baseline, and
    /// content-length stamping after it.
    #[must_use]
    pub fn standard(
        id: impl Into<String>,
        method: Method,
        path: impl Into<String>,
        config: &RuntimeConfiguration,
    ) -> Self {
        let mut stack = Self::new(
            id,
            Arc::new(CodecSerializer::new(method, path, config.codec.clone())),
            Arc::new(DecodeResponse::new(config.codec.clone())),
        );
        stack.initialize.before().append(Arc::new(
            IdempotencyTokenMiddleware::new(config.token_generator.clone()),
        ));
        stack.serialize.after().append(Arc::new(ContentLength));
        stack
            .build
            .set_transform(Arc::new(ResolveEndpoint::new(config.endpoint.clone())));
        stack
    }
}

impl<I: Send + 'static, O: Send + 'static> std::fmt::Debug for OperationStack<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationStack")
            .field("id", &self.id)
            .field("sealed", &self.sealed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
