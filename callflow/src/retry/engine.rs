//! The per-call retry state machine.
//!
//! One [`RetrySession`] drives one call:
//! `Idle → Attempting → {Succeeded | Retrying → Attempting | Exhausted |
//! FatalFailure}`. The session records every attempt with its computed
//! pre-delay and classified outcome, so tests and callers can observe the
//! engine's decisions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::body::ReplayableBody;
use crate::errors::{ClientError, ErrorKind};
use crate::retry::{apply_jitter, backoff_bound, ErrorClassifier, RetryClass, RetryStrategyOptions};

/// The engine's state for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No attempt has started.
    #[default]
    Idle,
    /// An attempt is in flight.
    Attempting,
    /// A retry was decided; the next attempt starts after the delay.
    Retrying,
    /// Terminal: the call produced an output.
    Succeeded,
    /// Terminal: the last allowed attempt failed with a retryable error.
    Exhausted,
    /// Terminal: a non-retryable condition surfaced immediately.
    FatalFailure,
}

/// The classified outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The attempt produced an output.
    Success,
    /// The attempt failed.
    Failure {
        /// The error kind.
        kind: ErrorKind,
        /// How the classifier judged it.
        class: RetryClass,
        /// A rendering of the error.
        message: String,
    },
}

/// One physical attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based attempt index.
    pub index: u32,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// The delay waited before this attempt. Zero for attempt 1.
    pub delay_before: Duration,
    /// The outcome, absent while the attempt is in flight.
    pub outcome: Option<AttemptOutcome>,
}

/// The attempt ledger for one call.
#[derive(Debug, Clone, Default)]
pub struct RetryReport {
    /// Every attempt, in order.
    pub attempts: Vec<Attempt>,
    /// The engine state when the report was taken.
    pub state: EngineState,
}

impl RetryReport {
    /// Returns the number of attempts made.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Returns the sum of all inter-attempt delays.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.attempts.iter().map(|a| a.delay_before).sum()
    }
}

/// What the caller must do after reporting a failed attempt.
#[derive(Debug)]
pub enum Verdict {
    /// Wait for `delay`, then run the next attempt.
    Retry {
        /// The jittered delay to wait before the next attempt.
        delay: Duration,
    },
    /// Stop and surface this error.
    Surface(ClientError),
}

/// Classifies failures and decides retry-or-surface for calls.
///
/// The engine itself is stateless across calls; per-call state lives in
/// the [`RetrySession`] it hands out, so independent calls share nothing
/// but the read-only options and classifier.
#[derive(Debug, Clone)]
pub struct RetryEngine {
    options: RetryStrategyOptions,
    classifier: Arc<dyn ErrorClassifier>,
}

impl RetryEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new(options: RetryStrategyOptions, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self {
            options,
            classifier,
        }
    }

    /// Returns the policy this engine applies.
    #[must_use]
    pub fn options(&self) -> &RetryStrategyOptions {
        &self.options
    }

    /// Starts a session for one call.
    ///
    /// # Errors
    ///
    /// Returns the policy's validation error, surfaced as a
    /// [`ClientError::Validation`].
    pub fn begin(&self) -> Result<RetrySession<'_>, ClientError> {
        self.options.validate()?;
        Ok(RetrySession {
            engine: self,
            state: EngineState::Idle,
            attempts: Vec::new(),
            pending_delay: Duration::ZERO,
        })
    }
}

/// Per-call retry state. Driven strictly sequentially; no two attempts of
/// the same call ever overlap.
#[derive(Debug)]
pub struct RetrySession<'a> {
    engine: &'a RetryEngine,
    state: EngineState,
    attempts: Vec<Attempt>,
    pending_delay: Duration,
}

impl RetrySession<'_> {
    /// Records the start of the next attempt and returns its 1-based
    /// index.
    pub fn begin_attempt(&mut self) -> u32 {
        let index = self.attempts.len() as u32 + 1;
        self.attempts.push(Attempt {
            index,
            started_at: Utc::now(),
            delay_before: self.pending_delay,
            outcome: None,
        });
        self.pending_delay = Duration::ZERO;
        self.state = EngineState::Attempting;
        index
    }

    /// Records a successful attempt and finishes the session.
    pub fn complete_success(&mut self) {
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome::Success);
        }
        self.state = EngineState::Succeeded;
    }

    /// Records a failed attempt, classifies it, and decides retry or
    /// surface.
    ///
    /// A retry verdict implies the request body has been rewound for the
    /// next attempt; a body that cannot be rewound turns the failure fatal
    /// with the triggering error attached as the cause.
    pub fn complete_failure(&mut self, error: ClientError, body: &ReplayableBody) -> Verdict {
        let class = self.engine.classifier.classify(&error);
        let failed_index = self.attempts.len() as u32;
        if let Some(attempt) = self.attempts.last_mut() {
            attempt.outcome = Some(AttemptOutcome::Failure {
                kind: error.kind(),
                class,
                message: error.to_string(),
            });
        }

        if class == RetryClass::NonRetryable {
            self.state = EngineState::FatalFailure;
            return Verdict::Surface(error);
        }

        if failed_index >= self.engine.options.max_attempts {
            self.state = EngineState::Exhausted;
            return Verdict::Surface(error);
        }

        if let Err(body_err) = body.rewind() {
            self.state = EngineState::FatalFailure;
            return Verdict::Surface(ClientError::BodyNotReplayable(
                body_err.with_cause(error),
            ));
        }

        let bound = backoff_bound(
            &self.engine.options,
            failed_index,
            class == RetryClass::Throttling,
        );
        let delay = apply_jitter(self.engine.options.jitter, bound);
        self.pending_delay = delay;
        self.state = EngineState::Retrying;
        Verdict::Retry { delay }
    }

    /// Marks the session aborted (cancellation during backoff or before an
    /// attempt).
    pub fn abort(&mut self) {
        self.state = EngineState::FatalFailure;
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Returns the number of attempts begun so far.
    #[must_use]
    pub fn attempts_made(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Takes a snapshot of the attempt ledger.
    #[must_use]
    pub fn report(&self) -> RetryReport {
        RetryReport {
            attempts: self.attempts.clone(),
            state: self.state,
        }
    }
}
