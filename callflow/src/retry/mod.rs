//! Retry policy, failure classification, and the per-call retry engine.
//!
//! Backoff is exponential with a cap and optional full jitter; throttling-
//! class errors feed a longer base into the same curve. The engine itself
//! lives in [`engine`]; it is driven strictly sequentially for one call and
//! shares nothing mutable across calls.

mod classifier;
mod engine;

use std::time::Duration;

use rand::Rng;

use crate::errors::ValidationError;

pub use classifier::{DefaultClassifier, ErrorClassifier, RetryClass};
pub use engine::{
    Attempt, AttemptOutcome, EngineState, RetryEngine, RetryReport, RetrySession, Verdict,
};

/// Jitter applied to computed backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitterMode {
    /// Use the computed delay as-is.
    None,
    /// Pick uniformly in `[0, delay]`.
    #[default]
    Full,
}

/// Immutable retry policy, part of the runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategyOptions {
    /// Maximum physical attempts per call, including the first. Must be
    /// at least 1.
    pub max_attempts: u32,
    /// Base delay for the exponential curve.
    pub base_delay: Duration,
    /// Base delay used instead when the triggering error is
    /// throttling-class.
    pub throttling_base_delay: Duration,
    /// Cap applied to every computed delay.
    pub max_delay: Duration,
    /// Jitter mode.
    pub jitter: JitterMode,
}

impl Default for RetryStrategyOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            throttling_base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
            jitter: JitterMode::Full,
        }
    }
}

impl RetryStrategyOptions {
    /// Creates options with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the throttling base delay.
    #[must_use]
    pub fn with_throttling_base_delay(mut self, delay: Duration) -> Self {
        self.throttling_base_delay = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter mode.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterMode) -> Self {
        self.jitter = jitter;
        self
    }

    /// Checks the policy invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `max_attempts` is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::new("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// Computes the pre-jitter backoff bound after `failed_attempt` (1-based):
/// `min(max_delay, base * 2^(failed_attempt - 1))`.
#[must_use]
pub fn backoff_bound(
    options: &RetryStrategyOptions,
    failed_attempt: u32,
    throttling: bool,
) -> Duration {
    let base = if throttling {
        options.throttling_base_delay
    } else {
        options.base_delay
    };

    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let shift = failed_attempt.saturating_sub(1).min(32);
    let factor = 2u64.saturating_pow(shift);
    let delay_ms = base_ms.saturating_mul(factor);

    Duration::from_millis(delay_ms).min(options.max_delay)
}

/// Applies jitter to a computed delay.
#[must_use]
pub fn apply_jitter(mode: JitterMode, delay: Duration) -> Duration {
    match mode {
        JitterMode::None => delay,
        JitterMode::Full => {
            let upper = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            if upper == 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(rand::thread_rng().gen_range(0..=upper))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = RetryStrategyOptions::default();
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.jitter, JitterMode::Full);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let options = RetryStrategyOptions::new()
            .with_max_attempts(5)
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2))
            .with_jitter(JitterMode::None);

        assert_eq!(options.max_attempts, 5);
        assert_eq!(options.base_delay, Duration::from_millis(100));
        assert_eq!(options.max_delay, Duration::from_secs(2));
        assert_eq!(options.jitter, JitterMode::None);
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let options = RetryStrategyOptions::new().with_max_attempts(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let options = RetryStrategyOptions::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(2));

        assert_eq!(backoff_bound(&options, 1, false), Duration::from_millis(100));
        assert_eq!(backoff_bound(&options, 2, false), Duration::from_millis(200));
        assert_eq!(backoff_bound(&options, 3, false), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let options = RetryStrategyOptions::new()
            .with_base_delay(Duration::from_millis(1000))
            .with_max_delay(Duration::from_millis(5000));

        assert_eq!(backoff_bound(&options, 10, false), Duration::from_millis(5000));
    }

    #[test]
    fn test_throttling_uses_longer_base() {
        let options = RetryStrategyOptions::new()
            .with_base_delay(Duration::from_millis(100))
            .with_throttling_base_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(20));

        assert_eq!(backoff_bound(&options, 1, true), Duration::from_millis(500));
        assert_eq!(backoff_bound(&options, 2, true), Duration::from_millis(1000));
    }

    #[test]
    fn test_full_jitter_stays_within_bound() {
        let delay = Duration::from_millis(100);
        for _ in 0..50 {
            let jittered = apply_jitter(JitterMode::Full, delay);
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn test_no_jitter_is_identity() {
        let delay = Duration::from_millis(123);
        assert_eq!(apply_jitter(JitterMode::None, delay), delay);
    }
}
