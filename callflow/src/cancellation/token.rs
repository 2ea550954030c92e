//! Cancellation token for cooperative call cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::errors::CancellationError;

/// Why a call was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationCause {
    /// The caller asked for cancellation.
    Caller(String),
    /// A deadline elapsed. Timeouts are a cancellation cause, not a
    /// separate mechanism.
    Timeout(Duration),
}

impl std::fmt::Display for CancellationCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Caller(reason) => write!(f, "{reason}"),
            Self::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cause is kept. The pipeline
/// races `cancelled()` against transport sends and backoff sleeps, so a
/// cancelled call aborts at its next suspension point.
#[derive(Debug, Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
    cause: RwLock<Option<CancellationCause>>,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Idempotent - the first cause wins. All current and future waiters
    /// on [`cancelled`](Self::cancelled) are released.
    pub fn cancel(&self, cause: CancellationCause) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.cause.write() = Some(cause);
            self.notify.notify_waiters();
        }
    }

    /// Arms a timeout that cancels this token after `after`.
    pub fn cancel_after(self: &Arc<Self>, after: Duration) {
        let token = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            token.cancel(CancellationCause::Timeout(after));
        });
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<CancellationCause> {
        self.cause.read().clone()
    }

    /// Suspends until cancellation is requested.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Renders the current cause as a classified error.
    #[must_use]
    pub fn to_error(&self) -> CancellationError {
        match self.cause() {
            Some(CancellationCause::Timeout(after)) => {
                CancellationError::timed_out(format!("timed out after {}ms", after.as_millis()))
            }
            Some(CancellationCause::Caller(reason)) => CancellationError::new(reason),
            None => CancellationError::new("cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.cause().is_none());
    }

    #[test]
    fn test_cancel_first_cause_wins() {
        let token = CancellationToken::new();
        token.cancel(CancellationCause::Caller("first".to_string()));
        token.cancel(CancellationCause::Caller("second".to_string()));

        assert!(token.is_cancelled());
        assert_eq!(
            token.cause(),
            Some(CancellationCause::Caller("first".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = Arc::new(CancellationToken::new());
        let waiter = Arc::clone(&token);

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        token.cancel(CancellationCause::Caller("stop".to_string()));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel(CancellationCause::Caller("stop".to_string()));
        token.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancel_after_times_out() {
        let token = Arc::new(CancellationToken::new());
        token.cancel_after(Duration::from_millis(5));

        token.cancelled().await;
        let err = token.to_error();
        assert!(err.timed_out);
    }

    #[test]
    fn test_to_error_caller() {
        let token = CancellationToken::new();
        token.cancel(CancellationCause::Caller("user closed".to_string()));

        let err = token.to_error();
        assert!(!err.timed_out);
        assert_eq!(err.reason, "user closed");
    }

    #[test]
    fn test_cause_display() {
        let cause = CancellationCause::Timeout(Duration::from_millis(250));
        assert_eq!(cause.to_string(), "timed out after 250ms");
    }
}
