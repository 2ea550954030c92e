//! Error types for the callflow runtime.
//!
//! Every failure surfaced by the pipeline is a [`ClientError`] of a fixed
//! kind. The retry engine consumes kinds through an
//! [`ErrorClassifier`](crate::retry::ErrorClassifier); callers receive the
//! terminal error wrapped in a [`CallFailure`] annotated with the attempt
//! count and total elapsed time.

use std::time::Duration;
use thiserror::Error;

/// The main error type for callflow operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request payload could not be produced.
    #[error("{0}")]
    Encoding(#[from] EncodingError),

    /// The response payload could not be interpreted.
    #[error("{0}")]
    Decoding(#[from] DecodingError),

    /// A retry required re-sending a body that cannot be replayed.
    #[error("{0}")]
    BodyNotReplayable(#[from] BodyNotReplayableError),

    /// A failure at the network layer.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// An application-level failure returned by the remote endpoint.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// The call was cancelled (timeouts are a cancellation cause).
    #[error("{0}")]
    Cancelled(#[from] CancellationError),

    /// Configuration construction failed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A middleware chain was mis-assembled.
    #[error("{0}")]
    MiddlewareSetup(#[from] MiddlewareSetupError),

    /// Anything not matching a recognized kind.
    #[error("{0}")]
    Unknown(#[from] UnknownError),
}

impl ClientError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Decoding(_) => ErrorKind::Decoding,
            Self::BodyNotReplayable(_) => ErrorKind::BodyNotReplayable,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Service(_) => ErrorKind::Service,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Validation(_) => ErrorKind::Validation,
            Self::MiddlewareSetup(_) => ErrorKind::MiddlewareSetup,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Wraps an arbitrary foreign cause as an unknown error, preserving it.
    #[must_use]
    pub fn unknown(cause: impl Into<anyhow::Error>) -> Self {
        let cause = cause.into();
        Self::Unknown(UnknownError {
            message: cause.to_string(),
            source: Some(cause.into()),
        })
    }
}

/// The kind of a [`ClientError`], used for classification and log labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Payload could not be produced.
    Encoding,
    /// Payload could not be interpreted.
    Decoding,
    /// A consumed, non-seekable body blocked a retry.
    BodyNotReplayable,
    /// Network-layer failure.
    Transport,
    /// Application-level failure from the remote endpoint.
    Service,
    /// The call was cancelled.
    Cancelled,
    /// Configuration was invalid.
    Validation,
    /// The middleware chain was mis-assembled.
    MiddlewareSetup,
    /// Unrecognized failure.
    Unknown,
}

impl ErrorKind {
    /// Returns a stable label for structured log records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encoding => "encoding",
            Self::Decoding => "decoding",
            Self::BodyNotReplayable => "body_not_replayable",
            Self::Transport => "transport",
            Self::Service => "service",
            Self::Cancelled => "cancelled",
            Self::Validation => "validation",
            Self::MiddlewareSetup => "middleware_setup",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when a value cannot be encoded into wire bytes.
#[derive(Debug, Clone, Error)]
#[error("encoding failed: {message}")]
pub struct EncodingError {
    /// What went wrong.
    pub message: String,
}

impl EncodingError {
    /// Creates a new encoding error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when wire bytes cannot be decoded into a value.
#[derive(Debug, Clone, Error)]
#[error("decoding failed: {message}")]
pub struct DecodingError {
    /// What went wrong.
    pub message: String,
}

impl DecodingError {
    /// Creates a new decoding error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a retry would re-send an already-consumed,
/// non-seekable body.
///
/// Always fatal: the engine surfaces it immediately with the error that
/// triggered the retry attached as the cause.
#[derive(Debug, Error)]
#[error("request body cannot be replayed: {message}")]
pub struct BodyNotReplayableError {
    /// Why the body cannot be replayed.
    pub message: String,
    /// The error that triggered the retry, if any.
    #[source]
    pub cause: Option<Box<ClientError>>,
}

impl BodyNotReplayableError {
    /// Creates a new body-not-replayable error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Attaches the error that triggered the retry.
    #[must_use]
    pub fn with_cause(mut self, cause: ClientError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// The category of a transport-layer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    ConnectionFailed,
    /// The transport timed out.
    Timeout,
    /// The connection was reset mid-exchange.
    ConnectionReset,
    /// TLS or certificate negotiation failed. Never retried.
    Tls,
    /// No real transport was wired into the configuration.
    NotConfigured,
}

/// Error raised by the transport layer.
#[derive(Debug, Clone, Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    /// The failure category.
    pub kind: TransportErrorKind,
    /// What went wrong.
    pub message: String,
}

impl TransportError {
    /// Creates a connection-failed error.
    #[must_use]
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::ConnectionFailed,
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
        }
    }

    /// Creates a connection-reset error.
    #[must_use]
    pub fn connection_reset(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::ConnectionReset,
            message: message.into(),
        }
    }

    /// Creates a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Tls,
            message: message.into(),
        }
    }

    /// Creates a not-configured error.
    #[must_use]
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::NotConfigured,
            message: message.into(),
        }
    }
}

/// An application-level failure returned by the remote endpoint.
#[derive(Debug, Clone, Error)]
#[error("service error {code} (status {status}): {message}")]
pub struct ServiceError {
    /// The service-defined error code.
    pub code: String,
    /// The status indicator carried by the response.
    pub status: u16,
    /// A human-readable message.
    pub message: String,
}

impl ServiceError {
    /// Creates a new service error.
    #[must_use]
    pub fn new(code: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status,
            message: message.into(),
        }
    }
}

/// Error raised when a call is cancelled.
#[derive(Debug, Clone, Error)]
#[error("call cancelled: {reason}")]
pub struct CancellationError {
    /// Why the call was cancelled.
    pub reason: String,
    /// True when the cancellation cause was a timeout.
    pub timed_out: bool,
}

impl CancellationError {
    /// Creates a caller-initiated cancellation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            timed_out: false,
        }
    }

    /// Creates a timeout cancellation error.
    #[must_use]
    pub fn timed_out(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            timed_out: true,
        }
    }
}

/// Error raised when configuration construction fails.
#[derive(Debug, Clone, Error)]
#[error("invalid configuration: {message}")]
pub struct ValidationError {
    /// What was invalid.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a middleware chain is mis-assembled.
#[derive(Debug, Clone, Error)]
#[error("middleware setup error: {message}")]
pub struct MiddlewareSetupError {
    /// What was mis-assembled.
    pub message: String,
}

impl MiddlewareSetupError {
    /// Creates a new middleware setup error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An unrecognized failure with its raw cause preserved.
#[derive(Debug, Error)]
#[error("unknown error: {message}")]
pub struct UnknownError {
    /// A rendering of the cause.
    pub message: String,
    /// The raw cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl UnknownError {
    /// Creates a new unknown error from a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

/// The terminal failure of one call: the classified error annotated with
/// the attempt count and total elapsed time.
#[derive(Debug, Error)]
#[error("operation failed after {attempts} attempt(s) in {}ms: {error}", elapsed.as_millis())]
pub struct CallFailure {
    /// The classified error that ended the call.
    #[source]
    pub error: ClientError,
    /// How many attempts were made.
    pub attempts: u32,
    /// Wall time from the start of the call to the failure.
    pub elapsed: Duration,
}

impl CallFailure {
    /// Creates a new call failure.
    #[must_use]
    pub fn new(error: ClientError, attempts: u32, elapsed: Duration) -> Self {
        Self {
            error,
            attempts,
            elapsed,
        }
    }

    /// Returns the kind of the underlying error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Consumes the failure, returning the underlying error.
    #[must_use]
    pub fn into_error(self) -> ClientError {
        self.error
    }
}
