//! Failure classification for retry decisions.

use std::collections::HashSet;

use crate::errors::{ClientError, TransportErrorKind};

/// How a failure participates in the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Safe to re-attempt on the standard backoff curve.
    Retryable,
    /// Retryable, but caused by rate limiting: uses the longer backoff
    /// curve.
    Throttling,
    /// Must be surfaced immediately.
    NonRetryable,
}

/// Classifies a [`ClientError`] for the retry engine.
pub trait ErrorClassifier: Send + Sync + std::fmt::Debug {
    /// Returns the retry class of the error.
    fn classify(&self, error: &ClientError) -> RetryClass;
}

/// The default classifier.
///
/// Transport errors are retryable unless they are TLS failures or missing
/// wiring. Service errors are matched against code tables and the status
/// indicator: 429, 503, and known throttling codes are throttling-class,
/// other 5xx are retryable, everything else is surfaced. Encoding,
/// decoding, cancellation, body, and unknown failures are never retried.
#[derive(Debug, Clone)]
pub struct DefaultClassifier {
    throttling_codes: HashSet<String>,
    retryable_codes: HashSet<String>,
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        let throttling_codes = [
            "Throttling",
            "ThrottlingException",
            "TooManyRequests",
            "RequestThrottled",
            "SlowDown",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let retryable_codes = ["RequestTimeout", "ServiceUnavailable", "InternalError"]
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            throttling_codes,
            retryable_codes,
        }
    }
}

impl DefaultClassifier {
    /// Creates the default classifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service code treated as throttling-class.
    #[must_use]
    pub fn with_throttling_code(mut self, code: impl Into<String>) -> Self {
        self.throttling_codes.insert(code.into());
        self
    }

    /// Adds a service code treated as retryable.
    #[must_use]
    pub fn with_retryable_code(mut self, code: impl Into<String>) -> Self {
        self.retryable_codes.insert(code.into());
        self
    }
}

impl ErrorClassifier for DefaultClassifier {
    fn classify(&self, error: &ClientError) -> RetryClass {
        match error {
            ClientError::Transport(err) => match err.kind {
                TransportErrorKind::ConnectionFailed
                | TransportErrorKind::Timeout
                | TransportErrorKind::ConnectionReset => RetryClass::Retryable,
                TransportErrorKind::Tls | TransportErrorKind::NotConfigured => {
                    RetryClass::NonRetryable
                }
            },
            ClientError::Service(err) => {
                if err.status == 429 || err.status == 503 || self.throttling_codes.contains(&err.code)
                {
                    RetryClass::Throttling
                } else if err.status >= 500 || self.retryable_codes.contains(&err.code) {
                    RetryClass::Retryable
                } else {
                    RetryClass::NonRetryable
                }
            }
            _ => RetryClass::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DecodingError, EncodingError, ServiceError, TransportError};

    #[test]
    fn test_transport_errors() {
        let classifier = DefaultClassifier::new();

        let retryable = [
            TransportError::connection_failed("refused"),
            TransportError::timeout("slow"),
            TransportError::connection_reset("reset"),
        ];
        for err in retryable {
            assert_eq!(
                classifier.classify(&ClientError::from(err)),
                RetryClass::Retryable
            );
        }

        assert_eq!(
            classifier.classify(&ClientError::from(TransportError::tls("bad cert"))),
            RetryClass::NonRetryable
        );
        assert_eq!(
            classifier.classify(&ClientError::from(TransportError::not_configured("none"))),
            RetryClass::NonRetryable
        );
    }

    #[test]
    fn test_service_throttling() {
        let classifier = DefaultClassifier::new();

        let by_status = ServiceError::new("Anything", 429, "rate limited");
        assert_eq!(
            classifier.classify(&ClientError::from(by_status)),
            RetryClass::Throttling
        );

        let by_code = ServiceError::new("ThrottlingException", 400, "rate limited");
        assert_eq!(
            classifier.classify(&ClientError::from(by_code)),
            RetryClass::Throttling
        );

        let unavailable = ServiceError::new("ServiceUnavailable", 503, "overloaded");
        assert_eq!(
            classifier.classify(&ClientError::from(unavailable)),
            RetryClass::Throttling
        );
    }

    #[test]
    fn test_service_server_errors_are_retryable() {
        let classifier = DefaultClassifier::new();
        let err = ServiceError::new("InternalFailure", 500, "boom");
        assert_eq!(
            classifier.classify(&ClientError::from(err)),
            RetryClass::Retryable
        );
    }

    #[test]
    fn test_service_client_errors_are_not_retryable() {
        let classifier = DefaultClassifier::new();
        let err = ServiceError::new("ValidationException", 400, "bad input");
        assert_eq!(
            classifier.classify(&ClientError::from(err)),
            RetryClass::NonRetryable
        );
    }

    #[test]
    fn test_custom_codes() {
        let classifier = DefaultClassifier::new()
            .with_throttling_code("Busy")
            .with_retryable_code("TryAgain");

        let busy = ServiceError::new("Busy", 200, "busy");
        assert_eq!(
            classifier.classify(&ClientError::from(busy)),
            RetryClass::Throttling
        );

        let again = ServiceError::new("TryAgain", 400, "again");
        assert_eq!(
            classifier.classify(&ClientError::from(again)),
            RetryClass::Retryable
        );
    }

    #[test]
    fn test_codec_errors_never_retry() {
        let classifier = DefaultClassifier::new();
        assert_eq!(
            classifier.classify(&ClientError::from(EncodingError::new("bad"))),
            RetryClass::NonRetryable
        );
        assert_eq!(
            classifier.classify(&ClientError::from(DecodingError::new("bad"))),
            RetryClass::NonRetryable
        );
    }
}
