//! Structured per-attempt logging.
//!
//! The pipeline emits one [`AttemptRecord`] per physical attempt to an
//! injected [`LogSink`]. Emission is an observable side effect, never a
//! control-flow dependency, and must not fail the call.

use std::time::Duration;

use tracing::Level;

/// Controls which fields of an attempt record are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientLogMode {
    /// Log nothing beyond the operation id, attempt index, and outcome.
    None,
    /// Populate request fields (method, path).
    #[default]
    Request,
    /// Populate response fields (status code).
    Response,
    /// Populate both request and response fields.
    RequestAndResponse,
}

impl ClientLogMode {
    /// Returns true if request fields should be populated.
    #[must_use]
    pub fn logs_request(&self) -> bool {
        matches!(self, Self::Request | Self::RequestAndResponse)
    }

    /// Returns true if response fields should be populated.
    #[must_use]
    pub fn logs_response(&self) -> bool {
        matches!(self, Self::Response | Self::RequestAndResponse)
    }
}

/// One structured record per physical attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// The operation stack id.
    pub operation_id: String,
    /// 1-based attempt index.
    pub attempt: u32,
    /// Request verb, when the log mode includes requests.
    pub method: Option<String>,
    /// Request path, when the log mode includes requests.
    pub path: Option<String>,
    /// Response status, when the log mode includes responses and a
    /// response was received.
    pub status_code: Option<u16>,
    /// Wall time of the attempt.
    pub elapsed: Duration,
    /// Outcome label: `success` or the error kind.
    pub outcome: String,
}

/// Receives per-attempt records.
///
/// Implementations must never panic or block the call path.
pub trait LogSink: Send + Sync + std::fmt::Debug {
    /// Records one attempt.
    fn record(&self, record: &AttemptRecord);
}

/// A sink that discards all records. Useful when a client embeds its own
/// telemetry at the transport layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogSink;

impl LogSink for NoOpLogSink {
    fn record(&self, _record: &AttemptRecord) {
        // Intentionally empty - discards all records
    }
}

/// A sink that emits records through the tracing framework.
#[derive(Debug, Clone)]
pub struct TracingLogSink {
    /// The log level to use.
    level: Level,
}

impl Default for TracingLogSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl TracingLogSink {
    /// Creates a new tracing sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl LogSink for TracingLogSink {
    fn record(&self, record: &AttemptRecord) {
        let elapsed_ms = record.elapsed.as_millis() as u64;
        match self.level {
            Level::DEBUG => {
                tracing::debug!(
                    operation_id = %record.operation_id,
                    attempt = record.attempt,
                    method = record.method.as_deref(),
                    path = record.path.as_deref(),
                    status_code = record.status_code,
                    elapsed_ms,
                    outcome = %record.outcome,
                    "Attempt completed"
                );
            }
            _ => {
                tracing::info!(
                    operation_id = %record.operation_id,
                    attempt = record.attempt,
                    method = record.method.as_deref(),
                    path = record.path.as_deref(),
                    status_code = record.status_code,
                    elapsed_ms,
                    outcome = %record.outcome,
                    "Attempt completed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_mode_field_gating() {
        assert!(ClientLogMode::Request.logs_request());
        assert!(!ClientLogMode::Request.logs_response());
        assert!(ClientLogMode::Response.logs_response());
        assert!(!ClientLogMode::Response.logs_request());
        assert!(ClientLogMode::RequestAndResponse.logs_request());
        assert!(ClientLogMode::RequestAndResponse.logs_response());
        assert!(!ClientLogMode::None.logs_request());
        assert!(!ClientLogMode::None.logs_response());
    }

    #[test]
    fn test_default_mode_is_request() {
        assert_eq!(ClientLogMode::default(), ClientLogMode::Request);
    }

    #[test]
    fn test_sinks_do_not_panic() {
        let record = AttemptRecord {
            operation_id: "GetItem".to_string(),
            attempt: 1,
            method: Some("GET".to_string()),
            path: Some("/items/1".to_string()),
            status_code: Some(200),
            elapsed: Duration::from_millis(12),
            outcome: "success".to_string(),
        };

        NoOpLogSink.record(&record);
        TracingLogSink::default().record(&record);
        TracingLogSink::debug().record(&record);
    }
}
