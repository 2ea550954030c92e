//! Hand-written test doubles for the transport and log boundaries.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::errors::{ClientError, UnknownError};
use crate::logging::{AttemptRecord, LogSink};
use crate::transport::{OperationRequest, OperationResponse, Transport};

/// What the mock transport observed about one request, with the body fully
/// consumed the way a real transport would consume it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// The request verb.
    pub method: String,
    /// The request path.
    pub path: String,
    /// The request headers.
    pub headers: HashMap<String, String>,
    /// The request payload, drained from the body.
    pub body: Bytes,
}

/// A transport that replays a scripted sequence of outcomes.
///
/// Each `send` consumes the request body before answering, matching real
/// transports, so tests exercise body replay across attempts.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<OperationResponse, ClientError>>>,
    seen: Mutex<Vec<SeenRequest>>,
    calls: AtomicU32,
}

impl MockTransport {
    /// Creates an empty mock. A send with no scripted outcome fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a scripted response.
    #[must_use]
    pub fn with_response(self, response: OperationResponse) -> Self {
        self.script.lock().push_back(Ok(response));
        self
    }

    /// Appends a scripted error.
    #[must_use]
    pub fn with_error(self, error: impl Into<ClientError>) -> Self {
        self.script.lock().push_back(Err(error.into()));
        self
    }

    /// Returns how many sends have happened.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns everything observed so far, in send order.
    #[must_use]
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: OperationRequest) -> Result<OperationResponse, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let body = request.body.read_all().await?;
        self.seen.lock().push(SeenRequest {
            method: request.method.to_string(),
            path: request.path.clone(),
            headers: request.headers.clone(),
            body,
        });

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(UnknownError::new("mock transport script exhausted").into()))
    }
}

/// A log sink that captures every record for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    records: Mutex<Vec<AttemptRecord>>,
}

impl RecordingLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured records in emission order.
    #[must_use]
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records.lock().clone()
    }
}

impl LogSink for RecordingLogSink {
    fn record(&self, record: &AttemptRecord) {
        self.records.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ReplayableBody;
    use crate::transport::Method;

    #[tokio::test]
    async fn test_mock_transport_replays_script() {
        let transport = MockTransport::new()
            .with_response(OperationResponse::new(200))
            .with_error(UnknownError::new("boom"));

        let ok = transport
            .send(OperationRequest::new(Method::Get, "/a"))
            .await;
        assert!(ok.is_ok());

        let err = transport
            .send(OperationRequest::new(Method::Get, "/b"))
            .await;
        assert!(err.is_err());

        // Script exhausted.
        let exhausted = transport
            .send(OperationRequest::new(Method::Get, "/c"))
            .await;
        assert!(exhausted.is_err());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_consumes_bodies() {
        let transport = MockTransport::new().with_response(OperationResponse::new(200));
        let request = OperationRequest::new(Method::Post, "/items")
            .with_body(ReplayableBody::from_bytes(&b"payload"[..]));

        transport.send(request).await.unwrap();

        let seen = transport.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].path, "/items");
        assert_eq!(&seen[0].body[..], b"payload");
    }
}
