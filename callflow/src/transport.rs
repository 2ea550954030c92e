//! Wire-neutral request/response shapes and the transport boundary.
//!
//! The runtime never owns a wire protocol: it shapes an
//! [`OperationRequest`] and hands it to an injected [`Transport`], which is
//! responsible for its own connections, pooling, and TLS.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::body::ReplayableBody;
use crate::errors::{ClientError, TransportError};

/// The request method verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Retrieve a resource.
    Get,
    /// Submit a payload.
    Post,
    /// Replace a resource.
    Put,
    /// Remove a resource.
    Delete,
    /// Partially update a resource.
    Patch,
    /// Retrieve headers only.
    Head,
}

impl Method {
    /// Returns the canonical verb string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved network endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Scheme, e.g. `https`.
    pub scheme: String,
    /// Host name or address.
    pub host: String,
    /// Port, when non-default.
    pub port: Option<u16>,
    /// Path prefix prepended to every request path.
    pub path_prefix: String,
}

impl Endpoint {
    /// Creates an https endpoint for the given host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            scheme: "https".to_string(),
            host: host.into(),
            port: None,
            path_prefix: String::new(),
        }
    }

    /// Sets the scheme.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the path prefix.
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Returns the authority component, `host` or `host:port`.
    #[must_use]
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

/// A transport-level request, shaped by the Serialize and Build phases.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// The request verb.
    pub method: Method,
    /// The request path.
    pub path: String,
    /// Query parameters in append order.
    pub query: Vec<(String, String)>,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    /// The resolved endpoint, stamped by the Build phase.
    pub endpoint: Option<Endpoint>,
    /// The request payload.
    pub body: ReplayableBody,
}

impl OperationRequest {
    /// Creates a new request with an empty body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HashMap::new(),
            endpoint: None,
            body: ReplayableBody::Empty,
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: ReplayableBody) -> Self {
        self.body = body;
        self
    }

    /// Gets a header by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Sets a header in place.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into().to_lowercase(), value.into());
    }
}

/// A transport-level response.
#[derive(Debug, Clone)]
pub struct OperationResponse {
    /// The status indicator.
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    /// The response payload.
    pub body: ReplayableBody,
}

impl OperationResponse {
    /// Creates a new response with an empty body.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: ReplayableBody::Empty,
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: ReplayableBody) -> Self {
        self.body = body;
        self
    }

    /// Gets a header by name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the status and headers as context metadata.
    #[must_use]
    pub fn metadata(&self) -> ResponseMetadata {
        ResponseMetadata {
            status: self.status,
            headers: self.headers.clone(),
        }
    }
}

/// Status and headers of a response, stored in the call context so every
/// later middleware can observe them without holding the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The status indicator.
    pub status: u16,
    /// The response headers.
    pub headers: HashMap<String, String>,
}

/// The transport boundary: performs one physical exchange.
///
/// Connection reuse and pooling are the implementation's own concern; the
/// pipeline calls `send` once per attempt and races it against the call's
/// cancellation token.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends the request and produces a response. May suspend.
    async fn send(&self, request: OperationRequest) -> Result<OperationResponse, ClientError>;
}

/// The default transport: fails deterministically until a real transport
/// is wired in. Lets configuration defaulting stay total without hiding a
/// missing collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, _request: OperationRequest) -> Result<OperationResponse, ClientError> {
        Err(TransportError::not_configured("no transport was configured for this client").into())
    }
}
