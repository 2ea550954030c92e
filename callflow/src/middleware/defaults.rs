//! Provided middleware and baseline transforms.
//!
//! These are the stock pieces a generated client assembles into its
//! operation stacks: token injection at initialize, codec-driven
//! serialization, endpoint resolution and header stamping at build, and
//! codec-driven deserialization with service error extraction.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{decode_as, encode_as, Codec};
use crate::config::IdempotencyTokenGenerator;
use crate::context::{keys, AttributeContext};
use crate::errors::{ClientError, ServiceError};
use crate::middleware::{Flow, Middleware, Transform};
use crate::transport::{Endpoint, Method, OperationRequest, OperationResponse};

/// Header carrying the service-defined error code on failure responses.
pub const ERROR_CODE_HEADER: &str = "x-error-code";

/// Injects an idempotency token into the call context when the caller did
/// not provide one. Runs at initialize so the token is stable across every
/// retry attempt of the call.
#[derive(Debug)]
pub struct IdempotencyTokenMiddleware {
    generator: Arc<dyn IdempotencyTokenGenerator>,
}

impl IdempotencyTokenMiddleware {
    /// Creates the middleware with the given generator.
    #[must_use]
    pub fn new(generator: Arc<dyn IdempotencyTokenGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl<T: Send + 'static> Middleware<T> for IdempotencyTokenMiddleware {
    fn name(&self) -> &str {
        "idempotency_token"
    }

    async fn handle(
        &self,
        ctx: &mut AttributeContext,
        value: T,
    ) -> Result<Flow<T>, ClientError> {
        if !ctx.contains(&keys::IDEMPOTENCY_TOKEN) {
            ctx.set(&keys::IDEMPOTENCY_TOKEN, self.generator.generate());
        }
        Ok(Flow::Continue(value))
    }
}

/// Stamps the `content-length` header from the request body, when the
/// body's length is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentLength;

#[async_trait]
impl Middleware<OperationRequest> for ContentLength {
    fn name(&self) -> &str {
        "content_length"
    }

    async fn handle(
        &self,
        _ctx: &mut AttributeContext,
        mut request: OperationRequest,
    ) -> Result<Flow<OperationRequest>, ClientError> {
        if let Some(length) = request.body.content_length() {
            request.set_header("content-length", length.to_string());
        }
        Ok(Flow::Continue(request))
    }
}

/// The build phase baseline: resolves the request against a fixed
/// endpoint, prepending its path prefix and stamping the `host` header.
///
/// With no endpoint configured the request passes through untouched, which
/// leaves resolution to the transport.
#[derive(Debug, Clone)]
pub struct ResolveEndpoint {
    endpoint: Option<Endpoint>,
}

impl ResolveEndpoint {
    /// Creates the resolver.
    #[must_use]
    pub fn new(endpoint: Option<Endpoint>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Transform<OperationRequest, OperationRequest> for ResolveEndpoint {
    async fn apply(
        &self,
        ctx: &mut AttributeContext,
        mut request: OperationRequest,
    ) -> Result<OperationRequest, ClientError> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.path_prefix.is_empty() {
                request.path = format!("{}{}", endpoint.path_prefix, request.path);
            }
            request.set_header("host", endpoint.authority());
            request.endpoint = Some(endpoint.clone());
            ctx.set(&keys::ENDPOINT, endpoint.clone());
        }
        Ok(request)
    }
}

/// The serialize phase baseline: encodes the typed input into a wire
/// request through the configured codec.
pub struct CodecSerializer<I> {
    method: Method,
    path: String,
    codec: Arc<dyn Codec>,
    _marker: PhantomData<fn() -> I>,
}

impl<I> CodecSerializer<I> {
    /// Creates a serializer for the given verb and path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        Self {
            method,
            path: path.into(),
            codec,
            _marker: PhantomData,
        }
    }
}

impl<I> std::fmt::Debug for CodecSerializer<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecSerializer")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<I> Transform<I, OperationRequest> for CodecSerializer<I>
where
    I: Serialize + Send + 'static,
{
    async fn apply(
        &self,
        _ctx: &mut AttributeContext,
        input: I,
    ) -> Result<OperationRequest, ClientError> {
        let payload = encode_as(self.codec.as_ref(), &input)?;
        let request = OperationRequest::new(self.method, self.path.clone())
            .with_header("content-type", self.codec.media_type())
            .with_body(crate::body::ReplayableBody::from_bytes(payload));
        Ok(request)
    }
}

/// The deserialize phase baseline: decodes a success response into the
/// typed output, or extracts a classified service error from a failure
/// response.
///
/// Always records the response's status and headers in the call context
/// before touching the body, so they remain observable even when decoding
/// fails.
pub struct DecodeResponse<O> {
    codec: Arc<dyn Codec>,
    _marker: PhantomData<fn() -> O>,
}

impl<O> DecodeResponse<O> {
    /// Creates a decoder over the given codec.
    #[must_use]
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            _marker: PhantomData,
        }
    }
}

impl<O> std::fmt::Debug for DecodeResponse<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeResponse").finish_non_exhaustive()
    }
}

#[async_trait]
impl<O> Transform<OperationResponse, O> for DecodeResponse<O>
where
    O: DeserializeOwned + Send + 'static,
{
    async fn apply(
        &self,
        ctx: &mut AttributeContext,
        response: OperationResponse,
    ) -> Result<O, ClientError> {
        ctx.set(&keys::RESPONSE_METADATA, response.metadata());

        let payload = response.body.read_all().await?;
        if response.is_success() {
            let output = decode_as(self.codec.as_ref(), &payload)?;
            return Ok(output);
        }

        let code = response
            .header(ERROR_CODE_HEADER)
            .map_or_else(|| response.status.to_string(), ToString::to_string);
        let message = String::from_utf8_lossy(&payload).into_owned();
        Err(ServiceError::new(code, response.status, message).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::ReplayableBody;
    use crate::codec::JsonCodec;
    use crate::config::UuidTokenGenerator;
    use serde::Deserialize;

    #[derive(Debug, Serialize)]
    struct PutItemInput {
        name: String,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct GetItemOutput {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_idempotency_token_injected_once() {
        let middleware = IdempotencyTokenMiddleware::new(Arc::new(UuidTokenGenerator));
        let mut ctx = AttributeContext::new();

        let _flow = middleware.handle(&mut ctx, ()).await.unwrap();
        let first = ctx.get(&keys::IDEMPOTENCY_TOKEN).unwrap();

        let _flow = middleware.handle(&mut ctx, ()).await.unwrap();
        let second = ctx.get(&keys::IDEMPOTENCY_TOKEN).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_idempotency_token_respects_caller_value() {
        let middleware = IdempotencyTokenMiddleware::new(Arc::new(UuidTokenGenerator));
        let mut ctx = AttributeContext::new();
        ctx.set(&keys::IDEMPOTENCY_TOKEN, "caller-token".to_string());

        let _flow = middleware.handle(&mut ctx, ()).await.unwrap();
        assert_eq!(
            ctx.get(&keys::IDEMPOTENCY_TOKEN),
            Some("caller-token".to_string())
        );
    }

    #[tokio::test]
    async fn test_content_length_stamped() {
        let mut ctx = AttributeContext::new();
        let request = OperationRequest::new(Method::Post, "/items")
            .with_body(ReplayableBody::from_bytes(&b"abcde"[..]));

        match ContentLength.handle(&mut ctx, request).await.unwrap() {
            Flow::Continue(request) => {
                assert_eq!(request.header("content-length"), Some("5"));
            }
            Flow::Respond(_) => panic!("unexpected short-circuit"),
        }
    }

    #[tokio::test]
    async fn test_resolve_endpoint_stamps_request() {
        let endpoint = Endpoint::new("api.example.com")
            .with_port(8443)
            .with_path_prefix("/v2");
        let resolver = ResolveEndpoint::new(Some(endpoint));
        let mut ctx = AttributeContext::new();

        let request = resolver
            .apply(&mut ctx, OperationRequest::new(Method::Get, "/items/1"))
            .await
            .unwrap();

        assert_eq!(request.path, "/v2/items/1");
        assert_eq!(request.header("host"), Some("api.example.com:8443"));
        assert!(request.endpoint.is_some());
        assert!(ctx.contains(&keys::ENDPOINT));
    }

    #[tokio::test]
    async fn test_resolve_endpoint_without_endpoint_is_identity() {
        let resolver = ResolveEndpoint::new(None);
        let mut ctx = AttributeContext::new();

        let request = resolver
            .apply(&mut ctx, OperationRequest::new(Method::Get, "/items/1"))
            .await
            .unwrap();

        assert_eq!(request.path, "/items/1");
        assert!(request.endpoint.is_none());
        assert!(!ctx.contains(&keys::ENDPOINT));
    }

    #[tokio::test]
    async fn test_codec_serializer_shapes_request() {
        let serializer: CodecSerializer<PutItemInput> =
            CodecSerializer::new(Method::Post, "/items", Arc::new(JsonCodec));
        let mut ctx = AttributeContext::new();

        let request = serializer
            .apply(
                &mut ctx,
                PutItemInput {
                    name: "widget".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/items");
        assert_eq!(request.header("content-type"), Some("application/json"));
        let payload = request.body.read_all().await.unwrap();
        assert_eq!(&payload[..], br#"{"name":"widget"}"#);
    }

    #[tokio::test]
    async fn test_decode_success_response() {
        let decoder: DecodeResponse<GetItemOutput> = DecodeResponse::new(Arc::new(JsonCodec));
        let mut ctx = AttributeContext::new();
        let response = OperationResponse::new(200)
            .with_body(ReplayableBody::from_bytes(&br#"{"name":"widget","count":7}"#[..]));

        let output = decoder.apply(&mut ctx, response).await.unwrap();
        assert_eq!(
            output,
            GetItemOutput {
                name: "widget".to_string(),
                count: 7
            }
        );

        let metadata = ctx.get(&keys::RESPONSE_METADATA).unwrap();
        assert_eq!(metadata.status, 200);
    }

    #[tokio::test]
    async fn test_decode_failure_extracts_service_error() {
        let decoder: DecodeResponse<GetItemOutput> = DecodeResponse::new(Arc::new(JsonCodec));
        let mut ctx = AttributeContext::new();
        let response = OperationResponse::new(429)
            .with_header(ERROR_CODE_HEADER, "ThrottlingException")
            .with_body(ReplayableBody::from_bytes(&b"rate exceeded"[..]));

        match decoder.apply(&mut ctx, response).await {
            Err(ClientError::Service(err)) => {
                assert_eq!(err.code, "ThrottlingException");
                assert_eq!(err.status, 429);
                assert_eq!(err.message, "rate exceeded");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_failure_falls_back_to_status_code() {
        let decoder: DecodeResponse<GetItemOutput> = DecodeResponse::new(Arc::new(JsonCodec));
        let mut ctx = AttributeContext::new();
        let response = OperationResponse::new(500);

        match decoder.apply(&mut ctx, response).await {
            Err(ClientError::Service(err)) => {
                assert_eq!(err.code, "500");
                assert_eq!(err.status, 500);
            }
            other => panic!("expected service error, got {other:?}"),
        }

        // Metadata was recorded even though the call failed.
        assert!(ctx.contains(&keys::RESPONSE_METADATA));
    }

    #[tokio::test]
    async fn test_decode_malformed_success_body() {
        let decoder: DecodeResponse<GetItemOutput> = DecodeResponse::new(Arc::new(JsonCodec));
        let mut ctx = AttributeContext::new();
        let response =
            OperationResponse::new(200).with_body(ReplayableBody::from_bytes(&b"{oops"[..]));

        assert!(matches!(
            decoder.apply(&mut ctx, response).await,
            Err(ClientError::Decoding(_))
        ));
    }
}
