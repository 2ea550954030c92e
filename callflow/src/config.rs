//! Client runtime configuration.
//!
//! A [`RuntimeConfiguration`] is built once per client, validated at
//! construction, and immutable afterwards. Every collaborator has a
//! deterministic default, so a minimal configuration is always buildable;
//! the default transport fails closed rather than pretending to send.

use std::sync::Arc;

use crate::codec::{Codec, JsonCodec};
use crate::errors::ValidationError;
use crate::logging::{ClientLogMode, LogSink, TracingLogSink};
use crate::retry::{DefaultClassifier, ErrorClassifier, RetryStrategyOptions};
use crate::transport::{Endpoint, NullTransport, Transport};

/// Produces idempotency tokens for calls that carry one.
pub trait IdempotencyTokenGenerator: Send + Sync + std::fmt::Debug {
    /// Generates a fresh token.
    fn generate(&self) -> String;
}

/// The default token generator: random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokenGenerator;

impl IdempotencyTokenGenerator for UuidTokenGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Immutable per-client configuration shared by every operation stack the
/// client executes.
#[derive(Debug, Clone)]
pub struct RuntimeConfiguration {
    /// The remote service name, for log records and diagnostics.
    pub service_name: String,
    /// The client name, for log records and diagnostics.
    pub client_name: String,
    /// Encodes and decodes payloads.
    pub codec: Arc<dyn Codec>,
    /// Performs the physical exchange.
    pub transport: Arc<dyn Transport>,
    /// The retry policy.
    pub retry_options: RetryStrategyOptions,
    /// Classifies failures for the retry engine.
    pub classifier: Arc<dyn ErrorClassifier>,
    /// Generates idempotency tokens.
    pub token_generator: Arc<dyn IdempotencyTokenGenerator>,
    /// Receives per-attempt records.
    pub log_sink: Arc<dyn LogSink>,
    /// Which attempt record fields are populated.
    pub log_mode: ClientLogMode,
    /// The endpoint requests resolve against, when fixed per client.
    pub endpoint: Option<Endpoint>,
}

impl RuntimeConfiguration {
    /// Starts a builder for the given service and client names.
    #[must_use]
    pub fn builder(
        service_name: impl Into<String>,
        client_name: impl Into<String>,
    ) -> RuntimeConfigurationBuilder {
        RuntimeConfigurationBuilder {
            service_name: service_name.into(),
            client_name: client_name.into(),
            codec: None,
            transport: None,
            retry_options: RetryStrategyOptions::default(),
            classifier: None,
            token_generator: None,
            log_sink: None,
            log_mode: ClientLogMode::default(),
            endpoint: None,
        }
    }
}

/// Builder for [`RuntimeConfiguration`].
#[derive(Debug)]
pub struct RuntimeConfigurationBuilder {
    service_name: String,
    client_name: String,
    codec: Option<Arc<dyn Codec>>,
    transport: Option<Arc<dyn Transport>>,
    retry_options: RetryStrategyOptions,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    token_generator: Option<Arc<dyn IdempotencyTokenGenerator>>,
    log_sink: Option<Arc<dyn LogSink>>,
    log_mode: ClientLogMode,
    endpoint: Option<Endpoint>,
}

impl RuntimeConfigurationBuilder {
    /// Sets the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Sets the transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_options(mut self, options: RetryStrategyOptions) -> Self {
        self.retry_options = options;
        self
    }

    /// Sets the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Sets the idempotency token generator.
    #[must_use]
    pub fn with_token_generator(
        mut self,
        generator: Arc<dyn IdempotencyTokenGenerator>,
    ) -> Self {
        self.token_generator = Some(generator);
        self
    }

    /// Sets the log sink.
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Sets the log mode.
    #[must_use]
    pub fn with_log_mode(mut self, mode: ClientLogMode) -> Self {
        self.log_mode = mode;
        self
    }

    /// Sets the fixed endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Validates the configuration, then fills defaults for every
    /// collaborator that was not provided.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a name is empty after trimming or
    /// the retry policy is invalid. Validation runs before defaulting, so
    /// an invalid build never half-constructs a configuration.
    pub fn build(self) -> Result<RuntimeConfiguration, ValidationError> {
        if self.service_name.trim().is_empty() {
            return Err(ValidationError::new("service_name must not be empty"));
        }
        if self.client_name.trim().is_empty() {
            return Err(ValidationError::new("client_name must not be empty"));
        }
        self.retry_options.validate()?;

        Ok(RuntimeConfiguration {
            service_name: self.service_name,
            client_name: self.client_name,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            transport: self.transport.unwrap_or_else(|| Arc::new(NullTransport)),
            retry_options: self.retry_options,
            classifier: self
                .classifier
                .unwrap_or_else(|| Arc::new(DefaultClassifier::new())),
            token_generator: self
                .token_generator
                .unwrap_or_else(|| Arc::new(UuidTokenGenerator)),
            log_sink: self
                .log_sink
                .unwrap_or_else(|| Arc::new(TracingLogSink::default())),
            log_mode: self.log_mode,
            endpoint: self.endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_build_fills_defaults() {
        let config = RuntimeConfiguration::builder("catalog", "catalog-client")
            .build()
            .unwrap();

        assert_eq!(config.service_name, "catalog");
        assert_eq!(config.client_name, "catalog-client");
        assert_eq!(config.codec.media_type(), "application/json");
        assert_eq!(config.retry_options.max_attempts, 3);
        assert_eq!(config.log_mode, ClientLogMode::Request);
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_empty_names_rejected_before_defaulting() {
        assert!(RuntimeConfiguration::builder("", "client").build().is_err());
        assert!(RuntimeConfiguration::builder("service", "   ")
            .build()
            .is_err());
    }

    #[test]
    fn test_invalid_retry_policy_rejected() {
        let result = RuntimeConfiguration::builder("service", "client")
            .with_retry_options(RetryStrategyOptions::new().with_max_attempts(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_are_kept() {
        let endpoint = Endpoint::new("api.example.com").with_port(8443);
        let config = RuntimeConfiguration::builder("catalog", "catalog-client")
            .with_retry_options(RetryStrategyOptions::new().with_max_attempts(5))
            .with_log_mode(ClientLogMode::RequestAndResponse)
            .with_endpoint(endpoint.clone())
            .build()
            .unwrap();

        assert_eq!(config.retry_options.max_attempts, 5);
        assert_eq!(config.log_mode, ClientLogMode::RequestAndResponse);
        assert_eq!(config.endpoint, Some(endpoint));
    }

    #[test]
    fn test_uuid_tokens_are_unique() {
        let generator = UuidTokenGenerator;
        let a = generator.generate();
        let b = generator.generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
