//! Well-known attribute keys read and written by the runtime itself.

use std::sync::Arc;

use crate::cancellation::CancellationToken;
use crate::context::AttributeKey;
use crate::retry::RetryReport;
use crate::transport::{Endpoint, ResponseMetadata};

/// The operation id of the executing stack.
pub const OPERATION_ID: AttributeKey<String> = AttributeKey::from_static("call.operation_id");

/// The idempotency token for this call.
pub const IDEMPOTENCY_TOKEN: AttributeKey<String> =
    AttributeKey::from_static("call.idempotency_token");

/// The endpoint the request was resolved against.
pub const ENDPOINT: AttributeKey<Endpoint> = AttributeKey::from_static("call.endpoint");

/// The cancellation token governing this call, if any.
pub const CANCELLATION: AttributeKey<Arc<CancellationToken>> =
    AttributeKey::from_static("call.cancellation");

/// Status and headers of the most recent transport response.
pub const RESPONSE_METADATA: AttributeKey<ResponseMetadata> =
    AttributeKey::from_static("call.response_metadata");

/// The attempt ledger recorded by the retry engine, stored after the call.
pub const RETRY_REPORT: AttributeKey<RetryReport> = AttributeKey::from_static("call.retry_report");
