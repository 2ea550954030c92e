//! The encode/decode boundary.
//!
//! Codecs are object-safe over `serde_json::Value` as the wire-neutral
//! intermediate; typed helpers bridge domain types in and out via serde.
//! Format selection and content negotiation belong to the generator — the
//! runtime only calls this contract.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{DecodingError, EncodingError};

/// Encodes and decodes wire payloads.
pub trait Codec: Send + Sync + std::fmt::Debug {
    /// The media type this codec produces, e.g. `application/json`.
    fn media_type(&self) -> &str;

    /// Encodes a wire-neutral value into payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] when the value cannot be represented.
    fn encode(&self, value: &serde_json::Value) -> Result<Bytes, EncodingError>;

    /// Decodes payload bytes into a wire-neutral value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodingError`] when the bytes cannot be interpreted.
    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, DecodingError>;
}

/// Encodes a typed value through a codec.
///
/// # Errors
///
/// Returns [`EncodingError`] when serialization or encoding fails.
pub fn encode_as<T: Serialize>(codec: &dyn Codec, value: &T) -> Result<Bytes, EncodingError> {
    let intermediate =
        serde_json::to_value(value).map_err(|e| EncodingError::new(e.to_string()))?;
    codec.encode(&intermediate)
}

/// Decodes payload bytes into a typed value through a codec.
///
/// An empty payload decodes as null, so operations without response bodies
/// can deserialize into unit-like outputs.
///
/// # Errors
///
/// Returns [`DecodingError`] when decoding or deserialization fails.
pub fn decode_as<T: DeserializeOwned>(codec: &dyn Codec, bytes: &[u8]) -> Result<T, DecodingError> {
    let intermediate = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        codec.decode(bytes)?
    };
    serde_json::from_value(intermediate).map_err(|e| DecodingError::new(e.to_string()))
}

/// The provided JSON codec, the configuration default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn media_type(&self) -> &str {
        "application/json"
    }

    fn encode(&self, value: &serde_json::Value) -> Result<Bytes, EncodingError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| EncodingError::new(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<serde_json::Value, DecodingError> {
        serde_json::from_slice(bytes).map_err(|e| DecodingError::new(e.to_string()))
    }
}
