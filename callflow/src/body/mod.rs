//! Replayable payload abstraction.
//!
//! A [`ReplayableBody`] is the request/response payload handed to the codec
//! and transport: empty, an in-memory buffer, or a stream handle. Stream
//! handles are shared (`Arc`), so a cloned request observes the same read
//! position — consumption belongs to the call, not to any one clone. Only a
//! seekable stream may be replayed for a retry; the engine refuses to
//! re-send a consumed, non-seekable stream.

mod streams;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::{BodyNotReplayableError, ClientError};

pub use streams::{BufferedStream, ForwardOnlyStream};

/// An asynchronous byte stream with an explicit position.
///
/// Reads suspend; `read_to_end` drains from the current position. The
/// async read is the sole read contract — there is no blocking variant.
#[async_trait]
pub trait ByteStream: Send + Sync + std::fmt::Debug {
    /// Returns true if the stream supports seeking.
    fn is_seekable(&self) -> bool;

    /// Returns the current read position in bytes.
    fn position(&self) -> u64;

    /// Returns the total length, when known.
    fn len(&self) -> Option<u64>;

    /// Returns true if no bytes remain to be read.
    fn is_empty(&self) -> bool;

    /// Moves the read position to `offset`.
    ///
    /// # Errors
    ///
    /// Fails on a non-seekable stream.
    fn seek(&self, offset: u64) -> Result<(), BodyNotReplayableError>;

    /// Reads all remaining bytes from the current position.
    async fn read_to_end(&self) -> Result<Bytes, ClientError>;
}

/// A request or response payload usable across retry attempts.
#[derive(Clone, Debug, Default)]
pub enum ReplayableBody {
    /// No payload.
    #[default]
    Empty,
    /// An in-memory payload.
    Buffer(Bytes),
    /// A streamed payload; replayable only when the stream is seekable.
    Stream(Arc<dyn ByteStream>),
}

impl ReplayableBody {
    /// Creates an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Creates a body over in-memory bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffer(data.into())
    }

    /// Creates a body over a stream handle.
    #[must_use]
    pub fn from_stream(stream: Arc<dyn ByteStream>) -> Self {
        Self::Stream(stream)
    }

    /// Returns true if the body carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Buffer(data) => data.is_empty(),
            Self::Stream(stream) => stream.is_empty(),
        }
    }

    /// Returns the payload length, when known.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Buffer(data) => Some(data.len() as u64),
            Self::Stream(stream) => stream.len(),
        }
    }

    /// Returns true if the body can be safely re-sent for a new attempt.
    #[must_use]
    pub fn is_replayable(&self) -> bool {
        match self {
            Self::Empty | Self::Buffer(_) => true,
            Self::Stream(stream) => stream.is_seekable(),
        }
    }

    /// Materializes the full payload.
    ///
    /// For a buffer this returns the buffer. For a seekable stream it seeks
    /// to offset 0 first and then reads to the end, so repeated calls yield
    /// identical bytes. For a non-seekable stream it reads forward from the
    /// current position — a second call observes nothing further.
    pub async fn read_all(&self) -> Result<Bytes, ClientError> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Buffer(data) => Ok(data.clone()),
            Self::Stream(stream) => {
                if stream.is_seekable() {
                    stream.seek(0)?;
                }
                stream.read_to_end().await
            }
        }
    }

    /// Prepares the body for the next retry attempt.
    ///
    /// # Errors
    ///
    /// Fails with [`BodyNotReplayableError`] for a non-seekable stream,
    /// which the previous attempt has already consumed.
    pub fn rewind(&self) -> Result<(), BodyNotReplayableError> {
        match self {
            Self::Empty | Self::Buffer(_) => Ok(()),
            Self::Stream(stream) => {
                if stream.is_seekable() {
                    stream.seek(0)
                } else {
                    Err(BodyNotReplayableError::new(
                        "non-seekable stream was consumed by a previous attempt",
                    ))
                }
            }
        }
    }

    /// Renders a best-effort human-readable preview.
    ///
    /// For a seekable stream the current position is snapshotted, the
    /// remainder is read, and the position is restored. A non-seekable
    /// stream is never read — doing so would destroy data — so only its
    /// structural metadata is reported.
    pub async fn debug_preview(&self) -> String {
        match self {
            Self::Empty => "<empty>".to_string(),
            Self::Buffer(data) => render_text(data),
            Self::Stream(stream) => {
                if stream.is_seekable() {
                    let snapshot = stream.position();
                    let preview = match stream.read_to_end().await {
                        Ok(data) => render_text(&data),
                        Err(_) => "<unreadable>".to_string(),
                    };
                    let _ = stream.seek(snapshot);
                    preview
                } else {
                    format!(
                        "position={} length={:?} is_empty={} is_seekable=false",
                        stream.position(),
                        stream.len(),
                        stream.is_empty(),
                    )
                }
            }
        }
    }
}

fn render_text(data: &[u8]) -> String {
    std::str::from_utf8(data).map_or_else(|_| "<not UTF-8>".to_string(), ToString::to_string)
}

impl PartialEq for ReplayableBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Buffer(a), Self::Buffer(b)) => a == b,
            // Stream handles compare by identity.
            (Self::Stream(a), Self::Stream(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
