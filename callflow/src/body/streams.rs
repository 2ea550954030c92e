//! Provided [`ByteStream`] implementations.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::body::ByteStream;
use crate::errors::{BodyNotReplayableError, ClientError};

/// An in-memory, seekable stream over a fixed buffer.
///
/// The read cursor lives behind a mutex so clones of the owning request
/// share one position, which is what retry replay relies on.
#[derive(Debug)]
pub struct BufferedStream {
    data: Bytes,
    position: Mutex<u64>,
}

impl BufferedStream {
    /// Creates a new buffered stream over the given bytes.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ByteStream for BufferedStream {
    fn is_seekable(&self) -> bool {
        true
    }

    fn position(&self) -> u64 {
        *self.position.lock()
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn seek(&self, offset: u64) -> Result<(), BodyNotReplayableError> {
        let clamped = offset.min(self.data.len() as u64);
        *self.position.lock() = clamped;
        Ok(())
    }

    async fn read_to_end(&self) -> Result<Bytes, ClientError> {
        let mut position = self.position.lock();
        let start = usize::try_from(*position).unwrap_or(self.data.len());
        *position = self.data.len() as u64;
        Ok(self.data.slice(start.min(self.data.len())..))
    }
}

/// A non-seekable, consume-once stream.
///
/// Reading drains the remaining bytes; a second read observes nothing
/// further. The total length is unknown to callers, as it would be for a
/// live source.
#[derive(Debug)]
pub struct ForwardOnlyStream {
    state: Mutex<ForwardState>,
}

#[derive(Debug)]
struct ForwardState {
    remaining: Bytes,
    consumed: u64,
}

impl ForwardOnlyStream {
    /// Creates a new forward-only stream over the given bytes.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            state: Mutex::new(ForwardState {
                remaining: data.into(),
                consumed: 0,
            }),
        }
    }
}

#[async_trait]
impl ByteStream for ForwardOnlyStream {
    fn is_seekable(&self) -> bool {
        false
    }

    fn position(&self) -> u64 {
        self.state.lock().consumed
    }

    fn len(&self) -> Option<u64> {
        None
    }

    fn is_empty(&self) -> bool {
        self.state.lock().remaining.is_empty()
    }

    fn seek(&self, _offset: u64) -> Result<(), BodyNotReplayableError> {
        Err(BodyNotReplayableError::new(
            "cannot seek a non-seekable stream",
        ))
    }

    async fn read_to_end(&self) -> Result<Bytes, ClientError> {
        let mut state = self.state.lock();
        let drained = std::mem::take(&mut state.remaining);
        state.consumed += drained.len() as u64;
        Ok(drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffered_stream_replays_after_seek() {
        let stream = BufferedStream::new(&b"hello world"[..]);

        let first = stream.read_to_end().await.unwrap();
        assert_eq!(first, Bytes::from_static(b"hello world"));
        assert_eq!(stream.position(), 11);

        stream.seek(0).unwrap();
        let second = stream.read_to_end().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_buffered_stream_reads_from_position() {
        let stream = BufferedStream::new(&b"hello world"[..]);
        stream.seek(6).unwrap();

        let tail = stream.read_to_end().await.unwrap();
        assert_eq!(tail, Bytes::from_static(b"world"));
    }

    #[test]
    fn test_buffered_stream_seek_clamps() {
        let stream = BufferedStream::new(&b"abc"[..]);
        stream.seek(100).unwrap();
        assert_eq!(stream.position(), 3);
    }

    #[tokio::test]
    async fn test_forward_only_second_read_is_empty() {
        let stream = ForwardOnlyStream::new(&b"payload"[..]);

        let first = stream.read_to_end().await.unwrap();
        assert_eq!(first, Bytes::from_static(b"payload"));
        assert_eq!(stream.position(), 7);
        assert!(stream.is_empty());

        let second = stream.read_to_end().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(stream.position(), 7);
    }

    #[test]
    fn test_forward_only_cannot_seek() {
        let stream = ForwardOnlyStream::new(&b"payload"[..]);
        assert!(stream.seek(0).is_err());
        assert!(!stream.is_seekable());
        assert_eq!(stream.len(), None);
    }
}
