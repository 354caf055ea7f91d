use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::error::TransportError;
use crate::wire::DEFAULT_MAX_CHUNK_LEN;

/// Notification chunks as they arrive from the device.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Byte-oriented link to one device.
///
/// Implementations deliver writes in call order and never split or merge
/// chunks. Radio-level concerns such as scanning and GATT discovery stay
/// behind this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tears the connection down. Calling this twice is harmless.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Writes one chunk of at most [`Transport::max_chunk_len`] bytes.
    async fn send_chunk(&self, chunk: &[u8]) -> Result<(), TransportError>;

    /// Subscribes to device notifications.
    async fn enable_notifications(&self) -> Result<ChunkStream, TransportError>;

    /// Unsubscribes from device notifications.
    async fn disable_notifications(&self) -> Result<(), TransportError>;

    /// Largest chunk a single write may carry.
    fn max_chunk_len(&self) -> usize {
        DEFAULT_MAX_CHUNK_LEN
    }
}
