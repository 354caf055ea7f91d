use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bon::Builder;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, instrument, warn};

use super::transport::{ChunkStream, Transport};
use crate::error::TransportError;
use crate::messages::{
    Acknowledgement, CreateFileReply, CreateFileStatus, DeviceInformation, Message, UploadReply,
};
use crate::protocol::MessageType;
use crate::wire::{BodyWriter, ChunkReassembler, DEFAULT_MAX_CHUNK_LEN, FramePipeline};

type Notifier = mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>;

/// Identity the simulated device announces.
#[must_use]
pub fn simulated_device_identity() -> DeviceInformation {
    DeviceInformation::builder()
        .product_number(0x0907)
        .unit_id(3_912_345_678)
        .software_version(440)
        .max_packet_size(0x0400)
        .name("vivofit 3")
        .manufacturer("Garmin")
        .model("vivofit3")
        .build()
}

/// Behaviour of a [`FakeDevice`].
#[derive(Debug, Clone, Builder)]
pub struct FakeDeviceConfig {
    /// Announce [`DeviceInformation`] as soon as notifications are enabled.
    #[builder(default = true)]
    announce_on_connect: bool,
    #[builder(default = simulated_device_identity())]
    identity: DeviceInformation,
    #[builder(default = CreateFileStatus::Created)]
    create_file_status: CreateFileStatus,
    #[builder(default = 7)]
    file_index: u16,
    #[builder(default)]
    upload_status: u8,
    /// Offset the device reports when an upload opens, for resumed uploads.
    #[builder(default)]
    resume_offset: u32,
    #[builder(default)]
    transfer_status: u8,
    /// Types the device receives but never acknowledges.
    #[builder(default)]
    silent_types: Vec<MessageType>,
    #[builder(default = DEFAULT_MAX_CHUNK_LEN)]
    max_chunk_len: usize,
    #[builder(default)]
    pipeline: FramePipeline,
    /// Reject every write after this many chunks.
    fail_writes_after: Option<usize>,
}

impl Default for FakeDeviceConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    connected: bool,
    notifier: Option<Notifier>,
    reassembler: ChunkReassembler,
    received: Vec<Message>,
    chunks_written: usize,
    uploaded: Vec<u8>,
}

/// In-process device that speaks the link protocol.
///
/// Every host message is recorded. Messages other than acknowledgements
/// are acknowledged, with reply fields for file creation, upload requests
/// and transfer slices.
#[derive(Debug)]
pub struct FakeDevice {
    config: FakeDeviceConfig,
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    #[must_use]
    pub fn new(config: FakeDeviceConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DeviceState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages received from the host, in arrival order.
    #[must_use]
    pub fn received(&self) -> Vec<Message> {
        self.lock().received.clone()
    }

    #[must_use]
    pub fn received_types(&self) -> Vec<MessageType> {
        self.lock()
            .received
            .iter()
            .map(Message::message_type)
            .collect()
    }

    /// Number of chunks the host has written.
    #[must_use]
    pub fn chunks_written(&self) -> usize {
        self.lock().chunks_written
    }

    /// File contents assembled from transfer slices.
    #[must_use]
    pub fn uploaded(&self) -> Vec<u8> {
        self.lock().uploaded.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Sends `message` to the host as the device would.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotificationsClosed`] when the host is not
    /// subscribed, or [`TransportError::Io`] when the message does not encode.
    pub fn inject(&self, message: &Message) -> Result<(), TransportError> {
        let chunks = self.encode(message)?;
        self.inject_chunks(chunks)
    }

    /// Delivers raw notification chunks to the host.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotificationsClosed`] when the host is not
    /// subscribed.
    pub fn inject_chunks(&self, chunks: Vec<Vec<u8>>) -> Result<(), TransportError> {
        let state = self.lock();
        let notifier = state
            .notifier
            .as_ref()
            .ok_or(TransportError::NotificationsClosed)?;
        for chunk in chunks {
            notifier
                .send(Ok(chunk))
                .map_err(|_| TransportError::NotificationsClosed)?;
        }
        Ok(())
    }

    /// Ends the notification stream as a dropped connection would.
    pub fn close_notifications(&self) {
        self.lock().notifier = None;
    }

    fn encode(&self, message: &Message) -> Result<Vec<Vec<u8>>, TransportError> {
        let payload = message.to_payload().map_err(|error| TransportError::Io {
            reason: error.to_string(),
        })?;
        self.config
            .pipeline
            .encode_chunks(&payload)
            .map_err(|error| TransportError::Io {
                reason: error.to_string(),
            })
    }

    fn respond(&self, state: &mut DeviceState, message: &Message) -> Option<Acknowledgement> {
        let message_type = message.message_type();
        if message_type == MessageType::ACKNOWLEDGEMENT
            || self.config.silent_types.contains(&message_type)
        {
            return None;
        }

        let mut writer = BodyWriter::new();
        match message {
            Message::CreateFile(request) => {
                CreateFileReply::new(
                    self.config.create_file_status,
                    self.config.file_index,
                    request.subtype(),
                    self.config.file_index,
                )
                .encode_reply(&mut writer);
                state.uploaded = vec![0; usize::try_from(request.size()).unwrap_or(0)];
            }
            Message::UploadRequest(request) => {
                UploadReply::new(
                    self.config.upload_status,
                    self.config.resume_offset,
                    request.max_size(),
                    request.crc_seed(),
                )
                .encode_reply(&mut writer);
            }
            Message::FileTransferData(slice) => {
                let start = usize::try_from(slice.offset()).unwrap_or(usize::MAX);
                let end = start.saturating_add(slice.data().len());
                if end > state.uploaded.len() {
                    state.uploaded.resize(end, 0);
                }
                if let Some(target) = state.uploaded.get_mut(start..end) {
                    target.copy_from_slice(slice.data());
                }
                writer.put_u8(self.config.transfer_status);
            }
            _ => {}
        }
        Some(Acknowledgement::new(
            message_type,
            Acknowledgement::STATUS_OK,
            writer.into_bytes(),
        ))
    }
}

#[async_trait]
impl Transport for FakeDevice {
    async fn connect(&self) -> Result<(), TransportError> {
        self.lock().connected = true;
        debug!("fake device connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.connected = false;
        state.notifier = None;
        Ok(())
    }

    #[instrument(skip(self, chunk), level = "trace", fields(len = chunk.len()))]
    async fn send_chunk(&self, chunk: &[u8]) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if chunk.len() > self.config.max_chunk_len {
            return Err(TransportError::ChunkTooLarge {
                len: chunk.len(),
                max: self.config.max_chunk_len,
            });
        }
        if let Some(limit) = self.config.fail_writes_after
            && state.chunks_written >= limit
        {
            return Err(TransportError::WriteRejected {
                reason: format!("fake device accepts only {limit} chunks"),
            });
        }
        state.chunks_written += 1;

        for frame in state.reassembler.push(chunk) {
            let message = match self
                .config
                .pipeline
                .decode(&frame)
                .map_err(|error| error.to_string())
                .and_then(|payload| Message::decode(&payload).map_err(|error| error.to_string()))
            {
                Ok(message) => message,
                Err(error) => {
                    warn!(%error, "fake device dropped a frame");
                    continue;
                }
            };
            let reply = self.respond(&mut state, &message);
            state.received.push(message);

            let Some(reply) = reply else {
                continue;
            };
            let chunks = self.encode(&Message::from(reply))?;
            if let Some(notifier) = &state.notifier {
                for chunk in chunks {
                    // The host may have unsubscribed; the reply is lost like over the air.
                    let _ = notifier.send(Ok(chunk));
                }
            }
        }
        Ok(())
    }

    async fn enable_notifications(&self) -> Result<ChunkStream, TransportError> {
        let (notifier, receiver) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            if !state.connected {
                return Err(TransportError::NotConnected);
            }
            state.notifier = Some(notifier);
        }
        if self.config.announce_on_connect {
            self.inject(&Message::from(self.config.identity.clone()))?;
        }
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn disable_notifications(&self) -> Result<(), TransportError> {
        self.lock().notifier = None;
        Ok(())
    }

    fn max_chunk_len(&self) -> usize {
        self.config.max_chunk_len
    }
}
