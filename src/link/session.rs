use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_with::SerializeDisplay;
use strum_macros::Display;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::transport::{ChunkStream, Transport};
use crate::config::LinkConfig;
use crate::dispatch::{
    Continuation, Dispatcher, LinkEvent, OperationLifecycle, OperationRegistry, OperationState,
    PendingReplies, ReplyTicket,
};
use crate::error::{LinkError, TransportError};
use crate::messages::{Acknowledgement, Message};
use crate::protocol::MessageType;
use crate::store::SampleStore;
use crate::utils::HexBytes;
use crate::wire::{ChunkReassembler, FramePipeline};

/// Connection state of a [`LinkSession`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, SerializeDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum LinkState {
    Connecting,
    /// Transport up, device not yet announced.
    Connected,
    /// Device announced itself and received the host identity.
    Initialized,
    Closed,
    Failed,
}

impl LinkState {
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connected | Self::Initialized)
    }
}

type WriteConfirmation = oneshot::Sender<Result<(), TransportError>>;

#[derive(Debug)]
struct OutboundFrame {
    message_type: MessageType,
    chunks: Vec<Vec<u8>>,
    written: Option<WriteConfirmation>,
    /// Queued for deferred sending once this frame is on the wire.
    release: Vec<Message>,
}

struct Shared {
    transport: Arc<dyn Transport>,
    pipeline: FramePipeline,
    pending: Arc<PendingReplies>,
    deferred: Mutex<VecDeque<Message>>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    events: broadcast::Sender<LinkEvent>,
    state: watch::Sender<LinkState>,
    cancel: CancellationToken,
}

impl Shared {
    fn fail_link(&self, error: &TransportError) {
        if self.cancel.is_cancelled() {
            return;
        }
        warn!(%error, "link failed");
        self.state.send_if_modified(|state| {
            if *state == LinkState::Closed {
                return false;
            }
            *state = LinkState::Failed;
            true
        });
        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "cancelled outstanding replies");
        }
        self.cancel.cancel();
    }

    fn encode(&self, message: &Message) -> Result<Vec<Vec<u8>>, LinkError> {
        let payload = message.to_payload()?;
        Ok(self.pipeline.encode_chunks(&payload)?)
    }

    fn enqueue(&self, frame: OutboundFrame) -> Result<(), LinkError> {
        self.outbound.send(frame).map_err(|_| LinkError::Closed)
    }

    fn pop_deferred(&self) -> Option<Message> {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn push_deferred(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(messages);
    }
}

/// A live link to one device.
///
/// Owns a writer task that serialises every outbound frame onto the
/// transport and a reader task that reassembles notifications, decodes
/// them and routes them through the [`Dispatcher`].
pub struct LinkSession {
    shared: Arc<Shared>,
    config: LinkConfig,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for LinkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSession")
            .field("state", &self.state())
            .field("pipeline", &self.shared.pipeline)
            .finish_non_exhaustive()
    }
}

impl LinkSession {
    /// Connects `transport` and starts the link with the standard operations.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Transport`] when connecting or subscribing to
    /// notifications fails.
    pub async fn open(
        transport: Arc<dyn Transport>,
        config: LinkConfig,
        store: Arc<dyn SampleStore>,
    ) -> Result<Self, LinkError> {
        Self::open_with_registry(transport, config, store, OperationRegistry::standard()).await
    }

    /// Connects `transport` and starts the link with a custom registry.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Transport`] when connecting or subscribing to
    /// notifications fails.
    #[instrument(skip_all, level = "debug")]
    pub async fn open_with_registry(
        transport: Arc<dyn Transport>,
        config: LinkConfig,
        store: Arc<dyn SampleStore>,
        registry: OperationRegistry,
    ) -> Result<Self, LinkError> {
        let (state, _) = watch::channel(LinkState::Connecting);
        transport.connect().await?;
        let notifications = match transport.enable_notifications().await {
            Ok(stream) => stream,
            Err(error) => {
                if let Err(disconnect_error) = transport.disconnect().await {
                    debug!(%disconnect_error, "disconnect after failed subscribe also failed");
                }
                return Err(error.into());
            }
        };

        let max_chunk_len = config.max_chunk_len().min(transport.max_chunk_len());
        let pipeline = FramePipeline::builder()
            .checksum(config.checksum())
            .checksum_policy(config.checksum_policy())
            .max_chunk_len(max_chunk_len)
            .build();
        let pending = Arc::new(PendingReplies::new());
        let dispatcher = Dispatcher::new(
            registry,
            Arc::clone(&pending),
            store,
            config.host_identity().clone(),
            config.queue_fit_replies(),
        );
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity());
        state.send_replace(LinkState::Connected);

        let shared = Arc::new(Shared {
            transport,
            pipeline,
            pending,
            deferred: Mutex::new(VecDeque::new()),
            outbound,
            events,
            state,
            cancel: CancellationToken::new(),
        });

        let writer = tokio::spawn(run_writer(Arc::clone(&shared), outbound_rx));
        let reader = tokio::spawn(run_reader(Arc::clone(&shared), dispatcher, notifications));
        info!(max_chunk_len, "link connected");

        Ok(Self {
            shared,
            config,
            tasks: Mutex::new(vec![writer, reader]),
        })
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        *self.shared.state.borrow()
    }

    /// Watches state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Subscribes to events published after this call.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.events.subscribe()
    }

    /// Event stream that skips over events lost to a slow consumer.
    pub fn event_stream(&self) -> impl Stream<Item = LinkEvent> + Send + 'static {
        BroadcastStream::new(self.events()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(error) => {
                warn!(%error, "event subscriber fell behind");
                None
            }
        })
    }

    /// Waits until the device has announced itself.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::HandshakeTimeout`] when no announcement arrives
    /// in time and [`LinkError::Closed`] when the link ends first.
    pub async fn wait_until_initialized(&self, limit: Duration) -> Result<(), LinkError> {
        let mut watcher = self.subscribe_state();
        let reached = timeout(
            limit,
            watcher.wait_for(|state| {
                matches!(
                    state,
                    LinkState::Initialized | LinkState::Closed | LinkState::Failed
                )
            }),
        )
        .await;
        match reached {
            Ok(Ok(state)) if *state == LinkState::Initialized => Ok(()),
            Ok(_) => Err(LinkError::Closed),
            Err(_) => Err(LinkError::HandshakeTimeout { timeout: limit }),
        }
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.state().is_open() {
            Ok(())
        } else {
            Err(LinkError::Closed)
        }
    }

    /// Sends a message without waiting for its acknowledgement.
    ///
    /// Returns once every chunk has been written. The device's eventual
    /// acknowledgement is consumed and logged.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the message does not encode, the link is
    /// closed, or the transport rejects a chunk.
    #[instrument(skip(self, message), level = "debug", fields(message_type = %message.message_type()))]
    pub async fn send(&self, message: &Message) -> Result<(), LinkError> {
        self.ensure_open()?;
        let message_type = message.message_type();
        let mut lifecycle = OperationLifecycle::new(message_type);
        let chunks = self.shared.encode(message)?;
        lifecycle.advance(OperationState::Sending)?;

        let (written_tx, written_rx) = oneshot::channel();
        let frame = OutboundFrame {
            message_type,
            chunks,
            written: Some(written_tx),
            release: Vec::new(),
        };
        let ticket = if message_type == MessageType::ACKNOWLEDGEMENT {
            self.shared.enqueue(frame)?;
            None
        } else {
            Some(
                self.shared
                    .pending
                    .register_then(message_type, Continuation::Log, || {
                        self.shared.enqueue(frame)
                    })?,
            )
        };

        let written = match written_rx.await {
            Ok(result) => result.map_err(LinkError::from),
            Err(_) => Err(LinkError::Closed),
        };
        if let Err(error) = written {
            if let Some(ticket) = ticket {
                self.shared.pending.withdraw(ticket);
            }
            lifecycle.fail();
            return Err(error);
        }
        lifecycle.advance(OperationState::Completed)?;
        Ok(())
    }

    /// Sends a message and waits for the device acknowledgement with the
    /// configured reply timeout.
    ///
    /// # Errors
    ///
    /// See [`PendingReply::wait`].
    pub async fn request(&self, message: &Message) -> Result<Acknowledgement, LinkError> {
        self.request_with_timeout(message, self.config.reply_timeout())
            .await
    }

    /// Sends a message and waits up to `limit` for its acknowledgement.
    ///
    /// # Errors
    ///
    /// See [`PendingReply::wait`].
    #[instrument(skip(self, message), level = "debug", fields(message_type = %message.message_type()))]
    pub async fn request_with_timeout(
        &self,
        message: &Message,
        limit: Duration,
    ) -> Result<Acknowledgement, LinkError> {
        self.submit(message)?.wait(limit).await
    }

    /// Queues a message whose acknowledgement the caller will await.
    ///
    /// The reply waiter is registered before the first chunk can be
    /// written, so a fast device cannot answer ahead of it.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the message does not encode or the link is
    /// closed.
    pub fn submit(&self, message: &Message) -> Result<PendingReply, LinkError> {
        self.ensure_open()?;
        let message_type = message.message_type();
        let mut lifecycle = OperationLifecycle::new(message_type);
        let chunks = self.shared.encode(message)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let (written_tx, written_rx) = oneshot::channel();
        let frame = OutboundFrame {
            message_type,
            chunks,
            written: Some(written_tx),
            release: Vec::new(),
        };
        let ticket = self.shared.pending.register_then(
            message_type,
            Continuation::Deliver(reply_tx),
            || self.shared.enqueue(frame),
        )?;
        lifecycle.advance(OperationState::Sending)?;

        Ok(PendingReply {
            ticket,
            lifecycle,
            written: Some(written_rx),
            reply: reply_rx,
            pending: Arc::clone(&self.shared.pending),
        })
    }

    /// Stops both tasks, fails outstanding requests with
    /// [`LinkError::Cancelled`] and disconnects.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Transport`] when the disconnect fails; the link
    /// is closed regardless.
    #[instrument(skip(self), level = "debug")]
    pub async fn close(&self) -> Result<(), LinkError> {
        if self.state() == LinkState::Closed {
            return Ok(());
        }
        self.shared.cancel.cancel();
        let cancelled = self.shared.pending.cancel_all();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            if let Err(error) = task.await {
                warn!(%error, "link task ended abnormally");
            }
        }

        if let Err(error) = self.shared.transport.disable_notifications().await {
            debug!(%error, "disabling notifications failed during close");
        }
        let disconnected = self.shared.transport.disconnect().await;
        self.shared.state.send_replace(LinkState::Closed);
        info!(cancelled, "link closed");
        disconnected.map_err(LinkError::from)
    }
}

impl Drop for LinkSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

/// A request whose acknowledgement has not arrived yet.
#[derive(Debug)]
pub struct PendingReply {
    ticket: ReplyTicket,
    lifecycle: OperationLifecycle,
    written: Option<oneshot::Receiver<Result<(), TransportError>>>,
    reply: oneshot::Receiver<Acknowledgement>,
    pending: Arc<PendingReplies>,
}

impl PendingReply {
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.ticket.message_type()
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.lifecycle.state()
    }

    /// Waits up to `limit` for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Timeout`] when nothing arrives in time (the
    /// waiter is withdrawn so a late reply cannot reach it),
    /// [`LinkError::Cancelled`] when the link closes first, or
    /// [`LinkError::Transport`] when writing the request failed.
    pub async fn wait(mut self, limit: Duration) -> Result<Acknowledgement, LinkError> {
        let message_type = self.message_type();
        match timeout(limit, self.receive()).await {
            Ok(result) => result,
            Err(_) => {
                self.pending.withdraw(self.ticket);
                self.lifecycle.fail();
                warn!(%message_type, ?limit, "no reply before timeout");
                Err(LinkError::Timeout {
                    message_type,
                    timeout: limit,
                })
            }
        }
    }

    async fn receive(&mut self) -> Result<Acknowledgement, LinkError> {
        let message_type = self.message_type();
        if let Some(written) = self.written.take() {
            let outcome = match written.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(LinkError::from(error)),
                Err(_) => Err(LinkError::Cancelled { message_type }),
            };
            if let Err(error) = outcome {
                self.pending.withdraw(self.ticket);
                self.lifecycle.fail();
                return Err(error);
            }
            self.lifecycle.advance(OperationState::AwaitingReply)?;
        }

        if let Ok(ack) = (&mut self.reply).await {
            self.lifecycle.advance(OperationState::Completed)?;
            trace!(%message_type, status = ack.status(), "reply delivered");
            Ok(ack)
        } else {
            self.lifecycle.fail();
            Err(LinkError::Cancelled { message_type })
        }
    }
}

async fn run_writer(shared: Arc<Shared>, mut outbound: mpsc::UnboundedReceiver<OutboundFrame>) {
    loop {
        let frame = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            frame = outbound.recv() => frame,
        };
        let Some(frame) = frame else {
            break;
        };
        if !write_frame(&shared, frame).await {
            break;
        }

        // Each completed write is a send opportunity for one queued reply.
        let Some(message) = shared.pop_deferred() else {
            continue;
        };
        let chunks = match shared.encode(&message) {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(%error, "dropping deferred message that does not encode");
                continue;
            }
        };
        let deferred = OutboundFrame {
            message_type: message.message_type(),
            chunks,
            written: None,
            release: Vec::new(),
        };
        if !write_frame(&shared, deferred).await {
            break;
        }
    }
    debug!("link writer stopped");
}

async fn write_frame(shared: &Shared, frame: OutboundFrame) -> bool {
    let OutboundFrame {
        message_type,
        chunks,
        written,
        release,
    } = frame;
    let mut result = Ok(());
    for chunk in &chunks {
        trace!(%message_type, chunk = %HexBytes(chunk), "writing chunk");
        if let Err(error) = shared.transport.send_chunk(chunk).await {
            result = Err(error);
            break;
        }
    }

    // The link is marked failed before the caller learns of the error.
    let ok = match &result {
        Ok(()) => {
            debug!(%message_type, chunks = chunks.len(), "frame written");
            shared.push_deferred(release);
            true
        }
        Err(error) => {
            shared.fail_link(error);
            false
        }
    };
    if let Some(written) = written {
        let _ = written.send(result);
    }
    ok
}

async fn run_reader(shared: Arc<Shared>, dispatcher: Dispatcher, mut notifications: ChunkStream) {
    let mut reassembler = ChunkReassembler::default();
    loop {
        let next = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => break,
            next = notifications.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                trace!(chunk = %HexBytes(&chunk), "notification received");
                for frame in reassembler.push(&chunk) {
                    handle_frame(&shared, &dispatcher, &frame);
                }
            }
            Some(Err(error)) => {
                shared.fail_link(&error);
                break;
            }
            None => {
                shared.fail_link(&TransportError::NotificationsClosed);
                break;
            }
        }
    }
    debug!("link reader stopped");
}

fn handle_frame(shared: &Shared, dispatcher: &Dispatcher, frame: &[u8]) {
    let payload = match shared.pipeline.decode(frame) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%error, frame = %HexBytes(frame), "dropping undecodable frame");
            return;
        }
    };

    let (reply, deferred, events, initialized) = dispatcher.dispatch(&payload).into_parts();
    // Deferred replies ride on the acknowledgement so they never overtake it.
    match reply.map(|reply| (reply.message_type(), shared.encode(&reply))) {
        Some((message_type, Ok(chunks))) => {
            let frame = OutboundFrame {
                message_type,
                chunks,
                written: None,
                release: deferred,
            };
            if shared.enqueue(frame).is_err() {
                debug!("writer gone; acknowledgement not sent");
            }
        }
        Some((_, Err(error))) => {
            warn!(%error, "acknowledgement does not encode");
            shared.push_deferred(deferred);
        }
        None => shared.push_deferred(deferred),
    }
    for event in events {
        // No subscribers is fine.
        let _ = shared.events.send(event);
    }
    if initialized {
        shared.state.send_if_modified(|state| {
            if *state == LinkState::Connected {
                *state = LinkState::Initialized;
                info!("device handshake complete");
                true
            } else {
                false
            }
        });
    }
}
