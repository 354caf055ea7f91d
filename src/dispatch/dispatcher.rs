use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::error::ProtocolError;
use crate::messages::{Acknowledgement, DeviceInformation, Message, MessageBody, split_header};
use crate::protocol::MessageType;
use crate::store::SampleStore;
use crate::utils::HexBytes;
use crate::wire::BodyReader;

use super::operation::{
    AckPolicy, InboundOperation, OperationLifecycle, OperationState, ReceiveContext,
};
use super::pending::{PendingReplies, Resolution};
use super::registry::OperationRegistry;
use super::LinkEvent;

/// What became of one inbound payload.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Disposition {
    /// A device acknowledgement reached its waiter.
    ReplyDelivered,
    /// A device acknowledgement arrived with nobody waiting for it.
    ReplyUnmatched,
    /// A registered operation ran to the given terminal state.
    Handled(OperationState),
    /// No operation is registered for the type; nothing is sent back.
    Unknown,
    /// The payload was too short to carry a type header.
    Malformed,
}

/// Side effects the link must carry out for one inbound payload.
#[derive(Debug)]
pub struct DispatchOutcome {
    message_type: Option<MessageType>,
    reply: Option<Message>,
    deferred: Vec<Message>,
    events: Vec<LinkEvent>,
    initialized: bool,
    disposition: Disposition,
}

impl DispatchOutcome {
    fn new(message_type: Option<MessageType>, disposition: Disposition) -> Self {
        Self {
            message_type,
            reply: None,
            deferred: Vec::new(),
            events: Vec::new(),
            initialized: false,
            disposition,
        }
    }

    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type
    }

    /// Acknowledgement to send immediately, if any.
    #[must_use]
    pub fn reply(&self) -> Option<&Message> {
        self.reply.as_ref()
    }

    /// Messages to send at later opportunities.
    #[must_use]
    pub fn deferred(&self) -> &[Message] {
        &self.deferred
    }

    #[must_use]
    pub fn events(&self) -> &[LinkEvent] {
        &self.events
    }

    /// Whether this payload completed the device handshake.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub(crate) fn into_parts(self) -> (Option<Message>, Vec<Message>, Vec<LinkEvent>, bool) {
        (self.reply, self.deferred, self.events, self.initialized)
    }
}

/// Routes decoded payloads to reply waiters or inbound operations.
pub struct Dispatcher {
    registry: OperationRegistry,
    pending: Arc<PendingReplies>,
    store: Arc<dyn SampleStore>,
    host_identity: DeviceInformation,
    queue_fit_replies: bool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("queue_fit_replies", &self.queue_fit_replies)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: OperationRegistry,
        pending: Arc<PendingReplies>,
        store: Arc<dyn SampleStore>,
        host_identity: DeviceInformation,
        queue_fit_replies: bool,
    ) -> Self {
        Self {
            registry,
            pending,
            store,
            host_identity,
            queue_fit_replies,
        }
    }

    #[must_use]
    pub fn pending(&self) -> &Arc<PendingReplies> {
        &self.pending
    }

    /// Handles one decoded payload.
    #[instrument(skip(self, payload), level = "debug", fields(len = payload.len()))]
    pub fn dispatch(&self, payload: &[u8]) -> DispatchOutcome {
        let (message_type, body) = match split_header(payload) {
            Ok(parts) => parts,
            Err(error) => {
                warn!(%error, payload = %HexBytes(payload), "dropping malformed payload");
                return DispatchOutcome::new(None, Disposition::Malformed);
            }
        };

        if message_type == MessageType::ACKNOWLEDGEMENT {
            return self.route_acknowledgement(body);
        }

        let Some(operation) = self.registry.create(message_type) else {
            warn!(
                %message_type,
                body = %HexBytes(body),
                "no operation registered for message type; ignoring"
            );
            return DispatchOutcome::new(Some(message_type), Disposition::Unknown);
        };
        self.run_operation(message_type, operation, body)
    }

    fn route_acknowledgement(&self, body: &[u8]) -> DispatchOutcome {
        let message_type = Some(MessageType::ACKNOWLEDGEMENT);
        let ack = match Acknowledgement::decode_body(&mut BodyReader::new(body)) {
            Ok(ack) => ack,
            Err(error) => {
                warn!(%error, "dropping malformed acknowledgement");
                return DispatchOutcome::new(message_type, Disposition::Malformed);
            }
        };
        let original_type = ack.original_type();
        match self.pending.resolve(ack) {
            Resolution::Resolved => DispatchOutcome::new(message_type, Disposition::ReplyDelivered),
            Resolution::Unmatched => {
                debug!(%original_type, "acknowledgement matched no outstanding request");
                DispatchOutcome::new(message_type, Disposition::ReplyUnmatched)
            }
        }
    }

    fn run_operation(
        &self,
        message_type: MessageType,
        mut operation: Box<dyn InboundOperation>,
        body: &[u8],
    ) -> DispatchOutcome {
        let mut lifecycle = OperationLifecycle::new(message_type);
        if let Err(error) = self.receive(&mut lifecycle, operation.as_mut(), body) {
            warn!(%error, %message_type, "inbound operation failed");
            lifecycle.fail();
            return DispatchOutcome::new(Some(message_type), Disposition::Handled(lifecycle.state()));
        }

        let mut context =
            ReceiveContext::new(&self.host_identity, self.store.as_ref(), self.queue_fit_replies);
        let policy = operation.on_received(&mut context);
        let (events, deferred, initialized) = context.into_parts();

        let reply = match policy {
            AckPolicy::Generic => Some(Acknowledgement::generic(message_type)),
            AckPolicy::WithReply(ack) => Some(ack),
            AckPolicy::Silent => None,
        };
        let finished = match reply {
            Some(_) => lifecycle
                .advance(OperationState::AutoAcking)
                .and_then(|()| lifecycle.advance(OperationState::Completed)),
            None => lifecycle.advance(OperationState::Completed),
        };
        if let Err(error) = finished {
            warn!(%error, "inbound operation left in an unexpected state");
            lifecycle.fail();
        }

        DispatchOutcome {
            message_type: Some(message_type),
            reply: reply.map(Message::from),
            deferred,
            events,
            initialized,
            disposition: Disposition::Handled(lifecycle.state()),
        }
    }

    fn receive(
        &self,
        lifecycle: &mut OperationLifecycle,
        operation: &mut dyn InboundOperation,
        body: &[u8],
    ) -> Result<(), ProtocolError> {
        lifecycle.advance(OperationState::Receiving)?;
        operation.decode(body)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tokio::sync::oneshot;

    use super::*;
    use crate::dispatch::Continuation;
    use crate::messages::{SystemEvent, SystemEventKind};
    use crate::store::{MemoryStore, StoredRecord};

    fn dispatcher_with(store: Arc<MemoryStore>) -> Dispatcher {
        Dispatcher::new(
            OperationRegistry::standard(),
            Arc::new(PendingReplies::new()),
            store,
            DeviceInformation::host_default(),
            true,
        )
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn unknown_type_is_dropped_without_reply() {
        let outcome = dispatcher().dispatch(&[0x99, 0x99, 0x01, 0x02]);

        assert_eq!(Disposition::Unknown, outcome.disposition());
        assert_eq!(None, outcome.reply());
        assert!(outcome.deferred().is_empty());
        assert!(outcome.events().is_empty());
    }

    #[test]
    fn short_payload_is_malformed() {
        assert_eq!(Disposition::Malformed, dispatcher().dispatch(&[0xA6]).disposition());
    }

    #[test]
    fn system_event_is_published_and_acknowledged() {
        let payload = SystemEvent::from(SystemEventKind::SyncReady)
            .to_payload()
            .expect("event should encode");
        let outcome = dispatcher().dispatch(&payload);

        assert_eq!(Disposition::Handled(OperationState::Completed), outcome.disposition());
        assert_eq!(
            Some(&Message::from(Acknowledgement::generic(MessageType::SYSTEM_EVENT))),
            outcome.reply()
        );
        assert_matches!(outcome.events(), [LinkEvent::SystemEvent(event)] if event.kind() == SystemEventKind::SyncReady);
    }

    #[test]
    fn device_information_initializes_and_replies_with_host_identity() {
        let device = DeviceInformation::builder()
            .name("vivofit 3")
            .manufacturer("Garmin")
            .model("vivofit3")
            .build();
        let outcome = dispatcher().dispatch(&device.to_payload().expect("info should encode"));

        assert!(outcome.initialized());
        let Some(Message::Acknowledgement(ack)) = outcome.reply() else {
            panic!("device information should be answered with an acknowledgement");
        };
        assert_eq!(MessageType::DEVICE_INFORMATION, ack.original_type());
        let embedded = ack.embedded_reply().expect("ack should embed host identity");
        let host = DeviceInformation::decode_body(&mut BodyReader::new(embedded))
            .expect("embedded identity should decode");
        assert_eq!(DeviceInformation::host_default(), host);
    }

    #[test]
    fn malformed_device_information_fails_without_reply() {
        let outcome = dispatcher().dispatch(&[0xA0, 0x13, 0x70]);

        assert_eq!(Disposition::Handled(OperationState::Failed), outcome.disposition());
        assert_eq!(None, outcome.reply());
        assert!(!outcome.initialized());
    }

    #[test]
    fn fit_data_is_stored_and_answered_later() {
        let store = Arc::new(MemoryStore::new());
        let outcome = dispatcher_with(Arc::clone(&store)).dispatch(&[0x94, 0x13, 0xAA]);

        assert_eq!(
            vec![StoredRecord::new(MessageType::FIT_DATA, vec![0xAA])],
            store.records()
        );
        assert_eq!(1, outcome.deferred().len());
        assert_eq!(
            Some(&Message::from(Acknowledgement::generic(MessageType::FIT_DATA))),
            outcome.reply()
        );
    }

    #[test]
    fn device_ack_reaches_waiter() {
        let dispatcher = dispatcher();
        let (tx, mut rx) = oneshot::channel();
        dispatcher
            .pending()
            .register(MessageType::CREATE_FILE, Continuation::Deliver(tx));

        let outcome = dispatcher.dispatch(&[0x88, 0x13, 0x8D, 0x13, 0x00, 0x00, 0x07, 0x00]);

        assert_eq!(Disposition::ReplyDelivered, outcome.disposition());
        assert_eq!(None, outcome.reply());
        let ack = rx.try_recv().expect("waiter should receive the acknowledgement");
        assert_eq!(&[0x00, 0x07, 0x00], ack.payload());
    }

    #[test]
    fn unsolicited_ack_is_ignored() {
        let outcome = dispatcher().dispatch(&[0x88, 0x13, 0xA6, 0x13, 0x00]);
        assert_eq!(Disposition::ReplyUnmatched, outcome.disposition());
        assert_eq!(None, outcome.reply());
    }
}
