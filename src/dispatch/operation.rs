use strum_macros::Display;
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::messages::{
    Acknowledgement, DeviceInformation, Message, MessageBody, RawMessage, SystemEvent,
    host_fit_reply,
};
use crate::protocol::MessageType;
use crate::store::{SampleStore, StoredRecord};
use crate::wire::BodyReader;

use super::LinkEvent;

/// Lifecycle of one unit of protocol work.
///
/// Outbound: `Created → Sending → AwaitingReply → Completed`, or
/// `Created → Sending → Completed` when no reply is expected.
/// Inbound: `Created → Receiving → AutoAcking → Completed`, or
/// `Created → Receiving → Completed` when the operation sends nothing back.
/// Every non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OperationState {
    Created,
    Sending,
    AwaitingReply,
    Receiving,
    AutoAcking,
    Completed,
    Failed,
}

impl OperationState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether `self → next` is a legal step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use OperationState::{
            AutoAcking, AwaitingReply, Completed, Created, Failed, Receiving, Sending,
        };

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Created, Sending | Receiving)
            | (Sending, AwaitingReply | Completed)
            | (AwaitingReply, Completed)
            | (Receiving, AutoAcking | Completed)
            | (AutoAcking, Completed) => true,
            _ => false,
        }
    }
}

/// Tracks the state of one operation and rejects illegal steps.
#[derive(Debug, Clone)]
pub struct OperationLifecycle {
    message_type: MessageType,
    state: OperationState,
}

impl OperationLifecycle {
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            state: OperationState::Created,
        }
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.state
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransition`] when the step is not
    /// legal from the current state; the state is left unchanged.
    pub fn advance(&mut self, next: OperationState) -> Result<(), ProtocolError> {
        if !self.state.can_transition_to(next) {
            return Err(ProtocolError::InvalidTransition {
                message_type: self.message_type,
                from: self.state,
                to: next,
            });
        }
        debug!(
            message_type = %self.message_type,
            from = %self.state,
            to = %next,
            "operation state changed"
        );
        self.state = next;
        Ok(())
    }

    /// Moves to `Failed` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = OperationState::Failed;
        }
    }
}

/// How an inbound operation answers the message it received.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum AckPolicy {
    /// Plain acknowledgement carrying the original type.
    Generic,
    /// Acknowledgement embedding a reply.
    WithReply(Acknowledgement),
    /// No acknowledgement.
    Silent,
}

/// Everything an inbound operation may touch while handling one message.
pub struct ReceiveContext<'a> {
    host_identity: &'a DeviceInformation,
    store: &'a dyn SampleStore,
    queue_fit_replies: bool,
    events: Vec<LinkEvent>,
    deferred: Vec<Message>,
    initialized: bool,
}

impl<'a> ReceiveContext<'a> {
    pub(crate) fn new(
        host_identity: &'a DeviceInformation,
        store: &'a dyn SampleStore,
        queue_fit_replies: bool,
    ) -> Self {
        Self {
            host_identity,
            store,
            queue_fit_replies,
            events: Vec::new(),
            deferred: Vec::new(),
            initialized: false,
        }
    }

    #[must_use]
    pub fn host_identity(&self) -> &DeviceInformation {
        self.host_identity
    }

    #[must_use]
    pub fn store(&self) -> &dyn SampleStore {
        self.store
    }

    #[must_use]
    pub fn queue_fit_replies(&self) -> bool {
        self.queue_fit_replies
    }

    /// Publishes an event to link subscribers.
    pub fn publish(&mut self, event: LinkEvent) {
        self.events.push(event);
    }

    /// Queues a message for the next send opportunity.
    pub fn defer(&mut self, message: Message) {
        self.deferred.push(message);
    }

    /// Marks the link as initialized.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn into_parts(self) -> (Vec<LinkEvent>, Vec<Message>, bool) {
        (self.events, self.deferred, self.initialized)
    }
}

/// Handles one inbound message type.
///
/// The dispatcher constructs a fresh operation per message, calls
/// [`InboundOperation::decode`] with the body and then
/// [`InboundOperation::on_received`].
pub trait InboundOperation: Send {
    fn message_type(&self) -> MessageType;

    /// Decodes the message body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the body is malformed; the operation
    /// then fails without acknowledging.
    fn decode(&mut self, body: &[u8]) -> Result<(), ProtocolError>;

    /// Reacts to the decoded message and chooses the acknowledgement.
    fn on_received(&mut self, context: &mut ReceiveContext<'_>) -> AckPolicy;
}

/// Device announcement: marks the link initialized and answers with the
/// host's own identity.
#[derive(Debug, Default)]
pub struct DeviceInformationOperation {
    received: Option<DeviceInformation>,
}

impl InboundOperation for DeviceInformationOperation {
    fn message_type(&self) -> MessageType {
        DeviceInformation::MESSAGE_TYPE
    }

    fn decode(&mut self, body: &[u8]) -> Result<(), ProtocolError> {
        self.received = Some(DeviceInformation::decode_body(&mut BodyReader::new(body))?);
        Ok(())
    }

    fn on_received(&mut self, context: &mut ReceiveContext<'_>) -> AckPolicy {
        let Some(device) = self.received.take() else {
            return AckPolicy::Silent;
        };
        debug!(
            device = device.name(),
            unit_id = device.unit_id(),
            software_version = device.software_version(),
            "device announced itself"
        );
        context.mark_initialized();
        context.publish(LinkEvent::DeviceInformation(device));

        match Acknowledgement::with_reply(context.host_identity()) {
            Ok(ack) => AckPolicy::WithReply(ack),
            Err(error) => {
                warn!(%error, "host identity does not encode; sending plain acknowledgement");
                AckPolicy::Generic
            }
        }
    }
}

/// Device lifecycle event: published to subscribers and acknowledged.
#[derive(Debug, Default)]
pub struct SystemEventOperation {
    received: Option<SystemEvent>,
}

impl InboundOperation for SystemEventOperation {
    fn message_type(&self) -> MessageType {
        SystemEvent::MESSAGE_TYPE
    }

    fn decode(&mut self, body: &[u8]) -> Result<(), ProtocolError> {
        self.received = Some(SystemEvent::decode_body(&mut BodyReader::new(body))?);
        Ok(())
    }

    fn on_received(&mut self, context: &mut ReceiveContext<'_>) -> AckPolicy {
        if let Some(event) = self.received.take() {
            debug!(kind = %event.kind(), "device system event");
            context.publish(LinkEvent::SystemEvent(event));
        }
        AckPolicy::Generic
    }
}

/// FIT definition or data record: stored, acknowledged, and answered with
/// the host's canned record at the next send opportunity.
#[derive(Debug)]
pub struct FitRecordOperation {
    message_type: MessageType,
    body: Vec<u8>,
}

impl FitRecordOperation {
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            body: Vec::new(),
        }
    }
}

impl InboundOperation for FitRecordOperation {
    fn message_type(&self) -> MessageType {
        self.message_type
    }

    fn decode(&mut self, body: &[u8]) -> Result<(), ProtocolError> {
        self.body = body.to_vec();
        Ok(())
    }

    fn on_received(&mut self, context: &mut ReceiveContext<'_>) -> AckPolicy {
        let record = StoredRecord::new(self.message_type, std::mem::take(&mut self.body));
        if let Err(error) = context.store().persist(record) {
            warn!(%error, message_type = %self.message_type, "failed to store FIT record");
        }
        if context.queue_fit_replies()
            && let Some(reply) = host_fit_reply(self.message_type)
        {
            context.defer(Message::Raw(reply));
        }
        AckPolicy::Generic
    }
}

/// Message handled only by acknowledging it and publishing its raw body.
#[derive(Debug)]
pub struct PassthroughOperation {
    message_type: MessageType,
    body: Vec<u8>,
}

impl PassthroughOperation {
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            body: Vec::new(),
        }
    }
}

impl InboundOperation for PassthroughOperation {
    fn message_type(&self) -> MessageType {
        self.message_type
    }

    fn decode(&mut self, body: &[u8]) -> Result<(), ProtocolError> {
        self.body = body.to_vec();
        Ok(())
    }

    fn on_received(&mut self, context: &mut ReceiveContext<'_>) -> AckPolicy {
        context.publish(LinkEvent::Passthrough(RawMessage::new(
            self.message_type,
            std::mem::take(&mut self.body),
        )));
        AckPolicy::Generic
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::store::MemoryStore;

    #[rstest]
    #[case::send(OperationState::Created, OperationState::Sending)]
    #[case::receive(OperationState::Created, OperationState::Receiving)]
    #[case::await_reply(OperationState::Sending, OperationState::AwaitingReply)]
    #[case::fire_and_forget(OperationState::Sending, OperationState::Completed)]
    #[case::reply_arrived(OperationState::AwaitingReply, OperationState::Completed)]
    #[case::auto_ack(OperationState::Receiving, OperationState::AutoAcking)]
    #[case::acked(OperationState::AutoAcking, OperationState::Completed)]
    #[case::timeout(OperationState::AwaitingReply, OperationState::Failed)]
    fn legal_transitions(#[case] from: OperationState, #[case] to: OperationState) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case::skip_send(OperationState::Created, OperationState::AwaitingReply)]
    #[case::reopen(OperationState::Completed, OperationState::Sending)]
    #[case::fail_twice(OperationState::Failed, OperationState::Failed)]
    #[case::backwards(OperationState::AutoAcking, OperationState::Receiving)]
    #[case::cross_direction(OperationState::Sending, OperationState::AutoAcking)]
    fn illegal_transitions(#[case] from: OperationState, #[case] to: OperationState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn lifecycle_rejects_illegal_step_and_keeps_state() {
        let mut lifecycle = OperationLifecycle::new(MessageType::CREATE_FILE);
        assert_matches!(
            lifecycle.advance(OperationState::Completed),
            Err(ProtocolError::InvalidTransition {
                from: OperationState::Created,
                to: OperationState::Completed,
                ..
            })
        );
        assert_eq!(OperationState::Created, lifecycle.state());
    }

    #[test]
    fn fail_is_sticky_after_completion() {
        let mut lifecycle = OperationLifecycle::new(MessageType::SYSTEM_EVENT);
        lifecycle
            .advance(OperationState::Sending)
            .expect("send should be legal");
        lifecycle
            .advance(OperationState::Completed)
            .expect("completion should be legal");
        lifecycle.fail();
        assert_eq!(OperationState::Completed, lifecycle.state());
    }

    #[test]
    fn fit_record_is_stored_and_deferred() {
        let host = DeviceInformation::host_default();
        let store = MemoryStore::new();
        let mut context = ReceiveContext::new(&host, &store, true);
        let mut operation = FitRecordOperation::new(MessageType::FIT_DATA);

        operation.decode(&[0x01, 0x02]).expect("fit body should decode");
        let policy = operation.on_received(&mut context);

        assert_eq!(AckPolicy::Generic, policy);
        assert_eq!(vec![StoredRecord::new(MessageType::FIT_DATA, vec![0x01, 0x02])], store.records());
        let (_, deferred, initialized) = context.into_parts();
        assert_eq!(1, deferred.len());
        assert_eq!(MessageType::FIT_DATA, deferred[0].message_type());
        assert!(!initialized);
    }

    #[test]
    fn fit_reply_queue_can_be_disabled() {
        let host = DeviceInformation::host_default();
        let store = MemoryStore::new();
        let mut context = ReceiveContext::new(&host, &store, false);
        let mut operation = FitRecordOperation::new(MessageType::FIT_DEFINITION);

        operation.decode(&[0x40]).expect("fit body should decode");
        operation.on_received(&mut context);

        let (_, deferred, _) = context.into_parts();
        assert!(deferred.is_empty());
    }
}
