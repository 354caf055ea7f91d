//! Inbound routing: reply correlation, operation registry and lifecycle.

mod dispatcher;
mod operation;
mod pending;
mod registry;

use serde::Serialize;

use crate::messages::{DeviceInformation, RawMessage, SystemEvent};

pub use self::dispatcher::{DispatchOutcome, Dispatcher, Disposition};
pub use self::operation::{
    AckPolicy, DeviceInformationOperation, FitRecordOperation, InboundOperation,
    OperationLifecycle, OperationState, PassthroughOperation, ReceiveContext,
    SystemEventOperation,
};
pub use self::pending::{Continuation, PendingReplies, ReplyTicket, Resolution};
pub use self::registry::OperationRegistry;

/// Notification published to link subscribers.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "event", content = "body", rename_all = "snake_case")]
pub enum LinkEvent {
    /// The device announced its identity.
    DeviceInformation(DeviceInformation),
    SystemEvent(SystemEvent),
    /// A registered message with no typed handling beyond acknowledgement.
    Passthrough(RawMessage),
}
