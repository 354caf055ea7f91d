use serde::Serialize;
use serde_with::{hex::Hex, serde_as};

use crate::protocol::MessageType;

/// Message kept as an opaque body under its type code.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct RawMessage {
    message_type: MessageType,
    #[serde_as(as = "Hex")]
    body: Vec<u8>,
}

impl RawMessage {
    #[must_use]
    pub fn new(message_type: MessageType, body: Vec<u8>) -> Self {
        Self { message_type, body }
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// FIT definition the host answers a device definition with, as observed
/// from the vendor app.
pub(crate) const HOST_FIT_DEFINITION_BODY: &[u8] = &[
    0x40, 0x00, 0x01, 0x00, 0x7F, 0x0B, 0x00, 0x01, 0x00, 0x01, 0x01, 0x00, 0x02, 0x01, 0x00,
    0x04, 0x01, 0x00, 0x05, 0x01, 0x00, 0x06, 0x01, 0x00, 0x07, 0x01, 0x00, 0x08, 0x01, 0x00,
    0x09, 0x01, 0x00, 0x0A, 0x01, 0x00, 0x0D, 0x01, 0x00, 0x41, 0x00, 0x01, 0x00, 0x14, 0x04,
    0x00, 0x04, 0x85, 0x01, 0x04, 0x85, 0xFD, 0x04, 0x86, 0x0E, 0x04, 0x86, 0x42, 0x00, 0x01,
    0x00, 0x15, 0x02, 0x00, 0x01, 0x00, 0x01, 0x01, 0x00, 0x43, 0x00, 0x01, 0x00, 0x13, 0x00,
    0x44, 0x00, 0x01, 0x00, 0x22, 0x00, 0x45, 0x00, 0x01, 0x00, 0x81, 0x01, 0xFD, 0x04, 0x86,
    0x46, 0x00, 0x01, 0x00, 0x80, 0x01, 0xFD, 0x04, 0x86, 0x47, 0x00, 0x01, 0x00, 0x12, 0x00,
    0x48, 0x00, 0x01, 0x00, 0x0C, 0x00,
];

/// FIT data record the host answers device data with.
pub(crate) const HOST_FIT_DATA_BODY: &[u8] = &[
    0x00, 0x01, 0x01, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x01, 0x00,
];

/// Deferred payload queued when the device sends a FIT message of `received`
/// type, if the host has one.
pub(crate) fn host_fit_reply(received: MessageType) -> Option<RawMessage> {
    match received {
        MessageType::FIT_DEFINITION => Some(RawMessage::new(
            MessageType::FIT_DEFINITION,
            HOST_FIT_DEFINITION_BODY.to_vec(),
        )),
        MessageType::FIT_DATA => Some(RawMessage::new(
            MessageType::FIT_DATA,
            HOST_FIT_DATA_BODY.to_vec(),
        )),
        _ => None,
    }
}
