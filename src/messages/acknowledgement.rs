use serde::Serialize;
use serde_with::{hex::Hex, serde_as};

use crate::error::ProtocolError;
use crate::protocol::MessageType;
use crate::wire::{BodyReader, BodyWriter};

use super::MessageBody;

/// Trailing flag the host writes after an embedded reply.
const HAS_REPLY: u8 = 0x01;
const NO_REPLY: u8 = 0x00;

/// Reply to a previously sent message, correlated by its original type.
///
/// Acknowledgements the host generates carry `[embedded reply body] ‖ u8
/// hasReply` as their payload. Acknowledgements the device sends carry the
/// reply fields of the request they answer, which is what waiting callers
/// receive.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Acknowledgement {
    original_type: MessageType,
    status: u8,
    #[serde_as(as = "Hex")]
    payload: Vec<u8>,
}

impl Acknowledgement {
    /// Status byte meaning the original message was accepted.
    pub const STATUS_OK: u8 = 0x00;

    #[must_use]
    pub fn new(original_type: MessageType, status: u8, payload: Vec<u8>) -> Self {
        Self {
            original_type,
            status,
            payload,
        }
    }

    /// Builds the plain acknowledgement sent for inbound messages that need
    /// no reply.
    ///
    /// ```
    /// use vivolink::{Acknowledgement, MessageBody, MessageType};
    ///
    /// let ack = Acknowledgement::generic(MessageType::SYSTEM_EVENT);
    /// assert_eq!(vec![0x88, 0x13, 0xA6, 0x13, 0x00, 0x00], ack.to_payload()?);
    /// # Ok::<(), vivolink::ProtocolError>(())
    /// ```
    #[must_use]
    pub fn generic(original_type: MessageType) -> Self {
        Self::new(original_type, Self::STATUS_OK, vec![NO_REPLY])
    }

    /// Builds an acknowledgement that embeds `reply` for the message of the
    /// same type.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the reply body cannot be encoded.
    pub fn with_reply<T: MessageBody>(reply: &T) -> Result<Self, ProtocolError> {
        let mut writer = BodyWriter::new();
        reply.encode_body(&mut writer)?;
        writer.put_u8(HAS_REPLY);
        Ok(Self::new(T::MESSAGE_TYPE, Self::STATUS_OK, writer.into_bytes()))
    }

    /// Type of the message this acknowledges.
    #[must_use]
    pub fn original_type(&self) -> MessageType {
        self.original_type
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        self.status
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Self::STATUS_OK
    }

    /// Bytes after the status byte.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the embedded reply body of a host-generated acknowledgement,
    /// or `None` when the trailing flag says there is none.
    #[must_use]
    pub fn embedded_reply(&self) -> Option<&[u8]> {
        match self.payload.split_last() {
            Some((&HAS_REPLY, body)) => Some(body),
            _ => None,
        }
    }

    /// Decodes the payload as the reply fields of the acknowledged request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the payload is too short for `R`.
    pub fn decode_reply<R: ReplyBody>(&self) -> Result<R, ProtocolError> {
        R::decode_reply(&mut BodyReader::new(&self.payload))
    }
}

/// Device reply fields carried inside an [`Acknowledgement`] payload.
pub trait ReplyBody: Sized {
    /// Decodes the reply from the acknowledgement payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the payload is too short.
    fn decode_reply(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError>;
}

impl MessageBody for Acknowledgement {
    const MESSAGE_TYPE: MessageType = MessageType::ACKNOWLEDGEMENT;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        writer
            .put_u16(self.original_type.as_raw())
            .put_u8(self.status)
            .put_bytes(&self.payload);
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        let original_type = MessageType::new(reader.u16("original_type")?);
        let status = reader.u8("status")?;
        let payload = reader.rest().to_vec();
        Ok(Self::new(original_type, status, payload))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::messages::SystemEvent;
    use crate::messages::SystemEventKind;

    #[test]
    fn generic_ack_has_no_reply() {
        let ack = Acknowledgement::generic(MessageType::FIT_DATA);
        assert_eq!(None, ack.embedded_reply());
        assert!(ack.is_ok());
    }

    #[test]
    fn with_reply_appends_body_and_flag() {
        let reply = SystemEvent::new(SystemEventKind::SyncReady, Vec::new());
        let ack = Acknowledgement::with_reply(&reply).expect("reply should encode");

        assert_eq!(MessageType::SYSTEM_EVENT, ack.original_type());
        assert_eq!(vec![0x08, 0x01, 0x00, 0x01], ack.payload());
        assert_eq!(Some(&[0x08, 0x01, 0x00][..]), ack.embedded_reply());
    }

    #[test]
    fn device_ack_payload_is_everything_after_status() {
        let body = [0x8D, 0x13, 0x00, 0x00, 0x07, 0x00];
        let ack = Acknowledgement::decode_body(&mut BodyReader::new(&body))
            .expect("ack body should decode");
        assert_eq!(MessageType::CREATE_FILE, ack.original_type());
        assert_eq!(0, ack.status());
        assert_eq!(&[0x00, 0x07, 0x00], ack.payload());
    }

    #[test]
    fn truncated_ack_is_rejected() {
        assert_matches!(
            Acknowledgement::decode_body(&mut BodyReader::new(&[0x8D, 0x13])),
            Err(ProtocolError::Truncated { field: "status", .. })
        );
    }
}
