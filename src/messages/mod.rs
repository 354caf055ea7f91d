//! Typed message bodies and the header that selects between them.

mod acknowledgement;
mod device_information;
mod file;
mod raw;
mod settings;
mod system_event;

use serde::Serialize;

use crate::error::ProtocolError;
use crate::protocol::MessageType;
use crate::wire::{BodyReader, BodyWriter};

pub use self::acknowledgement::{Acknowledgement, ReplyBody};
pub use self::device_information::DeviceInformation;
pub use self::file::{
    CreateFileReply, CreateFileRequest, CreateFileStatus, FIT_DATA_TYPE, FileTransferData,
    FileTransferReply, UploadReply, UploadRequest,
};
pub(crate) use self::raw::host_fit_reply;
pub use self::raw::RawMessage;
pub use self::settings::{
    DEVICE_EPOCH_UNIX, SetSettings, Setting, SettingId, SettingValue, device_seconds,
};
pub use self::system_event::{SystemEvent, SystemEventKind};

/// A message variant that knows its type code and body layout.
pub trait MessageBody: Sized {
    const MESSAGE_TYPE: MessageType;

    /// Writes the body, without the type header.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when a field does not fit its wire width.
    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError>;

    /// Reads the body, without the type header.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the body is truncated or malformed.
    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError>;

    /// Encodes the type header followed by the body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the body cannot be encoded.
    fn to_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut writer = BodyWriter::new();
        writer.put_u16(Self::MESSAGE_TYPE.as_raw());
        self.encode_body(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decodes a payload that must carry this variant's type code.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedType`] when the header names a
    /// different type, or a body error when the body is malformed.
    fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (message_type, body) = split_header(payload)?;
        if message_type != Self::MESSAGE_TYPE {
            return Err(ProtocolError::UnexpectedType {
                expected: Self::MESSAGE_TYPE,
                actual: message_type,
            });
        }
        Self::decode_body(&mut BodyReader::new(body))
    }
}

/// Splits a payload into its type header and body.
///
/// ```
/// use vivolink::{MessageType, messages};
///
/// let (message_type, body) = messages::split_header(&[0xA6, 0x13, 0x03])?;
/// assert_eq!(MessageType::SYSTEM_EVENT, message_type);
/// assert_eq!(&[0x03], body);
/// # Ok::<(), vivolink::ProtocolError>(())
/// ```
///
/// # Errors
///
/// Returns [`ProtocolError::MissingHeader`] when the payload is shorter than
/// the header.
pub fn split_header(payload: &[u8]) -> Result<(MessageType, &[u8]), ProtocolError> {
    match payload {
        [low, high, body @ ..] => Ok((MessageType::new(u16::from_le_bytes([*low, *high])), body)),
        _ => Err(ProtocolError::MissingHeader {
            actual: payload.len(),
        }),
    }
}

/// Any message the link can send or receive.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Message {
    Acknowledgement(Acknowledgement),
    DeviceInformation(DeviceInformation),
    SystemEvent(SystemEvent),
    SetSettings(SetSettings),
    CreateFile(CreateFileRequest),
    UploadRequest(UploadRequest),
    FileTransferData(FileTransferData),
    Raw(RawMessage),
}

impl Message {
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Acknowledgement(_) => Acknowledgement::MESSAGE_TYPE,
            Self::DeviceInformation(_) => DeviceInformation::MESSAGE_TYPE,
            Self::SystemEvent(_) => SystemEvent::MESSAGE_TYPE,
            Self::SetSettings(_) => SetSettings::MESSAGE_TYPE,
            Self::CreateFile(_) => CreateFileRequest::MESSAGE_TYPE,
            Self::UploadRequest(_) => UploadRequest::MESSAGE_TYPE,
            Self::FileTransferData(_) => FileTransferData::MESSAGE_TYPE,
            Self::Raw(raw) => raw.message_type(),
        }
    }

    /// Encodes the type header followed by the body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the body cannot be encoded.
    pub fn to_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Acknowledgement(message) => message.to_payload(),
            Self::DeviceInformation(message) => message.to_payload(),
            Self::SystemEvent(message) => message.to_payload(),
            Self::SetSettings(message) => message.to_payload(),
            Self::CreateFile(message) => message.to_payload(),
            Self::UploadRequest(message) => message.to_payload(),
            Self::FileTransferData(message) => message.to_payload(),
            Self::Raw(raw) => {
                let mut writer = BodyWriter::new();
                writer
                    .put_u16(raw.message_type().as_raw())
                    .put_bytes(raw.body());
                Ok(writer.into_bytes())
            }
        }
    }

    /// Decodes any payload, keeping types without a typed body as
    /// [`Message::Raw`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the header is missing or a typed body
    /// is malformed.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (message_type, body) = split_header(payload)?;
        let mut reader = BodyReader::new(body);
        let message = match message_type {
            MessageType::ACKNOWLEDGEMENT => {
                Self::Acknowledgement(Acknowledgement::decode_body(&mut reader)?)
            }
            MessageType::DEVICE_INFORMATION => {
                Self::DeviceInformation(DeviceInformation::decode_body(&mut reader)?)
            }
            MessageType::SYSTEM_EVENT => Self::SystemEvent(SystemEvent::decode_body(&mut reader)?),
            MessageType::SET_SETTINGS => Self::SetSettings(SetSettings::decode_body(&mut reader)?),
            MessageType::CREATE_FILE => {
                Self::CreateFile(CreateFileRequest::decode_body(&mut reader)?)
            }
            MessageType::UPLOAD_REQUEST => {
                Self::UploadRequest(UploadRequest::decode_body(&mut reader)?)
            }
            MessageType::FILE_TRANSFER_DATA => {
                Self::FileTransferData(FileTransferData::decode_body(&mut reader)?)
            }
            other => Self::Raw(RawMessage::new(other, body.to_vec())),
        };
        Ok(message)
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident => $body:ty),* $(,)?) => {
        $(
            impl From<$body> for Message {
                fn from(message: $body) -> Self {
                    Self::$variant(message)
                }
            }
        )*
    };
}

impl_from_variant! {
    Acknowledgement => Acknowledgement,
    DeviceInformation => DeviceInformation,
    SystemEvent => SystemEvent,
    SetSettings => SetSettings,
    CreateFile => CreateFileRequest,
    UploadRequest => UploadRequest,
    FileTransferData => FileTransferData,
    Raw => RawMessage,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn split_header_rejects_short_payload() {
        assert_matches!(
            split_header(&[0x88]),
            Err(ProtocolError::MissingHeader { actual: 1 })
        );
    }

    #[test]
    fn from_payload_rejects_other_type() {
        let payload = SystemEvent::from(SystemEventKind::SyncReady)
            .to_payload()
            .expect("event should encode");
        assert_matches!(
            DeviceInformation::from_payload(&payload),
            Err(ProtocolError::UnexpectedType {
                expected: MessageType::DEVICE_INFORMATION,
                actual: MessageType::SYSTEM_EVENT,
            })
        );
    }

    #[rstest]
    #[case::ack(Message::from(Acknowledgement::generic(MessageType::FIT_DATA)))]
    #[case::device_info(Message::from(DeviceInformation::host_default()))]
    #[case::event(Message::from(SystemEvent::new(SystemEventKind::TimeUpdated, vec![1])))]
    #[case::upload(Message::from(UploadRequest::new(4, 100, 0, 0)))]
    #[case::raw(Message::from(RawMessage::new(MessageType::new(0x9999), vec![0xDE, 0xAD])))]
    fn decode_recovers_message(#[case] message: Message) {
        let payload = message.to_payload().expect("message should encode");
        let decoded = Message::decode(&payload).expect("payload should decode");
        assert_eq!(message.message_type(), decoded.message_type());
        assert_eq!(message, decoded);
    }

    #[test]
    fn fit_types_decode_as_raw() {
        let decoded = Message::decode(&[0x94, 0x13, 0x01, 0x02]).expect("payload should decode");
        assert_eq!(
            Message::Raw(RawMessage::new(MessageType::FIT_DATA, vec![0x01, 0x02])),
            decoded
        );
    }

    #[test]
    fn json_rendering_tags_the_variant() {
        let message = Message::from(SystemEvent::new(SystemEventKind::PairStart, vec![0x00]));
        let rendered = serde_json::to_string(&message).expect("message should serialise");
        assert_eq!(
            r#"{"kind":"system_event","body":{"kind":"pair_start","extra":"00"}}"#,
            rendered
        );
    }
}
