use std::fmt;

use serde::Serialize;
use serde_with::{hex::Hex, serde_as};

use crate::error::ProtocolError;
use crate::protocol::MessageType;
use crate::wire::{BodyReader, BodyWriter};

use super::MessageBody;

/// Lifecycle event codes exchanged in [`SystemEvent`] messages.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventKind {
    SyncComplete,
    SyncFail,
    FactoryReset,
    PairStart,
    PairComplete,
    PairFail,
    SyncReady,
    DeviceDisconnect,
    TimeUpdated,
    /// Code outside the known set, kept verbatim.
    Other(u8),
}

impl SystemEventKind {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::SyncComplete => 0x00,
            Self::SyncFail => 0x01,
            Self::FactoryReset => 0x02,
            Self::PairStart => 0x03,
            Self::PairComplete => 0x04,
            Self::PairFail => 0x05,
            Self::SyncReady => 0x08,
            Self::DeviceDisconnect => 0x0B,
            Self::TimeUpdated => 0x10,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for SystemEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SyncComplete => "sync_complete",
            Self::SyncFail => "sync_fail",
            Self::FactoryReset => "factory_reset",
            Self::PairStart => "pair_start",
            Self::PairComplete => "pair_complete",
            Self::PairFail => "pair_fail",
            Self::SyncReady => "sync_ready",
            Self::DeviceDisconnect => "device_disconnect",
            Self::TimeUpdated => "time_updated",
            Self::Other(code) => return write!(f, "other({code:#04x})"),
        };
        f.write_str(name)
    }
}

impl From<u8> for SystemEventKind {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::SyncComplete,
            0x01 => Self::SyncFail,
            0x02 => Self::FactoryReset,
            0x03 => Self::PairStart,
            0x04 => Self::PairComplete,
            0x05 => Self::PairFail,
            0x08 => Self::SyncReady,
            0x0B => Self::DeviceDisconnect,
            0x10 => Self::TimeUpdated,
            other => Self::Other(other),
        }
    }
}

/// `u8 eventCode | u8 extraLen | extra bytes`.
///
/// An event without extra data is written with the single byte `0x00` as its
/// extra field.
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SystemEvent {
    kind: SystemEventKind,
    #[serde_as(as = "Hex")]
    extra: Vec<u8>,
}

impl SystemEvent {
    #[must_use]
    pub fn new(kind: SystemEventKind, extra: Vec<u8>) -> Self {
        Self { kind, extra }
    }

    #[must_use]
    pub fn kind(&self) -> SystemEventKind {
        self.kind
    }

    #[must_use]
    pub fn extra(&self) -> &[u8] {
        &self.extra
    }
}

impl From<SystemEventKind> for SystemEvent {
    fn from(kind: SystemEventKind) -> Self {
        Self::new(kind, Vec::new())
    }
}

impl MessageBody for SystemEvent {
    const MESSAGE_TYPE: MessageType = MessageType::SYSTEM_EVENT;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        let extra: &[u8] = if self.extra.is_empty() {
            &[0x00]
        } else {
            &self.extra
        };
        let len = u8::try_from(extra.len()).map_err(|_| ProtocolError::TooManyEntries {
            field: "extra",
            len: extra.len(),
            max: usize::from(u8::MAX),
        })?;
        writer.put_u8(self.kind.code()).put_u8(len).put_bytes(extra);
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        let kind = SystemEventKind::from(reader.u8("event_code")?);
        let len = usize::from(reader.u8("extra_len")?);
        let extra = reader.take("extra", len)?.to_vec();
        Ok(Self { kind, extra })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::sync_complete(SystemEventKind::SyncComplete, 0x00)]
    #[case::pair_start(SystemEventKind::PairStart, 0x03)]
    #[case::pair_complete(SystemEventKind::PairComplete, 0x04)]
    #[case::pair_fail(SystemEventKind::PairFail, 0x05)]
    #[case::sync_ready(SystemEventKind::SyncReady, 0x08)]
    #[case::device_disconnect(SystemEventKind::DeviceDisconnect, 0x0B)]
    #[case::time_updated(SystemEventKind::TimeUpdated, 0x10)]
    #[case::other(SystemEventKind::Other(0x42), 0x42)]
    fn codes_map_both_ways(#[case] kind: SystemEventKind, #[case] code: u8) {
        assert_eq!(code, kind.code());
        assert_eq!(kind, SystemEventKind::from(code));
    }

    #[test]
    fn empty_extra_is_sent_as_single_zero() {
        let payload = SystemEvent::from(SystemEventKind::PairStart)
            .to_payload()
            .expect("event should encode");
        assert_eq!(vec![0xA6, 0x13, 0x03, 0x01, 0x00], payload);
    }

    #[test]
    fn extra_bytes_are_length_prefixed() {
        let event = SystemEvent::new(SystemEventKind::TimeUpdated, vec![0xAA, 0xBB]);
        let payload = event.to_payload().expect("event should encode");
        assert_eq!(vec![0xA6, 0x13, 0x10, 0x02, 0xAA, 0xBB], payload);
        assert_eq!(
            event,
            SystemEvent::from_payload(&payload).expect("payload should decode")
        );
    }

    #[test]
    fn unknown_code_displays_as_hex() {
        assert_eq!("other(0x42)", SystemEventKind::Other(0x42).to_string());
        assert_eq!("pair_start", SystemEventKind::PairStart.to_string());
    }
}
