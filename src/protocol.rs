use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;

/// 16-bit message type carried in the first two payload bytes.
///
/// Types outside the catalogue are still representable so unknown traffic
/// can be logged and passed through.
///
/// ```
/// use vivolink::MessageType;
///
/// assert_eq!("0x13A0", MessageType::DEVICE_INFORMATION.to_string());
/// assert_eq!(MessageType::SYSTEM_EVENT, "0x13a6".parse()?);
/// # Ok::<(), vivolink::protocol::ParseMessageTypeError>(())
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    derive_more::From,
    derive_more::Into,
    SerializeDisplay,
    DeserializeFromStr,
)]
pub struct MessageType(u16);

impl MessageType {
    pub const ACKNOWLEDGEMENT: Self = Self(0x1388);
    pub const UPLOAD_REQUEST: Self = Self(0x138B);
    pub const FILE_TRANSFER_DATA: Self = Self(0x138C);
    pub const CREATE_FILE: Self = Self(0x138D);
    pub const FIT_DEFINITION: Self = Self(0x1393);
    pub const FIT_DATA: Self = Self(0x1394);
    pub const DEVICE_INFORMATION: Self = Self(0x13A0);
    pub const SET_SETTINGS: Self = Self(0x13A2);
    pub const QUEUED_DOWNLOAD_REQUEST: Self = Self(0x13A3);
    pub const SYSTEM_EVENT: Self = Self(0x13A6);

    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn as_raw(self) -> u16 {
        self.0
    }

    /// Returns the catalogue entry for this type, if it is a known one.
    #[must_use]
    pub fn kind(self) -> Option<MessageKind> {
        KINDS_BY_TYPE.get(&self).copied()
    }

    /// Returns the catalogue name, or `unknown` for types outside it.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.kind()
            .map_or("unknown", |kind| message_metadata(kind).name())
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

/// Error returned when a message type string is neither hex nor decimal.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("invalid message type `{value}`; expected 0x-prefixed hex or decimal u16")]
pub struct ParseMessageTypeError {
    value: String,
}

impl FromStr for MessageType {
    type Err = ParseMessageTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => trimmed.parse(),
        };
        parsed.map(Self).map_err(|_| ParseMessageTypeError {
            value: value.to_owned(),
        })
    }
}

/// Catalogued vivofit message kinds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, Display, IntoStaticStr)]
pub enum MessageKind {
    #[strum(to_string = "acknowledgement")]
    Acknowledgement,
    #[strum(to_string = "upload_request")]
    UploadRequest,
    #[strum(to_string = "file_transfer_data")]
    FileTransferData,
    #[strum(to_string = "create_file")]
    CreateFile,
    #[strum(to_string = "fit_definition")]
    FitDefinition,
    #[strum(to_string = "fit_data")]
    FitData,
    #[strum(to_string = "device_information")]
    DeviceInformation,
    #[strum(to_string = "set_settings")]
    SetSettings,
    #[strum(to_string = "queued_download_request")]
    QueuedDownloadRequest,
    #[strum(to_string = "system_event")]
    SystemEvent,
}

/// Which side of the link originates a message kind.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display, SerializeDisplay)]
pub enum Direction {
    #[strum(to_string = "host->device")]
    HostToDevice,
    #[strum(to_string = "device->host")]
    DeviceToHost,
    #[strum(to_string = "both")]
    Both,
}

/// Descriptive metadata for one message kind.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MessageMetadata {
    name: &'static str,
    message_type: MessageType,
    direction: Direction,
}

impl MessageMetadata {
    /// Snake-case kind name used in logs and CLI output.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn message_type(self) -> MessageType {
        self.message_type
    }

    #[must_use]
    pub fn direction(self) -> Direction {
        self.direction
    }
}

static KINDS_BY_TYPE: LazyLock<HashMap<MessageType, MessageKind>> = LazyLock::new(|| {
    MessageKind::iter()
        .map(|kind| (metadata_for(kind).message_type, kind))
        .collect()
});

/// Returns metadata for one message kind.
#[must_use]
pub fn message_metadata(kind: MessageKind) -> MessageMetadata {
    metadata_for(kind)
}

/// Returns every catalogued message kind.
pub fn known_kinds() -> impl Iterator<Item = MessageKind> {
    MessageKind::iter()
}

fn metadata_for(kind: MessageKind) -> MessageMetadata {
    let (message_type, direction) = match kind {
        MessageKind::Acknowledgement => (MessageType::ACKNOWLEDGEMENT, Direction::Both),
        MessageKind::UploadRequest => (MessageType::UPLOAD_REQUEST, Direction::HostToDevice),
        MessageKind::FileTransferData => {
            (MessageType::FILE_TRANSFER_DATA, Direction::HostToDevice)
        }
        MessageKind::CreateFile => (MessageType::CREATE_FILE, Direction::HostToDevice),
        MessageKind::FitDefinition => (MessageType::FIT_DEFINITION, Direction::Both),
        MessageKind::FitData => (MessageType::FIT_DATA, Direction::Both),
        MessageKind::DeviceInformation => (MessageType::DEVICE_INFORMATION, Direction::Both),
        MessageKind::SetSettings => (MessageType::SET_SETTINGS, Direction::HostToDevice),
        MessageKind::QueuedDownloadRequest => {
            (MessageType::QUEUED_DOWNLOAD_REQUEST, Direction::DeviceToHost)
        }
        MessageKind::SystemEvent => (MessageType::SYSTEM_EVENT, Direction::Both),
    };
    MessageMetadata {
        name: kind.into(),
        message_type,
        direction,
    }
}
