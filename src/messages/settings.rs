use serde::Serialize;
use time::OffsetDateTime;

use crate::clock::Clock;
use crate::error::ProtocolError;
use crate::protocol::MessageType;
use crate::wire::{BodyReader, BodyWriter};

use super::MessageBody;

/// Unix timestamp of 1989-12-31T00:00:00Z, the zero point of device time.
pub const DEVICE_EPOCH_UNIX: i64 = 631_065_600;

/// Identifier byte of one setting triple.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingId {
    DeviceName,
    CurrentTime,
    DstOffset,
    TimeZoneOffset,
    NextDstStart,
    NextDstEnd,
    Other(u8),
}

impl SettingId {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::DeviceName => 0x00,
            Self::CurrentTime => 0x01,
            Self::DstOffset => 0x02,
            Self::TimeZoneOffset => 0x03,
            Self::NextDstStart => 0x04,
            Self::NextDstEnd => 0x05,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for SettingId {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::DeviceName,
            0x01 => Self::CurrentTime,
            0x02 => Self::DstOffset,
            0x03 => Self::TimeZoneOffset,
            0x04 => Self::NextDstStart,
            0x05 => Self::NextDstEnd,
            other => Self::Other(other),
        }
    }
}

/// Value bytes of one setting triple.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingValue {
    Int(i32),
    Text(String),
    Bytes(Vec<u8>),
}

impl SettingValue {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Int(value) => value.to_le_bytes().to_vec(),
            Self::Text(value) => value.as_bytes().to_vec(),
            Self::Bytes(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Setting {
    id: SettingId,
    value: SettingValue,
}

impl Setting {
    #[must_use]
    pub fn new(id: SettingId, value: SettingValue) -> Self {
        Self { id, value }
    }

    #[must_use]
    pub fn id(&self) -> SettingId {
        self.id
    }

    #[must_use]
    pub fn value(&self) -> &SettingValue {
        &self.value
    }
}

/// `u8 count` followed by `(u8 settingId, u8 length, value)` triples.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct SetSettings {
    settings: Vec<Setting>,
}

impl SetSettings {
    #[must_use]
    pub fn new(settings: Vec<Setting>) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    /// Builds the time-set message from the clock: current time, DST and
    /// timezone offsets, and the next DST transitions when the clock knows
    /// them.
    #[must_use]
    pub fn time_from_clock(clock: &dyn Clock) -> Self {
        let now = clock.now();
        let mut settings = vec![
            Setting::new(
                SettingId::CurrentTime,
                SettingValue::Int(device_seconds(now)),
            ),
            Setting::new(
                SettingId::DstOffset,
                SettingValue::Int(saturating_i32(clock.dst_offset().whole_seconds())),
            ),
            Setting::new(
                SettingId::TimeZoneOffset,
                SettingValue::Int(clock.utc_offset().whole_seconds()),
            ),
        ];
        if let Some(transitions) = clock.next_dst_transitions() {
            settings.push(Setting::new(
                SettingId::NextDstStart,
                SettingValue::Int(device_seconds(transitions.start())),
            ));
            settings.push(Setting::new(
                SettingId::NextDstEnd,
                SettingValue::Int(device_seconds(transitions.end())),
            ));
        }
        Self { settings }
    }
}

/// Seconds between the device epoch and `instant`, clamped to `i32`.
#[must_use]
pub fn device_seconds(instant: OffsetDateTime) -> i32 {
    saturating_i32(instant.unix_timestamp() - DEVICE_EPOCH_UNIX)
}

fn saturating_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

impl MessageBody for SetSettings {
    const MESSAGE_TYPE: MessageType = MessageType::SET_SETTINGS;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        let count = u8::try_from(self.settings.len()).map_err(|_| ProtocolError::TooManyEntries {
            field: "settings",
            len: self.settings.len(),
            max: usize::from(u8::MAX),
        })?;
        writer.put_u8(count);
        for setting in &self.settings {
            let value = setting.value.to_bytes();
            let len = u8::try_from(value.len()).map_err(|_| ProtocolError::TooManyEntries {
                field: "setting_value",
                len: value.len(),
                max: usize::from(u8::MAX),
            })?;
            writer.put_u8(setting.id.code()).put_u8(len).put_bytes(&value);
        }
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        let count = reader.u8("setting_count")?;
        let mut settings = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let id = SettingId::from(reader.u8("setting_id")?);
            let len = usize::from(reader.u8("setting_len")?);
            let raw = reader.take("setting_value", len)?;
            let value = match (id, raw) {
                (SettingId::DeviceName, _) => SettingValue::Text(
                    String::from_utf8(raw.to_vec()).map_err(|source| {
                        ProtocolError::InvalidUtf8 {
                            field: "device_name",
                            source,
                        }
                    })?,
                ),
                (SettingId::Other(_), _) => SettingValue::Bytes(raw.to_vec()),
                (_, &[b0, b1, b2, b3]) => SettingValue::Int(i32::from_le_bytes([b0, b1, b2, b3])),
                _ => SettingValue::Bytes(raw.to_vec()),
            };
            settings.push(Setting { id, value });
        }
        Ok(Self { settings })
    }
}
