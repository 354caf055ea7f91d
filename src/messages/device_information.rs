use bon::Builder;
use serde::Serialize;

use crate::error::ProtocolError;
use crate::protocol::MessageType;
use crate::wire::{BodyReader, BodyWriter};

use super::MessageBody;

/// Identity block exchanged by both peers during the handshake.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Builder)]
pub struct DeviceInformation {
    #[builder(default = DeviceInformation::HOST_PROTOCOL_VERSION)]
    protocol_version: u16,
    #[builder(default = 0xFFFF)]
    product_number: u16,
    #[builder(default = 0xFFFF_FFFF)]
    unit_id: u32,
    #[builder(default = DeviceInformation::HOST_SOFTWARE_VERSION)]
    software_version: u16,
    #[builder(default = 0xFFFF)]
    max_packet_size: u16,
    #[builder(into)]
    name: String,
    #[builder(into)]
    manufacturer: String,
    #[builder(into)]
    model: String,
}

impl DeviceInformation {
    pub const HOST_PROTOCOL_VERSION: u16 = 112;
    pub const HOST_SOFTWARE_VERSION: u16 = 5235;

    /// Identity the host announces when no other is configured.
    #[must_use]
    pub fn host_default() -> Self {
        Self::builder()
            .name("vivolink")
            .manufacturer("vivolink")
            .model(env!("CARGO_PKG_VERSION"))
            .build()
    }

    #[must_use]
    pub fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    #[must_use]
    pub fn product_number(&self) -> u16 {
        self.product_number
    }

    #[must_use]
    pub fn unit_id(&self) -> u32 {
        self.unit_id
    }

    #[must_use]
    pub fn software_version(&self) -> u16 {
        self.software_version
    }

    #[must_use]
    pub fn max_packet_size(&self) -> u16 {
        self.max_packet_size
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl MessageBody for DeviceInformation {
    const MESSAGE_TYPE: MessageType = MessageType::DEVICE_INFORMATION;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        writer
            .put_u16(self.protocol_version)
            .put_u16(self.product_number)
            .put_u32(self.unit_id)
            .put_u16(self.software_version)
            .put_u16(self.max_packet_size)
            .put_short_string("name", &self.name)?
            .put_short_string("manufacturer", &self.manufacturer)?
            .put_short_string("model", &self.model)?;
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol_version: reader.u16("protocol_version")?,
            product_number: reader.u16("product_number")?,
            unit_id: reader.u32("unit_id")?,
            software_version: reader.u16("software_version")?,
            max_packet_size: reader.u16("max_packet_size")?,
            name: reader.short_string("name")?,
            manufacturer: reader.short_string("manufacturer")?,
            model: reader.short_string("model")?,
        })
    }
}
