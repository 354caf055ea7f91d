use bon::Builder;
use serde::Serialize;
use serde_with::{hex::Hex, serde_as};

use crate::error::ProtocolError;
use crate::protocol::MessageType;
use crate::wire::{BodyReader, BodyWriter};

use super::MessageBody;
use super::acknowledgement::ReplyBody;

/// File data type byte used for every host-created file.
pub const FIT_DATA_TYPE: u8 = 0xFF;

/// Asks the device to allocate a file entry.
///
/// `u32 size | u8 dataType | u8 subtype | u16 fileDataId | u8 reserved |
/// u8 subtypeMask | u16 fileNumberMask | u16 pathLen | path | u64 uniqueId`
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Builder)]
pub struct CreateFileRequest {
    size: u32,
    #[builder(default = FIT_DATA_TYPE)]
    data_type: u8,
    subtype: u8,
    #[builder(default)]
    file_data_id: u16,
    #[builder(default)]
    subtype_mask: u8,
    #[builder(default = 0xFFFF)]
    file_number_mask: u16,
    #[builder(into, default)]
    path: String,
    #[builder(default)]
    unique_id: u64,
}

impl CreateFileRequest {
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn subtype(&self) -> u8 {
        self.subtype
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn unique_id(&self) -> u64 {
        self.unique_id
    }
}

impl MessageBody for CreateFileRequest {
    const MESSAGE_TYPE: MessageType = MessageType::CREATE_FILE;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        writer
            .put_u32(self.size)
            .put_u8(self.data_type)
            .put_u8(self.subtype)
            .put_u16(self.file_data_id)
            .put_u8(0)
            .put_u8(self.subtype_mask)
            .put_u16(self.file_number_mask)
            .put_long_string("path", &self.path)?
            .put_u64(self.unique_id);
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        let size = reader.u32("size")?;
        let data_type = reader.u8("data_type")?;
        let subtype = reader.u8("subtype")?;
        let file_data_id = reader.u16("file_data_id")?;
        reader.u8("reserved")?;
        Ok(Self {
            size,
            data_type,
            subtype,
            file_data_id,
            subtype_mask: reader.u8("subtype_mask")?,
            file_number_mask: reader.u16("file_number_mask")?,
            path: reader.long_string("path")?,
            unique_id: reader.u64("unique_id")?,
        })
    }
}

/// Outcome of a [`CreateFileRequest`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateFileStatus {
    Created,
    AlreadyExists,
    NoSpace,
    NotSupported,
    NoSlotsForType,
    NoSpaceForType,
    Other(u8),
}

impl CreateFileStatus {
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::AlreadyExists => 1,
            Self::NoSpace => 2,
            Self::NotSupported => 3,
            Self::NoSlotsForType => 4,
            Self::NoSpaceForType => 5,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for CreateFileStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Created,
            1 => Self::AlreadyExists,
            2 => Self::NoSpace,
            3 => Self::NotSupported,
            4 => Self::NoSlotsForType,
            5 => Self::NoSpaceForType,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for CreateFileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Created => "created",
            Self::AlreadyExists => "file already exists",
            Self::NoSpace => "not enough space",
            Self::NotSupported => "file type not supported",
            Self::NoSlotsForType => "no free slots for file type",
            Self::NoSpaceForType => "not enough space for file type",
            Self::Other(code) => return write!(f, "unknown status {code}"),
        };
        f.write_str(text)
    }
}

/// `u8 status | u16 fileIndex | u8 dataType | u8 dataSubtype | u16 fileNumber`
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct CreateFileReply {
    status: CreateFileStatus,
    file_index: u16,
    data_type: u8,
    subtype: u8,
    file_number: u16,
}

impl CreateFileReply {
    #[must_use]
    pub fn new(status: CreateFileStatus, file_index: u16, subtype: u8, file_number: u16) -> Self {
        Self {
            status,
            file_index,
            data_type: FIT_DATA_TYPE,
            subtype,
            file_number,
        }
    }

    #[must_use]
    pub fn status(&self) -> CreateFileStatus {
        self.status
    }

    #[must_use]
    pub fn file_index(&self) -> u16 {
        self.file_index
    }

    #[must_use]
    pub fn file_number(&self) -> u16 {
        self.file_number
    }

    /// Writes the reply fields as a device would place them in an
    /// acknowledgement payload.
    pub fn encode_reply(&self, writer: &mut BodyWriter) {
        writer
            .put_u8(self.status.code())
            .put_u16(self.file_index)
            .put_u8(self.data_type)
            .put_u8(self.subtype)
            .put_u16(self.file_number);
    }
}

impl ReplyBody for CreateFileReply {
    fn decode_reply(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            status: CreateFileStatus::from(reader.u8("create_status")?),
            file_index: reader.u16("file_index")?,
            data_type: reader.u8("data_type")?,
            subtype: reader.u8("subtype")?,
            file_number: reader.u16("file_number")?,
        })
    }
}

/// Opens an upload slot on a created file.
///
/// `u16 fileIndex | u32 maxSize | u32 offset | u16 crcSeed`
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct UploadRequest {
    file_index: u16,
    max_size: u32,
    offset: u32,
    crc_seed: u16,
}

impl UploadRequest {
    #[must_use]
    pub fn new(file_index: u16, max_size: u32, offset: u32, crc_seed: u16) -> Self {
        Self {
            file_index,
            max_size,
            offset,
            crc_seed,
        }
    }

    #[must_use]
    pub fn file_index(&self) -> u16 {
        self.file_index
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn crc_seed(&self) -> u16 {
        self.crc_seed
    }
}

impl MessageBody for UploadRequest {
    const MESSAGE_TYPE: MessageType = MessageType::UPLOAD_REQUEST;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        writer
            .put_u16(self.file_index)
            .put_u32(self.max_size)
            .put_u32(self.offset)
            .put_u16(self.crc_seed);
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            file_index: reader.u16("file_index")?,
            max_size: reader.u32("max_size")?,
            offset: reader.u32("offset")?,
            crc_seed: reader.u16("crc_seed")?,
        })
    }
}

/// `u8 status | u32 offset | u32 maxSize | u16 crcSeed`
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct UploadReply {
    status: u8,
    offset: u32,
    max_size: u32,
    crc_seed: u16,
}

impl UploadReply {
    #[must_use]
    pub fn new(status: u8, offset: u32, max_size: u32, crc_seed: u16) -> Self {
        Self {
            status,
            offset,
            max_size,
            crc_seed,
        }
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Offset the device wants the transfer to resume from.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    #[must_use]
    pub fn crc_seed(&self) -> u16 {
        self.crc_seed
    }

    pub fn encode_reply(&self, writer: &mut BodyWriter) {
        writer
            .put_u8(self.status)
            .put_u32(self.offset)
            .put_u32(self.max_size)
            .put_u16(self.crc_seed);
    }
}

impl ReplyBody for UploadReply {
    fn decode_reply(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            status: reader.u8("upload_status")?,
            offset: reader.u32("offset")?,
            max_size: reader.u32("max_size")?,
            crc_seed: reader.u16("crc_seed")?,
        })
    }
}

/// One slice of file content.
///
/// `u8 flags | u16 crc | u32 offset | data`
#[serde_as]
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct FileTransferData {
    flags: u8,
    crc: u16,
    offset: u32,
    #[serde_as(as = "Hex")]
    data: Vec<u8>,
}

impl FileTransferData {
    #[must_use]
    pub fn new(flags: u8, crc: u16, offset: u32, data: Vec<u8>) -> Self {
        Self {
            flags,
            crc,
            offset,
            data,
        }
    }

    #[must_use]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Running checksum of the file content up to the end of this slice.
    #[must_use]
    pub fn crc(&self) -> u16 {
        self.crc
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl MessageBody for FileTransferData {
    const MESSAGE_TYPE: MessageType = MessageType::FILE_TRANSFER_DATA;

    fn encode_body(&self, writer: &mut BodyWriter) -> Result<(), ProtocolError> {
        writer
            .put_u8(self.flags)
            .put_u16(self.crc)
            .put_u32(self.offset)
            .put_bytes(&self.data);
        Ok(())
    }

    fn decode_body(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            flags: reader.u8("flags")?,
            crc: reader.u16("crc")?,
            offset: reader.u32("offset")?,
            data: reader.rest().to_vec(),
        })
    }
}

/// Device verdict on one [`FileTransferData`] slice. An empty payload
/// counts as accepted.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct FileTransferReply {
    status: u8,
}

impl FileTransferReply {
    #[must_use]
    pub fn new(status: u8) -> Self {
        Self { status }
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        self.status
    }
}

impl ReplyBody for FileTransferReply {
    fn decode_reply(reader: &mut BodyReader<'_>) -> Result<Self, ProtocolError> {
        let status = if reader.is_empty() {
            0
        } else {
            reader.u8("transfer_status")?
        };
        Ok(Self { status })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::messages::Acknowledgement;
    use crate::utils::format_hex;

    #[test]
    fn create_file_body_layout() {
        let request = CreateFileRequest::builder()
            .size(45)
            .subtype(0x09)
            .path("a")
            .unique_id(7)
            .build();
        let payload = request.to_payload().expect("create file should encode");
        insta::assert_snapshot!(
            format_hex(&payload),
            @"8D 13 2D 00 00 00 FF 09 00 00 00 00 FF FF 01 00 61 07 00 00 00 00 00 00 00"
        );
        assert_eq!(
            request,
            CreateFileRequest::from_payload(&payload).expect("payload should decode")
        );
    }

    #[test]
    fn create_file_reply_decodes_from_ack_payload() {
        let mut writer = BodyWriter::new();
        CreateFileReply::new(CreateFileStatus::Created, 0x0102, 0x09, 3).encode_reply(&mut writer);
        let ack = Acknowledgement::new(MessageType::CREATE_FILE, 0, writer.into_bytes());

        let reply: CreateFileReply = ack.decode_reply().expect("reply should decode");

        assert_eq!(CreateFileStatus::Created, reply.status());
        assert_eq!(0x0102, reply.file_index());
        assert_eq!(3, reply.file_number());
    }

    #[test]
    fn create_file_status_codes_are_named() {
        assert_eq!(CreateFileStatus::NoSlotsForType, CreateFileStatus::from(4));
        assert_eq!("not enough space", CreateFileStatus::from(2).to_string());
        assert_eq!(CreateFileStatus::Other(9), CreateFileStatus::from(9));
    }

    #[test]
    fn upload_request_body_layout() {
        let payload = UploadRequest::new(0x0102, 45, 0, 0)
            .to_payload()
            .expect("upload request should encode");
        assert_eq!(
            vec![0x8B, 0x13, 0x02, 0x01, 0x2D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            payload
        );
    }

    #[test]
    fn upload_reply_is_truncation_checked() {
        let ack = Acknowledgement::new(MessageType::UPLOAD_REQUEST, 0, vec![0x00, 0x14, 0x00]);
        assert_matches!(
            ack.decode_reply::<UploadReply>(),
            Err(ProtocolError::Truncated { field: "offset", .. })
        );
    }

    #[test]
    fn transfer_reply_defaults_to_accepted_when_empty() {
        let ack = Acknowledgement::new(MessageType::FILE_TRANSFER_DATA, 0, Vec::new());
        let reply: FileTransferReply = ack.decode_reply().expect("empty reply should decode");
        assert_eq!(0, reply.status());
    }

    #[test]
    fn transfer_data_carries_offset_and_bytes() {
        let chunk = FileTransferData::new(0, 0xBEEF, 20, vec![0x01, 0x02]);
        let payload = chunk.to_payload().expect("transfer should encode");
        assert_eq!(
            vec![0x8C, 0x13, 0x00, 0xEF, 0xBE, 0x14, 0x00, 0x00, 0x00, 0x01, 0x02],
            payload
        );
        assert_eq!(
            chunk,
            FileTransferData::from_payload(&payload).expect("payload should decode")
        );
    }
}
