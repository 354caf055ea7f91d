use bon::Builder;
use strum_macros::Display;
use thiserror::Error;
use tracing::{Span, debug, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt as _;

use crate::error::{LinkError, ProtocolError};
use crate::link::LinkSession;
use crate::messages::{
    Acknowledgement, CreateFileReply, CreateFileRequest, CreateFileStatus, FileTransferData,
    FileTransferReply, Message, UploadReply, UploadRequest,
};
use crate::wire::ChecksumAlgorithm;

/// Step of the upload sequence.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UploadStep {
    CreateFile,
    RequestSlot,
    Transfer,
}

/// Errors returned by file uploads.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file of {len} bytes does not fit the 32-bit size field")]
    FileTooLarge { len: usize },
    #[error("transfer limit cannot be zero")]
    InvalidTransferLimit,
    #[error("device refused the {step} message with status {status}")]
    Refused { step: UploadStep, status: u8 },
    #[error("device could not create the file: {status}")]
    CreateFailed { status: CreateFileStatus },
    #[error("device refused to open file {file_index} for upload with status {status}")]
    SlotRefused { file_index: u16, status: u8 },
    #[error("device resumed at offset {offset}, beyond the {len}-byte file")]
    ResumeBeyondEnd { offset: u32, len: u32 },
    #[error("device rejected the slice at offset {offset} with status {status}")]
    TransferRejected { offset: u32, status: u8 },
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A file to place on the device.
///
/// ```
/// use vivolink::handlers::FileUpload;
///
/// let upload = FileUpload::builder()
///     .data(vec![0x0E; 45])
///     .subtype(0x09)
///     .transfer_limit(20)
///     .build();
/// assert_eq!(45, upload.len());
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Builder)]
pub struct FileUpload {
    #[builder(into)]
    data: Vec<u8>,
    subtype: u8,
    #[builder(into, default)]
    path: String,
    #[builder(default)]
    unique_id: u64,
    /// Bytes per transfer slice; the link configuration applies when unset.
    transfer_limit: Option<usize>,
}

impl FileUpload {
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn subtype(&self) -> u8 {
        self.subtype
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Summary of a finished upload.
#[derive(Debug, Clone, Eq, PartialEq, serde::Serialize)]
pub struct UploadReceipt {
    file_index: u16,
    start_offset: u32,
    offsets: Vec<u32>,
    final_offset: u32,
}

impl UploadReceipt {
    /// Index the device assigned to the file.
    #[must_use]
    pub fn file_index(&self) -> u16 {
        self.file_index
    }

    /// Offset the device asked the transfer to start from.
    #[must_use]
    pub fn start_offset(&self) -> u32 {
        self.start_offset
    }

    /// Offset of every transfer slice, in send order.
    #[must_use]
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    #[must_use]
    pub fn final_offset(&self) -> u32 {
        self.final_offset
    }

    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.offsets.len()
    }
}

/// Per-file state while the three steps run.
#[derive(Debug)]
struct UploadSession<'a> {
    upload: &'a FileUpload,
    len: u32,
    transfer_limit: usize,
    checksum: ChecksumAlgorithm,
    file_index: u16,
    offset: u32,
    crc_seed: u16,
}

impl<'a> UploadSession<'a> {
    fn new(upload: &'a FileUpload, link: &LinkSession) -> Result<Self, UploadError> {
        let len = u32::try_from(upload.len())
            .map_err(|_| UploadError::FileTooLarge { len: upload.len() })?;
        let transfer_limit = upload
            .transfer_limit
            .unwrap_or_else(|| link.config().transfer_limit());
        if transfer_limit == 0 {
            return Err(UploadError::InvalidTransferLimit);
        }
        Ok(Self {
            upload,
            len,
            transfer_limit,
            checksum: link.config().checksum(),
            file_index: 0,
            offset: 0,
            crc_seed: 0,
        })
    }

    async fn create_file(&mut self, link: &LinkSession) -> Result<(), UploadError> {
        let request = CreateFileRequest::builder()
            .size(self.len)
            .subtype(self.upload.subtype)
            .path(self.upload.path.clone())
            .unique_id(self.upload.unique_id)
            .build();
        let ack = link.request(&Message::from(request)).await?;
        let reply: CreateFileReply = accepted(&ack, UploadStep::CreateFile)?.decode_reply()?;
        if reply.status() != CreateFileStatus::Created {
            return Err(UploadError::CreateFailed {
                status: reply.status(),
            });
        }
        self.file_index = reply.file_index();
        debug!(file_index = self.file_index, "device created file");
        Ok(())
    }

    async fn request_slot(&mut self, link: &LinkSession) -> Result<(), UploadError> {
        let request = UploadRequest::new(self.file_index, self.len, 0, 0);
        let ack = link.request(&Message::from(request)).await?;
        let reply: UploadReply = accepted(&ack, UploadStep::RequestSlot)?.decode_reply()?;
        if reply.status() != Acknowledgement::STATUS_OK {
            return Err(UploadError::SlotRefused {
                file_index: self.file_index,
                status: reply.status(),
            });
        }
        if reply.offset() > self.len {
            return Err(UploadError::ResumeBeyondEnd {
                offset: reply.offset(),
                len: self.len,
            });
        }
        self.offset = reply.offset();
        self.crc_seed = reply.crc_seed();
        debug!(offset = self.offset, crc_seed = self.crc_seed, "upload slot opened");
        Ok(())
    }

    async fn transfer(&mut self, link: &LinkSession, offsets: &mut Vec<u32>) -> Result<(), UploadError> {
        let data = self.upload.data();
        while self.offset < self.len {
            let start = self.offset as usize;
            let end = start.saturating_add(self.transfer_limit).min(data.len());
            let crc = self.checksum.compute_seeded(self.crc_seed, &data[..end]);
            let slice = FileTransferData::new(0, crc, self.offset, data[start..end].to_vec());

            let ack = link.request(&Message::from(slice)).await?;
            let reply: FileTransferReply = accepted(&ack, UploadStep::Transfer)?.decode_reply()?;
            if reply.status() != Acknowledgement::STATUS_OK {
                return Err(UploadError::TransferRejected {
                    offset: self.offset,
                    status: reply.status(),
                });
            }

            offsets.push(self.offset);
            // `end` never exceeds `len`, which fits in u32.
            self.offset = u32::try_from(end).unwrap_or(self.len);
            Span::current().pb_set_position(u64::from(self.offset));
        }
        Ok(())
    }
}

fn accepted(ack: &Acknowledgement, step: UploadStep) -> Result<&Acknowledgement, UploadError> {
    if ack.is_ok() {
        Ok(ack)
    } else {
        Err(UploadError::Refused {
            step,
            status: ack.status(),
        })
    }
}

/// Runs the create, open and transfer sequence for one file.
pub struct UploadHandler;

impl UploadHandler {
    /// Uploads `upload` over `link`.
    ///
    /// ```no_run
    /// # async fn demo(link: vivolink::LinkSession) -> Result<(), vivolink::handlers::UploadError> {
    /// use vivolink::handlers::{FileUpload, UploadHandler};
    ///
    /// let upload = FileUpload::builder().data(vec![1, 2, 3]).subtype(0x09).build();
    /// let receipt = UploadHandler::upload(&link, &upload).await?;
    /// assert_eq!(3, receipt.final_offset());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] when the device refuses a step, rejects a
    /// slice, or the link fails or times out.
    #[instrument(
        skip_all,
        level = "info",
        fields(progress = true, len = upload.len(), subtype = upload.subtype())
    )]
    pub async fn upload(
        link: &LinkSession,
        upload: &FileUpload,
    ) -> Result<UploadReceipt, UploadError> {
        let span = Span::current();
        span.pb_set_message("Uploading file");
        span.pb_set_finish_message("Upload complete");
        span.pb_set_length(upload.len() as u64);

        let mut session = UploadSession::new(upload, link)?;
        session.create_file(link).await?;
        session.request_slot(link).await?;
        let start_offset = session.offset;
        span.pb_set_position(u64::from(start_offset));

        let mut offsets = Vec::new();
        session.transfer(link, &mut offsets).await?;
        debug!(
            file_index = session.file_index,
            transfers = offsets.len(),
            "upload finished"
        );

        Ok(UploadReceipt {
            file_index: session.file_index,
            start_offset,
            offsets,
            final_offset: session.offset,
        })
    }
}
