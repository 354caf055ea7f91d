use tracing::{instrument, warn};

use crate::utils::HexBytes;

use super::checksum::{ChecksumAlgorithm, ChecksumPolicy};
use super::chunk::{self, DEFAULT_MAX_CHUNK_LEN};
use super::cobs;
use super::error::{FrameDecodeError, FrameError};
use super::length;

/// Composes the length, checksum and stuffing layers in wire order.
///
/// Outbound: `payload → length ‖ payload → ‖ checksum → stuffed frame →
/// chunks`. Inbound runs the same layers in reverse.
#[derive(Debug, Clone, Copy, bon::Builder)]
pub struct FramePipeline {
    #[builder(default)]
    checksum: ChecksumAlgorithm,
    #[builder(default)]
    checksum_policy: ChecksumPolicy,
    #[builder(default = DEFAULT_MAX_CHUNK_LEN)]
    max_chunk_len: usize,
}

impl Default for FramePipeline {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FramePipeline {
    #[must_use]
    pub fn checksum(&self) -> ChecksumAlgorithm {
        self.checksum
    }

    #[must_use]
    pub fn checksum_policy(&self) -> ChecksumPolicy {
        self.checksum_policy
    }

    #[must_use]
    pub fn max_chunk_len(&self) -> usize {
        self.max_chunk_len
    }

    /// Wraps a message payload into a complete stuffed frame.
    ///
    /// ```
    /// use vivolink::FramePipeline;
    ///
    /// let pipeline = FramePipeline::default();
    /// let frame = pipeline.encode(&[0xA6, 0x13, 0x00])?;
    /// assert_eq!(vec![0xA6, 0x13, 0x00], pipeline.decode(&frame)?);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] when the payload does not fit
    /// the length field.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
        let enveloped = length::prepend(payload)?;
        let checked = self.checksum.append(&enveloped);
        Ok(cobs::encode(&checked))
    }

    /// Encodes a payload and splits the frame into transport-sized writes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] when the payload does not fit
    /// the length field.
    pub fn encode_chunks(&self, payload: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
        let frame = self.encode(payload)?;
        Ok(chunk::split(&frame, self.max_chunk_len)
            .map(<[u8]>::to_vec)
            .collect())
    }

    /// Recovers the payload of a complete frame.
    ///
    /// Checksum mismatches are logged and tolerated under
    /// [`ChecksumPolicy::LogOnly`] and rejected under
    /// [`ChecksumPolicy::Enforce`].
    ///
    /// # Errors
    ///
    /// Returns [`FrameDecodeError`] when unstuffing fails, the envelope length
    /// is wrong, or the checksum is rejected.
    #[instrument(skip(self, frame), level = "trace", fields(frame_len = frame.len()))]
    pub fn decode(&self, frame: &[u8]) -> Result<Vec<u8>, FrameDecodeError> {
        let unstuffed = cobs::decode(frame)?;
        if let Err(error) = self.checksum.verify(&unstuffed) {
            match self.checksum_policy {
                ChecksumPolicy::Enforce => return Err(error.into()),
                ChecksumPolicy::LogOnly => warn!(
                    %error,
                    frame = %HexBytes(&unstuffed),
                    "accepting frame with bad checksum"
                ),
            }
        }
        let payload = length::strip(&unstuffed)?;
        Ok(payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::wire::{ChunkReassembler, IntegrityError};

    fn corrupt_checksum(frame: &[u8]) -> Vec<u8> {
        let mut unstuffed = cobs::decode(frame).expect("frame should decode");
        let last = unstuffed.len() - 1;
        unstuffed[last] ^= 0x5A;
        cobs::encode(&unstuffed)
    }

    #[test]
    fn encode_layers_length_checksum_and_stuffing() {
        let pipeline = FramePipeline::default();
        let frame = pipeline.encode(&[0x88, 0x13]).expect("payload should encode");

        let unstuffed = cobs::decode(&frame).expect("frame should unstuff");
        assert_eq!(&[0x06, 0x00, 0x88, 0x13], &unstuffed[..4]);
        let checksum = ChecksumAlgorithm::Ibm.compute(&unstuffed[..4]);
        assert_eq!(&checksum.to_le_bytes(), &unstuffed[4..]);
    }

    #[test]
    fn encode_chunks_reassembles_to_original_payload() {
        let pipeline = FramePipeline::default();
        let payload: Vec<u8> = (0..=90).collect();
        let chunks = pipeline
            .encode_chunks(&payload)
            .expect("payload should encode");
        assert!(chunks.iter().all(|chunk| chunk.len() <= DEFAULT_MAX_CHUNK_LEN));

        let mut reassembler = ChunkReassembler::default();
        let frames: Vec<Vec<u8>> = chunks
            .iter()
            .flat_map(|chunk| reassembler.push(chunk))
            .collect();
        assert_eq!(1, frames.len());
        assert_eq!(payload, pipeline.decode(&frames[0]).expect("frame should decode"));
    }

    #[test]
    fn decode_accepts_device_frame_without_placeholder() {
        let pipeline = FramePipeline::default();
        let mut frame = pipeline
            .encode(&[0xA6, 0x13, 0x08])
            .expect("payload should encode");
        // The second byte is the distance code that covers only the placeholder.
        assert_eq!(0x01, frame.remove(1));

        assert_eq!(
            vec![0xA6, 0x13, 0x08],
            pipeline.decode(&frame).expect("frame should decode")
        );
    }

    #[test]
    fn log_only_policy_accepts_bad_checksum() {
        let pipeline = FramePipeline::default();
        let frame = corrupt_checksum(&pipeline.encode(&[0xA6, 0x13, 0x08]).expect("encode"));
        assert_eq!(
            vec![0xA6, 0x13, 0x08],
            pipeline.decode(&frame).expect("log-only should accept")
        );
    }

    #[test]
    fn enforce_policy_rejects_bad_checksum() {
        let pipeline = FramePipeline::builder()
            .checksum_policy(ChecksumPolicy::Enforce)
            .build();
        let frame = corrupt_checksum(&pipeline.encode(&[0xA6, 0x13, 0x08]).expect("encode"));
        assert_matches!(
            pipeline.decode(&frame),
            Err(FrameDecodeError::Integrity(IntegrityError::Mismatch { .. }))
        );
    }

    #[test]
    fn decode_rejects_wrong_declared_length() {
        let pipeline = FramePipeline::default();
        let envelope = ChecksumAlgorithm::Ibm.append(&[0x09, 0x00, 0xA6, 0x13]);
        let frame = cobs::encode(&envelope);
        assert_matches!(
            pipeline.decode(&frame),
            Err(FrameDecodeError::Frame(FrameError::LengthMismatch {
                declared: 9,
                actual: 6,
            }))
        );
    }

    #[test]
    fn xmodem_pipeline_does_not_accept_ibm_frames_when_enforcing() {
        let ibm = FramePipeline::default();
        let xmodem = FramePipeline::builder()
            .checksum(ChecksumAlgorithm::Xmodem)
            .checksum_policy(ChecksumPolicy::Enforce)
            .build();
        let frame = ibm.encode(&[0x01, 0x02, 0x03]).expect("encode");
        assert_matches!(xmodem.decode(&frame), Err(FrameDecodeError::Integrity(_)));
    }
}
