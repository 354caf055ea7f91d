use thiserror::Error;

/// Errors returned when a frame cannot be stuffed, unstuffed or enveloped.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameError {
    /// The frame carried no stuffed content between its delimiters.
    #[error("frame is empty")]
    Empty,
    /// The frame does not end with the `0x00` delimiter.
    #[error("frame is missing its trailing 0x00 delimiter")]
    MissingTerminator,
    /// A zero byte appeared where a distance code was expected.
    #[error("unexpected 0x00 inside stuffed content at byte {position}")]
    UnexpectedDelimiter { position: usize },
    /// A distance code points past the end of the stuffed content.
    #[error(
        "distance code {distance} at byte {position} overruns stuffed content of {len} bytes"
    )]
    DistanceOutOfBounds {
        position: usize,
        distance: u8,
        len: usize,
    },
    /// The envelope is shorter than its fixed length and checksum fields.
    #[error("envelope is too short: expected at least {minimum} bytes, got {actual}")]
    EnvelopeTooShort { minimum: usize, actual: usize },
    /// The declared envelope length disagrees with the bytes received.
    #[error("envelope length mismatch: declared {declared} bytes but received {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },
    /// The payload cannot be described by the 16-bit length field.
    #[error("payload is too large: {payload_len} bytes exceeds max {max_payload_len}")]
    PayloadTooLarge {
        payload_len: usize,
        max_payload_len: usize,
    },
}

/// Errors returned when a frame fails checksum verification.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum IntegrityError {
    /// The buffer is too short to carry a two-byte checksum.
    #[error("frame of {len} bytes is too short to carry a checksum")]
    MissingChecksum { len: usize },
    /// The trailing checksum disagrees with the recomputed one.
    #[error("checksum mismatch: computed {computed:#06X} but frame carries {carried:#06X}")]
    Mismatch { computed: u16, carried: u16 },
}

/// Errors returned by [`FramePipeline::decode`](super::FramePipeline::decode).
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameDecodeError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}
