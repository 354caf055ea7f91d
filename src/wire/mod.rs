//! Framing layers between typed messages and transport writes.

mod body;
pub mod checksum;
pub mod chunk;
pub mod cobs;
mod error;
mod frame;
pub mod length;

pub use self::body::{BodyReader, BodyWriter};
pub use self::checksum::{ChecksumAlgorithm, ChecksumPolicy};
pub use self::chunk::{ChunkReassembler, DEFAULT_MAX_CHUNK_LEN};
pub use self::error::{FrameDecodeError, FrameError, IntegrityError};
pub use self::frame::FramePipeline;
