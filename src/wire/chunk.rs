use tracing::{debug, warn};

use super::cobs::FRAME_DELIMITER;

/// Default transport write size for the vivofit link.
pub const DEFAULT_MAX_CHUNK_LEN: usize = 20;

/// Upper bound on buffered partial-frame bytes before the reassembler resyncs.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Splits a stuffed frame into transport writes of at most `max_chunk_len`
/// bytes. A zero chunk length is treated as one.
///
/// ```
/// use vivolink::wire::chunk;
///
/// let frame = [0x00, 0x01, 0x01, 0x00];
/// let chunks: Vec<&[u8]> = chunk::split(&frame, 3).collect();
/// assert_eq!(2, chunks.len());
/// assert_eq!([0x00, 0x01, 0x01].as_slice(), chunks[0]);
/// ```
pub fn split(frame: &[u8], max_chunk_len: usize) -> impl Iterator<Item = &[u8]> {
    frame.chunks(max_chunk_len.max(1))
}

/// Accumulates inbound notifications until whole frames are available.
///
/// A `0x00` byte closes the frame in progress when any content has been
/// buffered; otherwise it is the opening delimiter of the next frame or idle
/// line noise and is skipped. Completed frames are always returned in the
/// canonical `0x00 ‖ content ‖ 0x00` shape, regardless of how the peer split
/// its writes.
#[derive(Debug)]
pub struct ChunkReassembler {
    buffer: Vec<u8>,
    max_frame_len: usize,
    discarding: bool,
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl ChunkReassembler {
    /// Creates a reassembler that resyncs once a partial frame grows past
    /// `max_frame_len` bytes.
    #[must_use]
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len: max_frame_len.max(1),
            discarding: false,
        }
    }

    /// Appends one notification and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut completed = Vec::new();

        for &byte in chunk {
            if byte != FRAME_DELIMITER {
                self.buffer_byte(byte);
                continue;
            }

            if self.discarding {
                debug!("resynchronised after oversized frame");
                self.discarding = false;
                self.buffer.clear();
                continue;
            }
            if self.buffer.is_empty() {
                continue;
            }

            let mut frame = Vec::with_capacity(self.buffer.len() + 2);
            frame.push(FRAME_DELIMITER);
            frame.append(&mut self.buffer);
            frame.push(FRAME_DELIMITER);
            completed.push(frame);
        }

        completed
    }

    fn buffer_byte(&mut self, byte: u8) {
        if self.discarding {
            return;
        }
        if self.buffer.len() >= self.max_frame_len {
            warn!(
                buffered = self.buffer.len(),
                max_frame_len = self.max_frame_len,
                "discarding oversized partial frame"
            );
            self.buffer.clear();
            self.discarding = true;
            return;
        }
        self.buffer.push(byte);
    }

    /// Returns `true` when no partial frame is buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && !self.discarding
    }

    /// Returns the number of buffered partial-frame bytes.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partial frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::wire::cobs;

    fn reassemble(frame: &[u8], max_chunk_len: usize) -> Vec<Vec<u8>> {
        let mut reassembler = ChunkReassembler::default();
        split(frame, max_chunk_len)
            .flat_map(|chunk| reassembler.push(chunk))
            .collect()
    }

    #[rstest]
    fn any_chunk_size_reassembles_the_same_frame(
        #[values(1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20)] max_chunk_len: usize,
    ) {
        let payload: Vec<u8> = (0..57).map(|value| (value * 7 % 5) as u8).collect();
        let frame = cobs::encode(&payload);

        let frames = reassemble(&frame, max_chunk_len);

        assert_eq!(vec![frame], frames);
    }

    #[test]
    fn split_respects_max_chunk_len() {
        let frame = cobs::encode(&[0x55; 45]);
        assert!(split(&frame, 20).all(|chunk| chunk.len() <= 20));
        assert_eq!(3, split(&frame, 20).count());
    }

    #[test]
    fn split_treats_zero_length_as_one() {
        assert_eq!(4, split(&[0x00, 0x01, 0x01, 0x00], 0).count());
    }

    #[test]
    fn frame_is_not_complete_until_trailing_delimiter() {
        let mut reassembler = ChunkReassembler::default();
        assert!(reassembler.push(&[0x00, 0x01, 0x02]).is_empty());
        assert_eq!(2, reassembler.pending_len());
        assert_eq!(vec![vec![0x00, 0x01, 0x02, 0xAA, 0x00]], reassembler.push(&[0xAA, 0x00]));
        assert!(reassembler.is_idle());
    }

    #[test]
    fn back_to_back_frames_in_one_chunk_are_separated() {
        let mut reassembler = ChunkReassembler::default();
        let frames = reassembler.push(&[0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x02, 0xAA, 0x00]);
        assert_eq!(
            vec![
                vec![0x00, 0x01, 0x01, 0x00],
                vec![0x00, 0x01, 0x02, 0xAA, 0x00],
            ],
            frames
        );
    }

    #[test]
    fn stale_partial_frame_is_closed_by_next_frame_delimiter() {
        let mut reassembler = ChunkReassembler::default();
        assert!(reassembler.push(&[0x00, 0x05, 0x11]).is_empty());

        let frames = reassembler.push(&[0x00, 0x01, 0x01, 0x00]);

        assert_eq!(
            vec![vec![0x00, 0x05, 0x11, 0x00], vec![0x00, 0x01, 0x01, 0x00]],
            frames
        );
    }

    #[test]
    fn oversized_partial_frame_is_discarded_until_next_delimiter() {
        let mut reassembler = ChunkReassembler::new(4);
        assert!(reassembler.push(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).is_empty());
        assert!(!reassembler.is_idle());
        assert!(reassembler.push(&[0x00]).is_empty());
        assert_eq!(
            vec![vec![0x00, 0x01, 0x01, 0x00]],
            reassembler.push(&[0x00, 0x01, 0x01, 0x00])
        );
    }

    #[test]
    fn reset_drops_partial_frame() {
        let mut reassembler = ChunkReassembler::default();
        reassembler.push(&[0x00, 0x03, 0x01]);
        reassembler.reset();
        assert!(reassembler.is_idle());
    }
}
