//! Consistent-overhead byte stuffing with explicit frame delimiters.
//!
//! A framed message is `0x00 ‖ stuff(0x00 ‖ payload) ‖ 0x00`. The leading
//! placeholder zero guarantees the stuffed body is never empty, so even an
//! empty payload produces a frame the reassembler can tell apart from idle
//! delimiters. Decoding also accepts frames stuffed without the placeholder,
//! which is how the watch itself frames its messages.

use super::error::FrameError;

/// Byte that opens and closes every frame on the wire.
pub const FRAME_DELIMITER: u8 = 0x00;

/// Largest distance code; a block of this length carries no implicit zero.
const MAX_DISTANCE: u8 = 0xFF;

/// Stuffs `payload` and wraps it in frame delimiters.
///
/// ```
/// use vivolink::wire::cobs;
///
/// assert_eq!(vec![0x00, 0x01, 0x01, 0x00], cobs::encode(&[]));
/// assert_eq!(vec![0x00, 0x01, 0x02, 0xAA, 0x00], cobs::encode(&[0xAA]));
/// ```
#[must_use]
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + payload.len() / 254 + 5);
    framed.push(FRAME_DELIMITER);
    // The placeholder zero closes an empty first block straight away.
    framed.push(0x01);

    let mut code_index = framed.len();
    let mut code: u8 = 1;
    framed.push(0);

    for &byte in payload {
        if byte == 0 {
            framed[code_index] = code;
            code_index = framed.len();
            framed.push(0);
            code = 1;
            continue;
        }

        framed.push(byte);
        code += 1;
        if code == MAX_DISTANCE {
            framed[code_index] = code;
            code_index = framed.len();
            framed.push(0);
            code = 1;
        }
    }

    framed[code_index] = code;
    framed.push(FRAME_DELIMITER);
    framed
}

/// Reverses [`encode`], returning the original payload.
///
/// Leading delimiters are skipped, so frames that arrive with extra idle
/// zeros in front decode the same as canonical ones. A leading placeholder
/// zero is dropped when present; content without one is returned whole.
/// Content that genuinely starts with a zero byte therefore needs the
/// placeholder to survive, which [`encode`] always writes.
///
/// ```
/// use vivolink::wire::cobs;
///
/// assert_eq!(vec![0xAA], cobs::decode(&[0x00, 0x01, 0x02, 0xAA, 0x00])?);
/// assert_eq!(vec![0xAA], cobs::decode(&[0x00, 0x02, 0xAA, 0x00])?);
/// # Ok::<(), vivolink::wire::FrameError>(())
/// ```
///
/// # Errors
///
/// Returns [`FrameError`] when the delimiters are missing, or when a
/// distance code is zero or overruns the content.
pub fn decode(framed: &[u8]) -> Result<Vec<u8>, FrameError> {
    let start = framed
        .iter()
        .position(|&byte| byte != FRAME_DELIMITER)
        .ok_or(FrameError::Empty)?;
    let Some((&FRAME_DELIMITER, _)) = framed.split_last() else {
        return Err(FrameError::MissingTerminator);
    };
    let stuffed = &framed[start..framed.len() - 1];

    let mut unstuffed = unstuff(stuffed)?;
    if unstuffed.first() == Some(&0) {
        unstuffed.remove(0);
    }
    Ok(unstuffed)
}

fn unstuff(stuffed: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut unstuffed = Vec::with_capacity(stuffed.len());
    let mut cursor = 0;
    // No zero precedes the first block.
    let mut skip_zero = true;

    while cursor < stuffed.len() {
        let distance = stuffed[cursor];
        if distance == 0 {
            return Err(FrameError::UnexpectedDelimiter { position: cursor });
        }

        let end = cursor + usize::from(distance);
        if end > stuffed.len() {
            return Err(FrameError::DistanceOutOfBounds {
                position: cursor,
                distance,
                len: stuffed.len(),
            });
        }

        if !skip_zero {
            unstuffed.push(0);
        }
        unstuffed.extend_from_slice(&stuffed[cursor + 1..end]);
        skip_zero = distance == MAX_DISTANCE;
        cursor = end;
    }

    Ok(unstuffed)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::utils::format_hex;

    #[test]
    fn empty_payload_encodes_to_minimal_frame() {
        insta::assert_snapshot!(format_hex(&encode(&[])), @"00 01 01 00");
    }

    #[test]
    fn empty_payload_decodes_back_to_empty() {
        let decoded = decode(&[0x00, 0x01, 0x01, 0x00]).expect("minimal frame should decode");
        assert!(decoded.is_empty());
    }

    #[rstest]
    #[case::single_byte(vec![0xAA])]
    #[case::single_zero(vec![0x00])]
    #[case::zeros_only(vec![0x00, 0x00, 0x00])]
    #[case::mixed(vec![0x11, 0x00, 0x22, 0x33, 0x00])]
    #[case::run_of_253(vec![0x7F; 253])]
    #[case::run_of_254(vec![0x7F; 254])]
    #[case::run_of_255(vec![0x7F; 255])]
    #[case::run_of_600(vec![0x42; 600])]
    #[case::run_then_zero((0..254).map(|_| 0x01).chain([0x00, 0x02]).collect())]
    fn decode_reverses_encode(#[case] payload: Vec<u8>) {
        let framed = encode(&payload);
        let decoded = decode(&framed).expect("encoded frame should decode");
        assert_eq!(payload, decoded);
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::zeros(vec![0x00; 40])]
    #[case::long_run(vec![0xFF; 1024])]
    #[case::every_byte((0..=255).collect())]
    fn encoded_frame_only_has_zero_at_edges(#[case] payload: Vec<u8>) {
        let framed = encode(&payload);
        assert_eq!(Some(&FRAME_DELIMITER), framed.first());
        assert_eq!(Some(&FRAME_DELIMITER), framed.last());
        assert!(!framed[1..framed.len() - 1].contains(&FRAME_DELIMITER));
    }

    #[test]
    fn run_of_254_uses_full_distance_block() {
        let framed = encode(&[0x01; 254]);
        assert_eq!(&[0x00, 0x01, 0xFF], &framed[..3]);
        assert_eq!(&[0x01, 0x00], &framed[framed.len() - 2..]);
    }

    #[test]
    fn decode_tolerates_extra_leading_delimiters() {
        let decoded =
            decode(&[0x00, 0x00, 0x00, 0x01, 0x02, 0xAA, 0x00]).expect("frame should decode");
        assert_eq!(vec![0xAA], decoded);
    }

    #[test]
    fn decode_rejects_missing_terminator() {
        assert_matches!(
            decode(&[0x00, 0x01, 0x02, 0xAA]),
            Err(FrameError::MissingTerminator)
        );
    }

    #[test]
    fn decode_rejects_delimiters_only() {
        assert_matches!(decode(&[0x00, 0x00]), Err(FrameError::Empty));
    }

    #[test]
    fn decode_rejects_overrunning_distance() {
        assert_matches!(
            decode(&[0x00, 0x01, 0x09, 0xAA, 0x00]),
            Err(FrameError::DistanceOutOfBounds {
                position: 1,
                distance: 9,
                len: 3,
            })
        );
    }

    #[rstest]
    #[case::single_block(vec![0x00, 0x02, 0xAA, 0x00], vec![0xAA])]
    #[case::embedded_zero(vec![0x00, 0x02, 0x11, 0x02, 0x22, 0x00], vec![0x11, 0x00, 0x22])]
    #[case::trailing_zero(vec![0x00, 0x02, 0x11, 0x01, 0x00], vec![0x11, 0x00])]
    fn decode_accepts_frames_without_placeholder(
        #[case] framed: Vec<u8>,
        #[case] expected: Vec<u8>,
    ) {
        let decoded = decode(&framed).expect("frame without placeholder should decode");
        assert_eq!(expected, decoded);
    }
}
