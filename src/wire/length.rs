use super::checksum::CHECKSUM_LEN;
use super::error::FrameError;

/// Width of the length field in bytes.
pub const LENGTH_FIELD_LEN: usize = 2;

/// Bytes the envelope adds around a payload: the length field and checksum.
pub const ENVELOPE_OVERHEAD: usize = LENGTH_FIELD_LEN + CHECKSUM_LEN;

/// Largest payload whose envelope length still fits the 16-bit field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - ENVELOPE_OVERHEAD;

/// Prepends the little-endian envelope length to `payload`.
///
/// The declared length counts the length field, the payload and the
/// checksum that is appended afterwards.
///
/// ```
/// use vivolink::wire::length;
///
/// let enveloped = length::prepend(&[0xA6, 0x13, 0x00])?;
/// assert_eq!(vec![0x07, 0x00, 0xA6, 0x13, 0x00], enveloped);
/// # Ok::<(), vivolink::FrameError>(())
/// ```
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] when the envelope length would not
/// fit in 16 bits.
pub fn prepend(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            payload_len: payload.len(),
            max_payload_len: MAX_PAYLOAD_LEN,
        });
    }

    let declared = u16::try_from(payload.len() + ENVELOPE_OVERHEAD).map_err(|_| {
        FrameError::PayloadTooLarge {
            payload_len: payload.len(),
            max_payload_len: MAX_PAYLOAD_LEN,
        }
    })?;

    let mut enveloped = Vec::with_capacity(payload.len() + ENVELOPE_OVERHEAD);
    enveloped.extend_from_slice(&declared.to_le_bytes());
    enveloped.extend_from_slice(payload);
    Ok(enveloped)
}

/// Validates the envelope of a complete unstuffed frame and returns the
/// payload between the length field and the checksum.
///
/// # Errors
///
/// Returns [`FrameError::EnvelopeTooShort`] when the frame cannot hold the
/// fixed fields, or [`FrameError::LengthMismatch`] when the declared length
/// differs from the frame length.
pub fn strip(frame: &[u8]) -> Result<&[u8], FrameError> {
    if frame.len() < ENVELOPE_OVERHEAD {
        return Err(FrameError::EnvelopeTooShort {
            minimum: ENVELOPE_OVERHEAD,
            actual: frame.len(),
        });
    }

    let declared = usize::from(u16::from_le_bytes([frame[0], frame[1]]));
    if declared != frame.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: frame.len(),
        });
    }

    Ok(&frame[LENGTH_FIELD_LEN..frame.len() - CHECKSUM_LEN])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn prepend_counts_length_field_and_checksum() {
        let enveloped = prepend(&[0x01, 0x02]).expect("small payload should envelope");
        assert_eq!(vec![0x06, 0x00, 0x01, 0x02], enveloped);
    }

    #[test]
    fn prepend_accepts_empty_payload() {
        let enveloped = prepend(&[]).expect("empty payload should envelope");
        assert_eq!(vec![0x04, 0x00], enveloped);
    }

    #[test]
    fn prepend_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_matches!(
            prepend(&payload),
            Err(FrameError::PayloadTooLarge {
                payload_len,
                max_payload_len: MAX_PAYLOAD_LEN,
            }) if payload_len == MAX_PAYLOAD_LEN + 1
        );
    }

    #[test]
    fn prepend_accepts_largest_payload() {
        let payload = vec![0u8; MAX_PAYLOAD_LEN];
        let enveloped = prepend(&payload).expect("largest payload should envelope");
        assert_eq!(&[0xFF, 0xFF], &enveloped[..2]);
    }

    #[test]
    fn strip_returns_payload_between_fields() {
        let frame = [0x07, 0x00, 0xA6, 0x13, 0x00, 0xEE, 0xEE];
        assert_eq!(&[0xA6, 0x13, 0x00], strip(&frame).expect("frame should strip"));
    }

    #[test]
    fn strip_rejects_declared_length_mismatch() {
        let frame = [0x09, 0x00, 0xA6, 0x13, 0x00, 0xEE, 0xEE];
        assert_matches!(
            strip(&frame),
            Err(FrameError::LengthMismatch {
                declared: 9,
                actual: 7,
            })
        );
    }

    #[test]
    fn strip_rejects_truncated_envelope() {
        assert_matches!(
            strip(&[0x04, 0x00, 0x00]),
            Err(FrameError::EnvelopeTooShort {
                minimum: 4,
                actual: 3,
            })
        );
    }
}
