use std::fmt::{self, Display, Formatter};

/// Displays bytes as uppercase hexadecimal pairs separated by spaces.
///
/// Log fields use this directly so trace-level chunk logging does not
/// allocate when the level is disabled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HexBytes<'a>(pub(crate) &'a [u8]);

impl Display for HexBytes<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some((first, rest)) = self.0.split_first() else {
            return f.write_str("<empty>");
        };
        write!(f, "{first:02X}")?;
        for byte in rest {
            write!(f, " {byte:02X}")?;
        }
        Ok(())
    }
}

pub(crate) fn format_hex(bytes: &[u8]) -> String {
    HexBytes(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::empty(&[], "<empty>")]
    #[case::single(&[0x0A], "0A")]
    #[case::frame(&[0x00, 0x01, 0x01, 0x00], "00 01 01 00")]
    #[case::high_nibbles(&[0xA6, 0x13, 0xFF], "A6 13 FF")]
    fn bytes_render_as_uppercase_pairs(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(expected, format_hex(bytes));
    }
}
