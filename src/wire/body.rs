use crate::error::ProtocolError;

/// Little-endian writer for message bodies.
#[derive(Debug, Default, Clone)]
pub struct BodyWriter {
    bytes: Vec<u8>,
}

impl BodyWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_bytes(&mut self, value: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(value);
        self
    }

    /// Writes a string prefixed by its UTF-8 byte length as a `u8`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] when the string exceeds 255
    /// bytes.
    pub fn put_short_string(
        &mut self,
        field: &'static str,
        value: &str,
    ) -> Result<&mut Self, ProtocolError> {
        let len = u8::try_from(value.len()).map_err(|_| ProtocolError::StringTooLong {
            field,
            len: value.len(),
            max: usize::from(u8::MAX),
        })?;
        self.put_u8(len);
        Ok(self.put_bytes(value.as_bytes()))
    }

    /// Writes a string prefixed by its UTF-8 byte length as a `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] when the string exceeds
    /// 65535 bytes.
    pub fn put_long_string(
        &mut self,
        field: &'static str,
        value: &str,
    ) -> Result<&mut Self, ProtocolError> {
        let len = u16::try_from(value.len()).map_err(|_| ProtocolError::StringTooLong {
            field,
            len: value.len(),
            max: usize::from(u16::MAX),
        })?;
        self.put_u16(len);
        Ok(self.put_bytes(value.as_bytes()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Little-endian cursor over a received message body.
#[derive(Debug, Clone)]
pub struct BodyReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BodyReader<'a> {
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Takes the next `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when fewer than `len` bytes remain.
    pub fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(ProtocolError::Truncated {
                field,
                needed: len,
                remaining,
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], ProtocolError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(field, N)?);
        Ok(array)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, ProtocolError> {
        Ok(self.take_array::<1>(field)?[0])
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, ProtocolError> {
        self.take_array(field).map(u16::from_le_bytes)
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        self.take_array(field).map(u32::from_le_bytes)
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32, ProtocolError> {
        self.take_array(field).map(i32::from_le_bytes)
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, ProtocolError> {
        self.take_array(field).map(u64::from_le_bytes)
    }

    /// Reads a string prefixed by its UTF-8 byte length as a `u8`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the body is truncated or the bytes are
    /// not UTF-8.
    pub fn short_string(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let len = usize::from(self.u8(field)?);
        self.utf8(field, len)
    }

    /// Reads a string prefixed by its UTF-8 byte length as a `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] when the body is truncated or the bytes are
    /// not UTF-8.
    pub fn long_string(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let len = usize::from(self.u16(field)?);
        self.utf8(field, len)
    }

    fn utf8(&mut self, field: &'static str, len: usize) -> Result<String, ProtocolError> {
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|source| ProtocolError::InvalidUtf8 { field, source })
    }

    /// Consumes and returns everything left in the body.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.position..];
        self.position = self.bytes.len();
        rest
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
