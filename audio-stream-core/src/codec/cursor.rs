use std::borrow::Cow;

use crate::models::error::StreamError;

/// Longest name a record can carry; the length prefix is a single byte.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Forward-only reader over a native-byte-order record buffer.
///
/// Every read that would run past the end of the buffer fails with
/// [`StreamError::Integrity`] naming the record being decoded.
#[derive(Debug)]
pub struct RecordReader<'a> {
    record: &'static str,
    bytes: &'a [u8],
    position: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'static str, bytes: &'a [u8]) -> Self {
        Self {
            record,
            bytes,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], StreamError> {
        if self.remaining() < len {
            return Err(StreamError::Integrity {
                record: self.record,
                detail: format!(
                    "needed {} bytes at offset {}, only {} left",
                    len,
                    self.position,
                    self.remaining()
                ),
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], StreamError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_f64(&mut self) -> Result<f64, StreamError> {
        Ok(f64::from_ne_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, StreamError> {
        Ok(i32::from_ne_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, StreamError> {
        Ok(u32::from_ne_bytes(self.take_array()?))
    }

    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        Ok(self.read_u8()? as i8)
    }

    /// One length byte followed by that many bytes of text.
    ///
    /// Decoding is lossy: bytes that are not valid UTF-8 come back as
    /// U+FFFD, and a debug message notes the record it happened in.
    pub fn read_name(&mut self) -> Result<String, StreamError> {
        let len = usize::from(self.read_u8()?);
        let record = self.record;
        let bytes = self.take(len)?;
        let name = String::from_utf8_lossy(bytes);
        if let Cow::Owned(_) = name {
            log::debug!("{} record name is not valid UTF-8; replaced invalid bytes", record);
        }
        Ok(name.into_owned())
    }

    /// Fails if any bytes are left after what should have been the last record.
    pub fn expect_exhausted(&self) -> Result<(), StreamError> {
        if self.is_exhausted() {
            Ok(())
        } else {
            Err(StreamError::Integrity {
                record: self.record,
                detail: format!("{} trailing bytes after offset {}", self.remaining(), self.position),
            })
        }
    }
}

/// Appends native-byte-order fields to a record buffer.
pub(crate) fn put_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_ne_bytes());
}

pub(crate) fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_ne_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_ne_bytes());
}

/// Writes a length-prefixed name, cut to [`MAX_NAME_LEN`] bytes on a char boundary.
pub(crate) fn put_name(out: &mut Vec<u8>, name: &str) {
    let mut end = name.len().min(MAX_NAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    out.push(end as u8);
    out.extend_from_slice(&name.as_bytes()[..end]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_native_order_fields() {
        let mut bytes = Vec::new();
        put_f64(&mut bytes, 0.25);
        put_i32(&mut bytes, -1);
        bytes.push(0xff);
        put_name(&mut bytes, "hw:0");

        let mut reader = RecordReader::new("test", &bytes);
        assert_eq!(reader.read_f64().unwrap().to_bits(), 0.25f64.to_bits());
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_name().unwrap(), "hw:0");
        assert!(reader.is_exhausted());
        assert_eq!(reader.position(), 8 + 4 + 1 + 1 + 4);
    }

    #[test]
    fn short_buffer_is_an_integrity_error() {
        let bytes = [0u8; 5];
        let mut reader = RecordReader::new("device", &bytes);
        assert!(matches!(
            reader.read_f64(),
            Err(StreamError::Integrity { record: "device", .. })
        ));
    }

    #[test]
    fn name_length_past_end_is_an_integrity_error() {
        let bytes = [10u8, b'a', b'b'];
        let mut reader = RecordReader::new("host API", &bytes);
        assert!(reader.read_name().is_err());
    }

    #[test]
    fn long_names_are_cut_on_a_char_boundary() {
        let name = "é".repeat(200);
        let mut bytes = Vec::new();
        put_name(&mut bytes, &name);
        assert_eq!(bytes[0], 254);
        assert_eq!(bytes.len(), 255);

        let mut reader = RecordReader::new("device", &bytes);
        assert_eq!(reader.read_name().unwrap(), "é".repeat(127));
    }

    #[test]
    fn invalid_utf8_in_names_is_replaced() {
        let bytes = [3u8, b'h', 0xff, b'w'];
        let mut reader = RecordReader::new("device", &bytes);
        assert_eq!(reader.read_name().unwrap(), "h\u{fffd}w");
        assert!(reader.is_exhausted());
    }

    #[test]
    fn trailing_bytes_are_reported() {
        let bytes = [1u8, 2];
        let mut reader = RecordReader::new("device", &bytes);
        reader.read_u8().unwrap();
        assert!(reader.expect_exhausted().is_err());
    }
}
