//! Scalar and header writers over the `rmp` MessagePack codec.
//!
//! Every method appends to the borrowed buffer and returns the number of bytes
//! it wrote. Integers use the most compact MessagePack form for their value.

use crate::error::{EncodeError, ValuePath};

/// Appends MessagePack primitives to a byte buffer.
pub struct Packer<'a> {
    buf: &'a mut Vec<u8>,
}

impl<'a> Packer<'a> {
    /// Wrap `buf`; existing contents are left untouched.
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    /// Current length of the underlying buffer.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Discard everything written after `position`.
    pub fn rollback(&mut self, position: usize) {
        self.buf.truncate(position);
    }

    fn written<E>(
        &mut self,
        write: impl FnOnce(&mut Vec<u8>) -> Result<(), E>,
    ) -> Result<usize, EncodeError>
    where
        EncodeError: From<E>,
    {
        let start = self.buf.len();
        write(&mut *self.buf)?;
        Ok(self.buf.len() - start)
    }

    /// Map header announcing `count` key/value pairs.
    pub fn write_map_header(&mut self, count: usize) -> Result<usize, EncodeError> {
        let len = header_len(count)?;
        self.written(|buf| rmp::encode::write_map_len(buf, len).map(drop))
    }

    /// Array header announcing `count` items.
    pub fn write_array_header(&mut self, count: usize) -> Result<usize, EncodeError> {
        let len = header_len(count)?;
        self.written(|buf| rmp::encode::write_array_len(buf, len).map(drop))
    }

    /// UTF-8 text in the smallest `str` form.
    pub fn write_text(&mut self, value: &str) -> Result<usize, EncodeError> {
        header_len(value.len())?;
        self.written(|buf| rmp::encode::write_str(buf, value))
    }

    /// Raw bytes as `bin`.
    pub fn write_bin(&mut self, value: &[u8]) -> Result<usize, EncodeError> {
        header_len(value.len())?;
        self.written(|buf| rmp::encode::write_bin(buf, value))
    }

    /// Signed integer in the most compact form.
    pub fn write_i64(&mut self, value: i64) -> Result<usize, EncodeError> {
        self.written(|buf| rmp::encode::write_sint(buf, value).map(drop))
    }

    /// Unsigned integer in the most compact form.
    pub fn write_u64(&mut self, value: u64) -> Result<usize, EncodeError> {
        self.written(|buf| rmp::encode::write_uint(buf, value).map(drop))
    }

    /// Single precision float.
    pub fn write_f32(&mut self, value: f32) -> Result<usize, EncodeError> {
        self.written(|buf| rmp::encode::write_f32(buf, value))
    }

    /// Double precision float.
    pub fn write_f64(&mut self, value: f64) -> Result<usize, EncodeError> {
        self.written(|buf| rmp::encode::write_f64(buf, value))
    }

    /// `true` or `false` as a single byte.
    pub fn write_bool(&mut self, value: bool) -> Result<usize, EncodeError> {
        self.written(|buf| rmp::encode::write_bool(buf, value))
    }

    /// The nil marker.
    pub fn write_nil(&mut self) -> Result<usize, EncodeError> {
        self.written(|buf| rmp::encode::write_nil(buf))
    }
}

fn header_len(count: usize) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::TooLarge {
        path: ValuePath::root(),
        len: count,
    })
}
