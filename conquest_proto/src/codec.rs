use thiserror::Error;

/// Error returned when a byte sequence cannot be decoded into a message.
///
/// Decoding never yields a partially populated message: the first malformed
/// field aborts the whole decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unexpected end of buffer reading {field}: needed {needed} bytes, {remaining} left")]
    UnexpectedEof {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("unknown message type tag {0}")]
    UnknownMessageType(u16),
    #[error("invalid enum value {value} for {field}")]
    InvalidEnum { field: &'static str, value: u16 },
    #[error("invalid bool byte {value} for {field}")]
    InvalidBool { field: &'static str, value: u8 },
    #[error("string field {field} is not valid utf-8")]
    InvalidUtf8 { field: &'static str },
    #[error("{field} holds {len} entries, wire limit is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("{0} trailing bytes after message payload")]
    TrailingBytes(usize),
}

/// Append-only little-endian writer used by every message encoder.
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    /// Writes a `u16` count prefix, rejecting sequences the wire cannot describe.
    pub fn put_len(&mut self, field: &'static str, len: usize) -> Result<(), CodecError> {
        let count = u16::try_from(len).map_err(|_| CodecError::TooLong {
            field,
            len,
            max: u16::MAX as usize,
        })?;
        self.put_u16(count);
        Ok(())
    }

    pub fn put_str(&mut self, field: &'static str, value: &str) -> Result<(), CodecError> {
        self.put_len(field, value.len())?;
        self.buffer.extend_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Cursor over a received buffer. Every read is bounds-checked.
#[derive(Debug)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    fn take<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], CodecError> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(CodecError::UnexpectedEof {
                field,
                needed: N,
                remaining,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        Ok(out)
    }

    pub fn get_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.take::<1>(field)?[0])
    }

    pub fn get_u16(&mut self, field: &'static str) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.take(field)?))
    }

    pub fn get_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take(field)?))
    }

    pub fn get_i32(&mut self, field: &'static str) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take(field)?))
    }

    pub fn get_i64(&mut self, field: &'static str) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.take(field)?))
    }

    pub fn get_f64(&mut self, field: &'static str) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.take(field)?))
    }

    pub fn get_bool(&mut self, field: &'static str) -> Result<bool, CodecError> {
        match self.get_u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidBool { field, value }),
        }
    }

    pub fn get_len(&mut self, field: &'static str) -> Result<usize, CodecError> {
        Ok(self.get_u16(field)? as usize)
    }

    pub fn get_str(&mut self, field: &'static str) -> Result<String, CodecError> {
        let len = self.get_len(field)?;
        let remaining = self.remaining();
        if remaining < len {
            return Err(CodecError::UnexpectedEof {
                field,
                needed: len,
                remaining,
            });
        }
        let raw = &self.bytes[self.offset..self.offset + len];
        self.offset += len;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8 { field })
    }

    /// Fails when bytes are left over after a complete message.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(CodecError::TrailingBytes(extra)),
        }
    }
}
