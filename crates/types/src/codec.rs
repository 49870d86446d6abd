//! Binary codec used by the destination chain for contract storage and
//! transaction bodies.
//!
//! Integers are little-endian. Variable-length integers use the one/three/
//! five/nine byte layout (`< 0xfd`, `0xfd + u16`, `0xfe + u32`, `0xff + u64`)
//! and must be minimally encoded.

/// Errors raised while decoding destination-chain bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("non-canonical varint encoding of {0}")]
    NonCanonicalVarUint(u64),
    #[error("value {value} does not fit into {target}")]
    Overflow { value: u64, target: &'static str },
    #[error("invalid utf-8 string: {0}")]
    InvalidUtf8(String),
    #[error("invalid {field} value {value}")]
    InvalidValue { field: &'static str, value: u64 },
    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),
}

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct Source<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Source<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail if any input is left unread.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    pub fn next_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn next_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.next_bytes(N)?);
        Ok(out)
    }

    pub fn next_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.next_array::<1>()?[0])
    }

    pub fn next_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.next_array()?))
    }

    pub fn next_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.next_array()?))
    }

    pub fn next_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.next_array()?))
    }

    pub fn next_var_uint(&mut self) -> Result<u64, CodecError> {
        let (value, min) = match self.next_u8()? {
            0xfd => (u64::from(self.next_u16()?), 0xfd),
            0xfe => (u64::from(self.next_u32()?), 0x1_0000),
            0xff => (self.next_u64()?, 0x1_0000_0000),
            small => return Ok(u64::from(small)),
        };
        if value < min {
            return Err(CodecError::NonCanonicalVarUint(value));
        }
        Ok(value)
    }

    pub fn next_var_bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.next_var_uint()?;
        let len = usize::try_from(len).map_err(|_| CodecError::Overflow {
            value: len,
            target: "usize",
        })?;
        self.next_bytes(len)
    }

    pub fn next_string(&mut self) -> Result<String, CodecError> {
        let raw = self.next_var_bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|err| CodecError::InvalidUtf8(err.to_string()))
    }
}

/// Append-only byte buffer, the encoding counterpart of [`Source`].
#[derive(Debug, Default, Clone)]
pub struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_var_uint(&mut self, value: u64) -> &mut Self {
        match value {
            v if v < 0xfd => self.write_u8(v as u8),
            v if v <= u64::from(u16::MAX) => self.write_u8(0xfd).write_u16(v as u16),
            v if v <= u64::from(u32::MAX) => self.write_u8(0xfe).write_u32(v as u32),
            v => self.write_u8(0xff).write_u64(v),
        }
    }

    pub fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_var_uint(bytes.len() as u64).write_bytes(bytes)
    }

    pub fn write_string(&mut self, value: &str) -> &mut Self {
        self.write_var_bytes(value.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
