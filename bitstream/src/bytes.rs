//! Byte-level cursor used for outer framing.

use crate::compress::decompress_block;
use crate::error::{BitError, BitResult};

/// A byte cursor over a borrowed buffer.
///
/// Every read is bounds-checked. A failed read leaves the cursor unchanged.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Creates a reader positioned at `offset`.
    pub fn at(data: &'a [u8], offset: usize) -> BitResult<Self> {
        if offset > data.len() {
            return Err(BitError::UnexpectedEof {
                requested: offset,
                available: data.len(),
            });
        }
        Ok(Self { data, pos: offset })
    }

    /// Returns the current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` if every byte has been consumed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the unread bytes without consuming them.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn read_u8(&mut self) -> BitResult<u8> {
        let [byte] = self.read_array::<1>()?;
        Ok(byte)
    }

    pub fn read_u16_le(&mut self) -> BitResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> BitResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64_le(&mut self) -> BitResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32_le(&mut self) -> BitResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Reads a LEB128 `u32`.
    pub fn read_varu32(&mut self) -> BitResult<u32> {
        let start = self.pos;
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.pos = start;
                    return Err(err);
                }
            };
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        self.pos = start;
        Err(BitError::InvalidVarint)
    }

    /// Reads a LEB128 `u64`.
    pub fn read_varu64(&mut self) -> BitResult<u64> {
        let start = self.pos;
        let mut result = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(err) => {
                    self.pos = start;
                    return Err(err);
                }
            };
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        self.pos = start;
        Err(BitError::InvalidVarint)
    }

    /// Reads a zigzag LEB128 `i32`.
    pub fn read_vars32(&mut self) -> BitResult<i32> {
        let value = self.read_varu32()?;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    /// Reads a NUL-terminated string of at most `max_len` bytes.
    pub fn read_string(&mut self, max_len: usize) -> BitResult<String> {
        let rest = self.rest();
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            if rest.len() > max_len {
                return Err(BitError::StringTooLong { limit: max_len });
            }
            return Err(BitError::UnexpectedEof {
                requested: rest.len() + 1,
                available: rest.len(),
            });
        };
        if end > max_len {
            return Err(BitError::StringTooLong { limit: max_len });
        }
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.pos += end + 1;
        Ok(value)
    }

    /// Borrows the next `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> BitResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(BitError::UnexpectedEof {
                requested: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Skips `len` bytes.
    pub fn skip(&mut self, len: usize) -> BitResult<()> {
        self.read_slice(len).map(|_| ())
    }

    /// Splits off a bounded reader over the next `len` bytes.
    ///
    /// The outer cursor moves to the end of the block before the sub-reader
    /// is handed out, so whatever happens inside the block the outer stream
    /// stays aligned on the next record.
    pub fn sub_reader(&mut self, len: usize) -> BitResult<ByteReader<'a>> {
        self.read_slice(len).map(ByteReader::new)
    }

    /// Runs `f` over a bounded sub-reader of `len` bytes.
    ///
    /// The outer cursor ends at the block's declared end whether or not `f`
    /// succeeds.
    pub fn scoped<T, F>(&mut self, len: usize, f: F) -> BitResult<T>
    where
        F: FnOnce(&mut ByteReader<'a>) -> BitResult<T>,
    {
        let mut sub = self.sub_reader(len)?;
        f(&mut sub)
    }

    /// Reads `len` bytes holding a Snappy block and decompresses them.
    pub fn read_compressed_block(&mut self, len: usize) -> BitResult<Vec<u8>> {
        decompress_block(self.read_slice(len)?)
    }

    fn read_array<const N: usize>(&mut self) -> BitResult<[u8; N]> {
        let slice = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }
}

/// Appends a LEB128 `u32`.
pub fn put_varu32(out: &mut Vec<u8>, value: u32) {
    put_varu64(out, u64::from(value));
}

/// Appends a LEB128 `u64`.
pub fn put_varu64(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Appends a zigzag LEB128 `i32`.
pub fn put_vars32(out: &mut Vec<u8>, value: i32) {
    put_varu32(out, ((value << 1) ^ (value >> 31)) as u32);
}

/// Appends a NUL-terminated string.
pub fn put_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
}

/// Returns the encoded length of a LEB128 `u32`.
#[must_use]
pub const fn varu32_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}
