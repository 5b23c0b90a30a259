#![forbid(unsafe_code)]
//! Varint encoding and a fallible cursor used by the node image codec.

pub mod var {
    //! LEB128 varints; signed values are ZigZag-mapped first.

    use crate::types::{Result, StoreError};

    const MAX_LEN: usize = 10;

    /// Appends `value` in LEB128 form (1 to 10 bytes).
    pub fn put_u64(value: u64, out: &mut Vec<u8>) {
        let mut rest = value;
        while rest >= 0x80 {
            out.push((rest as u8) | 0x80);
            rest >>= 7;
        }
        out.push(rest as u8);
    }

    /// Reads a LEB128 value at `*pos` and moves `*pos` past it.
    pub fn get_u64(src: &[u8], pos: &mut usize) -> Result<u64> {
        let mut value = 0u64;
        for idx in 0..MAX_LEN {
            let Some(&byte) = src.get(*pos + idx) else {
                return Err(StoreError::Corruption("varint truncated"));
            };
            let low = u64::from(byte & 0x7f);
            // The tenth byte may only carry the top bit of a u64.
            if idx == MAX_LEN - 1 && low > 1 {
                return Err(StoreError::Corruption("varint exceeds 64 bits"));
            }
            value |= low << (7 * idx);
            if byte < 0x80 {
                *pos += idx + 1;
                return Ok(value);
            }
        }
        Err(StoreError::Corruption("varint longer than 10 bytes"))
    }

    /// Appends `value` ZigZag-mapped, so small magnitudes stay short.
    pub fn put_i64(value: i64, out: &mut Vec<u8>) {
        put_u64(((value << 1) ^ (value >> 63)) as u64, out);
    }

    /// Inverse of [`put_i64`].
    pub fn get_i64(src: &[u8], pos: &mut usize) -> Result<i64> {
        let raw = get_u64(src, pos)?;
        Ok((raw >> 1) as i64 ^ -((raw & 1) as i64))
    }
}

pub mod buf {
    //! A slice-backed cursor that reports truncation as corruption.

    use core::fmt;

    use super::var;
    use crate::types::{Result, StoreError};

    /// Read position over an encoded payload.
    pub struct Cursor<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> Cursor<'a> {
        /// Cursor at the start of `data`.
        pub fn new(data: &'a [u8]) -> Self {
            Self { data, pos: 0 }
        }

        /// Takes the next `n` bytes.
        pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
            let end = self
                .pos
                .checked_add(n)
                .ok_or(StoreError::Corruption("cursor offset overflow"))?;
            let chunk = self
                .data
                .get(self.pos..end)
                .ok_or(StoreError::Corruption("unexpected end of payload"))?;
            self.pos = end;
            Ok(chunk)
        }

        /// Reads a single byte.
        pub fn u8(&mut self) -> Result<u8> {
            Ok(self.take(1)?[0])
        }

        /// Reads an unsigned varint.
        pub fn var_u64(&mut self) -> Result<u64> {
            var::get_u64(self.data, &mut self.pos)
        }

        /// Reads an unsigned varint that must fit a `usize`.
        pub fn var_usize(&mut self) -> Result<usize> {
            usize::try_from(self.var_u64()?)
                .map_err(|_| StoreError::Corruption("length exceeds usize"))
        }

        /// Reads a ZigZag varint.
        pub fn var_i64(&mut self) -> Result<i64> {
            var::get_i64(self.data, &mut self.pos)
        }

        /// Reads eight little-endian bytes.
        pub fn u64_le(&mut self) -> Result<u64> {
            let raw: [u8; 8] = self
                .take(8)?
                .try_into()
                .map_err(|_| StoreError::Corruption("short u64"))?;
            Ok(u64::from_le_bytes(raw))
        }

        /// Reads a varint length prefix followed by that many bytes.
        pub fn len_prefixed(&mut self) -> Result<&'a [u8]> {
            let len = self.var_usize()?;
            self.take(len)
        }

        /// Bytes left to read.
        pub fn remaining(&self) -> usize {
            self.data.len() - self.pos
        }

        /// Fails unless every byte was consumed.
        pub fn ensure_consumed(&self) -> Result<()> {
            match self.remaining() {
                0 => Ok(()),
                _ => Err(StoreError::Corruption("unexpected trailing bytes in payload")),
            }
        }
    }

    impl fmt::Debug for Cursor<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("pos", &self.pos)
                .field("len", &self.data.len())
                .finish()
        }
    }

    /// Appends a varint length prefix followed by `bytes`.
    pub fn put_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
        var::put_u64(bytes.len() as u64, out);
        out.extend(bytes);
    }
}
