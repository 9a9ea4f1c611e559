//! Big-endian field cursor for internal record fields
//!
//! All internal record fields are big-endian regardless of the data encoding.

use crate::{CdfError, Result};

/// Sequential reader over a record's bytes
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current position from the start of the record
    pub const fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.pos.min(self.bytes.len())..]
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CdfError::ArraySizeOverflow)?;
        if end > self.bytes.len() {
            return Err(CdfError::InsufficientBuffer);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.u32().map(|v| v as i32)
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn i64(&mut self) -> Result<i64> {
        self.u64().map(|v| v as i64)
    }

    /// Fixed-size, NUL-padded name field
    pub fn name<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Read the common `(record size, record type)` prefix of any internal record
pub fn read_record_prefix(bytes: &[u8]) -> Result<(u64, i32)> {
    let mut r = FieldReader::new(bytes);
    let size = r.u64()?;
    let kind = r.i32()?;
    Ok((size, kind))
}

/// Size of the `(record size, record type)` prefix
pub const RECORD_PREFIX_SIZE: usize = 12;

/// Trim a NUL-padded name field to its text bytes
pub fn trim_name(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let mut text = &bytes[..end];
    while let Some((&last, rest)) = text.split_last() {
        if last == b' ' {
            text = rest;
        } else {
            break;
        }
    }
    text
}

/// Pack a name into a NUL-padded fixed field, truncating if necessary
pub fn pack_name<const N: usize>(name: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let len = name.len().min(N);
    out[..len].copy_from_slice(&name[..len]);
    out
}

#[cfg(feature = "alloc")]
pub use writer::FieldWriter;

#[cfg(feature = "alloc")]
mod writer {
    use alloc::vec::Vec;

    /// Append-only big-endian field writer
    #[derive(Debug, Default, Clone)]
    pub struct FieldWriter {
        buf: Vec<u8>,
    }

    impl FieldWriter {
        pub fn with_capacity(capacity: usize) -> Self {
            Self {
                buf: Vec::with_capacity(capacity),
            }
        }

        pub fn u32(&mut self, v: u32) -> &mut Self {
            self.buf.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn i32(&mut self, v: i32) -> &mut Self {
            self.buf.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn u64(&mut self, v: u64) -> &mut Self {
            self.buf.extend_from_slice(&v.to_be_bytes());
            self
        }

        pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
            self.buf.extend_from_slice(b);
            self
        }

        pub fn len(&self) -> usize {
            self.buf.len()
        }

        pub fn is_empty(&self) -> bool {
            self.buf.is_empty()
        }

        pub fn into_inner(self) -> Vec<u8> {
            self.buf
        }
    }
}
