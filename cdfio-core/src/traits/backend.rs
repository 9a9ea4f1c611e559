//! Storage backend trait for CDF byte sources
//!
//! This module defines the abstract interface the record engine reads
//! through. There is no shared cursor: every read is an independent view at
//! an explicit offset, so concurrent extractions never interfere.

use crate::{CdfError, Result};

/// Trait for backends that expose a CDF file's bytes
///
/// Implementations may be memory-mapped files, owned buffers or objects
/// fetched whole over HTTP.
pub trait StorageBackend {
    /// Get a slice of the underlying data
    fn as_slice(&self) -> &[u8];

    /// Get the size of the data in bytes
    fn size(&self) -> usize {
        self.as_slice().len()
    }

    /// Bounded view of `len` bytes starting at `offset`
    fn read_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let data = self.as_slice();
        let start = usize::try_from(offset).map_err(|_| CdfError::OffsetOutOfBounds)?;
        let end = start.checked_add(len).ok_or(CdfError::ArraySizeOverflow)?;
        if end > data.len() {
            return Err(CdfError::OffsetOutOfBounds);
        }
        Ok(&data[start..end])
    }

    /// View from `offset` to the end of the data
    fn tail_at(&self, offset: u64) -> Result<&[u8]> {
        let data = self.as_slice();
        let start = usize::try_from(offset).map_err(|_| CdfError::OffsetOutOfBounds)?;
        if start >= data.len() {
            return Err(CdfError::OffsetOutOfBounds);
        }
        Ok(&data[start..])
    }

    /// View of the complete internal record at `offset`, using its size field
    fn record_at(&self, offset: u64) -> Result<&[u8]> {
        let (size, _) = crate::format::read_record_prefix(self.tail_at(offset)?)?;
        let len = usize::try_from(size).map_err(|_| CdfError::InvalidRecordSize)?;
        if len < crate::format::RECORD_PREFIX_SIZE {
            return Err(CdfError::InvalidRecordSize);
        }
        self.read_at(offset, len)
    }

    /// Record-type tag of the record at `offset`
    fn record_type_at(&self, offset: u64) -> Result<i32> {
        crate::format::read_record_prefix(self.tail_at(offset)?).map(|(_, kind)| kind)
    }
}

impl StorageBackend for [u8] {
    fn as_slice(&self) -> &[u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_at_bounds() {
        let data: &[u8] = &[0, 0, 0, 0, 0, 0, 0, 16, 0, 0, 0, 7, 1, 2, 3, 4];
        assert_eq!(data.read_at(12, 4), Ok(&[1u8, 2, 3, 4][..]));
        assert_eq!(data.read_at(13, 4), Err(CdfError::OffsetOutOfBounds));
        assert_eq!(data.record_at(0).map(|r| r.len()), Ok(16));
        assert_eq!(data.record_type_at(0), Ok(7));
        assert_eq!(data.tail_at(16), Err(CdfError::OffsetOutOfBounds));
    }
}
