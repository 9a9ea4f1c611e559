//! Data block records (VVR, CVVR) and compression records (CPR, CCR)

use alloc::vec::Vec;

use super::constants::{compression, record_type};
use super::descriptor::expect_type;
use super::field::{FieldReader, FieldWriter};
use crate::{CdfError, Result};

/// Physical form of a data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    /// Variable values record: payload stored as-is
    Raw,
    /// Compressed variable values record: gzip payload with explicit length
    Compressed,
}

/// Parsed header of a VVR or CVVR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlockHeader {
    pub kind: BlockKind,
    pub record_size: u64,
    /// Payload start, relative to the start of the record
    pub payload_start: usize,
    /// Payload length in bytes (compressed length for CVVR)
    pub payload_len: u64,
}

impl DataBlockHeader {
    pub const RAW_HEADER_SIZE: usize = 12;
    pub const COMPRESSED_HEADER_SIZE: usize = 24;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        match r.i32()? {
            record_type::VVR => {
                let payload_len = record_size
                    .checked_sub(Self::RAW_HEADER_SIZE as u64)
                    .ok_or(CdfError::InvalidRecordSize)?;
                Ok(Self {
                    kind: BlockKind::Raw,
                    record_size,
                    payload_start: Self::RAW_HEADER_SIZE,
                    payload_len,
                })
            }
            record_type::CVVR => {
                r.skip(4)?; // rfuA
                let payload_len = r.u64()?;
                let needed = payload_len
                    .checked_add(Self::COMPRESSED_HEADER_SIZE as u64)
                    .ok_or(CdfError::ArraySizeOverflow)?;
                if record_size < needed {
                    return Err(CdfError::InvalidRecordSize);
                }
                Ok(Self {
                    kind: BlockKind::Compressed,
                    record_size,
                    payload_start: Self::COMPRESSED_HEADER_SIZE,
                    payload_len,
                })
            }
            found => Err(CdfError::UnexpectedRecordType {
                expected: record_type::VVR,
                found,
            }),
        }
    }

    /// Header bytes for a raw block carrying `payload_len` bytes
    pub fn raw_header(payload_len: u64) -> [u8; Self::RAW_HEADER_SIZE] {
        let mut out = [0u8; Self::RAW_HEADER_SIZE];
        out[..8].copy_from_slice(&(payload_len + Self::RAW_HEADER_SIZE as u64).to_be_bytes());
        out[8..12].copy_from_slice(&record_type::VVR.to_be_bytes());
        out
    }

    /// Header bytes for a compressed block carrying `compressed_len` bytes
    pub fn compressed_header(compressed_len: u64) -> [u8; Self::COMPRESSED_HEADER_SIZE] {
        let mut out = [0u8; Self::COMPRESSED_HEADER_SIZE];
        out[..8].copy_from_slice(
            &(compressed_len + Self::COMPRESSED_HEADER_SIZE as u64).to_be_bytes(),
        );
        out[8..12].copy_from_slice(&record_type::CVVR.to_be_bytes());
        out[16..24].copy_from_slice(&compressed_len.to_be_bytes());
        out
    }
}

/// Compression parameters record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRecord {
    pub c_type: u32,
    pub params: Vec<u32>,
}

impl CompressionRecord {
    pub const HEADER_SIZE: usize = 24;

    pub fn gzip(level: u32) -> Self {
        Self {
            c_type: compression::GZIP,
            params: alloc::vec![level],
        }
    }

    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + 4 * self.params.len()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        r.u64()?;
        expect_type(r.i32()?, record_type::CPR)?;
        let c_type = r.u32()?;
        r.skip(4)?; // rfuA
        let count = r.u32()? as usize;
        let mut params = Vec::with_capacity(count.min(16));
        for _ in 0..count {
            params.push(r.u32()?);
        }
        Ok(Self { c_type, params })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(self.size());
        w.u64(self.size() as u64)
            .i32(record_type::CPR)
            .u32(self.c_type)
            .u32(0)
            .u32(self.params.len() as u32);
        for &p in &self.params {
            w.u32(p);
        }
        w.into_inner()
    }

    /// Reject algorithms other than gzip
    pub fn ensure_gzip(&self) -> Result<u32> {
        if self.c_type != compression::GZIP {
            return Err(CdfError::UnsupportedCompression(self.c_type));
        }
        Ok(self.params.first().copied().unwrap_or(6))
    }
}

/// Compressed-file record heading a whole-file compressed CDF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedFileRecord {
    pub record_size: u64,
    pub cpr_offset: u64,
    /// Length of the uncompressed file without its magic numbers
    pub uncompressed_size: u64,
}

impl CompressedFileRecord {
    pub const HEADER_SIZE: usize = 32;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        expect_type(r.i32()?, record_type::CCR)?;
        let cpr_offset = r.u64()?;
        let uncompressed_size = r.u64()?;
        r.skip(4)?; // rfuA
        if record_size < Self::HEADER_SIZE as u64 {
            return Err(CdfError::InvalidRecordSize);
        }
        Ok(Self {
            record_size,
            cpr_offset,
            uncompressed_size,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(Self::HEADER_SIZE);
        w.u64(self.record_size)
            .i32(record_type::CCR)
            .u64(self.cpr_offset)
            .u64(self.uncompressed_size)
            .i32(0);
        w.into_inner()
    }

    /// Length of the compressed payload following the header
    pub const fn payload_len(&self) -> u64 {
        self.record_size - Self::HEADER_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_headers() {
        let raw = DataBlockHeader::raw_header(400);
        let parsed = DataBlockHeader::from_bytes(&raw).unwrap();
        assert_eq!(parsed.kind, BlockKind::Raw);
        assert_eq!(parsed.payload_len, 400);
        assert_eq!(parsed.payload_start, 12);

        let compressed = DataBlockHeader::compressed_header(77);
        let parsed = DataBlockHeader::from_bytes(&compressed).unwrap();
        assert_eq!(parsed.kind, BlockKind::Compressed);
        assert_eq!(parsed.payload_len, 77);
        assert_eq!(parsed.record_size, 101);
    }

    #[test]
    fn test_block_header_rejects_index_record() {
        let mut bytes = DataBlockHeader::raw_header(4);
        bytes[11] = record_type::VXR as u8;
        assert!(matches!(
            DataBlockHeader::from_bytes(&bytes),
            Err(CdfError::UnexpectedRecordType { found: 6, .. })
        ));
    }

    #[test]
    fn test_cpr_roundtrip() {
        let cpr = CompressionRecord::gzip(6);
        let parsed = CompressionRecord::from_bytes(&cpr.to_bytes()).unwrap();
        assert_eq!(parsed, cpr);
        assert_eq!(parsed.ensure_gzip(), Ok(6));
        let rle = CompressionRecord { c_type: 1, params: alloc::vec![0] };
        assert_eq!(rle.ensure_gzip(), Err(CdfError::UnsupportedCompression(1)));
    }
}
