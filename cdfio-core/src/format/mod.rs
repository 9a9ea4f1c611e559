//! Binary format definitions for the CDF v3 internal layout
//!
//! This module contains pure record definitions for the CDF wire format.
//! No I/O operations - only parsing from and serializing to byte slices.

pub mod constants;
pub mod descriptor;
pub mod field;

#[cfg(feature = "alloc")]
pub mod attribute;
#[cfg(feature = "alloc")]
pub mod block;
#[cfg(feature = "alloc")]
pub mod index;
#[cfg(feature = "alloc")]
pub mod variable;

pub use descriptor::{normalize_offset, CdfDescriptor};
pub use field::{read_record_prefix, FieldReader, RECORD_PREFIX_SIZE};

#[cfg(feature = "alloc")]
pub use attribute::{AttributeEntryRecord, AttributeRecord, AttributeScope, EntryChain};
#[cfg(feature = "alloc")]
pub use block::{BlockKind, CompressedFileRecord, CompressionRecord, DataBlockHeader};
#[cfg(feature = "alloc")]
pub use descriptor::GlobalDescriptor;
#[cfg(feature = "alloc")]
pub use field::FieldWriter;
#[cfg(feature = "alloc")]
pub use index::{IndexRecord, IndexSlot};
#[cfg(feature = "alloc")]
pub use variable::{SparseRecords, VariableKind, VariableRecord};

/// Check the two leading magic words; returns whether the file body is
/// whole-file compressed
pub fn check_magic(bytes: &[u8]) -> crate::Result<bool> {
    let mut r = FieldReader::new(bytes);
    let first = r.u32().map_err(|_| crate::CdfError::InvalidMagic)?;
    let second = r.u32().map_err(|_| crate::CdfError::InvalidMagic)?;
    if first != constants::MAGIC_V3 {
        // Version 2.x files start with 0xCDF26002 or 0x0000FFFF.
        if first == 0xCDF2_6002 || first == 0x0000_FFFF {
            return Err(crate::CdfError::UnsupportedVersion);
        }
        return Err(crate::CdfError::InvalidMagic);
    }
    match second {
        constants::MAGIC_UNCOMPRESSED => Ok(false),
        constants::MAGIC_COMPRESSED => Ok(true),
        _ => Err(crate::CdfError::InvalidMagic),
    }
}

/// Magic words of an uncompressed version 3 file
pub const fn magic_bytes() -> [u8; constants::MAGIC_SIZE] {
    let a = constants::MAGIC_V3.to_be_bytes();
    let b = constants::MAGIC_UNCOMPRESSED.to_be_bytes();
    [a[0], a[1], a[2], a[3], b[0], b[1], b[2], b[3]]
}
