//! CDF descriptor record (CDR) and global descriptor record (GDR)
//!
//! The CDR sits at a fixed offset right after the magic numbers; it carries
//! the encoding, majority and checksum flags and points at the GDR, which in
//! turn heads the variable and attribute chains.

use super::constants::{cdr_flags, record_type, COPYRIGHT_LEN, NULL_OFFSET_ALT};
use super::field::FieldReader;
use crate::{ByteOrder, CdfError, Encoding, Majority, Result};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Check the record-type tag of a parsed prefix
pub(crate) fn expect_type(found: i32, expected: i32) -> Result<()> {
    if found != expected {
        return Err(CdfError::UnexpectedRecordType { expected, found });
    }
    Ok(())
}

/// Normalize "no record" pointers; writers use both 0 and -1
pub const fn normalize_offset(offset: u64) -> Option<u64> {
    if offset == 0 || offset == NULL_OFFSET_ALT {
        None
    } else {
        Some(offset)
    }
}

/// CDF descriptor record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdfDescriptor {
    pub record_size: u64,
    pub gdr_offset: u64,
    pub version: u32,
    pub release: u32,
    pub encoding: u32,
    pub flags: u32,
    pub increment: u32,
    pub identifier: i32,
    pub copyright: [u8; COPYRIGHT_LEN],
}

impl CdfDescriptor {
    /// Size of the record in bytes
    pub const SIZE: usize = 312;

    pub const fn new(encoding: Encoding, majority: Majority) -> Self {
        let mut flags = cdr_flags::SINGLE_FILE;
        if matches!(majority, Majority::Row) {
            flags |= cdr_flags::ROW_MAJORITY;
        }
        let mut copyright = [0u8; COPYRIGHT_LEN];
        let text = b"Common Data Format (CDF)\n";
        let mut i = 0;
        while i < text.len() {
            copyright[i] = text[i];
            i += 1;
        }
        Self {
            record_size: Self::SIZE as u64,
            gdr_offset: 0,
            version: super::constants::WRITE_VERSION,
            release: super::constants::WRITE_RELEASE,
            encoding: encoding.to_u32(),
            flags,
            increment: super::constants::WRITE_INCREMENT,
            identifier: 2,
            copyright,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        expect_type(r.i32()?, record_type::CDR)?;
        let gdr_offset = r.u64()?;
        let version = r.u32()?;
        let release = r.u32()?;
        let encoding = r.u32()?;
        let flags = r.u32()?;
        r.skip(8)?; // rfuA, rfuB
        let increment = r.u32()?;
        let identifier = r.i32()?;
        r.skip(4)?; // rfuE
        let copyright = r.name::<COPYRIGHT_LEN>()?;

        if version != 3 {
            return Err(CdfError::UnsupportedVersion);
        }
        if record_size < Self::SIZE as u64 {
            return Err(CdfError::InvalidRecordSize);
        }

        Ok(Self {
            record_size,
            gdr_offset,
            version,
            release,
            encoding,
            flags,
            increment,
            identifier,
            copyright,
        })
    }

    #[cfg(feature = "alloc")]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = super::field::FieldWriter::with_capacity(Self::SIZE);
        w.u64(Self::SIZE as u64)
            .i32(record_type::CDR)
            .u64(self.gdr_offset)
            .u32(self.version)
            .u32(self.release)
            .u32(self.encoding)
            .u32(self.flags)
            .u32(0)
            .u32(0)
            .u32(self.increment)
            .i32(self.identifier)
            .i32(-1)
            .bytes(&self.copyright);
        w.into_inner()
    }

    pub fn encoding(&self) -> Result<Encoding> {
        Encoding::from_u32(self.encoding)
    }

    pub fn byte_order(&self) -> Result<ByteOrder> {
        self.encoding().map(Encoding::byte_order)
    }

    pub const fn majority(&self) -> Majority {
        if self.flags & cdr_flags::ROW_MAJORITY != 0 {
            Majority::Row
        } else {
            Majority::Column
        }
    }

    /// Whether a trailing MD5 digest follows the last record
    pub const fn has_md5_checksum(&self) -> bool {
        self.flags & cdr_flags::CHECKSUM != 0 && self.flags & cdr_flags::MD5_CHECKSUM != 0
    }

    pub fn set_md5_checksum(&mut self, enabled: bool) {
        let bits = cdr_flags::CHECKSUM | cdr_flags::MD5_CHECKSUM;
        if enabled {
            self.flags |= bits;
        } else {
            self.flags &= !bits;
        }
    }
}

/// Global descriptor record
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDescriptor {
    pub record_size: u64,
    pub rvdr_head: u64,
    pub zvdr_head: u64,
    pub adr_head: u64,
    pub eof: u64,
    pub num_rvars: i32,
    pub num_attrs: i32,
    pub r_max_rec: i32,
    pub num_zvars: i32,
    pub uir_head: u64,
    pub leap_second_last_updated: i32,
    pub r_dim_sizes: Vec<i32>,
}

#[cfg(feature = "alloc")]
impl GlobalDescriptor {
    /// Size of the fixed part of the record
    pub const FIXED_SIZE: usize = 84;

    pub fn new() -> Self {
        Self {
            record_size: Self::FIXED_SIZE as u64,
            rvdr_head: 0,
            zvdr_head: 0,
            adr_head: 0,
            eof: 0,
            num_rvars: 0,
            num_attrs: 0,
            r_max_rec: -1,
            num_zvars: 0,
            uir_head: 0,
            leap_second_last_updated: super::constants::LEAP_SECOND_LAST_UPDATED,
            r_dim_sizes: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        Self::FIXED_SIZE + 4 * self.r_dim_sizes.len()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        expect_type(r.i32()?, record_type::GDR)?;
        let rvdr_head = r.u64()?;
        let zvdr_head = r.u64()?;
        let adr_head = r.u64()?;
        let eof = r.u64()?;
        let num_rvars = r.i32()?;
        let num_attrs = r.i32()?;
        let r_max_rec = r.i32()?;
        let r_num_dims = r.i32()?;
        let num_zvars = r.i32()?;
        let uir_head = r.u64()?;
        r.skip(4)?; // rfuC
        let leap_second_last_updated = r.i32()?;
        r.skip(4)?; // rfuE

        if r_num_dims < 0 || num_rvars < 0 || num_zvars < 0 || num_attrs < 0 {
            return Err(CdfError::InvalidRecordSize);
        }
        let mut r_dim_sizes = Vec::with_capacity(r_num_dims as usize);
        for _ in 0..r_num_dims {
            r_dim_sizes.push(r.i32()?);
        }
        if record_size < r.position() as u64 {
            return Err(CdfError::InvalidRecordSize);
        }

        Ok(Self {
            record_size,
            rvdr_head,
            zvdr_head,
            adr_head,
            eof,
            num_rvars,
            num_attrs,
            r_max_rec,
            num_zvars,
            uir_head,
            leap_second_last_updated,
            r_dim_sizes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = super::field::FieldWriter::with_capacity(self.size());
        w.u64(self.size() as u64)
            .i32(record_type::GDR)
            .u64(self.rvdr_head)
            .u64(self.zvdr_head)
            .u64(self.adr_head)
            .u64(self.eof)
            .i32(self.num_rvars)
            .i32(self.num_attrs)
            .i32(self.r_max_rec)
            .i32(self.r_dim_sizes.len() as i32)
            .i32(self.num_zvars)
            .u64(self.uir_head)
            .i32(0)
            .i32(self.leap_second_last_updated)
            .i32(-1);
        for &dim in &self.r_dim_sizes {
            w.i32(dim);
        }
        w.into_inner()
    }
}

#[cfg(feature = "alloc")]
impl Default for GlobalDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;

    #[test]
    fn test_cdr_roundtrip() {
        let mut cdr = CdfDescriptor::new(Encoding::IbmPc, Majority::Row);
        cdr.gdr_offset = 320;
        cdr.set_md5_checksum(true);
        let bytes = cdr.to_bytes();
        assert_eq!(bytes.len(), CdfDescriptor::SIZE);
        let parsed = CdfDescriptor::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, cdr);
        assert_eq!(parsed.majority(), Majority::Row);
        assert_eq!(parsed.byte_order(), Ok(ByteOrder::Little));
        assert!(parsed.has_md5_checksum());
    }

    #[test]
    fn test_cdr_rejects_wrong_type_and_version() {
        let cdr = CdfDescriptor::new(Encoding::Network, Majority::Column);
        let mut bytes = cdr.to_bytes();
        bytes[11] = 2;
        assert_eq!(
            CdfDescriptor::from_bytes(&bytes),
            Err(CdfError::UnexpectedRecordType { expected: 1, found: 2 })
        );
        let mut bytes = cdr.to_bytes();
        bytes[23] = 2;
        assert_eq!(CdfDescriptor::from_bytes(&bytes), Err(CdfError::UnsupportedVersion));
    }

    #[test]
    fn test_gdr_roundtrip_with_rdims() {
        let mut gdr = GlobalDescriptor::new();
        gdr.zvdr_head = 1000;
        gdr.num_zvars = 3;
        gdr.r_dim_sizes = alloc::vec![3, 4];
        let bytes = gdr.to_bytes();
        assert_eq!(bytes.len(), 92);
        let parsed = GlobalDescriptor::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.r_dim_sizes, alloc::vec![3, 4]);
        assert_eq!(parsed.record_size, 92);
        assert_eq!(parsed.zvdr_head, 1000);
        assert_eq!(normalize_offset(parsed.rvdr_head), None);
    }
}
