//! Variable descriptor records (rVDR and zVDR)

use alloc::vec::Vec;

use super::constants::{record_type, vdr_flags, NAME_LEN};
use super::descriptor::normalize_offset;
use super::field::{pack_name, trim_name, FieldReader, FieldWriter};
use crate::{CdfError, DataType, Result};

/// Policy for logical records with no physical storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum SparseRecords {
    /// Missing records are an error
    None = 0,
    /// Missing records read as the pad value
    Pad = 1,
    /// Missing records repeat the nearest preceding stored record
    Previous = 2,
}

impl SparseRecords {
    pub const fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(SparseRecords::None),
            1 => Ok(SparseRecords::Pad),
            2 => Ok(SparseRecords::Previous),
            _ => Err(CdfError::InvalidRecordSize),
        }
    }

    pub const fn allows_gaps(self) -> bool {
        !matches!(self, SparseRecords::None)
    }
}

/// Which of the two variable chains a descriptor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableKind {
    /// Dimensions shared with every r-variable, from the global descriptor
    R,
    /// Dimensions carried by the descriptor itself
    Z,
}

impl VariableKind {
    pub const fn record_type(self) -> i32 {
        match self {
            VariableKind::R => record_type::RVDR,
            VariableKind::Z => record_type::ZVDR,
        }
    }
}

/// Variable descriptor record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub kind: VariableKind,
    pub next: u64,
    pub data_type: DataType,
    pub max_rec: i32,
    pub vxr_head: u64,
    pub vxr_tail: u64,
    pub flags: u32,
    pub sparse_records: SparseRecords,
    pub num_elems: i32,
    pub num: i32,
    pub cpr_offset: u64,
    pub blocking_factor: i32,
    pub name: [u8; NAME_LEN],
    /// Dimension sizes; only stored on disk for z-variables
    pub z_dim_sizes: Vec<i32>,
    pub dim_varys: Vec<bool>,
    /// Pad value bytes in the file's data encoding
    pub pad_value: Option<Vec<u8>>,
}

impl VariableRecord {
    /// Fixed part shared by r- and z-variable descriptors
    pub const FIXED_SIZE: usize = 340;

    pub fn new(kind: VariableKind, name: &str, data_type: DataType, num: i32) -> Self {
        Self {
            kind,
            next: 0,
            data_type,
            max_rec: -1,
            vxr_head: 0,
            vxr_tail: 0,
            flags: vdr_flags::RECORD_VARIANCE,
            sparse_records: SparseRecords::None,
            num_elems: 1,
            num,
            cpr_offset: u64::MAX,
            blocking_factor: 0,
            name: pack_name(name.as_bytes()),
            z_dim_sizes: Vec::new(),
            dim_varys: Vec::new(),
            pad_value: None,
        }
    }

    /// Parse a descriptor; `r_num_dims` comes from the global descriptor and
    /// is only consulted for r-variables
    pub fn from_bytes(bytes: &[u8], r_num_dims: usize) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        let tag = r.i32()?;
        let kind = match tag {
            record_type::RVDR => VariableKind::R,
            record_type::ZVDR => VariableKind::Z,
            found => {
                return Err(CdfError::UnexpectedRecordType {
                    expected: record_type::ZVDR,
                    found,
                })
            }
        };
        let next = r.u64()?;
        let data_type = DataType::from_code(r.i32()?)?;
        let max_rec = r.i32()?;
        let vxr_head = r.u64()?;
        let vxr_tail = r.u64()?;
        let flags = r.u32()?;
        let sparse_records = SparseRecords::from_u32(r.u32()?)?;
        r.skip(12)?; // rfuB, rfuC, rfuF
        let num_elems = r.i32()?;
        let num = r.i32()?;
        let cpr_offset = r.u64()?;
        let blocking_factor = r.i32()?;
        let name = r.name::<NAME_LEN>()?;

        if num_elems < 1 {
            return Err(CdfError::InvalidRecordSize);
        }

        let mut z_dim_sizes = Vec::new();
        let num_dims = match kind {
            VariableKind::Z => {
                let z_num_dims = r.i32()?;
                if z_num_dims < 0 {
                    return Err(CdfError::InvalidRecordSize);
                }
                for _ in 0..z_num_dims {
                    z_dim_sizes.push(r.i32()?);
                }
                z_num_dims as usize
            }
            VariableKind::R => r_num_dims,
        };

        let mut dim_varys = Vec::with_capacity(num_dims);
        for _ in 0..num_dims {
            dim_varys.push(r.i32()? != 0);
        }

        let pad_value = if flags & vdr_flags::PAD_VALUE != 0 {
            let len = (num_elems as usize)
                .checked_mul(data_type.size_bytes())
                .ok_or(CdfError::ArraySizeOverflow)?;
            Some(r.take(len)?.to_vec())
        } else {
            None
        };

        if record_size < r.position() as u64 {
            return Err(CdfError::InvalidRecordSize);
        }

        Ok(Self {
            kind,
            next,
            data_type,
            max_rec,
            vxr_head,
            vxr_tail,
            flags,
            sparse_records,
            num_elems,
            num,
            cpr_offset,
            blocking_factor,
            name,
            z_dim_sizes,
            dim_varys,
            pad_value,
        })
    }

    /// Encoded size of this descriptor
    pub fn size(&self) -> usize {
        let z_part = match self.kind {
            VariableKind::Z => 4 + 4 * self.z_dim_sizes.len(),
            VariableKind::R => 0,
        };
        let pad = self.pad_value.as_ref().map_or(0, Vec::len);
        Self::FIXED_SIZE + z_part + 4 * self.dim_varys.len() + pad
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = self.flags & !vdr_flags::PAD_VALUE;
        if self.pad_value.is_some() {
            flags |= vdr_flags::PAD_VALUE;
        }
        let mut w = FieldWriter::with_capacity(self.size());
        w.u64(self.size() as u64)
            .i32(self.kind.record_type())
            .u64(self.next)
            .i32(self.data_type.code())
            .i32(self.max_rec)
            .u64(self.vxr_head)
            .u64(self.vxr_tail)
            .u32(flags)
            .u32(self.sparse_records as u32)
            .i32(0)
            .i32(-1)
            .i32(-1)
            .i32(self.num_elems)
            .i32(self.num)
            .u64(self.cpr_offset)
            .i32(self.blocking_factor)
            .bytes(&self.name);
        if self.kind == VariableKind::Z {
            w.i32(self.z_dim_sizes.len() as i32);
            for &dim in &self.z_dim_sizes {
                w.i32(dim);
            }
        }
        for &vary in &self.dim_varys {
            w.i32(if vary { -1 } else { 0 });
        }
        if let Some(pad) = &self.pad_value {
            w.bytes(pad);
        }
        w.into_inner()
    }

    /// Variable name without padding
    pub fn name_bytes(&self) -> &[u8] {
        trim_name(&self.name)
    }

    pub const fn record_variance(&self) -> bool {
        self.flags & vdr_flags::RECORD_VARIANCE != 0
    }

    pub const fn compressed(&self) -> bool {
        self.flags & vdr_flags::COMPRESSION != 0
    }

    pub fn next_offset(&self) -> Option<u64> {
        normalize_offset(self.next)
    }

    pub fn index_head(&self) -> Option<u64> {
        normalize_offset(self.vxr_head)
    }

    pub fn compression_offset(&self) -> Option<u64> {
        if self.compressed() {
            normalize_offset(self.cpr_offset)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zvdr_roundtrip_with_pad() {
        let mut vdr = VariableRecord::new(VariableKind::Z, "B_gse", DataType::Real4, 2);
        vdr.z_dim_sizes = alloc::vec![3];
        vdr.dim_varys = alloc::vec![true];
        vdr.sparse_records = SparseRecords::Pad;
        vdr.flags |= vdr_flags::COMPRESSION | vdr_flags::PAD_VALUE;
        vdr.pad_value = Some((-1.0e31f32).to_be_bytes().to_vec());
        vdr.max_rec = 99;

        let bytes = vdr.to_bytes();
        assert_eq!(bytes.len(), 340 + 4 + 4 + 4 + 4);
        let parsed = VariableRecord::from_bytes(&bytes, 0).unwrap();
        assert_eq!(parsed, vdr);
        assert_eq!(parsed.name_bytes(), b"B_gse");
        assert!(parsed.compressed());
        assert!(parsed.record_variance());
    }

    #[test]
    fn test_rvdr_uses_global_dims() {
        let mut vdr = VariableRecord::new(VariableKind::R, "Counts", DataType::UInt2, 0);
        vdr.dim_varys = alloc::vec![true, false];
        let bytes = vdr.to_bytes();
        let parsed = VariableRecord::from_bytes(&bytes, 2).unwrap();
        assert_eq!(parsed.dim_varys, alloc::vec![true, false]);
        assert!(parsed.z_dim_sizes.is_empty());
        assert_eq!(parsed.compression_offset(), None);
    }
}
