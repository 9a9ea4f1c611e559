//! Attribute descriptor records (ADR) and attribute entry records (AEDR)

use alloc::vec::Vec;

use super::constants::{record_type, NAME_LEN};
use super::descriptor::{expect_type, normalize_offset};
use super::field::{pack_name, trim_name, FieldReader, FieldWriter};
use crate::{CdfError, DataType, Result};

/// Attribute scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeScope {
    Global,
    Variable,
}

impl AttributeScope {
    /// Scope codes 3 and 4 are the "assumed" forms of 1 and 2
    pub const fn from_i32(value: i32) -> Result<Self> {
        match value {
            1 | 3 => Ok(AttributeScope::Global),
            2 | 4 => Ok(AttributeScope::Variable),
            _ => Err(CdfError::InvalidRecordSize),
        }
    }

    pub const fn to_i32(self) -> i32 {
        match self {
            AttributeScope::Global => 1,
            AttributeScope::Variable => 2,
        }
    }
}

/// Attribute descriptor record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub next: u64,
    pub agr_edr_head: u64,
    pub scope: AttributeScope,
    pub num: i32,
    pub num_gr_entries: i32,
    pub max_gr_entry: i32,
    pub az_edr_head: u64,
    pub num_z_entries: i32,
    pub max_z_entry: i32,
    pub name: [u8; NAME_LEN],
}

impl AttributeRecord {
    pub const SIZE: usize = 324;

    pub fn new(name: &str, scope: AttributeScope, num: i32) -> Self {
        Self {
            next: 0,
            agr_edr_head: 0,
            scope,
            num,
            num_gr_entries: 0,
            max_gr_entry: -1,
            az_edr_head: 0,
            num_z_entries: 0,
            max_z_entry: -1,
            name: pack_name(name.as_bytes()),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        expect_type(r.i32()?, record_type::ADR)?;
        let next = r.u64()?;
        let agr_edr_head = r.u64()?;
        let scope = AttributeScope::from_i32(r.i32()?)?;
        let num = r.i32()?;
        let num_gr_entries = r.i32()?;
        let max_gr_entry = r.i32()?;
        r.skip(4)?; // rfuA
        let az_edr_head = r.u64()?;
        let num_z_entries = r.i32()?;
        let max_z_entry = r.i32()?;
        r.skip(4)?; // rfuE
        let name = r.name::<NAME_LEN>()?;
        if record_size < Self::SIZE as u64 {
            return Err(CdfError::InvalidRecordSize);
        }
        Ok(Self {
            next,
            agr_edr_head,
            scope,
            num,
            num_gr_entries,
            max_gr_entry,
            az_edr_head,
            num_z_entries,
            max_z_entry,
            name,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(Self::SIZE);
        w.u64(Self::SIZE as u64)
            .i32(record_type::ADR)
            .u64(self.next)
            .u64(self.agr_edr_head)
            .i32(self.scope.to_i32())
            .i32(self.num)
            .i32(self.num_gr_entries)
            .i32(self.max_gr_entry)
            .i32(0)
            .u64(self.az_edr_head)
            .i32(self.num_z_entries)
            .i32(self.max_z_entry)
            .i32(-1)
            .bytes(&self.name);
        w.into_inner()
    }

    pub fn name_bytes(&self) -> &[u8] {
        trim_name(&self.name)
    }

    pub fn next_offset(&self) -> Option<u64> {
        normalize_offset(self.next)
    }
}

/// Which entry chain an AEDR belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryChain {
    /// Global entries, or r-variable entries of a variable-scope attribute
    Gr,
    /// z-variable entries of a variable-scope attribute
    Z,
}

impl EntryChain {
    pub const fn record_type(self) -> i32 {
        match self {
            EntryChain::Gr => record_type::AGR_EDR,
            EntryChain::Z => record_type::AZ_EDR,
        }
    }
}

/// Attribute entry descriptor record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntryRecord {
    pub chain: EntryChain,
    pub next: u64,
    pub attr_num: i32,
    pub data_type: DataType,
    /// Entry number: global entry index or variable number
    pub num: i32,
    pub num_elems: i32,
    /// Number of strings joined in a CHAR entry, zero otherwise
    pub num_strings: i32,
    /// Value bytes in the file's data encoding
    pub value: Vec<u8>,
}

impl AttributeEntryRecord {
    pub const HEADER_SIZE: usize = 56;

    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.value.len()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        r.u64()?;
        let chain = match r.i32()? {
            record_type::AGR_EDR => EntryChain::Gr,
            record_type::AZ_EDR => EntryChain::Z,
            found => {
                return Err(CdfError::UnexpectedRecordType {
                    expected: record_type::AGR_EDR,
                    found,
                })
            }
        };
        let next = r.u64()?;
        let attr_num = r.i32()?;
        let data_type = DataType::from_code(r.i32()?)?;
        let num = r.i32()?;
        let num_elems = r.i32()?;
        let num_strings = r.i32()?;
        r.skip(16)?; // rfB, rfC, rfD, rfE
        if num_elems < 0 {
            return Err(CdfError::InvalidRecordSize);
        }
        let len = (num_elems as usize)
            .checked_mul(data_type.size_bytes())
            .ok_or(CdfError::ArraySizeOverflow)?;
        let value = r.take(len)?.to_vec();
        Ok(Self {
            chain,
            next,
            attr_num,
            data_type,
            num,
            num_elems,
            num_strings,
            value,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = FieldWriter::with_capacity(self.size());
        w.u64(self.size() as u64)
            .i32(self.chain.record_type())
            .u64(self.next)
            .i32(self.attr_num)
            .i32(self.data_type.code())
            .i32(self.num)
            .i32(self.num_elems)
            .i32(self.num_strings)
            .i32(0)
            .i32(0)
            .i32(-1)
            .i32(-1)
            .bytes(&self.value);
        w.into_inner()
    }

    pub fn next_offset(&self) -> Option<u64> {
        normalize_offset(self.next)
    }
}
