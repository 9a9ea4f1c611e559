//! Variable index records (VXR)
//!
//! A VXR holds up to `Nentries` slots of `(first, last, offset)`; only the
//! first `NusedEntries` are meaningful. An offset references either a child
//! VXR or a data block. Sibling VXRs are chained through `next`.

use alloc::vec::Vec;

use super::constants::record_type;
use super::descriptor::{expect_type, normalize_offset};
use super::field::{FieldReader, FieldWriter};
use crate::{CdfError, Result};

/// One slot of an index record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSlot {
    pub first: i32,
    pub last: i32,
    pub offset: u64,
}

/// Variable index record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub next: u64,
    /// Allocated slot count; may exceed `slots.len()`
    pub capacity: usize,
    /// Used slots, in record order
    pub slots: Vec<IndexSlot>,
}

impl IndexRecord {
    /// Fixed header before the three slot arrays
    pub const HEADER_SIZE: usize = 28;

    pub fn with_slots(slots: Vec<IndexSlot>, capacity: usize) -> Self {
        Self {
            next: 0,
            capacity: capacity.max(slots.len()),
            slots,
        }
    }

    pub const fn size_for(capacity: usize) -> usize {
        Self::HEADER_SIZE + 16 * capacity
    }

    pub fn size(&self) -> usize {
        Self::size_for(self.capacity)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes);
        let record_size = r.u64()?;
        expect_type(r.i32()?, record_type::VXR)?;
        let next = r.u64()?;
        let n_entries = r.i32()?;
        let n_used = r.i32()?;
        if n_entries < 0 || n_used < 0 || n_used > n_entries {
            return Err(CdfError::InvalidRecordSize);
        }
        let capacity = n_entries as usize;
        let used = n_used as usize;
        if record_size < Self::size_for(capacity) as u64 {
            return Err(CdfError::InvalidRecordSize);
        }

        let firsts = r.take(4 * capacity)?;
        let lasts = r.take(4 * capacity)?;
        let offsets = r.take(8 * capacity)?;

        let mut slots = Vec::with_capacity(used);
        for i in 0..used {
            let mut fr = FieldReader::new(&firsts[4 * i..]);
            let mut lr = FieldReader::new(&lasts[4 * i..]);
            let mut or = FieldReader::new(&offsets[8 * i..]);
            slots.push(IndexSlot {
                first: fr.i32()?,
                last: lr.i32()?,
                offset: or.u64()?,
            });
        }

        Ok(Self {
            next,
            capacity,
            slots,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = self.capacity.max(self.slots.len());
        let mut w = FieldWriter::with_capacity(Self::size_for(capacity));
        w.u64(Self::size_for(capacity) as u64)
            .i32(record_type::VXR)
            .u64(self.next)
            .i32(capacity as i32)
            .i32(self.slots.len() as i32);
        let unused = capacity - self.slots.len();
        for slot in &self.slots {
            w.i32(slot.first);
        }
        for _ in 0..unused {
            w.i32(-1);
        }
        for slot in &self.slots {
            w.i32(slot.last);
        }
        for _ in 0..unused {
            w.i32(-1);
        }
        for slot in &self.slots {
            w.u64(slot.offset);
        }
        for _ in 0..unused {
            w.u64(u64::MAX);
        }
        w.into_inner()
    }

    pub fn next_offset(&self) -> Option<u64> {
        normalize_offset(self.next)
    }

    /// Record span covered by the used slots
    pub fn span(&self) -> Option<(i32, i32)> {
        let first = self.slots.first()?.first;
        let last = self.slots.iter().map(|s| s.last).max()?;
        Some((first, last))
    }
}
