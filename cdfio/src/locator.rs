//! Block index locator
//!
//! Flattens a variable's index tree into an ordered list of
//! `(first, last, offset)` entries. Interior records are expanded in place,
//! so every entry reachable from an earlier slot or sibling precedes the
//! entries of a later one.

use crate::{Error, Result};
use cdfio_core::format::constants::record_type;
use cdfio_core::{CdfError, IndexRecord, IndexSlot, SparseRecords, StorageBackend};
use hashbrown::HashSet;

/// One contiguous run of stored records and the offset of its data block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockEntry {
    pub first: u64,
    /// Last record, clamped to the variable's record count
    pub last: u64,
    pub offset: u64,
}

impl BlockEntry {
    pub const fn records(&self) -> u64 {
        self.last - self.first + 1
    }

    pub const fn contains(&self, record: u64) -> bool {
        record >= self.first && record <= self.last
    }
}

enum Work {
    /// Index record to expand
    Index(u64),
    /// Slot of an already-read index record
    Slot(IndexSlot),
}

/// Walk the index tree rooted at `head` for a variable holding
/// `total_records` logical records
pub fn locate<B: StorageBackend + ?Sized>(
    source: &B,
    head: Option<u64>,
    total_records: u64,
) -> Result<Vec<BlockEntry>> {
    let mut entries = Vec::new();
    let Some(head) = head else {
        return Ok(entries);
    };

    let mut visited = HashSet::new();
    let mut stack = vec![Work::Index(head)];

    while let Some(work) = stack.pop() {
        match work {
            Work::Index(offset) => {
                if !visited.insert(offset) {
                    return Err(CdfError::ChainCycle.into());
                }
                let record = IndexRecord::from_bytes(source.record_at(offset)?)?;
                if let Some(next) = record.next_offset() {
                    stack.push(Work::Index(next));
                }
                stack.extend(record.slots.into_iter().rev().map(Work::Slot));
            }
            Work::Slot(slot) => match source.record_type_at(slot.offset)? {
                record_type::VXR => stack.push(Work::Index(slot.offset)),
                record_type::VVR | record_type::CVVR => {
                    if slot.first < 0 || slot.last < slot.first {
                        return Err(CdfError::CorruptedIndex.into());
                    }
                    let first = slot.first as u64;
                    if total_records == 0 || first > total_records - 1 {
                        continue;
                    }
                    entries.push(BlockEntry {
                        first,
                        last: (slot.last as u64).min(total_records - 1),
                        offset: slot.offset,
                    });
                }
                found => {
                    return Err(CdfError::UnexpectedRecordType {
                        expected: record_type::VVR,
                        found,
                    }
                    .into())
                }
            },
        }
    }

    Ok(entries)
}

/// Check ordering and overlap; returns the number of gaps between entries
pub fn validate(entries: &[BlockEntry]) -> Result<usize> {
    let mut gaps = usize::from(entries.first().is_some_and(|e| e.first > 0));
    for pair in entries.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.first <= prev.last {
            return Err(Error::Format(CdfError::CorruptedIndex));
        }
        if next.first > prev.last + 1 {
            gaps += 1;
        }
    }
    Ok(gaps)
}

/// Locate, validate and report gaps that the sparse policy does not allow
pub fn build_index<B: StorageBackend + ?Sized>(
    source: &B,
    name: &str,
    head: Option<u64>,
    total_records: u64,
    sparse: SparseRecords,
) -> Result<Vec<BlockEntry>> {
    let entries = locate(source, head, total_records)?;
    let gaps = validate(&entries)?;
    if gaps > 0 && !sparse.allows_gaps() {
        tracing::warn!(
            variable = name,
            gaps,
            "index has gaps but the variable has no sparse record policy; gaps read as pad values"
        );
    }
    tracing::debug!(variable = name, blocks = entries.len(), "located blocks");
    Ok(entries)
}

/// Index of the first entry whose `last` is at or after `record`
pub fn first_at_or_after(entries: &[BlockEntry], record: u64) -> usize {
    entries.partition_point(|e| e.last < record)
}

/// The entry holding the nearest stored record strictly before `record`
pub fn preceding(entries: &[BlockEntry], record: u64) -> Option<(BlockEntry, u64)> {
    let idx = entries.partition_point(|e| e.first < record);
    let entry = *entries.get(idx.checked_sub(1)?)?;
    Some((entry, entry.last.min(record - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdfio_core::DataBlockHeader;

    fn vxr(next: u64, slots: &[(i32, i32, u64)]) -> Vec<u8> {
        let slots = slots
            .iter()
            .map(|&(first, last, offset)| IndexSlot { first, last, offset })
            .collect();
        let mut record = IndexRecord::with_slots(slots, 4);
        record.next = next;
        record.to_bytes()
    }

    fn place(file: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
        if file.len() < offset + bytes.len() {
            file.resize(offset + bytes.len(), 0);
        }
        file[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn vvr(records: usize) -> Vec<u8> {
        let mut out = DataBlockHeader::raw_header(records as u64 * 4).to_vec();
        out.resize(out.len() + records * 4, 0);
        out
    }

    #[test]
    fn test_nested_tree_preserves_order() {
        // root VXR @100: [0..9 -> child VXR @300], [10..19 -> VVR @600]; sibling @200: [20..29 -> VVR @700]
        // child VXR @300: [0..4 -> VVR @800], [5..9 -> VVR @900]
        let mut file = Vec::new();
        place(&mut file, 100, &vxr(200, &[(0, 9, 300), (10, 19, 600)]));
        place(&mut file, 200, &vxr(0, &[(20, 29, 700)]));
        place(&mut file, 300, &vxr(0, &[(0, 4, 800), (5, 9, 900)]));
        place(&mut file, 600, &vvr(10));
        place(&mut file, 700, &vvr(10));
        place(&mut file, 800, &vvr(5));
        place(&mut file, 900, &vvr(5));

        let entries = locate(file.as_slice(), Some(100), 30).unwrap();
        let triples: Vec<_> = entries.iter().map(|e| (e.first, e.last, e.offset)).collect();
        assert_eq!(
            triples,
            vec![(0, 4, 800), (5, 9, 900), (10, 19, 600), (20, 29, 700)]
        );
        assert_eq!(validate(&entries).unwrap(), 0);
    }

    #[test]
    fn test_clamp_and_drop_past_total() {
        let mut file = Vec::new();
        place(&mut file, 100, &vxr(0, &[(0, 9, 400), (10, 19, 500)]));
        place(&mut file, 400, &vvr(10));
        place(&mut file, 500, &vvr(10));

        let entries = locate(file.as_slice(), Some(100), 8).unwrap();
        assert_eq!(entries, vec![BlockEntry { first: 0, last: 7, offset: 400 }]);
        assert!(locate(file.as_slice(), Some(100), 0).unwrap().is_empty());
        assert!(locate(file.as_slice(), None, 8).unwrap().is_empty());
    }

    #[test]
    fn test_cycle_is_structural_error() {
        let mut file = Vec::new();
        place(&mut file, 100, &vxr(200, &[]));
        place(&mut file, 200, &vxr(100, &[]));
        assert!(matches!(
            locate(file.as_slice(), Some(100), 10),
            Err(Error::Format(CdfError::ChainCycle))
        ));
    }

    #[test]
    fn test_unexpected_leaf_type() {
        let mut file = Vec::new();
        place(&mut file, 100, &vxr(0, &[(0, 0, 300)]));
        // a GDR tag where a block should be
        let mut bogus = vec![0u8; 16];
        bogus[..8].copy_from_slice(&16u64.to_be_bytes());
        bogus[8..12].copy_from_slice(&2i32.to_be_bytes());
        place(&mut file, 300, &bogus);
        assert!(matches!(
            locate(file.as_slice(), Some(100), 1),
            Err(Error::Format(CdfError::UnexpectedRecordType { found: 2, .. }))
        ));
    }

    #[test]
    fn test_validate_overlap_and_gaps() {
        let e = |first, last| BlockEntry { first, last, offset: 0 };
        assert_eq!(validate(&[e(0, 49), e(60, 99)]).unwrap(), 1);
        assert_eq!(validate(&[e(5, 9)]).unwrap(), 1);
        assert!(validate(&[e(0, 49), e(49, 99)]).is_err());
        assert!(validate(&[e(10, 19), e(0, 9)]).is_err());
    }

    #[test]
    fn test_search_helpers() {
        let entries = [
            BlockEntry { first: 0, last: 49, offset: 1 },
            BlockEntry { first: 60, last: 99, offset: 2 },
        ];
        assert_eq!(first_at_or_after(&entries, 45), 0);
        assert_eq!(first_at_or_after(&entries, 50), 1);
        assert_eq!(first_at_or_after(&entries, 100), 2);
        assert_eq!(preceding(&entries, 55), Some((entries[0], 49)));
        assert_eq!(preceding(&entries, 70), Some((entries[1], 69)));
        assert_eq!(preceding(&entries, 0), None);
        assert_eq!(preceding(&entries, 150), Some((entries[1], 99)));
    }
}
