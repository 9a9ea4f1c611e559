//! Block walk
//!
//! Produces the records of a resolved range in order: stored records are
//! decoded from their blocks, records in gaps are synthesized from the pad
//! value or the most recent stored record.

use super::decode::Decoder;
use crate::locator::{first_at_or_after, preceding, BlockEntry};
use crate::variable::Variable;
use crate::Result;
use cdfio_core::{BlockKind, CdfError, DataBlockHeader, RecordRange, SparseRecords, StorageBackend};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;

/// Stored records of one block, decompressed when needed
pub(crate) struct BlockPayload<'a> {
    pub bytes: Cow<'a, [u8]>,
    /// Set when a compressed payload had to be reinterpreted as raw records
    pub recovered: bool,
}

/// Read the payload of the block at `entry.offset`.
///
/// A payload that fails to inflate is returned as-is and marked recovered;
/// the caller decides how many records it still covers.
pub(crate) fn read_block<'a, B: StorageBackend + ?Sized>(
    source: &'a B,
    variable: &Variable,
    entry: &BlockEntry,
) -> Result<BlockPayload<'a>> {
    let record = source.record_at(entry.offset)?;
    let header = DataBlockHeader::from_bytes(record)?;
    let len = usize::try_from(header.payload_len).map_err(|_| CdfError::InvalidRecordSize)?;
    let payload = record
        .get(header.payload_start..header.payload_start + len)
        .ok_or(CdfError::InvalidRecordSize)?;

    match header.kind {
        BlockKind::Raw => Ok(BlockPayload {
            bytes: Cow::Borrowed(payload),
            recovered: false,
        }),
        BlockKind::Compressed => {
            let expected = entry.records() as usize * variable.record_bytes();
            let mut inflated = Vec::with_capacity(expected);
            match GzDecoder::new(payload).read_to_end(&mut inflated) {
                Ok(_) => {
                    if inflated.len() != expected {
                        tracing::warn!(
                            variable = variable.name(),
                            offset = entry.offset,
                            expected,
                            inflated = inflated.len(),
                            "decompressed block length does not match its index entry"
                        );
                    }
                    Ok(BlockPayload {
                        bytes: Cow::Owned(inflated),
                        recovered: false,
                    })
                }
                Err(err) => {
                    tracing::warn!(
                        variable = variable.name(),
                        offset = entry.offset,
                        first = entry.first,
                        error = %err,
                        "block failed to decompress; reading payload as raw records"
                    );
                    Ok(BlockPayload {
                        bytes: Cow::Borrowed(payload),
                        recovered: true,
                    })
                }
            }
        }
    }
}

/// Walks blocks into an output byte slice
pub(crate) struct Walker<'a, B: StorageBackend + ?Sized> {
    pub source: &'a B,
    pub variable: &'a Variable,
    pub decoder: Decoder,
    /// Output bytes per record
    pub out_record_bytes: usize,
}

struct Cursor<'o> {
    out: &'o mut [u8],
    /// Next logical record to produce
    next: u64,
    /// Output record index of `next`
    written: usize,
    /// Stored bytes of the most recent stored record, for PREVIOUS gaps
    previous: Option<Vec<u8>>,
}

impl<'a, B: StorageBackend + ?Sized> Walker<'a, B> {
    /// Fill `out` with the records of `range`
    pub fn run(&self, entries: &[BlockEntry], range: RecordRange, out: &mut [u8]) -> Result<()> {
        let mut cursor = Cursor {
            out,
            next: range.first,
            written: 0,
            previous: None,
        };

        if self.tracks_previous() && !entries.iter().any(|e| e.contains(range.first)) {
            cursor.previous = self.seed_previous(entries, range.first)?;
        }

        for entry in &entries[first_at_or_after(entries, range.first)..] {
            if entry.first > range.last {
                break;
            }
            if cursor.next < entry.first {
                let gap = entry.first - cursor.next;
                self.fill(&mut cursor, gap);
            }
            let last = entry.last.min(range.last);
            self.read_entry(&mut cursor, entry, last)?;
        }

        if cursor.next <= range.last {
            let trailing = range.last - cursor.next + 1;
            self.fill(&mut cursor, trailing);
        }
        debug_assert_eq!(cursor.written * self.out_record_bytes, cursor.out.len());
        Ok(())
    }

    fn tracks_previous(&self) -> bool {
        self.variable.sparse_records() == SparseRecords::Previous
    }

    /// Read the nearest stored record before `record`
    fn seed_previous(&self, entries: &[BlockEntry], record: u64) -> Result<Option<Vec<u8>>> {
        let Some((entry, stored)) = preceding(entries, record) else {
            return Ok(None);
        };
        let rb = self.variable.record_bytes();
        let payload = read_block(self.source, self.variable, &entry)?;
        let start = (stored - entry.first) as usize * rb;
        Ok(payload.bytes.get(start..start + rb).map(<[u8]>::to_vec))
    }

    /// Decode records `cursor.next..=last` of `entry`
    fn read_entry(&self, cursor: &mut Cursor<'_>, entry: &BlockEntry, last: u64) -> Result<()> {
        let rb = self.variable.record_bytes();
        let wanted = (last - cursor.next + 1) as usize;
        let payload = read_block(self.source, self.variable, entry)?;
        let start = (cursor.next - entry.first) as usize * rb;
        let available = payload.bytes.len().saturating_sub(start) / rb.max(1);
        let count = wanted.min(available);

        if count < wanted {
            tracing::warn!(
                variable = self.variable.name(),
                offset = entry.offset,
                wanted,
                available = count,
                recovered = payload.recovered,
                "block payload is shorter than its index entry; missing records read as pad"
            );
        }

        if count > 0 {
            let src = &payload.bytes[start..start + count * rb];
            let out_start = cursor.written * self.out_record_bytes;
            let out_end = out_start + count * self.out_record_bytes;
            self.decoder.decode(src, &mut cursor.out[out_start..out_end]);
            cursor.written += count;
            cursor.next += count as u64;
            if self.tracks_previous() {
                cursor.previous = Some(src[src.len() - rb..].to_vec());
            }
        }

        if count < wanted {
            let missing = (wanted - count) as u64;
            let pad = self.variable.pad_record();
            self.fill_with(cursor, &pad, missing);
        }
        Ok(())
    }

    /// Synthesize `count` records per the sparse policy
    fn fill(&self, cursor: &mut Cursor<'_>, count: u64) {
        let record = match (&cursor.previous, self.tracks_previous()) {
            (Some(previous), true) => previous.clone(),
            _ => self.variable.pad_record(),
        };
        self.fill_with(cursor, &record, count);
    }

    fn fill_with(&self, cursor: &mut Cursor<'_>, stored: &[u8], count: u64) {
        let size = self.out_record_bytes;
        if count == 0 || size == 0 {
            cursor.written += count as usize;
            cursor.next += count;
            return;
        }
        let start = cursor.written * size;
        let end = start + count as usize * size;
        let (first, rest) = cursor.out[start..end].split_at_mut(size);
        self.decoder.decode(stored, first);
        for slot in rest.chunks_exact_mut(size) {
            slot.copy_from_slice(first);
        }
        cursor.written += count as usize;
        cursor.next += count;
    }
}
