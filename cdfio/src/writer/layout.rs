//! Metadata layout behind the data blocks
//!
//! Order in the finished file: magic, CDR, data blocks, then per variable
//! its CPR and index records, the zVDR chain, the attribute chains and
//! finally the GDR. The CDR is written last, once the GDR offset is known.

use super::WriterConfig;
use crate::attributes::AttributeStore;
use crate::checksum;
use crate::locator::BlockEntry;
use crate::{Error, Result};
use cdfio_core::format::constants::{MAGIC_COMPRESSED, MAGIC_SIZE, MAGIC_V3};
use cdfio_core::{
    CdfDescriptor, CompressedFileRecord, CompressionRecord, GlobalDescriptor, IndexRecord,
    IndexSlot, VariableRecord,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// File offset of the first data block
pub(super) const DATA_START: u64 = (MAGIC_SIZE + CdfDescriptor::SIZE) as u64;

/// A variable's final descriptor and committed blocks
pub(super) struct LaidVariable {
    pub record: VariableRecord,
    pub entries: Vec<BlockEntry>,
    pub compression_level: Option<u32>,
}

pub(super) fn finish(
    mut body: Vec<u8>,
    mut variables: Vec<LaidVariable>,
    attributes: &AttributeStore,
    config: &WriterConfig,
) -> Result<Vec<u8>> {
    let order = config.encoding.byte_order();

    for var in &mut variables {
        if let Some(level) = var.compression_level {
            var.record.cpr_offset = body.len() as u64;
            body.extend_from_slice(&CompressionRecord::gzip(level).to_bytes());
        }
        let (head, tail) = write_index(&mut body, &var.entries, config.vxr_fanout)?;
        var.record.vxr_head = head;
        var.record.vxr_tail = tail;
    }

    let vdr_head = if variables.is_empty() { 0 } else { body.len() as u64 };
    let mut cursor = vdr_head;
    let count = variables.len();
    for (i, var) in variables.iter_mut().enumerate() {
        cursor += var.record.size() as u64;
        var.record.next = if i + 1 == count { 0 } else { cursor };
        body.extend_from_slice(&var.record.to_bytes());
    }
    debug_assert_eq!(cursor.max(vdr_head), body.len() as u64);

    let (attr_bytes, adr_head) = attributes.serialize(body.len() as u64, order)?;
    body.extend_from_slice(&attr_bytes);

    let gdr_offset = body.len() as u64;
    let mut global = GlobalDescriptor::new();
    global.zvdr_head = vdr_head;
    global.adr_head = adr_head;
    global.num_zvars = to_i32(count)?;
    global.num_attrs = to_i32(attributes.len())?;
    global.eof = gdr_offset + global.size() as u64;
    body.extend_from_slice(&global.to_bytes());

    let mut descriptor = CdfDescriptor::new(config.encoding, config.majority);
    descriptor.gdr_offset = gdr_offset;
    descriptor.set_md5_checksum(config.checksum);
    body[MAGIC_SIZE..MAGIC_SIZE + CdfDescriptor::SIZE].copy_from_slice(&descriptor.to_bytes());

    let mut out = if config.compress_file {
        compress_file(&body, config.compression_level)?
    } else {
        body
    };
    if config.checksum {
        checksum::append_digest(&mut out);
    }
    Ok(out)
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidArgument("count exceeds the format's 32-bit field"))
}

fn leaf_slot(entry: &BlockEntry) -> Result<IndexSlot> {
    let record = |r: u64| {
        i32::try_from(r).map_err(|_| Error::InvalidRange {
            first: entry.first as i64,
            last: entry.last as i64,
        })
    };
    Ok(IndexSlot {
        first: record(entry.first)?,
        last: record(entry.last)?,
        offset: entry.offset,
    })
}

/// Write the index tree for `entries`; returns the head and tail of the
/// top-level chain, both 0 when nothing was stored.
///
/// Up to `fanout` blocks fit in one record. Beyond that, leaf records of
/// `fanout` blocks each hang below a chain of top-level records.
pub(super) fn write_index(body: &mut Vec<u8>, entries: &[BlockEntry], fanout: usize) -> Result<(u64, u64)> {
    if entries.is_empty() {
        return Ok((0, 0));
    }
    let fanout = fanout.max(2);
    let leaves = entries.iter().map(leaf_slot).collect::<Result<Vec<_>>>()?;

    let level = if leaves.len() <= fanout {
        leaves
    } else {
        let mut children = Vec::with_capacity(leaves.len().div_ceil(fanout));
        for chunk in leaves.chunks(fanout) {
            let offset = body.len() as u64;
            let record = IndexRecord::with_slots(chunk.to_vec(), fanout);
            children.push(IndexSlot {
                first: chunk[0].first,
                last: chunk[chunk.len() - 1].last,
                offset,
            });
            body.extend_from_slice(&record.to_bytes());
        }
        children
    };

    let size = IndexRecord::size_for(fanout) as u64;
    let head = body.len() as u64;
    let chunks = level.len().div_ceil(fanout);
    for (i, chunk) in level.chunks(fanout).enumerate() {
        let mut record = IndexRecord::with_slots(chunk.to_vec(), fanout);
        if i + 1 < chunks {
            record.next = head + (i as u64 + 1) * size;
        }
        body.extend_from_slice(&record.to_bytes());
    }
    Ok((head, head + (chunks as u64 - 1) * size))
}

/// Wrap a finished plain file in a compressed-file record
fn compress_file(plain: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(&plain[MAGIC_SIZE..])?;
    let payload = encoder.finish()?;

    let ccr_size = (CompressedFileRecord::HEADER_SIZE + payload.len()) as u64;
    let ccr = CompressedFileRecord {
        record_size: ccr_size,
        cpr_offset: MAGIC_SIZE as u64 + ccr_size,
        uncompressed_size: (plain.len() - MAGIC_SIZE) as u64,
    };
    let cpr = CompressionRecord::gzip(level).to_bytes();

    let mut out = Vec::with_capacity(MAGIC_SIZE + ccr_size as usize + cpr.len());
    out.extend_from_slice(&MAGIC_V3.to_be_bytes());
    out.extend_from_slice(&MAGIC_COMPRESSED.to_be_bytes());
    out.extend_from_slice(&ccr.to_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&cpr);
    tracing::debug!(
        plain = plain.len(),
        compressed = out.len(),
        "compressed file body"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::locate;
    use cdfio_core::DataBlockHeader;

    fn blocks(count: u64) -> (Vec<u8>, Vec<BlockEntry>) {
        let mut body = vec![0u8; DATA_START as usize];
        let mut entries = Vec::new();
        for i in 0..count {
            let offset = body.len() as u64;
            body.extend_from_slice(&DataBlockHeader::raw_header(4));
            body.extend_from_slice(&(i as u32).to_be_bytes());
            entries.push(BlockEntry {
                first: 2 * i,
                last: 2 * i + 1,
                offset,
            });
        }
        (body, entries)
    }

    #[test]
    fn test_single_level_index() {
        let (mut body, entries) = blocks(3);
        let (head, tail) = write_index(&mut body, &entries, 4).unwrap();
        assert_eq!(head, tail);
        let found = locate(body.as_slice(), Some(head), 6).unwrap();
        assert_eq!(found, entries);
    }

    #[test]
    fn test_two_level_index_keeps_order() {
        let (mut body, entries) = blocks(23);
        let (head, tail) = write_index(&mut body, &entries, 3).unwrap();
        // 8 leaf records under a chain of 3 top-level records
        assert_eq!(tail - head, 2 * IndexRecord::size_for(3) as u64);
        let found = locate(body.as_slice(), Some(head), 46).unwrap();
        assert_eq!(found, entries);
    }

    #[test]
    fn test_empty_index() {
        let mut body = Vec::new();
        assert_eq!(write_index(&mut body, &[], 10).unwrap(), (0, 0));
        assert!(body.is_empty());
    }
}
