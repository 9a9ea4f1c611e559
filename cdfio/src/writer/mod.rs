//! Layout engine
//!
//! [`CdfWriter`] appends typed data for defined variables as physical
//! blocks, one block per append, and keeps each variable's block index in
//! step so [`CdfWriter::snapshot`] can hand out a readable [`CdfFile`] at
//! any point. [`CdfWriter::finalize`] lays out the index trees, variable
//! descriptors, attributes and the global descriptor behind the blocks.
//!
//! Appends take `&self`: appends to one variable are serialized, appends
//! to different variables run concurrently and only share the short lock
//! that reserves space in the body.

mod layout;

use crate::attributes::{AttributeEntry, AttributeStore};
use crate::codec::{write_lane, Scalar};
use crate::extract::majority::transpose_records;
use crate::extract::RecordBuffer;
use crate::file::CdfFile;
use crate::locator::BlockEntry;
use crate::variable::Variable;
use crate::{Error, Result};
use cdfio_core::format::constants::{vdr_flags, DEFAULT_VXR_FANOUT, MAGIC_SIZE};
use cdfio_core::{
    magic_bytes, ByteOrder, CdfDescriptor, DataBlockHeader, DataType, Encoding, Majority,
    RecordRange, SparseRecords, TargetType, VariableKind, VariableRecord,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use hashbrown::HashMap;
use rayon::prelude::*;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// File-wide settings for a new CDF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterConfig {
    pub majority: Majority,
    /// Data encoding; decides the byte order of values
    pub encoding: Encoding,
    /// gzip level for variables marked compressed without a level
    pub compression_level: u32,
    /// Append the trailing MD5 digest
    pub checksum: bool,
    /// Entries per index record
    pub vxr_fanout: usize,
    /// Blocking factor written into descriptors that do not set one
    pub blocking_factor: u32,
    /// gzip the whole file body behind a compressed-file record
    pub compress_file: bool,
}

impl WriterConfig {
    pub fn with_majority(mut self, majority: Majority) -> Self {
        self.majority = majority;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Pick the canonical encoding for a byte order
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.encoding = Encoding::for_order(order);
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_vxr_fanout(mut self, fanout: usize) -> Self {
        self.vxr_fanout = fanout.max(2);
        self
    }

    pub fn with_blocking_factor(mut self, blocking_factor: u32) -> Self {
        self.blocking_factor = blocking_factor;
        self
    }

    pub fn with_file_compression(mut self, compress_file: bool) -> Self {
        self.compress_file = compress_file;
        self
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            majority: Majority::Row,
            encoding: Encoding::for_order(ByteOrder::native()),
            compression_level: 6,
            checksum: true,
            vxr_fanout: DEFAULT_VXR_FANOUT,
            blocking_factor: 0,
            compress_file: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PadSpec {
    Value(Scalar),
    Text(String),
}

/// Definition of a new variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    name: String,
    data_type: DataType,
    num_elems: usize,
    dims: Vec<usize>,
    dim_varys: Option<Vec<bool>>,
    record_variance: bool,
    sparse: SparseRecords,
    pad: Option<PadSpec>,
    compression: Option<Option<u32>>,
    blocking_factor: Option<u32>,
}

impl VariableSpec {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            num_elems: 1,
            dims: Vec::new(),
            dim_varys: None,
            record_variance: true,
            sparse: SparseRecords::None,
            pad: None,
            compression: None,
            blocking_factor: None,
        }
    }

    /// Elements per value; the string length for CHAR and UCHAR
    pub fn num_elems(mut self, num_elems: usize) -> Self {
        self.num_elems = num_elems;
        self
    }

    /// Dimension sizes, all varying unless [`dim_varys`](Self::dim_varys) says otherwise
    pub fn dims(mut self, dims: &[usize]) -> Self {
        self.dims = dims.to_vec();
        self
    }

    pub fn dim_varys(mut self, varys: &[bool]) -> Self {
        self.dim_varys = Some(varys.to_vec());
        self
    }

    pub fn record_variance(mut self, varies: bool) -> Self {
        self.record_variance = varies;
        self
    }

    pub fn sparse(mut self, sparse: SparseRecords) -> Self {
        self.sparse = sparse;
        self
    }

    /// Pad value stored in the descriptor; rounded to REAL4 when needed
    pub fn pad_f64(mut self, value: f64) -> Self {
        self.pad = Some(PadSpec::Value(Scalar::Float(value)));
        self
    }

    pub fn pad_i64(mut self, value: i64) -> Self {
        self.pad = Some(PadSpec::Value(Scalar::Int(value)));
        self
    }

    pub fn pad_text(mut self, value: &str) -> Self {
        self.pad = Some(PadSpec::Text(value.to_string()));
        self
    }

    /// gzip blocks at the writer's default level
    pub fn compressed(mut self) -> Self {
        self.compression = Some(None);
        self
    }

    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression = Some(Some(level.min(9)));
        self
    }

    pub fn blocking_factor(mut self, blocking_factor: u32) -> Self {
        self.blocking_factor = Some(blocking_factor);
        self
    }
}

/// Values handed to [`CdfWriter::append`]
///
/// Numeric arrays are converted into the variable's type and must fit it
/// exactly. `Bytes` is already encoded in the file's byte order and is
/// copied as-is. `Text` holds one string per CHAR element.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bytes(Vec<u8>),
    Text(Vec<String>),
}

impl TypedArray {
    /// Number of values, bytes or strings
    pub fn len(&self) -> usize {
        match self {
            TypedArray::I8(v) => v.len(),
            TypedArray::I16(v) => v.len(),
            TypedArray::I32(v) => v.len(),
            TypedArray::I64(v) => v.len(),
            TypedArray::U8(v) => v.len(),
            TypedArray::U16(v) => v.len(),
            TypedArray::U32(v) => v.len(),
            TypedArray::F32(v) => v.len(),
            TypedArray::F64(v) => v.len(),
            TypedArray::Bytes(v) => v.len(),
            TypedArray::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scalars(&self) -> Option<Vec<Scalar>> {
        fn ints<T: Copy + Into<i64>>(v: &[T]) -> Vec<Scalar> {
            v.iter().map(|&x| Scalar::Int(x.into())).collect()
        }
        Some(match self {
            TypedArray::I8(v) => ints(v),
            TypedArray::I16(v) => ints(v),
            TypedArray::I32(v) => ints(v),
            TypedArray::I64(v) => ints(v),
            TypedArray::U8(v) => ints(v),
            TypedArray::U16(v) => ints(v),
            TypedArray::U32(v) => ints(v),
            TypedArray::F32(v) => v.iter().map(|&x| Scalar::Float(x as f64)).collect(),
            TypedArray::F64(v) => v.iter().map(|&x| Scalar::Float(x)).collect(),
            TypedArray::Bytes(_) | TypedArray::Text(_) => return None,
        })
    }
}

/// Records already encoded in some byte order and majority
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBlock {
    pub range: RecordRange,
    pub bytes: Vec<u8>,
    pub byte_order: ByteOrder,
    pub majority: Majority,
}

impl EncodedBlock {
    /// Reuse the records of a `Native` extraction buffer
    pub fn from_native(buffer: &RecordBuffer) -> Result<Self> {
        if buffer.target() != TargetType::Native || buffer.is_empty() {
            return Err(Error::InvalidArgument("encoded blocks need a non-empty native buffer"));
        }
        let first = buffer.first_record();
        Ok(Self {
            range: RecordRange {
                first,
                last: first + buffer.record_count() - 1,
            },
            bytes: buffer.as_bytes().to_vec(),
            byte_order: buffer.byte_order(),
            majority: buffer.majority(),
        })
    }
}

#[derive(Debug, Default)]
struct Committed {
    entries: Vec<BlockEntry>,
    /// One past the highest committed record
    next_record: u64,
}

#[derive(Debug)]
struct VariableSlot {
    record: VariableRecord,
    /// Shape helper; carries no block index
    shape: Variable,
    committed: Mutex<Committed>,
}

impl VariableSlot {
    fn committed(&self) -> MutexGuard<'_, Committed> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Encoded block waiting to be committed
struct PreparedBlock {
    records: u64,
    bytes: Vec<u8>,
}

/// Writer for a new CDF
#[derive(Debug)]
pub struct CdfWriter {
    config: WriterConfig,
    order: ByteOrder,
    /// Magic, descriptor placeholder and committed blocks
    body: Mutex<Vec<u8>>,
    variables: Vec<Arc<VariableSlot>>,
    by_name: HashMap<String, usize>,
    attributes: AttributeStore,
}

impl CdfWriter {
    pub fn new(config: WriterConfig) -> Self {
        let mut body = Vec::with_capacity(layout::DATA_START as usize);
        body.extend_from_slice(&magic_bytes());
        body.resize(MAGIC_SIZE + CdfDescriptor::SIZE, 0);
        Self {
            order: config.encoding.byte_order(),
            config,
            body: Mutex::new(body),
            variables: Vec::new(),
            by_name: HashMap::new(),
            attributes: AttributeStore::new(),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    fn body(&self) -> MutexGuard<'_, Vec<u8>> {
        self.body.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, name: &str) -> Result<&Arc<VariableSlot>> {
        self.by_name
            .get(name)
            .map(|&i| &self.variables[i])
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Define a zVariable; returns its number
    pub fn define_variable(&mut self, spec: VariableSpec) -> Result<u32> {
        if self.by_name.contains_key(&spec.name) {
            return Err(Error::DuplicateVariable(spec.name));
        }
        if spec.name.is_empty() || spec.name.len() > cdfio_core::format::constants::NAME_LEN {
            return Err(Error::InvalidArgument("variable names need 1 to 256 bytes"));
        }
        if spec.num_elems == 0 {
            return Err(Error::InvalidArgument("num_elems must be at least 1"));
        }
        let dim_varys = spec.dim_varys.clone().unwrap_or_else(|| vec![true; spec.dims.len()]);
        if dim_varys.len() != spec.dims.len() {
            return Err(Error::LengthMismatch {
                expected: spec.dims.len(),
                found: dim_varys.len(),
            });
        }

        let number = self.variables.len() as u32;
        let mut record = VariableRecord::new(VariableKind::Z, &spec.name, spec.data_type, number as i32);
        record.num_elems = to_i32(spec.num_elems)?;
        record.z_dim_sizes = spec.dims.iter().map(|&d| to_i32(d)).collect::<Result<_>>()?;
        record.dim_varys = dim_varys;
        record.sparse_records = spec.sparse;
        record.blocking_factor = to_i32(spec.blocking_factor.unwrap_or(self.config.blocking_factor) as usize)?;
        if !spec.record_variance {
            record.flags &= !vdr_flags::RECORD_VARIANCE;
        }
        let level = spec
            .compression
            .map(|level| level.unwrap_or(self.config.compression_level));
        if level.is_some() {
            record.flags |= vdr_flags::COMPRESSION;
        }
        record.pad_value = match &spec.pad {
            Some(pad) => Some(encode_pad(pad, spec.data_type, spec.num_elems, self.order)?),
            None => None,
        };

        let shape = Variable::from_record(&record, &[], self.order, self.config.majority, level, None)?;
        tracing::debug!(
            name = %spec.name,
            number,
            data_type = %spec.data_type,
            dims = ?spec.dims,
            compressed = level.is_some(),
            "defined variable"
        );
        self.by_name.insert(spec.name, self.variables.len());
        self.variables.push(Arc::new(VariableSlot {
            record,
            shape,
            committed: Mutex::new(Committed::default()),
        }));
        Ok(number)
    }

    /// Set a global attribute's entries, replacing earlier ones
    pub fn set_global_attribute(&mut self, name: &str, entries: Vec<AttributeEntry>) -> Result<()> {
        self.attributes.set_global(name, entries)
    }

    /// Set a variable-scope attribute entry, e.g. `FILLVAL`
    pub fn set_variable_attribute(&mut self, name: &str, variable: &str, entry: AttributeEntry) -> Result<()> {
        let number = self.slot(variable)?.shape.number();
        self.attributes
            .set_variable_entry(name, VariableKind::Z, number, entry)
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Append values as one block. Without a range the records continue
    /// after the highest committed record.
    pub fn append(&self, name: &str, range: Option<RecordRange>, data: TypedArray) -> Result<()> {
        let slot = self.slot(name)?;
        let prepared = self.prepare(slot, &data)?;
        self.commit(slot, range, prepared)
    }

    /// Append pre-encoded records. Bytes matching the file's byte order
    /// and majority are stored without conversion.
    pub fn append_encoded(&self, name: &str, block: EncodedBlock) -> Result<()> {
        if !block.range.is_ordered() {
            return Err(inverted(block.range));
        }
        let slot = self.slot(name)?;
        let shape = &slot.shape;
        let expected = usize::try_from(block.range.len())
            .ok()
            .and_then(|n| n.checked_mul(shape.record_bytes()))
            .ok_or(Error::InvalidArgument("encoded block is too large"))?;
        if block.bytes.len() != expected {
            return Err(Error::LengthMismatch {
                expected,
                found: block.bytes.len(),
            });
        }

        let mut bytes = block.bytes;
        let dims = shape.effective_dims();
        if block.byte_order != self.order {
            let width = shape.data_type().size_bytes() / shape.data_type().lanes_per_value();
            ByteOrder::swap_elements(block.byte_order, self.order, width, &mut bytes);
        }
        if block.majority != self.config.majority && dims.len() >= 2 {
            transpose_records(&mut bytes, &dims, shape.item_size(), block.majority);
        }
        let prepared = PreparedBlock {
            records: block.range.len(),
            bytes: self.encode_block(slot, bytes)?,
        };
        self.commit(slot, Some(block.range), prepared)
    }

    /// Append to several variables, compressing blocks in parallel.
    /// Blocks are committed in order; the first failure stops the batch.
    pub fn append_many(&self, batch: Vec<(String, Option<RecordRange>, TypedArray)>) -> Result<()> {
        let prepared = batch
            .par_iter()
            .map(|(name, _, data)| {
                let slot = self.slot(name)?;
                self.prepare(slot, data)
            })
            .collect::<Result<Vec<_>>>()?;
        for ((name, range, _), block) in batch.iter().zip(prepared) {
            self.commit(self.slot(name)?, *range, block)?;
        }
        Ok(())
    }

    /// Encode and, for compressed variables, deflate one block
    fn prepare(&self, slot: &VariableSlot, data: &TypedArray) -> Result<PreparedBlock> {
        let shape = &slot.shape;
        let record_bytes = shape.record_bytes();
        let stored = match data {
            TypedArray::Bytes(bytes) => bytes.clone(),
            TypedArray::Text(strings) => encode_text(shape, strings)?,
            numeric => {
                let scalars = numeric
                    .scalars()
                    .ok_or(Error::InvalidArgument("unsupported value array"))?;
                encode_values(shape.data_type(), self.order, &scalars)?
            }
        };
        if record_bytes == 0 || stored.len() % record_bytes != 0 {
            let records = stored.len() / record_bytes.max(1) + 1;
            return Err(Error::LengthMismatch {
                expected: records * record_bytes,
                found: stored.len(),
            });
        }
        Ok(PreparedBlock {
            records: (stored.len() / record_bytes) as u64,
            bytes: self.encode_block(slot, stored)?,
        })
    }

    /// Wrap stored records in a VVR or CVVR record
    fn encode_block(&self, slot: &VariableSlot, stored: Vec<u8>) -> Result<Vec<u8>> {
        match slot.shape.compression_level() {
            None => {
                let header = DataBlockHeader::raw_header(stored.len() as u64);
                let mut block = Vec::with_capacity(header.len() + stored.len());
                block.extend_from_slice(&header);
                block.extend_from_slice(&stored);
                Ok(block)
            }
            Some(level) => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
                encoder.write_all(&stored)?;
                let compressed = encoder.finish()?;
                let header = DataBlockHeader::compressed_header(compressed.len() as u64);
                let mut block = Vec::with_capacity(header.len() + compressed.len());
                block.extend_from_slice(&header);
                block.extend_from_slice(&compressed);
                Ok(block)
            }
        }
    }

    /// Check continuity and place the block in the body
    fn commit(&self, slot: &VariableSlot, range: Option<RecordRange>, block: PreparedBlock) -> Result<()> {
        if block.records == 0 {
            return Ok(());
        }
        let shape = &slot.shape;
        let mut committed = slot.committed();
        let range = match range {
            Some(range) if !range.is_ordered() => return Err(inverted(range)),
            Some(range) => {
                if range.len() != block.records {
                    return Err(Error::LengthMismatch {
                        expected: range.len() as usize,
                        found: block.records as usize,
                    });
                }
                range
            }
            None => RecordRange {
                first: committed.next_record,
                last: committed.next_record + block.records - 1,
            },
        };

        if !shape.record_variance() && (range.first != 0 || range.last != 0) {
            return Err(Error::InvalidArgument("non-record-varying variables hold record 0 only"));
        }
        if range.last > i32::MAX as u64 {
            return Err(Error::InvalidRange {
                first: range.first as i64,
                last: range.last as i64,
            });
        }
        if !committed.entries.is_empty() && range.first < committed.next_record {
            return Err(Error::RecordOverlap {
                variable: shape.name().to_string(),
                first: range.first,
                committed: committed.next_record - 1,
            });
        }
        if range.first > committed.next_record && !shape.sparse_records().allows_gaps() {
            return Err(Error::RecordGap {
                variable: shape.name().to_string(),
                expected: committed.next_record,
                found: range.first,
            });
        }

        let offset = {
            let mut body = self.body();
            let offset = body.len() as u64;
            body.extend_from_slice(&block.bytes);
            offset
        };
        committed.entries.push(BlockEntry {
            first: range.first,
            last: range.last,
            offset,
        });
        committed.next_record = range.last + 1;
        tracing::debug!(
            variable = shape.name(),
            first = range.first,
            last = range.last,
            offset,
            bytes = block.bytes.len(),
            "appended block"
        );
        Ok(())
    }

    /// Committed block entries of a variable
    pub fn entries(&self, name: &str) -> Result<Vec<BlockEntry>> {
        Ok(self.slot(name)?.committed().entries.clone())
    }

    /// Readable view of everything committed so far
    pub fn snapshot(&self) -> Result<CdfFile> {
        let body = self.body().clone();
        let mut variables = Vec::with_capacity(self.variables.len());
        let mut global = cdfio_core::GlobalDescriptor::new();
        for slot in &self.variables {
            let committed = slot.committed();
            let record = self.finished_record(slot, &committed);
            let fill = self.attributes.fill_value(VariableKind::Z, slot.shape.number());
            let variable = Variable::from_record(
                &record,
                &[],
                self.order,
                self.config.majority,
                slot.shape.compression_level(),
                fill,
            )?;
            variable.seed_index(committed.entries.clone().into());
            variables.push(Arc::new(variable));
        }
        global.num_zvars = variables.len() as i32;
        global.num_attrs = self.attributes.len() as i32;

        let mut descriptor = CdfDescriptor::new(self.config.encoding, self.config.majority);
        descriptor.set_md5_checksum(false);
        Ok(CdfFile::from_parts(
            crate::backend::Source::Memory(body),
            descriptor,
            global,
            variables,
            self.attributes.clone(),
            false,
        ))
    }

    /// Descriptor with the committed record count
    fn finished_record(&self, slot: &VariableSlot, committed: &Committed) -> VariableRecord {
        let mut record = slot.record.clone();
        record.max_rec = match committed.entries.last() {
            Some(entry) => entry.last as i32,
            None => -1,
        };
        record
    }

    /// Lay out all metadata and return the complete file
    pub fn finalize(self) -> Result<Vec<u8>> {
        let variables = self
            .variables
            .iter()
            .map(|slot| {
                let committed = slot.committed();
                layout::LaidVariable {
                    record: self.finished_record(slot, &committed),
                    entries: committed.entries.clone(),
                    compression_level: slot.shape.compression_level(),
                }
            })
            .collect::<Vec<_>>();
        let body = std::mem::take(&mut *self.body());
        let bytes = layout::finish(body, variables, &self.attributes, &self.config)?;
        tracing::debug!(
            bytes = bytes.len(),
            variables = self.variables.len(),
            attributes = self.attributes.len(),
            compressed = self.config.compress_file,
            "finalized CDF"
        );
        Ok(bytes)
    }

    /// Finalize and write the file to `path`
    pub fn write_to<P: AsRef<Path>>(self, path: P) -> Result<()> {
        let bytes = self.finalize()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn inverted(range: RecordRange) -> Error {
    Error::InvalidRange {
        first: range.first as i64,
        last: range.last as i64,
    }
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidArgument("value exceeds the format's 32-bit field"))
}

/// Convert values into stored bytes, one lane per scalar
fn encode_values(data_type: DataType, order: ByteOrder, scalars: &[Scalar]) -> Result<Vec<u8>> {
    let width = data_type.size_bytes() / data_type.lanes_per_value();
    let mut out = vec![0u8; width * scalars.len()];
    for (index, (scalar, slot)) in scalars.iter().zip(out.chunks_exact_mut(width)).enumerate() {
        if !write_lane(data_type, order, *scalar, slot, true) {
            return Err(Error::ValueOutOfRange { data_type, index });
        }
    }
    Ok(out)
}

/// One string per element, space padded to the element length
fn encode_text(shape: &Variable, strings: &[String]) -> Result<Vec<u8>> {
    if !shape.data_type().is_char() {
        return Err(Error::InvalidArgument("text values need a CHAR or UCHAR variable"));
    }
    let width = shape.item_size();
    let mut out = Vec::with_capacity(width * strings.len());
    for s in strings {
        if s.len() > width {
            return Err(Error::LengthMismatch {
                expected: width,
                found: s.len(),
            });
        }
        out.extend_from_slice(s.as_bytes());
        out.resize(out.len() + width - s.len(), b' ');
    }
    Ok(out)
}

fn encode_pad(pad: &PadSpec, data_type: DataType, num_elems: usize, order: ByteOrder) -> Result<Vec<u8>> {
    match pad {
        PadSpec::Text(text) => {
            if !data_type.is_char() || text.len() > num_elems {
                return Err(Error::InvalidArgument("text pad needs a CHAR variable wide enough"));
            }
            let mut out = text.as_bytes().to_vec();
            out.resize(num_elems, b' ');
            Ok(out)
        }
        PadSpec::Value(scalar) => {
            if data_type.is_char() {
                return Err(Error::InvalidArgument("numeric pad needs a numeric variable"));
            }
            let lanes = data_type.lanes_per_value() * num_elems;
            let width = data_type.size_bytes() / data_type.lanes_per_value();
            let mut out = vec![0u8; width * lanes];
            for lane in out.chunks_exact_mut(width) {
                if !write_lane(data_type, order, *scalar, lane, false) {
                    return Err(Error::ValueOutOfRange { data_type, index: 0 });
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> CdfWriter {
        CdfWriter::new(WriterConfig::default().with_byte_order(ByteOrder::Little))
    }

    #[test]
    fn test_append_continues_after_committed() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("x", DataType::Int4)).unwrap();
        w.append("x", None, TypedArray::I32(vec![1, 2, 3])).unwrap();
        w.append("x", None, TypedArray::I32(vec![4, 5])).unwrap();
        let entries = w.entries("x").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].first, entries[0].last), (0, 2));
        assert_eq!((entries[1].first, entries[1].last), (3, 4));
        assert_eq!(entries[0].offset, layout::DATA_START);
        assert!(entries[1].offset > entries[0].offset);
    }

    #[test]
    fn test_gap_and_overlap_rejected() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("dense", DataType::Real8)).unwrap();
        w.define_variable(VariableSpec::new("sparse", DataType::Real8).sparse(SparseRecords::Pad))
            .unwrap();
        w.append("dense", None, TypedArray::F64(vec![0.0; 10])).unwrap();

        let gap = w.append("dense", Some(RecordRange { first: 12, last: 12 }), TypedArray::F64(vec![1.0]));
        assert!(matches!(gap, Err(Error::RecordGap { expected: 10, found: 12, .. })));
        let overlap = w.append("dense", Some(RecordRange { first: 5, last: 5 }), TypedArray::F64(vec![1.0]));
        assert!(matches!(overlap, Err(Error::RecordOverlap { committed: 9, .. })));

        w.append("sparse", Some(RecordRange { first: 4, last: 5 }), TypedArray::F64(vec![1.0, 2.0]))
            .unwrap();
        w.append("sparse", Some(RecordRange { first: 9, last: 9 }), TypedArray::F64(vec![3.0]))
            .unwrap();
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("x", DataType::Int4).sparse(SparseRecords::Pad))
            .unwrap();
        let inverted = RecordRange { first: 5, last: 2 };

        let err = w.append("x", Some(inverted), TypedArray::I32(vec![1])).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { first: 5, last: 2 }));

        let block = EncodedBlock {
            range: inverted,
            bytes: vec![0; 4],
            byte_order: ByteOrder::Little,
            majority: Majority::Row,
        };
        let err = w.append_encoded("x", block).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { first: 5, last: 2 }));

        let err = w
            .append_many(vec![("x".to_string(), Some(inverted), TypedArray::I32(vec![1]))])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange { .. }));
        assert!(w.entries("x").unwrap().is_empty());
    }

    #[test]
    fn test_exact_conversion_and_lengths() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("b", DataType::UInt1).dims(&[2])).unwrap();
        let err = w.append("b", None, TypedArray::I32(vec![1, 256])).unwrap_err();
        assert!(matches!(err, Error::ValueOutOfRange { index: 1, .. }));
        let err = w.append("b", None, TypedArray::I32(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
        w.append("b", None, TypedArray::U8(vec![255, 0])).unwrap();
        assert!(matches!(
            w.append("missing", None, TypedArray::U8(vec![1])),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_duplicate_and_non_varying() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("c", DataType::Real4).record_variance(false))
            .unwrap();
        assert!(matches!(
            w.define_variable(VariableSpec::new("c", DataType::Real4)),
            Err(Error::DuplicateVariable(_))
        ));
        w.append("c", None, TypedArray::F32(vec![1.5])).unwrap();
        assert!(w.append("c", None, TypedArray::F32(vec![2.5])).is_err());
    }

    #[test]
    fn test_text_encoding_pads_with_spaces() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("label", DataType::Char).num_elems(4))
            .unwrap();
        w.append("label", None, TypedArray::Text(vec!["ab".into(), "wxyz".into()]))
            .unwrap();
        assert!(w
            .append("label", None, TypedArray::Text(vec!["toolong".into()]))
            .is_err());
        let file = w.snapshot().unwrap();
        let buffer = file.extract("label").unwrap().build().unwrap().materialize().unwrap();
        assert_eq!(buffer.strings().unwrap(), vec!["ab".to_string(), "wxyz".to_string()]);
    }

    #[test]
    fn test_snapshot_reads_committed_blocks() {
        let mut w = writer();
        w.define_variable(VariableSpec::new("v", DataType::Int2).compressed())
            .unwrap();
        w.append("v", None, TypedArray::I16(vec![-3, 7, 11])).unwrap();
        let file = w.snapshot().unwrap();
        let variable = file.variable("v").unwrap();
        assert!(variable.is_compressed());
        assert_eq!(variable.total_records(), 3);
        let buffer = file
            .extract("v")
            .unwrap()
            .target(TargetType::I64)
            .build()
            .unwrap()
            .materialize()
            .unwrap();
        assert_eq!(buffer.to_i64_vec(), vec![-3, 7, 11]);
    }
}
