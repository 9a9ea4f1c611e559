//! Variable descriptors
//!
//! A [`Variable`] is parsed once from its descriptor record and never
//! changes afterwards. Its block index is built on first use and shared by
//! every extraction of the variable.

use crate::attributes::AttributeEntry;
use crate::codec::write_lane;
use crate::locator::BlockEntry;
use crate::{Error, Result};
use cdfio_core::{
    ByteOrder, CdfError, DataType, Majority, SparseRecords, VariableKind, VariableRecord,
};
use std::sync::{Arc, OnceLock};

/// Where a variable's pad value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PadSource {
    /// Stored in the variable descriptor
    Descriptor,
    /// Converted from the variable's FILLVAL attribute entry
    FillValue,
    /// Type default
    Default,
}

/// Immutable per-variable metadata plus the memoized block index
#[derive(Debug)]
pub struct Variable {
    name: String,
    number: u32,
    kind: VariableKind,
    data_type: DataType,
    num_elems: usize,
    dims: Vec<usize>,
    dim_varys: Vec<bool>,
    record_variance: bool,
    compression_level: Option<u32>,
    sparse: SparseRecords,
    pad: Vec<u8>,
    pad_source: PadSource,
    blocking_factor: u32,
    total_records: u64,
    index_head: Option<u64>,
    order: ByteOrder,
    majority: Majority,
    index: OnceLock<Arc<[BlockEntry]>>,
}

impl Variable {
    /// Build from a descriptor record.
    ///
    /// `r_dims` are the global r-variable dimensions, `compression_level`
    /// the gzip level from the variable's compression record and `fill`
    /// its FILLVAL entry, if any.
    pub fn from_record(
        record: &VariableRecord,
        r_dims: &[i32],
        order: ByteOrder,
        majority: Majority,
        compression_level: Option<u32>,
        fill: Option<&AttributeEntry>,
    ) -> Result<Self> {
        let raw_dims = match record.kind {
            VariableKind::R => r_dims,
            VariableKind::Z => record.z_dim_sizes.as_slice(),
        };
        if raw_dims.len() != record.dim_varys.len() {
            return Err(CdfError::InvalidRecordSize.into());
        }
        let dims = raw_dims
            .iter()
            .map(|&d| usize::try_from(d).map_err(|_| Error::Format(CdfError::InvalidRecordSize)))
            .collect::<Result<Vec<_>>>()?;

        let data_type = record.data_type;
        let num_elems =
            usize::try_from(record.num_elems).map_err(|_| CdfError::InvalidRecordSize)?;
        let item_size = data_type
            .size_bytes()
            .checked_mul(num_elems)
            .ok_or(CdfError::ArraySizeOverflow)?;

        let (pad, pad_source) = match &record.pad_value {
            Some(pad) if pad.len() == item_size => (pad.clone(), PadSource::Descriptor),
            _ => match fill.and_then(|entry| pad_from_fill(entry, data_type, num_elems, order)) {
                Some(pad) => (pad, PadSource::FillValue),
                None => (default_pad(data_type, num_elems, order), PadSource::Default),
            },
        };

        let compression_level = if record.compressed() {
            Some(compression_level.unwrap_or(6))
        } else {
            None
        };

        Ok(Self {
            name: String::from_utf8_lossy(record.name_bytes()).into_owned(),
            number: u32::try_from(record.num).map_err(|_| CdfError::InvalidRecordSize)?,
            kind: record.kind,
            data_type,
            num_elems,
            dims,
            dim_varys: record.dim_varys.clone(),
            record_variance: record.record_variance(),
            compression_level,
            sparse: record.sparse_records,
            pad,
            pad_source,
            blocking_factor: record.blocking_factor.max(0) as u32,
            total_records: if record.max_rec < 0 {
                0
            } else {
                record.max_rec as u64 + 1
            },
            index_head: record.index_head(),
            order,
            majority,
            index: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Elements per value: string length for CHAR types, usually 1 otherwise
    pub fn num_elems(&self) -> usize {
        self.num_elems
    }

    /// Declared dimension sizes
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn dim_varys(&self) -> &[bool] {
        &self.dim_varys
    }

    pub fn record_variance(&self) -> bool {
        self.record_variance
    }

    pub fn is_compressed(&self) -> bool {
        self.compression_level.is_some()
    }

    pub fn compression_level(&self) -> Option<u32> {
        self.compression_level
    }

    pub fn sparse_records(&self) -> SparseRecords {
        self.sparse
    }

    /// Pad bytes for one element in the file's byte order
    pub fn pad_value(&self) -> &[u8] {
        &self.pad
    }

    pub fn pad_source(&self) -> PadSource {
        self.pad_source
    }

    pub fn blocking_factor(&self) -> u32 {
        self.blocking_factor
    }

    /// Logical record count (`MaxRec + 1`)
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn majority(&self) -> Majority {
        self.majority
    }

    pub(crate) fn index_head(&self) -> Option<u64> {
        self.index_head
    }

    /// Bytes of one element (type width times element count)
    pub fn item_size(&self) -> usize {
        self.data_type.size_bytes() * self.num_elems
    }

    /// Values one element decodes to; a CHAR string counts as one
    pub fn values_per_element(&self) -> usize {
        if self.data_type.is_char() {
            1
        } else {
            self.num_elems
        }
    }

    /// Product of the varying dimension sizes
    pub fn elements_per_record(&self) -> usize {
        self.dims
            .iter()
            .zip(&self.dim_varys)
            .filter(|&(_, &vary)| vary)
            .map(|(&d, _)| d)
            .product()
    }

    /// Dimensions that vary and have more than one element
    pub fn effective_dims(&self) -> Vec<usize> {
        self.dims
            .iter()
            .zip(&self.dim_varys)
            .filter(|&(&d, &vary)| vary && d > 1)
            .map(|(&d, _)| d)
            .collect()
    }

    /// Stored bytes of one record
    pub fn record_bytes(&self) -> usize {
        self.item_size() * self.elements_per_record()
    }

    /// Pad bytes for a whole record
    pub fn pad_record(&self) -> Vec<u8> {
        self.pad.repeat(self.elements_per_record())
    }

    /// Block index if it has been built
    pub fn cached_index(&self) -> Option<&Arc<[BlockEntry]>> {
        self.index.get()
    }

    /// Publish a block index; the first published index wins
    pub(crate) fn seed_index(&self, entries: Arc<[BlockEntry]>) -> Arc<[BlockEntry]> {
        self.index.get_or_init(|| entries).clone()
    }
}

/// Per-type default pad repeated over `num_elems`
pub(crate) fn default_pad(data_type: DataType, num_elems: usize, order: ByteOrder) -> Vec<u8> {
    let width = data_type.size_bytes();
    let mut one = vec![0u8; width];
    data_type.default_pad(order, &mut one);
    one.repeat(num_elems)
}

/// Convert a FILLVAL entry into pad bytes for the variable's type
fn pad_from_fill(
    entry: &AttributeEntry,
    data_type: DataType,
    num_elems: usize,
    order: ByteOrder,
) -> Option<Vec<u8>> {
    let width = data_type.size_bytes();
    if data_type.is_char() {
        let text = entry.as_text()?;
        let mut pad = text.into_bytes();
        pad.resize(num_elems, b' ');
        return Some(pad);
    }
    let lanes = data_type.lanes_per_value();
    let lane_width = width / lanes;
    let scalar = entry.first_scalar()?;
    let mut one = vec![0u8; width];
    for lane in one.chunks_exact_mut(lane_width) {
        if !write_lane(data_type, order, scalar, lane, false) {
            return None;
        }
    }
    Some(one.repeat(num_elems))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdfio_core::format::constants::vdr_flags;

    fn record(data_type: DataType) -> VariableRecord {
        let mut vdr = VariableRecord::new(VariableKind::Z, "Bx", data_type, 0);
        vdr.z_dim_sizes = vec![3, 1, 4];
        vdr.dim_varys = vec![true, true, false];
        vdr.max_rec = 99;
        vdr
    }

    #[test]
    fn test_derived_shape() {
        let var = Variable::from_record(
            &record(DataType::Real4),
            &[],
            ByteOrder::Big,
            Majority::Row,
            None,
            None,
        )
        .unwrap();
        assert_eq!(var.total_records(), 100);
        assert_eq!(var.elements_per_record(), 3);
        assert_eq!(var.effective_dims(), vec![3]);
        assert_eq!(var.record_bytes(), 12);
        assert_eq!(var.pad_source(), PadSource::Default);
        assert_eq!(ByteOrder::Big.read_f32(var.pad_value()), -1.0e30);
    }

    #[test]
    fn test_pad_resolution_order() {
        let fill = AttributeEntry::floats(DataType::Real8, vec![-1.0e31]);

        let mut vdr = record(DataType::Real8);
        let from_fill =
            Variable::from_record(&vdr, &[], ByteOrder::Little, Majority::Row, None, Some(&fill))
                .unwrap();
        assert_eq!(from_fill.pad_source(), PadSource::FillValue);
        assert_eq!(ByteOrder::Little.read_f64(from_fill.pad_value()), -1.0e31);

        vdr.pad_value = Some(7.5f64.to_le_bytes().to_vec());
        vdr.flags |= vdr_flags::PAD_VALUE;
        let from_vdr =
            Variable::from_record(&vdr, &[], ByteOrder::Little, Majority::Row, None, Some(&fill))
                .unwrap();
        assert_eq!(from_vdr.pad_source(), PadSource::Descriptor);
        assert_eq!(ByteOrder::Little.read_f64(from_vdr.pad_value()), 7.5);

        let unsigned_fill = AttributeEntry::ints(DataType::Int4, vec![-1]);
        let uint = Variable::from_record(
            &record(DataType::UInt1),
            &[],
            ByteOrder::Big,
            Majority::Row,
            None,
            Some(&unsigned_fill),
        )
        .unwrap();
        // -1 does not fit an unsigned byte, so the type default applies
        assert_eq!(uint.pad_source(), PadSource::Default);
        assert_eq!(uint.pad_value(), &[254]);
    }

    #[test]
    fn test_char_variable_shape() {
        let mut vdr = VariableRecord::new(VariableKind::Z, "Label", DataType::Char, 1);
        vdr.num_elems = 8;
        vdr.max_rec = -1;
        let fill = AttributeEntry::text("n/a");
        let var =
            Variable::from_record(&vdr, &[], ByteOrder::Big, Majority::Row, None, Some(&fill))
                .unwrap();
        assert_eq!(var.total_records(), 0);
        assert_eq!(var.item_size(), 8);
        assert_eq!(var.values_per_element(), 1);
        assert_eq!(var.pad_value(), b"n/a     ");
    }

    #[test]
    fn test_rejects_mismatched_dims() {
        let mut vdr = record(DataType::Int2);
        vdr.dim_varys.pop();
        assert!(Variable::from_record(&vdr, &[], ByteOrder::Big, Majority::Row, None, None).is_err());
    }
}
