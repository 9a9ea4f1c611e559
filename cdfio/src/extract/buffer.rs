//! Extraction output buffers

use crate::codec::{read_lane, Scalar};
use crate::{Error, Result};
use cdfio_core::{ByteOrder, CdfElement, CdfError, DataType, Majority, TargetType};

/// Densely packed values of an extracted record range
///
/// Values are stored in the requested byte order. The backing storage is
/// 8-byte aligned, so buffers in native order can be viewed as typed slices
/// without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBuffer {
    words: Vec<u64>,
    len: usize,
    target: TargetType,
    data_type: DataType,
    order: ByteOrder,
    majority: Majority,
    first_record: u64,
    record_count: u64,
    values_per_record: usize,
    value_width: usize,
    dims: Vec<usize>,
}

/// Shape description used to allocate a buffer
#[derive(Debug, Clone)]
pub(crate) struct BufferLayout {
    pub target: TargetType,
    pub data_type: DataType,
    pub order: ByteOrder,
    pub majority: Majority,
    pub values_per_record: usize,
    pub value_width: usize,
    pub dims: Vec<usize>,
}

impl BufferLayout {
    pub fn record_bytes(&self) -> usize {
        self.values_per_record * self.value_width
    }
}

impl RecordBuffer {
    /// Zero-filled buffer for `record_count` records starting at `first_record`
    pub(crate) fn zeroed(layout: BufferLayout, first_record: u64, record_count: u64) -> Result<Self> {
        let len = cdfio_core::validation::checked_record_bytes(record_count, layout.record_bytes())?;
        let mut words = Vec::new();
        words
            .try_reserve_exact(len.div_ceil(8))
            .map_err(|_| CdfError::ArraySizeOverflow)?;
        words.resize(len.div_ceil(8), 0u64);
        Ok(Self {
            words,
            len,
            target: layout.target,
            data_type: layout.data_type,
            order: layout.order,
            majority: layout.majority,
            first_record,
            record_count,
            values_per_record: layout.values_per_record,
            value_width: layout.value_width,
            dims: layout.dims,
        })
    }

    pub(crate) fn empty(layout: BufferLayout) -> Self {
        Self {
            words: Vec::new(),
            len: 0,
            target: layout.target,
            data_type: layout.data_type,
            order: layout.order,
            majority: layout.majority,
            first_record: 0,
            record_count: 0,
            values_per_record: layout.values_per_record,
            value_width: layout.value_width,
            dims: layout.dims,
        }
    }

    /// Raw bytes in the buffer's byte order
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn target(&self) -> TargetType {
        self.target
    }

    /// Type of the variable the values were extracted from
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn majority(&self) -> Majority {
        self.majority
    }

    /// Logical number of the first record in the buffer
    pub fn first_record(&self) -> u64 {
        self.first_record
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Effective dimensions of one record
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn values_per_record(&self) -> usize {
        self.values_per_record
    }

    /// Byte width of one value
    pub fn value_width(&self) -> usize {
        self.value_width
    }

    /// Total number of values
    pub fn len(&self) -> usize {
        if self.value_width == 0 {
            0
        } else {
            self.len / self.value_width
        }
    }

    /// Bytes of the `index`-th record in the buffer
    pub fn record_bytes(&self, index: u64) -> Option<&[u8]> {
        if index >= self.record_count {
            return None;
        }
        let size = self.values_per_record * self.value_width;
        let start = usize::try_from(index).ok()?.checked_mul(size)?;
        self.as_bytes().get(start..start + size)
    }

    /// One value widened to f64; `None` for CHAR buffers or out of range
    pub fn value_f64(&self, index: usize) -> Option<f64> {
        let start = index.checked_mul(self.value_width)?;
        let bytes = self.as_bytes().get(start..start + self.value_width)?;
        self.decode_value(bytes).map(Scalar::as_f64)
    }

    /// All values widened to f64
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.values()
            .filter_map(|bytes| self.decode_value(bytes).map(Scalar::as_f64))
            .collect()
    }

    /// All values as i64; floats are truncated toward zero
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.values()
            .filter_map(|bytes| self.decode_value(bytes))
            .map(|scalar| match scalar {
                Scalar::Int(v) => v,
                Scalar::Float(v) => v as i64,
            })
            .collect()
    }

    /// Strings of a CHAR buffer, one per element, trailing padding removed
    pub fn strings(&self) -> Option<Vec<String>> {
        if !self.data_type.is_char() || self.target != TargetType::Native {
            return None;
        }
        Some(
            self.values()
                .map(|bytes| {
                    let end = bytes
                        .iter()
                        .rposition(|&b| b != 0 && b != b' ')
                        .map_or(0, |p| p + 1);
                    String::from_utf8_lossy(&bytes[..end]).into_owned()
                })
                .collect(),
        )
    }

    /// Zero-copy typed view; requires native byte order and a matching target
    pub fn as_slice<T: CdfElement>(&self) -> Result<&[T]> {
        if !self.order.is_native() || T::TARGET != Some(self.target) {
            return Err(Error::InvalidArgument("buffer type or byte order does not match"));
        }
        bytemuck::try_cast_slice(self.as_bytes())
            .map_err(|_| Error::Format(CdfError::ArrayAlignment))
    }

    fn values(&self) -> std::slice::ChunksExact<'_, u8> {
        self.as_bytes().chunks_exact(self.value_width.max(1))
    }

    fn decode_value(&self, bytes: &[u8]) -> Option<Scalar> {
        let order = self.order;
        Some(match self.target {
            TargetType::F64 => Scalar::Float(order.read_f64(bytes)),
            TargetType::F32 => Scalar::Float(order.read_f32(bytes) as f64),
            TargetType::I64 => Scalar::Int(order.read_u64(bytes) as i64),
            TargetType::I32 => Scalar::Int(order.read_u32(bytes) as i32 as i64),
            TargetType::I16 => Scalar::Int(order.read_u16(bytes) as i16 as i64),
            TargetType::I8 => Scalar::Int(bytes[0] as i8 as i64),
            TargetType::Native if self.data_type.is_char() => return None,
            TargetType::Native => read_lane(self.data_type, order, bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(target: TargetType, width: usize) -> BufferLayout {
        BufferLayout {
            target,
            data_type: DataType::Real8,
            order: ByteOrder::native(),
            majority: Majority::Row,
            values_per_record: 2,
            value_width: width,
            dims: vec![2],
        }
    }

    #[test]
    fn test_typed_views() {
        let mut buf = RecordBuffer::zeroed(layout(TargetType::F64, 8), 10, 3).unwrap();
        for (i, chunk) in buf.as_bytes_mut().chunks_exact_mut(8).enumerate() {
            ByteOrder::native().write_u64((i as f64 * 0.5).to_bits(), chunk);
        }
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.as_slice::<f64>().unwrap(), &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
        assert!(buf.as_slice::<f32>().is_err());
        assert_eq!(buf.value_f64(3), Some(1.5));
        assert_eq!(buf.record_bytes(2).map(<[u8]>::len), Some(16));
        assert_eq!(buf.record_bytes(3), None);
        assert_eq!(buf.first_record(), 10);
        assert_eq!(buf.to_i64_vec(), vec![0, 0, 1, 1, 2, 2]);
        let bytes = buf.clone().into_bytes();
        assert_eq!(bytes.as_slice(), buf.as_bytes());
    }

    #[test]
    fn test_oversized_buffer_is_an_error() {
        let err = RecordBuffer::zeroed(layout(TargetType::F64, 8), 0, 100_000_000_000_000).unwrap_err();
        assert!(matches!(err, Error::Format(CdfError::ArraySizeOverflow)));
        let err = RecordBuffer::zeroed(layout(TargetType::F64, 8), 0, u64::MAX).unwrap_err();
        assert!(matches!(err, Error::Format(CdfError::ArraySizeOverflow)));
    }

    #[test]
    fn test_char_strings() {
        let mut layout = layout(TargetType::Native, 4);
        layout.data_type = DataType::Char;
        layout.values_per_record = 1;
        let mut buf = RecordBuffer::zeroed(layout, 0, 2).unwrap();
        buf.as_bytes_mut().copy_from_slice(b"ab  cde\0");
        assert_eq!(buf.strings(), Some(vec!["ab".to_string(), "cde".to_string()]));
        assert_eq!(buf.value_f64(0), None);
    }
}
