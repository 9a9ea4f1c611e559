//! Chunked value decoding
//!
//! Stored element bytes are decoded lane by lane into a scratch array of
//! at most `chunk_lanes` values, then encoded into the output in the
//! target type and byte order. Dispatch is a match on the decode lane and
//! target, made once per chunk.

use crate::codec::read_signed;
use cdfio_core::{ByteOrder, DataType, DecodeLane, TargetType};

enum Scratch {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

/// Converts stored records into output values
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoder {
    data_type: DataType,
    source_order: ByteOrder,
    target: TargetType,
    output_order: ByteOrder,
    chunk_lanes: usize,
}

impl Decoder {
    pub fn new(
        data_type: DataType,
        source_order: ByteOrder,
        target: TargetType,
        output_order: ByteOrder,
        chunk_lanes: usize,
    ) -> Self {
        Self {
            data_type,
            source_order,
            target,
            output_order,
            chunk_lanes: chunk_lanes.max(1),
        }
    }

    /// Stored bytes of one lane
    pub fn source_lane_width(&self) -> usize {
        self.data_type.size_bytes() / self.data_type.lanes_per_value()
    }

    /// Output bytes of one lane
    pub fn output_lane_width(&self) -> usize {
        self.target.width().unwrap_or_else(|| self.source_lane_width())
    }

    /// Output bytes for `source_len` stored bytes
    pub fn output_len(&self, source_len: usize) -> usize {
        source_len / self.source_lane_width() * self.output_lane_width()
    }

    /// Decode whole stored records in `src` into `dst`
    pub fn decode(&self, src: &[u8], dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), self.output_len(src.len()));
        if self.target == TargetType::Native {
            dst.copy_from_slice(src);
            ByteOrder::swap_elements(
                self.source_order,
                self.output_order,
                self.source_lane_width(),
                dst,
            );
            return;
        }

        let in_width = self.source_lane_width();
        let out_width = self.output_lane_width();
        let lanes = src.len() / in_width;
        let chunk = self.chunk_lanes.min(lanes.max(1));
        let mut scratch = match self.data_type.lane() {
            DecodeLane::F32 | DecodeLane::F64 | DecodeLane::F64Pair => {
                Scratch::Float(vec![0.0; chunk])
            }
            _ => Scratch::Int(vec![0; chunk]),
        };

        for (src_chunk, dst_chunk) in src
            .chunks(chunk * in_width)
            .zip(dst.chunks_mut(chunk * out_width))
        {
            let n = src_chunk.len() / in_width;
            self.decode_chunk(src_chunk, &mut scratch, n);
            self.encode_chunk(&scratch, n, dst_chunk);
        }
    }

    fn decode_chunk(&self, src: &[u8], scratch: &mut Scratch, n: usize) {
        let order = self.source_order;
        let width = self.source_lane_width();
        let lanes = src.chunks_exact(width).take(n);
        match (self.data_type.lane(), scratch) {
            (DecodeLane::F32, Scratch::Float(out)) => {
                for (slot, b) in out.iter_mut().zip(lanes) {
                    *slot = order.read_f32(b) as f64;
                }
            }
            (DecodeLane::F64 | DecodeLane::F64Pair, Scratch::Float(out)) => {
                for (slot, b) in out.iter_mut().zip(lanes) {
                    *slot = order.read_f64(b);
                }
            }
            (DecodeLane::Signed(w), Scratch::Int(out)) => {
                for (slot, b) in out.iter_mut().zip(lanes) {
                    *slot = read_signed(w, order, b);
                }
            }
            (DecodeLane::Unsigned(w), Scratch::Int(out)) => {
                let correction = self.data_type.info().correction;
                for (slot, b) in out.iter_mut().zip(lanes) {
                    let raw = read_signed(w, order, b);
                    *slot = if raw < 0 { raw + correction } else { raw };
                }
            }
            (DecodeLane::I64, Scratch::Int(out)) => {
                for (slot, b) in out.iter_mut().zip(lanes) {
                    *slot = order.read_u64(b) as i64;
                }
            }
            (DecodeLane::Bytes, Scratch::Int(out)) => {
                for (slot, b) in out.iter_mut().zip(lanes) {
                    *slot = b[0] as i64;
                }
            }
            // Scratch kind is chosen from the lane in `decode`
            _ => {}
        }
    }

    fn encode_chunk(&self, scratch: &Scratch, n: usize, dst: &mut [u8]) {
        let order = self.output_order;
        let width = self.output_lane_width();
        let slots = dst.chunks_exact_mut(width).take(n);
        match scratch {
            Scratch::Float(values) => match self.target {
                TargetType::F64 => slots.zip(values).for_each(|(o, &v)| order.write_u64(v.to_bits(), o)),
                TargetType::F32 => slots.zip(values).for_each(|(o, &v)| order.write_u32((v as f32).to_bits(), o)),
                TargetType::I64 => slots.zip(values).for_each(|(o, &v)| order.write_u64(v as i64 as u64, o)),
                TargetType::I32 => slots.zip(values).for_each(|(o, &v)| order.write_u32(v as i32 as u32, o)),
                TargetType::I16 => slots.zip(values).for_each(|(o, &v)| order.write_u16(v as i16 as u16, o)),
                TargetType::I8 => slots.zip(values).for_each(|(o, &v)| o[0] = v as i8 as u8),
                TargetType::Native => {}
            },
            Scratch::Int(values) => match self.target {
                TargetType::F64 => slots.zip(values).for_each(|(o, &v)| order.write_u64((v as f64).to_bits(), o)),
                TargetType::F32 => slots.zip(values).for_each(|(o, &v)| order.write_u32((v as f32).to_bits(), o)),
                TargetType::I64 => slots.zip(values).for_each(|(o, &v)| order.write_u64(v as u64, o)),
                TargetType::I32 => slots.zip(values).for_each(|(o, &v)| order.write_u32(v as i32 as u32, o)),
                TargetType::I16 => slots.zip(values).for_each(|(o, &v)| order.write_u16(v as i16 as u16, o)),
                TargetType::I8 => slots.zip(values).for_each(|(o, &v)| o[0] = v as i8 as u8),
                TargetType::Native => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(dt: DataType, order: ByteOrder, target: TargetType, src: &[u8], chunk: usize) -> Vec<u8> {
        let decoder = Decoder::new(dt, order, target, ByteOrder::Little, chunk);
        let mut out = vec![0u8; decoder.output_len(src.len())];
        decoder.decode(src, &mut out);
        out
    }

    #[test]
    fn test_unsigned_byte_decodes_to_255() {
        let out = decode(DataType::UInt1, ByteOrder::Big, TargetType::I16, &[0xFF, 0x01], 1024);
        assert_eq!(out, [0xFF, 0x00, 0x01, 0x00]);
        let out = decode(DataType::UInt1, ByteOrder::Big, TargetType::F64, &[0xFF], 1024);
        assert_eq!(f64::from_le_bytes(out.try_into().unwrap()), 255.0);
    }

    #[test]
    fn test_float_widening_and_int64_lane() {
        let src = 1.5f32.to_be_bytes();
        let out = decode(DataType::Real4, ByteOrder::Big, TargetType::F64, &src, 1024);
        assert_eq!(f64::from_le_bytes(out.try_into().unwrap()), 1.5);

        let big = (1i64 << 60) + 1;
        let out = decode(DataType::Int8, ByteOrder::Big, TargetType::I64, &big.to_be_bytes(), 1024);
        assert_eq!(i64::from_le_bytes(out.try_into().unwrap()), big);
    }

    #[test]
    fn test_native_swaps_lanes() {
        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let out = decode(DataType::Int2, ByteOrder::Big, TargetType::Native, &src, 2);
        assert_eq!(out, [2, 1, 4, 3, 6, 5, 8, 7]);
        let text = decode(DataType::Char, ByteOrder::Big, TargetType::Native, b"abc", 2);
        assert_eq!(text, b"abc");
    }

    #[test]
    fn test_chunking_is_transparent() {
        let src: Vec<u8> = (0..3000i32).flat_map(|v| (v - 1500).to_be_bytes()).collect();
        let chunked = decode(DataType::Int4, ByteOrder::Big, TargetType::F64, &src, 1024);
        let whole = decode(DataType::Int4, ByteOrder::Big, TargetType::F64, &src, 3000);
        let tiny = decode(DataType::Int4, ByteOrder::Big, TargetType::F64, &src, 7);
        assert_eq!(chunked, whole);
        assert_eq!(tiny, whole);
    }

    #[test]
    fn test_epoch16_two_lanes() {
        let mut src = Vec::new();
        src.extend_from_slice(&63_000_000_000f64.to_le_bytes());
        src.extend_from_slice(&5.0e11f64.to_le_bytes());
        let out = decode(DataType::Epoch16, ByteOrder::Little, TargetType::F64, &src, 1024);
        assert_eq!(out, src);
    }
}
