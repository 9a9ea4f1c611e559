//! Scalar lane codec shared by the attribute store and the writer
//!
//! A lane is one scalar slot of an element: one value for numeric types,
//! two doubles for EPOCH16. Reads apply the unsigned correction from the
//! type table; writes only succeed when the value is represented exactly.

use cdfio_core::{ByteOrder, DataType, DecodeLane};

/// One decoded lane value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }
}

const F32_EXACT_INT: i64 = 1 << 24;
const F64_EXACT_INT: i64 = 1 << 53;

/// Decode the lane at the start of `bytes`
pub fn read_lane(data_type: DataType, order: ByteOrder, bytes: &[u8]) -> Scalar {
    match data_type.lane() {
        DecodeLane::F32 => Scalar::Float(order.read_f32(bytes) as f64),
        DecodeLane::F64 | DecodeLane::F64Pair => Scalar::Float(order.read_f64(bytes)),
        DecodeLane::I64 => Scalar::Int(order.read_u64(bytes) as i64),
        DecodeLane::Signed(width) => Scalar::Int(read_signed(width, order, bytes)),
        DecodeLane::Unsigned(width) => {
            let raw = read_signed(width, order, bytes);
            if raw < 0 {
                Scalar::Int(raw + data_type.info().correction)
            } else {
                Scalar::Int(raw)
            }
        }
        DecodeLane::Bytes => Scalar::Int(bytes[0] as i64),
    }
}

#[inline]
pub(crate) fn read_signed(width: u8, order: ByteOrder, bytes: &[u8]) -> i64 {
    match width {
        1 => bytes[0] as i8 as i64,
        2 => order.read_u16(bytes) as i16 as i64,
        _ => order.read_u32(bytes) as i32 as i64,
    }
}

/// Encode `value` as one lane of `data_type`; false when it does not fit.
/// Integers must always fit exactly. With `exact` unset a double may be
/// rounded to the nearest single-precision value.
pub fn write_lane(
    data_type: DataType,
    order: ByteOrder,
    value: Scalar,
    out: &mut [u8],
    exact: bool,
) -> bool {
    match data_type.lane() {
        DecodeLane::F32 => match exact_float(value, F32_EXACT_INT) {
            Some(v) if !exact || v.is_nan() || (v as f32) as f64 == v => {
                order.write_u32((v as f32).to_bits(), out);
                true
            }
            _ => false,
        },
        DecodeLane::F64 | DecodeLane::F64Pair => match exact_float(value, F64_EXACT_INT) {
            Some(v) => {
                order.write_u64(v.to_bits(), out);
                true
            }
            None => false,
        },
        DecodeLane::I64 => match exact_int(value, i64::MIN as i128, i64::MAX as i128) {
            Some(v) => {
                order.write_u64(v as u64, out);
                true
            }
            None => false,
        },
        DecodeLane::Signed(width) => {
            let bits = 8 * width as u32;
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            match exact_int(value, min, max) {
                Some(v) => {
                    write_int(width, order, v, out);
                    true
                }
                None => false,
            }
        }
        DecodeLane::Unsigned(width) => {
            let max = (1i128 << (8 * width as u32)) - 1;
            match exact_int(value, 0, max) {
                Some(v) => {
                    write_int(width, order, v, out);
                    true
                }
                None => false,
            }
        }
        DecodeLane::Bytes => match exact_int(value, 0, 255) {
            Some(v) => {
                out[0] = v as u8;
                true
            }
            None => false,
        },
    }
}

fn write_int(width: u8, order: ByteOrder, value: i64, out: &mut [u8]) {
    match width {
        1 => out[0] = value as u8,
        2 => order.write_u16(value as u16, out),
        _ => order.write_u32(value as u32, out),
    }
}

fn exact_float(value: Scalar, exact_int_limit: i64) -> Option<f64> {
    match value {
        Scalar::Float(v) => Some(v),
        Scalar::Int(v) if v.unsigned_abs() <= exact_int_limit as u64 => Some(v as f64),
        Scalar::Int(_) => None,
    }
}

fn exact_int(value: Scalar, min: i128, max: i128) -> Option<i64> {
    let v = match value {
        Scalar::Int(v) => v as i128,
        Scalar::Float(f) => {
            if !f.is_finite() || f.fract() != 0.0 || f < -9.3e18 || f > 9.3e18 {
                return None;
            }
            f as i128
        }
    };
    (min..=max).contains(&v).then_some(v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_lane_correction() {
        assert_eq!(read_lane(DataType::UInt1, ByteOrder::Big, &[0xFF]), Scalar::Int(255));
        assert_eq!(read_lane(DataType::Int1, ByteOrder::Big, &[0xFF]), Scalar::Int(-1));
        assert_eq!(
            read_lane(DataType::UInt4, ByteOrder::Little, &[0xFF, 0xFF, 0xFF, 0xFF]),
            Scalar::Int(4294967295)
        );
    }

    #[test]
    fn test_write_lane_exactness() {
        let mut buf = [0u8; 8];
        assert!(write_lane(DataType::UInt1, ByteOrder::Big, Scalar::Int(255), &mut buf, true));
        assert!(!write_lane(DataType::UInt1, ByteOrder::Big, Scalar::Int(256), &mut buf, true));
        assert!(!write_lane(DataType::Int2, ByteOrder::Big, Scalar::Float(1.5), &mut buf, true));
        assert!(write_lane(DataType::Int2, ByteOrder::Big, Scalar::Float(-2.0), &mut buf, true));
        assert_eq!(read_lane(DataType::Int2, ByteOrder::Big, &buf), Scalar::Int(-2));
        assert!(write_lane(DataType::Real4, ByteOrder::Little, Scalar::Float(0.5), &mut buf, true));
        assert!(!write_lane(DataType::Real4, ByteOrder::Little, Scalar::Float(0.1), &mut buf, true));
        assert!(write_lane(DataType::Real4, ByteOrder::Little, Scalar::Float(0.1), &mut buf, false));
        assert!(!write_lane(DataType::Real8, ByteOrder::Big, Scalar::Int(i64::MAX), &mut buf, true));
        assert!(write_lane(DataType::Int8, ByteOrder::Big, Scalar::Int(i64::MIN), &mut buf, true));
        assert_eq!(read_lane(DataType::Int8, ByteOrder::Big, &buf), Scalar::Int(i64::MIN));
    }
}
