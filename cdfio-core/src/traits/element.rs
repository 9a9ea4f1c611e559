//! Element type constraints for typed CDF data
//!
//! This module defines the trait for Rust primitives that can be written
//! into a CDF variable or viewed from an extraction buffer.

use crate::{ByteOrder, DataType, TargetType};

/// Trait for types that can be stored as variable values
///
/// All element types are plain-old-data so that output buffers in native
/// byte order can be viewed without copying.
pub trait CdfElement: bytemuck::Pod + PartialEq + core::fmt::Debug + Send + Sync {
    /// Natural CDF data type for this element
    const DATA_TYPE: DataType;

    /// Extraction target producing this element, if any
    const TARGET: Option<TargetType>;

    /// Decode from the leading bytes of `bytes`
    fn read(order: ByteOrder, bytes: &[u8]) -> Self;

    /// Encode into the leading bytes of `out`
    fn write(self, order: ByteOrder, out: &mut [u8]);

    /// Convert to f64 for generic operations
    fn to_f64(self) -> f64;
}

macro_rules! impl_cdf_element {
    ($type:ty, $data_type:expr, $target:expr, $bits:ty, $read:ident, $write:ident) => {
        impl CdfElement for $type {
            const DATA_TYPE: DataType = $data_type;
            const TARGET: Option<TargetType> = $target;

            #[inline]
            fn read(order: ByteOrder, bytes: &[u8]) -> Self {
                <$type>::from_bits_compat(order.$read(bytes) as $bits)
            }

            #[inline]
            fn write(self, order: ByteOrder, out: &mut [u8]) {
                order.$write(self.to_bits_compat() as _, out)
            }

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

/// Bit-level conversions shared by integers and floats
trait BitsCompat: Sized {
    type Bits;
    fn from_bits_compat(bits: Self::Bits) -> Self;
    fn to_bits_compat(self) -> Self::Bits;
}

macro_rules! impl_bits_int {
    ($type:ty, $bits:ty) => {
        impl BitsCompat for $type {
            type Bits = $bits;
            #[inline]
            fn from_bits_compat(bits: $bits) -> Self {
                bits as $type
            }
            #[inline]
            fn to_bits_compat(self) -> $bits {
                self as $bits
            }
        }
    };
}

impl_bits_int!(i16, u16);
impl_bits_int!(u16, u16);
impl_bits_int!(i32, u32);
impl_bits_int!(u32, u32);
impl_bits_int!(i64, u64);

impl BitsCompat for f32 {
    type Bits = u32;
    #[inline]
    fn from_bits_compat(bits: u32) -> Self {
        f32::from_bits(bits)
    }
    #[inline]
    fn to_bits_compat(self) -> u32 {
        self.to_bits()
    }
}

impl BitsCompat for f64 {
    type Bits = u64;
    #[inline]
    fn from_bits_compat(bits: u64) -> Self {
        f64::from_bits(bits)
    }
    #[inline]
    fn to_bits_compat(self) -> u64 {
        self.to_bits()
    }
}

impl_cdf_element!(i16, DataType::Int2, Some(TargetType::I16), u16, read_u16, write_u16);
impl_cdf_element!(u16, DataType::UInt2, None, u16, read_u16, write_u16);
impl_cdf_element!(i32, DataType::Int4, Some(TargetType::I32), u32, read_u32, write_u32);
impl_cdf_element!(u32, DataType::UInt4, None, u32, read_u32, write_u32);
impl_cdf_element!(i64, DataType::Int8, Some(TargetType::I64), u64, read_u64, write_u64);
impl_cdf_element!(f32, DataType::Real4, Some(TargetType::F32), u32, read_u32, write_u32);
impl_cdf_element!(f64, DataType::Real8, Some(TargetType::F64), u64, read_u64, write_u64);

impl CdfElement for i8 {
    const DATA_TYPE: DataType = DataType::Int1;
    const TARGET: Option<TargetType> = Some(TargetType::I8);

    #[inline]
    fn read(_order: ByteOrder, bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    #[inline]
    fn write(self, _order: ByteOrder, out: &mut [u8]) {
        out[0] = self as u8;
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl CdfElement for u8 {
    const DATA_TYPE: DataType = DataType::UInt1;
    const TARGET: Option<TargetType> = None;

    #[inline]
    fn read(_order: ByteOrder, bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline]
    fn write(self, _order: ByteOrder, out: &mut [u8]) {
        out[0] = self;
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: CdfElement>(value: T, order: ByteOrder) -> T {
        let mut buf = [0u8; 8];
        value.write(order, &mut buf);
        T::read(order, &buf)
    }

    #[test]
    fn test_element_roundtrip() {
        assert_eq!(roundtrip(-5i16, ByteOrder::Big), -5);
        assert_eq!(roundtrip(65535u16, ByteOrder::Little), 65535);
        assert_eq!(roundtrip(-1.0e31f64, ByteOrder::Big), -1.0e31);
        assert_eq!(roundtrip(1.5f32, ByteOrder::Little), 1.5);
        assert_eq!(roundtrip(i64::MIN, ByteOrder::Big), i64::MIN);
        assert_eq!(roundtrip(-128i8, ByteOrder::Big), -128);
    }

    #[test]
    fn test_element_type_mapping() {
        assert_eq!(<u32 as CdfElement>::DATA_TYPE, DataType::UInt4);
        assert_eq!(<f64 as CdfElement>::TARGET, Some(TargetType::F64));
        assert_eq!(<u8 as CdfElement>::TARGET, None);
    }
}
