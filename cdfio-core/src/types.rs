//! Data type table for CDF variables and attribute entries
//!
//! Every on-disk type code maps to a fixed [`TypeInfo`] row. Both the read and
//! the write path consult this table, so a value encoded by the writer decodes
//! to the same lane on the reader.

use crate::{CdfError, Result};

/// On-disk data type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum DataType {
    Int1 = 1,
    Int2 = 2,
    Int4 = 4,
    Int8 = 8,
    UInt1 = 11,
    UInt2 = 12,
    UInt4 = 14,
    Real4 = 21,
    Real8 = 22,
    Epoch = 31,
    Epoch16 = 32,
    TimeTt2000 = 33,
    Byte = 41,
    Float = 44,
    Double = 45,
    Char = 51,
    UChar = 52,
}

/// Broad numeric category of a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeCategory {
    Float,
    Double,
    SignedInt,
    UnsignedInt,
    Long,
    Time,
    Char,
}

/// How raw element bytes decode into a value lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeLane {
    /// 4-byte IEEE float
    F32,
    /// 8-byte IEEE double
    F64,
    /// Two's complement integer of the given byte width (1, 2 or 4)
    Signed(u8),
    /// Unsigned integer of the given byte width; read signed then corrected
    Unsigned(u8),
    /// 8-byte signed integer
    I64,
    /// Two consecutive 8-byte doubles (EPOCH16)
    F64Pair,
    /// Uninterpreted bytes
    Bytes,
}

/// One row of the type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub data_type: DataType,
    pub name: &'static str,
    /// Byte width of one value
    pub width: usize,
    pub category: TypeCategory,
    pub lane: DecodeLane,
    /// `2^(8 * width)` for the two integer categories, zero otherwise
    pub correction: i64,
}

const fn row(
    data_type: DataType,
    name: &'static str,
    width: usize,
    category: TypeCategory,
    lane: DecodeLane,
) -> TypeInfo {
    let correction = match category {
        TypeCategory::SignedInt | TypeCategory::UnsignedInt => 1i64 << (8 * width),
        _ => 0,
    };
    TypeInfo {
        data_type,
        name,
        width,
        category,
        lane,
        correction,
    }
}

/// The complete type table, in type-code order
pub const TYPE_TABLE: [TypeInfo; 17] = [
    row(DataType::Int1, "CDF_INT1", 1, TypeCategory::SignedInt, DecodeLane::Signed(1)),
    row(DataType::Int2, "CDF_INT2", 2, TypeCategory::SignedInt, DecodeLane::Signed(2)),
    row(DataType::Int4, "CDF_INT4", 4, TypeCategory::SignedInt, DecodeLane::Signed(4)),
    row(DataType::Int8, "CDF_INT8", 8, TypeCategory::Long, DecodeLane::I64),
    row(DataType::UInt1, "CDF_UINT1", 1, TypeCategory::UnsignedInt, DecodeLane::Unsigned(1)),
    row(DataType::UInt2, "CDF_UINT2", 2, TypeCategory::UnsignedInt, DecodeLane::Unsigned(2)),
    row(DataType::UInt4, "CDF_UINT4", 4, TypeCategory::UnsignedInt, DecodeLane::Unsigned(4)),
    row(DataType::Real4, "CDF_REAL4", 4, TypeCategory::Float, DecodeLane::F32),
    row(DataType::Real8, "CDF_REAL8", 8, TypeCategory::Double, DecodeLane::F64),
    row(DataType::Epoch, "CDF_EPOCH", 8, TypeCategory::Time, DecodeLane::F64),
    row(DataType::Epoch16, "CDF_EPOCH16", 16, TypeCategory::Time, DecodeLane::F64Pair),
    row(DataType::TimeTt2000, "CDF_TIME_TT2000", 8, TypeCategory::Time, DecodeLane::I64),
    row(DataType::Byte, "CDF_BYTE", 1, TypeCategory::SignedInt, DecodeLane::Signed(1)),
    row(DataType::Float, "CDF_FLOAT", 4, TypeCategory::Float, DecodeLane::F32),
    row(DataType::Double, "CDF_DOUBLE", 8, TypeCategory::Double, DecodeLane::F64),
    row(DataType::Char, "CDF_CHAR", 1, TypeCategory::Char, DecodeLane::Bytes),
    row(DataType::UChar, "CDF_UCHAR", 1, TypeCategory::Char, DecodeLane::Bytes),
];

impl DataType {
    /// Convert from the on-disk type code
    pub const fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(DataType::Int1),
            2 => Ok(DataType::Int2),
            4 => Ok(DataType::Int4),
            8 => Ok(DataType::Int8),
            11 => Ok(DataType::UInt1),
            12 => Ok(DataType::UInt2),
            14 => Ok(DataType::UInt4),
            21 => Ok(DataType::Real4),
            22 => Ok(DataType::Real8),
            31 => Ok(DataType::Epoch),
            32 => Ok(DataType::Epoch16),
            33 => Ok(DataType::TimeTt2000),
            41 => Ok(DataType::Byte),
            44 => Ok(DataType::Float),
            45 => Ok(DataType::Double),
            51 => Ok(DataType::Char),
            52 => Ok(DataType::UChar),
            other => Err(CdfError::UnknownDataType(other)),
        }
    }

    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Type table row for this type
    pub const fn info(self) -> &'static TypeInfo {
        let index = match self {
            DataType::Int1 => 0,
            DataType::Int2 => 1,
            DataType::Int4 => 2,
            DataType::Int8 => 3,
            DataType::UInt1 => 4,
            DataType::UInt2 => 5,
            DataType::UInt4 => 6,
            DataType::Real4 => 7,
            DataType::Real8 => 8,
            DataType::Epoch => 9,
            DataType::Epoch16 => 10,
            DataType::TimeTt2000 => 11,
            DataType::Byte => 12,
            DataType::Float => 13,
            DataType::Double => 14,
            DataType::Char => 15,
            DataType::UChar => 16,
        };
        &TYPE_TABLE[index]
    }

    pub const fn size_bytes(self) -> usize {
        self.info().width
    }

    pub const fn category(self) -> TypeCategory {
        self.info().category
    }

    pub const fn lane(self) -> DecodeLane {
        self.info().lane
    }

    pub const fn is_char(self) -> bool {
        matches!(self.info().category, TypeCategory::Char)
    }

    /// Number of scalar lanes one element decodes into
    pub const fn lanes_per_value(self) -> usize {
        match self.info().lane {
            DecodeLane::F64Pair => 2,
            _ => 1,
        }
    }

    /// Default pad value bytes when neither the descriptor nor a FILLVAL
    /// attribute supplies one. Written into `out` with the given order.
    pub fn default_pad(self, order: crate::ByteOrder, out: &mut [u8]) {
        match self {
            DataType::Int1 | DataType::Byte => out[0] = (-127i8) as u8,
            DataType::UInt1 => out[0] = 254,
            DataType::Int2 => order.write_u16((-32767i16) as u16, out),
            DataType::UInt2 => order.write_u16(65534, out),
            DataType::Int4 => order.write_u32((-2147483647i32) as u32, out),
            DataType::UInt4 => order.write_u32(4294967294, out),
            DataType::Int8 | DataType::TimeTt2000 => {
                order.write_u64((-9223372036854775807i64) as u64, out)
            }
            DataType::Real4 | DataType::Float => order.write_u32((-1.0e30f32).to_bits(), out),
            DataType::Real8 | DataType::Double => order.write_u64((-1.0e30f64).to_bits(), out),
            DataType::Epoch => order.write_u64(0f64.to_bits(), out),
            DataType::Epoch16 => {
                order.write_u64(0f64.to_bits(), out);
                order.write_u64(0f64.to_bits(), &mut out[8..]);
            }
            DataType::Char | DataType::UChar => out[0] = b' ',
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.info().name)
    }
}

/// Value type of an extraction output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetType {
    F64,
    F32,
    I64,
    I32,
    I16,
    I8,
    /// The variable's own element bytes, reordered to the requested byte order
    Native,
}

impl TargetType {
    /// Byte width of one output value; `None` for `Native`
    pub const fn width(self) -> Option<usize> {
        match self {
            TargetType::F64 | TargetType::I64 => Some(8),
            TargetType::F32 | TargetType::I32 => Some(4),
            TargetType::I16 => Some(2),
            TargetType::I8 => Some(1),
            TargetType::Native => None,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "f64" | "double" => Some(TargetType::F64),
            "f32" | "float" => Some(TargetType::F32),
            "i64" | "long" => Some(TargetType::I64),
            "i32" | "int" => Some(TargetType::I32),
            "i16" | "short" => Some(TargetType::I16),
            "i8" | "byte" => Some(TargetType::I8),
            "native" => Some(TargetType::Native),
            _ => None,
        }
    }
}

impl core::fmt::Display for TargetType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            TargetType::F64 => "f64",
            TargetType::F32 => "f32",
            TargetType::I64 => "i64",
            TargetType::I32 => "i32",
            TargetType::I16 => "i16",
            TargetType::I8 => "i8",
            TargetType::Native => "native",
        };
        write!(f, "{name}")
    }
}

/// Whether a source→target conversion keeps every representable value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Lossless,
    Lossy,
    Unsupported,
}

/// Classify converting values of `source` into `target`
pub const fn classify_conversion(source: DataType, target: TargetType) -> Conversion {
    use Conversion::*;
    if matches!(target, TargetType::Native) {
        return Lossless;
    }
    match source.info().lane {
        DecodeLane::Bytes => Unsupported,
        DecodeLane::F64Pair => match target {
            TargetType::F64 => Lossless,
            _ => Unsupported,
        },
        DecodeLane::F32 => match target {
            TargetType::F64 | TargetType::F32 => Lossless,
            _ => Lossy,
        },
        DecodeLane::F64 => match target {
            TargetType::F64 => Lossless,
            _ => Lossy,
        },
        DecodeLane::I64 => match target {
            TargetType::I64 => Lossless,
            _ => Lossy,
        },
        DecodeLane::Signed(width) => {
            let bits = width as usize * 8;
            if integer_target_holds(target, bits, true) {
                Lossless
            } else {
                Lossy
            }
        }
        DecodeLane::Unsigned(width) => {
            let bits = width as usize * 8;
            if integer_target_holds(target, bits, false) {
                Lossless
            } else {
                Lossy
            }
        }
    }
}

/// Whether `target` holds every value of a `bits`-wide integer
const fn integer_target_holds(target: TargetType, bits: usize, signed: bool) -> bool {
    // Significand widths bound exact float representation.
    let capacity = match target {
        TargetType::F64 => 53,
        TargetType::F32 => 24,
        TargetType::I64 => 64,
        TargetType::I32 => 32,
        TargetType::I16 => 16,
        TargetType::I8 => 8,
        TargetType::Native => return true,
    };
    let is_float = matches!(target, TargetType::F64 | TargetType::F32);
    if is_float {
        bits <= capacity
    } else if signed {
        bits <= capacity
    } else {
        bits < capacity
    }
}

/// Precision guard evaluated before any extraction buffer is allocated
pub const fn check_conversion(source: DataType, target: TargetType, preserve: bool) -> Result<()> {
    match classify_conversion(source, target) {
        Conversion::Lossless => Ok(()),
        Conversion::Lossy if !preserve => Ok(()),
        _ => Err(CdfError::IncompatibleConversion),
    }
}
