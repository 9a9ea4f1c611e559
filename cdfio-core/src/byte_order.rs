//! Byte order, data encodings and storage majority
//!
//! Internal record fields are always big-endian; data values follow the
//! file's encoding. Only encodings with IEEE 754 floating point are accepted.

use crate::{CdfError, Result};

/// Byte order of data values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order of the running host
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub const fn is_native(self) -> bool {
        matches!(
            (self, Self::native()),
            (ByteOrder::Big, ByteOrder::Big) | (ByteOrder::Little, ByteOrder::Little)
        )
    }

    #[inline]
    pub fn read_u16(self, b: &[u8]) -> u16 {
        let a = [b[0], b[1]];
        match self {
            ByteOrder::Big => u16::from_be_bytes(a),
            ByteOrder::Little => u16::from_le_bytes(a),
        }
    }

    #[inline]
    pub fn read_u32(self, b: &[u8]) -> u32 {
        let a = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::Big => u32::from_be_bytes(a),
            ByteOrder::Little => u32::from_le_bytes(a),
        }
    }

    #[inline]
    pub fn read_u64(self, b: &[u8]) -> u64 {
        let a = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        match self {
            ByteOrder::Big => u64::from_be_bytes(a),
            ByteOrder::Little => u64::from_le_bytes(a),
        }
    }

    #[inline]
    pub fn read_f32(self, b: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(b))
    }

    #[inline]
    pub fn read_f64(self, b: &[u8]) -> f64 {
        f64::from_bits(self.read_u64(b))
    }

    #[inline]
    pub fn write_u16(self, v: u16, out: &mut [u8]) {
        let b = match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        out[..2].copy_from_slice(&b);
    }

    #[inline]
    pub fn write_u32(self, v: u32, out: &mut [u8]) {
        let b = match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        out[..4].copy_from_slice(&b);
    }

    #[inline]
    pub fn write_u64(self, v: u64, out: &mut [u8]) {
        let b = match self {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        out[..8].copy_from_slice(&b);
    }

    /// Reverse each `width`-byte element in place when the two orders differ
    pub fn swap_elements(from: ByteOrder, to: ByteOrder, width: usize, data: &mut [u8]) {
        if from == to || width <= 1 {
            return;
        }
        for element in data.chunks_exact_mut(width) {
            element.reverse();
        }
    }
}

impl core::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ByteOrder::Big => write!(f, "big-endian"),
            ByteOrder::Little => write!(f, "little-endian"),
        }
    }
}

/// Data encodings recorded in the CDF descriptor record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum Encoding {
    Network = 1,
    Sun = 2,
    DecStation = 4,
    Sgi = 5,
    IbmPc = 6,
    IbmRs = 7,
    Ppc = 9,
    Hp = 11,
    NeXT = 12,
    AlphaOsf1 = 13,
    ArmLittle = 17,
    ArmBig = 18,
}

impl Encoding {
    /// Convert from the on-disk code, rejecting VAX-family encodings
    pub const fn from_u32(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Encoding::Network),
            2 => Ok(Encoding::Sun),
            4 => Ok(Encoding::DecStation),
            5 => Ok(Encoding::Sgi),
            6 => Ok(Encoding::IbmPc),
            7 => Ok(Encoding::IbmRs),
            9 => Ok(Encoding::Ppc),
            11 => Ok(Encoding::Hp),
            12 => Ok(Encoding::NeXT),
            13 => Ok(Encoding::AlphaOsf1),
            17 => Ok(Encoding::ArmLittle),
            18 => Ok(Encoding::ArmBig),
            other => Err(CdfError::UnsupportedEncoding(other)),
        }
    }

    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    /// Byte order of data values under this encoding
    pub const fn byte_order(self) -> ByteOrder {
        match self {
            Encoding::DecStation | Encoding::IbmPc | Encoding::AlphaOsf1 | Encoding::ArmLittle => {
                ByteOrder::Little
            }
            _ => ByteOrder::Big,
        }
    }

    /// Canonical encoding for a byte order
    pub const fn for_order(order: ByteOrder) -> Self {
        match order {
            ByteOrder::Big => Encoding::Network,
            ByteOrder::Little => Encoding::IbmPc,
        }
    }
}

/// Storage order of multi-dimensional record values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Majority {
    /// Last index varies fastest
    Row,
    /// First index varies fastest
    Column,
}

impl core::fmt::Display for Majority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Majority::Row => write!(f, "row"),
            Majority::Column => write!(f, "column"),
        }
    }
}
