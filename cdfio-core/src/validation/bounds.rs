//! Array bounds and size validation
//!
//! Pure arithmetic checks with overflow protection, used when sizing
//! output buffers and block payloads.

use crate::{CdfError, Result};

/// Validate that `byte_len` holds a whole number of `T` values
pub const fn validate_array_bounds<T>(byte_len: usize) -> Result<usize> {
    let element_size = core::mem::size_of::<T>();

    if element_size == 0 || byte_len % element_size != 0 {
        return Err(CdfError::ArrayAlignment);
    }

    let count = byte_len / element_size;

    // Keep headroom for downstream index arithmetic
    if count > usize::MAX / 8 {
        return Err(CdfError::ArraySizeOverflow);
    }

    Ok(count)
}

/// Validate that a byte slice can be reinterpreted as `[T]`
pub fn validate_typed_slice<T>(data: &[u8]) -> Result<usize> {
    if data.as_ptr() as usize % core::mem::align_of::<T>() != 0 {
        return Err(CdfError::ArrayAlignment);
    }
    validate_array_bounds::<T>(data.len())
}

/// Byte length of `records` records of `record_bytes` each
pub const fn checked_record_bytes(records: u64, record_bytes: usize) -> Result<usize> {
    if records > usize::MAX as u64 {
        return Err(CdfError::ArraySizeOverflow);
    }
    match (records as usize).checked_mul(record_bytes) {
        Some(total) => Ok(total),
        None => Err(CdfError::ArraySizeOverflow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_array_bounds() {
        assert_eq!(validate_array_bounds::<u32>(16), Ok(4));
        assert_eq!(validate_array_bounds::<f64>(24), Ok(3));
        assert_eq!(validate_array_bounds::<u32>(15), Err(CdfError::ArrayAlignment));
        assert_eq!(validate_array_bounds::<u8>(0), Ok(0));
    }

    #[test]
    fn test_checked_record_bytes() {
        assert_eq!(checked_record_bytes(100, 8), Ok(800));
        assert_eq!(checked_record_bytes(0, 8), Ok(0));
        assert_eq!(
            checked_record_bytes(u64::MAX, 2),
            Err(CdfError::ArraySizeOverflow)
        );
    }

    #[test]
    fn test_validate_typed_slice() {
        let values = [1.0f64, 2.0];
        let bytes: &[u8] = bytemuck::cast_slice(&values);
        assert_eq!(validate_typed_slice::<f64>(bytes), Ok(2));
        assert_eq!(validate_typed_slice::<f64>(&bytes[..12]), Err(CdfError::ArrayAlignment));
    }
}
