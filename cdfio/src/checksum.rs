//! Trailing MD5 digest
//!
//! When the descriptor's checksum flags are set, the last 16 bytes of the
//! file are the MD5 digest of every byte before them.

use crate::Result;
use cdfio_core::format::constants::MD5_DIGEST_LEN;
use cdfio_core::CdfError;

/// MD5 digest of `bytes`
pub fn digest(bytes: &[u8]) -> [u8; MD5_DIGEST_LEN] {
    md5::compute(bytes).0
}

/// Append the digest of the current contents
pub fn append_digest(bytes: &mut Vec<u8>) {
    let sum = digest(bytes);
    bytes.extend_from_slice(&sum);
}

/// Check the trailing digest of a complete file
pub fn verify(file: &[u8]) -> Result<()> {
    let split = file
        .len()
        .checked_sub(MD5_DIGEST_LEN)
        .ok_or(CdfError::InsufficientBuffer)?;
    let (body, stored) = file.split_at(split);
    if digest(body) != stored {
        return Err(CdfError::ChecksumMismatch.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_verify() {
        let mut bytes = b"record engine".to_vec();
        append_digest(&mut bytes);
        assert_eq!(bytes.len(), 13 + MD5_DIGEST_LEN);
        assert!(verify(&bytes).is_ok());

        bytes[0] ^= 0xFF;
        assert!(matches!(
            verify(&bytes),
            Err(crate::Error::Format(CdfError::ChecksumMismatch))
        ));
        assert!(verify(&[1, 2, 3]).is_err());
    }
}
