//! Format constants and magic numbers for the CDF v3 internal format

/// First magic word of a version 3 file
pub const MAGIC_V3: u32 = 0xCDF3_0001;

/// Second magic word of an uncompressed file
pub const MAGIC_UNCOMPRESSED: u32 = 0x0000_FFFF;

/// Second magic word of a whole-file compressed file
pub const MAGIC_COMPRESSED: u32 = 0xCCCC_0001;

/// Size of the two magic words
pub const MAGIC_SIZE: usize = 8;

/// Offset of the CDF descriptor record
pub const CDR_OFFSET: u64 = MAGIC_SIZE as u64;

/// Length of fixed name fields in descriptors
pub const NAME_LEN: usize = 256;

/// Length of the copyright field in the CDF descriptor record
pub const COPYRIGHT_LEN: usize = 256;

/// Offsets of "none" in 64-bit pointer fields
pub const NULL_OFFSET: u64 = 0;

/// Some writers store -1 instead of 0 in unused 64-bit pointers
pub const NULL_OFFSET_ALT: u64 = u64::MAX;

/// Size in bytes of the trailing MD5 digest
pub const MD5_DIGEST_LEN: usize = 16;

/// Delimiter joining multiple strings in one CHAR attribute entry
pub const STRING_DELIMITER: &[u8] = b"\\N ";

/// Record-type tags
pub mod record_type {
    pub const CDR: i32 = 1;
    pub const GDR: i32 = 2;
    pub const RVDR: i32 = 3;
    pub const ADR: i32 = 4;
    pub const AGR_EDR: i32 = 5;
    pub const VXR: i32 = 6;
    pub const VVR: i32 = 7;
    pub const ZVDR: i32 = 8;
    pub const AZ_EDR: i32 = 9;
    pub const CCR: i32 = 10;
    pub const CPR: i32 = 11;
    pub const SPR: i32 = 12;
    pub const CVVR: i32 = 13;
    pub const UIR: i32 = -1;
}

/// CDR flag bits
pub mod cdr_flags {
    pub const ROW_MAJORITY: u32 = 1 << 0;
    pub const SINGLE_FILE: u32 = 1 << 1;
    pub const CHECKSUM: u32 = 1 << 2;
    pub const MD5_CHECKSUM: u32 = 1 << 3;
}

/// VDR flag bits
pub mod vdr_flags {
    pub const RECORD_VARIANCE: u32 = 1 << 0;
    pub const PAD_VALUE: u32 = 1 << 1;
    pub const COMPRESSION: u32 = 1 << 2;
}

/// Compression type codes used in CPR records
pub mod compression {
    pub const NONE: u32 = 0;
    pub const RLE: u32 = 1;
    pub const HUFF: u32 = 2;
    pub const AHUFF: u32 = 3;
    pub const GZIP: u32 = 5;
}

/// Library version this crate writes into new files
pub const WRITE_VERSION: u32 = 3;
pub const WRITE_RELEASE: u32 = 9;
pub const WRITE_INCREMENT: u32 = 0;

/// Leap-second table date written into new global descriptors
pub const LEAP_SECOND_LAST_UPDATED: i32 = 20170101;

/// Default number of entries per index record when writing
pub const DEFAULT_VXR_FANOUT: usize = 10;
