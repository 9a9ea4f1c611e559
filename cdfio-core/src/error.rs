//! Error types for CDF format operations

/// Broad classes of failure, used by callers to decide whether an error
/// aborts a whole-file open, a single request, or only one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCategory {
    /// Malformed records or chain pointers; fatal for the file
    Structural,
    /// Invalid, inverted or out-of-bounds record ranges
    Range,
    /// Target type cannot represent the source type
    Conversion,
    /// A single block failed to decompress
    Decompression,
    /// Suspicious but recoverable layout (e.g. gaps without a sparse policy)
    Consistency,
    /// Buffer sizes and arithmetic overflow
    Bounds,
    /// Underlying storage could not be read or written
    Io,
}

/// Errors that can occur while decoding or encoding CDF structures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdfError {
    /// Buffer too small to hold the requested structure
    InsufficientBuffer,
    /// Leading magic numbers do not identify a CDF file
    InvalidMagic,
    /// Internal format version other than 3
    UnsupportedVersion,
    /// Encoding code not supported (VAX floating point, unknown codes)
    UnsupportedEncoding(u32),
    /// Data type code not present in the type table
    UnknownDataType(i32),
    /// Record carries an unexpected record-type tag
    UnexpectedRecordType { expected: i32, found: i32 },
    /// A file offset points outside the file
    OffsetOutOfBounds,
    /// A record size field is inconsistent with its contents
    InvalidRecordSize,
    /// Index entries overlap or are out of order
    CorruptedIndex,
    /// Index tree or descriptor chain revisits an offset
    ChainCycle,
    /// Compression algorithm other than gzip
    UnsupportedCompression(u32),
    /// Requested record range is inverted or negative
    InvalidRange,
    /// Requested records lie outside the stored records
    RecordOutOfRange,
    /// Target type cannot hold the source type under the precision guard
    IncompatibleConversion,
    /// Block payload could not be inflated
    Decompression,
    /// Trailing digest does not match the file contents
    ChecksumMismatch,
    /// Array size computation would overflow
    ArraySizeOverflow,
    /// Array length is not a multiple of its element size
    ArrayAlignment,
}

impl CdfError {
    /// Category used by the error propagation policy
    pub const fn category(&self) -> ErrorCategory {
        match self {
            CdfError::InvalidMagic
            | CdfError::UnsupportedVersion
            | CdfError::UnsupportedEncoding(_)
            | CdfError::UnknownDataType(_)
            | CdfError::UnexpectedRecordType { .. }
            | CdfError::OffsetOutOfBounds
            | CdfError::InvalidRecordSize
            | CdfError::CorruptedIndex
            | CdfError::ChainCycle
            | CdfError::UnsupportedCompression(_)
            | CdfError::ChecksumMismatch => ErrorCategory::Structural,
            CdfError::InvalidRange | CdfError::RecordOutOfRange => ErrorCategory::Range,
            CdfError::IncompatibleConversion => ErrorCategory::Conversion,
            CdfError::Decompression => ErrorCategory::Decompression,
            CdfError::InsufficientBuffer
            | CdfError::ArraySizeOverflow
            | CdfError::ArrayAlignment => ErrorCategory::Bounds,
        }
    }
}

impl core::fmt::Display for CdfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CdfError::InsufficientBuffer => write!(f, "Insufficient buffer space"),
            CdfError::InvalidMagic => write!(f, "Not a CDF file"),
            CdfError::UnsupportedVersion => write!(f, "Unsupported CDF format version"),
            CdfError::UnsupportedEncoding(code) => write!(f, "Unsupported data encoding {code}"),
            CdfError::UnknownDataType(code) => write!(f, "Unknown data type code {code}"),
            CdfError::UnexpectedRecordType { expected, found } => {
                write!(f, "Expected record type {expected}, found {found}")
            }
            CdfError::OffsetOutOfBounds => write!(f, "Offset points outside the file"),
            CdfError::InvalidRecordSize => write!(f, "Invalid record size"),
            CdfError::CorruptedIndex => write!(f, "Variable index entries overlap or are unordered"),
            CdfError::ChainCycle => write!(f, "Record chain revisits an offset"),
            CdfError::UnsupportedCompression(code) => {
                write!(f, "Unsupported compression type {code}")
            }
            CdfError::InvalidRange => write!(f, "Invalid record range"),
            CdfError::RecordOutOfRange => write!(f, "Records outside the stored range"),
            CdfError::IncompatibleConversion => write!(f, "Incompatible type conversion"),
            CdfError::Decompression => write!(f, "Block decompression failed"),
            CdfError::ChecksumMismatch => write!(f, "Checksum mismatch"),
            CdfError::ArraySizeOverflow => write!(f, "Array size overflow"),
            CdfError::ArrayAlignment => write!(f, "Array size not aligned to element size"),
        }
    }
}

impl core::error::Error for CdfError {}

/// Result type for CDF format operations
pub type Result<T> = core::result::Result<T, CdfError>;
