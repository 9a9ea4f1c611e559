//! Error types for the CDF engine
//!
//! Wraps the format-level [`CdfError`] and adds I/O failures and the
//! contextual errors raised by extraction requests and the writer.

use cdfio_core::{CdfError, DataType, ErrorCategory, TargetType};
use std::sync::Arc;

/// Errors raised while opening, reading or writing CDF files
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Format(#[from] CdfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "async")]
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("variable '{0}' is already defined")]
    DuplicateVariable(String),

    #[error("invalid record range [{first}, {last}]")]
    InvalidRange { first: i64, last: i64 },

    #[error("records [{first}, {last}] of '{variable}' lie outside the stored records")]
    RecordOutOfRange {
        variable: String,
        first: u64,
        last: u64,
    },

    #[error("cannot convert {from} to {to} without losing precision")]
    IncompatibleConversion { from: DataType, to: TargetType },

    #[error("'{variable}' has no sparse record policy; append starting at record {found} leaves a gap after {expected}")]
    RecordGap {
        variable: String,
        expected: u64,
        found: u64,
    },

    #[error("append to '{variable}' at record {first} overlaps committed records up to {committed}")]
    RecordOverlap {
        variable: String,
        first: u64,
        committed: u64,
    },

    #[error("expected {expected} values or bytes, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("value {index} does not fit {data_type} exactly")]
    ValueOutOfRange { data_type: DataType, index: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("background extraction failed: {0}")]
    Extraction(Arc<Error>),
}

impl Error {
    /// Category used by the propagation policy
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Format(e) => e.category(),
            Error::Io(_) => ErrorCategory::Io,
            #[cfg(feature = "http")]
            Error::Http(_) => ErrorCategory::Io,
            #[cfg(feature = "async")]
            Error::Join(_) => ErrorCategory::Io,
            Error::InvalidRange { .. } | Error::RecordOutOfRange { .. } => ErrorCategory::Range,
            Error::IncompatibleConversion { .. } | Error::ValueOutOfRange { .. } => {
                ErrorCategory::Conversion
            }
            Error::RecordGap { .. } | Error::RecordOverlap { .. } => ErrorCategory::Range,
            Error::UnknownVariable(_)
            | Error::DuplicateVariable(_)
            | Error::LengthMismatch { .. }
            | Error::InvalidArgument(_) => ErrorCategory::Bounds,
            Error::Extraction(inner) => inner.category(),
        }
    }
}

/// Result type for CDF engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::from(CdfError::ChainCycle).category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            Error::InvalidRange { first: 5, last: 4 }.category(),
            ErrorCategory::Range
        );
        let conversion = Error::IncompatibleConversion {
            from: DataType::Int8,
            to: TargetType::F32,
        };
        assert_eq!(conversion.category(), ErrorCategory::Conversion);
        assert_eq!(
            conversion.to_string(),
            "cannot convert CDF_INT8 to f32 without losing precision"
        );
        let wrapped = Error::Extraction(Arc::new(conversion));
        assert_eq!(wrapped.category(), ErrorCategory::Conversion);
    }
}
