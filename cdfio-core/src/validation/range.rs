//! Record range selection
//!
//! Record numbers are zero-based and ranges are inclusive on both ends,
//! matching how index entries address records.

use crate::{CdfError, Result};

/// Inclusive range of logical record numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RecordRange {
    pub first: u64,
    pub last: u64,
}

impl RecordRange {
    /// Validate signed bounds, rejecting negative or inverted ranges
    pub const fn new(first: i64, last: i64) -> Result<Self> {
        if first < 0 || last < 0 || first > last {
            return Err(CdfError::InvalidRange);
        }
        Ok(Self {
            first: first as u64,
            last: last as u64,
        })
    }

    /// Single-record range
    pub const fn point(record: u64) -> Self {
        Self {
            first: record,
            last: record,
        }
    }

    /// False for ranges built directly with `last < first`
    pub const fn is_ordered(&self) -> bool {
        self.first <= self.last
    }

    /// Number of records covered
    pub const fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    pub const fn contains(&self, record: u64) -> bool {
        record >= self.first && record <= self.last
    }

    /// Overlapping part of two ranges
    pub fn intersect(&self, other: &RecordRange) -> Option<RecordRange> {
        let first = self.first.max(other.first);
        let last = self.last.min(other.last);
        (first <= last).then_some(RecordRange { first, last })
    }
}

impl core::fmt::Display for RecordRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {}]", self.first, self.last)
    }
}

/// Which records an extraction covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordSelection {
    /// Every stored record
    #[default]
    All,
    /// Explicit inclusive range
    Range(RecordRange),
    /// One record
    Point(u64),
}

impl RecordSelection {
    /// Validated inclusive range selection
    pub const fn range(first: i64, last: i64) -> Result<Self> {
        match RecordRange::new(first, last) {
            Ok(range) => Ok(RecordSelection::Range(range)),
            Err(e) => Err(e),
        }
    }

    /// Explicit range, if one was requested
    pub const fn explicit(&self) -> Option<RecordRange> {
        match *self {
            RecordSelection::All => None,
            RecordSelection::Range(range) => Some(range),
            RecordSelection::Point(record) => Some(RecordRange::point(record)),
        }
    }
}
