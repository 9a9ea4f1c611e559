//! Range resolution
//!
//! Decides which logical records an extraction produces before any block
//! is read. Records without physical storage inside the resolved range are
//! synthesized later by the walk.

use crate::locator::BlockEntry;
use crate::variable::Variable;
use crate::{Error, Result};
use cdfio_core::{RecordRange, RecordSelection};

/// Resolved output records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Nothing to produce
    Empty,
    /// Produce every record of the range
    Records(RecordRange),
}

/// Stored span: first record of the first entry to last record of the last
pub(crate) fn stored_range(entries: &[BlockEntry]) -> Option<RecordRange> {
    match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => Some(RecordRange {
            first: first.first,
            last: last.last,
        }),
        _ => None,
    }
}

pub(crate) fn resolve(
    variable: &Variable,
    entries: &[BlockEntry],
    selection: RecordSelection,
    allow_empty: bool,
) -> Result<Plan> {
    if !variable.record_variance() {
        return Ok(Plan::Records(RecordRange::point(0)));
    }

    let stored = stored_range(entries);
    let sparse = variable.sparse_records();

    let Some(requested) = selection.explicit() else {
        return match stored {
            Some(range) => Ok(Plan::Records(range)),
            None if variable.total_records() == 0 => Ok(Plan::Empty),
            None if sparse.allows_gaps() => Ok(Plan::Records(RecordRange {
                first: 0,
                last: variable.total_records() - 1,
            })),
            None => out_of_range(variable, allow_empty, 0, variable.total_records() - 1),
        };
    };

    let disjoint = stored.map_or(true, |s| requested.last < s.first || requested.first > s.last);
    if disjoint && !sparse.allows_gaps() {
        return out_of_range(variable, allow_empty, requested.first, requested.last);
    }
    Ok(Plan::Records(requested))
}

fn out_of_range(variable: &Variable, allow_empty: bool, first: u64, last: u64) -> Result<Plan> {
    if allow_empty {
        return Ok(Plan::Empty);
    }
    Err(Error::RecordOutOfRange {
        variable: variable.name().to_string(),
        first,
        last,
    })
}
