//! Parsing utilities for record selections
//!
//! Pure string parsing for the record selections accepted by the
//! inspection tooling, with no I/O dependencies.

use super::range::{RecordRange, RecordSelection};
use crate::{CdfError, Result};

/// Parse an inclusive record range "first:last", "first-last" or "n"
pub fn parse_range(range_str: &str) -> Result<RecordRange> {
    let range_str = range_str.trim();
    if range_str.is_empty() {
        return Err(CdfError::InvalidRange);
    }

    let split = range_str.find(':').or_else(|| range_str.find('-'));
    match split {
        Some(pos) => {
            let first = parse_u64(&range_str[..pos])?;
            let last = parse_u64(&range_str[pos + 1..])?;
            if first > last {
                return Err(CdfError::InvalidRange);
            }
            Ok(RecordRange { first, last })
        }
        None => parse_u64(range_str).map(RecordRange::point),
    }
}

/// Parse a selection: "all" or anything `parse_range` accepts
pub fn parse_selection(selection: &str) -> Result<RecordSelection> {
    let selection = selection.trim();
    if selection.eq_ignore_ascii_case("all") || selection == "*" {
        return Ok(RecordSelection::All);
    }
    let range = parse_range(selection)?;
    if range.first == range.last {
        Ok(RecordSelection::Point(range.first))
    } else {
        Ok(RecordSelection::Range(range))
    }
}

fn parse_u64(s: &str) -> Result<u64> {
    if s.is_empty() {
        return Err(CdfError::InvalidRange);
    }

    let mut result: u64 = 0;
    for byte in s.bytes() {
        if !byte.is_ascii_digit() {
            return Err(CdfError::InvalidRange);
        }
        let digit = (byte - b'0') as u64;
        result = result
            .checked_mul(10)
            .and_then(|r| r.checked_add(digit))
            .ok_or(CdfError::ArraySizeOverflow)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0:10"), Ok(RecordRange { first: 0, last: 10 }));
        assert_eq!(parse_range("95-105"), Ok(RecordRange { first: 95, last: 105 }));
        assert_eq!(parse_range("42"), Ok(RecordRange::point(42)));

        assert_eq!(parse_range(""), Err(CdfError::InvalidRange));
        assert_eq!(parse_range("10:5"), Err(CdfError::InvalidRange));
        assert_eq!(parse_range("abc:def"), Err(CdfError::InvalidRange));
        assert_eq!(parse_range("10:"), Err(CdfError::InvalidRange));
        assert_eq!(parse_range(":10"), Err(CdfError::InvalidRange));
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("0"), Ok(0));
        assert_eq!(parse_u64("999999"), Ok(999999));
        assert_eq!(parse_u64("12a"), Err(CdfError::InvalidRange));
        assert_eq!(
            parse_u64("99999999999999999999999"),
            Err(CdfError::ArraySizeOverflow)
        );
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("all"), Ok(RecordSelection::All));
        assert_eq!(parse_selection("7"), Ok(RecordSelection::Point(7)));
        assert_eq!(
            parse_selection("45:65"),
            Ok(RecordSelection::Range(RecordRange { first: 45, last: 65 }))
        );
    }
}
