//! Validation utilities for CDF record ranges and buffers
//!
//! This module contains pure validation functions with no I/O dependencies.
//! Requests are checked here before any block is read or any output
//! buffer is allocated.

pub mod bounds;
pub mod parsing;
pub mod range;

pub use bounds::{checked_record_bytes, validate_array_bounds, validate_typed_slice};
pub use parsing::{parse_range, parse_selection};
pub use range::{RecordRange, RecordSelection};
