#![no_std]

//! cdfio Core - CDF v3 Format Definitions
//!
//! This crate provides the type table, on-disk record layouts and traits
//! for reading and writing Common Data Format (version 3) files. It does
//! no I/O; the `cdfio` crate builds the record engine on top of it.

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod byte_order;
pub mod error;
pub mod format;
pub mod traits;
pub mod types;
pub mod validation;

pub use byte_order::*;
pub use error::*;
pub use format::*;
pub use traits::*;
pub use types::*;
pub use validation::{RecordRange, RecordSelection};
