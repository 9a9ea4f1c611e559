//! Abstract interfaces for the CDF engine
//!
//! This module defines the trait abstractions shared by the reader and the
//! writer. Traits are pure interfaces - implementations live in `cdfio`.

pub mod backend;
pub mod element;

pub use backend::StorageBackend;
pub use element::CdfElement;
