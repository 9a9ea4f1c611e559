//! cdfio - CDF v3 Record and Block Engine
//!
//! This library reads and writes Common Data Format (version 3) files:
//! typed multi-dimensional variables stored as record blocks, optionally
//! gzip compressed, with sparse record policies and metadata attributes.
//!
//! ## Architecture
//!
//! cdfio separates format definitions from I/O:
//!
//! - **cdfio-core**: Type table, on-disk record layouts, traits and validation (no I/O)
//! - **cdfio**: Byte sources, block index, extraction engine, layout engine and attributes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cdfio::{CdfFile, TargetType};
//!
//! fn example() -> cdfio::Result<()> {
//!     let file = CdfFile::open("mission.cdf")?;
//!     for variable in file.variables() {
//!         println!("{} {:?}", variable.name(), variable.effective_dims());
//!     }
//!
//!     let buffer = file
//!         .extract("Epoch")?
//!         .range(0, 99)
//!         .target(TargetType::F64)
//!         .build()?
//!         .materialize()?;
//!     println!("{:?}", &buffer.to_f64_vec()[..4]);
//!     Ok(())
//! }
//! ```
//!
//! Writing goes through [`CdfWriter`]:
//!
//! ```rust,no_run
//! use cdfio::{CdfWriter, DataType, TypedArray, VariableSpec, WriterConfig};
//!
//! fn example() -> cdfio::Result<()> {
//!     let mut writer = CdfWriter::new(WriterConfig::default());
//!     writer.define_variable(VariableSpec::new("B_GSE", DataType::Real4).dims(&[3]).compressed())?;
//!     writer.append("B_GSE", None, TypedArray::F32(vec![1.0, 2.0, 3.0]))?;
//!     writer.write_to("out.cdf")
//! }
//! ```
//!
//! ## Features
//!
//! - **Memory-mapped I/O**: Zero-copy block access for files on disk
//! - **Lazy block indexes**: Index trees are flattened once per variable and shared
//! - **Sparse records**: Pad and previous-record gap filling
//! - **Concurrent extraction**: Thread pool with pollable result slots
//! - **HTTP backend**: Open remote files fetched over HTTP

pub use cdfio_core::validation::{parse_range, parse_selection};
pub use cdfio_core::{
    // Type table
    DataType, DecodeLane, TargetType, TypeCategory, TypeInfo, TYPE_TABLE,
    // Layout
    AttributeScope, ByteOrder, Encoding, Majority, SparseRecords, VariableKind,
    // Selections
    RecordRange, RecordSelection,
    // Traits
    CdfElement, StorageBackend,
    // Errors
    CdfError, ErrorCategory,
};

pub mod attributes;
pub mod backend;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod extract;
pub mod file;
#[cfg(feature = "http")]
pub mod http_backend;
pub mod locator;
pub mod task;
pub mod variable;
pub mod writer;

pub use attributes::{Attribute, AttributeEntry, AttributeStore, AttributeValue, FILL_VALUE};
pub use backend::Source;
pub use error::{Error, Result};
pub use extract::{
    default_target, ExtractConfig, ExtractRequest, PreparedExtraction, RecordBuffer,
    DEFAULT_CHUNK_ELEMENTS,
};
pub use file::{CdfFile, OpenOptions};
pub use locator::BlockEntry;
pub use task::{ExtractionHandle, ExtractionPool, ExtractionSlot, SlotState};
pub use variable::{PadSource, Variable};
pub use writer::{CdfWriter, EncodedBlock, TypedArray, VariableSpec, WriterConfig};
