//! Extraction engine
//!
//! An [`ExtractRequest`] collects the record selection, target type and
//! output layout for one variable. [`ExtractRequest::build`] validates the
//! request without touching the file; [`PreparedExtraction::materialize`]
//! walks the block index and produces a [`RecordBuffer`].
//!
//! ```no_run
//! use cdfio::{CdfFile, TargetType};
//!
//! let file = CdfFile::open("data.cdf")?;
//! let buffer = file
//!     .extract("Temperature")?
//!     .range(95, 105)
//!     .target(TargetType::F64)
//!     .build()?
//!     .materialize()?;
//! println!("{:?}", buffer.to_f64_vec());
//! # Ok::<(), cdfio::Error>(())
//! ```

pub mod buffer;
mod decode;
pub mod majority;
mod plan;
mod walk;

pub use buffer::RecordBuffer;

use crate::file::CdfFile;
use crate::variable::Variable;
use crate::{Error, Result};
use buffer::BufferLayout;
use cdfio_core::{
    check_conversion, ByteOrder, DataType, Majority, RecordRange, RecordSelection,
    TargetType,
};
use decode::Decoder;
use plan::Plan;
use std::sync::Arc;
use walk::Walker;

/// Default number of values decoded per scratch chunk
pub const DEFAULT_CHUNK_ELEMENTS: usize = 1024;

/// Tuning and defaults shared by extraction requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtractConfig {
    /// Values decoded per scratch chunk
    pub chunk_elements: usize,
    /// Byte order of output values
    pub byte_order: ByteOrder,
    /// Return an empty buffer instead of failing when no record can be produced
    pub allow_empty: bool,
    /// Reject conversions that lose precision
    pub preserve: bool,
}

impl ExtractConfig {
    pub fn with_chunk_elements(mut self, chunk_elements: usize) -> Self {
        self.chunk_elements = chunk_elements.max(1);
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn with_preserve(mut self, preserve: bool) -> Self {
        self.preserve = preserve;
        self
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            chunk_elements: DEFAULT_CHUNK_ELEMENTS,
            byte_order: ByteOrder::native(),
            allow_empty: false,
            preserve: true,
        }
    }
}

/// Target type used when a request does not name one
pub fn default_target(data_type: DataType) -> TargetType {
    match data_type {
        DataType::Real4 | DataType::Float => TargetType::F32,
        DataType::Real8 | DataType::Double | DataType::Epoch | DataType::Epoch16 => TargetType::F64,
        DataType::Int1 | DataType::Byte => TargetType::I8,
        DataType::Int2 | DataType::UInt1 => TargetType::I16,
        DataType::Int4 | DataType::UInt2 => TargetType::I32,
        DataType::UInt4 | DataType::Int8 | DataType::TimeTt2000 => TargetType::I64,
        DataType::Char | DataType::UChar => TargetType::Native,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requested {
    All,
    Range(i64, i64),
    Selection(RecordSelection),
}

/// Builder for one extraction
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    file: CdfFile,
    variable: Arc<Variable>,
    requested: Requested,
    target: TargetType,
    majority: Option<Majority>,
    config: ExtractConfig,
}

impl ExtractRequest {
    pub(crate) fn new(file: CdfFile, variable: Arc<Variable>) -> Self {
        let target = default_target(variable.data_type());
        Self {
            file,
            variable,
            requested: Requested::All,
            target,
            majority: None,
            config: ExtractConfig::default(),
        }
    }

    /// Inclusive record range; validated by [`build`](Self::build)
    pub fn range(mut self, first: i64, last: i64) -> Self {
        self.requested = Requested::Range(first, last);
        self
    }

    /// A single record
    pub fn point(mut self, record: i64) -> Self {
        self.requested = Requested::Range(record, record);
        self
    }

    /// Every stored record (the default)
    pub fn all(mut self) -> Self {
        self.requested = Requested::All;
        self
    }

    pub fn selection(mut self, selection: RecordSelection) -> Self {
        self.requested = Requested::Selection(selection);
        self
    }

    pub fn target(mut self, target: TargetType) -> Self {
        self.target = target;
        self
    }

    pub fn preserve(mut self, preserve: bool) -> Self {
        self.config.preserve = preserve;
        self
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.config.byte_order = byte_order;
        self
    }

    /// Storage order of multi-dimensional output records
    pub fn majority(mut self, majority: Majority) -> Self {
        self.majority = Some(majority);
        self
    }

    pub fn allow_empty(mut self, allow_empty: bool) -> Self {
        self.config.allow_empty = allow_empty;
        self
    }

    pub fn chunk_elements(mut self, chunk_elements: usize) -> Self {
        self.config.chunk_elements = chunk_elements.max(1);
        self
    }

    /// Replace every tunable at once
    pub fn config(mut self, config: ExtractConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the request. No block is read and nothing is allocated.
    pub fn build(self) -> Result<PreparedExtraction> {
        let selection = match self.requested {
            Requested::All => RecordSelection::All,
            Requested::Selection(selection) => match selection.explicit() {
                Some(range) if !range.is_ordered() => {
                    return Err(Error::InvalidRange {
                        first: range.first as i64,
                        last: range.last as i64,
                    })
                }
                _ => selection,
            },
            Requested::Range(first, last) => {
                let range =
                    RecordRange::new(first, last).map_err(|_| Error::InvalidRange { first, last })?;
                if range.first == range.last {
                    RecordSelection::Point(range.first)
                } else {
                    RecordSelection::Range(range)
                }
            }
        };

        let data_type = self.variable.data_type();
        check_conversion(data_type, self.target, self.config.preserve).map_err(|_| {
            Error::IncompatibleConversion {
                from: data_type,
                to: self.target,
            }
        })?;

        let majority = self.majority.unwrap_or(self.variable.majority());
        Ok(PreparedExtraction {
            file: self.file,
            variable: self.variable,
            selection,
            target: self.target,
            majority,
            config: self.config,
        })
    }
}

/// A validated extraction, ready to run any number of times
#[derive(Debug, Clone)]
pub struct PreparedExtraction {
    file: CdfFile,
    variable: Arc<Variable>,
    selection: RecordSelection,
    target: TargetType,
    majority: Majority,
    config: ExtractConfig,
}

impl PreparedExtraction {
    pub fn variable(&self) -> &Arc<Variable> {
        &self.variable
    }

    pub fn selection(&self) -> RecordSelection {
        self.selection
    }

    pub fn target(&self) -> TargetType {
        self.target
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Read the selected records into a new buffer
    pub fn materialize(&self) -> Result<RecordBuffer> {
        let variable = &*self.variable;
        let entries = self.file.index_of(variable)?;
        let decoder = Decoder::new(
            variable.data_type(),
            variable.byte_order(),
            self.target,
            self.config.byte_order,
            self.config.chunk_elements,
        );
        let layout = self.layout(&decoder);

        let range = match plan::resolve(variable, &entries, self.selection, self.config.allow_empty)? {
            Plan::Empty => return Ok(RecordBuffer::empty(layout)),
            Plan::Records(range) => range,
        };

        let elements = variable.elements_per_record();
        let out_record_bytes = layout.record_bytes();
        let dims = layout.dims.clone();
        let mut buffer = RecordBuffer::zeroed(layout, range.first, range.len())?;

        let walker = Walker {
            source: self.file.source(),
            variable,
            decoder,
            out_record_bytes,
        };
        walker.run(&entries, range, buffer.as_bytes_mut())?;

        if self.majority != variable.majority() && dims.len() >= 2 && elements > 0 {
            majority::transpose_records(
                buffer.as_bytes_mut(),
                &dims,
                out_record_bytes / elements,
                variable.majority(),
            );
        }

        tracing::debug!(
            variable = variable.name(),
            first = range.first,
            last = range.last,
            target = %self.target,
            "materialized records"
        );
        Ok(buffer)
    }

    /// Run [`materialize`](Self::materialize) on the blocking thread pool
    #[cfg(feature = "async")]
    pub async fn materialize_async(self) -> Result<RecordBuffer> {
        tokio::task::spawn_blocking(move || self.materialize()).await?
    }

    fn layout(&self, decoder: &Decoder) -> BufferLayout {
        let variable = &*self.variable;
        let data_type = variable.data_type();
        let (values_per_record, value_width) = if data_type.is_char() {
            (variable.elements_per_record(), variable.item_size())
        } else if self.target == TargetType::Native {
            (
                variable.elements_per_record() * variable.num_elems(),
                data_type.size_bytes(),
            )
        } else {
            let lanes = variable.elements_per_record()
                * variable.values_per_element()
                * data_type.lanes_per_value();
            (lanes, decoder.output_lane_width())
        };
        BufferLayout {
            target: self.target,
            data_type,
            order: self.config.byte_order,
            majority: self.majority,
            values_per_record,
            value_width,
            dims: variable.effective_dims(),
        }
    }
}

/// Stored record span of a variable, `None` when nothing is stored
pub fn stored_range(file: &CdfFile, name: &str) -> Result<Option<RecordRange>> {
    let entries = file.locate(name)?;
    Ok(plan::stored_range(&entries))
}

