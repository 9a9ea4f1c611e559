//! Open CDF files
//!
//! Opening a file parses the descriptor records, the attribute chain and
//! both variable chains. Block indexes are built lazily, once per variable.

use crate::attributes::AttributeStore;
use crate::backend::Source;
use crate::checksum;
use crate::extract::ExtractRequest;
use crate::locator::{build_index, BlockEntry};
use crate::variable::Variable;
use crate::{Error, Result};
use cdfio_core::format::constants::{CDR_OFFSET, MAGIC_SIZE};
use cdfio_core::{
    check_magic, magic_bytes, normalize_offset, ByteOrder, CdfDescriptor, CdfError,
    CompressedFileRecord, CompressionRecord, Encoding, GlobalDescriptor, Majority,
    StorageBackend, VariableRecord,
};
use flate2::read::GzDecoder;
use hashbrown::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Options controlling how a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenOptions {
    /// Memory-map the file instead of reading it into memory
    pub use_mmap: bool,
    /// Verify the trailing MD5 digest when the file declares one
    pub verify_checksum: bool,
}

impl OpenOptions {
    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            use_mmap: cfg!(feature = "mmap"),
            verify_checksum: false,
        }
    }
}

struct FileInner {
    source: Source,
    descriptor: CdfDescriptor,
    global: GlobalDescriptor,
    encoding: Encoding,
    variables: Vec<Arc<Variable>>,
    by_name: HashMap<String, usize>,
    attributes: AttributeStore,
    whole_file_compressed: bool,
}

/// An open CDF file
///
/// Cloning is cheap; clones share the byte source and every variable's
/// block index.
#[derive(Clone)]
pub struct CdfFile {
    inner: Arc<FileInner>,
}

impl CdfFile {
    /// Open a file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let source = Source::open(path, options.use_mmap)?;
        tracing::debug!(path = %path.display(), mapped = source.is_mapped(), "opening CDF file");
        Self::from_source(source, options)
    }

    /// Open a file held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_source(Source::Memory(bytes), &OpenOptions::default())
    }

    pub fn from_source(source: Source, options: &OpenOptions) -> Result<Self> {
        let compressed = check_magic(source.as_slice())?;
        let (source, original) = if compressed {
            let inflated = inflate_file(&source)?;
            (Source::Memory(inflated), Some(source))
        } else {
            (source, None)
        };

        let descriptor = CdfDescriptor::from_bytes(source.record_at(CDR_OFFSET)?)?;
        let encoding = descriptor.encoding()?;
        if options.verify_checksum && descriptor.has_md5_checksum() {
            checksum::verify(original.as_ref().unwrap_or(&source).as_slice())?;
        }

        let gdr_offset = normalize_offset(descriptor.gdr_offset).ok_or(CdfError::OffsetOutOfBounds)?;
        let global = GlobalDescriptor::from_bytes(source.record_at(gdr_offset)?)?;
        let order = encoding.byte_order();
        let majority = descriptor.majority();

        let attributes = AttributeStore::parse(&source, global.adr_head, order)?;

        let mut visited = HashSet::new();
        let mut variables = Vec::new();
        for head in [global.rvdr_head, global.zvdr_head] {
            let mut cursor = normalize_offset(head);
            while let Some(offset) = cursor {
                if !visited.insert(offset) {
                    return Err(CdfError::ChainCycle.into());
                }
                let record =
                    VariableRecord::from_bytes(source.record_at(offset)?, global.r_dim_sizes.len())?;
                let level = match record.compression_offset() {
                    Some(cpr) => Some(CompressionRecord::from_bytes(source.record_at(cpr)?)?.ensure_gzip()?),
                    None => None,
                };
                let fill = attributes
                    .fill_value(record.kind, record.num.max(0) as u32);
                let variable = Variable::from_record(
                    &record,
                    &global.r_dim_sizes,
                    order,
                    majority,
                    level,
                    fill,
                )?;
                variables.push(Arc::new(variable));
                cursor = record.next_offset();
            }
        }

        let declared = global.num_rvars.max(0) as usize + global.num_zvars.max(0) as usize;
        if declared != variables.len() {
            tracing::warn!(
                declared,
                found = variables.len(),
                "variable count in global descriptor does not match descriptor chains"
            );
        }

        tracing::debug!(
            encoding = ?encoding,
            %majority,
            variables = variables.len(),
            attributes = attributes.len(),
            "parsed CDF descriptors"
        );

        Ok(Self::from_parts(
            source,
            descriptor,
            global,
            variables,
            attributes,
            compressed,
        ))
    }

    pub(crate) fn from_parts(
        source: Source,
        descriptor: CdfDescriptor,
        global: GlobalDescriptor,
        variables: Vec<Arc<Variable>>,
        attributes: AttributeStore,
        whole_file_compressed: bool,
    ) -> Self {
        let by_name = variables
            .iter()
            .enumerate()
            .map(|(i, v)| (v.name().to_string(), i))
            .collect();
        let encoding = descriptor.encoding().unwrap_or(Encoding::Network);
        Self {
            inner: Arc::new(FileInner {
                source,
                descriptor,
                global,
                encoding,
                variables,
                by_name,
                attributes,
                whole_file_compressed,
            }),
        }
    }

    pub fn descriptor(&self) -> &CdfDescriptor {
        &self.inner.descriptor
    }

    pub fn global_descriptor(&self) -> &GlobalDescriptor {
        &self.inner.global
    }

    pub fn encoding(&self) -> Encoding {
        self.inner.encoding
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.inner.encoding.byte_order()
    }

    pub fn majority(&self) -> Majority {
        self.inner.descriptor.majority()
    }

    /// Whether the file body was stored gzip-compressed as a whole
    pub fn is_whole_file_compressed(&self) -> bool {
        self.inner.whole_file_compressed
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.inner.attributes
    }

    /// Variables in chain order, r-variables first
    pub fn variables(&self) -> &[Arc<Variable>] {
        &self.inner.variables
    }

    pub fn variable(&self, name: &str) -> Result<&Arc<Variable>> {
        self.inner
            .by_name
            .get(name)
            .map(|&i| &self.inner.variables[i])
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    pub(crate) fn source(&self) -> &Source {
        &self.inner.source
    }

    /// The variable's block index, built on first use
    pub fn locate(&self, name: &str) -> Result<Arc<[BlockEntry]>> {
        let variable = self.variable(name)?;
        self.index_of(variable)
    }

    pub(crate) fn index_of(&self, variable: &Variable) -> Result<Arc<[BlockEntry]>> {
        if let Some(index) = variable.cached_index() {
            return Ok(index.clone());
        }
        let entries = build_index(
            &self.inner.source,
            variable.name(),
            variable.index_head(),
            variable.total_records(),
            variable.sparse_records(),
        )?;
        Ok(variable.seed_index(entries.into()))
    }

    /// Start an extraction request for a variable
    pub fn extract(&self, name: &str) -> Result<ExtractRequest> {
        let variable = self.variable(name)?.clone();
        Ok(ExtractRequest::new(self.clone(), variable))
    }
}

impl std::fmt::Debug for CdfFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdfFile")
            .field("source", &self.inner.source)
            .field("encoding", &self.inner.encoding)
            .field("variables", &self.inner.variables.len())
            .field("attributes", &self.inner.attributes.len())
            .finish()
    }
}

/// Inflate a whole-file compressed body and put the plain magic in front
fn inflate_file(source: &Source) -> Result<Vec<u8>> {
    let ccr_bytes = source.record_at(CDR_OFFSET)?;
    let ccr = CompressedFileRecord::from_bytes(ccr_bytes)?;
    let cpr_offset = normalize_offset(ccr.cpr_offset).ok_or(CdfError::OffsetOutOfBounds)?;
    CompressionRecord::from_bytes(source.record_at(cpr_offset)?)?.ensure_gzip()?;

    let start = CompressedFileRecord::HEADER_SIZE;
    let len = usize::try_from(ccr.payload_len()).map_err(|_| CdfError::InvalidRecordSize)?;
    let payload = ccr_bytes
        .get(start..start + len)
        .ok_or(CdfError::InvalidRecordSize)?;

    let expected = usize::try_from(ccr.uncompressed_size).unwrap_or(0);
    let mut out = Vec::with_capacity(MAGIC_SIZE + expected);
    out.extend_from_slice(&magic_bytes());
    GzDecoder::new(payload)
        .read_to_end(&mut out)
        .map_err(|_| CdfError::Decompression)?;

    if out.len() - MAGIC_SIZE != expected {
        tracing::warn!(
            expected,
            found = out.len() - MAGIC_SIZE,
            "inflated file size differs from compressed file record"
        );
    }
    tracing::debug!(bytes = out.len(), "inflated whole-file compressed CDF");
    Ok(out)
}
