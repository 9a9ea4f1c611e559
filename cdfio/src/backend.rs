//! Byte sources for CDF files
//!
//! Every source hands out independent slices of the whole file; readers
//! never share a cursor, so any number of extractions can run at once.

use crate::{Error, Result};
use cdfio_core::StorageBackend;
#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};
use std::{fs::File, io::Read, path::Path};

/// Backing bytes of an open file
pub enum Source {
    /// Bytes owned in memory (whole-file fetches, decompressed files, snapshots)
    Memory(Vec<u8>),
    /// Read-only memory map of a file on disk
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
}

impl Source {
    /// Open a file, memory-mapping it when requested and available
    pub fn open<P: AsRef<Path>>(path: P, use_mmap: bool) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;

        #[cfg(feature = "mmap")]
        {
            if use_mmap {
                // An empty file cannot be mapped on every platform
                if file.metadata()?.len() == 0 {
                    return Err(Error::Format(cdfio_core::CdfError::InvalidMagic));
                }
                // SAFETY: the map is read-only and the file handle stays valid
                // for the duration of the call; callers must not truncate the
                // file while it is open.
                let mmap = unsafe { MmapOptions::new().map(&file)? };
                return Ok(Source::Mapped(mmap));
            }
        }
        #[cfg(not(feature = "mmap"))]
        let _ = use_mmap;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(Source::Memory(bytes))
    }

    /// Whether the bytes come from a memory map
    pub fn is_mapped(&self) -> bool {
        match self {
            Source::Memory(_) => false,
            #[cfg(feature = "mmap")]
            Source::Mapped(_) => true,
        }
    }
}

impl StorageBackend for Source {
    fn as_slice(&self) -> &[u8] {
        match self {
            Source::Memory(bytes) => bytes,
            #[cfg(feature = "mmap")]
            Source::Mapped(mmap) => mmap,
        }
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Memory(bytes)
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_mapped() { "Mapped" } else { "Memory" };
        f.debug_struct("Source")
            .field("kind", &kind)
            .field("len", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_file_sources() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[1, 2, 3, 4, 5]).unwrap();
        tmp.flush().unwrap();

        let read = Source::open(tmp.path(), false).unwrap();
        assert!(!read.is_mapped());
        assert_eq!(read.read_at(1, 3).unwrap(), &[2, 3, 4]);

        #[cfg(feature = "mmap")]
        {
            let mapped = Source::open(tmp.path(), true).unwrap();
            assert!(mapped.is_mapped());
            assert_eq!(mapped.as_slice(), read.as_slice());
        }
    }
}
