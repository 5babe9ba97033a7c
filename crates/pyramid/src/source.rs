//! Backing byte stores for level grids.

use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Random-access, read-only bytes backing one level.
///
/// Implementations must be shareable with the IO thread.
pub trait ByteSource: Send + Sync + fmt::Debug {
    /// Append `len` bytes starting at `first_byte` to `dest`.
    fn copy_range(&self, first_byte: u64, len: usize, dest: &mut Vec<u8>) -> io::Result<()>;

    /// Total length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn slice_range(bytes: &[u8], first_byte: u64, len: usize) -> io::Result<&[u8]> {
    let start = usize::try_from(first_byte)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {len} bytes at {first_byte} past end of {} byte source",
                    bytes.len()
                ),
            )
        })?;
    Ok(&bytes[start..end])
}

/// A read-only memory-mapped file.
pub struct MappedFile {
    path: PathBuf,
    map: Mmap,
}

impl MappedFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the map is read-only and the dataset files are not modified
        // while a pyramid is open.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .finish()
    }
}

impl ByteSource for MappedFile {
    fn copy_range(&self, first_byte: u64, len: usize, dest: &mut Vec<u8>) -> io::Result<()> {
        dest.extend_from_slice(slice_range(&self.map, first_byte, len)?);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.map.len() as u64
    }
}

/// Bytes held in memory.
#[derive(Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A source of `len` zero bytes
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    /// Encode 2-byte samples in the given order.
    pub fn from_i16(samples: &[i16], little_endian: bool) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            if little_endian {
                bytes.extend_from_slice(&s.to_le_bytes());
            } else {
                bytes.extend_from_slice(&s.to_be_bytes());
            }
        }
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySource")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ByteSource for MemorySource {
    fn copy_range(&self, first_byte: u64, len: usize, dest: &mut Vec<u8>) -> io::Result<()> {
        dest.extend_from_slice(slice_range(&self.bytes, first_byte, len)?);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}
