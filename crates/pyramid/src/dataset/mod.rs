//! On-disk pyramid datasets.
//!
//! A dataset is a directory of level files. Each `*.bin` (2-byte integer) or
//! `*.flt` (4-byte float) file is one level, described by a sibling `.hdr`
//! when present and by a guessed header otherwise.

mod header;
mod writer;

pub use header::{format_header, guess_header, parse_header, HeaderError};
pub use writer::{build_pyramid, downsample, write_level, DEFAULT_MAX_DIM};

use crate::level::{decode_samples, Level, LevelDescriptor, LevelError};
use crate::pyramid::{PyramidError, TilePyramid};
use crate::sample::SampleData;
use crate::source::MappedFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors from reading or writing a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },

    #[error("{path}: file holds {actual} bytes, header describes {expected}")]
    Length {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{path}: no level files found")]
    NoLevels { path: PathBuf },

    #[error("{path}: {source}")]
    Level {
        path: PathBuf,
        #[source]
        source: LevelError,
    },

    #[error(transparent)]
    Pyramid(#[from] PyramidError),
}

impl DatasetError {
    fn io(path: &Path, source: io::Error) -> Self {
        DatasetError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One level file and its header.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelFile {
    pub path: PathBuf,
    pub descriptor: LevelDescriptor,
}

impl LevelFile {
    /// Read and decode every sample of the level.
    pub fn read_samples(&self) -> Result<SampleData, DatasetError> {
        let bytes = fs::read(&self.path).map_err(|e| DatasetError::io(&self.path, e))?;
        Ok(decode_samples(
            &bytes,
            self.descriptor.sample_type,
            self.descriptor.sample_order,
        ))
    }
}

fn is_level_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bin") || e.eq_ignore_ascii_case("flt"))
}

/// The file next to `path` with extension `ext`, trying the extension as
/// given, lowercase and uppercase. Returns `None` if none exists.
pub fn sibling_file(path: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_string(), ext.to_ascii_lowercase(), ext.to_ascii_uppercase()]
        .iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

/// Describe one level file from its `.hdr`, or from its name and length.
pub fn read_level_file(path: impl AsRef<Path>) -> Result<LevelFile, DatasetError> {
    let path = path.as_ref();
    let file_len = fs::metadata(path)
        .map_err(|e| DatasetError::io(path, e))?
        .len();

    let mut descriptor = None;
    if let Some(hdr_path) = sibling_file(path, "hdr") {
        let text = fs::read_to_string(&hdr_path).map_err(|e| DatasetError::io(&hdr_path, e))?;
        match header::parse_header(&text) {
            Ok(d) => {
                log::info!("reading level {} with header {}", path.display(), hdr_path.display());
                descriptor = Some(d);
            }
            Err(e) => log::warn!("unparseable header {}: {e}", hdr_path.display()),
        }
    }
    let descriptor = match descriptor {
        Some(d) => d,
        None => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let d = header::guess_header(&file_name, file_len).map_err(|source| {
                DatasetError::Header {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            log::info!("reading level {} with guessed header", path.display());
            d
        }
    };

    descriptor.validate().map_err(|source| DatasetError::Level {
        path: path.to_path_buf(),
        source,
    })?;
    let expected = descriptor.data_len() as u64;
    if file_len != expected {
        return Err(DatasetError::Length {
            path: path.to_path_buf(),
            expected,
            actual: file_len,
        });
    }

    Ok(LevelFile {
        path: path.to_path_buf(),
        descriptor,
    })
}

/// Describe every level file in `dir`, in file name order.
pub fn open_dataset(dir: impl AsRef<Path>) -> Result<Vec<LevelFile>, DatasetError> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))? {
        let path = entry.map_err(|e| DatasetError::io(dir, e))?.path();
        if path.is_file() && is_level_file(&path) {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(DatasetError::NoLevels {
            path: dir.to_path_buf(),
        });
    }
    paths.sort();
    paths.iter().map(read_level_file).collect()
}

/// Open a dataset as a pyramid of memory-mapped levels.
pub fn open_pyramid(
    dir: impl AsRef<Path>,
    max_rows_per_band: usize,
    max_cols_per_tile: usize,
) -> Result<TilePyramid, DatasetError> {
    let mut levels = Vec::new();
    for file in open_dataset(dir)? {
        let source = MappedFile::open(&file.path).map_err(|e| DatasetError::io(&file.path, e))?;
        let level = Level::new(
            file.descriptor,
            Arc::new(source),
            max_rows_per_band,
            max_cols_per_tile,
        )
        .map_err(|source| DatasetError::Level {
            path: file.path.clone(),
            source,
        })?;
        levels.push(level);
    }
    Ok(TilePyramid::new(levels)?)
}
