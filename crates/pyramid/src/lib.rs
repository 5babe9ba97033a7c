//! Relief Pyramid Library
//!
//! Multi-resolution tile pyramid for regularly gridded geographic rasters.
//!
//! A [`TilePyramid`] is an ordered set of [`Level`]s, finest first. Each level
//! partitions its grid into bands (horizontal strips) and tiles (columns within
//! a band), answers viewport queries in tile-index space, and copies a bordered
//! tile out of its backing [`ByteSource`] into a [`HostTile`].
//!
//! # Example
//!
//! ```
//! use relief_pyramid::{LatLonBox, Level, LevelDescriptor, MemorySource, SampleType, TilePyramid};
//! use std::sync::Arc;
//!
//! // A 1-degree global grid of 2-byte samples, all zero
//! let descriptor = LevelDescriptor::global(180, 360, 1.0, SampleType::I16);
//! let source = Arc::new(MemorySource::zeroed(descriptor.data_len()));
//! let level = Level::new(descriptor, source, 32, 32).unwrap();
//! let pyramid = TilePyramid::new(vec![level]).unwrap();
//!
//! let view = LatLonBox::new(10.0, -10.0, 20.0, -20.0);
//! let keys = pyramid.find_tiles(&view, 0);
//! assert!(!keys.is_empty());
//!
//! let tile = pyramid.copy_tile(keys[0], 1).unwrap();
//! assert_eq!(tile.data_rows(), 32 + 2);
//! ```

pub mod bounds;
pub mod dataset;
pub mod host_tile;
pub mod key;
pub mod level;
pub mod pyramid;
pub mod sample;
pub mod source;
pub mod wrap;

pub use bounds::LatLonBox;
pub use host_tile::HostTile;
pub use key::TileKey;
pub use level::{Level, LevelDescriptor, LevelError, TileBounds};
pub use pyramid::{PyramidError, TilePyramid};
pub use sample::{BufferLedger, DataUnits, SampleBuffer, SampleData, SampleOrder, SampleType};
pub use source::{ByteSource, MappedFile, MemorySource};
pub use wrap::{column_spans, ColumnSpan, ColumnSpans};
