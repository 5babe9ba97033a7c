//! Ordered set of levels, finest first.

use crate::bounds::LatLonBox;
use crate::host_tile::HostTile;
use crate::key::TileKey;
use crate::level::{Level, LevelError, TileBounds};

/// Errors from assembling or reading a pyramid.
#[derive(Debug, thiserror::Error)]
pub enum PyramidError {
    #[error("pyramid has no levels")]
    Empty,

    #[error("two levels share cell size {0} degrees")]
    DuplicateCellSize(f64),

    #[error("level {level}: {source}")]
    Level {
        level: usize,
        #[source]
        source: LevelError,
    },
}

/// A multi-resolution set of levels covering the same raster.
///
/// Level 0 has the smallest cell size. Immutable once built.
#[derive(Debug)]
pub struct TilePyramid {
    levels: Vec<Level>,
}

impl TilePyramid {
    /// Sort `levels` by ascending cell size and build the pyramid.
    pub fn new(mut levels: Vec<Level>) -> Result<Self, PyramidError> {
        if levels.is_empty() {
            return Err(PyramidError::Empty);
        }
        levels.sort_by(|a, b| a.cell_size_deg().total_cmp(&b.cell_size_deg()));
        if let Some(pair) = levels
            .windows(2)
            .find(|pair| pair[0].cell_size_deg() == pair[1].cell_size_deg())
        {
            return Err(PyramidError::DuplicateCellSize(pair[0].cell_size_deg()));
        }

        for (n, level) in levels.iter().enumerate() {
            log::debug!(
                "level {n}: {}x{} cells at {} deg, {} bands x {} tiles",
                level.descriptor().num_rows,
                level.descriptor().num_cols,
                level.cell_size_deg(),
                level.num_bands(),
                level.num_tiles()
            );
        }
        Ok(Self { levels })
    }

    /// Number of levels
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, level: usize) -> Option<&Level> {
        self.levels.get(level)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Index of the coarsest level
    pub fn coarsest(&self) -> usize {
        self.levels.len() - 1
    }

    /// The finest level whose cells are at least `pixel_size_deg` wide.
    ///
    /// Falls back to the coarsest level when every level is finer than a pixel.
    pub fn level_for_pixel_size(&self, pixel_size_deg: f64) -> usize {
        self.levels
            .iter()
            .position(|level| level.cell_size_deg() >= pixel_size_deg)
            .unwrap_or_else(|| self.coarsest())
    }

    /// Keys of `level` visible in `view`. Empty if the level does not exist.
    pub fn find_tiles(&self, view: &LatLonBox, level: usize) -> Vec<TileKey> {
        match self.levels.get(level) {
            Some(l) => l.find_tiles(view, level),
            None => Vec::new(),
        }
    }

    /// # Panics
    ///
    /// Panics if the key does not name a tile of this pyramid.
    pub fn tile_bounds(&self, key: TileKey) -> TileBounds {
        self.levels[key.level].tile_bounds(key.band, key.tile)
    }

    /// Copy the tile named by `key` with a border of `border_cells`.
    ///
    /// # Panics
    ///
    /// Panics if the key does not name a tile of this pyramid.
    pub fn copy_tile(&self, key: TileKey, border_cells: usize) -> Result<HostTile, PyramidError> {
        self.levels[key.level]
            .copy_tile(key.band, key.tile, border_cells)
            .map_err(|source| PyramidError::Level {
                level: key.level,
                source,
            })
    }

    /// Host buffers allocated by any level and not yet dropped
    pub fn live_host_buffers(&self) -> usize {
        self.levels.iter().map(|level| level.ledger().live()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelDescriptor;
    use crate::sample::SampleType;
    use crate::source::MemorySource;
    use std::sync::Arc;

    fn level(cell_size_deg: f64) -> Level {
        let rows = (180.0 / cell_size_deg) as usize;
        let descriptor = LevelDescriptor::global(rows, rows * 2, cell_size_deg, SampleType::I16);
        let source = Arc::new(MemorySource::zeroed(descriptor.data_len()));
        Level::new(descriptor, source, 4, 4).unwrap()
    }

    #[test]
    fn test_levels_sorted_finest_first() {
        let pyramid = TilePyramid::new(vec![level(2.0), level(0.5), level(1.0)]).unwrap();
        let sizes: Vec<f64> = pyramid.levels().iter().map(|l| l.cell_size_deg()).collect();
        assert_eq!(sizes, vec![0.5, 1.0, 2.0]);
        assert_eq!(pyramid.coarsest(), 2);
    }

    #[test]
    fn test_duplicate_cell_size_rejected() {
        let err = TilePyramid::new(vec![level(1.0), level(1.0)]).unwrap_err();
        assert!(matches!(err, PyramidError::DuplicateCellSize(s) if s == 1.0));
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(TilePyramid::new(Vec::new()), Err(PyramidError::Empty)));
    }

    #[test]
    fn test_level_for_pixel_size() {
        let pyramid = TilePyramid::new(vec![level(0.5), level(1.0), level(2.0)]).unwrap();
        assert_eq!(pyramid.level_for_pixel_size(0.1), 0);
        assert_eq!(pyramid.level_for_pixel_size(0.5), 0);
        assert_eq!(pyramid.level_for_pixel_size(0.75), 1);
        assert_eq!(pyramid.level_for_pixel_size(1.5), 2);
        assert_eq!(pyramid.level_for_pixel_size(10.0), 2);
    }

    #[test]
    fn test_find_tiles_missing_level() {
        let pyramid = TilePyramid::new(vec![level(1.0)]).unwrap();
        let view = LatLonBox::new(10.0, 0.0, 10.0, 0.0);
        assert!(pyramid.find_tiles(&view, 1).is_empty());
        assert!(!pyramid.find_tiles(&view, 0).is_empty());
    }

    #[test]
    fn test_live_host_buffers() {
        let pyramid = TilePyramid::new(vec![level(1.0), level(2.0)]).unwrap();
        let a = pyramid.copy_tile(TileKey::new(0, 0, 0), 1).unwrap();
        let b = pyramid.copy_tile(TileKey::new(1, 3, 2), 1).unwrap();
        assert_eq!(pyramid.live_host_buffers(), 2);
        drop(a);
        assert_eq!(pyramid.live_host_buffers(), 1);
        drop(b);
        assert_eq!(pyramid.live_host_buffers(), 0);
    }
}
