//! One resolution tier of a tile pyramid.

use crate::bounds::LatLonBox;
use crate::host_tile::HostTile;
use crate::key::TileKey;
use crate::sample::{BufferLedger, DataUnits, SampleBuffer, SampleData, SampleOrder, SampleType};
use crate::source::ByteSource;
use crate::wrap::column_spans;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::io;
use std::sync::Arc;

/// Errors from constructing or reading a level.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("invalid level descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("byte source holds {actual} bytes, grid needs {expected}")]
    SourceLength { expected: u64, actual: u64 },

    #[error("failed to read band {band} tile {tile}: {source}")]
    Read {
        band: usize,
        tile: usize,
        #[source]
        source: io::Error,
    },
}

/// Grid geometry and sample format of one level.
///
/// The grid is stored row-major, north row first. `south_lat_deg` and
/// `west_lon_deg` locate the outer corner of the south-west cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelDescriptor {
    pub num_rows: usize,
    pub num_cols: usize,
    pub cell_size_deg: f64,
    pub south_lat_deg: f64,
    pub west_lon_deg: f64,
    pub sample_type: SampleType,
    pub sample_order: SampleOrder,
    pub units: DataUnits,
}

impl LevelDescriptor {
    /// A grid whose south-west corner is at (-90, -180), stored little endian.
    pub fn global(
        num_rows: usize,
        num_cols: usize,
        cell_size_deg: f64,
        sample_type: SampleType,
    ) -> Self {
        Self {
            num_rows,
            num_cols,
            cell_size_deg,
            south_lat_deg: -90.0,
            west_lon_deg: -180.0,
            sample_type,
            sample_order: SampleOrder::LittleEndian,
            units: DataUnits::Meters,
        }
    }

    pub fn north_lat_deg(&self) -> f64 {
        self.south_lat_deg + self.num_rows as f64 * self.cell_size_deg
    }

    pub fn east_lon_deg(&self) -> f64 {
        self.west_lon_deg + self.num_cols as f64 * self.cell_size_deg
    }

    pub fn bounds(&self) -> LatLonBox {
        LatLonBox::new(
            self.north_lat_deg(),
            self.south_lat_deg,
            self.east_lon_deg(),
            self.west_lon_deg,
        )
    }

    pub fn num_samples(&self) -> usize {
        self.num_rows * self.num_cols
    }

    /// Length in bytes of the backing store
    pub fn data_len(&self) -> usize {
        self.num_samples() * self.sample_type.bytes_per_sample()
    }

    pub fn validate(&self) -> Result<(), LevelError> {
        if self.num_rows == 0 || self.num_cols == 0 {
            return Err(LevelError::InvalidDescriptor(format!(
                "grid of {}x{} cells",
                self.num_rows, self.num_cols
            )));
        }
        if !(self.cell_size_deg.is_finite() && self.cell_size_deg > 0.0) {
            return Err(LevelError::InvalidDescriptor(format!(
                "cell size {}",
                self.cell_size_deg
            )));
        }
        if !(self.south_lat_deg.is_finite() && self.west_lon_deg.is_finite()) {
            return Err(LevelError::InvalidDescriptor(
                "non-finite grid origin".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cell range and geographic extent of one tile, border excluded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub first_row: usize,
    pub num_rows: usize,
    pub first_col: usize,
    pub num_cols: usize,
    pub bounds: LatLonBox,
}

/// A level partitioned into bands of rows and tiles of columns.
///
/// The partition has no gaps; the last band and the last tile may be short.
#[derive(Debug)]
pub struct Level {
    descriptor: LevelDescriptor,
    source: Arc<dyn ByteSource>,
    rows_per_band: usize,
    cols_per_tile: usize,
    num_bands: usize,
    num_tiles: usize,
    ledger: Arc<BufferLedger>,
}

impl Level {
    /// Create a level over `source`.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Grid geometry and sample format
    /// * `source` - Backing bytes, exactly `descriptor.data_len()` long
    /// * `max_rows_per_band` - Upper bound on band height in cells
    /// * `max_cols_per_tile` - Upper bound on tile width in cells
    pub fn new(
        descriptor: LevelDescriptor,
        source: Arc<dyn ByteSource>,
        max_rows_per_band: usize,
        max_cols_per_tile: usize,
    ) -> Result<Self, LevelError> {
        descriptor.validate()?;
        if max_rows_per_band == 0 || max_cols_per_tile == 0 {
            return Err(LevelError::InvalidDescriptor(format!(
                "tile size {max_rows_per_band}x{max_cols_per_tile}"
            )));
        }
        let expected = descriptor.data_len() as u64;
        if source.len() != expected {
            return Err(LevelError::SourceLength {
                expected,
                actual: source.len(),
            });
        }

        let rows_per_band = max_rows_per_band.min(descriptor.num_rows);
        let cols_per_tile = max_cols_per_tile.min(descriptor.num_cols);
        Ok(Self {
            descriptor,
            source,
            rows_per_band,
            cols_per_tile,
            num_bands: descriptor.num_rows.div_ceil(rows_per_band),
            num_tiles: descriptor.num_cols.div_ceil(cols_per_tile),
            ledger: Arc::new(BufferLedger::new()),
        })
    }

    pub fn descriptor(&self) -> &LevelDescriptor {
        &self.descriptor
    }

    pub fn cell_size_deg(&self) -> f64 {
        self.descriptor.cell_size_deg
    }

    pub fn sample_type(&self) -> SampleType {
        self.descriptor.sample_type
    }

    pub fn bounds(&self) -> LatLonBox {
        self.descriptor.bounds()
    }

    pub fn rows_per_band(&self) -> usize {
        self.rows_per_band
    }

    pub fn cols_per_tile(&self) -> usize {
        self.cols_per_tile
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn num_tiles(&self) -> usize {
        self.num_tiles
    }

    pub fn band_height_deg(&self) -> f64 {
        self.rows_per_band as f64 * self.descriptor.cell_size_deg
    }

    pub fn tile_width_deg(&self) -> f64 {
        self.cols_per_tile as f64 * self.descriptor.cell_size_deg
    }

    /// Ledger of the host buffers this level has allocated
    pub fn ledger(&self) -> &Arc<BufferLedger> {
        &self.ledger
    }

    /// Cell range and extent of a tile.
    ///
    /// # Panics
    ///
    /// Panics if `band` or `tile` is out of range.
    pub fn tile_bounds(&self, band: usize, tile: usize) -> TileBounds {
        assert!(
            band < self.num_bands,
            "band {band} out of range ({} bands)",
            self.num_bands
        );
        assert!(
            tile < self.num_tiles,
            "tile {tile} out of range ({} tiles)",
            self.num_tiles
        );

        let d = &self.descriptor;
        let first_row = band * self.rows_per_band;
        let num_rows = self.rows_per_band.min(d.num_rows - first_row);
        let first_col = tile * self.cols_per_tile;
        let num_cols = self.cols_per_tile.min(d.num_cols - first_col);

        let north = d.north_lat_deg() - first_row as f64 * d.cell_size_deg;
        let west = d.west_lon_deg + first_col as f64 * d.cell_size_deg;
        TileBounds {
            first_row,
            num_rows,
            first_col,
            num_cols,
            bounds: LatLonBox::new(
                north,
                north - num_rows as f64 * d.cell_size_deg,
                west + num_cols as f64 * d.cell_size_deg,
                west,
            ),
        }
    }

    /// Keys of every tile whose bounds share interior with `view`, band-major.
    ///
    /// Returns an empty vector for empty views and views outside the level.
    pub fn find_tiles(&self, view: &LatLonBox, level_number: usize) -> Vec<TileKey> {
        let region = view.intersect(&self.bounds());
        if region.is_empty() {
            return Vec::new();
        }

        let north = self.descriptor.north_lat_deg();
        let west = self.descriptor.west_lon_deg;
        let band_height = self.band_height_deg();
        let tile_width = self.tile_width_deg();

        let clamp = |index: f64, count: usize| (index.max(0.0) as usize).min(count - 1);
        let first_band = (north - region.north_deg) / band_height;
        let last_band = (north - region.south_deg) / band_height;
        let first_tile = (region.west_deg - west) / tile_width;
        let last_tile = (region.east_deg - west) / tile_width;
        let min_band = clamp(first_band.floor(), self.num_bands);
        let max_band = clamp(last_band.ceil() - 1.0, self.num_bands);
        let min_tile = clamp(first_tile.floor(), self.num_tiles);
        let max_tile = clamp(last_tile.ceil() - 1.0, self.num_tiles);

        let mut keys = Vec::with_capacity(
            (max_band + 1).saturating_sub(min_band) * (max_tile + 1).saturating_sub(min_tile),
        );
        for band in min_band..=max_band {
            for tile in min_tile..=max_tile {
                keys.push(TileKey::new(level_number, band, tile));
            }
        }
        keys
    }

    /// Copy one tile plus `border_cells` of margin on every side.
    ///
    /// Rows past the north or south edge repeat the edge row. Columns past the
    /// west or east edge wrap to the opposite edge of the same rows. Samples
    /// are decoded to native byte order.
    ///
    /// # Panics
    ///
    /// Panics if `band` or `tile` is out of range.
    pub fn copy_tile(
        &self,
        band: usize,
        tile: usize,
        border_cells: usize,
    ) -> Result<HostTile, LevelError> {
        let tb = self.tile_bounds(band, tile);
        let d = &self.descriptor;
        let bytes_per_sample = d.sample_type.bytes_per_sample();

        let data_rows = tb.num_rows + 2 * border_cells;
        let data_cols = tb.num_cols + 2 * border_cells;
        let first_col = tb.first_col as i64 - border_cells as i64;
        let spans = column_spans(first_col, first_col + data_cols as i64 - 1, d.num_cols);

        let read_err = |source| LevelError::Read { band, tile, source };
        let mut raw = Vec::with_capacity(data_rows * data_cols * bytes_per_sample);
        let last_row = d.num_rows as i64 - 1;
        let first_row = tb.first_row as i64 - border_cells as i64;
        for row in first_row..first_row + data_rows as i64 {
            let row = row.clamp(0, last_row) as u64;
            let row_offset = row * (d.num_cols * bytes_per_sample) as u64;
            for span in &spans {
                let offset = row_offset + (span.first_col * bytes_per_sample) as u64;
                self.source
                    .copy_range(offset, span.num_cols * bytes_per_sample, &mut raw)
                    .map_err(read_err)?;
            }
        }

        let data = decode_samples(&raw, d.sample_type, d.sample_order);
        let border_deg = border_cells as f64 * d.cell_size_deg;
        Ok(HostTile::new(
            tb.bounds.expand(border_deg),
            data_rows,
            data_cols,
            border_cells,
            border_deg,
            SampleBuffer::new(data, &self.ledger),
        ))
    }
}

pub(crate) fn decode_samples(
    raw: &[u8],
    sample_type: SampleType,
    order: SampleOrder,
) -> SampleData {
    let count = raw.len() / sample_type.bytes_per_sample();
    match (sample_type, order) {
        (SampleType::I16, SampleOrder::LittleEndian) => {
            let mut out = vec![0i16; count];
            LittleEndian::read_i16_into(raw, &mut out);
            SampleData::I16(out)
        }
        (SampleType::I16, SampleOrder::BigEndian) => {
            let mut out = vec![0i16; count];
            BigEndian::read_i16_into(raw, &mut out);
            SampleData::I16(out)
        }
        (SampleType::F32, SampleOrder::LittleEndian) => {
            let mut out = vec![0f32; count];
            LittleEndian::read_f32_into(raw, &mut out);
            SampleData::F32(out)
        }
        (SampleType::F32, SampleOrder::BigEndian) => {
            let mut out = vec![0f32; count];
            BigEndian::read_f32_into(raw, &mut out);
            SampleData::F32(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    /// A global 1-degree grid where each sample holds its column index
    fn column_index_level(max_cols_per_tile: usize) -> Level {
        let descriptor = LevelDescriptor::global(180, 360, 1.0, SampleType::I16);
        let samples: Vec<i16> = (0..180).flat_map(|_| 0..360i16).collect();
        let source = Arc::new(MemorySource::from_i16(&samples, true));
        Level::new(descriptor, source, 32, max_cols_per_tile).unwrap()
    }

    fn row_index_level() -> Level {
        let descriptor = LevelDescriptor {
            sample_order: SampleOrder::BigEndian,
            ..LevelDescriptor::global(180, 360, 1.0, SampleType::I16)
        };
        let samples: Vec<i16> = (0..180i16).flat_map(|r| std::iter::repeat(r).take(360)).collect();
        let source = Arc::new(MemorySource::from_i16(&samples, false));
        Level::new(descriptor, source, 32, 32).unwrap()
    }

    #[test]
    fn test_partition_counts() {
        let level = column_index_level(32);
        assert_eq!(level.rows_per_band(), 32);
        assert_eq!(level.num_bands(), 6);
        assert_eq!(level.num_tiles(), 12);

        // Last band is short
        let last = level.tile_bounds(5, 0);
        assert_eq!(last.first_row, 160);
        assert_eq!(last.num_rows, 20);
        assert_eq!(last.bounds.south_deg, -90.0);
    }

    #[test]
    fn test_tile_size_clamped_to_grid() {
        let level = column_index_level(4096);
        assert_eq!(level.cols_per_tile(), 360);
        assert_eq!(level.num_tiles(), 1);
    }

    #[test]
    fn test_tile_bounds_geography() {
        let level = column_index_level(32);
        let tb = level.tile_bounds(1, 2);
        assert_eq!(tb.bounds, LatLonBox::new(58.0, 26.0, -84.0, -116.0));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_tile_bounds_out_of_range_panics() {
        let level = column_index_level(32);
        level.tile_bounds(6, 0);
    }

    #[test]
    fn test_source_length_checked() {
        let descriptor = LevelDescriptor::global(180, 360, 1.0, SampleType::I16);
        let source = Arc::new(MemorySource::zeroed(10));
        let err = Level::new(descriptor, source, 32, 32).unwrap_err();
        assert!(matches!(
            err,
            LevelError::SourceLength {
                expected: 129_600,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_invalid_descriptor() {
        let descriptor = LevelDescriptor::global(0, 360, 1.0, SampleType::I16);
        let source = Arc::new(MemorySource::zeroed(0));
        assert!(matches!(
            Level::new(descriptor, source, 32, 32),
            Err(LevelError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_find_tiles_exact_tile_view() {
        let level = column_index_level(32);
        let tb = level.tile_bounds(1, 2);
        assert_eq!(level.find_tiles(&tb.bounds, 3), vec![TileKey::new(3, 1, 2)]);
    }

    #[test]
    fn test_find_tiles_band_major() {
        let level = column_index_level(32);
        let view = LatLonBox::new(60.0, 50.0, -80.0, -120.0);
        let keys = level.find_tiles(&view, 0);
        let expected: Vec<_> = [(0, 1), (0, 2), (0, 3), (1, 1), (1, 2), (1, 3)]
            .iter()
            .map(|&(b, t)| TileKey::new(0, b, t))
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_find_tiles_outside_and_degenerate() {
        let level = column_index_level(32);
        assert!(level
            .find_tiles(&LatLonBox::new(120.0, 100.0, 10.0, 0.0), 0)
            .is_empty());
        assert!(level
            .find_tiles(&LatLonBox::new(10.0, 10.0, 10.0, 0.0), 0)
            .is_empty());
        assert!(level
            .find_tiles(&LatLonBox::new(f64::NAN, 0.0, 10.0, 0.0), 0)
            .is_empty());
    }

    #[test]
    fn test_find_tiles_clamps_oversized_view() {
        let level = column_index_level(32);
        let keys = level.find_tiles(&LatLonBox::new(200.0, -200.0, 400.0, -400.0), 0);
        assert_eq!(keys.len(), 6 * 12);
    }

    #[test]
    fn test_copy_tile_shape_and_bounds() {
        let level = column_index_level(32);
        let tile = level.copy_tile(1, 2, 1).unwrap();
        assert_eq!(tile.data_rows(), 34);
        assert_eq!(tile.data_cols(), 34);
        assert_eq!(tile.samples().len(), 34 * 34);
        assert_eq!(tile.bounds(), &LatLonBox::new(59.0, 25.0, -83.0, -117.0));
        assert_eq!(tile.visible_bounds(), LatLonBox::new(58.0, 26.0, -84.0, -116.0));
    }

    #[test]
    fn test_copy_tile_wraps_east_edge() {
        let level = column_index_level(8);
        let last = level.num_tiles() - 1;
        let tile = level.copy_tile(0, last, 1).unwrap();
        let cols = tile.data_cols();
        // Tile covers columns 352..360; the east border column is grid column 0
        assert_eq!(tile.sample(0, cols - 1), Some(0.0));
        assert_eq!(tile.sample(0, cols - 2), Some(359.0));
        // West border column is grid column 351
        assert_eq!(tile.sample(0, 0), Some(351.0));
    }

    #[test]
    fn test_copy_tile_wraps_west_edge() {
        let level = column_index_level(8);
        let tile = level.copy_tile(2, 0, 1).unwrap();
        assert_eq!(tile.sample(5, 0), Some(359.0));
        assert_eq!(tile.sample(5, 1), Some(0.0));
    }

    #[test]
    fn test_copy_tile_clamps_rows() {
        let level = row_index_level();
        let tile = level.copy_tile(0, 0, 2).unwrap();
        // Two border rows above the north edge repeat row 0
        assert_eq!(tile.sample(0, 0), Some(0.0));
        assert_eq!(tile.sample(1, 0), Some(0.0));
        assert_eq!(tile.sample(2, 0), Some(0.0));
        assert_eq!(tile.sample(3, 0), Some(1.0));
        // Bounds still extend past the pole
        assert_eq!(tile.bounds().north_deg, 92.0);

        let south = level.copy_tile(5, 0, 1).unwrap();
        let last = south.data_rows() - 1;
        assert_eq!(south.sample(last, 3), Some(179.0));
        assert_eq!(south.sample(last - 1, 3), Some(179.0));
        assert_eq!(south.sample(last - 2, 3), Some(178.0));
    }

    #[test]
    fn test_copy_tile_registers_buffer() {
        let level = column_index_level(32);
        let tile = level.copy_tile(0, 0, 1).unwrap();
        assert_eq!(level.ledger().live(), 1);
        drop(tile);
        assert_eq!(level.ledger().live(), 0);
        assert_eq!(level.ledger().released(), 1);
    }

    #[test]
    fn test_copy_tile_decodes_f32() {
        let descriptor = LevelDescriptor::global(2, 4, 90.0, SampleType::F32);
        let mut bytes = Vec::new();
        for i in 0..8 {
            bytes.extend_from_slice(&(i as f32 * 0.5).to_le_bytes());
        }
        let level = Level::new(descriptor, Arc::new(MemorySource::new(bytes)), 2, 4).unwrap();
        let tile = level.copy_tile(0, 0, 0).unwrap();
        assert_eq!(tile.sample_type(), SampleType::F32);
        assert_eq!(tile.sample(1, 3), Some(3.5));
    }
}
