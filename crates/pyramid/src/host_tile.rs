use crate::bounds::LatLonBox;
use crate::sample::{SampleBuffer, SampleType};

/// A decoded tile in host memory, with a border margin on every side.
///
/// `bounds` includes the border; [`HostTile::visible_bounds`] excludes it.
/// Samples are row-major, north row first.
#[derive(Debug)]
pub struct HostTile {
    bounds: LatLonBox,
    data_rows: usize,
    data_cols: usize,
    border_cells: usize,
    border_deg: f64,
    samples: SampleBuffer,
    /// Frame number of the last update that needed this tile
    pub last_used_frame: u64,
}

impl HostTile {
    pub fn new(
        bounds: LatLonBox,
        data_rows: usize,
        data_cols: usize,
        border_cells: usize,
        border_deg: f64,
        samples: SampleBuffer,
    ) -> Self {
        debug_assert_eq!(samples.len(), data_rows * data_cols);
        Self {
            bounds,
            data_rows,
            data_cols,
            border_cells,
            border_deg,
            samples,
            last_used_frame: 0,
        }
    }

    pub fn bounds(&self) -> &LatLonBox {
        &self.bounds
    }

    pub fn visible_bounds(&self) -> LatLonBox {
        self.bounds.inset(self.border_deg)
    }

    pub fn data_rows(&self) -> usize {
        self.data_rows
    }

    pub fn data_cols(&self) -> usize {
        self.data_cols
    }

    pub fn border_cells(&self) -> usize {
        self.border_cells
    }

    pub fn border_deg(&self) -> f64 {
        self.border_deg
    }

    pub fn sample_type(&self) -> SampleType {
        self.samples.data().sample_type()
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    /// Sample at `(row, col)` of the bordered buffer.
    pub fn sample(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.data_rows || col >= self.data_cols {
            return None;
        }
        self.samples.data().value(row * self.data_cols + col)
    }

    /// Host memory held by this tile in bytes
    pub fn memory_size(&self) -> usize {
        self.samples.memory_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{BufferLedger, SampleData};
    use std::sync::Arc;

    #[test]
    fn test_sample_lookup() {
        let ledger = Arc::new(BufferLedger::new());
        let buffer = SampleBuffer::new(SampleData::I16(vec![1, 2, 3, 4, 5, 6]), &ledger);
        let tile = HostTile::new(LatLonBox::new(1.0, 0.0, 1.0, 0.0), 2, 3, 0, 0.0, buffer);

        assert_eq!(tile.sample(1, 2), Some(6.0));
        assert_eq!(tile.sample(2, 0), None);
        assert_eq!(tile.sample(0, 3), None);
        assert_eq!(tile.memory_size(), 12);
        assert_eq!(tile.visible_bounds(), *tile.bounds());
    }
}
