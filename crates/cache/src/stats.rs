//! Tile cache statistics

use serde::Serialize;

/// Snapshot of a [`crate::TileCache`]'s pools and lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TileCacheStats {
    /// Tiles resident in host memory
    pub host_tiles: usize,

    /// Loads submitted and not yet published
    pub loading: usize,

    /// Tiles resident on the GPU
    pub device_tiles: usize,

    pub loads_requested: u64,

    pub loads_completed: u64,

    pub loads_failed: u64,

    /// Loads that finished after their placeholder was gone, or were
    /// undrained at shutdown
    pub loads_discarded: u64,

    /// Requests rejected because the loader queue was full
    pub loads_deferred: u64,

    /// Host to device uploads
    pub transfers: u64,

    pub host_evictions: u64,

    pub device_evictions: u64,

    /// Coarser tiles drawn under missing tiles in the last update
    pub fallback_tiles: usize,
}

impl TileCacheStats {
    /// Fraction of finished loads that failed (0.0 to 1.0)
    pub fn failure_rate(&self) -> f64 {
        let total = self.loads_completed + self.loads_failed;
        if total == 0 {
            0.0
        } else {
            self.loads_failed as f64 / total as f64
        }
    }

    pub fn resident_tiles(&self) -> usize {
        self.host_tiles + self.device_tiles
    }
}
