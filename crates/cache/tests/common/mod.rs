#![allow(dead_code)]

use relief_cache::{DeviceTile, HeadlessGpu, InlineLoader, PlateCarree, TileCache, TileCacheConfig};
use relief_pyramid::{Level, LevelDescriptor, MemorySource, SampleType, TileKey, TilePyramid};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Global zero-filled levels, each `(cell_size_deg, rows_per_band, cols_per_tile)`
pub fn pyramid(levels: &[(f64, usize, usize)]) -> Arc<TilePyramid> {
    let levels = levels
        .iter()
        .map(|&(cell_size, rows_per_band, cols_per_tile)| {
            let rows = (180.0 / cell_size).round() as usize;
            let descriptor = LevelDescriptor::global(rows, rows * 2, cell_size, SampleType::I16);
            let source = Arc::new(MemorySource::zeroed(descriptor.data_len()));
            Level::new(descriptor, source, rows_per_band, cols_per_tile).unwrap()
        })
        .collect();
    Arc::new(TilePyramid::new(levels).unwrap())
}

/// Three levels with 15, 30 and 60 degree tiles
pub fn three_levels() -> Arc<TilePyramid> {
    pyramid(&[(2.5, 6, 6), (5.0, 6, 6), (10.0, 6, 6)])
}

pub fn inline_cache(pyramid: &Arc<TilePyramid>, config: TileCacheConfig) -> TileCache<HeadlessGpu> {
    let loader = InlineLoader::new(pyramid.clone(), config.border_cells, 1024);
    TileCache::with_loader(
        pyramid.clone(),
        config,
        Box::new(PlateCarree),
        Box::new(loader),
    )
    .unwrap()
}

pub fn keys(drawn: &[&DeviceTile<HeadlessGpu>]) -> Vec<TileKey> {
    drawn.iter().map(|tile| tile.key()).collect()
}

/// Wait for reads finishing on a detached IO thread to drop their buffers
pub fn wait_for_host_buffers(pyramid: &TilePyramid, expected: usize) -> usize {
    for _ in 0..400 {
        if pyramid.live_host_buffers() == expected {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    pyramid.live_host_buffers()
}
