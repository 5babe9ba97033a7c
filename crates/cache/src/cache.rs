//! Frame-driven tile cache
//!
//! [`TileCache`] is driven by one [`TileCache::update`] call per frame on the
//! thread that owns the GPU context. Each call drains finished loads, evicts
//! tiles that went unused for two frames, requests reads for newly visible
//! tiles, uploads a bounded number of host tiles to the GPU, and returns the
//! device tiles to draw, coarser fallback tiles first.
//!
//! Every tile lives in a single access-ordered map as exactly one of
//! `Loading`, `Host` or `Device`. The host pool is the `Loading` and `Host`
//! entries, the device pool the `Device` entries, so a tile can never be
//! resident in both.

use crate::config::{ConfigError, TileCacheConfig};
use crate::device::{upload_tile, DeviceTile, GpuBinding};
use crate::loader::{LoadRejected, LoadResult, ThreadedLoader, TileLoader};
use crate::lru::AccessOrderedMap;
use crate::projection::Projection;
use crate::stats::TileCacheStats;
use relief_pyramid::{HostTile, LatLonBox, TileKey, TilePyramid};
use relief_scheduler::FrameQuota;
use std::fmt;
use std::sync::Arc;

/// Frames an entry survives after its last use
const GRACE_FRAMES: u64 = 2;

enum CacheEntry<G: GpuBinding> {
    Loading { last_used_frame: u64 },
    Host(HostTile),
    Device(DeviceTile<G>),
}

impl<G: GpuBinding> CacheEntry<G> {
    fn last_used_frame(&self) -> u64 {
        match self {
            CacheEntry::Loading { last_used_frame } => *last_used_frame,
            CacheEntry::Host(tile) => tile.last_used_frame,
            CacheEntry::Device(tile) => tile.last_used_frame,
        }
    }

    fn set_last_used_frame(&mut self, frame: u64) {
        match self {
            CacheEntry::Loading { last_used_frame } => *last_used_frame = frame,
            CacheEntry::Host(tile) => tile.last_used_frame = frame,
            CacheEntry::Device(tile) => tile.last_used_frame = frame,
        }
    }
}

/// Streams tiles of a [`TilePyramid`] from disk to the GPU.
pub struct TileCache<G: GpuBinding> {
    pyramid: Arc<TilePyramid>,
    config: TileCacheConfig,
    loader: Box<dyn TileLoader>,
    projection: Box<dyn Projection>,
    entries: AccessOrderedMap<TileKey, CacheEntry<G>>,
    frame_number: u64,
    stats: TileCacheStats,
    disposed: bool,
}

impl<G: GpuBinding> fmt::Debug for TileCache<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCache")
            .field("levels", &self.pyramid.len())
            .field("frame_number", &self.frame_number)
            .field("entries", &self.entries.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<G: GpuBinding> TileCache<G> {
    /// Create a cache that reads tiles on a dedicated IO thread.
    pub fn new(
        pyramid: Arc<TilePyramid>,
        config: TileCacheConfig,
        projection: Box<dyn Projection>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let loader = ThreadedLoader::new(
            pyramid.clone(),
            config.border_cells,
            config.loader_queue_capacity,
        );
        Self::with_loader(pyramid, config, projection, Box::new(loader))
    }

    /// Create a cache around a caller-supplied loader.
    ///
    /// The loader should read tiles from the same pyramid with
    /// `config.border_cells` of border.
    pub fn with_loader(
        pyramid: Arc<TilePyramid>,
        config: TileCacheConfig,
        projection: Box<dyn Projection>,
        loader: Box<dyn TileLoader>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.check_tiling(&pyramid)?;
        log::debug!(
            "tile cache over {} levels, {} transfers per frame",
            pyramid.len(),
            config.transfers_per_frame
        );
        Ok(Self {
            pyramid,
            config,
            loader,
            projection,
            entries: AccessOrderedMap::new(),
            frame_number: 0,
            stats: TileCacheStats::default(),
            disposed: false,
        })
    }

    pub fn pyramid(&self) -> &Arc<TilePyramid> {
        &self.pyramid
    }

    pub fn config(&self) -> &TileCacheConfig {
        &self.config
    }

    /// Advance one frame and return the tiles to draw, in draw order.
    ///
    /// # Arguments
    ///
    /// * `gpu` - Binding for the current GPU context
    /// * `frame_number` - Monotonically increasing frame counter
    /// * `view` - Visible region in degrees
    /// * `level` - Pyramid level to draw, 0 being the finest
    ///
    /// # Panics
    ///
    /// Panics if the cache has been disposed.
    pub fn update(
        &mut self,
        gpu: &mut G,
        frame_number: u64,
        view: &LatLonBox,
        level: usize,
    ) -> Vec<&DeviceTile<G>> {
        assert!(!self.disposed, "TileCache::update called after dispose");
        self.frame_number = frame_number;

        self.drain_publishes(frame_number);
        self.evict(gpu, frame_number);

        let draw = self.pyramid.find_tiles(view, level);
        let preload = self.preload_keys(&draw, view, level);
        self.request_loads(&preload, frame_number);
        self.transfer(gpu, &preload);

        let fallback = self.fallback_keys(&draw, view, level);
        for key in preload.iter().chain(&fallback) {
            if self.entries.touch(key) {
                if let Some(entry) = self.entries.get_mut(key) {
                    entry.set_last_used_frame(frame_number);
                }
            }
        }

        self.draw_list(&fallback, &draw)
    }

    /// [`TileCache::update`] on the level suited to `pixel_size_deg`.
    pub fn update_for_pixel_size(
        &mut self,
        gpu: &mut G,
        frame_number: u64,
        view: &LatLonBox,
        pixel_size_deg: f64,
    ) -> Vec<&DeviceTile<G>> {
        let level = self.pyramid.level_for_pixel_size(pixel_size_deg);
        self.update(gpu, frame_number, view, level)
    }

    /// Shut the loader down and release every tile.
    ///
    /// Loads still in flight finish on the IO thread and are dropped there.
    /// Calling this more than once is a no-op.
    pub fn dispose(&mut self, gpu: &mut G) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.stats.loads_discarded += self.loader.shutdown() as u64;

        let mut released = 0;
        for (_, entry) in self.entries.drain() {
            if let CacheEntry::Device(tile) = entry {
                tile.release(gpu);
                released += 1;
            }
        }
        log::debug!("tile cache disposed, released {released} device tiles");
    }

    fn drain_publishes(&mut self, frame_number: u64) {
        for LoadResult { key, outcome } in self.loader.drain() {
            if !self.is_loading(key) {
                log::debug!("discarding load of {key}, no longer requested");
                self.stats.loads_discarded += 1;
                continue;
            }
            match outcome {
                Ok(mut tile) => {
                    tile.last_used_frame = frame_number;
                    self.entries.insert(key, CacheEntry::Host(tile));
                    self.stats.loads_completed += 1;
                }
                Err(_) => {
                    // Logged by the loader; the next preload pass asks again
                    self.entries.remove(&key);
                    self.stats.loads_failed += 1;
                }
            }
        }
    }

    fn evict(&mut self, gpu: &mut G, frame_number: u64) {
        let mut host_quota = FrameQuota::new(self.config.host_evictions_per_frame);
        let mut device_quota = FrameQuota::new(self.config.device_evictions_per_frame);
        let mut victims = Vec::new();

        for (key, entry) in self.entries.iter() {
            if host_quota.is_spent() && device_quota.is_spent() {
                break;
            }
            // Everything after this entry was touched later
            if entry.last_used_frame().saturating_add(GRACE_FRAMES) > frame_number {
                break;
            }
            let quota = match entry {
                CacheEntry::Loading { .. } => continue,
                CacheEntry::Host(_) => &mut host_quota,
                CacheEntry::Device(_) => &mut device_quota,
            };
            if quota.try_take() {
                victims.push(*key);
            }
        }

        for key in victims {
            match self.entries.remove(&key) {
                Some(CacheEntry::Device(tile)) => {
                    log::debug!("evicting device tile {key}");
                    tile.release(gpu);
                    self.stats.device_evictions += 1;
                }
                Some(CacheEntry::Host(_)) => {
                    log::debug!("evicting host tile {key}");
                    self.stats.host_evictions += 1;
                }
                _ => {}
            }
        }
    }

    fn preload_keys(&self, draw: &[TileKey], view: &LatLonBox, level: usize) -> Vec<TileKey> {
        let mut keys = draw.to_vec();
        if self.config.preload_coarser && level + 1 < self.pyramid.len() {
            keys.extend(self.pyramid.find_tiles(view, level + 1));
        }
        if self.config.preload_finer && level > 0 {
            keys.extend(self.pyramid.find_tiles(view, level - 1));
        }
        keys
    }

    fn request_loads(&mut self, keys: &[TileKey], frame_number: u64) {
        for &key in keys {
            if self.entries.contains_key(&key) {
                continue;
            }
            match self.loader.request(key) {
                Ok(()) => {
                    self.entries.insert(
                        key,
                        CacheEntry::Loading {
                            last_used_frame: frame_number,
                        },
                    );
                    self.stats.loads_requested += 1;
                }
                Err(LoadRejected::Full) => self.stats.loads_deferred += 1,
                Err(LoadRejected::ShutDown) => {
                    log::warn!("tile loader shut down while the cache is live");
                    break;
                }
            }
        }
    }

    fn transfer(&mut self, gpu: &mut G, keys: &[TileKey]) {
        let mut quota = FrameQuota::new(self.config.transfers_per_frame);
        for &key in keys {
            if quota.is_spent() {
                break;
            }
            let device = match self.entries.get(&key) {
                Some(CacheEntry::Host(host)) => {
                    upload_tile(gpu, key, host, self.projection.as_ref())
                }
                _ => continue,
            };
            quota.try_take();
            // Replacing the entry drops the host buffer
            self.entries.insert(key, CacheEntry::Device(device));
            self.stats.transfers += 1;
        }
    }

    /// Coarser tiles to draw under draw keys that have no device tile yet.
    ///
    /// For each missing tile, coarser levels are walked nearest first and
    /// every tile covering the missing region is added, stopping at the
    /// first level that is fully on the GPU. Coverage split across several
    /// coarser levels may draw a few redundant tiles.
    fn fallback_keys(&self, draw: &[TileKey], view: &LatLonBox, level: usize) -> Vec<TileKey> {
        let mut fallback = Vec::new();
        for &key in draw {
            if self.contains_device(key) {
                continue;
            }
            let region = self.pyramid.tile_bounds(key).bounds.intersect(view);
            if region.is_empty() {
                continue;
            }
            for coarser in level + 1..self.pyramid.len() {
                let candidates = self.pyramid.find_tiles(&region, coarser);
                let covered = candidates.iter().all(|&k| self.contains_device(k));
                fallback.extend(candidates);
                if covered {
                    break;
                }
            }
        }
        fallback.sort_by(|a, b| {
            b.level
                .cmp(&a.level)
                .then(a.band.cmp(&b.band))
                .then(a.tile.cmp(&b.tile))
        });
        fallback.dedup();
        fallback
    }

    fn draw_list(&mut self, fallback: &[TileKey], draw: &[TileKey]) -> Vec<&DeviceTile<G>> {
        self.stats.fallback_tiles = fallback
            .iter()
            .filter(|&&key| self.contains_device(key))
            .count();

        fallback
            .iter()
            .chain(draw)
            .filter_map(|key| match self.entries.get(key) {
                Some(CacheEntry::Device(tile)) => Some(tile),
                _ => None,
            })
            .collect()
    }

    pub fn contains_host(&self, key: TileKey) -> bool {
        matches!(self.entries.get(&key), Some(CacheEntry::Host(_)))
    }

    pub fn contains_device(&self, key: TileKey) -> bool {
        matches!(self.entries.get(&key), Some(CacheEntry::Device(_)))
    }

    pub fn is_loading(&self, key: TileKey) -> bool {
        matches!(self.entries.get(&key), Some(CacheEntry::Loading { .. }))
    }

    pub fn device_tile(&self, key: TileKey) -> Option<&DeviceTile<G>> {
        match self.entries.get(&key) {
            Some(CacheEntry::Device(tile)) => Some(tile),
            _ => None,
        }
    }

    /// Frame an entry was last needed in, if present
    pub fn last_used_frame(&self, key: TileKey) -> Option<u64> {
        self.entries.get(&key).map(CacheEntry::last_used_frame)
    }

    pub fn host_tile_count(&self) -> usize {
        self.count(|e| matches!(e, CacheEntry::Host(_)))
    }

    pub fn device_tile_count(&self) -> usize {
        self.count(|e| matches!(e, CacheEntry::Device(_)))
    }

    pub fn loading_count(&self) -> usize {
        self.count(|e| matches!(e, CacheEntry::Loading { .. }))
    }

    fn count(&self, pred: impl Fn(&CacheEntry<G>) -> bool) -> usize {
        self.entries.iter().filter(|&(_, e)| pred(e)).count()
    }

    pub fn stats(&self) -> TileCacheStats {
        TileCacheStats {
            host_tiles: self.host_tile_count(),
            loading: self.loading_count(),
            device_tiles: self.device_tile_count(),
            ..self.stats
        }
    }

    /// Frame number of the latest update
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<G: GpuBinding> Drop for TileCache<G> {
    fn drop(&mut self) {
        if self.disposed {
            return;
        }
        self.loader.shutdown();
        let leaked = self.device_tile_count();
        if leaked > 0 {
            log::warn!("tile cache dropped without dispose, {leaked} device tiles not released");
        }
    }
}
