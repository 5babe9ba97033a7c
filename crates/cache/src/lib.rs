//! Relief Cache Library
//!
//! Frame-driven streaming of terrain tiles from host memory to the GPU.
//!
//! [`TileCache`] owns every tile of a [`relief_pyramid::TilePyramid`] that is
//! loading, resident in host memory, or resident on the GPU. Reads run on a
//! [`TileLoader`], uploads go through a [`GpuBinding`], and tiles unused for
//! two frames are evicted under per-frame caps.

mod cache;
pub mod config;
pub mod device;
pub mod loader;
mod lru;
pub mod projection;
mod stats;

pub use cache::TileCache;
pub use config::{ConfigError, TileCacheConfig};
pub use device::{
    upload_tile, DeviceTile, GpuBinding, HeadlessBuffer, HeadlessGpu, HeadlessTexture, QuadVertex,
    TextureFormat, TextureInfo, TextureUpload,
};
pub use loader::{
    InlineLoader, LoadRejected, LoadResult, ManualLoader, ManualLoaderHandle, ThreadedLoader,
    TileLoader,
};
pub use projection::{Mercator, PlateCarree, Projection};
pub use stats::TileCacheStats;
