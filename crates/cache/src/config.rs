//! Tile cache configuration.
//!
//! This module provides the tunables of a [`TileCache`](crate::TileCache):
//! tile dimensions, per-frame work limits and preloading. Configuration can
//! be loaded from a TOML file, environment variables, or created
//! programmatically, and is fixed for the lifetime of a cache.

use relief_pyramid::TilePyramid;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Configuration for one tile cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileCacheConfig {
    /// Maximum band height in cells
    pub max_rows_per_band: usize,
    /// Maximum tile width in cells
    pub max_cols_per_tile: usize,
    /// Host tiles dropped per frame at most
    pub host_evictions_per_frame: usize,
    /// Device tiles released per frame at most
    pub device_evictions_per_frame: usize,
    /// Host-to-device uploads per frame at most
    pub transfers_per_frame: usize,
    /// Also load the next coarser level
    pub preload_coarser: bool,
    /// Also load the next finer level
    pub preload_finer: bool,
    /// Margin read around every tile, in cells
    pub border_cells: usize,
    /// Loads that may wait for the IO thread
    pub loader_queue_capacity: usize,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            max_rows_per_band: 2048,
            max_cols_per_tile: 2048,
            host_evictions_per_frame: 1,
            device_evictions_per_frame: 1,
            transfers_per_frame: 1,
            preload_coarser: true,
            preload_finer: false,
            border_cells: 1,
            loader_queue_capacity: relief_scheduler::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl TileCacheConfig {
    /// Creates a configuration with custom tile dimensions in cells.
    ///
    /// # Arguments
    /// * `max_rows_per_band` - Maximum band height in cells
    /// * `max_cols_per_tile` - Maximum tile width in cells
    pub fn new(max_rows_per_band: usize, max_cols_per_tile: usize) -> Self {
        Self {
            max_rows_per_band,
            max_cols_per_tile,
            ..Self::default()
        }
    }

    /// Preset for a machine performance level.
    ///
    /// - `-1` and below: 1024-cell tiles, no preloading
    /// - `0`: the default
    /// - `+1` and above: preload both neighbouring levels
    pub fn for_perf_level(level: i32) -> Self {
        match level {
            l if l <= -1 => Self {
                max_rows_per_band: 1024,
                max_cols_per_tile: 1024,
                preload_coarser: false,
                preload_finer: false,
                ..Self::default()
            },
            0 => Self::default(),
            _ => Self {
                preload_coarser: true,
                preload_finer: true,
                ..Self::default()
            },
        }
    }

    /// Sets the tile dimensions in cells.
    pub fn with_tile_size(mut self, max_rows_per_band: usize, max_cols_per_tile: usize) -> Self {
        self.max_rows_per_band = max_rows_per_band;
        self.max_cols_per_tile = max_cols_per_tile;
        self
    }

    /// Sets both per-frame eviction limits.
    pub fn with_evictions_per_frame(mut self, host: usize, device: usize) -> Self {
        self.host_evictions_per_frame = host;
        self.device_evictions_per_frame = device;
        self
    }

    /// Sets the per-frame transfer limit.
    pub fn with_transfers_per_frame(mut self, transfers: usize) -> Self {
        self.transfers_per_frame = transfers;
        self
    }

    /// Sets which neighbouring levels are preloaded.
    pub fn with_preload(mut self, coarser: bool, finer: bool) -> Self {
        self.preload_coarser = coarser;
        self.preload_finer = finer;
        self
    }

    /// Sets the tile border in cells.
    pub fn with_border_cells(mut self, border_cells: usize) -> Self {
        self.border_cells = border_cells;
        self
    }

    /// Sets the loader queue capacity.
    pub fn with_loader_queue_capacity(mut self, capacity: usize) -> Self {
        self.loader_queue_capacity = capacity;
        self
    }

    /// Checks that every size and per-frame limit is usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first zero field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_rows_per_band", self.max_rows_per_band),
            ("max_cols_per_tile", self.max_cols_per_tile),
            ("host_evictions_per_frame", self.host_evictions_per_frame),
            ("device_evictions_per_frame", self.device_evictions_per_frame),
            ("transfers_per_frame", self.transfers_per_frame),
            ("loader_queue_capacity", self.loader_queue_capacity),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(ConfigError::InvalidValue(name.to_string())),
            None => Ok(()),
        }
    }

    /// Check that no level of `pyramid` has bands or tiles larger than
    /// `max_rows_per_band` x `max_cols_per_tile`.
    ///
    /// The pyramid is cut when it is opened; these two fields only bound it.
    pub fn check_tiling(&self, pyramid: &TilePyramid) -> Result<(), ConfigError> {
        for (level, l) in pyramid.levels().iter().enumerate() {
            if l.rows_per_band() > self.max_rows_per_band
                || l.cols_per_tile() > self.max_cols_per_tile
            {
                return Err(ConfigError::TileSize {
                    level,
                    rows: l.rows_per_band(),
                    cols: l.cols_per_tile(),
                });
            }
        }
        Ok(())
    }

    /// Loads configuration from environment variables.
    ///
    /// `RELIEF_PERF_LEVEL` selects a preset (default: 0); the remaining
    /// variables override single fields of it:
    /// - `RELIEF_MAX_ROWS_PER_BAND`
    /// - `RELIEF_MAX_COLS_PER_TILE`
    /// - `RELIEF_HOST_EVICTIONS_PER_FRAME`
    /// - `RELIEF_DEVICE_EVICTIONS_PER_FRAME`
    /// - `RELIEF_TRANSFERS_PER_FRAME`
    /// - `RELIEF_PRELOAD_COARSER` (`true`/`false`)
    /// - `RELIEF_PRELOAD_FINER` (`true`/`false`)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env_value::<i32>("RELIEF_PERF_LEVEL")? {
            Some(level) => Self::for_perf_level(level),
            None => Self::default(),
        };

        if let Some(v) = env_value("RELIEF_MAX_ROWS_PER_BAND")? {
            config.max_rows_per_band = v;
        }
        if let Some(v) = env_value("RELIEF_MAX_COLS_PER_TILE")? {
            config.max_cols_per_tile = v;
        }
        if let Some(v) = env_value("RELIEF_HOST_EVICTIONS_PER_FRAME")? {
            config.host_evictions_per_frame = v;
        }
        if let Some(v) = env_value("RELIEF_DEVICE_EVICTIONS_PER_FRAME")? {
            config.device_evictions_per_frame = v;
        }
        if let Some(v) = env_value("RELIEF_TRANSFERS_PER_FRAME")? {
            config.transfers_per_frame = v;
        }
        if let Some(v) = env_value("RELIEF_PRELOAD_COARSER")? {
            config.preload_coarser = v;
        }
        if let Some(v) = env_value("RELIEF_PRELOAD_FINER")? {
            config.preload_finer = v;
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format (missing keys keep their defaults):
    /// ```toml
    /// max_rows_per_band = 2048
    /// max_cols_per_tile = 2048
    /// transfers_per_frame = 1
    /// preload_finer = true
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let toml = self.to_toml()?;
        fs::write(path.as_ref(), toml).map_err(ConfigError::Io)
    }

    /// Converts configuration to TOML format.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// I/O error reading or writing configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A pyramid level is tiled coarser than the configured maximum
    #[error("level {level} tiles are {rows}x{cols} cells, above the configured maximum")]
    TileSize {
        level: usize,
        rows: usize,
        cols: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const ENV_VARS: &[&str] = &[
        "RELIEF_PERF_LEVEL",
        "RELIEF_MAX_ROWS_PER_BAND",
        "RELIEF_MAX_COLS_PER_TILE",
        "RELIEF_HOST_EVICTIONS_PER_FRAME",
        "RELIEF_DEVICE_EVICTIONS_PER_FRAME",
        "RELIEF_TRANSFERS_PER_FRAME",
        "RELIEF_PRELOAD_COARSER",
        "RELIEF_PRELOAD_FINER",
    ];

    #[test]
    fn test_default_config() {
        let config = TileCacheConfig::default();
        assert_eq!(config.max_rows_per_band, 2048);
        assert_eq!(config.max_cols_per_tile, 2048);
        assert_eq!(config.host_evictions_per_frame, 1);
        assert_eq!(config.device_evictions_per_frame, 1);
        assert_eq!(config.transfers_per_frame, 1);
        assert!(config.preload_coarser);
        assert!(!config.preload_finer);
        assert_eq!(config.border_cells, 1);
        assert_eq!(config.loader_queue_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_perf_levels() {
        let low = TileCacheConfig::for_perf_level(-1);
        assert_eq!(low.max_rows_per_band, 1024);
        assert_eq!(low.max_cols_per_tile, 1024);
        assert!(!low.preload_coarser && !low.preload_finer);
        assert_eq!(TileCacheConfig::for_perf_level(-5), low);

        assert_eq!(TileCacheConfig::for_perf_level(0), TileCacheConfig::default());

        let high = TileCacheConfig::for_perf_level(2);
        assert!(high.preload_coarser && high.preload_finer);
        assert_eq!(high.max_rows_per_band, 2048);
    }

    #[test]
    fn test_builder_methods() {
        let config = TileCacheConfig::new(4, 8)
            .with_evictions_per_frame(3, 5)
            .with_transfers_per_frame(2)
            .with_preload(false, true)
            .with_border_cells(0)
            .with_loader_queue_capacity(16);

        assert_eq!((config.max_rows_per_band, config.max_cols_per_tile), (4, 8));
        assert_eq!(config.host_evictions_per_frame, 3);
        assert_eq!(config.device_evictions_per_frame, 5);
        assert_eq!(config.transfers_per_frame, 2);
        assert!(!config.preload_coarser && config.preload_finer);
        assert_eq!(config.border_cells, 0);
        assert_eq!(config.loader_queue_capacity, 16);
        assert_eq!(config.with_tile_size(1, 2).max_cols_per_tile, 2);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = TileCacheConfig::default().with_transfers_per_frame(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(name)) if name == "transfers_per_frame"
        ));
        // Zero border is allowed
        assert!(TileCacheConfig::default().with_border_cells(0).validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        // Save and restore env vars to avoid test pollution
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("RELIEF_PERF_LEVEL", "1");
        env::set_var("RELIEF_MAX_ROWS_PER_BAND", "512");
        env::set_var("RELIEF_MAX_COLS_PER_TILE", "256");
        env::set_var("RELIEF_HOST_EVICTIONS_PER_FRAME", "4");
        env::set_var("RELIEF_DEVICE_EVICTIONS_PER_FRAME", "3");
        env::set_var("RELIEF_TRANSFERS_PER_FRAME", "2");
        env::set_var("RELIEF_PRELOAD_COARSER", "false");
        env::remove_var("RELIEF_PRELOAD_FINER");

        let config = TileCacheConfig::from_env().unwrap();
        assert_eq!(config.max_rows_per_band, 512);
        assert_eq!(config.max_cols_per_tile, 256);
        assert_eq!(config.host_evictions_per_frame, 4);
        assert_eq!(config.device_evictions_per_frame, 3);
        assert_eq!(config.transfers_per_frame, 2);
        assert!(!config.preload_coarser);
        // From the perf level 1 preset
        assert!(config.preload_finer);
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(ENV_VARS);

        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("RELIEF_PERF_LEVEL", "-1");

        let config = TileCacheConfig::from_env().unwrap();
        assert_eq!(config, TileCacheConfig::for_perf_level(-1));
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::remove_var("RELIEF_PERF_LEVEL");
        env::set_var("RELIEF_TRANSFERS_PER_FRAME", "lots");
        let result = TileCacheConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(name)) if name == "RELIEF_TRANSFERS_PER_FRAME"
        ));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = TileCacheConfig::new(128, 256).with_preload(false, true);
        let toml = config.to_toml().unwrap();
        let parsed = TileCacheConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            # Smaller tiles, more uploads
            max_rows_per_band = 512
            transfers_per_frame = 4
        "#;

        let config = TileCacheConfig::from_toml(toml).unwrap();
        assert_eq!(config.max_rows_per_band, 512);
        assert_eq!(config.transfers_per_frame, 4);
        assert_eq!(config.max_cols_per_tile, 2048); // default
        assert!(config.preload_coarser); // default
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = TileCacheConfig::from_toml("max_rows_per_band = \"tall\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("relief.toml");

        let config = TileCacheConfig::for_perf_level(1).with_border_cells(2);
        config.save_to_file(&config_path).unwrap();

        let loaded = TileCacheConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }
}
