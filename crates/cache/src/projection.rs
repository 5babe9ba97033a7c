//! Geographic to plot coordinate projections.

use std::fmt;

/// Maps longitude/latitude in degrees to plot coordinates.
///
/// `min_usable_y`/`max_usable_y` bound the y range the projection can
/// represent; latitudes mapping outside it are clamped when placing tiles.
pub trait Projection: fmt::Debug + Send + Sync {
    fn lon_to_x(&self, lon_deg: f64) -> f64;

    fn lat_to_y(&self, lat_deg: f64) -> f64;

    fn min_usable_y(&self) -> f64;

    fn max_usable_y(&self) -> f64;
}

/// Equirectangular: x = longitude, y = latitude.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlateCarree;

impl Projection for PlateCarree {
    fn lon_to_x(&self, lon_deg: f64) -> f64 {
        lon_deg
    }

    fn lat_to_y(&self, lat_deg: f64) -> f64 {
        lat_deg
    }

    fn min_usable_y(&self) -> f64 {
        -90.0
    }

    fn max_usable_y(&self) -> f64 {
        90.0
    }
}

/// Spherical Mercator in degrees of longitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    max_lat_deg: f64,
}

impl Mercator {
    /// Latitude at which the map is square
    pub const DEFAULT_MAX_LAT_DEG: f64 = 85.051129;

    pub fn new() -> Self {
        Self {
            max_lat_deg: Self::DEFAULT_MAX_LAT_DEG,
        }
    }

    /// Usable up to `max_lat_deg` north and south
    pub fn with_max_lat(max_lat_deg: f64) -> Self {
        Self {
            max_lat_deg: max_lat_deg.abs().min(89.999),
        }
    }

    pub fn max_lat_deg(&self) -> f64 {
        self.max_lat_deg
    }
}

impl Default for Mercator {
    fn default() -> Self {
        Self::new()
    }
}

impl Projection for Mercator {
    fn lon_to_x(&self, lon_deg: f64) -> f64 {
        lon_deg
    }

    fn lat_to_y(&self, lat_deg: f64) -> f64 {
        let lat = lat_deg.clamp(-89.999_999, 89.999_999).to_radians();
        (std::f64::consts::FRAC_PI_4 + 0.5 * lat).tan().ln().to_degrees()
    }

    fn min_usable_y(&self) -> f64 {
        self.lat_to_y(-self.max_lat_deg)
    }

    fn max_usable_y(&self) -> f64 {
        self.lat_to_y(self.max_lat_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_carree_identity() {
        let p = PlateCarree;
        assert_eq!(p.lon_to_x(-123.5), -123.5);
        assert_eq!(p.lat_to_y(45.0), 45.0);
        assert_eq!((p.min_usable_y(), p.max_usable_y()), (-90.0, 90.0));
    }

    #[test]
    fn test_mercator_square_at_limit() {
        let m = Mercator::new();
        assert!((m.max_usable_y() - 180.0).abs() < 1e-3);
        assert!((m.min_usable_y() + 180.0).abs() < 1e-3);
        assert_eq!(m.lat_to_y(0.0), 0.0);
    }

    #[test]
    fn test_mercator_monotonic() {
        let m = Mercator::new();
        let ys: Vec<f64> = [-80.0, -30.0, 0.0, 30.0, 80.0]
            .iter()
            .map(|&lat| m.lat_to_y(lat))
            .collect();
        assert!(ys.windows(2).all(|w| w[0] < w[1]));
        // Stretches away from the equator
        assert!(m.lat_to_y(60.0) > 60.0);
    }

    #[test]
    fn test_mercator_pole_is_finite() {
        let m = Mercator::new();
        assert!(m.lat_to_y(90.0).is_finite());
        assert!(m.lat_to_y(-95.0).is_finite());
    }
}
