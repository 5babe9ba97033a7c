//! Geographic bounding boxes in degrees.

/// An axis-aligned latitude/longitude box, in degrees.
///
/// A box is empty when it has no interior: `north <= south` or `east <= west`.
/// Non-finite edges also make a box empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonBox {
    pub north_deg: f64,
    pub south_deg: f64,
    pub east_deg: f64,
    pub west_deg: f64,
}

impl LatLonBox {
    /// Create a box from its north, south, east and west edges.
    pub fn new(north_deg: f64, south_deg: f64, east_deg: f64, west_deg: f64) -> Self {
        Self {
            north_deg,
            south_deg,
            east_deg,
            west_deg,
        }
    }

    pub fn height_deg(&self) -> f64 {
        self.north_deg - self.south_deg
    }

    pub fn width_deg(&self) -> f64 {
        self.east_deg - self.west_deg
    }

    pub fn is_empty(&self) -> bool {
        // Written so that NaN edges compare as empty
        !(self.north_deg > self.south_deg && self.east_deg > self.west_deg)
    }

    /// The overlap of two boxes. May be empty.
    pub fn intersect(&self, other: &LatLonBox) -> LatLonBox {
        LatLonBox {
            north_deg: self.north_deg.min(other.north_deg),
            south_deg: self.south_deg.max(other.south_deg),
            east_deg: self.east_deg.min(other.east_deg),
            west_deg: self.west_deg.max(other.west_deg),
        }
    }

    /// True if the boxes share interior area (touching edges do not count).
    pub fn intersects(&self, other: &LatLonBox) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Grow the box by `margin_deg` on every side.
    pub fn expand(&self, margin_deg: f64) -> LatLonBox {
        LatLonBox {
            north_deg: self.north_deg + margin_deg,
            south_deg: self.south_deg - margin_deg,
            east_deg: self.east_deg + margin_deg,
            west_deg: self.west_deg - margin_deg,
        }
    }

    /// Shrink the box by `margin_deg` on every side.
    pub fn inset(&self, margin_deg: f64) -> LatLonBox {
        self.expand(-margin_deg)
    }
}
