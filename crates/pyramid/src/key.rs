use std::fmt;

/// Identifies one tile of one level: `(level, band, tile)`.
///
/// Level 0 is the finest level of the pyramid. Bands count from the north edge
/// of the level, tiles from its west edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: usize,
    pub band: usize,
    pub tile: usize,
}

impl TileKey {
    pub fn new(level: usize, band: usize, tile: usize) -> Self {
        Self { level, band, tile }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}/B{}/T{}", self.level, self.band, self.tile)
    }
}
