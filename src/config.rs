//! Tunable settings for tiling and querying: a plain struct with `with_*`
//! builder setters and a `Default` impl carrying the production defaults.

/// Degrees per tile edge, south-to-north and west-to-east.
pub const DEFAULT_GRID_DEG: f64 = 5.0;
/// Degrees of buffer added on each side of a tile's native bounds when
/// selecting the points that go into its mesh.
pub const DEFAULT_BUFFER_DEG: f64 = 0.5;
/// Distance (degrees) from a tile edge within which a query pulls in the
/// neighboring tile.
pub const DEFAULT_EDGE_PROXIMITY_DEG: f64 = 1.0;
/// Maximum number of decoded tiles a [`crate::query::TiledQuery`] keeps
/// resident before evicting the least-recently-touched one.
pub const DEFAULT_LRU_CAPACITY: usize = 50;
/// Default ceiling on a single decoded tile buffer, in bytes.
pub const DEFAULT_MAX_BINARY_SIZE: usize = 128 * 1024 * 1024;

/// Settings shared by the tiler and the tiled query engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexSettings {
    grid_deg: f64,
    buffer_deg: f64,
    edge_proximity_deg: f64,
    lru_capacity: usize,
    max_binary_size: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            grid_deg: DEFAULT_GRID_DEG,
            buffer_deg: DEFAULT_BUFFER_DEG,
            edge_proximity_deg: DEFAULT_EDGE_PROXIMITY_DEG,
            lru_capacity: DEFAULT_LRU_CAPACITY,
            max_binary_size: DEFAULT_MAX_BINARY_SIZE,
        }
    }
}

impl IndexSettings {
    pub fn with_grid_deg(mut self, grid_deg: f64) -> Self {
        self.grid_deg = grid_deg;
        self
    }

    pub fn with_buffer_deg(mut self, buffer_deg: f64) -> Self {
        self.buffer_deg = buffer_deg;
        self
    }

    pub fn with_edge_proximity_deg(mut self, edge_proximity_deg: f64) -> Self {
        self.edge_proximity_deg = edge_proximity_deg;
        self
    }

    pub fn with_lru_capacity(mut self, lru_capacity: usize) -> Self {
        self.lru_capacity = lru_capacity;
        self
    }

    pub fn with_max_binary_size(mut self, max_binary_size: usize) -> Self {
        self.max_binary_size = max_binary_size;
        self
    }

    pub fn grid_deg(&self) -> f64 {
        self.grid_deg
    }

    pub fn buffer_deg(&self) -> f64 {
        self.buffer_deg
    }

    pub fn edge_proximity_deg(&self) -> f64 {
        self.edge_proximity_deg
    }

    pub fn lru_capacity(&self) -> usize {
        self.lru_capacity
    }

    pub fn max_binary_size(&self) -> usize {
        self.max_binary_size
    }

    /// Number of grid rows spanning the full latitude range.
    pub fn row_count(&self) -> usize {
        (180.0 / self.grid_deg).ceil() as usize
    }

    /// Number of grid columns spanning the full longitude range.
    pub fn col_count(&self) -> usize {
        (360.0 / self.grid_deg).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_constants() {
        let settings = IndexSettings::default();
        assert_eq!(settings.grid_deg(), 5.0);
        assert_eq!(settings.buffer_deg(), 0.5);
        assert_eq!(settings.edge_proximity_deg(), 1.0);
        assert_eq!(settings.lru_capacity(), 50);
        assert_eq!(settings.max_binary_size(), 128 * 1024 * 1024);
    }

    #[test]
    fn builder_setters_compose() {
        let settings = IndexSettings::default().with_grid_deg(10.0).with_lru_capacity(5);
        assert_eq!(settings.grid_deg(), 10.0);
        assert_eq!(settings.lru_capacity(), 5);
    }

    #[test]
    fn row_and_col_counts_match_five_degree_grid() {
        let settings = IndexSettings::default();
        assert_eq!(settings.row_count(), 36);
        assert_eq!(settings.col_count(), 72);
    }
}
