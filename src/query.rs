//! Runtime tiled query engine: selects tiles near a position and merges
//! per-tile k-NN results.

use std::collections::HashMap;

#[cfg(feature = "trace")]
use tracing::info_span;

use crate::config::IndexSettings;
use crate::delaunay::SphericalDelaunay;
use crate::error::QueryError;
use crate::math::{to_cartesian, LatLon};
use crate::tiler::{tile_for, tile_id, TileIndex};
use crate::walk::{self, Neighbor};

/// The tiles relevant to a query position: the primary (containing) tile,
/// plus zero or more edge/corner-adjacent tiles present in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSelection {
    pub primary: String,
    pub adjacent: Vec<String>,
}

/// Computes which tiles a query at `(lat, lon)` should consult, per the
/// edge/corner-proximity rule: a tile whose boundary is within
/// `edge_proximity_deg` of the query point pulls in its neighbor. Tiles
/// absent from the manifest (row/col out of range, or simply unpopulated)
/// are excluded.
pub fn tiles_for_position(manifest: &TileIndex, lat: f64, lon: f64, settings: &IndexSettings) -> TileSelection {
    let (row, col) = tile_for(lat, lon, settings);
    let rows = settings.row_count() as i64;
    let cols = settings.col_count() as i64;

    let known: std::collections::HashSet<&str> = manifest.tiles.iter().map(|t| t.id.as_str()).collect();
    let primary_id = tile_id(row, col);

    let g = settings.grid_deg();
    let south = row as f64 * g - 90.0;
    let north = (row + 1) as f64 * g - 90.0;
    let west = col as f64 * g - 180.0;
    let east = (col + 1) as f64 * g - 180.0;
    let prox = settings.edge_proximity_deg();

    let near_south = (lat - south).abs() <= prox;
    let near_north = (north - lat).abs() <= prox;
    let near_west = (lon - west).abs() <= prox;
    let near_east = (east - lon).abs() <= prox;

    let wrap_col = |c: i64| -> i64 { ((c % cols) + cols) % cols };

    let mut adjacent = Vec::new();
    let mut push_if_known = |row: i64, col: i64| {
        if row < 0 || row >= rows {
            return;
        }
        let col = wrap_col(col);
        let id = tile_id(row, col);
        if known.contains(id.as_str()) && id != primary_id && !adjacent.contains(&id) {
            adjacent.push(id);
        }
    };

    if near_south {
        push_if_known(row - 1, col);
    }
    if near_north {
        push_if_known(row + 1, col);
    }
    if near_west {
        push_if_known(row, col - 1);
    }
    if near_east {
        push_if_known(row, col + 1);
    }
    // Corner neighbors only when two adjacent edges are both near.
    if near_south && near_west {
        push_if_known(row - 1, col - 1);
    }
    if near_south && near_east {
        push_if_known(row - 1, col + 1);
    }
    if near_north && near_west {
        push_if_known(row + 1, col - 1);
    }
    if near_north && near_east {
        push_if_known(row + 1, col + 1);
    }

    let primary = known.contains(primary_id.as_str()).then_some(primary_id).unwrap_or_default();

    TileSelection { primary, adjacent }
}

/// Holds the manifest, a bounded cache of decoded tile meshes, and an LRU
/// eviction list. `findNearest` fans out to whatever tiles are currently
/// loaded; loading tiles into this cache is the loader's job (`crate::loader`).
pub struct TiledQuery {
    manifest: TileIndex,
    settings: IndexSettings,
    tiles: HashMap<String, (SphericalDelaunay, Vec<String>)>,
    lru: Vec<String>,
}

impl TiledQuery {
    pub fn new(manifest: TileIndex, settings: IndexSettings) -> Self {
        Self {
            manifest,
            settings,
            tiles: HashMap::new(),
            lru: Vec::new(),
        }
    }

    pub fn manifest(&self) -> &TileIndex {
        &self.manifest
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.tiles.contains_key(id)
    }

    pub fn tiles_for_position(&self, lat: f64, lon: f64) -> TileSelection {
        tiles_for_position(&self.manifest, lat, lon, &self.settings)
    }

    /// Inserts or replaces a decoded tile, touching the LRU. Evicts the
    /// least-recently-touched tile once the cache exceeds its capacity.
    ///
    /// Fails with [`QueryError::UnknownTile`] if `id` isn't one of this
    /// query's manifest entries.
    pub fn add_tile(&mut self, id: String, mesh: SphericalDelaunay, titles: Vec<String>) -> Result<(), QueryError> {
        if !self.manifest.tiles.iter().any(|t| t.id == id) {
            return Err(QueryError::UnknownTile(id));
        }

        self.tiles.insert(id.clone(), (mesh, titles));
        self.lru.retain(|existing| existing != &id);
        self.lru.push(id);

        while self.lru.len() > self.settings.lru_capacity() {
            let evicted = self.lru.remove(0);
            self.tiles.remove(&evicted);
        }
        Ok(())
    }

    /// Answers a k-nearest-neighbor query by fanning out to every currently
    /// loaded tile relevant to `(lat, lon)`, deduplicating by title (keeping
    /// the smallest distance), and returning the closest `k`.
    ///
    /// Fails with [`QueryError::NoTilesLoaded`] if no tiles have been loaded
    /// yet. `k == 0` is a valid request and returns an empty vector.
    pub fn find_nearest(&self, lat: f64, lon: f64, k: usize) -> Result<Vec<(String, f64)>, QueryError> {
        if self.tiles.is_empty() {
            return Err(QueryError::NoTilesLoaded);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        #[cfg(feature = "trace")]
        let _span = info_span!("find_nearest", lat, lon, k).entered();
        let query = to_cartesian(LatLon::new(lat, lon));

        let selection = self.tiles_for_position(lat, lon);
        let mut candidate_tiles: Vec<&str> = Vec::new();
        if !selection.primary.is_empty() && self.tiles.contains_key(&selection.primary) {
            candidate_tiles.push(&selection.primary);
        }
        for id in &selection.adjacent {
            if self.tiles.contains_key(id) {
                candidate_tiles.push(id);
            }
        }
        // Fall back to every loaded tile if selection yields nothing (e.g.
        // the manifest doesn't cover the query's own tile but some other
        // loaded tile still does, which the caller chose to load anyway).
        if candidate_tiles.is_empty() {
            candidate_tiles.extend(self.tiles.keys().map(String::as_str));
        }

        let mut best_by_title: HashMap<&str, Neighbor> = HashMap::new();
        let mut title_lookup: HashMap<&str, &str> = HashMap::new();

        for tile_id in candidate_tiles {
            let (mesh, titles) = &self.tiles[tile_id];
            let found = walk::k_nearest(mesh, query, (2 * k).max(k + 6), None);
            for n in found {
                let title = titles[n.vertex as usize].as_str();
                title_lookup.insert(title, title);
                best_by_title
                    .entry(title)
                    .and_modify(|existing| {
                        if n.distance < existing.distance {
                            *existing = n;
                        }
                    })
                    .or_insert(n);
            }
        }

        let mut results: Vec<(String, f64)> = best_by_title
            .into_iter()
            .map(|(title, n)| (title.to_owned(), n.distance))
            .collect();
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results.truncate(k);
        Ok(results)
    }
}
