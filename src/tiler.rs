//! Partitions article records onto a fixed lat/lon grid and builds one
//! triangulated tile per populated cell.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
#[cfg(feature = "trace")]
use tracing::info_span;
use tracing::warn;

use crate::codec;
use crate::config::IndexSettings;
use crate::delaunay;
use crate::error::{HullError, TilerError};
use crate::hull;
use crate::math::{to_cartesian, LatLon};
use crate::records::ArticleRecord;

/// Geographic bounds of a tile's native (unbuffered) interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

/// Computes `(row, col)` for a point, per the fixed grid in `settings`.
pub fn tile_for(lat: f64, lon: f64, settings: &IndexSettings) -> (i64, i64) {
    let row = ((lat + 90.0) / settings.grid_deg()).floor() as i64;
    let col = ((lon + 180.0) / settings.grid_deg()).floor() as i64;
    (row, col)
}

/// Formats a tile id as zero-padded `"RR-CC"`.
pub fn tile_id(row: i64, col: i64) -> String {
    format!("{row:02}-{col:02}")
}

fn tile_bounds(row: i64, col: i64, settings: &IndexSettings) -> TileBounds {
    let g = settings.grid_deg();
    TileBounds {
        south: row as f64 * g - 90.0,
        north: (row + 1) as f64 * g - 90.0,
        west: col as f64 * g - 180.0,
        east: (col + 1) as f64 * g - 180.0,
    }
}

/// One row of the manifest: identity, bounds, and the hash of the tile file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileEntry {
    pub id: String,
    pub row: i64,
    pub col: i64,
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
    pub articles: usize,
    pub bytes: usize,
    pub hash: String,
}

/// The manifest: version, grid parameters, generation time, and the ordered
/// list of populated tile entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileIndex {
    pub version: u32,
    #[serde(rename = "gridDeg")]
    pub grid_deg: f64,
    #[serde(rename = "bufferDeg")]
    pub buffer_deg: f64,
    pub generated: String,
    pub tiles: Vec<TileEntry>,
}

/// Selects the native set (half-open interval) and buffered set
/// (closed interval, `+/- buffer_deg`) for one tile.
fn collect_tile_articles<'a>(
    records: &'a [ArticleRecord],
    row: i64,
    col: i64,
    settings: &IndexSettings,
) -> (Vec<&'a ArticleRecord>, Vec<&'a ArticleRecord>) {
    let bounds = tile_bounds(row, col, settings);
    let buffer = settings.buffer_deg();

    let native: Vec<&ArticleRecord> = records
        .iter()
        .filter(|r| r.lat >= bounds.south && r.lat < bounds.north && r.lon >= bounds.west && r.lon < bounds.east)
        .collect();

    let buffered: Vec<&ArticleRecord> = records
        .iter()
        .filter(|r| {
            r.lat >= bounds.south - buffer
                && r.lat <= bounds.north + buffer
                && r.lon >= bounds.west - buffer
                && r.lon <= bounds.east + buffer
        })
        .collect();

    (native, buffered)
}

/// Builds a single tile's binary buffer and manifest entry, or `None` if the
/// tile's buffered set is too small or geometrically degenerate — both are
/// non-fatal per-tile outcomes, not errors.
fn build_tile(
    row: i64,
    col: i64,
    records: &[ArticleRecord],
    settings: &IndexSettings,
) -> Option<(TileEntry, Vec<u8>)> {
    let id = tile_id(row, col);
    #[cfg(feature = "trace")]
    let _span = info_span!("build_tile", tile = %id).entered();

    let (native, buffered) = collect_tile_articles(records, row, col, settings);
    if buffered.len() < 4 {
        warn!(tile = %id, count = buffered.len(), "skipping tile: fewer than 4 buffered points");
        return None;
    }

    let points = buffered
        .iter()
        .map(|r| to_cartesian(LatLon::new(r.lat, r.lon)))
        .collect();
    let titles: Vec<String> = buffered.iter().map(|r| r.title.clone()).collect();

    let hull = match hull::build(points) {
        Ok(hull) => hull,
        Err(HullError::DegenerateInput(reason)) => {
            warn!(tile = %id, reason, "skipping tile: degenerate point set");
            return None;
        }
        Err(e) => {
            warn!(tile = %id, error = %e, "skipping tile: hull build failed");
            return None;
        }
    };

    let mesh = match delaunay::extract(hull) {
        Ok(mesh) => mesh,
        Err(e) => {
            warn!(tile = %id, error = %e, "skipping tile: delaunay extraction failed");
            return None;
        }
    };

    // `extract` may drop points with no incident face; keep titles aligned.
    let titles: Vec<String> = mesh
        .original_indices
        .iter()
        .map(|&orig| titles[orig as usize].clone())
        .collect();

    let bytes = codec::encode(&mesh, &titles);

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    let bounds = tile_bounds(row, col, settings);
    let entry = TileEntry {
        id,
        row,
        col,
        south: bounds.south,
        north: bounds.north,
        west: bounds.west,
        east: bounds.east,
        articles: native.len(),
        bytes: bytes.len(),
        hash,
    };

    Some((entry, bytes))
}

/// Builds every populated tile in `records`, in parallel across tiles.
/// Returns the manifest and a map from tile id to its encoded bytes, or
/// [`TilerError::AllInputDegenerate`] if every populated cell was skipped
/// (too few buffered points, or a degenerate point set).
///
/// `generated` is the manifest's timestamp; callers supply it (rather than
/// this function calling the clock) so builds stay reproducible in tests.
pub fn build_all(
    records: &[ArticleRecord],
    settings: &IndexSettings,
    generated: String,
) -> Result<(TileIndex, HashMap<String, Vec<u8>>), TilerError> {
    let mut populated: HashMap<(i64, i64), ()> = HashMap::new();
    for r in records {
        populated.insert(tile_for(r.lat, r.lon, settings), ());
    }

    let results: Vec<(TileEntry, Vec<u8>)> = populated
        .into_par_iter()
        .filter_map(|((row, col), ())| build_tile(row, col, records, settings))
        .collect();

    if results.is_empty() {
        return Err(TilerError::AllInputDegenerate);
    }

    let mut tiles = Vec::with_capacity(results.len());
    let mut files = HashMap::with_capacity(results.len());
    for (entry, bytes) in results {
        files.insert(entry.id.clone(), bytes);
        tiles.push(entry);
    }
    tiles.sort_by(|a, b| a.id.cmp(&b.id));

    let index = TileIndex {
        version: 1,
        grid_deg: settings.grid_deg(),
        buffer_deg: settings.buffer_deg(),
        generated,
        tiles,
    };

    Ok((index, files))
}
