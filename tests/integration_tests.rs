//! End-to-end scenarios from the design's testable-properties list: full
//! pipelines (records -> tiler -> hull -> delaunay -> codec, and the tiled
//! query fanout) rather than single-module unit tests.

use std::collections::HashMap;

use geodelaunay::delaunay;
use geodelaunay::hull;
use geodelaunay::math::{to_cartesian, LatLon};
use geodelaunay::query::TiledQuery;
use geodelaunay::records::ArticleRecord;
use geodelaunay::tiler::{self, TileIndex};
use geodelaunay::walk;
use geodelaunay::{IndexSettings, Point3D};

fn octahedron() -> Vec<Point3D> {
    vec![
        Point3D::new(1.0, 0.0, 0.0),
        Point3D::new(-1.0, 0.0, 0.0),
        Point3D::new(0.0, 1.0, 0.0),
        Point3D::new(0.0, -1.0, 0.0),
        Point3D::new(0.0, 0.0, 1.0),
        Point3D::new(0.0, 0.0, -1.0),
    ]
}

fn icosahedron() -> Vec<Point3D> {
    let phi = (1.0 + 5f64.sqrt()) / 2.0;
    let raw = [
        (-1.0, phi, 0.0),
        (1.0, phi, 0.0),
        (-1.0, -phi, 0.0),
        (1.0, -phi, 0.0),
        (0.0, -1.0, phi),
        (0.0, 1.0, phi),
        (0.0, -1.0, -phi),
        (0.0, 1.0, -phi),
        (phi, 0.0, -1.0),
        (phi, 0.0, 1.0),
        (-phi, 0.0, -1.0),
        (-phi, 0.0, 1.0),
    ];
    raw.iter().map(|&(x, y, z)| Point3D::new(x, y, z).normalize()).collect()
}

#[test]
fn octahedron_eight_faces_and_exact_nearest() {
    let built = hull::build(octahedron()).unwrap();
    assert_eq!(built.faces.len(), 8);

    let mesh = delaunay::extract(built).unwrap();

    let query = Point3D::new(3.0, 0.1, 0.1).normalize();
    let nearest = walk::find_nearest(&mesh, query, None);
    let pos = mesh.vertices[nearest as usize].position;
    assert!((pos - Point3D::new(1.0, 0.0, 0.0)).norm() < 1e-9);

    let polar_query = Point3D::new(0.0, 0.0, 1.0);
    let k1 = walk::k_nearest(&mesh, polar_query, 1, None);
    assert_eq!(k1.len(), 1);
    assert!(k1[0].distance < 1e-12);
}

#[test]
fn icosahedron_euler_and_equal_circumradii() {
    let built = hull::build(icosahedron()).unwrap();
    assert_eq!(built.faces.len(), 20);

    let mesh = delaunay::extract(built).unwrap();
    assert_eq!(mesh.triangles.len(), 2 * mesh.vertices.len() - 4);

    let r0 = mesh.triangles[0].circumradius;
    for tri in &mesh.triangles {
        assert!((tri.circumradius - r0).abs() < 1e-10);
    }
}

#[test]
fn world_cities_paris_is_nearest() {
    let cities = [
        ("Paris", 48.8566, 2.3522),
        ("New York City", 40.7128, -74.0060),
        ("Sydney", -33.8688, 151.2093),
        ("Tokyo", 35.6762, 139.6503),
        ("Rio de Janeiro", -22.9068, -43.1729),
        ("Moscow", 55.7558, 37.6173),
        ("Nairobi", -1.2921, 36.8219),
        ("London", 51.5074, -0.1278),
        ("Buenos Aires", -34.6037, -58.3816),
        ("Singapore", 1.3521, 103.8198),
    ];
    let points: Vec<Point3D> = cities.iter().map(|&(_, lat, lon)| to_cartesian(LatLon::new(lat, lon))).collect();

    let built = hull::build(points).unwrap();
    assert_eq!(built.faces.len(), 16);

    let mesh = delaunay::extract(built).unwrap();
    let titles: Vec<&str> = mesh.original_indices.iter().map(|&i| cities[i as usize].0).collect();

    let query = to_cartesian(LatLon::new(48.5, 2.0));
    let nearest = walk::find_nearest(&mesh, query, None);
    assert_eq!(titles[nearest as usize], "Paris");
}

fn clustered_records() -> Vec<ArticleRecord> {
    let centers = [(57.0, 17.0), (52.0, 2.0), (37.0, 142.5)];
    let mut records = Vec::new();
    for (ci, &(clat, clon)) in centers.iter().enumerate() {
        for i in 0..10 {
            let dlat = ((i / 5) as f64 - 0.5) * 0.6;
            let dlon = ((i % 5) as f64 - 2.0) * 0.3;
            records.push(ArticleRecord {
                title: format!("article-{ci}-{i}"),
                lat: clat + dlat,
                lon: clon + dlon,
            });
        }
    }
    records
}

#[test]
fn tiled_end_to_end_three_tiles_all_hashes_match() {
    let records = clustered_records();
    let settings = IndexSettings::default();
    let (manifest, files) = tiler::build_all(&records, &settings, "2026-01-01T00:00:00Z".into()).unwrap();

    assert_eq!(manifest.tiles.len(), 3);
    let total: usize = manifest.tiles.iter().map(|t| t.articles).sum();
    assert_eq!(total, 30);

    for entry in &manifest.tiles {
        let bytes = &files[&entry.id];
        let decoded = geodelaunay::codec::decode(bytes, settings.max_binary_size()).unwrap();
        assert!(decoded.vertices.len() >= 10);

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash: String = hasher.finalize().iter().take(4).map(|b| format!("{b:02x}")).collect();
        assert_eq!(hash, entry.hash);
    }
}

fn build_tiled_world(records: &[ArticleRecord], settings: &IndexSettings) -> (TileIndex, HashMap<String, Vec<u8>>) {
    tiler::build_all(records, settings, "2026-01-01T00:00:00Z".into()).unwrap()
}

#[test]
fn deduplication_under_buffering_has_no_repeated_titles() {
    // Two adjacent native tiles, with one shared article right on their
    // shared boundary so it falls inside both tiles' buffered sets.
    let settings = IndexSettings::default();
    let mut records = Vec::new();
    // Tile A: row 20 (lat [10,15)), col 36 (lon [0,5)).
    for i in 0..8 {
        records.push(ArticleRecord {
            title: format!("a-{i}"),
            lat: 11.0 + (i / 2) as f64 * 0.6,
            lon: 1.0 + (i % 2) as f64 * 1.5,
        });
    }
    // Tile B: row 21 (lat [15,20)), col 36.
    for i in 0..8 {
        records.push(ArticleRecord {
            title: format!("b-{i}"),
            lat: 16.0 + (i / 2) as f64 * 0.6,
            lon: 1.0 + (i % 2) as f64 * 1.5,
        });
    }
    // Shared article sitting just inside tile B, close enough to the shared
    // boundary (lat=15) that tile A's buffer (0.5 deg) also picks it up.
    records.push(ArticleRecord {
        title: "Shared".into(),
        lat: 15.2,
        lon: 2.0,
    });

    let (manifest, files) = build_tiled_world(&records, &settings);
    assert_eq!(manifest.tiles.len(), 2);

    let mut query = TiledQuery::new(manifest.clone(), settings);
    for entry in &manifest.tiles {
        let bytes = &files[&entry.id];
        let decoded = geodelaunay::codec::decode(bytes, settings.max_binary_size()).unwrap();
        query.add_tile(entry.id.clone(), decoded.to_mesh(), decoded.titles).unwrap();
    }

    // A position near the shared boundary between both native tiles.
    let results = query.find_nearest(15.0, 2.0, 6).unwrap();
    assert!(results.len() <= 6);
    let titles: Vec<&str> = results.iter().map(|(t, _)| t.as_str()).collect();
    let unique: std::collections::HashSet<&str> = titles.iter().copied().collect();
    assert_eq!(titles.len(), unique.len());
}

#[test]
fn boundary_tile_selection_handles_antimeridian_and_pole() {
    use geodelaunay::tiler::TileEntry;

    let settings = IndexSettings::default();
    let make_entry = |id: &str, row: i64, col: i64| {
        let g = settings.grid_deg();
        TileEntry {
            id: id.to_string(),
            row,
            col,
            south: row as f64 * g - 90.0,
            north: (row + 1) as f64 * g - 90.0,
            west: col as f64 * g - 180.0,
            east: (col + 1) as f64 * g - 180.0,
            articles: 0,
            bytes: 0,
            hash: "deadbeef".into(),
        }
    };

    let manifest_antimeridian = TileIndex {
        version: 1,
        grid_deg: settings.grid_deg(),
        buffer_deg: settings.buffer_deg(),
        generated: "2026-01-01T00:00:00Z".into(),
        tiles: vec![make_entry("18-71", 18, 71), make_entry("18-00", 18, 0)],
    };
    let selection = tiler_query_selection(&manifest_antimeridian, &settings, 2.5, 179.5);
    assert_eq!(selection.0, "18-71");
    assert_eq!(selection.1, vec!["18-00".to_string()]);

    let manifest_pole = TileIndex {
        version: 1,
        grid_deg: settings.grid_deg(),
        buffer_deg: settings.buffer_deg(),
        generated: "2026-01-01T00:00:00Z".into(),
        tiles: vec![make_entry("35-36", 35, 36)],
    };
    let selection = tiler_query_selection(&manifest_pole, &settings, 89.5, 2.5);
    assert_eq!(selection.0, "35-36");
    assert!(selection.1.is_empty());
}

fn tiler_query_selection(manifest: &TileIndex, settings: &IndexSettings, lat: f64, lon: f64) -> (String, Vec<String>) {
    let selection = geodelaunay::query::tiles_for_position(manifest, lat, lon, settings);
    (selection.primary, selection.adjacent)
}
