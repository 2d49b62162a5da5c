//! A global nearest-neighbor index over geotagged points on a sphere.
//!
//! Points are triangulated with a spherical Delaunay triangulation (the
//! faces of an incremental 3D convex hull over unit-sphere points), tiled
//! onto a fixed lat/lon grid, and served from a binary per-tile format. The
//! pipeline, end to end:
//!
//! ```text
//! records -> tiler -> (per populated tile) hull -> delaunay -> codec -> tile files + manifest
//! ```
//!
//! At query time:
//!
//! ```text
//! manifest -> loader selects tiles near position -> codec decodes each
//!          -> query routes per-query fanout -> walk computes results -> merge/dedup
//! ```
//!
//! Every module below is usable standalone (e.g. `hull::build` on any
//! unit-sphere point set); `tiler` and `query` compose them into the
//! production tiled pipeline.

pub mod codec;
pub mod config;
pub mod delaunay;
pub mod error;
pub mod hull;
pub mod loader;
pub mod math;
pub mod orient;
pub mod query;
pub mod records;
pub mod tiler;
pub mod walk;

pub use config::IndexSettings;
pub use delaunay::SphericalDelaunay;
pub use error::{CodecError, HullError, LoaderError, QueryError, RecordError, TilerError};
pub use hull::ConvexHull;
pub use math::{LatLon, Point3D};
pub use query::TiledQuery;
pub use records::ArticleRecord;
