//! Error taxonomy for the hull builder, binary codec, tiler, and query engine.
//!
//! One enum per failure domain: [`HullError`], [`CodecError`], [`TilerError`],
//! [`RecordError`], [`QueryError`], [`LoaderError`]. Pure functions return
//! `Result`; invariant violations are programmer errors and abort via
//! `panic!`/`debug_assert!` instead.

use thiserror::Error;

/// Failures from the convex hull builder and Delaunay extraction.
#[derive(Error, Debug)]
pub enum HullError {
    /// Fewer than 4 points, or all points coincident/collinear/coplanar.
    #[error("degenerate input: {0}")]
    DegenerateInput(&'static str),
    /// A mid-build invariant was violated (missing twin, broken adjacency, ...).
    /// Only raised where the caller asked for a checked build; the default
    /// path aborts via `panic!` for programmer errors.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(&'static str),
}

/// Sub-kinds of a corrupt or malformed tile binary.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("header too small: need at least 16 bytes, got {0}")]
    HeaderTooSmall(usize),
    #[error("buffer exceeds configured size limit ({len} > {limit} bytes)")]
    SizeLimitExceeded { len: usize, limit: usize },
    #[error("articles section out of bounds: offset={offset} length={length} file_len={file_len}")]
    ArticlesSectionOutOfBounds {
        offset: usize,
        length: usize,
        file_len: usize,
    },
    #[error("articles section overlaps fixed body: offset={offset} min_offset={min_offset}")]
    ArticlesSectionOverlapsBody { offset: usize, min_offset: usize },
    #[error("title bytes ({actual}) do not match declared lengths ({expected})")]
    TitleLengthMismatch { expected: usize, actual: usize },
    #[error("invalid UTF-8 in article titles: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("decoded tile hash {decoded} does not match manifest hash {manifest}")]
    ManifestMismatch { decoded: String, manifest: String },
}

/// Failures building a tile set from a record stream.
#[derive(Error, Debug)]
pub enum TilerError {
    #[error("all input points are degenerate, cannot build any tile")]
    AllInputDegenerate,
}

/// Failures parsing the article record stream.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid JSON record: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: rejected coordinate (0, 0)")]
    OriginRejected { line: usize },
    #[error("line {line}: non-finite latitude or longitude")]
    NonFinite { line: usize },
    #[error("line {line}: latitude {lat} out of range [-90, 90]")]
    LatitudeOutOfRange { line: usize, lat: f64 },
    #[error("line {line}: longitude {lon} out of range [-180, 180]")]
    LongitudeOutOfRange { line: usize, lon: f64 },
}

/// Failures answering a tiled nearest-neighbor query.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("no tiles are loaded")]
    NoTilesLoaded,
    #[error("tile {0} is not present in the manifest")]
    UnknownTile(String),
}

/// Failures from the loader/cache glue.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("manifest is not valid JSON: {0}")]
    ManifestInvalid(#[source] serde_json::Error),
}
