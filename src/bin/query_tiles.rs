//! Answers a single k-nearest-neighbor query against an on-disk tiled index.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use geodelaunay::loader::{load_tiles, FilesystemSource, TileSource};
use geodelaunay::query::TiledQuery;
use geodelaunay::IndexSettings;

/// Loads a tiled index from `tiles/{lang}/` and answers one k-NN query.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Query latitude in degrees.
    #[arg(long)]
    lat: f64,

    /// Query longitude in degrees.
    #[arg(long)]
    lon: f64,

    /// Number of nearest articles to return.
    #[arg(long, default_value_t = 1)]
    k: usize,

    /// Language tag; tiles are read from `tiles_dir/{lang}/`.
    #[arg(long, env = "GEODELAUNAY_LANG", default_value = "en")]
    lang: String,

    /// Root directory containing per-language tile directories.
    #[arg(long, default_value = "out")]
    tiles_dir: std::path::PathBuf,

    /// Emit results as JSON instead of plain text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "query failed");
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let source = FilesystemSource::new(args.tiles_dir.join(&args.lang));
    let manifest = source
        .fetch_manifest()
        .context("fetching manifest")?
        .context("no tiled data for this language; fall back to monolithic mode")?;

    let settings = IndexSettings::default();
    let mut query = TiledQuery::new(manifest, settings);

    let selection = query.tiles_for_position(args.lat, args.lon);
    let mut ids = Vec::new();
    if !selection.primary.is_empty() {
        ids.push(selection.primary.clone());
    }
    ids.extend(selection.adjacent.iter().cloned());
    info!(tiles = ?ids, "loading tiles for query");

    load_tiles(&source, &mut query, &ids, settings.max_binary_size()).context("loading tiles")?;

    let results = query
        .find_nearest(args.lat, args.lon, args.k)
        .context("answering nearest-neighbor query")?;

    if args.json {
        let json: Vec<_> = results
            .iter()
            .map(|(title, distance)| serde_json::json!({"title": title, "distance": distance}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        for (title, distance) in &results {
            println!("{title}\t{distance:.6}");
        }
    }

    Ok(())
}
