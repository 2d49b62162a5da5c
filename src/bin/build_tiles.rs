//! Builds a tiled (or monolithic) index from an article-record stream read
//! from stdin.

use std::io::{stdin, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use geodelaunay::codec;
use geodelaunay::delaunay;
use geodelaunay::hull;
use geodelaunay::math::{to_cartesian, LatLon};
use geodelaunay::records::{read_records, ArticleRecord};
use geodelaunay::tiler;
use geodelaunay::IndexSettings;

/// Builds a Delaunay-tiled nearest-neighbor index from a newline-delimited
/// JSON article-record stream on stdin.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Stop after reading this many records.
    #[arg(long)]
    limit: Option<usize>,

    /// Restrict to a bounding box: south,north,west,east in degrees.
    #[arg(long, value_parser = parse_bounds)]
    bounds: Option<(f64, f64, f64, f64)>,

    /// Language tag; tiles are written to `out/{lang}/`.
    #[arg(long, env = "GEODELAUNAY_LANG", default_value = "en")]
    lang: String,

    /// Build the tiled index (production path). Without this flag, build a
    /// single monolithic mesh over every input point instead.
    #[arg(long)]
    tiled: bool,

    /// Also write a debug JSON rendering of each tile alongside the binary.
    #[arg(long)]
    json: bool,

    /// Instead of building, convert an existing tile binary at this path to
    /// its debug JSON rendering (printed to stdout) and exit.
    #[arg(long)]
    convert: Option<PathBuf>,

    /// Root output directory.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,
}

fn parse_bounds(s: &str) -> Result<(f64, f64, f64, f64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err("expected south,north,west,east".to_string());
    }
    let mut values = [0.0; 4];
    for (i, p) in parts.iter().enumerate() {
        values[i] = p.parse().map_err(|_| format!("invalid number: {p}"))?;
    }
    Ok((values[0], values[1], values[2], values[3]))
}

fn in_bounds(r: &ArticleRecord, bounds: (f64, f64, f64, f64)) -> bool {
    let (s, n, w, e) = bounds;
    r.lat >= s && r.lat <= n && r.lon >= w && r.lon <= e
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "build failed");
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if let Some(path) = &args.convert {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let decoded = codec::decode(&bytes, IndexSettings::default().max_binary_size())?;
        let json = codec::to_debug_json(&decoded);
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let reader = BufReader::new(stdin());
    let mut records = read_records(reader).context("reading article record stream")?;

    if let Some(bounds) = args.bounds {
        records.retain(|r| in_bounds(r, bounds));
    }
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }
    info!(count = records.len(), lang = %args.lang, "loaded article records");

    let lang_dir = args.out_dir.join(&args.lang);
    std::fs::create_dir_all(&lang_dir).context("creating output directory")?;

    let settings = IndexSettings::default();

    if args.tiled {
        let generated = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let (manifest, files) =
            tiler::build_all(&records, &settings, generated).context("building tiled index")?;
        for entry in &manifest.tiles {
            let bytes = &files[&entry.id];
            std::fs::write(lang_dir.join(format!("{}.bin", entry.id)), bytes)
                .with_context(|| format!("writing tile {}", entry.id))?;
            if args.json {
                let decoded = codec::decode(bytes, settings.max_binary_size())?;
                let json = codec::to_debug_json(&decoded);
                std::fs::write(
                    lang_dir.join(format!("{}.json", entry.id)),
                    serde_json::to_vec_pretty(&json)?,
                )?;
            }
        }
        let manifest_json = serde_json::to_vec_pretty(&manifest)?;
        std::fs::write(lang_dir.join("index.json"), manifest_json).context("writing manifest")?;
        info!(tiles = manifest.tiles.len(), "tiled build complete");
    } else {
        let points = records
            .iter()
            .map(|r| to_cartesian(LatLon::new(r.lat, r.lon)))
            .collect();
        let hull = hull::build(points).context("building monolithic hull")?;
        let mesh = delaunay::extract(hull).context("extracting monolithic mesh")?;
        let titles: Vec<String> = mesh
            .original_indices
            .iter()
            .map(|&i| records[i as usize].title.clone())
            .collect();
        let bytes = codec::encode(&mesh, &titles);
        std::fs::write(lang_dir.join("monolithic.bin"), &bytes).context("writing monolithic tile")?;
        info!(vertices = mesh.vertices.len(), "monolithic build complete");
    }

    Ok(())
}
