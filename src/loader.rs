//! Loader/cache glue: fetches tile bytes and the manifest, verifying hashes,
//! and hands decoded tiles to a [`TiledQuery`]. Synchronous by design so any
//! I/O strategy — blocking HTTP, async wrapped in `block_on`, or a pure
//! in-memory double — can implement [`TileSource`] without forcing an
//! executor choice on the core.

use sha2::{Digest, Sha256};

use crate::codec;
use crate::error::{CodecError, LoaderError};
use crate::query::TiledQuery;
use crate::tiler::TileIndex;

/// External collaborator that actually moves bytes: disk, network, or a test
/// double. `fetch_manifest` returning `Ok(None)` means "404, no tiled data".
pub trait TileSource {
    fn fetch_manifest(&self) -> Result<Option<TileIndex>, LoaderError>;
    fn fetch_tile(&self, id: &str) -> Result<Vec<u8>, LoaderError>;
}

fn hash_prefix(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// Loads `ids` from `source` into `query`, verifying each tile's hash
/// against its manifest entry. A mismatch is reported as
/// [`CodecError::ManifestMismatch`] wrapped in [`LoaderError::Codec`] and
/// treated as a corrupt binary, so loading stops at the first bad tile
/// rather than silently serving corrupt data.
pub fn load_tiles(source: &dyn TileSource, query: &mut TiledQuery, ids: &[String], max_size: usize) -> Result<(), LoaderError> {
    let manifest = query.manifest();
    for id in ids {
        let Some(entry) = manifest.tiles.iter().find(|t| &t.id == id) else {
            continue;
        };
        let bytes = source.fetch_tile(id)?;

        let decoded_hash = hash_prefix(&bytes);
        if decoded_hash != entry.hash {
            return Err(LoaderError::Codec(CodecError::ManifestMismatch {
                decoded: decoded_hash,
                manifest: entry.hash.clone(),
            }));
        }

        let decoded = codec::decode(&bytes, max_size)?;
        let mesh = decoded.to_mesh();
        query
            .add_tile(id.clone(), mesh, decoded.titles)
            .expect("id was found in the manifest above");
    }
    Ok(())
}

/// Reads tiles and the manifest from a `tiles/{lang}/` directory tree on
/// disk. The natural target for the build side and for offline query tools.
pub struct FilesystemSource {
    root: std::path::PathBuf,
}

impl FilesystemSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TileSource for FilesystemSource {
    fn fetch_manifest(&self) -> Result<Option<TileIndex>, LoaderError> {
        let path = self.root.join("index.json");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let manifest: TileIndex = serde_json::from_slice(&bytes).map_err(LoaderError::ManifestInvalid)?;
        Ok(Some(manifest))
    }

    fn fetch_tile(&self, id: &str) -> Result<Vec<u8>, LoaderError> {
        let path = self.root.join(format!("{id}.bin"));
        Ok(std::fs::read(path)?)
    }
}

/// Pure in-memory test double: no filesystem, no network.
#[derive(Default)]
pub struct InMemorySource {
    manifest: Option<TileIndex>,
    tiles: std::collections::HashMap<String, Vec<u8>>,
}

impl InMemorySource {
    pub fn new(manifest: TileIndex, tiles: std::collections::HashMap<String, Vec<u8>>) -> Self {
        Self {
            manifest: Some(manifest),
            tiles,
        }
    }
}

impl TileSource for InMemorySource {
    fn fetch_manifest(&self) -> Result<Option<TileIndex>, LoaderError> {
        Ok(self.manifest.clone())
    }

    fn fetch_tile(&self, id: &str) -> Result<Vec<u8>, LoaderError> {
        self.tiles
            .get(id)
            .cloned()
            .ok_or_else(|| LoaderError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, id.to_string())))
    }
}
