//! Binary serialization format for a [`SphericalDelaunay`] plus article
//! titles. Little-endian throughout.

use crate::delaunay::{DelaunayTriangle, DelaunayVertex, SphericalDelaunay};
use crate::error::CodecError;
use crate::math::Point3D;

const HEADER_BYTES: usize = 16;

/// Encodes a mesh plus per-vertex titles into the tile binary format.
///
/// `titles[i]` must correspond to `mesh.vertices[i]`; this is the caller's
/// responsibility (the tiler is the only caller and maintains the
/// correspondence by construction).
pub fn encode(mesh: &SphericalDelaunay, titles: &[String]) -> Vec<u8> {
    assert_eq!(titles.len(), mesh.vertices.len());

    let v = mesh.vertices.len() as u32;
    let t = mesh.triangles.len() as u32;

    let fixed_body_len =
        12 * mesh.vertices.len() + 4 * mesh.vertices.len() + 24 * mesh.triangles.len();
    let articles_offset = HEADER_BYTES + fixed_body_len;

    let title_bytes: Vec<&[u8]> = titles.iter().map(|t| t.as_bytes()).collect();
    let articles_length = 4 * titles.len() + title_bytes.iter().map(|b| b.len()).sum::<usize>();

    let mut out = Vec::with_capacity(articles_offset + articles_length);
    out.extend_from_slice(&v.to_le_bytes());
    out.extend_from_slice(&t.to_le_bytes());
    out.extend_from_slice(&(articles_offset as u32).to_le_bytes());
    out.extend_from_slice(&(articles_length as u32).to_le_bytes());

    for vertex in &mesh.vertices {
        out.extend_from_slice(&(vertex.position.x as f32).to_le_bytes());
        out.extend_from_slice(&(vertex.position.y as f32).to_le_bytes());
        out.extend_from_slice(&(vertex.position.z as f32).to_le_bytes());
    }
    for vertex in &mesh.vertices {
        out.extend_from_slice(&vertex.incident_triangle.to_le_bytes());
    }
    for tri in &mesh.triangles {
        for &idx in &tri.vertices {
            out.extend_from_slice(&idx.to_le_bytes());
        }
    }
    for tri in &mesh.triangles {
        for &idx in &tri.neighbors {
            out.extend_from_slice(&idx.to_le_bytes());
        }
    }

    for bytes in &title_bytes {
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    }
    for bytes in &title_bytes {
        out.extend_from_slice(bytes);
    }

    out
}

/// A decoded tile: the mesh (without circumcenters, which the wire format
/// omits) plus titles, one per vertex.
pub struct DecodedTile {
    pub vertices: Vec<Point3D>,
    pub vertex_triangles: Vec<u32>,
    pub triangle_vertices: Vec<[u32; 3]>,
    pub triangle_neighbors: Vec<[u32; 3]>,
    pub titles: Vec<String>,
}

impl DecodedTile {
    /// Reassembles a [`SphericalDelaunay`]-shaped view for the walk module.
    /// Circumcenters are recomputed lazily by callers that need them; the
    /// wire format never stores them.
    pub fn to_mesh(&self) -> SphericalDelaunay {
        let vertices = self
            .vertices
            .iter()
            .zip(&self.vertex_triangles)
            .map(|(&position, &incident_triangle)| DelaunayVertex {
                position,
                incident_triangle,
            })
            .collect();

        let triangles = self
            .triangle_vertices
            .iter()
            .zip(&self.triangle_neighbors)
            .map(|(&vertices, &neighbors)| {
                let a = self.vertices[vertices[0] as usize];
                let b = self.vertices[vertices[1] as usize];
                let c = self.vertices[vertices[2] as usize];
                let circumcenter = crate::math::spherical_circumcenter(a, b, c);
                let circumradius = crate::math::spherical_distance(circumcenter, a);
                DelaunayTriangle {
                    vertices,
                    neighbors,
                    circumcenter,
                    circumradius,
                }
            })
            .collect();

        SphericalDelaunay {
            vertices,
            triangles,
            original_indices: (0..self.vertices.len() as u32).collect(),
        }
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
}

/// Decodes a tile binary buffer, validating all bounds before touching any
/// byte. `max_size` rejects oversized buffers before any parsing is attempted.
pub fn decode(buf: &[u8], max_size: usize) -> Result<DecodedTile, CodecError> {
    if buf.len() > max_size {
        return Err(CodecError::SizeLimitExceeded {
            len: buf.len(),
            limit: max_size,
        });
    }
    if buf.len() < HEADER_BYTES {
        return Err(CodecError::HeaderTooSmall(buf.len()));
    }

    let v = read_u32(buf, 0) as usize;
    let t = read_u32(buf, 4) as usize;
    let articles_offset = read_u32(buf, 8) as usize;
    let articles_length = read_u32(buf, 12) as usize;

    let fixed_body_len = 12 * v + 4 * v + 24 * t;
    let min_offset = HEADER_BYTES + fixed_body_len;
    if articles_offset < min_offset {
        return Err(CodecError::ArticlesSectionOverlapsBody {
            offset: articles_offset,
            min_offset,
        });
    }
    if articles_offset
        .checked_add(articles_length)
        .map_or(true, |end| end > buf.len())
    {
        return Err(CodecError::ArticlesSectionOutOfBounds {
            offset: articles_offset,
            length: articles_length,
            file_len: buf.len(),
        });
    }

    let mut cursor = HEADER_BYTES;
    let mut vertices = Vec::with_capacity(v);
    for _ in 0..v {
        let x = read_f32(buf, cursor) as f64;
        let y = read_f32(buf, cursor + 4) as f64;
        let z = read_f32(buf, cursor + 8) as f64;
        vertices.push(Point3D::new(x, y, z));
        cursor += 12;
    }

    let mut vertex_triangles = Vec::with_capacity(v);
    for _ in 0..v {
        vertex_triangles.push(read_u32(buf, cursor));
        cursor += 4;
    }

    let mut triangle_vertices = Vec::with_capacity(t);
    for _ in 0..t {
        triangle_vertices.push([
            read_u32(buf, cursor),
            read_u32(buf, cursor + 4),
            read_u32(buf, cursor + 8),
        ]);
        cursor += 12;
    }

    let mut triangle_neighbors = Vec::with_capacity(t);
    for _ in 0..t {
        triangle_neighbors.push([
            read_u32(buf, cursor),
            read_u32(buf, cursor + 4),
            read_u32(buf, cursor + 8),
        ]);
        cursor += 12;
    }

    let articles = &buf[articles_offset..articles_offset + articles_length];
    let mut title_lengths = Vec::with_capacity(v);
    let mut acursor = 0;
    for _ in 0..v {
        if acursor + 4 > articles.len() {
            return Err(CodecError::ArticlesSectionOutOfBounds {
                offset: articles_offset,
                length: articles_length,
                file_len: buf.len(),
            });
        }
        title_lengths.push(read_u32(articles, acursor) as usize);
        acursor += 4;
    }

    let expected_total: usize = title_lengths.iter().sum();
    if articles.len() - acursor != expected_total {
        return Err(CodecError::TitleLengthMismatch {
            expected: expected_total,
            actual: articles.len() - acursor,
        });
    }

    let mut titles = Vec::with_capacity(v);
    for &len in &title_lengths {
        let bytes = &articles[acursor..acursor + len];
        titles.push(std::str::from_utf8(bytes)?.to_owned());
        acursor += len;
    }

    Ok(DecodedTile {
        vertices,
        vertex_triangles,
        triangle_vertices,
        triangle_neighbors,
        titles,
    })
}

/// Non-normative JSON debug form, truncating float coordinates to 8 decimal
/// places. Identical semantics to the binary form, used only for inspection.
pub fn to_debug_json(tile: &DecodedTile) -> serde_json::Value {
    use serde_json::json;

    let vertices: Vec<_> = tile
        .vertices
        .iter()
        .map(|p| {
            json!([
                (p.x * 1e8).round() / 1e8,
                (p.y * 1e8).round() / 1e8,
                (p.z * 1e8).round() / 1e8,
            ])
        })
        .collect();

    json!({
        "vertices": vertices,
        "vertexTriangles": tile.vertex_triangles,
        "triangleVertices": tile.triangle_vertices,
        "triangleNeighbors": tile.triangle_neighbors,
        "titles": tile.titles,
    })
}
