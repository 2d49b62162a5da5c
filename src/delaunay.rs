//! Extraction of a navigable Delaunay mesh from hull faces.
//!
//! The hull's faces *are* the spherical Delaunay triangles; this module just
//! reshapes them: computing circumcenters, remapping vertex indices to the
//! compact "on-hull" space, and building the vertex-to-incident-triangle
//! table the walk needs.

use crate::error::HullError;
use crate::hull::ConvexHull;
use crate::math::{spherical_circumcenter, spherical_distance, Point3D};

/// A Delaunay triangle: same shape as a hull face, plus its circumcenter and
/// circumradius (used by construction-time assertions; the serialized form
/// omits both).
#[derive(Debug, Clone, Copy)]
pub struct DelaunayTriangle {
    pub vertices: [u32; 3],
    pub neighbors: [u32; 3],
    pub circumcenter: Point3D,
    pub circumradius: f64,
}

/// A vertex on the mesh: its position, and one incident triangle to use as a
/// walk entry point.
#[derive(Debug, Clone, Copy)]
pub struct DelaunayVertex {
    pub position: Point3D,
    pub incident_triangle: u32,
}

/// The extracted mesh: vertices, triangles, and the map from compact vertex
/// index back to the caller's original point index.
pub struct SphericalDelaunay {
    pub vertices: Vec<DelaunayVertex>,
    pub triangles: Vec<DelaunayTriangle>,
    pub original_indices: Vec<u32>,
}

/// Extracts a [`SphericalDelaunay`] from a built hull. Points not referenced
/// by any face (impossible under perturbation, tolerated defensively) are
/// dropped and the remaining vertices compacted.
pub fn extract(hull: ConvexHull) -> Result<SphericalDelaunay, HullError> {
    let n = hull.points.len();
    let mut incident = vec![u32::MAX; n];
    for (face_idx, face) in hull.faces.iter().enumerate() {
        for &v in face.vertices.iter() {
            let slot = &mut incident[v as usize];
            if *slot == u32::MAX {
                *slot = face_idx as u32;
            }
        }
    }

    // Remap: keep only points with at least one incident face.
    let mut remap = vec![u32::MAX; n];
    let mut original_indices = Vec::with_capacity(n);
    let mut vertices = Vec::with_capacity(n);
    for (old_idx, &inc) in incident.iter().enumerate() {
        if inc == u32::MAX {
            continue;
        }
        let new_idx = vertices.len() as u32;
        remap[old_idx] = new_idx;
        original_indices.push(old_idx as u32);
        vertices.push(DelaunayVertex {
            position: hull.points[old_idx],
            // `inc` already indexes `triangles`: unlike vertex indices,
            // triangle indices are never remapped (built 1:1 with hull.faces).
            incident_triangle: inc,
        });
    }

    let mut triangles = Vec::with_capacity(hull.faces.len());
    for face in &hull.faces {
        let a = hull.points[face.vertices[0] as usize];
        let b = hull.points[face.vertices[1] as usize];
        let c = hull.points[face.vertices[2] as usize];
        let circumcenter = spherical_circumcenter(a, b, c);
        let circumradius = spherical_distance(circumcenter, a);

        for &v in [a, b, c].iter() {
            let r = spherical_distance(circumcenter, v);
            debug_assert!(
                (r - circumradius).abs() < 1e-10,
                "internal invariant: circumradius disagreement"
            );
        }

        triangles.push(DelaunayTriangle {
            vertices: [
                remap[face.vertices[0] as usize],
                remap[face.vertices[1] as usize],
                remap[face.vertices[2] as usize],
            ],
            neighbors: face.neighbors,
            circumcenter,
            circumradius,
        });
    }

    if vertices.is_empty() {
        return Err(HullError::InternalInvariant(
            "no vertex survived extraction from a non-empty hull",
        ));
    }

    Ok(SphericalDelaunay {
        vertices,
        triangles,
        original_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hull;
    use approx::assert_relative_eq;

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
        raw.iter()
            .map(|&(x, y, z)| Point3D::new(x, y, z).normalize())
            .collect()
    }

    #[test]
    fn icosahedron_circumradii_equal() {
        let hull = hull::build(icosahedron()).unwrap();
        let mesh = extract(hull).unwrap();
        let r0 = mesh.triangles[0].circumradius;
        for tri in &mesh.triangles {
            assert_relative_eq!(tri.circumradius, r0, epsilon = 1e-10);
        }
    }

    #[test]
    fn euler_formula_holds() {
        let hull = hull::build(icosahedron()).unwrap();
        let mesh = extract(hull).unwrap();
        assert_eq!(mesh.triangles.len(), 2 * mesh.vertices.len() - 4);
    }

    #[test]
    fn every_vertex_incident_triangle_contains_it() {
        let hull = hull::build(icosahedron()).unwrap();
        let mesh = extract(hull).unwrap();
        for (idx, vertex) in mesh.vertices.iter().enumerate() {
            let tri = &mesh.triangles[vertex.incident_triangle as usize];
            assert!(tri.vertices.contains(&(idx as u32)));
        }
    }

    #[test]
    fn original_indices_preserve_all_points_on_unit_sphere() {
        let points = icosahedron();
        let hull = hull::build(points.clone()).unwrap();
        let mesh = extract(hull).unwrap();
        assert_eq!(mesh.original_indices.len(), points.len());
    }
}
