//! Point location and nearest-neighbor walk over a [`SphericalDelaunay`].
//!
//! All three operations are local walks on the mesh graph: no global search
//! structure is needed once a starting triangle or vertex is known.

use smallvec::SmallVec;

use crate::delaunay::SphericalDelaunay;
use crate::math::{side_of_great_circle, spherical_distance, Point3D};

/// Walks from `start` (default: the incident triangle of vertex 0) toward
/// the triangle containing `query`, crossing an edge whenever `query` is
/// strictly to its right.
///
/// Bounded at `max(|triangles|, 100)` steps. Under the mesh's invariants this
/// bound is never hit; hitting it means the mesh is malformed, so this
/// panics rather than silently returning a wrong triangle (Open Question #3).
pub fn locate_triangle(mesh: &SphericalDelaunay, query: Point3D, start: Option<u32>) -> u32 {
    let bound = mesh.triangles.len().max(100);
    let mut current = start.unwrap_or_else(|| mesh.vertices[0].incident_triangle);

    for _ in 0..bound {
        let tri = &mesh.triangles[current as usize];
        let mut crossed = None;
        for e in 0..3 {
            let a = mesh.vertices[tri.vertices[e] as usize].position;
            let b = mesh.vertices[tri.vertices[(e + 1) % 3] as usize].position;
            if side_of_great_circle(a, b, query) < 0.0 {
                crossed = Some(tri.neighbors[e]);
                break;
            }
        }
        match crossed {
            Some(next) => current = next,
            None => return current,
        }
    }

    panic!("internal invariant: locate_triangle did not converge within {bound} steps");
}

/// Vertices of the triangle fan around `vertex`, found by rotating through
/// incident triangles starting at its recorded incident triangle.
fn fan_neighbors(mesh: &SphericalDelaunay, vertex: u32) -> SmallVec<[u32; 8]> {
    let start_tri = mesh.vertices[vertex as usize].incident_triangle;
    let mut neighbors = SmallVec::new();
    let mut current_tri = start_tri;

    loop {
        let tri = &mesh.triangles[current_tri as usize];
        let local = tri
            .vertices
            .iter()
            .position(|&v| v == vertex)
            .expect("incident triangle must contain its vertex");
        let next_vertex = tri.vertices[(local + 1) % 3];
        if !neighbors.contains(&next_vertex) {
            neighbors.push(next_vertex);
        }
        // Cross the edge opposite `next_vertex`'s predecessor, i.e. the edge
        // running from `vertex` to `next_vertex`, to reach the next face in
        // the fan.
        let edge_from_vertex = local;
        current_tri = tri.neighbors[edge_from_vertex];
        if current_tri == start_tri {
            break;
        }
    }

    neighbors
}

/// Greedy walk on the Delaunay vertex graph for the single nearest vertex to
/// `query`. Seeds from the closest vertex of the triangle [`locate_triangle`]
/// returns, then repeatedly moves to any strictly closer neighbor.
pub fn find_nearest(mesh: &SphericalDelaunay, query: Point3D, start: Option<u32>) -> u32 {
    let tri_idx = locate_triangle(mesh, query, start);
    let tri = &mesh.triangles[tri_idx as usize];

    let mut best = tri.vertices[0];
    let mut best_dist = spherical_distance(mesh.vertices[best as usize].position, query);
    for &v in &tri.vertices[1..] {
        let d = spherical_distance(mesh.vertices[v as usize].position, query);
        if d < best_dist {
            best = v;
            best_dist = d;
        }
    }

    loop {
        let mut improved = false;
        for n in fan_neighbors(mesh, best) {
            let d = spherical_distance(mesh.vertices[n as usize].position, query);
            if d < best_dist {
                best = n;
                best_dist = d;
                improved = true;
            }
        }
        if !improved {
            return best;
        }
    }
}

/// A candidate result: vertex index and its spherical distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub vertex: u32,
    pub distance: f64,
}

/// k-nearest neighbors by BFS over the Delaunay vertex graph, seeded from the
/// 1-NN walk. Expands until at least `max(2k, k+6)` candidates are
/// collected, then sorts and truncates. This is a documented heuristic
/// (Open Question #1 in the design notes), not a provably-optimal k-NN.
pub fn k_nearest(mesh: &SphericalDelaunay, query: Point3D, k: usize, start: Option<u32>) -> Vec<Neighbor> {
    if k == 0 || mesh.vertices.is_empty() {
        return Vec::new();
    }

    let seed = find_nearest(mesh, query, start);
    let target = (2 * k).max(k + 6);

    let mut visited = vec![false; mesh.vertices.len()];
    let mut queue = std::collections::VecDeque::new();
    let mut candidates = Vec::with_capacity(target.min(mesh.vertices.len()));

    visited[seed as usize] = true;
    queue.push_back(seed);
    candidates.push(Neighbor {
        vertex: seed,
        distance: spherical_distance(mesh.vertices[seed as usize].position, query),
    });

    while candidates.len() < target {
        let Some(current) = queue.pop_front() else {
            break;
        };
        for n in fan_neighbors(mesh, current) {
            if !visited[n as usize] {
                visited[n as usize] = true;
                candidates.push(Neighbor {
                    vertex: n,
                    distance: spherical_distance(mesh.vertices[n as usize].position, query),
                });
                queue.push_back(n);
            }
        }
    }

    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{delaunay, hull};
    use crate::math::{to_cartesian, LatLon};

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

    fn brute_force_nearest(mesh: &SphericalDelaunay, query: Point3D) -> u32 {
        (0..mesh.vertices.len())
            .min_by(|&a, &b| {
                let da = spherical_distance(mesh.vertices[a].position, query);
                let db = spherical_distance(mesh.vertices[b].position, query);
                da.total_cmp(&db)
            })
            .unwrap() as u32
    }

    #[test]
    fn octahedron_find_nearest_matches_axis() {
        let mesh = delaunay::extract(hull::build(octahedron()).unwrap()).unwrap();
        let query = Point3D::new(3.0, 0.1, 0.1).normalize();
        let nearest = find_nearest(&mesh, query, None);
        assert_relative_eq(mesh.vertices[nearest as usize].position, Point3D::new(1.0, 0.0, 0.0));
    }

    fn assert_relative_eq(a: Point3D, b: Point3D) {
        approx::assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        approx::assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        approx::assert_relative_eq!(a.z, b.z, epsilon = 1e-9);
    }

    #[test]
    fn find_nearest_matches_brute_force_on_random_queries() {
        let mesh = delaunay::extract(hull::build(icosahedron()).unwrap()).unwrap();
        let mut lcg: u64 = 12345;
        for _ in 0..100 {
            lcg = lcg.wrapping_mul(6364136223846793005).wrapping_add(1);
            let lat = ((lcg >> 33) as f64 / u32::MAX as f64) * 180.0 - 90.0;
            lcg = lcg.wrapping_mul(6364136223846793005).wrapping_add(1);
            let lon = ((lcg >> 33) as f64 / u32::MAX as f64) * 360.0 - 180.0;
            let query = to_cartesian(LatLon::new(lat, lon));

            let walked = find_nearest(&mesh, query, None);
            let brute = brute_force_nearest(&mesh, query);
            assert_eq!(walked, brute, "mismatch at lat={lat} lon={lon}");
        }
    }

    #[test]
    fn k_nearest_returns_sorted_unique_vertices() {
        let mesh = delaunay::extract(hull::build(icosahedron()).unwrap()).unwrap();
        let query = to_cartesian(LatLon::new(10.0, 10.0));
        let result = k_nearest(&mesh, query, 5, None);
        assert_eq!(result.len(), 5);
        for pair in result.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        let unique: std::collections::HashSet<u32> = result.iter().map(|n| n.vertex).collect();
        assert_eq!(unique.len(), result.len());
    }

    #[test]
    fn located_triangle_has_query_on_correct_side_of_all_edges() {
        let mesh = delaunay::extract(hull::build(icosahedron()).unwrap()).unwrap();
        let query = to_cartesian(LatLon::new(-20.0, 50.0));
        let tri_idx = locate_triangle(&mesh, query, None);
        let tri = &mesh.triangles[tri_idx as usize];
        for e in 0..3 {
            let a = mesh.vertices[tri.vertices[e] as usize].position;
            let b = mesh.vertices[tri.vertices[(e + 1) % 3] as usize].position;
            assert!(side_of_great_circle(a, b, query) >= -1e-10);
        }
    }
}
