//! Incremental 3D convex hull builder over unit-sphere points.
//!
//! The faces of the hull of a set of points perturbed onto the unit sphere
//! are exactly the spherical Delaunay triangulation of the original points
//! (`delaunay` wraps this output accordingly). This is the hardest component
//! in the crate.

use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;
use tracing::warn;

use crate::error::HullError;
use crate::math::Point3D;
use crate::orient::orient3d;

/// Sentinel for "no face" in a neighbor/grid slot.
const NONE_FACE: u32 = u32::MAX;

/// A face of the hull: three vertex indices wound counter-clockwise as seen
/// from outside, and three neighbor face indices such that `neighbors[i]`
/// shares the directed edge `vertices[i] -> vertices[(i+1)%3]`.
#[derive(Debug, Clone, Copy)]
pub struct HullFace {
    pub vertices: [u32; 3],
    pub neighbors: [u32; 3],
}

impl HullFace {
    fn edge(&self, i: usize) -> (u32, u32) {
        (self.vertices[i], self.vertices[(i + 1) % 3])
    }
}

/// The original points plus the face list, as produced by [`build`].
pub struct ConvexHull {
    pub points: Vec<Point3D>,
    pub faces: Vec<HullFace>,
}

/// Deterministic LCG used to perturb input points off degenerate
/// configurations. Seeded with a fixed constant so builds stay reproducible.
struct Lcg(u64);

impl Lcg {
    fn new() -> Self {
        Self(0x9E3779B9)
    }

    /// Next value in `[-1, 1)`.
    fn next_signed(&mut self) -> f64 {
        // Numerical Recipes LCG constants, 64-bit state, top bits taken for quality.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let bits = (self.0 >> 11) as f64 / (1u64 << 53) as f64;
        bits * 2.0 - 1.0
    }
}

/// Perturbs each coordinate by a deterministic pseudo-random offset of
/// magnitude `<= 1e-6`, then re-normalizes onto the unit sphere. The output
/// is used only for `orient3d` visibility tests; the hull stores the
/// original unperturbed points.
fn perturb(points: &[Point3D]) -> Vec<Point3D> {
    const MAGNITUDE: f64 = 1e-6;
    let mut rng = Lcg::new();

    points
        .iter()
        .map(|p| {
            let offset = Point3D::new(
                rng.next_signed() * MAGNITUDE,
                rng.next_signed() * MAGNITUDE,
                rng.next_signed() * MAGNITUDE,
            );
            (p + offset).normalize()
        })
        .collect()
}

fn ceil_sqrt(n: usize) -> usize {
    (n as f64).sqrt().ceil() as usize
}

fn ceil_cbrt(n: usize) -> usize {
    (n as f64).cbrt().ceil() as usize
}

fn encode_edge(a: u32, b: u32) -> u64 {
    ((a as u64) << 32) | (b as u64)
}

/// Cubic grid in `[-1, 1]^3`. Each cell stores the last face index whose
/// centroid fell in it; this is a hint, not a membership index.
struct SpatialGrid {
    side: usize,
    cells: Vec<u32>,
}

impl SpatialGrid {
    fn new(n: usize) -> Self {
        let side = ceil_cbrt(n).clamp(8, 128);
        Self {
            side,
            cells: vec![NONE_FACE; side * side * side],
        }
    }

    fn cell_index(&self, p: Point3D) -> usize {
        let coord = |v: f64| -> usize {
            let t = ((v + 1.0) / 2.0).clamp(0.0, 0.999_999_999);
            (t * self.side as f64) as usize
        };
        coord(p.x) + coord(p.y) * self.side + coord(p.z) * self.side * self.side
    }

    fn set(&mut self, p: Point3D, face: u32) {
        let idx = self.cell_index(p);
        self.cells[idx] = face;
    }

    fn get(&self, p: Point3D) -> Option<u32> {
        let idx = self.cell_index(p);
        let f = self.cells[idx];
        (f != NONE_FACE).then_some(f)
    }
}

/// Checks whether unperturbed input is degenerate: fewer than 4 points, or
/// all points coincident/collinear/coplanar.
fn check_degenerate(points: &[Point3D]) -> Result<(), HullError> {
    if points.len() < 4 {
        return Err(HullError::DegenerateInput("fewer than 4 points"));
    }

    const EPS: f64 = 1e-12;

    let p0 = points[0];
    if points.iter().all(|p| (p - p0).norm() < EPS) {
        return Err(HullError::DegenerateInput("all points coincident"));
    }

    // Find a point distinct from p0 to establish a direction.
    let Some(p1) = points.iter().copied().find(|p| (p - p0).norm() >= EPS) else {
        return Err(HullError::DegenerateInput("all points coincident"));
    };
    let dir = (p1 - p0).normalize();

    let collinear = points.iter().all(|p| {
        let v = p - p0;
        if v.norm() < EPS {
            return true;
        }
        v.normalize().cross(&dir).norm() < 1e-9
    });
    if collinear {
        return Err(HullError::DegenerateInput("all points collinear"));
    }

    // Find a third point not on the p0-p1 line to define a plane.
    let p2 = points.iter().copied().find(|p| {
        let v = p - p0;
        v.norm() >= EPS && v.normalize().cross(&dir).norm() >= 1e-9
    });
    if let Some(p2) = p2 {
        let coplanar = points
            .iter()
            .all(|p| orient3d(p0, p1, p2, *p).abs() < 1e-9);
        if coplanar {
            return Err(HullError::DegenerateInput("all points coplanar"));
        }
    }

    Ok(())
}

/// Picks four points in general position for the seed tetrahedron, using the
/// perturbed coordinates (construction math always tests visibility on the
/// perturbed copy).
fn seed_tetrahedron(perturbed: &[Point3D]) -> [u32; 4] {
    const EPS: f64 = 1e-9;
    let n = perturbed.len();

    let i0 = 0usize;
    let i1 = (1..n)
        .find(|&i| (perturbed[i] - perturbed[i0]).norm() >= EPS)
        .expect("checked non-coincident above");
    let dir = (perturbed[i1] - perturbed[i0]).normalize();
    let i2 = (0..n)
        .find(|&i| {
            let v = perturbed[i] - perturbed[i0];
            v.norm() >= EPS && v.normalize().cross(&dir).norm() >= EPS
        })
        .expect("checked non-collinear above");
    let i3 = (0..n)
        .find(|&i| orient3d(perturbed[i0], perturbed[i1], perturbed[i2], perturbed[i]).abs() >= EPS)
        .expect("checked non-coplanar above");

    [i0 as u32, i1 as u32, i2 as u32, i3 as u32]
}

/// The incremental hull builder. Holds all mutable construction state; the
/// RNG and edge map live here rather than as process-wide globals.
struct Builder<'a> {
    perturbed: &'a [Point3D],
    faces: Vec<Option<HullFace>>,
    edges: HashMap<u64, (u32, u8)>,
    grid: SpatialGrid,
    hint: Option<u32>,
}

impl<'a> Builder<'a> {
    fn centroid(&self, face: &HullFace) -> Point3D {
        (self.perturbed[face.vertices[0] as usize]
            + self.perturbed[face.vertices[1] as usize]
            + self.perturbed[face.vertices[2] as usize])
            / 3.0
    }

    fn live_face_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_some()).count()
    }

    fn register_face(&mut self, face: HullFace) -> u32 {
        let idx = self.faces.len() as u32;
        for e in 0..3 {
            let (a, b) = face.edge(e);
            self.edges.insert(encode_edge(a, b), (idx, e as u8));
        }
        let centroid = self.centroid(&face);
        self.faces.push(Some(face));
        self.grid.set(centroid, idx);
        idx
    }

    fn unregister_face(&mut self, idx: u32) {
        let face = self.faces[idx as usize].take().expect("face already removed");
        for e in 0..3 {
            let (a, b) = face.edge(e);
            self.edges.remove(&encode_edge(a, b));
        }
    }

    fn face(&self, idx: u32) -> &HullFace {
        self.faces[idx as usize].as_ref().expect("dead face referenced")
    }

    fn twin(&self, a: u32, b: u32) -> Option<(u32, u8)> {
        self.edges.get(&encode_edge(b, a)).copied()
    }

    /// Greedy walk from `start`, returning `Ok` with the first face visible
    /// from `p` (`orient3d > 0`), or `Err` with the last face reached once
    /// the step bound is exhausted — the walk endpoint, for the next
    /// fallback stage to resume from.
    fn greedy_walk(&self, start: u32, p: Point3D) -> Result<u32, u32> {
        let bound = 6 * ceil_sqrt(self.live_face_count().max(1));
        let mut current = start;
        let mut history: SmallVec<[u32; 2]> = SmallVec::new();

        for _ in 0..bound {
            let face = self.face(current);
            if orient3d(
                self.perturbed[face.vertices[0] as usize],
                self.perturbed[face.vertices[1] as usize],
                self.perturbed[face.vertices[2] as usize],
                p,
            ) > 0.0
            {
                return Ok(current);
            }

            let mut best: Option<(u32, f64)> = None;
            for &n in face.neighbors.iter() {
                if history.contains(&n) {
                    continue;
                }
                let score = self.centroid(self.face(n)).dot(&p);
                if best.map_or(true, |(_, b)| score > b) {
                    best = Some((n, score));
                }
            }

            let Some((next, _)) = best.or_else(|| {
                face.neighbors
                    .iter()
                    .map(|&n| (n, self.centroid(self.face(n)).dot(&p)))
                    .fold(None, |acc: Option<(u32, f64)>, (n, s)| match acc {
                        Some((_, bs)) if bs >= s => acc,
                        _ => Some((n, s)),
                    })
            }) else {
                return Err(current);
            };

            history.push(current);
            if history.len() > 2 {
                history.remove(0);
            }
            current = next;
        }

        Err(current)
    }

    /// BFS from `start` up to `limit` faces, returning the first visible one.
    fn bfs_for_visible(&self, start: u32, p: Point3D, limit: usize) -> Option<u32> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited.insert(start);

        while let Some(idx) = queue.pop_front() {
            if visited.len() > limit {
                break;
            }
            let face = self.face(idx);
            if orient3d(
                self.perturbed[face.vertices[0] as usize],
                self.perturbed[face.vertices[1] as usize],
                self.perturbed[face.vertices[2] as usize],
                p,
            ) > 0.0
            {
                return Some(idx);
            }
            for &n in face.neighbors.iter() {
                if visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }

        None
    }

    fn linear_scan_for_visible(&self, p: Point3D) -> Option<u32> {
        self.faces.iter().enumerate().find_map(|(idx, slot)| {
            let face = slot.as_ref()?;
            let visible = orient3d(
                self.perturbed[face.vertices[0] as usize],
                self.perturbed[face.vertices[1] as usize],
                self.perturbed[face.vertices[2] as usize],
                p,
            ) > 0.0;
            visible.then_some(idx as u32)
        })
    }

    /// Finds any face visible from `p`, via a four-stage fallback: hint
    /// walk, grid walk, BFS from the last walk's endpoint, then linear scan.
    fn find_seed(&mut self, p: Point3D) -> Option<u32> {
        let mut walk_endpoint = None;

        if let Some(hint) = self.hint {
            if self.faces[hint as usize].is_some() {
                match self.greedy_walk(hint, p) {
                    Ok(seed) => return Some(seed),
                    Err(last) => walk_endpoint = Some(last),
                }
            }
        }

        if let Some(grid_hint) = self.grid.get(p) {
            if self.faces[grid_hint as usize].is_some() {
                match self.greedy_walk(grid_hint, p) {
                    Ok(seed) => return Some(seed),
                    Err(last) => walk_endpoint = Some(last),
                }
            }
        }

        let bfs_start =
            walk_endpoint.or_else(|| self.faces.iter().position(|f| f.is_some()).map(|i| i as u32))?;
        let limit = (4 * ceil_sqrt(self.live_face_count().max(1))).max(500);
        if let Some(seed) = self.bfs_for_visible(bfs_start, p, limit) {
            return Some(seed);
        }

        self.linear_scan_for_visible(p)
    }

    /// BFS over face adjacency from `seed`, collecting every face visible
    /// from `p`. Visible faces form a connected region.
    fn find_horizon_region(&self, seed: u32, p: Point3D) -> HashSet<u32> {
        let mut visible = HashSet::new();
        let mut queue = VecDeque::new();
        visible.insert(seed);
        queue.push_back(seed);

        while let Some(idx) = queue.pop_front() {
            let face = self.face(idx);
            for &n in face.neighbors.iter() {
                if visible.contains(&n) {
                    continue;
                }
                let nf = self.face(n);
                let is_visible = orient3d(
                    self.perturbed[nf.vertices[0] as usize],
                    self.perturbed[nf.vertices[1] as usize],
                    self.perturbed[nf.vertices[2] as usize],
                    p,
                ) > 0.0;
                if is_visible {
                    visible.insert(n);
                    queue.push_back(n);
                }
            }
        }

        visible
    }

    fn insert_point(&mut self, point_index: u32, p: Point3D) {
        let Some(seed) = self.find_seed(p) else {
            warn!(point_index, "point has no visible face; treating as interior");
            return;
        };

        let visible = self.find_horizon_region(seed, p);

        let mut horizon: Vec<(u32, u32, u32)> = Vec::new(); // (a, b, f_star)
        for &idx in &visible {
            let face = self.face(idx);
            for e in 0..3 {
                let n = face.neighbors[e];
                if !visible.contains(&n) {
                    let (a, b) = face.edge(e);
                    horizon.push((a, b, n));
                }
            }
        }

        for &idx in &visible {
            self.unregister_face(idx);
        }

        let mut new_faces = Vec::with_capacity(horizon.len());
        for (a, b, f_star) in horizon {
            let (star_edge_face, star_edge_pos) = self
                .twin(a, b)
                .expect("horizon edge must still have its non-visible twin registered");
            debug_assert_eq!(star_edge_face, f_star, "internal invariant: twin face mismatch");

            let new_face = HullFace {
                vertices: [a, b, point_index],
                neighbors: [f_star, NONE_FACE, NONE_FACE],
            };
            let new_idx = self.register_face(new_face);

            if let Some(slot) = self.faces[f_star as usize].as_mut() {
                slot.neighbors[star_edge_pos as usize] = new_idx;
            }

            new_faces.push(new_idx);
        }

        for &idx in &new_faces {
            let face = *self.face(idx);
            let mut neighbors = face.neighbors;
            for e in 1..3 {
                let (a, b) = face.edge(e);
                if let Some((twin_face, twin_pos)) = self.twin(a, b) {
                    neighbors[e] = twin_face;
                    if let Some(slot) = self.faces[twin_face as usize].as_mut() {
                        slot.neighbors[twin_pos as usize] = idx;
                    }
                }
            }
            self.faces[idx as usize].as_mut().unwrap().neighbors = neighbors;
        }

        if let Some(&last) = new_faces.last() {
            self.hint = Some(last);
        }
    }

    /// Removes tombstoned slots and remaps neighbor indices.
    fn compact(self) -> Vec<HullFace> {
        let mut remap = vec![NONE_FACE; self.faces.len()];
        let mut live: Vec<HullFace> = Vec::with_capacity(self.faces.len());
        for (old, slot) in self.faces.iter().enumerate() {
            if slot.is_some() {
                remap[old] = live.len() as u32;
                live.push(slot.unwrap());
            }
        }
        for face in live.iter_mut() {
            for n in face.neighbors.iter_mut() {
                *n = remap[*n as usize];
            }
        }
        live
    }
}

/// Builds the 3D convex hull of `points`, which must lie on (or near) the
/// unit sphere. Fails with [`HullError::DegenerateInput`] if the unperturbed
/// input is too small, coincident, collinear, or coplanar.
pub fn build(points: Vec<Point3D>) -> Result<ConvexHull, HullError> {
    check_degenerate(&points)?;
    let perturbed = perturb(&points);

    let seed = seed_tetrahedron(&perturbed);
    let mut builder = Builder {
        perturbed: &perturbed,
        faces: Vec::new(),
        edges: HashMap::new(),
        grid: SpatialGrid::new(points.len()),
        hint: None,
    };

    // Four initial faces, each opposite one seed vertex, oriented outward.
    let tetra_faces = [
        [seed[1], seed[2], seed[3]],
        [seed[0], seed[3], seed[2]],
        [seed[0], seed[1], seed[3]],
        [seed[0], seed[2], seed[1]],
    ];
    let opposite = [seed[0], seed[1], seed[2], seed[3]];

    let mut initial_indices = Vec::with_capacity(4);
    for (face_verts, &opp) in tetra_faces.iter().zip(opposite.iter()) {
        let mut verts = *face_verts;
        let a = perturbed[verts[0] as usize];
        let b = perturbed[verts[1] as usize];
        let c = perturbed[verts[2] as usize];
        let o = perturbed[opp as usize];
        // Flip winding if the outward-from-opposite-vertex check fails.
        if orient3d(a, b, c, o) >= 0.0 {
            verts.swap(1, 2);
        }
        initial_indices.push(verts);
    }
    for verts in initial_indices {
        builder.register_face(HullFace {
            vertices: verts,
            neighbors: [NONE_FACE; 3],
        });
    }
    // Link the four initial faces to each other via shared-edge twins.
    for idx in 0..4u32 {
        let face = *builder.face(idx);
        let mut neighbors = face.neighbors;
        for e in 0..3 {
            let (a, b) = face.edge(e);
            if let Some((twin_face, twin_pos)) = builder.twin(a, b) {
                neighbors[e] = twin_face;
                if let Some(slot) = builder.faces[twin_face as usize].as_mut() {
                    slot.neighbors[twin_pos as usize] = idx;
                }
            }
        }
        builder.faces[idx as usize].as_mut().unwrap().neighbors = neighbors;
    }
    builder.hint = Some(0);

    let seed_set: HashSet<u32> = seed.iter().copied().collect();
    for (i, &p) in perturbed.iter().enumerate() {
        if seed_set.contains(&(i as u32)) {
            continue;
        }
        builder.insert_point(i as u32, p);
    }

    let faces = builder.compact();

    Ok(ConvexHull { points, faces })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{to_cartesian, LatLon};
    use approx::assert_relative_eq;

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
        raw.iter()
            .map(|&(x, y, z)| Point3D::new(x, y, z).normalize())
            .collect()
    }

    fn assert_adjacency_symmetric(hull: &ConvexHull) {
        for (idx, face) in hull.faces.iter().enumerate() {
            for e in 0..3 {
                let n = face.neighbors[e] as usize;
                let neighbor = &hull.faces[n];
                let (a, b) = face.edge(e);
                let shares_reversed = (0..3).any(|ne| {
                    let (na, nb) = neighbor.edge(ne);
                    na == b && nb == a && neighbor.neighbors[ne] as usize == idx
                });
                assert!(shares_reversed, "adjacency not symmetric at face {idx} edge {e}");
            }
        }
    }

    #[test]
    fn octahedron_has_eight_faces() {
        let hull = build(octahedron()).unwrap();
        assert_eq!(hull.faces.len(), 8);
        assert_adjacency_symmetric(&hull);
    }

    #[test]
    fn icosahedron_euler_formula() {
        let hull = build(icosahedron()).unwrap();
        assert_eq!(hull.faces.len(), 20); // F = 2V - 4 = 2*12 - 4
        assert_adjacency_symmetric(&hull);
    }

    #[test]
    fn every_face_has_distinct_vertices() {
        let hull = build(icosahedron()).unwrap();
        for face in &hull.faces {
            assert_ne!(face.vertices[0], face.vertices[1]);
            assert_ne!(face.vertices[1], face.vertices[2]);
            assert_ne!(face.vertices[0], face.vertices[2]);
        }
    }

    #[test]
    fn outward_orientation_holds() {
        let hull = build(icosahedron()).unwrap();
        let origin = Point3D::new(0.0, 0.0, 0.0);
        for face in &hull.faces {
            let a = hull.points[face.vertices[0] as usize];
            let b = hull.points[face.vertices[1] as usize];
            let c = hull.points[face.vertices[2] as usize];
            assert!(orient3d(a, b, c, origin) < 0.0);
        }
    }

    #[test]
    fn convexity_all_points_non_visible() {
        let hull = build(icosahedron()).unwrap();
        for face in &hull.faces {
            let a = hull.points[face.vertices[0] as usize];
            let b = hull.points[face.vertices[1] as usize];
            let c = hull.points[face.vertices[2] as usize];
            for &p in &hull.points {
                assert!(orient3d(a, b, c, p) <= 1e-8);
            }
        }
    }

    #[test]
    fn rejects_coincident_points() {
        let pts = vec![Point3D::new(1.0, 0.0, 0.0); 5];
        assert!(matches!(build(pts), Err(HullError::DegenerateInput(_))));
    }

    #[test]
    fn rejects_too_few_points() {
        let pts = vec![
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.0, 1.0, 0.0),
            Point3D::new(0.0, 0.0, 1.0),
        ];
        assert!(matches!(build(pts), Err(HullError::DegenerateInput(_))));
    }

    #[test]
    fn rejects_collinear_points() {
        let pts = vec![
            Point3D::new(1.0, 0.0, 0.0),
            Point3D::new(0.5, 0.0, 0.0),
            Point3D::new(0.25, 0.0, 0.0),
            Point3D::new(0.0, 0.0, 0.0),
        ];
        assert!(matches!(build(pts), Err(HullError::DegenerateInput(_))));
    }

    #[test]
    fn world_cities_ten_points_sixteen_faces() {
        let cities = [
            (48.8566, 2.3522),    // Paris
            (40.7128, -74.0060),  // NYC
            (-33.8688, 151.2093), // Sydney
            (35.6762, 139.6503),  // Tokyo
            (-22.9068, -43.1729), // Rio
            (55.7558, 37.6173),   // Moscow
            (-1.2921, 36.8219),   // Nairobi
            (51.5074, -0.1278),   // London
            (-34.6037, -58.3816), // Buenos Aires
            (1.3521, 103.8198),   // Singapore
        ];
        let points: Vec<Point3D> = cities
            .iter()
            .map(|&(lat, lon)| to_cartesian(LatLon::new(lat, lon)))
            .collect();
        let hull = build(points).unwrap();
        assert_eq!(hull.faces.len(), 16);
    }

    #[test]
    fn circumcenters_still_unit_sphere_tangent() {
        // sanity: perturbation keeps points close to the unit sphere.
        let pts = icosahedron();
        let perturbed = perturb(&pts);
        for p in perturbed {
            assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-9);
        }
    }
}
