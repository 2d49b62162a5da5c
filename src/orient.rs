//! The orientation predicate: signed tetrahedral volume of `(a, b, c, d)`.
//!
//! This is the crate's sole non-trivial floating-point predicate. Perturbation
//! (see `hull::perturb`) keeps magnitudes well away from `1e-15`, so a plain
//! native-double expansion is used — no extended-precision filter is needed.

use crate::math::Point3D;

/// `det([b-a; c-a; d-a])`, expanded as three 2x2 cross-product terms.
///
/// Positive when `d` lies on the side of the plane `(a, b, c)` that the
/// normal `(b-a) x (c-a)` points to. For a face wound counter-clockwise as
/// seen from outside the hull, a point `p` is visible from that face iff
/// `orient3d(v0, v1, v2, p) > 0`.
pub fn orient3d(a: Point3D, b: Point3D, c: Point3D, d: Point3D) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;

    ab.cross(&ac).dot(&ad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{to_cartesian, LatLon};
    use approx::assert_relative_eq;

    fn pts() -> (Point3D, Point3D, Point3D, Point3D) {
        (
            to_cartesian(LatLon::new(0.0, 0.0)),
            to_cartesian(LatLon::new(0.0, 90.0)),
            to_cartesian(LatLon::new(90.0, 0.0)),
            to_cartesian(LatLon::new(-10.0, 20.0)),
        )
    }

    #[test]
    fn antisymmetric_under_swaps() {
        let (a, b, c, d) = pts();
        let base = orient3d(a, b, c, d);

        assert_relative_eq!(base, -orient3d(a, c, b, d), epsilon = 1e-12);
        assert_relative_eq!(base, -orient3d(b, a, c, d), epsilon = 1e-12);
    }

    #[test]
    fn zero_for_coplanar_point() {
        let a = Point3D::new(1.0, 0.0, 0.0);
        let b = Point3D::new(0.0, 1.0, 0.0);
        let c = Point3D::new(-1.0, 0.0, 0.0);
        // d is the midpoint of a and b, which lies in the plane of a,b,c (z=0 plane).
        let d = Point3D::new(0.5, 0.5, 0.0);

        assert!(orient3d(a, b, c, d).abs() < 1e-15);
    }

    #[test]
    fn outward_hull_face_is_negative_toward_origin() {
        // A small triangle on the unit sphere, wound CCW as seen from outside.
        let a = to_cartesian(LatLon::new(0.0, 0.0));
        let b = to_cartesian(LatLon::new(0.0, 1.0));
        let c = to_cartesian(LatLon::new(1.0, 0.0));
        let origin = Point3D::new(0.0, 0.0, 0.0);

        assert!(orient3d(a, b, c, origin) < 0.0);
    }
}
