//! Spherical math primitives: cartesian/lat-lon conversion, distances, and
//! the great-circle side predicate.

use nalgebra::Vector3;

/// A point on (or near) the unit sphere, as three 64-bit float lanes.
///
/// Produced only by [`to_cartesian`] or by normalizing an existing vector;
/// all mesh vertex points are unit-length within `1e-10`.
pub type Point3D = Vector3<f64>;

/// Latitude/longitude in degrees. Latitude in `[-90, 90]`, longitude in
/// `[-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// `(cos phi cos lambda, cos phi sin lambda, sin phi)` after degree to radian
/// conversion.
pub fn to_cartesian(ll: LatLon) -> Point3D {
    let phi = ll.lat.to_radians();
    let lambda = ll.lon.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_lambda, cos_lambda) = lambda.sin_cos();

    Point3D::new(cos_phi * cos_lambda, cos_phi * sin_lambda, sin_phi)
}

/// Inverse of [`to_cartesian`]. Longitude is undefined at the poles; we
/// return 0.0 there, matching `atan2(0, 0)`.
pub fn to_lat_lon(p: Point3D) -> LatLon {
    let lat = p.z.clamp(-1.0, 1.0).asin().to_degrees();
    let lon = p.y.atan2(p.x).to_degrees();

    LatLon::new(lat, lon)
}

/// Angular distance between two unit vectors, via `acos(dot(a, b))`.
pub fn spherical_distance(a: Point3D, b: Point3D) -> f64 {
    a.dot(&b).clamp(-1.0, 1.0).acos()
}

/// Numerically stabler equivalent of [`spherical_distance`] using the
/// half-angle haversine form. Must agree with `spherical_distance` to within
/// `1e-9` on any input.
pub fn haversine(a: Point3D, b: Point3D) -> f64 {
    let d = a - b;
    let chord = d.norm();
    2.0 * (chord / 2.0).clamp(0.0, 1.0).asin()
}

/// Signed "left of the directed arc a -> b" test: `dot(cross(a, b), p)`.
/// Positive when `p` is to the left of the arc, zero exactly on the
/// great circle through `a` and `b`.
pub fn side_of_great_circle(a: Point3D, b: Point3D, p: Point3D) -> f64 {
    a.cross(&b).dot(&p)
}

/// Spherical circumcenter of a triangle `(a, b, c)`: the unit vector
/// equidistant from all three vertices, in the triangle's own hemisphere.
pub fn spherical_circumcenter(a: Point3D, b: Point3D, c: Point3D) -> Point3D {
    let normal = (b - a).cross(&(c - a));
    let center = normal.normalize();
    let centroid = a + b + c;

    if center.dot(&centroid) < 0.0 {
        -center
    } else {
        center
    }
}
