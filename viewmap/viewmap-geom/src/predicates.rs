//! Orientation predicates, line intersection and quantized coordinate keys.
//!
//! The orientation tests follow the contour tutorial of Bénard and Hertzmann
//! (Appendix C.2): a signed 4×4 determinant with a small dead-zone so that
//! nearly coplanar configurations report [`Orientation::Coplanar`] instead of
//! flipping sign under floating noise.

use nalgebra::{Matrix4, Point2, Point3};

/// Default dead-zone for orientation tests and default matching tolerance.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Default multiplier used to quantize coordinates into keys.
pub const DEFAULT_HASH_MULTIPLIER: f64 = 1e10;

/// Side of an oriented plane a point lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Positive determinant.
    Right,
    /// Negative determinant.
    Left,
    /// Determinant within the dead-zone.
    Coplanar,
}

/// Orientation of `d` relative to the plane through `a`, `b`, `c`.
///
/// Computes the determinant of the 4×4 matrix whose rows are the homogeneous
/// coordinates of the four points and compares it against `epsilon`.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use viewmap_geom::predicates::{orient3d, Orientation, DEFAULT_EPSILON};
///
/// let a = Point3::new(0.0, 0.0, 0.0);
/// let b = Point3::new(1.0, 0.0, 0.0);
/// let c = Point3::new(0.0, 1.0, 0.0);
///
/// let above = Point3::new(0.0, 0.0, 1.0);
/// let on = Point3::new(0.3, 0.3, 0.0);
/// assert_ne!(orient3d(&a, &b, &c, &above, DEFAULT_EPSILON), Orientation::Coplanar);
/// assert_eq!(orient3d(&a, &b, &c, &on, DEFAULT_EPSILON), Orientation::Coplanar);
/// ```
#[must_use]
pub fn orient3d(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    epsilon: f64,
) -> Orientation {
    #[rustfmt::skip]
    let m = Matrix4::new(
        a.x, a.y, a.z, 1.0,
        b.x, b.y, b.z, 1.0,
        c.x, c.y, c.z, 1.0,
        d.x, d.y, d.z, 1.0,
    );
    let det = m.determinant();

    if det > epsilon {
        Orientation::Right
    } else if det < -epsilon {
        Orientation::Left
    } else {
        Orientation::Coplanar
    }
}

/// Whether the triangle `abc` is front-facing as seen from `d`.
#[must_use]
pub fn front_side(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    epsilon: f64,
) -> bool {
    orient3d(d, b, c, a, epsilon) == Orientation::Right
}

/// Whether `d` and `e` lie on the same side of the plane through `a`, `b`, `c`.
///
/// Coplanar points count as being on the negative side, so a coplanar point
/// and a point strictly on the left are reported as "same side".
#[must_use]
pub fn same_side(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
    d: &Point3<f64>,
    e: &Point3<f64>,
    epsilon: f64,
) -> bool {
    (orient3d(a, b, c, d, epsilon) == Orientation::Right)
        == (orient3d(a, b, c, e, epsilon) == Orientation::Right)
}

/// How [`intersect_lines`] treats its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Both inputs are finite segments; parameters must lie in `[0, 1]`.
    #[default]
    Segment,
    /// Both inputs are infinite lines through their two points.
    Infinite,
}

/// Intersect two 3D lines or segments.
///
/// Solves for the closest points between the two lines and reports a hit when
/// they coincide within `tolerance` on every axis. Returns the point on the
/// first line.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use viewmap_geom::predicates::{intersect_lines, LineMode};
///
/// let hit = intersect_lines(
///     (&Point3::new(0.0, 0.0, 0.0), &Point3::new(2.0, 2.0, 2.0)),
///     (&Point3::new(2.0, 0.0, 0.0), &Point3::new(0.0, 2.0, 2.0)),
///     LineMode::Segment,
///     1e-10,
/// );
/// let p = hit.unwrap();
/// assert!((p.x - 1.0).abs() < 1e-9 && (p.y - 1.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn intersect_lines(
    first: (&Point3<f64>, &Point3<f64>),
    second: (&Point3<f64>, &Point3<f64>),
    mode: LineMode,
    tolerance: f64,
) -> Option<Point3<f64>> {
    let (p1, p2) = first;
    let (p3, p4) = second;

    let d13 = p1 - p3;
    let d43 = p4 - p3;
    let d21 = p2 - p1;

    let d1343 = d13.dot(&d43);
    let d4321 = d43.dot(&d21);
    let d1321 = d13.dot(&d21);
    let d4343 = d43.dot(&d43);
    let d2121 = d21.dot(&d21);

    let denominator = d2121 * d4343 - d4321 * d4321;
    if denominator < tolerance {
        return None;
    }
    let numerator = d1343 * d4321 - d1321 * d4343;

    let ta = numerator / denominator;
    let tb = (d1343 + ta * d4321) / d4343;

    if mode == LineMode::Segment && !((0.0..=1.0).contains(&ta) && (0.0..=1.0).contains(&tb)) {
        return None;
    }

    let pa = p1 + d21 * ta;
    let pb = p3 + d43 * tb;

    let close = (pa.x - pb.x).abs() < tolerance
        && (pa.y - pb.y).abs() < tolerance
        && (pa.z - pb.z).abs() < tolerance;

    close.then_some(pa)
}

/// Quantized key of a 3D position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key3(pub [i64; 3]);

/// Quantized key of a 2D position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key2(pub [i64; 2]);

/// Quantize a single coordinate.
///
/// A gap of `1e-3 / multiplier` is added before truncation so that a value
/// sitting exactly on a bucket boundary does not flip bucket under noise.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn quantize(value: f64, multiplier: f64) -> i64 {
    let gap = 1e-3 / multiplier;
    ((value + gap) * multiplier).trunc() as i64
}

/// Quantized key of a 3D point.
#[must_use]
pub fn hash_point3(p: &Point3<f64>, multiplier: f64) -> Key3 {
    Key3([
        quantize(p.x, multiplier),
        quantize(p.y, multiplier),
        quantize(p.z, multiplier),
    ])
}

/// Quantized key of a 2D point.
#[must_use]
pub fn hash_point2(p: &Point2<f64>, multiplier: f64) -> Key2 {
    Key2([quantize(p.x, multiplier), quantize(p.y, multiplier)])
}

/// Per-axis match of two 3D points.
#[inline]
#[must_use]
pub fn points3_match(a: &Point3<f64>, b: &Point3<f64>, tolerance: f64) -> bool {
    (a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance && (a.z - b.z).abs() < tolerance
}

/// Per-axis match of two 2D points.
#[inline]
#[must_use]
pub fn points2_match(a: &Point2<f64>, b: &Point2<f64>, tolerance: f64) -> bool {
    (a.x - b.x).abs() < tolerance && (a.y - b.y).abs() < tolerance
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn test_orient3d_opposite_sides() {
        let (a, b, c) = (p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        let up = orient3d(&a, &b, &c, &p(0.0, 0.0, 1.0), DEFAULT_EPSILON);
        let down = orient3d(&a, &b, &c, &p(0.0, 0.0, -1.0), DEFAULT_EPSILON);

        assert_ne!(up, Orientation::Coplanar);
        assert_ne!(down, Orientation::Coplanar);
        assert_ne!(up, down);
    }

    #[test]
    fn test_orient3d_dead_zone() {
        let (a, b, c) = (p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        let nearly = p(0.2, 0.2, 1e-12);
        assert_eq!(
            orient3d(&a, &b, &c, &nearly, DEFAULT_EPSILON),
            Orientation::Coplanar
        );
        assert_ne!(orient3d(&a, &b, &c, &nearly, 0.0), Orientation::Coplanar);
    }

    #[test]
    fn test_front_side_matches_normal() {
        // CCW triangle seen from +z has a +z normal
        let (a, b, c) = (p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        assert!(front_side(&a, &b, &c, &p(0.2, 0.2, 5.0), DEFAULT_EPSILON));
        assert!(!front_side(&a, &b, &c, &p(0.2, 0.2, -5.0), DEFAULT_EPSILON));
    }

    #[test]
    fn test_same_side() {
        let (a, b, c) = (p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        let d = p(0.0, 0.0, 1.0);
        let e = p(3.0, -2.0, 0.5);
        let f = p(0.0, 0.0, -1.0);
        assert!(same_side(&a, &b, &c, &d, &e, DEFAULT_EPSILON));
        assert!(!same_side(&a, &b, &c, &d, &f, DEFAULT_EPSILON));
    }

    #[test]
    fn test_intersect_lines_2d_cross() {
        let hit = intersect_lines(
            (&p(1.0, 1.0, 0.0), &p(1.0, 3.0, 0.0)),
            (&p(0.0, 1.0, 0.0), &p(2.0, 1.0, 0.0)),
            LineMode::Segment,
            1e-10,
        )
        .unwrap();
        assert!((hit - p(1.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_intersect_lines_shared_endpoint() {
        let q = p(1.345_678_912, 2.456_789_123, 3.567_891_234_5);
        let hit = intersect_lines(
            (&p(0.0, 0.0, 0.0), &q),
            (&q, &p(9.0, 9.0, 9.0)),
            LineMode::Segment,
            1e-10,
        )
        .unwrap();
        assert!((hit - q).norm() < 1e-9);
    }

    #[test]
    fn test_intersect_lines_t_shape() {
        let hit = intersect_lines(
            (&p(1.456_789, 0.0, 0.0), &p(1.456_789, 2.0, 0.0)),
            (&p(1.456_789, 1.0, 0.0), &p(3.0, 2.0, 0.0)),
            LineMode::Segment,
            1e-10,
        )
        .unwrap();
        assert!((hit.x - 1.456_789).abs() < 1e-9);
        assert!((hit.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersect_lines_disjoint_segments() {
        let hit = intersect_lines(
            (&p(0.0, 0.0, 0.0), &p(0.0, 2.0, 0.0)),
            (&p(1.0, 1.0, 0.0), &p(2.0, 1.0, 0.0)),
            LineMode::Segment,
            1e-10,
        );
        assert!(hit.is_none());

        // Same lines extended do cross at (0, 1, 0)
        let hit = intersect_lines(
            (&p(0.0, 0.0, 0.0), &p(0.0, 2.0, 0.0)),
            (&p(1.0, 1.0, 0.0), &p(2.0, 1.0, 0.0)),
            LineMode::Infinite,
            1e-10,
        )
        .unwrap();
        assert!((hit - p(0.0, 1.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_intersect_lines_skew() {
        let hit = intersect_lines(
            (&p(0.0, 0.0, 0.0), &p(1.0, 0.0, 0.0)),
            (&p(0.5, -1.0, 1.0), &p(0.5, 1.0, 1.0)),
            LineMode::Infinite,
            1e-10,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_quantize_merges_noise() {
        let a = hash_point3(&p(0.1, 0.2, 0.3), DEFAULT_HASH_MULTIPLIER);
        let b = hash_point3(&p(0.1 + 1e-15, 0.2 - 1e-15, 0.3), DEFAULT_HASH_MULTIPLIER);
        assert_eq!(a, b);

        let c = hash_point3(&p(0.1 + 1e-8, 0.2, 0.3), DEFAULT_HASH_MULTIPLIER);
        assert_ne!(a, c);
    }

    #[test]
    fn test_quantize_bucket_boundary() {
        // Integers and values just below them land in the same bucket thanks to the gap
        assert_eq!(quantize(1.0, 1e10), quantize(1.0 - 1e-16, 1e10));
        assert_eq!(quantize(0.0, 1e10), 0);
    }

    #[test]
    fn test_hash_point2() {
        let a = hash_point2(&Point2::new(250.0, 125.5), DEFAULT_HASH_MULTIPLIER);
        let b = hash_point2(&Point2::new(250.0, 125.5), DEFAULT_HASH_MULTIPLIER);
        assert_eq!(a, b);
    }
}
