//! Ray-triangle, edge-triangle and triangle-triangle intersection tests.

// Allow this pattern - it's correct for barycentric coordinate determinant calculation
#![allow(clippy::suspicious_operation_groupings)]

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

use crate::predicates::{intersect_lines, LineMode};

/// Which side of a triangle a ray is allowed to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Culling {
    /// Only hits on the counter-clockwise (front) side count.
    #[default]
    Back,
    /// Only hits on the clockwise (back) side count.
    Front,
    /// Both sides count.
    None,
}

/// A ray hit on a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter; the hit point is `origin + t * direction`.
    pub t: f64,
    /// Barycentric coordinates (u, v); the third is `1 - u - v`.
    pub barycentric: (f64, f64),
    /// Whether the ray struck the front (counter-clockwise) side.
    pub front_facing: bool,
}

/// Result of an edge-triangle intersection test.
#[derive(Debug, Clone)]
pub struct EdgeTriangleIntersection {
    /// Parameter t along the edge (0.0 = start, 1.0 = end).
    pub t: f64,
    /// The intersection point in 3D space.
    pub point: Point3<f64>,
}

/// Ray-triangle intersection using the Möller-Trumbore algorithm.
///
/// Hits behind the origin (`t <= epsilon`) are rejected, as are hits on a
/// culled side.
///
/// # Example
///
/// ```
/// use nalgebra::{Point3, Vector3};
/// use viewmap_geom::intersect::{ray_triangle, Culling};
///
/// let tri = [
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// ];
/// let down = Vector3::new(0.0, 0.0, -1.0);
/// let hit = ray_triangle(&Point3::new(0.2, 0.2, 2.0), &down, &tri, Culling::Back, 1e-12);
/// assert!((hit.unwrap().t - 2.0).abs() < 1e-9);
///
/// let up = Vector3::new(0.0, 0.0, 1.0);
/// assert!(ray_triangle(&Point3::new(0.2, 0.2, -2.0), &up, &tri, Culling::Back, 1e-12).is_none());
/// ```
#[must_use]
pub fn ray_triangle(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    triangle: &[Point3<f64>; 3],
    culling: Culling,
    epsilon: f64,
) -> Option<RayHit> {
    let [v0, v1, v2] = triangle;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    // Ray is parallel to triangle
    if a.abs() < epsilon {
        return None;
    }

    // a > 0 means the ray travels against the CCW normal
    let front_facing = a > 0.0;
    match culling {
        Culling::Back if !front_facing => return None,
        Culling::Front if front_facing => return None,
        _ => {}
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t > epsilon).then_some(RayHit {
        t,
        barycentric: (u, v),
        front_facing,
    })
}

/// Test if an edge crosses a triangle.
#[must_use]
pub fn edge_triangle(
    e0: &Point3<f64>,
    e1: &Point3<f64>,
    triangle: &[Point3<f64>; 3],
    epsilon: f64,
) -> Option<EdgeTriangleIntersection> {
    let direction = e1 - e0;
    if direction.norm_squared() < epsilon * epsilon {
        return None;
    }

    let [v0, v1, v2] = triangle;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < epsilon {
        return None;
    }

    let f = 1.0 / a;
    let s = e0 - v0;
    let u = f * s.dot(&h);
    if u < -epsilon || u > 1.0 + epsilon {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < -epsilon || u + v > 1.0 + epsilon {
        return None;
    }

    let t = f * edge2.dot(&q);
    if t < -epsilon || t > 1.0 + epsilon {
        return None;
    }

    let t = t.clamp(0.0, 1.0);
    Some(EdgeTriangleIntersection {
        t,
        point: e0 + direction * t,
    })
}

/// Points where two triangles meet.
///
/// For triangles crossing transversally the result is the two endpoints of
/// the intersection segment (or a single point when they only touch). For
/// coplanar overlapping triangles the result is the overlap polygon, in
/// order around its centroid. Points closer than `epsilon` are merged.
#[must_use]
pub fn triangle_intersection(
    a: &[Point3<f64>; 3],
    b: &[Point3<f64>; 3],
    epsilon: f64,
) -> SmallVec<[Point3<f64>; 6]> {
    let na = triangle_normal(&a[0], &a[1], &a[2]);
    let nb = triangle_normal(&b[0], &b[1], &b[2]);

    let coplanar = na.cross(&nb).norm() <= epsilon * na.norm().max(1.0) * nb.norm().max(1.0)
        && na.norm() > epsilon
        && (b[0] - a[0]).dot(&na).abs() <= epsilon * na.norm().max(1.0);
    if coplanar {
        return coplanar_overlap(a, b, &na, epsilon);
    }

    let mut points: SmallVec<[Point3<f64>; 6]> = SmallVec::new();
    for (e0, e1) in triangle_edges(a) {
        if let Some(hit) = edge_triangle(e0, e1, b, epsilon) {
            push_unique(&mut points, hit.point, epsilon);
        }
    }
    for (e0, e1) in triangle_edges(b) {
        if let Some(hit) = edge_triangle(e0, e1, a, epsilon) {
            push_unique(&mut points, hit.point, epsilon);
        }
    }

    if points.len() <= 2 {
        return points;
    }

    // Numerical duplicates along the segment: keep the two farthest apart
    let mut best = (0, 1);
    let mut max_dist_sq = 0.0;
    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let d = (points[j] - points[i]).norm_squared();
            if d > max_dist_sq {
                max_dist_sq = d;
                best = (i, j);
            }
        }
    }
    let mut segment = SmallVec::new();
    segment.push(points[best.0]);
    segment.push(points[best.1]);
    segment
}

fn coplanar_overlap(
    a: &[Point3<f64>; 3],
    b: &[Point3<f64>; 3],
    normal: &Vector3<f64>,
    epsilon: f64,
) -> SmallVec<[Point3<f64>; 6]> {
    let mut points: SmallVec<[Point3<f64>; 6]> = SmallVec::new();

    for p in a {
        if point_in_triangle(p, &b[0], &b[1], &b[2], epsilon) {
            push_unique(&mut points, *p, epsilon);
        }
    }
    for p in b {
        if point_in_triangle(p, &a[0], &a[1], &a[2], epsilon) {
            push_unique(&mut points, *p, epsilon);
        }
    }
    for (a0, a1) in triangle_edges(a) {
        for (b0, b1) in triangle_edges(b) {
            if let Some(p) = intersect_lines((a0, a1), (b0, b1), LineMode::Segment, epsilon) {
                push_unique(&mut points, p, epsilon);
            }
        }
    }

    if points.len() < 3 {
        return points;
    }

    let centroid = Point3::from(
        points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64,
    );
    let axis_u = (points[0] - centroid).normalize();
    let axis_v = normal.normalize().cross(&axis_u);
    points.sort_by(|p, q| {
        let ap = (p - centroid).dot(&axis_v).atan2((p - centroid).dot(&axis_u));
        let aq = (q - centroid).dot(&axis_v).atan2((q - centroid).dot(&axis_u));
        ap.partial_cmp(&aq).unwrap_or(std::cmp::Ordering::Equal)
    });
    points
}

fn triangle_edges(t: &[Point3<f64>; 3]) -> [(&Point3<f64>, &Point3<f64>); 3] {
    [(&t[0], &t[1]), (&t[1], &t[2]), (&t[2], &t[0])]
}

fn push_unique(points: &mut SmallVec<[Point3<f64>; 6]>, p: Point3<f64>, epsilon: f64) {
    if !points.iter().any(|q| (p - q).norm_squared() < epsilon * epsilon) {
        points.push(p);
    }
}

/// Compute the normal of a triangle.
///
/// The result is not normalized: (v1-v0) × (v2-v0).
#[inline]
#[must_use]
pub fn triangle_normal(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Vector3<f64> {
    (v1 - v0).cross(&(v2 - v0))
}

/// Point-in-triangle test using barycentric coordinates.
///
/// The point is assumed to be in the triangle's plane. Points on the
/// boundary (within `epsilon`) count as inside.
#[must_use]
pub fn point_in_triangle(
    point: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    epsilon: f64,
) -> bool {
    let v0v1 = v1 - v0;
    let v0v2 = v2 - v0;
    let v0p = point - v0;

    let dot00 = v0v2.dot(&v0v2);
    let dot01 = v0v2.dot(&v0v1);
    let dot02 = v0v2.dot(&v0p);
    let dot11 = v0v1.dot(&v0v1);
    let dot12 = v0v1.dot(&v0p);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < epsilon {
        return false;
    }
    let inv_denom = 1.0 / denom;

    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    u >= -epsilon && v >= -epsilon && u + v <= 1.0 + epsilon
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    fn tri(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [Point3<f64>; 3] {
        [
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        ]
    }

    #[test]
    fn test_ray_triangle_culling() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]);
        let from_above = Point3::new(0.5, 0.3, 1.0);
        let down = Vector3::new(0.0, 0.0, -1.0);
        let from_below = Point3::new(0.5, 0.3, -1.0);
        let up = Vector3::new(0.0, 0.0, 1.0);

        let hit = ray_triangle(&from_above, &down, &t, Culling::Back, EPSILON).unwrap();
        assert!(hit.front_facing);
        assert!((hit.t - 1.0).abs() < 1e-12);

        assert!(ray_triangle(&from_below, &up, &t, Culling::Back, EPSILON).is_none());
        assert!(ray_triangle(&from_below, &up, &t, Culling::Front, EPSILON).is_some());
        assert!(ray_triangle(&from_below, &up, &t, Culling::None, EPSILON).is_some());
        assert!(ray_triangle(&from_above, &down, &t, Culling::Front, EPSILON).is_none());
    }

    #[test]
    fn test_ray_triangle_miss_and_parallel() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]);
        let down = Vector3::new(0.0, 0.0, -1.0);
        assert!(ray_triangle(&Point3::new(2.0, 2.0, 1.0), &down, &t, Culling::None, EPSILON).is_none());

        let along = Vector3::new(1.0, 0.0, 0.0);
        assert!(ray_triangle(&Point3::new(0.0, 0.3, 0.0), &along, &t, Culling::None, EPSILON).is_none());
    }

    #[test]
    fn test_ray_triangle_behind_origin() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]);
        let up = Vector3::new(0.0, 0.0, 1.0);
        assert!(ray_triangle(&Point3::new(0.5, 0.3, 1.0), &up, &t, Culling::None, EPSILON).is_none());
    }

    #[test]
    fn test_edge_triangle_through() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 1.0, 0.0]);
        let hit = edge_triangle(
            &Point3::new(0.5, 0.5, -1.0),
            &Point3::new(0.5, 0.5, 1.0),
            &t,
            EPSILON,
        )
        .unwrap();
        assert!((hit.t - 0.5).abs() < 1e-9);
        assert!(hit.point.z.abs() < 1e-9);
    }

    #[test]
    fn test_triangle_intersection_transversal() {
        let a = tri([-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, -0.5, -1.0], [0.0, -0.5, 1.0], [0.0, 0.5, 0.0]);

        let points = triangle_intersection(&a, &b, EPSILON);
        assert_eq!(points.len(), 2);
        for p in &points {
            assert!(p.x.abs() < 1e-9);
            assert!(p.z.abs() < 1e-9);
        }
        let length = (points[0] - points[1]).norm();
        assert!((length - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_intersection_disjoint() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 2.0]);
        assert!(triangle_intersection(&a, &b, EPSILON).is_empty());
    }

    #[test]
    fn test_triangle_intersection_coplanar_overlap() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let b = tri([0.5, 0.5, 0.0], [3.0, 0.5, 0.0], [0.5, 3.0, 0.0]);

        let points = triangle_intersection(&a, &b, EPSILON);
        assert!(points.len() >= 3);
        for p in &points {
            assert!(p.z.abs() < 1e-12);
            assert!(point_in_triangle(p, &a[0], &a[1], &a[2], 1e-9));
            assert!(point_in_triangle(p, &b[0], &b[1], &b[2], 1e-9));
        }
    }

    #[test]
    fn test_point_in_triangle() {
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert!(point_in_triangle(&Point3::new(0.25, 0.25, 0.0), &t[0], &t[1], &t[2], EPSILON));
        assert!(point_in_triangle(&Point3::new(0.5, 0.0, 0.0), &t[0], &t[1], &t[2], EPSILON));
        assert!(!point_in_triangle(&Point3::new(0.8, 0.8, 0.0), &t[0], &t[1], &t[2], EPSILON));
    }
}
