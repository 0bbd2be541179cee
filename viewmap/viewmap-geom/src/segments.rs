//! 2D segment intersection queries.
//!
//! [`find_intersections`] sweeps segments sorted by their left end and keeps
//! an active list pruned on the sweep position, so only segments whose x
//! ranges overlap are tested exactly.

use nalgebra::{Point2, Vector2};
use smallvec::SmallVec;

/// A 2D segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment2 {
    /// Start point.
    pub a: Point2<f64>,
    /// End point.
    pub b: Point2<f64>,
}

impl Segment2 {
    /// Create a segment.
    #[must_use]
    pub fn new(a: Point2<f64>, b: Point2<f64>) -> Self {
        Self { a, b }
    }

    /// Direction vector `b - a`.
    #[must_use]
    pub fn direction(&self) -> Vector2<f64> {
        self.b - self.a
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.direction().norm()
    }

    fn min_x(&self) -> f64 {
        self.a.x.min(self.b.x)
    }

    fn max_x(&self) -> f64 {
        self.a.x.max(self.b.x)
    }

    fn y_range(&self) -> (f64, f64) {
        (self.a.y.min(self.b.y), self.a.y.max(self.b.y))
    }
}

/// An intersection between two input segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentCrossing {
    /// Index of the first segment (always the smaller index).
    pub first: usize,
    /// Index of the second segment.
    pub second: usize,
    /// The intersection point.
    pub point: Point2<f64>,
}

/// 2D cross product (z of the 3D cross product).
#[inline]
#[must_use]
pub fn cross2(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Distance from `p` to segment `s`, if its projection falls within the
/// segment (endpoints included).
#[must_use]
pub fn point_segment_distance(p: &Point2<f64>, s: &Segment2) -> Option<f64> {
    let d = s.direction();
    let len_sq = d.norm_squared();
    if len_sq == 0.0 {
        return Some((p - s.a).norm());
    }
    let dot = (p - s.a).dot(&d);
    if dot < 0.0 || dot > len_sq {
        return None;
    }
    Some(cross2(&d, &(p - s.a)).abs() / len_sq.sqrt())
}

/// Intersection points of two segments.
///
/// Crossing segments give one point; touching at an endpoint also gives
/// one. Collinear overlapping segments give the endpoints of each that lie
/// on the other.
#[must_use]
pub fn segment_intersection(s: &Segment2, t: &Segment2, epsilon: f64) -> SmallVec<[Point2<f64>; 2]> {
    let mut out: SmallVec<[Point2<f64>; 2]> = SmallVec::new();

    let d1 = s.direction();
    let d2 = t.direction();
    let len1 = d1.norm();
    let len2 = d2.norm();
    if len1 == 0.0 || len2 == 0.0 {
        return out;
    }

    let denom = cross2(&d1, &d2);
    let w = t.a - s.a;

    if denom.abs() > epsilon * len1 * len2 {
        let ta = cross2(&w, &d2) / denom;
        let tb = cross2(&w, &d1) / denom;
        let tol_a = epsilon / len1;
        let tol_b = epsilon / len2;
        if ta >= -tol_a && ta <= 1.0 + tol_a && tb >= -tol_b && tb <= 1.0 + tol_b {
            out.push(s.a + d1 * ta.clamp(0.0, 1.0));
        }
        return out;
    }

    // Parallel: only collinear overlaps intersect
    if cross2(&d1, &w).abs() / len1 > epsilon {
        return out;
    }
    let mut push = |p: Point2<f64>| {
        if !out.iter().any(|q| (p - *q).norm() <= epsilon) {
            out.push(p);
        }
    };
    for p in [t.a, t.b] {
        if point_segment_distance(&p, s).is_some_and(|d| d <= epsilon) {
            push(p);
        }
    }
    for p in [s.a, s.b] {
        if point_segment_distance(&p, t).is_some_and(|d| d <= epsilon) {
            push(p);
        }
    }
    out.truncate(2);
    out
}

/// Find all pairwise intersections in a set of segments.
///
/// Crossings are reported once per pair and point, with `first < second`.
/// Segments sharing an endpoint report that endpoint; callers filter
/// connected segments themselves.
///
/// # Example
///
/// ```
/// use nalgebra::Point2;
/// use viewmap_geom::segments::{find_intersections, Segment2};
///
/// let segments = [
///     Segment2::new(Point2::new(0.0, 0.0), Point2::new(2.0, 2.0)),
///     Segment2::new(Point2::new(0.0, 2.0), Point2::new(2.0, 0.0)),
///     Segment2::new(Point2::new(5.0, 0.0), Point2::new(6.0, 0.0)),
/// ];
/// let crossings = find_intersections(&segments, 1e-9);
/// assert_eq!(crossings.len(), 1);
/// assert_eq!((crossings[0].first, crossings[0].second), (0, 1));
/// ```
#[must_use]
pub fn find_intersections(segments: &[Segment2], epsilon: f64) -> Vec<SegmentCrossing> {
    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|&i, &j| {
        segments[i]
            .min_x()
            .partial_cmp(&segments[j].min_x())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(i.cmp(&j))
    });

    let mut active: Vec<usize> = Vec::new();
    let mut crossings = Vec::new();

    for &i in &order {
        let current = &segments[i];
        let sweep_x = current.min_x();
        active.retain(|&j| segments[j].max_x() >= sweep_x - epsilon);

        let (y_min, y_max) = current.y_range();
        for &j in &active {
            let other = &segments[j];
            let (oy_min, oy_max) = other.y_range();
            if oy_max < y_min - epsilon || oy_min > y_max + epsilon {
                continue;
            }
            let (first, second) = if i < j { (i, j) } else { (j, i) };
            for point in segment_intersection(&segments[first], &segments[second], epsilon) {
                crossings.push(SegmentCrossing {
                    first,
                    second,
                    point,
                });
            }
        }
        active.push(i);
    }

    crossings.sort_by(|a, b| (a.first, a.second).cmp(&(b.first, b.second)));
    crossings
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn seg(ax: f64, ay: f64, bx: f64, by: f64) -> Segment2 {
        Segment2::new(Point2::new(ax, ay), Point2::new(bx, by))
    }

    #[test]
    fn test_segment_intersection_crossing() {
        let points = segment_intersection(&seg(0.0, 0.0, 2.0, 2.0), &seg(0.0, 2.0, 2.0, 0.0), 1e-9);
        assert_eq!(points.len(), 1);
        assert!((points[0] - Point2::new(1.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_segment_intersection_t_junction() {
        let points = segment_intersection(&seg(0.0, 0.0, 2.0, 0.0), &seg(1.0, 0.0, 1.0, 3.0), 1e-9);
        assert_eq!(points.len(), 1);
        assert!((points[0] - Point2::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_segment_intersection_parallel_apart() {
        let points = segment_intersection(&seg(0.0, 0.0, 2.0, 0.0), &seg(0.0, 1.0, 2.0, 1.0), 1e-9);
        assert!(points.is_empty());
    }

    #[test]
    fn test_segment_intersection_collinear_overlap() {
        let points = segment_intersection(&seg(0.0, 0.0, 4.0, 0.0), &seg(1.0, 0.0, 6.0, 0.0), 1e-9);
        assert_eq!(points.len(), 2);
        assert!(points.iter().any(|p| (p.x - 1.0).abs() < 1e-12));
        assert!(points.iter().any(|p| (p.x - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_segment_intersection_miss() {
        let points = segment_intersection(&seg(0.0, 0.0, 1.0, 1.0), &seg(2.0, 0.0, 3.0, -1.0), 1e-9);
        assert!(points.is_empty());
    }

    #[test]
    fn test_find_intersections_grid() {
        // Three horizontal by three vertical lines: nine crossings
        let mut segments = Vec::new();
        for k in 0..3 {
            let c = f64::from(k) + 0.5;
            segments.push(seg(0.0, c, 3.0, c));
            segments.push(seg(c, 0.0, c, 3.0));
        }
        let crossings = find_intersections(&segments, 1e-9);
        assert_eq!(crossings.len(), 9);
        for c in &crossings {
            assert!(c.first < c.second);
        }
    }

    #[test]
    fn test_find_intersections_shared_endpoint() {
        let segments = [seg(0.0, 0.0, 1.0, 0.0), seg(1.0, 0.0, 1.0, 1.0)];
        let crossings = find_intersections(&segments, 1e-9);
        assert_eq!(crossings.len(), 1);
        assert!((crossings[0].point - Point2::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_find_intersections_vertical_segments() {
        let segments = [seg(1.0, 0.0, 1.0, 4.0), seg(0.0, 2.0, 3.0, 2.0), seg(1.0, 5.0, 1.0, 6.0)];
        let crossings = find_intersections(&segments, 1e-9);
        assert_eq!(crossings.len(), 1);
        assert_eq!((crossings[0].first, crossings[0].second), (0, 1));
    }
}
