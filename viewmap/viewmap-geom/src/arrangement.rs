//! Planar arrangements: the regions induced by a set of 2D segments.
//!
//! The default [`PlanarArrangement`] splits every segment at its crossings,
//! welds coincident endpoints, prunes dangling edges and traces the faces of
//! the resulting planar graph. Counter-clockwise cycles become polygon
//! contours; clockwise cycles are outer boundaries of connected components
//! and become holes of the smallest face enclosing them.

use hashbrown::HashMap;
use nalgebra::Point2;
use tracing::debug;

use crate::error::{GeomError, GeomResult};
use crate::predicates::{hash_point2, Key2};
use crate::segments::{find_intersections, Segment2};

/// A region of an arrangement: outer contour plus holes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrangementPolygon {
    /// Outer contour, counter-clockwise, without repeating the first point.
    pub contour: Vec<Point2<f64>>,
    /// Hole contours.
    pub holes: Vec<Vec<Point2<f64>>>,
    /// Unsigned area of the region (contour minus holes).
    pub area: f64,
}

impl ArrangementPolygon {
    /// Create a polygon and compute its area.
    #[must_use]
    pub fn new(contour: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        let hole_area: f64 = holes.iter().map(|h| signed_area(h).abs()).sum();
        let area = (signed_area(&contour).abs() - hole_area).abs();
        Self {
            contour,
            holes,
            area,
        }
    }

    /// A point strictly inside the region (inside the contour, outside every
    /// hole), or `None` when the region is degenerate.
    ///
    /// Scans horizontal lines halfway between consecutive distinct vertex
    /// heights and returns the middle of the widest interior interval.
    #[must_use]
    pub fn inside_point(&self) -> Option<Point2<f64>> {
        let rings: Vec<&[Point2<f64>]> = std::iter::once(self.contour.as_slice())
            .chain(self.holes.iter().map(Vec::as_slice))
            .collect();

        let mut ys: Vec<f64> = rings.iter().flat_map(|r| r.iter().map(|p| p.y)).collect();
        ys.sort_by(f64::total_cmp);
        ys.dedup();

        let mut best: Option<(f64, Point2<f64>)> = None;
        for pair in ys.windows(2) {
            let y = 0.5 * (pair[0] + pair[1]);
            let mut xs: Vec<f64> = Vec::new();
            for ring in &rings {
                let n = ring.len();
                for i in 0..n {
                    let p = ring[i];
                    let q = ring[(i + 1) % n];
                    if (p.y > y) != (q.y > y) {
                        xs.push(p.x + (y - p.y) * (q.x - p.x) / (q.y - p.y));
                    }
                }
            }
            xs.sort_by(f64::total_cmp);
            for span in xs.chunks_exact(2) {
                let width = span[1] - span[0];
                if width > 0.0 && best.map_or(true, |(w, _)| width > w) {
                    best = Some((width, Point2::new(0.5 * (span[0] + span[1]), y)));
                }
            }
        }
        best.map(|(_, p)| p)
    }
}

/// Builds the polygons of the arrangement induced by a set of 2D segments.
pub trait ArrangementBuilder {
    /// Compute the bounded regions of the arrangement.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be processed (non-finite
    /// coordinates).
    fn build(&self, segments: &[Segment2]) -> GeomResult<Vec<ArrangementPolygon>>;
}

/// Default arrangement builder.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanarArrangement {
    /// Points closer than this are welded; also the crossing tolerance.
    pub tolerance: f64,
}

impl Default for PlanarArrangement {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}

impl PlanarArrangement {
    /// Create a builder with a custom weld tolerance.
    #[must_use]
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl ArrangementBuilder for PlanarArrangement {
    fn build(&self, segments: &[Segment2]) -> GeomResult<Vec<ArrangementPolygon>> {
        for (i, s) in segments.iter().enumerate() {
            if !(s.a.x.is_finite() && s.a.y.is_finite() && s.b.x.is_finite() && s.b.y.is_finite())
            {
                return Err(GeomError::NonFiniteCoordinate {
                    context: format!("arrangement segment {i}"),
                });
            }
        }

        let segments: Vec<Segment2> = segments
            .iter()
            .copied()
            .filter(|s| s.length() > self.tolerance)
            .collect();
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let graph = PlanarGraph::from_segments(&segments, self.tolerance);
        let polygons = graph.faces();
        debug!(
            "Arrangement of {} segments: {} vertices, {} edges, {} polygons",
            segments.len(),
            graph.points.len(),
            graph.edge_count(),
            polygons.len()
        );
        Ok(polygons)
    }
}

/// Signed area of a closed ring (positive when counter-clockwise).
#[must_use]
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let p = ring[i];
            let q = ring[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    0.5 * twice
}

/// Even-odd point-in-polygon test.
#[must_use]
pub fn point_in_ring(p: &Point2<f64>, ring: &[Point2<f64>]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = ring[i];
        let vj = ring[j];
        if (vi.y > p.y) != (vj.y > p.y)
            && p.x < (vj.x - vi.x) * (p.y - vi.y) / (vj.y - vi.y) + vi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Welded, pruned planar graph with angularly sorted adjacency.
struct PlanarGraph {
    points: Vec<Point2<f64>>,
    /// Neighbours of each vertex, counter-clockwise by angle.
    adjacency: Vec<Vec<usize>>,
}

impl PlanarGraph {
    fn from_segments(segments: &[Segment2], tolerance: f64) -> Self {
        // Parameters along each segment where it must be cut
        let mut cuts: Vec<Vec<Point2<f64>>> = segments.iter().map(|s| vec![s.a, s.b]).collect();
        for crossing in find_intersections(segments, tolerance) {
            cuts[crossing.first].push(crossing.point);
            cuts[crossing.second].push(crossing.point);
        }

        let multiplier = 1.0 / tolerance;
        let mut keys: HashMap<Key2, usize> = HashMap::new();
        let mut points: Vec<Point2<f64>> = Vec::new();
        let mut vertex_of = |p: Point2<f64>| -> usize {
            *keys.entry(hash_point2(&p, multiplier)).or_insert_with(|| {
                points.push(p);
                points.len() - 1
            })
        };

        let mut edges: hashbrown::HashSet<(usize, usize)> = hashbrown::HashSet::new();
        for (segment, mut along) in segments.iter().zip(cuts) {
            let d = segment.direction();
            along.sort_by(|p, q| (p - segment.a).dot(&d).total_cmp(&(q - segment.a).dot(&d)));
            let ids: Vec<usize> = along.into_iter().map(&mut vertex_of).collect();
            for w in ids.windows(2) {
                if w[0] != w[1] {
                    edges.insert((w[0].min(w[1]), w[0].max(w[1])));
                }
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); points.len()];
        for &(u, v) in &edges {
            adjacency[u].push(v);
            adjacency[v].push(u);
        }

        // Dangling edges bound no region
        let mut stack: Vec<usize> = (0..points.len()).filter(|&v| adjacency[v].len() == 1).collect();
        while let Some(v) = stack.pop() {
            if adjacency[v].len() != 1 {
                continue;
            }
            let u = adjacency[v][0];
            adjacency[v].clear();
            adjacency[u].retain(|&w| w != v);
            if adjacency[u].len() == 1 {
                stack.push(u);
            }
        }

        for (v, neighbours) in adjacency.iter_mut().enumerate() {
            let origin = points[v];
            neighbours.sort_by(|&a, &b| {
                let da = points[a] - origin;
                let db = points[b] - origin;
                da.y.atan2(da.x).total_cmp(&db.y.atan2(db.x))
            });
        }

        Self { points, adjacency }
    }

    fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Half-edge following `u -> v` with the face kept on the left.
    fn next(&self, u: usize, v: usize) -> Option<usize> {
        let around = &self.adjacency[v];
        let idx = around.iter().position(|&w| w == u)?;
        Some(around[(idx + around.len() - 1) % around.len()])
    }

    fn faces(&self) -> Vec<ArrangementPolygon> {
        let mut visited: hashbrown::HashSet<(usize, usize)> = hashbrown::HashSet::new();
        let mut bounded: Vec<Vec<usize>> = Vec::new();
        let mut outer: Vec<Vec<usize>> = Vec::new();

        for u in 0..self.points.len() {
            for &v in &self.adjacency[u] {
                if visited.contains(&(u, v)) {
                    continue;
                }
                let mut cycle = Vec::new();
                let (mut a, mut b) = (u, v);
                while visited.insert((a, b)) {
                    cycle.push(a);
                    match self.next(a, b) {
                        Some(c) => (a, b) = (b, c),
                        None => break,
                    }
                }
                let ring = self.ring(&cycle);
                if signed_area(&ring) > 0.0 {
                    bounded.push(cycle);
                } else {
                    outer.push(cycle);
                }
            }
        }

        let component = self.components();
        let rings: Vec<Vec<Point2<f64>>> = bounded.iter().map(|c| self.ring(c)).collect();
        let areas: Vec<f64> = rings.iter().map(|r| signed_area(r)).collect();
        let mut holes: Vec<Vec<Vec<Point2<f64>>>> = vec![Vec::new(); bounded.len()];

        for cycle in &outer {
            let Some(&probe) = cycle.first() else {
                continue;
            };
            let probe_point = self.points[probe];
            let host = bounded
                .iter()
                .enumerate()
                .filter(|(_, face)| face.first().map(|&f| component[f]) != Some(component[probe]))
                .filter(|(i, _)| point_in_ring(&probe_point, &rings[*i]))
                .min_by(|(i, _), (j, _)| areas[*i].total_cmp(&areas[*j]))
                .map(|(i, _)| i);
            // Components not enclosed by another border the unbounded face
            if let Some(host) = host {
                holes[host].push(self.ring(cycle));
            }
        }

        rings
            .into_iter()
            .zip(holes)
            .map(|(contour, holes)| ArrangementPolygon::new(contour, holes))
            .collect()
    }

    fn ring(&self, cycle: &[usize]) -> Vec<Point2<f64>> {
        cycle.iter().map(|&i| self.points[i]).collect()
    }

    fn components(&self) -> Vec<usize> {
        let mut component = vec![usize::MAX; self.points.len()];
        let mut next_id = 0;
        for start in 0..self.points.len() {
            if component[start] != usize::MAX {
                continue;
            }
            let mut stack = vec![start];
            component[start] = next_id;
            while let Some(v) = stack.pop() {
                for &w in &self.adjacency[v] {
                    if component[w] == usize::MAX {
                        component[w] = next_id;
                        stack.push(w);
                    }
                }
            }
            next_id += 1;
        }
        component
    }
}
