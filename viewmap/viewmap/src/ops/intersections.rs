//! Mesh/mesh intersection curves.
//!
//! Every unordered pair of meshes is tested with the BVH pair query. Each
//! crossing segment splits the view edges already lying on the two faces and
//! is then inserted as a run of `MeshIntersection` edges.

use std::time::Instant;

use hashbrown::HashSet;
use nalgebra::Point3;
use smallvec::smallvec;
use tracing::{debug, error, warn};
use viewmap_geom::intersect::triangle_intersection;
use viewmap_geom::predicates::{intersect_lines, points3_match, LineMode, DEFAULT_EPSILON};

use crate::adapter::MeshAdapter;
use crate::camera::Projector;
use crate::graph::{EdgeId, EdgeNature, FaceRef, MeshId, VertexId, ViewEdge, ViewGraph};
use crate::info::{IntersectionInfo, IntersectionPairInfo};

/// Tolerance for an intersection segment crossing an existing edge.
const CROSSING_TOLERANCE: f64 = 1e-9;

/// Find where meshes cross each other and add the crossing curves to
/// `graph`.
pub(crate) fn compute_mesh_intersections(
    meshes: &[MeshAdapter],
    graph: &mut ViewGraph,
    projector: &Projector,
) -> IntersectionInfo {
    let mut info = IntersectionInfo::default();

    for i in 0..meshes.len() {
        for j in (i + 1)..meshes.len() {
            let pair = intersect_pair(meshes, MeshId(i), MeshId(j), graph, projector, &mut info);
            info.mesh_pairs_tested += 1;
            info.pairs.push(pair);
        }
    }

    debug!(
        pairs = info.mesh_pairs_tested,
        intersections = info.intersections(),
        edges_added = info.edges_added,
        failed_splits = info.failed_splits,
        "Mesh intersections computed"
    );
    info
}

fn intersect_pair(
    meshes: &[MeshAdapter],
    id_a: MeshId,
    id_b: MeshId,
    graph: &mut ViewGraph,
    projector: &Projector,
    info: &mut IntersectionInfo,
) -> IntersectionPairInfo {
    let start = Instant::now();
    let (a, b) = (&meshes[id_a.0], &meshes[id_b.0]);
    let mut pair = IntersectionPairInfo {
        name: format!("{} ∩ {}", a.name(), b.name()),
        tests: 0,
        intersections: 0,
        time: start.elapsed(),
    };

    a.check_sync("mesh intersections");
    b.check_sync("mesh intersections");

    let Some(a_inverse) = a.world().try_inverse() else {
        warn!(mesh = a.name(), "World matrix not invertible, skipping intersections");
        return pair;
    };
    let b_to_a = a_inverse * b.world();

    for (ta, tb) in a.bvh().query_pairs(b.bvh(), &b_to_a, DEFAULT_EPSILON) {
        pair.tests += 1;
        let (ta, tb) = (ta as usize, tb as usize);
        let (Some(tri_a), Some(tri_b)) = (a.local_triangle(ta), b.local_triangle(tb)) else {
            continue;
        };
        let tri_b = tri_b.map(|p| b_to_a.transform_point(&p));

        let points = triangle_intersection(&tri_a, &tri_b, DEFAULT_EPSILON);
        if points.len() < 2 {
            continue;
        }
        pair.intersections += 1;

        let (Some(face_a), Some(face_b)) = (
            a.halfedge().face_for_triangle(ta),
            b.halfedge().face_for_triangle(tb),
        ) else {
            error!(
                pair = %pair.name,
                triangle_a = ta,
                triangle_b = tb,
                "Intersecting triangle has no face, skipping segment"
            );
            info.missing_faces += 1;
            continue;
        };
        let faces = [
            FaceRef {
                mesh: id_a,
                face: face_a,
            },
            FaceRef {
                mesh: id_b,
                face: face_b,
            },
        ];

        let world: Vec<Point3<f64>> = points.iter().map(|p| a.world().transform_point(p)).collect();
        if world.len() == 2 {
            add_segment(graph, projector, &world[0], &world[1], id_a, id_b, &faces, info);
        } else {
            // Coplanar overlap: approximate by its outline
            for k in 0..world.len() {
                let next = (k + 1) % world.len();
                add_segment(graph, projector, &world[k], &world[next], id_a, id_b, &faces, info);
            }
        }
    }

    pair.time = start.elapsed();
    pair
}

#[allow(clippy::too_many_arguments)]
fn add_segment(
    graph: &mut ViewGraph,
    projector: &Projector,
    p: &Point3<f64>,
    q: &Point3<f64>,
    mesh_a: MeshId,
    mesh_b: MeshId,
    faces: &[FaceRef; 2],
    info: &mut IntersectionInfo,
) {
    let direction = q - p;
    if direction.norm() <= DEFAULT_EPSILON {
        return;
    }

    let mut vertices = vec![graph.vertex_at(*p, projector), graph.vertex_at(*q, projector)];

    let mut candidates: Vec<EdgeId> = faces
        .iter()
        .flat_map(|f| graph.edges_on_face(f).iter().copied())
        .collect();
    candidates.sort_unstable();
    candidates.dedup();

    for edge in candidates {
        let e = graph.edge(edge);
        let (ea, eb) = (graph.vertex(e.a).pos3d, graph.vertex(e.b).pos3d);
        let Some(mut hit) = intersect_lines((&ea, &eb), (p, q), LineMode::Segment, CROSSING_TOLERANCE)
        else {
            continue;
        };
        if points3_match(&hit, p, CROSSING_TOLERANCE) {
            hit = *p;
        } else if points3_match(&hit, q, CROSSING_TOLERANCE) {
            hit = *q;
        }

        match graph.split_edge_3d(edge, &hit, projector) {
            Some(split) => vertices.push(split.vertex),
            None => {
                error!(edge = edge.0, point = ?hit, "Intersection but split failed");
                info.failed_splits += 1;
            }
        }
    }

    let mut seen = HashSet::with_capacity(vertices.len());
    vertices.retain(|v| seen.insert(*v));
    let along = |v: &VertexId| (graph.vertex(*v).pos3d - p).dot(&direction);
    vertices.sort_by(|u, v| along(u).total_cmp(&along(v)));

    for w in vertices.windows(2) {
        let edge = ViewEdge {
            meshes: smallvec![mesh_a, mesh_b],
            faces: smallvec![faces[0], faces[1]],
            ..ViewEdge::new(w[0], w[1], EdgeNature::MeshIntersection)
        };
        graph.add_edge(edge);
        info.edges_added += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::camera::{PerspectiveCamera, RenderSize};
    use crate::config::ViewmapOptions;
    use crate::ops::setup_edges::setup_edges;
    use crate::primitives::{cube, uv_sphere};
    use nalgebra::{Translation3, Vector3};

    fn projector() -> Projector {
        Projector::new(
            &PerspectiveCamera::new(Point3::new(2.0, 3.0, 6.0), Point3::origin()),
            RenderSize::default(),
        )
    }

    fn box_distance(p: &Point3<f64>, center: &Point3<f64>, half: f64) -> f64 {
        let d = (p - center).abs() - Vector3::repeat(half);
        d.map(|x| x.max(0.0)).norm() + d.max().min(0.0)
    }

    #[test]
    fn test_separate_meshes_do_not_intersect() {
        let meshes = vec![
            MeshAdapter::new(uv_sphere("a", Point3::new(-2.0, 0.0, 0.0), 1.0, 12, 8)).unwrap(),
            MeshAdapter::new(uv_sphere("b", Point3::new(2.0, 0.0, 0.0), 1.0, 12, 8)).unwrap(),
        ];
        let mut graph = ViewGraph::new();
        let info = compute_mesh_intersections(&meshes, &mut graph, &projector());
        assert_eq!(info.mesh_pairs_tested, 1);
        assert_eq!(info.pairs[0].name, "a ∩ b");
        assert_eq!(info.intersections(), 0);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_crossing_cubes_lie_on_both_surfaces() {
        let offset = Point3::new(0.3, 0.4, 0.35);
        let meshes = vec![
            MeshAdapter::new(cube("a", 1.0)).unwrap(),
            MeshAdapter::new(
                cube("b", 1.0).with_world(Translation3::from(offset.coords).to_homogeneous()),
            )
            .unwrap(),
        ];
        let proj = projector();
        let mut graph = ViewGraph::new();
        setup_edges(&meshes, &mut graph, &proj, &ViewmapOptions::default());
        let before = graph.edge_count();

        let info = compute_mesh_intersections(&meshes, &mut graph, &proj);
        assert!(info.intersections() > 0);
        assert!(info.edges_added > 0);
        assert!(graph.edge_count() >= before + info.edges_added);

        for edge in graph.edges().iter().filter(|e| e.nature == EdgeNature::MeshIntersection) {
            assert_eq!(edge.meshes.as_slice(), &[MeshId(0), MeshId(1)]);
            for v in [edge.a, edge.b] {
                let p = graph.vertex(v).pos3d;
                assert!(box_distance(&p, &Point3::origin(), 0.5).abs() < 1e-6);
                assert!(box_distance(&p, &offset, 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_segment_splits_existing_edge() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let face = FaceRef {
            mesh: MeshId(0),
            face: crate::halfedge::FaceId(0),
        };
        let a = graph.vertex_at(Point3::new(-1.0, 0.0, 0.0), &proj);
        let b = graph.vertex_at(Point3::new(1.0, 0.0, 0.0), &proj);
        let mut existing = ViewEdge::new(a, b, EdgeNature::Crease);
        existing.faces.push(face);
        graph.add_edge(existing);

        let other = FaceRef {
            mesh: MeshId(1),
            face: crate::halfedge::FaceId(0),
        };
        let mut info = IntersectionInfo::default();
        add_segment(
            &mut graph,
            &proj,
            &Point3::new(0.0, -1.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            MeshId(0),
            MeshId(1),
            &[face, other],
            &mut info,
        );

        // The crease is cut in two and the segment becomes two edges
        assert_eq!(info.edges_added, 2);
        assert_eq!(info.failed_splits, 0);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.vertex_count(), 5);
    }

    #[test]
    fn test_segment_through_shared_vertex_adds_each_vertex_once() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let face = FaceRef {
            mesh: MeshId(0),
            face: crate::halfedge::FaceId(0),
        };
        let left = graph.vertex_at(Point3::new(-1.0, 0.0, 0.0), &proj);
        let middle = graph.vertex_at(Point3::origin(), &proj);
        let right = graph.vertex_at(Point3::new(1.0, 0.0, 0.0), &proj);
        for (a, b) in [(left, middle), (middle, right)] {
            let mut existing = ViewEdge::new(a, b, EdgeNature::Crease);
            existing.faces.push(face);
            graph.add_edge(existing);
        }

        let other = FaceRef {
            mesh: MeshId(1),
            face: crate::halfedge::FaceId(0),
        };
        let mut info = IntersectionInfo::default();
        add_segment(
            &mut graph,
            &proj,
            &Point3::new(0.0, -1.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
            MeshId(0),
            MeshId(1),
            &[face, other],
            &mut info,
        );

        // Both creases end at the crossing, so nothing is split
        assert_eq!(info.failed_splits, 0);
        assert_eq!(info.edges_added, 2);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.vertex_count(), 5);
        let added: Vec<_> = graph
            .edges()
            .iter()
            .filter(|e| e.nature == EdgeNature::MeshIntersection)
            .collect();
        assert!(added.iter().all(|e| e.a != e.b && e.has_vertex(middle)));
    }
}
