//! Vertex singularities decided from the incident edges in 3D.

use hashbrown::HashSet;
use nalgebra::Point3;
use tracing::{debug, error};
use viewmap_geom::predicates::{same_side, DEFAULT_EPSILON};

use crate::adapter::MeshAdapter;
use crate::graph::{EdgeNature, MeshId, Singularity, VertexId, ViewGraph};
use crate::halfedge::{FaceId, HalfEdgeId, MeshVertexId};
use crate::info::SingularityInfo;

/// Classify every vertex of `graph`.
pub(crate) fn find_3d_singularities(
    meshes: &[MeshAdapter],
    graph: &mut ViewGraph,
    eye: &Point3<f64>,
) -> SingularityInfo {
    let mut info = SingularityInfo::default();

    for index in 0..graph.vertex_count() {
        let id = VertexId(index);
        let singularity = classify_vertex(meshes, graph, id, eye, &mut info);
        match singularity {
            Singularity::Bifurcation => info.bifurcations += 1,
            Singularity::MeshIntersection => info.mesh_intersections += 1,
            Singularity::CurtainFold => info.curtain_folds += 1,
            Singularity::ImageIntersection | Singularity::None => {}
        }
        graph.vertex_mut(id).singularity = singularity;
    }

    debug!(
        bifurcations = info.bifurcations,
        mesh_intersections = info.mesh_intersections,
        curtain_folds = info.curtain_folds,
        "3D singularities found"
    );
    info
}

fn classify_vertex(
    meshes: &[MeshAdapter],
    graph: &ViewGraph,
    id: VertexId,
    eye: &Point3<f64>,
    info: &mut SingularityInfo,
) -> Singularity {
    let vertex = graph.vertex(id);
    let natures: HashSet<EdgeNature> = vertex.edges.iter().map(|e| graph.edge(*e).nature).collect();

    if natures.is_empty() {
        error!(vertex = id.0, "View vertex has no incident edge nature");
        info.missing_natures += 1;
        return Singularity::None;
    }

    if natures.len() == 1 {
        let only = natures.iter().next().copied();
        if vertex.edges.len() > 2
            && matches!(only, Some(EdgeNature::Silhouette | EdgeNature::Boundary))
        {
            return Singularity::Bifurcation;
        }
    } else if natures.iter().any(|n| n.indicates_visibility()) {
        return Singularity::MeshIntersection;
    }

    let (mut concave, mut convex) = (false, false);
    for e in &vertex.edges {
        let edge = graph.edge(*e);
        if edge.nature == EdgeNature::Silhouette && edge.faces.len() == 2 {
            if edge.concave {
                concave = true;
            } else {
                convex = true;
            }
        }
    }
    if concave && convex {
        return Singularity::CurtainFold;
    }

    if natures.contains(&EdgeNature::Boundary)
        && vertex
            .mesh_vertices
            .iter()
            .any(|&(mesh, v)| boundary_folds(meshes, mesh, v, eye))
    {
        return Singularity::CurtainFold;
    }

    Singularity::None
}

/// Whether a face around `v` hides the boundary leaving `v` that reaches
/// farthest from the camera.
fn boundary_folds(meshes: &[MeshAdapter], mesh: MeshId, v: MeshVertexId, eye: &Point3<f64>) -> bool {
    let Some(adapter) = meshes.get(mesh.0) else {
        return false;
    };
    let he = adapter.halfedge();
    let p = he.position(v);

    let boundary = he.vertex(v).halfedges.iter().copied().filter(|h| {
        let half = he.halfedge(*h);
        half.is_boundary() || he.halfedge(half.twin).is_boundary()
    });
    let Some(farthest) = boundary.max_by(|a, b| {
        let da = (he.position(he.destination(*a)) - eye).norm_squared();
        let db = (he.position(he.destination(*b)) - eye).norm_squared();
        da.total_cmp(&db)
    }) else {
        return false;
    };

    let Some(boundary_face) = face_side(adapter, farthest) else {
        error!(
            mesh = adapter.name(),
            halfedge = farthest.0,
            "Boundary half-edge has no twin face"
        );
        return false;
    };
    let e = he.position(he.destination(farthest));

    he.faces_around(v)
        .filter(|f| *f != boundary_face)
        .any(|f| {
            let corners = he.face_vertices(f);
            let mut others = corners.iter().filter(|c| **c != v).map(|c| he.position(*c));
            let (Some(q), Some(r)) = (others.next(), others.next()) else {
                return false;
            };
            !same_side(&p, &q, &r, eye, &e, DEFAULT_EPSILON)
                && same_side(eye, &p, &q, &e, &r, DEFAULT_EPSILON)
                && same_side(eye, &p, &r, &e, &q, DEFAULT_EPSILON)
        })
}

fn face_side(adapter: &MeshAdapter, h: HalfEdgeId) -> Option<FaceId> {
    let he = adapter.halfedge();
    let half = he.halfedge(h);
    half.face.or_else(|| he.halfedge(half.twin).face)
}
