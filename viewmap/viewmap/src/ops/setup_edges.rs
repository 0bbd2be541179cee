//! Edge classification: one view edge per undirected mesh edge that has a
//! nature.

use tracing::debug;
use viewmap_geom::predicates::{front_side, DEFAULT_EPSILON};

use crate::adapter::MeshAdapter;
use crate::camera::Projector;
use crate::config::ViewmapOptions;
use crate::graph::{EdgeNature, FaceRef, MeshId, VertexId, ViewEdge, ViewGraph};
use crate::halfedge::{FaceId, HalfEdgeId, HalfEdgeMesh, MeshVertexId};
use crate::info::SetupInfo;

/// Classify every undirected edge of every mesh and add the kept ones to
/// `graph`.
pub(crate) fn setup_edges(
    meshes: &[MeshAdapter],
    graph: &mut ViewGraph,
    projector: &Projector,
    options: &ViewmapOptions,
) -> SetupInfo {
    let mut info = SetupInfo::default();
    let eye = projector.camera_position();

    for (index, adapter) in meshes.iter().enumerate() {
        adapter.check_sync("setup edges");
        let mesh = MeshId(index);
        let he = adapter.halfedge();
        let mut handled = vec![false; he.halfedges().len()];

        for start in 0..he.halfedges().len() {
            if handled[start] {
                continue;
            }
            let twin = he.halfedge(HalfEdgeId(start)).twin;
            handled[start] = true;
            handled[twin.0] = true;

            // Prefer the half-edge that owns a face
            let primary = if he.halfedge(HalfEdgeId(start)).face.is_some() {
                HalfEdgeId(start)
            } else {
                twin
            };
            let h = *he.halfedge(primary);
            let Some(face_a) = h.face else {
                continue;
            };
            info.mesh_edges += 1;
            let face_b = he.halfedge(h.twin).face;

            let Some(mut edge) = classify(adapter, he, primary, face_a, face_b, &eye, options) else {
                info.dropped += 1;
                continue;
            };

            let a = mesh_vertex(graph, projector, he, mesh, h.origin);
            let b = mesh_vertex(graph, projector, he, mesh, he.destination(primary));
            edge.a = a;
            edge.b = b;
            edge.meshes.push(mesh);
            edge.faces.push(FaceRef { mesh, face: face_a });
            if let Some(face_b) = face_b {
                edge.faces.push(FaceRef { mesh, face: face_b });
            }
            edge.halfedge = Some((mesh, primary));
            graph.add_edge(edge);
            info.view_edges += 1;
        }
    }

    debug!(
        mesh_edges = info.mesh_edges,
        view_edges = info.view_edges,
        dropped = info.dropped,
        "Edges set up"
    );
    info
}

fn classify(
    adapter: &MeshAdapter,
    he: &HalfEdgeMesh,
    primary: HalfEdgeId,
    face_a: FaceId,
    face_b: Option<FaceId>,
    eye: &nalgebra::Point3<f64>,
    options: &ViewmapOptions,
) -> Option<ViewEdge> {
    let placeholder = VertexId(0);

    // Boundaries have one face and never carry the back flag
    let Some(face_b) = face_b else {
        return Some(ViewEdge::new(placeholder, placeholder, EdgeNature::Boundary));
    };

    let front_a = he.is_front_facing(face_a, eye);

    let front_b = he.is_front_facing(face_b, eye);
    let cos = he.face_normal(face_a).dot(&he.face_normal(face_b)).clamp(-1.0, 1.0);
    let face_angle = cos.acos().to_degrees();

    let h = he.halfedge(primary);
    let opposite_a = he.position(he.halfedge(h.prev).origin);
    let opposite_b = he.position(he.halfedge(he.halfedge(h.twin).prev).origin);
    let concave = front_side(
        &opposite_a,
        &he.position(h.origin),
        &he.position(he.halfedge(h.next).origin),
        &opposite_b,
        DEFAULT_EPSILON,
    );

    let nature = if front_a != front_b {
        EdgeNature::Silhouette
    } else if options.crease_angle.contains(face_angle) {
        EdgeNature::Crease
    } else if options.material_edges
        && adapter.color_for_face(he.face(face_a).triangle)
            != adapter.color_for_face(he.face(face_b).triangle)
    {
        EdgeNature::Material
    } else {
        return None;
    };

    Some(ViewEdge {
        face_angle,
        concave,
        back: !front_a && !front_b,
        ..ViewEdge::new(placeholder, placeholder, nature)
    })
}

fn mesh_vertex(
    graph: &mut ViewGraph,
    projector: &Projector,
    he: &HalfEdgeMesh,
    mesh: MeshId,
    v: MeshVertexId,
) -> VertexId {
    let id = graph.vertex_at(he.position(v), projector);
    let mapped = &mut graph.vertex_mut(id).mesh_vertices;
    if !mapped.contains(&(mesh, v)) {
        mapped.push((mesh, v));
    }
    id
}
