//! The view graph: deduplicated view vertices and the view edges between
//! them.
//!
//! Vertices, edges and per-face edge lists live in index arenas. A vertex is
//! identified by the quantized key of its 3D position, so two points are
//! the same vertex exactly when their keys match.

use hashbrown::HashMap;
use nalgebra::{Point2, Point3};
use smallvec::SmallVec;
use viewmap_geom::predicates::{
    hash_point2, hash_point3, points2_match, points3_match, Key2, Key3, DEFAULT_EPSILON,
    DEFAULT_HASH_MULTIPLIER,
};

use crate::camera::Projector;
use crate::halfedge::{FaceId, HalfEdgeId, MeshVertexId};

/// Perpendicular distance under which a 3D point counts as lying on an edge.
pub const COLLINEAR_TOLERANCE_3D: f64 = 1e-8;

/// Perpendicular distance (pixels) under which a 2D point counts as lying
/// on an edge.
pub const COLLINEAR_TOLERANCE_2D: f64 = 1e-6;

/// Index of a view vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexId(pub usize);

/// Index of a view edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub usize);

/// Index of a mesh adapter in a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshId(pub usize);

/// A face of a specific mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceRef {
    /// Owning mesh.
    pub mesh: MeshId,
    /// Face in that mesh's half-edge structure.
    pub face: FaceId,
}

/// Geometric cause of a view edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeNature {
    /// Separates a front-facing from a back-facing face.
    Silhouette,
    /// Borders a single face.
    Boundary,
    /// Lies where two meshes cross.
    MeshIntersection,
    /// Dihedral angle within the crease range.
    Crease,
    /// Separates faces of different materials.
    Material,
}

impl EdgeNature {
    /// Natures whose edges can change what is visible behind them.
    #[must_use]
    pub fn indicates_visibility(self) -> bool {
        matches!(self, Self::Silhouette | Self::Boundary | Self::MeshIntersection)
    }
}

/// Topological irregularity of a view vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Singularity {
    /// Regular vertex.
    #[default]
    None,
    /// Two contours cross in the image; this is the farther one.
    ImageIntersection,
    /// Contours of different natures meet where meshes intersect.
    MeshIntersection,
    /// A contour folds behind the surface.
    CurtainFold,
    /// More than two contours of one nature meet.
    Bifurcation,
}

/// A deduplicated contour point.
#[derive(Debug, Clone)]
pub struct ViewVertex {
    /// World position.
    pub pos3d: Point3<f64>,
    /// Image position.
    pub pos2d: Point2<f64>,
    /// Key of `pos3d`.
    pub hash3d: Key3,
    /// Key of `pos2d`.
    pub hash2d: Key2,
    /// Mesh vertices mapped to this point.
    pub mesh_vertices: SmallVec<[(MeshId, MeshVertexId); 2]>,
    /// Singularity classification.
    pub singularity: Singularity,
    /// Whether the vertex lies on a visible chain.
    pub visible: bool,
    /// Incident edges.
    pub edges: SmallVec<[EdgeId; 4]>,
}

/// A contour segment between two view vertices.
#[derive(Debug, Clone)]
pub struct ViewEdge {
    /// First endpoint.
    pub a: VertexId,
    /// Second endpoint.
    pub b: VertexId,
    /// Classification.
    pub nature: EdgeNature,
    /// Dihedral angle between the adjacent faces, in degrees.
    pub face_angle: f64,
    /// Whether the surface folds inward along this edge.
    pub concave: bool,
    /// Whether both adjacent faces are back-facing; always false on a
    /// boundary edge.
    pub back: bool,
    /// Meshes owning the edge.
    pub meshes: SmallVec<[MeshId; 2]>,
    /// Adjacent faces.
    pub faces: SmallVec<[FaceRef; 2]>,
    /// Originating half-edge, for edges created from mesh connectivity.
    pub halfedge: Option<(MeshId, HalfEdgeId)>,
}

impl ViewEdge {
    /// Create an edge with no faces, meshes or flags.
    #[must_use]
    pub fn new(a: VertexId, b: VertexId, nature: EdgeNature) -> Self {
        Self {
            a,
            b,
            nature,
            face_angle: 0.0,
            concave: false,
            back: false,
            meshes: SmallVec::new(),
            faces: SmallVec::new(),
            halfedge: None,
        }
    }

    /// The endpoint opposite `v`, if `v` is an endpoint.
    #[must_use]
    pub fn other_vertex(&self, v: VertexId) -> Option<VertexId> {
        if v == self.a {
            Some(self.b)
        } else if v == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    /// Whether `v` is an endpoint.
    #[must_use]
    pub fn has_vertex(&self, v: VertexId) -> bool {
        self.a == v || self.b == v
    }

    /// Whether the two edges share an endpoint.
    #[must_use]
    pub fn is_connected_to(&self, other: &Self) -> bool {
        self.has_vertex(other.a) || self.has_vertex(other.b)
    }
}

/// Outcome of splitting an edge at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    /// Vertex at the split point.
    pub vertex: VertexId,
    /// Edge created by the split; `None` when the point was an endpoint.
    pub new_edge: Option<EdgeId>,
}

/// Arena of view vertices and edges.
#[derive(Debug, Clone, Default)]
pub struct ViewGraph {
    vertices: Vec<ViewVertex>,
    edges: Vec<ViewEdge>,
    vertex_map: HashMap<Key3, VertexId>,
    face_edges: HashMap<FaceRef, SmallVec<[EdgeId; 4]>>,
}

impl ViewGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every vertex and edge.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.vertex_map.clear();
        self.face_edges.clear();
    }

    /// The vertex at `pos3d`, created (and projected) if missing.
    pub fn vertex_at(&mut self, pos3d: Point3<f64>, projector: &Projector) -> VertexId {
        let key = hash_point3(&pos3d, DEFAULT_HASH_MULTIPLIER);
        if let Some(&id) = self.vertex_map.get(&key) {
            return id;
        }
        let pos2d = projector.project(&pos3d);
        let id = VertexId(self.vertices.len());
        self.vertices.push(ViewVertex {
            pos3d,
            pos2d,
            hash3d: key,
            hash2d: hash_point2(&pos2d, DEFAULT_HASH_MULTIPLIER),
            mesh_vertices: SmallVec::new(),
            singularity: Singularity::None,
            visible: true,
            edges: SmallVec::new(),
        });
        self.vertex_map.insert(key, id);
        id
    }

    /// Insert an edge and register it on its endpoints and faces.
    pub fn add_edge(&mut self, edge: ViewEdge) -> EdgeId {
        let id = EdgeId(self.edges.len());
        self.vertices[edge.a.0].edges.push(id);
        if edge.b != edge.a {
            self.vertices[edge.b.0].edges.push(id);
        }
        for face in &edge.faces {
            self.face_edges.entry(*face).or_default().push(id);
        }
        self.edges.push(edge);
        id
    }

    /// Split `edge` at vertex `v`: `edge` now ends at `v` and a copy runs
    /// from `v` to the former end. Returns the copy.
    pub fn split_edge_with_vertex(&mut self, edge: EdgeId, v: VertexId) -> EdgeId {
        let old_b = self.edges[edge.0].b;
        let mut tail = self.edges[edge.0].clone();
        tail.a = v;
        tail.b = old_b;
        self.edges[edge.0].b = v;

        let new_id = EdgeId(self.edges.len());
        for face in &tail.faces {
            self.face_edges.entry(*face).or_default().push(new_id);
        }
        self.edges.push(tail);

        for e in &mut self.vertices[old_b.0].edges {
            if *e == edge {
                *e = new_id;
            }
        }
        let incident = &mut self.vertices[v.0].edges;
        for id in [edge, new_id] {
            if !incident.contains(&id) {
                incident.push(id);
            }
        }
        new_id
    }

    /// Split `edge` at a 3D point believed to lie on it.
    ///
    /// Returns the matching endpoint without a new edge when the point is an
    /// endpoint, and `None` when the point is off the segment.
    pub fn split_edge_3d(
        &mut self,
        edge: EdgeId,
        point: &Point3<f64>,
        projector: &Projector,
    ) -> Option<Split> {
        let (ia, ib) = (self.edges[edge.0].a, self.edges[edge.0].b);
        let a = self.vertices[ia.0].pos3d;
        let b = self.vertices[ib.0].pos3d;

        if points3_match(point, &a, DEFAULT_EPSILON) {
            return Some(Split { vertex: ia, new_edge: None });
        }
        if points3_match(point, &b, DEFAULT_EPSILON) {
            return Some(Split { vertex: ib, new_edge: None });
        }

        let u = point - a;
        let v = b - a;
        let len = v.norm();
        if len == 0.0
            || u.cross(&v).norm() / len > COLLINEAR_TOLERANCE_3D
            || u.dot(&v) < -DEFAULT_EPSILON
            || u.norm() > len
        {
            return None;
        }

        let vertex = self.vertex_at(*point, projector);
        Some(self.finish_split(edge, vertex))
    }

    /// Split `edge` at an image point believed to lie on it.
    ///
    /// The 3D position is interpolated along the edge and the resulting
    /// vertex's image position is forced to exactly `point`.
    pub fn split_edge_2d(
        &mut self,
        edge: EdgeId,
        point: &Point2<f64>,
        projector: &Projector,
    ) -> Option<Split> {
        let (ia, ib) = (self.edges[edge.0].a, self.edges[edge.0].b);
        let (a2, b2) = (self.vertices[ia.0].pos2d, self.vertices[ib.0].pos2d);

        if points2_match(point, &a2, DEFAULT_EPSILON) {
            return Some(Split { vertex: ia, new_edge: None });
        }
        if points2_match(point, &b2, DEFAULT_EPSILON) {
            return Some(Split { vertex: ib, new_edge: None });
        }

        let u = point - a2;
        let v = b2 - a2;
        let len = v.norm();
        if len == 0.0
            || (u.x * v.y - u.y * v.x).abs() / len > COLLINEAR_TOLERANCE_2D
            || u.dot(&v) < -DEFAULT_EPSILON
            || u.norm() > len
        {
            return None;
        }

        let (a3, b3) = (self.vertices[ia.0].pos3d, self.vertices[ib.0].pos3d);
        let pos3d = a3 + (b3 - a3) * (u.norm() / len);
        let vertex = self.vertex_at(pos3d, projector);

        let forced = &mut self.vertices[vertex.0];
        forced.pos2d = *point;
        forced.hash2d = hash_point2(point, DEFAULT_HASH_MULTIPLIER);

        Some(self.finish_split(edge, vertex))
    }

    fn finish_split(&mut self, edge: EdgeId, vertex: VertexId) -> Split {
        let e = &self.edges[edge.0];
        if e.has_vertex(vertex) {
            return Split { vertex, new_edge: None };
        }
        let new_edge = self.split_edge_with_vertex(edge, vertex);
        Split {
            vertex,
            new_edge: Some(new_edge),
        }
    }

    /// All vertices.
    #[must_use]
    pub fn vertices(&self) -> &[ViewVertex] {
        &self.vertices
    }

    /// All edges.
    #[must_use]
    pub fn edges(&self) -> &[ViewEdge] {
        &self.edges
    }

    /// A vertex by id.
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> &ViewVertex {
        &self.vertices[id.0]
    }

    /// A mutable vertex by id.
    pub fn vertex_mut(&mut self, id: VertexId) -> &mut ViewVertex {
        &mut self.vertices[id.0]
    }

    /// An edge by id.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> &ViewEdge {
        &self.edges[id.0]
    }

    /// Vertex lookup by key.
    #[must_use]
    pub fn vertex_map(&self) -> &HashMap<Key3, VertexId> {
        &self.vertex_map
    }

    /// Edges lying on a face.
    #[must_use]
    pub fn edges_on_face(&self, face: &FaceRef) -> &[EdgeId] {
        self.face_edges.get(face).map_or(&[], |edges| edges.as_slice())
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// World-space length of an edge.
    #[must_use]
    pub fn edge_length(&self, id: EdgeId) -> f64 {
        let e = &self.edges[id.0];
        (self.vertices[e.b.0].pos3d - self.vertices[e.a.0].pos3d).norm()
    }

    /// World-space midpoint of an edge.
    #[must_use]
    pub fn edge_midpoint(&self, id: EdgeId) -> Point3<f64> {
        let e = &self.edges[id.0];
        nalgebra::center(&self.vertices[e.a.0].pos3d, &self.vertices[e.b.0].pos3d)
    }

    pub(crate) fn vertices_mut(&mut self) -> &mut [ViewVertex] {
        &mut self.vertices
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::camera::{PerspectiveCamera, RenderSize};

    fn projector() -> Projector {
        Projector::new(
            &PerspectiveCamera::new(Point3::new(0.0, 0.0, 10.0), Point3::origin()),
            RenderSize::new(500.0, 500.0),
        )
    }

    fn face(f: usize) -> FaceRef {
        FaceRef {
            mesh: MeshId(0),
            face: FaceId(f),
        }
    }

    fn line(graph: &mut ViewGraph, proj: &Projector) -> EdgeId {
        let a = graph.vertex_at(Point3::new(-1.0, 0.0, 0.0), proj);
        let b = graph.vertex_at(Point3::new(1.0, 0.0, 0.0), proj);
        let mut edge = ViewEdge::new(a, b, EdgeNature::Crease);
        edge.faces.push(face(0));
        edge.faces.push(face(1));
        edge.meshes.push(MeshId(0));
        graph.add_edge(edge)
    }

    #[test]
    fn test_vertex_dedup_by_key() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let a = graph.vertex_at(Point3::new(0.1, 0.2, 0.3), &proj);
        let b = graph.vertex_at(Point3::new(0.1 + 1e-15, 0.2, 0.3), &proj);
        let c = graph.vertex_at(Point3::new(0.1 + 1e-6, 0.2, 0.3), &proj);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.vertex_count(), 2);
    }

    #[test]
    fn test_split_at_endpoint_creates_nothing() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let e = line(&mut graph, &proj);
        let a = graph.edge(e).a;

        let split = graph.split_edge_3d(e, &Point3::new(-1.0, 0.0, 0.0), &proj).unwrap();
        assert_eq!(split.vertex, a);
        assert!(split.new_edge.is_none());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_split_interior_preserves_length() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let e = line(&mut graph, &proj);
        let before = graph.edge_length(e);

        let split = graph.split_edge_3d(e, &Point3::new(0.25, 0.0, 0.0), &proj).unwrap();
        let tail = split.new_edge.unwrap();
        let after = graph.edge_length(e) + graph.edge_length(tail);
        assert!((before - after).abs() < 1e-12);

        // Nature and faces are copied, both halves are registered everywhere
        assert_eq!(graph.edge(tail).nature, EdgeNature::Crease);
        assert_eq!(graph.edges_on_face(&face(0)), &[e, tail]);
        assert_eq!(graph.edges_on_face(&face(1)), &[e, tail]);
        let mid = graph.vertex(split.vertex);
        assert!(mid.edges.contains(&e) && mid.edges.contains(&tail));
        let far = graph.edge(tail).b;
        assert!(graph.vertex(far).edges.contains(&tail));
        assert!(!graph.vertex(far).edges.contains(&e));
    }

    #[test]
    fn test_split_rejects_off_segment_points() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let e = line(&mut graph, &proj);

        assert!(graph.split_edge_3d(e, &Point3::new(0.0, 0.1, 0.0), &proj).is_none());
        assert!(graph.split_edge_3d(e, &Point3::new(1.5, 0.0, 0.0), &proj).is_none());
        assert!(graph.split_edge_3d(e, &Point3::new(-1.5, 0.0, 0.0), &proj).is_none());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_split_2d_forces_image_position() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let e = line(&mut graph, &proj);
        let a2 = graph.vertex(graph.edge(e).a).pos2d;
        let b2 = graph.vertex(graph.edge(e).b).pos2d;
        let target = nalgebra::center(&a2, &b2);

        let split = graph.split_edge_2d(e, &target, &proj).unwrap();
        let v = graph.vertex(split.vertex);
        assert_eq!(v.pos2d, target);
        assert!(v.pos3d.x.abs() < 1e-9);
        assert!(split.new_edge.is_some());
    }

    #[test]
    fn test_repeated_split_composes() {
        let proj = projector();
        let mut graph = ViewGraph::new();
        let e = line(&mut graph, &proj);

        let first = graph.split_edge_3d(e, &Point3::new(0.5, 0.0, 0.0), &proj).unwrap();
        // 0.75 now lies on the tail, not on the shortened edge
        assert!(graph.split_edge_3d(e, &Point3::new(0.75, 0.0, 0.0), &proj).is_none());
        let tail = first.new_edge.unwrap();
        assert!(graph.split_edge_3d(tail, &Point3::new(0.75, 0.0, 0.0), &proj).is_some());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_edge_helpers() {
        let e1 = ViewEdge::new(VertexId(0), VertexId(1), EdgeNature::Boundary);
        let e2 = ViewEdge::new(VertexId(1), VertexId(2), EdgeNature::Boundary);
        let e3 = ViewEdge::new(VertexId(3), VertexId(4), EdgeNature::Boundary);
        assert_eq!(e1.other_vertex(VertexId(0)), Some(VertexId(1)));
        assert_eq!(e1.other_vertex(VertexId(7)), None);
        assert!(e1.is_connected_to(&e2));
        assert!(!e1.is_connected_to(&e3));
        assert!(EdgeNature::MeshIntersection.indicates_visibility());
        assert!(!EdgeNature::Crease.indicates_visibility());
    }
}
