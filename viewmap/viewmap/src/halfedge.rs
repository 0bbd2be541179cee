//! Half-edge connectivity over a welded triangle soup.
//!
//! # Structure
//!
//! - Coincident input positions (within the weld tolerance) share one vertex
//! - Each face owns three half-edges linked by `next` and `prev`
//! - Every half-edge has a twin; edges used by a single face get a boundary
//!   twin whose `face` is `None`
//! - Each vertex lists all of its outgoing half-edges, which keeps
//!   non-manifold fans reachable
//!
//! Vertex positions are stored twice: the welded local position and the
//! world position produced by [`HalfEdgeMesh::apply_transform`].

use hashbrown::HashMap;
use nalgebra::{Matrix4, Point3, Vector3};
use smallvec::SmallVec;
use viewmap_geom::predicates::{hash_point3, Key3};

/// Index of a vertex in a [`HalfEdgeMesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshVertexId(pub usize);

/// Index of a half-edge in a [`HalfEdgeMesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HalfEdgeId(pub usize);

/// Index of a face in a [`HalfEdgeMesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaceId(pub usize);

/// A welded vertex.
#[derive(Debug, Clone)]
pub struct MeshVertex {
    /// World-space position.
    pub position: Point3<f64>,
    /// Local-space position.
    pub local: Point3<f64>,
    /// Outgoing half-edges.
    pub halfedges: SmallVec<[HalfEdgeId; 8]>,
}

/// A directed edge.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge {
    /// Origin vertex.
    pub origin: MeshVertexId,
    /// Opposite half-edge.
    pub twin: HalfEdgeId,
    /// Next half-edge around the face (or boundary loop).
    pub next: HalfEdgeId,
    /// Previous half-edge around the face (or boundary loop).
    pub prev: HalfEdgeId,
    /// Owning face; `None` on the boundary.
    pub face: Option<FaceId>,
}

impl HalfEdge {
    /// Whether this half-edge lies outside the surface.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.face.is_none()
    }
}

/// A triangle.
#[derive(Debug, Clone, Copy)]
pub struct Face {
    /// One of the three half-edges.
    pub halfedge: HalfEdgeId,
    /// Index of the source triangle.
    pub triangle: usize,
}

/// Half-edge mesh built from indexed triangles.
#[derive(Debug, Clone, Default)]
pub struct HalfEdgeMesh {
    vertices: Vec<MeshVertex>,
    halfedges: Vec<HalfEdge>,
    faces: Vec<Face>,
    face_for_triangle: Vec<Option<FaceId>>,
    vertex_for_position: Vec<MeshVertexId>,
}

impl HalfEdgeMesh {
    /// Build connectivity from positions and triangles.
    ///
    /// Triangles whose corners weld together or reference a missing position
    /// are skipped; [`HalfEdgeMesh::face_for_triangle`] returns `None` for
    /// them.
    #[must_use]
    pub fn from_triangles(positions: &[Point3<f64>], faces: &[[u32; 3]], weld_tolerance: f64) -> Self {
        let mut mesh = Self::default();

        let multiplier = 1.0 / weld_tolerance.max(f64::MIN_POSITIVE);
        let mut welded: HashMap<Key3, MeshVertexId> = HashMap::new();
        for p in positions {
            let id = *welded.entry(hash_point3(p, multiplier)).or_insert_with(|| {
                mesh.vertices.push(MeshVertex {
                    position: *p,
                    local: *p,
                    halfedges: SmallVec::new(),
                });
                MeshVertexId(mesh.vertices.len() - 1)
            });
            mesh.vertex_for_position.push(id);
        }

        let mut directed: HashMap<(MeshVertexId, MeshVertexId), SmallVec<[HalfEdgeId; 2]>> =
            HashMap::new();
        mesh.face_for_triangle = vec![None; faces.len()];

        for (triangle, face) in faces.iter().enumerate() {
            let Some(corners) = face
                .iter()
                .map(|&i| mesh.vertex_for_position.get(i as usize).copied())
                .collect::<Option<SmallVec<[MeshVertexId; 3]>>>()
            else {
                continue;
            };
            let [a, b, c] = [corners[0], corners[1], corners[2]];
            if a == b || b == c || c == a {
                continue;
            }

            let face_id = FaceId(mesh.faces.len());
            let base = mesh.halfedges.len();
            for (k, (from, to)) in [(a, b), (b, c), (c, a)].into_iter().enumerate() {
                let id = HalfEdgeId(base + k);
                mesh.halfedges.push(HalfEdge {
                    origin: from,
                    twin: id,
                    next: HalfEdgeId(base + (k + 1) % 3),
                    prev: HalfEdgeId(base + (k + 2) % 3),
                    face: Some(face_id),
                });
                directed.entry((from, to)).or_default().push(id);
            }
            mesh.faces.push(Face {
                halfedge: HalfEdgeId(base),
                triangle,
            });
            mesh.face_for_triangle[triangle] = Some(face_id);
        }

        mesh.link_twins(&directed);
        mesh.link_boundary_loops();

        for (i, he) in mesh.halfedges.iter().enumerate() {
            mesh.vertices[he.origin.0].halfedges.push(HalfEdgeId(i));
        }
        mesh
    }

    fn link_twins(&mut self, directed: &HashMap<(MeshVertexId, MeshVertexId), SmallVec<[HalfEdgeId; 2]>>) {
        let face_halfedges = self.halfedges.len();
        let mut paired = vec![false; face_halfedges];

        for i in 0..face_halfedges {
            if paired[i] {
                continue;
            }
            let from = self.halfedges[i].origin;
            let to = self.halfedges[self.halfedges[i].next.0].origin;

            let partner = directed
                .get(&(to, from))
                .and_then(|candidates| candidates.iter().find(|h| !paired[h.0] && h.0 != i));

            match partner {
                Some(&j) => {
                    self.halfedges[i].twin = j;
                    self.halfedges[j.0].twin = HalfEdgeId(i);
                    paired[i] = true;
                    paired[j.0] = true;
                }
                None => {
                    let boundary = HalfEdgeId(self.halfedges.len());
                    self.halfedges.push(HalfEdge {
                        origin: to,
                        twin: HalfEdgeId(i),
                        next: boundary,
                        prev: boundary,
                        face: None,
                    });
                    self.halfedges[i].twin = boundary;
                    paired[i] = true;
                }
            }
        }
    }

    fn link_boundary_loops(&mut self) {
        let mut leaving: HashMap<MeshVertexId, SmallVec<[HalfEdgeId; 2]>> = HashMap::new();
        for (i, he) in self.halfedges.iter().enumerate() {
            if he.is_boundary() {
                leaving.entry(he.origin).or_default().push(HalfEdgeId(i));
            }
        }
        for i in 0..self.halfedges.len() {
            if !self.halfedges[i].is_boundary() {
                continue;
            }
            let end = self.destination(HalfEdgeId(i));
            if let Some(&next) = leaving.get(&end).and_then(|hs| hs.first()) {
                self.halfedges[i].next = next;
                self.halfedges[next.0].prev = HalfEdgeId(i);
            }
        }
    }

    /// Recompute world positions as `matrix * local`.
    pub fn apply_transform(&mut self, matrix: &Matrix4<f64>) {
        for v in &mut self.vertices {
            v.position = matrix.transform_point(&v.local);
        }
    }

    /// All vertices.
    #[must_use]
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    /// All half-edges, face half-edges first.
    #[must_use]
    pub fn halfedges(&self) -> &[HalfEdge] {
        &self.halfedges
    }

    /// All faces.
    #[must_use]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// A vertex by id.
    #[must_use]
    pub fn vertex(&self, id: MeshVertexId) -> &MeshVertex {
        &self.vertices[id.0]
    }

    /// A half-edge by id.
    #[must_use]
    pub fn halfedge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.halfedges[id.0]
    }

    /// A face by id.
    #[must_use]
    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }

    /// Face built from a source triangle.
    #[must_use]
    pub fn face_for_triangle(&self, triangle: usize) -> Option<FaceId> {
        self.face_for_triangle.get(triangle).copied().flatten()
    }

    /// Welded vertex of a source position.
    #[must_use]
    pub fn vertex_for_position(&self, index: usize) -> Option<MeshVertexId> {
        self.vertex_for_position.get(index).copied()
    }

    /// End vertex of a half-edge.
    #[must_use]
    pub fn destination(&self, id: HalfEdgeId) -> MeshVertexId {
        self.halfedges[self.halfedges[id.0].twin.0].origin
    }

    /// World position of a vertex.
    #[must_use]
    pub fn position(&self, id: MeshVertexId) -> Point3<f64> {
        self.vertices[id.0].position
    }

    /// Corners of a face in winding order.
    #[must_use]
    pub fn face_vertices(&self, id: FaceId) -> [MeshVertexId; 3] {
        let h = self.halfedges[self.faces[id.0].halfedge.0];
        let next = self.halfedges[h.next.0];
        let prev = self.halfedges[h.prev.0];
        [h.origin, next.origin, prev.origin]
    }

    /// World positions of a face's corners in winding order.
    #[must_use]
    pub fn face_positions(&self, id: FaceId) -> [Point3<f64>; 3] {
        self.face_vertices(id).map(|v| self.position(v))
    }

    /// Unit normal of a face (zero for a degenerate triangle).
    #[must_use]
    pub fn face_normal(&self, id: FaceId) -> Vector3<f64> {
        let [a, b, c] = self.face_positions(id);
        (b - a)
            .cross(&(c - a))
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Whether a face is seen from its front side from `eye`.
    #[must_use]
    pub fn is_front_facing(&self, id: FaceId, eye: &Point3<f64>) -> bool {
        let origin = self.position(self.halfedges[self.faces[id.0].halfedge.0].origin);
        let to_eye = (eye - origin)
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros);
        to_eye.dot(&self.face_normal(id)) >= 0.0
    }

    /// Faces around a vertex (one per outgoing face half-edge).
    pub fn faces_around(&self, id: MeshVertexId) -> impl Iterator<Item = FaceId> + '_ {
        self.vertices[id.0]
            .halfedges
            .iter()
            .filter_map(move |h| self.halfedges[h.0].face)
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.halfedges.len() / 2
    }
}
