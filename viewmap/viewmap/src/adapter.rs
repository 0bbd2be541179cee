//! Mesh adapter: the working copy of a source mesh used during a build.
//!
//! An adapter owns three derived structures over the same triangles:
//!
//! - a working position buffer (morph-resolved, mesh-local)
//! - a BVH over the working buffer (mesh-local)
//! - half-edge connectivity with world-space positions
//!
//! The BVH and the connectivity must be refreshed together after the working
//! geometry changes. Each structure records the geometry generation it was
//! built from so that stages can detect an out-of-sync adapter.

use nalgebra::{Matrix4, Point3, Vector3};
use tracing::{debug, warn};
use viewmap_geom::intersect::ray_triangle;
use viewmap_geom::Bvh;

use crate::config::AdapterOptions;
use crate::error::{ViewmapError, ViewmapResult};
use crate::halfedge::HalfEdgeMesh;
use crate::scene::{Color, SharedMaterial, Side, SourceMesh};

/// A ray hit on an adapter's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// World-space distance from the ray origin.
    pub distance: f64,
    /// World-space hit point.
    pub point: Point3<f64>,
    /// Source triangle index.
    pub triangle: usize,
}

/// Working copy of a [`SourceMesh`].
#[derive(Debug, Clone)]
pub struct MeshAdapter {
    source: SourceMesh,
    options: AdapterOptions,
    positions: Vec<Point3<f64>>,
    world_inverse: Matrix4<f64>,
    bvh: Bvh,
    halfedge: HalfEdgeMesh,
    geometry_generation: u64,
    bvh_generation: u64,
    connectivity_generation: u64,
}

impl MeshAdapter {
    /// Create an adapter with default options and build every structure.
    ///
    /// # Errors
    ///
    /// Returns an error if a face references a missing vertex or the morph
    /// resolver returns the wrong number of positions.
    pub fn new(source: SourceMesh) -> ViewmapResult<Self> {
        Self::with_options(source, AdapterOptions::default())
    }

    /// Create an adapter with custom options and build every structure.
    ///
    /// # Errors
    ///
    /// See [`MeshAdapter::new`].
    pub fn with_options(source: SourceMesh, options: AdapterOptions) -> ViewmapResult<Self> {
        for (face, tri) in source.faces.iter().enumerate() {
            if let Some(&vertex) = tri.iter().find(|&&i| i as usize >= source.positions.len()) {
                return Err(ViewmapError::InvalidFaceIndex {
                    mesh: source.name.clone(),
                    face,
                    vertex,
                });
            }
        }

        let mut adapter = Self {
            positions: source.positions.clone(),
            world_inverse: Matrix4::identity(),
            source,
            options,
            bvh: Bvh::default(),
            halfedge: HalfEdgeMesh::default(),
            geometry_generation: 0,
            bvh_generation: 0,
            connectivity_generation: 0,
        };
        adapter.refresh_geometry()?;
        adapter.refresh_bvh(true);
        adapter.refresh_connectivity(false)?;
        adapter.apply_world_transform();
        Ok(adapter)
    }

    /// Re-resolve the working positions from the source (morph targets,
    /// skinning).
    ///
    /// # Errors
    ///
    /// Returns [`ViewmapError::MorphMismatch`] if the resolver output does
    /// not match the source vertex count; the previous buffer is kept.
    pub fn refresh_geometry(&mut self) -> ViewmapResult<()> {
        let resolved = match &self.source.morph {
            Some(morph) => {
                let resolved = morph.resolve(&self.source.positions);
                if resolved.len() != self.source.positions.len() {
                    return Err(ViewmapError::MorphMismatch {
                        mesh: self.source.name.clone(),
                        expected: self.source.positions.len(),
                        got: resolved.len(),
                    });
                }
                resolved
            }
            None => self.source.positions.clone(),
        };
        self.positions = resolved;
        self.geometry_generation += 1;
        Ok(())
    }

    /// Rebuild or refit the BVH over the working positions.
    ///
    /// A refit keeps the tree topology; it falls back to a rebuild when the
    /// triangle count changed.
    pub fn refresh_bvh(&mut self, rebuild: bool) {
        if rebuild || self.bvh.triangle_count() != self.source.faces.len() {
            self.bvh = Bvh::build(&self.positions, &self.source.faces, self.options.bvh_leaf_size);
        } else {
            self.bvh.refit(&self.positions, &self.source.faces);
        }
        self.bvh_generation = self.geometry_generation;
    }

    /// Rebuild the half-edge structure from the working positions.
    ///
    /// With `refresh_geometry` set, the working positions are re-resolved
    /// first. The structure is always rebuilt, never patched; world
    /// positions equal local ones until [`MeshAdapter::apply_world_transform`].
    ///
    /// # Errors
    ///
    /// Propagates [`MeshAdapter::refresh_geometry`] errors.
    pub fn refresh_connectivity(&mut self, refresh_geometry: bool) -> ViewmapResult<()> {
        if refresh_geometry {
            self.refresh_geometry()?;
        }
        self.halfedge = HalfEdgeMesh::from_triangles(
            &self.positions,
            &self.source.faces,
            self.options.weld_tolerance,
        );
        self.connectivity_generation = self.geometry_generation;
        debug!(
            "Connectivity for '{}': {} vertices, {} faces, {} edges",
            self.source.name,
            self.halfedge.vertices().len(),
            self.halfedge.faces().len(),
            self.halfedge.edge_count()
        );
        Ok(())
    }

    /// Move half-edge positions into world space using the source's world
    /// matrix.
    pub fn apply_world_transform(&mut self) {
        self.halfedge.apply_transform(&self.source.world);
        self.world_inverse = self.source.world.try_inverse().unwrap_or_else(|| {
            warn!("World matrix of '{}' is not invertible", self.source.name);
            Matrix4::identity()
        });
    }

    /// Whether the BVH and connectivity were built from the current working
    /// geometry.
    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        self.bvh_generation == self.geometry_generation
            && self.connectivity_generation == self.geometry_generation
    }

    /// Log a warning when the adapter is out of sync; returns the sync state.
    pub(crate) fn check_sync(&self, stage: &str) -> bool {
        let ok = self.is_in_sync();
        if !ok {
            warn!(
                "Mesh '{}' is out of sync in {}: geometry {}, bvh {}, connectivity {}",
                self.source.name,
                stage,
                self.geometry_generation,
                self.bvh_generation,
                self.connectivity_generation
            );
        }
        ok
    }

    /// Mesh name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// The source mesh.
    #[must_use]
    pub fn source(&self) -> &SourceMesh {
        &self.source
    }

    /// Mutable access to the source mesh. Refresh the adapter afterwards.
    pub fn source_mut(&mut self) -> &mut SourceMesh {
        &mut self.source
    }

    /// Working positions (mesh-local).
    #[must_use]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Source triangles.
    #[must_use]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.source.faces
    }

    /// The BVH (mesh-local).
    #[must_use]
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// The half-edge structure (world positions).
    #[must_use]
    pub fn halfedge(&self) -> &HalfEdgeMesh {
        &self.halfedge
    }

    /// Local-to-world matrix.
    #[must_use]
    pub fn world(&self) -> &Matrix4<f64> {
        &self.source.world
    }

    /// Working triangle corners in mesh-local space.
    #[must_use]
    pub fn local_triangle(&self, triangle: usize) -> Option<[Point3<f64>; 3]> {
        let face = self.source.faces.get(triangle)?;
        Some([
            *self.positions.get(face[0] as usize)?,
            *self.positions.get(face[1] as usize)?,
            *self.positions.get(face[2] as usize)?,
        ])
    }

    /// Material used by a triangle.
    #[must_use]
    pub fn material_for_face(&self, triangle: usize) -> Option<&SharedMaterial> {
        self.source.material_for_face(triangle)
    }

    /// Color of the material used by a triangle, if it has one.
    #[must_use]
    pub fn color_for_face(&self, triangle: usize) -> Option<Color> {
        let material = self.material_for_face(triangle)?;
        let guard = material.read().ok()?;
        guard.color
    }

    fn side_for_face(&self, triangle: usize) -> Side {
        self.material_for_face(triangle)
            .and_then(|m| m.read().ok().map(|m| m.side))
            .unwrap_or_default()
    }

    /// Every hit along a world-space ray, nearest first.
    ///
    /// Hits are limited to `max_distance` and honour each material's side.
    #[must_use]
    pub fn raycast(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
    ) -> Vec<SurfaceHit> {
        let Some(direction) = direction.try_normalize(f64::MIN_POSITIVE) else {
            return Vec::new();
        };

        // The local ray keeps the world parameterisation: point = o + t * d
        let local_origin = self.world_inverse.transform_point(origin);
        let local_direction = self.world_inverse.transform_vector(&direction);

        let mut hits: Vec<SurfaceHit> = self
            .bvh
            .query_ray(&local_origin, &local_direction, max_distance)
            .into_iter()
            .filter_map(|t| {
                let triangle = t as usize;
                let corners = self.local_triangle(triangle)?;
                let culling = self.side_for_face(triangle).culling();
                let hit = ray_triangle(&local_origin, &local_direction, &corners, culling, 1e-12)?;
                (hit.t <= max_distance).then(|| SurfaceHit {
                    distance: hit.t,
                    point: origin + direction * hit.t,
                    triangle,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::scene::{Material, MaterialGroup, MorphResolver};
    use nalgebra::Translation3;
    use std::sync::Arc;

    fn unit_square() -> SourceMesh {
        let positions = vec![
            Point3::new(-0.5, -0.5, 0.0),
            Point3::new(0.5, -0.5, 0.0),
            Point3::new(0.5, 0.5, 0.0),
            Point3::new(-0.5, 0.5, 0.0),
        ];
        SourceMesh::new("square", positions, vec![[0, 1, 2], [0, 2, 3]])
            .with_material(Material::new("front", Color(0x00ff00)).shared())
    }

    struct Lift(f64);

    impl MorphResolver for Lift {
        fn resolve(&self, rest: &[Point3<f64>]) -> Vec<Point3<f64>> {
            rest.iter().map(|p| p + Vector3::z() * self.0).collect()
        }
    }

    struct Truncate;

    impl MorphResolver for Truncate {
        fn resolve(&self, rest: &[Point3<f64>]) -> Vec<Point3<f64>> {
            rest[..1].to_vec()
        }
    }

    #[test]
    fn test_invalid_face_index() {
        let mesh = SourceMesh::new("bad", vec![Point3::origin()], vec![[0, 1, 2]]);
        let err = MeshAdapter::new(mesh).unwrap_err();
        assert!(matches!(err, ViewmapError::InvalidFaceIndex { face: 0, vertex: 1, .. }));
    }

    #[test]
    fn test_raycast_respects_side() {
        let adapter = MeshAdapter::new(unit_square()).unwrap();

        let hits = adapter.raycast(&Point3::new(0.2, -0.1, 5.0), &-Vector3::z(), f64::INFINITY);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 5.0).abs() < 1e-9);

        let from_behind = adapter.raycast(&Point3::new(0.2, -0.1, -5.0), &Vector3::z(), f64::INFINITY);
        assert!(from_behind.is_empty());

        adapter.material_for_face(0).unwrap().write().unwrap().side = Side::Double;
        let from_behind = adapter.raycast(&Point3::new(0.2, -0.1, -5.0), &Vector3::z(), f64::INFINITY);
        assert_eq!(from_behind.len(), 1);
    }

    #[test]
    fn test_raycast_world_transform() {
        let mesh = unit_square().with_world(Translation3::new(0.0, 0.0, -2.0).to_homogeneous());
        let adapter = MeshAdapter::new(mesh).unwrap();

        let hits = adapter.raycast(&Point3::new(0.0, 0.2, 5.0), &-Vector3::z(), f64::INFINITY);
        assert_eq!(hits.len(), 1);
        assert!((hits[0].distance - 7.0).abs() < 1e-9);
        assert!((hits[0].point.z + 2.0).abs() < 1e-9);

        let short = adapter.raycast(&Point3::new(0.0, 0.2, 5.0), &-Vector3::z(), 6.0);
        assert!(short.is_empty());

        let v = adapter.halfedge().vertices()[0].position;
        assert!((v.z + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_morph_refresh_and_sync() {
        let mut adapter = MeshAdapter::new(unit_square().with_morph(Arc::new(Lift(1.0)))).unwrap();
        assert!(adapter.is_in_sync());
        assert!((adapter.positions()[0].z - 1.0).abs() < 1e-12);

        adapter.refresh_geometry().unwrap();
        assert!(!adapter.is_in_sync());

        adapter.refresh_bvh(false);
        adapter.refresh_connectivity(false).unwrap();
        assert!(adapter.is_in_sync());
    }

    #[test]
    fn test_morph_mismatch() {
        let result = MeshAdapter::new(unit_square().with_morph(Arc::new(Truncate)));
        assert!(matches!(
            result,
            Err(ViewmapError::MorphMismatch {
                expected: 4,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_color_for_face_groups() {
        let mesh = unit_square()
            .with_material(Material::new("second", Color(0x0000ff)).shared())
            .with_groups(vec![
                MaterialGroup {
                    start: 0,
                    count: 1,
                    material_index: 0,
                },
                MaterialGroup {
                    start: 1,
                    count: 1,
                    material_index: 1,
                },
            ]);
        let adapter = MeshAdapter::new(mesh).unwrap();
        assert_eq!(adapter.color_for_face(0), Some(Color(0x00ff00)));
        assert_eq!(adapter.color_for_face(1), Some(Color(0x0000ff)));
        assert_eq!(adapter.color_for_face(2), None);
    }
}
