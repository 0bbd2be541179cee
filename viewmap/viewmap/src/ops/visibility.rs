//! Chain visibility by ray sampling.

use std::sync::{Arc, PoisonError};

use nalgebra::Point3;
use tracing::{debug, error};

use crate::adapter::MeshAdapter;
use crate::camera::Projector;
use crate::chain::{Chain, ChainVisibility};
use crate::graph::ViewGraph;
use crate::info::VisibilityInfo;
use crate::scene::{SharedMaterial, Side};

/// Forces every material of a set of meshes to [`Side::Double`] until
/// dropped, then restores the previous sides.
///
/// Each material is changed once even when several meshes share it.
pub struct DoubleSidedGuard {
    saved: Vec<(SharedMaterial, Side)>,
}

impl DoubleSidedGuard {
    /// Make every material of `meshes` double-sided.
    #[must_use]
    pub fn new(meshes: &[MeshAdapter]) -> Self {
        let mut saved: Vec<(SharedMaterial, Side)> = Vec::new();
        for material in meshes.iter().flat_map(|m| m.source().materials.iter()) {
            if saved.iter().any(|(m, _)| Arc::ptr_eq(m, material)) {
                continue;
            }
            let mut guard = material.write().unwrap_or_else(PoisonError::into_inner);
            saved.push((Arc::clone(material), guard.side));
            guard.side = Side::Double;
        }
        Self { saved }
    }

    /// Number of distinct materials changed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.len()
    }

    /// Whether no material was changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl Drop for DoubleSidedGuard {
    fn drop(&mut self) {
        for (material, side) in &self.saved {
            material.write().unwrap_or_else(PoisonError::into_inner).side = *side;
        }
    }
}

/// Classify every chain as visible or hidden.
///
/// A ray is cast from the midpoint of each chain's middle edge towards the
/// camera; the chain is visible when the summed hit distance stays below
/// `tolerance`. With `ignore` set, every chain is visible and no ray is cast.
pub(crate) fn compute_chains_visibility(
    meshes: &[MeshAdapter],
    graph: &mut ViewGraph,
    chains: &mut [Chain],
    projector: &Projector,
    tolerance: f64,
    ignore: bool,
) -> VisibilityInfo {
    let mut info = VisibilityInfo::default();
    let eye = projector.camera_position();

    if ignore {
        for chain in chains.iter_mut() {
            chain.visibility = ChainVisibility::Visible;
        }
    } else {
        let _double_sided = DoubleSidedGuard::new(meshes);
        for chain in chains.iter_mut() {
            info.tests += 1;
            let Some(middle) = chain.middle_edge() else {
                error!(chain = chain.id, "Chain has no edge");
                chain.visibility = ChainVisibility::Visible;
                continue;
            };
            let edge = graph.edge(middle);
            chain.raycast_point = Some(nalgebra::center(
                &graph.vertex(edge.a).pos2d,
                &graph.vertex(edge.b).pos2d,
            ));
            let origin = graph.edge_midpoint(middle);
            chain.visibility = visibility_towards(meshes, &origin, &eye, tolerance, &mut info);
        }
    }

    for vertex in graph.vertices_mut() {
        vertex.visible = false;
    }
    for chain in chains.iter() {
        if chain.visibility == ChainVisibility::Visible {
            for v in &chain.vertices {
                graph.vertex_mut(*v).visible = true;
            }
            info.visible += 1;
        } else {
            info.hidden += 1;
        }
    }

    debug!(
        tests = info.tests,
        raycasts = info.raycasts,
        visible = info.visible,
        hidden = info.hidden,
        "Chain visibility computed"
    );
    info
}

fn visibility_towards(
    meshes: &[MeshAdapter],
    origin: &Point3<f64>,
    eye: &Point3<f64>,
    tolerance: f64,
    info: &mut VisibilityInfo,
) -> ChainVisibility {
    let direction = eye - origin;
    let distance = direction.norm();
    if distance <= f64::EPSILON {
        return ChainVisibility::Visible;
    }

    let mut total = 0.0;
    for adapter in meshes {
        info.raycasts += 1;
        total += adapter
            .raycast(origin, &direction, distance)
            .iter()
            .map(|hit| hit.distance)
            .sum::<f64>();
    }

    if total < tolerance {
        ChainVisibility::Visible
    } else {
        ChainVisibility::Hidden
    }
}

/// Classify a chain from edge flags alone: hidden as soon as one edge is
/// concave or lies between back faces, visible otherwise.
///
/// Cheaper than ray casting but blind to occlusion by other surfaces. The
/// build pipeline does not use it.
#[must_use]
pub fn chain_visibility_from_geometry(chain: &Chain, graph: &ViewGraph) -> ChainVisibility {
    let hidden = chain.edges.iter().any(|e| {
        let edge = graph.edge(*e);
        edge.concave || edge.back
    });
    if hidden {
        ChainVisibility::Hidden
    } else {
        ChainVisibility::Visible
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::camera::{PerspectiveCamera, RenderSize};
    use crate::graph::{EdgeNature, MeshId, ViewEdge};
    use crate::primitives::cube;
    use crate::scene::{Color, Material};
    use nalgebra::Translation3;

    fn projector() -> Projector {
        Projector::new(
            &PerspectiveCamera::new(Point3::new(0.0, 0.0, 10.0), Point3::origin()),
            RenderSize::default(),
        )
    }

    fn single_edge_chain(graph: &mut ViewGraph, a: Point3<f64>, b: Point3<f64>) -> Chain {
        let proj = projector();
        let a = graph.vertex_at(a, &proj);
        let b = graph.vertex_at(b, &proj);
        let e = graph.add_edge(ViewEdge::new(a, b, EdgeNature::Silhouette));
        Chain::new(0, MeshId(0), e, graph)
    }

    fn occluder() -> Vec<MeshAdapter> {
        // A cube between the origin and the camera
        let mesh = cube("occluder", 1.0)
            .with_world(Translation3::new(0.0, 0.0, 3.0).to_homogeneous())
            .with_material(Material::new("m", Color(0xff0000)).shared());
        vec![MeshAdapter::new(mesh).unwrap()]
    }

    #[test]
    fn test_occluded_chain_is_hidden() {
        let meshes = occluder();
        let mut graph = ViewGraph::new();
        let mut chains = vec![single_edge_chain(
            &mut graph,
            Point3::new(-0.1, 0.13, 0.0),
            Point3::new(0.1, 0.13, 0.0),
        )];
        let info =
            compute_chains_visibility(&meshes, &mut graph, &mut chains, &projector(), 1e-5, false);
        assert_eq!(chains[0].visibility, ChainVisibility::Hidden);
        assert_eq!(info.hidden, 1);
        assert_eq!(info.raycasts, 1);
        assert!(chains[0].raycast_point.is_some());
        assert!(!graph.vertex(chains[0].head()).visible);
    }

    #[test]
    fn test_clear_chain_is_visible_and_deterministic() {
        let meshes = occluder();
        let mut graph = ViewGraph::new();
        let mut chains = vec![single_edge_chain(
            &mut graph,
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.2, 0.0, 0.0),
        )];
        let proj = projector();
        compute_chains_visibility(&meshes, &mut graph, &mut chains, &proj, 1e-5, false);
        let first = chains[0].visibility;
        compute_chains_visibility(&meshes, &mut graph, &mut chains, &proj, 1e-5, false);
        assert_eq!(first, ChainVisibility::Visible);
        assert_eq!(chains[0].visibility, first);
        assert!(graph.vertex(chains[0].tail()).visible);
    }

    #[test]
    fn test_ignore_visibility_casts_nothing() {
        let meshes = occluder();
        let mut graph = ViewGraph::new();
        let mut chains = vec![single_edge_chain(
            &mut graph,
            Point3::new(-0.1, 0.13, 0.0),
            Point3::new(0.1, 0.13, 0.0),
        )];
        let info =
            compute_chains_visibility(&meshes, &mut graph, &mut chains, &projector(), 1e-5, true);
        assert_eq!(chains[0].visibility, ChainVisibility::Visible);
        assert_eq!(info.raycasts, 0);
    }

    #[test]
    fn test_guard_restores_sides() {
        let shared = Material::new("shared", Color(0x00ff00))
            .with_side(Side::Back)
            .shared();
        let meshes = vec![
            MeshAdapter::new(cube("a", 1.0).with_material(Arc::clone(&shared))).unwrap(),
            MeshAdapter::new(cube("b", 1.0).with_material(Arc::clone(&shared))).unwrap(),
        ];
        {
            let guard = DoubleSidedGuard::new(&meshes);
            assert_eq!(guard.len(), 1);
            assert_eq!(shared.read().unwrap().side, Side::Double);
        }
        assert_eq!(shared.read().unwrap().side, Side::Back);
    }

    #[test]
    fn test_guard_restores_sides_on_panic() {
        let shared = Material::new("shared", Color(0x00ff00)).shared();
        let meshes = vec![MeshAdapter::new(cube("a", 1.0).with_material(Arc::clone(&shared))).unwrap()];

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = DoubleSidedGuard::new(&meshes);
            assert_eq!(shared.read().unwrap().side, Side::Double);
            panic!("stage failed while materials were double-sided");
        }));

        assert!(result.is_err());
        assert_eq!(shared.read().unwrap().side, Side::Front);
    }

    #[test]
    fn test_geometry_heuristic() {
        let mut graph = ViewGraph::new();
        let chain = single_edge_chain(&mut graph, Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        assert_eq!(chain_visibility_from_geometry(&chain, &graph), ChainVisibility::Visible);

        let proj = projector();
        let a = graph.vertex_at(Point3::new(0.0, 1.0, 0.0), &proj);
        let b = graph.vertex_at(Point3::new(1.0, 1.0, 0.0), &proj);
        let mut edge = ViewEdge::new(a, b, EdgeNature::Crease);
        edge.back = true;
        let e = graph.add_edge(edge);
        let back_chain = Chain::new(1, MeshId(0), e, &graph);
        assert_eq!(chain_visibility_from_geometry(&back_chain, &graph), ChainVisibility::Hidden);
    }
}
