//! The view-map orchestrator: runs the pipeline stages in order.
//!
//! A build is a sequence of named stages run one after the other on a single
//! thread. Control returns to the executor between stages, and only there:
//! a [`CancellationToken`] set while a stage runs takes effect when that
//! stage finishes, and every later stage is skipped.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use hashbrown::HashMap;
use tracing::{debug, error, info};
use viewmap_geom::{ArrangementBuilder, Key3, PlanarArrangement};

use crate::adapter::MeshAdapter;
use crate::camera::{PerspectiveCamera, Projector, RenderSize};
use crate::chain::{Chain, ChainVisibility};
use crate::config::ViewmapOptions;
use crate::error::{ViewmapError, ViewmapResult};
use crate::graph::{VertexId, ViewEdge, ViewGraph, ViewVertex};
use crate::info::{BuildInfo, StageTiming};
use crate::ops;
use crate::polygon::Polygon;

/// Shared flag that makes a running build skip its remaining stages.
///
/// Cloning shares the flag. A build never clears it; call
/// [`CancellationToken::reset`] before reusing a cancelled token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that remaining stages be skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Progress report sent before each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressInfo {
    /// Name of the stage about to run.
    pub current_step_name: String,
    /// One-based index of that stage.
    pub current_step: usize,
    /// Number of stages in this build.
    pub total_steps: usize,
}

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolve morph targets into the working buffers.
    UpdateGeometries,
    /// Refit the BVHs.
    UpdateBvh,
    /// Rebuild half-edge connectivity.
    UpdateHalfEdges,
    /// Move half-edge positions into world space.
    TransformHalfEdges,
    /// Classify mesh edges.
    SetupEdges,
    /// Add mesh/mesh intersection curves.
    MeshIntersections,
    /// Classify vertices from their incident edges.
    Singularities3d,
    /// Split image-space crossings.
    Singularities2d,
    /// Group edges into chains.
    Chains,
    /// Classify chains as visible or hidden.
    Visibility,
    /// Build regions from the visible chains.
    Polygons,
    /// Give regions a mesh and a color.
    Assignment,
}

impl Stage {
    /// Human-readable name, used in progress reports and build info.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::UpdateGeometries => "Update morphed geometries",
            Self::UpdateBvh => "Update BVH structures",
            Self::UpdateHalfEdges => "Update half-edge structures",
            Self::TransformHalfEdges => "Transform half-edge positions",
            Self::SetupEdges => "Setup edges",
            Self::MeshIntersections => "Find mesh intersections",
            Self::Singularities3d => "Find 3D singularities",
            Self::Singularities2d => "Find 2D singularities",
            Self::Chains => "Create chains",
            Self::Visibility => "Compute chain visibility",
            Self::Polygons => "Compute polygons",
            Self::Assignment => "Assign polygons",
        }
    }

    /// Stages of a build, in order.
    #[must_use]
    pub fn pipeline(update_meshes: bool) -> Vec<Self> {
        let mut stages = Vec::with_capacity(12);
        if update_meshes {
            stages.extend([
                Self::UpdateGeometries,
                Self::UpdateBvh,
                Self::UpdateHalfEdges,
                Self::TransformHalfEdges,
            ]);
        }
        stages.extend([
            Self::SetupEdges,
            Self::MeshIntersections,
            Self::Singularities3d,
            Self::Singularities2d,
            Self::Chains,
            Self::Visibility,
            Self::Polygons,
            Self::Assignment,
        ]);
        stages
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Contours, chains and regions extracted from a set of meshes for one
/// camera.
///
/// Not safe for overlapping builds: await one `build` before starting the
/// next.
///
/// # Example
///
/// ```
/// use nalgebra::Point3;
/// use viewmap::{primitives, MeshAdapter, PerspectiveCamera, RenderSize, Viewmap, ViewmapOptions};
///
/// let cube = MeshAdapter::new(primitives::cube("cube", 1.0))?;
/// let camera = PerspectiveCamera::new(Point3::new(0.0, 0.0, 5.0), Point3::origin());
///
/// let mut viewmap = Viewmap::new(ViewmapOptions::default().with_crease_angle(120.0, 150.0));
/// pollster::block_on(viewmap.build(vec![cube], &camera, RenderSize::new(400.0, 400.0)))?;
///
/// assert_eq!(viewmap.chains().len(), 1);
/// assert_eq!(viewmap.polygons().len(), 1);
/// # Ok::<(), viewmap::ViewmapError>(())
/// ```
pub struct Viewmap {
    meshes: Vec<MeshAdapter>,
    graph: ViewGraph,
    chains: Vec<Chain>,
    polygons: Vec<Polygon>,
    projector: Projector,
    options: ViewmapOptions,
    info: BuildInfo,
    cancel: CancellationToken,
    arrangement: Box<dyn ArrangementBuilder + Send + Sync>,
}

impl fmt::Debug for Viewmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewmap")
            .field("meshes", &self.meshes.len())
            .field("vertices", &self.graph.vertex_count())
            .field("edges", &self.graph.edge_count())
            .field("chains", &self.chains.len())
            .field("polygons", &self.polygons.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Viewmap {
    fn default() -> Self {
        Self::new(ViewmapOptions::default())
    }
}

impl Viewmap {
    /// Create an empty view map with the default arrangement builder.
    #[must_use]
    pub fn new(options: ViewmapOptions) -> Self {
        Self {
            meshes: Vec::new(),
            graph: ViewGraph::new(),
            chains: Vec::new(),
            polygons: Vec::new(),
            projector: Projector::default(),
            options,
            info: BuildInfo::default(),
            cancel: CancellationToken::new(),
            arrangement: Box::new(PlanarArrangement::default()),
        }
    }

    /// Use another arrangement builder for the polygon stage.
    #[must_use]
    pub fn with_arrangement_builder(
        mut self,
        builder: impl ArrangementBuilder + Send + Sync + 'static,
    ) -> Self {
        self.arrangement = Box::new(builder);
        self
    }

    /// Use a caller-owned cancellation token.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token that cancels this view map's builds.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Build options.
    #[must_use]
    pub fn options(&self) -> &ViewmapOptions {
        &self.options
    }

    /// Mutable build options, applied from the next build.
    pub fn options_mut(&mut self) -> &mut ViewmapOptions {
        &mut self.options
    }

    /// Run every stage for `meshes` seen by `camera`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewmapError::InvalidRenderSize`] before running any stage.
    /// Errors inside stages are logged and counted in
    /// [`BuildInfo::stage_failures`], never returned.
    pub async fn build(
        &mut self,
        meshes: Vec<MeshAdapter>,
        camera: &PerspectiveCamera,
        size: RenderSize,
    ) -> ViewmapResult<()> {
        self.build_with_progress(meshes, camera, size, |_| {}).await
    }

    /// Like [`Viewmap::build`], calling `progress` before each stage.
    ///
    /// # Errors
    ///
    /// See [`Viewmap::build`].
    pub async fn build_with_progress<F>(
        &mut self,
        meshes: Vec<MeshAdapter>,
        camera: &PerspectiveCamera,
        size: RenderSize,
        mut progress: F,
    ) -> ViewmapResult<()>
    where
        F: FnMut(&ProgressInfo),
    {
        self.clear();
        self.meshes = meshes;
        if !size.is_valid() {
            return Err(ViewmapError::InvalidRenderSize {
                w: size.w,
                h: size.h,
            });
        }
        self.projector = Projector::new(camera, size);

        let start = Instant::now();
        let stages = Stage::pipeline(self.options.update_meshes);
        info!(
            meshes = self.meshes.len(),
            stages = stages.len(),
            "Building view map"
        );

        for (index, stage) in stages.iter().enumerate() {
            progress(&ProgressInfo {
                current_step_name: stage.name().to_string(),
                current_step: index + 1,
                total_steps: stages.len(),
            });

            if self.cancel.is_cancelled() {
                debug!(stage = stage.name(), "Stage skipped");
                self.info.skipped_stages += 1;
                self.info.stages.push(StageTiming {
                    name: stage.name().to_string(),
                    duration: std::time::Duration::ZERO,
                    skipped: true,
                });
                continue;
            }

            let stage_start = Instant::now();
            if let Err(err) = self.run_stage(*stage) {
                error!(stage = stage.name(), error = %err, "Stage failed");
                self.info.stage_failures += 1;
            }
            self.info.stages.push(StageTiming {
                name: stage.name().to_string(),
                duration: stage_start.elapsed(),
                skipped: false,
            });

            yield_now().await;
        }

        self.info.total_time = start.elapsed();
        info!(
            edges = self.graph.edge_count(),
            chains = self.chains.len(),
            polygons = self.polygons.len(),
            ms = self.info.total_time.as_secs_f64() * 1e3,
            "View map built"
        );
        Ok(())
    }

    fn clear(&mut self) {
        self.meshes.clear();
        self.graph.clear();
        self.chains.clear();
        self.polygons.clear();
        self.info = BuildInfo::default();
    }

    fn run_stage(&mut self, stage: Stage) -> ViewmapResult<()> {
        match stage {
            Stage::UpdateGeometries => self.for_each_mesh(MeshAdapter::refresh_geometry),
            Stage::UpdateBvh => self.for_each_mesh(|m| {
                m.refresh_bvh(false);
                Ok(())
            }),
            Stage::UpdateHalfEdges => self.for_each_mesh(|m| m.refresh_connectivity(false)),
            Stage::TransformHalfEdges => self.for_each_mesh(|m| {
                m.apply_world_transform();
                Ok(())
            }),
            Stage::SetupEdges => {
                self.info.setup =
                    ops::setup_edges(&self.meshes, &mut self.graph, &self.projector, &self.options);
                Ok(())
            }
            Stage::MeshIntersections => {
                self.info.intersections =
                    ops::compute_mesh_intersections(&self.meshes, &mut self.graph, &self.projector);
                Ok(())
            }
            Stage::Singularities3d => {
                let eye = self.projector.camera_position();
                self.info.singularities = ops::find_3d_singularities(&self.meshes, &mut self.graph, &eye);
                Ok(())
            }
            Stage::Singularities2d => {
                ops::find_2d_singularities(&mut self.graph, &self.projector, &mut self.info.singularities);
                Ok(())
            }
            Stage::Chains => {
                self.chains = ops::create_chains(&self.graph, self.options.max_chains);
                self.info.chains = self.chains.len();
                Ok(())
            }
            Stage::Visibility => {
                self.info.visibility = ops::compute_chains_visibility(
                    &self.meshes,
                    &mut self.graph,
                    &mut self.chains,
                    &self.projector,
                    self.options.visibility_tolerance,
                    self.options.ignore_visibility,
                );
                Ok(())
            }
            Stage::Polygons => {
                self.polygons = ops::compute_polygons(
                    &self.graph,
                    &self.chains,
                    self.arrangement.as_ref(),
                    self.options.default_mesh_color,
                    &mut self.info.polygons,
                )?;
                Ok(())
            }
            Stage::Assignment => {
                ops::assign_polygons(
                    &self.meshes,
                    &mut self.polygons,
                    &self.projector,
                    self.options.default_mesh_color,
                    &mut self.info.polygons,
                );
                Ok(())
            }
        }
    }

    /// Apply `f` to every mesh; every mesh is visited, the first error is
    /// returned and later ones are logged.
    fn for_each_mesh<F>(&mut self, mut f: F) -> ViewmapResult<()>
    where
        F: FnMut(&mut MeshAdapter) -> ViewmapResult<()>,
    {
        let mut first = None;
        for mesh in &mut self.meshes {
            if let Err(err) = f(mesh) {
                if first.is_some() {
                    error!(mesh = mesh.name(), error = %err, "Mesh update failed");
                } else {
                    first = Some(err);
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Chains classified visible.
    pub fn visible_chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains
            .iter()
            .filter(|c| c.visibility == ChainVisibility::Visible)
    }

    /// Chains classified hidden.
    pub fn hidden_chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains
            .iter()
            .filter(|c| c.visibility == ChainVisibility::Hidden)
    }

    /// Give back the mesh adapters of the last build, e.g. to reuse them with
    /// `update_meshes` off.
    pub fn take_meshes(&mut self) -> Vec<MeshAdapter> {
        std::mem::take(&mut self.meshes)
    }

    /// Mesh adapters of the last build.
    #[must_use]
    pub fn meshes(&self) -> &[MeshAdapter] {
        &self.meshes
    }

    /// The view graph.
    #[must_use]
    pub fn graph(&self) -> &ViewGraph {
        &self.graph
    }

    /// All view edges.
    #[must_use]
    pub fn view_edges(&self) -> &[ViewEdge] {
        self.graph.edges()
    }

    /// All view vertices.
    #[must_use]
    pub fn view_vertices(&self) -> &[ViewVertex] {
        self.graph.vertices()
    }

    /// View vertices by position key.
    #[must_use]
    pub fn view_vertex_map(&self) -> &HashMap<Key3, VertexId> {
        self.graph.vertex_map()
    }

    /// All chains.
    #[must_use]
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// All kept polygons.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Camera and render size snapshot of the last build.
    #[must_use]
    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Diagnostics of the last build.
    #[must_use]
    pub fn info(&self) -> &BuildInfo {
        &self.info
    }
}

/// Returns `Pending` once, handing control back to the executor.
fn yield_now() -> impl Future<Output = ()> {
    struct YieldNow(bool);

    impl Future for YieldNow {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    YieldNow(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::primitives::cube;
    use nalgebra::Point3;
    use viewmap_geom::{ArrangementPolygon, GeomError, GeomResult, Segment2};

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(Point3::new(0.0, 0.0, 5.0), Point3::origin())
    }

    fn cube_adapter() -> MeshAdapter {
        MeshAdapter::new(cube("cube", 1.0)).unwrap()
    }

    #[test]
    fn test_pipeline_stage_lists() {
        assert_eq!(Stage::pipeline(true).len(), 12);
        assert_eq!(Stage::pipeline(false).len(), 8);
        assert_eq!(Stage::pipeline(false)[0], Stage::SetupEdges);
        assert_eq!(Stage::pipeline(true)[11], Stage::Assignment);
    }

    #[test]
    fn test_progress_reports_every_stage() {
        let mut viewmap = Viewmap::default();
        let mut seen = Vec::new();
        pollster::block_on(viewmap.build_with_progress(
            vec![cube_adapter()],
            &camera(),
            RenderSize::default(),
            |p| seen.push((p.current_step, p.total_steps, p.current_step_name.clone())),
        ))
        .unwrap();

        assert_eq!(seen.len(), 12);
        assert_eq!(seen[0], (1, 12, "Update morphed geometries".to_string()));
        assert_eq!(seen[11].0, 12);
        assert_eq!(viewmap.info().stages.len(), 12);
        assert_eq!(viewmap.info().skipped_stages, 0);
    }

    #[test]
    fn test_cancellation_skips_remaining_stages() {
        let mut viewmap = Viewmap::new(ViewmapOptions::default().with_update_meshes(false));
        let token = viewmap.cancellation_token();
        pollster::block_on(viewmap.build_with_progress(
            vec![cube_adapter()],
            &camera(),
            RenderSize::default(),
            |p| {
                if p.current_step_name == Stage::Chains.name() {
                    token.cancel();
                }
            },
        ))
        .unwrap();

        // Setup edges and the three stages before chaining ran
        assert!(viewmap.graph().edge_count() > 0);
        assert!(viewmap.chains().is_empty());
        assert!(viewmap.polygons().is_empty());
        assert_eq!(viewmap.info().skipped_stages, 4);
        assert!(viewmap.cancellation_token().is_cancelled());
    }

    struct Failing;

    impl ArrangementBuilder for Failing {
        fn build(&self, _segments: &[Segment2]) -> GeomResult<Vec<ArrangementPolygon>> {
            Err(GeomError::DegenerateInput {
                details: "always fails".to_string(),
            })
        }
    }

    #[test]
    fn test_stage_failure_does_not_abort() {
        let mut viewmap = Viewmap::default().with_arrangement_builder(Failing);
        pollster::block_on(viewmap.build(vec![cube_adapter()], &camera(), RenderSize::default()))
            .unwrap();
        assert_eq!(viewmap.info().stage_failures, 1);
        assert!(viewmap.polygons().is_empty());
        assert!(viewmap.info().stage("Assign polygons").is_some());
        assert!(!viewmap.chains().is_empty());
    }

    #[test]
    fn test_invalid_render_size() {
        let mut viewmap = Viewmap::default();
        let result = pollster::block_on(viewmap.build(
            vec![cube_adapter()],
            &camera(),
            RenderSize::new(0.0, 100.0),
        ));
        assert!(matches!(result, Err(ViewmapError::InvalidRenderSize { .. })));
        assert_eq!(viewmap.take_meshes().len(), 1);
    }

    #[test]
    fn test_adapters_can_be_reused() {
        let mut viewmap = Viewmap::default();
        pollster::block_on(viewmap.build(vec![cube_adapter()], &camera(), RenderSize::default()))
            .unwrap();
        let edges = viewmap.graph().edge_count();
        let meshes = viewmap.take_meshes();

        viewmap.options_mut().update_meshes = false;
        pollster::block_on(viewmap.build(meshes, &camera(), RenderSize::default())).unwrap();
        assert_eq!(viewmap.graph().edge_count(), edges);
        assert_eq!(viewmap.info().stages.len(), 8);
    }
}
