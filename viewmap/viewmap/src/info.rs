//! Diagnostics collected during a build.
//!
//! None of these counters affect the result; they let callers detect
//! degraded output (dropped polygons, failed splits, failed stages) without
//! an error surface.

use std::fmt;
use std::time::Duration;

/// Timing of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageTiming {
    /// Stage name.
    pub name: String,
    /// Wall time spent in the stage.
    pub duration: Duration,
    /// Whether the stage was skipped after cancellation.
    pub skipped: bool,
}

/// Edge classification counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SetupInfo {
    /// Undirected mesh edges visited.
    pub mesh_edges: usize,
    /// View edges created.
    pub view_edges: usize,
    /// Edges with no nature.
    pub dropped: usize,
}

/// Intersection counters for one mesh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntersectionPairInfo {
    /// `"A ∩ B"`.
    pub name: String,
    /// Candidate triangle pairs tested.
    pub tests: usize,
    /// Triangle pairs that produced a segment.
    pub intersections: usize,
    /// Wall time.
    pub time: Duration,
}

/// Mesh intersection counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntersectionInfo {
    /// Per-pair details.
    pub pairs: Vec<IntersectionPairInfo>,
    /// Number of mesh pairs tested.
    pub mesh_pairs_tested: usize,
    /// `MeshIntersection` edges added.
    pub edges_added: usize,
    /// Crossings whose edge could not be split.
    pub failed_splits: usize,
    /// Segments skipped because a triangle had no face.
    pub missing_faces: usize,
}

impl IntersectionInfo {
    /// Total triangle pairs that produced a segment.
    #[must_use]
    pub fn intersections(&self) -> usize {
        self.pairs.iter().map(|p| p.intersections).sum()
    }
}

/// Singularity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SingularityInfo {
    /// Vertices marked `Bifurcation`.
    pub bifurcations: usize,
    /// Vertices marked `MeshIntersection`.
    pub mesh_intersections: usize,
    /// Vertices marked `CurtainFold`.
    pub curtain_folds: usize,
    /// Vertices marked `ImageIntersection`.
    pub image_intersections: usize,
    /// Vertices with no incident edge nature.
    pub missing_natures: usize,
    /// Image crossings that could not be split.
    pub failed_splits: usize,
}

/// Visibility counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisibilityInfo {
    /// Chains classified.
    pub tests: usize,
    /// Rays cast.
    pub raycasts: usize,
    /// Chains found visible.
    pub visible: usize,
    /// Chains found hidden.
    pub hidden: usize,
}

/// Polygon counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolygonInfo {
    /// Polygons returned by the arrangement.
    pub found: usize,
    /// Polygons kept.
    pub kept: usize,
    /// Polygons at or below the area threshold.
    pub small_area_ignored: usize,
    /// Polygons without an interior point.
    pub inside_point_errors: usize,
    /// Polygons assigned to a mesh.
    pub assigned: usize,
    /// Polygons left with the default color.
    pub non_assigned: usize,
}

/// Everything recorded during one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildInfo {
    /// Wall time of the whole build.
    pub total_time: Duration,
    /// Per-stage timings in execution order.
    pub stages: Vec<StageTiming>,
    /// Edge classification.
    pub setup: SetupInfo,
    /// Mesh intersections.
    pub intersections: IntersectionInfo,
    /// Singularities.
    pub singularities: SingularityInfo,
    /// Chains created.
    pub chains: usize,
    /// Visibility.
    pub visibility: VisibilityInfo,
    /// Polygons and assignment.
    pub polygons: PolygonInfo,
    /// Stages skipped after cancellation.
    pub skipped_stages: usize,
    /// Stages that returned an error.
    pub stage_failures: usize,
}

impl BuildInfo {
    /// Timing of a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageTiming> {
        self.stages.iter().find(|s| s.name == name)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Build: {:.3} ms", self.total_time.as_secs_f64() * 1e3)?;
        for stage in &self.stages {
            let state = if stage.skipped { " (skipped)" } else { "" };
            writeln!(
                f,
                "  {:<40} {:>10.3} ms{state}",
                stage.name,
                stage.duration.as_secs_f64() * 1e3
            )?;
        }
        for pair in &self.intersections.pairs {
            writeln!(
                f,
                "  {}: {} tests, {} intersections",
                pair.name, pair.tests, pair.intersections
            )?;
        }
        writeln!(
            f,
            "  edges {} (dropped {}), chains {}, polygons {} (ignored {}, unassigned {})",
            self.setup.view_edges,
            self.setup.dropped,
            self.chains,
            self.polygons.kept,
            self.polygons.small_area_ignored,
            self.polygons.non_assigned
        )?;
        write!(
            f,
            "  skipped stages {}, failed stages {}",
            self.skipped_stages, self.stage_failures
        )
    }
}
