//! Contour extraction for line drawings.
//!
//! Given triangle meshes and a perspective camera, a [`Viewmap`] build
//! classifies the feature edges of every mesh, adds the curves where meshes
//! cut each other, splits edges at their image-space crossings, joins edges
//! into chains, decides which chains are visible, and fills the regions those
//! chains enclose with the color of the surface behind them.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. Meshes come in as
//! plain position and index buffers through [`SourceMesh`].
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`scene`] | Source meshes, shared materials, colors and morph resolution |
//! | [`adapter`] | [`MeshAdapter`]: working buffers, BVH and half-edge view of one mesh |
//! | [`halfedge`] | Welded half-edge connectivity with boundary half-edges |
//! | [`camera`] | Perspective camera, render size and the projection snapshot |
//! | [`graph`] | The view graph: quantized vertices, classified edges, splitting |
//! | [`chain`] | Chains of same-nature edges |
//! | [`polygon`] | Filled regions |
//! | [`viewmap`] | The staged, cancellable build |
//! | [`info`] | Per-stage diagnostics |
//! | [`primitives`] | Cube and UV sphere meshes |
//!
//! # Pipeline
//!
//! | Stage | Result |
//! |-------|--------|
//! | Mesh refresh (optional, four stages) | Geometry, BVH, connectivity, world positions |
//! | Setup edges | Boundary, silhouette, crease and material edges |
//! | Find mesh intersections | Mesh-intersection edges, crossing edges split |
//! | Find 3D singularities | Vertex classes from incident edges |
//! | Find 2D singularities | Image crossings split, farther side marked |
//! | Create chains | Edge chains |
//! | Compute chain visibility | Visible and hidden chains |
//! | Compute polygons | Regions of the visible chains |
//! | Assign polygons | Mesh and color per region |
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use viewmap::{
//!     primitives, EdgeNature, MeshAdapter, PerspectiveCamera, RenderSize, Viewmap,
//!     ViewmapOptions,
//! };
//!
//! let sphere = MeshAdapter::new(primitives::uv_sphere("ball", Point3::origin(), 1.0, 32, 16))?;
//! let camera = PerspectiveCamera::new(Point3::new(0.0, 0.0, 6.0), Point3::origin());
//!
//! let mut viewmap = Viewmap::new(ViewmapOptions::default());
//! pollster::block_on(viewmap.build(vec![sphere], &camera, RenderSize::default()))?;
//!
//! let silhouettes = viewmap
//!     .view_edges()
//!     .iter()
//!     .filter(|e| e.nature == EdgeNature::Silhouette)
//!     .count();
//! assert!(silhouettes > 0);
//! assert!(viewmap.visible_chains().count() > 0);
//! # Ok::<(), viewmap::ViewmapError>(())
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
// Allow single-char names in math-heavy code (standard in graphics/geometry algorithms)
#![allow(clippy::many_single_char_names)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]

pub mod adapter;
pub mod camera;
pub mod chain;
pub mod config;
pub mod error;
pub mod graph;
pub mod halfedge;
pub mod info;
mod ops;
pub mod polygon;
pub mod primitives;
pub mod scene;
pub mod viewmap;

pub use adapter::{MeshAdapter, SurfaceHit};
pub use camera::{PerspectiveCamera, Projector, RenderSize};
pub use chain::{Chain, ChainEnd, ChainVisibility};
pub use config::{AdapterOptions, CreaseAngle, ViewmapOptions};
pub use error::{ViewmapError, ViewmapResult};
pub use graph::{
    EdgeId, EdgeNature, FaceRef, MeshId, Singularity, Split, VertexId, ViewEdge, ViewGraph,
    ViewVertex,
};
pub use halfedge::{FaceId, HalfEdgeId, HalfEdgeMesh, MeshVertexId};
pub use info::{
    BuildInfo, IntersectionInfo, IntersectionPairInfo, PolygonInfo, SetupInfo, SingularityInfo,
    StageTiming, VisibilityInfo,
};
pub use ops::visibility::{chain_visibility_from_geometry, DoubleSidedGuard};
pub use ops::MIN_POLYGON_AREA;
pub use polygon::Polygon;
pub use scene::{Color, Material, MaterialGroup, MorphResolver, SharedMaterial, Side, SourceMesh};
pub use viewmap::{CancellationToken, ProgressInfo, Stage, Viewmap};

pub use viewmap_geom::{ArrangementBuilder, ArrangementPolygon, PlanarArrangement};
