//! Geometry kernels for view-map construction.
//!
//! This crate holds the pure geometry used to extract line drawings from
//! triangle meshes. It carries no pipeline state; everything here is a
//! function of its inputs.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in
//! CLI tools, servers, WASM builds or other engines.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`predicates`] | `orient3d` with a dead-zone, same-side tests, 3D line intersection, quantized point keys |
//! | [`bvh`] | Median-split BVH with refit, ray candidate queries and two-tree pair traversal |
//! | [`intersect`] | Möller-Trumbore ray/triangle with side culling, triangle/triangle intersection |
//! | [`segments`] | 2D segment intersection and the sweep over a segment set |
//! | [`arrangement`] | The [`ArrangementBuilder`] seam and the default [`PlanarArrangement`] |
//!
//! # Example
//!
//! ```
//! use nalgebra::Point2;
//! use viewmap_geom::{ArrangementBuilder, PlanarArrangement, Segment2};
//!
//! let p = [
//!     Point2::new(0.0, 0.0),
//!     Point2::new(4.0, 0.0),
//!     Point2::new(4.0, 3.0),
//! ];
//! let segments: Vec<Segment2> = (0..3).map(|i| Segment2::new(p[i], p[(i + 1) % 3])).collect();
//!
//! let polygons = PlanarArrangement::default().build(&segments)?;
//! assert_eq!(polygons.len(), 1);
//! assert!((polygons[0].area - 6.0).abs() < 1e-9);
//! # Ok::<(), viewmap_geom::GeomError>(())
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
// Triangle indices are u32 by construction
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::too_many_lines)]

pub mod arrangement;
pub mod bvh;
pub mod error;
pub mod intersect;
pub mod predicates;
pub mod segments;

pub use arrangement::{ArrangementBuilder, ArrangementPolygon, PlanarArrangement};
pub use bvh::{Aabb, Bvh, BvhStats};
pub use error::{GeomError, GeomResult};
pub use intersect::{Culling, RayHit};
pub use predicates::{Key2, Key3, LineMode, Orientation};
pub use segments::{Segment2, SegmentCrossing};
