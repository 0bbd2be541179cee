//! Error types for view-map construction.

use thiserror::Error;
use viewmap_geom::GeomError;

/// Errors that can occur while building a view map.
///
/// Degenerate geometry is never an error: it is counted in
/// [`BuildInfo`](crate::BuildInfo) and the build continues.
#[derive(Debug, Error)]
pub enum ViewmapError {
    /// A morph resolver returned a different number of positions than the
    /// source mesh has.
    #[error("morph resolver for '{mesh}' returned {got} positions, expected {expected}")]
    MorphMismatch {
        /// Mesh name.
        mesh: String,
        /// Number of positions in the source mesh.
        expected: usize,
        /// Number of positions the resolver returned.
        got: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} of '{mesh}' references missing vertex {vertex}")]
    InvalidFaceIndex {
        /// Mesh name.
        mesh: String,
        /// Face index.
        face: usize,
        /// Offending vertex index.
        vertex: u32,
    },

    /// Render size must be finite and strictly positive.
    #[error("invalid render size {w}x{h}")]
    InvalidRenderSize {
        /// Width.
        w: f64,
        /// Height.
        h: f64,
    },

    /// The planar arrangement builder failed.
    #[error("arrangement failed: {0}")]
    Arrangement(#[from] GeomError),
}

/// Result type for view-map construction.
pub type ViewmapResult<T> = Result<T, ViewmapError>;
