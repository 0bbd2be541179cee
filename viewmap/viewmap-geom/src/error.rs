//! Error types for geometry kernels.

use thiserror::Error;

/// Errors that can occur in geometry kernels.
#[derive(Debug, Error)]
pub enum GeomError {
    /// An input coordinate is NaN or infinite.
    #[error("non-finite coordinate in {context}")]
    NonFiniteCoordinate {
        /// Where the coordinate was found.
        context: String,
    },

    /// Input cannot be processed (e.g., every segment has zero length).
    #[error("degenerate input: {details}")]
    DegenerateInput {
        /// Description of the degeneracy.
        details: String,
    },
}

/// Result type for geometry kernels.
pub type GeomResult<T> = Result<T, GeomError>;
