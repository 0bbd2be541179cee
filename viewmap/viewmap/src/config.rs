//! Build options for view maps and mesh adapters.
//!
//! # Example
//!
//! ```
//! use viewmap::{Color, ViewmapOptions};
//!
//! let options = ViewmapOptions::default()
//!     .with_crease_angle(60.0, 120.0)
//!     .with_default_mesh_color(Color::from_hex(0x333333))
//!     .with_ignore_visibility(true);
//! assert!(options.ignore_visibility);
//! ```

use crate::scene::Color;

/// Inclusive dihedral angle range, in degrees, classified as crease.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CreaseAngle {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Default for CreaseAngle {
    fn default() -> Self {
        Self {
            min: 80.0,
            max: 100.0,
        }
    }
}

impl CreaseAngle {
    /// Whether `angle` (degrees) lies in the range.
    #[must_use]
    pub fn contains(&self, angle: f64) -> bool {
        self.min <= angle && angle <= self.max
    }
}

/// Configuration for a view-map build.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ViewmapOptions {
    /// Run the geometry, BVH, connectivity and world-transform refresh
    /// stages before extracting contours.
    pub update_meshes: bool,

    /// Mark every chain visible without casting rays.
    pub ignore_visibility: bool,

    /// Fill for polygons whose hit face has no resolvable color.
    pub default_mesh_color: Color,

    /// Dihedral range classified as crease.
    pub crease_angle: CreaseAngle,

    /// Classify otherwise dropped edges between faces of different colors
    /// as material edges.
    pub material_edges: bool,

    /// Upper bound on the number of chains; guards against pathological
    /// inputs.
    pub max_chains: usize,

    /// A chain is visible when the summed hit distance along its sample ray
    /// is below this value.
    pub visibility_tolerance: f64,
}

impl Default for ViewmapOptions {
    fn default() -> Self {
        Self {
            update_meshes: true,
            ignore_visibility: false,
            default_mesh_color: Color::from_hex(0x0055_5555),
            crease_angle: CreaseAngle::default(),
            material_edges: false,
            max_chains: 10_000,
            visibility_tolerance: 1e-5,
        }
    }
}

impl ViewmapOptions {
    /// Set whether meshes are refreshed at the start of a build.
    #[must_use]
    pub fn with_update_meshes(mut self, update: bool) -> Self {
        self.update_meshes = update;
        self
    }

    /// Set whether visibility is skipped (every chain visible).
    #[must_use]
    pub fn with_ignore_visibility(mut self, ignore: bool) -> Self {
        self.ignore_visibility = ignore;
        self
    }

    /// Set the default polygon fill.
    #[must_use]
    pub fn with_default_mesh_color(mut self, color: Color) -> Self {
        self.default_mesh_color = color;
        self
    }

    /// Set the crease range in degrees.
    #[must_use]
    pub fn with_crease_angle(mut self, min: f64, max: f64) -> Self {
        self.crease_angle = CreaseAngle { min, max };
        self
    }

    /// Enable or disable material edges.
    #[must_use]
    pub fn with_material_edges(mut self, enabled: bool) -> Self {
        self.material_edges = enabled;
        self
    }

    /// Set the chain count cap.
    #[must_use]
    pub fn with_max_chains(mut self, max: usize) -> Self {
        self.max_chains = max;
        self
    }

    /// Set the visibility tolerance.
    #[must_use]
    pub fn with_visibility_tolerance(mut self, tolerance: f64) -> Self {
        self.visibility_tolerance = tolerance;
        self
    }
}

/// Configuration for a mesh adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdapterOptions {
    /// Maximum triangles per BVH leaf.
    pub bvh_leaf_size: usize,

    /// Vertices closer than this are welded when building connectivity.
    pub weld_tolerance: f64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            bvh_leaf_size: 1,
            weld_tolerance: 1e-10,
        }
    }
}

impl AdapterOptions {
    /// Set the BVH leaf size.
    #[must_use]
    pub fn with_bvh_leaf_size(mut self, size: usize) -> Self {
        self.bvh_leaf_size = size;
        self
    }

    /// Set the weld tolerance.
    #[must_use]
    pub fn with_weld_tolerance(mut self, tolerance: f64) -> Self {
        self.weld_tolerance = tolerance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ViewmapOptions::default();
        assert!(options.update_meshes);
        assert!(!options.ignore_visibility);
        assert_eq!(options.default_mesh_color.hex(), 0x0055_5555);
        assert_eq!(options.max_chains, 10_000);
        assert!(options.crease_angle.contains(80.0));
        assert!(options.crease_angle.contains(100.0));
        assert!(!options.crease_angle.contains(100.5));
    }

    #[test]
    fn test_builder_chain() {
        let options = ViewmapOptions::default()
            .with_update_meshes(false)
            .with_material_edges(true)
            .with_max_chains(5)
            .with_visibility_tolerance(1e-3);
        assert!(!options.update_meshes);
        assert!(options.material_edges);
        assert_eq!(options.max_chains, 5);
        assert!((options.visibility_tolerance - 1e-3).abs() < f64::EPSILON);

        let adapter = AdapterOptions::default().with_bvh_leaf_size(4);
        assert_eq!(adapter.bvh_leaf_size, 4);
        assert!((adapter.weld_tolerance - 1e-10).abs() < f64::EPSILON);
    }
}
