//! Filled regions of the drawing.

use nalgebra::Point2;

use crate::graph::MeshId;
use crate::scene::Color;

/// A visible region bounded by visible chains.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    /// Position in the build's polygon list.
    pub id: usize,
    /// Outer ring in image coordinates, counter-clockwise.
    pub contour: Vec<Point2<f64>>,
    /// Inner rings.
    pub holes: Vec<Vec<Point2<f64>>>,
    /// Unsigned area net of holes, in square pixels.
    pub area: f64,
    /// A point strictly inside the region.
    pub inside_point: Point2<f64>,
    /// Fill color.
    pub color: Color,
    /// Mesh seen through the region, once assigned.
    pub mesh: Option<MeshId>,
}

impl Polygon {
    /// Whether assignment found a mesh behind the region.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.mesh.is_some()
    }
}
