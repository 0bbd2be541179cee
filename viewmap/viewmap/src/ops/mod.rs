//! Pipeline stages operating on the view graph.
//!
//! Each stage is a free function taking the meshes and graph it reads and
//! writes, and returning its diagnostics.

mod assign;
mod chains;
mod intersections;
mod polygons;
pub(crate) mod setup_edges;
mod singularities_2d;
mod singularities_3d;
pub mod visibility;

pub(crate) use assign::assign_polygons;
pub(crate) use chains::create_chains;
pub(crate) use intersections::compute_mesh_intersections;
pub use polygons::MIN_POLYGON_AREA;
pub(crate) use polygons::compute_polygons;
pub(crate) use setup_edges::setup_edges;
pub(crate) use singularities_2d::find_2d_singularities;
pub(crate) use singularities_3d::find_3d_singularities;
pub(crate) use visibility::compute_chains_visibility;
