//! Mesh and color assignment for polygons.

use tracing::debug;

use crate::adapter::MeshAdapter;
use crate::camera::Projector;
use crate::graph::MeshId;
use crate::info::PolygonInfo;
use crate::polygon::Polygon;
use crate::scene::Color;

/// Give every polygon the mesh seen through its inside point and that
/// face's color.
///
/// Polygons with no hit keep `default_color` and count as non-assigned.
pub(crate) fn assign_polygons(
    meshes: &[MeshAdapter],
    polygons: &mut [Polygon],
    projector: &Projector,
    default_color: Color,
    info: &mut PolygonInfo,
) {
    let mut assigned = 0;

    for polygon in polygons.iter_mut() {
        let ndc = projector.image_to_ndc(&polygon.inside_point);
        let (origin, direction) = projector.ray_through_ndc(&ndc);

        let nearest = meshes
            .iter()
            .enumerate()
            .filter_map(|(i, adapter)| {
                adapter
                    .raycast(&origin, &direction, f64::INFINITY)
                    .first()
                    .map(|hit| (i, hit.distance, hit.triangle))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((mesh, _, triangle)) => {
                polygon.mesh = Some(MeshId(mesh));
                polygon.color = meshes[mesh].color_for_face(triangle).unwrap_or(default_color);
                assigned += 1;
            }
            None => {
                polygon.mesh = None;
                polygon.color = default_color;
            }
        }
    }

    info.assigned = assigned;
    info.non_assigned = polygons.len() - assigned;
    debug!(assigned, non_assigned = info.non_assigned, "Polygons assigned");
}
