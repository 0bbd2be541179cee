//! Region extraction from the visible chains.

use tracing::{debug, warn};
use viewmap_geom::{ArrangementBuilder, ArrangementPolygon, Segment2};

use crate::chain::{Chain, ChainVisibility};
use crate::error::ViewmapResult;
use crate::graph::ViewGraph;
use crate::info::PolygonInfo;
use crate::polygon::Polygon;
use crate::scene::Color;

/// Regions whose unsigned area is at or below this are dropped.
pub const MIN_POLYGON_AREA: f64 = 1e-10;

/// Build the arrangement of every visible chain and keep its non-degenerate
/// regions.
///
/// # Errors
///
/// Returns an error if the arrangement builder rejects the segments.
pub(crate) fn compute_polygons(
    graph: &ViewGraph,
    chains: &[Chain],
    builder: &dyn ArrangementBuilder,
    default_color: Color,
    info: &mut PolygonInfo,
) -> ViewmapResult<Vec<Polygon>> {
    let segments: Vec<Segment2> = chains
        .iter()
        .filter(|c| c.visibility == ChainVisibility::Visible)
        .flat_map(|c| {
            let points: Vec<_> = c.points2d(graph).collect();
            points
                .windows(2)
                .map(|w| Segment2::new(w[0], w[1]))
                .collect::<Vec<_>>()
        })
        .collect();

    let regions = builder.build(&segments)?;
    let polygons = keep_regions(regions, default_color, info);

    debug!(
        segments = segments.len(),
        found = info.found,
        kept = info.kept,
        small_area_ignored = info.small_area_ignored,
        inside_point_errors = info.inside_point_errors,
        "Polygons computed"
    );
    Ok(polygons)
}

fn keep_regions(
    regions: Vec<ArrangementPolygon>,
    default_color: Color,
    info: &mut PolygonInfo,
) -> Vec<Polygon> {
    info.found += regions.len();
    let mut polygons = Vec::new();

    for region in regions {
        if region.area <= MIN_POLYGON_AREA {
            info.small_area_ignored += 1;
            continue;
        }
        let Some(inside_point) = region.inside_point() else {
            warn!(area = region.area, "Region has no inside point");
            info.inside_point_errors += 1;
            continue;
        };
        polygons.push(Polygon {
            id: polygons.len(),
            contour: region.contour,
            holes: region.holes,
            area: region.area,
            inside_point,
            color: default_color,
            mesh: None,
        });
    }

    info.kept += polygons.len();
    polygons
}
