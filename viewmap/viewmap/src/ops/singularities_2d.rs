//! Image-space crossings between view edges.

use hashbrown::HashMap;
use tracing::{debug, warn};
use viewmap_geom::predicates::DEFAULT_EPSILON;
use viewmap_geom::segments::{find_intersections, Segment2};

use crate::camera::Projector;
use crate::graph::{EdgeId, Singularity, VertexId, ViewGraph};
use crate::info::SingularityInfo;

/// Split edges where they cross in the image and mark the occluded side of
/// each crossing as an [`Singularity::ImageIntersection`].
///
/// Only crossings between edges that share no vertex and where at least one
/// edge can hide what lies behind it are considered.
pub(crate) fn find_2d_singularities(
    graph: &mut ViewGraph,
    projector: &Projector,
    info: &mut SingularityInfo,
) {
    let segments: Vec<Segment2> = graph
        .edges()
        .iter()
        .map(|e| Segment2::new(graph.vertex(e.a).pos2d, graph.vertex(e.b).pos2d))
        .collect();

    let crossings: Vec<_> = find_intersections(&segments, DEFAULT_EPSILON)
        .into_iter()
        .filter(|c| {
            let (e1, e2) = (graph.edge(EdgeId(c.first)), graph.edge(EdgeId(c.second)));
            !e1.is_connected_to(e2)
                && (e1.nature.indicates_visibility() || e2.nature.indicates_visibility())
        })
        .collect();

    let eye = projector.camera_position();
    let mut cuts: HashMap<EdgeId, Vec<EdgeId>> = HashMap::new();
    let mut marked = 0;

    for crossing in &crossings {
        let mut split_vertices: Vec<VertexId> = Vec::with_capacity(2);
        for original in [EdgeId(crossing.first), EdgeId(crossing.second)] {
            match split_piece(graph, projector, &mut cuts, original, crossing) {
                Some(v) if !split_vertices.contains(&v) => split_vertices.push(v),
                Some(_) => {}
                None => {
                    warn!(edge = original.0, point = ?crossing.point, "Image crossing could not split edge");
                    info.failed_splits += 1;
                }
            }
        }

        let farther: Vec<VertexId> = match split_vertices.as_slice() {
            [only] => vec![*only],
            [u, v] => {
                let du = (graph.vertex(*u).pos3d - eye).norm();
                let dv = (graph.vertex(*v).pos3d - eye).norm();
                if (du - dv).abs() <= DEFAULT_EPSILON {
                    vec![*u, *v]
                } else if du > dv {
                    vec![*u]
                } else {
                    vec![*v]
                }
            }
            _ => Vec::new(),
        };
        for v in farther {
            let vertex = graph.vertex_mut(v);
            if vertex.singularity != Singularity::ImageIntersection {
                vertex.singularity = Singularity::ImageIntersection;
                marked += 1;
            }
        }
    }

    info.image_intersections += marked;
    debug!(
        crossings = crossings.len(),
        image_intersections = marked,
        "2D singularities found"
    );
}

/// Split whichever piece of `original` holds the crossing point.
fn split_piece(
    graph: &mut ViewGraph,
    projector: &Projector,
    cuts: &mut HashMap<EdgeId, Vec<EdgeId>>,
    original: EdgeId,
    crossing: &viewmap_geom::SegmentCrossing,
) -> Option<VertexId> {
    let pieces: Vec<EdgeId> = std::iter::once(original)
        .chain(cuts.get(&original).into_iter().flatten().copied())
        .collect();

    for piece in pieces {
        if let Some(split) = graph.split_edge_2d(piece, &crossing.point, projector) {
            if let Some(new_edge) = split.new_edge {
                cuts.entry(original).or_default().push(new_edge);
            }
            return Some(split.vertex);
        }
    }
    None
}
