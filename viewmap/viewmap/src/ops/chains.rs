//! Greedy chaining of view edges into polylines.

use tracing::{debug, warn};

use crate::chain::{Chain, ChainEnd};
use crate::graph::{EdgeId, MeshId, Singularity, ViewGraph};

/// Cover every edge of `graph` with chains, at most `max_chains` of them.
///
/// Seeds are taken in edge order. A chain grows from both ends through
/// unused edges of the same nature that belong to the chain's mesh, and stops
/// at singular vertices.
pub(crate) fn create_chains(graph: &ViewGraph, max_chains: usize) -> Vec<Chain> {
    let mut used = vec![false; graph.edge_count()];
    let mut chains = Vec::new();

    for seed in 0..graph.edge_count() {
        if used[seed] {
            continue;
        }
        if chains.len() >= max_chains {
            warn!(max_chains, remaining = used.iter().filter(|u| !**u).count(), "Chain limit reached");
            break;
        }

        let seed = EdgeId(seed);
        used[seed.0] = true;
        let edge = graph.edge(seed);
        let mesh = edge.meshes.first().copied().unwrap_or(MeshId(0));
        let mut chain = Chain::new(chains.len(), mesh, seed, graph);

        for end in [ChainEnd::Tail, ChainEnd::Head] {
            while let Some(next) = next_edge(graph, &chain, end, &used) {
                used[next.0] = true;
                chain.extend(end, next, graph);
            }
        }
        chains.push(chain);
    }

    debug!(chains = chains.len(), edges = graph.edge_count(), "Chains created");
    chains
}

fn next_edge(graph: &ViewGraph, chain: &Chain, end: ChainEnd, used: &[bool]) -> Option<EdgeId> {
    let vertex = graph.vertex(chain.end(end));
    if vertex.singularity != Singularity::None {
        return None;
    }
    vertex.edges.iter().copied().find(|e| {
        let edge = graph.edge(*e);
        !used[e.0] && edge.nature == chain.nature() && edge.meshes.contains(&chain.mesh)
    })
}
