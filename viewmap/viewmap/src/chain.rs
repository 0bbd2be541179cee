//! Chains: maximal non-branching polylines of same-nature view edges.

use std::collections::VecDeque;

use nalgebra::Point2;

use crate::graph::{EdgeId, EdgeNature, MeshId, VertexId, ViewGraph};

/// Visibility of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChainVisibility {
    /// Not computed yet.
    #[default]
    Unknown,
    /// Seen from the camera.
    Visible,
    /// Occluded.
    Hidden,
}

/// End of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEnd {
    /// First vertex.
    Head,
    /// Last vertex.
    Tail,
}

/// An ordered polyline of view edges.
///
/// `vertices[i]` and `vertices[i + 1]` are the endpoints of `edges[i]`.
#[derive(Debug, Clone)]
pub struct Chain {
    /// Position in the build's chain list.
    pub id: usize,
    /// Owning mesh.
    pub mesh: MeshId,
    /// Vertices in order.
    pub vertices: VecDeque<VertexId>,
    /// Edges in order.
    pub edges: VecDeque<EdgeId>,
    /// Visibility classification.
    pub visibility: ChainVisibility,
    /// Image point the visibility ray was sampled at.
    pub raycast_point: Option<Point2<f64>>,
    nature: EdgeNature,
}

impl Chain {
    /// Start a chain from a single edge.
    #[must_use]
    pub fn new(id: usize, mesh: MeshId, seed: EdgeId, graph: &ViewGraph) -> Self {
        let edge = graph.edge(seed);
        Self {
            id,
            mesh,
            vertices: VecDeque::from([edge.a, edge.b]),
            edges: VecDeque::from([seed]),
            visibility: ChainVisibility::Unknown,
            raycast_point: None,
            nature: edge.nature,
        }
    }

    /// Nature shared by every edge.
    #[must_use]
    pub fn nature(&self) -> EdgeNature {
        self.nature
    }

    /// First vertex.
    #[must_use]
    pub fn head(&self) -> VertexId {
        self.vertices[0]
    }

    /// Last vertex.
    #[must_use]
    pub fn tail(&self) -> VertexId {
        self.vertices[self.vertices.len() - 1]
    }

    /// Vertex at one end.
    #[must_use]
    pub fn end(&self, end: ChainEnd) -> VertexId {
        match end {
            ChainEnd::Head => self.head(),
            ChainEnd::Tail => self.tail(),
        }
    }

    /// Edge at index `len / 2`.
    #[must_use]
    pub fn middle_edge(&self) -> Option<EdgeId> {
        self.edges.get(self.edges.len() / 2).copied()
    }

    /// Vertex at index `len / 2`.
    #[must_use]
    pub fn middle_vertex(&self) -> Option<VertexId> {
        self.vertices.get(self.vertices.len() / 2).copied()
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the chain has no edge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether the chain is a loop.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.edges.len() > 1 && self.head() == self.tail()
    }

    /// Attach `edge` at `end`. Returns `false` if the edge does not touch
    /// that end.
    pub fn extend(&mut self, end: ChainEnd, edge: EdgeId, graph: &ViewGraph) -> bool {
        let Some(next) = graph.edge(edge).other_vertex(self.end(end)) else {
            return false;
        };
        match end {
            ChainEnd::Head => {
                self.vertices.push_front(next);
                self.edges.push_front(edge);
            }
            ChainEnd::Tail => {
                self.vertices.push_back(next);
                self.edges.push_back(edge);
            }
        }
        true
    }

    /// Attach `edge` at the head if it touches the head, else at the tail.
    pub fn add_edge(&mut self, edge: EdgeId, graph: &ViewGraph) -> bool {
        self.extend(ChainEnd::Head, edge, graph) || self.extend(ChainEnd::Tail, edge, graph)
    }

    /// Image positions of the vertices in order.
    pub fn points2d<'a>(&'a self, graph: &'a ViewGraph) -> impl Iterator<Item = Point2<f64>> + 'a {
        self.vertices.iter().map(|v| graph.vertex(*v).pos2d)
    }
}
