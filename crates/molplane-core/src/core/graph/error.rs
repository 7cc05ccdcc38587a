use super::ids::{EdgeId, VertexId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Vertex {0:?} does not exist")]
    VertexNotFound(VertexId),

    #[error("Edge {0:?} does not exist")]
    EdgeNotFound(EdgeId),

    #[error("Can't have loop-edge on vertex {0:?}")]
    LoopEdge(VertexId),

    #[error("Already have edge between vertices {beg:?} and {end:?}")]
    DuplicateEdge { beg: VertexId, end: VertexId },

    #[error("Vertex {0:?} is not articulation point")]
    NotArticulationPoint(VertexId),

    #[error("Component index {index} is out of range ({count} components)")]
    ComponentOutOfRange { index: usize, count: usize },

    #[error("Ring index {index} is out of range ({count} rings)")]
    RingOutOfRange { index: usize, count: usize },

    #[error("No tree path between vertices {beg:?} and {end:?}")]
    NoTreePath { beg: VertexId, end: VertexId },

    #[error("Subgraph has {edges} edges, exceeding the limit of {max_edges}")]
    SubgraphTooLarge { edges: usize, max_edges: usize },
}
