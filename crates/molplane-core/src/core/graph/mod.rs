//! # Graph Module
//!
//! Undirected simple graphs and the structural algorithms that the layout
//! engine builds on.
//!
//! ## Overview
//!
//! [`Graph`] stores vertices and edges in slot arenas addressed by stable
//! [`VertexId`]/[`EdgeId`] handles. Every algorithm in this module borrows a
//! graph read-only and can be restricted to a subgraph through a [`Filter`]
//! instead of copying.
//!
//! ## Architecture
//!
//! - **Storage** ([`Graph`], [`Filter`]) - adjacency, mutation, subgraph
//!   extraction and lazily cached derived properties
//! - **Decomposition** ([`GraphDecomposer`], [`BiconnectedDecomposer`]) -
//!   connected and biconnected components
//! - **Cycle structure** ([`SpanningTree`], [`Sssr`]) - extra edges,
//!   ring membership and the smallest set of smallest rings
//! - **Enumeration** ([`CycleEnumerator`], [`EdgeSubgraphEnumerator`]) -
//!   exhaustive, callback-driven enumeration with early termination
//!
//! All depth-first traversals use explicit stacks.

mod biconnected;
mod cycle_basis;
mod cycle_enumerator;
mod decomposer;
mod edge_subgraph;
mod error;
mod filter;
mod graph;
mod ids;
mod spanning_tree;

pub use biconnected::{BiconnectedComponent, BiconnectedDecomposer, RegularPolygonTest};
pub use cycle_basis::{Ring, Sssr};
pub use cycle_enumerator::{CheckVertex, CycleEnumerator, HandleCycle};
pub use decomposer::GraphDecomposer;
pub use edge_subgraph::{EdgeSubgraphEnumerator, HandleSubgraph};
pub use error::GraphError;
pub use filter::{Filter, FilterKind};
pub use graph::{Edge, Graph, GraphMapping, Topology, Vertex, VertexEdge};
pub use ids::{EdgeId, VertexId};
pub use spanning_tree::{ExtEdge, SpanningTree};

#[cfg(test)]
pub(crate) use graph::tests::{cycle_graph, naphthalene_skeleton};
