//! # Core Module
//!
//! Stateless foundations of the library.
//!
//! ## Architecture
//!
//! - **Graphs** ([`graph`]) - the graph arena, filters and every structural
//!   algorithm: connected and biconnected decomposition, spanning trees,
//!   ring perception, cycle and edge-subgraph enumeration
//! - **Molecular Representation** ([`models`]) - molecules, S-groups and
//!   R-groups as seen by the layout
//! - **Geometry** ([`utils`]) - planar vector helpers, regular polygons and
//!   best-fit superposition

pub mod graph;
pub mod models;
pub mod utils;
