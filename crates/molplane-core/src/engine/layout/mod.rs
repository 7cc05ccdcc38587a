//! # Layout Module
//!
//! Planar coordinate generation for a single graph.
//!
//! [`LayoutGraph`] mirrors a molecule and is laid out one connected
//! component at a time:
//!
//! 1. biconnected blocks are placed locally (ring systems as regular
//!    polygons and arcs, bridges as unit segments) and smoothed when they
//!    contain a macrocycle or come out distorted;
//! 2. blocks are assembled through their articulation vertices, each new
//!    block going into the largest free angular sector;
//! 3. terminal atoms whose bonds cross the drawing are swung clear;
//! 4. chain branches are flipped, rotated and stretched to lower the
//!    layout energy;
//! 5. the component is rotated to its flattest orientation unless it holds
//!    fixed vertices.
//!
//! Edges that still cross afterwards are marked [`DrawState::NotPlanar`].

mod attach;
mod blocks;
pub mod context;
pub mod graph;
mod macrocycle;
mod refine;
mod rings;

pub use context::LayoutContext;
pub use graph::{DrawState, LayoutEdge, LayoutGraph, LayoutVertex};
