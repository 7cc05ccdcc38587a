//! # molplane
//!
//! Molecular graph decomposition, ring perception and 2D coordinate layout.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** The `Graph` arena and the algorithms that
//!   analyse it (connected and biconnected components, spanning trees, the
//!   smallest set of smallest rings, cycle and edge-subgraph enumeration),
//!   planar geometry helpers and the minimal `Molecule` model.
//!
//! - **[`engine`]: The Logic Core.** The `LayoutGraph` and its placement
//!   passes: block decomposition and assembly, ring-system drawing,
//!   macrocycle smoothing and energy-driven refinement, together with the
//!   metalayout, configuration, cancellation and progress reporting.
//!
//! - **[`workflows`]: The Public API.** `MoleculeLayout` ties the engine to a
//!   molecule: it handles multiple groups, R-group fragments and S-group
//!   brackets around the core layout.

pub mod core;
pub mod engine;
pub mod workflows;
