//! # Workflows Module
//!
//! High-level entry points that drive the engine over a whole molecule.
//!
//! - **Molecule layout** ([`layout`]) - [`layout::MoleculeLayout`] collapses
//!   multiple groups, lays out the remaining graph, expands the copies again,
//!   lays out R-group fragments and composes everything in rows
//! - **Brackets** ([`brackets`]) - S-group bracket geometry derived from the
//!   final coordinates

pub mod brackets;
pub mod layout;
