//! # Core Models Module
//!
//! The minimal molecule model the layout reads from and writes to.
//!
//! - [`molecule`] - bond graph, atom coordinates and attached groups
//! - [`sgroup`] - S-groups with their brackets, and R-groups holding
//!   alternative fragments

pub mod molecule;
pub mod sgroup;
