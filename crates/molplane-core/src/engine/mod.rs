//! # Engine Module
//!
//! The stateful layout machinery that turns a molecule graph into 2D
//! coordinates.
//!
//! ## Architecture
//!
//! - **Layout** ([`layout`]) - the layout graph and the placement, smoothing
//!   and refinement passes run on it
//! - **Composition** ([`metalayout`]) - arranging independently laid out
//!   fragments in rows
//! - **Configuration** ([`config`]) - layout parameters, builder and TOML
//!   loading
//! - **Control** ([`cancellation`], [`progress`]) - cooperative cancellation
//!   and progress callbacks
//! - **Error Handling** ([`error`]) - the error type shared by the engine
//!   and the workflows

pub mod cancellation;
pub mod config;
pub mod error;
pub mod layout;
pub mod metalayout;
pub mod progress;
