use thiserror::Error;

use super::config::ConfigError;
use crate::core::graph::GraphError;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Graph error: {source}")]
    Graph {
        #[from]
        source: GraphError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Layout cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Invalid S-group #{index}: {message}")]
    InvalidSGroup { index: usize, message: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
