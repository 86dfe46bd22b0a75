//! Error types for the RL core library

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// Environment-related errors
    #[error("Environment error: {0}")]
    Environment(String),

    /// Replay buffer sampled before it holds enough transitions
    #[error("Insufficient data: requested {requested} transitions, buffer holds {available}")]
    InsufficientData {
        /// Number of transitions asked for
        requested: usize,
        /// Number of transitions resident
        available: usize,
    },

    /// Action index outside of the action space
    #[error("Invalid action: {action} is outside of [0, {num_actions})")]
    InvalidAction {
        /// Offending action index
        action: usize,
        /// Size of the discrete action space
        num_actions: usize,
    },

    /// NaN or infinity in a loss or gradient
    #[error("Non-finite value in {0}")]
    NonFinite(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkpoint could not be restored
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Array shape error
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;
