//! Error types for configuration and simulation setup
//!
//! Only configuration misuse is fatal. Per-frame numeric edge cases (empty
//! cells, degenerate directions, corrupted voxel references) are absorbed
//! locally by the stages and never surface here.

use thiserror::Error;

/// Errors raised while loading or writing a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file format is not supported
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine config format from path: {0}")]
    UnknownExtension(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parsing error occurred
    #[error("parse error: {0}")]
    Parse(String),
}

/// Errors rejected at the simulation boundary
#[derive(Error, Debug)]
pub enum SimError {
    /// Resolution must be between 2 and 1024 voxels per axis
    #[error(
        "invalid resolution {0}: must be between {min} and {max}",
        min = crate::grid::MIN_RESOLUTION,
        max = crate::grid::MAX_RESOLUTION
    )]
    InvalidResolution(u32),

    /// At least one generator is required to run frames
    #[error("generator count must be at least 1")]
    NoGenerators,

    /// Explicit initial positions do not match the requested count
    #[error("expected {expected} initial positions, got {actual}")]
    PositionCountMismatch { expected: u32, actual: usize },

    /// An explicit initial position is non-finite or outside `[-1, 1]³`
    #[error("initial position {index} must be finite and inside [-1, 1]^3")]
    InvalidPosition { index: usize },

    /// Physics or analysis settings are out of range
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;
