//! Error types for round setup and simulation invariants.

use thiserror::Error;

/// Errors that can occur while setting up or advancing a round.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A pool the round draws from ran dry (e.g. no free blocks left for spawning).
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(&'static str),

    /// A position or block was expected on the grid but is not there.
    #[error("No block of the grid at ({x}, {y})")]
    BlockNotInGrid { x: f32, y: f32 },

    /// A move strategy was driven before being bound to an entity.
    #[error("Move strategy used before being bound to an entity")]
    StrategyUnbound,

    /// Round parameters that cannot produce a playable grid.
    #[error("Invalid round configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias used throughout the simulation.
pub type SimResult<T> = Result<T, SimError>;
