//! Error types for the simulation core
//!
//! Every variant is fatal for the current level: the host is expected to log
//! it and start a fresh simulation rather than recover mid-tick.

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },

    #[error("polygon is self-intersecting")]
    SelfIntersecting,

    #[error("could not locate cliff x at y = {y}")]
    CliffNotFound { y: f32 },

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("no hull registered for sprite: {0}")]
    UnknownHull(String),

    #[error("no waypoints queued")]
    NoWaypoints,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
