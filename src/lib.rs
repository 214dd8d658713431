//! Slide Racer - a vertically scrolling obstacle racer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (terrain generation, collision, game loop)
//! - `config`: Data-driven tuning loaded from JSON
//! - `error`: Error type shared by everything above

pub mod config;
pub mod error;
pub mod sim;

pub use config::SimConfig;
pub use error::{Result, SimError};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
}
