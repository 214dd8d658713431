//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity slot)
//! - No rendering or platform dependencies

pub mod collision;
pub mod components;
pub mod decompose;
pub mod ecs;
pub mod factory;
pub mod geometry;
pub mod state;
pub mod terrain;
pub mod tick;

pub use collision::{
    CollisionFilter, CollisionResolver, CollisionSystem, DamageResolver, convex_overlap,
    refresh_partitions,
};
pub use components::{CollisionCategory, Health, Transform};
pub use decompose::decompose;
pub use ecs::{Component, Entity, EntityStore};
pub use factory::{EntityFactory, HullSource, RectHulls};
pub use geometry::{Bounds, Edge, FloatRange};
pub use state::{LevelState, Phase, RemovalCause, RenderItem, SimEvent};
pub use terrain::{SectionGeometry, TerrainFactory, TerrainSection};
pub use tick::{Advancer, TickInput, tick};
