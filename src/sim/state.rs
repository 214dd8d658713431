//! Level state and the types the host reads back
//!
//! One [`LevelState`] is one play-through. Once it reaches
//! [`Phase::Finished`] the host drops it and builds a new one.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::CollisionSystem;
use super::components::{Fade, Transform};
use super::ecs::{Entity, EntityStore};
use super::factory::{EntityFactory, HullSource, RectHulls};
use super::geometry::{Bounds, lerp};
use super::terrain::{TerrainFactory, TerrainSection};
use crate::config::SimConfig;
use crate::error::Result;

/// Current phase of a play-through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Running,
    Paused,
    /// The racer is gone; ticking does nothing
    Finished,
}

/// Why an entity left the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalCause {
    HealthDepleted,
    Expired,
    OutOfView,
}

/// Notifications queued during a tick, drained by the host
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// Health dropped to zero; fires once per entity
    HealthDepleted(Entity),
    Removed { entity: Entity, cause: RemovalCause },
    LevelFinished { score: f32 },
}

/// One drawable entity, in world space
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub entity: Entity,
    pub polygon: Vec<Vec2>,
    pub position: Vec2,
    pub color: [f32; 4],
}

/// Everything belonging to one play-through
pub struct LevelState {
    pub config: SimConfig,
    pub phase: Phase,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub score: f32,
    pub store: EntityStore,
    /// Handle of the player; stale once the racer is removed
    pub racer: Entity,
    /// Live terrain, bottom to top
    pub sections: VecDeque<TerrainSection>,
    /// Visible world rectangle
    pub viewport: Bounds,
    pub(crate) terrain: TerrainFactory,
    pub(crate) factory: EntityFactory,
    pub(crate) collisions: CollisionSystem,
    pub(crate) events: Vec<SimEvent>,
    /// Racer bottom at the end of the previous tick, for scoring
    pub(crate) last_racer_y: f32,
    start_y: f32,
}

impl LevelState {
    /// Spawn the racer and the first terrain section
    pub fn new(config: SimConfig) -> Result<Self> {
        Self::with_hulls(config, Box::new(RectHulls))
    }

    pub fn with_hulls(config: SimConfig, hulls: Box<dyn HullSource>) -> Result<Self> {
        config.validate()?;

        let factory = EntityFactory::with_hulls(&config, hulls);
        let mut store = EntityStore::new();
        let racer = factory.spawn_racer(&mut store, config.racer.start)?;
        let racer_bounds = Bounds::from_corner(config.racer.start, config.racer.size);

        let mut terrain = TerrainFactory::new(
            config.terrain.clone(),
            racer_bounds,
            config.score.max_difficulty_height,
            config.seed,
        );
        let (left, right) = terrain.initial_vertices(racer_bounds);
        let geometry = terrain.generate(left, right, config.terrain.section_height)?;
        let first = TerrainSection::spawn(&mut store, &factory, &geometry)?;

        let viewport_size = config.camera.viewport_size;
        let viewport = Bounds::from_corner(
            Vec2::new(
                racer_bounds.center().x - viewport_size.x / 2.0,
                racer_bounds.bottom() - config.camera.follow_offset,
            ),
            viewport_size,
        );

        log::info!(
            "level started: seed {}, first section [{:.1}, {:.1}]",
            config.seed,
            first.bottom,
            first.top
        );

        Ok(Self {
            phase: Phase::Running,
            time_ticks: 0,
            score: 0.0,
            store,
            racer,
            sections: VecDeque::from([first]),
            viewport,
            terrain,
            factory,
            collisions: CollisionSystem::default(),
            events: Vec::new(),
            last_racer_y: racer_bounds.bottom(),
            start_y: racer_bounds.bottom(),
            config,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn racer_bounds(&self) -> Option<Bounds> {
        self.store.get::<Transform>(self.racer).map(Transform::bounds)
    }

    /// Normalised climb toward the maximum-difficulty height
    pub fn progress_ratio(&self, y: f32) -> f32 {
        ((y - self.start_y) / self.config.score.max_difficulty_height).clamp(0.0, 1.0)
    }

    /// Score multiplier at height `y`
    pub fn difficulty_multiplier(&self, y: f32) -> f32 {
        lerp(1.0, self.config.score.max_multiplier, self.progress_ratio(y))
    }

    pub fn topmost_section(&self) -> Option<&TerrainSection> {
        self.sections.back()
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Every entity with a shape, in store order
    pub fn snapshot(&self) -> Vec<RenderItem> {
        self.store
            .iter::<Transform>()
            .map(|(entity, transform)| RenderItem {
                entity,
                polygon: transform.world_vertices().to_vec(),
                position: transform.position(),
                color: self
                    .store
                    .get::<Fade>(entity)
                    .map_or([1.0; 4], Fade::color),
            })
            .collect()
    }

    /// Generate and spawn the section above the current topmost one
    pub(crate) fn push_section(&mut self) -> Result<()> {
        let Some(top) = self.sections.back() else {
            return Ok(());
        };
        let (left, right) = (top.left_top, top.right_top);
        let geometry = self
            .terrain
            .generate(left, right, self.config.terrain.section_height)?;
        let section = TerrainSection::spawn(&mut self.store, &self.factory, &geometry)?;
        log::info!(
            "section spawned [{:.1}, {:.1}] with {} obstacles",
            section.bottom,
            section.top,
            section.obstacles.len()
        );
        self.sections.push_back(section);
        Ok(())
    }
}
