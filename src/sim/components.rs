//! Component types attached to entities in the [`EntityStore`](super::ecs::EntityStore)

use std::cell::OnceCell;
use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::decompose::decompose;
use super::ecs::Component;
use super::geometry::{Bounds, centroid, transform_point, transform_vertices};
use crate::error::{Result, SimError};

/// Scale, rotation (radians) and position of an entity, without its polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Placement {
    #[inline]
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        transform_point(local, self.position, self.rotation, self.scale)
    }
}

/// Position, orientation and shape of an entity
///
/// The world-space ring is derived from the local polygon on first access and
/// invalidated by every setter.
#[derive(Debug, Clone)]
pub struct Transform {
    local: Vec<Vec2>,
    position: Vec2,
    rotation: f32,
    scale: Vec2,
    world: OnceCell<Vec<Vec2>>,
}

impl Transform {
    pub fn new(local: Vec<Vec2>, position: Vec2) -> Self {
        Self {
            local,
            position,
            rotation: 0.0,
            scale: Vec2::ONE,
            world: OnceCell::new(),
        }
    }

    pub fn local_vertices(&self) -> &[Vec2] {
        &self.local
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.world.take();
    }

    pub fn translate(&mut self, offset: Vec2) {
        self.set_position(self.position + offset);
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
        self.world.take();
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
        self.world.take();
    }

    pub fn placement(&self) -> Placement {
        Placement {
            position: self.position,
            rotation: self.rotation,
            scale: self.scale,
        }
    }

    pub fn world_vertices(&self) -> &[Vec2] {
        self.world
            .get_or_init(|| transform_vertices(&self.local, self.position, self.rotation, self.scale))
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::from_points(self.world_vertices())
    }

    pub fn center(&self) -> Vec2 {
        self.bounds().center()
    }

    /// Move so the world bounds are centred on `center`
    pub fn set_center(&mut self, center: Vec2) {
        let offset = center - self.center();
        self.translate(offset);
    }
}

impl Component for Transform {}

/// Collision filter tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionCategory {
    Racer,
    Hazard,
}

/// One convex piece of an entity's collision shape
///
/// `local` is relative to `offset`, the piece's centroid in the owner's local
/// space. `world` is rebuilt from the owner's placement every tick.
#[derive(Debug, Clone)]
pub struct Partition {
    offset: Vec2,
    local: Vec<Vec2>,
    world: Vec<Vec2>,
}

impl Partition {
    /// Build from a convex ring in owner-local coordinates
    pub fn new(vertices: &[Vec2]) -> Self {
        let offset = centroid(vertices);
        let local: Vec<Vec2> = vertices.iter().map(|&v| v - offset).collect();
        Self {
            offset,
            world: vertices.to_vec(),
            local,
        }
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn local_vertices(&self) -> &[Vec2] {
        &self.local
    }

    pub fn world_vertices(&self) -> &[Vec2] {
        &self.world
    }

    pub fn refresh(&mut self, placement: &Placement) {
        let offset = self.offset;
        self.world.clear();
        self.world
            .extend(self.local.iter().map(|&v| placement.to_world(offset + v)));
    }
}

/// Collision category plus the convex partitions of the entity's polygon
#[derive(Debug, Clone)]
pub struct Collision {
    pub category: CollisionCategory,
    pub active: bool,
    partitions: Vec<Partition>,
}

impl Collision {
    /// Decompose `polygon` (owner-local space) into convex partitions
    pub fn new(category: CollisionCategory, polygon: &[Vec2]) -> Result<Self> {
        let partitions = decompose(polygon)?
            .iter()
            .map(|ring| Partition::new(ring))
            .collect();
        Ok(Self {
            category,
            active: true,
            partitions,
        })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn refresh(&mut self, placement: &Placement) {
        for partition in &mut self.partitions {
            partition.refresh(placement);
        }
    }

    /// Bounds of all world-space partitions
    pub fn world_bounds(&self) -> Bounds {
        let points: Vec<Vec2> = self
            .partitions
            .iter()
            .flat_map(|p| p.world.iter().copied())
            .collect();
        Bounds::from_points(&points)
    }
}

impl Component for Collision {}

/// Hit points with a one-shot depletion latch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    current: f32,
    max: f32,
    depleted: bool,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self {
            current: max,
            max,
            depleted: false,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_depleted(&self) -> bool {
        self.depleted
    }

    /// Subtract `amount`; true only on the call that first drops health to zero
    ///
    /// Health keeps going negative on later calls but never re-reports.
    pub fn decrease(&mut self, amount: f32) -> bool {
        self.current -= amount;
        if self.current <= 0.0 && !self.depleted {
            self.depleted = true;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.current = self.max;
        self.depleted = false;
    }
}

impl Component for Health {}

/// Linear velocity in world units per second
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);
impl Component for Velocity {}

/// Maximum speed, used by waypoint following and velocity clamping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed(pub f32);
impl Component for Speed {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration(pub f32);
impl Component for Acceleration {}

/// Damage dealt to whatever this entity collides with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOnCollision(pub f32);
impl Component for DamageOnCollision {}

/// Seconds until the entity is removed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedLife {
    pub remaining: f32,
}

impl TimedLife {
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }

    /// Count down; true once the lifespan is used up
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }
}

impl Component for TimedLife {}

/// Named entity type spawned where this entity dies
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnOnDeath(pub String);
impl Component for SpawnOnDeath {}

/// Shatter into debris when removed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FragmentOnDeath;
impl Component for FragmentOnDeath {}

/// Removed once its bounds fall entirely below the viewport
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OutOfViewDeath;
impl Component for OutOfViewDeath {}

/// Marks the entity steered by player input
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RacerControl;
impl Component for RacerControl {}

/// Periodically spawns a named entity at a local offset
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    pub kind: String,
    pub local_offset: Vec2,
    pub interval: f32,
    elapsed: f32,
}

impl Emitter {
    pub fn new(kind: impl Into<String>, local_offset: Vec2, interval: f32) -> Self {
        Self {
            kind: kind.into(),
            local_offset,
            interval,
            elapsed: 0.0,
        }
    }

    /// Advance the timer; true when an emission is due
    ///
    /// Time past the interval carries over to the next period.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            return true;
        }
        false
    }
}

impl Component for Emitter {}

/// RGBA fade over a fixed duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub from: [f32; 4],
    pub to: [f32; 4],
    pub duration: f32,
    elapsed: f32,
}

impl Fade {
    pub fn new(from: [f32; 4], to: [f32; 4], duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: 0.0,
        }
    }

    /// Opaque white to fully transparent
    pub fn out(duration: f32) -> Self {
        Self::new([1.0; 4], [1.0, 1.0, 1.0, 0.0], duration)
    }

    pub fn tick(&mut self, dt: f32) {
        self.elapsed = (self.elapsed + dt).min(self.duration);
    }

    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            self.elapsed / self.duration
        }
    }

    pub fn color(&self) -> [f32; 4] {
        let t = self.progress();
        std::array::from_fn(|i| self.from[i] + (self.to[i] - self.from[i]) * t)
    }
}

impl Component for Fade {}

/// Queue of target positions followed at the entity's [`Speed`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Waypoints {
    points: VecDeque<Vec2>,
    /// Distance to keep between the entity centre and the last waypoint
    pub end_buffer: f32,
}

impl Waypoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_waypoints(&self) -> bool {
        !self.points.is_empty()
    }

    pub fn current(&self) -> Result<Vec2> {
        self.points.front().copied().ok_or(SimError::NoWaypoints)
    }

    pub fn pop_current(&mut self) -> Result<Vec2> {
        self.points.pop_front().ok_or(SimError::NoWaypoints)
    }

    pub fn push(&mut self, waypoint: Vec2) {
        self.points.push_back(waypoint);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec2> {
        self.points.iter()
    }

    /// Horizontal distance from `start_x` through every queued waypoint
    pub fn horizontal_path_length(&self, start_x: f32) -> f32 {
        let mut previous = start_x;
        let mut total = 0.0;
        for p in &self.points {
            total += (p.x - previous).abs();
            previous = p.x;
        }
        total
    }
}

impl Component for Waypoints {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::geometry::rect_vertices;

    #[test]
    fn test_health_depletion_fires_once_exact() {
        let mut health = Health::new(10.0);
        assert!(health.decrease(10.0));
        assert!(!health.decrease(1.0));
        assert!(health.is_depleted());
    }

    #[test]
    fn test_health_depletion_fires_once_overkill() {
        let mut health = Health::new(10.0);
        let fired = [health.decrease(11.0), health.decrease(5.0), health.decrease(100.0)];
        assert_eq!(fired.iter().filter(|&&f| f).count(), 1);
        assert!(health.current() < 0.0);
    }

    #[test]
    fn test_health_reset_rearms_latch() {
        let mut health = Health::new(3.0);
        assert!(!health.decrease(1.0));
        assert!(health.decrease(5.0));
        health.reset();
        assert_eq!(health.current(), 3.0);
        assert!(health.decrease(3.0));
    }

    #[test]
    fn test_transform_world_cache_invalidated() {
        let mut t = Transform::new(rect_vertices(1.0, 1.0), Vec2::ZERO);
        assert_eq!(t.bounds().max, Vec2::ONE);
        t.set_position(Vec2::new(5.0, 2.0));
        assert_eq!(t.bounds().min, Vec2::new(5.0, 2.0));
        t.set_scale(Vec2::splat(2.0));
        assert_eq!(t.bounds().max, Vec2::new(7.0, 4.0));
    }

    #[test]
    fn test_set_center() {
        let mut t = Transform::new(rect_vertices(2.0, 2.0), Vec2::ZERO);
        t.set_center(Vec2::new(10.0, 10.0));
        assert!((t.position() - Vec2::new(9.0, 9.0)).length() < 1e-5);
    }

    #[test]
    fn test_partition_refresh_follows_placement() {
        let mut collision =
            Collision::new(CollisionCategory::Racer, &rect_vertices(2.0, 1.0)).unwrap();
        let placement = Placement {
            position: Vec2::new(3.0, 4.0),
            rotation: std::f32::consts::PI,
            scale: Vec2::ONE,
        };
        collision.refresh(&placement);
        let bounds = collision.world_bounds();
        assert!((bounds.min - Vec2::new(1.0, 3.0)).length() < 1e-4);
        assert!((bounds.max - Vec2::new(3.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn test_waypoints_empty_queue_errors() {
        let mut waypoints = Waypoints::new();
        assert!(matches!(waypoints.current(), Err(SimError::NoWaypoints)));
        assert!(matches!(waypoints.pop_current(), Err(SimError::NoWaypoints)));
        waypoints.push(Vec2::new(3.0, 4.0));
        waypoints.push(Vec2::new(1.0, 9.0));
        assert_eq!(waypoints.horizontal_path_length(0.0), 5.0);
        assert_eq!(waypoints.pop_current().unwrap(), Vec2::new(3.0, 4.0));
        assert_eq!(waypoints.current().unwrap(), Vec2::new(1.0, 9.0));
        waypoints.clear();
        assert!(!waypoints.has_waypoints());
    }

    #[test]
    fn test_fade_color() {
        let mut fade = Fade::out(2.0);
        fade.tick(1.0);
        assert!((fade.color()[3] - 0.5).abs() < 1e-6);
        fade.tick(5.0);
        assert_eq!(fade.color()[3], 0.0);
    }

    #[test]
    fn test_emitter_carries_overshoot() {
        let mut emitter = Emitter::new("smoke", Vec2::ZERO, 0.5);
        assert!(emitter.tick(0.75));
        // 0.25 left over from the first period
        assert!(emitter.tick(0.25));
        assert!(!emitter.tick(0.25));
    }

    #[test]
    fn test_emitter_and_timed_life() {
        let mut emitter = Emitter::new("smoke", Vec2::ZERO, 0.2);
        assert!(!emitter.tick(0.1));
        assert!(emitter.tick(0.1));
        assert!(!emitter.tick(0.1));

        let mut life = TimedLife::new(1.0);
        assert!(!life.tick(0.5));
        assert!(life.tick(0.5));
    }
}
