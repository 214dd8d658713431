//! Entity assembly
//!
//! Every entity type the level knows about is put together here, either
//! directly (`spawn_racer`, `spawn_terrain`) or by name through [`spawn`],
//! which is what spawn-on-death and emitters use.
//!
//! [`spawn`]: EntityFactory::spawn

use glam::Vec2;

use super::components::{
    Acceleration, Collision, CollisionCategory, DamageOnCollision, Emitter, Fade,
    FragmentOnDeath, Health, OutOfViewDeath, RacerControl, SpawnOnDeath, Speed, TimedLife,
    Transform, Velocity, Waypoints,
};
use super::ecs::{Entity, EntityStore};
use super::geometry::{Bounds, rect_vertices};
use crate::config::{FragmentConfig, RacerConfig, SimConfig};
use crate::error::{Result, SimError};

pub const RACER: &str = "racer";
pub const EXPLOSION: &str = "explosion";
pub const SMOKE: &str = "smoke";

/// Seconds an explosion or smoke puff lingers
const EFFECT_LIFETIME: f32 = 1.0;
/// Smoke puff size relative to the racer
const SMOKE_SCALE: f32 = 0.3;

/// Silhouette lookup by sprite name
///
/// Returns a convex polygon of the given size with its bottom-left corner at
/// the origin.
pub trait HullSource {
    fn hull(&self, name: &str, size: Vec2) -> Result<Vec<Vec2>>;
}

/// Every sprite is a rectangle
#[derive(Debug, Clone, Copy, Default)]
pub struct RectHulls;

impl HullSource for RectHulls {
    fn hull(&self, _name: &str, size: Vec2) -> Result<Vec<Vec2>> {
        Ok(rect_vertices(size.x, size.y))
    }
}

pub struct EntityFactory {
    racer: RacerConfig,
    fragments: FragmentConfig,
    hazard_damage: f32,
    hulls: Box<dyn HullSource>,
}

impl EntityFactory {
    pub fn new(config: &SimConfig) -> Self {
        Self::with_hulls(config, Box::new(RectHulls))
    }

    pub fn with_hulls(config: &SimConfig, hulls: Box<dyn HullSource>) -> Self {
        Self {
            racer: config.racer.clone(),
            fragments: config.fragments.clone(),
            hazard_damage: config.hazard_damage,
            hulls,
        }
    }

    /// Spawn a named entity type centred on `center`
    pub fn spawn(&self, store: &mut EntityStore, kind: &str, center: Vec2) -> Result<Entity> {
        let entity = match kind {
            RACER => self.spawn_racer(store, center - self.racer.size * 0.5)?,
            EXPLOSION => self.spawn_explosion(store)?,
            SMOKE => self.spawn_smoke(store)?,
            _ => return Err(SimError::UnknownEntityType(kind.to_string())),
        };
        if let Some(transform) = store.get_mut::<Transform>(entity) {
            transform.set_center(center);
        }
        Ok(entity)
    }

    /// The player, with its bottom-left corner at `position`
    pub fn spawn_racer(&self, store: &mut EntityStore, position: Vec2) -> Result<Entity> {
        let size = self.racer.size;
        let hull = self.hulls.hull("objects/tank", size)?;
        let collision = Collision::new(CollisionCategory::Racer, &hull)?;

        let entity = store.spawn();
        store.insert(entity, Transform::new(hull, position));
        store.insert(entity, Velocity(Vec2::new(0.0, self.racer.velocity_y)));
        store.insert(entity, Speed(self.racer.max_speed));
        store.insert(entity, Acceleration(self.racer.acceleration));
        store.insert(entity, RacerControl);
        store.insert(entity, Waypoints::new());
        store.insert(entity, collision);
        store.insert(entity, Health::new(self.racer.health));
        store.insert(entity, SpawnOnDeath(EXPLOSION.to_string()));
        store.insert(entity, FragmentOnDeath);
        store.insert(entity, OutOfViewDeath);
        store.insert(
            entity,
            Emitter::new(
                SMOKE,
                Vec2::new(size.x / 2.0, size.y / 5.0),
                self.racer.smoke_interval,
            ),
        );
        Ok(entity)
    }

    fn spawn_explosion(&self, store: &mut EntityStore) -> Result<Entity> {
        let hull = self.hulls.hull("objects/explosion", self.racer.size)?;
        let entity = store.spawn();
        store.insert(entity, Transform::new(hull, Vec2::ZERO));
        store.insert(entity, Fade::out(EFFECT_LIFETIME));
        store.insert(entity, TimedLife::new(EFFECT_LIFETIME));
        Ok(entity)
    }

    fn spawn_smoke(&self, store: &mut EntityStore) -> Result<Entity> {
        let hull = self.hulls.hull("objects/smoke", self.racer.size * SMOKE_SCALE)?;
        let entity = store.spawn();
        store.insert(entity, Transform::new(hull, Vec2::ZERO));
        store.insert(entity, Velocity(Vec2::new(0.0, self.racer.velocity_y)));
        store.insert(entity, Fade::out(EFFECT_LIFETIME));
        store.insert(entity, TimedLife::new(EFFECT_LIFETIME));
        Ok(entity)
    }

    /// A cliff or obstacle; `polygon` is in world space
    pub fn spawn_terrain(&self, store: &mut EntityStore, polygon: &[Vec2]) -> Result<Entity> {
        let collision = Collision::new(CollisionCategory::Hazard, polygon)?;
        log::debug!(
            "terrain piece with {} vertices split into {} partitions",
            polygon.len(),
            collision.partitions().len()
        );
        let entity = store.spawn();
        store.insert(entity, Transform::new(polygon.to_vec(), Vec2::ZERO));
        store.insert(entity, collision);
        store.insert(entity, DamageOnCollision(self.hazard_damage));
        Ok(entity)
    }

    /// Break `parent` into a grid of debris flying away from its centre
    ///
    /// The parent itself is left alone.
    pub fn spawn_fragments(&self, store: &mut EntityStore, parent: Entity) -> Vec<Entity> {
        let Some(transform) = store.get::<Transform>(parent) else {
            return Vec::new();
        };
        let placement = transform.placement();
        let parent_center = transform.center();
        let local = Bounds::from_points(transform.local_vertices());
        let step = self.fragments.size;

        let mut cells = Vec::new();
        let mut x = local.left();
        while x < local.right() {
            let mut y = local.bottom();
            while y < local.top() {
                let size = Vec2::new(step.min(local.right() - x), step.min(local.top() - y));
                cells.push((Vec2::new(x, y), size));
                y += step;
            }
            x += step;
        }

        let fade_time = self.fragments.fade_time;
        let frags: Vec<Entity> = cells
            .into_iter()
            .map(|(corner, size)| {
                let mut frag_transform =
                    Transform::new(rect_vertices(size.x, size.y), placement.to_world(corner));
                frag_transform.set_rotation(placement.rotation);
                frag_transform.set_scale(placement.scale);
                let velocity =
                    (frag_transform.center() - parent_center) * self.fragments.speed_modifier;

                let frag = store.spawn();
                store.insert(frag, frag_transform);
                store.insert(frag, Velocity(velocity));
                store.insert(frag, TimedLife::new(fade_time));
                store.insert(frag, Fade::out(fade_time));
                frag
            })
            .collect();
        log::debug!("{:?} shattered into {} fragments", parent, frags.len());
        frags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoHulls;

    impl HullSource for NoHulls {
        fn hull(&self, name: &str, _size: Vec2) -> Result<Vec<Vec2>> {
            Err(SimError::UnknownHull(name.to_string()))
        }
    }

    #[test]
    fn test_racer_has_full_kit() {
        let factory = EntityFactory::new(&SimConfig::default());
        let mut store = EntityStore::new();
        let racer = factory.spawn_racer(&mut store, Vec2::new(2.0, 3.0)).unwrap();

        assert!(store.has::<RacerControl>(racer));
        assert!(store.has::<FragmentOnDeath>(racer));
        assert_eq!(store.get::<Health>(racer).unwrap().current(), 10.0);
        assert_eq!(store.get::<Velocity>(racer), Some(&Velocity(Vec2::new(0.0, 3.0))));
        assert_eq!(
            store.get::<SpawnOnDeath>(racer),
            Some(&SpawnOnDeath(EXPLOSION.to_string()))
        );
        assert_eq!(
            store.get::<Collision>(racer).unwrap().category,
            CollisionCategory::Racer
        );
        assert_eq!(store.get::<Transform>(racer).unwrap().bounds().min, Vec2::new(2.0, 3.0));
    }

    #[test]
    fn test_spawn_by_name_centres_entity() {
        let factory = EntityFactory::new(&SimConfig::default());
        let mut store = EntityStore::new();
        let smoke = factory.spawn(&mut store, SMOKE, Vec2::new(5.0, 5.0)).unwrap();
        let center = store.get::<Transform>(smoke).unwrap().center();
        assert!((center - Vec2::new(5.0, 5.0)).length() < 1e-5);
        assert!(store.has::<TimedLife>(smoke));
        assert!(!store.has::<Collision>(smoke));
    }

    #[test]
    fn test_unknown_type_is_error() {
        let factory = EntityFactory::new(&SimConfig::default());
        let mut store = EntityStore::new();
        let result = factory.spawn(&mut store, "meteor", Vec2::ZERO);
        assert!(matches!(result, Err(SimError::UnknownEntityType(name)) if name == "meteor"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_hull_propagates() {
        let factory = EntityFactory::with_hulls(&SimConfig::default(), Box::new(NoHulls));
        let mut store = EntityStore::new();
        assert!(matches!(
            factory.spawn(&mut store, EXPLOSION, Vec2::ZERO),
            Err(SimError::UnknownHull(_))
        ));
    }

    #[test]
    fn test_fragments_cover_parent_and_fly_outward() {
        let factory = EntityFactory::new(&SimConfig::default());
        let mut store = EntityStore::new();
        let racer = factory.spawn_racer(&mut store, Vec2::ZERO).unwrap();
        let frags = factory.spawn_fragments(&mut store, racer);

        // 1x1 racer, 0.25 pieces
        assert_eq!(frags.len(), 16);
        for frag in frags {
            let transform = store.get::<Transform>(frag).unwrap();
            let Velocity(v) = *store.get::<Velocity>(frag).unwrap();
            let outward = transform.center() - Vec2::splat(0.5);
            assert!(v.dot(outward) > 0.0);
            assert!(store.has::<Fade>(frag) && store.has::<TimedLife>(frag));
        }
    }
}
