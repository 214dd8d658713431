//! Polygon collision detection and effect resolution
//!
//! Every pair of entities with an active [`Collision`] is tested each tick.
//! Partitions are convex, so the narrow phase is a separating axis test; a
//! bounding box check rejects most pairs before that. Touching shapes do not
//! collide.
//!
//! Overlap alone does nothing. Effects come from [`CollisionResolver`]s, which
//! are called for both orderings of a colliding pair and consult the
//! [`CollisionFilter`] to decide whether the categories involved interact.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::components::{Collision, CollisionCategory, DamageOnCollision, Health, Transform};
use super::ecs::{Entity, EntityStore};
use super::geometry::Bounds;
use super::state::SimEvent;

/// Which collider categories affect which target categories
#[derive(Debug, Clone, Default)]
pub struct CollisionFilter {
    links: HashMap<CollisionCategory, HashSet<CollisionCategory>>,
}

impl CollisionFilter {
    /// Filter with no links: nothing affects anything
    pub fn new() -> Self {
        Self::default()
    }

    /// Hazards damage the racer and nothing else
    pub fn standard() -> Self {
        Self::new().with_link(CollisionCategory::Hazard, CollisionCategory::Racer)
    }

    pub fn with_link(mut self, collider: CollisionCategory, target: CollisionCategory) -> Self {
        self.link(collider, target);
        self
    }

    pub fn link(&mut self, collider: CollisionCategory, target: CollisionCategory) {
        self.links.entry(collider).or_default().insert(target);
    }

    /// One-directional: `can_collide(a, b)` says nothing about `(b, a)`
    pub fn can_collide(&self, collider: CollisionCategory, target: CollisionCategory) -> bool {
        self.links
            .get(&collider)
            .is_some_and(|targets| targets.contains(&target))
    }
}

/// Applies a one-directional effect of `collider` hitting `target`
pub trait CollisionResolver {
    fn resolve(
        &self,
        store: &mut EntityStore,
        filter: &CollisionFilter,
        collider: Entity,
        target: Entity,
        events: &mut Vec<SimEvent>,
    );
}

/// Deals the collider's [`DamageOnCollision`] to the target's [`Health`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageResolver;

impl CollisionResolver for DamageResolver {
    fn resolve(
        &self,
        store: &mut EntityStore,
        filter: &CollisionFilter,
        collider: Entity,
        target: Entity,
        events: &mut Vec<SimEvent>,
    ) {
        let (Some(from), Some(to)) = (
            store.get::<Collision>(collider).map(|c| c.category),
            store.get::<Collision>(target).map(|c| c.category),
        ) else {
            return;
        };
        if !filter.can_collide(from, to) {
            return;
        }
        let Some(&DamageOnCollision(damage)) = store.get::<DamageOnCollision>(collider) else {
            return;
        };
        let Some(health) = store.get_mut::<Health>(target) else {
            return;
        };
        if health.decrease(damage) {
            log::debug!("{:?} depleted by {:?} ({} damage)", target, collider, damage);
            events.push(SimEvent::HealthDepleted(target));
        }
    }
}

/// Rebuild every partition's world polygon from its owner's current transform
///
/// Must run before [`CollisionSystem::check_collisions`] in the same tick.
pub fn refresh_partitions(store: &mut EntityStore) {
    for entity in store.with::<Collision>() {
        let Some(placement) = store.get::<Transform>(entity).map(Transform::placement) else {
            continue;
        };
        if let Some(collision) = store.get_mut::<Collision>(entity) {
            collision.refresh(&placement);
        }
    }
}

/// Filter plus ordered resolvers
pub struct CollisionSystem {
    filter: CollisionFilter,
    resolvers: Vec<Box<dyn CollisionResolver>>,
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new(CollisionFilter::standard()).with_resolver(DamageResolver)
    }
}

impl CollisionSystem {
    pub fn new(filter: CollisionFilter) -> Self {
        Self {
            filter,
            resolvers: Vec::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl CollisionResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn filter(&self) -> &CollisionFilter {
        &self.filter
    }

    /// Find all overlapping pairs and run every resolver on each, both ways
    ///
    /// Pairs are gathered before any resolver runs, so resolvers may mutate
    /// the store freely. Returns the overlapping pairs.
    pub fn check_collisions(
        &self,
        store: &mut EntityStore,
        events: &mut Vec<SimEvent>,
    ) -> Vec<(Entity, Entity)> {
        let pairs = overlapping_pairs(store);
        for &(a, b) in &pairs {
            for resolver in &self.resolvers {
                resolver.resolve(store, &self.filter, a, b, events);
                resolver.resolve(store, &self.filter, b, a, events);
            }
        }
        pairs
    }
}

/// Every unordered pair of active collision entities whose partitions overlap
pub fn overlapping_pairs(store: &EntityStore) -> Vec<(Entity, Entity)> {
    let active: Vec<(Entity, &Collision, Bounds)> = store
        .iter::<Collision>()
        .filter(|(_, c)| c.active)
        .map(|(e, c)| (e, c, c.world_bounds()))
        .collect();

    let mut pairs = Vec::new();
    for (i, (a, ca, ba)) in active.iter().enumerate() {
        for (b, cb, bb) in &active[i + 1..] {
            if ba.overlaps(bb) && shapes_overlap(ca, cb) {
                pairs.push((*a, *b));
            }
        }
    }
    pairs
}

/// True if any partition of `a` overlaps any partition of `b`
pub fn shapes_overlap(a: &Collision, b: &Collision) -> bool {
    a.partitions().iter().any(|pa| {
        let pa = pa.world_vertices();
        let bounds_a = Bounds::from_points(pa);
        b.partitions().iter().any(|pb| {
            let pb = pb.world_vertices();
            bounds_a.overlaps(&Bounds::from_points(pb)) && convex_overlap(pa, pb)
        })
    })
}

/// Separating axis test for two convex rings; touching is not overlapping
pub fn convex_overlap(a: &[Vec2], b: &[Vec2]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    !has_separating_axis(a, b) && !has_separating_axis(b, a)
}

fn has_separating_axis(poly: &[Vec2], other: &[Vec2]) -> bool {
    (0..poly.len()).any(|i| {
        let edge = poly[(i + 1) % poly.len()] - poly[i];
        let axis = edge.perp();
        if axis.length_squared() <= f32::EPSILON {
            return false;
        }
        let (min_a, max_a) = project(poly, axis);
        let (min_b, max_b) = project(other, axis);
        max_a <= min_b || max_b <= min_a
    })
}

fn project(poly: &[Vec2], axis: Vec2) -> (f32, f32) {
    poly.iter()
        .map(|p| p.dot(axis))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), d| (lo.min(d), hi.max(d)))
}
