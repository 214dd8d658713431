//! Fixed timestep simulation tick
//!
//! Systems run in a fixed order every tick:
//! 1. movement
//! 2. collision partition refresh
//! 3. racer input and waypoint following
//! 4. timed life and emitters
//! 5. colour fades
//! 6. collision detection and resolution
//! 7. camera, then removal of depleted, expired and out-of-view entities
//! 8. terrain streaming
//! 9. scoring

use glam::Vec2;

use super::collision::refresh_partitions;
use super::components::{
    Acceleration, Emitter, Fade, FragmentOnDeath, Health, OutOfViewDeath, RacerControl,
    SpawnOnDeath, Speed, TimedLife, Transform, Velocity, Waypoints,
};
use super::ecs::{Entity, EntityStore};
use super::geometry::EPSILON;
use super::state::{LevelState, Phase, RemovalCause, SimEvent};
use crate::consts::*;
use crate::error::Result;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Horizontal pointer drag since the last tick, in world units
    pub pointer_dx: Option<f32>,
    /// Keyboard steer axis, -1 (left) to 1 (right)
    pub steer: f32,
    /// Pause toggle
    pub pause: bool,
}

/// Advance the level by one fixed timestep
///
/// Errors are fatal for the level. The tick may be partly applied, so the
/// host should discard the state and start a new level.
pub fn tick(state: &mut LevelState, input: &TickInput, dt: f32) -> Result<()> {
    if input.pause {
        match state.phase {
            Phase::Running => {
                state.phase = Phase::Paused;
                log::info!("paused at tick {}", state.time_ticks);
            }
            Phase::Paused => {
                state.phase = Phase::Running;
                log::info!("resumed at tick {}", state.time_ticks);
            }
            Phase::Finished => {}
        }
    }
    if state.phase != Phase::Running {
        return Ok(());
    }
    state.time_ticks += 1;

    integrate_motion(&mut state.store, dt);
    refresh_partitions(&mut state.store);
    apply_racer_input(&mut state.store, input, dt)?;
    follow_waypoints(&mut state.store, dt)?;

    let mut removals = expire_timed(&mut state.store, dt);
    run_emitters(state, dt)?;
    update_fades(&mut state.store, dt);

    state
        .collisions
        .check_collisions(&mut state.store, &mut state.events);

    follow_camera(state, dt);
    removals.extend(depleted(&state.store));
    removals.extend(out_of_view(state));
    process_removals(state, removals)?;

    stream_terrain(state)?;
    accumulate_score(state);
    Ok(())
}

fn integrate_motion(store: &mut EntityStore, dt: f32) {
    for entity in store.with::<Velocity>() {
        let Some(&Velocity(v)) = store.get::<Velocity>(entity) else {
            continue;
        };
        if let Some(transform) = store.get_mut::<Transform>(entity) {
            transform.translate(v * dt);
        }
    }
}

fn apply_racer_input(store: &mut EntityStore, input: &TickInput, dt: f32) -> Result<()> {
    for entity in store.with::<RacerControl>() {
        if let Some(dx) = input.pointer_dx.filter(|dx| *dx != 0.0) {
            retarget_waypoint(store, entity, dx)?;
        }
        if input.steer != 0.0 {
            steer(store, entity, input.steer.clamp(-1.0, 1.0), dt);
        }
    }
    Ok(())
}

/// Replace the waypoint queue with a point `dx` to the side
///
/// A drag that continues toward the current waypoint extends it rather than
/// restarting from the racer.
fn retarget_waypoint(store: &mut EntityStore, entity: Entity, dx: f32) -> Result<()> {
    let Some(center) = store.get::<Transform>(entity).map(Transform::center) else {
        return Ok(());
    };
    let Some(waypoints) = store.get_mut::<Waypoints>(entity) else {
        return Ok(());
    };

    let mut start = center;
    if waypoints.has_waypoints() {
        let current = waypoints.current()?;
        let offset = current.x - center.x;
        if offset != 0.0 && (offset > 0.0) == (dx > 0.0) {
            start = current;
        }
    }
    waypoints.clear();
    waypoints.push(start + Vec2::new(dx, 0.0));
    Ok(())
}

/// Accelerate sideways, keeping total speed within [`Speed`]
fn steer(store: &mut EntityStore, entity: Entity, axis: f32, dt: f32) {
    let (Some(&Speed(max_speed)), Some(&Acceleration(acceleration))) = (
        store.get::<Speed>(entity),
        store.get::<Acceleration>(entity),
    ) else {
        return;
    };
    if let Some(Velocity(v)) = store.get_mut::<Velocity>(entity) {
        v.x += acceleration * axis * dt;
        *v = v.clamp_length_max(max_speed);
    }
}

/// Slide each follower sideways toward its waypoints at its [`Speed`]
fn follow_waypoints(store: &mut EntityStore, dt: f32) -> Result<()> {
    for entity in store.with::<Waypoints>() {
        let (Some(&Speed(speed)), Some(center)) = (
            store.get::<Speed>(entity),
            store.get::<Transform>(entity).map(Transform::center),
        ) else {
            continue;
        };
        let Some(waypoints) = store.get_mut::<Waypoints>(entity) else {
            continue;
        };

        let remaining = waypoints.horizontal_path_length(center.x) - waypoints.end_buffer;
        let mut budget = if remaining > 0.0 { speed * dt } else { 0.0 };
        let mut x = center.x;
        while waypoints.has_waypoints() && budget > EPSILON {
            let offset = waypoints.current()?.x - x;
            if budget < offset.abs() {
                x += budget * offset.signum();
                budget = 0.0;
            } else {
                x += offset;
                budget -= offset.abs();
                waypoints.pop_current()?;
            }
        }

        if let Some(transform) = store.get_mut::<Transform>(entity) {
            transform.translate(Vec2::new(x - center.x, 0.0));
        }
    }
    Ok(())
}

fn expire_timed(store: &mut EntityStore, dt: f32) -> Vec<(Entity, RemovalCause)> {
    let mut expired = Vec::new();
    for entity in store.with::<TimedLife>() {
        if let Some(life) = store.get_mut::<TimedLife>(entity) {
            if life.tick(dt) {
                expired.push((entity, RemovalCause::Expired));
            }
        }
    }
    expired
}

fn run_emitters(state: &mut LevelState, dt: f32) -> Result<()> {
    for entity in state.store.with::<Emitter>() {
        let Some(placement) = state.store.get::<Transform>(entity).map(Transform::placement)
        else {
            continue;
        };
        let Some(emitter) = state.store.get_mut::<Emitter>(entity) else {
            continue;
        };
        if !emitter.tick(dt) {
            continue;
        }
        let kind = emitter.kind.clone();
        let at = placement.to_world(emitter.local_offset);

        let spawned = state.factory.spawn(&mut state.store, &kind, at)?;
        if let Some(transform) = state.store.get_mut::<Transform>(spawned) {
            transform.set_rotation(placement.rotation);
            transform.set_center(at);
        }
    }
    Ok(())
}

fn update_fades(store: &mut EntityStore, dt: f32) {
    for entity in store.with::<Fade>() {
        if let Some(fade) = store.get_mut::<Fade>(entity) {
            fade.tick(dt);
        }
    }
}

/// Scroll up at the configured speed, faster if the racer gets too high
///
/// The viewport never moves down.
fn follow_camera(state: &mut LevelState, dt: f32) {
    let camera = &state.config.camera;
    let mut bottom = state.viewport.bottom() + camera.scroll_speed * dt;
    if let Some(racer) = state.racer_bounds() {
        bottom = bottom.max(racer.bottom() - camera.follow_offset);
    }
    let rise = bottom - state.viewport.bottom();
    if rise > 0.0 {
        state.viewport = state.viewport.translated(Vec2::new(0.0, rise));
    }
}

fn depleted(store: &EntityStore) -> Vec<(Entity, RemovalCause)> {
    store
        .iter::<Health>()
        .filter(|(_, health)| health.is_depleted())
        .map(|(entity, _)| (entity, RemovalCause::HealthDepleted))
        .collect()
}

fn out_of_view(state: &LevelState) -> Vec<(Entity, RemovalCause)> {
    let floor = state.viewport.bottom();
    state
        .store
        .with::<OutOfViewDeath>()
        .into_iter()
        .filter(|&entity| {
            state
                .store
                .get::<Transform>(entity)
                .is_some_and(|t| t.bounds().top() < floor)
        })
        .map(|entity| (entity, RemovalCause::OutOfView))
        .collect()
}

/// Remove entities, spawning their death effects first
fn process_removals(state: &mut LevelState, removals: Vec<(Entity, RemovalCause)>) -> Result<()> {
    for (entity, cause) in removals {
        // Listed twice if e.g. depleted and expired in the same tick
        if !state.store.contains(entity) {
            continue;
        }

        // Death effects need a place to appear
        if let Some(center) = state.store.get::<Transform>(entity).map(Transform::center) {
            if let Some(SpawnOnDeath(kind)) = state.store.get::<SpawnOnDeath>(entity).cloned() {
                log::debug!("{:?} spawns {} on death", entity, kind);
                state.factory.spawn(&mut state.store, &kind, center)?;
            }
            if state.store.has::<FragmentOnDeath>(entity) {
                state.factory.spawn_fragments(&mut state.store, entity);
            }
        }

        state.store.despawn(entity);
        log::debug!("{:?} removed: {:?}", entity, cause);
        state.events.push(SimEvent::Removed { entity, cause });

        if entity == state.racer {
            state.phase = Phase::Finished;
            log::info!(
                "level finished at tick {} ({:?}), score {:.0}",
                state.time_ticks,
                cause,
                state.score
            );
            state.events.push(SimEvent::LevelFinished { score: state.score });
        }
    }
    Ok(())
}

/// Add a section when the top one comes within reach, drop those scrolled past
fn stream_terrain(state: &mut LevelState) -> Result<()> {
    let reach = state.config.terrain.section_height;
    let viewport_top = state.viewport.top();
    if state
        .topmost_section()
        .is_some_and(|top| top.top - viewport_top <= reach)
    {
        state.push_section()?;
    }

    let floor = state.viewport.bottom();
    while state.sections.front().is_some_and(|s| s.top < floor) {
        if let Some(section) = state.sections.pop_front() {
            let removed = section.despawn(&mut state.store);
            log::info!(
                "section discarded [{:.1}, {:.1}], {} entities",
                section.bottom,
                section.top,
                removed
            );
        }
    }
    Ok(())
}

/// Score net upward movement, weighted by height
fn accumulate_score(state: &mut LevelState) {
    let Some(racer) = state.racer_bounds() else {
        return;
    };
    let y = racer.bottom();
    let climb = y - state.last_racer_y;
    if climb > 0.0 {
        let points = climb * state.config.score.points_per_unit * state.difficulty_multiplier(y);
        state.score += points;
    }
    state.last_racer_y = y;
}

/// Runs whole fixed ticks out of variable host frame times
#[derive(Debug, Clone, Default)]
pub struct Advancer {
    accumulator: f32,
}

impl Advancer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one host frame; returns the number of ticks run
    ///
    /// One-shot input (pause, pointer drag) applies to the first tick only.
    /// Time beyond `MAX_SUBSTEPS` ticks is dropped.
    pub fn advance(
        &mut self,
        state: &mut LevelState,
        input: &TickInput,
        frame_dt: f32,
    ) -> Result<u32> {
        self.accumulator += frame_dt.max(0.0);
        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_SUBSTEPS {
            if steps == 0 {
                tick(state, input, SIM_DT)?;
            } else {
                let held = TickInput {
                    steer: input.steer,
                    ..Default::default()
                };
                tick(state, &held, SIM_DT)?;
            }
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        if steps == MAX_SUBSTEPS {
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        Ok(steps)
    }
}
