//! Procedural cliff and obstacle generation
//!
//! A level is a stack of sections. Each section is two cliff polygons with a
//! path between them plus rows of obstacle pairs that leave a racer-sized gap.
//!
//! The left cliff face is a random walk upward. The right face takes one step
//! per left step, at the same heights, with its angle limited so the path
//! width stays inside a buffer range that narrows as the level climbs. Path
//! width varies linearly between paired vertices, so bounding it at the
//! vertices bounds it everywhere.
//!
//! Generation is pure: [`TerrainFactory`] produces [`SectionGeometry`] from its
//! own seeded RNG, and [`TerrainSection::spawn`] turns that into entities.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::ecs::{Entity, EntityStore};
use super::factory::EntityFactory;
use super::geometry::{Bounds, FloatRange, chain_edges, chain_x_at, lerp, max_x, min_x};
use crate::config::TerrainConfig;
use crate::error::{Result, SimError};

/// Polygons of one generated section, in world space
#[derive(Debug, Clone, PartialEq)]
pub struct SectionGeometry {
    /// Inner face of the left cliff, bottom to top
    pub left_edge: Vec<Vec2>,
    /// Inner face of the right cliff, one vertex per left vertex
    pub right_edge: Vec<Vec2>,
    /// Closed left cliff polygon
    pub left_cliff: Vec<Vec2>,
    pub right_cliff: Vec<Vec2>,
    pub obstacles: Vec<Vec<Vec2>>,
    pub bottom: f32,
    pub top: f32,
}

impl SectionGeometry {
    pub fn left_top(&self) -> Vec2 {
        *self.left_edge.last().unwrap_or(&Vec2::ZERO)
    }

    pub fn right_top(&self) -> Vec2 {
        *self.right_edge.last().unwrap_or(&Vec2::ZERO)
    }

    /// Left and right cliff X at height `y`
    pub fn path_at(&self, y: f32) -> Result<FloatRange> {
        Ok(FloatRange::new(
            cliff_x(&self.left_edge, y)?,
            cliff_x(&self.right_edge, y)?,
        ))
    }
}

/// X of a cliff face at height `y`
///
/// Cliff faces are monotonic in Y, so a miss means the generator broke.
pub fn cliff_x(edge: &[Vec2], y: f32) -> Result<f32> {
    chain_x_at(edge, y).ok_or(SimError::CliffNotFound { y })
}

/// Seeded section generator
#[derive(Debug, Clone)]
pub struct TerrainFactory {
    config: TerrainConfig,
    racer_size: Vec2,
    start_y: f32,
    max_difficulty_height: f32,
    rng: Pcg32,
}

impl TerrainFactory {
    /// `racer_bounds` sizes every buffer; its bottom is where difficulty starts
    pub fn new(
        config: TerrainConfig,
        racer_bounds: Bounds,
        max_difficulty_height: f32,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            config,
            racer_bounds,
            max_difficulty_height,
            Pcg32::seed_from_u64(seed),
        )
    }

    pub fn with_rng(
        config: TerrainConfig,
        racer_bounds: Bounds,
        max_difficulty_height: f32,
        rng: Pcg32,
    ) -> Self {
        Self {
            config,
            racer_size: racer_bounds.size(),
            start_y: racer_bounds.bottom(),
            max_difficulty_height,
            rng,
        }
    }

    /// 0 at the start of the level, 1 at maximum difficulty
    pub fn progress_ratio(&self, y: f32) -> f32 {
        ((y - self.start_y) / self.max_difficulty_height).clamp(0.0, 1.0)
    }

    /// Extra path width beyond the racer at height `y`
    pub fn path_buffer_range(&self, y: f32) -> FloatRange {
        let w = self.racer_size.x;
        FloatRange::lerp(
            &self.config.begin_buffer_ratio.scaled(w),
            &self.config.end_buffer_ratio.scaled(w),
            self.progress_ratio(y),
        )
    }

    /// Cliff start vertices centred on the racer, with the widest path
    pub fn initial_vertices(&self, racer_bounds: Bounds) -> (Vec2, Vec2) {
        let half_buffer = self.path_buffer_range(racer_bounds.bottom()).max / 2.0;
        (
            Vec2::new(racer_bounds.left() - half_buffer, racer_bounds.bottom()),
            Vec2::new(racer_bounds.right() + half_buffer, racer_bounds.bottom()),
        )
    }

    /// Generate a section of `height` starting from the given cliff vertices
    ///
    /// Both start vertices must share a Y; chained sections pass the previous
    /// section's top vertices.
    pub fn generate(
        &mut self,
        left_start: Vec2,
        right_start: Vec2,
        height: f32,
    ) -> Result<SectionGeometry> {
        if height <= 0.0 {
            return Err(SimError::Config(format!(
                "section height must be positive, got {height}"
            )));
        }
        let bottom = left_start.y;
        let top = bottom + height;
        let outside = self.racer_size.x * self.config.outside_edge_ratio;

        let left_edge = self.left_edge(left_start, top);
        let right_edge = self.right_edge(Vec2::new(right_start.x, bottom), &left_edge);
        let left_cliff = close_cliff(&left_edge, min_x(&left_edge) - outside);
        let right_cliff = close_cliff(&right_edge, max_x(&right_edge) + outside);
        let obstacles = self.obstacles(&left_edge, &right_edge, bottom, top)?;

        log::debug!(
            "generated section [{:.1}, {:.1}]: {} edge vertices, {} obstacles",
            bottom,
            top,
            left_edge.len(),
            obstacles.len()
        );

        Ok(SectionGeometry {
            left_edge,
            right_edge,
            left_cliff,
            right_cliff,
            obstacles,
            bottom,
            top,
        })
    }

    fn left_edge(&mut self, start: Vec2, top: f32) -> Vec<Vec2> {
        let step_range = self.config.edge_step_ratio.scaled(self.racer_size.y);
        let mut edge = vec![start];
        let mut previous = start;
        while previous.y < top {
            let y = (previous.y + step_range.random(&mut self.rng)).min(top);
            let angle = self.config.edge_angle_range.random(&mut self.rng);
            let x = previous.x + (y - previous.y) / angle.to_radians().tan();
            previous = Vec2::new(x, y);
            edge.push(previous);
        }
        edge
    }

    fn right_edge(&mut self, start: Vec2, left_edge: &[Vec2]) -> Vec<Vec2> {
        let global = self.config.edge_angle_range;
        let deviation = self.config.max_angle_deviation;
        let racer_width = self.racer_size.x;

        let mut edge = Vec::with_capacity(left_edge.len());
        edge.push(start);
        let mut previous = start;
        for left in chain_edges(left_edge) {
            let end_y = left.end.y;
            let dy = end_y - previous.y;
            let buffer = self.path_buffer_range(end_y);
            let x_lo = left.end.x + racer_width + buffer.min;
            let x_hi = left.end.x + racer_width + buffer.max;

            // Farther right means a shallower angle
            let path_angles = FloatRange::new(
                angle_to(previous, Vec2::new(x_hi, end_y)),
                angle_to(previous, Vec2::new(x_lo, end_y)),
            );
            let left_angle = left.angle_deg();
            let correlated = FloatRange::new(left_angle - deviation, left_angle + deviation);
            let angles = path_angles
                .intersect(&global)
                .and_then(|a| a.intersect(&correlated))
                .or_else(|| path_angles.intersect(&global))
                .unwrap_or(path_angles);

            let angle = angles.random(&mut self.rng);
            let x = (previous.x + dy / angle.to_radians().tan()).clamp(x_lo, x_hi);
            previous = Vec2::new(x, end_y);
            edge.push(previous);
        }
        edge
    }

    fn obstacles(
        &mut self,
        left_edge: &[Vec2],
        right_edge: &[Vec2],
        bottom: f32,
        top: f32,
    ) -> Result<Vec<Vec<Vec2>>> {
        let size = self.racer_size;
        let offset_range = self.config.obstacle_offset_ratio.scaled(size.y);
        let obstacle_height = size.y * self.config.obstacle_height_ratio;
        let gap_width = size.x * (1.0 + self.config.obstacle_buffer_ratio);
        let base_depth = size.x * self.config.obstacle_base_depth_ratio;

        let mut obstacles = Vec::new();
        let mut y = bottom + size.y;
        loop {
            y += offset_range.random(&mut self.rng);
            let span = FloatRange::new(y, y + obstacle_height);
            if span.max >= top {
                return Ok(obstacles);
            }

            let path = narrowest_path(left_edge, right_edge, span)?;
            let Some(path) = path.filter(|p| p.span() >= gap_width) else {
                log::warn!(
                    "skipping obstacle row at y = {:.1}: path narrower than {:.2}",
                    y,
                    gap_width
                );
                continue;
            };

            let gap_x = FloatRange::new(path.min, path.max - gap_width).random(&mut self.rng);
            obstacles.push(self.obstacle(span, gap_x, path.min - base_depth));
            obstacles.push(self.obstacle(span, gap_x + gap_width, path.max + base_depth));
        }
    }

    /// Obstacle polygon reaching from `outer_x` (inside the cliff) to `inner_x`
    fn obstacle(&mut self, span: FloatRange, inner_x: f32, outer_x: f32) -> Vec<Vec2> {
        let mut vertices = vec![Vec2::new(outer_x, span.min)];
        if self.config.sculpt_obstacles {
            vertices.extend(self.sculpted_face(span, inner_x, outer_x));
        } else {
            vertices.push(Vec2::new(inner_x, span.min));
            vertices.push(Vec2::new(inner_x, span.max));
        }
        vertices.push(Vec2::new(outer_x, span.max));
        vertices
    }

    /// Jagged inner face: the middle vertex touches `inner_x`, the others
    /// step back toward the cliff, never past halfway
    fn sculpted_face(&mut self, span: FloatRange, inner_x: f32, outer_x: f32) -> Vec<Vec2> {
        let count = self.rng.random_range(1..=self.config.max_sculpt_vertices);
        let mut ys: Vec<f32> = (0..count).map(|_| span.random(&mut self.rng)).collect();
        ys.sort_by(f32::total_cmp);

        let limit_x = lerp(inner_x, outer_x, 0.5);
        let middle = count / 2;
        let mut xs = vec![inner_x; count];
        for i in 1..=middle {
            if middle + i < count {
                xs[middle + i] = FloatRange::new(xs[middle + i - 1], limit_x).random(&mut self.rng);
            }
            xs[middle - i] = FloatRange::new(xs[middle - i + 1], limit_x).random(&mut self.rng);
        }

        xs.into_iter().zip(ys).map(|(x, y)| Vec2::new(x, y)).collect()
    }
}

/// Direction from `from` to `to`, degrees from +X
fn angle_to(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x).to_degrees()
}

/// Close a cliff face into a solid polygon reaching out to `outside_x`
fn close_cliff(edge: &[Vec2], outside_x: f32) -> Vec<Vec2> {
    let bottom = edge.first().map_or(0.0, |v| v.y);
    let top = edge.last().map_or(0.0, |v| v.y);
    let mut polygon = edge.to_vec();
    polygon.push(Vec2::new(outside_x, top));
    polygon.push(Vec2::new(outside_x, bottom));
    polygon
}

/// Free horizontal span over the whole of `span`, or `None` if the cliffs
/// leave no room
fn narrowest_path(
    left_edge: &[Vec2],
    right_edge: &[Vec2],
    span: FloatRange,
) -> Result<Option<FloatRange>> {
    // Both faces are piecewise linear, so the extremes sit at the span ends
    // or at a face vertex inside it
    let mut ys = vec![span.min, span.max];
    ys.extend(
        left_edge
            .iter()
            .chain(right_edge)
            .map(|v| v.y)
            .filter(|&y| y > span.min && y < span.max),
    );

    let mut left = f32::NEG_INFINITY;
    let mut right = f32::INFINITY;
    for y in ys {
        left = left.max(cliff_x(left_edge, y)?);
        right = right.min(cliff_x(right_edge, y)?);
    }
    Ok((left <= right).then(|| FloatRange::new(left, right)))
}

/// Entities of one spawned section
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainSection {
    pub left_cliff: Entity,
    pub right_cliff: Entity,
    pub obstacles: Vec<Entity>,
    /// Hand-off vertices for the next section
    pub left_top: Vec2,
    pub right_top: Vec2,
    pub bottom: f32,
    pub top: f32,
}

impl TerrainSection {
    /// Create hazard entities for every polygon in `geometry`
    pub fn spawn(
        store: &mut EntityStore,
        factory: &EntityFactory,
        geometry: &SectionGeometry,
    ) -> Result<Self> {
        let left_cliff = factory.spawn_terrain(store, &geometry.left_cliff)?;
        let right_cliff = factory.spawn_terrain(store, &geometry.right_cliff)?;
        let obstacles = geometry
            .obstacles
            .iter()
            .map(|polygon| factory.spawn_terrain(store, polygon))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            left_cliff,
            right_cliff,
            obstacles,
            left_top: geometry.left_top(),
            right_top: geometry.right_top(),
            bottom: geometry.bottom,
            top: geometry.top,
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        [self.left_cliff, self.right_cliff]
            .into_iter()
            .chain(self.obstacles.iter().copied())
    }

    /// Remove every entity of the section from the store
    pub fn despawn(&self, store: &mut EntityStore) -> usize {
        self.entities().filter(|&e| store.despawn(e)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::sim::components::{Collision, DamageOnCollision};
    use crate::sim::geometry::{area, is_simple};
    use proptest::prelude::*;

    fn racer_bounds(size: f32) -> Bounds {
        Bounds::from_corner(Vec2::ZERO, Vec2::splat(size))
    }

    fn factory(seed: u64, racer: Bounds) -> TerrainFactory {
        TerrainFactory::new(TerrainConfig::default(), racer, 500.0, seed)
    }

    fn first_section(f: &mut TerrainFactory, racer: Bounds, height: f32) -> SectionGeometry {
        let (left, right) = f.initial_vertices(racer);
        f.generate(left, right, height).unwrap()
    }

    fn assert_monotonic(edge: &[Vec2], top: f32) {
        for w in edge.windows(2) {
            assert!(w[1].y >= w[0].y, "y went down: {:?} -> {:?}", w[0], w[1]);
        }
        assert_eq!(edge.last().unwrap().y, top);
    }

    fn assert_path_width(geometry: &SectionGeometry, racer_width: f32) {
        let steps = 200;
        for i in 0..=steps {
            let y = lerp(geometry.bottom, geometry.top, i as f32 / steps as f32);
            let path = geometry.path_at(y).unwrap();
            assert!(
                path.span() >= racer_width - 1e-3,
                "path {:?} too narrow at y = {}",
                path,
                y
            );
        }
    }

    #[test]
    fn test_cliff_monotonic_and_ends_at_top() {
        let racer = racer_bounds(1.0);
        let mut f = factory(7, racer);
        let geometry = first_section(&mut f, racer, 80.0);
        assert_monotonic(&geometry.left_edge, 80.0);
        assert_monotonic(&geometry.right_edge, 80.0);
        assert_eq!(geometry.left_edge.len(), geometry.right_edge.len());
    }

    #[test]
    fn test_path_never_narrower_than_racer() {
        let racer = racer_bounds(1.0);
        let mut f = factory(3, racer);
        let mut geometry = first_section(&mut f, racer, 80.0);
        assert_path_width(&geometry, 1.0);
        // Later sections run at higher difficulty
        for _ in 0..8 {
            geometry = f
                .generate(geometry.left_top(), geometry.right_top(), 80.0)
                .unwrap();
            assert_path_width(&geometry, 1.0);
        }
    }

    #[test]
    fn test_path_width_tracks_buffer_range() {
        let racer = racer_bounds(1.0);
        let mut f = factory(11, racer);
        let geometry = first_section(&mut f, racer, 80.0);
        for (l, r) in geometry.left_edge.iter().zip(&geometry.right_edge).skip(1) {
            let buffer = f.path_buffer_range(l.y);
            let gap = r.x - l.x - 1.0;
            assert!(gap >= buffer.min - 1e-3 && gap <= buffer.max + 1e-3);
        }
    }

    #[test]
    fn test_same_seed_same_vertices() {
        let racer = racer_bounds(1.5);
        let a = first_section(&mut factory(99, racer), racer, 80.0);
        let b = first_section(&mut factory(99, racer), racer, 80.0);
        assert_eq!(a, b);
        let c = first_section(&mut factory(100, racer), racer, 80.0);
        assert_ne!(a.left_edge, c.left_edge);
    }

    #[test]
    fn test_injected_rng_drives_generation() {
        let racer = racer_bounds(1.5);
        let injected = |rng| TerrainFactory::with_rng(TerrainConfig::default(), racer, 500.0, rng);

        let seeded = first_section(&mut injected(Pcg32::seed_from_u64(99)), racer, 80.0);
        assert_eq!(seeded, first_section(&mut factory(99, racer), racer, 80.0));

        let a = first_section(&mut injected(Pcg32::new(0xcafe, 0xf00d)), racer, 80.0);
        let b = first_section(&mut injected(Pcg32::new(0xcafe, 0xf00d)), racer, 80.0);
        assert_eq!(a, b);
        assert_ne!(a.left_edge, seeded.left_edge);
    }

    #[test]
    fn test_scenario_b_single_section() {
        let racer = racer_bounds(1.5);
        let mut f = factory(5, racer);
        let geometry = first_section(&mut f, racer, 80.0);

        assert!((geometry.left_top().y - 80.0).abs() < 1e-4);
        assert!((geometry.right_top().y - 80.0).abs() < 1e-4);

        let begin = TerrainConfig::default().begin_buffer_ratio.scaled(1.5);
        let bottom_width = geometry.right_edge[0].x - geometry.left_edge[0].x;
        assert!(bottom_width >= 1.5 + begin.min - 1e-4);
        assert!(bottom_width <= 1.5 + begin.max + 1e-4);

        let config = SimConfig::default();
        let entity_factory = EntityFactory::new(&config);
        let mut store = EntityStore::new();
        let section = TerrainSection::spawn(&mut store, &entity_factory, &geometry).unwrap();
        assert_ne!(section.left_cliff, section.right_cliff);
        assert_eq!(store.len(), 2 + geometry.obstacles.len());
        for e in section.entities() {
            assert!(store.has::<Collision>(e));
            assert_eq!(store.get::<DamageOnCollision>(e), Some(&DamageOnCollision(100.0)));
        }
        assert_eq!(section.despawn(&mut store), 2 + geometry.obstacles.len());
        assert!(store.is_empty());
    }

    #[test]
    fn test_cliff_polygons_are_simple() {
        let racer = racer_bounds(1.0);
        let geometry = first_section(&mut factory(21, racer), racer, 80.0);
        assert!(is_simple(&geometry.left_cliff));
        assert!(is_simple(&geometry.right_cliff));
        for obstacle in &geometry.obstacles {
            assert!(area(obstacle) > 0.0);
        }
    }

    #[test]
    fn test_obstacles_leave_a_gap_inside_the_path() {
        let racer = racer_bounds(1.0);
        let mut f = factory(8, racer);
        let geometry = first_section(&mut f, racer, 200.0);
        assert!(!geometry.obstacles.is_empty());
        assert_eq!(geometry.obstacles.len() % 2, 0);

        for pair in geometry.obstacles.chunks(2) {
            let left_inner = max_x(&pair[0]);
            let right_inner = min_x(&pair[1]);
            assert!(right_inner - left_inner >= 2.0 - 1e-3);
            let y = pair[0][0].y;
            let path = geometry.path_at(y).unwrap();
            assert!(left_inner >= path.min - 1e-3 && right_inner <= path.max + 1e-3);
        }
    }

    #[test]
    fn test_straight_obstacles_are_rectangles() {
        let racer = racer_bounds(1.0);
        let config = TerrainConfig {
            sculpt_obstacles: false,
            ..TerrainConfig::default()
        };
        let mut f = TerrainFactory::new(config, racer, 500.0, 4);
        let geometry = first_section(&mut f, racer, 200.0);
        for obstacle in &geometry.obstacles {
            assert_eq!(obstacle.len(), 4);
            let bounds = Bounds::from_points(obstacle);
            assert!((area(obstacle) - bounds.width() * bounds.height()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_short_section_has_no_obstacles() {
        let racer = racer_bounds(1.0);
        let geometry = first_section(&mut factory(1, racer), racer, 4.0);
        assert!(geometry.obstacles.is_empty());
        assert_eq!(geometry.left_top().y, 4.0);
    }

    #[test]
    fn test_cliff_x_out_of_range_is_error() {
        let edge = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 10.0)];
        assert!((cliff_x(&edge, 5.0).unwrap() - 0.5).abs() < 1e-6);
        assert!(matches!(
            cliff_x(&edge, 11.0),
            Err(SimError::CliffNotFound { .. })
        ));
    }

    #[test]
    fn test_non_positive_height_rejected() {
        let racer = racer_bounds(1.0);
        let mut f = factory(1, racer);
        assert!(f.generate(Vec2::ZERO, Vec2::new(8.0, 0.0), 0.0).is_err());
    }

    proptest! {
        #[test]
        fn prop_sections_monotonic_and_wide_enough(
            seed in any::<u64>(),
            height in 10.0f32..150.0,
            size in 0.5f32..2.0,
        ) {
            let racer = racer_bounds(size);
            let mut f = factory(seed, racer);
            let first = first_section(&mut f, racer, height);
            let next = f.generate(first.left_top(), first.right_top(), height).unwrap();
            for geometry in [&first, &next] {
                for edge in [&geometry.left_edge, &geometry.right_edge] {
                    prop_assert!(edge.windows(2).all(|w| w[1].y >= w[0].y));
                    prop_assert_eq!(edge.last().unwrap().y, geometry.top);
                }
                for (l, r) in geometry.left_edge.iter().zip(&geometry.right_edge) {
                    prop_assert!(r.x - l.x >= size - 1e-3);
                }
            }
        }
    }
}
