//! Simulation tuning
//!
//! Every number the level generator and the tick loop depend on. Loaded from
//! JSON by the host; any field left out falls back to its default.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::sim::geometry::FloatRange;

/// Terrain generator knobs; `*_ratio` values scale by the racer's size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Vertical extent of one generated section
    pub section_height: f32,
    /// Cliff edge direction in degrees from +X (90 = straight up)
    pub edge_angle_range: FloatRange,
    /// Vertical step between cliff vertices, x racer height
    pub edge_step_ratio: FloatRange,
    /// Path buffer at the start of the level, x racer width
    pub begin_buffer_ratio: FloatRange,
    /// Path buffer at maximum difficulty, x racer width
    pub end_buffer_ratio: FloatRange,
    /// How far a right edge may turn away from its paired left edge (degrees)
    pub max_angle_deviation: f32,
    /// How far the closed cliff polygon reaches outside the path, x racer width
    pub outside_edge_ratio: f32,
    /// Vertical spacing between obstacle rows, x racer height
    pub obstacle_offset_ratio: FloatRange,
    pub obstacle_height_ratio: f32,
    /// Extra gap width beyond the racer, x racer width
    pub obstacle_buffer_ratio: f32,
    /// How far obstacles sink into their cliff, x racer width
    pub obstacle_base_depth_ratio: f32,
    /// Jagged inner edges instead of straight cuts
    pub sculpt_obstacles: bool,
    pub max_sculpt_vertices: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            section_height: 80.0,
            edge_angle_range: FloatRange::new(75.0, 105.0),
            edge_step_ratio: FloatRange::new(2.0, 4.0),
            begin_buffer_ratio: FloatRange::new(5.0, 6.0),
            end_buffer_ratio: FloatRange::new(2.0, 3.0),
            max_angle_deviation: 10.0,
            outside_edge_ratio: 10.0,
            obstacle_offset_ratio: FloatRange::new(5.0, 10.0),
            obstacle_height_ratio: 1.5,
            obstacle_buffer_ratio: 1.0,
            obstacle_base_depth_ratio: 1.0,
            sculpt_obstacles: true,
            max_sculpt_vertices: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacerConfig {
    pub size: Vec2,
    /// Bottom-left corner at spawn
    pub start: Vec2,
    /// Constant climb speed
    pub velocity_y: f32,
    pub max_speed: f32,
    pub acceleration: f32,
    pub health: f32,
    /// Seconds between smoke puffs
    pub smoke_interval: f32,
}

impl Default for RacerConfig {
    fn default() -> Self {
        Self {
            size: Vec2::ONE,
            start: Vec2::new(7.5, 0.0),
            velocity_y: 3.0,
            max_speed: 10.0,
            acceleration: 10.0,
            health: 10.0,
            smoke_interval: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub viewport_size: Vec2,
    /// Minimum distance kept between the racer and the viewport bottom
    pub follow_offset: f32,
    /// Constant upward scroll in units per second
    pub scroll_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            viewport_size: Vec2::new(16.0, 12.0),
            follow_offset: 3.0,
            scroll_speed: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub points_per_unit: f32,
    /// Climb height at which difficulty and the score multiplier max out
    pub max_difficulty_height: f32,
    pub max_multiplier: f32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            points_per_unit: 10.0,
            max_difficulty_height: 500.0,
            max_multiplier: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Edge length of one debris piece
    pub size: f32,
    /// Debris velocity per unit of distance from the parent's centre
    pub speed_modifier: f32,
    /// Seconds until debris fades out and is removed
    pub fade_time: f32,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            size: 0.25,
            speed_modifier: 4.0,
            fade_time: 1.0,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub terrain: TerrainConfig,
    pub racer: RacerConfig,
    /// Damage dealt by cliffs and obstacles
    pub hazard_damage: f32,
    pub camera: CameraConfig,
    pub score: ScoreConfig,
    pub fragments: FragmentConfig,
    /// Run seed for reproducible terrain
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig::default(),
            racer: RacerConfig::default(),
            hazard_damage: 100.0,
            camera: CameraConfig::default(),
            score: ScoreConfig::default(),
            fragments: FragmentConfig::default(),
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the generator or tick loop cannot work with
    pub fn validate(&self) -> Result<()> {
        let t = &self.terrain;
        positive("terrain.section_height", t.section_height)?;
        positive("terrain.edge_step_ratio.min", t.edge_step_ratio.min)?;
        non_negative("terrain.begin_buffer_ratio.min", t.begin_buffer_ratio.min)?;
        non_negative("terrain.end_buffer_ratio.min", t.end_buffer_ratio.min)?;
        non_negative("terrain.max_angle_deviation", t.max_angle_deviation)?;
        positive("terrain.outside_edge_ratio", t.outside_edge_ratio)?;
        positive("terrain.obstacle_offset_ratio.min", t.obstacle_offset_ratio.min)?;
        positive("terrain.obstacle_height_ratio", t.obstacle_height_ratio)?;
        non_negative("terrain.obstacle_buffer_ratio", t.obstacle_buffer_ratio)?;
        non_negative("terrain.obstacle_base_depth_ratio", t.obstacle_base_depth_ratio)?;
        if t.edge_angle_range.min <= 0.0 || t.edge_angle_range.max >= 180.0 {
            return Err(SimError::Config(format!(
                "terrain.edge_angle_range must lie within (0, 180) degrees, got [{}, {}]",
                t.edge_angle_range.min, t.edge_angle_range.max
            )));
        }
        if t.max_sculpt_vertices == 0 {
            return Err(SimError::Config(
                "terrain.max_sculpt_vertices must be at least 1".into(),
            ));
        }

        positive("racer.size.x", self.racer.size.x)?;
        positive("racer.size.y", self.racer.size.y)?;
        positive("racer.max_speed", self.racer.max_speed)?;
        positive("racer.health", self.racer.health)?;
        positive("racer.smoke_interval", self.racer.smoke_interval)?;
        non_negative("hazard_damage", self.hazard_damage)?;

        positive("camera.viewport_size.x", self.camera.viewport_size.x)?;
        positive("camera.viewport_size.y", self.camera.viewport_size.y)?;
        non_negative("camera.scroll_speed", self.camera.scroll_speed)?;

        positive("score.max_difficulty_height", self.score.max_difficulty_height)?;
        if self.score.max_multiplier < 1.0 {
            return Err(SimError::Config(format!(
                "score.max_multiplier must be at least 1, got {}",
                self.score.max_multiplier
            )));
        }

        positive("fragments.size", self.fragments.size)?;
        positive("fragments.fade_time", self.fragments.fade_time)?;
        Ok(())
    }
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::Config(format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::Config(format!("{name} must not be negative, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            SimConfig::from_json_str(r#"{ "seed": 42, "terrain": { "section_height": 40.0 } }"#)
                .unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.terrain.section_height, 40.0);
        assert_eq!(config.terrain.max_sculpt_vertices, 5);
        assert_eq!(config.racer, RacerConfig::default());
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut config = SimConfig::default();
        config.terrain.sculpt_obstacles = false;
        let json = config.to_json_string().unwrap();
        assert_eq!(SimConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SimConfig::from_json_str(r#"{ "terrain": { "section_height": -1.0 } }"#);
        assert!(matches!(err, Err(SimError::Config(_))));

        let err = SimConfig::from_json_str(
            r#"{ "terrain": { "edge_angle_range": { "min": 0.0, "max": 90.0 } } }"#,
        );
        assert!(matches!(err, Err(SimError::Config(_))));

        assert!(matches!(
            SimConfig::from_json_str("{ not json"),
            Err(SimError::Json(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            SimConfig::load("/nonexistent/slide-racer.json"),
            Err(SimError::Io(_))
        ));
    }
}
