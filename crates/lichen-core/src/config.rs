//! Configuration types for the simulation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How fresh species identifiers are allocated during speciation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// One more than the largest id ever allocated; ids are never reused
    #[default]
    Monotonic,
    /// Smallest non-negative id not currently in the dominance graph
    Reuse,
}

/// How the grid is populated before the first tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InitialLayout {
    /// Background species 0 with one square block each of species 1 and 2
    Blocks,
    /// Every cell drawn uniformly from `0..species`
    Uniform { species: u32 },
}

impl Default for InitialLayout {
    fn default() -> Self {
        InitialLayout::Blocks
    }
}

/// Per-tick speciation probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SpeciationRate {
    /// Flat probability, independent of grid size
    Fixed { probability: f64 },
    /// `alpha * gamma / L^2`, so larger grids speciate more rarely per tick
    Scaled { alpha: f64 },
}

impl Default for SpeciationRate {
    fn default() -> Self {
        SpeciationRate::Scaled { alpha: 0.1 }
    }
}

impl SpeciationRate {
    /// Resolve to a single probability for the given side length and gamma
    pub fn probability(&self, side_length: i32, interaction_probability: f64) -> f64 {
        match *self {
            SpeciationRate::Fixed { probability } => probability,
            SpeciationRate::Scaled { alpha } => {
                let cells = side_length as f64 * side_length as f64;
                alpha * interaction_probability / cells
            }
        }
    }
}

/// Largest accepted grid side; keeps `side * side` cell indices well inside `i32`
pub const MAX_SIDE_LENGTH: i32 = 4096;

/// Lichen model parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LichenConfig {
    /// Side length of the square grid
    pub side_length: i32,
    /// Speciation probability per tick
    pub speciation: SpeciationRate,
    /// Probability of each dominance edge (gamma)
    pub interaction_probability: f64,
    /// Species identifier allocation
    pub id_policy: IdPolicy,
    /// Starting grid layout
    pub initial_layout: InitialLayout,
}

impl Default for LichenConfig {
    fn default() -> Self {
        Self {
            side_length: 50,
            speciation: SpeciationRate::default(),
            interaction_probability: 0.1,
            id_policy: IdPolicy::default(),
            initial_layout: InitialLayout::default(),
        }
    }
}

impl LichenConfig {
    /// Check parameter ranges. Fails with `InvalidConfiguration`.
    pub fn validate(&self) -> Result<()> {
        if self.side_length <= 0 || self.side_length > MAX_SIDE_LENGTH {
            return Err(Error::InvalidConfiguration(format!(
                "side_length must lie in [1, {}], got {}",
                MAX_SIDE_LENGTH, self.side_length
            )));
        }

        check_probability("interaction_probability", self.interaction_probability)?;

        match self.speciation {
            SpeciationRate::Fixed { probability } => {
                check_probability("speciation probability", probability)?;
            }
            SpeciationRate::Scaled { alpha } => {
                if !alpha.is_finite() || alpha < 0.0 {
                    return Err(Error::InvalidConfiguration(format!(
                        "speciation alpha must be finite and non-negative, got {}",
                        alpha
                    )));
                }
            }
        }
        check_probability("resolved speciation probability", self.speciation_probability())?;

        if let InitialLayout::Uniform { species } = self.initial_layout {
            if species == 0 {
                return Err(Error::InvalidConfiguration(
                    "uniform layout needs at least one species".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn speciation_probability(&self) -> f64 {
        self.speciation
            .probability(self.side_length, self.interaction_probability)
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfiguration(format!(
            "{} must lie in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

/// A single simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of ticks to run the simulation
    pub num_ticks: u64,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Model parameters
    pub lichen: LichenConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_ticks: 100,
            seed: 0,
            lichen: LichenConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_ticks == 0 {
            return Err(Error::InvalidConfiguration(
                "num_ticks must be positive".to_string(),
            ));
        }
        self.lichen.validate()
    }
}

/// Headless runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// The run to execute
    pub run: RunConfig,
    /// Publish a snapshot every this many ticks
    pub frame_interval: u64,
    /// Progress log interval (milliseconds)
    pub progress_interval_ms: u64,
    /// Write snapshot frames to stdout as JSON lines
    pub emit_frames: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            frame_interval: 10,
            progress_interval_ms: 1000,
            emit_frames: false,
        }
    }
}

impl RunnerConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunnerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_interval == 0 {
            return Err(Error::InvalidConfiguration(
                "frame_interval must be positive".to_string(),
            ));
        }
        self.run.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = LichenConfig::default();
        assert_eq!(config.side_length, 50);
        assert_eq!(config.id_policy, IdPolicy::Monotonic);
        assert_eq!(config.initial_layout, InitialLayout::Blocks);
        assert!(config.validate().is_ok());

        let run = RunConfig::default();
        assert_eq!(run.num_ticks, 100);
        assert!(run.validate().is_ok());

        assert!(RunnerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_scaled_speciation_probability() {
        let config = LichenConfig {
            side_length: 10,
            speciation: SpeciationRate::Scaled { alpha: 0.5 },
            interaction_probability: 0.2,
            ..Default::default()
        };
        let p = config.speciation_probability();
        assert!((p - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_positive_side() {
        let config = LichenConfig {
            side_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_side() {
        let at_limit = LichenConfig {
            side_length: MAX_SIDE_LENGTH,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());

        let huge = LichenConfig {
            side_length: 46341,
            ..Default::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let gamma = LichenConfig {
            interaction_probability: 1.5,
            ..Default::default()
        };
        assert!(gamma.validate().is_err());

        let fixed = LichenConfig {
            speciation: SpeciationRate::Fixed { probability: -0.1 },
            ..Default::default()
        };
        assert!(fixed.validate().is_err());

        let nan = LichenConfig {
            speciation: SpeciationRate::Fixed { probability: f64::NAN },
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        // alpha * gamma / L^2 > 1 on a tiny grid
        let scaled = LichenConfig {
            side_length: 1,
            speciation: SpeciationRate::Scaled { alpha: 20.0 },
            interaction_probability: 0.5,
            ..Default::default()
        };
        assert!(scaled.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_uniform_layout() {
        let config = LichenConfig {
            initial_layout: InitialLayout::Uniform { species: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_ticks() {
        let run = RunConfig {
            num_ticks: 0,
            ..Default::default()
        };
        assert!(run.validate().is_err());
    }

    #[test]
    fn test_runner_config_partial_json() {
        let json = r#"{
            "emit_frames": true,
            "run": {
                "num_ticks": 500,
                "lichen": {
                    "side_length": 20,
                    "id_policy": "reuse",
                    "speciation": { "kind": "fixed", "probability": 0.25 },
                    "initial_layout": { "kind": "uniform", "species": 10 }
                }
            }
        }"#;
        let config: RunnerConfig = serde_json::from_str(json).unwrap();
        assert!(config.emit_frames);
        assert_eq!(config.frame_interval, 10);
        assert_eq!(config.run.num_ticks, 500);
        assert_eq!(config.run.lichen.side_length, 20);
        assert_eq!(config.run.lichen.id_policy, IdPolicy::Reuse);
        assert_eq!(
            config.run.lichen.initial_layout,
            InitialLayout::Uniform { species: 10 }
        );
        assert_eq!(config.run.lichen.interaction_probability, 0.1);
        assert!(config.validate().is_ok());
    }
}
