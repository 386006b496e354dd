//! Erosion simulation parameters and configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ErosionError;

/// Upper bound on drain sweeps per iteration. Plateaus can keep water
/// shuffling for a long time, so the drain loop stops here even if water
/// is still moving.
pub const DEFAULT_MAX_DRAIN_SWEEPS: usize = 100;

/// Erosion intensity preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErosionPreset {
    /// Few passes of light rain, sediment spread wide
    Gentle,
    /// Balanced erosion
    #[default]
    Normal,
    /// Many passes of heavy rain
    Aggressive,
}

impl ErosionPreset {
    pub fn all() -> &'static [Self] {
        &[Self::Gentle, Self::Normal, Self::Aggressive]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Gentle => "Light rain, soft smoothing",
            Self::Normal => "Balanced erosion",
            Self::Aggressive => "Heavy rain, deep gullies",
        }
    }
}

impl std::fmt::Display for ErosionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gentle => write!(f, "gentle"),
            Self::Normal => write!(f, "normal"),
            Self::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl std::str::FromStr for ErosionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown preset '{}' (expected gentle, normal or aggressive)", s))
    }
}

/// Rainfall erosion parameters.
///
/// The editor-facing ranges (iterations 1-250, rainfall 0-10, cone
/// threshold 1-5) are conventions of the tools, not limits of the
/// algorithm; [`ErosionParams::validate`] only rejects values the
/// simulation cannot run with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionParams {
    /// Number of rain / drain / deposit passes
    pub iterations: usize,

    /// Water placed on every cell at the start of each pass
    pub rainfall: f32,

    /// Scales the sediment magnitude at which deposits start spreading.
    /// Higher values keep a given deposit within a smaller radius.
    pub cone_threshold: f32,

    /// Maximum drain sweeps per pass
    pub max_drain_sweeps: usize,
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            rainfall: 1.0,
            cone_threshold: 1.0,
            max_drain_sweeps: DEFAULT_MAX_DRAIN_SWEEPS,
        }
    }
}

impl ErosionParams {
    /// Create parameters from a preset
    pub fn from_preset(preset: ErosionPreset) -> Self {
        match preset {
            ErosionPreset::Gentle => Self {
                iterations: 5,
                rainfall: 0.5,
                cone_threshold: 3.0,
                ..Default::default()
            },
            ErosionPreset::Normal => Self::default(),
            ErosionPreset::Aggressive => Self {
                iterations: 50,
                rainfall: 4.0,
                cone_threshold: 1.0,
                ..Default::default()
            },
        }
    }

    /// Check the parameters can drive a run.
    /// Non-finite values are passed through untouched.
    pub fn validate(&self) -> Result<(), ErosionError> {
        if self.iterations < 1 {
            return Err(ErosionError::InvalidIterations(self.iterations));
        }
        if self.rainfall < 0.0 {
            return Err(ErosionError::InvalidRainfall(self.rainfall));
        }
        if self.cone_threshold <= 0.0 {
            return Err(ErosionError::InvalidConeThreshold(self.cone_threshold));
        }
        if self.max_drain_sweeps < 1 {
            return Err(ErosionError::InvalidSweepCap(self.max_drain_sweeps));
        }
        Ok(())
    }

    /// Load parameters from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ErosionError> {
        let contents = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&contents)?;
        params.validate()?;
        Ok(params)
    }

    pub fn save_json_file(&self, path: &Path) -> Result<(), ErosionError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
