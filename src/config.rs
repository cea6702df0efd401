//! Build-time configuration for swarm detection.
//!
//! A [`SwarmConfig`] is one immutable value passed explicitly to
//! [`crate::view::rebuild`]. Nothing reads configuration from ambient state.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};
use crate::indexing::MIN_CELL_SIZE_KM;

/// Magnitudes sampled when checking that a radius function is well formed.
const RADIUS_CHECK_MIN_MAG: f64 = -2.0;
const RADIUS_CHECK_MAX_MAG: f64 = 10.0;
const RADIUS_CHECK_STEP: f64 = 0.25;

/// Maps an event magnitude to its influence radius in kilometers.
///
/// Must be finite, non-negative and non-decreasing in magnitude.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RadiusFunction {
    /// `log10(r_km) = slope * M + intercept`, capped at `max_km`.
    LogLinear { slope: f64, intercept: f64, max_km: f64 },
    /// Same radius for every magnitude.
    Constant { km: f64 },
    /// Arbitrary scaling law supplied in code; not representable in files.
    #[serde(skip)]
    Custom(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl RadiusFunction {
    /// Wrap a scaling law given in code.
    ///
    /// Validation only samples the law at 0.25-magnitude steps from -2 to 10.
    /// Linking always evaluates it at the larger magnitude of a pair, so a dip
    /// between samples narrows links rather than breaking them.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        RadiusFunction::Custom(Arc::new(f))
    }

    pub fn radius_km(&self, magnitude: f64) -> f64 {
        match self {
            RadiusFunction::LogLinear { slope, intercept, max_km } => {
                10f64.powf(slope * magnitude + intercept).min(*max_km)
            }
            RadiusFunction::Constant { km } => *km,
            RadiusFunction::Custom(f) => f(magnitude),
        }
    }

    fn validate(&self) -> Result<()> {
        if let RadiusFunction::LogLinear { slope, max_km, .. } = self {
            if !(slope.is_finite() && *slope >= 0.0) {
                return Err(SwarmError::Config(format!(
                    "radius slope must be finite and non-negative, got {}",
                    slope
                )));
            }
            if !(max_km.is_finite() && *max_km > 0.0) {
                return Err(SwarmError::Config(format!(
                    "radius cap must be positive, got {}",
                    max_km
                )));
            }
        }

        let mut previous: Option<(f64, f64)> = None;
        let mut magnitude = RADIUS_CHECK_MIN_MAG;
        while magnitude <= RADIUS_CHECK_MAX_MAG {
            let radius = self.radius_km(magnitude);
            if !radius.is_finite() || radius < 0.0 {
                return Err(SwarmError::Config(format!(
                    "radius function yields invalid radius {} at magnitude {}",
                    radius, magnitude
                )));
            }
            if let Some((prev_mag, prev_radius)) = previous {
                if radius < prev_radius {
                    return Err(SwarmError::Config(format!(
                        "radius function decreases between magnitude {} ({} km) and {} ({} km)",
                        prev_mag, prev_radius, magnitude, radius
                    )));
                }
            }
            previous = Some((magnitude, radius));
            magnitude += RADIUS_CHECK_STEP;
        }
        Ok(())
    }
}

impl Default for RadiusFunction {
    /// About 5 km at M2, 8 km at M2.5, 50 km at M4.5, capped at 100 km.
    fn default() -> Self {
        RadiusFunction::LogLinear { slope: 0.4, intercept: -0.1, max_km: 100.0 }
    }
}

impl fmt::Debug for RadiusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadiusFunction::LogLinear { slope, intercept, max_km } => f
                .debug_struct("LogLinear")
                .field("slope", slope)
                .field("intercept", intercept)
                .field("max_km", max_km)
                .finish(),
            RadiusFunction::Constant { km } => f.debug_struct("Constant").field("km", km).finish(),
            RadiusFunction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How the clustering pass is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Parallelism {
    /// Single time-ordered pass.
    #[default]
    Sequential,
    /// Latitude bands clustered on the rayon pool, merged afterwards.
    Tiled { tiles: usize },
}

/// Immutable rebuild configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Events at or above this magnitude are mainshocks.
    pub mainshock_magnitude_threshold: f64,
    /// Maximum time separation of two events joined by an edge.
    pub swarm_window_days: f64,
    /// Maximum gap between a swarm's last event and its mainshock.
    pub lead_time_window_days: f64,
    /// A swarm needs at least one event this close to the mainshock epicenter.
    pub association_radius_km: f64,
    pub radius_function: RadiusFunction,
    /// Requested spatial grid cell size; raised to the largest query radius.
    pub cell_size_km: f64,
    pub max_swarms_per_mainshock: usize,
    pub parallelism: Parallelism,
    /// Keep only events whose region tag matches (case-insensitive).
    pub region_filter: Option<String>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            mainshock_magnitude_threshold: 3.0,
            swarm_window_days: 2.0,
            lead_time_window_days: 29.0,
            association_radius_km: 500.0,
            radius_function: RadiusFunction::default(),
            cell_size_km: 10.0,
            max_swarms_per_mainshock: 1,
            parallelism: Parallelism::Sequential,
            region_filter: None,
        }
    }
}

impl SwarmConfig {
    pub fn with_mainshock_threshold(mut self, magnitude: f64) -> Self {
        self.mainshock_magnitude_threshold = magnitude;
        self
    }

    pub fn with_swarm_window_days(mut self, days: f64) -> Self {
        self.swarm_window_days = days;
        self
    }

    pub fn with_lead_time_window_days(mut self, days: f64) -> Self {
        self.lead_time_window_days = days;
        self
    }

    pub fn with_association_radius_km(mut self, km: f64) -> Self {
        self.association_radius_km = km;
        self
    }

    pub fn with_radius_function(mut self, radius_function: RadiusFunction) -> Self {
        self.radius_function = radius_function;
        self
    }

    pub fn with_cell_size_km(mut self, km: f64) -> Self {
        self.cell_size_km = km;
        self
    }

    pub fn with_max_swarms_per_mainshock(mut self, count: usize) -> Self {
        self.max_swarms_per_mainshock = count;
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_region_filter(mut self, region: impl Into<String>) -> Self {
        self.region_filter = Some(region.into());
        self
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SwarmConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would silently produce a wrong view.
    pub fn validate(&self) -> Result<()> {
        if !self.mainshock_magnitude_threshold.is_finite() {
            return Err(SwarmError::Config(format!(
                "mainshock_magnitude_threshold must be finite, got {}",
                self.mainshock_magnitude_threshold
            )));
        }
        check_non_negative("swarm_window_days", self.swarm_window_days)?;
        check_positive("lead_time_window_days", self.lead_time_window_days)?;
        check_positive("association_radius_km", self.association_radius_km)?;
        check_positive("cell_size_km", self.cell_size_km)?;
        if self.cell_size_km < MIN_CELL_SIZE_KM {
            return Err(SwarmError::Config(format!(
                "cell_size_km must be at least {}, got {}",
                MIN_CELL_SIZE_KM, self.cell_size_km
            )));
        }
        if self.max_swarms_per_mainshock == 0 {
            return Err(SwarmError::Config(
                "max_swarms_per_mainshock must be at least 1".to_string(),
            ));
        }
        if let Parallelism::Tiled { tiles } = self.parallelism {
            if tiles == 0 {
                return Err(SwarmError::Config("tiled parallelism needs at least one tile".to_string()));
            }
        }
        self.radius_function.validate()
    }

    pub fn is_mainshock(&self, magnitude: f64) -> bool {
        magnitude >= self.mainshock_magnitude_threshold
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SwarmError::Config(format!("{} must be positive and finite, got {}", name, value)))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SwarmError::Config(format!("{} must be non-negative and finite, got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_radius_law() {
        let radius = RadiusFunction::default();
        let r2 = radius.radius_km(2.0);
        let r25 = radius.radius_km(2.5);
        assert!((r2 - 5.0).abs() < 0.1, "M2 radius was {}", r2);
        assert!(r25 > r2 && r25 < 10.0);
        assert_eq!(radius.radius_km(9.0), 100.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SwarmConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_radius_rejected() {
        let config = SwarmConfig::default().with_radius_function(RadiusFunction::Constant { km: -1.0 });
        assert!(matches!(config.validate(), Err(SwarmError::Config(_))));
    }

    #[test]
    fn test_decreasing_radius_rejected() {
        let config =
            SwarmConfig::default().with_radius_function(RadiusFunction::custom(|m| 100.0 - m));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("decreases"));
    }

    #[test]
    fn test_non_finite_radius_rejected() {
        let config =
            SwarmConfig::default().with_radius_function(RadiusFunction::custom(|_| f64::NAN));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tiny_cell_size_rejected() {
        let err = SwarmConfig::default().with_cell_size_km(1e-5).validate().unwrap_err();
        assert!(matches!(err, SwarmError::Config(_)));
        assert!(err.to_string().contains("cell_size_km"));
    }

    #[test]
    fn test_bad_scalars_rejected() {
        assert!(SwarmConfig::default().with_lead_time_window_days(0.0).validate().is_err());
        assert!(SwarmConfig::default().with_swarm_window_days(-1.0).validate().is_err());
        assert!(SwarmConfig::default().with_cell_size_km(f64::INFINITY).validate().is_err());
        assert!(SwarmConfig::default().with_cell_size_km(MIN_CELL_SIZE_KM).validate().is_ok());
        assert!(SwarmConfig::default().with_max_swarms_per_mainshock(0).validate().is_err());
        assert!(SwarmConfig::default()
            .with_parallelism(Parallelism::Tiled { tiles: 0 })
            .validate()
            .is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "mainshock_magnitude_threshold": 4.5,
                "radius_function": {{"kind": "constant", "km": 12.0}},
                "parallelism": {{"mode": "tiled", "tiles": 4}}
            }}"#
        )
        .unwrap();

        let config = SwarmConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.mainshock_magnitude_threshold, 4.5);
        assert_eq!(config.radius_function.radius_km(1.0), 12.0);
        assert_eq!(config.parallelism, Parallelism::Tiled { tiles: 4 });
        assert_eq!(config.lead_time_window_days, 29.0);
    }
}
