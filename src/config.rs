//! Processing configuration
//!
//! Every section has domain defaults so a partial JSON document is enough
//! to override a single parameter.

use crate::core::classify::pixel_area_km2;
use crate::core::composite::CompositeStatistic;
use crate::core::mask::DEFAULT_EXCLUDED_CODES;
use crate::types::{Grouping, WaterError, WaterResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Cloud/shadow masking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// SCL codes excluded from the index (shadow 3, clouds 8-10)
    pub excluded_codes: BTreeSet<i32>,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            excluded_codes: DEFAULT_EXCLUDED_CODES.iter().copied().collect(),
        }
    }
}

/// Temporal compositing parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub grouping: Grouping,
    pub statistic: CompositeStatistic,
}

/// Water classification parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Index values strictly above this are water
    pub threshold: f64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

/// Target grid the loader resamples onto
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGrid {
    /// EPSG code of the target CRS
    pub epsg: u32,
    /// Ground resolution in metres
    pub resolution_m: f64,
}

impl Default for TargetGrid {
    fn default() -> Self {
        Self {
            epsg: 3577,          // Australian Albers
            resolution_m: 10.0,  // S2 visible/NIR resolution
        }
    }
}

impl TargetGrid {
    pub fn crs(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }

    pub fn pixel_area_km2(&self) -> f64 {
        pixel_area_km2(self.resolution_m, self.resolution_m)
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mask: MaskConfig,
    pub composite: CompositeConfig,
    pub classify: ClassifyConfig,
    pub grid: TargetGrid,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> WaterResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| WaterError::Config(format!("invalid pipeline config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> WaterResult<Self> {
        log::info!("Reading pipeline config: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> WaterResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| WaterError::Config(format!("serializing pipeline config: {}", e)))
    }

    pub fn validate(&self) -> WaterResult<()> {
        if !self.classify.threshold.is_finite() {
            return Err(WaterError::Config(format!(
                "water threshold must be finite, got {}",
                self.classify.threshold
            )));
        }
        if !self.grid.resolution_m.is_finite() || self.grid.resolution_m <= 0.0 {
            return Err(WaterError::Config(format!(
                "grid resolution must be positive, got {}",
                self.grid.resolution_m
            )));
        }
        Ok(())
    }
}
