//! waterline: monthly surface-water extent from Sentinel-2 time series
//!
//! Builds cloud/shadow masks from the scene classification layer, computes
//! the MNDWI, composites irregular acquisitions into calendar months with a
//! median, classifies water and converts pixel counts into km².

pub mod types;
pub mod config;
pub mod io;
pub mod core;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AreaRecord, AreaSeries, BoundingBox, ClassificationCodeCube, CompositeCube, CompositePeriod,
    ExclusionMask, Grouping, IndexValue, MaskedIndexCube, RasterCube, WaterCube, WaterError,
    WaterResult,
};

pub use config::{ClassifyConfig, CompositeConfig, MaskConfig, PipelineConfig, TargetGrid};
pub use io::{Aoi, CatalogClient, RasterLoader, SceneStack, SearchRequest, StacClient};
pub use crate::core::{
    build_exclusion_mask, classify_and_measure, composite_monthly, compute_index,
    CompositeStatistic, TemporalCompositor, WaterClassifier, WaterExtentPipeline,
};
