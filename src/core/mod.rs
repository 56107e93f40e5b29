//! Core compositing and classification stages

pub mod mask;
pub mod index;
pub mod composite;
pub mod classify;
pub mod pipeline;

// Re-export main types
pub use mask::{build_exclusion_mask, MaskBuilder, SceneClass, DEFAULT_EXCLUDED_CODES};
pub use index::compute_index;
pub use composite::{composite_monthly, CompositeStatistic, TemporalCompositor};
pub use classify::{classify_and_measure, measure_area, pixel_area_km2, WaterClassifier};
pub use pipeline::WaterExtentPipeline;
