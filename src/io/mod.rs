//! Seams to the collaborators around the core: AOI input, catalog search
//! and raster loading

pub mod aoi;
pub mod catalog;
pub mod scene;

pub use aoi::Aoi;
pub use catalog::{CatalogClient, SearchRequest, StacClient, StacClientOptions, StacItem};
pub use scene::{RasterLoader, Reflectance, SceneStack};
