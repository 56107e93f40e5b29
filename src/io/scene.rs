use crate::config::TargetGrid;
use crate::io::catalog::StacItem;
use crate::types::{ClassificationCodeCube, RasterCube, WaterResult};
use chrono::{DateTime, Utc};

/// Green/SWIR reflectance sample type as delivered by the loader
pub type Reflectance = f32;

/// Co-registered band cubes for one AOI and time window
#[derive(Debug, Clone)]
pub struct SceneStack {
    green: RasterCube<Reflectance>,
    swir: RasterCube<Reflectance>,
    scl: ClassificationCodeCube,
}

impl SceneStack {
    /// All three cubes must share shape and time labels
    pub fn new(
        green: RasterCube<Reflectance>,
        swir: RasterCube<Reflectance>,
        scl: ClassificationCodeCube,
    ) -> WaterResult<Self> {
        green.check_aligned(&swir, "scene stack (green vs swir)")?;
        green.check_aligned(&scl, "scene stack (bands vs scl)")?;
        Ok(Self { green, swir, scl })
    }

    pub fn green(&self) -> &RasterCube<Reflectance> {
        &self.green
    }

    pub fn swir(&self) -> &RasterCube<Reflectance> {
        &self.swir
    }

    pub fn scl(&self) -> &ClassificationCodeCube {
        &self.scl
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        self.green.times()
    }

    /// (time, rows, cols)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.green.dim()
    }
}

/// Materializes catalog items into a stack on the target grid.
///
/// Implementations own reprojection and resampling; the items arrive
/// sorted by acquisition time.
pub trait RasterLoader {
    fn load(&self, items: &[StacItem], grid: &TargetGrid) -> WaterResult<SceneStack>;
}
