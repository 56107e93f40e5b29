use chrono::{DateTime, Datelike, Utc};
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Masked spectral index sample; `None` is no-data
pub type IndexValue = Option<f64>;

/// 3D cube of integer scene classification codes (time x row x col)
pub type ClassificationCodeCube = RasterCube<i32>;

/// 3D boolean cube, `true` where a pixel is excluded
pub type ExclusionMask = RasterCube<bool>;

/// 3D cube of masked index values
pub type MaskedIndexCube = RasterCube<IndexValue>;

/// Multi-temporal raster cube indexed by (time, row, col).
///
/// Every time slice carries its acquisition timestamp. Cubes are never
/// mutated once built; every stage derives a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterCube<T> {
    data: Array3<T>,
    times: Vec<DateTime<Utc>>,
}

impl<T> RasterCube<T> {
    /// Wrap an array with its time labels.
    ///
    /// The number of labels must equal the length of the time axis.
    pub fn new(data: Array3<T>, times: Vec<DateTime<Utc>>) -> WaterResult<Self> {
        if data.len_of(Axis(0)) != times.len() {
            return Err(WaterError::InvalidInput {
                stage: "raster cube",
                message: format!(
                    "{} time labels for a cube of shape {:?}",
                    times.len(),
                    data.shape()
                ),
            });
        }
        Ok(Self { data, times })
    }

    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// (time, rows, cols)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    /// Single time slice as a 2D view
    pub fn slice_at(&self, t: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(0), t)
    }

    /// Consume the cube, returning its parts
    pub fn into_parts(self) -> (Array3<T>, Vec<DateTime<Utc>>) {
        (self.data, self.times)
    }

    /// Check that `other` has the same shape and the same time labels.
    pub fn check_aligned<U>(&self, other: &RasterCube<U>, stage: &'static str) -> WaterResult<()> {
        if self.data.shape() != other.data.shape() || self.times != other.times {
            return Err(WaterError::Alignment {
                stage,
                left: self.data.dim(),
                right: other.data.dim(),
            });
        }
        Ok(())
    }
}

/// How irregular acquisitions are bucketed into composite periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Calendar month 1-12, years merged into the same bucket
    MonthOfYear,
    /// Calendar month of a specific year
    YearMonth,
}

impl Default for Grouping {
    fn default() -> Self {
        Grouping::MonthOfYear
    }
}

impl Grouping {
    /// Bucket key for a timestamp
    pub fn period_of(&self, time: &DateTime<Utc>) -> CompositePeriod {
        match self {
            Grouping::MonthOfYear => CompositePeriod::MonthOfYear(time.month()),
            Grouping::YearMonth => CompositePeriod::YearMonth {
                year: time.year(),
                month: time.month(),
            },
        }
    }
}

/// Key of one composite layer.
///
/// Ordering is ascending month for `MonthOfYear` and ascending
/// (year, month) for `YearMonth`. A single cube never mixes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositePeriod {
    MonthOfYear(u32),
    YearMonth { year: i32, month: u32 },
}

impl CompositePeriod {
    /// Calendar month (1-12) of the period
    pub fn month(&self) -> u32 {
        match self {
            CompositePeriod::MonthOfYear(month) => *month,
            CompositePeriod::YearMonth { month, .. } => *month,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            CompositePeriod::MonthOfYear(_) => None,
            CompositePeriod::YearMonth { year, .. } => Some(*year),
        }
    }
}

impl fmt::Display for CompositePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositePeriod::MonthOfYear(month) => write!(f, "{}", month),
            CompositePeriod::YearMonth { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

/// Per-period composite of the masked index (period x row x col)
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeCube {
    pub periods: Vec<CompositePeriod>,
    pub data: Array3<IndexValue>,
}

impl CompositeCube {
    pub fn n_periods(&self) -> usize {
        self.periods.len()
    }

    /// Layer for a given period, if present
    pub fn layer(&self, period: CompositePeriod) -> Option<ArrayView2<'_, IndexValue>> {
        self.periods
            .iter()
            .position(|p| *p == period)
            .map(|idx| self.data.index_axis(Axis(0), idx))
    }
}

/// Binary water classification (period x row x col), 1 = water
#[derive(Debug, Clone, PartialEq)]
pub struct WaterCube {
    pub periods: Vec<CompositePeriod>,
    pub data: Array3<u8>,
}

impl WaterCube {
    /// Number of water pixels in each layer, in period order
    pub fn water_counts(&self) -> Vec<usize> {
        self.data
            .axis_iter(Axis(0))
            .map(|layer| layer.iter().filter(|&&v| v == 1).count())
            .collect()
    }

    /// Share of the layer classified as water
    pub fn water_fraction(&self, period: CompositePeriod) -> Option<f64> {
        let idx = self.periods.iter().position(|p| *p == period)?;
        let layer = self.data.index_axis(Axis(0), idx);
        if layer.is_empty() {
            return Some(0.0);
        }
        let water = layer.iter().filter(|&&v| v == 1).count();
        Some(water as f64 / layer.len() as f64)
    }
}

/// Water area for one composite period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaRecord {
    pub period: CompositePeriod,
    pub water_pixels: usize,
    pub area_km2: f64,
}

/// Water area time series in ascending period order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaSeries {
    records: Vec<AreaRecord>,
}

impl AreaSeries {
    pub(crate) fn from_records(records: Vec<AreaRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AreaRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Area for a period, in km²
    pub fn get(&self, period: CompositePeriod) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.period == period)
            .map(|r| r.area_km2)
    }

    /// (period, km²) pairs in series order
    pub fn iter(&self) -> impl Iterator<Item = (CompositePeriod, f64)> + '_ {
        self.records.iter().map(|r| (r.period, r.area_km2))
    }

    pub fn periods(&self) -> Vec<CompositePeriod> {
        self.records.iter().map(|r| r.period).collect()
    }
}

impl fmt::Display for AreaSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<8} {:>12}", "period", "area_km2")?;
        for record in &self.records {
            writeln!(f, "{:<8} {:>12.6}", record.period.to_string(), record.area_km2)?;
        }
        Ok(())
    }
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// `[west, south, east, north]` as used by STAC
    pub fn to_stac(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// Error types for water extent processing
#[derive(Debug, thiserror::Error)]
pub enum WaterError {
    #[error("Alignment error in {stage}: cube shapes {left:?} and {right:?} (or their time labels) differ")]
    Alignment {
        stage: &'static str,
        left: (usize, usize, usize),
        right: (usize, usize, usize),
    },

    #[error("Invalid input to {stage}: {message}")]
    InvalidInput {
        stage: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Time parsing error: {0}")]
    Time(String),
}

/// Result type for water extent operations
pub type WaterResult<T> = Result<T, WaterError>;
