//! Python bindings for the water extent pipeline

use crate::config::{PipelineConfig, TargetGrid};
use crate::core::WaterExtentPipeline;
use crate::io::SceneStack;
use crate::types::{Grouping, RasterCube, WaterError};
use chrono::{DateTime, Utc};
use numpy::PyReadonlyArray3;
use pyo3::prelude::*;

fn to_py_err(e: WaterError) -> PyErr {
    match e {
        WaterError::Alignment { .. } | WaterError::InvalidInput { .. } | WaterError::Time(_) => {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("{}", e))
        }
        _ => PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e)),
    }
}

fn parse_times(timestamps: &[String]) -> PyResult<Vec<DateTime<Utc>>> {
    timestamps
        .iter()
        .map(|t| {
            DateTime::parse_from_rfc3339(t)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                        "Invalid timestamp '{}': {}",
                        t, e
                    ))
                })
        })
        .collect()
}

/// Monthly water area in km² as a list of (period, area) tuples
#[pyfunction]
#[pyo3(signature = (green, swir, scl, timestamps, resolution_m = 10.0, year_month = false))]
fn monthly_water_area<'py>(
    green: PyReadonlyArray3<'py, f32>,
    swir: PyReadonlyArray3<'py, f32>,
    scl: PyReadonlyArray3<'py, i32>,
    timestamps: Vec<String>,
    resolution_m: f64,
    year_month: bool,
) -> PyResult<Vec<(String, f64)>> {
    let times = parse_times(&timestamps)?;

    let green = RasterCube::new(green.as_array().to_owned(), times.clone()).map_err(to_py_err)?;
    let swir = RasterCube::new(swir.as_array().to_owned(), times.clone()).map_err(to_py_err)?;
    let scl = RasterCube::new(scl.as_array().to_owned(), times).map_err(to_py_err)?;
    let stack = SceneStack::new(green, swir, scl).map_err(to_py_err)?;

    let mut config = PipelineConfig::default();
    config.grid = TargetGrid {
        resolution_m,
        ..TargetGrid::default()
    };
    if year_month {
        config.composite.grouping = Grouping::YearMonth;
    }

    let series = WaterExtentPipeline::new(config).run(&stack).map_err(to_py_err)?;
    Ok(series.iter().map(|(period, area)| (period.to_string(), area)).collect())
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(monthly_water_area, m)?)?;
    Ok(())
}
