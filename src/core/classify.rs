use crate::types::{AreaRecord, AreaSeries, CompositeCube, WaterCube, WaterError, WaterResult};
use ndarray::Axis;

/// Square metres in a square kilometre
const M2_PER_KM2: f64 = 1.0e6;

/// Ground area of one pixel in km² from its sampling distance in metres
pub fn pixel_area_km2(res_x_m: f64, res_y_m: f64) -> f64 {
    (res_x_m.abs() * res_y_m.abs()) / M2_PER_KM2
}

/// Threshold classifier for composite index values
#[derive(Debug, Clone, Copy)]
pub struct WaterClassifier {
    threshold: f64,
}

impl Default for WaterClassifier {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

impl WaterClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// 1 where the value is strictly above the threshold, 0 otherwise.
    /// No-data classifies as 0.
    pub fn classify(&self, composite: &CompositeCube) -> WaterResult<WaterCube> {
        validate_composite(composite)?;

        let threshold = self.threshold;
        let data = composite.data.mapv(|value| match value {
            Some(v) if v > threshold => 1u8,
            _ => 0u8,
        });

        log::debug!(
            "Classified {} composite layers at threshold {}",
            composite.n_periods(),
            threshold
        );

        Ok(WaterCube {
            periods: composite.periods.clone(),
            data,
        })
    }
}

fn validate_composite(composite: &CompositeCube) -> WaterResult<()> {
    let layers = composite.data.len_of(Axis(0));
    if layers != composite.periods.len() {
        return Err(WaterError::InvalidInput {
            stage: "classifier",
            message: format!(
                "{} periods for a composite of shape {:?}",
                composite.periods.len(),
                composite.data.shape()
            ),
        });
    }
    Ok(())
}

/// Water area per layer: count of water pixels times the pixel area
pub fn measure_area(water: &WaterCube, pixel_area_km2: f64) -> WaterResult<AreaSeries> {
    if !pixel_area_km2.is_finite() || pixel_area_km2 <= 0.0 {
        return Err(WaterError::InvalidInput {
            stage: "area aggregator",
            message: format!("pixel area must be a positive number of km², got {}", pixel_area_km2),
        });
    }
    if water.data.len_of(Axis(0)) != water.periods.len() {
        return Err(WaterError::InvalidInput {
            stage: "area aggregator",
            message: format!(
                "{} periods for a water cube of shape {:?}",
                water.periods.len(),
                water.data.shape()
            ),
        });
    }

    let records = water
        .periods
        .iter()
        .zip(water.water_counts())
        .map(|(&period, water_pixels)| {
            let area_km2 = water_pixels as f64 * pixel_area_km2;
            log::debug!("Period {}: {} water pixels, {:.6} km²", period, water_pixels, area_km2);
            AreaRecord {
                period,
                water_pixels,
                area_km2,
            }
        })
        .collect();

    Ok(AreaSeries::from_records(records))
}

/// Classify at 0.0 and convert each layer to km²
pub fn classify_and_measure(composite: &CompositeCube, pixel_area_km2: f64) -> WaterResult<AreaSeries> {
    let water = WaterClassifier::default().classify(composite)?;
    measure_area(&water, pixel_area_km2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompositePeriod, IndexValue};
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    fn composite(periods: Vec<CompositePeriod>, rows: usize, cols: usize, values: Vec<IndexValue>) -> CompositeCube {
        CompositeCube {
            data: Array3::from_shape_vec((periods.len(), rows, cols), values).unwrap(),
            periods,
        }
    }

    #[test]
    fn test_classification_boundary() {
        let cube = composite(
            vec![CompositePeriod::MonthOfYear(4)],
            1,
            4,
            vec![Some(0.0), Some(1e-9), None, Some(-0.3)],
        );
        let water = WaterClassifier::default().classify(&cube).unwrap();
        let classes: Vec<u8> = water.data.iter().copied().collect();
        assert_eq!(classes, vec![0, 1, 0, 0]);
    }

    #[test]
    fn test_area_conversion() {
        let mut values = vec![Some(0.4); 250];
        values.extend(vec![Some(-0.4); 150]);
        let cube = composite(vec![CompositePeriod::MonthOfYear(5)], 20, 20, values);

        let series = classify_and_measure(&cube, 1e-4).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.records()[0].water_pixels, 250);
        assert_abs_diff_eq!(series.records()[0].area_km2, 0.025, epsilon = 1e-12);
    }

    #[test]
    fn test_series_follows_period_order() {
        let mut values = vec![Some(0.2); 100];
        values.extend(vec![None; 100]);
        let cube = composite(
            vec![CompositePeriod::MonthOfYear(1), CompositePeriod::MonthOfYear(2)],
            10,
            10,
            values,
        );

        let series = classify_and_measure(&cube, 1e-4).unwrap();
        let pairs: Vec<(CompositePeriod, f64)> = series.iter().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, CompositePeriod::MonthOfYear(1));
        assert_abs_diff_eq!(pairs[0].1, 0.01, epsilon = 1e-12);
        assert_eq!(pairs[1], (CompositePeriod::MonthOfYear(2), 0.0));
    }

    #[test]
    fn test_invalid_pixel_area() {
        let cube = composite(vec![CompositePeriod::MonthOfYear(1)], 1, 1, vec![Some(0.5)]);
        for bad in [0.0, -1e-4, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                classify_and_measure(&cube, bad),
                Err(WaterError::InvalidInput { .. })
            ));
        }
    }

    #[test]
    fn test_period_count_mismatch() {
        let cube = CompositeCube {
            periods: vec![CompositePeriod::MonthOfYear(1)],
            data: Array3::from_elem((2, 1, 1), Some(0.5)),
        };
        assert!(matches!(
            WaterClassifier::default().classify(&cube),
            Err(WaterError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_custom_threshold_and_fraction() {
        let cube = composite(
            vec![CompositePeriod::MonthOfYear(6)],
            1,
            4,
            vec![Some(0.1), Some(0.25), Some(0.3), None],
        );
        let water = WaterClassifier::new(0.2).classify(&cube).unwrap();
        assert_eq!(water.water_counts(), vec![2]);
        assert_eq!(water.water_fraction(CompositePeriod::MonthOfYear(6)), Some(0.5));
        assert_eq!(water.water_fraction(CompositePeriod::MonthOfYear(7)), None);
    }

    #[test]
    fn test_pixel_area_from_resolution() {
        assert_abs_diff_eq!(pixel_area_km2(10.0, 10.0), 1e-4, epsilon = 1e-18);
        assert_abs_diff_eq!(pixel_area_km2(20.0, -20.0), 4e-4, epsilon = 1e-18);
    }
}
