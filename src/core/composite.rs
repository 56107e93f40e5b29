use crate::types::{
    CompositeCube, CompositePeriod, Grouping, IndexValue, MaskedIndexCube, WaterError, WaterResult,
};
use chrono::Datelike;
use ndarray::{Array3, ArrayViewMut2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Statistic used to reduce a bucket of observations to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStatistic {
    /// Median of valid values (robust to outliers)
    Median,
    /// Arithmetic mean of valid values
    Mean,
    /// Minimum valid value
    Min,
    /// Maximum valid value
    Max,
}

impl Default for CompositeStatistic {
    fn default() -> Self {
        CompositeStatistic::Median
    }
}

impl CompositeStatistic {
    /// Reduce the valid values of one pixel; `None` if there are none.
    ///
    /// `values` is reordered in place.
    pub fn reduce(&self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();

        let result = match self {
            CompositeStatistic::Median => {
                if n % 2 == 1 {
                    values[n / 2]
                } else {
                    (values[n / 2 - 1] + values[n / 2]) / 2.0
                }
            }
            CompositeStatistic::Mean => values.iter().sum::<f64>() / n as f64,
            CompositeStatistic::Min => values[0],
            CompositeStatistic::Max => values[n - 1],
        };
        Some(result)
    }
}

/// Groups irregular acquisitions into calendar periods and reduces each
/// period to a single layer.
#[derive(Debug, Clone, Default)]
pub struct TemporalCompositor {
    grouping: Grouping,
    statistic: CompositeStatistic,
}

impl TemporalCompositor {
    pub fn new(grouping: Grouping, statistic: CompositeStatistic) -> Self {
        Self {
            grouping,
            statistic,
        }
    }

    pub fn grouping(&self) -> Grouping {
        self.grouping
    }

    pub fn statistic(&self) -> CompositeStatistic {
        self.statistic
    }

    /// Time indices per period, in ascending period order
    pub fn buckets(&self, index: &MaskedIndexCube) -> BTreeMap<CompositePeriod, Vec<usize>> {
        let mut buckets: BTreeMap<CompositePeriod, Vec<usize>> = BTreeMap::new();
        for (t, time) in index.times().iter().enumerate() {
            buckets.entry(self.grouping.period_of(time)).or_default().push(t);
        }
        buckets
    }

    /// Build one composite layer per period present in the input.
    ///
    /// Periods with no acquisitions produce no layer. A composite cell is
    /// no-data only when every contributing observation is no-data.
    pub fn composite(&self, index: &MaskedIndexCube) -> WaterResult<CompositeCube> {
        if index.n_times() == 0 {
            return Err(WaterError::InvalidInput {
                stage: "temporal compositor",
                message: format!("index cube {:?} has no time slices", index.dim()),
            });
        }

        log::info!(
            "Compositing {} acquisitions by {:?} using {:?}",
            index.n_times(),
            self.grouping,
            self.statistic
        );
        if self.grouping == Grouping::MonthOfYear {
            let years: BTreeSet<i32> = index.times().iter().map(|t| t.year()).collect();
            if years.len() > 1 {
                log::warn!(
                    "Month-of-year grouping merges acquisitions from {} different years",
                    years.len()
                );
            }
        }

        let buckets = self.buckets(index);
        let (_, rows, cols) = index.dim();
        let mut data: Array3<IndexValue> = Array3::from_elem((buckets.len(), rows, cols), None);

        for (layer_idx, (period, time_indices)) in buckets.iter().enumerate() {
            log::debug!("Period {}: {} acquisitions", period, time_indices.len());
            let layer = data.index_axis_mut(Axis(0), layer_idx);
            self.reduce_layer(index.data(), time_indices, layer);
        }

        Ok(CompositeCube {
            periods: buckets.into_keys().collect(),
            data,
        })
    }

    #[cfg(feature = "parallel")]
    fn reduce_layer(
        &self,
        source: &Array3<IndexValue>,
        time_indices: &[usize],
        layer: ArrayViewMut2<'_, IndexValue>,
    ) {
        let statistic = self.statistic;
        Zip::indexed(layer).par_for_each(|(row, col), cell| {
            *cell = reduce_pixel(source, time_indices, row, col, statistic);
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn reduce_layer(
        &self,
        source: &Array3<IndexValue>,
        time_indices: &[usize],
        layer: ArrayViewMut2<'_, IndexValue>,
    ) {
        let statistic = self.statistic;
        Zip::indexed(layer).for_each(|(row, col), cell| {
            *cell = reduce_pixel(source, time_indices, row, col, statistic);
        });
    }
}

fn reduce_pixel(
    source: &Array3<IndexValue>,
    time_indices: &[usize],
    row: usize,
    col: usize,
    statistic: CompositeStatistic,
) -> IndexValue {
    let mut values: Vec<f64> = time_indices
        .iter()
        .filter_map(|&t| source[[t, row, col]])
        .collect();
    statistic.reduce(&mut values)
}

/// Median composite per calendar month, years merged
pub fn composite_monthly(index: &MaskedIndexCube) -> WaterResult<CompositeCube> {
    TemporalCompositor::default().composite(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RasterCube;
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(year: i32, month: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, d, 10, 30, 0).unwrap()
    }

    /// One pixel, one value per timestamp
    fn pixel_series(values: Vec<IndexValue>, times: Vec<DateTime<Utc>>) -> MaskedIndexCube {
        let n = values.len();
        RasterCube::new(Array3::from_shape_vec((n, 1, 1), values).unwrap(), times).unwrap()
    }

    #[test]
    fn test_median_ignores_no_data() {
        let index = pixel_series(
            vec![Some(0.1), Some(0.2), None, Some(0.3)],
            vec![day(2025, 4, 1), day(2025, 4, 6), day(2025, 4, 11), day(2025, 4, 16)],
        );
        let composite = composite_monthly(&index).unwrap();

        assert_eq!(composite.periods, vec![CompositePeriod::MonthOfYear(4)]);
        assert_eq!(composite.data[[0, 0, 0]], Some(0.2));
    }

    #[test]
    fn test_even_bucket_midpoint() {
        let mut values = vec![0.4, 0.1, 0.3, 0.2];
        let median = CompositeStatistic::Median.reduce(&mut values).unwrap();
        assert_abs_diff_eq!(median, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_all_no_data_bucket() {
        let index = pixel_series(
            vec![None, None, Some(0.5)],
            vec![day(2025, 5, 1), day(2025, 5, 21), day(2025, 6, 2)],
        );
        let composite = composite_monthly(&index).unwrap();

        assert_eq!(
            composite.periods,
            vec![CompositePeriod::MonthOfYear(5), CompositePeriod::MonthOfYear(6)]
        );
        assert_eq!(composite.data[[0, 0, 0]], None);
        assert_eq!(composite.data[[1, 0, 0]], Some(0.5));
    }

    #[test]
    fn test_absent_months_produce_no_layer() {
        let index = pixel_series(
            vec![Some(0.1), Some(-0.2)],
            vec![day(2025, 7, 4), day(2025, 4, 9)],
        );
        let composite = composite_monthly(&index).unwrap();

        // Ascending order regardless of acquisition order, no May/June layers
        assert_eq!(
            composite.periods,
            vec![CompositePeriod::MonthOfYear(4), CompositePeriod::MonthOfYear(7)]
        );
        assert_eq!(composite.data.dim(), (2, 1, 1));
        assert_eq!(composite.data[[0, 0, 0]], Some(-0.2));
    }

    #[test]
    fn test_month_of_year_merges_years() {
        let times = vec![day(2024, 4, 10), day(2025, 4, 10), day(2025, 4, 20)];
        let index = pixel_series(vec![Some(0.9), Some(0.1), Some(0.2)], times);

        let merged = composite_monthly(&index).unwrap();
        assert_eq!(merged.n_periods(), 1);
        assert_eq!(merged.data[[0, 0, 0]], Some(0.2));

        let split = TemporalCompositor::new(Grouping::YearMonth, CompositeStatistic::Median)
            .composite(&index)
            .unwrap();
        assert_eq!(
            split.periods,
            vec![
                CompositePeriod::YearMonth { year: 2024, month: 4 },
                CompositePeriod::YearMonth { year: 2025, month: 4 },
            ]
        );
        assert_eq!(split.data[[0, 0, 0]], Some(0.9));
        assert_abs_diff_eq!(split.data[[1, 0, 0]].unwrap(), 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_other_statistics() {
        let mut values = vec![0.3, -0.1, 0.4];
        assert_eq!(CompositeStatistic::Min.reduce(&mut values), Some(-0.1));
        assert_eq!(CompositeStatistic::Max.reduce(&mut values), Some(0.4));
        assert_abs_diff_eq!(
            CompositeStatistic::Mean.reduce(&mut values).unwrap(),
            0.2,
            epsilon = 1e-12
        );
        assert_eq!(CompositeStatistic::Mean.reduce(&mut []), None);
    }

    #[test]
    fn test_empty_time_axis_rejected() {
        let index: MaskedIndexCube = RasterCube::new(Array3::from_elem((0, 2, 2), None), vec![]).unwrap();
        assert!(matches!(
            composite_monthly(&index),
            Err(WaterError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_pixels_composited_independently() {
        let times = vec![day(2025, 4, 1), day(2025, 4, 11)];
        let values = vec![Some(0.1), None, Some(0.3), Some(-0.4)];
        let index = RasterCube::new(Array3::from_shape_vec((2, 1, 2), values).unwrap(), times).unwrap();

        let composite = composite_monthly(&index).unwrap();
        assert_abs_diff_eq!(composite.data[[0, 0, 0]].unwrap(), 0.2, epsilon = 1e-12);
        assert_eq!(composite.data[[0, 0, 1]], Some(-0.4));
    }
}
