use crate::types::{ExclusionMask, IndexValue, MaskedIndexCube, RasterCube, WaterError, WaterResult};
use ndarray::{Array3, Zip};
use num_traits::ToPrimitive;

/// Division by a zero band sum. Recovered as no-data, never returned.
#[derive(Debug, Clone, Copy, PartialEq)]
struct UndefinedArithmetic;

/// Per-cell outcome before no-data substitution
#[derive(Debug, Clone, Copy, PartialEq)]
enum CellOutcome {
    Value(f64),
    Masked,
    Undefined,
    Unrepresentable,
}

/// `(a - b) / (a + b)`
fn normalized_difference(a: f64, b: f64) -> Result<f64, UndefinedArithmetic> {
    let sum = a + b;
    if sum == 0.0 {
        return Err(UndefinedArithmetic);
    }
    let value = (a - b) / sum;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(UndefinedArithmetic)
    }
}

fn evaluate_cell<T: ToPrimitive>(green: &T, swir: &T, excluded: bool) -> CellOutcome {
    let (g, s) = match (green.to_f64(), swir.to_f64()) {
        (Some(g), Some(s)) => (g, s),
        _ => return CellOutcome::Unrepresentable,
    };

    if excluded {
        return CellOutcome::Masked;
    }

    // NaN reflectance is upstream fill, not a number to propagate
    if !g.is_finite() || !s.is_finite() {
        return CellOutcome::Masked;
    }

    match normalized_difference(g, s) {
        Ok(value) => CellOutcome::Value(value),
        Err(UndefinedArithmetic) => CellOutcome::Undefined,
    }
}

#[cfg(feature = "parallel")]
fn evaluate_cube<T>(green: &Array3<T>, swir: &Array3<T>, mask: &Array3<bool>) -> Array3<CellOutcome>
where
    T: ToPrimitive + Sync,
{
    Zip::from(green)
        .and(swir)
        .and(mask)
        .par_map_collect(|g, s, &m| evaluate_cell(g, s, m))
}

#[cfg(not(feature = "parallel"))]
fn evaluate_cube<T>(green: &Array3<T>, swir: &Array3<T>, mask: &Array3<bool>) -> Array3<CellOutcome>
where
    T: ToPrimitive + Sync,
{
    Zip::from(green)
        .and(swir)
        .and(mask)
        .map_collect(|g, s, &m| evaluate_cell(g, s, m))
}

/// Masked MNDWI, `(green - swir) / (green + swir)`.
///
/// Masked cells, zero band sums and non-finite samples become `None`.
/// The three cubes must share shape and time labels.
pub fn compute_index<T>(
    green: &RasterCube<T>,
    swir: &RasterCube<T>,
    mask: &ExclusionMask,
) -> WaterResult<MaskedIndexCube>
where
    T: ToPrimitive + Sync,
{
    green.check_aligned(swir, "index calculator (green vs swir)")?;
    green.check_aligned(mask, "index calculator (bands vs mask)")?;

    log::debug!("Computing normalized difference index on {:?} cube", green.dim());

    let outcomes = evaluate_cube(green.data(), swir.data(), mask.data());

    let mut masked = 0usize;
    let mut undefined = 0usize;
    let mut unrepresentable = 0usize;
    for outcome in outcomes.iter() {
        match outcome {
            CellOutcome::Masked => masked += 1,
            CellOutcome::Undefined => undefined += 1,
            CellOutcome::Unrepresentable => unrepresentable += 1,
            CellOutcome::Value(_) => {}
        }
    }

    if unrepresentable > 0 {
        return Err(WaterError::InvalidInput {
            stage: "index calculator",
            message: format!(
                "{} band samples in {:?} cube cannot be represented as f64",
                unrepresentable,
                green.dim()
            ),
        });
    }

    if undefined > 0 {
        log::debug!("{} cells with zero band sum set to no-data", undefined);
    }
    log::debug!("{} cells masked or non-finite", masked);

    let index: Array3<IndexValue> = outcomes.mapv(|outcome| match outcome {
        CellOutcome::Value(value) => Some(value),
        _ => None,
    });

    RasterCube::new(index, green.times().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};

    fn cube<T>(values: Vec<T>) -> RasterCube<T> {
        let n = values.len();
        let data = Array3::from_shape_vec((1, 1, n), values).unwrap();
        RasterCube::new(data, vec![Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap()]).unwrap()
    }

    #[test]
    fn test_index_values_and_no_data() {
        let green = cube(vec![5.0f32, 0.0, 300.0, 100.0]);
        let swir = cube(vec![5.0f32, 0.0, 100.0, 300.0]);
        let mask = cube(vec![false; 4]);

        let index = compute_index(&green, &swir, &mask).unwrap();
        let values: Vec<IndexValue> = index.data().iter().copied().collect();

        assert_eq!(values[0], Some(0.0));
        assert_eq!(values[1], None);
        assert_abs_diff_eq!(values[2].unwrap(), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(values[3].unwrap(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_mask_overrides_valid_arithmetic() {
        let green = cube(vec![400u16, 400]);
        let swir = cube(vec![100u16, 100]);
        let mask = cube(vec![true, false]);

        let index = compute_index(&green, &swir, &mask).unwrap();
        assert_eq!(index.data()[[0, 0, 0]], None);
        assert_abs_diff_eq!(index.data()[[0, 0, 1]].unwrap(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_samples_are_no_data() {
        let green = cube(vec![f32::NAN, 0.3]);
        let swir = cube(vec![0.1f32, f32::INFINITY]);
        let mask = cube(vec![false, false]);

        let index = compute_index(&green, &swir, &mask).unwrap();
        assert!(index.data().iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_opposite_signs_cancelling_sum() {
        // Negative reflectance offsets can cancel; still no-data, never inf
        let green = cube(vec![-0.2f64]);
        let swir = cube(vec![0.2f64]);
        let mask = cube(vec![false]);

        let index = compute_index(&green, &swir, &mask).unwrap();
        assert_eq!(index.data()[[0, 0, 0]], None);
    }

    #[test]
    fn test_misaligned_bands_rejected() {
        let green = cube(vec![1.0f32, 2.0]);
        let swir = cube(vec![1.0f32, 2.0, 3.0]);
        let mask = cube(vec![false, false]);

        let result = compute_index(&green, &swir, &mask);
        assert!(matches!(result, Err(WaterError::Alignment { .. })));
    }

    #[test]
    fn test_misaligned_mask_rejected() {
        let green = cube(vec![1.0f32, 2.0]);
        let swir = cube(vec![1.0f32, 2.0]);
        let mask = RasterCube::new(
            Array3::from_elem((1, 1, 2), false),
            vec![Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap()],
        )
        .unwrap();

        let result = compute_index(&green, &swir, &mask);
        assert!(matches!(result, Err(WaterError::Alignment { .. })));
    }

    #[test]
    fn test_normalized_difference_zero_sum() {
        assert_eq!(normalized_difference(0.0, 0.0), Err(UndefinedArithmetic));
        assert_eq!(normalized_difference(5.0, 5.0), Ok(0.0));
    }
}
