use crate::types::{ClassificationCodeCube, ExclusionMask, RasterCube, WaterResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel-2 L2A scene classification (SCL) codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneClass {
    NoData,
    SaturatedOrDefective,
    DarkAreaPixels,
    CloudShadows,
    Vegetation,
    NotVegetated,
    Water,
    Unclassified,
    CloudMediumProbability,
    CloudHighProbability,
    ThinCirrus,
    SnowIce,
}

impl SceneClass {
    pub fn code(&self) -> i32 {
        match self {
            SceneClass::NoData => 0,
            SceneClass::SaturatedOrDefective => 1,
            SceneClass::DarkAreaPixels => 2,
            SceneClass::CloudShadows => 3,
            SceneClass::Vegetation => 4,
            SceneClass::NotVegetated => 5,
            SceneClass::Water => 6,
            SceneClass::Unclassified => 7,
            SceneClass::CloudMediumProbability => 8,
            SceneClass::CloudHighProbability => 9,
            SceneClass::ThinCirrus => 10,
            SceneClass::SnowIce => 11,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        let class = match code {
            0 => SceneClass::NoData,
            1 => SceneClass::SaturatedOrDefective,
            2 => SceneClass::DarkAreaPixels,
            3 => SceneClass::CloudShadows,
            4 => SceneClass::Vegetation,
            5 => SceneClass::NotVegetated,
            6 => SceneClass::Water,
            7 => SceneClass::Unclassified,
            8 => SceneClass::CloudMediumProbability,
            9 => SceneClass::CloudHighProbability,
            10 => SceneClass::ThinCirrus,
            11 => SceneClass::SnowIce,
            _ => return None,
        };
        Some(class)
    }
}

/// Shadow (3) and the cloud classes (8, 9, 10)
pub const DEFAULT_EXCLUDED_CODES: [i32; 4] = [3, 8, 9, 10];

/// Cloud/shadow mask builder
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    excluded_codes: BTreeSet<i32>,
}

impl Default for MaskBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_CODES.iter().copied().collect())
    }
}

impl MaskBuilder {
    pub fn new(excluded_codes: BTreeSet<i32>) -> Self {
        Self { excluded_codes }
    }

    /// Build the excluded set from named SCL classes
    pub fn from_classes(classes: &[SceneClass]) -> Self {
        Self::new(classes.iter().map(|c| c.code()).collect())
    }

    pub fn excluded_codes(&self) -> &BTreeSet<i32> {
        &self.excluded_codes
    }

    /// Mark every cell whose code is in the excluded set.
    ///
    /// Membership is the only criterion: codes outside the SCL scheme,
    /// negative fill values included, stay unmasked unless listed.
    pub fn build(&self, codes: &ClassificationCodeCube) -> WaterResult<ExclusionMask> {
        log::debug!(
            "Building exclusion mask for {:?} cube, excluded codes {:?}",
            codes.dim(),
            self.excluded_codes
        );

        let mask = codes.data().mapv(|code| self.excluded_codes.contains(&code));
        let excluded = mask.iter().filter(|&&m| m).count();
        log::debug!("Excluded {} of {} cells", excluded, mask.len());

        RasterCube::new(mask, codes.times().to_vec())
    }
}

/// Boolean exclusion mask from classification codes
pub fn build_exclusion_mask(
    codes: &ClassificationCodeCube,
    excluded_codes: &BTreeSet<i32>,
) -> WaterResult<ExclusionMask> {
    MaskBuilder::new(excluded_codes.clone()).build(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ndarray::Array3;

    fn codes_cube(values: Vec<i32>) -> ClassificationCodeCube {
        let n = values.len();
        let data = Array3::from_shape_vec((1, 1, n), values).unwrap();
        RasterCube::new(data, vec![Utc.with_ymd_and_hms(2025, 4, 3, 0, 0, 0).unwrap()]).unwrap()
    }

    #[test]
    fn test_mask_membership() {
        let codes = codes_cube(vec![1, 3, 4, 8, 9, 10, 11]);
        let mask = MaskBuilder::default().build(&codes).unwrap();

        let flags: Vec<bool> = mask.data().iter().copied().collect();
        assert_eq!(flags, vec![false, true, false, true, true, true, false]);
        assert_eq!(mask.times(), codes.times());
    }

    #[test]
    fn test_unknown_codes_not_excluded() {
        let codes = codes_cube(vec![-1, 255, 3]);
        let excluded: BTreeSet<i32> = [3].into_iter().collect();
        let mask = build_exclusion_mask(&codes, &excluded).unwrap();
        let flags: Vec<bool> = mask.data().iter().copied().collect();
        assert_eq!(flags, vec![false, false, true]);

        // Listed explicitly, a sentinel is excluded like any other code
        let excluded: BTreeSet<i32> = [-1].into_iter().collect();
        let mask = build_exclusion_mask(&codes, &excluded).unwrap();
        assert!(mask.data()[[0, 0, 0]]);
    }

    #[test]
    fn test_from_classes() {
        let builder = MaskBuilder::from_classes(&[
            SceneClass::CloudShadows,
            SceneClass::CloudMediumProbability,
            SceneClass::CloudHighProbability,
            SceneClass::ThinCirrus,
        ]);
        assert_eq!(builder.excluded_codes(), MaskBuilder::default().excluded_codes());
    }

    #[test]
    fn test_scene_class_codes() {
        for code in 0..12 {
            let class = SceneClass::from_code(code).unwrap();
            assert_eq!(class.code(), code);
        }
        assert_eq!(SceneClass::from_code(12), None);
        assert_eq!(SceneClass::from_code(-1), None);
    }
}
