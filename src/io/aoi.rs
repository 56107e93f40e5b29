use crate::types::{BoundingBox, WaterError, WaterResult};
use serde_json::{json, Value};
use std::path::Path;

/// Area of interest in geographic coordinates (lon, lat).
///
/// Only exterior rings are kept; the AOI bounds the catalog search and the
/// loading extent, it is never used for clipping.
#[derive(Debug, Clone, PartialEq)]
pub struct Aoi {
    polygons: Vec<Vec<[f64; 2]>>,
}

impl Aoi {
    /// Build from exterior rings of (lon, lat) vertices
    pub fn from_rings(polygons: Vec<Vec<[f64; 2]>>) -> WaterResult<Self> {
        if polygons.iter().all(|ring| ring.is_empty()) {
            return Err(invalid("AOI has no vertices"));
        }
        for ring in &polygons {
            for [lon, lat] in ring {
                if !(-180.0..=180.0).contains(lon) || !(-90.0..=90.0).contains(lat) {
                    return Err(invalid(&format!(
                        "vertex ({}, {}) is not a geographic coordinate",
                        lon, lat
                    )));
                }
            }
        }
        Ok(Self { polygons })
    }

    /// Parse a GeoJSON Polygon, MultiPolygon, Feature or FeatureCollection
    pub fn from_geojson_str(text: &str) -> WaterResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| invalid(&format!("invalid GeoJSON: {}", e)))?;
        let mut polygons = Vec::new();
        collect_polygons(&value, &mut polygons)?;
        Self::from_rings(polygons)
    }

    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> WaterResult<Self> {
        log::info!("Reading AOI: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text)
    }

    pub fn polygons(&self) -> &[Vec<[f64; 2]>] {
        &self.polygons
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for [lon, lat] in self.polygons.iter().flatten() {
            bbox.min_lon = bbox.min_lon.min(*lon);
            bbox.max_lon = bbox.max_lon.max(*lon);
            bbox.min_lat = bbox.min_lat.min(*lat);
            bbox.max_lat = bbox.max_lat.max(*lat);
        }
        bbox
    }

    /// GeoJSON geometry for a STAC `intersects` filter
    pub fn to_geometry(&self) -> Value {
        let closed: Vec<Vec<[f64; 2]>> = self
            .polygons
            .iter()
            .filter(|ring| !ring.is_empty())
            .map(|ring| {
                let mut ring = ring.clone();
                if ring.first() != ring.last() {
                    ring.push(ring[0]);
                }
                ring
            })
            .collect();

        if closed.len() == 1 {
            let ring = &closed[0];
            json!({ "type": "Polygon", "coordinates": [ring] })
        } else {
            let polygons: Vec<Vec<Vec<[f64; 2]>>> = closed.into_iter().map(|ring| vec![ring]).collect();
            json!({ "type": "MultiPolygon", "coordinates": polygons })
        }
    }
}

fn invalid(message: &str) -> WaterError {
    WaterError::InvalidInput {
        stage: "aoi",
        message: message.to_string(),
    }
}

fn collect_polygons(value: &Value, out: &mut Vec<Vec<[f64; 2]>>) -> WaterResult<()> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("GeoJSON object without a type"))?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("FeatureCollection without features"))?;
            for feature in features {
                collect_polygons(feature, out)?;
            }
        }
        "Feature" => {
            let geometry = value
                .get("geometry")
                .ok_or_else(|| invalid("Feature without geometry"))?;
            collect_polygons(geometry, out)?;
        }
        "Polygon" => {
            let rings = coordinates(value)?;
            out.push(exterior_ring(rings)?);
        }
        "MultiPolygon" => {
            for polygon in coordinates(value)? {
                let rings = polygon
                    .as_array()
                    .ok_or_else(|| invalid("MultiPolygon member is not an array"))?;
                out.push(exterior_ring(rings)?);
            }
        }
        other => {
            return Err(invalid(&format!("unsupported geometry type '{}'", other)));
        }
    }
    Ok(())
}

fn coordinates(value: &Value) -> WaterResult<&Vec<Value>> {
    value
        .get("coordinates")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("geometry without coordinates"))
}

fn exterior_ring(rings: &[Value]) -> WaterResult<Vec<[f64; 2]>> {
    let ring = rings
        .first()
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("polygon without an exterior ring"))?;

    ring.iter()
        .map(|position| {
            let pair = position.as_array().filter(|p| p.len() >= 2);
            match pair.map(|p| (p[0].as_f64(), p[1].as_f64())) {
                Some((Some(lon), Some(lat))) => Ok([lon, lat]),
                _ => Err(invalid("position is not a [lon, lat] pair")),
            }
        })
        .collect()
}
