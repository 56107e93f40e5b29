//! STAC Item Search for scene discovery.
//!
//! Models the subset of the STAC API the pipeline needs: a POST `/search`
//! body with collection, spatial, temporal and cloud-cover filters, item
//! pages with `next` links, and per-item asset references.

use crate::types::{BoundingBox, WaterError, WaterResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// What to search for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub collection: String,
    /// ISO 8601 interval, `start/end`
    pub datetime: String,
    /// Keep scenes with `eo:cloud_cover` strictly below this percentage
    pub max_cloud_cover: f64,
    pub bbox: Option<BoundingBox>,
    /// GeoJSON geometry; takes precedence over `bbox` on the server
    pub intersects: Option<Value>,
    /// Page size
    pub limit: u32,
    /// Cap on items collected across pages
    pub max_items: usize,
    pub green_asset: String,
    pub swir_asset: String,
    pub scl_asset: String,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            collection: "sentinel-2-l2a".to_string(),
            datetime: "2025-04-01/2025-07-31".to_string(),
            max_cloud_cover: 80.0,
            bbox: None,
            intersects: None,
            limit: 100,
            max_items: 1000,
            green_asset: "B03".to_string(),
            swir_asset: "B11".to_string(),
            scl_asset: "SCL".to_string(),
        }
    }
}

impl SearchRequest {
    /// Asset keys every usable item must carry
    pub fn required_assets(&self) -> [&str; 3] {
        [
            self.green_asset.as_str(),
            self.swir_asset.as_str(),
            self.scl_asset.as_str(),
        ]
    }

    pub fn validate(&self) -> WaterResult<()> {
        let (start, end) = self.datetime.split_once('/').ok_or_else(|| {
            WaterError::Time(format!("datetime '{}' is not a start/end interval", self.datetime))
        })?;
        for bound in [start, end] {
            if bound.is_empty() || bound == ".." {
                continue;
            }
            if DateTime::parse_from_rfc3339(bound).is_err()
                && chrono::NaiveDate::parse_from_str(bound, "%Y-%m-%d").is_err()
            {
                return Err(WaterError::Time(format!(
                    "'{}' in interval '{}' is not an ISO 8601 date",
                    bound, self.datetime
                )));
            }
        }
        if self.bbox.is_none() && self.intersects.is_none() {
            return Err(WaterError::InvalidInput {
                stage: "catalog search",
                message: "search needs a bbox or an intersects geometry".to_string(),
            });
        }
        Ok(())
    }
}

/// Body for `POST /search` (STAC API Item Search)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacSearchBody {
    pub collections: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Value>,

    pub datetime: String,

    pub limit: u32,

    /// Property filters (query extension)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,

    /// Pagination token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<&SearchRequest> for StacSearchBody {
    fn from(request: &SearchRequest) -> Self {
        Self {
            collections: vec![request.collection.clone()],
            bbox: request.bbox.map(|b| b.to_stac()),
            intersects: request.intersects.clone(),
            datetime: request.datetime.clone(),
            limit: request.limit,
            query: Some(json!({ "eo:cloud_cover": { "lt": request.max_cloud_cover } })),
            token: None,
        }
    }
}

/// A page of search results (GeoJSON FeatureCollection)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItemCollection {
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

/// A single scene
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,
}

impl StacItem {
    /// Acquisition time from `properties.datetime`
    pub fn datetime(&self) -> WaterResult<DateTime<Utc>> {
        let text = self.properties.datetime.as_deref().ok_or_else(|| {
            WaterError::Time(format!("item '{}' has no datetime", self.id))
        })?;
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| WaterError::Time(format!("item '{}' datetime '{}': {}", self.id, text, e)))
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.eo_cloud_cover
    }

    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    pub fn has_assets(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.assets.contains_key(*k))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Pagination link
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}

/// Anything that can answer a scene search
pub trait CatalogClient {
    fn search(&self, request: &SearchRequest) -> WaterResult<Vec<StacItem>>;
}

/// Drop unusable items and order the rest by acquisition time.
///
/// Items are dropped when they lack a required asset, carry no parseable
/// datetime, or report cloud cover at or above the request's limit.
pub fn prepare_items(items: Vec<StacItem>, request: &SearchRequest) -> Vec<(DateTime<Utc>, StacItem)> {
    let required = request.required_assets();
    let mut kept: Vec<(DateTime<Utc>, StacItem)> = Vec::with_capacity(items.len());

    for item in items {
        if !item.has_assets(&required) {
            log::warn!("Skipping item {}: missing one of assets {:?}", item.id, required);
            continue;
        }
        if let Some(cover) = item.cloud_cover() {
            if cover >= request.max_cloud_cover {
                log::debug!("Skipping item {}: cloud cover {}%", item.id, cover);
                continue;
            }
        }
        match item.datetime() {
            Ok(time) => kept.push((time, item)),
            Err(e) => log::warn!("Skipping item: {}", e),
        }
    }

    kept.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
    kept
}

/// Options for [`StacClient`]
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    pub request_timeout: Duration,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Blocking STAC API client
pub struct StacClient {
    search_url: String,
    client: reqwest::blocking::Client,
}

impl StacClient {
    /// `root` is the API root (e.g. `.../api/stac/v1`) or its `/search` URL
    pub fn new(root: &str, options: StacClientOptions) -> WaterResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| WaterError::Catalog(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            search_url: search_url(root),
            client,
        })
    }

    /// Microsoft Planetary Computer
    pub fn planetary_computer() -> WaterResult<Self> {
        Self::new(
            "https://planetarycomputer.microsoft.com/api/stac/v1",
            StacClientOptions::default(),
        )
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    fn post_search(&self, url: &str, body: &Value) -> WaterResult<StacItemCollection> {
        log::debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .map_err(|e| WaterError::Catalog(format!("STAC search request failed: {}", e)))?;
        read_page(response)
    }

    fn get_page(&self, url: &str) -> WaterResult<StacItemCollection> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| WaterError::Catalog(format!("STAC pagination request failed: {}", e)))?;
        read_page(response)
    }

    fn follow_next(&self, link: &StacLink, previous_body: &Value) -> WaterResult<(StacItemCollection, Value)> {
        let method = link.method.as_deref().unwrap_or("GET").to_uppercase();
        if method != "POST" {
            return Ok((self.get_page(&link.href)?, previous_body.clone()));
        }

        let body = match (&link.body, link.merge.unwrap_or(false)) {
            (Some(link_body), true) => {
                let mut merged = previous_body.clone();
                if let (Some(base), Some(overlay)) = (merged.as_object_mut(), link_body.as_object()) {
                    for (k, v) in overlay {
                        base.insert(k.clone(), v.clone());
                    }
                }
                merged
            }
            (Some(link_body), false) => link_body.clone(),
            (None, _) => previous_body.clone(),
        };
        Ok((self.post_search(&link.href, &body)?, body))
    }
}

impl CatalogClient for StacClient {
    fn search(&self, request: &SearchRequest) -> WaterResult<Vec<StacItem>> {
        request.validate()?;
        log::info!(
            "Searching {} for {} over {} (cloud cover < {}%)",
            self.search_url,
            request.collection,
            request.datetime,
            request.max_cloud_cover
        );

        let mut body = serde_json::to_value(StacSearchBody::from(request))
            .map_err(|e| WaterError::Catalog(format!("serializing search body: {}", e)))?;
        let mut page = self.post_search(&self.search_url, &body)?;
        let mut items: Vec<StacItem> = Vec::new();

        loop {
            let next = page.next_link().cloned();
            items.extend(page.features.drain(..));
            if items.len() >= request.max_items {
                break;
            }
            match next {
                Some(link) => {
                    let (next_page, next_body) = self.follow_next(&link, &body)?;
                    if next_page.features.is_empty() {
                        break;
                    }
                    page = next_page;
                    body = next_body;
                }
                None => break,
            }
        }

        items.truncate(request.max_items);
        log::info!("Catalog returned {} items", items.len());
        Ok(items)
    }
}

fn search_url(root: &str) -> String {
    let root = root.trim_end_matches('/');
    if root.ends_with("/search") {
        root.to_string()
    } else {
        format!("{}/search", root)
    }
}

fn read_page(response: reqwest::blocking::Response) -> WaterResult<StacItemCollection> {
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| WaterError::Catalog(format!("reading response body: {}", e)))?;
    if !status.is_success() {
        return Err(WaterError::Catalog(format!(
            "STAC search returned HTTP {}: {}",
            status,
            text.chars().take(500).collect::<String>()
        )));
    }
    parse_item_collection(&text)
}

/// Parse a STAC ItemCollection page
pub fn parse_item_collection(text: &str) -> WaterResult<StacItemCollection> {
    serde_json::from_str(text).map_err(|e| WaterError::Catalog(format!("parsing STAC response: {}", e)))
}
