//! Wire types for the analytics backend.
//!
//! Both map endpoints take the same request body (a [`ViewConfiguration`]):
//! - `POST /map/counties` returns a GeoJSON `FeatureCollection` plus `alpha`.
//! - `POST /map/hexes` returns one `FeatureCollection` per hex resolution plus
//!   the resolution bands the client should render them in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default minimum number of rows a context needs before its statistics count.
pub const DEFAULT_MIN_SUPPORT: u32 = 30;

/// Analysis parameters shared by every map request.
///
/// Owned by the caller and passed in by reference; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfiguration {
    pub context_cols: Vec<String>,
    pub target: String,
    #[serde(default = "default_min_support")]
    pub min_support: u32,
}

fn default_min_support() -> u32 {
    DEFAULT_MIN_SUPPORT
}

impl ViewConfiguration {
    pub fn new(context_cols: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            context_cols,
            target: target.into(),
            min_support: DEFAULT_MIN_SUPPORT,
        }
    }

    pub fn with_min_support(mut self, min_support: u32) -> Self {
        self.min_support = min_support;
        self
    }
}

/// Zoom window in which one hex resolution is the primary rendering target.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionBand {
    #[serde(rename = "res")]
    pub resolution: u8,
    #[serde(rename = "minZoom")]
    pub min_zoom: f64,
    #[serde(rename = "maxZoom")]
    pub max_zoom: f64,
}

impl ResolutionBand {
    pub const fn new(resolution: u8, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            resolution,
            min_zoom,
            max_zoom,
        }
    }
}

/// The five bands the backend aggregates to by default.
pub const DEFAULT_BANDS: [ResolutionBand; 5] = [
    ResolutionBand::new(5, 0.0, 7.0),
    ResolutionBand::new(6, 6.0, 9.0),
    ResolutionBand::new(7, 8.0, 11.0),
    ResolutionBand::new(8, 10.0, 13.0),
    ResolutionBand::new(9, 12.0, 20.0),
];

/// Raw `POST /map/counties` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionMapPayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub features: Vec<geojson::Feature>,
    #[serde(default)]
    pub alpha: Option<f64>,
}

/// Raw `POST /map/hexes` response.
#[derive(Debug, Clone, Deserialize)]
pub struct HexMapPayload {
    /// Keyed by resolution rendered as a string (`"5"`, `"6"`, ...).
    pub by_resolution: BTreeMap<String, geojson::FeatureCollection>,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub total_hexes: Option<u64>,
    #[serde(default)]
    pub levels: Option<Vec<ResolutionBand>>,
}

/// Error body produced by the backend for 4xx/5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorPayload {
    pub detail: serde_json::Value,
}

impl ErrorPayload {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
