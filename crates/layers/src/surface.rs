//! The map surface seam.
//!
//! [`MapSurface`] is the slice of a MapLibre-style map the engine drives:
//! sources, layers, paint properties, the camera, pointer listeners and a
//! single popup. Browser bindings and the headless surface both implement it.

use std::collections::BTreeMap;

use foundation::{CameraTarget, LngLat};
use geojson::{FeatureCollection, JsonObject};
use serde_json::{Value, json};

use crate::expression::Expr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("source {0:?} already exists")]
    DuplicateSource(String),
    #[error("layer {0:?} already exists")]
    DuplicateLayer(String),
    #[error("source {0:?} does not exist")]
    MissingSource(String),
    #[error("layer {0:?} does not exist")]
    MissingLayer(String),
    #[error("source {source_id:?} is still used by layer {layer:?}")]
    SourceInUse { source_id: String, layer: String },
    /// Reported by the map itself, e.g. the base style failed to load.
    #[error("map error: {0}")]
    Map(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    GeoJson(FeatureCollection),
}

impl SourceData {
    pub fn feature_count(&self) -> usize {
        match self {
            SourceData::GeoJson(fc) => fc.features.len(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Fill,
    Line,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Fill => "fill",
            LayerKind::Line => "line",
        }
    }
}

/// One style layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
    pub paint: BTreeMap<String, Expr>,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
}

impl LayerSpec {
    pub fn new(id: impl Into<String>, source: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            kind,
            paint: BTreeMap::new(),
            min_zoom: None,
            max_zoom: None,
        }
    }

    pub fn with_paint(mut self, property: &str, value: Expr) -> Self {
        self.paint.insert(property.to_string(), value);
        self
    }

    pub fn with_zoom_range(mut self, range: Option<(f64, f64)>) -> Self {
        if let Some((lo, hi)) = range {
            self.min_zoom = Some(lo);
            self.max_zoom = Some(hi);
        }
        self
    }

    /// Whether the layer renders at `zoom` (`minzoom` inclusive, `maxzoom` exclusive).
    pub fn renders_at(&self, zoom: f64) -> bool {
        self.min_zoom.is_none_or(|lo| zoom >= lo) && self.max_zoom.is_none_or(|hi| zoom < hi)
    }

    /// Paint property that controls this layer's opacity.
    pub fn opacity_property(&self) -> &'static str {
        match self.kind {
            LayerKind::Fill => "fill-opacity",
            LayerKind::Line => "line-opacity",
        }
    }

    /// Style-spec JSON for `map.addLayer`.
    pub fn to_style_json(&self) -> Value {
        let paint: serde_json::Map<String, Value> = self
            .paint
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        let mut out = json!({
            "id": self.id,
            "type": self.kind.as_str(),
            "source": self.source,
            "paint": paint,
        });
        if let Some(lo) = self.min_zoom {
            out["minzoom"] = json!(lo);
        }
        if let Some(hi) = self.max_zoom {
            out["maxzoom"] = json!(hi);
        }
        out
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointerKind {
    Move,
    Leave,
    Click,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub at: LngLat,
}

impl PointerEvent {
    pub fn moved(at: LngLat) -> Self {
        Self {
            kind: PointerKind::Move,
            at,
        }
    }

    pub fn left(at: LngLat) -> Self {
        Self {
            kind: PointerKind::Leave,
            at,
        }
    }

    pub fn clicked(at: LngLat) -> Self {
        Self {
            kind: PointerKind::Click,
            at,
        }
    }
}

/// Contents of the hover popup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopupContent {
    pub title: String,
    pub lines: Vec<String>,
    pub explanation: Option<String>,
}

pub trait MapSurface {
    fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError>;
    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn has_source(&self, id: &str) -> bool;

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;
    fn has_layer(&self, id: &str) -> bool;
    fn set_paint_property(&mut self, layer: &str, property: &str, value: Expr)
    -> Result<(), SurfaceError>;

    fn camera(&self) -> CameraTarget;
    fn zoom(&self) -> f64 {
        self.camera().zoom
    }
    /// Starts an animated camera move. Returns immediately.
    fn fly_to(&mut self, target: CameraTarget);

    /// Registers interest in `kind` events on `layer`. Registrations are
    /// keyed by layer id and outlive removal and re-adding of the layer.
    fn listen(&mut self, layer: &str, kind: PointerKind);
    fn unlisten(&mut self, layer: &str, kind: PointerKind);

    /// Attributes of the features of `layer` rendered under `at`, topmost first.
    fn query_features(&self, layer: &str, at: LngLat) -> Vec<JsonObject>;

    fn show_popup(&mut self, at: LngLat, content: PopupContent);
    fn remove_popup(&mut self);
}

#[cfg(test)]
mod tests {
    use super::{LayerKind, LayerSpec};
    use crate::expression::Expr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn layer_spec_serializes_like_add_layer() {
        let spec = LayerSpec::new("hex-r6-fill", "hex-r6", LayerKind::Fill)
            .with_paint("fill-opacity", Expr::Number(0.5))
            .with_zoom_range(Some((6.0, 9.0)));
        assert_eq!(
            spec.to_style_json(),
            json!({
                "id": "hex-r6-fill",
                "type": "fill",
                "source": "hex-r6",
                "paint": {"fill-opacity": 0.5},
                "minzoom": 6.0,
                "maxzoom": 9.0
            })
        );
    }

    #[test]
    fn zoom_window_is_half_open() {
        let spec = LayerSpec::new("a", "b", LayerKind::Line).with_zoom_range(Some((6.0, 9.0)));
        assert!(!spec.renders_at(5.99));
        assert!(spec.renders_at(6.0));
        assert!(spec.renders_at(8.99));
        assert!(!spec.renders_at(9.0));
        assert_eq!(spec.opacity_property(), "line-opacity");
    }
}
