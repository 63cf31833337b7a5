//! An in-memory [`MapSurface`].
//!
//! Keeps the style (sources, ordered layers, paint) and camera state, logs
//! every mutating call, evaluates paint expressions and hit-tests features
//! with `geo`. Camera moves complete instantly.

use std::collections::{BTreeMap, BTreeSet};

use foundation::{CameraTarget, LngLat, clamp_zoom};
use geo::{Intersects, Point, Rect, coord};
use geojson::{FeatureCollection, JsonObject};
use tracing::trace;

use crate::expression::{EvalContext, Expr, ExprValue};
use crate::surface::{
    LayerKind, LayerSpec, MapSurface, PointerKind, PopupContent, SourceData, SurfaceError,
};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    AddSource(String),
    RemoveSource(String),
    AddLayer(String),
    RemoveLayer(String),
    SetPaint { layer: String, property: String },
    Listen { layer: String, kind: PointerKind },
    Unlisten { layer: String, kind: PointerKind },
    FlyTo(CameraTarget),
    ShowPopup,
    RemovePopup,
}

#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    sources: BTreeMap<String, FeatureCollection>,
    layers: Vec<LayerSpec>,
    listeners: BTreeSet<(String, PointerKind)>,
    camera: CameraTarget,
    popup: Option<(LngLat, PopupContent)>,
    commands: Vec<SurfaceCommand>,
}

/// Pick radius around the pointer for line layers, in degrees.
const LINE_PICK_TOLERANCE: f64 = 0.01;

impl HeadlessSurface {
    pub fn new(camera: CameraTarget) -> Self {
        Self {
            sources: BTreeMap::new(),
            layers: Vec::new(),
            listeners: BTreeSet::new(),
            camera,
            popup: None,
            commands: Vec::new(),
        }
    }

    /// Simulates the user zooming without an animation.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.camera.zoom = clamp_zoom(zoom);
    }

    pub fn commands(&self) -> &[SurfaceCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn flights(&self) -> Vec<CameraTarget> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                SurfaceCommand::FlyTo(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Layer ids in draw order, bottom first.
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    pub fn source(&self, id: &str) -> Option<&FeatureCollection> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn listeners(&self) -> &BTreeSet<(String, PointerKind)> {
        &self.listeners
    }

    pub fn popup(&self) -> Option<&(LngLat, PopupContent)> {
        self.popup.as_ref()
    }

    /// Evaluates a paint property at the current zoom.
    pub fn paint_value(
        &self,
        layer: &str,
        property: &str,
        properties: Option<&JsonObject>,
    ) -> Option<ExprValue> {
        let expr = self.layer(layer)?.paint.get(property)?;
        let mut ctx = EvalContext::at_zoom(self.camera.zoom);
        ctx.properties = properties;
        Some(expr.evaluate(ctx))
    }

    /// Effective opacity of `layer` at the current zoom: zero outside its
    /// zoom window, otherwise its opacity paint (1.0 when unset).
    pub fn rendered_opacity(&self, layer: &str) -> Option<f64> {
        let spec = self.layer(layer)?;
        if !spec.renders_at(self.camera.zoom) {
            return Some(0.0);
        }
        match spec.paint.get(spec.opacity_property()) {
            Some(expr) => expr.evaluate(EvalContext::at_zoom(self.camera.zoom)).as_f64(),
            None => Some(1.0),
        }
    }

    /// Fill color of every feature in the layer's source, in source order.
    pub fn fill_colors(&self, layer: &str) -> Vec<String> {
        let Some(spec) = self.layer(layer) else {
            return Vec::new();
        };
        let Some(source) = self.sources.get(&spec.source) else {
            return Vec::new();
        };
        source
            .features
            .iter()
            .filter_map(|f| {
                self.paint_value(layer, "fill-color", f.properties.as_ref())
                    .and_then(|v| v.as_str().map(str::to_string))
            })
            .collect()
    }

    fn hit(&self, kind: LayerKind, geometry: &geojson::Geometry, at: LngLat) -> bool {
        let Ok(geom) = geo::Geometry::<f64>::try_from(geometry.clone()) else {
            return false;
        };
        match kind {
            LayerKind::Fill => geom.intersects(&Point::new(at.lng, at.lat)),
            LayerKind::Line => {
                let t = LINE_PICK_TOLERANCE;
                let rect = Rect::new(
                    coord! { x: at.lng - t, y: at.lat - t },
                    coord! { x: at.lng + t, y: at.lat + t },
                );
                geom.intersects(&rect)
            }
        }
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(CameraTarget::new(LngLat::new(0.0, 0.0), 0.0))
    }
}

impl MapSurface for HeadlessSurface {
    fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError::DuplicateSource(id.to_string()));
        }
        let SourceData::GeoJson(fc) = data;
        self.sources.insert(id.to_string(), fc);
        self.commands.push(SurfaceCommand::AddSource(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if let Some(layer) = self.layers.iter().find(|l| l.source == id) {
            return Err(SurfaceError::SourceInUse {
                source_id: id.to_string(),
                layer: layer.id.clone(),
            });
        }
        self.sources
            .remove(id)
            .ok_or_else(|| SurfaceError::MissingSource(id.to_string()))?;
        self.commands.push(SurfaceCommand::RemoveSource(id.to_string()));
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), SurfaceError> {
        if self.has_layer(&spec.id) {
            return Err(SurfaceError::DuplicateLayer(spec.id));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(SurfaceError::MissingSource(spec.source));
        }
        self.commands.push(SurfaceCommand::AddLayer(spec.id.clone()));
        self.layers.push(spec);
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        let idx = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| SurfaceError::MissingLayer(id.to_string()))?;
        self.layers.remove(idx);
        self.commands.push(SurfaceCommand::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layers.iter().any(|l| l.id == id)
    }

    fn set_paint_property(
        &mut self,
        layer: &str,
        property: &str,
        value: Expr,
    ) -> Result<(), SurfaceError> {
        let spec = self
            .layers
            .iter_mut()
            .find(|l| l.id == layer)
            .ok_or_else(|| SurfaceError::MissingLayer(layer.to_string()))?;
        spec.paint.insert(property.to_string(), value);
        self.commands.push(SurfaceCommand::SetPaint {
            layer: layer.to_string(),
            property: property.to_string(),
        });
        Ok(())
    }

    fn camera(&self) -> CameraTarget {
        self.camera
    }

    fn fly_to(&mut self, target: CameraTarget) {
        trace!(lng = target.center.lng, lat = target.center.lat, zoom = target.zoom, "fly_to");
        self.camera = CameraTarget::new(target.center, clamp_zoom(target.zoom));
        self.commands.push(SurfaceCommand::FlyTo(target));
    }

    fn listen(&mut self, layer: &str, kind: PointerKind) {
        self.listeners.insert((layer.to_string(), kind));
        self.commands.push(SurfaceCommand::Listen {
            layer: layer.to_string(),
            kind,
        });
    }

    fn unlisten(&mut self, layer: &str, kind: PointerKind) {
        self.listeners.remove(&(layer.to_string(), kind));
        self.commands.push(SurfaceCommand::Unlisten {
            layer: layer.to_string(),
            kind,
        });
    }

    fn query_features(&self, layer: &str, at: LngLat) -> Vec<JsonObject> {
        let Some(spec) = self.layer(layer) else {
            return Vec::new();
        };
        if !spec.renders_at(self.camera.zoom) {
            return Vec::new();
        }
        let Some(source) = self.sources.get(&spec.source) else {
            return Vec::new();
        };
        source
            .features
            .iter()
            .rev()
            .filter(|f| f.geometry.as_ref().is_some_and(|g| self.hit(spec.kind, g, at)))
            .map(|f| f.properties.clone().unwrap_or_default())
            .collect()
    }

    fn show_popup(&mut self, at: LngLat, content: PopupContent) {
        self.popup = Some((at, content));
        self.commands.push(SurfaceCommand::ShowPopup);
    }

    fn remove_popup(&mut self) {
        if self.popup.take().is_some() {
            self.commands.push(SurfaceCommand::RemovePopup);
        }
    }
}
