use foundation::{CameraTarget, LngLat};
use interaction::{DEFAULT_EXPLANATION_THRESHOLD, TooltipConfig};
use layers::{DEFAULT_SEVERITY_FIELD, ViewMode};

/// Zoom used when flying to a region.
pub const REGION_ZOOM: f64 = 9.0;
/// Zoom used by `fly_to_coordinate` when the caller gives none.
pub const DEFAULT_COORDINATE_ZOOM: f64 = 10.0;
/// Zoom used by `fly_to_hex_index` when the caller gives none.
pub const DEFAULT_HEX_ZOOM: f64 = 12.0;

/// Engine settings that do not change per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOptions {
    pub initial_center: LngLat,
    pub initial_zoom: f64,
    /// Mode loaded by [`ViewController::start`](crate::ViewController::start).
    pub initial_mode: ViewMode,
    /// Load `initial_mode` on start. When false the controller starts with
    /// no mode until the first explicit switch.
    pub auto_load: bool,
    pub region_zoom: f64,
    pub coordinate_zoom: f64,
    pub hex_zoom: f64,
    /// Attribute driving the color ramp and the tooltip's primary line.
    pub severity_field: String,
    pub explanation_threshold: f64,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            initial_center: LngLat::new(-119.4, 37.2),
            initial_zoom: 5.5,
            initial_mode: ViewMode::Counties,
            auto_load: true,
            region_zoom: REGION_ZOOM,
            coordinate_zoom: DEFAULT_COORDINATE_ZOOM,
            hex_zoom: DEFAULT_HEX_ZOOM,
            severity_field: DEFAULT_SEVERITY_FIELD.to_string(),
            explanation_threshold: DEFAULT_EXPLANATION_THRESHOLD,
        }
    }
}

impl ViewOptions {
    pub fn initial_camera(&self) -> CameraTarget {
        CameraTarget::new(self.initial_center, self.initial_zoom)
    }

    pub fn tooltip(&self) -> TooltipConfig {
        TooltipConfig {
            severity_field: self.severity_field.clone(),
            explanation_threshold: self.explanation_threshold,
        }
    }
}
