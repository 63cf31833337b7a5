/// Longitude/latitude pair in WGS84 degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

/// Destination of a camera animation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraTarget {
    pub center: LngLat,
    pub zoom: f64,
}

impl CameraTarget {
    pub const fn new(center: LngLat, zoom: f64) -> Self {
        Self { center, zoom }
    }
}

/// Map zoom range supported by the view (MapLibre style-spec limits).
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 24.0;

pub fn clamp_zoom(z: f64) -> f64 {
    if z.is_nan() {
        return MIN_ZOOM;
    }
    z.clamp(MIN_ZOOM, MAX_ZOOM)
}
