//! Imperative camera navigation for sibling UI.

use std::cell::RefCell;
use std::rc::Rc;

use foundation::{CameraTarget, DecodeFailure, GeometryCache, LngLat, decode_hex};
use layers::MapSurface;
use tracing::{debug, warn};

use crate::options::ViewOptions;

/// Camera commands exposed to the rest of the UI.
///
/// Every call starts an animation and returns at once. None of them fail:
/// unresolvable requests are logged and ignored.
pub trait MapController {
    fn fly_to_region(&self, id: &str);
    fn fly_to_coordinate(&self, lng: f64, lat: f64, zoom: Option<f64>);
    fn fly_to_hex_index(&self, index: &str, zoom: Option<f64>);
}

/// Where to point the camera. Resolved and consumed immediately.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationRequest {
    Region(String),
    Coordinate { center: LngLat, zoom: Option<f64> },
    Hex { index: String, zoom: Option<f64> },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("unknown region {0:?}")]
    LookupMiss(String),
    #[error(transparent)]
    Decode(#[from] DecodeFailure),
    #[error("coordinate ({lng}, {lat}) is not finite")]
    NonFinite { lng: f64, lat: f64 },
}

/// Zoom levels used to resolve requests.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NavigationZooms {
    pub region: f64,
    pub coordinate: f64,
    pub hex: f64,
}

impl From<&ViewOptions> for NavigationZooms {
    fn from(o: &ViewOptions) -> Self {
        Self {
            region: o.region_zoom,
            coordinate: o.coordinate_zoom,
            hex: o.hex_zoom,
        }
    }
}

pub fn resolve(
    request: &NavigationRequest,
    cache: &GeometryCache,
    zooms: NavigationZooms,
) -> Result<CameraTarget, NavigationError> {
    match request {
        NavigationRequest::Region(id) => cache
            .centroid(id)
            .map(|c| CameraTarget::new(c, zooms.region))
            .ok_or_else(|| NavigationError::LookupMiss(id.clone())),
        NavigationRequest::Coordinate { center, zoom } => {
            if !center.is_finite() {
                return Err(NavigationError::NonFinite {
                    lng: center.lng,
                    lat: center.lat,
                });
            }
            Ok(CameraTarget::new(*center, zoom.unwrap_or(zooms.coordinate)))
        }
        NavigationRequest::Hex { index, zoom } => {
            let cell = decode_hex(index)?;
            Ok(CameraTarget::new(cell.center, zoom.unwrap_or(zooms.hex)))
        }
    }
}

/// [`MapController`] over a shared surface.
pub struct SurfaceNavigator<S> {
    surface: Rc<RefCell<S>>,
    cache: GeometryCache,
    zooms: NavigationZooms,
}

impl<S: MapSurface> SurfaceNavigator<S> {
    pub fn new(surface: Rc<RefCell<S>>, zooms: NavigationZooms) -> Self {
        Self {
            surface,
            cache: GeometryCache::california(),
            zooms,
        }
    }

    /// Resolves `request` and starts the camera move. Returns the target, or
    /// `None` when nothing moved.
    pub fn navigate(&self, request: &NavigationRequest) -> Option<CameraTarget> {
        let target = match resolve(request, &self.cache, self.zooms) {
            Ok(t) => t,
            Err(err @ NavigationError::LookupMiss(_)) => {
                debug!("navigation ignored: {err}");
                return None;
            }
            Err(err) => {
                warn!("navigation ignored: {err}");
                return None;
            }
        };
        let Ok(mut surface) = self.surface.try_borrow_mut() else {
            warn!("map surface busy; dropping navigation request");
            return None;
        };
        surface.fly_to(target);
        Some(target)
    }
}

impl<S: MapSurface> MapController for SurfaceNavigator<S> {
    fn fly_to_region(&self, id: &str) {
        self.navigate(&NavigationRequest::Region(id.to_string()));
    }

    fn fly_to_coordinate(&self, lng: f64, lat: f64, zoom: Option<f64>) {
        self.navigate(&NavigationRequest::Coordinate {
            center: LngLat::new(lng, lat),
            zoom,
        });
    }

    fn fly_to_hex_index(&self, index: &str, zoom: Option<f64>) {
        self.navigate(&NavigationRequest::Hex {
            index: index.to_string(),
            zoom,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layers::HeadlessSurface;
    use pretty_assertions::assert_eq;

    fn navigator() -> (Rc<RefCell<HeadlessSurface>>, SurfaceNavigator<HeadlessSurface>) {
        let options = ViewOptions::default();
        let surface = Rc::new(RefCell::new(HeadlessSurface::new(options.initial_camera())));
        let nav = SurfaceNavigator::new(Rc::clone(&surface), NavigationZooms::from(&options));
        (surface, nav)
    }

    #[test]
    fn region_flies_to_centroid_at_region_zoom() {
        let (surface, nav) = navigator();
        nav.fly_to_region("06037");
        let flights = surface.borrow().flights();
        assert_eq!(
            flights,
            vec![CameraTarget::new(LngLat::new(-118.23, 34.32), 9.0)]
        );
    }

    #[test]
    fn unknown_region_does_not_move_the_camera() {
        let (surface, nav) = navigator();
        nav.fly_to_region("99999");
        nav.fly_to_region("not-a-fips");
        assert!(surface.borrow().flights().is_empty());
        assert_eq!(surface.borrow().camera(), ViewOptions::default().initial_camera());
    }

    #[test]
    fn coordinate_defaults_to_zoom_ten() {
        let (surface, nav) = navigator();
        nav.fly_to_coordinate(-122.4, 37.8, None);
        nav.fly_to_coordinate(-122.4, 37.8, Some(14.0));
        nav.fly_to_coordinate(f64::NAN, 37.8, None);
        let zooms: Vec<f64> = surface.borrow().flights().iter().map(|t| t.zoom).collect();
        assert_eq!(zooms, vec![10.0, 14.0]);
    }

    #[test]
    fn hex_index_decodes_to_cell_center() {
        let (surface, nav) = navigator();
        let index = h3o::LatLng::new(36.7, -119.7)
            .expect("ll")
            .to_cell(h3o::Resolution::Eight)
            .to_string();
        nav.fly_to_hex_index(&index, None);
        let flights = surface.borrow().flights();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].zoom, 12.0);
        assert!((flights[0].center.lat - 36.7).abs() < 0.05);
    }

    #[test]
    fn bad_hex_index_is_swallowed() {
        let (surface, nav) = navigator();
        nav.fly_to_hex_index("not-a-real-hex", None);
        assert!(surface.borrow().flights().is_empty());
        assert!(matches!(
            resolve(
                &NavigationRequest::Hex {
                    index: "not-a-real-hex".into(),
                    zoom: None
                },
                &GeometryCache::california(),
                NavigationZooms::from(&ViewOptions::default()),
            ),
            Err(NavigationError::Decode(_))
        ));
    }

    #[test]
    fn busy_surface_drops_request_instead_of_panicking() {
        let (surface, nav) = navigator();
        let _held = surface.borrow_mut();
        assert_eq!(nav.navigate(&NavigationRequest::Region("06001".into())), None);
    }
}
