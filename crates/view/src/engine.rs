use std::cell::RefCell;
use std::rc::Rc;

use analytics::{DataFetcher, ViewConfiguration};
use layers::MapSurface;

use crate::controller::ViewController;
use crate::navigation::{MapController, NavigationZooms, SurfaceNavigator};
use crate::options::ViewOptions;

/// The view controller plus the navigation handle handed to sibling UI.
pub struct Engine<S, F> {
    pub controller: ViewController<S, F>,
    pub map: Box<dyn MapController>,
}

/// Wires a surface and a fetcher into an engine.
///
/// The surface is shared between the controller and the navigation handle;
/// nothing is fetched until [`ViewController::start`] or a switch is awaited.
pub fn create_engine<S, F>(
    surface: S,
    fetcher: F,
    config: ViewConfiguration,
    options: ViewOptions,
) -> Engine<S, F>
where
    S: MapSurface + 'static,
    F: DataFetcher,
{
    let surface = Rc::new(RefCell::new(surface));
    let map: Box<dyn MapController> = Box::new(SurfaceNavigator::new(
        Rc::clone(&surface),
        NavigationZooms::from(&options),
    ));
    let controller = ViewController::new(surface, fetcher, config, options);
    Engine { controller, map }
}
