//! The view state machine.
//!
//! The controller decides which geometry mode is on the map. A mode switch is
//! fetch first, then teardown-and-install in one synchronous step, so a failed
//! fetch leaves the previous rendering untouched.

use std::cell::RefCell;
use std::rc::Rc;

use analytics::{DataFetcher, FetchFailure, ViewConfiguration};
use interaction::{ClickEvent, InteractionLayer, InteractionOutcome};
use layers::{GeometryMode, LayerManager, MapSurface, PointerEvent, SurfaceError, ViewMode};
use runtime::{Admission, EventBus, EventLevel, RequestSeq, RequestSequence};
use tracing::{debug, error, info, warn};

use crate::navigation::{NavigationZooms, SurfaceNavigator};
use crate::options::ViewOptions;

/// One issued fetch. Hand it back to [`ViewController::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub seq: RequestSeq,
    pub mode: ViewMode,
    /// Configuration as of [`ViewController::begin`].
    pub config: ViewConfiguration,
}

/// What [`ViewController::finish`] did with a completed fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The data is now on the map.
    Applied,
    /// A newer response was already applied; the data was dropped.
    Stale,
    /// The fetch failed; previous rendering is untouched.
    Failed(FetchFailure),
    /// The data could not be installed on the surface. The previous view is
    /// reinstalled if possible, otherwise the surface is left empty.
    SurfaceFailed(SurfaceError),
}

/// Read-only snapshot for the host UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Mode currently rendered.
    pub mode: Option<ViewMode>,
    /// Mode of the most recent request.
    pub requested_mode: Option<ViewMode>,
    pub loading: bool,
    pub in_flight: usize,
    /// Dismissable error banner.
    pub error: Option<String>,
    pub feature_count: usize,
    pub alpha: Option<f64>,
    pub total_hexes: Option<u64>,
    pub hex_visible: bool,
}

pub struct ViewController<S, F> {
    surface: Rc<RefCell<S>>,
    fetcher: F,
    config: ViewConfiguration,
    options: ViewOptions,
    layers: LayerManager,
    interaction: InteractionLayer,
    sequence: RequestSequence,
    events: EventBus,
    requested: Option<ViewMode>,
    current: Option<GeometryMode>,
    error: Option<String>,
    on_click: Option<Box<dyn FnMut(&ClickEvent)>>,
}

impl<S: MapSurface, F: DataFetcher> ViewController<S, F> {
    pub fn new(
        surface: Rc<RefCell<S>>,
        fetcher: F,
        config: ViewConfiguration,
        options: ViewOptions,
    ) -> Self {
        Self {
            surface,
            fetcher,
            config,
            layers: LayerManager::new(&options.severity_field),
            interaction: InteractionLayer::new(options.tooltip()),
            options,
            sequence: RequestSequence::new(),
            events: EventBus::new(),
            requested: None,
            current: None,
            error: None,
            on_click: None,
        }
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn configuration(&self) -> &ViewConfiguration {
        &self.config
    }

    /// Replaces the stored configuration. Takes effect on the next fetch.
    pub fn set_configuration(&mut self, config: ViewConfiguration) {
        self.config = config;
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn surface(&self) -> Rc<RefCell<S>> {
        Rc::clone(&self.surface)
    }

    pub fn navigator(&self) -> SurfaceNavigator<S> {
        SurfaceNavigator::new(self.surface(), NavigationZooms::from(&self.options))
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn current_data(&self) -> Option<&GeometryMode> {
        self.current.as_ref()
    }

    pub fn layers(&self) -> &LayerManager {
        &self.layers
    }

    pub fn interaction(&self) -> &InteractionLayer {
        &self.interaction
    }

    pub fn set_click_handler(&mut self, handler: impl FnMut(&ClickEvent) + 'static) {
        self.on_click = Some(Box::new(handler));
    }

    pub fn state(&self) -> ViewState {
        let (feature_count, alpha, total_hexes) = match &self.current {
            Some(data) => {
                let total_hexes = match data {
                    GeometryMode::Hexes(h) => Some(h.total_hexes),
                    GeometryMode::Counties(_) => None,
                };
                (data.feature_count(), data.alpha(), total_hexes)
            }
            None => (0, None, None),
        };
        ViewState {
            mode: self.current.as_ref().map(GeometryMode::mode),
            requested_mode: self.requested,
            loading: self.sequence.in_flight() > 0,
            in_flight: self.sequence.in_flight(),
            error: self.error.clone(),
            feature_count,
            alpha,
            total_hexes,
            hex_visible: self.layers.hex_visible(),
        }
    }

    /// Loads the initial mode if `auto_load` is set.
    pub async fn start(&mut self) -> Option<FinishOutcome> {
        if !self.options.auto_load {
            debug!("auto-load disabled; waiting for an explicit switch");
            return None;
        }
        Some(self.switch_to(self.options.initial_mode).await)
    }

    /// Fetches `mode` with the current configuration and installs it.
    ///
    /// Switching to the mode already shown re-fetches it.
    pub async fn switch_to(&mut self, mode: ViewMode) -> FinishOutcome {
        let ticket = self.begin(mode);
        let result = self.fetch(&ticket).await;
        self.finish(ticket, result)
    }

    /// Re-fetches the most recently requested mode.
    pub async fn refresh(&mut self) -> FinishOutcome {
        let mode = self
            .requested
            .or_else(|| self.current.as_ref().map(GeometryMode::mode))
            .unwrap_or(self.options.initial_mode);
        self.switch_to(mode).await
    }

    /// Issues a sequence number and marks the controller loading.
    pub fn begin(&mut self, mode: ViewMode) -> FetchTicket {
        let seq = self.sequence.issue();
        self.requested = Some(mode);
        info!(seq = seq.0, %mode, target = %self.config.target, "fetch started");
        self.events
            .emit(EventLevel::Debug, "fetch_started", format!("{mode} #{}", seq.0));
        FetchTicket {
            seq,
            mode,
            config: self.config.clone(),
        }
    }

    /// Runs the fetch for `ticket`. Touches no controller state.
    pub async fn fetch(&self, ticket: &FetchTicket) -> Result<GeometryMode, FetchFailure> {
        match ticket.mode {
            ViewMode::Counties => self
                .fetcher
                .fetch_regions(&ticket.config)
                .await
                .map(GeometryMode::Counties),
            ViewMode::Hexes => self
                .fetcher
                .fetch_hexes(&ticket.config)
                .await
                .map(GeometryMode::Hexes),
        }
    }

    /// Applies a completed fetch unless a newer one already landed.
    ///
    /// Always releases the ticket's in-flight slot.
    pub fn finish(
        &mut self,
        ticket: FetchTicket,
        result: Result<GeometryMode, FetchFailure>,
    ) -> FinishOutcome {
        let seq = ticket.seq;
        let data = match result {
            Ok(data) => data,
            Err(failure) => {
                self.sequence.release(seq);
                let superseded = self.sequence.latest_issued().is_some_and(|l| l > seq);
                if superseded {
                    warn!(seq = seq.0, "superseded fetch failed: {failure}");
                    self.events
                        .emit(EventLevel::Warn, "fetch_failed_stale", failure.to_string());
                } else {
                    error!(seq = seq.0, mode = %ticket.mode, "fetch failed: {failure}");
                    self.error = Some(failure.to_string());
                    self.events
                        .emit(EventLevel::Error, "fetch_failed", failure.to_string());
                }
                return FinishOutcome::Failed(failure);
            }
        };

        if let Admission::Stale { newest_applied } = self.sequence.accept(seq) {
            warn!(
                seq = seq.0,
                newest = newest_applied.0,
                "discarding stale {} response",
                ticket.mode
            );
            self.events.emit(
                EventLevel::Warn,
                "stale_response",
                format!("#{} superseded by #{}", seq.0, newest_applied.0),
            );
            return FinishOutcome::Stale;
        }

        let installed = {
            let mut surface = self.surface.borrow_mut();
            let result = self.layers.install(&mut *surface, &data);
            if result.is_ok() {
                self.interaction
                    .sync(&mut *surface, &self.layers.installed_layers());
            }
            result
        };
        if let Err(err) = installed {
            self.recover_from_failed_install(&data);
            self.report_surface_error(err.clone());
            return FinishOutcome::SurfaceFailed(err);
        }

        info!(
            seq = seq.0,
            mode = %data.mode(),
            features = data.feature_count(),
            "view updated"
        );
        self.events.emit(
            EventLevel::Info,
            "view_updated",
            format!("{} features", data.feature_count()),
        );
        self.current = Some(data);
        self.error = None;
        FinishOutcome::Applied
    }

    /// A failed install may have removed the previous geometry before adding
    /// any of the new one. Reinstalls the previous data; if that fails too,
    /// clears the surface so the state reports no mode.
    fn recover_from_failed_install(&mut self, attempted: &GeometryMode) {
        let mut surface = self.surface.borrow_mut();
        if let Some(previous) = &self.current {
            match self.layers.install(&mut *surface, previous) {
                Ok(()) => {
                    warn!(
                        attempted = %attempted.mode(),
                        restored = %previous.mode(),
                        "install failed; previous view restored"
                    );
                    self.interaction
                        .sync(&mut *surface, &self.layers.installed_layers());
                    return;
                }
                Err(err) => error!("restoring previous view failed: {err}"),
            }
        }
        if let Err(err) = self.layers.teardown(&mut *surface) {
            error!("clearing partial install failed: {err}");
        }
        self.interaction.sync(&mut *surface, &[]);
        self.current = None;
    }

    pub fn set_hex_visibility(&mut self, visible: bool) {
        let result = {
            let mut surface = self.surface.borrow_mut();
            self.layers.set_hex_visibility(&mut *surface, visible)
        };
        if let Err(err) = result {
            self.report_surface_error(err);
        }
    }

    /// Zoom changed. Opacity is a zoom expression on the surface, so nothing is
    /// recomputed; returns the hex resolutions that are visible at `zoom`.
    pub fn on_zoom(&mut self, zoom: f64) -> Vec<u8> {
        if self.current.as_ref().map(GeometryMode::mode) != Some(ViewMode::Hexes)
            || !self.layers.hex_visible()
        {
            return Vec::new();
        }
        let visible = self.layers.scheduler().visible_at(zoom);
        debug!(zoom, ?visible, "zoom");
        visible
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> InteractionOutcome {
        let outcome = {
            let mut surface = self.surface.borrow_mut();
            self.interaction.handle(&mut *surface, event)
        };
        // The surface borrow is released so the callback may navigate.
        if let (InteractionOutcome::Clicked(click), Some(handler)) = (&outcome, self.on_click.as_mut()) {
            handler(click);
        }
        outcome
    }

    /// Binds an edge layer installed by another component.
    pub fn bind_edge_layer(&mut self, layer: &str) {
        let mut surface = self.surface.borrow_mut();
        self.interaction.bind_edge_layer(&mut *surface, layer);
    }

    pub fn unbind_edge_layer(&mut self, layer: &str) {
        let mut surface = self.surface.borrow_mut();
        self.interaction.unbind_edge_layer(&mut *surface, layer);
    }

    /// Shows a map-side failure (e.g. style load) in the error banner.
    pub fn report_surface_error(&mut self, err: SurfaceError) {
        error!("map surface error: {err}");
        self.error = Some(err.to_string());
        self.events
            .emit(EventLevel::Error, "surface_error", err.to_string());
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Removes everything the engine installed.
    pub fn teardown(&mut self) {
        let result = {
            let mut surface = self.surface.borrow_mut();
            self.interaction.clear(&mut *surface);
            self.layers.teardown(&mut *surface)
        };
        self.current = None;
        if let Err(err) = result {
            self.report_surface_error(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FinishOutcome, ViewController};
    use crate::options::ViewOptions;
    use analytics::{
        BoxFuture, ColumnCatalog, DataFetcher, FetchFailure, HexCollection, HexMapPayload,
        RegionCollection, RegionMapPayload, ViewConfiguration,
    };
    use foundation::{CameraTarget, GeometryCache, LngLat};
    use geojson::JsonObject;
    use layers::{
        Expr, GeometryMode, HeadlessSurface, LayerSpec, MapSurface, PointerKind, PopupContent,
        SourceData, SurfaceError, ViewMode,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    struct Canned {
        regions: Result<RegionCollection, FetchFailure>,
        hexes: Result<HexCollection, FetchFailure>,
    }

    impl DataFetcher for Canned {
        fn fetch_regions<'a>(
            &'a self,
            _config: &'a ViewConfiguration,
        ) -> BoxFuture<'a, Result<RegionCollection, FetchFailure>> {
            let r = self.regions.clone();
            Box::pin(async move { r })
        }

        fn fetch_hexes<'a>(
            &'a self,
            _config: &'a ViewConfiguration,
        ) -> BoxFuture<'a, Result<HexCollection, FetchFailure>> {
            let r = self.hexes.clone();
            Box::pin(async move { r })
        }

        fn fetch_columns(&self) -> BoxFuture<'_, Result<ColumnCatalog, FetchFailure>> {
            Box::pin(async { Ok(ColumnCatalog::default()) })
        }
    }

    fn regions(stat: f64) -> RegionCollection {
        let payload: RegionMapPayload = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "properties": {"fips": "06019", "max_surprisal": stat},
                "geometry": {"type": "Polygon", "coordinates": [[[-120.0, 36.0], [-119.0, 36.0], [-119.0, 37.0], [-120.0, 37.0], [-120.0, 36.0]]]}}],
            "alpha": stat
        }))
        .expect("payload");
        RegionCollection::from_payload(payload, &GeometryCache::california())
    }

    fn controller(fetcher: Canned) -> ViewController<HeadlessSurface, Canned> {
        let options = ViewOptions::default();
        let surface = Rc::new(RefCell::new(HeadlessSurface::new(options.initial_camera())));
        let config = ViewConfiguration::new(vec!["lc_type".into()], "clr");
        ViewController::new(surface, fetcher, config, options)
    }

    fn failure() -> FetchFailure {
        FetchFailure::Status {
            status: 500,
            message: "boom".into(),
        }
    }

    #[tokio::test]
    async fn start_loads_counties() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        assert_eq!(c.start().await, Some(FinishOutcome::Applied));
        let state = c.state();
        assert_eq!(state.mode, Some(ViewMode::Counties));
        assert!(!state.loading);
        assert_eq!(state.feature_count, 1);
        assert_eq!(state.alpha, Some(2.0));
    }

    #[tokio::test]
    async fn failed_switch_keeps_previous_rendering() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        c.switch_to(ViewMode::Counties).await;
        let outcome = c.switch_to(ViewMode::Hexes).await;
        assert!(matches!(outcome, FinishOutcome::Failed(_)));

        let state = c.state();
        assert_eq!(state.mode, Some(ViewMode::Counties));
        assert_eq!(state.requested_mode, Some(ViewMode::Hexes));
        assert_eq!(state.error.as_deref(), Some("server returned 500: boom"));
        assert!(!state.loading);
        assert_eq!(
            c.surface().borrow().layer_ids(),
            vec!["counties-fill", "counties-outline"]
        );

        c.dismiss_error();
        assert_eq!(c.state().error, None);
    }

    #[test]
    fn loading_tracks_every_in_flight_fetch() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        let a = c.begin(ViewMode::Counties);
        let b = c.begin(ViewMode::Counties);
        assert_eq!(c.state().in_flight, 2);
        c.finish(b, Ok(GeometryMode::Counties(regions(3.0))));
        assert!(c.state().loading);
        c.finish(a, Err(failure()));
        assert!(!c.state().loading);
    }

    #[test]
    fn stale_response_never_overwrites_newer_data() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        let older = c.begin(ViewMode::Counties);
        let newer = c.begin(ViewMode::Counties);
        assert_eq!(
            c.finish(newer, Ok(GeometryMode::Counties(regions(9.0)))),
            FinishOutcome::Applied
        );
        assert_eq!(
            c.finish(older, Ok(GeometryMode::Counties(regions(1.0)))),
            FinishOutcome::Stale
        );
        assert_eq!(c.state().alpha, Some(9.0));
        assert!(c.events().last_of_kind("stale_response").is_some());
    }

    #[test]
    fn superseded_failure_shows_no_banner() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        let older = c.begin(ViewMode::Hexes);
        let newer = c.begin(ViewMode::Counties);
        c.finish(newer, Ok(GeometryMode::Counties(regions(2.0))));
        c.finish(older, Err(failure()));
        assert_eq!(c.state().error, None);
        assert_eq!(c.state().mode, Some(ViewMode::Counties));
    }

    #[test]
    fn surface_errors_surface_as_banner() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        c.report_surface_error(layers::SurfaceError::Map("style failed to load".into()));
        assert_eq!(
            c.state().error.as_deref(),
            Some("map error: style failed to load")
        );
    }

    #[tokio::test]
    async fn auto_load_off_starts_unset() {
        let options = ViewOptions {
            auto_load: false,
            ..ViewOptions::default()
        };
        let surface = Rc::new(RefCell::new(HeadlessSurface::new(options.initial_camera())));
        let mut c = ViewController::new(
            surface,
            Canned {
                regions: Ok(regions(2.0)),
                hexes: Err(failure()),
            },
            ViewConfiguration::new(vec!["lc_type".into()], "clr"),
            options,
        );
        assert_eq!(c.start().await, None);
        assert_eq!(c.state().mode, None);
        assert!(c.surface().borrow().source_ids().is_empty());
    }

    #[test]
    fn event_log_stays_bounded_across_many_fetches() {
        let mut c = controller(Canned {
            regions: Ok(regions(2.0)),
            hexes: Err(failure()),
        });
        for _ in 0..1000 {
            let t = c.begin(ViewMode::Counties);
            c.finish(t, Ok(GeometryMode::Counties(regions(2.0))));
        }
        assert_eq!(c.events().len(), c.events().capacity());
        assert!(c.events().last_of_kind("view_updated").is_some());
    }

    /// Headless surface whose `add_source` fails for ids starting with `fail_prefix`.
    struct Flaky {
        inner: HeadlessSurface,
        fail_prefix: Option<&'static str>,
    }

    impl MapSurface for Flaky {
        fn add_source(&mut self, id: &str, data: SourceData) -> Result<(), SurfaceError> {
            match self.fail_prefix {
                Some(prefix) if id.starts_with(prefix) => Err(SurfaceError::Map("boom".into())),
                _ => self.inner.add_source(id, data),
            }
        }
        fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
            self.inner.remove_source(id)
        }
        fn has_source(&self, id: &str) -> bool {
            self.inner.has_source(id)
        }
        fn add_layer(&mut self, spec: LayerSpec) -> Result<(), SurfaceError> {
            self.inner.add_layer(spec)
        }
        fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
            self.inner.remove_layer(id)
        }
        fn has_layer(&self, id: &str) -> bool {
            self.inner.has_layer(id)
        }
        fn set_paint_property(
            &mut self,
            layer: &str,
            property: &str,
            value: Expr,
        ) -> Result<(), SurfaceError> {
            self.inner.set_paint_property(layer, property, value)
        }
        fn camera(&self) -> CameraTarget {
            self.inner.camera()
        }
        fn fly_to(&mut self, target: CameraTarget) {
            self.inner.fly_to(target)
        }
        fn listen(&mut self, layer: &str, kind: PointerKind) {
            self.inner.listen(layer, kind)
        }
        fn unlisten(&mut self, layer: &str, kind: PointerKind) {
            self.inner.unlisten(layer, kind)
        }
        fn query_features(&self, layer: &str, at: LngLat) -> Vec<JsonObject> {
            self.inner.query_features(layer, at)
        }
        fn show_popup(&mut self, at: LngLat, content: PopupContent) {
            self.inner.show_popup(at, content)
        }
        fn remove_popup(&mut self) {
            self.inner.remove_popup()
        }
    }

    fn one_hex() -> HexCollection {
        let cell = h3o::LatLng::new(36.5, -119.5)
            .expect("ll")
            .to_cell(h3o::Resolution::Six)
            .to_string();
        let payload: HexMapPayload = serde_json::from_value(json!({
            "by_resolution": {"6": {"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": null, "properties": {"h3": cell, "max_surprisal": 3.0}}
            ]}},
            "alpha": 1.0
        }))
        .expect("payload");
        HexCollection::from_payload(payload).expect("hexes")
    }

    fn flaky_controller() -> ViewController<Flaky, Canned> {
        let options = ViewOptions::default();
        let surface = Flaky {
            inner: HeadlessSurface::new(options.initial_camera()),
            fail_prefix: Some("hex-"),
        };
        ViewController::new(
            Rc::new(RefCell::new(surface)),
            Canned {
                regions: Ok(regions(2.0)),
                hexes: Ok(one_hex()),
            },
            ViewConfiguration::new(vec!["lc_type".into()], "clr"),
            options,
        )
    }

    fn listener_layers(surface: &Flaky) -> BTreeSet<String> {
        surface
            .inner
            .listeners()
            .iter()
            .map(|(layer, _)| layer.clone())
            .collect()
    }

    #[tokio::test]
    async fn failed_install_restores_previous_view() {
        let mut c = flaky_controller();
        assert_eq!(c.start().await, Some(FinishOutcome::Applied));

        let outcome = c.switch_to(ViewMode::Hexes).await;
        assert_eq!(
            outcome,
            FinishOutcome::SurfaceFailed(SurfaceError::Map("boom".into()))
        );
        let state = c.state();
        assert_eq!(state.mode, Some(ViewMode::Counties));
        assert_eq!(state.feature_count, 1);
        assert_eq!(state.error.as_deref(), Some("map error: boom"));

        let surface = c.surface();
        let s = surface.borrow();
        assert_eq!(s.inner.source_ids(), vec!["counties"]);
        assert_eq!(s.inner.layer_ids(), vec!["counties-fill", "counties-outline"]);
        assert_eq!(
            listener_layers(&s),
            BTreeSet::from(["counties-fill".to_string()])
        );
    }

    #[tokio::test]
    async fn failed_install_without_fallback_leaves_nothing_bound() {
        let mut c = flaky_controller();
        c.start().await;
        c.surface().borrow_mut().fail_prefix = Some("");

        let outcome = c.switch_to(ViewMode::Hexes).await;
        assert!(matches!(outcome, FinishOutcome::SurfaceFailed(_)));
        let state = c.state();
        assert_eq!(state.mode, None);
        assert_eq!(state.feature_count, 0);
        assert!(state.error.is_some());

        let surface = c.surface();
        let s = surface.borrow();
        assert!(s.inner.source_ids().is_empty());
        assert!(s.inner.layer_ids().is_empty());
        assert!(listener_layers(&s).is_empty());
        assert_eq!(c.layers().installed().count(), 0);
    }
}
