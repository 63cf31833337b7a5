//! Installs and tears down geometry on a [`MapSurface`].
//!
//! Ordering contract:
//! - Layers are always removed before their source, and added after it.
//! - Installing a mode removes every name the other mode can own first, in
//!   the same call, so the surface never shows both modes at once.

use std::collections::BTreeSet;

use analytics::{HexCollection, RegionCollection};
use tracing::{debug, info, warn};

use crate::expression::Expr;
use crate::layer::{GeometryName, LayerRole, ViewMode};
use crate::lod::LevelOfDetailScheduler;
use crate::surface::{LayerKind, LayerSpec, MapSurface, SourceData, SurfaceError};
use crate::symbology::{DEFAULT_SEVERITY_FIELD, PaintRecipe};

/// Data for one geometry mode, ready to install.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryMode {
    Counties(RegionCollection),
    Hexes(HexCollection),
}

impl GeometryMode {
    pub fn mode(&self) -> ViewMode {
        match self {
            GeometryMode::Counties(_) => ViewMode::Counties,
            GeometryMode::Hexes(_) => ViewMode::Hexes,
        }
    }

    pub fn feature_count(&self) -> usize {
        match self {
            GeometryMode::Counties(r) => r.len(),
            GeometryMode::Hexes(h) => h.feature_count(),
        }
    }

    pub fn alpha(&self) -> Option<f64> {
        match self {
            GeometryMode::Counties(r) => r.alpha,
            GeometryMode::Hexes(h) => h.alpha,
        }
    }
}

/// A style layer the manager put on the surface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstalledLayer {
    pub id: String,
    pub name: GeometryName,
    pub role: LayerRole,
}

impl InstalledLayer {
    pub fn kind(&self) -> LayerKind {
        match self.role {
            LayerRole::Fill => LayerKind::Fill,
            LayerRole::Outline => LayerKind::Line,
        }
    }
}

#[derive(Debug)]
pub struct LayerManager {
    severity_field: String,
    scheduler: LevelOfDetailScheduler,
    installed: BTreeSet<GeometryName>,
    hex_visible: bool,
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new(DEFAULT_SEVERITY_FIELD)
    }
}

impl LayerManager {
    pub fn new(severity_field: &str) -> Self {
        Self {
            severity_field: severity_field.to_string(),
            scheduler: LevelOfDetailScheduler::default(),
            installed: BTreeSet::new(),
            hex_visible: true,
        }
    }

    pub fn severity_field(&self) -> &str {
        &self.severity_field
    }

    /// Bands of the most recent hex install (defaults before that).
    pub fn scheduler(&self) -> &LevelOfDetailScheduler {
        &self.scheduler
    }

    pub fn hex_visible(&self) -> bool {
        self.hex_visible
    }

    /// Mode currently on the surface, if any.
    pub fn active_mode(&self) -> Option<ViewMode> {
        self.installed.iter().next().map(|n| n.mode())
    }

    pub fn installed(&self) -> impl Iterator<Item = GeometryName> + '_ {
        self.installed.iter().copied()
    }

    /// Every installed layer, in draw order (bottom first).
    pub fn installed_layers(&self) -> Vec<InstalledLayer> {
        self.installed
            .iter()
            .flat_map(|name| {
                LayerRole::ALL.into_iter().map(move |role| InstalledLayer {
                    id: name.layer_id(role),
                    name: *name,
                    role,
                })
            })
            .collect()
    }

    /// Replaces whatever is installed under `name` with `data` painted by `recipe`.
    ///
    /// Idempotent: installing the same data twice leaves the same style as
    /// installing it once.
    pub fn install_geometry<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        name: GeometryName,
        data: SourceData,
        recipe: &PaintRecipe,
    ) -> Result<(), SurfaceError> {
        self.remove_geometry(surface, name)?;

        let source = name.source_id();
        let features = data.feature_count();
        surface.add_source(&source, data)?;

        let fill = LayerSpec::new(name.layer_id(LayerRole::Fill), &source, LayerKind::Fill)
            .with_paint("fill-color", recipe.fill_color.clone())
            .with_paint("fill-opacity", recipe.fill_opacity.clone())
            .with_zoom_range(recipe.zoom_range);
        let outline = LayerSpec::new(name.layer_id(LayerRole::Outline), &source, LayerKind::Line)
            .with_paint("line-color", recipe.outline_color.clone())
            .with_paint("line-width", recipe.outline_width.clone())
            .with_paint("line-opacity", recipe.outline_opacity.clone())
            .with_zoom_range(recipe.zoom_range);
        surface.add_layer(fill)?;
        surface.add_layer(outline)?;

        self.installed.insert(name);
        debug!(source = %source, features, "installed geometry");
        Ok(())
    }

    /// Removes `name`'s layers and source if present. Returns whether
    /// anything was removed.
    pub fn remove_geometry<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        name: GeometryName,
    ) -> Result<bool, SurfaceError> {
        let mut removed = false;
        for id in name.layer_ids() {
            if surface.has_layer(&id) {
                surface.remove_layer(&id)?;
                removed = true;
            }
        }
        let source = name.source_id();
        if surface.has_source(&source) {
            surface.remove_source(&source)?;
            removed = true;
        }
        self.installed.remove(&name);
        Ok(removed)
    }

    /// Removes every source and layer `mode` could have installed, including
    /// ones this manager did not record.
    pub fn teardown_mode<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        mode: ViewMode,
    ) -> Result<(), SurfaceError> {
        for name in GeometryName::all_for(mode) {
            if self.remove_geometry(surface, name)? {
                debug!(source = %name.source_id(), "removed geometry");
            }
        }
        Ok(())
    }

    pub fn teardown<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> Result<(), SurfaceError> {
        self.teardown_mode(surface, ViewMode::Counties)?;
        self.teardown_mode(surface, ViewMode::Hexes)
    }

    /// Makes `mode` the only geometry on the surface.
    pub fn install<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        mode: &GeometryMode,
    ) -> Result<(), SurfaceError> {
        match mode {
            GeometryMode::Counties(regions) => self.install_counties(surface, regions),
            GeometryMode::Hexes(hexes) => self.install_hexes(surface, hexes),
        }
    }

    fn install_counties<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        regions: &RegionCollection,
    ) -> Result<(), SurfaceError> {
        self.teardown_mode(surface, ViewMode::Hexes)?;
        let recipe = PaintRecipe::counties(&self.severity_field);
        self.install_geometry(
            surface,
            GeometryName::Counties,
            SourceData::GeoJson(regions.to_feature_collection()),
            &recipe,
        )?;
        info!(features = regions.len(), "county view installed");
        Ok(())
    }

    fn install_hexes<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        hexes: &HexCollection,
    ) -> Result<(), SurfaceError> {
        self.teardown_mode(surface, ViewMode::Counties)?;
        self.scheduler = LevelOfDetailScheduler::from_levels(hexes.levels.as_deref());

        // Resolutions missing from the new data must not linger from the last install.
        let incoming: BTreeSet<u8> = hexes.resolutions().collect();
        for name in GeometryName::all_for(ViewMode::Hexes) {
            if name.resolution().is_some_and(|r| !incoming.contains(&r)) {
                self.remove_geometry(surface, name)?;
            }
        }

        for resolution in incoming {
            let Some(band) = self.scheduler.band(resolution).copied() else {
                warn!(resolution, "no zoom band for hex resolution; not rendering it");
                self.remove_geometry(surface, GeometryName::Hex(resolution))?;
                continue;
            };
            let recipe = PaintRecipe::hex_band(
                &self.severity_field,
                self.fill_opacity(resolution),
                self.outline_opacity(resolution),
                (band.min_zoom, band.max_zoom),
            );
            self.install_geometry(
                surface,
                GeometryName::Hex(resolution),
                SourceData::GeoJson(hexes.to_feature_collection(resolution)),
                &recipe,
            )?;
        }
        info!(
            features = hexes.feature_count(),
            resolutions = self.installed.len(),
            "hex view installed"
        );
        Ok(())
    }

    fn fill_opacity(&self, resolution: u8) -> Expr {
        match self.scheduler.fill_opacity_expr(resolution) {
            Some(e) if self.hex_visible => e,
            _ => Expr::Number(0.0),
        }
    }

    fn outline_opacity(&self, resolution: u8) -> Expr {
        match self.scheduler.outline_opacity_expr(resolution) {
            Some(e) if self.hex_visible => e,
            _ => Expr::Number(0.0),
        }
    }

    /// Shows or hides every installed hex layer.
    ///
    /// Showing restores the scheduler's fade curves, so the opacity at any
    /// zoom is exactly what it was before hiding.
    pub fn set_hex_visibility<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        visible: bool,
    ) -> Result<(), SurfaceError> {
        self.hex_visible = visible;
        let hex: Vec<u8> = self.installed.iter().filter_map(|n| n.resolution()).collect();
        for resolution in hex {
            let name = GeometryName::Hex(resolution);
            surface.set_paint_property(
                &name.layer_id(LayerRole::Fill),
                "fill-opacity",
                self.fill_opacity(resolution),
            )?;
            surface.set_paint_property(
                &name.layer_id(LayerRole::Outline),
                "line-opacity",
                self.outline_opacity(resolution),
            )?;
        }
        Ok(())
    }
}
