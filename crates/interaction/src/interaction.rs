//! Hover and click handling for installed layers.

use std::collections::BTreeMap;

use foundation::{GeometryCache, LngLat, normalize_region_id};
use geojson::JsonObject;
use layers::{InstalledLayer, LayerRole, MapSurface, PointerEvent, PointerKind, ViewMode};
use serde_json::Value;
use tracing::debug;

use crate::bindings::{BindingDiff, BindingTable, BindingTarget};
use crate::tooltip::{TooltipConfig, edge_tooltip, hex_tooltip, region_tooltip};

/// Identifying attributes of a clicked feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEvent {
    Region {
        id: Option<String>,
        name: Option<String>,
    },
    Hex {
        index: String,
        resolution: Option<u8>,
        region_id: Option<String>,
    },
    Edge {
        region_a: String,
        region_b: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Ignored,
    TooltipShown { layer: String },
    TooltipRemoved,
    Clicked(ClickEvent),
}

fn text(props: &JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn region_id(props: &JsonObject, key: &str) -> Option<String> {
    text(props, key).map(|raw| normalize_region_id(&raw).unwrap_or(raw))
}

/// Binds pointer handlers to installed layers and turns pointer events into
/// tooltips and click events.
///
/// Notes:
/// - At most one tooltip is on the surface at a time.
/// - Layers are hit-tested topmost first: edge layers, then fill layers in
///   reverse draw order.
#[derive(Debug, Default)]
pub struct InteractionLayer {
    bindings: BindingTable,
    fills: Vec<(String, BindingTarget)>,
    edges: Vec<String>,
    tooltip: TooltipConfig,
    cache: GeometryCache,
    hovered: Option<String>,
}

impl InteractionLayer {
    pub fn new(tooltip: TooltipConfig) -> Self {
        Self {
            tooltip,
            ..Self::default()
        }
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// Rebinds handlers to the fill layers in `installed`.
    pub fn sync<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        installed: &[InstalledLayer],
    ) -> BindingDiff {
        self.fills = installed
            .iter()
            .filter(|l| l.role == LayerRole::Fill)
            .map(|l| {
                let target = match l.name.mode() {
                    ViewMode::Counties => BindingTarget::Region,
                    ViewMode::Hexes => BindingTarget::Hex,
                };
                (l.id.clone(), target)
            })
            .collect();
        if self
            .hovered
            .as_ref()
            .is_some_and(|h| !self.fills.iter().any(|(id, _)| id == h) && !self.edges.contains(h))
        {
            self.hide_tooltip(surface);
        }
        self.apply(surface)
    }

    /// Binds an edge (line) layer owned by another component.
    pub fn bind_edge_layer<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        layer: &str,
    ) -> BindingDiff {
        if !self.edges.iter().any(|e| e == layer) {
            self.edges.push(layer.to_string());
        }
        self.apply(surface)
    }

    pub fn unbind_edge_layer<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        layer: &str,
    ) -> BindingDiff {
        self.edges.retain(|e| e != layer);
        if self.hovered.as_deref() == Some(layer) {
            self.hide_tooltip(surface);
        }
        self.apply(surface)
    }

    /// Unbinds everything and removes the tooltip.
    pub fn clear<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> BindingDiff {
        self.fills.clear();
        self.edges.clear();
        self.hide_tooltip(surface);
        self.bindings.clear(surface)
    }

    fn apply<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> BindingDiff {
        let desired: BTreeMap<String, BindingTarget> = self
            .fills
            .iter()
            .cloned()
            .chain(self.edges.iter().map(|e| (e.clone(), BindingTarget::Edge)))
            .collect();
        self.bindings.apply(surface, &desired)
    }

    /// Topmost bound feature under `at`.
    fn pick<S: MapSurface + ?Sized>(
        &self,
        surface: &S,
        at: LngLat,
    ) -> Option<(String, BindingTarget, JsonObject)> {
        let order = self
            .edges
            .iter()
            .rev()
            .map(|e| (e.clone(), BindingTarget::Edge))
            .chain(self.fills.iter().rev().cloned());
        for (layer, target) in order {
            if !surface.has_layer(&layer) {
                continue;
            }
            if let Some(props) = surface.query_features(&layer, at).into_iter().next() {
                return Some((layer, target, props));
            }
        }
        None
    }

    fn hide_tooltip<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        if self.hovered.take().is_some() {
            surface.remove_popup();
            return true;
        }
        false
    }

    pub fn handle<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        event: PointerEvent,
    ) -> InteractionOutcome {
        match event.kind {
            PointerKind::Leave => {
                if self.hide_tooltip(surface) {
                    InteractionOutcome::TooltipRemoved
                } else {
                    InteractionOutcome::Ignored
                }
            }
            PointerKind::Move => match self.pick(surface, event.at) {
                Some((layer, target, props)) => {
                    let content = match target {
                        BindingTarget::Region => region_tooltip(&props, &self.tooltip, &self.cache),
                        BindingTarget::Hex => hex_tooltip(&props, &self.tooltip, &self.cache),
                        BindingTarget::Edge => edge_tooltip(&props, &self.cache),
                    };
                    // Replace, never stack.
                    surface.remove_popup();
                    surface.show_popup(event.at, content);
                    self.hovered = Some(layer.clone());
                    InteractionOutcome::TooltipShown { layer }
                }
                None => {
                    if self.hide_tooltip(surface) {
                        InteractionOutcome::TooltipRemoved
                    } else {
                        InteractionOutcome::Ignored
                    }
                }
            },
            PointerKind::Click => {
                let Some((layer, target, props)) = self.pick(surface, event.at) else {
                    return InteractionOutcome::Ignored;
                };
                let click = match target {
                    BindingTarget::Region => ClickEvent::Region {
                        id: region_id(&props, "fips"),
                        name: text(&props, "name"),
                    },
                    BindingTarget::Hex => {
                        let index = text(&props, "h3").unwrap_or_default();
                        ClickEvent::Hex {
                            resolution: foundation::hex_resolution(&index),
                            region_id: region_id(&props, "fips"),
                            index,
                        }
                    }
                    BindingTarget::Edge => {
                        let (Some(region_a), Some(region_b)) =
                            (region_id(&props, "fips_a"), region_id(&props, "fips_b"))
                        else {
                            debug!(%layer, "edge feature without region pair");
                            return InteractionOutcome::Ignored;
                        };
                        ClickEvent::Edge { region_a, region_b }
                    }
                };
                debug!(%layer, ?click, "click");
                InteractionOutcome::Clicked(click)
            }
        }
    }
}
