use std::collections::BTreeMap;

use layers::{MapSurface, PointerKind};
use tracing::debug;

/// What a bound layer's features represent.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingTarget {
    Region,
    Hex,
    /// Line features joining two regions (`fips_a`, `fips_b`).
    Edge,
}

/// Pointer events every bound layer listens for.
pub const BOUND_EVENTS: [PointerKind; 3] = [PointerKind::Move, PointerKind::Leave, PointerKind::Click];

/// Changes needed to go from one binding set to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingDiff {
    pub bind: Vec<(String, BindingTarget)>,
    pub unbind: Vec<String>,
}

impl BindingDiff {
    pub fn is_empty(&self) -> bool {
        self.bind.is_empty() && self.unbind.is_empty()
    }
}

/// Registry of pointer handlers keyed by layer id.
///
/// Ordering contract:
/// - Diffs list layers in ascending id order; unbinds are applied before binds.
/// - A layer whose target changed is unbound and then bound again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    entries: BTreeMap<String, BindingTarget>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn target(&self, layer: &str) -> Option<BindingTarget> {
        self.entries.get(layer).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, BindingTarget)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn diff(&self, desired: &BTreeMap<String, BindingTarget>) -> BindingDiff {
        let mut out = BindingDiff::default();
        for (layer, target) in &self.entries {
            if desired.get(layer) != Some(target) {
                out.unbind.push(layer.clone());
            }
        }
        for (layer, target) in desired {
            if self.entries.get(layer) != Some(target) {
                out.bind.push((layer.clone(), *target));
            }
        }
        out
    }

    /// Brings the surface's listeners in line with `desired`, touching only
    /// the layers whose entry changed.
    pub fn apply<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        desired: &BTreeMap<String, BindingTarget>,
    ) -> BindingDiff {
        let diff = self.diff(desired);
        for layer in &diff.unbind {
            for kind in BOUND_EVENTS {
                surface.unlisten(layer, kind);
            }
            self.entries.remove(layer);
        }
        for (layer, target) in &diff.bind {
            for kind in BOUND_EVENTS {
                surface.listen(layer, kind);
            }
            self.entries.insert(layer.clone(), *target);
        }
        if !diff.is_empty() {
            debug!(
                bound = diff.bind.len(),
                unbound = diff.unbind.len(),
                "updated layer bindings"
            );
        }
        diff
    }

    pub fn clear<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> BindingDiff {
        self.apply(surface, &BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::{BindingTable, BindingTarget};
    use layers::{HeadlessSurface, SurfaceCommand};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn desired(entries: &[(&str, BindingTarget)]) -> BTreeMap<String, BindingTarget> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn diff_touches_only_changed_layers() {
        let mut s = HeadlessSurface::default();
        let mut t = BindingTable::new();
        t.apply(
            &mut s,
            &desired(&[("hex-r5-fill", BindingTarget::Hex), ("hex-r6-fill", BindingTarget::Hex)]),
        );
        s.clear_commands();

        let diff = t.apply(
            &mut s,
            &desired(&[("hex-r6-fill", BindingTarget::Hex), ("hex-r7-fill", BindingTarget::Hex)]),
        );
        assert_eq!(diff.unbind, vec!["hex-r5-fill".to_string()]);
        assert_eq!(diff.bind, vec![("hex-r7-fill".to_string(), BindingTarget::Hex)]);
        assert!(s.commands().iter().all(|c| match c {
            SurfaceCommand::Listen { layer, .. } => layer == "hex-r7-fill",
            SurfaceCommand::Unlisten { layer, .. } => layer == "hex-r5-fill",
            _ => false,
        }));
        assert_eq!(s.commands().len(), 6);
    }

    #[test]
    fn unchanged_set_is_a_no_op() {
        let mut s = HeadlessSurface::default();
        let mut t = BindingTable::new();
        let want = desired(&[("counties-fill", BindingTarget::Region)]);
        t.apply(&mut s, &want);
        s.clear_commands();
        assert!(t.apply(&mut s, &want).is_empty());
        assert!(s.commands().is_empty());
    }

    #[test]
    fn retargeted_layer_is_rebound() {
        let t = {
            let mut s = HeadlessSurface::default();
            let mut t = BindingTable::new();
            t.apply(&mut s, &desired(&[("x", BindingTarget::Region)]));
            t
        };
        let diff = t.diff(&desired(&[("x", BindingTarget::Edge)]));
        assert_eq!(diff.unbind, vec!["x".to_string()]);
        assert_eq!(diff.bind, vec![("x".to_string(), BindingTarget::Edge)]);
    }

    #[test]
    fn clear_unbinds_everything() {
        let mut s = HeadlessSurface::default();
        let mut t = BindingTable::new();
        t.apply(&mut s, &desired(&[("counties-fill", BindingTarget::Region)]));
        t.clear(&mut s);
        assert!(t.is_empty());
        assert!(s.listeners().is_empty());
    }
}
