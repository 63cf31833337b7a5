//! Source and layer naming.
//!
//! Every source the engine installs is named after its geometry, and every
//! layer after its source plus a role suffix. Teardown relies on this: the
//! names for a geometry can be recomputed without remembering what was added.

/// Which geometry family is on the map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewMode {
    Counties,
    Hexes,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Counties => "counties",
            ViewMode::Hexes => "hexes",
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerRole {
    Fill,
    Outline,
}

impl LayerRole {
    pub const ALL: [LayerRole; 2] = [LayerRole::Fill, LayerRole::Outline];

    fn suffix(self) -> &'static str {
        match self {
            LayerRole::Fill => "fill",
            LayerRole::Outline => "outline",
        }
    }
}

/// Highest hex resolution a source name can refer to.
pub const MAX_HEX_RESOLUTION: u8 = 15;

/// One installable geometry: the county polygons, or one hex resolution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryName {
    Counties,
    Hex(u8),
}

impl GeometryName {
    pub fn mode(self) -> ViewMode {
        match self {
            GeometryName::Counties => ViewMode::Counties,
            GeometryName::Hex(_) => ViewMode::Hexes,
        }
    }

    pub fn resolution(self) -> Option<u8> {
        match self {
            GeometryName::Counties => None,
            GeometryName::Hex(r) => Some(r),
        }
    }

    pub fn source_id(self) -> String {
        match self {
            GeometryName::Counties => "counties".to_string(),
            GeometryName::Hex(r) => format!("hex-r{r}"),
        }
    }

    pub fn layer_id(self, role: LayerRole) -> String {
        format!("{}-{}", self.source_id(), role.suffix())
    }

    /// Layer ids in draw order (fill below outline).
    pub fn layer_ids(self) -> [String; 2] {
        [self.layer_id(LayerRole::Fill), self.layer_id(LayerRole::Outline)]
    }

    /// Every name a mode can ever install, used to sweep orphans.
    pub fn all_for(mode: ViewMode) -> Vec<GeometryName> {
        match mode {
            ViewMode::Counties => vec![GeometryName::Counties],
            ViewMode::Hexes => (0..=MAX_HEX_RESOLUTION).map(GeometryName::Hex).collect(),
        }
    }

    /// Inverse of [`GeometryName::layer_id`].
    pub fn parse_layer_id(id: &str) -> Option<(GeometryName, LayerRole)> {
        let (source, suffix) = id.rsplit_once('-')?;
        let role = LayerRole::ALL.into_iter().find(|r| r.suffix() == suffix)?;
        let name = if source == "counties" {
            GeometryName::Counties
        } else {
            let r: u8 = source.strip_prefix("hex-r")?.parse().ok()?;
            if r > MAX_HEX_RESOLUTION {
                return None;
            }
            GeometryName::Hex(r)
        };
        Some((name, role))
    }
}

#[cfg(test)]
mod tests {
    use super::{GeometryName, LayerRole, ViewMode};

    #[test]
    fn names_follow_convention() {
        assert_eq!(GeometryName::Counties.source_id(), "counties");
        assert_eq!(
            GeometryName::Counties.layer_ids(),
            ["counties-fill".to_string(), "counties-outline".to_string()]
        );
        assert_eq!(GeometryName::Hex(7).source_id(), "hex-r7");
        assert_eq!(GeometryName::Hex(7).layer_id(LayerRole::Outline), "hex-r7-outline");
    }

    #[test]
    fn layer_ids_parse_back() {
        assert_eq!(
            GeometryName::parse_layer_id("hex-r12-fill"),
            Some((GeometryName::Hex(12), LayerRole::Fill))
        );
        assert_eq!(
            GeometryName::parse_layer_id("counties-outline"),
            Some((GeometryName::Counties, LayerRole::Outline))
        );
        assert_eq!(GeometryName::parse_layer_id("edges-line"), None);
        assert_eq!(GeometryName::parse_layer_id("hex-r99-fill"), None);
    }

    #[test]
    fn sweep_covers_every_resolution() {
        let names = GeometryName::all_for(ViewMode::Hexes);
        assert_eq!(names.len(), 16);
        assert!(names.iter().all(|n| n.mode() == ViewMode::Hexes));
    }
}
