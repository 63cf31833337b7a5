//! Zoom-dependent opacity for the hex resolution bands.
//!
//! Each band fades in over its first zoom unit and out over its last, so two
//! neighbouring bands crossfade through the one-unit overlap instead of
//! popping.

use analytics::{DEFAULT_BANDS, ResolutionBand};
use tracing::warn;

use crate::expression::Expr;

/// Plateau opacity of hex fill layers.
pub const FILL_TARGET_OPACITY: f64 = 0.7;
/// Plateau opacity of hex outline layers.
pub const OUTLINE_TARGET_OPACITY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BandError {
    #[error("no resolution bands")]
    Empty,
    #[error("band for resolution {resolution} is not finite")]
    NotFinite { resolution: u8 },
    #[error("band for resolution {resolution} spans {width} zoom units; at least 2 are required")]
    TooNarrow { resolution: u8, width: f64 },
    #[error("bands are not sorted: resolution {resolution} starts before its predecessor")]
    Unsorted { resolution: u8 },
    #[error("duplicate band for resolution {resolution}")]
    Duplicate { resolution: u8 },
    #[error("gap between zoom {end} and {start} before resolution {resolution}")]
    Gap { resolution: u8, end: f64, start: f64 },
    #[error("first band starts at zoom {start}, not 0")]
    DoesNotStartAtZero { start: f64 },
}

/// Checks that `bands` cover the zoom range from 0 without gaps.
pub fn validate_bands(bands: &[ResolutionBand]) -> Result<(), BandError> {
    let first = bands.first().ok_or(BandError::Empty)?;
    if first.min_zoom != 0.0 {
        return Err(BandError::DoesNotStartAtZero {
            start: first.min_zoom,
        });
    }
    for (i, band) in bands.iter().enumerate() {
        let resolution = band.resolution;
        if !band.min_zoom.is_finite() || !band.max_zoom.is_finite() {
            return Err(BandError::NotFinite { resolution });
        }
        let width = band.max_zoom - band.min_zoom;
        if width < 2.0 {
            return Err(BandError::TooNarrow { resolution, width });
        }
        if i == 0 {
            continue;
        }
        let prev = &bands[i - 1];
        if bands[..i].iter().any(|b| b.resolution == resolution) {
            return Err(BandError::Duplicate { resolution });
        }
        if band.min_zoom < prev.min_zoom || band.resolution < prev.resolution {
            return Err(BandError::Unsorted { resolution });
        }
        if band.min_zoom > prev.max_zoom {
            return Err(BandError::Gap {
                resolution,
                end: prev.max_zoom,
                start: band.min_zoom,
            });
        }
    }
    Ok(())
}

/// Opacity curve of `band` at zoom `z` for a layer whose plateau is `target`.
pub fn band_opacity(band: &ResolutionBand, target: f64, z: f64) -> f64 {
    let (lo, hi) = (band.min_zoom, band.max_zoom);
    if z <= lo || z >= hi {
        0.0
    } else if z < lo + 1.0 {
        target * (z - lo)
    } else if z <= hi - 1.0 {
        target
    } else {
        target * (hi - z)
    }
}

/// Same curve as [`band_opacity`], as a zoom expression.
pub fn band_opacity_expr(band: &ResolutionBand, target: f64) -> Expr {
    let (lo, hi) = (band.min_zoom, band.max_zoom);
    let mut stops = vec![(lo, 0.0), (lo + 1.0, target)];
    // A two-unit band has a single peak; interpolate stops must stay strictly increasing.
    if hi - 1.0 > lo + 1.0 {
        stops.push((hi - 1.0, target));
    }
    stops.push((hi, 0.0));
    Expr::interpolate_zoom(stops)
}

/// Owns the active band set and answers per-resolution opacity queries.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOfDetailScheduler {
    bands: Vec<ResolutionBand>,
}

impl Default for LevelOfDetailScheduler {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS.to_vec(),
        }
    }
}

impl LevelOfDetailScheduler {
    pub fn new(bands: Vec<ResolutionBand>) -> Result<Self, BandError> {
        validate_bands(&bands)?;
        Ok(Self { bands })
    }

    /// Uses the bands announced by the backend when they are valid, and the
    /// defaults otherwise.
    pub fn from_levels(levels: Option<&[ResolutionBand]>) -> Self {
        let Some(levels) = levels else {
            return Self::default();
        };
        match Self::new(levels.to_vec()) {
            Ok(s) => s,
            Err(err) => {
                warn!("rejecting backend resolution bands ({err}); using defaults");
                Self::default()
            }
        }
    }

    pub fn bands(&self) -> &[ResolutionBand] {
        &self.bands
    }

    pub fn band(&self, resolution: u8) -> Option<&ResolutionBand> {
        self.bands.iter().find(|b| b.resolution == resolution)
    }

    pub fn opacity(&self, resolution: u8, target: f64, z: f64) -> Option<f64> {
        self.band(resolution).map(|b| band_opacity(b, target, z))
    }

    pub fn fill_opacity_expr(&self, resolution: u8) -> Option<Expr> {
        self.band(resolution)
            .map(|b| band_opacity_expr(b, FILL_TARGET_OPACITY))
    }

    pub fn outline_opacity_expr(&self, resolution: u8) -> Option<Expr> {
        self.band(resolution)
            .map(|b| band_opacity_expr(b, OUTLINE_TARGET_OPACITY))
    }

    /// Resolutions with non-zero fill opacity at `z`.
    pub fn visible_at(&self, z: f64) -> Vec<u8> {
        self.bands
            .iter()
            .filter(|b| band_opacity(b, FILL_TARGET_OPACITY, z) > 0.0)
            .map(|b| b.resolution)
            .collect()
    }
}
