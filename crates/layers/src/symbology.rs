//! Severity coloring and paint recipes.

use crate::expression::{Condition, Expr};

/// Lower bounds of the eight severity classes, from "expected" to "anomalous".
pub const SEVERITY_BREAKPOINTS: [f64; 8] = [0.0, 1.0, 2.0, 3.0, 4.5, 6.0, 8.0, 9.5];

/// Fill color of each severity class (green to red).
pub const SEVERITY_COLORS: [&str; 8] = [
    "#1a9850", "#66bd63", "#a6d96a", "#d9ef8b", "#fee08b", "#fdae61", "#f46d43", "#d73027",
];

/// Fill color for features whose statistic is missing.
pub const NO_DATA_COLOR: &str = "#cccccc";

pub const COUNTY_FILL_OPACITY: f64 = 0.7;
pub const COUNTY_OUTLINE_COLOR: &str = "#333333";
pub const COUNTY_OUTLINE_WIDTH: f64 = 0.8;
pub const HEX_OUTLINE_COLOR: &str = "#ffffff";
pub const HEX_OUTLINE_WIDTH: f64 = 0.3;

/// Statistic that drives the ramp unless configured otherwise.
pub const DEFAULT_SEVERITY_FIELD: &str = "max_surprisal";

/// Color of `value` on the fixed ramp.
///
/// Values below the first breakpoint take the first color.
pub fn severity_color(value: Option<f64>) -> &'static str {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return NO_DATA_COLOR;
    };
    let class = SEVERITY_BREAKPOINTS
        .iter()
        .rposition(|b| v >= *b)
        .unwrap_or(0);
    SEVERITY_COLORS[class]
}

/// Ramp expression over `field`, with the no-data guard in front.
pub fn severity_color_expr(field: &str) -> Expr {
    let ramp = Expr::Step {
        input: Box::new(Expr::get(field)),
        base: Box::new(Expr::color(SEVERITY_COLORS[0])),
        stops: SEVERITY_BREAKPOINTS[1..]
            .iter()
            .zip(&SEVERITY_COLORS[1..])
            .map(|(b, c)| (*b, Expr::color(c)))
            .collect(),
    };
    Expr::Case {
        branches: vec![(Condition::IsNull(field.to_string()), Expr::color(NO_DATA_COLOR))],
        fallback: Box::new(ramp),
    }
}

/// One legend row: the half-open class `[lower, upper)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub lower: f64,
    /// `None` for the open-ended top class.
    pub upper: Option<f64>,
    pub color: &'static str,
}

impl LegendEntry {
    pub fn label(&self) -> String {
        match self.upper {
            Some(upper) => format!("{:.1} – {:.1}", self.lower, upper),
            None => format!("{:.1}+", self.lower),
        }
    }
}

/// The fixed severity scale, lowest class first.
pub fn severity_legend() -> Vec<LegendEntry> {
    SEVERITY_BREAKPOINTS
        .iter()
        .enumerate()
        .map(|(i, lower)| LegendEntry {
            lower: *lower,
            upper: SEVERITY_BREAKPOINTS.get(i + 1).copied(),
            color: SEVERITY_COLORS[i],
        })
        .collect()
}

/// Paint for one installed geometry: a fill layer and an outline layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintRecipe {
    pub fill_color: Expr,
    pub fill_opacity: Expr,
    pub outline_color: Expr,
    pub outline_width: Expr,
    pub outline_opacity: Expr,
    /// Render window `[min_zoom, max_zoom]`; `None` renders at every zoom.
    pub zoom_range: Option<(f64, f64)>,
}

impl PaintRecipe {
    pub fn counties(severity_field: &str) -> Self {
        Self {
            fill_color: severity_color_expr(severity_field),
            fill_opacity: Expr::Number(COUNTY_FILL_OPACITY),
            outline_color: Expr::color(COUNTY_OUTLINE_COLOR),
            outline_width: Expr::Number(COUNTY_OUTLINE_WIDTH),
            outline_opacity: Expr::Number(1.0),
            zoom_range: None,
        }
    }

    /// Hex paint whose opacities follow the band's fade curve.
    pub fn hex_band(
        severity_field: &str,
        fill_opacity: Expr,
        outline_opacity: Expr,
        zoom_range: (f64, f64),
    ) -> Self {
        Self {
            fill_color: severity_color_expr(severity_field),
            fill_opacity,
            outline_color: Expr::color(HEX_OUTLINE_COLOR),
            outline_width: Expr::Number(HEX_OUTLINE_WIDTH),
            outline_opacity,
            zoom_range: Some(zoom_range),
        }
    }
}
