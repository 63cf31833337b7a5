//! Hover tooltip contents.
//!
//! Numbers are printed exactly as the backend sent them: the JSON number's
//! own textual form, never a re-rounded float.

use foundation::GeometryCache;
use geojson::JsonObject;
use layers::{DEFAULT_SEVERITY_FIELD, PopupContent};
use serde_json::Value;

/// Statistic above which the anomaly explanation is shown.
pub const DEFAULT_EXPLANATION_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipConfig {
    /// Attribute that drives the color ramp and is shown first.
    pub severity_field: String,
    pub explanation_threshold: f64,
}

impl Default for TooltipConfig {
    fn default() -> Self {
        Self {
            severity_field: DEFAULT_SEVERITY_FIELD.to_string(),
            explanation_threshold: DEFAULT_EXPLANATION_THRESHOLD,
        }
    }
}

/// Human label for a statistic attribute.
pub fn field_label(field: &str) -> &str {
    match field {
        "max_surprisal" => "Max surprisal",
        "mean_surprisal" => "Mean surprisal",
        "max_divergence" => "Max divergence",
        "mean_divergence" => "Mean divergence",
        "mean_value" => "Mean value",
        "max_value" => "Max value",
        "local" => "Local Moran's I",
        "weighted_jsd" => "Weighted JSD",
        "total_rows" => "Rows",
        "count" => "Rows",
        other => other,
    }
}

/// Attribute value in its received textual form.
pub fn verbatim(props: &JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric(props: &JsonObject, key: &str) -> Option<f64> {
    props.get(key).and_then(Value::as_f64)
}

fn stat_line(props: &JsonObject, field: &str) -> String {
    let value = verbatim(props, field).unwrap_or_else(|| "no data".to_string());
    format!("{}: {value}", field_label(field))
}

/// Primary statistic first, then the secondary ones that are not the primary.
fn stat_lines(props: &JsonObject, primary: &str, secondary: &[&str]) -> Vec<String> {
    let mut lines = vec![stat_line(props, primary)];
    for field in secondary.iter().filter(|f| **f != primary) {
        if props.contains_key(*field) {
            lines.push(stat_line(props, field));
        }
    }
    lines
}

fn exceeds(props: &JsonObject, cfg: &TooltipConfig) -> bool {
    numeric(props, &cfg.severity_field).is_some_and(|v| v > cfg.explanation_threshold)
}

pub fn region_tooltip(props: &JsonObject, cfg: &TooltipConfig, cache: &GeometryCache) -> PopupContent {
    let title = verbatim(props, "name")
        .or_else(|| {
            verbatim(props, "fips").and_then(|f| cache.name(&f).map(str::to_string))
        })
        .or_else(|| verbatim(props, "fips"))
        .unwrap_or_else(|| "Unknown region".to_string());
    let lines = stat_lines(
        props,
        &cfg.severity_field,
        &["max_surprisal", "mean_surprisal", "total_rows"],
    );
    let explanation = if exceeds(props, cfg) {
        verbatim(props, "top_anomaly_value").map(|value| {
            match verbatim(props, "top_anomaly_surprisal") {
                Some(s) => format!("Most unusual value: {value} ({s} bits)"),
                None => format!("Most unusual value: {value}"),
            }
        })
    } else {
        None
    };
    PopupContent {
        title,
        lines,
        explanation,
    }
}

pub fn hex_tooltip(props: &JsonObject, cfg: &TooltipConfig, cache: &GeometryCache) -> PopupContent {
    let index = verbatim(props, "h3").unwrap_or_default();
    let title = match verbatim(props, "fips").and_then(|f| cache.name(&f)) {
        Some(county) => format!("Hex {index} · {county}"),
        None => format!("Hex {index}"),
    };
    let mut lines = stat_lines(
        props,
        &cfg.severity_field,
        &["max_surprisal", "mean_surprisal", "count"],
    );
    if let Some(lc) = verbatim(props, "lc_type") {
        lines.push(format!("Land cover: {lc}"));
    }
    let explanation = if exceeds(props, cfg) {
        verbatim(props, "anomaly_value").map(|value| {
            let mut text = format!("Unusual: {value}");
            if let Some(p) = verbatim(props, "anomaly_prob") {
                text.push_str(&format!(" (p = {p})"));
            }
            if let Some(ctx) = verbatim(props, "anomaly_context") {
                text.push_str(&format!(" given {ctx}"));
            }
            if let Some(expected) = verbatim(props, "expected") {
                text.push_str(&format!(". Expected: {expected}"));
            }
            text
        })
    } else {
        None
    };
    PopupContent {
        title,
        lines,
        explanation,
    }
}

pub fn edge_tooltip(props: &JsonObject, cache: &GeometryCache) -> PopupContent {
    let side = |name_key: &str, fips_key: &str| {
        verbatim(props, name_key)
            .or_else(|| verbatim(props, fips_key).and_then(|f| cache.name(&f).map(str::to_string)))
            .or_else(|| verbatim(props, fips_key))
            .unwrap_or_else(|| "?".to_string())
    };
    let title = format!("{} ↔ {}", side("county_a", "fips_a"), side("county_b", "fips_b"));
    let lines = if props.contains_key("weighted_jsd") {
        vec![stat_line(props, "weighted_jsd")]
    } else {
        Vec::new()
    };
    PopupContent {
        title,
        lines,
        explanation: None,
    }
}
