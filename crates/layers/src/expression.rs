//! Typed style expressions.
//!
//! Paint properties are data- and zoom-driven. They are built as [`Expr`]
//! trees so the engine can both serialize them to the map library's JSON
//! expression form and evaluate them itself (headless rendering, tests).

use geojson::JsonObject;
use serde_json::{Value, json};

/// Predicate used by [`Expr::Case`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The attribute is missing or `null`.
    IsNull(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Color(String),
    /// Feature attribute lookup.
    Get(String),
    /// Current camera zoom.
    Zoom,
    /// Linear interpolation over `(input, output)` stops, clamped at both ends.
    ///
    /// Stops must be strictly increasing in input.
    Interpolate {
        input: Box<Expr>,
        stops: Vec<(f64, f64)>,
    },
    /// Piecewise-constant lookup: `base` below the first threshold, otherwise
    /// the output of the greatest threshold `<= input`.
    Step {
        input: Box<Expr>,
        base: Box<Expr>,
        stops: Vec<(f64, Expr)>,
    },
    Case {
        branches: Vec<(Condition, Expr)>,
        fallback: Box<Expr>,
    },
}

/// Result of evaluating an [`Expr`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Number(f64),
    Text(String),
    Null,
}

impl ExprValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ExprValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExprValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(v: Option<&Value>) -> Self {
        match v {
            Some(Value::Number(n)) => n.as_f64().map(ExprValue::Number).unwrap_or(ExprValue::Null),
            Some(Value::String(s)) => ExprValue::Text(s.clone()),
            Some(Value::Bool(b)) => ExprValue::Text(b.to_string()),
            _ => ExprValue::Null,
        }
    }
}

/// What an expression is evaluated against.
#[derive(Debug, Copy, Clone)]
pub struct EvalContext<'a> {
    pub zoom: f64,
    pub properties: Option<&'a JsonObject>,
}

impl<'a> EvalContext<'a> {
    pub fn at_zoom(zoom: f64) -> Self {
        Self {
            zoom,
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: &'a JsonObject) -> Self {
        self.properties = Some(properties);
        self
    }
}

impl Expr {
    pub fn color(hex: &str) -> Self {
        Expr::Color(hex.to_string())
    }

    pub fn get(field: &str) -> Self {
        Expr::Get(field.to_string())
    }

    /// Zoom-driven linear ramp.
    pub fn interpolate_zoom(stops: Vec<(f64, f64)>) -> Self {
        Expr::Interpolate {
            input: Box::new(Expr::Zoom),
            stops,
        }
    }

    pub fn evaluate(&self, ctx: EvalContext<'_>) -> ExprValue {
        match self {
            Expr::Number(n) => ExprValue::Number(*n),
            Expr::Color(c) => ExprValue::Text(c.clone()),
            Expr::Zoom => ExprValue::Number(ctx.zoom),
            Expr::Get(field) => ExprValue::from_json(ctx.properties.and_then(|p| p.get(field))),
            Expr::Interpolate { input, stops } => match input.evaluate(ctx).as_f64() {
                Some(x) => interpolate(stops, x).map_or(ExprValue::Null, ExprValue::Number),
                None => ExprValue::Null,
            },
            Expr::Step { input, base, stops } => {
                let Some(x) = input.evaluate(ctx).as_f64() else {
                    return ExprValue::Null;
                };
                let mut out = base.as_ref();
                for (threshold, value) in stops {
                    if x < *threshold {
                        break;
                    }
                    out = value;
                }
                out.evaluate(ctx)
            }
            Expr::Case { branches, fallback } => {
                for (cond, value) in branches {
                    if cond.holds(ctx) {
                        return value.evaluate(ctx);
                    }
                }
                fallback.evaluate(ctx)
            }
        }
    }

    /// JSON expression form understood by MapLibre-style renderers.
    pub fn to_json(&self) -> Value {
        match self {
            Expr::Number(n) => json!(n),
            Expr::Color(c) => json!(c),
            Expr::Get(field) => json!(["get", field]),
            Expr::Zoom => json!(["zoom"]),
            Expr::Interpolate { input, stops } => {
                let mut out = vec![json!("interpolate"), json!(["linear"]), input.to_json()];
                for (z, v) in stops {
                    out.push(json!(z));
                    out.push(json!(v));
                }
                Value::Array(out)
            }
            Expr::Step { input, base, stops } => {
                let mut out = vec![json!("step"), input.to_json(), base.to_json()];
                for (t, v) in stops {
                    out.push(json!(t));
                    out.push(v.to_json());
                }
                Value::Array(out)
            }
            Expr::Case { branches, fallback } => {
                let mut out = vec![json!("case")];
                for (cond, v) in branches {
                    out.push(cond.to_json());
                    out.push(v.to_json());
                }
                out.push(fallback.to_json());
                Value::Array(out)
            }
        }
    }
}

impl Condition {
    fn holds(&self, ctx: EvalContext<'_>) -> bool {
        match self {
            Condition::IsNull(field) => {
                ExprValue::from_json(ctx.properties.and_then(|p| p.get(field))) == ExprValue::Null
            }
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Condition::IsNull(field) => json!(["==", ["get", field], null]),
        }
    }
}

fn interpolate(stops: &[(f64, f64)], x: f64) -> Option<f64> {
    let (first, last) = (stops.first()?, stops.last()?);
    if x <= first.0 {
        return Some(first.1);
    }
    if x >= last.0 {
        return Some(last.1);
    }
    let i = stops.windows(2).position(|w| x >= w[0].0 && x < w[1].0)?;
    let ((x0, y0), (x1, y1)) = (stops[i], stops[i + 1]);
    let t = (x - x0) / (x1 - x0);
    Some(y0 + (y1 - y0) * t)
}
