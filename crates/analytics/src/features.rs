//! Typed views over the backend's GeoJSON features.
//!
//! Parsing is lenient per feature and strict per payload: a payload without
//! its required collection is a [`FetchFailure`](crate::FetchFailure), while a
//! single unusable feature is dropped and logged.

use std::collections::BTreeMap;

use foundation::{GeometryCache, LngLat, decode_hex, normalize_region_id};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::protocol::{HexMapPayload, RegionMapPayload, ResolutionBand};

/// Most surprising `target` value within a region.
#[derive(Debug, Clone, PartialEq)]
pub struct TopAnomaly {
    pub value: String,
    pub surprisal: Option<f64>,
}

/// One county polygon with its aggregate statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    /// 5-digit FIPS code; `None` when neither the payload nor the name
    /// lookup could provide one.
    pub id: Option<String>,
    pub name: String,
    pub max_surprisal: Option<f64>,
    pub mean_surprisal: Option<f64>,
    pub total_rows: u64,
    pub top_anomaly: Option<TopAnomaly>,
    /// Full attribute map as received (plus the normalized `fips`/`name`).
    pub properties: JsonObject,
    pub geometry: Geometry,
}

/// Explanation of a hex cell's most surprising record.
#[derive(Debug, Clone, PartialEq)]
pub struct HexAnomaly {
    pub value: String,
    pub prob: Option<f64>,
    pub context: Option<String>,
    /// Pre-formatted list of the most expected values, e.g. `"Gray (41%), White (22%)"`.
    pub expected: Option<String>,
}

/// One hex cell at a specific resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct HexFeature {
    pub index: String,
    pub resolution: u8,
    pub center: LngLat,
    pub count: u64,
    pub lc_type: Option<String>,
    pub region_id: Option<String>,
    pub max_surprisal: Option<f64>,
    pub mean_surprisal: Option<f64>,
    pub anomaly: Option<HexAnomaly>,
    pub properties: JsonObject,
    pub geometry: Geometry,
}

/// County-mode data for one analysis request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionCollection {
    pub features: Vec<RegionFeature>,
    pub alpha: Option<f64>,
}

/// Hex-mode data for one analysis request, grouped by resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HexCollection {
    pub by_resolution: BTreeMap<u8, Vec<HexFeature>>,
    pub alpha: Option<f64>,
    pub total_hexes: u64,
    /// Bands announced by the backend, if any. Not validated here.
    pub levels: Option<Vec<ResolutionBand>>,
}

/// Reads a numeric attribute; `null`, missing and non-numeric all map to `None`.
pub fn prop_f64(props: &JsonObject, key: &str) -> Option<f64> {
    props.get(key).and_then(JsonValue::as_f64).filter(|v| v.is_finite())
}

/// Reads a string attribute, accepting numbers as well.
pub fn prop_string(props: &JsonObject, key: &str) -> Option<String> {
    match props.get(key)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Attributes the map can color by. Each is a number or null once parsed.
pub const STATISTIC_FIELDS: [&str; 7] = [
    "max_surprisal",
    "mean_surprisal",
    "max_divergence",
    "mean_divergence",
    "max_value",
    "mean_value",
    "local",
];

/// Replaces present-but-unusable statistics (strings, NaN sentinels) with
/// null so the ramp draws them in the no-data color.
fn null_unusable_statistics(props: &mut JsonObject) {
    for field in STATISTIC_FIELDS {
        let unusable = props
            .get(field)
            .is_some_and(|v| !v.is_null() && prop_f64(props, field).is_none());
        if unusable {
            debug!(field, value = %props[field], "non-numeric statistic treated as missing");
            props.insert(field.to_string(), JsonValue::Null);
        }
    }
}

fn prop_u64(props: &JsonObject, key: &str) -> u64 {
    props
        .get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

impl RegionFeature {
    /// Builds a region from a raw feature.
    ///
    /// Returns `None` for features without geometry.
    pub fn from_feature(feature: Feature, cache: &GeometryCache) -> Option<Self> {
        let geometry = feature.geometry?;
        let mut properties = feature.properties.unwrap_or_default();
        null_unusable_statistics(&mut properties);

        let raw_name = prop_string(&properties, "name")
            .or_else(|| prop_string(&properties, "county_name"));
        let id = prop_string(&properties, "fips")
            .or_else(|| prop_string(&properties, "FIPS"))
            .and_then(|f| normalize_region_id(&f))
            .or_else(|| {
                raw_name
                    .as_deref()
                    .and_then(|n| cache.fips_for_name(n))
                    .map(str::to_string)
            });
        let name = raw_name
            .or_else(|| id.as_deref().and_then(|i| cache.name(i)).map(str::to_string))
            .or_else(|| id.clone())
            .unwrap_or_default();

        if let Some(id) = &id {
            properties.insert("fips".into(), JsonValue::String(id.clone()));
        }
        properties.insert("name".into(), JsonValue::String(name.clone()));

        let top_anomaly = prop_string(&properties, "top_anomaly_value").map(|value| TopAnomaly {
            value,
            surprisal: prop_f64(&properties, "top_anomaly_surprisal"),
        });

        Some(Self {
            id,
            name,
            max_surprisal: prop_f64(&properties, "max_surprisal"),
            mean_surprisal: prop_f64(&properties, "mean_surprisal"),
            total_rows: prop_u64(&properties, "total_rows"),
            top_anomaly,
            properties,
            geometry,
        })
    }

    /// Value of an arbitrary severity field (e.g. `max_divergence`, `local`).
    pub fn statistic(&self, field: &str) -> Option<f64> {
        prop_f64(&self.properties, field)
    }

    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

impl HexFeature {
    /// Builds a hex cell from a raw feature.
    ///
    /// Returns `None` when the hex index is missing or does not decode. A
    /// missing geometry is rebuilt from the cell outline.
    pub fn from_feature(feature: Feature) -> Option<Self> {
        let mut properties = feature.properties.unwrap_or_default();
        null_unusable_statistics(&mut properties);
        let index = prop_string(&properties, "h3")?;
        let cell = match decode_hex(&index) {
            Ok(cell) => cell,
            Err(err) => {
                debug!("dropping hex feature: {err}");
                return None;
            }
        };
        let geometry = feature.geometry.unwrap_or_else(|| {
            let ring = cell
                .boundary()
                .into_iter()
                .map(|p| vec![p.lng, p.lat])
                .collect();
            Geometry::new(Value::Polygon(vec![ring]))
        });

        let anomaly = prop_string(&properties, "anomaly_value").map(|value| HexAnomaly {
            value,
            prob: prop_f64(&properties, "anomaly_prob"),
            context: prop_string(&properties, "anomaly_context"),
            expected: prop_string(&properties, "expected"),
        });

        Some(Self {
            resolution: cell.resolution,
            center: cell.center,
            count: prop_u64(&properties, "count"),
            lc_type: prop_string(&properties, "lc_type"),
            region_id: prop_string(&properties, "fips").and_then(|f| normalize_region_id(&f)),
            max_surprisal: prop_f64(&properties, "max_surprisal"),
            mean_surprisal: prop_f64(&properties, "mean_surprisal"),
            anomaly,
            index,
            properties,
            geometry,
        })
    }

    pub fn statistic(&self, field: &str) -> Option<f64> {
        prop_f64(&self.properties, field)
    }

    pub fn to_feature(&self) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: None,
            properties: Some(self.properties.clone()),
            foreign_members: None,
        }
    }
}

impl RegionCollection {
    pub fn from_payload(payload: RegionMapPayload, cache: &GeometryCache) -> Self {
        match payload.kind.as_deref() {
            Some("FeatureCollection") | None => {}
            Some(kind) => warn!("region payload has unexpected type {kind:?}; reading features anyway"),
        }
        let total = payload.features.len();
        let features: Vec<RegionFeature> = payload
            .features
            .into_iter()
            .filter_map(|f| RegionFeature::from_feature(f, cache))
            .collect();
        if features.len() != total {
            warn!(
                "dropped {} region features without geometry",
                total - features.len()
            );
        }
        Self {
            features,
            alpha: payload.alpha,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature(&self, id: &str) -> Option<&RegionFeature> {
        let id = normalize_region_id(id)?;
        self.features.iter().find(|f| f.id.as_deref() == Some(id.as_str()))
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self.features.iter().map(RegionFeature::to_feature).collect(),
            foreign_members: None,
        }
    }
}

impl HexCollection {
    /// Groups the payload by resolution.
    ///
    /// A feature is kept only if its decoded index resolution equals the
    /// resolution key it was delivered under.
    pub fn from_payload(payload: HexMapPayload) -> Result<Self, String> {
        let mut by_resolution = BTreeMap::new();
        for (key, collection) in payload.by_resolution {
            let resolution: u8 = key
                .trim()
                .parse()
                .map_err(|_| format!("resolution key {key:?} is not an integer"))?;
            let total = collection.features.len();
            let mut kept = Vec::with_capacity(total);
            let mut mismatched = 0usize;
            for feature in collection.features {
                let Some(hex) = HexFeature::from_feature(feature) else {
                    continue;
                };
                if hex.resolution != resolution {
                    mismatched += 1;
                    continue;
                }
                kept.push(hex);
            }
            if kept.len() != total {
                warn!(
                    resolution,
                    dropped = total - kept.len(),
                    mismatched,
                    "dropped unusable hex features"
                );
            }
            by_resolution.insert(resolution, kept);
        }

        let total_hexes = payload.total_hexes.unwrap_or_else(|| {
            by_resolution
                .iter()
                .next_back()
                .map(|(_, v)| v.len() as u64)
                .unwrap_or(0)
        });

        Ok(Self {
            by_resolution,
            alpha: payload.alpha,
            total_hexes,
            levels: payload.levels,
        })
    }

    pub fn resolutions(&self) -> impl Iterator<Item = u8> + '_ {
        self.by_resolution.keys().copied()
    }

    pub fn features(&self, resolution: u8) -> &[HexFeature] {
        self.by_resolution
            .get(&resolution)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn feature_count(&self) -> usize {
        self.by_resolution.values().map(Vec::len).sum()
    }

    pub fn to_feature_collection(&self, resolution: u8) -> FeatureCollection {
        FeatureCollection {
            bbox: None,
            features: self
                .features(resolution)
                .iter()
                .map(HexFeature::to_feature)
                .collect(),
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn square() -> serde_json::Value {
        json!({"type": "Polygon", "coordinates": [[[-120.0, 36.0], [-119.0, 36.0], [-119.0, 37.0], [-120.0, 37.0], [-120.0, 36.0]]]})
    }

    fn feature(props: serde_json::Value, geometry: Option<serde_json::Value>) -> Feature {
        let v = json!({
            "type": "Feature",
            "properties": props,
            "geometry": geometry.unwrap_or(serde_json::Value::Null),
        });
        serde_json::from_value(v).expect("feature")
    }

    fn cell(lat: f64, lng: f64, res: u8) -> String {
        let res = h3o_resolution(res);
        h3o::LatLng::new(lat, lng)
            .expect("valid")
            .to_cell(res)
            .to_string()
    }

    fn h3o_resolution(res: u8) -> h3o::Resolution {
        h3o::Resolution::try_from(res).expect("resolution")
    }

    #[test]
    fn region_reads_typed_statistics() {
        let cache = GeometryCache::california();
        let f = feature(
            json!({
                "name": "Fresno",
                "fips": "06019",
                "max_surprisal": 9.0,
                "mean_surprisal": 3.25,
                "total_rows": 1200,
                "top_anomaly_value": "Purple",
                "top_anomaly_surprisal": 9.0
            }),
            Some(square()),
        );
        let r = RegionFeature::from_feature(f, &cache).expect("region");
        assert_eq!(r.id.as_deref(), Some("06019"));
        assert_eq!(r.name, "Fresno");
        assert_eq!(r.max_surprisal, Some(9.0));
        assert_eq!(r.mean_surprisal, Some(3.25));
        assert_eq!(r.total_rows, 1200);
        assert_eq!(
            r.top_anomaly,
            Some(TopAnomaly {
                value: "Purple".into(),
                surprisal: Some(9.0)
            })
        );
    }

    #[test]
    fn region_id_falls_back_to_name_lookup() {
        let cache = GeometryCache::california();
        let f = feature(json!({"name": "Kern", "max_surprisal": null}), Some(square()));
        let r = RegionFeature::from_feature(f, &cache).expect("region");
        assert_eq!(r.id.as_deref(), Some("06029"));
        assert_eq!(r.max_surprisal, None);
        assert_eq!(r.properties.get("fips"), Some(&json!("06029")));
    }

    #[test]
    fn non_numeric_statistics_become_null() {
        let cache = GeometryCache::california();
        let f = feature(
            json!({"fips": "06019", "max_surprisal": "n/a", "mean_surprisal": "NaN", "local": -0.4}),
            Some(square()),
        );
        let r = RegionFeature::from_feature(f, &cache).expect("region");
        assert_eq!(r.max_surprisal, None);
        assert_eq!(r.mean_surprisal, None);
        assert_eq!(r.properties.get("max_surprisal"), Some(&JsonValue::Null));
        assert_eq!(r.properties.get("mean_surprisal"), Some(&JsonValue::Null));
        assert_eq!(r.statistic("local"), Some(-0.4));

        let h = HexFeature::from_feature(feature(
            json!({"h3": cell(36.5, -119.5, 7), "max_surprisal": {"bits": 3}}),
            None,
        ))
        .expect("hex");
        assert_eq!(h.max_surprisal, None);
        assert_eq!(h.properties.get("max_surprisal"), Some(&JsonValue::Null));
    }

    #[test]
    fn region_numeric_fips_is_padded() {
        let cache = GeometryCache::california();
        let f = feature(json!({"fips": 6037}), Some(square()));
        let r = RegionFeature::from_feature(f, &cache).expect("region");
        assert_eq!(r.id.as_deref(), Some("06037"));
        assert_eq!(r.name, "Los Angeles");
    }

    #[test]
    fn region_without_geometry_is_dropped() {
        let cache = GeometryCache::california();
        let payload = RegionMapPayload {
            kind: Some("FeatureCollection".into()),
            features: vec![
                feature(json!({"fips": "06001"}), None),
                feature(json!({"fips": "06003"}), Some(square())),
            ],
            alpha: Some(12.5),
        };
        let c = RegionCollection::from_payload(payload, &cache);
        assert_eq!(c.len(), 1);
        assert_eq!(c.alpha, Some(12.5));
        assert!(c.feature("6003").is_some());
    }

    #[test]
    fn hex_geometry_is_rebuilt_when_missing() {
        let index = cell(34.0, -118.3, 7);
        let f = feature(
            json!({"h3": index, "count": 4, "fips": "06037", "lc_type": "Developed"}),
            None,
        );
        let h = HexFeature::from_feature(f).expect("hex");
        assert_eq!(h.resolution, 7);
        assert_eq!(h.region_id.as_deref(), Some("06037"));
        assert_eq!(h.lc_type.as_deref(), Some("Developed"));
        assert!(matches!(h.geometry.value, Value::Polygon(_)));
    }

    #[test]
    fn hex_collection_drops_mismatched_resolutions() {
        let res6 = cell(37.0, -120.0, 6);
        let res7 = cell(37.0, -120.0, 7);
        let fc: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"h3": res6, "max_surprisal": 2.0}, "geometry": null},
                {"type": "Feature", "properties": {"h3": res7, "max_surprisal": 5.0}, "geometry": null},
                {"type": "Feature", "properties": {"h3": "bogus"}, "geometry": null}
            ]
        }))
        .expect("collection");
        let mut by_resolution = BTreeMap::new();
        by_resolution.insert("6".to_string(), fc);
        let payload = HexMapPayload {
            by_resolution,
            alpha: None,
            total_hexes: None,
            levels: None,
        };
        let c = HexCollection::from_payload(payload).expect("collection");
        assert_eq!(c.features(6).len(), 1);
        assert_eq!(c.features(6)[0].index, res6);
        assert_eq!(c.total_hexes, 1);
        assert!(c.features(7).is_empty());
    }

    #[test]
    fn hex_collection_rejects_non_numeric_keys() {
        let mut by_resolution = BTreeMap::new();
        by_resolution.insert(
            "fine".to_string(),
            FeatureCollection {
                bbox: None,
                features: vec![],
                foreign_members: None,
            },
        );
        let payload = HexMapPayload {
            by_resolution,
            alpha: None,
            total_hexes: None,
            levels: None,
        };
        assert!(HexCollection::from_payload(payload).is_err());
    }

    #[test]
    fn prop_string_accepts_numbers() {
        let props: JsonObject = serde_json::from_value(json!({"a": 12, "b": "", "c": null}))
            .expect("object");
        assert_eq!(prop_string(&props, "a").as_deref(), Some("12"));
        assert_eq!(prop_string(&props, "b"), None);
        assert_eq!(prop_string(&props, "c"), None);
    }
}
