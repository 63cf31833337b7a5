use crate::geo::LngLat;

/// One county polygon's static metadata.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct County {
    /// 5-digit FIPS code, state prefix included.
    pub fips: &'static str,
    pub name: &'static str,
    pub centroid: LngLat,
}

impl County {
    const fn new(fips: &'static str, name: &'static str, lng: f64, lat: f64) -> Self {
        Self {
            fips,
            name,
            centroid: LngLat::new(lng, lat),
        }
    }
}

// Sorted by FIPS so lookups can binary search.
static CALIFORNIA_COUNTIES: [County; 58] = [
    County::new("06001", "Alameda", -121.9, 37.65),
    County::new("06003", "Alpine", -119.82, 38.6),
    County::new("06005", "Amador", -120.65, 38.45),
    County::new("06007", "Butte", -121.6, 39.67),
    County::new("06009", "Calaveras", -120.55, 38.2),
    County::new("06011", "Colusa", -122.23, 39.18),
    County::new("06013", "Contra Costa", -122.0, 37.92),
    County::new("06015", "Del Norte", -123.98, 41.75),
    County::new("06017", "El Dorado", -120.53, 38.78),
    County::new("06019", "Fresno", -119.77, 36.76),
    County::new("06021", "Glenn", -122.39, 39.6),
    County::new("06023", "Humboldt", -123.87, 40.7),
    County::new("06025", "Imperial", -115.36, 33.04),
    County::new("06027", "Inyo", -117.4, 36.51),
    County::new("06029", "Kern", -118.73, 35.34),
    County::new("06031", "Kings", -119.82, 36.08),
    County::new("06033", "Lake", -122.75, 39.1),
    County::new("06035", "Lassen", -120.53, 40.66),
    County::new("06037", "Los Angeles", -118.23, 34.32),
    County::new("06039", "Madera", -119.76, 37.22),
    County::new("06041", "Marin", -122.58, 38.05),
    County::new("06043", "Mariposa", -119.97, 37.58),
    County::new("06045", "Mendocino", -123.44, 39.44),
    County::new("06047", "Merced", -120.72, 37.19),
    County::new("06049", "Modoc", -120.73, 41.59),
    County::new("06051", "Mono", -118.89, 37.94),
    County::new("06053", "Monterey", -121.24, 36.22),
    County::new("06055", "Napa", -122.33, 38.5),
    County::new("06057", "Nevada", -120.77, 39.3),
    County::new("06059", "Orange", -117.76, 33.68),
    County::new("06061", "Placer", -120.71, 39.06),
    County::new("06063", "Plumas", -120.84, 40.0),
    County::new("06065", "Riverside", -116.47, 33.74),
    County::new("06067", "Sacramento", -121.35, 38.45),
    County::new("06069", "San Benito", -121.08, 36.6),
    County::new("06071", "San Bernardino", -116.18, 34.84),
    County::new("06073", "San Diego", -116.74, 33.03),
    County::new("06075", "San Francisco", -122.44, 37.76),
    County::new("06077", "San Joaquin", -121.27, 37.93),
    County::new("06079", "San Luis Obispo", -120.44, 35.38),
    County::new("06081", "San Mateo", -122.33, 37.43),
    County::new("06083", "Santa Barbara", -119.97, 34.54),
    County::new("06085", "Santa Clara", -121.7, 37.23),
    County::new("06087", "Santa Cruz", -122.01, 37.03),
    County::new("06089", "Shasta", -122.04, 40.76),
    County::new("06091", "Sierra", -120.52, 39.58),
    County::new("06093", "Siskiyou", -122.54, 41.59),
    County::new("06095", "Solano", -121.95, 38.27),
    County::new("06097", "Sonoma", -122.84, 38.53),
    County::new("06099", "Stanislaus", -120.99, 37.56),
    County::new("06101", "Sutter", -121.69, 39.03),
    County::new("06103", "Tehama", -122.24, 40.13),
    County::new("06105", "Trinity", -123.07, 40.65),
    County::new("06107", "Tulare", -118.8, 36.21),
    County::new("06109", "Tuolumne", -120.23, 38.03),
    County::new("06111", "Ventura", -119.03, 34.36),
    County::new("06113", "Yolo", -121.9, 38.73),
    County::new("06115", "Yuba", -121.44, 39.14),
];

/// Static lookup of region centroids and names.
///
/// Region identifiers are 5-digit FIPS codes. Lookups accept the unpadded
/// integer form as well (`"6037"` resolves like `"06037"`).
#[derive(Debug, Copy, Clone)]
pub struct GeometryCache {
    counties: &'static [County],
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::california()
    }
}

impl GeometryCache {
    pub fn california() -> Self {
        Self {
            counties: &CALIFORNIA_COUNTIES,
        }
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    pub fn county(&self, id: &str) -> Option<&'static County> {
        let id = normalize_region_id(id)?;
        let counties: &'static [County] = self.counties;
        counties
            .binary_search_by(|c| c.fips.cmp(id.as_str()))
            .ok()
            .map(|i| &counties[i])
    }

    pub fn centroid(&self, id: &str) -> Option<LngLat> {
        self.county(id).map(|c| c.centroid)
    }

    pub fn name(&self, id: &str) -> Option<&'static str> {
        self.county(id).map(|c| c.name)
    }

    /// Reverse lookup by display name (exact, case-sensitive).
    pub fn fips_for_name(&self, name: &str) -> Option<&'static str> {
        self.counties
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.fips)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static County> + '_ {
        let counties: &'static [County] = self.counties;
        counties.iter()
    }
}

/// Canonicalizes a region id into the zero-padded 5-digit form.
///
/// Returns `None` for anything that is not 1..=5 ASCII digits.
pub fn normalize_region_id(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() || id.len() > 5 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{id:0>5}"))
}
