///! Reference bounds for the supported coastal states and territories
use geo::{Coord, LineString, Polygon};
use navtool_common::GeographicBounds;
use strsim::jaro_winkler;

use crate::error::{ChartError, Result};

/// Minimum similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// A named region with fixed rectangular reference bounds
#[derive(Debug, Clone, PartialEq)]
pub struct StateRegion {
    pub name: &'static str,
    /// Postal abbreviation, also used as the region code in cell names
    pub abbreviation: &'static str,
    pub bounds: GeographicBounds,
}

impl StateRegion {
    /// Closed rectangle in (lon, lat) order, counter-clockwise from south-west.
    pub fn polygon(&self) -> Polygon<f64> {
        bounds_polygon(&self.bounds)
    }
}

/// Rectangle for a bounding box, x = longitude and y = latitude.
pub fn bounds_polygon(bounds: &GeographicBounds) -> Polygon<f64> {
    let exterior = LineString::from(vec![
        Coord { x: bounds.west, y: bounds.south },
        Coord { x: bounds.east, y: bounds.south },
        Coord { x: bounds.east, y: bounds.north },
        Coord { x: bounds.west, y: bounds.north },
        Coord { x: bounds.west, y: bounds.south },
    ]);
    Polygon::new(exterior, Vec::new())
}

const fn region(
    name: &'static str,
    abbreviation: &'static str,
    north: f64,
    south: f64,
    east: f64,
    west: f64,
) -> StateRegion {
    StateRegion {
        name,
        abbreviation,
        bounds: GeographicBounds {
            north,
            south,
            east,
            west,
        },
    }
}

/// Coarse rectangles, not political boundaries. Order matters: centroid
/// lookups return the first containing entry.
const US_COASTAL_REGIONS: [StateRegion; 17] = [
    region("California", "CA", 42.0, 32.5, -114.1, -124.5),
    region("Oregon", "OR", 46.3, 41.9, -116.5, -124.6),
    region("Washington", "WA", 49.0, 45.5, -116.9, -124.8),
    // West of the antimeridian (Near Islands) is not representable
    region("Alaska", "AK", 71.5, 51.2, -129.9, -179.9),
    region("Hawaii", "HI", 22.3, 18.9, -154.8, -160.3),
    region("Texas", "TX", 36.5, 25.8, -93.5, -106.6),
    region("Louisiana", "LA", 33.0, 28.9, -88.8, -94.0),
    region("Florida", "FL", 31.0, 24.4, -80.0, -87.6),
    region("Georgia", "GA", 35.0, 30.3, -80.8, -85.6),
    region("South Carolina", "SC", 35.2, 32.0, -78.5, -83.4),
    region("North Carolina", "NC", 36.6, 33.8, -75.4, -84.3),
    region("Virginia", "VA", 39.5, 36.5, -75.2, -83.7),
    region("Maryland", "MD", 39.7, 37.9, -75.0, -79.5),
    region("New York", "NY", 45.0, 40.5, -71.8, -79.8),
    region("Massachusetts", "MA", 42.9, 41.2, -69.9, -73.5),
    region("Maine", "ME", 47.5, 43.0, -66.9, -71.1),
    region("Puerto Rico", "PR", 18.5, 17.9, -65.2, -67.3),
];

/// Immutable lookup table, built once and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct StateRegionTable {
    regions: Vec<StateRegion>,
}

impl StateRegionTable {
    pub fn new(regions: Vec<StateRegion>) -> Self {
        Self { regions }
    }

    /// The built-in US coastal table.
    pub fn us_coastal() -> Self {
        Self::new(US_COASTAL_REGIONS.to_vec())
    }

    pub fn regions(&self) -> &[StateRegion] {
        &self.regions
    }

    /// Supported state names in table order.
    pub fn names(&self) -> Vec<&'static str> {
        self.regions.iter().map(|r| r.name).collect()
    }

    /// Case-insensitive lookup by full name or postal abbreviation.
    pub fn lookup(&self, name: &str) -> Option<&StateRegion> {
        let wanted = name.trim();
        if wanted.is_empty() {
            return None;
        }
        self.regions.iter().find(|r| {
            r.name.eq_ignore_ascii_case(wanted) || r.abbreviation.eq_ignore_ascii_case(wanted)
        })
    }

    /// Like [`lookup`](Self::lookup) but rejects unknown names with a suggestion.
    pub fn require(&self, name: &str) -> Result<&StateRegion> {
        if name.trim().is_empty() {
            return Err(ChartError::InvalidArgument("state name is empty".to_string()));
        }
        self.lookup(name).ok_or_else(|| ChartError::UnsupportedState {
            name: name.trim().to_string(),
            suggestion: self.suggest(name).map(str::to_string),
        })
    }

    /// Closest supported name by Jaro-Winkler similarity, if close enough.
    pub fn suggest(&self, name: &str) -> Option<&'static str> {
        let query = name.trim().to_lowercase();
        self.regions
            .iter()
            .map(|r| (jaro_winkler(&query, &r.name.to_lowercase()), r.name))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name)
    }

    /// First region (in table order) containing the point.
    pub fn region_containing(&self, latitude: f64, longitude: f64) -> Option<&StateRegion> {
        self.regions
            .iter()
            .find(|r| r.bounds.contains_point(latitude, longitude))
    }
}

impl Default for StateRegionTable {
    fn default() -> Self {
        Self::us_coastal()
    }
}
