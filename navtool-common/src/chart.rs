use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chart purpose / scale class, taken from the usage-band digit of a cell name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Overview,
    General,
    Coastal,
    Approach,
    Harbor,
    Berthing,
}

impl ChartType {
    /// All chart types, ordered from least to most detailed.
    pub const ALL: [ChartType; 6] = [
        ChartType::Overview,
        ChartType::General,
        ChartType::Coastal,
        ChartType::Approach,
        ChartType::Harbor,
        ChartType::Berthing,
    ];

    /// Map a usage-band digit (1-6) to a chart type.
    pub fn from_usage_band(band: u8) -> Option<Self> {
        match band {
            1 => Some(ChartType::Overview),
            2 => Some(ChartType::General),
            3 => Some(ChartType::Coastal),
            4 => Some(ChartType::Approach),
            5 => Some(ChartType::Harbor),
            6 => Some(ChartType::Berthing),
            _ => None,
        }
    }

    pub fn usage_band(&self) -> u8 {
        match self {
            ChartType::Overview => 1,
            ChartType::General => 2,
            ChartType::Coastal => 3,
            ChartType::Approach => 4,
            ChartType::Harbor => 5,
            ChartType::Berthing => 6,
        }
    }

    /// Approximate scale denominator used when the catalog gives none.
    pub fn default_scale(&self) -> u32 {
        match self {
            ChartType::Overview => 3_000_000,
            ChartType::General => 1_000_000,
            ChartType::Coastal => 200_000,
            ChartType::Approach => 50_000,
            ChartType::Harbor => 20_000,
            ChartType::Berthing => 5_000,
        }
    }

    /// Classify an explicit scale denominator into a scale band.
    ///
    /// Ranges follow the NOAA ENC Direct scale bands:
    /// berthing ≤ 5,000 < harbor ≤ 50,000 < approach ≤ 150,000 <
    /// coastal ≤ 600,000 < general ≤ 1,500,000 < overview.
    pub fn from_scale(scale: u32) -> Self {
        match scale {
            0..=5_000 => ChartType::Berthing,
            5_001..=50_000 => ChartType::Harbor,
            50_001..=150_000 => ChartType::Approach,
            150_001..=600_000 => ChartType::Coastal,
            600_001..=1_500_000 => ChartType::General,
            _ => ChartType::Overview,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Overview => "overview",
            ChartType::General => "general",
            ChartType::Coastal => "coastal",
            ChartType::Approach => "approach",
            ChartType::Harbor => "harbor",
            ChartType::Berthing => "berthing",
        }
    }
}

impl std::fmt::Display for ChartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overview" => Ok(ChartType::Overview),
            "general" => Ok(ChartType::General),
            "coastal" => Ok(ChartType::Coastal),
            "approach" => Ok(ChartType::Approach),
            "harbor" | "harbour" => Ok(ChartType::Harbor),
            "berthing" => Ok(ChartType::Berthing),
            _ => Err(format!("Unknown chart type: {}", s)),
        }
    }
}

/// Where a chart record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartSource {
    #[default]
    Noaa,
    Imported,
}

/// Lifecycle status reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartStatus {
    #[default]
    Current,
    Superseded,
    Cancelled,
}

impl ChartStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "cancelled" | "canceled" | "withdrawn" => ChartStatus::Cancelled,
            "superseded" | "replaced" => ChartStatus::Superseded,
            _ => ChartStatus::Current,
        }
    }
}

/// Geographic bounding box in decimal degrees.
///
/// `north >= south` always holds for valid bounds. Boxes crossing the
/// antimeridian (`west > east`) are not represented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeographicBounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self { north, south, east, west }
    }

    /// Build the smallest box containing every `(latitude, longitude)` point.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut bounds: Option<Self> = None;
        for (lat, lon) in points {
            if !lat.is_finite() || !lon.is_finite() {
                continue;
            }
            bounds = Some(match bounds {
                None => Self::new(lat, lat, lon, lon),
                Some(b) => Self::new(
                    b.north.max(lat),
                    b.south.min(lat),
                    b.east.max(lon),
                    b.west.min(lon),
                ),
            });
        }
        bounds
    }

    /// Finite, inside WGS84 ranges, and with a positive extent on both axes.
    pub fn is_valid(&self) -> bool {
        let finite = [self.north, self.south, self.east, self.west]
            .iter()
            .all(|v| v.is_finite());
        finite
            && self.north <= 90.0
            && self.south >= -90.0
            && self.east <= 180.0
            && self.west >= -180.0
            && self.north > self.south
            && self.east > self.west
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Planar area in square degrees.
    pub fn area_deg2(&self) -> f64 {
        (self.width() * self.height()).max(0.0)
    }

    /// Center as `(latitude, longitude)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.north + self.south) / 2.0, (self.east + self.west) / 2.0)
    }

    pub fn contains_point(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }

    /// Whether the two boxes share any point (touching edges count).
    pub fn intersects(&self, other: &GeographicBounds) -> bool {
        self.south <= other.north
            && self.north >= other.south
            && self.west <= other.east
            && self.east >= other.west
    }

    pub fn contains(&self, other: &GeographicBounds) -> bool {
        other.north <= self.north
            && other.south >= self.south
            && other.east <= self.east
            && other.west >= self.west
    }

    pub fn union(&self, other: &GeographicBounds) -> GeographicBounds {
        GeographicBounds::new(
            self.north.max(other.north),
            self.south.min(other.south),
            self.east.max(other.east),
            self.west.min(other.west),
        )
    }
}

impl std::fmt::Display for GeographicBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[N {:.4}, S {:.4}, E {:.4}, W {:.4}]",
            self.north, self.south, self.east, self.west
        )
    }
}

/// A chart cell from the NOAA catalog.
///
/// Charts are replaced wholesale on refresh, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Canonical cell ID, e.g. `US5WA50M`
    pub id: String,

    pub title: String,

    /// Scale denominator (`20000` for 1:20,000)
    pub scale: u32,

    pub bounds: GeographicBounds,

    pub last_update: DateTime<Utc>,

    /// Best-effort region label derived from the bounds' centroid
    #[serde(default = "default_state")]
    pub state: String,

    pub chart_type: ChartType,

    #[serde(default)]
    pub source: ChartSource,

    #[serde(default)]
    pub status: ChartStatus,

    /// Catalog attributes kept verbatim (edition, update number, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_state() -> String {
    "Unknown".to_string()
}

impl Chart {
    /// Case-insensitive match against the title or the cell ID.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query) || self.id.to_lowercase().contains(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_band_round_trip() {
        for chart_type in ChartType::ALL {
            assert_eq!(ChartType::from_usage_band(chart_type.usage_band()), Some(chart_type));
        }
        assert_eq!(ChartType::from_usage_band(0), None);
        assert_eq!(ChartType::from_usage_band(7), None);
    }

    #[test]
    fn test_from_scale_bands() {
        assert_eq!(ChartType::from_scale(5_000), ChartType::Berthing);
        assert_eq!(ChartType::from_scale(20_000), ChartType::Harbor);
        assert_eq!(ChartType::from_scale(80_000), ChartType::Approach);
        assert_eq!(ChartType::from_scale(250_000), ChartType::Coastal);
        assert_eq!(ChartType::from_scale(1_200_000), ChartType::General);
        assert_eq!(ChartType::from_scale(3_000_000), ChartType::Overview);
    }

    #[test]
    fn test_chart_type_from_str() {
        assert_eq!("Harbour".parse::<ChartType>().unwrap(), ChartType::Harbor);
        assert!("lake".parse::<ChartType>().is_err());
    }

    #[test]
    fn test_bounds_from_points() {
        let bounds = GeographicBounds::from_points(vec![
            (37.7, -122.5),
            (37.9, -122.3),
            (f64::NAN, 0.0),
        ])
        .unwrap();
        assert_eq!(bounds, GeographicBounds::new(37.9, 37.7, -122.3, -122.5));
        assert!(GeographicBounds::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_bounds_validity() {
        assert!(GeographicBounds::new(48.0, 47.0, -122.0, -123.0).is_valid());
        assert!(!GeographicBounds::new(47.0, 47.0, -122.0, -123.0).is_valid());
        assert!(!GeographicBounds::new(47.0, 48.0, -122.0, -123.0).is_valid());
        assert!(!GeographicBounds::new(95.0, 48.0, -122.0, -123.0).is_valid());
    }

    #[test]
    fn test_bounds_intersection_and_containment() {
        let a = GeographicBounds::new(48.0, 47.0, -122.0, -123.0);
        let b = GeographicBounds::new(47.5, 46.0, -121.0, -122.5);
        let c = GeographicBounds::new(10.0, 9.0, 1.0, 0.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.contains_point(47.5, -122.5));
        assert!(!a.contains_point(46.5, -122.5));
        assert_eq!(a.union(&b), GeographicBounds::new(48.0, 46.0, -121.0, -123.0));
    }

    #[test]
    fn test_matches_query() {
        let chart = Chart {
            id: "US5WA50M".to_string(),
            title: "Seattle Harbor".to_string(),
            scale: 20_000,
            bounds: GeographicBounds::new(47.7, 47.5, -122.2, -122.5),
            last_update: Utc::now(),
            state: "Washington".to_string(),
            chart_type: ChartType::Harbor,
            source: ChartSource::Noaa,
            status: ChartStatus::Current,
            metadata: BTreeMap::new(),
        };
        assert!(chart.matches_query("seattle"));
        assert!(chart.matches_query("us5wa"));
        assert!(!chart.matches_query("boston"));
    }
}
