use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chart::GeographicBounds;

/// WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Typed attribute value shared by S-57 records and maritime features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    List(Vec<i64>),
    Text(String),
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::List(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            AttributeValue::Float(v) => Some(*v as i64),
            AttributeValue::List(values) => values.first().copied(),
            AttributeValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::List(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// What a maritime feature represents on the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritimeFeatureType {
    Lighthouse,
    Buoy,
    Beacon,
    DepthArea,
    DepthContour,
    Sounding,
    Shoreline,
    ShorelineConstruction,
    Landmass,
    Landmark,
    Wreck,
    Obstruction,
    Rock,
    Anchorage,
    RestrictedArea,
    Fairway,
}

impl MaritimeFeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritimeFeatureType::Lighthouse => "lighthouse",
            MaritimeFeatureType::Buoy => "buoy",
            MaritimeFeatureType::Beacon => "beacon",
            MaritimeFeatureType::DepthArea => "depth_area",
            MaritimeFeatureType::DepthContour => "depth_contour",
            MaritimeFeatureType::Sounding => "sounding",
            MaritimeFeatureType::Shoreline => "shoreline",
            MaritimeFeatureType::ShorelineConstruction => "shoreline_construction",
            MaritimeFeatureType::Landmass => "landmass",
            MaritimeFeatureType::Landmark => "landmark",
            MaritimeFeatureType::Wreck => "wreck",
            MaritimeFeatureType::Obstruction => "obstruction",
            MaritimeFeatureType::Rock => "rock",
            MaritimeFeatureType::Anchorage => "anchorage",
            MaritimeFeatureType::RestrictedArea => "restricted_area",
            MaritimeFeatureType::Fairway => "fairway",
        }
    }
}

impl std::fmt::Display for MaritimeFeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    pub id: String,
    pub feature_type: MaritimeFeatureType,
    pub position: LatLng,
    /// Display label (object name, depth value, ...)
    pub label: Option<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFeature {
    pub id: String,
    pub feature_type: MaritimeFeatureType,
    pub coordinates: Vec<LatLng>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaFeature {
    pub id: String,
    pub feature_type: MaritimeFeatureType,
    /// First ring is the exterior boundary, the rest are holes
    pub rings: Vec<Vec<LatLng>>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthContour {
    pub id: String,
    pub coordinates: Vec<LatLng>,
    /// Contour depth in meters
    pub depth: f64,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Feature consumed by the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MaritimeFeature {
    Point(PointFeature),
    Line(LineFeature),
    Area(AreaFeature),
    DepthContour(DepthContour),
}

impl MaritimeFeature {
    pub fn id(&self) -> &str {
        match self {
            MaritimeFeature::Point(f) => &f.id,
            MaritimeFeature::Line(f) => &f.id,
            MaritimeFeature::Area(f) => &f.id,
            MaritimeFeature::DepthContour(f) => &f.id,
        }
    }

    pub fn feature_type(&self) -> MaritimeFeatureType {
        match self {
            MaritimeFeature::Point(f) => f.feature_type,
            MaritimeFeature::Line(f) => f.feature_type,
            MaritimeFeature::Area(f) => f.feature_type,
            MaritimeFeature::DepthContour(_) => MaritimeFeatureType::DepthContour,
        }
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        match self {
            MaritimeFeature::Point(f) => &f.attributes,
            MaritimeFeature::Line(f) => &f.attributes,
            MaritimeFeature::Area(f) => &f.attributes,
            MaritimeFeature::DepthContour(f) => &f.attributes,
        }
    }

    /// Every vertex of the feature, in order.
    pub fn positions(&self) -> Vec<LatLng> {
        match self {
            MaritimeFeature::Point(f) => vec![f.position],
            MaritimeFeature::Line(f) => f.coordinates.clone(),
            MaritimeFeature::Area(f) => f.rings.iter().flatten().copied().collect(),
            MaritimeFeature::DepthContour(f) => f.coordinates.clone(),
        }
    }

    pub fn bounds(&self) -> Option<GeographicBounds> {
        GeographicBounds::from_points(
            self.positions()
                .into_iter()
                .map(|p| (p.latitude, p.longitude)),
        )
    }
}
