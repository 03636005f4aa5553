///! Decoded S-57 feature model
use navtool_common::{AttributeValue, GeographicBounds, LatLng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geometric primitive declared by a feature record (FRID/PRIM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Point,
    Line,
    Area,
    None,
}

impl Primitive {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Primitive::Point,
            2 => Primitive::Line,
            3 => Primitive::Area,
            _ => Primitive::None,
        }
    }
}

/// A depth measurement at a position, in the dataset's depth units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sounding {
    pub position: LatLng,
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum S57Geometry {
    Point(LatLng),
    /// SOUNDG clusters (3-D point sets)
    Soundings(Vec<Sounding>),
    /// One or more polyline parts
    Line(Vec<Vec<LatLng>>),
    /// Closed rings; exterior rings first, then interiors
    Area(Vec<Vec<LatLng>>),
    None,
}

impl S57Geometry {
    pub fn positions(&self) -> Vec<LatLng> {
        match self {
            S57Geometry::Point(p) => vec![*p],
            S57Geometry::Soundings(soundings) => soundings.iter().map(|s| s.position).collect(),
            S57Geometry::Line(parts) | S57Geometry::Area(parts) => {
                parts.iter().flatten().copied().collect()
            }
            S57Geometry::None => Vec::new(),
        }
    }

    pub fn bounds(&self) -> Option<GeographicBounds> {
        GeographicBounds::from_points(
            self.positions()
                .into_iter()
                .map(|p| (p.latitude, p.longitude)),
        )
    }

    pub fn is_empty(&self) -> bool {
        match self {
            S57Geometry::Point(_) => false,
            S57Geometry::Soundings(soundings) => soundings.is_empty(),
            S57Geometry::Line(parts) | S57Geometry::Area(parts) => {
                parts.iter().all(|part| part.is_empty())
            }
            S57Geometry::None => true,
        }
    }
}

/// Feature object identifier (FOID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureObjectId {
    pub agency: u16,
    pub id_number: u32,
    pub id_subdivision: u16,
}

/// One decoded feature record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S57Feature {
    /// FRID record ID, unique within the dataset
    pub record_id: u32,
    /// Object class code (OBJL)
    pub object_code: u16,
    /// Object class acronym, `UNKNOWN` when the code is not in the catalogue
    pub acronym: String,
    pub primitive: Primitive,
    pub geometry: S57Geometry,
    /// Attribute acronym to typed value
    pub attributes: BTreeMap<String, AttributeValue>,
    pub object_id: Option<FeatureObjectId>,
}

impl S57Feature {
    pub fn attribute(&self, acronym: &str) -> Option<&AttributeValue> {
        self.attributes.get(acronym)
    }

    pub fn attribute_f64(&self, acronym: &str) -> Option<f64> {
        self.attribute(acronym).and_then(AttributeValue::as_f64)
    }

    pub fn attribute_text(&self, acronym: &str) -> Option<String> {
        self.attribute(acronym).map(|v| v.to_string())
    }
}

/// Dataset header values (DSID / DSPM)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S57Metadata {
    pub dataset_name: Option<String>,
    pub edition: Option<String>,
    pub update_number: Option<String>,
    pub update_date: Option<String>,
    pub issue_date: Option<String>,
    pub s57_edition: Option<String>,
    pub producing_agency: Option<u16>,
    pub comment: Option<String>,
    /// Compilation scale denominator (CSCL)
    pub compilation_scale: Option<u32>,
    pub horizontal_datum: Option<u8>,
    pub vertical_datum: Option<u8>,
    pub sounding_datum: Option<u8>,
    /// Coordinate multiplication factor (COMF)
    pub coordinate_multiplier: u32,
    /// 3-D (sounding) multiplication factor (SOMF)
    pub sounding_multiplier: u32,
    pub feature_record_count: usize,
    pub vector_record_count: usize,
}

/// Output of [`S57Parser::parse`](super::parser::S57Parser::parse)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S57ParseResult {
    pub features: Vec<S57Feature>,
    /// Union of all feature geometries; `None` when nothing has geometry
    pub bounds: Option<GeographicBounds>,
    pub metadata: S57Metadata,
}
