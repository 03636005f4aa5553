///! S-57 features to the maritime feature model
use geo::{Coord, LineString, Simplify};
use navtool_common::{
    AreaFeature, AttributeValue, DepthContour, LatLng, LineFeature, MaritimeFeature,
    MaritimeFeatureType, PointFeature,
};
use std::collections::BTreeMap;

use super::types::{S57Feature, S57Geometry, Sounding};

pub const ATTR_ORIGINAL_CODE: &str = "original_s57_code";
pub const ATTR_ORIGINAL_ACRONYM: &str = "original_s57_acronym";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdapterOptions {
    /// Douglas-Peucker tolerance in degrees; `None` keeps every vertex
    pub simplify_tolerance: Option<f64>,
}

/// Maritime type for an S-57 object class; `None` for classes not rendered.
pub fn feature_type_for(acronym: &str) -> Option<MaritimeFeatureType> {
    let feature_type = match acronym {
        "LIGHTS" => MaritimeFeatureType::Lighthouse,
        "BOYCAR" | "BOYINB" | "BOYISD" | "BOYLAT" | "BOYSAW" | "BOYSPP" => {
            MaritimeFeatureType::Buoy
        }
        "BCNCAR" | "BCNISD" | "BCNLAT" | "BCNSAW" | "BCNSPP" => MaritimeFeatureType::Beacon,
        "DEPARE" | "DRGARE" => MaritimeFeatureType::DepthArea,
        "DEPCNT" => MaritimeFeatureType::DepthContour,
        "SOUNDG" => MaritimeFeatureType::Sounding,
        "COALNE" => MaritimeFeatureType::Shoreline,
        "SLCONS" => MaritimeFeatureType::ShorelineConstruction,
        "LNDARE" => MaritimeFeatureType::Landmass,
        "LNDMRK" => MaritimeFeatureType::Landmark,
        "WRECKS" => MaritimeFeatureType::Wreck,
        "OBSTRN" => MaritimeFeatureType::Obstruction,
        "UWTROC" => MaritimeFeatureType::Rock,
        "ACHARE" => MaritimeFeatureType::Anchorage,
        "RESARE" => MaritimeFeatureType::RestrictedArea,
        "FAIRWY" => MaritimeFeatureType::Fairway,
        _ => return None,
    };
    Some(feature_type)
}

/// Pure conversion: the same input always yields the same features and IDs.
#[derive(Debug, Clone, Default)]
pub struct S57MaritimeAdapter {
    options: AdapterOptions,
}

impl S57MaritimeAdapter {
    pub fn new(options: AdapterOptions) -> Self {
        Self { options }
    }

    pub fn convert(&self, features: &[S57Feature]) -> Vec<MaritimeFeature> {
        self.convert_counted(features).0
    }

    /// Converted features plus the number of S-57 features that produced none.
    pub fn convert_counted(&self, features: &[S57Feature]) -> (Vec<MaritimeFeature>, usize) {
        let mut out = Vec::with_capacity(features.len());
        let mut dropped = 0usize;
        for feature in features {
            let before = out.len();
            self.convert_feature(feature, &mut out);
            if out.len() == before {
                dropped += 1;
            }
        }
        tracing::debug!(
            "Converted {} S-57 features into {} maritime features ({} dropped)",
            features.len(),
            out.len(),
            dropped
        );
        (out, dropped)
    }

    fn convert_feature(&self, feature: &S57Feature, out: &mut Vec<MaritimeFeature>) {
        let Some(feature_type) = feature_type_for(&feature.acronym) else {
            tracing::trace!("No maritime type for {} ({})", feature.acronym, feature.record_id);
            return;
        };
        let base_id = feature_id(feature);
        let attributes = provenance(feature);

        match &feature.geometry {
            S57Geometry::Point(position) => {
                if position.is_valid() {
                    out.push(MaritimeFeature::Point(PointFeature {
                        id: base_id,
                        feature_type,
                        position: *position,
                        label: feature.attribute_text("OBJNAM"),
                        attributes,
                    }));
                }
            }
            S57Geometry::Soundings(soundings) => {
                out.extend(sounding_points(&base_id, soundings, &attributes));
            }
            S57Geometry::Line(parts) => {
                let parts: Vec<Vec<LatLng>> = parts
                    .iter()
                    .filter_map(|part| self.line_part(part))
                    .collect();
                let single = parts.len() == 1;
                for (i, coordinates) in parts.into_iter().enumerate() {
                    let id = if single { base_id.clone() } else { format!("{}_{}", base_id, i) };
                    out.push(match feature_type {
                        MaritimeFeatureType::DepthContour => {
                            MaritimeFeature::DepthContour(DepthContour {
                                id,
                                coordinates,
                                depth: feature.attribute_f64("VALDCO").unwrap_or(0.0),
                                attributes: attributes.clone(),
                            })
                        }
                        _ => MaritimeFeature::Line(LineFeature {
                            id,
                            feature_type,
                            coordinates,
                            attributes: attributes.clone(),
                        }),
                    });
                }
            }
            S57Geometry::Area(rings) => {
                let rings: Vec<Vec<LatLng>> =
                    rings.iter().filter_map(|ring| self.ring(ring)).collect();
                if rings.is_empty() {
                    return;
                }
                let mut attributes = attributes;
                if feature_type == MaritimeFeatureType::DepthArea {
                    depth_range(feature, &mut attributes);
                }
                out.push(MaritimeFeature::Area(AreaFeature {
                    id: base_id,
                    feature_type,
                    rings,
                    attributes,
                }));
            }
            S57Geometry::None => {}
        }
    }

    fn line_part(&self, part: &[LatLng]) -> Option<Vec<LatLng>> {
        let valid: Vec<LatLng> = part.iter().copied().filter(LatLng::is_valid).collect();
        if valid.len() < 2 {
            return None;
        }
        Some(self.simplify(valid, 2))
    }

    fn ring(&self, ring: &[LatLng]) -> Option<Vec<LatLng>> {
        let mut valid: Vec<LatLng> = ring.iter().copied().filter(LatLng::is_valid).collect();
        if let Some(first) = valid.first().copied() {
            if valid.last() != Some(&first) {
                valid.push(first);
            }
        }
        if valid.len() < 4 {
            return None;
        }
        Some(self.simplify(valid, 4))
    }

    /// Keeps the input when simplification would leave fewer than `min_points`.
    fn simplify(&self, coords: Vec<LatLng>, min_points: usize) -> Vec<LatLng> {
        let Some(tolerance) = self.options.simplify_tolerance.filter(|t| *t > 0.0) else {
            return coords;
        };
        let line: LineString<f64> = coords
            .iter()
            .map(|p| Coord { x: p.longitude, y: p.latitude })
            .collect();
        let simplified: Vec<LatLng> = line
            .simplify(&tolerance)
            .coords()
            .map(|c| LatLng::new(c.y, c.x))
            .collect();
        if simplified.len() < min_points {
            coords
        } else {
            simplified
        }
    }
}

/// `<acronym>_<agency>_<fidn>_<fids>` from the feature object identifier,
/// which is unique across cells. Features without one fall back to
/// `<acronym>_<rcid>`, which is only unique within a cell.
fn feature_id(feature: &S57Feature) -> String {
    let acronym = feature.acronym.to_lowercase();
    match &feature.object_id {
        Some(foid) => format!(
            "{}_{}_{}_{}",
            acronym, foid.agency, foid.id_number, foid.id_subdivision
        ),
        None => format!("{}_{}", acronym, feature.record_id),
    }
}

fn provenance(feature: &S57Feature) -> BTreeMap<String, AttributeValue> {
    let mut attributes = feature.attributes.clone();
    attributes.insert(
        ATTR_ORIGINAL_CODE.to_string(),
        AttributeValue::Integer(feature.object_code as i64),
    );
    attributes.insert(
        ATTR_ORIGINAL_ACRONYM.to_string(),
        AttributeValue::Text(feature.acronym.clone()),
    );
    attributes
}

fn depth_range(feature: &S57Feature, attributes: &mut BTreeMap<String, AttributeValue>) {
    if let Some(min) = feature.attribute_f64("DRVAL1") {
        attributes.insert("min_depth".to_string(), AttributeValue::Float(min));
    }
    if let Some(max) = feature.attribute_f64("DRVAL2") {
        attributes.insert("max_depth".to_string(), AttributeValue::Float(max));
    }
}

fn sounding_points<'a>(
    base_id: &'a str,
    soundings: &'a [Sounding],
    attributes: &'a BTreeMap<String, AttributeValue>,
) -> impl Iterator<Item = MaritimeFeature> + 'a {
    soundings
        .iter()
        .enumerate()
        .filter(|(_, s)| s.position.is_valid() && s.depth.is_finite())
        .map(move |(i, sounding)| {
            let mut attributes = attributes.clone();
            attributes.insert("depth".to_string(), AttributeValue::Float(sounding.depth));
            MaritimeFeature::Point(PointFeature {
                id: format!("{}_{}", base_id, i),
                feature_type: MaritimeFeatureType::Sounding,
                position: sounding.position,
                label: Some(format!("{:.1}", sounding.depth)),
                attributes,
            })
        })
}
