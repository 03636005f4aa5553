///! Catalog feature (GeoJSON / ArcGIS JSON) to `Chart` conversion
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use navtool_common::{Chart, ChartSource, ChartStatus, ChartType, GeographicBounds};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::cell_name;
use crate::error::{ChartError, Result};
use crate::module::region::StateRegionTable;

const CELL_NAME_FIELDS: [&str; 4] = ["DSNM", "CELL_NAME", "CELLNAME", "name"];
const TITLE_FIELDS: [&str; 4] = ["TITLE", "CHART_TITLE", "title", "LNAM"];
const SCALE_FIELDS: [&str; 4] = ["SCALE", "CSCALE", "CSCL", "scale"];
const DATE_FIELDS: [&str; 2] = ["DATE_UPD", "SORDAT"];
const STATUS_FIELDS: [&str; 2] = ["STATUS", "status"];

/// Used when neither the cell name nor an explicit scale classifies the chart
const FALLBACK_CHART_TYPE: ChartType = ChartType::General;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParserOptions {
    /// Guess bounds from the cell name's region code when a record has no
    /// geometry, instead of skipping it.
    pub estimate_missing_bounds: bool,
}

/// Outcome of converting a whole feature collection
#[derive(Debug, Default)]
pub struct ParseReport {
    pub charts: Vec<Chart>,
    pub parsed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ParseReport {
    pub fn total(&self) -> usize {
        self.parsed + self.skipped + self.failed
    }
}

pub struct MetadataParser {
    states: Arc<StateRegionTable>,
    options: ParserOptions,
}

impl MetadataParser {
    pub fn new(states: Arc<StateRegionTable>) -> Self {
        Self::with_options(states, ParserOptions::default())
    }

    pub fn with_options(states: Arc<StateRegionTable>, options: ParserOptions) -> Self {
        Self { states, options }
    }

    /// Convert one catalog feature.
    ///
    /// `Ok(None)` means the record was skipped (no name, no usable bounds).
    /// `Err` is returned for records that are not features at all.
    pub fn parse_feature(&self, feature: &Value) -> Result<Option<Chart>> {
        let attributes = feature_attributes(feature)?;

        let Some(raw_name) = first_string(attributes, &CELL_NAME_FIELDS) else {
            tracing::debug!("Skipping catalog record without a cell name");
            return Ok(None);
        };
        let id = cell_name::normalize(&raw_name);
        if id.is_empty() {
            tracing::debug!("Skipping catalog record with an empty cell name");
            return Ok(None);
        }

        let bounds = match extract_bounds(feature.get("geometry")) {
            Some(bounds) => bounds,
            None if self.options.estimate_missing_bounds => {
                match cell_name::estimated_bounds(&id, &self.states) {
                    Some(bounds) => {
                        tracing::debug!("Estimated bounds for {} from its region code", id);
                        bounds
                    }
                    None => {
                        tracing::debug!("Skipping {}: no geometry and no known region code", id);
                        return Ok(None);
                    }
                }
            }
            None => {
                tracing::debug!("Skipping {}: no usable geometry", id);
                return Ok(None);
            }
        };

        let explicit_scale = SCALE_FIELDS
            .iter()
            .filter_map(|key| attributes.get(*key))
            .find_map(parse_scale);
        let chart_type = cell_name::chart_type(&id)
            .or_else(|| explicit_scale.map(ChartType::from_scale))
            .unwrap_or(FALLBACK_CHART_TYPE);
        let scale = explicit_scale.unwrap_or_else(|| chart_type.default_scale());

        let title = first_string(attributes, &TITLE_FIELDS)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.clone());

        let (lat, lon) = bounds.center();
        let state = self
            .states
            .region_containing(lat, lon)
            .map(|r| r.name.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let last_update = DATE_FIELDS
            .iter()
            .filter_map(|key| attributes.get(*key))
            .find_map(parse_date)
            .unwrap_or_else(Utc::now);

        let status = first_string(attributes, &STATUS_FIELDS)
            .map(|s| ChartStatus::parse(&s))
            .unwrap_or_default();

        Ok(Some(Chart {
            id,
            title,
            scale,
            bounds,
            last_update,
            state,
            chart_type,
            source: ChartSource::Noaa,
            status,
            metadata: scalar_metadata(attributes),
        }))
    }

    /// Convert every feature, isolating per-record failures.
    pub fn parse_features(&self, features: &[Value]) -> ParseReport {
        let mut report = ParseReport::default();

        for (index, feature) in features.iter().enumerate() {
            match self.parse_feature(feature) {
                Ok(Some(chart)) => {
                    report.parsed += 1;
                    report.charts.push(chart);
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!("Failed to parse catalog feature #{}: {}", index, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Parsed catalog: {} charts, {} skipped, {} failed",
            report.parsed,
            report.skipped,
            report.failed
        );
        report
    }

    /// Convert a `{"features": [...]}` document.
    pub fn parse_feature_collection(&self, collection: &Value) -> Result<ParseReport> {
        let features = collection
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ChartError::MalformedResponse("feature collection has no features array".into())
            })?;
        Ok(self.parse_features(features))
    }
}

/// Attribute map under `properties` (GeoJSON) or `attributes` (ArcGIS).
fn feature_attributes(feature: &Value) -> Result<&Map<String, Value>> {
    let Some(object) = feature.as_object() else {
        return Err(ChartError::MalformedResponse("feature is not an object".into()));
    };
    object
        .get("properties")
        .and_then(Value::as_object)
        .or_else(|| object.get("attributes").and_then(Value::as_object))
        .ok_or_else(|| ChartError::MalformedResponse("feature has no attribute map".into()))
}

fn first_string(attributes: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| attributes.get(*key))
        .find_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Accepts `1:20000`, `20,000`, `20000` or a JSON number.
fn parse_scale(value: &Value) -> Option<u32> {
    let scale = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.round() as u64))?,
        Value::String(s) => {
            let denominator = match s.split_once(':') {
                Some((_, d)) => d,
                None => s.as_str(),
            };
            denominator.trim().replace(',', "").parse::<u64>().ok()?
        }
        _ => return None,
    };
    u32::try_from(scale).ok().filter(|s| *s > 0)
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        // ArcGIS date fields are epoch milliseconds
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y%m%d", "%Y-%m-%d", "%m/%d/%Y"]
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| Utc.from_utc_datetime(&dt))
        }
        _ => None,
    }
}

fn scalar_metadata(attributes: &Map<String, Value>) -> BTreeMap<String, String> {
    attributes
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), text))
        })
        .collect()
}

/// Bounding box of a catalog geometry. `None` when the geometry is absent,
/// has no valid `[lon, lat]` pairs, or collapses to a line or point.
pub fn extract_bounds(geometry: Option<&Value>) -> Option<GeographicBounds> {
    let geometry = geometry?.as_object()?;
    let mut points = Vec::new();

    if let Some(rings) = geometry.get("rings") {
        collect_rings(rings, &mut points);
    } else if let Some(coordinates) = geometry.get("coordinates") {
        match geometry.get("type").and_then(Value::as_str) {
            Some("MultiPolygon") => {
                for polygon in coordinates.as_array().into_iter().flatten() {
                    collect_rings(polygon, &mut points);
                }
            }
            _ => collect_rings(coordinates, &mut points),
        }
    } else if let (Some(xmin), Some(ymin), Some(xmax), Some(ymax)) = (
        geometry.get("xmin").and_then(Value::as_f64),
        geometry.get("ymin").and_then(Value::as_f64),
        geometry.get("xmax").and_then(Value::as_f64),
        geometry.get("ymax").and_then(Value::as_f64),
    ) {
        points.push((ymin, xmin));
        points.push((ymax, xmax));
    }

    GeographicBounds::from_points(points).filter(GeographicBounds::is_valid)
}

/// Append the valid `(lat, lon)` points of a list of `[lon, lat]` rings.
fn collect_rings(rings: &Value, points: &mut Vec<(f64, f64)>) {
    for ring in rings.as_array().into_iter().flatten() {
        for pair in ring.as_array().into_iter().flatten() {
            let Some(pair) = pair.as_array() else { continue };
            let (Some(lon), Some(lat)) = (
                pair.first().and_then(Value::as_f64),
                pair.get(1).and_then(Value::as_f64),
            ) else {
                continue;
            };
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
                points.push((lat, lon));
            }
        }
    }
}
