///! ENC cell name decoding (`US5WA50M`: producer, usage band, region, serial)
use navtool_common::{ChartType, GeographicBounds};
use regex::Regex;
use std::sync::LazyLock;

use crate::module::region::StateRegionTable;

static EDITION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    // A period followed by exactly three digits at the end of the name
    Regex::new(r"\.\d{3}$").unwrap()
});

/// Broad NOAA region codes that are not postal abbreviations
const REGION_CODE_BOUNDS: [(&str, GeographicBounds); 6] = [
    ("WC", bounds(49.0, 32.5, -117.0, -125.0)),
    ("EC", bounds(45.0, 24.5, -66.9, -81.5)),
    ("GC", bounds(30.7, 24.5, -80.0, -97.5)),
    ("HA", bounds(22.3, 18.9, -154.8, -160.3)),
    ("BS", bounds(66.0, 51.5, -157.0, -179.9)),
    ("PO", bounds(60.0, 15.0, -120.0, -179.9)),
];

const fn bounds(north: f64, south: f64, east: f64, west: f64) -> GeographicBounds {
    GeographicBounds {
        north,
        south,
        east,
        west,
    }
}

/// Strip a trailing `.NNN` edition marker. Anything else is left untouched.
pub fn normalize(cell_name: &str) -> String {
    let trimmed = cell_name.trim();
    EDITION_SUFFIX.replace(trimmed, "").into_owned()
}

/// Usage band digit at index 2, if it is in 1..=6.
pub fn usage_band(cell_name: &str) -> Option<u8> {
    let digit = cell_name.chars().nth(2)?.to_digit(10)?;
    let band = u8::try_from(digit).ok()?;
    ChartType::from_usage_band(band).map(|_| band)
}

pub fn chart_type(cell_name: &str) -> Option<ChartType> {
    usage_band(cell_name).and_then(ChartType::from_usage_band)
}

/// Two-letter region code at indices 3..5.
pub fn region_code(cell_name: &str) -> Option<String> {
    let code: String = cell_name.chars().skip(3).take(2).collect();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}

/// Rough coverage guessed from the region code. Only a fallback for
/// catalog records without geometry.
pub fn estimated_bounds(cell_name: &str, states: &StateRegionTable) -> Option<GeographicBounds> {
    let code = region_code(cell_name)?;
    if let Some((_, bounds)) = REGION_CODE_BOUNDS.iter().find(|(c, _)| *c == code) {
        return Some(*bounds);
    }
    states
        .regions()
        .iter()
        .find(|r| r.abbreviation == code)
        .map(|r| r.bounds)
}
