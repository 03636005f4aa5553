///! S-57 base cell (`.000`) parsing into features with assembled geometry
use navtool_common::{AttributeValue, GeographicBounds, LatLng};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::catalogue::{AttributeKind, S57Catalogue};
use super::iso8211::{DataRecord, Iso8211Reader};
use super::types::{
    FeatureObjectId, Primitive, S57Feature, S57Geometry, S57Metadata, S57ParseResult, Sounding,
};
use crate::error::{ChartError, Result};

const DEFAULT_COMF: u32 = 10_000_000;
const DEFAULT_SOMF: u32 = 10;

/// Vector record types (VRID/RCNM)
const RCNM_ISOLATED_NODE: u8 = 110;
const RCNM_CONNECTED_NODE: u8 = 120;
const RCNM_EDGE: u8 = 130;

/// Orientation and usage indicators (FSPT/VRPT)
const ORNT_REVERSE: i64 = 2;
const USAG_INTERIOR: i64 = 2;
const TOPI_BEGIN: i64 = 1;
const TOPI_END: i64 = 2;

pub const UNKNOWN_ACRONYM: &str = "UNKNOWN";

/// Reference to a vector record: `(RCNM, RCID)`
type VectorKey = (u8, u32);

#[derive(Debug, Clone, Copy)]
struct VectorPointer {
    key: VectorKey,
    orientation: i64,
    usage: i64,
    topology: i64,
}

#[derive(Debug, Default)]
struct VectorRecord {
    /// Raw `(Y, X)` pairs from SG2D
    points: Vec<(i64, i64)>,
    /// Raw `(Y, X, Z)` triples from SG3D
    soundings: Vec<(i64, i64, i64)>,
    pointers: Vec<VectorPointer>,
}

#[derive(Debug)]
struct FeatureRecord {
    record_id: u32,
    object_code: u16,
    primitive: Primitive,
    object_id: Option<FeatureObjectId>,
    attributes: Vec<(u16, String)>,
    spatial: Vec<VectorPointer>,
}

pub struct S57Parser {
    catalogue: Arc<S57Catalogue>,
}

impl S57Parser {
    pub fn new(catalogue: Arc<S57Catalogue>) -> Self {
        Self { catalogue }
    }

    /// Parse a base cell. Structural damage (truncated records, fields that
    /// disagree with the DDR) fails the whole cell with the byte offset.
    pub fn parse(&self, data: &[u8]) -> Result<S57ParseResult> {
        let mut reader = Iso8211Reader::new(data)?;
        let mut metadata = S57Metadata {
            coordinate_multiplier: DEFAULT_COMF,
            sounding_multiplier: DEFAULT_SOMF,
            ..S57Metadata::default()
        };
        let mut vectors: HashMap<VectorKey, VectorRecord> = HashMap::new();
        let mut records = Vec::new();

        while let Some(record) = reader.next_record()? {
            if record.field("FRID").is_some() {
                records.push(read_feature(&reader, &record)?);
            } else if record.field("VRID").is_some() {
                let (key, vector) = read_vector(&reader, &record)?;
                vectors.insert(key, vector);
            } else if record.field("DSID").is_some() {
                read_dataset_id(&reader, &record, &mut metadata)?;
            } else if record.field("DSPM").is_some() {
                read_dataset_parameters(&reader, &record, &mut metadata)?;
            }
        }

        if metadata.coordinate_multiplier == 0 {
            return Err(ChartError::corrupt(0, "coordinate multiplication factor is zero"));
        }
        metadata.feature_record_count = records.len();
        metadata.vector_record_count = vectors.len();

        let geometry = GeometryBuilder {
            vectors: &vectors,
            comf: metadata.coordinate_multiplier as f64,
            somf: metadata.sounding_multiplier.max(1) as f64,
        };

        let mut features = Vec::with_capacity(records.len());
        let mut bounds: Option<GeographicBounds> = None;
        for record in records {
            let feature = self.build_feature(record, &geometry);
            if let Some(b) = feature.geometry.bounds() {
                bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
            }
            features.push(feature);
        }

        tracing::debug!(
            "Parsed S-57 cell {}: {} features, {} vector records",
            metadata.dataset_name.as_deref().unwrap_or("<unnamed>"),
            features.len(),
            metadata.vector_record_count
        );

        Ok(S57ParseResult {
            features,
            bounds,
            metadata,
        })
    }

    fn build_feature(&self, record: FeatureRecord, geometry: &GeometryBuilder<'_>) -> S57Feature {
        let acronym = match self.catalogue.object(record.object_code) {
            Some(class) => class.acronym.to_string(),
            None => {
                tracing::debug!(
                    "Unknown object class {} on feature {}",
                    record.object_code,
                    record.record_id
                );
                UNKNOWN_ACRONYM.to_string()
            }
        };

        let mut attributes = BTreeMap::new();
        for (code, raw) in &record.attributes {
            let Some(def) = self.catalogue.attribute(*code) else {
                tracing::debug!(
                    "Skipping unknown attribute {} on feature {}",
                    code,
                    record.record_id
                );
                continue;
            };
            if let Some(value) = attribute_value(def.kind, raw) {
                attributes.insert(def.acronym.to_string(), value);
            }
        }

        let geometry = match record.primitive {
            Primitive::Point => geometry.point(&record.spatial),
            Primitive::Line => geometry.line(&record.spatial),
            Primitive::Area => geometry.area(&record.spatial),
            Primitive::None => S57Geometry::None,
        };

        S57Feature {
            record_id: record.record_id,
            object_code: record.object_code,
            acronym,
            primitive: record.primitive,
            geometry,
            attributes,
            object_id: record.object_id,
        }
    }
}

/// Convert an ATTF value by its catalogue domain; empty values are absent.
fn attribute_value(kind: AttributeKind, raw: &str) -> Option<AttributeValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let text = || AttributeValue::Text(raw.to_string());
    Some(match kind {
        AttributeKind::Enumerated | AttributeKind::Integer => {
            raw.parse().map(AttributeValue::Integer).unwrap_or_else(|_| text())
        }
        AttributeKind::Float => raw.parse().map(AttributeValue::Float).unwrap_or_else(|_| text()),
        AttributeKind::List => raw
            .split(',')
            .map(|v| v.trim().parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(AttributeValue::List)
            .unwrap_or_else(|_| text()),
        AttributeKind::Text => text(),
    })
}

fn required_field(
    reader: &Iso8211Reader<'_>,
    record: &DataRecord<'_>,
    tag: &str,
) -> Result<super::iso8211::DecodedField> {
    reader
        .decode_tag(record, tag)?
        .ok_or_else(|| {
            ChartError::corrupt(
                record.offset,
                format!("{} field is not described by the DDR", tag),
            )
        })
}

fn read_feature(reader: &Iso8211Reader<'_>, record: &DataRecord<'_>) -> Result<FeatureRecord> {
    let frid = required_field(reader, record, "FRID")?;
    let record_id = frid.int("RCID").unwrap_or_default() as u32;
    let object_code = frid.int("OBJL").unwrap_or_default() as u16;
    let primitive = Primitive::from_code(frid.int("PRIM").unwrap_or(255));

    let object_id = match reader.decode_tag(record, "FOID")? {
        Some(foid) => Some(FeatureObjectId {
            agency: foid.int("AGEN").unwrap_or_default() as u16,
            id_number: foid.int("FIDN").unwrap_or_default() as u32,
            id_subdivision: foid.int("FIDS").unwrap_or_default() as u16,
        }),
        None => None,
    };

    let mut attributes = Vec::new();
    for field in record.fields_tagged("ATTF") {
        if let Some(attf) = reader.decode(field)? {
            for group in attf.groups() {
                if let (Some(code), Some(value)) = (group.int("ATTL"), group.text("ATVL")) {
                    attributes.push((code as u16, value.to_string()));
                }
            }
        }
    }

    let mut spatial = Vec::new();
    for field in record.fields_tagged("FSPT") {
        if let Some(fspt) = reader.decode(field)? {
            spatial.extend(fspt.groups().filter_map(|g| pointer(&g)));
        }
    }

    Ok(FeatureRecord {
        record_id,
        object_code,
        primitive,
        object_id,
        attributes,
        spatial,
    })
}

fn read_vector(
    reader: &Iso8211Reader<'_>,
    record: &DataRecord<'_>,
) -> Result<(VectorKey, VectorRecord)> {
    let vrid = required_field(reader, record, "VRID")?;
    let key = (
        vrid.int("RCNM").unwrap_or_default() as u8,
        vrid.int("RCID").unwrap_or_default() as u32,
    );

    let mut vector = VectorRecord::default();
    for field in record.fields_tagged("SG2D") {
        if let Some(sg2d) = reader.decode(field)? {
            vector.points.extend(
                sg2d.groups()
                    .filter_map(|g| Some((g.int("YCOO")?, g.int("XCOO")?))),
            );
        }
    }
    for field in record.fields_tagged("SG3D") {
        if let Some(sg3d) = reader.decode(field)? {
            vector.soundings.extend(
                sg3d.groups()
                    .filter_map(|g| Some((g.int("YCOO")?, g.int("XCOO")?, g.int("VE3D")?))),
            );
        }
    }
    for field in record.fields_tagged("VRPT") {
        if let Some(vrpt) = reader.decode(field)? {
            vector.pointers.extend(vrpt.groups().filter_map(|g| pointer(&g)));
        }
    }
    Ok((key, vector))
}

/// FSPT/VRPT group; NAME is B(40): RCNM byte then little-endian RCID.
fn pointer(group: &super::iso8211::Group<'_>) -> Option<VectorPointer> {
    let name = group.bytes("NAME")?;
    if name.len() < 5 {
        return None;
    }
    Some(VectorPointer {
        key: (name[0], u32::from_le_bytes([name[1], name[2], name[3], name[4]])),
        orientation: group.int("ORNT").unwrap_or(1),
        usage: group.int("USAG").unwrap_or(1),
        topology: group.int("TOPI").unwrap_or(0),
    })
}

fn read_dataset_id(
    reader: &Iso8211Reader<'_>,
    record: &DataRecord<'_>,
    metadata: &mut S57Metadata,
) -> Result<()> {
    let dsid = required_field(reader, record, "DSID")?;
    metadata.dataset_name = dsid.text("DSNM");
    metadata.edition = dsid.text("EDTN");
    metadata.update_number = dsid.text("UPDN");
    metadata.update_date = dsid.text("UADT");
    metadata.issue_date = dsid.text("ISDT");
    metadata.s57_edition = dsid.get("STED").and_then(|v| {
        v.as_text()
            .map(str::to_string)
            .or_else(|| v.as_f64().map(|f| format!("{:.1}", f)))
    });
    metadata.producing_agency = dsid.int("AGEN").map(|v| v as u16);
    metadata.comment = dsid.text("COMT");
    Ok(())
}

fn read_dataset_parameters(
    reader: &Iso8211Reader<'_>,
    record: &DataRecord<'_>,
    metadata: &mut S57Metadata,
) -> Result<()> {
    let dspm = required_field(reader, record, "DSPM")?;
    metadata.horizontal_datum = dspm.int("HDAT").map(|v| v as u8);
    metadata.vertical_datum = dspm.int("VDAT").map(|v| v as u8);
    metadata.sounding_datum = dspm.int("SDAT").map(|v| v as u8);
    metadata.compilation_scale = dspm.int("CSCL").map(|v| v as u32);
    if let Some(comf) = dspm.int("COMF") {
        metadata.coordinate_multiplier = comf as u32;
    }
    if let Some(somf) = dspm.int("SOMF") {
        metadata.sounding_multiplier = somf as u32;
    }
    Ok(())
}

struct GeometryBuilder<'v> {
    vectors: &'v HashMap<VectorKey, VectorRecord>,
    comf: f64,
    somf: f64,
}

impl GeometryBuilder<'_> {
    fn position(&self, (y, x): (i64, i64)) -> LatLng {
        LatLng::new(y as f64 / self.comf, x as f64 / self.comf)
    }

    fn vector(&self, key: VectorKey) -> Option<&VectorRecord> {
        let vector = self.vectors.get(&key);
        if vector.is_none() {
            tracing::debug!("Dangling vector reference {}/{}", key.0, key.1);
        }
        vector
    }

    fn node_position(&self, key: VectorKey) -> Option<LatLng> {
        self.vector(key)?.points.first().map(|p| self.position(*p))
    }

    fn point(&self, spatial: &[VectorPointer]) -> S57Geometry {
        let Some(vector) = spatial
            .iter()
            .filter(|p| matches!(p.key.0, RCNM_ISOLATED_NODE | RCNM_CONNECTED_NODE))
            .find_map(|p| self.vector(p.key))
        else {
            return S57Geometry::None;
        };

        if !vector.soundings.is_empty() {
            return S57Geometry::Soundings(
                vector
                    .soundings
                    .iter()
                    .map(|&(y, x, z)| Sounding {
                        position: self.position((y, x)),
                        depth: z as f64 / self.somf,
                    })
                    .collect(),
            );
        }
        match vector.points.first() {
            Some(p) => S57Geometry::Point(self.position(*p)),
            None => S57Geometry::None,
        }
    }

    /// Begin node, intermediate SG2D points, end node; reversed for ORNT 2.
    fn edge(&self, pointer: &VectorPointer) -> Option<Vec<LatLng>> {
        if pointer.key.0 != RCNM_EDGE {
            return None;
        }
        let edge = self.vector(pointer.key)?;
        let node = |topology: i64, fallback: usize| {
            edge.pointers
                .iter()
                .find(|p| p.topology == topology)
                .or_else(|| edge.pointers.get(fallback))
                .and_then(|p| self.node_position(p.key))
        };

        let mut coords = Vec::with_capacity(edge.points.len() + 2);
        coords.extend(node(TOPI_BEGIN, 0));
        coords.extend(edge.points.iter().map(|p| self.position(*p)));
        coords.extend(node(TOPI_END, 1));
        if pointer.orientation == ORNT_REVERSE {
            coords.reverse();
        }
        (coords.len() >= 2).then_some(coords)
    }

    fn line(&self, spatial: &[VectorPointer]) -> S57Geometry {
        let mut parts: Vec<Vec<LatLng>> = Vec::new();
        for pointer in spatial {
            let Some(coords) = self.edge(pointer) else {
                continue;
            };
            match parts.last_mut() {
                // Continue the current part when edges chain end to start
                Some(part) if part.last() == coords.first() => {
                    part.extend(coords.into_iter().skip(1))
                }
                _ => parts.push(coords),
            }
        }
        if parts.is_empty() {
            S57Geometry::None
        } else {
            S57Geometry::Line(parts)
        }
    }

    fn area(&self, spatial: &[VectorPointer]) -> S57Geometry {
        let mut exterior = Vec::new();
        let mut interior = Vec::new();
        let mut current: Vec<LatLng> = Vec::new();
        let mut current_usage = 1;

        for pointer in spatial {
            let Some(coords) = self.edge(pointer) else {
                continue;
            };
            if current.is_empty() {
                current_usage = pointer.usage;
                current = coords;
            } else if current.last() == coords.first() {
                current.extend(coords.into_iter().skip(1));
            } else {
                let ring = std::mem::take(&mut current);
                close_ring(ring, current_usage, &mut exterior, &mut interior);
                current_usage = pointer.usage;
                current = coords;
            }

            if current.len() >= 4 && current.first() == current.last() {
                let ring = std::mem::take(&mut current);
                close_ring(ring, current_usage, &mut exterior, &mut interior);
            }
        }
        if !current.is_empty() {
            close_ring(current, current_usage, &mut exterior, &mut interior);
        }

        if exterior.is_empty() && interior.is_empty() {
            return S57Geometry::None;
        }
        exterior.extend(interior);
        S57Geometry::Area(exterior)
    }
}

fn close_ring(
    mut ring: Vec<LatLng>,
    usage: i64,
    exterior: &mut Vec<Vec<LatLng>>,
    interior: &mut Vec<Vec<LatLng>>,
) {
    if let Some(first) = ring.first().copied() {
        if ring.last() != Some(&first) {
            ring.push(first);
        }
    }
    if ring.len() < 4 {
        tracing::debug!("Dropping degenerate ring of {} points", ring.len());
        return;
    }
    if usage == USAG_INTERIOR {
        interior.push(ring);
    } else {
        exterior.push(ring);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::test_support::enc::{FIXTURE_BOUNDS, fixture_cell};

    fn parse_fixture() -> S57ParseResult {
        S57Parser::new(Arc::new(S57Catalogue::standard()))
            .parse(&fixture_cell())
            .unwrap()
    }

    fn feature<'a>(result: &'a S57ParseResult, acronym: &str) -> &'a S57Feature {
        result
            .features
            .iter()
            .find(|f| f.acronym == acronym)
            .unwrap_or_else(|| panic!("no {} feature", acronym))
    }

    #[test]
    fn test_metadata() {
        let result = parse_fixture();
        let metadata = &result.metadata;
        assert_eq!(metadata.dataset_name.as_deref(), Some("US5TEST1.000"));
        assert_eq!(metadata.edition.as_deref(), Some("3"));
        assert_eq!(metadata.issue_date.as_deref(), Some("20240115"));
        assert_eq!(metadata.compilation_scale, Some(20000));
        assert_eq!(metadata.coordinate_multiplier, 10_000_000);
        assert_eq!(metadata.sounding_multiplier, 10);
        assert_eq!(metadata.producing_agency, Some(550));
        assert_eq!(metadata.feature_record_count, 6);
    }

    #[test]
    fn test_features_lie_within_cell() {
        let result = parse_fixture();
        assert_eq!(result.features.len(), 6);

        let bounds = result.bounds.unwrap();
        assert!(FIXTURE_BOUNDS.contains(&bounds), "{} outside {}", bounds, FIXTURE_BOUNDS);
        for feature in &result.features {
            for p in feature.geometry.positions() {
                assert!(bounds.contains_point(p.latitude, p.longitude));
            }
        }
    }

    #[test]
    fn test_point_and_attributes() {
        let result = parse_fixture();
        let light = feature(&result, "LIGHTS");
        assert_eq!(light.primitive, Primitive::Point);
        assert_eq!(light.geometry, S57Geometry::Point(LatLng::new(47.6, -122.35)));
        assert_eq!(light.attribute_text("OBJNAM").as_deref(), Some("Alki Point Light"));
        assert_eq!(light.attribute("COLOUR"), Some(&AttributeValue::List(vec![1])));
        assert_eq!(light.attribute_f64("SIGPER"), Some(5.0));
        assert_eq!(light.object_id.unwrap().agency, 550);

        let buoy = feature(&result, "BOYLAT");
        assert_eq!(buoy.attribute("BOYSHP"), Some(&AttributeValue::Integer(2)));
        // Code 9999 is not in the catalogue
        assert_eq!(buoy.attributes.len(), 3);
    }

    #[test]
    fn test_soundings_are_scaled() {
        let result = parse_fixture();
        let S57Geometry::Soundings(soundings) = &feature(&result, "SOUNDG").geometry else {
            panic!("expected soundings");
        };
        let depths: Vec<f64> = soundings.iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![12.3, 8.0, 15.5]);
    }

    #[test]
    fn test_area_ring_is_closed_and_oriented() {
        let result = parse_fixture();
        let S57Geometry::Area(rings) = &feature(&result, "DEPARE").geometry else {
            panic!("expected area");
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(
            rings[0],
            vec![
                LatLng::new(47.55, -122.4),
                LatLng::new(47.55, -122.3),
                LatLng::new(47.65, -122.3),
                LatLng::new(47.65, -122.4),
                LatLng::new(47.55, -122.4),
            ]
        );
    }

    #[test]
    fn test_line_geometry() {
        let result = parse_fixture();
        let contour = feature(&result, "DEPCNT");
        assert_eq!(contour.attribute_f64("VALDCO"), Some(10.0));
        let S57Geometry::Line(parts) = &contour.geometry else {
            panic!("expected line");
        };
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[0][0], LatLng::new(47.58, -122.38));
    }

    #[test]
    fn test_unknown_object_class_is_kept() {
        let result = parse_fixture();
        let unknown = feature(&result, UNKNOWN_ACRONYM);
        assert_eq!(unknown.object_code, 9998);
    }

    #[test]
    fn test_truncated_cell_is_corrupt() {
        let cell = fixture_cell();
        let parser = S57Parser::new(Arc::new(S57Catalogue::standard()));
        for cut in [30, cell.len() - 20, cell.len() - 1] {
            match parser.parse(&cell[..cut]) {
                Err(ChartError::CorruptData { offset: Some(offset), .. }) => assert!(offset < cut),
                other => panic!(
                    "expected corrupt data at {}, got {:?}",
                    cut,
                    other.map(|r| r.features.len())
                ),
            }
        }
    }

    #[test]
    fn test_attribute_domains() {
        assert_eq!(
            attribute_value(AttributeKind::List, "1,3"),
            Some(AttributeValue::List(vec![1, 3]))
        );
        assert_eq!(attribute_value(AttributeKind::Float, " 2.5"), Some(AttributeValue::Float(2.5)));
        assert_eq!(
            attribute_value(AttributeKind::Enumerated, "x"),
            Some(AttributeValue::Text("x".into()))
        );
        assert_eq!(attribute_value(AttributeKind::Text, "  "), None);
    }
}
