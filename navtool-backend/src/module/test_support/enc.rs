///! Synthetic ENC base cell covering a small square off Seattle
use navtool_common::GeographicBounds;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::iso8211::{FieldBuf, data_record, ddr, ddr_field};

pub const FIXTURE_CELL: &str = "US5TEST1";

pub const FIXTURE_BOUNDS: GeographicBounds = GeographicBounds {
    north: 47.65,
    south: 47.55,
    east: -122.30,
    west: -122.40,
};

const COMF: f64 = 10_000_000.0;
const SOMF: f64 = 10.0;

fn coord(value: f64) -> i32 {
    (value * COMF).round() as i32
}

fn descriptive_record() -> Vec<u8> {
    ddr(&[
        ddr_field("0001", "ISO 8211 Record Identifier", "", "(b12)"),
        ddr_field(
            "DSID",
            "Data set identification field",
            "RCNM!RCID!EXPP!INTU!DSNM!EDTN!UPDN!UADT!ISDT!STED!PRSP!PSDN!PRED!PROF!AGEN!COMT",
            "(b11,b14,2b11,3A,2A(8),R(4),b11,2A,b11,b12,A)",
        ),
        ddr_field(
            "DSPM",
            "Data set parameter field",
            "RCNM!RCID!HDAT!VDAT!SDAT!CSCL!DUNI!HUNI!PUNI!COUN!COMF!SOMF!COMT",
            "(b11,b14,3b11,b14,4b11,2b14,A)",
        ),
        ddr_field(
            "VRID",
            "Vector record identifier field",
            "RCNM!RCID!RVER!RUIN",
            "(b11,b14,b12,b11)",
        ),
        ddr_field(
            "VRPT",
            "Vector record pointer field",
            "*NAME!ORNT!USAG!TOPI!MASK",
            "(B(40),4b11)",
        ),
        ddr_field("SG2D", "2-D coordinate field", "*YCOO!XCOO", "(2b24)"),
        ddr_field("SG3D", "3-D coordinate (sounding array) field", "*YCOO!XCOO!VE3D", "(3b24)"),
        ddr_field(
            "FRID",
            "Feature record identifier field",
            "RCNM!RCID!PRIM!GRUP!OBJL!RVER!RUIN",
            "(b11,b14,2b11,2b12,b11)",
        ),
        ddr_field("FOID", "Feature object identifier field", "AGEN!FIDN!FIDS", "(b12,b14,b12)"),
        ddr_field("ATTF", "Feature record attribute field", "*ATTL!ATVL", "(b12,A)"),
        ddr_field(
            "FSPT",
            "Feature record to spatial record pointer field",
            "*NAME!ORNT!USAG!MASK",
            "(B(40),3b11)",
        ),
    ])
}

fn record_number(n: u16) -> (&'static str, Vec<u8>) {
    ("0001", FieldBuf::new().u16(n).build())
}

fn dataset_records() -> Vec<u8> {
    let mut out = data_record(&[
        record_number(1),
        (
            "DSID",
            FieldBuf::new()
                .u8(10)
                .u32(1)
                .u8(1)
                .u8(5)
                .text("US5TEST1.000")
                .text("3")
                .text("0")
                .fixed("20240101")
                .fixed("20240115")
                .fixed("03.1")
                .u8(1)
                .text("")
                .text("2.0")
                .u8(1)
                .u16(550)
                .text("")
                .build(),
        ),
    ]);
    out.extend(data_record(&[
        record_number(2),
        (
            "DSPM",
            FieldBuf::new()
                .u8(20)
                .u32(1)
                .u8(2)
                .u8(17)
                .u8(23)
                .u32(20_000)
                .u8(1)
                .u8(1)
                .u8(1)
                .u8(1)
                .u32(COMF as u32)
                .u32(SOMF as u32)
                .text("")
                .build(),
        ),
    ]));
    out
}

/// `(RCNM, RCID, points, soundings, node pointers as (RCNM, RCID, TOPI))`
type VectorSpec<'a> = (u8, u32, &'a [(f64, f64)], &'a [(f64, f64, f64)], &'a [(u8, u32, u8)]);

fn vector_record(n: u16, (rcnm, rcid, points, soundings, nodes): VectorSpec<'_>) -> Vec<u8> {
    let mut fields = vec![
        record_number(n),
        ("VRID", FieldBuf::new().u8(rcnm).u32(rcid).u16(1).u8(1).build()),
    ];
    if !nodes.is_empty() {
        let mut vrpt = FieldBuf::new();
        for &(node_rcnm, node_rcid, topi) in nodes {
            vrpt = vrpt.name(node_rcnm, node_rcid).u8(255).u8(255).u8(topi).u8(255);
        }
        fields.push(("VRPT", vrpt.build()));
    }
    if !points.is_empty() {
        let mut sg2d = FieldBuf::new();
        for &(lat, lon) in points {
            sg2d = sg2d.i32(coord(lat)).i32(coord(lon));
        }
        fields.push(("SG2D", sg2d.build()));
    }
    if !soundings.is_empty() {
        let mut sg3d = FieldBuf::new();
        for &(lat, lon, depth) in soundings {
            sg3d = sg3d.i32(coord(lat)).i32(coord(lon)).i32((depth * SOMF).round() as i32);
        }
        fields.push(("SG3D", sg3d.build()));
    }
    data_record(&fields)
}

/// `(RCID, PRIM, OBJL, attributes, spatial pointers as (RCNM, RCID, ORNT, USAG))`
type FeatureSpec<'a> = (u32, u8, u16, &'a [(u16, &'a str)], &'a [(u8, u32, u8, u8)]);

fn feature_record(n: u16, (rcid, prim, objl, attributes, spatial): FeatureSpec<'_>) -> Vec<u8> {
    let mut fields = vec![
        record_number(n),
        (
            "FRID",
            FieldBuf::new().u8(100).u32(rcid).u8(prim).u8(2).u16(objl).u16(1).u8(1).build(),
        ),
        ("FOID", FieldBuf::new().u16(550).u32(1000 + rcid).u16(1).build()),
    ];
    if !attributes.is_empty() {
        let mut attf = FieldBuf::new();
        for &(code, value) in attributes {
            attf = attf.u16(code).text(value);
        }
        fields.push(("ATTF", attf.build()));
    }
    let mut fspt = FieldBuf::new();
    for &(rcnm, id, ornt, usag) in spatial {
        fspt = fspt.name(rcnm, id).u8(ornt).u8(usag).u8(255);
    }
    fields.push(("FSPT", fspt.build()));
    data_record(&fields)
}

/// A light, a sounding cluster, a depth area, a depth contour, a lateral
/// buoy and one feature of an unknown object class.
pub fn fixture_cell() -> Vec<u8> {
    let sw = (47.55, -122.40);
    let ne = (47.65, -122.30);

    let vectors: [VectorSpec<'_>; 10] = [
        (110, 1, &[(47.60, -122.35)], &[], &[]),
        (
            110,
            2,
            &[],
            &[(47.58, -122.36, 12.3), (47.59, -122.34, 8.0), (47.61, -122.32, 15.5)],
            &[],
        ),
        (110, 3, &[(47.57, -122.33)], &[], &[]),
        (120, 10, &[sw], &[], &[]),
        (120, 11, &[ne], &[], &[]),
        (120, 12, &[(47.58, -122.38)], &[], &[]),
        (120, 13, &[(47.62, -122.32)], &[], &[]),
        // South and east sides of the square
        (130, 20, &[(47.55, -122.30)], &[], &[(120, 10, 1), (120, 11, 2)]),
        // West and north sides
        (130, 21, &[(47.65, -122.40)], &[], &[(120, 10, 1), (120, 11, 2)]),
        (130, 22, &[(47.60, -122.36)], &[], &[(120, 12, 1), (120, 13, 2)]),
    ];

    let features: [FeatureSpec<'_>; 6] = [
        (
            1,
            1,
            75,
            &[(75, "1"), (107, "2"), (142, "5"), (116, "Alki Point Light"), (95, "11.5")],
            &[(110, 1, 255, 255)],
        ),
        (2, 1, 129, &[], &[(110, 2, 255, 255)]),
        (3, 3, 42, &[(87, "5"), (88, "10")], &[(130, 20, 1, 1), (130, 21, 2, 1)]),
        (4, 2, 43, &[(174, "10")], &[(130, 22, 1, 255)]),
        (5, 1, 17, &[(4, "2"), (75, "3"), (36, "1"), (9999, "x")], &[(110, 3, 255, 255)]),
        (6, 1, 9998, &[], &[(110, 3, 255, 255)]),
    ];

    let mut cell = descriptive_record();
    cell.extend(dataset_records());
    let mut n = 3;
    for spec in vectors {
        cell.extend(vector_record(n, spec));
        n += 1;
    }
    for spec in features {
        cell.extend(feature_record(n, spec));
        n += 1;
    }
    cell
}

/// Write `<dir>/<cell>.zip` holding `ENC_ROOT/<cell>/<cell>.000` and a catalogue entry.
pub fn write_fixture_archive(dir: &Path, cell: &str, payload: &[u8]) -> PathBuf {
    let path = dir.join(format!("{}.zip", cell));
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = || {
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
    };

    zip.start_file("ENC_ROOT/CATALOG.031", options()).unwrap();
    zip.write_all(b"catalogue").unwrap();
    zip.start_file(format!("ENC_ROOT/{}/{}.000", cell, cell), options()).unwrap();
    zip.write_all(payload).unwrap();
    zip.finish().unwrap();
    path
}
