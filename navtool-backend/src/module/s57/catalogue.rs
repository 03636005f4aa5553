///! S-57 object class and attribute catalogue (subset used by NOAA ENCs)
use std::collections::HashMap;

/// Attribute value domain, from the S-57 attribute catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// `E`: single enumerated value
    Enumerated,
    /// `L`: comma-separated list of enumerated values
    List,
    /// `F`
    Float,
    /// `I`
    Integer,
    /// `A` and `S`
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectClass {
    pub code: u16,
    pub acronym: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDef {
    pub code: u16,
    pub acronym: &'static str,
    pub kind: AttributeKind,
}

const OBJECT_CLASSES: &[ObjectClass] = &[
    ObjectClass { code: 1, acronym: "ADMARE", name: "Administration area" },
    ObjectClass { code: 4, acronym: "ACHARE", name: "Anchorage area" },
    ObjectClass { code: 5, acronym: "BCNCAR", name: "Beacon, cardinal" },
    ObjectClass { code: 6, acronym: "BCNISD", name: "Beacon, isolated danger" },
    ObjectClass { code: 7, acronym: "BCNLAT", name: "Beacon, lateral" },
    ObjectClass { code: 8, acronym: "BCNSAW", name: "Beacon, safe water" },
    ObjectClass { code: 9, acronym: "BCNSPP", name: "Beacon, special purpose" },
    ObjectClass { code: 11, acronym: "BRIDGE", name: "Bridge" },
    ObjectClass { code: 12, acronym: "BUISGL", name: "Building, single" },
    ObjectClass { code: 14, acronym: "BOYCAR", name: "Buoy, cardinal" },
    ObjectClass { code: 15, acronym: "BOYINB", name: "Buoy, installation" },
    ObjectClass { code: 16, acronym: "BOYISD", name: "Buoy, isolated danger" },
    ObjectClass { code: 17, acronym: "BOYLAT", name: "Buoy, lateral" },
    ObjectClass { code: 18, acronym: "BOYSAW", name: "Buoy, safe water" },
    ObjectClass { code: 19, acronym: "BOYSPP", name: "Buoy, special purpose" },
    ObjectClass { code: 22, acronym: "CBLSUB", name: "Cable, submarine" },
    ObjectClass { code: 30, acronym: "COALNE", name: "Coastline" },
    ObjectClass { code: 42, acronym: "DEPARE", name: "Depth area" },
    ObjectClass { code: 43, acronym: "DEPCNT", name: "Depth contour" },
    ObjectClass { code: 46, acronym: "DRGARE", name: "Dredged area" },
    ObjectClass { code: 51, acronym: "FAIRWY", name: "Fairway" },
    ObjectClass { code: 71, acronym: "LNDARE", name: "Land area" },
    ObjectClass { code: 72, acronym: "LNDELV", name: "Land elevation" },
    ObjectClass { code: 74, acronym: "LNDMRK", name: "Landmark" },
    ObjectClass { code: 75, acronym: "LIGHTS", name: "Light" },
    ObjectClass { code: 84, acronym: "MORFAC", name: "Mooring/warping facility" },
    ObjectClass { code: 86, acronym: "OBSTRN", name: "Obstruction" },
    ObjectClass { code: 94, acronym: "PIPSOL", name: "Pipeline, submarine/on land" },
    ObjectClass { code: 112, acronym: "RESARE", name: "Restricted area" },
    ObjectClass { code: 119, acronym: "SEAARE", name: "Sea area / named water area" },
    ObjectClass { code: 121, acronym: "SBDARE", name: "Seabed area" },
    ObjectClass { code: 122, acronym: "SLCONS", name: "Shoreline construction" },
    ObjectClass { code: 129, acronym: "SOUNDG", name: "Sounding" },
    ObjectClass { code: 144, acronym: "TOPMAR", name: "Topmark" },
    ObjectClass { code: 153, acronym: "UWTROC", name: "Underwater/awash rock" },
    ObjectClass { code: 154, acronym: "UNSARE", name: "Unsurveyed area" },
    ObjectClass { code: 159, acronym: "WRECKS", name: "Wreck" },
    ObjectClass { code: 302, acronym: "M_COVR", name: "Coverage" },
    ObjectClass { code: 308, acronym: "M_QUAL", name: "Quality of data" },
];

const ATTRIBUTES: &[AttributeDef] = &[
    AttributeDef { code: 2, acronym: "BCNSHP", kind: AttributeKind::Enumerated },
    AttributeDef { code: 4, acronym: "BOYSHP", kind: AttributeKind::Enumerated },
    AttributeDef { code: 36, acronym: "CATLAM", kind: AttributeKind::Enumerated },
    AttributeDef { code: 37, acronym: "CATLIT", kind: AttributeKind::List },
    AttributeDef { code: 42, acronym: "CATOBS", kind: AttributeKind::Enumerated },
    AttributeDef { code: 71, acronym: "CATWRK", kind: AttributeKind::Enumerated },
    AttributeDef { code: 75, acronym: "COLOUR", kind: AttributeKind::List },
    AttributeDef { code: 76, acronym: "COLPAT", kind: AttributeKind::List },
    AttributeDef { code: 87, acronym: "DRVAL1", kind: AttributeKind::Float },
    AttributeDef { code: 88, acronym: "DRVAL2", kind: AttributeKind::Float },
    AttributeDef { code: 90, acronym: "ELEVAT", kind: AttributeKind::Float },
    AttributeDef { code: 93, acronym: "EXPSOU", kind: AttributeKind::Enumerated },
    AttributeDef { code: 95, acronym: "HEIGHT", kind: AttributeKind::Float },
    AttributeDef { code: 102, acronym: "INFORM", kind: AttributeKind::Text },
    AttributeDef { code: 107, acronym: "LITCHR", kind: AttributeKind::Enumerated },
    AttributeDef { code: 116, acronym: "OBJNAM", kind: AttributeKind::Text },
    AttributeDef { code: 117, acronym: "ORIENT", kind: AttributeKind::Float },
    AttributeDef { code: 125, acronym: "QUASOU", kind: AttributeKind::List },
    AttributeDef { code: 133, acronym: "SCAMIN", kind: AttributeKind::Integer },
    AttributeDef { code: 136, acronym: "SECTR1", kind: AttributeKind::Float },
    AttributeDef { code: 137, acronym: "SECTR2", kind: AttributeKind::Float },
    AttributeDef { code: 141, acronym: "SIGGRP", kind: AttributeKind::Text },
    AttributeDef { code: 142, acronym: "SIGPER", kind: AttributeKind::Float },
    AttributeDef { code: 149, acronym: "STATUS", kind: AttributeKind::List },
    AttributeDef { code: 174, acronym: "VALDCO", kind: AttributeKind::Float },
    AttributeDef { code: 178, acronym: "VALNMR", kind: AttributeKind::Float },
    AttributeDef { code: 179, acronym: "VALSOU", kind: AttributeKind::Float },
    AttributeDef { code: 187, acronym: "WATLEV", kind: AttributeKind::Enumerated },
    AttributeDef { code: 300, acronym: "NINFOM", kind: AttributeKind::Text },
    AttributeDef { code: 301, acronym: "NOBJNM", kind: AttributeKind::Text },
];

/// Code lookups for object classes and attributes. Built once and shared
/// behind an `Arc` by every parser.
#[derive(Debug, Clone)]
pub struct S57Catalogue {
    objects: HashMap<u16, ObjectClass>,
    attributes: HashMap<u16, AttributeDef>,
}

impl S57Catalogue {
    pub fn standard() -> Self {
        Self::from_tables(OBJECT_CLASSES, ATTRIBUTES)
    }

    pub fn from_tables(objects: &[ObjectClass], attributes: &[AttributeDef]) -> Self {
        Self {
            objects: objects.iter().map(|o| (o.code, *o)).collect(),
            attributes: attributes.iter().map(|a| (a.code, *a)).collect(),
        }
    }

    pub fn object(&self, code: u16) -> Option<&ObjectClass> {
        self.objects.get(&code)
    }

    pub fn attribute(&self, code: u16) -> Option<&AttributeDef> {
        self.attributes.get(&code)
    }

    pub fn object_by_acronym(&self, acronym: &str) -> Option<&ObjectClass> {
        self.objects.values().find(|o| o.acronym.eq_ignore_ascii_case(acronym))
    }
}

impl Default for S57Catalogue {
    fn default() -> Self {
        Self::standard()
    }
}
