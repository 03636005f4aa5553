///! Minimal ISO 8211 writer for building test files
use crate::module::s57::iso8211::{FIELD_TERMINATOR, UNIT_TERMINATOR};

/// DDR entry for `tag`; an array descriptor starting with `*` repeats.
pub fn ddr_field(tag: &str, name: &str, array: &str, format: &str) -> (String, Vec<u8>) {
    let controls: &[u8] = if array.is_empty() {
        b"0000;&   "
    } else if array.starts_with('*') {
        b"2600;&   "
    } else {
        b"1600;&   "
    };
    let mut data = controls.to_vec();
    data.extend_from_slice(name.as_bytes());
    data.push(UNIT_TERMINATOR);
    data.extend_from_slice(array.as_bytes());
    data.push(UNIT_TERMINATOR);
    data.extend_from_slice(format.as_bytes());
    data.push(FIELD_TERMINATOR);
    (tag.to_string(), data)
}

pub fn ddr(fields: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut file_control = b"0000;&   test file".to_vec();
    file_control.push(FIELD_TERMINATOR);
    let mut all = vec![("0000".to_string(), file_control)];
    all.extend_from_slice(fields);
    record(b'L', &all)
}

/// Data record; a field terminator is appended to each field.
pub fn data_record(fields: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let fields: Vec<(String, Vec<u8>)> = fields
        .iter()
        .map(|(tag, data)| {
            let mut data = data.clone();
            data.push(FIELD_TERMINATOR);
            (tag.to_string(), data)
        })
        .collect();
    record(b'D', &fields)
}

fn record(leader_id: u8, fields: &[(String, Vec<u8>)]) -> Vec<u8> {
    let digits = |n: usize| n.to_string().len();
    let total: usize = fields.iter().map(|(_, data)| data.len()).sum();
    let longest = fields.iter().map(|(_, data)| data.len()).max().unwrap_or(0);
    let size_length = digits(longest);
    let size_position = digits(total);

    let mut directory = Vec::new();
    let mut position = 0;
    for (tag, data) in fields {
        directory.extend_from_slice(tag.as_bytes());
        directory.extend_from_slice(format!("{:0w$}", data.len(), w = size_length).as_bytes());
        directory.extend_from_slice(format!("{:0w$}", position, w = size_position).as_bytes());
        position += data.len();
    }
    directory.push(FIELD_TERMINATOR);

    let base = 24 + directory.len();
    let ddr = leader_id == b'L';
    let leader = format!(
        "{:05}{}{}{}{}{}{}{:05}{}{}{}0{}",
        base + total,
        if ddr { '3' } else { ' ' },
        leader_id as char,
        if ddr { 'E' } else { ' ' },
        if ddr { '1' } else { ' ' },
        ' ',
        if ddr { "09" } else { "  " },
        base,
        if ddr { " ! " } else { "   " },
        size_length,
        size_position,
        4
    );
    assert_eq!(leader.len(), 24);

    let mut out = leader.into_bytes();
    out.extend(directory);
    for (_, data) in fields {
        out.extend_from_slice(data);
    }
    out
}

/// Little-endian subfield encoder
#[derive(Debug, Default, Clone)]
pub struct FieldBuf(Vec<u8>);

impl FieldBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Variable-length text, unit terminated.
    pub fn text(mut self, s: &str) -> Self {
        self.0.extend_from_slice(s.as_bytes());
        self.0.push(UNIT_TERMINATOR);
        self
    }

    /// Fixed-width text.
    pub fn fixed(mut self, s: &str) -> Self {
        self.0.extend_from_slice(s.as_bytes());
        self
    }

    /// B(40) record pointer.
    pub fn name(self, rcnm: u8, rcid: u32) -> Self {
        self.u8(rcnm).u32(rcid)
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}
