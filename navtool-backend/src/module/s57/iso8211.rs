///! ISO/IEC 8211 record decoding
// A file is one data descriptive record (DDR) followed by data records (DR).
// The DDR describes each field tag's subfield labels and formats; data
// records keep raw field slices until a field is decoded by tag.
use std::collections::HashMap;

use crate::error::{ChartError, Result};

pub const LEADER_LEN: usize = 24;
pub const FIELD_TERMINATOR: u8 = 0x1e;
pub const UNIT_TERMINATOR: u8 = 0x1f;

/// Tag of the DDR file control field, which carries no subfields
const FILE_CONTROL_TAG: &str = "0000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leader {
    pub record_length: usize,
    /// `L` for the DDR, `D` or `R` for data records
    pub leader_id: u8,
    pub field_control_length: usize,
    pub base_address: usize,
    pub size_field_length: usize,
    pub size_field_position: usize,
    pub size_field_tag: usize,
}

impl Leader {
    fn parse(bytes: &[u8], offset: usize) -> Result<Self> {
        if bytes.len() < LEADER_LEN {
            return Err(ChartError::corrupt(
                offset,
                format!("truncated leader ({} of {} bytes)", bytes.len(), LEADER_LEN),
            ));
        }

        let record_length = ascii_number(&bytes[0..5], offset, "record length")?;
        let leader_id = bytes[6];
        let field_control_length = if leader_id == b'L' {
            ascii_number(&bytes[10..12], offset + 10, "field control length")?
        } else {
            0
        };
        let base_address = ascii_number(&bytes[12..17], offset + 12, "base address")?;
        let size_field_length = ascii_number(&bytes[20..21], offset + 20, "size of field length")?;
        let size_field_position =
            ascii_number(&bytes[21..22], offset + 21, "size of field position")?;
        let size_field_tag = ascii_number(&bytes[23..24], offset + 23, "size of field tag")?;

        if record_length < LEADER_LEN {
            return Err(ChartError::corrupt(
                offset,
                format!("record length {} shorter than the leader", record_length),
            ));
        }
        if base_address <= LEADER_LEN || base_address > record_length {
            return Err(ChartError::corrupt(
                offset + 12,
                format!("base address {} outside record of {} bytes", base_address, record_length),
            ));
        }
        if size_field_length == 0 || size_field_position == 0 || size_field_tag == 0 {
            return Err(ChartError::corrupt(offset + 20, "zero-width directory entry"));
        }

        Ok(Self {
            record_length,
            leader_id,
            field_control_length,
            base_address,
            size_field_length,
            size_field_position,
            size_field_tag,
        })
    }

    fn entry_size(&self) -> usize {
        self.size_field_tag + self.size_field_length + self.size_field_position
    }
}

/// Numeric leader/directory value; blanks read as zero.
fn ascii_number(bytes: &[u8], offset: usize, what: &str) -> Result<usize> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ChartError::corrupt(offset, format!("non-ASCII {}", what)))?
        .trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse()
        .map_err(|_| ChartError::corrupt(offset, format!("invalid {} '{}'", what, text)))
}

/// Encoding of a single subfield, from the DDR format controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubfieldFormat {
    /// `A` / `A(n)`: character data
    Text(Option<usize>),
    /// `I` / `I(n)`: ASCII integer
    Integer(Option<usize>),
    /// `R` / `R(n)`: ASCII real
    Real(Option<usize>),
    /// `B(n)`: bit string of n bits
    Bits(usize),
    /// `b1w`: little-endian unsigned, w bytes
    Unsigned(usize),
    /// `b2w`: little-endian signed, w bytes
    Signed(usize),
}

impl SubfieldFormat {
    fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (head, width) = match token.find('(') {
            Some(open) => {
                let close = token.rfind(')')?;
                let width: usize = token.get(open + 1..close)?.trim().parse().ok()?;
                if width == 0 {
                    return None;
                }
                (&token[..open], Some(width))
            }
            None => (token, None),
        };

        match head {
            "A" => Some(SubfieldFormat::Text(width)),
            "I" => Some(SubfieldFormat::Integer(width)),
            "R" => Some(SubfieldFormat::Real(width)),
            "B" => width.map(SubfieldFormat::Bits),
            _ if head.len() == 3 && head.starts_with('b') => {
                let width: usize = head[2..].parse().ok()?;
                if !matches!(width, 1 | 2 | 4) {
                    return None;
                }
                match &head[1..2] {
                    "1" => Some(SubfieldFormat::Unsigned(width)),
                    "2" => Some(SubfieldFormat::Signed(width)),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// Expand format controls such as `(b11,2b24,A(8),3(b12,A))` into one
/// entry per subfield.
pub fn parse_format_controls(controls: &str) -> Option<Vec<SubfieldFormat>> {
    let controls = controls.trim();
    let inner = controls
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(controls);
    let mut formats = Vec::new();
    expand_formats(inner, &mut formats)?;
    Some(formats)
}

fn expand_formats(list: &str, out: &mut Vec<SubfieldFormat>) -> Option<()> {
    for item in split_top_level(list) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let digits = item.chars().take_while(|c| c.is_ascii_digit()).count();
        let repeat: usize = if digits == 0 { 1 } else { item[..digits].parse().ok()? };
        let rest = &item[digits..];

        if let Some(group) = rest.strip_prefix('(').and_then(|g| g.strip_suffix(')')) {
            for _ in 0..repeat {
                expand_formats(group, out)?;
            }
        } else {
            let format = SubfieldFormat::parse(rest)?;
            out.extend(std::iter::repeat_n(format, repeat));
        }
    }
    Some(())
}

fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// DDR description of one field tag
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub tag: String,
    pub name: String,
    /// The label set repeats until the field is exhausted
    pub repeating: bool,
    pub labels: Vec<String>,
    pub formats: Vec<SubfieldFormat>,
}

impl FieldDefinition {
    fn parse(tag: &str, data: &[u8], field_control_length: usize, offset: usize) -> Result<Self> {
        if data.len() < field_control_length {
            return Err(ChartError::corrupt(
                offset,
                format!("definition of {} shorter than its field controls", tag),
            ));
        }
        let body = &data[field_control_length..];
        let mut parts = body.split(|b| *b == UNIT_TERMINATOR).map(latin1);
        let name = parts.next().unwrap_or_default();
        let descriptor = parts.next().unwrap_or_default();
        let controls = parts.next().unwrap_or_default();

        let repeating = descriptor.starts_with('*');
        let labels: Vec<String> = descriptor
            .trim_start_matches('*')
            .split('!')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .collect();

        let formats = if controls.trim().is_empty() {
            Vec::new()
        } else {
            parse_format_controls(&controls).ok_or_else(|| {
                ChartError::corrupt(
                    offset,
                    format!("unparseable format controls for {}: {}", tag, controls),
                )
            })?
        };

        Ok(Self {
            tag: tag.to_string(),
            name: name.trim().to_string(),
            repeating,
            labels,
            formats,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubfieldValue {
    Int(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SubfieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SubfieldValue::Int(v) => Some(*v),
            SubfieldValue::Real(v) => Some(*v as i64),
            SubfieldValue::Text(s) => s.trim().parse().ok(),
            SubfieldValue::Bytes(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SubfieldValue::Int(v) => Some(*v as f64),
            SubfieldValue::Real(v) => Some(*v),
            SubfieldValue::Text(s) => s.trim().parse().ok(),
            SubfieldValue::Bytes(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SubfieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SubfieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Decoded field: one group of values per repetition of the label set
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub tag: String,
    labels: Vec<String>,
    groups: Vec<Vec<SubfieldValue>>,
}

impl DecodedField {
    /// Value of `label` in the first group.
    pub fn get(&self, label: &str) -> Option<&SubfieldValue> {
        self.groups().next().and_then(|group| group.get(label))
    }

    pub fn int(&self, label: &str) -> Option<i64> {
        self.get(label).and_then(SubfieldValue::as_i64)
    }

    pub fn text(&self, label: &str) -> Option<String> {
        self.get(label)
            .and_then(SubfieldValue::as_text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn groups(&self) -> impl Iterator<Item = Group<'_>> {
        self.groups.iter().map(|values| Group {
            labels: &self.labels,
            values,
        })
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Group<'a> {
    labels: &'a [String],
    values: &'a [SubfieldValue],
}

impl<'a> Group<'a> {
    pub fn get(&self, label: &str) -> Option<&'a SubfieldValue> {
        let index = self.labels.iter().position(|l| l == label)?;
        self.values.get(index)
    }

    pub fn int(&self, label: &str) -> Option<i64> {
        self.get(label).and_then(SubfieldValue::as_i64)
    }

    pub fn bytes(&self, label: &str) -> Option<&'a [u8]> {
        self.get(label).and_then(SubfieldValue::as_bytes)
    }

    pub fn text(&self, label: &str) -> Option<&'a str> {
        self.get(label).and_then(SubfieldValue::as_text)
    }
}

/// Undecoded field of a data record
#[derive(Debug, Clone, Copy)]
pub struct RawField<'a> {
    pub tag: &'a str,
    pub data: &'a [u8],
    /// Absolute file offset of the field data
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct DataRecord<'a> {
    pub offset: usize,
    pub fields: Vec<RawField<'a>>,
}

impl<'a> DataRecord<'a> {
    pub fn field(&self, tag: &str) -> Option<&RawField<'a>> {
        self.fields.iter().find(|field| field.tag == tag)
    }

    pub fn fields_tagged<'s>(
        &'s self,
        tag: &'s str,
    ) -> impl Iterator<Item = &'s RawField<'a>> + 's {
        self.fields.iter().filter(move |field| field.tag == tag)
    }
}

pub struct Iso8211Reader<'a> {
    data: &'a [u8],
    position: usize,
    definitions: HashMap<String, FieldDefinition>,
}

impl<'a> Iso8211Reader<'a> {
    /// Read the DDR and position the reader at the first data record.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(ChartError::corrupt(0, "empty file"));
        }
        let (leader, fields) = read_record(data, 0)?;
        if leader.leader_id != b'L' {
            return Err(ChartError::corrupt(6, "first record is not a data descriptive record"));
        }

        let mut definitions = HashMap::new();
        for field in fields {
            if field.tag == FILE_CONTROL_TAG {
                continue;
            }
            let definition = FieldDefinition::parse(
                field.tag,
                field.data,
                leader.field_control_length,
                field.offset,
            )?;
            definitions.insert(definition.tag.clone(), definition);
        }
        tracing::trace!("ISO 8211 DDR describes {} fields", definitions.len());

        Ok(Self {
            data,
            position: leader.record_length,
            definitions,
        })
    }

    pub fn definition(&self, tag: &str) -> Option<&FieldDefinition> {
        self.definitions.get(tag)
    }

    /// Next data record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<DataRecord<'a>>> {
        let remaining = &self.data[self.position.min(self.data.len())..];
        // Some producers pad the file tail
        if remaining.iter().all(|b| *b == 0 || *b == b' ') {
            return Ok(None);
        }

        let offset = self.position;
        let (leader, fields) = read_record(self.data, offset)?;
        self.position += leader.record_length;
        Ok(Some(DataRecord { offset, fields }))
    }

    /// Decode `field` with its DDR definition; `None` for tags the DDR does not describe.
    pub fn decode(&self, field: &RawField<'_>) -> Result<Option<DecodedField>> {
        match self.definitions.get(field.tag) {
            Some(definition) => decode_field(definition, field.data, field.offset).map(Some),
            None => Ok(None),
        }
    }

    /// Decode the first field tagged `tag` in `record`.
    pub fn decode_tag(&self, record: &DataRecord<'_>, tag: &str) -> Result<Option<DecodedField>> {
        match record.field(tag) {
            Some(field) => self.decode(field),
            None => Ok(None),
        }
    }
}

fn read_record(data: &[u8], offset: usize) -> Result<(Leader, Vec<RawField<'_>>)> {
    let remaining = &data[offset..];
    let leader = Leader::parse(remaining, offset)?;
    if leader.record_length > remaining.len() {
        return Err(ChartError::corrupt(
            offset,
            format!(
                "record length {} exceeds the {} bytes remaining",
                leader.record_length,
                remaining.len()
            ),
        ));
    }
    let record = &remaining[..leader.record_length];

    let directory = &record[LEADER_LEN..leader.base_address];
    let directory_len = directory
        .iter()
        .position(|b| *b == FIELD_TERMINATOR)
        .unwrap_or(directory.len());
    let entry_size = leader.entry_size();
    if directory_len % entry_size != 0 {
        return Err(ChartError::corrupt(
            offset + LEADER_LEN,
            format!("directory of {} bytes is not a multiple of {}", directory_len, entry_size),
        ));
    }

    let mut fields = Vec::with_capacity(directory_len / entry_size);
    for (index, entry) in directory[..directory_len].chunks_exact(entry_size).enumerate() {
        let entry_offset = offset + LEADER_LEN + index * entry_size;
        let (tag, rest) = entry.split_at(leader.size_field_tag);
        let (length, position) = rest.split_at(leader.size_field_length);
        let tag = std::str::from_utf8(tag)
            .map_err(|_| ChartError::corrupt(entry_offset, "non-ASCII field tag"))?;
        let length = ascii_number(length, entry_offset, "field length")?;
        let position = ascii_number(position, entry_offset, "field position")?;

        let start = leader.base_address + position;
        let end = start + length;
        if end > record.len() {
            return Err(ChartError::corrupt(
                offset + start.min(record.len()),
                format!("field {} extends past the end of its record", tag),
            ));
        }
        let mut field = &record[start..end];
        if let Some((&FIELD_TERMINATOR, body)) = field.split_last() {
            field = body;
        }
        fields.push(RawField {
            tag,
            data: field,
            offset: offset + start,
        });
    }

    Ok((leader, fields))
}

fn decode_field(definition: &FieldDefinition, data: &[u8], offset: usize) -> Result<DecodedField> {
    let mut groups = Vec::new();
    if !definition.labels.is_empty() {
        if definition.labels.len() != definition.formats.len() {
            return Err(ChartError::corrupt(
                offset,
                format!(
                    "field {} has {} labels but {} formats",
                    definition.tag,
                    definition.labels.len(),
                    definition.formats.len()
                ),
            ));
        }

        let mut cursor = 0;
        while cursor < data.len() {
            let group_start = cursor;
            let mut group = Vec::with_capacity(definition.formats.len());
            for format in &definition.formats {
                let (value, used) = read_subfield(&data[cursor..], *format, offset + cursor)?;
                cursor += used;
                group.push(value);
            }
            if cursor == group_start {
                return Err(ChartError::corrupt(
                    offset + cursor,
                    format!("field {} has a subfield group of zero width", definition.tag),
                ));
            }
            groups.push(group);
            if !definition.repeating {
                break;
            }
        }
    }

    Ok(DecodedField {
        tag: definition.tag.clone(),
        labels: definition.labels.clone(),
        groups,
    })
}

fn take(bytes: &[u8], width: usize, offset: usize) -> Result<&[u8]> {
    bytes.get(..width).ok_or_else(|| {
        ChartError::corrupt(
            offset,
            format!("subfield needs {} bytes, {} remain", width, bytes.len()),
        )
    })
}

fn read_subfield(
    bytes: &[u8],
    format: SubfieldFormat,
    offset: usize,
) -> Result<(SubfieldValue, usize)> {
    match format {
        SubfieldFormat::Unsigned(width) => {
            let raw = take(bytes, width, offset)?;
            let value = match width {
                1 => raw[0] as i64,
                2 => u16::from_le_bytes([raw[0], raw[1]]) as i64,
                _ => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
            };
            Ok((SubfieldValue::Int(value), width))
        }
        SubfieldFormat::Signed(width) => {
            let raw = take(bytes, width, offset)?;
            let value = match width {
                1 => raw[0] as i8 as i64,
                2 => i16::from_le_bytes([raw[0], raw[1]]) as i64,
                _ => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
            };
            Ok((SubfieldValue::Int(value), width))
        }
        SubfieldFormat::Bits(bits) => {
            let width = bits.div_ceil(8);
            Ok((SubfieldValue::Bytes(take(bytes, width, offset)?.to_vec()), width))
        }
        SubfieldFormat::Text(width)
        | SubfieldFormat::Integer(width)
        | SubfieldFormat::Real(width) => {
            let (raw, used) = match width {
                Some(width) => (take(bytes, width, offset)?, width),
                None => match bytes.iter().position(|b| *b == UNIT_TERMINATOR) {
                    Some(end) => (&bytes[..end], end + 1),
                    None => (bytes, bytes.len()),
                },
            };
            let text = latin1(raw);
            let value = match format {
                SubfieldFormat::Integer(_) => match text.trim().parse() {
                    Ok(v) => SubfieldValue::Int(v),
                    Err(_) => SubfieldValue::Text(text),
                },
                SubfieldFormat::Real(_) => match text.trim().parse() {
                    Ok(v) => SubfieldValue::Real(v),
                    Err(_) => SubfieldValue::Text(text),
                },
                _ => SubfieldValue::Text(text),
            };
            Ok((value, used))
        }
    }
}

/// Lexical levels 0 and 1 are ASCII and ISO 8859-1, both map byte-for-char.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::test_support::iso8211::{data_record, ddr, ddr_field};

    #[test]
    fn test_format_controls() {
        assert_eq!(
            parse_format_controls("(b11,b14,2b11,A(8),R(4),B(40),A)"),
            Some(vec![
                SubfieldFormat::Unsigned(1),
                SubfieldFormat::Unsigned(4),
                SubfieldFormat::Unsigned(1),
                SubfieldFormat::Unsigned(1),
                SubfieldFormat::Text(Some(8)),
                SubfieldFormat::Real(Some(4)),
                SubfieldFormat::Bits(40),
                SubfieldFormat::Text(None),
            ])
        );
        assert_eq!(
            parse_format_controls("(2(b24,b12))"),
            Some(vec![
                SubfieldFormat::Signed(4),
                SubfieldFormat::Unsigned(2),
                SubfieldFormat::Signed(4),
                SubfieldFormat::Unsigned(2),
            ])
        );
        assert_eq!(parse_format_controls("(b13)"), None);
        assert_eq!(parse_format_controls("(X(3))"), None);
        assert_eq!(parse_format_controls("(A(0))"), None);
        assert_eq!(parse_format_controls("(b11,B(0))"), None);
    }

    fn sample_file() -> Vec<u8> {
        let mut file = ddr(&[
            ddr_field("0001", "ISO 8211 Record Identifier", "", "(b12)"),
            ddr_field("ATTF", "Feature record attribute field", "*ATTL!ATVL", "(b12,A)"),
            ddr_field("SG2D", "2-D coordinate field", "*YCOO!XCOO", "(b24,b24)"),
        ]);
        let mut attf = Vec::new();
        attf.extend_from_slice(&116u16.to_le_bytes());
        attf.extend_from_slice(b"Alki Point");
        attf.push(UNIT_TERMINATOR);
        attf.extend_from_slice(&75u16.to_le_bytes());
        attf.extend_from_slice(b"1,3");
        attf.push(UNIT_TERMINATOR);

        let mut sg2d = Vec::new();
        for (y, x) in [(476_000_000i32, -1_223_500_000i32), (-1, 2)] {
            sg2d.extend_from_slice(&y.to_le_bytes());
            sg2d.extend_from_slice(&x.to_le_bytes());
        }

        file.extend(data_record(&[
            ("0001", 1u16.to_le_bytes().to_vec()),
            ("ATTF", attf),
            ("SG2D", sg2d),
            ("XXXX", b"opaque".to_vec()),
        ]));
        file
    }

    #[test]
    fn test_reads_records_and_repeating_groups() {
        let file = sample_file();
        let mut reader = Iso8211Reader::new(&file).unwrap();
        assert_eq!(reader.definition("SG2D").unwrap().labels, vec!["YCOO", "XCOO"]);
        assert!(reader.definition("SG2D").unwrap().repeating);

        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.fields.len(), 4);

        let attf = reader.decode_tag(&record, "ATTF").unwrap().unwrap();
        let pairs: Vec<(i64, String)> = attf
            .groups()
            .map(|g| (g.int("ATTL").unwrap(), g.text("ATVL").unwrap().to_string()))
            .collect();
        assert_eq!(pairs, vec![(116, "Alki Point".to_string()), (75, "1,3".to_string())]);

        let sg2d = reader.decode_tag(&record, "SG2D").unwrap().unwrap();
        assert_eq!(sg2d.group_count(), 2);
        assert_eq!(sg2d.int("YCOO"), Some(476_000_000));
        assert_eq!(sg2d.int("XCOO"), Some(-1_223_500_000));

        // Not described by the DDR
        let opaque = record.field("XXXX").unwrap();
        assert!(reader.decode(opaque).unwrap().is_none());

        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_truncation_reports_offset() {
        let file = sample_file();
        let cut = &file[..file.len() - 10];
        let mut reader = Iso8211Reader::new(cut).unwrap();
        match reader.next_record() {
            Err(ChartError::CorruptData { offset: Some(_), reason, .. }) => {
                assert!(reason.contains("exceeds"), "{}", reason);
            }
            other => panic!("expected corrupt data, got {:?}", other.map(|r| r.is_some())),
        }

        assert!(matches!(
            Iso8211Reader::new(&file[..10]),
            Err(ChartError::CorruptData { offset: Some(0), .. })
        ));
        assert!(Iso8211Reader::new(b"").is_err());
    }

    #[test]
    fn test_short_binary_subfield_is_corrupt() {
        let frid = ddr_field("FRID", "Feature record identifier", "RCNM!RCID", "(b11,b14)");
        let mut file = ddr(&[frid]);
        file.extend(data_record(&[("FRID", vec![100, 1, 0])]));

        let mut reader = Iso8211Reader::new(&file).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert!(matches!(
            reader.decode_tag(&record, "FRID"),
            Err(ChartError::CorruptData { .. })
        ));
    }

    #[test]
    fn test_zero_width_repeating_format_is_rejected() {
        let file = ddr(&[ddr_field("ATTF", "attrs", "*ATTL", "(A(0))")]);
        assert!(matches!(
            Iso8211Reader::new(&file),
            Err(ChartError::CorruptData { .. })
        ));
    }

    #[test]
    fn test_zero_width_group_stops_decoding() {
        let definition = FieldDefinition {
            tag: "ATTF".to_string(),
            name: "attrs".to_string(),
            repeating: true,
            labels: vec!["ATTL".to_string()],
            formats: vec![SubfieldFormat::Text(Some(0))],
        };
        match decode_field(&definition, b"xyz", 100) {
            Err(ChartError::CorruptData { offset, .. }) => assert_eq!(offset, Some(100)),
            other => panic!("expected corrupt data, got {:?}", other.map(|f| f.group_count())),
        }
    }

    #[test]
    fn test_data_record_first_is_rejected() {
        let file = data_record(&[("0001", vec![1, 0])]);
        assert!(matches!(
            Iso8211Reader::new(&file),
            Err(ChartError::CorruptData { offset: Some(6), .. })
        ));
    }
}
