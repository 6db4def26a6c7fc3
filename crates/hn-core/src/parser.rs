//! # Legacy record parser
//!
//! Record files are Latin-1 text with one `Key: value` pair per line.
//! Parsing happens in two steps: [`RawFields::parse`] produces a map of
//! normalized keys to raw strings, and [`structure`] converts that map
//! into a typed [`Record`] using the record kind's field table.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::convert::{convert, Rejection};
use crate::enums::RecordKind;
use crate::error::{ArchiveError, Result};
use crate::fields::{FieldSpec, FieldValues, Presence};
use crate::models::Record;

/// Carriage return plus the C1 control bytes some exports sprinkled into
/// records; `0x85` (NEL) in particular would otherwise read as a line break.
const STRIPPED_BYTES: [u8; 5] = [b'\r', 0x81, 0x85, 0x8d, 0x8f];

/// Decode Latin-1: every byte is the code point of the same value.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Normalize a record key to snake_case.
///
/// `Content-Type` becomes `content_type`, `AltUserIDs` becomes
/// `alt_user_i_ds`; `From` maps to `from_` so it never clashes with a
/// reserved word in generated code or SQL.
pub fn normalize_key(key: &str) -> String {
    if key == "From" {
        return "from_".to_string();
    }

    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next = chars.get(i + 1).copied();
            let after_lower = prev.is_ascii_lowercase() || prev.is_ascii_digit();
            let ends_acronym =
                prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase());
            if after_lower || ends_acronym {
                out.push('_');
            }
        }
        match c {
            '-' => out.push('_'),
            c => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

/// The normalized key/value pairs of one record file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields(BTreeMap<String, String>);

impl RawFields {
    /// Parse raw record bytes. Never fails: lines without a colon are
    /// ignored and empty values count as absent.
    pub fn parse(bytes: &[u8]) -> Self {
        let cleaned: Vec<u8> = bytes
            .iter()
            .copied()
            .filter(|b| !STRIPPED_BYTES.contains(b))
            .collect();
        let text = decode_latin1(&cleaned);

        let mut fields = BTreeMap::new();
        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            fields.insert(normalize_key(key), value.to_string());
        }
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

/// Convert raw fields into a typed record of kind `R`.
///
/// `source` names the record in error messages (usually its file path).
pub fn structure<R: Record>(raw: &RawFields, source: &str) -> Result<R> {
    let mut values = FieldValues::new(R::KIND, source);
    for spec in R::field_table().iter() {
        let token = match (raw.get(spec.name), spec.presence) {
            (Some(token), _) => token,
            (None, Presence::Default(token)) => token,
            (None, Presence::Optional) => continue,
            (None, Presence::Required) => return Err(values.missing(spec.name)),
        };
        let value = convert(spec.kind, token).map_err(|rejection| {
            conversion_error(&values, spec, token, rejection)
        })?;
        values.insert(spec.name, value);
    }
    R::from_values(values)
}

/// Parse record bytes straight into a typed record.
pub fn parse_record<R: Record>(bytes: &[u8], source: &str) -> Result<R> {
    structure(&RawFields::parse(bytes), source)
}

/// Parse a categories file: one `"<integer> <name>"` pair per line.
pub fn parse_categories(text: &str, source: &str) -> Result<BTreeMap<i64, String>> {
    let mut categories = BTreeMap::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (id, name) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let id = id.parse::<i64>().map_err(|_| ArchiveError::InvalidValue {
            field: "category",
            value: line.to_string(),
            kind: RecordKind::Forum,
            source_path: source.to_string(),
        })?;
        categories.insert(id, name.trim().to_string());
    }
    Ok(categories)
}

fn conversion_error(
    values: &FieldValues,
    spec: &FieldSpec,
    token: &str,
    rejection: Rejection,
) -> ArchiveError {
    match rejection {
        Rejection::Unrecognized => values.unrecognized(spec.name, token),
        Rejection::Invalid => values.invalid(spec.name, token),
    }
}
