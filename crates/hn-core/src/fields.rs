//! # Field tables
//!
//! Each record kind declares its fields once, as a constant table of
//! `(name, kind, presence)`. The parser, the index schema and the row
//! mapping of the relational backend are all driven from these tables.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::enums::{AnnotationType, ContentType, RecordKind, UpRel};
use crate::error::ArchiveError;

/// The declared type of a field, selecting its conversion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Text,
    Date,
    Url,
    ContentType,
    AnnotationType,
    UpRel,
}

/// What happens when a field is absent from a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Absent fields take this raw token, converted like any other value
    Default(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Normalized (snake_case) key, also the index column name
    pub name: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

impl FieldSpec {
    const fn new(name: &'static str, kind: FieldKind, presence: Presence) -> Self {
        Self {
            name,
            kind,
            presence,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.presence == Presence::Optional
    }
}

/// The ordered groups of fields making up one record kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldTable(&'static [&'static [FieldSpec]]);

impl FieldTable {
    pub fn iter(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.0.iter().flat_map(|group| group.iter())
    }

    pub fn get(&self, name: &str) -> Option<&'static FieldSpec> {
        self.iter().find(|spec| spec.name == name)
    }
}

use FieldKind as K;
use Presence::{Default as D, Optional as O, Required as R};

/// Fields shared by forum ("main") and message records.
pub const BASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("responses", K::Text, R),
    FieldSpec::new("title", K::Text, R),
    FieldSpec::new("date", K::Date, R),
    FieldSpec::new("content_type", K::ContentType, D("Default")),
    FieldSpec::new("annotation_type", K::AnnotationType, D("Default")),
    FieldSpec::new("last_message_date", K::Date, O),
    FieldSpec::new("last_mod", K::Date, O),
    FieldSpec::new("name", K::Text, O),
    FieldSpec::new("from_", K::Text, O),
    FieldSpec::new("num_messages", K::Int, O),
    FieldSpec::new("moderation", K::Text, O),
    FieldSpec::new("base_url", K::Url, O),
    FieldSpec::new("footer_url", K::Url, O),
    FieldSpec::new("header_url", K::Url, O),
    FieldSpec::new("user_url", K::Url, O),
];

pub const FORUM_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("num", K::Text, R),
    FieldSpec::new("list_address", K::Text, O),
    FieldSpec::new("categories", K::Int, O),
    FieldSpec::new("default_outline_depth", K::Int, O),
];

pub const MESSAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("num", K::Int, R),
    FieldSpec::new("previous_num", K::Int, O),
    FieldSpec::new("next_num", K::Int, O),
    FieldSpec::new("keywords", K::Text, O),
    FieldSpec::new("up_rel", K::UpRel, D("Default")),
    FieldSpec::new("node_type", K::Text, O),
    FieldSpec::new("newsgroups", K::Url, O),
    FieldSpec::new("message_id", K::Text, O),
];

/// Person records default almost everything; the key `AltUserIDs`
/// normalizes to `alt_user_i_ds`.
pub const PERSON_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("user_id", K::Text, R),
    FieldSpec::new("name", K::Text, R),
    FieldSpec::new("status", K::Text, R),
    FieldSpec::new("session_length", K::Text, D("default")),
    FieldSpec::new("format", K::Text, D("PlainText")),
    FieldSpec::new("hide", K::Text, D("Nothing")),
    FieldSpec::new("password", K::Text, D("")),
    FieldSpec::new("user_url", K::Text, D("")),
    FieldSpec::new("content", K::Text, D("Everything")),
    FieldSpec::new("email", K::Text, D("")),
    FieldSpec::new("old_email", K::Text, D("")),
    FieldSpec::new("email2", K::Text, D("")),
    FieldSpec::new("subscribe", K::Text, D("")),
    FieldSpec::new("alt_user_i_ds", K::Text, D("")),
];

pub const FORUM_TABLE: FieldTable = FieldTable(&[BASE_FIELDS, FORUM_FIELDS]);
pub const MESSAGE_TABLE: FieldTable = FieldTable(&[BASE_FIELDS, MESSAGE_FIELDS]);
pub const PERSON_TABLE: FieldTable = FieldTable(&[PERSON_FIELDS]);

/// A converted field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Date(DateTime<Utc>),
    Url(String),
    ContentType(ContentType),
    AnnotationType(AnnotationType),
    UpRel(UpRel),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(v) => Some(*v),
            _ => None,
        }
    }

    /// The textual spelling stored in TEXT columns.
    pub fn to_token(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Text(v) | FieldValue::Url(v) => v.clone(),
            FieldValue::Date(v) => v.to_rfc3339(),
            FieldValue::ContentType(v) => v.as_str().to_string(),
            FieldValue::AnnotationType(v) => v.as_str().to_string(),
            FieldValue::UpRel(v) => v.as_str().to_string(),
        }
    }
}

/// Converted values for one record, keyed by field name, plus the
/// context needed to report errors against the record's source.
#[derive(Debug, Clone)]
pub struct FieldValues {
    kind: RecordKind,
    source: String,
    values: BTreeMap<&'static str, FieldValue>,
}

impl FieldValues {
    pub fn new(kind: RecordKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.values.insert(name, value);
    }

    /// Inserts `value` only when present.
    pub fn insert_opt(&mut self, name: &'static str, value: Option<FieldValue>) {
        if let Some(value) = value {
            self.values.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn take_text(&mut self, name: &'static str) -> Option<String> {
        match self.values.remove(name)? {
            FieldValue::Text(v) | FieldValue::Url(v) => Some(v),
            _ => None,
        }
    }

    pub fn take_int(&mut self, name: &'static str) -> Option<i64> {
        self.values.remove(name)?.as_int()
    }

    pub fn take_date(&mut self, name: &'static str) -> Option<DateTime<Utc>> {
        self.values.remove(name)?.as_date()
    }

    pub fn take_content_type(&mut self, name: &'static str) -> ContentType {
        match self.values.remove(name) {
            Some(FieldValue::ContentType(v)) => v,
            _ => ContentType::default(),
        }
    }

    pub fn take_annotation_type(&mut self, name: &'static str) -> AnnotationType {
        match self.values.remove(name) {
            Some(FieldValue::AnnotationType(v)) => v,
            _ => AnnotationType::default(),
        }
    }

    pub fn take_up_rel(&mut self, name: &'static str) -> UpRel {
        match self.values.remove(name) {
            Some(FieldValue::UpRel(v)) => v,
            _ => UpRel::default(),
        }
    }

    pub fn require_text(&mut self, name: &'static str) -> Result<String, ArchiveError> {
        self.take_text(name).ok_or_else(|| self.missing(name))
    }

    pub fn require_int(&mut self, name: &'static str) -> Result<i64, ArchiveError> {
        self.take_int(name).ok_or_else(|| self.missing(name))
    }

    pub fn require_date(&mut self, name: &'static str) -> Result<DateTime<Utc>, ArchiveError> {
        self.take_date(name).ok_or_else(|| self.missing(name))
    }

    pub fn missing(&self, field: &'static str) -> ArchiveError {
        ArchiveError::MissingField {
            field,
            kind: self.kind,
            source_path: self.source.clone(),
        }
    }

    pub fn invalid(&self, field: &'static str, value: &str) -> ArchiveError {
        ArchiveError::InvalidValue {
            field,
            value: value.to_string(),
            kind: self.kind,
            source_path: self.source.clone(),
        }
    }

    pub fn unrecognized(&self, field: &'static str, value: &str) -> ArchiveError {
        ArchiveError::UnrecognizedValue {
            field,
            value: value.to_string(),
            kind: self.kind,
            source_path: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_have_unique_names() {
        for table in [FORUM_TABLE, MESSAGE_TABLE, PERSON_TABLE] {
            let mut names: Vec<_> = table.iter().map(|f| f.name).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), total);
        }
    }

    #[test]
    fn num_is_typed_per_kind() {
        assert_eq!(MESSAGE_TABLE.get("num").unwrap().kind, FieldKind::Int);
        assert_eq!(FORUM_TABLE.get("num").unwrap().kind, FieldKind::Text);
        assert!(MESSAGE_TABLE.get("list_address").is_none());
        assert!(MESSAGE_TABLE.get("responses").is_some());
    }

    #[test]
    fn missing_field_error_names_everything() {
        let mut values = FieldValues::new(RecordKind::Message, "hnTest/6.html,urc");
        let err = values.require_text("title").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("title"));
        assert!(text.contains("hnTest/6.html,urc"));
        assert!(text.contains("message"));
        assert!(err.is_malformed());
    }
}
