//! # Domain Models
//!
//! These structs represent the records of a HyperNews archive.
//! A record is a plain value: two parses of the same bytes compare equal,
//! and no identity survives beyond the query that produced it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::enums::{AnnotationType, ContentType, UpRel};
use crate::error::Result;
use crate::fields::{
    FieldTable, FieldValue, FieldValues, FORUM_TABLE, MESSAGE_TABLE, PERSON_TABLE,
};
use crate::layout::ArchiveLayout;

pub use crate::enums::RecordKind;

/// A record kind that can be built from, and flattened into, field values.
pub trait Record: Sized {
    const KIND: RecordKind;

    fn field_table() -> FieldTable;

    fn from_values(values: FieldValues) -> Result<Self>;

    fn to_values(&self) -> FieldValues;
}

/// Fields shared by forum main records and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBase {
    /// Canonical address (e.g. "hnTest/6/1"); the record's identity
    pub responses: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub content_type: ContentType,
    pub annotation_type: AnnotationType,
    pub last_message_date: Option<DateTime<Utc>>,
    pub last_mod: Option<DateTime<Utc>>,
    /// Submitter display name
    pub name: Option<String>,
    /// Submitter email (the `From` key)
    pub from: Option<String>,
    pub num_messages: Option<i64>,
    pub moderation: Option<String>,
    pub base_url: Option<String>,
    pub footer_url: Option<String>,
    pub header_url: Option<String>,
    pub user_url: Option<String>,
}

impl RecordBase {
    fn take(values: &mut FieldValues) -> Result<Self> {
        Ok(Self {
            responses: values.require_text("responses")?,
            title: values.require_text("title")?,
            date: values.require_date("date")?,
            content_type: values.take_content_type("content_type"),
            annotation_type: values.take_annotation_type("annotation_type"),
            last_message_date: values.take_date("last_message_date"),
            last_mod: values.take_date("last_mod"),
            name: values.take_text("name"),
            from: values.take_text("from_"),
            num_messages: values.take_int("num_messages"),
            moderation: values.take_text("moderation"),
            base_url: values.take_text("base_url"),
            footer_url: values.take_text("footer_url"),
            header_url: values.take_text("header_url"),
            user_url: values.take_text("user_url"),
        })
    }

    fn put(&self, values: &mut FieldValues) {
        values.insert("responses", FieldValue::Text(self.responses.clone()));
        values.insert("title", FieldValue::Text(self.title.clone()));
        values.insert("date", FieldValue::Date(self.date));
        values.insert("content_type", FieldValue::ContentType(self.content_type));
        values.insert(
            "annotation_type",
            FieldValue::AnnotationType(self.annotation_type),
        );
        values.insert_opt("last_message_date", self.last_message_date.map(FieldValue::Date));
        values.insert_opt("last_mod", self.last_mod.map(FieldValue::Date));
        values.insert_opt("name", self.name.clone().map(FieldValue::Text));
        values.insert_opt("from_", self.from.clone().map(FieldValue::Text));
        values.insert_opt("num_messages", self.num_messages.map(FieldValue::Int));
        values.insert_opt("moderation", self.moderation.clone().map(FieldValue::Text));
        values.insert_opt("base_url", self.base_url.clone().map(FieldValue::Url));
        values.insert_opt("footer_url", self.footer_url.clone().map(FieldValue::Url));
        values.insert_opt("header_url", self.header_url.clone().map(FieldValue::Url));
        values.insert_opt("user_url", self.user_url.clone().map(FieldValue::Url));
    }

    /// Replace `responses` with its canonical spelling, checking it names
    /// the right kind of record.
    fn canonicalize(&mut self, values: &FieldValues, want_forum: bool) -> Result<Address> {
        let address = Address::parse(&self.responses)
            .map_err(|_| values.invalid("responses", &self.responses))?;
        if address.is_forum() != want_forum {
            return Err(values.invalid("responses", &self.responses));
        }
        self.responses = address.to_string();
        Ok(address)
    }

    /// The parsed address. Only fails if `responses` was edited after
    /// the record was built.
    pub fn address(&self) -> Result<Address> {
        Address::parse(&self.responses)
    }

    /// Canonical URL, derived from the address.
    pub fn url(&self) -> Result<String> {
        Ok(self.address()?.url())
    }

    /// Canonical URL of the parent; `None` for a forum.
    pub fn up_url(&self) -> Result<Option<String>> {
        Ok(self.address()?.parent_url())
    }

    pub fn body_file(&self, layout: &ArchiveLayout) -> Result<PathBuf> {
        Ok(layout.body_file(&self.address()?))
    }
}

/// A forum's "main" record, the root of one discussion tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forum {
    #[serde(flatten)]
    pub base: RecordBase,
    /// The forum name (e.g. "hnTest")
    pub num: String,
    pub list_address: Option<String>,
    /// Category code, resolved through the categories file
    pub categories: Option<i64>,
    pub default_outline_depth: Option<i64>,
}

impl Forum {
    pub fn name(&self) -> &str {
        &self.num
    }
}

impl Record for Forum {
    const KIND: RecordKind = RecordKind::Forum;

    fn field_table() -> FieldTable {
        FORUM_TABLE
    }

    fn from_values(mut values: FieldValues) -> Result<Self> {
        let mut base = RecordBase::take(&mut values)?;
        base.canonicalize(&values, true)?;
        Ok(Self {
            base,
            num: values.require_text("num")?,
            list_address: values.take_text("list_address"),
            categories: values.take_int("categories"),
            default_outline_depth: values.take_int("default_outline_depth"),
        })
    }

    fn to_values(&self) -> FieldValues {
        let mut values = FieldValues::new(Self::KIND, self.base.responses.clone());
        self.base.put(&mut values);
        values.insert("num", FieldValue::Text(self.num.clone()));
        values.insert_opt("list_address", self.list_address.clone().map(FieldValue::Text));
        values.insert_opt("categories", self.categories.map(FieldValue::Int));
        values.insert_opt(
            "default_outline_depth",
            self.default_outline_depth.map(FieldValue::Int),
        );
        values
    }
}

/// One node of a forum's reply tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub base: RecordBase,
    /// Forum the message belongs to (first address segment)
    pub forum: String,
    /// Path inside the forum (e.g. "6/1")
    pub msg: String,
    /// Parent path inside the forum; empty for top level messages
    pub up: String,
    pub num: i64,
    pub previous_num: Option<i64>,
    pub next_num: Option<i64>,
    pub keywords: Option<String>,
    pub up_rel: UpRel,
    pub node_type: Option<String>,
    pub newsgroups: Option<String>,
    pub message_id: Option<String>,
}

impl Record for Message {
    const KIND: RecordKind = RecordKind::Message;

    fn field_table() -> FieldTable {
        MESSAGE_TABLE
    }

    fn from_values(mut values: FieldValues) -> Result<Self> {
        let mut base = RecordBase::take(&mut values)?;
        let address = base.canonicalize(&values, false)?;
        let num = values.require_int("num")?;
        // The identifier must agree with the last address segment so that
        // ordering by `num` and by file name coincide.
        if u64::try_from(num).ok() != address.num() {
            return Err(values.invalid("num", &num.to_string()));
        }
        Ok(Self {
            base,
            forum: address.forum_name().to_string(),
            msg: address.msg_path(),
            up: address.up_path(),
            num,
            previous_num: values.take_int("previous_num"),
            next_num: values.take_int("next_num"),
            keywords: values.take_text("keywords"),
            up_rel: values.take_up_rel("up_rel"),
            node_type: values.take_text("node_type"),
            newsgroups: values.take_text("newsgroups"),
            message_id: values.take_text("message_id"),
        })
    }

    fn to_values(&self) -> FieldValues {
        let mut values = FieldValues::new(Self::KIND, self.base.responses.clone());
        self.base.put(&mut values);
        values.insert("num", FieldValue::Int(self.num));
        values.insert_opt("previous_num", self.previous_num.map(FieldValue::Int));
        values.insert_opt("next_num", self.next_num.map(FieldValue::Int));
        values.insert_opt("keywords", self.keywords.clone().map(FieldValue::Text));
        values.insert("up_rel", FieldValue::UpRel(self.up_rel));
        values.insert_opt("node_type", self.node_type.clone().map(FieldValue::Text));
        values.insert_opt("newsgroups", self.newsgroups.clone().map(FieldValue::Url));
        values.insert_opt("message_id", self.message_id.clone().map(FieldValue::Text));
        values
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub user_id: String,
    pub name: String,
    pub status: String,
    pub session_length: String,
    pub format: String,
    pub hide: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub user_url: String,
    pub content: String,
    pub email: String,
    pub old_email: String,
    pub email2: String,
    pub subscribe: String,
    pub alt_user_ids: String,
}

impl Record for Person {
    const KIND: RecordKind = RecordKind::Person;

    fn field_table() -> FieldTable {
        PERSON_TABLE
    }

    fn from_values(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            user_id: values.require_text("user_id")?,
            name: values.require_text("name")?,
            status: values.require_text("status")?,
            session_length: values.require_text("session_length")?,
            format: values.require_text("format")?,
            hide: values.require_text("hide")?,
            password: values.require_text("password")?,
            user_url: values.require_text("user_url")?,
            content: values.require_text("content")?,
            email: values.require_text("email")?,
            old_email: values.require_text("old_email")?,
            email2: values.require_text("email2")?,
            subscribe: values.require_text("subscribe")?,
            alt_user_ids: values.require_text("alt_user_i_ds")?,
        })
    }

    fn to_values(&self) -> FieldValues {
        let mut values = FieldValues::new(Self::KIND, self.user_id.clone());
        for (name, value) in [
            ("user_id", &self.user_id),
            ("name", &self.name),
            ("status", &self.status),
            ("session_length", &self.session_length),
            ("format", &self.format),
            ("hide", &self.hide),
            ("password", &self.password),
            ("user_url", &self.user_url),
            ("content", &self.content),
            ("email", &self.email),
            ("old_email", &self.old_email),
            ("email2", &self.email2),
            ("subscribe", &self.subscribe),
            ("alt_user_i_ds", &self.alt_user_ids),
        ] {
            values.insert(name, FieldValue::Text(value.clone()));
        }
        values
    }
}

/// One entry of a forum listing. Listings report broken main records
/// instead of failing; callers filter with [`ForumEntry::parsed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForumEntry {
    Parsed(Forum),
    Unparseable { name: String, reason: String },
}

impl ForumEntry {
    pub fn parsed(self) -> Option<Forum> {
        match self {
            ForumEntry::Parsed(forum) => Some(forum),
            ForumEntry::Unparseable { .. } => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ForumEntry::Parsed(forum) => forum.name(),
            ForumEntry::Unparseable { name, .. } => name,
        }
    }
}
