//! # Enumerated record fields
//!
//! Each enum maps the legacy string tokens found in record files onto a
//! variant, and back onto a canonical token for storage in the index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three record kinds held by the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// A forum's "main" record
    Forum,
    Message,
    Person,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Forum => "forum",
            RecordKind::Message => "message",
            RecordKind::Person => "person",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the body of a message was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    Default,
    PlainText,
    #[serde(rename = "HTML")]
    Html,
    SmartText,
    WordProcessor,
}

impl ContentType {
    /// Any "Plain ..." spelling counts as plain text; the rest must match exactly.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Default" => Some(ContentType::Default),
            "HTML" => Some(ContentType::Html),
            "Smart Text" => Some(ContentType::SmartText),
            "Word Processor" => Some(ContentType::WordProcessor),
            t if t.starts_with("Plain") => Some(ContentType::PlainText),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Default => "Default",
            ContentType::PlainText => "Plain Text",
            ContentType::Html => "HTML",
            ContentType::SmartText => "Smart Text",
            ContentType::WordProcessor => "Word Processor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AnnotationType {
    #[default]
    Default,
    Message,
}

impl AnnotationType {
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("message") {
            Some(AnnotationType::Message)
        } else if token == "Default" {
            Some(AnnotationType::Default)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationType::Default => "Default",
            AnnotationType::Message => "Message",
        }
    }
}

/// The "mood" a reply carries relative to its parent (the `Up-Rel` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpRel {
    #[default]
    Default,
    None,
    News,
    Warning,
    Feedback,
    Question,
    More,
    Disagree,
    Note,
    Ok,
    Angry,
    Agree,
    Idea,
    Sad,
}

impl UpRel {
    const ALL: [UpRel; 14] = [
        UpRel::Default,
        UpRel::None,
        UpRel::News,
        UpRel::Warning,
        UpRel::Feedback,
        UpRel::Question,
        UpRel::More,
        UpRel::Disagree,
        UpRel::Note,
        UpRel::Ok,
        UpRel::Angry,
        UpRel::Agree,
        UpRel::Idea,
        UpRel::Sad,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rel| rel.as_str() == token)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpRel::Default => "Default",
            UpRel::None => "None",
            UpRel::News => "News",
            UpRel::Warning => "Warning",
            UpRel::Feedback => "Feedback",
            UpRel::Question => "Question",
            UpRel::More => "More",
            UpRel::Disagree => "Disagree",
            UpRel::Note => "Note",
            UpRel::Ok => "Ok",
            UpRel::Angry => "Angry",
            UpRel::Agree => "Agree",
            UpRel::Idea => "Idea",
            UpRel::Sad => "Sad",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_tokens() {
        assert_eq!(ContentType::from_token("Plain Text"), Some(ContentType::PlainText));
        assert_eq!(ContentType::from_token("Plaintext"), Some(ContentType::PlainText));
        assert_eq!(ContentType::from_token("HTML"), Some(ContentType::Html));
        assert_eq!(ContentType::from_token("Smart Text"), Some(ContentType::SmartText));
        assert_eq!(
            ContentType::from_token("Word Processor"),
            Some(ContentType::WordProcessor)
        );
        assert_eq!(ContentType::from_token("html"), None);
        assert_eq!(ContentType::from_token("Markdown"), None);
    }

    #[test]
    fn canonical_tokens_parse_back() {
        for ct in [
            ContentType::Default,
            ContentType::PlainText,
            ContentType::Html,
            ContentType::SmartText,
            ContentType::WordProcessor,
        ] {
            assert_eq!(ContentType::from_token(ct.as_str()), Some(ct));
        }
        for rel in UpRel::ALL {
            assert_eq!(UpRel::from_token(rel.as_str()), Some(rel));
        }
        assert_eq!(
            AnnotationType::from_token(AnnotationType::Message.as_str()),
            Some(AnnotationType::Message)
        );
    }

    #[test]
    fn annotation_is_case_insensitive() {
        assert_eq!(AnnotationType::from_token("message"), Some(AnnotationType::Message));
        assert_eq!(AnnotationType::from_token("MESSAGE"), Some(AnnotationType::Message));
        assert_eq!(AnnotationType::from_token("Comment"), None);
    }

    #[test]
    fn up_rel_rejects_unknown() {
        assert_eq!(UpRel::from_token("None"), Some(UpRel::None));
        assert_eq!(UpRel::from_token("Idea"), Some(UpRel::Idea));
        assert_eq!(UpRel::from_token("idea"), None);
        assert_eq!(UpRel::from_token("Happy"), None);
    }
}
