//! # Addressing
//!
//! An [`Address`] names a forum or a message: the forum name followed by
//! the numeric identifiers of each message on the way down, written
//! `hnTest/6/1`. Everything else (file locations, index keys, URLs, sibling
//! order) is computed from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

/// Suffix of every record file in the archive.
pub const RECORD_SUFFIX: &str = ".html,urc";

/// Suffix of the body text file stored beside a record.
pub const BODY_SUFFIX: &str = "-body.html";

/// Prefix of every canonical URL.
pub const URL_PREFIX: &str = "/get/";

/// Derives `Ord` so that sorting addresses yields depth-first pre-order:
/// a node sorts before its descendants, and siblings sort numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    forum: String,
    path: Vec<u64>,
}

impl Address {
    /// The address of a forum's main record.
    pub fn forum(name: &str) -> Result<Self> {
        validate_forum_name(name)?;
        Ok(Self {
            forum: name.to_string(),
            path: Vec::new(),
        })
    }

    /// A forum plus a slash-separated message path, which may be empty.
    pub fn new(forum: &str, path: &str) -> Result<Self> {
        let mut address = Self::forum(forum)?;
        let path = path.trim_matches('/');
        if !path.is_empty() {
            for segment in path.split('/') {
                address.path.push(parse_segment(segment).ok_or_else(|| {
                    ArchiveError::InvalidAddress(format!("{forum}/{path}"))
                })?);
            }
        }
        Ok(address)
    }

    /// Like [`Address::new`], but the path must name a message.
    pub fn message(forum: &str, path: &str) -> Result<Self> {
        let address = Self::new(forum, path)?;
        if address.is_forum() {
            return Err(ArchiveError::InvalidAddress(format!(
                "{forum}: message path must not be empty"
            )));
        }
        Ok(address)
    }

    /// Parse a `responses` value. Surrounding slashes, a leading `get/`
    /// and a trailing `.html` are accepted as legacy spellings.
    pub fn parse(responses: &str) -> Result<Self> {
        let trimmed = responses.trim().trim_matches('/');
        let trimmed = trimmed.strip_prefix("get/").unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix(".html").unwrap_or(trimmed);
        match trimmed.split_once('/') {
            Some((forum, path)) => Self::new(forum, path),
            None => Self::forum(trimmed),
        }
        .map_err(|_| ArchiveError::InvalidAddress(responses.to_string()))
    }

    pub fn forum_name(&self) -> &str {
        &self.forum
    }

    pub fn segments(&self) -> &[u64] {
        &self.path
    }

    pub fn is_forum(&self) -> bool {
        self.path.is_empty()
    }

    /// Number of message levels below the forum.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The message's own identifier; `None` for a forum.
    pub fn num(&self) -> Option<u64> {
        self.path.last().copied()
    }

    /// The path inside the forum, e.g. `6/1`; empty for a forum.
    pub fn msg_path(&self) -> String {
        join_segments(&self.path)
    }

    /// The enclosing address; a top level message's parent is its forum.
    pub fn parent(&self) -> Option<Address> {
        if self.is_forum() {
            return None;
        }
        Some(Self {
            forum: self.forum.clone(),
            path: self.path[..self.path.len() - 1].to_vec(),
        })
    }

    /// The parent's path inside the forum (the `up` index key).
    pub fn up_path(&self) -> String {
        match self.path.split_last() {
            Some((_, parent)) => join_segments(parent),
            None => String::new(),
        }
    }

    pub fn child(&self, num: u64) -> Address {
        let mut path = self.path.clone();
        path.push(num);
        Self {
            forum: self.forum.clone(),
            path,
        }
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &Address) -> bool {
        self.forum == ancestor.forum
            && self.path.len() > ancestor.path.len()
            && self.path.starts_with(&ancestor.path)
    }

    /// Canonical URL, e.g. `/get/hnTest/6/1.html`.
    pub fn url(&self) -> String {
        format!("{URL_PREFIX}{self}.html")
    }

    /// Canonical URL of the parent; `None` for a forum.
    pub fn parent_url(&self) -> Option<String> {
        self.parent().map(|parent| parent.url())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.forum)?;
        for segment in &self.path {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Parse a message identifier written in canonical decimal form.
///
/// `06` and `+6` are rejected so that an identifier has exactly one file name.
pub fn parse_segment(segment: &str) -> Option<u64> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

/// The numeric identifier of a record file name such as `12.html,urc`.
pub fn record_file_num(file_name: &str) -> Option<u64> {
    file_name.strip_suffix(RECORD_SUFFIX).and_then(parse_segment)
}

fn validate_forum_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        Err(ArchiveError::InvalidAddress(format!("invalid forum name {name:?}")))
    } else {
        Ok(())
    }
}

fn join_segments(segments: &[u64]) -> String {
    segments
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let address = Address::parse("/hnTest/6/1").unwrap();
        assert_eq!(address.forum_name(), "hnTest");
        assert_eq!(address.segments(), &[6, 1]);
        assert_eq!(address.to_string(), "hnTest/6/1");
        assert_eq!(address.msg_path(), "6/1");
        assert_eq!(address.up_path(), "6");
        assert_eq!(address.num(), Some(1));
    }

    #[test]
    fn legacy_spellings() {
        let canonical = Address::parse("hnTest/6").unwrap();
        assert_eq!(Address::parse("get/hnTest/6.html").unwrap(), canonical);
        assert_eq!(Address::parse("/hnTest/6/").unwrap(), canonical);
        assert!(Address::parse("hnTest").unwrap().is_forum());
    }

    #[test]
    fn rejects_bad_paths() {
        assert!(Address::new("hnTest", "6/x").is_err());
        assert!(Address::new("hnTest", "06").is_err());
        assert!(Address::new("", "6").is_err());
        assert!(Address::new("..", "").is_err());
        assert!(matches!(
            Address::message("hnTest", ""),
            Err(ArchiveError::InvalidAddress(_))
        ));
    }

    #[test]
    fn parent_is_strict_prefix() {
        let address = Address::new("hnTest", "6/1/3").unwrap();
        let parent = address.parent().unwrap();
        assert_eq!(parent.to_string(), "hnTest/6/1");
        assert_eq!(parent.depth() + 1, address.depth());
        assert!(address.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&address));

        let top = Address::new("hnTest", "6").unwrap();
        assert_eq!(top.parent().unwrap(), Address::forum("hnTest").unwrap());
        assert_eq!(top.up_path(), "");
        assert!(Address::forum("hnTest").unwrap().parent().is_none());
    }

    #[test]
    fn urls_derive_from_address() {
        let address = Address::new("hnTest", "6/1").unwrap();
        assert_eq!(address.url(), "/get/hnTest/6/1.html");
        assert_eq!(address.parent_url().unwrap(), "/get/hnTest/6.html");
        assert_eq!(
            Address::new("hnTest", "6").unwrap().parent_url().unwrap(),
            "/get/hnTest.html"
        );
    }

    #[test]
    fn ordering_is_numeric_preorder() {
        let mut addresses: Vec<Address> = ["10", "2", "2/1", "1", "2/10", "2/9", "1/1"]
            .iter()
            .map(|p| Address::new("f", p).unwrap())
            .collect();
        addresses.sort();
        let rendered: Vec<String> = addresses.iter().map(Address::msg_path).collect();
        assert_eq!(rendered, ["1", "1/1", "2", "2/1", "2/9", "2/10", "10"]);
    }

    #[test]
    fn record_file_names() {
        assert_eq!(record_file_num("12.html,urc"), Some(12));
        assert_eq!(record_file_num("012.html,urc"), None);
        assert_eq!(record_file_num("12-body.html"), None);
        assert_eq!(record_file_num("notes.html,urc"), None);
    }
}
