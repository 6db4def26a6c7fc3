//! On-disk layout of an archive.
//!
//! ```text
//! root/
//!   hnTest.html,urc          forum main record
//!   hnTest/
//!     hnTest-body.html       forum body
//!     6.html,urc             message hnTest/6
//!     6-body.html
//!     6/
//!       1.html,urc           message hnTest/6/1
//!   hnpeople/temple          person record
//!   categories               "<id> <name>" lines
//! ```

use std::path::{Path, PathBuf};

use crate::address::{Address, BODY_SUFFIX, RECORD_SUFFIX};
use crate::error::{ArchiveError, Result};

pub const DEFAULT_PEOPLE_DIR: &str = "hnpeople";
pub const DEFAULT_CATEGORIES_FILE: &str = "categories";

/// Backup markers left behind by editors and admin scripts.
const BACKUP_SUFFIXES: [&str; 5] = ["~", ".bak", ".old", ".orig", ".swp"];

/// Auxiliary files that share the people directory (index snapshots, dumps).
const AUXILIARY_SUFFIXES: [&str; 9] = [
    ".db", ".dir", ".pag", ".sql3", ".sqlite", ".gz", ".tmp", ".html", RECORD_SUFFIX,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    root: PathBuf,
    people_dir: PathBuf,
    categories_file: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            people_dir: root.join(DEFAULT_PEOPLE_DIR),
            categories_file: root.join(DEFAULT_CATEGORIES_FILE),
            root,
        }
    }

    /// Relative paths are taken relative to the root.
    pub fn with_people_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.people_dir = self.root.join(dir);
        self
    }

    pub fn with_categories_file(mut self, file: impl AsRef<Path>) -> Self {
        self.categories_file = self.root.join(file);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn people_dir(&self) -> &Path {
        &self.people_dir
    }

    pub fn categories_file(&self) -> &Path {
        &self.categories_file
    }

    /// `root/hnTest.html,urc` or `root/hnTest/6/1.html,urc`.
    pub fn record_file(&self, address: &Address) -> PathBuf {
        match address.num() {
            None => self
                .root
                .join(format!("{}{RECORD_SUFFIX}", address.forum_name())),
            Some(num) => self
                .parent_dir(address)
                .join(format!("{num}{RECORD_SUFFIX}")),
        }
    }

    /// The directory holding the children of `address`.
    pub fn children_dir(&self, address: &Address) -> PathBuf {
        let mut dir = self.root.join(address.forum_name());
        for segment in address.segments() {
            dir.push(segment.to_string());
        }
        dir
    }

    /// Messages keep their body beside the record; a forum keeps it inside
    /// its own directory, named after the forum.
    pub fn body_file(&self, address: &Address) -> PathBuf {
        match address.num() {
            None => self
                .children_dir(address)
                .join(format!("{}{BODY_SUFFIX}", address.forum_name())),
            Some(num) => self
                .parent_dir(address)
                .join(format!("{num}{BODY_SUFFIX}")),
        }
    }

    pub fn member_file(&self, user_id: &str) -> Result<PathBuf> {
        validate_user_id(user_id)?;
        Ok(self.people_dir.join(user_id))
    }

    fn parent_dir(&self, address: &Address) -> PathBuf {
        match address.parent() {
            Some(parent) => self.children_dir(&parent),
            None => self.root.clone(),
        }
    }
}

/// Whether a file name in the people directory can hold a person record.
///
/// Symlinks and non-regular files are filtered by the caller, which has the
/// file metadata at hand.
pub fn is_member_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !BACKUP_SUFFIXES.iter().any(|s| name.ends_with(s))
        && !AUXILIARY_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// A user id doubles as its member file name, so it must pass the same filter.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if is_member_file_name(user_id) {
        Ok(())
    } else {
        Err(ArchiveError::InvalidAddress(format!(
            "invalid user id {user_id:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ArchiveLayout {
        ArchiveLayout::new("/data/hnfiles")
    }

    #[test]
    fn record_locations() {
        let layout = layout();
        let forum = Address::forum("hnTest").unwrap();
        let msg = Address::new("hnTest", "6/1").unwrap();
        assert_eq!(
            layout.record_file(&forum),
            PathBuf::from("/data/hnfiles/hnTest.html,urc")
        );
        assert_eq!(
            layout.record_file(&msg),
            PathBuf::from("/data/hnfiles/hnTest/6/1.html,urc")
        );
        assert_eq!(
            layout.children_dir(&msg),
            PathBuf::from("/data/hnfiles/hnTest/6/1")
        );
    }

    #[test]
    fn body_locations_differ_for_forums() {
        let layout = layout();
        assert_eq!(
            layout.body_file(&Address::forum("hnTest").unwrap()),
            PathBuf::from("/data/hnfiles/hnTest/hnTest-body.html")
        );
        assert_eq!(
            layout.body_file(&Address::new("hnTest", "6").unwrap()),
            PathBuf::from("/data/hnfiles/hnTest/6-body.html")
        );
    }

    #[test]
    fn custom_directories() {
        let layout = layout()
            .with_people_dir("members")
            .with_categories_file("/etc/hn/categories");
        assert_eq!(layout.people_dir(), Path::new("/data/hnfiles/members"));
        assert_eq!(layout.categories_file(), Path::new("/etc/hn/categories"));
        assert_eq!(
            layout.member_file("temple").unwrap(),
            PathBuf::from("/data/hnfiles/members/temple")
        );
        assert!(layout.member_file("../etc/passwd").is_err());
    }

    #[test]
    fn member_file_filter() {
        assert!(is_member_file_name("temple"));
        assert!(is_member_file_name("j.doe"));
        assert!(!is_member_file_name(".hidden"));
        assert!(!is_member_file_name("temple~"));
        assert!(!is_member_file_name("temple.bak"));
        assert!(!is_member_file_name("index.db"));
        assert!(!is_member_file_name("members.pag"));
    }
}
