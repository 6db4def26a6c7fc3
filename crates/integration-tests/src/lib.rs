//! # integration-tests
//!
//! Generated archives shared by the cross-backend suites in `tests/`.
//! Every fixture lives in its own temporary directory; the SQLite index,
//! when requested, is built next to the record files.

use std::path::{Path, PathBuf};

use hn_core::layout::ArchiveLayout;
use hn_core::Result;
use hn_db_sqlite::{BuildReport, IndexBuilder, SqliteForumStore};
use hn_store_fs::FsForumStore;
use tempfile::TempDir;

/// The date spellings found in real archives; message `n` uses
/// `DATES[n % 4]`. The CET and the bare ISO spelling name the same instant.
pub const DATES: [&str; 4] = [
    "Mon, 05 Dec 2005 01:55:14 GMT",
    "Thu Feb 14 22:20:48 CET 2008",
    "Thu Feb 14 22:20:48 2008",
    "2008-02-14 21:20:48",
];

const CONTENT_TYPES: [&str; 3] = ["Smart Text", "HTML", "Plain Text"];
const UP_RELS: [&str; 4] = ["Default", "Agree", "Question", "Idea"];

/// Top level messages of `hnTest`.
pub const TEST_TOP_LEVEL: u64 = 688;
/// Every message of `hnTest`.
pub const TEST_TOTAL: usize = 876;

/// Writes record files below an archive root.
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn file(&self, rel: &str, content: impl AsRef<[u8]>) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn forum(&self, name: &str, title: &str, category: i64) {
        self.file(
            &format!("{name}.html,urc"),
            format!(
                "Title: {title}\n\
                 Responses: {name}\n\
                 Num: {name}\n\
                 Date: {}\n\
                 Categories: {category}\n\
                 List-Address: {name}@example.org\n\
                 Base-URL: https://hypernews.cern.ch/HyperNews/CMS/get/{name}\n",
                DATES[0]
            ),
        );
    }

    /// A message whose optional fields vary with its number.
    pub fn message(&self, forum: &str, path: &str) {
        let num: usize = path
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap();
        let mut record = format!(
            "Title: Message {path}\r\n\
             Responses: {forum}/{path}\r\n\
             Num: {num}\r\n\
             Date: {}\r\n\
             Name: Poster {num}\r\n\
             From: poster{num}@example.org\r\n\
             Content-Type: {}\r\n\
             Up-Rel: {}\r\n\
             Base-URL: http://cmshypernews02.cern.ch/HyperNews/CMS/get/{forum}/{path}\r\n",
            DATES[num % DATES.len()],
            CONTENT_TYPES[num % CONTENT_TYPES.len()],
            UP_RELS[num % UP_RELS.len()],
        );
        if num % 2 == 0 {
            record.push_str(&format!("Keywords: k{num}\r\nLast-Mod: {}\r\n", DATES[1]));
        }
        self.file(&format!("{forum}/{path}.html,urc"), record);
    }

    pub fn member(&self, file_name: &str, user_id: &str) {
        self.file(
            &format!("hnpeople/{file_name}"),
            format!(
                "UserID: {user_id}\nName: Member {user_id}\nStatus: Member\n\
                 Email: {user_id}@example.org\nPassword: secret\n"
            ),
        );
    }
}

/// A generated archive in a temporary directory.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Three forums:
    ///
    /// - `hnTest`: top level messages 1 to 688; `6` has replies 1 to 3 and
    ///   `6/1` has one reply; 10 to 101 have two replies each (876 in all)
    /// - `hnSecond`: a small tree where `10` sorts after `2`
    /// - `hnBroken`: a main record without a title
    ///
    /// plus a few members (one malformed, one backup), a categories file
    /// and some body files.
    pub fn standard() -> Self {
        let fixture = Self::empty();
        let w = fixture.writer();

        w.forum("hnTest", "Test forum", 1);
        for num in 1..=TEST_TOP_LEVEL {
            w.message("hnTest", &num.to_string());
        }
        for path in ["6/1", "6/2", "6/3", "6/1/1"] {
            w.message("hnTest", path);
        }
        for num in 10..=101 {
            w.message("hnTest", &format!("{num}/1"));
            w.message("hnTest", &format!("{num}/2"));
        }

        w.forum("hnSecond", "Second forum", 2);
        for path in ["1", "2", "2/1", "10", "10/3"] {
            w.message("hnSecond", path);
        }

        w.file(
            "hnBroken.html,urc",
            format!("Responses: hnBroken\nNum: hnBroken\nDate: {}\n", DATES[0]),
        );

        w.file("categories", "1 Physics\n2 Computing\n");
        w.file("hnTest/hnTest-body.html", "<p>Welcome</p>");
        w.file("hnTest/6-body.html", b"<p>caf\xe9</p>");
        w.file("hnTest/6/1-body.html", "<p>reply</p>");

        for user_id in ["ada", "alan", "grace", "temple"] {
            w.member(user_id, user_id);
        }
        w.member("grace.bak", "grace");
        w.file("hnpeople/broken", "Name: no id\n");

        fixture
    }

    /// An archive holding only `count` members named `user0000`, `user0001`, ...
    pub fn with_members(count: usize) -> Self {
        let fixture = Self::empty();
        let w = fixture.writer();
        for i in 0..count {
            let user_id = format!("user{i:04}");
            w.member(&user_id, &user_id);
        }
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn writer(&self) -> ArchiveWriter {
        ArchiveWriter::new(self.root())
    }

    pub fn layout(&self) -> ArchiveLayout {
        ArchiveLayout::new(self.root())
    }

    pub fn files(&self) -> FsForumStore {
        FsForumStore::new(self.layout())
    }

    pub fn index_path(&self) -> PathBuf {
        self.root().join("hnarchive.db")
    }

    /// Build the index from the files, replacing any earlier one.
    pub async fn build_index(&self) -> Result<BuildReport> {
        IndexBuilder::new(self.index_path())
            .overwrite(true)
            .build(&self.files())
            .await
    }

    /// Build the index and open it.
    pub async fn index(&self) -> Result<SqliteForumStore> {
        self.build_index().await?;
        SqliteForumStore::open(&self.index_path(), self.layout(), 4).await
    }
}
