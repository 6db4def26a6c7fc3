//! # hn-store-fs
//! hn-archive/crates/hn-plugins/hn-store-fs/src/lib.rs
//! Filesystem implementation of `ForumStore`.
//! Answers every query by reading record files under the archive root.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use hn_core::address::{record_file_num, Address, RECORD_SUFFIX};
use hn_core::error::{ArchiveError, Result};
use hn_core::layout::{is_member_file_name, ArchiveLayout};
use hn_core::models::{Forum, ForumEntry, Message, Person, Record, RecordKind};
use hn_core::parser::{decode_latin1, parse_categories, parse_record};
use hn_core::traits::ForumStore;
use tokio::fs;

pub struct FsForumStore {
    layout: ArchiveLayout,
}

impl FsForumStore {
    pub fn new(layout: ArchiveLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    /// Depth-first pre-order walk below `path`, threading an accumulator
    /// from each message to its replies.
    ///
    /// The visitor receives the record file, the message and the value
    /// produced for its parent (`seed` for the first level). The values are
    /// returned in visiting order.
    pub async fn walk_tree<A, F>(
        &self,
        forum: &str,
        path: &str,
        mut visitor: F,
        seed: A,
    ) -> Result<Vec<A>>
    where
        F: FnMut(&Path, &Message, &A) -> A,
    {
        let root = Address::new(forum, path)?;
        let mut out: Vec<A> = Vec::new();
        let mut stack: Vec<(Address, Option<usize>)> = self
            .child_addresses(&root)
            .await?
            .into_iter()
            .rev()
            .map(|child| (child, None))
            .collect();

        while let Some((address, parent)) = stack.pop() {
            let file = self.layout.record_file(&address);
            let msg = self.load_msg(&address).await?;
            let acc = visitor(&file, &msg, parent.map_or(&seed, |i| &out[i]));
            out.push(acc);

            let idx = out.len() - 1;
            for child in self.child_addresses(&address).await?.into_iter().rev() {
                stack.push((child, Some(idx)));
            }
        }
        Ok(out)
    }

    /// Read and parse one record file; a missing file is `NotFound` for
    /// `address`.
    async fn read_record<R: Record>(&self, file: &Path, address: &str) -> Result<R> {
        let bytes = match fs::read(file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::not_found(R::KIND, address));
            }
            Err(e) => return Err(e.into()),
        };
        log::debug!("Loading {} from {}", R::KIND, file.display());
        parse_record(&bytes, &file.display().to_string())
    }

    async fn load_forum(&self, name: &str) -> Result<Forum> {
        let address = Address::forum(name)?;
        let file = self.layout.record_file(&address);
        let forum: Forum = self.read_record(&file, name).await?;
        if forum.base.responses != name {
            return Err(misplaced(RecordKind::Forum, &forum.base.responses, &file));
        }
        Ok(forum)
    }

    /// A message must live where its own address says it does.
    async fn load_msg(&self, address: &Address) -> Result<Message> {
        let file = self.layout.record_file(address);
        let msg: Message = self.read_record(&file, &address.to_string()).await?;
        if msg.base.responses != address.to_string() {
            return Err(misplaced(RecordKind::Message, &msg.base.responses, &file));
        }
        Ok(msg)
    }

    async fn load_member(&self, user_id: &str) -> Result<Person> {
        let file = self.layout.member_file(user_id)?;
        match fs::symlink_metadata(&file).await {
            Ok(meta) if meta.file_type().is_file() => {}
            Ok(_) => return Err(ArchiveError::not_found(RecordKind::Person, user_id)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ArchiveError::not_found(RecordKind::Person, user_id));
            }
            Err(e) => return Err(e.into()),
        }
        let person: Person = self.read_record(&file, user_id).await?;
        if person.user_id != user_id {
            return Err(ArchiveError::InvalidValue {
                field: "user_id",
                value: person.user_id,
                kind: RecordKind::Person,
                source_path: file.display().to_string(),
            });
        }
        Ok(person)
    }

    /// Addresses of the record files directly below `parent`, in numeric order.
    async fn child_addresses(&self, parent: &Address) -> Result<Vec<Address>> {
        let dir = self.layout.children_dir(parent);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut nums = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.ends_with(RECORD_SUFFIX) {
                continue;
            }
            match record_file_num(name) {
                Some(num) => nums.push(num),
                None => log::warn!("Skipping non-numeric record {}", dir.join(name).display()),
            }
        }
        nums.sort_unstable();
        Ok(nums.into_iter().map(|num| parent.child(num)).collect())
    }

    /// The pre-order traversal below `root`, without parsing anything.
    async fn traverse(&self, root: &Address, recursive: bool) -> Result<Vec<Address>> {
        let mut out = Vec::new();
        let mut stack: Vec<Address> = self.child_addresses(root).await?;
        stack.reverse();
        while let Some(address) = stack.pop() {
            if recursive {
                let mut children = self.child_addresses(&address).await?;
                children.reverse();
                stack.extend(children);
            }
            out.push(address);
        }
        Ok(out)
    }

    /// Names of the forum main records under the root, ordered.
    async fn forum_file_names(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(self.layout.root()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(RECORD_SUFFIX))
            else {
                continue;
            };
            if entry.file_type().await?.is_file() && Address::forum(name).is_ok() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Eligible member files: regular, non-hidden, and not a backup or
    /// auxiliary file. Symlinks are never followed.
    async fn member_file_names(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(self.layout.people_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            // `DirEntry::file_type` does not traverse symlinks.
            if is_member_file_name(name) && entry.file_type().await?.is_file() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn misplaced(kind: RecordKind, responses: &str, file: &Path) -> ArchiveError {
    ArchiveError::InvalidValue {
        field: "responses",
        value: responses.to_string(),
        kind,
        source_path: file.display().to_string(),
    }
}

#[async_trait]
impl ForumStore for FsForumStore {
    async fn get_forum(&self, forum: &str) -> Result<Forum> {
        self.load_forum(forum).await
    }

    async fn get_forums_iter(&self) -> Result<Vec<ForumEntry>> {
        let mut forums = Vec::new();
        for name in self.forum_file_names().await? {
            match self.load_forum(&name).await {
                Ok(forum) => forums.push(ForumEntry::Parsed(forum)),
                Err(e) if e.is_malformed() => {
                    log::warn!("Failed to parse forum {name}: {e}");
                    forums.push(ForumEntry::Unparseable {
                        name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(forums)
    }

    async fn get_forum_names(&self) -> Result<Vec<String>> {
        Ok(self
            .get_forums_iter()
            .await?
            .into_iter()
            .filter_map(ForumEntry::parsed)
            .map(|forum| forum.base.responses)
            .collect())
    }

    async fn get_num_forums(&self) -> Result<usize> {
        Ok(self.get_forum_names().await?.len())
    }

    async fn get_categories(&self) -> Result<BTreeMap<i64, String>> {
        let file = self.layout.categories_file();
        match fs::read(file).await {
            Ok(bytes) => parse_categories(&decode_latin1(&bytes), &file.display().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No categories file at {}", file.display());
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_msg(&self, forum: &str, path: &str) -> Result<Message> {
        let address = Address::message(forum, path)?;
        self.load_msg(&address).await
    }

    async fn get_msg_paths(&self, forum: &str, path: &str) -> Result<Vec<String>> {
        let parent = Address::new(forum, path)?;
        Ok(self
            .child_addresses(&parent)
            .await?
            .iter()
            .map(Address::msg_path)
            .collect())
    }

    async fn get_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<Vec<Message>> {
        let root = Address::new(forum, path)?;
        let mut msgs = Vec::new();
        for address in self.traverse(&root, recursive).await? {
            msgs.push(self.load_msg(&address).await?);
        }
        Ok(msgs)
    }

    async fn get_num_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<usize> {
        let root = Address::new(forum, path)?;
        Ok(self.traverse(&root, recursive).await?.len())
    }

    async fn get_html(&self, forum: &str, path: &str) -> Result<Option<String>> {
        let address = Address::new(forum, path)?;
        let file = self.layout.body_file(&address);
        match fs::read(&file).await {
            Ok(bytes) => Ok(Some(decode_latin1(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_member(&self, user_id: &str) -> Result<Person> {
        self.load_member(user_id).await
    }

    async fn get_member_ids(&self) -> Result<Vec<String>> {
        self.member_file_names().await
    }

    /// Malformed member files are logged and skipped, like the index
    /// builder does, so both backends list the same members.
    async fn get_member_iter(&self) -> Result<Vec<Person>> {
        let mut members = Vec::new();
        for name in self.member_file_names().await? {
            match self.load_member(&name).await {
                Ok(person) => members.push(person),
                Err(e) if e.is_malformed() => log::warn!("Skipping member {name}: {e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(members)
    }

    async fn get_num_members(&self) -> Result<usize> {
        Ok(self.get_member_iter().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const DATE: &str = "Mon, 05 Dec 2005 01:55:14 GMT";

    fn write(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn msg_file(root: &Path, forum: &str, path: &str) {
        let num = path.rsplit('/').next().unwrap();
        write(
            root,
            &format!("{forum}/{path}{RECORD_SUFFIX}"),
            &format!("Title: m{path}\nResponses: {forum}/{path}\nNum: {num}\nDate: {DATE}\n"),
        );
    }

    /// forum `f` with messages 1, 2, 2/1, 2/1/1, 2/2, 10 and a body file.
    fn archive() -> (TempDir, FsForumStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "f.html,urc",
            &format!("Title: Forum f\nResponses: f\nNum: f\nDate: {DATE}\n"),
        );
        for path in ["1", "2", "2/1", "2/1/1", "2/2", "10"] {
            msg_file(root, "f", path);
        }
        write(root, "f/2-body.html", b"<p>caf\xe9</p>");
        write(root, "f/f-body.html", "forum body");
        write(root, "f/notes.html,urc", "Title: stray\n");
        write(root, "categories", "1 Physics\n2 Computing\n");
        write(root, "hnpeople/temple", "UserID: temple\nName: T\nStatus: Member\n");
        write(root, "hnpeople/ada", "UserID: ada\nName: A\nStatus: Member\n");
        write(root, "hnpeople/ada.bak", "UserID: ada\nName: A\nStatus: Member\n");
        write(root, "hnpeople/.hidden", "UserID: x\nName: X\nStatus: Member\n");
        write(root, "hnpeople/broken", "Name: no id\n");
        let store = FsForumStore::new(ArchiveLayout::new(root));
        (dir, store)
    }

    fn paths(msgs: &[Message]) -> Vec<&str> {
        msgs.iter().map(|m| m.msg.as_str()).collect()
    }

    #[tokio::test]
    async fn children_are_numerically_ordered() {
        let (_dir, store) = archive();
        assert_eq!(store.get_msg_paths("f", "").await.unwrap(), ["1", "2", "10"]);
        assert_eq!(store.get_msg_paths("f", "2").await.unwrap(), ["2/1", "2/2"]);
        assert!(store.get_msg_paths("f", "10").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recursive_listing_is_preorder() {
        let (_dir, store) = archive();
        let msgs = store.get_msgs("f", "", true).await.unwrap();
        assert_eq!(paths(&msgs), ["1", "2", "2/1", "2/1/1", "2/2", "10"]);
        assert_eq!(store.get_num_msgs("f", "", true).await.unwrap(), 6);
        assert_eq!(store.get_num_msgs("f", "", false).await.unwrap(), 3);
        assert_eq!(store.get_num_msgs("f", "2", true).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn lookups_and_errors() {
        let (_dir, store) = archive();
        let msg = store.get_msg("f", "2/1").await.unwrap();
        assert_eq!(msg.up, "2");
        assert_eq!(msg.base.title, "m2/1");

        assert!(store.get_msg("f", "3").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.get_msg("f", "").await,
            Err(ArchiveError::InvalidAddress(_))
        ));
        assert!(store.get_forum("nope").await.unwrap_err().is_not_found());
        assert_eq!(store.get_forum("f").await.unwrap().name(), "f");
    }

    #[tokio::test]
    async fn misplaced_record_is_malformed() {
        let (dir, store) = archive();
        write(
            dir.path(),
            "f/3.html,urc",
            &format!("Title: t\nResponses: f/4\nNum: 4\nDate: {DATE}\n"),
        );
        let err = store.get_msg("f", "3").await.unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn body_files() {
        let (_dir, store) = archive();
        assert_eq!(
            store.get_html("f", "2").await.unwrap().as_deref(),
            Some("<p>caf\u{e9}</p>")
        );
        assert_eq!(
            store.get_html("f", "").await.unwrap().as_deref(),
            Some("forum body")
        );
        assert_eq!(store.get_html("f", "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn members_skip_excluded_and_malformed_files() {
        let (_dir, store) = archive();
        assert_eq!(
            store.get_member_ids().await.unwrap(),
            ["ada", "broken", "temple"]
        );
        let members = store.get_member_iter().await.unwrap();
        let ids: Vec<_> = members.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, ["ada", "temple"]);
        assert_eq!(store.get_num_members().await.unwrap(), 2);
        assert!(store.get_member("broken").await.unwrap_err().is_malformed());
        assert!(store.get_member("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn categories() {
        let (_dir, store) = archive();
        let categories = store.get_categories().await.unwrap();
        assert_eq!(categories.get(&2).map(String::as_str), Some("Computing"));
    }

    #[tokio::test]
    async fn walk_tree_threads_depth() {
        let (_dir, store) = archive();
        let lines = store
            .walk_tree(
                "f",
                "",
                |_: &Path, msg: &Message, parent: &(usize, String)| {
                    (parent.0 + 1, format!("{}{}", "-".repeat(parent.0), msg.msg))
                },
                (0, String::new()),
            )
            .await
            .unwrap();
        let rendered: Vec<_> = lines.iter().map(|(_, line)| line.as_str()).collect();
        assert_eq!(rendered, ["1", "2", "-2/1", "--2/1/1", "-2/2", "10"]);
    }

    #[tokio::test]
    async fn walk_tree_reports_record_files() {
        let (dir, store) = archive();
        let files = store
            .walk_tree(
                "f",
                "2",
                |file: &Path, _: &Message, _: &PathBuf| file.to_path_buf(),
                PathBuf::new(),
            )
            .await
            .unwrap();
        assert_eq!(files[0], dir.path().join("f/2/1.html,urc"));
        assert_eq!(files.len(), 3);
    }
}
