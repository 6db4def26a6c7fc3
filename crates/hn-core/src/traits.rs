//! # Core Traits (Ports)
//!
//! Any archive backend must implement [`ForumStore`] to be used by the binary.
//! Backends answer the same queries with the same results: the filesystem
//! store reads record files directly, the relational store reads an index
//! built from them.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Forum, ForumEntry, Message, Person};

/// Read-only query contract over one archive.
///
/// Message paths are given relative to the forum (`"6/1"`); an empty path
/// stands for the forum itself wherever a subtree root is expected.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ForumStore: Send + Sync {
    // Forum operations
    async fn get_forum(&self, forum: &str) -> Result<Forum>;

    /// Every forum main record, ordered by name. Broken main records are
    /// reported as [`ForumEntry::Unparseable`] instead of failing the listing.
    async fn get_forums_iter(&self) -> Result<Vec<ForumEntry>>;

    /// Names of the forums whose main record parses, ordered.
    async fn get_forum_names(&self) -> Result<Vec<String>>;

    async fn get_num_forums(&self) -> Result<usize>;

    /// The `id -> name` table of forum categories.
    async fn get_categories(&self) -> Result<BTreeMap<i64, String>>;

    // Message operations
    async fn get_msg(&self, forum: &str, path: &str) -> Result<Message>;

    /// In-forum paths of the children of `path`, numerically ordered.
    /// Nothing is parsed; a node without replies yields an empty list.
    async fn get_msg_paths(&self, forum: &str, path: &str) -> Result<Vec<String>>;

    /// Children of `path`, or with `recursive` every descendant in
    /// depth-first pre-order. The first malformed message fails the call.
    async fn get_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<Vec<Message>>;

    /// Size of the same traversal as [`ForumStore::get_msgs`], counted
    /// without building records.
    async fn get_num_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<usize>;

    /// The body text stored beside a record, if there is one.
    async fn get_html(&self, forum: &str, path: &str) -> Result<Option<String>>;

    // Member operations
    async fn get_member(&self, user_id: &str) -> Result<Person>;

    /// Identifiers of every member file, ordered. Nothing is parsed.
    async fn get_member_ids(&self) -> Result<Vec<String>>;

    /// Every parseable member, ordered by user id.
    async fn get_member_iter(&self) -> Result<Vec<Person>>;

    async fn get_num_members(&self) -> Result<usize>;
}
