//! # hn-db-sqlite Implementation
//!
//! This module implements the mapping between the SQLite index and the
//! `hn-core` record models, plus the [`IndexBuilder`] that produces the
//! index from an archive.

pub mod builder;
pub mod schema;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use hn_core::address::Address;
use hn_core::error::{ArchiveError, Result};
use hn_core::layout::{validate_user_id, ArchiveLayout};
use hn_core::models::{Forum, ForumEntry, Message, Person, RecordKind};
use hn_core::traits::ForumStore;
use hn_store_fs::FsForumStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use schema::{db_err, read_record, FORUMS, MSGS, PEOPLE};

pub use builder::{BuildReport, IndexBuilder};

pub struct SqliteForumStore {
    pool: SqlitePool,
    /// Archive files, for the data that never enters the index
    files: FsForumStore,
}

/// Children of an address: the `(clause, binds)` pair selecting either the
/// direct replies or the whole subtree.
fn children_filter(address: &Address, recursive: bool) -> (&'static str, Vec<String>) {
    let forum = address.forum_name().to_string();
    match (recursive, address.is_forum()) {
        (false, _) => ("WHERE forum = ? AND up = ?", vec![forum, address.msg_path()]),
        (true, true) => ("WHERE forum = ?", vec![forum]),
        (true, false) => {
            let prefix = format!("{}/", address.msg_path());
            (
                "WHERE forum = ? AND substr(msg, 1, length(?)) = ?",
                vec![forum, prefix.clone(), prefix],
            )
        }
    }
}

impl SqliteForumStore {
    /// Opens an existing index read-only. Each operation borrows its own
    /// connection from the pool.
    pub async fn open(
        db_path: &Path,
        layout: ArchiveLayout,
        max_connections: u32,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true)
            .create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(db_err)?;
        log::info!("Opened index {}", db_path.display());
        Ok(Self::from_pool(pool, layout))
    }

    pub fn from_pool(pool: SqlitePool, layout: ArchiveLayout) -> Self {
        Self {
            pool,
            files: FsForumStore::new(layout),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_msgs(&self, address: &Address, recursive: bool) -> Result<Vec<Message>> {
        let (clause, binds) = children_filter(address, recursive);
        let order = if recursive { "" } else { " ORDER BY num" };
        let sql = MSGS.select_sql(&format!("{clause}{order}"));
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        let msgs = rows
            .iter()
            .map(|row| read_record::<Message>(row, &MSGS))
            .collect::<Result<Vec<_>>>()?;
        if !recursive {
            return Ok(msgs);
        }

        // Address order is numeric pre-order; the text column is not.
        let mut keyed = msgs
            .into_iter()
            .map(|msg| Ok((msg.base.address()?, msg)))
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(keyed.into_iter().map(|(_, msg)| msg).collect())
    }
}

#[async_trait]
impl ForumStore for SqliteForumStore {
    async fn get_forum(&self, forum: &str) -> Result<Forum> {
        Address::forum(forum)?;
        let row = sqlx::query(&FORUMS.select_sql("WHERE responses = ?"))
            .bind(forum)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => read_record(&row, &FORUMS),
            None => Err(ArchiveError::not_found(RecordKind::Forum, forum)),
        }
    }

    /// Only parseable forums are indexed, so every entry is `Parsed`.
    async fn get_forums_iter(&self) -> Result<Vec<ForumEntry>> {
        let rows = sqlx::query(&FORUMS.select_sql("ORDER BY responses"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| read_record(row, &FORUMS).map(ForumEntry::Parsed))
            .collect()
    }

    async fn get_forum_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT responses FROM forums ORDER BY responses")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.iter().map(|row| row.get("responses")).collect())
    }

    async fn get_num_forums(&self) -> Result<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM forums")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("n");
        Ok(count as usize)
    }

    async fn get_categories(&self) -> Result<BTreeMap<i64, String>> {
        self.files.get_categories().await
    }

    async fn get_msg(&self, forum: &str, path: &str) -> Result<Message> {
        let address = Address::message(forum, path)?;
        let row = sqlx::query(&MSGS.select_sql("WHERE forum = ? AND msg = ?"))
            .bind(address.forum_name())
            .bind(address.msg_path())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => read_record(&row, &MSGS),
            None => Err(ArchiveError::not_found(
                RecordKind::Message,
                address.to_string(),
            )),
        }
    }

    async fn get_msg_paths(&self, forum: &str, path: &str) -> Result<Vec<String>> {
        let address = Address::new(forum, path)?;
        let rows = sqlx::query("SELECT msg FROM msgs WHERE forum = ? AND up = ? ORDER BY num")
            .bind(address.forum_name())
            .bind(address.msg_path())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.iter().map(|row| row.get("msg")).collect())
    }

    async fn get_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<Vec<Message>> {
        let address = Address::new(forum, path)?;
        self.fetch_msgs(&address, recursive).await
    }

    async fn get_num_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<usize> {
        let address = Address::new(forum, path)?;
        let (clause, binds) = children_filter(&address, recursive);
        let sql = format!("SELECT COUNT(*) AS n FROM msgs {clause}");
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let count: i64 = query
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("n");
        Ok(count as usize)
    }

    async fn get_html(&self, forum: &str, path: &str) -> Result<Option<String>> {
        self.files.get_html(forum, path).await
    }

    async fn get_member(&self, user_id: &str) -> Result<Person> {
        validate_user_id(user_id)?;
        let row = sqlx::query(&PEOPLE.select_sql("WHERE user_id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => read_record(&row, &PEOPLE),
            None => Err(ArchiveError::not_found(RecordKind::Person, user_id)),
        }
    }

    async fn get_member_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT user_id FROM people ORDER BY user_id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn get_member_iter(&self) -> Result<Vec<Person>> {
        let rows = sqlx::query(&PEOPLE.select_sql("ORDER BY user_id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(|row| read_record(row, &PEOPLE)).collect()
    }

    async fn get_num_members(&self) -> Result<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM people")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?
            .get("n");
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_core::parser::parse_record;

    const DATE: &str = "Thu Feb 14 22:20:48 CET 2008";

    fn message(path: &str) -> Message {
        let num = path.rsplit('/').next().unwrap();
        let raw = format!(
            "Title: m{path}\nResponses: f/{path}\nNum: {num}\nDate: {DATE}\nUp-Rel: Idea\n\
Base-URL: http://hypernews.cern.ch/HyperNews/CMS/get/f/{path}\n"
        );
        parse_record(raw.as_bytes(), "test").unwrap()
    }

    /// In-memory index holding messages of forum `f`, inserted out of order.
    async fn store(paths: &[&str]) -> SqliteForumStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let mut conn = pool.acquire().await.unwrap();
        for table in [&FORUMS, &MSGS, &PEOPLE] {
            sqlx::query(&table.create_sql())
                .execute(&mut *conn)
                .await
                .unwrap();
        }
        for path in paths {
            schema::insert_message(&mut conn, &message(path)).await.unwrap();
        }
        drop(conn);
        SqliteForumStore::from_pool(pool, ArchiveLayout::new("/nonexistent"))
    }

    #[tokio::test]
    async fn records_survive_the_index() {
        let store = store(&["2", "2/1"]).await;
        let msg = store.get_msg("f", "2/1").await.unwrap();
        assert_eq!(msg, message("2/1"));
        assert_eq!(msg.up, "2");
        assert!(store.get_msg("f", "3").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn direct_children_order_by_num() {
        let store = store(&["10", "9", "1", "9/2", "9/10", "9/1"]).await;
        assert_eq!(store.get_msg_paths("f", "").await.unwrap(), ["1", "9", "10"]);
        assert_eq!(
            store.get_msg_paths("f", "9").await.unwrap(),
            ["9/1", "9/2", "9/10"]
        );
        assert_eq!(store.get_num_msgs("f", "9", false).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn subtree_is_numeric_preorder() {
        let store = store(&["10", "1", "1/10", "1/2", "1/2/1", "10/1", "100"]).await;
        let msgs = store.get_msgs("f", "", true).await.unwrap();
        let paths: Vec<_> = msgs.iter().map(|m| m.msg.as_str()).collect();
        assert_eq!(paths, ["1", "1/2", "1/2/1", "1/10", "10", "10/1", "100"]);
        assert_eq!(store.get_num_msgs("f", "", true).await.unwrap(), 7);

        // "10/..." must not match the "1/" prefix.
        let below = store.get_msgs("f", "1", true).await.unwrap();
        let paths: Vec<_> = below.iter().map(|m| m.msg.as_str()).collect();
        assert_eq!(paths, ["1/2", "1/2/1", "1/10"]);
        assert_eq!(store.get_num_msgs("f", "1", true).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_records_match_filesystem_errors() {
        let store = store(&[]).await;
        assert!(store.get_forum("f").await.unwrap_err().is_not_found());
        assert!(store.get_member("temple").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.get_member(".hidden").await,
            Err(ArchiveError::InvalidAddress(_))
        ));
        assert!(matches!(
            store.get_msg("f", "").await,
            Err(ArchiveError::InvalidAddress(_))
        ));
        assert_eq!(store.get_num_members().await.unwrap(), 0);
        assert!(store.get_html("f", "1").await.unwrap().is_none());
    }
}
