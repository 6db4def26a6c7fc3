//! # Index builder
//!
//! Produces the SQLite index from any [`ForumStore`] (in practice the
//! filesystem store). The database is written to a sibling temporary file
//! and renamed onto the target only once it is complete, so readers of an
//! existing index never see a partial one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hn_core::error::{ArchiveError, Result};
use hn_core::models::{ForumEntry, Record};
use hn_core::traits::ForumStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::fs;

use crate::schema::{self, db_err, FORUMS, MSGS, PARENT_INDEX, PEOPLE};

/// What a build inserted and how many records it had to leave out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub forums: usize,
    pub messages: usize,
    pub people: usize,
    pub skipped: usize,
}

pub struct IndexBuilder {
    target: PathBuf,
    overwrite: bool,
}

impl IndexBuilder {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            overwrite: false,
        }
    }

    /// Replace an existing index instead of refusing to run.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The file the index is built in before publication.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.target.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.target.with_file_name(name)
    }

    pub async fn build<S>(&self, source: &S) -> Result<BuildReport>
    where
        S: ForumStore + ?Sized,
    {
        if fs::try_exists(&self.target).await? && !self.overwrite {
            return Err(ArchiveError::IndexExists(self.target.clone()));
        }

        let temp = self.temp_path();
        if fs::try_exists(&temp).await? {
            log::warn!("Removing stale {}", temp.display());
            fs::remove_file(&temp).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&temp)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let report = populate(&pool, source).await;
        pool.close().await;
        let report = report?;

        fs::rename(&temp, &self.target).await?;
        log::info!(
            "Published {} ({} forums, {} messages, {} people, {} skipped)",
            self.target.display(),
            report.forums,
            report.messages,
            report.people,
            report.skipped
        );
        Ok(report)
    }
}

async fn populate<S>(pool: &SqlitePool, source: &S) -> Result<BuildReport>
where
    S: ForumStore + ?Sized,
{
    let mut report = BuildReport::default();

    for table in [&FORUMS, &MSGS, &PEOPLE] {
        sqlx::query(&table.create_sql())
            .execute(pool)
            .await
            .map_err(db_err)?;
    }

    // 1. Forums
    let mut names = Vec::new();
    let mut tx = pool.begin().await.map_err(db_err)?;
    for entry in source.get_forums_iter().await? {
        match entry {
            ForumEntry::Parsed(forum) => {
                schema::insert(&mut *tx, &FORUMS, &[], &forum.to_values()).await?;
                names.push(forum.base.responses);
                report.forums += 1;
            }
            ForumEntry::Unparseable { name, .. } => {
                log::warn!("Skipping unparseable forum {name}");
                report.skipped += 1;
            }
        }
    }
    tx.commit().await.map_err(db_err)?;
    log::info!("Indexed {} forums", report.forums);

    // 2. People
    let mut seen = HashSet::new();
    let mut tx = pool.begin().await.map_err(db_err)?;
    for user_id in source.get_member_ids().await? {
        let person = match source.get_member(&user_id).await {
            Ok(person) => person,
            Err(e) if e.is_malformed() || e.is_not_found() => {
                log::warn!("Skipping member {user_id}: {e}");
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        if !seen.insert(person.user_id.clone()) {
            log::warn!("Skipping duplicate member {}", person.user_id);
            report.skipped += 1;
            continue;
        }
        schema::insert(&mut *tx, &PEOPLE, &[], &person.to_values()).await?;
        report.people += 1;
    }
    tx.commit().await.map_err(db_err)?;
    log::info!("Indexed {} people", report.people);

    // 3. Messages, one transaction per forum
    for forum in &names {
        let mut tx = pool.begin().await.map_err(db_err)?;
        let mut count = 0;
        let mut stack = source.get_msg_paths(forum, "").await?;
        stack.reverse();
        while let Some(path) = stack.pop() {
            match source.get_msg(forum, &path).await {
                Ok(msg) => {
                    schema::insert_message(&mut *tx, &msg).await?;
                    count += 1;
                }
                Err(e) if e.is_malformed() => {
                    log::warn!("Skipping message {forum}/{path}: {e}");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
            // Replies of a skipped message are still indexed.
            let mut children = source.get_msg_paths(forum, &path).await?;
            children.reverse();
            stack.extend(children);
        }
        tx.commit().await.map_err(db_err)?;
        log::info!("Indexed {count} messages of {forum}");
        report.messages += count;
    }

    // 4. Parent index, after the bulk load
    sqlx::query(&format!(
        "CREATE INDEX {PARENT_INDEX} ON msgs (forum, up)"
    ))
    .execute(pool)
    .await
    .map_err(db_err)?;

    Ok(report)
}
