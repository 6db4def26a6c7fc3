//! # Bounded record cache
//!
//! [`CachedStore`] wraps any [`ForumStore`] and memoizes single-record
//! lookups. The cache belongs to whoever builds the wrapper; backends never
//! cache on their own, so each instance stays independently testable.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::address::Address;
use crate::error::Result;
use crate::models::{Forum, ForumEntry, Message, Person};
use crate::traits::ForumStore;

/// Least-recently-used map with a fixed capacity. A capacity of zero keeps
/// nothing.
///
/// Every access stamps the entry with a fresh tick; `ticks` orders the
/// stamps so the oldest entry is found without scanning.
pub struct LruCache<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, (V, u64)>,
    ticks: BTreeMap<u64, K>,
}

impl<K: Clone + Eq + Hash, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
            ticks: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        let next = self.next_tick();
        let (value, stamp) = self.entries.get_mut(key)?;
        if let Some(k) = self.ticks.remove(&*stamp) {
            self.ticks.insert(next, k);
        }
        *stamp = next;
        Some(&*value)
    }

    /// Returns the evicted entry, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.capacity == 0 {
            return None;
        }
        let next = self.next_tick();
        if let Some((old, stamp)) = self.entries.get_mut(&key) {
            self.ticks.remove(&*stamp);
            self.ticks.insert(next, key);
            *old = value;
            *stamp = next;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };
        self.ticks.insert(next, key.clone());
        self.entries.insert(key, (value, next));
        evicted
    }

    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let (_, key) = self.ticks.pop_first()?;
        let (value, _) = self.entries.remove(&key)?;
        Some((key, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// A [`ForumStore`] that remembers the last `capacity` forums, messages and
/// members of each kind. Listings and counts always reach the inner store.
pub struct CachedStore<S> {
    inner: S,
    forums: Mutex<LruCache<String, Forum>>,
    msgs: Mutex<LruCache<Address, Message>>,
    members: Mutex<LruCache<String, Person>>,
}

impl<S: ForumStore> CachedStore<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            forums: Mutex::new(LruCache::new(capacity)),
            msgs: Mutex::new(LruCache::new(capacity)),
            members: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ForumStore> ForumStore for CachedStore<S> {
    async fn get_forum(&self, forum: &str) -> Result<Forum> {
        if let Some(hit) = self.forums.lock().await.get(&forum.to_string()) {
            return Ok(hit.clone());
        }
        let record = self.inner.get_forum(forum).await?;
        let evicted = self
            .forums
            .lock()
            .await
            .insert(forum.to_string(), record.clone());
        if let Some((name, _)) = evicted {
            log::debug!("Evicted forum {name} from cache");
        }
        Ok(record)
    }

    async fn get_forums_iter(&self) -> Result<Vec<ForumEntry>> {
        self.inner.get_forums_iter().await
    }

    async fn get_forum_names(&self) -> Result<Vec<String>> {
        self.inner.get_forum_names().await
    }

    async fn get_num_forums(&self) -> Result<usize> {
        self.inner.get_num_forums().await
    }

    async fn get_categories(&self) -> Result<BTreeMap<i64, String>> {
        self.inner.get_categories().await
    }

    async fn get_msg(&self, forum: &str, path: &str) -> Result<Message> {
        // Unaddressable input goes straight through so the inner store
        // reports the error.
        let Ok(key) = Address::message(forum, path) else {
            return self.inner.get_msg(forum, path).await;
        };
        if let Some(hit) = self.msgs.lock().await.get(&key) {
            return Ok(hit.clone());
        }
        let record = self.inner.get_msg(forum, path).await?;
        if let Some((address, _)) = self.msgs.lock().await.insert(key, record.clone()) {
            log::debug!("Evicted message {address} from cache");
        }
        Ok(record)
    }

    async fn get_msg_paths(&self, forum: &str, path: &str) -> Result<Vec<String>> {
        self.inner.get_msg_paths(forum, path).await
    }

    async fn get_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<Vec<Message>> {
        self.inner.get_msgs(forum, path, recursive).await
    }

    async fn get_num_msgs(&self, forum: &str, path: &str, recursive: bool) -> Result<usize> {
        self.inner.get_num_msgs(forum, path, recursive).await
    }

    async fn get_html(&self, forum: &str, path: &str) -> Result<Option<String>> {
        self.inner.get_html(forum, path).await
    }

    async fn get_member(&self, user_id: &str) -> Result<Person> {
        if let Some(hit) = self.members.lock().await.get(&user_id.to_string()) {
            return Ok(hit.clone());
        }
        let record = self.inner.get_member(user_id).await?;
        let evicted = self
            .members
            .lock()
            .await
            .insert(user_id.to_string(), record.clone());
        if let Some((id, _)) = evicted {
            log::debug!("Evicted member {id} from cache");
        }
        Ok(record)
    }

    async fn get_member_ids(&self) -> Result<Vec<String>> {
        self.inner.get_member_ids().await
    }

    async fn get_member_iter(&self) -> Result<Vec<Person>> {
        self.inner.get_member_iter().await
    }

    async fn get_num_members(&self) -> Result<usize> {
        self.inner.get_num_members().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchiveError;
    use crate::models::RecordKind;
    use crate::parser::parse_record;
    use crate::traits::MockForumStore;

    fn message(num: u64) -> Message {
        let raw = format!(
            "Title: t{num}\nResponses: hnTest/{num}\nNum: {num}\nDate: Mon, 05 Dec 2005 01:55:14 GMT\n"
        );
        parse_record(raw.as_bytes(), "test").unwrap()
    }

    fn person(user_id: &str) -> Person {
        let raw = format!("UserID: {user_id}\nName: N\nStatus: Member\n");
        parse_record(raw.as_bytes(), "test").unwrap()
    }

    #[test]
    fn lru_evicts_least_recent() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"b").is_none());
    }

    #[test]
    fn touched_entry_survives_eviction() {
        let mut cache = LruCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.get(&"a"), Some(&1));

        assert_eq!(cache.insert("d", 4), Some(("b", 2)));
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&"b").is_none());
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"c"), Some(&3));

        // Replacing a value refreshes it too.
        cache.insert("d", 40);
        assert_eq!(cache.insert("e", 5), Some(("a", 1)));
        assert_eq!(cache.get(&"d"), Some(&40));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.insert("a", 1), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let mut mock = MockForumStore::new();
        mock.expect_get_msg()
            .withf(|forum, path| forum == "hnTest" && path == "6")
            .times(1)
            .returning(|_, _| Ok(message(6)));

        let store = CachedStore::new(mock, 8);
        let first = store.get_msg("hnTest", "6").await.unwrap();
        let second = store.get_msg("hnTest", "6").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let mut mock = MockForumStore::new();
        mock.expect_get_member()
            .times(2)
            .returning(|id| Err(ArchiveError::not_found(RecordKind::Person, id)));

        let store = CachedStore::new(mock, 8);
        assert!(store.get_member("ghost").await.unwrap_err().is_not_found());
        assert!(store.get_member("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn evicted_records_are_reloaded() {
        let mut mock = MockForumStore::new();
        mock.expect_get_member()
            .withf(|id| id == "a")
            .times(2)
            .returning(|id| Ok(person(id)));
        mock.expect_get_member()
            .withf(|id| id == "b")
            .times(1)
            .returning(|id| Ok(person(id)));

        let store = CachedStore::new(mock, 1);
        store.get_member("a").await.unwrap();
        store.get_member("b").await.unwrap();
        assert_eq!(store.get_member("a").await.unwrap().user_id, "a");
    }

    #[tokio::test]
    async fn listings_pass_through() {
        let mut mock = MockForumStore::new();
        mock.expect_get_num_msgs()
            .times(2)
            .returning(|_, _, recursive| Ok(if recursive { 876 } else { 688 }));

        let store = CachedStore::new(mock, 8);
        assert_eq!(store.get_num_msgs("hnTest", "", false).await.unwrap(), 688);
        assert_eq!(store.get_num_msgs("hnTest", "", true).await.unwrap(), 876);
    }
}
