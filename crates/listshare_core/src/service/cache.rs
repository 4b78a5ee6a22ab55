//! Read-through cache for `load_user_lists` results.
//!
//! # Invariants
//! - Entries are keyed by `(viewer id, serialized filter)`.
//! - An entry older than the TTL is never returned.
//! - Invalidation drops every entry of a viewer regardless of filter.
//! - Writers populate the cache only after persistence succeeded.

use crate::model::list::ListWithStats;
use crate::model::user::UserId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct CachedViews {
    stored_at: i64,
    lists: Vec<ListWithStats>,
}

type Entries = HashMap<UserId, HashMap<String, CachedViews>>;

#[derive(Debug, Default)]
pub struct ListCache {
    ttl_ms: Option<i64>,
    entries: Mutex<Entries>,
}

impl ListCache {
    /// `None` disables caching entirely.
    pub fn new(ttl_ms: Option<i64>) -> Self {
        Self {
            ttl_ms: ttl_ms.filter(|ttl| *ttl > 0),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_ms.is_some()
    }

    pub fn get(&self, viewer: UserId, filter_key: &str, now_ms: i64) -> Option<Vec<ListWithStats>> {
        let ttl = self.ttl_ms?;
        let mut entries = self.lock();
        let per_viewer = entries.get_mut(&viewer)?;
        match per_viewer.get(filter_key) {
            Some(cached) if now_ms - cached.stored_at < ttl => Some(cached.lists.clone()),
            Some(_) => {
                per_viewer.remove(filter_key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, viewer: UserId, filter_key: String, lists: Vec<ListWithStats>, now_ms: i64) {
        if self.ttl_ms.is_none() {
            return;
        }
        self.lock().entry(viewer).or_default().insert(
            filter_key,
            CachedViews {
                stored_at: now_ms,
                lists,
            },
        );
    }

    pub fn invalidate(&self, viewer: UserId) {
        self.lock().remove(&viewer);
    }

    pub fn invalidate_many(&self, viewers: impl IntoIterator<Item = UserId>) {
        let mut entries = self.lock();
        for viewer in viewers {
            entries.remove(&viewer);
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave a half-written entry, so
    // the map is still usable.
    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
