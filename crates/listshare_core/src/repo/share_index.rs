//! Reverse index from collaborator email to shared lists.
//!
//! Stored per email under `shared_index_<email>` as an array of
//! `{ownerId, listId}` pairs in share order. Entries may go stale (for
//! example after a concurrent overwrite of the owner's partition); readers
//! must verify each hit against the owner's stored list.

use crate::model::list::ListId;
use crate::model::user::{normalize_email, UserId};
use crate::storage::{load_json, save_json, KvStore, StorageResult};
use serde::{Deserialize, Serialize};

const SHARE_INDEX_KEY_PREFIX: &str = "shared_index_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareEntry {
    pub owner_id: UserId,
    pub list_id: ListId,
}

pub trait ShareIndex {
    fn entries_for(&self, email: &str) -> StorageResult<Vec<ShareEntry>>;
    /// Idempotent insert.
    fn add(&self, email: &str, entry: ShareEntry) -> StorageResult<()>;
    /// Removes the list from the email's entries; missing entries are ignored.
    fn remove(&self, email: &str, list_id: ListId) -> StorageResult<()>;
}

#[derive(Debug, Clone)]
pub struct KvShareIndex<S: KvStore> {
    store: S,
}

impl<S: KvStore> KvShareIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

fn index_key(email: &str) -> String {
    format!("{SHARE_INDEX_KEY_PREFIX}{}", normalize_email(email))
}

impl<S: KvStore> ShareIndex for KvShareIndex<S> {
    fn entries_for(&self, email: &str) -> StorageResult<Vec<ShareEntry>> {
        Ok(load_json(&self.store, &index_key(email))?.unwrap_or_default())
    }

    fn add(&self, email: &str, entry: ShareEntry) -> StorageResult<()> {
        let mut entries = self.entries_for(email)?;
        if entries.contains(&entry) {
            return Ok(());
        }
        entries.push(entry);
        save_json(&self.store, &index_key(email), &entries)
    }

    fn remove(&self, email: &str, list_id: ListId) -> StorageResult<()> {
        let key = index_key(email);
        let mut entries = self.entries_for(email)?;
        let before = entries.len();
        entries.retain(|entry| entry.list_id != list_id);
        if entries.len() == before {
            return Ok(());
        }
        if entries.is_empty() {
            self.store.remove(&key)
        } else {
            save_json(&self.store, &key, &entries)
        }
    }
}
