//! Owner-partitioned list collections.
//!
//! Each owner's lists are stored as one JSON array under
//! `lists_<ownerId>`, newest first. Writes replace the whole array, so two
//! interleaved read-modify-write cycles on the same owner lose one update.

use crate::model::list::TaskList;
use crate::model::user::UserId;
use crate::storage::{load_json, save_json, KvStore, StorageResult};

const LISTS_KEY_PREFIX: &str = "lists_";

/// Storage key of an owner's partition.
pub fn lists_key(owner_id: UserId) -> String {
    format!("{LISTS_KEY_PREFIX}{owner_id}")
}

pub trait ListRepository {
    /// `None` when the owner never stored a collection.
    fn load_collection(&self, owner_id: UserId) -> StorageResult<Option<Vec<TaskList>>>;
    fn save_collection(&self, owner_id: UserId, lists: &[TaskList]) -> StorageResult<()>;

    /// Stored collection, or empty when absent.
    fn load_lists(&self, owner_id: UserId) -> StorageResult<Vec<TaskList>> {
        Ok(self.load_collection(owner_id)?.unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct KvListRepository<S: KvStore> {
    store: S,
}

impl<S: KvStore> KvListRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KvStore> ListRepository for KvListRepository<S> {
    fn load_collection(&self, owner_id: UserId) -> StorageResult<Option<Vec<TaskList>>> {
        load_json(&self.store, &lists_key(owner_id))
    }

    fn save_collection(&self, owner_id: UserId, lists: &[TaskList]) -> StorageResult<()> {
        save_json(&self.store, &lists_key(owner_id), lists)
    }
}
