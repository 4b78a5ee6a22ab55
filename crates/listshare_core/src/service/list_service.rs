//! List and task use-case service.
//!
//! # Responsibility
//! - Own list/task CRUD across owner-partitioned storage.
//! - Resolve lists shared with a viewer and enforce per-list permissions.
//! - Keep the list view cache coherent with every successful write.
//!
//! # Invariants
//! - Inputs are validated before anything is loaded or written.
//! - A write persists the owner's collection first; the cache is touched
//!   only after persistence succeeded.
//! - Lookup is owner-first, then other users in directory order, so a list
//!   resolves to exactly one owner record.
//! - Only the owner deletes or shares; owner or collaborator edits.
//! - Collections are rewritten whole. Two interleaved writers on the same
//!   owner are last-write-wins; nothing here serializes them.

use crate::clock::Clock;
use crate::config::{CoreConfig, ListLimits};
use crate::model::filter::ListFilter;
use crate::model::list::{
    validate_shared_with, validate_task_text, validate_title, ListAccess, ListId,
    ListValidationError, ListWithStats, Task, TaskId, TaskList,
};
use crate::model::user::{normalize_email, validate_email, UserId, UserSummary};
use crate::repo::list_repo::{KvListRepository, ListRepository};
use crate::repo::share_index::{KvShareIndex, ShareEntry, ShareIndex};
use crate::repo::user_repo::{KvUserRepository, UserRepository};
use crate::service::cache::ListCache;
use crate::service::ErrorKind;
use crate::storage::{KvStore, StorageError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

/// Version tag written into export documents.
pub const EXPORT_VERSION: &str = "1.0";

/// Operation class used in permission errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    Edit,
    Share,
    Delete,
}

impl ListAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Share => "share",
            Self::Delete => "delete",
        }
    }

    fn allowed(self, access: &ListAccess) -> bool {
        match self {
            Self::Edit => access.can_edit,
            Self::Share => access.can_share,
            Self::Delete => access.can_delete,
        }
    }
}

/// Which ceiling an operation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    ListsPerUser,
    TasksPerList,
    Collaborators,
}

#[derive(Debug)]
pub enum ListServiceError {
    Validation(ListValidationError),
    ListNotFound(ListId),
    TaskNotFound { list_id: ListId, task_id: TaskId },
    UserNotFound(UserId),
    PermissionDenied { action: ListAction, list_id: ListId },
    LimitExceeded { kind: LimitKind, max: usize },
    SelfShare,
    UnknownRecipient(String),
    AlreadyShared(String),
    NotShared(String),
    Storage(StorageError),
}

impl ListServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::LimitExceeded { .. }
            | Self::SelfShare
            | Self::UnknownRecipient(_)
            | Self::AlreadyShared(_) => ErrorKind::Validation,
            Self::ListNotFound(_)
            | Self::TaskNotFound { .. }
            | Self::UserNotFound(_)
            | Self::NotShared(_) => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::Permission,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ListNotFound(_) => "list_not_found",
            Self::TaskNotFound { .. } => "task_not_found",
            Self::UserNotFound(_) => "user_not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::LimitExceeded { .. } => "limit_exceeded",
            Self::SelfShare => "self_share",
            Self::UnknownRecipient(_) => "unknown_recipient",
            Self::AlreadyShared(_) => "already_shared",
            Self::NotShared(_) => "not_shared",
            Self::Storage(_) => "storage",
        }
    }
}

impl Display for ListServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::ListNotFound(id) => write!(f, "list not found: {id}"),
            Self::TaskNotFound { list_id, task_id } => {
                write!(f, "task {task_id} not found in list {list_id}")
            }
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::PermissionDenied { action, list_id } => write!(
                f,
                "you do not have permission to {} list {list_id}",
                action.as_str()
            ),
            Self::LimitExceeded { kind, max } => match kind {
                LimitKind::ListsPerUser => write!(f, "you can have at most {max} lists"),
                LimitKind::TasksPerList => write!(f, "a list can hold at most {max} tasks"),
                LimitKind::Collaborators => {
                    write!(f, "a list can be shared with at most {max} users")
                }
            },
            Self::SelfShare => write!(f, "you cannot share a list with yourself"),
            Self::UnknownRecipient(email) => write!(f, "no user registered with email {email}"),
            Self::AlreadyShared(email) => write!(f, "list is already shared with {email}"),
            Self::NotShared(email) => write!(f, "list is not shared with {email}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for ListServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ListValidationError> for ListServiceError {
    fn from(value: ListValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for ListServiceError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

pub type ListServiceResult<T> = Result<T, ListServiceError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateListRequest {
    pub title: String,
    pub initial_tasks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateListRequest {
    pub title: Option<String>,
    /// Replaces the full collaborator set; owner only.
    pub shared_with: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareListRequest {
    pub list_id: ListId,
    pub user_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTaskRequest {
    pub list_id: ListId,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateTaskRequest {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

/// Backup snapshot of a user's own lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExport {
    pub version: String,
    pub exported_at: i64,
    pub user: UserSummary,
    pub lists: Vec<TaskList>,
}

/// A list found in some owner's partition, with that whole partition loaded.
struct Located {
    owner_id: UserId,
    collection: Vec<TaskList>,
    position: usize,
}

impl Located {
    fn list(&self) -> &TaskList {
        &self.collection[self.position]
    }

    fn list_mut(&mut self) -> &mut TaskList {
        &mut self.collection[self.position]
    }
}

/// A located list plus the requester's rights on it.
struct Authorized {
    located: Located,
    viewer_id: UserId,
    viewer_email: Option<String>,
}

impl Authorized {
    fn view(&self) -> ListWithStats {
        view_for(
            self.located.list().clone(),
            self.located.owner_id,
            self.viewer_id,
            self.viewer_email.as_deref(),
        )
    }
}

/// List service over a shared key-value store.
pub struct ListService<S: KvStore + Clone> {
    lists: KvListRepository<S>,
    users: KvUserRepository<S>,
    share_index: KvShareIndex<S>,
    cache: ListCache,
    clock: Arc<dyn Clock>,
    limits: ListLimits,
    seed_example_lists: bool,
}

impl<S: KvStore + Clone> ListService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &CoreConfig) -> Self {
        Self {
            lists: KvListRepository::new(store.clone()),
            users: KvUserRepository::new(store.clone()),
            share_index: KvShareIndex::new(store),
            cache: ListCache::new(config.cache_ttl_ms),
            clock,
            limits: config.limits,
            seed_example_lists: config.seed_example_lists,
        }
    }

    /// Drops every cached view, e.g. after an external import.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drops the cached views of one viewer.
    ///
    /// Callers must invoke this after changing a user's email outside this
    /// service, since shared lists are matched by email.
    pub fn invalidate_user(&self, user_id: UserId) {
        self.cache.invalidate(user_id);
    }

    /// Returns the viewer's own lists plus lists shared with them.
    ///
    /// Own lists come first (newest first), then shared lists grouped by
    /// owner in directory order, before the filter's stable sort.
    pub fn load_user_lists(
        &self,
        user_id: UserId,
        filter: &ListFilter,
    ) -> ListServiceResult<Vec<ListWithStats>> {
        let started_at = Instant::now();
        let filter_key = cache_key(filter);
        let now = self.clock.now_ms();
        if let Some(cached) = self.cache.get(user_id, &filter_key, now) {
            debug!("event=lists_load module=list_service status=cache_hit count={}", cached.len());
            return Ok(cached);
        }

        let result = self.collect_views(user_id).map(|views| filter.apply(views));
        log_outcome("lists_load", None, started_at, &result);
        let views = result?;
        self.cache.put(user_id, filter_key, views.clone(), now);
        Ok(views)
    }

    /// Returns one list visible to the viewer.
    pub fn get_list(&self, user_id: UserId, list_id: ListId) -> ListServiceResult<ListWithStats> {
        let viewer_email = self.viewer_email(user_id)?;
        let located = self
            .find_list_by_id(user_id, viewer_email.as_deref(), list_id)?
            .ok_or(ListServiceError::ListNotFound(list_id))?;
        Ok(view_for(
            located.list().clone(),
            located.owner_id,
            user_id,
            viewer_email.as_deref(),
        ))
    }

    /// Creates a list owned by `user_id`, newest first in their partition.
    pub fn create_list(
        &self,
        user_id: UserId,
        request: &CreateListRequest,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.create_list_inner(user_id, request);
        log_outcome("list_create", result.as_ref().ok().map(|v| v.id()), started_at, &result);
        result
    }

    fn create_list_inner(
        &self,
        user_id: UserId,
        request: &CreateListRequest,
    ) -> ListServiceResult<ListWithStats> {
        let title = validate_title(&request.title, &self.limits)?;
        let texts = request
            .initial_tasks
            .iter()
            .map(|text| validate_task_text(text, &self.limits))
            .collect::<Result<Vec<_>, _>>()?;
        if texts.len() > self.limits.max_tasks_per_list {
            return Err(ListServiceError::LimitExceeded {
                kind: LimitKind::TasksPerList,
                max: self.limits.max_tasks_per_list,
            });
        }

        if self.users.get_user(user_id)?.is_none() {
            return Err(ListServiceError::UserNotFound(user_id));
        }
        let mut collection = self.lists.load_lists(user_id)?;
        if collection.len() >= self.limits.max_lists_per_user {
            return Err(ListServiceError::LimitExceeded {
                kind: LimitKind::ListsPerUser,
                max: self.limits.max_lists_per_user,
            });
        }

        let now = self.clock.now_ms();
        let tasks = texts.into_iter().map(|text| Task::new(text, now)).collect();
        let list = TaskList::new(user_id, title, tasks, now);
        collection.insert(0, list.clone());
        self.lists.save_collection(user_id, &collection)?;
        self.cache.invalidate(user_id);

        Ok(ListWithStats::new(
            list,
            ListAccess {
                is_owner: true,
                can_edit: true,
                can_share: true,
                can_delete: true,
            },
        ))
    }

    /// Renames a list and/or replaces its collaborator set.
    pub fn update_list(
        &self,
        user_id: UserId,
        list_id: ListId,
        request: &UpdateListRequest,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.update_list_inner(user_id, list_id, request);
        log_outcome("list_update", Some(list_id), started_at, &result);
        result
    }

    fn update_list_inner(
        &self,
        user_id: UserId,
        list_id: ListId,
        request: &UpdateListRequest,
    ) -> ListServiceResult<ListWithStats> {
        let title = request
            .title
            .as_deref()
            .map(|title| validate_title(title, &self.limits))
            .transpose()?;
        let shared_with = request
            .shared_with
            .as_deref()
            .map(|emails| validate_shared_with(emails, &self.limits))
            .transpose()?;

        let action = if shared_with.is_some() {
            ListAction::Share
        } else {
            ListAction::Edit
        };
        let mut authorized = self.authorize(user_id, list_id, action)?;
        let previous = authorized.located.list().shared_with.clone();

        if let Some(emails) = shared_with.as_ref() {
            if let Some(own) = authorized.viewer_email.as_deref() {
                if emails.iter().any(|email| email == own) {
                    return Err(ListServiceError::SelfShare);
                }
            }
            for email in emails {
                if !previous.contains(email) && self.users.find_by_email(email)?.is_none() {
                    return Err(ListServiceError::UnknownRecipient(email.clone()));
                }
            }
        }

        let now = self.clock.now_ms();
        let list = authorized.located.list_mut();
        if let Some(title) = title {
            list.title = title;
        }
        if let Some(emails) = shared_with.clone() {
            list.shared_with = emails;
        }
        list.touch(now);

        let owner_id = authorized.located.owner_id;
        let (added, removed) = match shared_with.as_ref() {
            Some(next) => (
                difference(next, &previous),
                difference(&previous, next),
            ),
            None => (Vec::new(), Vec::new()),
        };
        for email in &added {
            self.share_index.add(email, ShareEntry { owner_id, list_id })?;
        }
        self.lists
            .save_collection(owner_id, &authorized.located.collection)?;
        for email in &removed {
            self.drop_index_entry(email, list_id);
        }

        let mut affected = authorized.located.list().shared_with.clone();
        affected.extend(removed);
        self.invalidate_after_write(user_id, owner_id, &affected);
        Ok(authorized.view())
    }

    /// Deletes a list. Owner only.
    pub fn delete_list(&self, user_id: UserId, list_id: ListId) -> ListServiceResult<()> {
        let started_at = Instant::now();
        let result = self.delete_list_inner(user_id, list_id);
        log_outcome("list_delete", Some(list_id), started_at, &result);
        result
    }

    fn delete_list_inner(&self, user_id: UserId, list_id: ListId) -> ListServiceResult<()> {
        let mut authorized = self.authorize(user_id, list_id, ListAction::Delete)?;
        let located = &mut authorized.located;
        let removed = located.collection.remove(located.position);
        self.lists
            .save_collection(located.owner_id, &located.collection)?;

        for email in &removed.shared_with {
            self.drop_index_entry(email, list_id);
        }
        self.invalidate_after_write(user_id, located.owner_id, &removed.shared_with);
        Ok(())
    }

    /// Adds a collaborator by email. Owner only.
    pub fn share_list(
        &self,
        user_id: UserId,
        request: &ShareListRequest,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.share_list_inner(user_id, request);
        log_outcome("list_share", Some(request.list_id), started_at, &result);
        result
    }

    fn share_list_inner(
        &self,
        user_id: UserId,
        request: &ShareListRequest,
    ) -> ListServiceResult<ListWithStats> {
        let email = validate_email(&request.user_email)
            .map_err(|_| ListValidationError::InvalidEmail(request.user_email.trim().to_string()))?;
        let list_id = request.list_id;
        let mut authorized = self.authorize(user_id, list_id, ListAction::Share)?;

        if authorized.viewer_email.as_deref() == Some(email.as_str()) {
            return Err(ListServiceError::SelfShare);
        }
        if self.users.find_by_email(&email)?.is_none() {
            return Err(ListServiceError::UnknownRecipient(email));
        }
        let list = authorized.located.list();
        if list.is_shared_with(&email) {
            return Err(ListServiceError::AlreadyShared(email));
        }
        if list.shared_with.len() >= self.limits.max_shared_with {
            return Err(ListServiceError::LimitExceeded {
                kind: LimitKind::Collaborators,
                max: self.limits.max_shared_with,
            });
        }

        let now = self.clock.now_ms();
        let owner_id = authorized.located.owner_id;
        let list = authorized.located.list_mut();
        list.shared_with.push(email.clone());
        list.touch(now);

        self.share_index.add(&email, ShareEntry { owner_id, list_id })?;
        self.lists
            .save_collection(owner_id, &authorized.located.collection)?;

        let affected = authorized.located.list().shared_with.clone();
        self.invalidate_after_write(user_id, owner_id, &affected);
        Ok(authorized.view())
    }

    /// Removes a collaborator by email. Owner only.
    pub fn unshare_list(
        &self,
        user_id: UserId,
        list_id: ListId,
        user_email: &str,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.unshare_list_inner(user_id, list_id, user_email);
        log_outcome("list_unshare", Some(list_id), started_at, &result);
        result
    }

    fn unshare_list_inner(
        &self,
        user_id: UserId,
        list_id: ListId,
        user_email: &str,
    ) -> ListServiceResult<ListWithStats> {
        let email = normalize_email(user_email);
        let mut authorized = self.authorize(user_id, list_id, ListAction::Share)?;
        let position = authorized
            .located
            .list()
            .shared_with
            .iter()
            .position(|entry| entry.eq_ignore_ascii_case(&email))
            .ok_or_else(|| ListServiceError::NotShared(email.clone()))?;

        let now = self.clock.now_ms();
        let owner_id = authorized.located.owner_id;
        let list = authorized.located.list_mut();
        list.shared_with.remove(position);
        list.touch(now);
        self.lists
            .save_collection(owner_id, &authorized.located.collection)?;
        self.drop_index_entry(&email, list_id);

        let mut affected = authorized.located.list().shared_with.clone();
        affected.push(email);
        self.invalidate_after_write(user_id, owner_id, &affected);
        Ok(authorized.view())
    }

    /// Appends an incomplete task.
    pub fn add_task(
        &self,
        user_id: UserId,
        request: &AddTaskRequest,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.add_task_inner(user_id, request);
        log_outcome("task_add", Some(request.list_id), started_at, &result);
        result
    }

    fn add_task_inner(
        &self,
        user_id: UserId,
        request: &AddTaskRequest,
    ) -> ListServiceResult<ListWithStats> {
        let text = validate_task_text(&request.text, &self.limits)?;
        let mut authorized = self.authorize(user_id, request.list_id, ListAction::Edit)?;
        if authorized.located.list().tasks.len() >= self.limits.max_tasks_per_list {
            return Err(ListServiceError::LimitExceeded {
                kind: LimitKind::TasksPerList,
                max: self.limits.max_tasks_per_list,
            });
        }

        let now = self.clock.now_ms();
        let list = authorized.located.list_mut();
        list.tasks.push(Task::new(text, now));
        list.touch(now);
        self.persist_edit(&authorized)?;
        Ok(authorized.view())
    }

    /// Edits task text and/or completion.
    pub fn update_task(
        &self,
        user_id: UserId,
        list_id: ListId,
        task_id: TaskId,
        request: &UpdateTaskRequest,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.update_task_inner(user_id, list_id, task_id, request);
        log_outcome("task_update", Some(list_id), started_at, &result);
        result
    }

    fn update_task_inner(
        &self,
        user_id: UserId,
        list_id: ListId,
        task_id: TaskId,
        request: &UpdateTaskRequest,
    ) -> ListServiceResult<ListWithStats> {
        let text = request
            .text
            .as_deref()
            .map(|text| validate_task_text(text, &self.limits))
            .transpose()?;
        let mut authorized = self.authorize(user_id, list_id, ListAction::Edit)?;

        let now = self.clock.now_ms();
        let list = authorized.located.list_mut();
        let task = list
            .task_mut(task_id)
            .ok_or(ListServiceError::TaskNotFound { list_id, task_id })?;
        if let Some(text) = text {
            task.text = text;
        }
        if let Some(completed) = request.completed {
            task.set_completed(completed, now);
        }
        list.touch(now);
        self.persist_edit(&authorized)?;
        Ok(authorized.view())
    }

    /// Removes a task from its list.
    pub fn delete_task(
        &self,
        user_id: UserId,
        list_id: ListId,
        task_id: TaskId,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.delete_task_inner(user_id, list_id, task_id);
        log_outcome("task_delete", Some(list_id), started_at, &result);
        result
    }

    fn delete_task_inner(
        &self,
        user_id: UserId,
        list_id: ListId,
        task_id: TaskId,
    ) -> ListServiceResult<ListWithStats> {
        let mut authorized = self.authorize(user_id, list_id, ListAction::Edit)?;
        let now = self.clock.now_ms();
        let list = authorized.located.list_mut();
        let position = list
            .tasks
            .iter()
            .position(|task| task.id == task_id)
            .ok_or(ListServiceError::TaskNotFound { list_id, task_id })?;
        list.tasks.remove(position);
        list.touch(now);
        self.persist_edit(&authorized)?;
        Ok(authorized.view())
    }

    /// Flips a task's completion, setting or clearing `completed_at`.
    pub fn toggle_task(
        &self,
        user_id: UserId,
        list_id: ListId,
        task_id: TaskId,
    ) -> ListServiceResult<ListWithStats> {
        let started_at = Instant::now();
        let result = self.toggle_task_inner(user_id, list_id, task_id);
        log_outcome("task_toggle", Some(list_id), started_at, &result);
        result
    }

    fn toggle_task_inner(
        &self,
        user_id: UserId,
        list_id: ListId,
        task_id: TaskId,
    ) -> ListServiceResult<ListWithStats> {
        let mut authorized = self.authorize(user_id, list_id, ListAction::Edit)?;
        let now = self.clock.now_ms();
        let list = authorized.located.list_mut();
        list.task_mut(task_id)
            .ok_or(ListServiceError::TaskNotFound { list_id, task_id })?
            .toggle(now);
        list.touch(now);
        self.persist_edit(&authorized)?;
        Ok(authorized.view())
    }

    /// Snapshot of the user's own lists for backup. No side effects.
    pub fn export_lists(&self, user_id: UserId) -> ListServiceResult<ListExport> {
        let user = self
            .users
            .get_user(user_id)?
            .ok_or(ListServiceError::UserNotFound(user_id))?;
        let lists = self.lists.load_lists(user_id)?;
        info!(
            "event=lists_export module=list_service status=ok count={}",
            lists.len()
        );
        Ok(ListExport {
            version: EXPORT_VERSION.to_string(),
            exported_at: self.clock.now_ms(),
            user: UserSummary::from(&user),
            lists,
        })
    }

    fn collect_views(&self, user_id: UserId) -> ListServiceResult<Vec<ListWithStats>> {
        let viewer_email = self.viewer_email(user_id)?;
        // Only registered users get a seeded partition.
        let own = match self.lists.load_collection(user_id)? {
            Some(collection) => collection,
            None if self.seed_example_lists && viewer_email.is_some() => {
                self.seed_examples(user_id)?
            }
            None => Vec::new(),
        };
        let mut seen: HashSet<ListId> = own.iter().map(|list| list.id).collect();
        let mut views: Vec<ListWithStats> = own
            .into_iter()
            .map(|list| view_for(list, user_id, user_id, viewer_email.as_deref()))
            .collect();

        let Some(email) = viewer_email.as_deref() else {
            return Ok(views);
        };
        let entries = self.share_index.entries_for(email)?;
        if entries.is_empty() {
            return Ok(views);
        }
        let candidates: HashSet<ListId> = entries.iter().map(|entry| entry.list_id).collect();
        let owners: HashSet<UserId> = entries.iter().map(|entry| entry.owner_id).collect();

        for owner in self.users.list_users()? {
            if owner.id == user_id || !owners.contains(&owner.id) {
                continue;
            }
            for list in self.lists.load_lists(owner.id)? {
                if candidates.contains(&list.id) && list.is_shared_with(email) && seen.insert(list.id)
                {
                    views.push(view_for(list, owner.id, user_id, Some(email)));
                }
            }
        }
        Ok(views)
    }

    /// Owner-first lookup of a list visible to the viewer.
    fn find_list_by_id(
        &self,
        user_id: UserId,
        viewer_email: Option<&str>,
        list_id: ListId,
    ) -> ListServiceResult<Option<Located>> {
        let own = self.lists.load_lists(user_id)?;
        if let Some(position) = own.iter().position(|list| list.id == list_id) {
            return Ok(Some(Located {
                owner_id: user_id,
                collection: own,
                position,
            }));
        }

        let Some(email) = viewer_email else {
            return Ok(None);
        };
        let owners: HashSet<UserId> = self
            .share_index
            .entries_for(email)?
            .into_iter()
            .filter(|entry| entry.list_id == list_id && entry.owner_id != user_id)
            .map(|entry| entry.owner_id)
            .collect();
        if owners.is_empty() {
            return Ok(None);
        }

        for owner in self.users.list_users()? {
            if !owners.contains(&owner.id) {
                continue;
            }
            let collection = self.lists.load_lists(owner.id)?;
            if let Some(position) = collection
                .iter()
                .position(|list| list.id == list_id && list.is_shared_with(email))
            {
                return Ok(Some(Located {
                    owner_id: owner.id,
                    collection,
                    position,
                }));
            }
        }
        Ok(None)
    }

    /// Scans every known partition; only used to tell "forbidden" from
    /// "missing" after a visible lookup failed.
    fn exists_anywhere(&self, list_id: ListId) -> ListServiceResult<bool> {
        for user in self.users.list_users()? {
            if self
                .lists
                .load_lists(user.id)?
                .iter()
                .any(|list| list.id == list_id)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn authorize(
        &self,
        user_id: UserId,
        list_id: ListId,
        action: ListAction,
    ) -> ListServiceResult<Authorized> {
        let viewer_email = self.viewer_email(user_id)?;
        let Some(located) = self.find_list_by_id(user_id, viewer_email.as_deref(), list_id)? else {
            return Err(if self.exists_anywhere(list_id)? {
                ListServiceError::PermissionDenied { action, list_id }
            } else {
                ListServiceError::ListNotFound(list_id)
            });
        };

        let access = ListAccess::evaluate(
            located.list(),
            located.owner_id,
            user_id,
            viewer_email.as_deref(),
        );
        if !action.allowed(&access) {
            return Err(ListServiceError::PermissionDenied { action, list_id });
        }
        Ok(Authorized {
            located,
            viewer_id: user_id,
            viewer_email,
        })
    }

    fn viewer_email(&self, user_id: UserId) -> ListServiceResult<Option<String>> {
        Ok(self.users.get_user(user_id)?.map(|user| user.email))
    }

    fn persist_edit(&self, authorized: &Authorized) -> ListServiceResult<()> {
        let located = &authorized.located;
        self.lists
            .save_collection(located.owner_id, &located.collection)?;
        self.invalidate_after_write(
            authorized.viewer_id,
            located.owner_id,
            &located.list().shared_with,
        );
        Ok(())
    }

    fn invalidate_after_write(&self, writer: UserId, owner: UserId, emails: &[String]) {
        self.cache.invalidate_many([writer, owner]);
        if emails.is_empty() || !self.cache.is_enabled() {
            return;
        }
        match self.users.list_users() {
            Ok(users) => self.cache.invalidate_many(
                users
                    .iter()
                    .filter(|user| emails.iter().any(|e| e.eq_ignore_ascii_case(&user.email)))
                    .map(|user| user.id),
            ),
            Err(err) => {
                // Without the directory we cannot map emails to viewers.
                warn!(
                    "event=cache_invalidate module=list_service status=error error_code=directory_unavailable error={err}"
                );
                self.cache.clear();
            }
        }
    }

    fn drop_index_entry(&self, email: &str, list_id: ListId) {
        // A stale entry is filtered out on lookup, so failure here is not
        // reported to the caller.
        if let Err(err) = self.share_index.remove(email, list_id) {
            warn!(
                "event=share_index_remove module=list_service status=error list_id={list_id} error={err}"
            );
        }
    }

    fn seed_examples(&self, user_id: UserId) -> ListServiceResult<Vec<TaskList>> {
        let now = self.clock.now_ms();
        let mut welcome = TaskList::new(
            user_id,
            "Welcome to ListShare",
            vec![
                Task::new("Create your first list", now),
                Task::new("Share a list with a friend", now),
                Task::new("Mark a task as complete", now),
            ],
            now,
        );
        welcome.tasks[0].set_completed(true, now);
        let errands = TaskList::new(
            user_id,
            "Weekend Errands",
            vec![
                Task::new("Buy groceries", now),
                Task::new("Pick up dry cleaning", now),
            ],
            now,
        );

        let seeded = vec![welcome, errands];
        self.lists.save_collection(user_id, &seeded)?;
        info!("event=lists_seed module=list_service status=ok count={}", seeded.len());
        Ok(seeded)
    }
}

fn view_for(
    list: TaskList,
    owner_id: UserId,
    viewer_id: UserId,
    viewer_email: Option<&str>,
) -> ListWithStats {
    let access = ListAccess::evaluate(&list, owner_id, viewer_id, viewer_email);
    ListWithStats::new(list, access)
}

fn cache_key(filter: &ListFilter) -> String {
    serde_json::to_string(filter).unwrap_or_else(|_| format!("{filter:?}"))
}

fn difference(left: &[String], right: &[String]) -> Vec<String> {
    left.iter()
        .filter(|email| !right.contains(email))
        .cloned()
        .collect()
}

fn log_outcome<T>(
    event: &str,
    list_id: Option<ListId>,
    started_at: Instant,
    result: &ListServiceResult<T>,
) {
    let list_id = list_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
    match result {
        Ok(_) => info!(
            "event={event} module=list_service status=ok list_id={list_id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) if err.kind() == ErrorKind::Storage => log::error!(
            "event={event} module=list_service status=error list_id={list_id} duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
        Err(err) => warn!(
            "event={event} module=list_service status=rejected list_id={list_id} duration_ms={} error_code={}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
}
