//! Task list domain model.
//!
//! # Responsibility
//! - Define the persisted `TaskList`/`Task` records.
//! - Derive statistics and per-viewer permission projections.
//! - Validate titles and task text against configured limits.
//!
//! # Invariants
//! - `shared_with` holds unique, normalized emails in insertion order.
//! - `completed_at` is `Some` exactly when `completed` is `true`.
//! - Statistics are always recomputed from `tasks`; they are never stored.

use crate::config::ListLimits;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ListId = Uuid;
pub type TaskId = Uuid;

/// One to-do item inside a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    pub created_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl Task {
    /// Creates an incomplete task with a fresh id.
    pub fn new(text: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            completed: false,
            created_at: now_ms,
            completed_at: None,
        }
    }

    /// Sets completion state, keeping `completed_at` consistent.
    ///
    /// Re-completing an already completed task keeps its original timestamp.
    pub fn set_completed(&mut self, completed: bool, now_ms: i64) {
        if completed && !self.completed {
            self.completed_at = Some(now_ms);
        } else if !completed {
            self.completed_at = None;
        }
        self.completed = completed;
    }

    pub fn toggle(&mut self, now_ms: i64) {
        self.set_completed(!self.completed, now_ms);
    }
}

/// A named, owned, optionally shared, ordered collection of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: ListId,
    pub title: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub shared_with: Vec<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TaskList {
    /// Creates an unshared list owned by `owner_id`.
    pub fn new(owner_id: UserId, title: impl Into<String>, tasks: Vec<Task>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            owner_id,
            shared_with: Vec::new(),
            tasks,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Case-insensitive membership check against `shared_with`.
    pub fn is_shared_with(&self, email: &str) -> bool {
        let needle = email.trim();
        self.shared_with
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(needle))
    }

    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == task_id)
    }

    /// Recomputes statistics from the current task sequence.
    pub fn statistics(&self) -> ListStatistics {
        ListStatistics::from_list(self)
    }

    /// Marks the list as modified at `now_ms`.
    pub fn touch(&mut self, now_ms: i64) {
        self.updated_at = now_ms;
    }
}

/// Derived counters for one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    /// 0..=100; 0 for an empty list.
    pub completion_percentage: f64,
    pub last_activity: i64,
}

impl ListStatistics {
    pub fn from_list(list: &TaskList) -> Self {
        let total_tasks = list.tasks.len();
        let completed_tasks = list.tasks.iter().filter(|task| task.completed).count();
        let completion_percentage = if total_tasks == 0 {
            0.0
        } else {
            completed_tasks as f64 / total_tasks as f64 * 100.0
        };
        let last_activity = list
            .tasks
            .iter()
            .flat_map(|task| std::iter::once(task.created_at).chain(task.completed_at))
            .fold(list.updated_at, i64::max);

        Self {
            total_tasks,
            completed_tasks,
            pending_tasks: total_tasks - completed_tasks,
            completion_percentage,
            last_activity,
        }
    }

    /// True for a non-empty list whose tasks are all done.
    pub fn is_complete(&self) -> bool {
        self.total_tasks > 0 && self.completed_tasks == self.total_tasks
    }
}

/// Permissions of one viewer on one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAccess {
    pub is_owner: bool,
    pub can_edit: bool,
    pub can_share: bool,
    pub can_delete: bool,
}

impl ListAccess {
    /// Owner may do everything; collaborators (by email) may only edit.
    pub fn evaluate(
        list: &TaskList,
        owner_id: UserId,
        viewer_id: UserId,
        viewer_email: Option<&str>,
    ) -> Self {
        let is_owner = owner_id == viewer_id;
        let is_collaborator = viewer_email.is_some_and(|email| list.is_shared_with(email));
        Self {
            is_owner,
            can_edit: is_owner || is_collaborator,
            can_share: is_owner,
            can_delete: is_owner,
        }
    }
}

/// A list enriched with statistics and permissions relative to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWithStats {
    #[serde(flatten)]
    pub list: TaskList,
    pub stats: ListStatistics,
    pub is_owner: bool,
    pub can_edit: bool,
    pub can_share: bool,
    pub can_delete: bool,
}

impl ListWithStats {
    pub fn new(list: TaskList, access: ListAccess) -> Self {
        let stats = list.statistics();
        Self {
            list,
            stats,
            is_owner: access.is_owner,
            can_edit: access.can_edit,
            can_share: access.can_share,
            can_delete: access.can_delete,
        }
    }

    pub fn id(&self) -> ListId {
        self.list.id
    }
}

/// Input validation failures for list and task fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListValidationError {
    EmptyTitle,
    TitleTooLong { max_chars: usize },
    EmptyTaskText,
    TaskTextTooLong { max_chars: usize },
    InvalidEmail(String),
    DuplicateEmail(String),
    TooManyCollaborators { max: usize },
}

impl Display for ListValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "list title must not be blank"),
            Self::TitleTooLong { max_chars } => {
                write!(f, "list title must be at most {max_chars} characters")
            }
            Self::EmptyTaskText => write!(f, "task text must not be blank"),
            Self::TaskTextTooLong { max_chars } => {
                write!(f, "task text must be at most {max_chars} characters")
            }
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::DuplicateEmail(value) => write!(f, "email listed more than once: `{value}`"),
            Self::TooManyCollaborators { max } => {
                write!(f, "a list can be shared with at most {max} users")
            }
        }
    }
}

impl Error for ListValidationError {}

/// Trims and validates a list title.
pub fn validate_title(title: &str, limits: &ListLimits) -> Result<String, ListValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ListValidationError::EmptyTitle);
    }
    if trimmed.chars().count() > limits.max_title_chars {
        return Err(ListValidationError::TitleTooLong {
            max_chars: limits.max_title_chars,
        });
    }
    Ok(trimmed.to_string())
}

/// Trims and validates task text.
pub fn validate_task_text(text: &str, limits: &ListLimits) -> Result<String, ListValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ListValidationError::EmptyTaskText);
    }
    if trimmed.chars().count() > limits.max_task_text_chars {
        return Err(ListValidationError::TaskTextTooLong {
            max_chars: limits.max_task_text_chars,
        });
    }
    Ok(trimmed.to_string())
}

/// Normalizes a full collaborator set: valid, unique, within the ceiling.
pub fn validate_shared_with(
    emails: &[String],
    limits: &ListLimits,
) -> Result<Vec<String>, ListValidationError> {
    let mut normalized: Vec<String> = Vec::with_capacity(emails.len());
    for email in emails {
        let value = crate::model::user::validate_email(email)
            .map_err(|_| ListValidationError::InvalidEmail(email.trim().to_string()))?;
        if normalized.contains(&value) {
            return Err(ListValidationError::DuplicateEmail(value));
        }
        normalized.push(value);
    }
    if normalized.len() > limits.max_shared_with {
        return Err(ListValidationError::TooManyCollaborators {
            max: limits.max_shared_with,
        });
    }
    Ok(normalized)
}
