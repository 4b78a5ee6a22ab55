//! Lists view state and its reducer.
//!
//! # Invariants
//! - `selected_list_id`, when set, names a list present in `lists` or one
//!   whose load is still pending; deleting that list clears it.
//! - A failed action never drops already loaded lists.

use crate::model::filter::ListFilter;
use crate::model::list::{ListId, ListWithStats};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListsState {
    pub lists: Vec<ListWithStats>,
    pub selected_list_id: Option<ListId>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub filter: ListFilter,
}

impl ListsState {
    pub fn selected(&self) -> Option<&ListWithStats> {
        let id = self.selected_list_id?;
        self.lists.iter().find(|item| item.id() == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListsAction {
    LoadStarted,
    LoadSucceeded(Vec<ListWithStats>),
    LoadFailed(String),
    /// A created list goes to the front, matching storage order.
    ListCreated(ListWithStats),
    /// Replaces the list with the same id (rename, share, any task change).
    ListChanged(ListWithStats),
    ListDeleted(ListId),
    Select(Option<ListId>),
    FilterChanged(ListFilter),
    OperationFailed(String),
    ErrorCleared,
    /// Sign-out: drop everything.
    Reset,
}

/// Returns the next state for `action`.
pub fn reduce(state: ListsState, action: ListsAction) -> ListsState {
    match action {
        ListsAction::LoadStarted => ListsState {
            is_loading: true,
            error: None,
            ..state
        },
        ListsAction::LoadSucceeded(lists) => {
            let selected_list_id = state
                .selected_list_id
                .filter(|id| lists.iter().any(|item| item.id() == *id));
            ListsState {
                lists,
                selected_list_id,
                is_loading: false,
                error: None,
                ..state
            }
        }
        ListsAction::LoadFailed(message) => ListsState {
            is_loading: false,
            error: Some(message),
            ..state
        },
        ListsAction::ListCreated(created) => {
            let mut lists = state.lists;
            lists.retain(|item| item.id() != created.id());
            lists.insert(0, created);
            ListsState {
                lists,
                error: None,
                ..state
            }
        }
        ListsAction::ListChanged(changed) => {
            let mut lists = state.lists;
            if let Some(slot) = lists.iter_mut().find(|item| item.id() == changed.id()) {
                *slot = changed;
            } else {
                lists.push(changed);
            }
            ListsState {
                lists,
                error: None,
                ..state
            }
        }
        ListsAction::ListDeleted(list_id) => {
            let mut lists = state.lists;
            lists.retain(|item| item.id() != list_id);
            let selected_list_id = state.selected_list_id.filter(|id| *id != list_id);
            ListsState {
                lists,
                selected_list_id,
                error: None,
                ..state
            }
        }
        ListsAction::Select(selected_list_id) => ListsState {
            selected_list_id,
            ..state
        },
        ListsAction::FilterChanged(filter) => ListsState { filter, ..state },
        ListsAction::OperationFailed(message) => ListsState {
            error: Some(message),
            ..state
        },
        ListsAction::ErrorCleared => ListsState {
            error: None,
            ..state
        },
        ListsAction::Reset => ListsState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::{reduce, ListsAction, ListsState};
    use crate::model::list::{ListAccess, ListWithStats, TaskList};
    use uuid::Uuid;

    fn item(title: &str) -> ListWithStats {
        ListWithStats::new(
            TaskList::new(Uuid::new_v4(), title, Vec::new(), 1),
            ListAccess {
                is_owner: true,
                can_edit: true,
                can_share: true,
                can_delete: true,
            },
        )
    }

    #[test]
    fn deleting_selected_list_clears_selection() {
        let a = item("a");
        let b = item("b");
        let state = reduce(
            ListsState::default(),
            ListsAction::LoadSucceeded(vec![a.clone(), b.clone()]),
        );
        let state = reduce(state, ListsAction::Select(Some(a.id())));
        assert_eq!(state.selected().map(|s| s.id()), Some(a.id()));

        let state = reduce(state, ListsAction::ListDeleted(b.id()));
        assert_eq!(state.selected_list_id, Some(a.id()));

        let state = reduce(state, ListsAction::ListDeleted(a.id()));
        assert!(state.selected_list_id.is_none());
        assert!(state.lists.is_empty());
    }

    #[test]
    fn created_list_goes_first_and_changes_replace_in_place() {
        let a = item("a");
        let state = reduce(ListsState::default(), ListsAction::LoadSucceeded(vec![a.clone()]));
        let b = item("b");
        let state = reduce(state, ListsAction::ListCreated(b.clone()));
        assert_eq!(state.lists[0].id(), b.id());

        let mut renamed = a.clone();
        renamed.list.title = "renamed".to_string();
        let state = reduce(state, ListsAction::ListChanged(renamed));
        assert_eq!(state.lists[1].list.title, "renamed");
        assert_eq!(state.lists.len(), 2);
    }

    #[test]
    fn load_failure_keeps_previous_lists() {
        let a = item("a");
        let state = reduce(ListsState::default(), ListsAction::LoadSucceeded(vec![a]));
        let state = reduce(state, ListsAction::LoadStarted);
        assert!(state.is_loading);
        let state = reduce(state, ListsAction::LoadFailed("storage error".to_string()));
        assert!(!state.is_loading);
        assert_eq!(state.lists.len(), 1);
        assert_eq!(state.error.as_deref(), Some("storage error"));
    }

    #[test]
    fn reload_drops_selection_of_vanished_list() {
        let a = item("a");
        let state = reduce(ListsState::default(), ListsAction::LoadSucceeded(vec![a.clone()]));
        let state = reduce(state, ListsAction::Select(Some(a.id())));
        let state = reduce(state, ListsAction::LoadSucceeded(Vec::new()));
        assert!(state.selected_list_id.is_none());
    }
}
