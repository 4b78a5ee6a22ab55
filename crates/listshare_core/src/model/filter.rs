//! Filtering and ordering of list views.

use crate::model::list::ListWithStats;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Title,
    CreatedAt,
    UpdatedAt,
    CompletionPercentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// View filter for `load_user_lists`.
///
/// Serialized form doubles as the cache key, so field order is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListFilter {
    /// Case-insensitive substring over titles and task text.
    pub search: Option<String>,
    pub include_owned: bool,
    pub include_shared: bool,
    /// When false, lists whose tasks are all done are hidden.
    pub include_completed: bool,
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            search: None,
            include_owned: true,
            include_shared: true,
            include_completed: true,
            sort_by: SortKey::UpdatedAt,
            sort_order: SortOrder::Descending,
        }
    }
}

impl ListFilter {
    pub fn matches(&self, item: &ListWithStats) -> bool {
        if item.is_owner && !self.include_owned {
            return false;
        }
        if !item.is_owner && !self.include_shared {
            return false;
        }
        if !self.include_completed && item.stats.is_complete() {
            return false;
        }
        match self.normalized_search() {
            Some(needle) => {
                item.list.title.to_lowercase().contains(&needle)
                    || item
                        .list
                        .tasks
                        .iter()
                        .any(|task| task.text.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    /// Filters then stable-sorts; ties keep their incoming order.
    pub fn apply(&self, items: Vec<ListWithStats>) -> Vec<ListWithStats> {
        let mut kept: Vec<ListWithStats> =
            items.into_iter().filter(|item| self.matches(item)).collect();
        kept.sort_by(|a, b| {
            let ordering = compare_by(self.sort_by, a, b);
            match self.sort_order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        kept
    }

    fn normalized_search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase)
    }
}

fn compare_by(key: SortKey, a: &ListWithStats, b: &ListWithStats) -> Ordering {
    match key {
        SortKey::Title => a
            .list
            .title
            .to_lowercase()
            .cmp(&b.list.title.to_lowercase()),
        SortKey::CreatedAt => a.list.created_at.cmp(&b.list.created_at),
        SortKey::UpdatedAt => a.list.updated_at.cmp(&b.list.updated_at),
        SortKey::CompletionPercentage => a
            .stats
            .completion_percentage
            .total_cmp(&b.stats.completion_percentage),
    }
}
