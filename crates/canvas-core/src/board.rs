//! Work breakdown board: epics, features and stories across Kanban columns.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Level in the work breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Epic,
    Feature,
    Story,
}

impl WorkItemKind {
    /// Kind a parent must have, `None` for top-level items.
    pub fn parent_kind(&self) -> Option<WorkItemKind> {
        match self {
            WorkItemKind::Epic => None,
            WorkItemKind::Feature => Some(WorkItemKind::Epic),
            WorkItemKind::Story => Some(WorkItemKind::Feature),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemKind::Epic => "epic",
            WorkItemKind::Feature => "feature",
            WorkItemKind::Story => "story",
        }
    }
}

impl std::fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardColumn {
    #[default]
    Backlog,
    InProgress,
    Done,
}

/// A single epic, feature or story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub kind: WorkItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Objective / key result this item traces back to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub okr_ref: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub column: BoardColumn,
    #[serde(default)]
    pub rank: usize,
}

/// Partial update of a work item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItemPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Option<Vec<String>>,
    #[serde(default)]
    pub okr_ref: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("Work item already exists: {0}")]
    DuplicateId(String),

    #[error("Work item not found: {0}")]
    NotFound(String),

    #[error("An epic cannot have a parent")]
    EpicWithParent,

    #[error("A {kind} requires a parent {expected}")]
    MissingParent {
        kind: WorkItemKind,
        expected: WorkItemKind,
    },

    #[error("Parent {parent_id} of a {kind} must be a {expected}")]
    InvalidParent {
        kind: WorkItemKind,
        parent_id: String,
        expected: WorkItemKind,
    },

    #[error("Work item title cannot be empty")]
    EmptyTitle,
}

/// The board of a canvas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    items: Vec<WorkItem>,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Add an item at the end of its column.
    pub fn add(&mut self, mut item: WorkItem) -> Result<&WorkItem, BoardError> {
        if item.title.trim().is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        if self.get(&item.id).is_some() {
            return Err(BoardError::DuplicateId(item.id));
        }
        self.check_parent(item.kind, item.parent_id.as_deref())?;

        item.rank = self
            .items
            .iter()
            .filter(|other| other.kind == item.kind && other.column == item.column)
            .count();
        self.items.push(item);
        Ok(&self.items[self.items.len() - 1])
    }

    fn check_parent(&self, kind: WorkItemKind, parent_id: Option<&str>) -> Result<(), BoardError> {
        match (kind.parent_kind(), parent_id) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(BoardError::EpicWithParent),
            (Some(expected), None) => Err(BoardError::MissingParent { kind, expected }),
            (Some(expected), Some(parent_id)) => match self.get(parent_id) {
                Some(parent) if parent.kind == expected => Ok(()),
                _ => Err(BoardError::InvalidParent {
                    kind,
                    parent_id: parent_id.to_string(),
                    expected,
                }),
            },
        }
    }

    pub fn update(&mut self, id: &str, patch: WorkItemPatch) -> Result<&WorkItem, BoardError> {
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(BoardError::EmptyTitle);
        }
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))?;

        if let Some(title) = patch.title {
            item.title = title;
        }
        if let Some(description) = patch.description {
            item.description = description;
        }
        if let Some(criteria) = patch.acceptance_criteria {
            item.acceptance_criteria = criteria;
        }
        if let Some(okr_ref) = patch.okr_ref {
            item.okr_ref = if okr_ref.is_empty() { None } else { Some(okr_ref) };
        }
        Ok(item)
    }

    /// Move an item to `position` within `column` (clamped), re-ranking
    /// the affected columns.
    pub fn move_item(
        &mut self,
        id: &str,
        column: BoardColumn,
        position: usize,
    ) -> Result<&WorkItem, BoardError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))?;
        let kind = self.items[index].kind;
        let source = self.items[index].column;

        let mut target: Vec<usize> = self.ordered(kind, column);
        target.retain(|&i| i != index);
        let position = position.min(target.len());
        target.insert(position, index);

        self.items[index].column = column;
        for (rank, &i) in target.iter().enumerate() {
            self.items[i].rank = rank;
        }
        if source != column {
            self.rerank(kind, source);
        }
        Ok(&self.items[index])
    }

    /// Remove an item and all of its descendants. Returns the removed ids.
    pub fn remove(&mut self, id: &str) -> Result<Vec<String>, BoardError> {
        if self.get(id).is_none() {
            return Err(BoardError::NotFound(id.to_string()));
        }

        let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
        loop {
            let before = doomed.len();
            for item in &self.items {
                if item.parent_id.as_ref().is_some_and(|p| doomed.contains(p)) {
                    doomed.insert(item.id.clone());
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        let mut removed = Vec::new();
        let mut touched = HashSet::new();
        self.items.retain(|item| {
            if doomed.contains(&item.id) {
                removed.push(item.id.clone());
                touched.insert((item.kind, item.column));
                false
            } else {
                true
            }
        });
        for (kind, column) in touched {
            self.rerank(kind, column);
        }
        Ok(removed)
    }

    pub fn children_of(&self, parent_id: &str) -> Vec<&WorkItem> {
        self.items
            .iter()
            .filter(|item| item.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    /// Items of one kind in a column, in rank order.
    pub fn column(&self, kind: WorkItemKind, column: BoardColumn) -> Vec<&WorkItem> {
        self.ordered(kind, column)
            .into_iter()
            .map(|i| &self.items[i])
            .collect()
    }

    fn ordered(&self, kind: WorkItemKind, column: BoardColumn) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.kind == kind && item.column == column)
            .map(|(i, _)| i)
            .collect();
        indices.sort_by_key(|&i| self.items[i].rank);
        indices
    }

    fn rerank(&mut self, kind: WorkItemKind, column: BoardColumn) {
        for (rank, i) in self.ordered(kind, column).into_iter().enumerate() {
            self.items[i].rank = rank;
        }
    }
}
