//! Cached AI suggestions for the work breakdown.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::board::WorkItemKind;

/// A proposed epic, feature or story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub kind: WorkItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// Set once the suggestion has been turned into a work item.
    #[serde(default)]
    pub added_to_canvas: bool,
}

/// Suggestions of a canvas, grouped implicitly by `(kind, parent_id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuggestionCache {
    entries: Vec<Suggestion>,
}

impl SuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Suggestion] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Suggestion> {
        self.entries.iter().find(|s| s.id == id)
    }

    /// Suggestions for one parent, in insertion order.
    pub fn for_parent(&self, kind: WorkItemKind, parent_id: Option<&str>) -> Vec<&Suggestion> {
        self.entries
            .iter()
            .filter(|s| s.kind == kind && s.parent_id.as_deref() == parent_id)
            .collect()
    }

    /// Whether un-added suggestions exist for this parent.
    pub fn has_pending(&self, kind: WorkItemKind, parent_id: Option<&str>) -> bool {
        self.for_parent(kind, parent_id)
            .iter()
            .any(|s| !s.added_to_canvas)
    }

    /// Replace the pending suggestions for `(kind, parent_id)` with `fresh`.
    ///
    /// Accepted suggestions stay. Incoming entries whose id already exists
    /// anywhere, or whose title repeats one kept for the same parent, are
    /// skipped. Returns the suggestions now cached for that parent.
    pub fn merge(
        &mut self,
        kind: WorkItemKind,
        parent_id: Option<&str>,
        fresh: Vec<Suggestion>,
    ) -> Vec<&Suggestion> {
        self.entries.retain(|s| {
            s.added_to_canvas || s.kind != kind || s.parent_id.as_deref() != parent_id
        });

        let mut ids: HashSet<String> = self.entries.iter().map(|s| s.id.clone()).collect();
        let mut titles: HashSet<String> = self
            .for_parent(kind, parent_id)
            .iter()
            .map(|s| title_key(&s.title))
            .collect();

        for mut suggestion in fresh {
            if suggestion.title.trim().is_empty()
                || ids.contains(&suggestion.id)
                || !titles.insert(title_key(&suggestion.title))
            {
                continue;
            }
            ids.insert(suggestion.id.clone());
            suggestion.kind = kind;
            suggestion.parent_id = parent_id.map(str::to_string);
            suggestion.added_to_canvas = false;
            self.entries.push(suggestion);
        }

        self.for_parent(kind, parent_id)
    }

    /// Flag a suggestion as accepted. Returns `false` when it was already.
    pub fn mark_added(&mut self, id: &str) -> Option<bool> {
        let suggestion = self.entries.iter_mut().find(|s| s.id == id)?;
        let newly = !suggestion.added_to_canvas;
        suggestion.added_to_canvas = true;
        Some(newly)
    }

    /// Drop suggestions hanging off removed work items.
    pub fn prune_parents(&mut self, removed: &[String]) {
        self.entries.retain(|s| {
            s.parent_id
                .as_ref()
                .map_or(true, |parent| !removed.contains(parent))
        });
    }
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}
