//! CanvasOps - the main service for executing operations.
//!
//! Holds configuration, the repository and the active LLM provider, and
//! provides methods for every canvas operation. Cheap to clone and shared
//! across request handlers.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use canvas_core::{
    new_item_id, validate_canvas_structure, Board, CanvasFields, CanvasId, CanvasRecord,
    CanvasStatus, CanvasSummary, FieldEdit, FieldEnvelope, FieldKey, LlmSettings, Role, Settings,
    Suggestion, UserId, WorkItem, WorkItemKind, WorkItemPatch,
};
use canvas_llm::{
    initial_prompt, parse_dual_response, parse_suggestions, provider_from_settings,
    refinement_prompt, suggestion_prompt, system_prompt, ChatMessage, LlmProvider, LlmResult,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{OpsError, OpsResult};
use crate::repository::CanvasRepository;
use crate::requests::*;
use crate::responses::*;

/// Builds a provider from stored credentials.
pub type ProviderFactory =
    Arc<dyn Fn(&LlmSettings, Duration) -> LlmResult<Arc<dyn LlmProvider>> + Send + Sync>;

const SUGGESTION_SYSTEM_PROMPT: &str =
    "You break business canvases down into delivery work. Answer with JSON only.";

/// The main operations context.
#[derive(Clone)]
pub struct CanvasOps {
    /// Configuration for operations.
    pub config: Config,
    repo: Arc<dyn CanvasRepository>,
    provider: Arc<RwLock<Option<Arc<dyn LlmProvider>>>>,
    pub(crate) factory: ProviderFactory,
    /// Serializes settings updates.
    pub(crate) settings_lock: Arc<tokio::sync::Mutex<()>>,
    canvas_locks: Arc<CanvasLocks>,
}

type CanvasLocks = Mutex<HashMap<CanvasId, Arc<tokio::sync::Mutex<()>>>>;

struct CanvasGuard {
    id: CanvasId,
    locks: Arc<CanvasLocks>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for CanvasGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters hold their own clone of the mutex.
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

impl CanvasOps {
    /// Create a context without an active provider.
    pub fn new(config: Config, repo: Arc<dyn CanvasRepository>) -> Self {
        Self {
            config,
            repo,
            provider: Arc::new(RwLock::new(None)),
            factory: Arc::new(provider_from_settings),
            settings_lock: Arc::new(tokio::sync::Mutex::new(())),
            canvas_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Use a fixed provider (tests, one-shot CLI runs).
    pub fn with_provider(self, provider: Arc<dyn LlmProvider>) -> Self {
        self.set_provider(Some(provider));
        self
    }

    /// Replace how providers are built from settings.
    pub fn with_provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn repository(&self) -> &Arc<dyn CanvasRepository> {
        &self.repo
    }

    pub(crate) fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm_timeout_secs)
    }

    /// The active provider, if any.
    pub fn provider(&self) -> Option<Arc<dyn LlmProvider>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_provider(&self, provider: Option<Arc<dyn LlmProvider>>) {
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = provider;
    }

    pub fn provider_info(&self) -> Option<ProviderInfo> {
        self.provider().map(|p| ProviderInfo {
            name: p.name().to_string(),
            model: p.model().to_string(),
        })
    }

    fn require_provider(&self) -> OpsResult<Arc<dyn LlmProvider>> {
        self.provider().ok_or(OpsError::ProviderNotConfigured)
    }

    /// Hold the per-canvas lock; the entry is dropped once nobody holds or awaits it.
    async fn lock_canvas(&self, id: CanvasId) -> CanvasGuard {
        let lock = self
            .canvas_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone();
        CanvasGuard {
            id,
            locks: self.canvas_locks.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of canvases with a held or awaited lock.
    pub fn active_canvas_locks(&self) -> usize {
        self.canvas_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn load_owned(&self, user: &UserId, id: CanvasId) -> OpsResult<CanvasRecord> {
        let record = self
            .repo
            .load_canvas(id)
            .await?
            .ok_or_else(|| OpsError::not_found(id))?;
        if !record.is_owned_by(user) {
            warn!(canvas = %id, user = %user, "Rejected access to another user's canvas");
            return Err(OpsError::Forbidden { id: id.to_string() });
        }
        Ok(record)
    }

    /// Load, change, audit and save a canvas under its lock.
    async fn mutate<T>(
        &self,
        user: &UserId,
        id: CanvasId,
        action: impl Into<String>,
        change: impl FnOnce(&mut CanvasRecord) -> OpsResult<T>,
    ) -> OpsResult<T> {
        let _guard = self.lock_canvas(id).await;

        let mut record = self.load_owned(user, id).await?;
        let result = change(&mut record)?;
        record.audit(user, action);
        self.repo.save_canvas(&record).await?;
        Ok(result)
    }

    async fn disabled_fields(&self) -> OpsResult<BTreeSet<FieldKey>> {
        Ok(self
            .repo
            .load_settings()
            .await?
            .unwrap_or_default()
            .disabled_fields)
    }

    // =========================================================================
    // Canvas Lifecycle
    // =========================================================================

    pub async fn create_canvas(
        &self,
        user: &UserId,
        request: CreateCanvasRequest,
    ) -> OpsResult<CanvasRecord> {
        check(&request)?;
        let record = CanvasRecord::new(user.clone(), request.name);
        self.repo.save_canvas(&record).await?;
        info!(canvas = %record.id, user = %user, "Created canvas");
        Ok(record)
    }

    /// Drafted canvases of `user`, newest first.
    pub async fn list_canvases(&self, user: &UserId) -> OpsResult<Vec<CanvasSummary>> {
        let mut records: Vec<CanvasRecord> = self
            .repo
            .list_canvases()
            .await?
            .into_iter()
            .filter(|r| r.is_owned_by(user) && r.status == CanvasStatus::Drafted)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.iter().map(CanvasRecord::summary).collect())
    }

    pub async fn get_canvas(&self, user: &UserId, id: CanvasId) -> OpsResult<CanvasDetail> {
        let record = self.load_owned(user, id).await?;
        Ok(CanvasDetail::from(&record))
    }

    /// Plain field values; `None` until a canvas has been generated.
    pub async fn get_fields(
        &self,
        user: &UserId,
        id: CanvasId,
    ) -> OpsResult<Option<serde_json::Value>> {
        let record = self.load_owned(user, id).await?;
        Ok((!record.document.is_empty()).then(|| record.document.to_json()))
    }

    pub async fn rename_canvas(
        &self,
        user: &UserId,
        id: CanvasId,
        request: RenameCanvasRequest,
    ) -> OpsResult<CanvasSummary> {
        check(&request)?;
        let name = request.name.trim().to_string();
        self.mutate(user, id, format!("renamed to '{}'", name), |record| {
            record.name = name;
            Ok(record.summary())
        })
        .await
    }

    pub async fn delete_canvas(&self, user: &UserId, id: CanvasId) -> OpsResult<()> {
        let _guard = self.lock_canvas(id).await;

        self.load_owned(user, id).await?;
        self.repo.delete_canvas(id).await?;
        info!(canvas = %id, user = %user, "Deleted canvas");
        Ok(())
    }

    pub async fn status(&self) -> OpsResult<StatusResponse> {
        Ok(StatusResponse {
            provider: self.provider_info(),
            canvas_count: self.repo.list_canvases().await?.len(),
        })
    }

    // =========================================================================
    // Conversation
    // =========================================================================

    /// Send a chat message and apply the regenerated canvas.
    ///
    /// The first message generates the canvas from the problem statement;
    /// later ones refine it. The stored conversation is replayed so the
    /// model sees the full exchange.
    pub async fn send_message(
        &self,
        user: &UserId,
        id: CanvasId,
        request: SendMessageRequest,
    ) -> OpsResult<MessageResponse> {
        check(&request)?;
        if let Some(oversized) = request
            .attachments
            .iter()
            .find(|a| a.text.len() > self.config.max_attachment_bytes)
        {
            return Err(OpsError::validation(
                "Attachment too large",
                vec![format!(
                    "'{}' exceeds {} bytes",
                    oversized.name, self.config.max_attachment_bytes
                )],
            ));
        }
        let provider = self.require_provider()?;

        let _guard = self.lock_canvas(id).await;
        let mut record = self.load_owned(user, id).await?;
        let disabled = self.disabled_fields().await?;

        let prompt = if record.is_first_message() {
            initial_prompt(&request.message, &request.attachments)
        } else {
            refinement_prompt(
                &request.message,
                &record.document.to_json(),
                &record.document.locked_fields(),
                &request.attachments,
            )
        };

        let mut messages = Vec::with_capacity(record.conversation.len() + 2);
        messages.push(ChatMessage::system(system_prompt(&disabled)));
        for turn in &record.conversation {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.raw.clone()),
                Role::Assistant => ChatMessage::assistant(turn.raw.clone()),
            });
        }
        messages.push(ChatMessage::user(prompt.clone()));

        debug!(
            canvas = %id,
            provider = provider.name(),
            turns = messages.len(),
            "Sending canvas conversation"
        );
        let reply = provider.complete(&messages).await?;

        let (chat_response, canvas_json) =
            parse_dual_response(&reply).map_err(|err| OpsError::ResponseParse(err.to_string()))?;

        let warnings: Vec<String> = validate_canvas_structure(&canvas_json)
            .into_iter()
            .filter(|problem| {
                !disabled
                    .iter()
                    .any(|key| problem == &format!("Missing required field: '{}'", key))
            })
            .collect();
        for problem in &warnings {
            warn!(canvas = %id, problem = %problem, "Generated canvas has structural issues");
        }

        let fields = CanvasFields::from_value(canvas_json)
            .map_err(|err| OpsError::ResponseParse(format!("Canvas does not match the schema: {err}")))?;
        let outcome = record.document.apply_generation(&fields, &disabled);

        record.push_turn(Role::User, request.message.trim(), prompt);
        record.push_turn(Role::Assistant, chat_response.clone(), reply);
        record.attachments.extend(request.attachments);
        record.status = CanvasStatus::Drafted;
        record.sync_name_with_title();
        record.audit(
            user,
            format!("message sent; {} fields updated", outcome.updated.len()),
        );
        self.repo.save_canvas(&record).await?;

        info!(
            canvas = %id,
            updated = outcome.updated.len(),
            preserved = outcome.preserved.len(),
            "Applied generated canvas"
        );
        Ok(MessageResponse {
            canvas_id: id,
            chat_response,
            canvas_json: record.document.to_json(),
            warnings,
            preserved_fields: outcome.preserved,
        })
    }

    /// User-facing conversation: the typed messages and the chat replies.
    pub async fn history(&self, user: &UserId, id: CanvasId) -> OpsResult<Vec<HistoryEntry>> {
        let record = self.load_owned(user, id).await?;
        Ok(record
            .conversation
            .into_iter()
            .map(|turn| HistoryEntry {
                role: turn.role,
                content: turn.content,
            })
            .collect())
    }

    // =========================================================================
    // Manual Edits
    // =========================================================================

    pub async fn edit_field(
        &self,
        user: &UserId,
        id: CanvasId,
        field: FieldKey,
        edit: FieldEdit,
    ) -> OpsResult<FieldEnvelope> {
        check(&edit)?;
        if self.disabled_fields().await?.contains(&field) {
            return Err(OpsError::validation(
                format!("Field '{}' is disabled", field),
                Vec::new(),
            ));
        }
        self.mutate(user, id, format!("edited field '{}'", field), |record| {
            let envelope = record
                .document
                .edit_field(field, edit)
                .map_err(|err| OpsError::validation("Invalid field value", vec![err]))?
                .clone();
            if field == FieldKey::Title {
                record.sync_name_with_title();
            }
            Ok(envelope)
        })
        .await
    }

    /// Overwrite fields from a full canvas object.
    pub async fn replace_fields(
        &self,
        user: &UserId,
        id: CanvasId,
        request: ReplaceFieldsRequest,
    ) -> OpsResult<serde_json::Value> {
        check(&request)?;
        let disabled = self.disabled_fields().await?;
        self.mutate(user, id, "replaced canvas fields", |record| {
            record
                .document
                .replace_all(&request.canvas)
                .map_err(|errors| OpsError::validation("Invalid canvas", errors))?;
            for key in disabled.iter().filter(|key| !key.is_mandatory()) {
                record.document.remove(*key);
            }
            if !record.document.is_empty() {
                record.status = CanvasStatus::Drafted;
            }
            record.sync_name_with_title();
            Ok(record.document.to_json())
        })
        .await
    }

    // =========================================================================
    // Board
    // =========================================================================

    pub async fn board(&self, user: &UserId, id: CanvasId) -> OpsResult<Board> {
        Ok(self.load_owned(user, id).await?.board)
    }

    pub async fn add_work_item(
        &self,
        user: &UserId,
        id: CanvasId,
        request: AddWorkItemRequest,
    ) -> OpsResult<WorkItem> {
        check(&request)?;
        let action = format!("added {} '{}'", request.kind, request.title.trim());
        self.mutate(user, id, action, |record| {
            let item = WorkItem {
                id: new_item_id(),
                kind: request.kind,
                parent_id: request.parent_id,
                okr_ref: request.okr_ref.filter(|r| !r.is_empty()),
                title: request.title.trim().to_string(),
                description: request.description,
                acceptance_criteria: request.acceptance_criteria,
                column: request.column,
                rank: 0,
            };
            Ok(record.board.add(item)?.clone())
        })
        .await
    }

    pub async fn update_work_item(
        &self,
        user: &UserId,
        id: CanvasId,
        item_id: &str,
        patch: WorkItemPatch,
    ) -> OpsResult<WorkItem> {
        check(&patch)?;
        self.mutate(user, id, format!("updated work item {}", item_id), |record| {
            Ok(record.board.update(item_id, patch)?.clone())
        })
        .await
    }

    /// Move an item and return the reordered board.
    pub async fn move_work_item(
        &self,
        user: &UserId,
        id: CanvasId,
        item_id: &str,
        request: MoveWorkItemRequest,
    ) -> OpsResult<Board> {
        check(&request)?;
        self.mutate(user, id, format!("moved work item {}", item_id), |record| {
            record
                .board
                .move_item(item_id, request.column, request.position)?;
            Ok(record.board.clone())
        })
        .await
    }

    /// Remove an item with its descendants and their suggestions.
    pub async fn remove_work_item(
        &self,
        user: &UserId,
        id: CanvasId,
        item_id: &str,
    ) -> OpsResult<RemovedItemsResponse> {
        self.mutate(user, id, format!("removed work item {}", item_id), |record| {
            let removed = record.board.remove(item_id)?;
            record.suggestions.prune_parents(&removed);
            Ok(RemovedItemsResponse { removed })
        })
        .await
    }

    // =========================================================================
    // Suggestions
    // =========================================================================

    /// Suggest work items for a parent, reusing cached ones unless `refresh`.
    pub async fn suggest(
        &self,
        user: &UserId,
        id: CanvasId,
        request: SuggestRequest,
    ) -> OpsResult<SuggestResponse> {
        check(&request)?;

        let _guard = self.lock_canvas(id).await;
        let mut record = self.load_owned(user, id).await?;

        if record.document.is_empty() {
            return Err(OpsError::validation(
                "Generate a canvas before requesting suggestions",
                Vec::new(),
            ));
        }
        let parent_id = request.parent_id.as_deref();
        let parent = match (request.kind.parent_kind(), parent_id) {
            (Some(expected), Some(pid)) => {
                let parent = record
                    .board
                    .get(pid)
                    .ok_or_else(|| OpsError::WorkItemNotFound(pid.to_string()))?;
                if parent.kind != expected {
                    return Err(OpsError::validation(
                        format!("Parent {} must be a {}", pid, expected),
                        Vec::new(),
                    ));
                }
                Some(parent.clone())
            }
            _ => None,
        };

        if !request.refresh && record.suggestions.has_pending(request.kind, parent_id) {
            debug!(canvas = %id, kind = %request.kind, "Serving cached suggestions");
            return Ok(SuggestResponse {
                suggestions: owned(record.suggestions.for_parent(request.kind, parent_id)),
                from_cache: true,
            });
        }

        let provider = self.require_provider()?;
        let existing: Vec<String> = match parent_id {
            Some(pid) => record.board.children_of(pid),
            None => record.board.items().iter().filter(|i| i.kind == WorkItemKind::Epic).collect(),
        }
        .into_iter()
        .map(|item| item.title.clone())
        .collect();

        let prompt = suggestion_prompt(
            request.kind,
            &record.document.to_json(),
            parent.as_ref(),
            &existing,
        );
        let reply = provider
            .complete(&[
                ChatMessage::system(SUGGESTION_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ])
            .await?;
        let drafts =
            parse_suggestions(&reply).map_err(|err| OpsError::ResponseParse(err.to_string()))?;

        let fresh = drafts
            .into_iter()
            .map(|draft| Suggestion {
                id: new_item_id(),
                kind: request.kind,
                parent_id: request.parent_id.clone(),
                title: draft.title.trim().to_string(),
                description: draft.description,
                acceptance_criteria: draft.acceptance_criteria,
                added_to_canvas: false,
            })
            .collect();
        let suggestions = owned(record.suggestions.merge(request.kind, parent_id, fresh));

        record.audit(
            user,
            format!("generated {} {} suggestions", suggestions.len(), request.kind),
        );
        self.repo.save_canvas(&record).await?;

        Ok(SuggestResponse {
            suggestions,
            from_cache: false,
        })
    }

    /// Cached suggestions, optionally narrowed by kind and parent.
    pub async fn suggestions(
        &self,
        user: &UserId,
        id: CanvasId,
        kind: Option<WorkItemKind>,
        parent_id: Option<&str>,
    ) -> OpsResult<Vec<Suggestion>> {
        let record = self.load_owned(user, id).await?;
        Ok(record
            .suggestions
            .all()
            .iter()
            .filter(|s| kind.map_or(true, |k| s.kind == k))
            .filter(|s| parent_id.map_or(true, |p| s.parent_id.as_deref() == Some(p)))
            .cloned()
            .collect())
    }

    /// Turn a suggestion into a work item on the board.
    pub async fn accept_suggestion(
        &self,
        user: &UserId,
        id: CanvasId,
        suggestion_id: &str,
    ) -> OpsResult<WorkItem> {
        self.mutate(user, id, format!("accepted suggestion {}", suggestion_id), |record| {
            let suggestion = record
                .suggestions
                .get(suggestion_id)
                .ok_or_else(|| OpsError::SuggestionNotFound(suggestion_id.to_string()))?
                .clone();
            if suggestion.added_to_canvas {
                return Err(OpsError::validation(
                    "Suggestion already added to canvas",
                    vec![suggestion_id.to_string()],
                ));
            }

            let item = record
                .board
                .add(WorkItem {
                    id: suggestion.id.clone(),
                    kind: suggestion.kind,
                    parent_id: suggestion.parent_id,
                    okr_ref: None,
                    title: suggestion.title,
                    description: suggestion.description,
                    acceptance_criteria: suggestion.acceptance_criteria,
                    column: Default::default(),
                    rank: 0,
                })?
                .clone();
            record.suggestions.mark_added(&suggestion.id);
            Ok(item)
        })
        .await
    }
}

fn check<T: Validate>(request: &T) -> OpsResult<()> {
    let details = request.validate();
    if details.is_empty() {
        Ok(())
    } else {
        Err(OpsError::validation("Invalid request", details))
    }
}

fn owned(suggestions: Vec<&Suggestion>) -> Vec<Suggestion> {
    suggestions.into_iter().cloned().collect()
}

impl std::fmt::Debug for CanvasOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasOps")
            .field("config", &self.config)
            .field("provider", &self.provider_info())
            .finish_non_exhaustive()
    }
}

/// Keep stored settings in sync when there is nothing stored yet.
pub(crate) fn merged_settings(stored: Option<Settings>, llm: Option<LlmSettings>) -> Settings {
    let mut settings = stored.unwrap_or_default();
    if settings.llm.is_none() {
        settings.llm = llm;
    }
    settings
}
