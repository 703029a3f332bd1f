//! Integration tests for the canvas operations layer.
//!
//! A scripted provider stands in for the LLM vendors so whole chat,
//! board and settings flows run in process.
//!
//! Run with: `cargo test --package canvas-ops --test ops_integration`

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use canvas_core::{
    BoardColumn, CanvasId, FieldEdit, FieldKey, FieldState, LlmSettings, UserId, WorkItemKind,
    WorkItemPatch,
};
use canvas_llm::{ChatMessage, ChatRole, LlmError, LlmProvider, LlmResult};
use canvas_ops::{
    AddWorkItemRequest, CanvasOps, Config, CreateCanvasRequest, MemoryRepository,
    MoveWorkItemRequest, OpsError, ProviderFactory, ReplaceFieldsRequest, SendMessageRequest,
    SuggestRequest, UpdateFieldsRequest,
};
use serde_json::{json, Value};

/// Replies from a queue and records every conversation it receives.
#[derive(Default)]
struct ScriptedProvider {
    replies: Mutex<VecDeque<LlmResult<String>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            calls: Mutex::default(),
        })
    }

    fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "script-1"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Malformed("script exhausted".into())))
    }
}

/// Answers slowly and records how many calls overlap.
#[derive(Default)]
struct SlowProvider {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    fn model(&self) -> &str {
        "slow-1"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> LlmResult<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("pong".to_string())
    }
}

fn canvas(title: &str, objectives: &[&str]) -> Value {
    json!({
        "Title": title,
        "Problem Statement": "Adjusters spend 40% of their time on manual triage.",
        "Objectives": objectives,
        "KPIs": [{"metric": "Triage time", "baseline": "45 min", "target": "20 min", "measurement_frequency": "Weekly"}],
        "Success Criteria": ["Median triage under 20 minutes"],
        "Key Features": [{"feature": "Auto routing", "description": "Route claims", "priority": "Must Have"}],
        "Risks": [{"risk": "Model drift", "mitigation": "Monitor weekly"}],
        "Assumptions": ["Claims history is labelled"],
        "Non Functional Requirements": [{"category": "Performance", "requirement": "p95 < 2s"}],
        "Use Cases": [{"use_case": "Route claim", "actor": "Adjuster", "goal": "Faster routing", "description": "Open queue"}],
        "Governance": {"owner": "Claims Ops"},
        "Field Evidence": {"Problem Statement": {"evidence": ["ops-report.pdf"], "confidence": 0.9}}
    })
}

fn reply(chat: &str, canvas: &Value) -> String {
    format!("---CHAT_RESPONSE---\n{}\n\n---CANVAS_JSON---\n{}", chat, canvas)
}

fn ops_with(provider: Arc<ScriptedProvider>) -> CanvasOps {
    CanvasOps::new(Config::default(), Arc::new(MemoryRepository::new())).with_provider(provider)
}

fn alice() -> UserId {
    UserId::from("alice")
}

#[tokio::test]
async fn first_message_generates_and_refinement_replays_the_conversation() {
    let provider = ScriptedProvider::new(vec![
        reply("Here is your canvas.", &canvas("Claims Triage Copilot", &["Halve triage time"])),
        reply("Added an objective.", &canvas("Claims Triage Copilot", &["Halve triage time", "Cut leakage"])),
    ]);
    let ops = ops_with(provider.clone());
    let user = alice();
    let record = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap();

    // Created canvases stay out of the listing until something is generated.
    assert!(ops.list_canvases(&user).await.unwrap().is_empty());

    let first = ops
        .send_message(
            &user,
            record.id,
            SendMessageRequest::text("Claims triage is too slow").with_attachment("brief.txt", "Backlog is 12k"),
        )
        .await
        .unwrap();
    assert_eq!(first.chat_response, "Here is your canvas.");
    assert!(first.warnings.is_empty());
    assert_eq!(first.canvas_json["Title"], "Claims Triage Copilot");

    let listed = ops.list_canvases(&user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Claims Triage Copilot");

    let second = ops
        .send_message(&user, record.id, SendMessageRequest::text("Add a leakage objective"))
        .await
        .unwrap();
    assert_eq!(second.canvas_json["Objectives"].as_array().unwrap().len(), 2);

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    let first_prompt = &calls[0].last().unwrap().content;
    assert!(first_prompt.starts_with("USER PROBLEM STATEMENT: Claims triage is too slow"));
    assert!(first_prompt.contains("--- brief.txt ---"));

    // system, first user prompt, first reply, refinement prompt
    let replay = &calls[1];
    assert_eq!(replay.len(), 4);
    assert_eq!(replay[0].role, ChatRole::System);
    assert_eq!(replay[1].content, *first_prompt);
    assert_eq!(replay[2].role, ChatRole::Assistant);
    assert!(replay[3].content.starts_with("USER MESSAGE: Add a leakage objective"));

    let history = ops.history(&user, record.id).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "Claims triage is too slow",
            "Here is your canvas.",
            "Add a leakage objective",
            "Added an objective."
        ]
    );
}

#[tokio::test]
async fn locked_fields_survive_refinement_and_are_listed_in_the_prompt() {
    let provider = ScriptedProvider::new(vec![
        reply("v1", &canvas("Original", &["A"])),
        reply("v2", &canvas("Rewritten by model", &["B"])),
    ]);
    let ops = ops_with(provider.clone());
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    ops.send_message(&user, id, SendMessageRequest::text("start")).await.unwrap();
    let envelope = ops
        .edit_field(
            &user,
            id,
            FieldKey::Title,
            FieldEdit {
                value: Some(json!("Pinned")),
                locked: Some(true),
                ..FieldEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(envelope.state, FieldState::Locked);

    let response = ops
        .send_message(&user, id, SendMessageRequest::text("rewrite everything"))
        .await
        .unwrap();
    assert_eq!(response.canvas_json["Title"], "Pinned");
    assert_eq!(response.canvas_json["Objectives"], json!(["B"]));
    assert_eq!(response.preserved_fields, vec![FieldKey::Title]);

    let calls = provider.calls();
    let prompt = &calls[1].last().unwrap().content;
    assert!(prompt.contains("LOCKED FIELDS (return these exactly as they are): Title"));
}

#[tokio::test]
async fn unparseable_replies_fail_without_touching_the_canvas() {
    let provider = ScriptedProvider::new(vec!["I forgot the format".to_string()]);
    let ops = ops_with(provider);
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    let err = ops
        .send_message(&user, id, SendMessageRequest::text("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::ResponseParse(_)));
    assert!(ops.history(&user, id).await.unwrap().is_empty());
    assert!(ops.get_fields(&user, id).await.unwrap().is_none());
}

#[tokio::test]
async fn incomplete_canvases_are_applied_with_warnings() {
    let partial = json!({"Title": "Thin", "Problem Statement": "Only the basics"});
    let provider = ScriptedProvider::new(vec![reply("ok", &partial)]);
    let ops = ops_with(provider);
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    let response = ops
        .send_message(&user, id, SendMessageRequest::text("hello"))
        .await
        .unwrap();
    assert!(response
        .warnings
        .contains(&"Missing required field: 'Governance'".to_string()));
    assert_eq!(response.canvas_json["Title"], "Thin");
}

#[tokio::test]
async fn other_users_are_forbidden_and_missing_canvases_not_found() {
    let ops = ops_with(ScriptedProvider::new(vec![]));
    let id = ops
        .create_canvas(&alice(), CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;
    let bob = UserId::from("bob");

    assert!(matches!(
        ops.get_canvas(&bob, id).await,
        Err(OpsError::Forbidden { .. })
    ));
    assert!(matches!(
        ops.delete_canvas(&bob, id).await,
        Err(OpsError::Forbidden { .. })
    ));

    ops.delete_canvas(&alice(), id).await.unwrap();
    assert!(matches!(
        ops.get_canvas(&alice(), id).await,
        Err(OpsError::CanvasNotFound { .. })
    ));
}

#[tokio::test]
async fn messages_need_a_provider_and_valid_input() {
    let ops = CanvasOps::new(Config::default(), Arc::new(MemoryRepository::new()));
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    assert!(matches!(
        ops.send_message(&user, id, SendMessageRequest::text("hi")).await,
        Err(OpsError::ProviderNotConfigured)
    ));
    assert!(matches!(
        ops.send_message(&user, id, SendMessageRequest::text("  ")).await,
        Err(OpsError::Validation { .. })
    ));

    let mut config = Config::default();
    config.max_attachment_bytes = 4;
    let small = CanvasOps::new(config, Arc::new(MemoryRepository::new()));
    let id = small
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;
    let err = small
        .send_message(
            &user,
            id,
            SendMessageRequest::text("hi").with_attachment("big.txt", "too large"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Validation { .. }));
}

#[tokio::test]
async fn board_flow_enforces_hierarchy_and_reorders() {
    let ops = ops_with(ScriptedProvider::new(vec![]));
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    let add = |kind, parent: Option<&str>, title: &str| AddWorkItemRequest {
        kind,
        parent_id: parent.map(str::to_string),
        okr_ref: None,
        title: title.to_string(),
        description: String::new(),
        acceptance_criteria: vec![],
        column: BoardColumn::Backlog,
    };

    let epic = ops
        .add_work_item(&user, id, add(WorkItemKind::Epic, None, "Intake"))
        .await
        .unwrap();
    let second = ops
        .add_work_item(&user, id, add(WorkItemKind::Epic, None, "Routing"))
        .await
        .unwrap();
    let feature = ops
        .add_work_item(&user, id, add(WorkItemKind::Feature, Some(&epic.id), "Upload"))
        .await
        .unwrap();

    let orphan = ops
        .add_work_item(&user, id, add(WorkItemKind::Story, Some(&epic.id), "Bad parent"))
        .await
        .unwrap_err();
    assert!(matches!(orphan, OpsError::Validation { .. }));

    let board = ops
        .move_work_item(
            &user,
            id,
            &second.id,
            MoveWorkItemRequest {
                column: BoardColumn::Backlog,
                position: 0,
            },
        )
        .await
        .unwrap();
    let epics: Vec<&str> = board
        .column(WorkItemKind::Epic, BoardColumn::Backlog)
        .iter()
        .map(|i| i.title.as_str())
        .collect();
    assert_eq!(epics, vec!["Routing", "Intake"]);

    let renamed = ops
        .update_work_item(
            &user,
            id,
            &feature.id,
            WorkItemPatch {
                title: Some("Document upload".into()),
                ..WorkItemPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title, "Document upload");

    let removed = ops.remove_work_item(&user, id, &epic.id).await.unwrap();
    assert_eq!(removed.removed.len(), 2);
    assert_eq!(ops.board(&user, id).await.unwrap().len(), 1);

    assert!(matches!(
        ops.remove_work_item(&user, id, &epic.id).await,
        Err(OpsError::WorkItemNotFound(_))
    ));

    let audit = ops.get_canvas(&user, id).await.unwrap().audit_log;
    assert!(audit.iter().any(|entry| entry.action.starts_with("removed work item")));
}

#[tokio::test]
async fn suggestions_are_cached_until_refreshed_and_accepted_once() {
    let provider = ScriptedProvider::new(vec![
        reply("v1", &canvas("Claims", &["A"])),
        r#"[{"title": "Intake", "description": "Capture claims"}, {"title": "Routing"}]"#.to_string(),
        r#"```json
[{"title": "Intake"}, {"title": "Analytics", "acceptance_criteria": ["Dashboards live"]}]
```"#
            .to_string(),
    ]);
    let ops = ops_with(provider.clone());
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    let premature = ops
        .suggest(
            &user,
            id,
            SuggestRequest {
                kind: WorkItemKind::Epic,
                parent_id: None,
                refresh: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(premature, OpsError::Validation { .. }));

    ops.send_message(&user, id, SendMessageRequest::text("start")).await.unwrap();

    let request = SuggestRequest {
        kind: WorkItemKind::Epic,
        parent_id: None,
        refresh: false,
    };
    let fresh = ops.suggest(&user, id, request.clone()).await.unwrap();
    assert!(!fresh.from_cache);
    assert_eq!(fresh.suggestions.len(), 2);

    let cached = ops.suggest(&user, id, request.clone()).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(provider.calls().len(), 2);

    let intake = fresh.suggestions[0].clone();
    let item = ops.accept_suggestion(&user, id, &intake.id).await.unwrap();
    assert_eq!(item.title, "Intake");
    assert_eq!(item.kind, WorkItemKind::Epic);
    assert!(matches!(
        ops.accept_suggestion(&user, id, &intake.id).await,
        Err(OpsError::Validation { .. })
    ));

    let refreshed = ops
        .suggest(
            &user,
            id,
            SuggestRequest {
                refresh: true,
                ..request
            },
        )
        .await
        .unwrap();
    let titles: Vec<&str> = refreshed.suggestions.iter().map(|s| s.title.as_str()).collect();
    // The accepted "Intake" stays; its duplicate and the pending "Routing" do not.
    assert_eq!(titles, vec!["Intake", "Analytics"]);

    let all = ops.suggestions(&user, id, Some(WorkItemKind::Epic), None).await.unwrap();
    assert_eq!(all.iter().filter(|s| s.added_to_canvas).count(), 1);
}

#[tokio::test]
async fn manual_canvas_replacement_validates_every_field() {
    let ops = ops_with(ScriptedProvider::new(vec![]));
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    let err = ops
        .replace_fields(
            &user,
            id,
            ReplaceFieldsRequest {
                canvas: json!({"Title": "Manual", "Objectives": "not a list"}),
            },
        )
        .await
        .unwrap_err();
    match err {
        OpsError::Validation { details, .. } => assert_eq!(details.len(), 1),
        other => panic!("unexpected error: {other}"),
    }

    let mut manual = canvas("Manual", &["A"]);
    manual.as_object_mut().unwrap().remove("Field Evidence");
    let fields = ops
        .replace_fields(&user, id, ReplaceFieldsRequest { canvas: manual })
        .await
        .unwrap();
    assert_eq!(fields["Title"], "Manual");
    assert_eq!(ops.list_canvases(&user).await.unwrap()[0].title, "Manual");
}

#[tokio::test]
async fn settings_updates_probe_mask_and_swap_the_provider() {
    let probe_ok = ScriptedProvider::new(vec!["hi".to_string()]);
    let factory_provider = probe_ok.clone();
    let factory: ProviderFactory = Arc::new(
        move |_settings: &LlmSettings, _timeout: Duration| -> LlmResult<Arc<dyn LlmProvider>> {
            Ok(factory_provider.clone() as Arc<dyn LlmProvider>)
        },
    );
    let ops = CanvasOps::new(Config::default(), Arc::new(MemoryRepository::new()))
        .with_provider_factory(factory);
    assert!(ops.provider().is_none());

    let azure = LlmSettings::Azure {
        endpoint: "https://example.openai.azure.com".into(),
        api_key: "secret".into(),
        deployment: "gpt-4o-mini".into(),
        api_version: "2024-05-01-preview".into(),
    };
    let response = ops.update_llm(azure.clone(), true).await.unwrap();
    assert_eq!(response.settings.llm.unwrap().api_key(), "***");
    assert_eq!(response.provider.unwrap().name, "scripted");
    assert_eq!(probe_ok.calls().len(), 1);

    // Sending the mask back keeps the stored key.
    ops.update_llm(azure.masked(), false).await.unwrap();
    let stored = ops.repository().load_settings().await.unwrap().unwrap();
    assert_eq!(stored.llm.unwrap().api_key(), "secret");

    // The script is exhausted now, so a validated update is rejected.
    assert!(matches!(
        ops.update_llm(azure, true).await,
        Err(OpsError::InvalidCredentials(_))
    ));

    let fields: UpdateFieldsRequest =
        serde_json::from_value(json!({"disabled_fields": ["Title"]})).unwrap();
    assert!(matches!(
        ops.update_disabled_fields(fields).await,
        Err(OpsError::Validation { .. })
    ));
    let fields: UpdateFieldsRequest =
        serde_json::from_value(json!({"disabled_fields": ["Governance"]})).unwrap();
    let response = ops.update_disabled_fields(fields).await.unwrap();
    assert!(response.settings.disabled_fields.contains(&FieldKey::Governance));
}

#[tokio::test]
async fn disabled_fields_are_not_generated_or_editable() {
    let provider = ScriptedProvider::new(vec![reply("ok", &canvas("Claims", &["A"]))]);
    let ops = ops_with(provider.clone());
    let user = alice();
    let fields: UpdateFieldsRequest =
        serde_json::from_value(json!({"disabled_fields": ["Risks"]})).unwrap();
    ops.update_disabled_fields(fields).await.unwrap();

    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;
    let response = ops
        .send_message(&user, id, SendMessageRequest::text("start"))
        .await
        .unwrap();
    assert!(response.canvas_json.get("Risks").is_none());
    assert!(!provider.calls()[0][0].content.contains("**Risks**"));

    let err = ops
        .edit_field(
            &user,
            id,
            FieldKey::Risks,
            FieldEdit {
                value: Some(json!([])),
                ..FieldEdit::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Validation { .. }));
}

#[tokio::test]
async fn manual_saves_and_value_edits_keep_locks() {
    let provider = ScriptedProvider::new(vec![
        reply("v1", &canvas("Original", &["A"])),
        reply("v2", &canvas("Rewritten by model", &["B"])),
    ]);
    let ops = ops_with(provider);
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;
    ops.send_message(&user, id, SendMessageRequest::text("start")).await.unwrap();

    let lock_only = FieldEdit {
        locked: Some(true),
        ..FieldEdit::default()
    };
    ops.edit_field(&user, id, FieldKey::Title, lock_only).await.unwrap();

    // Saving the unchanged canvas back must not release the lock.
    let saved = ops.get_fields(&user, id).await.unwrap().unwrap();
    ops.replace_fields(&user, id, ReplaceFieldsRequest { canvas: saved })
        .await
        .unwrap();
    let detail = ops.get_canvas(&user, id).await.unwrap();
    assert_eq!(detail.fields.get(FieldKey::Title).unwrap().state, FieldState::Locked);

    let response = ops
        .send_message(&user, id, SendMessageRequest::text("rewrite everything"))
        .await
        .unwrap();
    assert_eq!(response.canvas_json["Title"], "Original");
    assert_eq!(response.preserved_fields, vec![FieldKey::Title]);

    let value_only = FieldEdit {
        value: Some(json!("Hand written")),
        ..FieldEdit::default()
    };
    let envelope = ops
        .edit_field(&user, id, FieldKey::Title, value_only)
        .await
        .unwrap();
    assert_eq!(envelope.state, FieldState::Locked);
    assert_eq!(envelope.value, json!("Hand written"));
}

#[tokio::test]
async fn title_edits_rename_the_canvas_after_generation() {
    let provider = ScriptedProvider::new(vec![reply("v1", &canvas("Claims", &["A"]))]);
    let ops = ops_with(provider);
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;
    ops.send_message(&user, id, SendMessageRequest::text("start")).await.unwrap();
    assert_eq!(ops.list_canvases(&user).await.unwrap()[0].title, "Claims");

    let edit = FieldEdit {
        value: Some(json!("Claims Copilot")),
        ..FieldEdit::default()
    };
    ops.edit_field(&user, id, FieldKey::Title, edit).await.unwrap();
    assert_eq!(ops.list_canvases(&user).await.unwrap()[0].title, "Claims Copilot");
}

#[tokio::test]
async fn canvas_locks_are_released_after_every_request() {
    let ops = ops_with(ScriptedProvider::new(vec![]));
    let user = alice();

    for _ in 0..200 {
        let err = ops
            .remove_work_item(&user, CanvasId::new(), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::CanvasNotFound { .. }));
    }
    assert_eq!(ops.active_canvas_locks(), 0);

    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;
    let err = ops
        .remove_work_item(&UserId::from("bob"), id, "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::Forbidden { .. }));
    ops.delete_canvas(&user, id).await.unwrap();
    assert_eq!(ops.active_canvas_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_board_changes_to_one_canvas_all_persist() {
    let ops = ops_with(ScriptedProvider::new(vec![]));
    let user = alice();
    let id = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await
        .unwrap()
        .id;

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let ops = ops.clone();
            let user = user.clone();
            tokio::spawn(async move {
                let request: AddWorkItemRequest =
                    serde_json::from_value(json!({"kind": "epic", "title": format!("Epic {n}")}))
                        .unwrap();
                ops.add_work_item(&user, id, request).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let board = ops.board(&user, id).await.unwrap();
    assert_eq!(board.items().len(), 16);
    assert_eq!(ops.active_canvas_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn settings_updates_run_one_at_a_time() {
    let slow = Arc::new(SlowProvider::default());
    let factory_provider = slow.clone();
    let factory: ProviderFactory = Arc::new(
        move |_settings: &LlmSettings, _timeout: Duration| -> LlmResult<Arc<dyn LlmProvider>> {
            Ok(factory_provider.clone() as Arc<dyn LlmProvider>)
        },
    );
    let ops = CanvasOps::new(Config::default(), Arc::new(MemoryRepository::new()))
        .with_provider_factory(factory);
    let gemini = |key: &str| LlmSettings::Gemini {
        endpoint: "https://generativelanguage.googleapis.com".into(),
        api_key: key.into(),
        model: "gemini-1.5-pro".into(),
    };

    let (first, second) = tokio::join!(
        ops.update_llm(gemini("first"), true),
        ops.update_llm(gemini("second"), true)
    );
    first.unwrap();
    second.unwrap();

    assert_eq!(slow.calls.load(Ordering::SeqCst), 2);
    assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_or_masked_keys_reuse_the_stored_one() {
    let ops = CanvasOps::new(Config::default(), Arc::new(MemoryRepository::new()));
    let gemini = |key: &str| LlmSettings::Gemini {
        endpoint: "https://generativelanguage.googleapis.com".into(),
        api_key: key.into(),
        model: "gemini-1.5-pro".into(),
    };

    // Nothing stored yet, so neither placeholder is acceptable.
    assert!(matches!(
        ops.update_llm(gemini(""), false).await,
        Err(OpsError::Validation { .. })
    ));
    assert!(matches!(
        ops.update_llm(gemini("***"), false).await,
        Err(OpsError::Validation { .. })
    ));

    ops.update_llm(gemini("secret"), false).await.unwrap();
    ops.update_llm(gemini(""), false).await.unwrap();
    let stored = ops.repository().load_settings().await.unwrap().unwrap();
    assert_eq!(stored.llm.unwrap().api_key(), "secret");
}
