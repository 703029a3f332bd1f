//! Prompt templates for canvas generation, refinement and breakdown suggestions.

use std::collections::BTreeSet;

use canvas_core::{Attachment, CanvasFields, FieldKey, WorkItem, WorkItemKind};
use schemars::schema_for;
use serde_json::Value;

pub const CHAT_MARKER: &str = "---CHAT_RESPONSE---";
pub const CANVAS_MARKER: &str = "---CANVAS_JSON---";

struct FieldGuidance {
    key: FieldKey,
    description: &'static str,
    positive: &'static str,
    negative: &'static str,
}

const GUIDANCE: &[FieldGuidance] = &[
    FieldGuidance {
        key: FieldKey::Title,
        description: "The canvas title - cannot be disabled.",
        positive: "Generate a clear, concise title that captures the essence of the business problem or initiative.",
        negative: "Do not exceed 100 characters. Avoid generic titles like \"Project Plan.\"",
    },
    FieldGuidance {
        key: FieldKey::ProblemStatement,
        description: "The core business problem - cannot be disabled.",
        positive: "Extract metrics and business impact from documents; include exact numbers mentioned. Cover pain points, stakeholder impact, and market gaps in 2-4 sentences.",
        negative: "Do not use vague language. Avoid omitting specific numerical impacts if present in source materials.",
    },
    FieldGuidance {
        key: FieldKey::Objectives,
        description: "Business objectives and goals.",
        positive: "Act as a Chief Strategy Officer. Extract 3-5 core strategic objectives. Each objective is a single sentence of 10-15 words that starts with a strong action verb and focuses on a measurable business outcome.",
        negative: "Do NOT include product features or implementation details. Do NOT use weak verbs like \"improve\" or \"support\". Focus on WHAT, not HOW.",
    },
    FieldGuidance {
        key: FieldKey::Kpis,
        description: "Key Performance Indicators with current and target values.",
        positive: "Act as a Senior Data Analyst. Generate 6-10 critical KPIs covering quality, cost and efficiency. Specify the measurement frequency (Real-time, Daily, Weekly, Monthly or Quarterly).",
        negative: "Avoid vanity metrics. Do NOT fabricate baseline data; use \"Baseline TBD\" if unknown.",
    },
    FieldGuidance {
        key: FieldKey::SuccessCriteria,
        description: "Measurable success criteria.",
        positive: "Each criterion has a \"metric\" (2-5 word label), a \"target\" (specific quantitative goal) and a \"measurement\" (how it is calculated).",
        negative: "Do NOT put the full success statement in the metric field. Do NOT repeat the metric text in the target.",
    },
    FieldGuidance {
        key: FieldKey::KeyFeatures,
        description: "Core features and capabilities.",
        positive: "Act as a Lead Product Owner. Generate 8-12 core features with MoSCoW priorities: Must Have (40-50%), Should Have (30-40%), Could Have (10-20%).",
        negative: "Do NOT describe technical implementation. Do NOT mark more than half of the features as \"Must Have\".",
    },
    FieldGuidance {
        key: FieldKey::Risks,
        description: "Project risks and mitigation strategies.",
        positive: "Act as a Senior Risk Officer. Identify the 5-10 most critical risks, rate impact and probability, and give a prevent / detect / correct mitigation for each.",
        negative: "Do NOT list vague, universally applicable risks like \"scope creep\".",
    },
    FieldGuidance {
        key: FieldKey::Assumptions,
        description: "Project assumptions to validate.",
        positive: "Identify 5-8 critical market, financial, operational or technical assumptions that must hold for the initiative to succeed.",
        negative: "Do not include vague hopes or restate known facts and requirements as assumptions.",
    },
    FieldGuidance {
        key: FieldKey::NonFunctionalRequirements,
        description: "Non-functional requirements as categorized items.",
        positive: "Return an array of objects with a \"category\" (Performance, Usability, Reliability, Security, Data Quality, ...) and a \"requirement\".",
        negative: "Do NOT fabricate specific metrics without document evidence. Only include categories that have relevant requirements.",
    },
    FieldGuidance {
        key: FieldKey::UseCases,
        description: "Use cases with actor, goal and scenario.",
        positive: "Each use case is an object with \"use_case\", \"actor\", \"goal\" and a step-by-step \"description\".",
        negative: "Do NOT fabricate use cases without document evidence.",
    },
    FieldGuidance {
        key: FieldKey::Governance,
        description: "Ownership, decision rights and review cadence.",
        positive: "Return an object naming the accountable owner, approvers, steering cadence and compliance considerations.",
        negative: "Do not invent named individuals; use roles instead.",
    },
    FieldGuidance {
        key: FieldKey::RelevantFacts,
        description: "Facts from the supplied documents that shaped the canvas.",
        positive: "List short, verifiable facts quoted or paraphrased from the reference documents.",
        negative: "Omit this field entirely when no documents were supplied.",
    },
];

/// JSON schema of the canvas, pretty-printed for embedding in prompts.
pub fn canvas_schema() -> String {
    serde_json::to_string_pretty(&schema_for!(CanvasFields)).unwrap_or_else(|_| "{}".into())
}

/// System prompt covering every enabled field.
pub fn system_prompt(disabled: &BTreeSet<FieldKey>) -> String {
    let mut fields = String::new();
    let enabled = GUIDANCE
        .iter()
        .filter(|g| g.key.is_mandatory() || !disabled.contains(&g.key));
    for (n, guidance) in enabled.enumerate() {
        fields.push_str(&format!(
            "{}. **{}**\n   - **Description:** {}\n   - **Positive Prompt:** {}\n   - **Negative Prompt:** {}\n\n",
            n + 1,
            guidance.key,
            guidance.description,
            guidance.positive,
            guidance.negative
        ));
    }

    let mut sections = vec![
        "You are an expert business analyst and strategic consultant specializing in business canvas creation.".to_string(),
        "**Your Role:**\nYou help users create and refine comprehensive business canvases by analyzing their input and reference documents, generating the canvas as JSON, answering questions and refining the canvas based on feedback.".to_string(),
        format!(
            "**Interaction Guidelines:**\n- For the FIRST user message: generate a complete canvas from the problem statement and any documents.\n- For SUBSEQUENT messages: refine the existing canvas while keeping it consistent.\n- Always provide TWO responses:\n  1. {CHAT_MARKER}: conversational response and observations\n  2. {CANVAS_MARKER}: the complete updated canvas as JSON"
        ),
        format!("**Detailed Field Requirements:**\n\n{}", fields.trim_end()),
    ];

    let excluded: Vec<&str> = disabled
        .iter()
        .filter(|key| !key.is_mandatory())
        .map(|key| key.as_str())
        .collect();
    if !excluded.is_empty() {
        sections.push(format!(
            "**Disabled Fields:**\nDo NOT generate these fields: {}.",
            excluded.join(", ")
        ));
    }

    sections.push(format!(
        "**CRITICAL OUTPUT FORMAT:**\nYou must provide your response in this EXACT format:\n\n{CHAT_MARKER}\n[Your conversational response to the user]\n\n{CANVAS_MARKER}\n[Complete canvas JSON - NO markdown, NO code blocks, NO preambles]"
    ));
    sections.push(
        "**JSON Requirements:**\n- Valid JSON matching the schema below\n- All required fields present\n- Double-quoted keys and strings\n- Record per-field sources and a 0-1 confidence under \"Field Evidence\"\n- Base content on the reference documents when available".to_string(),
    );
    sections.push(format!("**JSON Schema:**\n{}", canvas_schema()));

    sections.join("\n\n")
}

fn format_reminder(what: &str) -> String {
    format!("Remember to provide your response in the required format:\n{CHAT_MARKER}\n[Your response]\n\n{CANVAS_MARKER}\n[{what}]")
}

fn reference_documents(attachments: &[Attachment]) -> Option<String> {
    if attachments.is_empty() {
        return None;
    }
    let docs: Vec<String> = attachments
        .iter()
        .map(|doc| format!("--- {} ---\n{}", doc.name, doc.text.trim()))
        .collect();
    Some(format!("REFERENCE DOCUMENTS:\n{}", docs.join("\n\n")))
}

/// First message of a canvas conversation.
pub fn initial_prompt(problem: &str, attachments: &[Attachment]) -> String {
    let mut parts = vec![
        format!("USER PROBLEM STATEMENT: {}", problem.trim()),
        "Please generate a comprehensive business canvas based on this problem statement and any reference documents.".to_string(),
    ];
    parts.extend(reference_documents(attachments));
    parts.push(format_reminder("Complete JSON"));
    parts.join("\n\n")
}

/// Follow-up message refining an existing canvas.
pub fn refinement_prompt(
    message: &str,
    current_canvas: &Value,
    locked: &[FieldKey],
    attachments: &[Attachment],
) -> String {
    let canvas = serde_json::to_string_pretty(current_canvas).unwrap_or_else(|_| "{}".into());
    let mut parts = vec![
        format!("USER MESSAGE: {}", message.trim()),
        format!("CURRENT CANVAS:\n{}", canvas),
    ];
    if !locked.is_empty() {
        let names: Vec<&str> = locked.iter().map(FieldKey::as_str).collect();
        parts.push(format!(
            "LOCKED FIELDS (return these exactly as they are): {}",
            names.join(", ")
        ));
    }
    parts.extend(reference_documents(attachments));
    parts.push(
        "REFINEMENT INSTRUCTIONS:\n- Apply the user's feedback to the relevant fields.\n- Keep every other field consistent with the current canvas.\n- Return the COMPLETE canvas, not only the changed fields.".to_string(),
    );
    parts.push(format_reminder("Updated complete JSON"));
    parts.join("\n\n")
}

/// Ask for epics, features or stories as a JSON array.
pub fn suggestion_prompt(
    kind: WorkItemKind,
    canvas: &Value,
    parent: Option<&WorkItem>,
    existing_titles: &[String],
) -> String {
    let canvas = serde_json::to_string_pretty(canvas).unwrap_or_else(|_| "{}".into());
    let (count, scope) = match kind {
        WorkItemKind::Epic => ("4-6", "epics that together deliver the canvas objectives"),
        WorkItemKind::Feature => ("3-6", "features that deliver the parent epic"),
        WorkItemKind::Story => ("3-8", "user stories that implement the parent feature"),
    };

    let mut parts = vec![
        format!("Act as an agile delivery lead. Propose {count} {scope}."),
        format!("BUSINESS CANVAS:\n{}", canvas),
    ];
    if let Some(parent) = parent {
        parts.push(format!(
            "PARENT {}: {}\n{}",
            parent.kind.as_str().to_uppercase(),
            parent.title,
            parent.description
        ));
    }
    if !existing_titles.is_empty() {
        parts.push(format!(
            "ALREADY ON THE BOARD (do not repeat): {}",
            existing_titles.join("; ")
        ));
    }
    let story_hint = if kind == WorkItemKind::Story {
        " Write titles as \"As a <role>, I want <goal> so that <benefit>\"."
    } else {
        ""
    };
    parts.push(format!(
        "Respond with ONLY a JSON array of objects with \"title\", \"description\" and \"acceptance_criteria\" (array of strings). No markdown, no commentary.{story_hint}"
    ));
    parts.join("\n\n")
}
