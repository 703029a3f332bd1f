//! The stored canvas document: one envelope per field.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fields::{CanvasFields, FieldKey};

/// Lifecycle of a single field value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Written by the model.
    #[default]
    Generated,
    /// Changed by a user since the last generation.
    Edited,
    /// Frozen: refinements must not touch it.
    Locked,
}

/// A field value plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEnvelope {
    pub value: Value,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub state: FieldState,
    /// Optional diagram source (e.g. mermaid) attached to the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
}

impl FieldEnvelope {
    pub fn generated(value: Value) -> Self {
        Self {
            value,
            evidence: Vec::new(),
            confidence: None,
            state: FieldState::Generated,
            diagram: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state == FieldState::Locked
    }
}

/// A manual change to one field. Absent members are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldEdit {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub evidence: Option<Vec<String>>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub diagram: Option<String>,
    #[serde(default)]
    pub locked: Option<bool>,
}

/// Outcome of applying a generated canvas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutcome {
    /// Fields whose value was replaced.
    pub updated: Vec<FieldKey>,
    /// Locked fields kept as they were.
    pub preserved: Vec<FieldKey>,
}

/// Field-by-field canvas document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasDocument {
    fields: BTreeMap<FieldKey, FieldEnvelope>,
}

impl CanvasDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: FieldKey) -> Option<&FieldEnvelope> {
        self.fields.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldEnvelope)> {
        self.fields.iter()
    }

    /// Title text, if generated.
    pub fn title(&self) -> Option<&str> {
        self.get(FieldKey::Title).and_then(|f| f.value.as_str())
    }

    pub fn problem_statement(&self) -> Option<&str> {
        self.get(FieldKey::ProblemStatement)
            .and_then(|f| f.value.as_str())
    }

    pub fn remove(&mut self, key: FieldKey) -> Option<FieldEnvelope> {
        self.fields.remove(&key)
    }

    pub fn locked_fields(&self) -> Vec<FieldKey> {
        self.fields
            .iter()
            .filter(|(_, envelope)| envelope.is_locked())
            .map(|(key, _)| *key)
            .collect()
    }

    /// Merge a generated canvas into the document.
    ///
    /// Locked fields keep their value; disabled fields are dropped.
    pub fn apply_generation(
        &mut self,
        generated: &CanvasFields,
        disabled: &BTreeSet<FieldKey>,
    ) -> GenerationOutcome {
        let mut outcome = GenerationOutcome::default();

        for key in FieldKey::ALL {
            if disabled.contains(&key) && !key.is_mandatory() {
                self.fields.remove(&key);
                continue;
            }
            if self.fields.get(&key).is_some_and(FieldEnvelope::is_locked) {
                outcome.preserved.push(key);
                continue;
            }
            let Some(value) = generated.value_of(key) else {
                continue;
            };

            let mut envelope = FieldEnvelope::generated(value);
            if let Some(evidence) = generated.evidence_for(key) {
                envelope.evidence = evidence.evidence.clone();
                envelope.confidence = evidence.confidence.map(|c| c.clamp(0.0, 1.0));
            }
            // Diagrams are user-authored; keep them across regenerations.
            if let Some(previous) = self.fields.get(&key) {
                envelope.diagram = previous.diagram.clone();
            }
            self.fields.insert(key, envelope);
            outcome.updated.push(key);
        }

        outcome
    }

    /// Apply a manual edit to one field.
    pub fn edit_field(&mut self, key: FieldKey, edit: FieldEdit) -> Result<&FieldEnvelope, String> {
        if let Some(value) = &edit.value {
            key.check_value(value)?;
        }
        if let Some(confidence) = edit.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(format!("confidence must be between 0 and 1, got {}", confidence));
            }
        }

        let existing = self.fields.get(&key).cloned();
        let mut envelope = match (existing, &edit.value) {
            (Some(envelope), _) => envelope,
            (None, Some(value)) => FieldEnvelope::generated(value.clone()),
            (None, None) => return Err(format!("Field '{}' has no value yet", key)),
        };

        if let Some(value) = edit.value {
            envelope.value = value;
            // A value edit never releases a lock; only `locked: false` does.
            if !envelope.is_locked() {
                envelope.state = FieldState::Edited;
            }
        }
        if let Some(evidence) = edit.evidence {
            envelope.evidence = evidence;
        }
        if let Some(confidence) = edit.confidence {
            envelope.confidence = Some(confidence);
        }
        if let Some(diagram) = edit.diagram {
            envelope.diagram = if diagram.trim().is_empty() {
                None
            } else {
                Some(diagram)
            };
        }
        match edit.locked {
            Some(true) => envelope.state = FieldState::Locked,
            Some(false) if envelope.is_locked() => envelope.state = FieldState::Edited,
            _ => {}
        }

        self.fields.insert(key, envelope);
        Ok(&self.fields[&key])
    }

    /// Replace every field from a full canvas object (manual save).
    ///
    /// Unknown keys are rejected; every value is shape-checked before
    /// anything is written. Unchanged values keep their state and locks
    /// are kept on changed ones.
    pub fn replace_all(&mut self, canvas: &Value) -> Result<(), Vec<String>> {
        let Some(object) = canvas.as_object() else {
            return Err(vec!["Canvas must be a JSON object".to_string()]);
        };

        let mut parsed = Vec::with_capacity(object.len());
        let mut errors = Vec::new();
        for (name, value) in object {
            match name.parse::<FieldKey>() {
                Ok(key) => match key.check_value(value) {
                    Ok(()) => parsed.push((key, value.clone())),
                    Err(err) => errors.push(err),
                },
                Err(err) => errors.push(err),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        for (key, value) in parsed {
            if self.fields.get(&key).is_some_and(|e| e.value == value) {
                continue;
            }
            let edit = FieldEdit {
                value: Some(value),
                ..FieldEdit::default()
            };
            // Shapes were checked above.
            let _ = self.edit_field(key, edit);
        }
        Ok(())
    }

    /// Plain `{ "Title": ..., ... }` view used in prompts and responses.
    pub fn to_json(&self) -> Value {
        let object: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, envelope)| (key.as_str().to_string(), envelope.value.clone()))
            .collect();
        Value::Object(object)
    }
}
