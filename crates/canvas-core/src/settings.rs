//! Persisted application settings: LLM credentials and field access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::fields::FieldKey;

const MASK: &str = "***";

/// Credentials of the configured LLM vendor.
///
/// Untagged on the wire; the variant is recognised by its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmSettings {
    Azure {
        endpoint: String,
        api_key: String,
        deployment: String,
        api_version: String,
    },
    Gemini {
        endpoint: String,
        api_key: String,
        model: String,
    },
}

impl LlmSettings {
    pub fn vendor(&self) -> &'static str {
        match self {
            LlmSettings::Azure { .. } => "azure-openai",
            LlmSettings::Gemini { .. } => "gemini",
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            LlmSettings::Azure { api_key, .. } | LlmSettings::Gemini { api_key, .. } => api_key,
        }
    }

    /// Copy with the api key hidden.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            LlmSettings::Azure { api_key, .. } | LlmSettings::Gemini { api_key, .. } => {
                *api_key = MASK.to_string();
            }
        }
        copy
    }

    /// Keep the stored key when the incoming one is the mask placeholder.
    pub fn with_key_from(mut self, previous: Option<&LlmSettings>) -> Self {
        let Some(previous) = previous else {
            return self;
        };
        if previous.vendor() != self.vendor() {
            return self;
        }
        match &mut self {
            LlmSettings::Azure { api_key, .. } | LlmSettings::Gemini { api_key, .. } => {
                if api_key.as_str() == MASK || api_key.is_empty() {
                    *api_key = previous.api_key().to_string();
                }
            }
        }
        self
    }

    /// Non-empty checks on every member. A masked key is rejected.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.check_members(true);
        if self.api_key() == MASK {
            errors.push("'api_key' must be the real key, not the mask".to_string());
        }
        errors
    }

    /// Checks a submitted update, where a blank or masked key stands for
    /// the stored one.
    pub fn validate_submitted(&self) -> Vec<String> {
        self.check_members(false)
    }

    fn check_members(&self, with_key: bool) -> Vec<String> {
        let members: Vec<(&str, &str)> = match self {
            LlmSettings::Azure {
                endpoint,
                api_key,
                deployment,
                api_version,
            } => vec![
                ("endpoint", endpoint.as_str()),
                ("api_key", api_key.as_str()),
                ("deployment", deployment.as_str()),
                ("api_version", api_version.as_str()),
            ],
            LlmSettings::Gemini {
                endpoint,
                api_key,
                model,
            } => vec![
                ("endpoint", endpoint.as_str()),
                ("api_key", api_key.as_str()),
                ("model", model.as_str()),
            ],
        };
        let mut errors: Vec<String> = members
            .into_iter()
            .filter(|(name, _)| with_key || *name != "api_key")
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| format!("'{}' is required", name))
            .collect();

        let endpoint = match self {
            LlmSettings::Azure { endpoint, .. } | LlmSettings::Gemini { endpoint, .. } => endpoint,
        };
        if !endpoint.trim().is_empty()
            && !endpoint.starts_with("https://")
            && !endpoint.starts_with("http://")
        {
            errors.push("'endpoint' must be an http(s) URL".to_string());
        }
        errors
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmSettings>,
    /// Fields excluded from generation and display.
    #[serde(default)]
    pub disabled_fields: BTreeSet<FieldKey>,
}

impl Settings {
    /// Mandatory fields may never be disabled.
    pub fn validate_disabled_fields(fields: &BTreeSet<FieldKey>) -> Result<(), Vec<String>> {
        let errors: Vec<String> = fields
            .iter()
            .filter(|key| key.is_mandatory())
            .map(|key| format!("'{}' is mandatory and cannot be disabled", key))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn masked(&self) -> Self {
        Self {
            llm: self.llm.as_ref().map(LlmSettings::masked),
            disabled_fields: self.disabled_fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn azure() -> LlmSettings {
        LlmSettings::Azure {
            endpoint: "https://example.openai.azure.com".into(),
            api_key: "secret".into(),
            deployment: "gpt-4o-mini".into(),
            api_version: "2024-05-01-preview".into(),
        }
    }

    #[test]
    fn untagged_settings_are_recognised_by_shape() {
        let gemini: LlmSettings = serde_json::from_value(json!({
            "endpoint": "https://generativelanguage.googleapis.com",
            "api_key": "k",
            "model": "gemini-1.5-pro"
        }))
        .unwrap();
        assert_eq!(gemini.vendor(), "gemini");

        let azure: LlmSettings = serde_json::from_value(serde_json::to_value(azure()).unwrap()).unwrap();
        assert_eq!(azure.vendor(), "azure-openai");

        assert!(serde_json::from_value::<LlmSettings>(json!({"endpoint": "x"})).is_err());
    }

    #[test]
    fn masking_hides_the_key_and_placeholder_restores_it() {
        let masked = azure().masked();
        assert_eq!(masked.api_key(), "***");

        let restored = masked.with_key_from(Some(&azure()));
        assert_eq!(restored.api_key(), "secret");
    }

    #[test]
    fn validation_flags_blank_members_and_bad_urls() {
        let settings = LlmSettings::Gemini {
            endpoint: "ftp://nope".into(),
            api_key: " ".into(),
            model: "m".into(),
        };
        let errors = settings.validate();
        assert!(errors.contains(&"'api_key' is required".to_string()));
        assert!(errors.contains(&"'endpoint' must be an http(s) URL".to_string()));
        assert!(azure().validate().is_empty());
    }

    #[test]
    fn submitted_updates_may_omit_the_key() {
        let blank = LlmSettings::Gemini {
            endpoint: "https://generativelanguage.googleapis.com".into(),
            api_key: "".into(),
            model: "gemini-1.5-pro".into(),
        };
        assert!(blank.validate_submitted().is_empty());
        assert_eq!(blank.validate(), vec!["'api_key' is required".to_string()]);

        let masked = azure().masked();
        assert!(masked.validate_submitted().is_empty());
        assert_eq!(masked.validate().len(), 1);
        assert!(masked.with_key_from(Some(&azure())).validate().is_empty());
    }

    #[test]
    fn mandatory_fields_cannot_be_disabled() {
        let ok: BTreeSet<_> = [FieldKey::Governance].into();
        assert!(Settings::validate_disabled_fields(&ok).is_ok());

        let bad: BTreeSet<_> = [FieldKey::Title, FieldKey::Risks].into();
        let errors = Settings::validate_disabled_fields(&bad).unwrap_err();
        assert_eq!(errors, vec!["'Title' is mandatory and cannot be disabled".to_string()]);
    }
}
