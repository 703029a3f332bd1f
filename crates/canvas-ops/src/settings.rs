//! Settings operations: LLM credentials and field access.
//!
//! Updates run one at a time behind `settings_lock`; a credential change
//! is probed (optionally), persisted and then swapped in as the active
//! provider.

use canvas_core::{LlmSettings, Settings};
use canvas_llm::probe;
use tracing::{info, warn};

use crate::config::llm_settings_from_env;
use crate::context::{merged_settings, CanvasOps};
use crate::error::{OpsError, OpsResult};
use crate::requests::UpdateFieldsRequest;
use crate::responses::SettingsResponse;

impl CanvasOps {
    /// Activate the provider from stored settings, seeding them from the
    /// environment when nothing is stored yet.
    pub async fn init_provider(&self) -> OpsResult<()> {
        let _guard = self.settings_lock.lock().await;

        let stored = self.repository().load_settings().await?;
        let had_llm = stored.as_ref().is_some_and(|s| s.llm.is_some());
        let settings = merged_settings(stored, llm_settings_from_env(|key| std::env::var(key).ok()));
        if !had_llm && settings.llm.is_some() {
            self.repository().save_settings(&settings).await?;
            info!("Stored LLM settings from environment");
        }

        let Some(llm) = settings.llm.as_ref() else {
            warn!("No LLM provider configured; chat and suggestions are unavailable");
            return Ok(());
        };
        match (self.factory)(llm, self.llm_timeout()) {
            Ok(provider) => {
                info!(provider = provider.name(), model = provider.model(), "LLM provider ready");
                self.set_provider(Some(provider));
            }
            Err(err) => warn!(error = %err, "Stored LLM settings are unusable"),
        }
        Ok(())
    }

    /// Current settings with the api key masked.
    pub async fn settings(&self) -> OpsResult<SettingsResponse> {
        let settings = self
            .repository()
            .load_settings()
            .await?
            .unwrap_or_default();
        Ok(SettingsResponse {
            settings: settings.masked(),
            provider: self.provider_info(),
        })
    }

    /// Store new LLM credentials and make them the active provider.
    ///
    /// With `validate`, a failing probe call leaves everything unchanged.
    pub async fn update_llm(&self, llm: LlmSettings, validate: bool) -> OpsResult<SettingsResponse> {
        let _guard = self.settings_lock.lock().await;

        let mut settings = self
            .repository()
            .load_settings()
            .await?
            .unwrap_or_default();
        let llm = llm.with_key_from(settings.llm.as_ref());
        let problems = llm.validate();
        if !problems.is_empty() {
            return Err(OpsError::validation("Invalid LLM settings", problems));
        }

        let provider = (self.factory)(&llm, self.llm_timeout())
            .map_err(|err| OpsError::validation("Invalid LLM settings", vec![err.to_string()]))?;
        if validate {
            probe(provider.as_ref()).await.map_err(|err| {
                warn!(provider = provider.name(), error = %err, "LLM credential probe failed");
                OpsError::InvalidCredentials(err.to_string())
            })?;
        }

        settings.llm = Some(llm);
        self.repository().save_settings(&settings).await?;
        info!(provider = provider.name(), model = provider.model(), "Switched LLM provider");
        self.set_provider(Some(provider));

        Ok(SettingsResponse {
            settings: settings.masked(),
            provider: self.provider_info(),
        })
    }

    /// Replace the set of disabled canvas fields.
    pub async fn update_disabled_fields(
        &self,
        request: UpdateFieldsRequest,
    ) -> OpsResult<SettingsResponse> {
        Settings::validate_disabled_fields(&request.disabled_fields)
            .map_err(|errors| OpsError::validation("Invalid field settings", errors))?;

        let _guard = self.settings_lock.lock().await;
        let mut settings = self
            .repository()
            .load_settings()
            .await?
            .unwrap_or_default();
        settings.disabled_fields = request.disabled_fields;
        self.repository().save_settings(&settings).await?;
        info!(disabled = settings.disabled_fields.len(), "Updated field settings");

        Ok(SettingsResponse {
            settings: settings.masked(),
            provider: self.provider_info(),
        })
    }
}
