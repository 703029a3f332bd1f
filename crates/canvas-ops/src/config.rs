//! Configuration for the operations layer.

use std::path::PathBuf;

use canvas_core::LlmSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, OpsResult};

const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-4o-mini";
const DEFAULT_AZURE_API_VERSION: &str = "2024-05-01-preview";
const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Configuration for canvas operations and the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where canvases and settings are stored.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum size of a single attachment (in bytes).
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: usize,

    /// Timeout for a single LLM call.
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Allowed CORS origins; `["*"]` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "canvas-ai", "business-canvas")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".canvas-data"))
}

fn default_max_attachment_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_llm_timeout_secs() -> u64 {
    300
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_attachment_bytes: default_max_attachment_bytes(),
            llm_timeout_secs: default_llm_timeout_secs(),
            cors_origins: default_cors_origins(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Load configuration from disk, `.env` and environment overrides.
    pub fn load() -> OpsResult<Self> {
        // Try to load from config file
        let config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_json::from_str(&contents)?
            }
            _ => Self::default(),
        };

        // A missing .env is fine
        let _ = dotenvy::dotenv();

        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `CANVAS_*` / `PORT` overrides read through `var`.
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> OpsResult<Self> {
        if let Some(dir) = var("CANVAS_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(origins) = var("CANVAS_CORS_ORIGINS") {
            self.cors_origins = parse_origins(&origins);
        }
        if let Some(host) = var("CANVAS_HOST") {
            self.host = host;
        }
        if let Some(port) = var("PORT") {
            self.port = port
                .parse()
                .map_err(|_| OpsError::Config(format!("Invalid PORT: {}", port)))?;
        }
        if let Some(secs) = var("CANVAS_LLM_TIMEOUT_SECS") {
            self.llm_timeout_secs = secs.parse().map_err(|_| {
                OpsError::Config(format!("Invalid CANVAS_LLM_TIMEOUT_SECS: {}", secs))
            })?;
        }
        Ok(self)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> OpsResult<()> {
        if let Some(path) = Self::config_file_path() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&path, contents)?;
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "canvas-ai", "business-canvas")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "data_dir" => Some(self.data_dir.display().to_string()),
            "max_attachment_bytes" => Some(self.max_attachment_bytes.to_string()),
            "llm_timeout_secs" => Some(self.llm_timeout_secs.to_string()),
            "cors_origins" => Some(self.cors_origins.join(",")),
            "host" => Some(self.host.clone()),
            "port" => Some(self.port.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key.
    pub fn set(&mut self, key: &str, value: &str) -> OpsResult<()> {
        let invalid = || OpsError::Config(format!("Invalid number: {}", value));
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "max_attachment_bytes" => self.max_attachment_bytes = value.parse().map_err(|_| invalid())?,
            "llm_timeout_secs" => self.llm_timeout_secs = value.parse().map_err(|_| invalid())?,
            "cors_origins" => self.cors_origins = parse_origins(value),
            "host" => self.host = value.to_string(),
            "port" => self.port = value.parse().map_err(|_| invalid())?,
            _ => {
                return Err(OpsError::Config(format!("Unknown config key: {}", key)));
            }
        }
        Ok(())
    }

    /// All keys accepted by [`Config::get`] and [`Config::set`].
    pub fn keys() -> &'static [&'static str] {
        &[
            "data_dir",
            "max_attachment_bytes",
            "llm_timeout_secs",
            "cors_origins",
            "host",
            "port",
        ]
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    if raw.trim() == "*" {
        return default_cors_origins();
    }
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

/// LLM credentials from `AZURE_OPENAI_*` or `GEMINI_*` variables.
///
/// Azure wins when both are present.
pub fn llm_settings_from_env(var: impl Fn(&str) -> Option<String>) -> Option<LlmSettings> {
    let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

    if let (Some(endpoint), Some(api_key)) = (
        non_empty("AZURE_OPENAI_ENDPOINT"),
        non_empty("AZURE_OPENAI_API_KEY"),
    ) {
        return Some(LlmSettings::Azure {
            endpoint,
            api_key,
            deployment: non_empty("AZURE_OPENAI_DEPLOYMENT_NAME")
                .unwrap_or_else(|| DEFAULT_AZURE_DEPLOYMENT.to_string()),
            api_version: non_empty("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
        });
    }

    non_empty("GEMINI_API_KEY").map(|api_key| LlmSettings::Gemini {
        endpoint: non_empty("GEMINI_ENDPOINT").unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
        api_key,
        model: non_empty("GEMINI_MODEL_NAME").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
    })
}
