//! Config command implementation.

use anyhow::{anyhow, Result};
use canvas_ops::Config;

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Business Canvas Configuration");
    println!("{:-<40}", "");

    for key in Config::keys() {
        println!(
            "{:<22}{}",
            format!("{}:", key),
            config.get(key).unwrap_or_default()
        );
    }

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }
    println!("LLM credentials are managed through PUT /api/settings/llm or AZURE_OPENAI_* / GEMINI_* variables.");

    Ok(())
}

/// Set a configuration value and persist it.
pub fn set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    config
        .set(key, value)
        .map_err(|err| anyhow!("{}. Valid keys: {}", err, Config::keys().join(", ")))?;
    config.save()?;
    println!("Set {} to: {}", key, config.get(key).unwrap_or_default());
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    let value = config.get(key).ok_or_else(|| {
        anyhow!(
            "Unknown config key: {}. Valid keys: {}",
            key,
            Config::keys().join(", ")
        )
    })?;
    println!("{}", value);
    Ok(())
}
