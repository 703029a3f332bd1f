//! Generate command implementation.
//!
//! One-shot canvas generation: the canvas is built in memory, only the
//! stored LLM settings are read from the data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use canvas_core::UserId;
use canvas_ops::{
    CanvasOps, CanvasRepository, Config, CreateCanvasRequest, JsonFileRepository,
    MemoryRepository, SendMessageRequest,
};
use tracing::{debug, info};

/// Generate a canvas for `problem` and print or write it.
pub async fn execute(
    config: Config,
    problem: &str,
    output: Option<&Path>,
    attachments: &[PathBuf],
) -> Result<()> {
    let mut request = SendMessageRequest::text(problem);
    for path in attachments {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read attachment {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        debug!(attachment = %name, bytes = text.len(), "Attaching document");
        request = request.with_attachment(name, text);
    }

    let memory = Arc::new(MemoryRepository::new());
    if let Some(settings) = JsonFileRepository::new(&config.data_dir)
        .load_settings()
        .await?
    {
        memory.save_settings(&settings).await?;
    }

    let ops = CanvasOps::new(config, memory);
    ops.init_provider().await?;
    let Some(provider) = ops.provider() else {
        bail!("No LLM provider configured. Set AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_API_KEY, or GEMINI_API_KEY");
    };
    info!(provider = provider.name(), model = provider.model(), "Generating canvas");

    let user = UserId::from("cli");
    let canvas = ops
        .create_canvas(&user, CreateCanvasRequest::default())
        .await?;
    let response = ops.send_message(&user, canvas.id, request).await?;

    println!("{}", response.chat_response);
    for warning in &response.warnings {
        eprintln!("⚠️  {}", warning);
    }

    let json = serde_json::to_string_pretty(&response.canvas_json)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Canvas written to {}", path.display());
        }
        None => println!("\n{}", json),
    }

    Ok(())
}
