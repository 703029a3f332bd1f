//! Business Canvas AI Operations Layer
//!
//! This crate provides a typed API for every canvas operation. It is
//! consumed by both the CLI and the REST API so behavior stays identical.
//!
//! ## Architecture
//!
//! - **Requests**: typed, self-validating input DTOs
//! - **Responses**: typed output DTOs
//! - **Repository**: document store trait with JSON-file and in-memory backends
//! - **CanvasOps**: the service that executes operations
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use canvas_core::UserId;
//! use canvas_ops::{CanvasOps, Config, CreateCanvasRequest, JsonFileRepository, SendMessageRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let repo = Arc::new(JsonFileRepository::new(&config.data_dir));
//!     let ops = CanvasOps::new(config, repo);
//!     ops.init_provider().await?;
//!
//!     let user = UserId::from("alice");
//!     let canvas = ops.create_canvas(&user, CreateCanvasRequest::default()).await?;
//!     let reply = ops
//!         .send_message(&user, canvas.id, SendMessageRequest::text("Claims triage is too slow"))
//!         .await?;
//!     println!("{}", reply.chat_response);
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod error;
mod repository;
mod requests;
mod responses;
mod settings;

// Re-export public API
pub use config::{llm_settings_from_env, Config};
pub use context::{CanvasOps, ProviderFactory};
pub use error::{OpsError, OpsResult};
pub use repository::{CanvasRepository, JsonFileRepository, MemoryRepository};
pub use requests::*;
pub use responses::*;
