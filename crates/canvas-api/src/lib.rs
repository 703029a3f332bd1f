//! REST API service for Business Canvas AI.
//!
//! A thin axum layer over [`canvas_ops::CanvasOps`]: it extracts the caller
//! identity, validates JSON bodies and maps operation errors onto HTTP
//! status codes. Successful responses are wrapped as `{ data, timestamp }`,
//! errors are `{ error, details? }`.
//!
//! ## Endpoints
//!
//! ### Canvas
//!
//! - `POST /api/canvas/create` - Create an empty canvas
//! - `GET /api/canvas/list` - Drafted canvases of the caller, newest first
//! - `GET|PATCH|DELETE /api/canvas/{id}` - Read, rename or delete a canvas
//! - `GET|PUT /api/canvas/{id}/fields` - Read or replace the canvas fields
//! - `PUT /api/canvas/{id}/fields/{field}` - Edit, lock or unlock one field
//!
//! ### Chat
//!
//! - `POST /api/canvas/{id}/message` - Generate or refine the canvas
//! - `GET /api/canvas/{id}/history` - Conversation as shown to the user
//!
//! ### Board & Suggestions
//!
//! - `GET /api/canvas/{id}/board` - Epics, features and stories
//! - `POST /api/canvas/{id}/board/items` - Add a work item
//! - `PATCH|DELETE /api/canvas/{id}/board/items/{item}` - Update or remove
//! - `POST /api/canvas/{id}/board/items/{item}/move` - Move across columns
//! - `GET|POST /api/canvas/{id}/suggestions` - List cached or generate
//! - `POST /api/canvas/{id}/suggestions/{sid}/accept` - Add to the board
//!
//! ### Settings
//!
//! - `GET /api/settings` - Settings with the api key masked
//! - `PUT /api/settings/llm` - Store credentials (`?validate=false` skips the probe)
//! - `PUT /api/settings/fields` - Disable optional canvas fields
//!
//! Every route except `/api/health` requires the `x-user-id` header.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use canvas_api::create_api_router;
//! use canvas_ops::{CanvasOps, Config, MemoryRepository};
//!
//! let ops = CanvasOps::new(Config::default(), Arc::new(MemoryRepository::new()));
//! let router = create_api_router(ops);
//! ```

mod extract;
mod routes;
mod types;

pub use extract::{UserIdentity, ValidJson, USER_HEADER};
pub use routes::create_api_router;
pub use types::{ApiError, ApiResponse, ApiState, ErrorBody, HealthResponse};
