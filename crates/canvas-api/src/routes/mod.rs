//! API route handlers.

mod board;
mod canvas;
mod chat;
mod health;
mod settings;
mod suggestions;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, patch, post, put};
use axum::Router;
use canvas_ops::CanvasOps;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};

use crate::types::ApiState;

/// Create the API router with all endpoints under `/api`.
pub fn create_api_router(ops: CanvasOps) -> Router {
    let cors = cors_layer(&ops.config.cors_origins);
    let state = Arc::new(ApiState { ops });

    let api = Router::new()
        // Health
        .route("/health", get(health::health_handler))
        // Canvas lifecycle
        .route("/canvas/create", post(canvas::create_handler))
        .route("/canvas/list", get(canvas::list_handler))
        .route(
            "/canvas/{id}",
            get(canvas::get_handler)
                .patch(canvas::rename_handler)
                .delete(canvas::delete_handler),
        )
        .route(
            "/canvas/{id}/fields",
            get(canvas::fields_handler).put(canvas::replace_fields_handler),
        )
        .route("/canvas/{id}/fields/{field}", put(canvas::edit_field_handler))
        // Chat
        .route("/canvas/{id}/message", post(chat::message_handler))
        .route("/canvas/{id}/history", get(chat::history_handler))
        // Board
        .route("/canvas/{id}/board", get(board::board_handler))
        .route("/canvas/{id}/board/items", post(board::add_handler))
        .route(
            "/canvas/{id}/board/items/{item}",
            patch(board::update_handler).delete(board::remove_handler),
        )
        .route("/canvas/{id}/board/items/{item}/move", post(board::move_handler))
        // Suggestions
        .route(
            "/canvas/{id}/suggestions",
            get(suggestions::list_handler).post(suggestions::suggest_handler),
        )
        .route(
            "/canvas/{id}/suggestions/{sid}/accept",
            post(suggestions::accept_handler),
        )
        // Settings
        .route("/settings", get(settings::settings_handler))
        .route("/settings/llm", put(settings::llm_handler))
        .route("/settings/fields", put(settings::fields_handler));

    Router::new()
        .nest("/api", api)
        // Request tracing (enable with RUST_LOG=tower_http=info or higher)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
