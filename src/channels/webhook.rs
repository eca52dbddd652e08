//! Webhook binding: the thinnest possible transport adapter.
//!
//! The transport POSTs the channel-native payload here; the reply carries
//! the ordered outbound descriptors for the transport to render and send.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::event::{Identity, InboundEvent};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the Axum router with the webhook and health routes.
pub fn webhook_routes(dispatcher: Arc<Dispatcher>) -> Router {
    let state = AppState { dispatcher };

    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(inbound))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fin-assist"
    }))
}

// ── Inbound ─────────────────────────────────────────────────────────────

/// Channel-native inbound payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPayload {
    /// Channel-qualified sender, e.g. `whatsapp:+9613334444`.
    pub from: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub button_payload: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_content_type: Option<String>,
    #[serde(default)]
    pub media_count: u32,
}

async fn inbound(
    State(state): State<AppState>,
    Json(payload): Json<InboundPayload>,
) -> impl IntoResponse {
    let identity = Identity::from_channel_address(&payload.from);
    let event = InboundEvent {
        text: payload.body,
        button_payload: payload.button_payload,
        media_url: payload.media_url,
        media_content_type: payload.media_content_type,
        media_count: payload.media_count,
    };

    debug!(identity = %identity, "Webhook event received");
    let messages = state.dispatcher.dispatch(identity, event).await;
    Json(serde_json::json!({ "messages": messages }))
}
