use crate::error::ApiError;
use crate::state::AppState;
use areachat::models::message::ChatMessage;
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatResponse {
    message: String,
    modelo: String,
    #[serde(rename = "tokensUsados")]
    tokens_usados: i64,
}

async fn handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!("rejected chat body: {}", rejection.body_text());
        ApiError::bad_request("Se requiere un array de mensajes válido")
    })?;

    let span = tracing::info_span!(
        "chat",
        request_id = %Uuid::new_v4(),
        messages = request.messages.len()
    );

    async move {
        let reply = state.gateway.reply(&request.messages).await?;
        tracing::info!(model = %reply.model, tokens = reply.tokens_used, "chat answered");
        Ok(Json(ChatResponse {
            message: reply.message,
            modelo: reply.model,
            tokens_usados: reply.tokens_used,
        }))
    }
    .instrument(span)
    .await
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chatbot", post(handler))
        .with_state(state)
}
