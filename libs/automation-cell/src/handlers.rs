use std::sync::Arc;
use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use messaging_cell::{InboundMessage, MessageKind, MessageProvider};
use shared_models::error::AppError;

use crate::models::{InboundEventPayload, StatusUpdatePayload};
use crate::services::InboundProcessor;

pub struct AutomationCellState {
    pub processor: Arc<InboundProcessor>,
}

#[axum::debug_handler]
pub async fn receive_inbound_event(
    State(state): State<Arc<AutomationCellState>>,
    Json(payload): Json<InboundEventPayload>,
) -> Result<Json<Value>, AppError> {
    if payload.from.trim().is_empty() {
        return Err(AppError::BadRequest("Missing sender".to_string()));
    }

    let inbound = InboundMessage {
        external_id: payload.message_id,
        from: payload.from,
        body: payload.body,
        kind: MessageKind::parse(payload.kind.as_deref()),
        media_url: payload.media_url,
        button_payload: payload.button_payload,
        from_me: false,
        received_at: Utc::now(),
    };

    let outcome = state
        .processor
        .handle_inbound_event(&inbound, MessageProvider::TemplateGateway)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn receive_status_update(
    State(state): State<Arc<AutomationCellState>>,
    Json(payload): Json<StatusUpdatePayload>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .processor
        .handle_status_update(&payload.message_id, &payload.status)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({ "updated": updated })))
}
