use std::sync::Arc;
use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::services::session::SessionGateway;
use crate::services::template::TemplateGatewayClient;

pub struct MessagingCellState {
    pub session: Arc<SessionGateway>,
    pub template: Arc<TemplateGatewayClient>,
}

#[axum::debug_handler]
pub async fn get_session_status(
    State(state): State<Arc<MessagingCellState>>,
) -> Result<Json<Value>, AppError> {
    let status = state.session.status().await;
    Ok(Json(json!(status)))
}

#[axum::debug_handler]
pub async fn logout_session(
    State(state): State<Arc<MessagingCellState>>,
) -> Result<Json<Value>, AppError> {
    state
        .session
        .logout()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({ "status": "logout_requested" })))
}

#[axum::debug_handler]
pub async fn get_gateway_health(
    State(state): State<Arc<MessagingCellState>>,
) -> Result<Json<Value>, AppError> {
    let health = state.template.health().await;
    Ok(Json(json!(health)))
}
