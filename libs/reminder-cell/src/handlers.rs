use std::sync::Arc;
use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::services::ReminderService;

pub struct ReminderCellState {
    pub service: Arc<ReminderService>,
}

/// Manual trigger; the scheduler calls the same service entry point.
#[axum::debug_handler]
pub async fn run_reminders(
    State(state): State<Arc<ReminderCellState>>,
) -> Result<Json<Value>, AppError> {
    let summary = state
        .service
        .process_reminders()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(summary)))
}
