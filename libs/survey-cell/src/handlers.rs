use std::sync::Arc;
use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::services::SurveyService;

pub struct SurveyCellState {
    pub service: Arc<SurveyService>,
}

/// Manual trigger; the scheduler calls the same service entry point.
#[axum::debug_handler]
pub async fn run_surveys(
    State(state): State<Arc<SurveyCellState>>,
) -> Result<Json<Value>, AppError> {
    let summary = state
        .service
        .trigger_survey_batch()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!(summary)))
}
