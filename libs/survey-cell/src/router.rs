use std::sync::Arc;
use axum::{routing::post, Router};

use crate::handlers::*;

pub fn create_survey_router(state: Arc<SurveyCellState>) -> Router {
    Router::new()
        .route("/run", post(run_surveys))
        .with_state(state)
}
