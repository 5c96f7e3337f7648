use std::sync::Arc;
use axum::{routing::post, Router};

use crate::handlers::*;

pub fn create_webhook_router(state: Arc<AutomationCellState>) -> Router {
    Router::new()
        .route("/", post(receive_inbound_event))
        .route("/status", post(receive_status_update))
        .with_state(state)
}
