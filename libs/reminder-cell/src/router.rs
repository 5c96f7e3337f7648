use std::sync::Arc;
use axum::{routing::post, Router};

use crate::handlers::*;

pub fn create_reminder_router(state: Arc<ReminderCellState>) -> Router {
    Router::new()
        .route("/run", post(run_reminders))
        .with_state(state)
}
