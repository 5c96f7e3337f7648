use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use automation_cell::create_webhook_router;
use automation_cell::handlers::AutomationCellState;
use messaging_cell::create_messaging_router;
use messaging_cell::handlers::MessagingCellState;
use reminder_cell::create_reminder_router;
use reminder_cell::handlers::ReminderCellState;
use survey_cell::create_survey_router;
use survey_cell::handlers::SurveyCellState;

pub fn create_router(
    messaging: Arc<MessagingCellState>,
    reminders: Arc<ReminderCellState>,
    surveys: Arc<SurveyCellState>,
    automation: Arc<AutomationCellState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic communications API is running!" }))
        .nest("/webhook", create_webhook_router(automation))
        .nest("/messaging", create_messaging_router(messaging))
        .nest("/reminders", create_reminder_router(reminders))
        .nest("/surveys", create_survey_router(surveys))
}
