use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;

pub fn create_messaging_router(state: Arc<MessagingCellState>) -> Router {
    Router::new()
        .route("/session", get(get_session_status))
        .route("/session/logout", post(logout_session))
        .route("/health", get(get_gateway_health))
        .with_state(state)
}
