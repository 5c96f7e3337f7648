use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;
mod scheduler;

use automation_cell::handlers::AutomationCellState;
use automation_cell::{InboundProcessor, QuickReplyService};
use messaging_cell::handlers::MessagingCellState;
use messaging_cell::services::routing::MessagingRouter;
use messaging_cell::services::{
    ConversationService, CredentialStore, SessionGateway, TemplateGatewayClient,
    WebSocketTransport,
};
use messaging_cell::MessageProvider;
use reminder_cell::handlers::ReminderCellState;
use reminder_cell::ReminderService;
use shared_config::AppConfig;
use shared_database::StoreClient;
use shared_utils::{Clock, SystemClock};
use survey_cell::handlers::SurveyCellState;
use survey_cell::SurveyService;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic communications API server");

    // Load configuration
    let config = AppConfig::from_env();
    if !config.is_configured() {
        warn!("Store credentials missing, persistence calls will fail");
    }
    if !config.is_template_gateway_configured() {
        warn!("Template gateway credentials missing, template sends will fail");
    }

    // Shared infrastructure
    let store = Arc::new(StoreClient::new(&config));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Messaging: both gateways behind one router
    let template = Arc::new(TemplateGatewayClient::new(&config));
    let transport = Arc::new(WebSocketTransport::new(config.session_gateway_url.clone()));
    let credentials = CredentialStore::new(store.clone());
    let (session, mut inbound_rx) = SessionGateway::new(transport, credentials);
    let session = Arc::new(session);
    let conversations = ConversationService::new(store.clone());
    let messaging = Arc::new(MessagingRouter::new(
        conversations,
        template.clone(),
        session.clone(),
    ));

    // Campaign services
    let reminders = Arc::new(ReminderService::new(
        store.clone(),
        messaging.clone(),
        clock.clone(),
    ));
    let surveys = Arc::new(SurveyService::new(
        store.clone(),
        messaging.clone(),
        clock.clone(),
    ));
    let quick_reply = QuickReplyService::new(store.clone(), messaging.clone(), reminders.clone());
    let processor = Arc::new(InboundProcessor::new(
        store.clone(),
        messaging.clone(),
        surveys.clone(),
        quick_reply,
        reminders.clone(),
        clock.clone(),
    ));

    // Session gateway connection loop
    let session_loop = session.clone();
    tokio::spawn(async move {
        session_loop.run().await;
    });

    // Inbound messages from the session gateway feed the same
    // processor the webhook uses
    let inbound_processor = processor.clone();
    tokio::spawn(async move {
        while let Some(message) = inbound_rx.recv().await {
            if let Err(e) = inbound_processor
                .handle_inbound_event(&message, MessageProvider::SessionGateway)
                .await
            {
                error!("Session inbound processing failed: {}", e);
            }
        }
        info!("Session inbound channel closed");
    });

    // Periodic campaign runs
    scheduler::spawn_campaign_loops(reminders.clone(), surveys.clone());

    // Per-cell handler state
    let messaging_state = Arc::new(MessagingCellState {
        session: session.clone(),
        template: template.clone(),
    });
    let reminder_state = Arc::new(ReminderCellState {
        service: reminders.clone(),
    });
    let survey_state = Arc::new(SurveyCellState {
        service: surveys.clone(),
    });
    let automation_state = Arc::new(AutomationCellState {
        processor: processor.clone(),
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(
        messaging_state,
        reminder_state,
        survey_state,
        automation_state,
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(cors);

    // Run the server
    info!("Listening on {}", config.bind_addr);

    let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
    axum::serve(listener, app)
        .await
        .unwrap();
}
