use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use messaging_cell::services::routing::MessagingRouter;
use messaging_cell::services::{
    ConversationService, CredentialStore, SessionGateway, TemplateGatewayClient,
    WebSocketTransport,
};
use messaging_cell::MessageStatus;
use reminder_cell::{ReminderService, ScanStrategy};
use shared_config::AppConfig;
use shared_database::StoreClient;
use shared_utils::FixedClock;

fn test_config(uri: &str) -> AppConfig {
    AppConfig {
        store_url: uri.to_string(),
        store_service_key: "test-service-key".to_string(),
        template_gateway_url: uri.to_string(),
        template_gateway_token: "test-token".to_string(),
        template_gateway_sender_id: "sender-1".to_string(),
        session_gateway_url: "ws://127.0.0.1:9/session".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

/// 21:00 UTC is 18:00 in Buenos Aires, the daily batch hour.
fn batch_hour_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2024, 5, 13, 21, 0, 0).unwrap(),
    ))
}

fn build_service(config: &AppConfig, clock: Arc<FixedClock>) -> ReminderService {
    let store = Arc::new(StoreClient::new(config));
    let template = Arc::new(TemplateGatewayClient::new(config));
    let transport = Arc::new(WebSocketTransport::new(config.session_gateway_url.clone()));
    let (session, _inbound) = SessionGateway::new(transport, CredentialStore::new(store.clone()));
    let router = Arc::new(MessagingRouter::new(
        ConversationService::new(store.clone()),
        template,
        Arc::new(session),
    ));

    ReminderService::new(store, router, clock)
}

fn settings_rows(automation: bool) -> Value {
    json!([
        { "key": "automation_enabled", "value": if automation { "true" } else { "false" } },
        { "key": "campaign_reminders_enabled", "value": "true" },
        { "key": "campaign_nps_enabled", "value": "true" },
    ])
}

fn appointment_row(id: Uuid, patient_id: Uuid, professional_id: Option<Uuid>) -> Value {
    json!({
        "id": id,
        "patient_id": patient_id,
        "professional_id": professional_id,
        "branch_id": null,
        "starts_at": "2024-05-14T14:00:00Z",
        "ends_at": "2024-05-14T14:30:00Z",
        "status": "scheduled",
        "created_at": "2024-05-01T10:00:00Z",
    })
}

fn patient_row(id: Uuid, phone: Option<&str>) -> Value {
    json!({
        "id": id,
        "first_name": "Ana",
        "last_name": "García",
        "phone": phone,
        "is_lead": false,
        "created_at": "2024-01-10T10:00:00Z",
    })
}

fn reminder_record_row(appointment_id: Uuid, status: &str, retry_count: i32) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "appointment_id": appointment_id,
        "status": status,
        "sent_at": "2024-05-13T21:00:00Z",
        "retry_count": retry_count,
        "external_message_id": "wamid.900",
        "error_message": null,
        "created_at": "2024-05-13T21:00:00Z",
    })
}

fn conversation_row(patient_id: Uuid) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": patient_id,
        "channel": "whatsapp",
        "status": "open",
        "last_message_at": "2024-05-13T12:00:00Z",
        "unread_count": 0,
    })
}

fn message_row(external_id: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "conversation_id": Uuid::new_v4(),
        "sender": "clinic",
        "content": "template:recordatorio_turno",
        "kind": "text",
        "status": "sent",
        "external_id": external_id,
        "provider": "template_gateway",
        "media_url": null,
        "sent_at": "2024-05-13T21:00:00Z",
    })
}

async fn mount_conversation_bookkeeping(server: &MockServer, patient_id: Uuid) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([conversation_row(patient_id)])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/conversation_messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([message_row("wamid.900")])))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn batch_run_sends_reminder_and_records_it() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let service = build_service(&config, batch_hour_clock());

    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_rows(true)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            appointment_id,
            patient_id,
            Some(professional_id)
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminder_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([patient_row(patient_id, Some("5491144445555"))])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/professionals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": professional_id,
            "first_name": "Laura",
            "last_name": "Gómez",
            "honorific": "Dra.",
        }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({
            "to": "5491144445555",
            "type": "template",
            "template": { "name": "recordatorio_turno" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message_id": "wamid.900" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_conversation_bookkeeping(&server, patient_id).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/reminder_records"))
        .and(body_partial_json(json!({
            "appointment_id": appointment_id,
            "status": "sent",
            "external_message_id": "wamid.900",
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([reminder_record_row(appointment_id, "sent", 0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let summary = service.process_reminders().await.expect("run should succeed");

    assert_eq!(summary.strategy, Some(ScanStrategy::Batch));
    assert_eq!(summary.eligible, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
}

#[tokio::test]
async fn disabled_campaign_scans_nothing() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let service = build_service(&config, batch_hour_clock());

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_rows(false)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let summary = service.process_reminders().await.expect("run should succeed");

    assert_eq!(summary.strategy, None);
    assert_eq!(summary.eligible, 0);
}

#[tokio::test]
async fn already_reminded_appointments_are_excluded() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let service = build_service(&config, batch_hour_clock());

    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_rows(true)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            appointment_id,
            patient_id,
            None
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminder_records"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "appointment_id": appointment_id }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let summary = service.process_reminders().await.expect("run should succeed");

    assert_eq!(summary.eligible, 0);
    assert_eq!(summary.sent, 0);
}

#[tokio::test]
async fn gateway_failure_is_recorded_with_a_retry() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let service = build_service(&config, batch_hour_clock());

    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_rows(true)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            appointment_id,
            patient_id,
            None
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminder_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([patient_row(patient_id, Some("5491144445555"))])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/reminder_records"))
        .and(body_partial_json(json!({
            "appointment_id": appointment_id,
            "status": "failed",
            "retry_count": 1,
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!([reminder_record_row(appointment_id, "failed", 1)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let summary = service.process_reminders().await.expect("run should succeed");

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn patient_without_phone_is_skipped() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let service = build_service(&config, batch_hour_clock());

    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinic_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings_rows(true)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            appointment_id,
            patient_id,
            None
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/reminder_records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([patient_row(patient_id, None)])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let summary = service.process_reminders().await.expect("run should succeed");

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.sent, 0);
}

#[tokio::test]
async fn delivery_receipt_promotes_the_reminder_row() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let service = build_service(&config, batch_hour_clock());

    let appointment_id = Uuid::new_v4();
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reminder_records"))
        .and(body_partial_json(json!({ "status": "delivered" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([reminder_record_row(appointment_id, "delivered", 0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    service
        .correlate_delivery("wamid.900", MessageStatus::Delivered)
        .await
        .expect("correlation should succeed");

    // Non-delivery statuses never touch the store.
    service
        .correlate_delivery("wamid.900", MessageStatus::Sent)
        .await
        .expect("correlation should succeed");
}
