use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use messaging_cell::services::{
    CredentialStore, SessionGateway, SessionTransport, TransportCommand, TransportEvent,
    TransportLink,
};
use messaging_cell::{
    InboundMessage, MessageKind, MessagingError, OutboundContent, SessionState, StoredCredential,
};
use shared_config::AppConfig;
use shared_database::StoreClient;

/// Replays a canned event script per connection attempt. The event
/// channel is kept open so the gateway blocks on the next event instead
/// of treating script exhaustion as a dropped link.
struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<TransportEvent>>>,
    event_senders: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
    commands: Mutex<Option<mpsc::Receiver<TransportCommand>>>,
}

impl ScriptedTransport {
    fn new(scripts: Vec<Vec<TransportEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            event_senders: Mutex::new(Vec::new()),
            commands: Mutex::new(None),
        }
    }

    async fn take_commands(&self) -> mpsc::Receiver<TransportCommand> {
        self.commands
            .lock()
            .await
            .take()
            .expect("no command channel captured")
    }
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn connect(
        &self,
        _credentials: Vec<StoredCredential>,
    ) -> Result<TransportLink, MessagingError> {
        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| MessagingError::SessionGateway("script exhausted".to_string()))?;

        let (events_tx, events_rx) = mpsc::channel(16);
        let (commands_tx, commands_rx) = mpsc::channel(16);

        for event in script {
            events_tx
                .send(event)
                .await
                .map_err(|_| MessagingError::SessionGateway("event channel closed".to_string()))?;
        }
        self.event_senders.lock().await.push(events_tx);
        *self.commands.lock().await = Some(commands_rx);

        Ok(TransportLink {
            events: events_rx,
            commands: commands_tx,
        })
    }
}

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

async fn mount_credential_select(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/session_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

fn build_gateway(
    config: &AppConfig,
    transport: Arc<ScriptedTransport>,
) -> (Arc<SessionGateway>, mpsc::Receiver<InboundMessage>) {
    let store = Arc::new(StoreClient::new(config));
    let (gateway, inbound) = SessionGateway::new(transport, CredentialStore::new(store));
    (Arc::new(gateway), inbound)
}

async fn wait_connected(gateway: &SessionGateway) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !gateway.is_connected().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "session never reached connected"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn inbound(from: &str, body: &str, from_me: bool) -> TransportEvent {
    TransportEvent::Message(InboundMessage {
        external_id: Some(format!("wamid.{}", body)),
        from: from.to_string(),
        body: Some(body.to_string()),
        kind: MessageKind::Text,
        media_url: None,
        button_payload: None,
        from_me,
        received_at: Utc::now(),
    })
}

#[tokio::test]
async fn pairing_flow_reaches_connected_and_sends() {
    let server = MockServer::start().await;
    mount_credential_select(&server).await;

    let transport = Arc::new(ScriptedTransport::new(vec![vec![
        TransportEvent::Qr("qr-blob".to_string()),
        TransportEvent::Open {
            number: Some("5491144445555".to_string()),
        },
    ]]));
    let (gateway, _inbound) = build_gateway(&test_config(&server.uri()), transport.clone());

    let loop_gateway = gateway.clone();
    let handle = tokio::spawn(async move { loop_gateway.run().await });

    wait_connected(&gateway).await;
    let status = gateway.status().await;
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.number.as_deref(), Some("5491144445555"));
    assert!(status.pairing_artifact.is_none());

    let outcome = gateway
        .send(
            "5491155556666",
            &OutboundContent::Text {
                body: "hola".to_string(),
            },
        )
        .await
        .expect("send should succeed while connected");
    assert!(outcome.message_id.is_some());

    let mut commands = transport.take_commands().await;
    let command = timeout(Duration::from_secs(1), commands.recv())
        .await
        .expect("command should arrive")
        .expect("command channel open");
    match command {
        TransportCommand::SendText { id, to, body } => {
            assert_eq!(Some(id), outcome.message_id);
            assert_eq!(to, "5491155556666");
            assert_eq!(body, "hola");
        }
        other => panic!("Unexpected command: {:?}", other),
    }

    handle.abort();
}

#[tokio::test]
async fn own_messages_are_filtered_from_the_inbound_queue() {
    let server = MockServer::start().await;
    mount_credential_select(&server).await;

    let transport = Arc::new(ScriptedTransport::new(vec![vec![
        TransportEvent::Open { number: None },
        inbound("5491144445555", "echo", true),
        inbound("5491144445555", "hola", false),
    ]]));
    let (gateway, mut inbound_rx) = build_gateway(&test_config(&server.uri()), transport);

    let loop_gateway = gateway.clone();
    let handle = tokio::spawn(async move { loop_gateway.run().await });

    let message = timeout(Duration::from_secs(2), inbound_rx.recv())
        .await
        .expect("inbound message should arrive")
        .expect("inbound channel open");
    assert_eq!(message.body.as_deref(), Some("hola"));
    assert!(!message.from_me);

    // The from_me echo must not be queued behind it.
    assert!(timeout(Duration::from_millis(100), inbound_rx.recv())
        .await
        .is_err());

    handle.abort();
}

#[tokio::test]
async fn logout_close_clears_credentials_and_stops_the_loop() {
    let server = MockServer::start().await;
    mount_credential_select(&server).await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/session_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(ScriptedTransport::new(vec![vec![
        TransportEvent::Open { number: None },
        TransportEvent::Close { logout: true },
    ]]));
    let (gateway, _inbound) = build_gateway(&test_config(&server.uri()), transport);

    let loop_gateway = gateway.clone();
    let handle = tokio::spawn(async move { loop_gateway.run().await });

    timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop should stop after logout")
        .expect("loop task should not panic");

    let status = gateway.status().await;
    assert_eq!(status.state, SessionState::Disconnected);
    assert!(!status.connected);
}

#[tokio::test]
async fn credential_updates_are_persisted() {
    let server = MockServer::start().await;
    mount_credential_select(&server).await;
    // "secret-bytes" base64-encoded.
    Mock::given(method("POST"))
        .and(path("/rest/v1/session_credentials"))
        .and(body_partial_json(json!({
            "category": "keys",
            "cred_id": "device-1",
            "data": "c2VjcmV0LWJ5dGVz",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "category": "keys",
            "cred_id": "device-1",
            "data": "c2VjcmV0LWJ5dGVz",
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/session_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let transport = Arc::new(ScriptedTransport::new(vec![vec![
        TransportEvent::Open { number: None },
        TransportEvent::CredentialsUpdate {
            category: "keys".to_string(),
            cred_id: "device-1".to_string(),
            data: b"secret-bytes".to_vec(),
        },
        TransportEvent::Close { logout: true },
    ]]));
    let (gateway, _inbound) = build_gateway(&test_config(&server.uri()), transport);

    let loop_gateway = gateway.clone();
    let handle = tokio::spawn(async move { loop_gateway.run().await });

    timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop should stop after logout")
        .expect("loop task should not panic");
}
