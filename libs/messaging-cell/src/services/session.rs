use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::MessagingError;
use crate::models::{
    InboundMessage, MessageKind, OutboundContent, SendOutcome, SessionState, SessionStatus,
    StoredCredential,
};
use crate::services::credentials::CredentialStore;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const INBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Qr(String),
    Open { number: Option<String> },
    Close { logout: bool },
    Message(InboundMessage),
    CredentialsUpdate {
        category: String,
        cred_id: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone)]
pub enum TransportCommand {
    SendText {
        id: String,
        to: String,
        body: String,
    },
    SendMedia {
        id: String,
        to: String,
        url: String,
        caption: Option<String>,
    },
    Logout,
}

/// A live connection to the session provider: an event stream in, a
/// command channel out.
pub struct TransportLink {
    pub events: mpsc::Receiver<TransportEvent>,
    pub commands: mpsc::Sender<TransportCommand>,
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn connect(
        &self,
        credentials: Vec<StoredCredential>,
    ) -> Result<TransportLink, MessagingError>;
}

struct SessionShared {
    state: SessionState,
    pairing_artifact: Option<String>,
    number: Option<String>,
    commands: Option<mpsc::Sender<TransportCommand>>,
}

#[derive(Debug, PartialEq, Eq)]
enum LoopAction {
    Continue,
    Reconnect,
    Stop,
}

fn apply_transition(shared: &mut SessionShared, event: &TransportEvent) -> LoopAction {
    match event {
        TransportEvent::Qr(code) => {
            shared.state = SessionState::WaitingQr;
            shared.pairing_artifact = Some(code.clone());
            LoopAction::Continue
        }
        TransportEvent::Open { number } => {
            shared.state = SessionState::Connected;
            shared.pairing_artifact = None;
            shared.number = number.clone();
            LoopAction::Continue
        }
        TransportEvent::Close { logout } => {
            shared.state = SessionState::Disconnected;
            shared.pairing_artifact = None;
            shared.commands = None;
            if *logout {
                LoopAction::Stop
            } else {
                LoopAction::Reconnect
            }
        }
        // Message and CredentialsUpdate carry no state transition.
        _ => LoopAction::Continue,
    }
}

/// Long-lived authenticated messaging session.
///
/// Owns the connect/reconnect loop; inbound messages are pushed onto an
/// mpsc queue consumed elsewhere so event handling never blocks the read
/// loop. An unexpected close triggers reconnection; an explicit logout
/// clears stored credentials and stops the loop.
pub struct SessionGateway {
    transport: Arc<dyn SessionTransport>,
    credentials: CredentialStore,
    shared: Arc<RwLock<SessionShared>>,
    inbound_tx: mpsc::Sender<InboundMessage>,
}

impl SessionGateway {
    pub fn new(
        transport: Arc<dyn SessionTransport>,
        credentials: CredentialStore,
    ) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let gateway = Self {
            transport,
            credentials,
            shared: Arc::new(RwLock::new(SessionShared {
                state: SessionState::Disconnected,
                pairing_artifact: None,
                number: None,
                commands: None,
            })),
            inbound_tx,
        };
        (gateway, inbound_rx)
    }

    /// Connection loop. Runs until an explicit logout.
    pub async fn run(&self) {
        loop {
            {
                let mut shared = self.shared.write().await;
                shared.state = SessionState::Connecting;
                shared.pairing_artifact = None;
            }

            let credentials = match self.credentials.load_all().await {
                Ok(creds) => creds,
                Err(e) => {
                    warn!("Could not load session credentials: {}", e);
                    Vec::new()
                }
            };

            let mut link = match self.transport.connect(credentials).await {
                Ok(link) => link,
                Err(e) => {
                    error!("Session transport connect failed: {}", e);
                    self.shared.write().await.state = SessionState::Disconnected;
                    sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };

            self.shared.write().await.commands = Some(link.commands.clone());
            info!("Session transport link established");

            let mut action = LoopAction::Reconnect;
            while let Some(event) = link.events.recv().await {
                match event {
                    TransportEvent::CredentialsUpdate {
                        category,
                        cred_id,
                        data,
                    } => {
                        if let Err(e) = self.credentials.put(&category, &cred_id, &data).await {
                            warn!(
                                "Failed to persist session credential {}/{}: {}",
                                category, cred_id, e
                            );
                        }
                    }
                    TransportEvent::Message(message) => {
                        if message.from_me {
                            continue;
                        }
                        if self.inbound_tx.send(message).await.is_err() {
                            warn!("Inbound queue closed, dropping session message");
                        }
                    }
                    other => {
                        let next = {
                            let mut shared = self.shared.write().await;
                            apply_transition(&mut shared, &other)
                        };
                        if next != LoopAction::Continue {
                            action = next;
                            break;
                        }
                    }
                }
            }

            {
                let mut shared = self.shared.write().await;
                shared.state = SessionState::Disconnected;
                shared.commands = None;
            }

            if action == LoopAction::Stop {
                if let Err(e) = self.credentials.clear().await {
                    warn!("Failed to clear session credentials on logout: {}", e);
                }
                info!("Session logged out, stopping connection loop");
                return;
            }

            info!("Session link lost, reconnecting in {:?}", RECONNECT_DELAY);
            sleep(RECONNECT_DELAY).await;
        }
    }

    pub async fn send(
        &self,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendOutcome, MessagingError> {
        let commands = {
            let shared = self.shared.read().await;
            if shared.state != SessionState::Connected {
                return Err(MessagingError::SessionNotConnected);
            }
            shared
                .commands
                .clone()
                .ok_or(MessagingError::SessionNotConnected)?
        };

        let id = Uuid::new_v4().to_string();
        let command = match content {
            OutboundContent::Text { body } => TransportCommand::SendText {
                id: id.clone(),
                to: to.to_string(),
                body: body.clone(),
            },
            OutboundContent::Media { url, caption } => TransportCommand::SendMedia {
                id: id.clone(),
                to: to.to_string(),
                url: url.clone(),
                caption: caption.clone(),
            },
            OutboundContent::Template { name, .. } => {
                return Err(MessagingError::UnsupportedContent {
                    provider: "session_gateway".to_string(),
                    detail: format!("template {}", name),
                })
            }
        };

        commands
            .send(command)
            .await
            .map_err(|_| MessagingError::SessionGateway("Command channel closed".to_string()))?;

        Ok(SendOutcome {
            message_id: Some(id),
        })
    }

    pub async fn status(&self) -> SessionStatus {
        let shared = self.shared.read().await;
        SessionStatus {
            connected: shared.state == SessionState::Connected,
            state: shared.state,
            pairing_artifact: shared.pairing_artifact.clone(),
            number: shared.number.clone(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.read().await.state == SessionState::Connected
    }

    /// Asks the provider to terminate the session. The resulting logout
    /// close clears credentials and stops the loop; when no link is up
    /// the credentials are wiped directly.
    pub async fn logout(&self) -> Result<(), MessagingError> {
        let commands = self.shared.read().await.commands.clone();
        match commands {
            Some(tx) => tx
                .send(TransportCommand::Logout)
                .await
                .map_err(|_| MessagingError::SessionGateway("Command channel closed".to_string())),
            None => self.credentials.clear().await,
        }
    }
}

// ==============================================================================
// WEBSOCKET TRANSPORT
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    Qr {
        data: String,
    },
    Open {
        number: Option<String>,
    },
    Close {
        #[serde(default)]
        logout: bool,
    },
    Message {
        id: Option<String>,
        from: String,
        body: Option<String>,
        kind: Option<String>,
        media_url: Option<String>,
        button_payload: Option<String>,
        #[serde(default)]
        from_me: bool,
    },
    Credentials {
        category: String,
        cred_id: String,
        data: String,
    },
}

fn parse_frame(text: &str) -> Option<TransportEvent> {
    let wire: WireEvent = serde_json::from_str(text).ok()?;
    let event = match wire {
        WireEvent::Qr { data } => TransportEvent::Qr(data),
        WireEvent::Open { number } => TransportEvent::Open { number },
        WireEvent::Close { logout } => TransportEvent::Close { logout },
        WireEvent::Message {
            id,
            from,
            body,
            kind,
            media_url,
            button_payload,
            from_me,
        } => TransportEvent::Message(InboundMessage {
            external_id: id,
            from,
            body,
            kind: MessageKind::parse(kind.as_deref()),
            media_url,
            button_payload,
            from_me,
            received_at: Utc::now(),
        }),
        WireEvent::Credentials {
            category,
            cred_id,
            data,
        } => TransportEvent::CredentialsUpdate {
            category,
            cred_id,
            data: STANDARD.decode(data).ok()?,
        },
    };
    Some(event)
}

fn command_frame(command: &TransportCommand) -> Value {
    match command {
        TransportCommand::SendText { id, to, body } => json!({
            "action": "send_text",
            "id": id,
            "to": to,
            "body": body,
        }),
        TransportCommand::SendMedia {
            id,
            to,
            url,
            caption,
        } => json!({
            "action": "send_media",
            "id": id,
            "to": to,
            "url": url,
            "caption": caption,
        }),
        TransportCommand::Logout => json!({ "action": "logout" }),
    }
}

/// Production transport over the session provider's websocket endpoint.
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

#[async_trait]
impl SessionTransport for WebSocketTransport {
    async fn connect(
        &self,
        credentials: Vec<StoredCredential>,
    ) -> Result<TransportLink, MessagingError> {
        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| MessagingError::SessionGateway(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let resume = json!({ "action": "resume", "credentials": credentials });
        sink.send(Message::Text(resume.to_string()))
            .await
            .map_err(|e| MessagingError::SessionGateway(e.to_string()))?;

        let (events_tx, events_rx) = mpsc::channel(64);
        let (commands_tx, mut commands_rx) = mpsc::channel::<TransportCommand>(64);

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Some(event) => {
                            let closing = matches!(event, TransportEvent::Close { .. });
                            if events_tx.send(event).await.is_err() || closing {
                                break;
                            }
                        }
                        None => warn!("Unparseable session frame, skipping"),
                    },
                    Ok(Message::Close(_)) => {
                        let _ = events_tx.send(TransportEvent::Close { logout: false }).await;
                        break;
                    }
                    Err(e) => {
                        debug!("Session websocket read error: {}", e);
                        let _ = events_tx.send(TransportEvent::Close { logout: false }).await;
                        break;
                    }
                    _ => {}
                }
            }
        });

        tokio::spawn(async move {
            while let Some(command) = commands_rx.recv().await {
                let frame = command_frame(&command);
                if sink.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        });

        Ok(TransportLink {
            events: events_rx,
            commands: commands_tx,
        })
    }
}
