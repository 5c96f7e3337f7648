use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CONVERSATION ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Whatsapp => write!(f, "whatsapp"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub channel: Channel,
    pub status: ConversationStatus,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Clinic,
    Patient,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl MessageKind {
    /// Provider kind strings default to text when absent or unknown.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("image") => MessageKind::Image,
            Some("audio") => MessageKind::Audio,
            Some("video") => MessageKind::Video,
            Some("document") => MessageKind::Document,
            _ => MessageKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

impl MessageStatus {
    /// Maps a provider webhook status string. Unknown strings are dropped
    /// rather than guessed at.
    pub fn from_webhook(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "read" => Some(MessageStatus::Read),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Delivered => write!(f, "delivered"),
            MessageStatus::Read => write!(f, "read"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Received => write!(f, "received"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageProvider {
    TemplateGateway,
    SessionGateway,
}

impl fmt::Display for MessageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageProvider::TemplateGateway => write!(f, "template_gateway"),
            MessageProvider::SessionGateway => write!(f, "session_gateway"),
        }
    }
}

/// Append-only log entry. `external_id` carries the provider message id
/// for inbound dedup and delivery-status correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: MessageSender,
    pub content: String,
    pub kind: MessageKind,
    pub status: MessageStatus,
    pub external_id: Option<String>,
    pub provider: MessageProvider,
    pub media_url: Option<String>,
    pub sent_at: DateTime<Utc>,
}

// ==============================================================================
// OUTBOUND SENDING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum OutboundContent {
    Template {
        name: String,
        variables: Vec<String>,
        media_url: Option<String>,
    },
    Text {
        body: String,
    },
    Media {
        url: String,
        caption: Option<String>,
    },
}

impl OutboundContent {
    /// Human-readable body stored on the conversation log.
    pub fn log_content(&self) -> String {
        match self {
            OutboundContent::Template { name, variables, .. } => {
                if variables.is_empty() {
                    format!("template:{}", name)
                } else {
                    format!("template:{} [{}]", name, variables.join(", "))
                }
            }
            OutboundContent::Text { body } => body.clone(),
            OutboundContent::Media { url, caption } => {
                caption.clone().unwrap_or_else(|| url.clone())
            }
        }
    }

    pub fn log_kind(&self) -> MessageKind {
        match self {
            OutboundContent::Media { .. } => MessageKind::Image,
            _ => MessageKind::Text,
        }
    }

    pub fn media_url(&self) -> Option<String> {
        match self {
            OutboundContent::Template { media_url, .. } => media_url.clone(),
            OutboundContent::Media { url, .. } => Some(url.clone()),
            OutboundContent::Text { .. } => None,
        }
    }
}

/// Who initiated the send. Routing policy depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Automated,
    Staff,
}

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub patient_id: Uuid,
    pub to: String,
    pub channel: Channel,
    pub content: OutboundContent,
    pub origin: MessageOrigin,
    pub provider_override: Option<MessageProvider>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutcome {
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayHealth {
    pub connected: bool,
    pub error: Option<String>,
}

// ==============================================================================
// SESSION GATEWAY
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    WaitingQr,
    Connected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::WaitingQr => write!(f, "waiting_qr"),
            SessionState::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub state: SessionState,
    pub pairing_artifact: Option<String>,
    pub number: Option<String>,
}

/// Message received over either gateway, normalized before the inbound
/// processing chain sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub external_id: Option<String>,
    pub from: String,
    pub body: Option<String>,
    pub kind: MessageKind,
    pub media_url: Option<String>,
    pub button_payload: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    pub received_at: DateTime<Utc>,
}

/// Opaque gateway credential blob, base64 over the wire and in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    pub category: String,
    pub cred_id: String,
    pub data: String,
}
