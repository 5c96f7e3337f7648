use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::StoreClient;

use crate::error::MessagingError;
use crate::models::{
    Channel, Conversation, ConversationMessage, InboundMessage, MessageProvider, MessageStatus,
    OutboundContent, SendOutcome,
};

/// Conversation log bookkeeping. One conversation per (patient, channel),
/// created lazily; messages are append-only.
pub struct ConversationService {
    store: Arc<StoreClient>,
}

impl ConversationService {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    pub async fn find_or_create(
        &self,
        patient_id: Uuid,
        channel: Channel,
    ) -> Result<Conversation, MessagingError> {
        let existing: Option<Conversation> = self
            .store
            .select_one(
                "conversations",
                &format!("patient_id=eq.{}&channel=eq.{}", patient_id, channel),
            )
            .await?;

        if let Some(conversation) = existing {
            return Ok(conversation);
        }

        debug!("Creating conversation for patient {}", patient_id);
        let created: Conversation = self
            .store
            .insert_returning(
                "conversations",
                json!({
                    "patient_id": patient_id,
                    "channel": channel,
                    "status": "open",
                    "last_message_at": Utc::now(),
                    "unread_count": 0,
                }),
            )
            .await?;
        Ok(created)
    }

    /// Appends a clinic-sent message and bumps the conversation.
    pub async fn append_outbound(
        &self,
        conversation: &Conversation,
        content: &OutboundContent,
        provider: MessageProvider,
        outcome: &SendOutcome,
    ) -> Result<ConversationMessage, MessagingError> {
        let now = Utc::now();
        let message: ConversationMessage = self
            .store
            .insert_returning(
                "conversation_messages",
                json!({
                    "conversation_id": conversation.id,
                    "sender": "clinic",
                    "content": content.log_content(),
                    "kind": content.log_kind(),
                    "status": "sent",
                    "external_id": outcome.message_id,
                    "provider": provider,
                    "media_url": content.media_url(),
                    "sent_at": now,
                }),
            )
            .await?;

        let _: Vec<Conversation> = self
            .store
            .update(
                "conversations",
                &format!("id=eq.{}", conversation.id),
                json!({ "last_message_at": now }),
            )
            .await?;

        Ok(message)
    }

    /// Appends a patient message, deduplicating by provider message id.
    /// Returns None when the message was already recorded.
    pub async fn record_inbound(
        &self,
        patient_id: Uuid,
        channel: Channel,
        inbound: &InboundMessage,
        provider: MessageProvider,
    ) -> Result<Option<ConversationMessage>, MessagingError> {
        if let Some(external_id) = &inbound.external_id {
            let seen: Option<ConversationMessage> = self
                .store
                .select_one(
                    "conversation_messages",
                    &format!("external_id=eq.{}", external_id),
                )
                .await?;
            if seen.is_some() {
                debug!("Duplicate inbound message {}, skipping", external_id);
                return Ok(None);
            }
        }

        let conversation = self.find_or_create(patient_id, channel).await?;
        let content = inbound
            .body
            .clone()
            .or_else(|| inbound.media_url.clone())
            .unwrap_or_default();

        let message: ConversationMessage = self
            .store
            .insert_returning(
                "conversation_messages",
                json!({
                    "conversation_id": conversation.id,
                    "sender": "patient",
                    "content": content,
                    "kind": inbound.kind,
                    "status": "received",
                    "external_id": inbound.external_id,
                    "provider": provider,
                    "media_url": inbound.media_url,
                    "sent_at": inbound.received_at,
                }),
            )
            .await?;

        let _: Vec<Conversation> = self
            .store
            .update(
                "conversations",
                &format!("id=eq.{}", conversation.id),
                json!({
                    "last_message_at": inbound.received_at,
                    "unread_count": conversation.unread_count + 1,
                }),
            )
            .await?;

        Ok(Some(message))
    }

    /// Flags the conversation for staff attention without appending.
    pub async fn bump_unread(&self, conversation: &Conversation) -> Result<(), MessagingError> {
        let _: Vec<Conversation> = self
            .store
            .update(
                "conversations",
                &format!("id=eq.{}", conversation.id),
                json!({ "unread_count": conversation.unread_count + 1 }),
            )
            .await?;
        Ok(())
    }

    /// Applies a provider delivery status to the matching message, if any.
    pub async fn update_message_status(
        &self,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<Option<ConversationMessage>, MessagingError> {
        let mut updated: Vec<ConversationMessage> = self
            .store
            .update(
                "conversation_messages",
                &format!("external_id=eq.{}", external_id),
                json!({ "status": status }),
            )
            .await?;

        Ok(if updated.is_empty() {
            None
        } else {
            Some(updated.remove(0))
        })
    }
}
