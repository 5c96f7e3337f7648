use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::MessagingError;
use crate::models::{
    Channel, ConversationMessage, InboundMessage, MessageOrigin, MessageProvider, MessageStatus,
    OutboundContent, SendOutcome, SendRequest,
};
use crate::services::conversation::ConversationService;
use crate::services::session::SessionGateway;
use crate::services::template::TemplateGatewayClient;

/// Uniform delivery seam over the two providers.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    async fn deliver(
        &self,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendOutcome, MessagingError>;
}

#[async_trait]
impl OutboundGateway for TemplateGatewayClient {
    async fn deliver(
        &self,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendOutcome, MessagingError> {
        match content {
            OutboundContent::Template {
                name,
                variables,
                media_url,
            } => {
                self.send_template(to, name, variables, media_url.as_deref())
                    .await
            }
            OutboundContent::Text { body } => self.send_text(to, body).await,
            OutboundContent::Media { .. } => Err(MessagingError::UnsupportedContent {
                provider: "template_gateway".to_string(),
                detail: "standalone media".to_string(),
            }),
        }
    }
}

#[async_trait]
impl OutboundGateway for SessionGateway {
    async fn deliver(
        &self,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendOutcome, MessagingError> {
        self.send(to, content).await
    }
}

/// Provider selection policy. An explicit override always wins;
/// staff-initiated messages prefer the personal session line when it is
/// up; automated campaign traffic stays on approved templates.
pub fn select_provider(
    origin: MessageOrigin,
    provider_override: Option<MessageProvider>,
    session_connected: bool,
) -> MessageProvider {
    if let Some(provider) = provider_override {
        return provider;
    }
    match origin {
        MessageOrigin::Staff if session_connected => MessageProvider::SessionGateway,
        MessageOrigin::Staff => MessageProvider::TemplateGateway,
        MessageOrigin::Automated => MessageProvider::TemplateGateway,
    }
}

/// Routes outbound sends to a gateway and keeps the conversation log in
/// step with everything sent or received.
pub struct MessagingRouter {
    conversations: ConversationService,
    template: Arc<TemplateGatewayClient>,
    session: Arc<SessionGateway>,
}

impl MessagingRouter {
    pub fn new(
        conversations: ConversationService,
        template: Arc<TemplateGatewayClient>,
        session: Arc<SessionGateway>,
    ) -> Self {
        Self {
            conversations,
            template,
            session,
        }
    }

    pub async fn send(&self, request: SendRequest) -> Result<ConversationMessage, MessagingError> {
        let provider = select_provider(
            request.origin,
            request.provider_override,
            self.session.is_connected().await,
        );
        debug!(
            "Routing message for patient {} via {}",
            request.patient_id, provider
        );

        let gateway: &dyn OutboundGateway = match provider {
            MessageProvider::TemplateGateway => self.template.as_ref(),
            MessageProvider::SessionGateway => self.session.as_ref(),
        };

        let outcome = gateway.deliver(&request.to, &request.content).await?;

        let conversation = self
            .conversations
            .find_or_create(request.patient_id, request.channel)
            .await?;
        self.conversations
            .append_outbound(&conversation, &request.content, provider, &outcome)
            .await
    }

    pub async fn record_inbound(
        &self,
        patient_id: Uuid,
        channel: Channel,
        inbound: &InboundMessage,
        provider: MessageProvider,
    ) -> Result<Option<ConversationMessage>, MessagingError> {
        self.conversations
            .record_inbound(patient_id, channel, inbound, provider)
            .await
    }

    pub async fn flag_for_staff(&self, patient_id: Uuid, channel: Channel) -> Result<(), MessagingError> {
        let conversation = self.conversations.find_or_create(patient_id, channel).await?;
        self.conversations.bump_unread(&conversation).await
    }

    /// Applies a provider delivery receipt to the conversation log.
    /// Returns the updated message so callers can correlate further
    /// records by external id.
    pub async fn handle_status_update(
        &self,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<Option<ConversationMessage>, MessagingError> {
        self.conversations
            .update_message_status(external_id, status)
            .await
    }
}
