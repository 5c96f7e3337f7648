use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use messaging_cell::services::routing::MessagingRouter;
use messaging_cell::{Channel, InboundMessage, MessageProvider, MessageStatus};
use reminder_cell::ReminderService;
use shared_database::StoreClient;
use shared_models::Patient;
use shared_utils::phone;
use shared_utils::Clock;
use survey_cell::SurveyService;

use crate::error::AutomationError;
use crate::models::InboundOutcome;
use crate::services::quick_reply::QuickReplyService;

const LEAD_FIRST_NAME: &str = "Paciente";

/// Inbound webhook chain: NPS survey gets first refusal, quick-reply
/// buttons second, plain conversation logging as the fallback.
pub struct InboundProcessor {
    store: Arc<StoreClient>,
    router: Arc<MessagingRouter>,
    survey: Arc<SurveyService>,
    quick_reply: QuickReplyService,
    reminders: Arc<ReminderService>,
    clock: Arc<dyn Clock>,
}

impl InboundProcessor {
    pub fn new(
        store: Arc<StoreClient>,
        router: Arc<MessagingRouter>,
        survey: Arc<SurveyService>,
        quick_reply: QuickReplyService,
        reminders: Arc<ReminderService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            router,
            survey,
            quick_reply,
            reminders,
            clock,
        }
    }

    pub async fn handle_inbound_event(
        &self,
        inbound: &InboundMessage,
        provider: MessageProvider,
    ) -> Result<InboundOutcome, AutomationError> {
        let now = self.clock.now_utc();
        let patient = self.resolve_patient(&inbound.from).await?;

        if let Some(text) = inbound.body.as_deref().filter(|t| !t.trim().is_empty()) {
            if self.survey.handle_inbound(&inbound.from, text, now).await? {
                return Ok(InboundOutcome::claimed_by("survey"));
            }
        }

        if let Some(payload) = &inbound.button_payload {
            if self.quick_reply.handle_button(&patient, payload, now).await? {
                return Ok(InboundOutcome::claimed_by("quick_reply"));
            }
        }

        self.router
            .record_inbound(patient.id, Channel::Whatsapp, inbound, provider)
            .await?;
        Ok(InboundOutcome::unclaimed())
    }

    /// Matches the sender to a patient by phone suffix; unknown senders
    /// become lead placeholder patients so the conversation has an owner.
    async fn resolve_patient(&self, sender_phone: &str) -> Result<Patient, AutomationError> {
        let with_phone: Vec<Patient> = self
            .store
            .select("patients", "phone=not.is.null")
            .await?;

        if let Some(patient) = with_phone
            .into_iter()
            .find(|p| p.phone.as_deref().is_some_and(|stored| phone::same_line(stored, sender_phone)))
        {
            return Ok(patient);
        }

        info!("Unknown sender {}, creating lead patient", sender_phone);
        let lead: Patient = self
            .store
            .insert_returning(
                "patients",
                json!({
                    "first_name": LEAD_FIRST_NAME,
                    "last_name": phone::suffix(sender_phone),
                    "phone": sender_phone,
                    "is_lead": true,
                }),
            )
            .await?;
        Ok(lead)
    }

    /// Applies a provider delivery receipt to the conversation log and,
    /// for delivered/read, to the matching reminder record.
    pub async fn handle_status_update(
        &self,
        external_id: &str,
        raw_status: &str,
    ) -> Result<bool, AutomationError> {
        let Some(status) = MessageStatus::from_webhook(raw_status) else {
            debug!("Unknown delivery status '{}', ignoring", raw_status);
            return Ok(false);
        };

        let updated = self.router.handle_status_update(external_id, status).await?;

        if matches!(status, MessageStatus::Delivered | MessageStatus::Read) {
            self.reminders.correlate_delivery(external_id, status).await?;
        }

        Ok(updated.is_some())
    }
}
