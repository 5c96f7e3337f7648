use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use messaging_cell::services::routing::MessagingRouter;
use messaging_cell::{Channel, MessageOrigin, OutboundContent, SendRequest};
use reminder_cell::{ReminderService, ReminderStatus};
use shared_database::StoreClient;
use shared_models::{Appointment, AppointmentStatus, Patient};

use crate::error::AutomationError;
use crate::models::QuickReplyToken;

const ACK_CONFIRMED: &str = "¡Gracias! Tu turno quedó confirmado. Te esperamos.";
const ACK_CANCELLED: &str =
    "Tu turno fue cancelado. Si querés reprogramarlo, escribinos por acá.";
const ACK_RESCHEDULE: &str =
    "¡Entendido! En breve alguien del equipo se contacta para reprogramar tu turno.";

/// Nearest future appointment the patient can still act on, earliest
/// start first.
pub fn actionable_appointment_query(patient_id: Uuid, now: DateTime<Utc>) -> String {
    format!(
        "patient_id=eq.{}&starts_at=gt.{}&status=in.(scheduled,confirmed)&order=starts_at.asc",
        patient_id,
        now.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Applies quick-reply button decisions to the patient's next
/// appointment.
pub struct QuickReplyService {
    store: Arc<StoreClient>,
    router: Arc<MessagingRouter>,
    reminders: Arc<ReminderService>,
}

impl QuickReplyService {
    pub fn new(
        store: Arc<StoreClient>,
        router: Arc<MessagingRouter>,
        reminders: Arc<ReminderService>,
    ) -> Self {
        Self {
            store,
            router,
            reminders,
        }
    }

    /// Returns true when the payload was a recognized token applied to a
    /// qualifying appointment. A token with no future actionable
    /// appointment is ignored and left unclaimed.
    pub async fn handle_button(
        &self,
        patient: &Patient,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AutomationError> {
        let Some(token) = QuickReplyToken::parse(payload) else {
            return Ok(false);
        };

        let appointment = self.next_actionable_appointment(patient, now).await?;
        let Some(appointment) = appointment else {
            info!(
                "Quick reply {:?} from patient {} has no future appointment, ignoring",
                token, patient.id
            );
            return Ok(false);
        };

        match token {
            QuickReplyToken::ConfirmYes => {
                self.set_appointment_status(&appointment, AppointmentStatus::Confirmed)
                    .await?;
                self.reminders
                    .record_patient_action(appointment.id, ReminderStatus::Confirmed)
                    .await?;
                self.send_ack(patient, ACK_CONFIRMED).await;
            }
            QuickReplyToken::ConfirmCancel => {
                self.set_appointment_status(&appointment, AppointmentStatus::Cancelled)
                    .await?;
                self.reminders
                    .record_patient_action(appointment.id, ReminderStatus::Cancelled)
                    .await?;
                self.send_ack(patient, ACK_CANCELLED).await;
            }
            QuickReplyToken::ConfirmReschedule => {
                // Appointment stays untouched; a human takes over.
                self.reminders
                    .record_patient_action(appointment.id, ReminderStatus::Rescheduled)
                    .await?;
                self.send_ack(patient, ACK_RESCHEDULE).await;
                self.router
                    .flag_for_staff(patient.id, Channel::Whatsapp)
                    .await?;
            }
        }

        info!(
            "Quick reply {:?} applied to appointment {} for patient {}",
            token, appointment.id, patient.id
        );
        Ok(true)
    }

    async fn next_actionable_appointment(
        &self,
        patient: &Patient,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AutomationError> {
        let appointment: Option<Appointment> = self
            .store
            .select_one(
                "appointments",
                &actionable_appointment_query(patient.id, now),
            )
            .await?;
        Ok(appointment)
    }

    async fn set_appointment_status(
        &self,
        appointment: &Appointment,
        status: AppointmentStatus,
    ) -> Result<(), AutomationError> {
        let _: Vec<Appointment> = self
            .store
            .update(
                "appointments",
                &format!("id=eq.{}", appointment.id),
                json!({ "status": status }),
            )
            .await?;
        Ok(())
    }

    /// Acknowledgement doubles as the audit entry on the conversation.
    /// The state change already happened, so a failed send only logs.
    async fn send_ack(&self, patient: &Patient, body: &str) {
        let Some(to) = patient.phone.clone().filter(|p| !p.is_empty()) else {
            return;
        };
        let request = SendRequest {
            patient_id: patient.id,
            to,
            channel: Channel::Whatsapp,
            content: OutboundContent::Text {
                body: body.to_string(),
            },
            origin: MessageOrigin::Automated,
            provider_override: None,
        };
        if let Err(e) = self.router.send(request).await {
            error!(
                "Quick reply acknowledgement failed for patient {}: {}",
                patient.id, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn appointment_lookup_orders_by_earliest_start() {
        let patient_id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap();
        let query = actionable_appointment_query(patient_id, now);

        assert!(query.contains(&format!("patient_id=eq.{}", patient_id)));
        assert!(query.contains("starts_at=gt.2024-05-14T12:00:00Z"));
        assert!(query.contains("status=in.(scheduled,confirmed)"));
        assert!(query.ends_with("order=starts_at.asc"));
    }
}
