use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use messaging_cell::services::routing::MessagingRouter;
use messaging_cell::{Channel, MessageOrigin, MessageStatus, OutboundContent, SendRequest};
use shared_database::{SettingsReader, StoreClient};
use shared_models::{Appointment, Branch, Patient, Professional};
use shared_utils::locale;
use shared_utils::{ClinicCalendar, Clock};

use crate::error::ReminderError;
use crate::models::{ReminderRecord, ReminderRunSummary, ReminderStatus};
use crate::services::eligibility::{candidate_query, scan_window};

const REMINDER_TEMPLATE: &str = "recordatorio_turno";
const MAX_RETRIES: i32 = 2;
const THROTTLE_THRESHOLD: usize = 10;
const THROTTLE_DELAY: Duration = Duration::from_millis(500);

const FALLBACK_PROFESSIONAL: &str = "nuestro equipo";
const FALLBACK_BRANCH: &str = "la clínica";

#[derive(Debug, Deserialize)]
struct ReminderKey {
    appointment_id: Uuid,
}

enum DispatchResult {
    Sent,
    Failed,
    Skipped,
}

/// Reminder campaign: eligibility scan plus strictly sequential dispatch.
pub struct ReminderService {
    store: Arc<StoreClient>,
    settings: SettingsReader,
    router: Arc<MessagingRouter>,
    clock: Arc<dyn Clock>,
}

impl ReminderService {
    pub fn new(
        store: Arc<StoreClient>,
        router: Arc<MessagingRouter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: SettingsReader::new(store.clone()),
            store,
            router,
            clock,
        }
    }

    /// One reminder run. Per-appointment send failures are recorded and
    /// counted; store failures abort the run.
    pub async fn process_reminders(&self) -> Result<ReminderRunSummary, ReminderError> {
        let settings = self.settings.load().await?;
        if !settings.reminders_active() {
            info!("Reminder campaign disabled, skipping run");
            return Ok(ReminderRunSummary::disabled());
        }

        let now = self.clock.now_utc();
        let calendar = ClinicCalendar::new(settings.clinic_timezone);
        let (strategy, start, end) = scan_window(now, &calendar, settings.reminder_hours_before);

        if let (Some(ws), Some(we)) = (&settings.reminder_window_start, &settings.reminder_window_end)
        {
            debug!("Send window {}..{} configured, not enforced", ws, we);
        }

        let candidates: Vec<Appointment> = self
            .store
            .select("appointments", &candidate_query(start, end))
            .await?;
        let eligible = self.filter_unreminded(candidates).await?;
        info!(
            "Reminder scan ({:?}): {} eligible appointments",
            strategy,
            eligible.len()
        );

        let throttle = eligible.len() > THROTTLE_THRESHOLD;
        let mut summary = ReminderRunSummary {
            strategy: Some(strategy),
            eligible: eligible.len(),
            sent: 0,
            failed: 0,
            skipped: 0,
        };

        for (index, appointment) in eligible.iter().enumerate() {
            if throttle && index > 0 {
                sleep(THROTTLE_DELAY).await;
            }
            match self.dispatch_one(appointment, &calendar, now).await? {
                DispatchResult::Sent => summary.sent += 1,
                DispatchResult::Failed => summary.failed += 1,
                DispatchResult::Skipped => summary.skipped += 1,
            }
        }

        info!(
            "Reminder run done: {} sent, {} failed, {} skipped",
            summary.sent, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    /// Drops appointments that already have a successfully sent reminder.
    /// Selection-time filter only; overlapping runs can race on it.
    async fn filter_unreminded(
        &self,
        candidates: Vec<Appointment>,
    ) -> Result<Vec<Appointment>, ReminderError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids = candidates
            .iter()
            .map(|a| a.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let reminded: Vec<ReminderKey> = self
            .store
            .select(
                "reminder_records",
                &format!(
                    "appointment_id=in.({})&status=in.(sent,delivered,read)&select=appointment_id",
                    ids
                ),
            )
            .await?;
        let reminded: HashSet<Uuid> = reminded.into_iter().map(|r| r.appointment_id).collect();

        Ok(candidates
            .into_iter()
            .filter(|a| !reminded.contains(&a.id))
            .collect())
    }

    async fn dispatch_one(
        &self,
        appointment: &Appointment,
        calendar: &ClinicCalendar,
        now: DateTime<Utc>,
    ) -> Result<DispatchResult, ReminderError> {
        let patient: Option<Patient> = self
            .store
            .select_one("patients", &format!("id=eq.{}", appointment.patient_id))
            .await?;
        let Some(patient) = patient else {
            warn!(
                "Appointment {} references missing patient {}, skipping",
                appointment.id, appointment.patient_id
            );
            return Ok(DispatchResult::Skipped);
        };

        let Some(phone) = patient.phone.clone().filter(|p| !p.is_empty()) else {
            warn!("Patient {} has no phone, skipping reminder", patient.id);
            return Ok(DispatchResult::Skipped);
        };

        let existing: Option<ReminderRecord> = self
            .store
            .select_one(
                "reminder_records",
                &format!("appointment_id=eq.{}", appointment.id),
            )
            .await?;
        let retry_count = existing.as_ref().map(|r| r.retry_count).unwrap_or(0);
        if retry_count >= MAX_RETRIES {
            warn!(
                "Reminder for appointment {} already failed {} times, giving up",
                appointment.id, retry_count
            );
            return Ok(DispatchResult::Skipped);
        }

        let variables = self.render_variables(appointment, &patient, calendar).await?;
        let request = SendRequest {
            patient_id: patient.id,
            to: phone,
            channel: Channel::Whatsapp,
            content: OutboundContent::Template {
                name: REMINDER_TEMPLATE.to_string(),
                variables,
                media_url: None,
            },
            origin: MessageOrigin::Automated,
            provider_override: None,
        };

        match self.router.send(request).await {
            Ok(message) => {
                let _: ReminderRecord = self
                    .store
                    .upsert_returning(
                        "reminder_records",
                        "appointment_id",
                        json!({
                            "appointment_id": appointment.id,
                            "status": ReminderStatus::Sent,
                            "sent_at": now,
                            "retry_count": retry_count,
                            "external_message_id": message.external_id,
                            "error_message": null,
                        }),
                    )
                    .await?;
                Ok(DispatchResult::Sent)
            }
            Err(e) => {
                error!(
                    "Reminder send failed for appointment {}: {}",
                    appointment.id, e
                );
                let _: ReminderRecord = self
                    .store
                    .upsert_returning(
                        "reminder_records",
                        "appointment_id",
                        json!({
                            "appointment_id": appointment.id,
                            "status": ReminderStatus::Failed,
                            "retry_count": retry_count + 1,
                            "error_message": e.to_string(),
                        }),
                    )
                    .await?;
                Ok(DispatchResult::Failed)
            }
        }
    }

    async fn render_variables(
        &self,
        appointment: &Appointment,
        patient: &Patient,
        calendar: &ClinicCalendar,
    ) -> Result<Vec<String>, ReminderError> {
        let professional: Option<Professional> = match appointment.professional_id {
            Some(id) => {
                self.store
                    .select_one("professionals", &format!("id=eq.{}", id))
                    .await?
            }
            None => None,
        };
        let branch: Option<Branch> = match appointment.branch_id {
            Some(id) => {
                self.store
                    .select_one("branches", &format!("id=eq.{}", id))
                    .await?
            }
            None => None,
        };

        let starts_local = appointment.starts_at.with_timezone(&calendar.tz);
        Ok(vec![
            patient.full_name(),
            locale::spanish_date(starts_local),
            locale::spanish_time(starts_local),
            professional
                .map(|p| p.display_name())
                .unwrap_or_else(|| FALLBACK_PROFESSIONAL.to_string()),
            branch
                .map(|b| b.name)
                .unwrap_or_else(|| FALLBACK_BRANCH.to_string()),
        ])
    }

    /// Promotes the reminder row when the provider confirms delivery.
    pub async fn correlate_delivery(
        &self,
        external_id: &str,
        status: MessageStatus,
    ) -> Result<(), ReminderError> {
        let reminder_status = match status {
            MessageStatus::Delivered => ReminderStatus::Delivered,
            MessageStatus::Read => ReminderStatus::Read,
            _ => return Ok(()),
        };

        let updated: Vec<ReminderRecord> = self
            .store
            .update(
                "reminder_records",
                &format!("external_message_id=eq.{}", external_id),
                json!({ "status": reminder_status }),
            )
            .await?;
        if !updated.is_empty() {
            debug!("Reminder {} promoted to {}", external_id, reminder_status);
        }
        Ok(())
    }

    /// Records the patient's quick-reply decision on the reminder row.
    pub async fn record_patient_action(
        &self,
        appointment_id: Uuid,
        status: ReminderStatus,
    ) -> Result<(), ReminderError> {
        let _: Vec<ReminderRecord> = self
            .store
            .update(
                "reminder_records",
                &format!("appointment_id=eq.{}", appointment_id),
                json!({ "status": status }),
            )
            .await?;
        Ok(())
    }
}
