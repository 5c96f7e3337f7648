use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use messaging_cell::services::routing::MessagingRouter;
use messaging_cell::{Channel, MessageOrigin, OutboundContent, SendRequest};
use shared_database::{SettingsReader, StoreClient};
use shared_models::{Appointment, Patient};
use shared_utils::phone;
use shared_utils::Clock;

use crate::error::SurveyError;
use crate::models::{NpsSurveyResponse, SurveyRunSummary, SurveyStatus};

const SURVEY_TEMPLATE: &str = "encuesta_nps";
const COMMENT_WINDOW_HOURS: i64 = 4;

const FOLLOW_UP_PROMPT: &str =
    "¡Gracias por tu respuesta! ¿Querés contarnos un poco más sobre tu experiencia?";
const CLOSING_MESSAGE: &str = "¡Muchas gracias por tu tiempo! Tu opinión nos ayuda a mejorar.";

/// Case-insensitive substring mapping of the 3-point reply buttons.
pub fn map_score(text: &str) -> Option<i32> {
    let normalized = text.to_lowercase();
    if normalized.contains("excelente") {
        Some(5)
    } else if normalized.contains("regular") {
        Some(3)
    } else if normalized.contains("mala") {
        Some(1)
    } else {
        None
    }
}

/// Appointments that finished between three and two hours ago.
pub fn survey_window_query(now: DateTime<Utc>) -> String {
    let start = now - Duration::hours(3);
    let end = now - Duration::hours(2);
    format!(
        "ends_at=gt.{}&ends_at=lte.{}&status=eq.completed",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

#[derive(Debug, Deserialize)]
struct ResponseKey {
    appointment_id: Uuid,
}

/// NPS campaign: batch prompt trigger plus the two-phase inbound state
/// machine.
pub struct SurveyService {
    store: Arc<StoreClient>,
    settings: SettingsReader,
    router: Arc<MessagingRouter>,
    clock: Arc<dyn Clock>,
}

impl SurveyService {
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

    /// One survey batch. Creates the response row before prompting so a
    /// second run never double-surveys the same appointment.
    pub async fn trigger_survey_batch(&self) -> Result<SurveyRunSummary, SurveyError> {
        let settings = self.settings.load().await?;
        if !settings.nps_active() {
            info!("NPS campaign disabled, skipping run");
            return Ok(SurveyRunSummary::disabled());
        }

        let now = self.clock.now_utc();
        let candidates: Vec<Appointment> = self
            .store
            .select("appointments", &survey_window_query(now))
            .await?;
        let eligible = self.filter_unsurveyed(candidates).await?;
        info!("NPS scan: {} eligible appointments", eligible.len());

        let mut summary = SurveyRunSummary {
            eligible: eligible.len(),
            sent: 0,
            skipped: 0,
        };

        for appointment in &eligible {
            let patient: Option<Patient> = self
                .store
                .select_one("patients", &format!("id=eq.{}", appointment.patient_id))
                .await?;
            let Some(patient) = patient else {
                warn!(
                    "Appointment {} references missing patient {}, skipping survey",
                    appointment.id, appointment.patient_id
                );
                summary.skipped += 1;
                continue;
            };
            let Some(to) = patient.phone.clone().filter(|p| !p.is_empty()) else {
                warn!("Patient {} has no phone, skipping survey", patient.id);
                summary.skipped += 1;
                continue;
            };

            let _: NpsSurveyResponse = self
                .store
                .insert_returning(
                    "nps_survey_responses",
                    json!({
                        "appointment_id": appointment.id,
                        "patient_phone": to,
                        "status": SurveyStatus::PendingScore,
                        "sent_at": now,
                    }),
                )
                .await?;

            let request = SendRequest {
                patient_id: patient.id,
                to,
                channel: Channel::Whatsapp,
                content: OutboundContent::Template {
                    name: SURVEY_TEMPLATE.to_string(),
                    variables: vec![patient.first_name.clone()],
                    media_url: None,
                },
                origin: MessageOrigin::Automated,
                provider_override: None,
            };
            match self.router.send(request).await {
                Ok(_) => summary.sent += 1,
                Err(e) => {
                    error!(
                        "Survey prompt failed for appointment {}: {}",
                        appointment.id, e
                    );
                    summary.skipped += 1;
                }
            }
        }

        info!(
            "NPS run done: {} sent, {} skipped",
            summary.sent, summary.skipped
        );
        Ok(summary)
    }

    async fn filter_unsurveyed(
        &self,
        candidates: Vec<Appointment>,
    ) -> Result<Vec<Appointment>, SurveyError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids = candidates
            .iter()
            .map(|a| a.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let surveyed: Vec<ResponseKey> = self
            .store
            .select(
                "nps_survey_responses",
                &format!("appointment_id=in.({})&select=appointment_id", ids),
            )
            .await?;
        let surveyed: HashSet<Uuid> = surveyed.into_iter().map(|r| r.appointment_id).collect();

        Ok(candidates
            .into_iter()
            .filter(|a| !surveyed.contains(&a.id))
            .collect())
    }

    /// Routes an inbound text through the survey state machine. Returns
    /// true when the message was consumed by the survey; false lets the
    /// rest of the inbound chain handle it.
    pub async fn handle_inbound(
        &self,
        sender_phone: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SurveyError> {
        let active: Vec<NpsSurveyResponse> = self
            .store
            .select(
                "nps_survey_responses",
                "status=in.(pending_score,pending_comment)&order=sent_at.desc",
            )
            .await?;
        let Some(response) = active
            .into_iter()
            .find(|r| phone::same_line(&r.patient_phone, sender_phone))
        else {
            return Ok(false);
        };

        match response.status {
            SurveyStatus::PendingScore => {
                let Some(score) = map_score(text) else {
                    // Unrecognized input is left for the rest of the chain.
                    debug!(
                        "Survey {} got unrecognized score reply, not claiming",
                        response.id
                    );
                    return Ok(false);
                };

                let _: Vec<NpsSurveyResponse> = self
                    .store
                    .update(
                        "nps_survey_responses",
                        &format!("id=eq.{}", response.id),
                        json!({
                            "score": score,
                            "score_received_at": now,
                            "expires_at": now + Duration::hours(COMMENT_WINDOW_HOURS),
                            "status": SurveyStatus::PendingComment,
                        }),
                    )
                    .await?;

                self.send_text(&response, FOLLOW_UP_PROMPT).await;
                Ok(true)
            }
            SurveyStatus::PendingComment => {
                if let Some(expires_at) = response.expires_at {
                    if now > expires_at {
                        debug!("Survey {} comment window expired, not claiming", response.id);
                        return Ok(false);
                    }
                }

                let _: Vec<NpsSurveyResponse> = self
                    .store
                    .update(
                        "nps_survey_responses",
                        &format!("id=eq.{}", response.id),
                        json!({
                            "comment": text,
                            "comment_received_at": now,
                            "status": SurveyStatus::Completed,
                        }),
                    )
                    .await?;

                self.send_text(&response, CLOSING_MESSAGE).await;
                Ok(true)
            }
            SurveyStatus::Completed => Ok(false),
        }
    }

    /// Free-form follow-up; the patient just replied so the conversation
    /// window is open. Failures are logged, the claim stands either way.
    async fn send_text(&self, response: &NpsSurveyResponse, body: &str) {
        let appointment: Result<Option<Appointment>, _> = self
            .store
            .select_one(
                "appointments",
                &format!("id=eq.{}", response.appointment_id),
            )
            .await;
        let patient_id = match appointment {
            Ok(Some(appointment)) => appointment.patient_id,
            Ok(None) => {
                warn!(
                    "Survey {} references missing appointment {}",
                    response.id, response.appointment_id
                );
                return;
            }
            Err(e) => {
                warn!("Could not resolve survey appointment: {}", e);
                return;
            }
        };

        let request = SendRequest {
            patient_id,
            to: response.patient_phone.clone(),
            channel: Channel::Whatsapp,
            content: OutboundContent::Text {
                body: body.to_string(),
            },
            origin: MessageOrigin::Automated,
            provider_override: None,
        };
        if let Err(e) = self.router.send(request).await {
            error!("Survey follow-up send failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn maps_the_three_point_scale() {
        assert_eq!(map_score("mala"), Some(1));
        assert_eq!(map_score("regular"), Some(3));
        assert_eq!(map_score("excelente"), Some(5));
    }

    #[test]
    fn mapping_is_case_insensitive_substring() {
        assert_eq!(map_score("Excelente!!"), Some(5));
        assert_eq!(map_score("fue MALA la verdad"), Some(1));
        assert_eq!(map_score("todo regular nomás"), Some(3));
    }

    #[test]
    fn unrecognized_replies_do_not_map() {
        assert_eq!(map_score("buenísima"), None);
        assert_eq!(map_score("5"), None);
        assert_eq!(map_score(""), None);
    }

    #[test]
    fn window_query_covers_two_to_three_hours_back() {
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap();
        let query = survey_window_query(now);

        assert!(query.contains("ends_at=gt.2024-05-14T09:00:00Z"));
        assert!(query.contains("ends_at=lte.2024-05-14T10:00:00Z"));
        assert!(query.contains("status=eq.completed"));
    }

    #[test]
    fn consecutive_runs_overlap_until_the_window_moves_past() {
        // Appointment ends 10:00. Runs at 12:05 and 12:35 both cover it,
        // the 13:05 run no longer does.
        let at_1205 = survey_window_query(Utc.with_ymd_and_hms(2024, 5, 14, 12, 5, 0).unwrap());
        let at_1235 = survey_window_query(Utc.with_ymd_and_hms(2024, 5, 14, 12, 35, 0).unwrap());
        let at_1305 = survey_window_query(Utc.with_ymd_and_hms(2024, 5, 14, 13, 5, 0).unwrap());

        assert!(at_1205.contains("ends_at=gt.2024-05-14T09:05:00Z"));
        assert!(at_1205.contains("ends_at=lte.2024-05-14T10:05:00Z"));
        assert!(at_1235.contains("ends_at=gt.2024-05-14T09:35:00Z"));
        assert!(at_1235.contains("ends_at=lte.2024-05-14T10:35:00Z"));
        assert!(at_1305.contains("ends_at=gt.2024-05-14T10:05:00Z"));
    }
}
