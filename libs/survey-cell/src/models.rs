use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Two-phase NPS response: score first, then an open comment with a
/// 4-hour reply window. One row per appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpsSurveyResponse {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_phone: String,
    pub status: SurveyStatus,
    pub score: Option<i32>,
    pub comment: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub score_received_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub comment_received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    PendingScore,
    PendingComment,
    Completed,
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurveyStatus::PendingScore => write!(f, "pending_score"),
            SurveyStatus::PendingComment => write!(f, "pending_comment"),
            SurveyStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyRunSummary {
    pub eligible: usize,
    pub sent: usize,
    pub skipped: usize,
}

impl SurveyRunSummary {
    pub fn disabled() -> Self {
        Self {
            eligible: 0,
            sent: 0,
            skipped: 0,
        }
    }
}
