use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One audit row per appointment, upserted across retries. Quick replies
/// and delivery receipts promote the status after a successful send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub status: ReminderStatus,
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: i32,
    pub external_message_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
    Read,
    Confirmed,
    Cancelled,
    Rescheduled,
}

impl ReminderStatus {
    /// Once a reminder reaches one of these, the appointment is
    /// permanently excluded from eligibility.
    pub fn is_successful_send(&self) -> bool {
        matches!(
            self,
            ReminderStatus::Sent | ReminderStatus::Delivered | ReminderStatus::Read
        )
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Sent => write!(f, "sent"),
            ReminderStatus::Failed => write!(f, "failed"),
            ReminderStatus::Delivered => write!(f, "delivered"),
            ReminderStatus::Read => write!(f, "read"),
            ReminderStatus::Confirmed => write!(f, "confirmed"),
            ReminderStatus::Cancelled => write!(f, "cancelled"),
            ReminderStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    Batch,
    Rolling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRunSummary {
    pub strategy: Option<ScanStrategy>,
    pub eligible: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ReminderRunSummary {
    pub fn disabled() -> Self {
        Self {
            strategy: None,
            eligible: 0,
            sent: 0,
            failed: 0,
            skipped: 0,
        }
    }
}
