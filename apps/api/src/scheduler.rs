use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info};

use reminder_cell::ReminderService;
use survey_cell::SurveyService;

const REMINDER_INTERVAL: Duration = Duration::from_secs(60 * 60);
const SURVEY_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Spawns the periodic campaign loops. Each run is independent; a
/// failed run logs and waits for the next tick.
pub fn spawn_campaign_loops(reminders: Arc<ReminderService>, surveys: Arc<SurveyService>) {
    tokio::spawn(async move {
        let mut ticker = interval(REMINDER_INTERVAL);

        loop {
            ticker.tick().await;
            match reminders.process_reminders().await {
                Ok(summary) => info!(
                    "Reminder run finished: {} eligible, {} sent, {} failed, {} skipped",
                    summary.eligible, summary.sent, summary.failed, summary.skipped
                ),
                Err(e) => error!("Reminder run failed: {}", e),
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = interval(SURVEY_INTERVAL);

        loop {
            ticker.tick().await;
            match surveys.trigger_survey_batch().await {
                Ok(summary) => info!(
                    "Survey run finished: {} eligible, {} sent, {} skipped",
                    summary.eligible, summary.sent, summary.skipped
                ),
                Err(e) => error!("Survey run failed: {}", e),
            }
        }
    });
}
