use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Store error: {0}")]
    Store(String),

    #[error(transparent)]
    Messaging(#[from] messaging_cell::MessagingError),

    #[error(transparent)]
    Reminder(#[from] reminder_cell::ReminderError),

    #[error(transparent)]
    Survey(#[from] survey_cell::SurveyError),
}

impl From<anyhow::Error> for AutomationError {
    fn from(err: anyhow::Error) -> Self {
        AutomationError::Store(err.to_string())
    }
}
