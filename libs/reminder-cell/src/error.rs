use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for ReminderError {
    fn from(err: anyhow::Error) -> Self {
        ReminderError::Store(err.to_string())
    }
}
