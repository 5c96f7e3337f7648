use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for SurveyError {
    fn from(err: anyhow::Error) -> Self {
        SurveyError::Store(err.to_string())
    }
}
