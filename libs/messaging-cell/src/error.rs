use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Template gateway error: {0}")]
    TemplateGateway(String),

    #[error("Session gateway error: {0}")]
    SessionGateway(String),

    #[error("Session gateway is not connected")]
    SessionNotConnected,

    #[error("Unsupported content for {provider}: {detail}")]
    UnsupportedContent { provider: String, detail: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<anyhow::Error> for MessagingError {
    fn from(err: anyhow::Error) -> Self {
        MessagingError::Store(err.to_string())
    }
}
