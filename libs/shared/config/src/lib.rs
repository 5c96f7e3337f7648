use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_service_key: String,
    pub template_gateway_url: String,
    pub template_gateway_token: String,
    pub template_gateway_sender_id: String,
    pub session_gateway_url: String,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("STORE_URL not set, using empty value");
                    String::new()
                }),
            store_service_key: env::var("STORE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("STORE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            template_gateway_url: env::var("TEMPLATE_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("TEMPLATE_GATEWAY_URL not set, using empty value");
                    String::new()
                }),
            template_gateway_token: env::var("TEMPLATE_GATEWAY_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("TEMPLATE_GATEWAY_TOKEN not set, using empty value");
                    String::new()
                }),
            template_gateway_sender_id: env::var("TEMPLATE_GATEWAY_SENDER_ID")
                .unwrap_or_else(|_| {
                    warn!("TEMPLATE_GATEWAY_SENDER_ID not set, using empty value");
                    String::new()
                }),
            session_gateway_url: env::var("SESSION_GATEWAY_URL")
                .unwrap_or_else(|_| {
                    warn!("SESSION_GATEWAY_URL not set, using default");
                    "ws://127.0.0.1:8765/session".to_string()
                }),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_service_key.is_empty()
    }

    pub fn is_template_gateway_configured(&self) -> bool {
        !self.template_gateway_url.is_empty()
            && !self.template_gateway_token.is_empty()
            && !self.template_gateway_sender_id.is_empty()
    }
}
