use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::MessagingError;
use crate::models::{GatewayHealth, SendOutcome};

/// Stateless client for the hosted template-message provider.
///
/// Proactive automated sends go through pre-approved templates; free-form
/// text is only valid inside an open 24-hour conversation window.
pub struct TemplateGatewayClient {
    client: Client,
    base_url: String,
    token: String,
    sender_id: String,
}

impl TemplateGatewayClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.template_gateway_url.clone(),
            token: config.template_gateway_token.clone(),
            sender_id: config.template_gateway_sender_id.clone(),
        }
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token)).unwrap(),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn post_message(&self, body: Value) -> Result<SendOutcome, MessagingError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("Template gateway send to {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&body)
            .send()
            .await
            .map_err(|e| MessagingError::TemplateGateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Template gateway error ({}): {}", status, error_text);
            return Err(MessagingError::TemplateGateway(format!(
                "{}: {}",
                status, error_text
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| MessagingError::TemplateGateway(e.to_string()))?;

        let message_id = data
            .get("message_id")
            .or_else(|| data.get("id"))
            .and_then(|v| v.as_str())
            .map(String::from);

        Ok(SendOutcome { message_id })
    }

    pub async fn send_template(
        &self,
        to: &str,
        template_name: &str,
        variables: &[String],
        media_url: Option<&str>,
    ) -> Result<SendOutcome, MessagingError> {
        if variables.len() > 5 {
            return Err(MessagingError::TemplateGateway(format!(
                "Template {} has {} variables, provider limit is 5",
                template_name,
                variables.len()
            )));
        }

        let mut template = json!({
            "name": template_name,
            "variables": variables,
        });
        if let Some(url) = media_url {
            template["media_url"] = json!(url);
        }

        self.post_message(json!({
            "sender_id": self.sender_id,
            "to": to,
            "type": "template",
            "template": template,
        }))
        .await
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<SendOutcome, MessagingError> {
        self.post_message(json!({
            "sender_id": self.sender_id,
            "to": to,
            "type": "text",
            "text": { "body": body },
        }))
        .await
    }

    /// Provider-side health probe. Failures are reported, not propagated.
    pub async fn health(&self) -> GatewayHealth {
        let url = format!("{}/v1/status", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.get_headers())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => GatewayHealth {
                connected: true,
                error: None,
            },
            Ok(resp) => GatewayHealth {
                connected: false,
                error: Some(format!("Provider returned {}", resp.status())),
            },
            Err(e) => GatewayHealth {
                connected: false,
                error: Some(e.to_string()),
            },
        }
    }
}
