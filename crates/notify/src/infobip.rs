//! Infobip WhatsApp transport.
//!
//! Posts one JSON request per payload to the configured Infobip endpoint.
//! Text content uses the plain message body; template content uses the
//! `messages[]` envelope Infobip expects for registered WhatsApp templates.

use serde_json::{json, Value};
use tender_core::config::InfobipConfig;

use crate::traits::{MessageContent, NotificationPayload, NotifyError, Transport, TransportResponse};

/// Delivers payloads to the Infobip HTTP API.
#[derive(Debug)]
pub struct InfobipTransport {
    /// Full endpoint URL.
    url: String,
    /// Sent verbatim as the `Authorization` header (e.g. `App <key>`).
    api_key: String,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl InfobipTransport {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, NotifyError> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|e| NotifyError::Config(format!("invalid Infobip URL {url:?}: {e}")))?;
        Ok(Self {
            url,
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        })
    }

    /// Build from config. Base URL and API key are required.
    pub fn from_config(config: &InfobipConfig) -> Result<Self, NotifyError> {
        let url = config
            .base_url
            .clone()
            .ok_or_else(|| NotifyError::Config("INFOBIP_BASE_URL is not set".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| NotifyError::Config("INFOBIP_API_KEY is not set".to_string()))?;
        if config.sender.is_none() {
            tracing::warn!("INFOBIP_REGISTERED_PHONE is not set; messages will carry an empty sender");
        }
        Self::new(url, api_key)
    }
}

/// Request body for one payload.
pub fn request_body(payload: &NotificationPayload) -> Value {
    match &payload.content {
        MessageContent::Text { body } => json!({
            "from": payload.sender,
            "to": payload.recipient,
            "messageId": payload.message_id,
            "content": {
                "text": body,
                "whatsapp": {
                    "text": body,
                    "url": { "clickable": true },
                },
            },
            "callbackData": payload.callback_data,
            "notifyUrl": payload.notify_url,
        }),
        MessageContent::Template { name, language, placeholders } => json!({
            "messages": [{
                "from": payload.sender,
                "to": payload.recipient,
                "messageId": payload.message_id,
                "content": {
                    "templateName": name,
                    "templateData": {
                        "body": { "placeholders": placeholders },
                    },
                    "language": language,
                },
                "callbackData": payload.callback_data,
                "notifyUrl": payload.notify_url,
            }],
        }),
    }
}

#[async_trait::async_trait]
impl Transport for InfobipTransport {
    async fn send(&self, payload: &NotificationPayload) -> Result<TransportResponse, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, self.api_key.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request_body(payload))
            .send()
            .await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            url = %self.url,
            recipient = %payload.recipient,
            %status,
            "Infobip accepted message"
        );
        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }

    fn channel_name(&self) -> &str {
        "infobip"
    }
}
