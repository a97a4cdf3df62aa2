//! Dry-run transport that only logs what would be sent.

use crate::traits::{MessageContent, NotificationPayload, NotifyError, Transport, TransportResponse};

#[derive(Debug, Default)]
pub struct LogTransport;

#[async_trait::async_trait]
impl Transport for LogTransport {
    async fn send(&self, payload: &NotificationPayload) -> Result<TransportResponse, NotifyError> {
        match &payload.content {
            MessageContent::Text { body } => tracing::info!(
                recipient = %payload.recipient,
                message_id = %payload.message_id,
                tenders = payload.tender_count,
                %body,
                "[dry-run] text message"
            ),
            MessageContent::Template { name, placeholders, .. } => tracing::info!(
                recipient = %payload.recipient,
                message_id = %payload.message_id,
                tenders = payload.tender_count,
                template = %name,
                placeholders = ?placeholders,
                "[dry-run] template message"
            ),
        }
        Ok(TransportResponse {
            status: 200,
            body: "dry-run".to_string(),
        })
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
