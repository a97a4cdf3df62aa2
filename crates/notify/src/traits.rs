//! Transport trait definition and shared notification types.

/// Errors that can occur while composing or delivering notifications.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recipient {recipient} refers to user row {user_id}, which does not exist")]
    UnknownUser { recipient: String, user_id: usize },
}

/// Message body in one of the two supported shapes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Fully rendered human-readable text.
    Text { body: String },
    /// Ordered values for a template registered with the provider.
    Template {
        name: String,
        language: String,
        placeholders: Vec<String>,
    },
}

/// One outbound message, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NotificationPayload {
    /// Contact key of the user (the destination number).
    pub recipient: String,
    pub sender: String,
    pub message_id: String,
    pub content: MessageContent,
    pub callback_data: String,
    pub notify_url: String,
    /// Number of tenders carried by this message.
    pub tender_count: usize,
}

/// What the provider answered for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Trait for outbound message channels.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one payload. Failures are returned, never panicked.
    async fn send(&self, payload: &NotificationPayload) -> Result<TransportResponse, NotifyError>;

    /// Human-readable name for this channel (e.g., "infobip", "log").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching a single payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchResult {
    pub channel: String,
    pub recipient: String,
    pub message_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub response: Option<String>,
    pub duration_ms: u64,
}
