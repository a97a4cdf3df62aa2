//! Delivers composed payloads through a transport.
//!
//! Every payload is sent independently and concurrently. A failed send is
//! recorded in its [`DispatchResult`] and never stops the others. There is
//! no retry.

use std::sync::Arc;

use futures::future::join_all;

use crate::traits::{DispatchResult, NotificationPayload, Transport};

/// Outcome of one dispatch batch.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DispatchReport {
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.delivered()
    }
}

/// Sends payloads through a single transport.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn channel_name(&self) -> &str {
        self.transport.channel_name()
    }

    /// Send every payload and wait for all outcomes.
    ///
    /// Results come back in payload order.
    pub async fn dispatch(&self, payloads: Vec<NotificationPayload>) -> DispatchReport {
        if payloads.is_empty() {
            tracing::debug!(channel = self.channel_name(), "No notifications to dispatch");
            return DispatchReport::default();
        }

        let sends = payloads.iter().map(|payload| self.send_one(payload));
        let results = join_all(sends).await;
        let report = DispatchReport { results };

        tracing::info!(
            channel = self.channel_name(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Dispatch finished"
        );
        report
    }

    /// Start dispatching in the background and return immediately.
    pub fn spawn(
        self: &Arc<Self>,
        payloads: Vec<NotificationPayload>,
    ) -> tokio::task::JoinHandle<DispatchReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.dispatch(payloads).await })
    }

    async fn send_one(&self, payload: &NotificationPayload) -> DispatchResult {
        let start = std::time::Instant::now();
        let result = self.transport.send(payload).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error, response) = match result {
            Ok(response) => {
                tracing::info!(
                    channel = self.channel_name(),
                    recipient = %payload.recipient,
                    status = response.status,
                    response = %response.body,
                    duration_ms,
                    "Notification delivered"
                );
                (true, None, Some(response.body))
            }
            Err(e) => {
                tracing::warn!(
                    channel = self.channel_name(),
                    recipient = %payload.recipient,
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                (false, Some(e.to_string()), None)
            }
        };

        DispatchResult {
            channel: self.channel_name().to_string(),
            recipient: payload.recipient.clone(),
            message_id: payload.message_id.clone(),
            success,
            error,
            response,
            duration_ms,
        }
    }
}
