//! Chat webhook notifier.
//!
//! Renders undelivered items as one Markdown message and posts it to a
//! Discord-style webhook.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{FeedhookError, Result};
use crate::feed::USER_AGENT;
use crate::news::NewsItem;

/// Request timeout in seconds.
const WEBHOOK_TIMEOUT_SECS: u64 = 30;

/// Content length Discord accepts in a single message.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// JSON body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub content: String,
}

impl WebhookMessage {
    /// Build the message for a batch of items.
    pub fn from_items(items: &[NewsItem]) -> Self {
        Self {
            content: format_message(items),
        }
    }
}

/// Render one item as `- [title](<url>)`.
///
/// The angle brackets keep the chat client from expanding a link preview.
pub fn format_line(item: &NewsItem) -> String {
    format!("- [{}](<{}>)", item.title, item.url)
}

/// Render items one per line, in the given order.
pub fn format_message(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(format_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Posts batches to a single webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedhookError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Send all items as one message.
    ///
    /// Succeeds only on a 2xx response. An empty batch sends nothing.
    pub async fn notify(&self, items: &[NewsItem]) -> Result<()> {
        if items.is_empty() {
            debug!("Nothing to notify");
            return Ok(());
        }

        let message = WebhookMessage::from_items(items);
        let length = message.content.chars().count();
        if length > MAX_MESSAGE_CHARS {
            warn!(
                length,
                limit = MAX_MESSAGE_CHARS,
                count = items.len(),
                retry = "every delivery tick until accepted",
                "Webhook message exceeds the chat length limit; a rejected batch stays undelivered"
            );
        }

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| FeedhookError::delivery(format!("failed to send webhook: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedhookError::Delivery {
                status: Some(status.as_u16()),
                message: format!("webhook returned {}: {}", status, body.trim()),
            });
        }

        info!(count = items.len(), status = status.as_u16(), "Webhook delivered");
        Ok(())
    }
}
