//! End-of-run notification.
//!
//! Delivery is best effort: a failed notification is logged by the caller
//! and never changes the outcome.

use crate::outcome::{Outcome, TerminalState};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Human-readable message for an outcome.
pub fn format_message(outcome: &Outcome) -> String {
    let headline = match outcome.state {
        TerminalState::Success => "Court Booking ✅ SUCCESS",
        _ => "Court Booking ❌ FAILED",
    };
    let mut body = outcome.message.clone();
    if outcome.state != TerminalState::Success {
        body = format!("[{}] {}", outcome.state, body);
    }
    format!("{headline}\n{body}")
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, outcome: &Outcome) -> Result<(), NotifyError>;
}

/// Writes the message to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, outcome: &Outcome) -> Result<(), NotifyError> {
        let text = format_message(outcome);
        if outcome.is_success() {
            info!("{text}");
        } else {
            warn!("{text}");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    state: &'static str,
    message: &'a str,
    resource: Option<&'a str>,
    time: Option<String>,
    text: String,
}

/// POSTs the outcome as JSON.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, outcome: &Outcome) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            state: outcome.state.as_str(),
            message: &outcome.message,
            resource: outcome.resource.as_ref().map(|r| r.as_str()),
            time: outcome.time.map(|t| t.label()),
            text: format_message(outcome),
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "webhook rejected notification");
            return Err(NotifyError::Status(status.as_u16()));
        }
        info!(state = payload.state, "notification delivered");
        Ok(())
    }
}
