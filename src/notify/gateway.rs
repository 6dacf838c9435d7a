//! Notification gateways.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::time;

use crate::config::NotificationConfig;
use crate::notify::message::{Notification, NotificationBody};

/// Errors raised while sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected message with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a message to an operator.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct GatewayMessage<'a> {
    to: &'a str,
    subject: &'a str,
    text: String,
    severity: &'static str,
    body: &'a NotificationBody,
}

/// Authenticated HTTP messaging gateway (mail relay, chat webhook).
pub struct WebhookGateway {
    client: Client,
    url: String,
    credential: Option<String>,
    timeout: Duration,
}

impl WebhookGateway {
    pub fn new(url: String, credential: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            url,
            credential,
            timeout,
        }
    }
}

#[async_trait]
impl NotificationGateway for WebhookGateway {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = GatewayMessage {
            to: &notification.recipient,
            subject: &notification.subject,
            text: notification.text(),
            severity: notification.kind.as_str(),
            body: &notification.body,
        };

        let mut request = self.client.post(&self.url).json(&message);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential);
        }

        let response = match time::timeout(self.timeout, request.send()).await {
            Ok(response) => response?,
            Err(_) => return Err(NotifyError::Timeout(self.timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(subject = %notification.subject, "Notification delivered");
        Ok(())
    }
}

/// Fallback when no gateway is configured: the message goes to the log.
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::warn!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "{}",
            notification.text()
        );
        Ok(())
    }
}

/// Pick the gateway described by the configuration.
pub fn gateway_from_config(config: &NotificationConfig) -> Arc<dyn NotificationGateway> {
    match &config.gateway_url {
        Some(url) => Arc::new(WebhookGateway::new(
            url.clone(),
            config.credential.clone(),
            Duration::from_secs(config.timeout_secs),
        )),
        None => {
            tracing::info!("No notification gateway configured; notifications will be logged");
            Arc::new(LogGateway)
        }
    }
}
