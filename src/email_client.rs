use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message as handed to the delivery provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("couldn't reach the email provider, reqwest error {0}")]
    Transport(#[from] reqwest::Error),
    #[error("the email provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a single message and returns the provider's message id.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<String, ProviderError>;
}

/// Client for the Resend `POST /emails` API.
#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    authorization_token: SecretString,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        authorization_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            authorization_token,
        })
    }
}

#[async_trait]
impl MessageSender for EmailClient {
    #[tracing::instrument(
        name = "Sending an email through the provider",
        skip(self, message),
        fields(to = ?message.to, subject = %message.subject)
    )]
    async fn send(&self, message: &OutgoingMessage) -> Result<String, ProviderError> {
        let url = format!("{}/emails", self.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.authorization_token.expose_secret())
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let SendEmailResponse { id } = response.json().await?;
        Ok(id)
    }
}

/// Logs messages instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSender;

#[async_trait]
impl MessageSender for ConsoleSender {
    async fn send(&self, message: &OutgoingMessage) -> Result<String, ProviderError> {
        let id = format!("dry-run-{}", Uuid::new_v4());
        tracing::info!(
            message_id = %id,
            from = %message.from,
            to = ?message.to,
            cc = ?message.cc,
            bcc = ?message.bcc,
            subject = %message.subject,
            html_length = message.html.len(),
            "Email not delivered, dry run"
        );
        Ok(id)
    }
}
