use std::sync::Arc;

use reqwest::Client;
use serde_json::json;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::MailerConfig;
use crate::models::notification::EmailMessage;

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<()>;
}

/// Posts emails as JSON to a relay endpoint. The body is signed with
/// HMAC-SHA256 and the hex digest sent in `X-Signature`.
#[derive(Clone)]
pub struct WebhookMailer {
    client: Client,
    url: String,
    secret: String,
    from_address: String,
}

impl WebhookMailer {
    pub fn new(url: String, secret: String, from_address: String) -> Self {
        Self {
            client: Client::new(),
            url,
            secret,
            from_address,
        }
    }

    pub fn sign(&self, payload: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| anyhow!("Invalid webhook secret: {}", e))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn payload(&self, email: &EmailMessage) -> Result<Vec<u8>> {
        let body = json!({
            "from": self.from_address,
            "to": email.to,
            "subject": email.subject,
            "body": email.body,
        });
        Ok(serde_json::to_vec(&body)?)
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, email: &EmailMessage) -> Result<()> {
        let payload = self.payload(email)?;
        let signature = self.sign(&payload)?;

        let response = self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Signature", signature)
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mail relay rejected email ({}): {}", status, error_text));
        }

        log::info!("Sent email \"{}\" to {}", email.subject, email.to);
        Ok(())
    }
}

/// Used when no relay is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &EmailMessage) -> Result<()> {
        log::info!("Email to {} (not sent, no relay configured): {}", email.to, email.subject);
        log::debug!("Email body: {}", email.body);
        Ok(())
    }
}

pub fn from_config(config: &MailerConfig) -> Arc<dyn Mailer> {
    match &config.webhook_url {
        Some(url) => Arc::new(WebhookMailer::new(
            url.clone(),
            config.webhook_secret.clone(),
            config.from_address.clone(),
        )),
        None => {
            log::warn!("MAIL_WEBHOOK_URL not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    }
}
