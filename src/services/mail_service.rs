use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;

/// The provider call must not hang the request path; a timeout is a
/// delivery failure like any other.
const SEND_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct MailError(pub String);

/// Outbound delivery of recovery codes. The lifecycle only cares about
/// success or failure; a failure makes the caller roll the stored code
/// back.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_reset_code(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailError>;
}

/// Transactional email over the provider's HTTP API.
#[derive(Clone)]
pub struct MailService {
    api_url: String,
    api_key: String,
    from: String,
    client: Client,
}

impl MailService {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            api_url: config.mail_api_url.clone(),
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
            client,
        }
    }
}

#[async_trait]
impl MailSender for MailService {
    async fn send_reset_code(
        &self,
        to: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailError> {
        let body = format!(
            "Your account recovery code is: {}. It is valid until {}.",
            code,
            expires_at.to_rfc3339()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("apiKey", &self.api_key)
            .header("Accept", "application/json")
            .form(&[
                ("from", self.from.as_str()),
                ("to", to),
                ("subject", "Your account recovery code"),
                ("text", body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MailError(format!("Mail API error: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MailError(format!(
                "Mail sending failed with status: {}",
                response.status()
            )))
        }
    }
}
