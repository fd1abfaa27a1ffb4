use super::notifier::{Notifier, NotifyError};
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    message: &'a str,
    sent_at: DateTime<Utc>,
}

/// 把每条消息以 JSON POST 到负责短信发送的中继
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .user_agent(concat!("agitation_watch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        info!("🌐 WebhookNotifier: posting to {}", url);
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, message: &str, recipient: &str) -> Result<(), NotifyError> {
        let body = encode_payload(message, recipient, Utc::now())?;
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!("Webhook accepted message for {}", recipient);
        Ok(())
    }
}

fn encode_payload(message: &str, recipient: &str, sent_at: DateTime<Utc>) -> Result<String, NotifyError> {
    Ok(serde_json::to_string(&WebhookPayload {
        recipient,
        message,
        sent_at,
    })?)
}
