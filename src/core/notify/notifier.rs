use super::templates::MessageTemplates;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Transport rejected the message with status {status}")]
    Rejected { status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// 消息发送通道
pub trait Notifier: Send + Sync {
    fn send(&self, message: &str, recipient: &str) -> Result<(), NotifyError>;
}

/// 只写日志，不真正发送
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &str, recipient: &str) -> Result<(), NotifyError> {
        info!("✉️ [{}] {}", recipient, message);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyConfig {
    /// 替换 `$NAME` 的联系人名称
    pub name: String,
    pub recipient: String,
    /// 设置后消息 POST 到该地址，否则只写日志
    pub webhook_url: Option<String>,
    pub templates: MessageTemplates,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            name: "operator".into(),
            recipient: "operator".into(),
            webhook_url: None,
            templates: MessageTemplates::default(),
        }
    }
}

/// 绑定收件人和模板的发送器，发送失败只记录日志并返回 `false`
#[derive(Clone)]
pub struct Messenger {
    notifier: Arc<dyn Notifier>,
    recipient: String,
    name: String,
    templates: MessageTemplates,
}

impl Messenger {
    pub fn new(notifier: Arc<dyn Notifier>, config: &NotifyConfig) -> Self {
        Self {
            notifier,
            recipient: config.recipient.clone(),
            name: config.name.clone(),
            templates: config.templates.clone(),
        }
    }

    pub fn templates(&self) -> &MessageTemplates {
        &self.templates
    }

    /// 替换 `template` 中的 `$NAME` 后发送
    pub fn send_template(&self, template: &str) -> bool {
        self.send_text(&MessageTemplates::render(template, &self.name))
    }

    pub fn send_text(&self, text: &str) -> bool {
        if self.recipient.is_empty() {
            warn!("⚠️ No recipient configured, dropping message: {}", text);
            return false;
        }

        match self.notifier.send(text, &self.recipient) {
            Ok(()) => true,
            Err(e) => {
                error!("❌ Failed to send message to {}: {}", self.recipient, e);
                false
            }
        }
    }
}
