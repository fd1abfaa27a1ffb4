pub mod notifier;
pub mod templates;
pub mod webhook;

pub use notifier::{LogNotifier, Messenger, Notifier, NotifyConfig, NotifyError};
pub use templates::MessageTemplates;
pub use webhook::WebhookNotifier;
