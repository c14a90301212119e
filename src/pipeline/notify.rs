use reqwest::blocking::Client;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

static MISSING_WEBHOOK_LOGGED: Once = Once::new();

/// Fire-and-forget webhook observer. The return value reports delivery but
/// must never steer pipeline control flow.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self { webhook_url }
    }

    pub fn send(&self, message: &str) -> bool {
        let Some(url) = self.webhook_url.as_deref() else {
            MISSING_WEBHOOK_LOGGED.call_once(|| {
                debug!("webhook url not configured, notifications disabled");
            });
            return false;
        };
        if message.is_empty() {
            return false;
        }

        let client = match Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                warn!("failed to build webhook client: {err}");
                return false;
            }
        };

        let payload = serde_json::json!({ "text": message });
        match client.post(url).json(&payload).send() {
            Ok(response) if response.status().is_success() => {
                debug!(message, "notification delivered");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "webhook rejected notification");
                false
            }
            Err(err) => {
                warn!("failed to send notification: {err}");
                false
            }
        }
    }
}
