use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{ItemEvent, Notifier, NotifyError};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs each event as JSON. Non-2xx responses count as failures.
#[derive(Clone)]
pub struct WebhookNotifier {
    endpoint: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: String) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Transport {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &ItemEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        debug!("Delivered {} for item {} to {}", event.event, event.item_id, self.endpoint);
        Ok(())
    }
}
