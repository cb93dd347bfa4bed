use crate::repo::store::NotificationStore;
use anyhow::Result;
use std::sync::Arc;

/// Fans an event out to every enabled subscription. Delivery is
/// fire-and-forget; a dead endpoint never blocks donation processing.
#[derive(Clone)]
pub struct NotificationDispatcher {
    pub subscriptions: Arc<dyn NotificationStore>,
    pub client: reqwest::Client,
}

impl NotificationDispatcher {
    pub async fn emit(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        let hooks = self.subscriptions.list_enabled_for_event(event_type).await?;
        for hook in hooks {
            let mut req = self
                .client
                .post(&hook.target_url)
                .header("Content-Type", "application/json")
                .header("X-Event-Type", &hook.event_type)
                .json(&payload);
            if let Some(secret) = hook.secret {
                req = req.header("X-Notify-Secret", secret);
            }
            let _ = req.send().await;
        }

        Ok(())
    }
}
