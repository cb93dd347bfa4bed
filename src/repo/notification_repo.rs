use crate::repo::store::NotificationStore;
use anyhow::Result;
use sqlx::{PgPool, Row};

#[derive(Clone)]
pub struct NotificationRepo {
    pub pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct NotificationSubscription {
    pub event_type: String,
    pub target_url: String,
    pub secret: Option<String>,
}

#[async_trait::async_trait]
impl NotificationStore for NotificationRepo {
    async fn list_enabled_for_event(&self, event_type: &str) -> Result<Vec<NotificationSubscription>> {
        let rows = sqlx::query(
            "SELECT event_type, target_url, secret FROM notification_subscriptions WHERE is_enabled=true AND event_type=$1",
        )
        .bind(event_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| NotificationSubscription {
                event_type: row.get("event_type"),
                target_url: row.get("target_url"),
                secret: row.get("secret"),
            })
            .collect())
    }
}
