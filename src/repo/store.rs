use crate::repo::campaigns_repo::CampaignTotals;
use crate::repo::donations_repo::{DonationRecord, NewDonation};
use crate::repo::donors_repo::DonorRecord;
use crate::repo::notification_repo::NotificationSubscription;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Storage contracts the services depend on. Production binds them to the
/// Postgres repos; tests bind them to `memory::MemoryStore`.
#[async_trait::async_trait]
pub trait DonationStore: Send + Sync {
    /// Inserts a new pending donation keyed by the external donation id;
    /// returns false when the id already exists.
    async fn insert_pending(&self, data: &NewDonation) -> Result<bool>;

    async fn find(&self, donation_id: &str) -> Result<Option<DonationRecord>>;

    /// Stores the continuation data from a dispatch that stayed pending. A
    /// re-dispatch that obtains a fresh handle replaces the stored one, so
    /// status checks follow the transaction the payer actually sees.
    async fn record_dispatch(
        &self,
        donation_id: &str,
        transaction_id: Option<&str>,
        poll_handle: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<()>;

    /// Compare-and-set into `completed`. Returns true only for the caller
    /// that actually flipped the row, which gates the ledger update.
    async fn complete_if_pending(
        &self,
        donation_id: &str,
        transaction_id: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<bool>;

    async fn fail_if_pending(&self, donation_id: &str, raw: &serde_json::Value) -> Result<bool>;

    /// Source-of-truth aggregates, used to repair drift in the incrementally
    /// maintained counters.
    async fn completed_totals_for_donor(
        &self,
        email: &str,
    ) -> Result<(Decimal, i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)>;

    async fn completed_totals_for_campaign(&self, campaign_id: Uuid) -> Result<(Decimal, i64)>;
}

#[async_trait::async_trait]
pub trait DonorStore: Send + Sync {
    /// One donor row per distinct email; refreshes contact details without
    /// touching the aggregates.
    async fn upsert_contact(&self, email: &str, name: &str, phone: Option<&str>) -> Result<()>;

    async fn apply_completed(
        &self,
        email: &str,
        name: &str,
        amount: Decimal,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn find(&self, email: &str) -> Result<Option<DonorRecord>>;

    async fn set_aggregates(
        &self,
        email: &str,
        total_donated: Decimal,
        donation_count: i64,
        first_donation_at: Option<DateTime<Utc>>,
        last_donation_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

#[async_trait::async_trait]
pub trait CampaignStore: Send + Sync {
    /// Atomic raised-amount increment; returns the post-update totals so the
    /// caller can detect a goal crossing. None when the campaign is unknown.
    async fn apply_completed(&self, campaign_id: Uuid, amount: Decimal)
        -> Result<Option<CampaignTotals>>;

    async fn find_totals(&self, campaign_id: Uuid) -> Result<Option<CampaignTotals>>;

    async fn set_aggregates(
        &self,
        campaign_id: Uuid,
        raised_amount: Decimal,
        donation_count: i64,
    ) -> Result<()>;
}

#[async_trait::async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list_enabled_for_event(&self, event_type: &str) -> Result<Vec<NotificationSubscription>>;
}
