use crate::domain::donation::DonationStatus;
use crate::repo::campaigns_repo::CampaignTotals;
use crate::repo::donations_repo::{DonationRecord, NewDonation};
use crate::repo::donors_repo::DonorRecord;
use crate::repo::notification_repo::NotificationSubscription;
use crate::repo::store::{CampaignStore, DonationStore, DonorStore, NotificationStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory store for tests and local development. Implements every storage
/// contract with the same conflict and compare-and-set semantics as the
/// Postgres repos.
#[derive(Default)]
pub struct MemoryStore {
    donations: Mutex<HashMap<String, DonationRecord>>,
    donors: Mutex<HashMap<String, DonorRecord>>,
    campaigns: Mutex<HashMap<Uuid, CampaignTotals>>,
    subscriptions: Mutex<Vec<NotificationSubscription>>,
}

impl MemoryStore {
    pub fn seed_campaign(&self, totals: CampaignTotals) {
        self.campaigns.lock().unwrap().insert(totals.campaign_id, totals);
    }

    pub fn seed_subscription(&self, subscription: NotificationSubscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }
}

#[async_trait::async_trait]
impl DonationStore for MemoryStore {
    async fn insert_pending(&self, data: &NewDonation) -> Result<bool> {
        let mut donations = self.donations.lock().unwrap();
        if donations.contains_key(&data.donation_id) {
            return Ok(false);
        }
        donations.insert(
            data.donation_id.clone(),
            DonationRecord {
                donation_id: data.donation_id.clone(),
                campaign_id: data.campaign_id,
                donor_email: data.donor_email.clone(),
                donor_name: data.donor_name.clone(),
                amount: data.amount,
                currency: data.currency.clone(),
                gateway: data.gateway.clone(),
                gateway_transaction_id: None,
                poll_handle: None,
                status: DonationStatus::Pending,
                is_recurring: data.is_recurring,
                anonymous: data.anonymous,
                completed_at: None,
            },
        );
        Ok(true)
    }

    async fn find(&self, donation_id: &str) -> Result<Option<DonationRecord>> {
        Ok(self.donations.lock().unwrap().get(donation_id).cloned())
    }

    async fn record_dispatch(
        &self,
        donation_id: &str,
        transaction_id: Option<&str>,
        poll_handle: Option<&str>,
        _raw: &serde_json::Value,
    ) -> Result<()> {
        let mut donations = self.donations.lock().unwrap();
        if let Some(record) = donations.get_mut(donation_id) {
            if let Some(id) = transaction_id {
                record.gateway_transaction_id = Some(id.to_string());
            }
            if let Some(handle) = poll_handle {
                record.poll_handle = Some(handle.to_string());
            }
        }
        Ok(())
    }

    async fn complete_if_pending(
        &self,
        donation_id: &str,
        transaction_id: Option<&str>,
        _raw: &serde_json::Value,
    ) -> Result<bool> {
        let mut donations = self.donations.lock().unwrap();
        match donations.get_mut(donation_id) {
            Some(record) if record.status == DonationStatus::Pending => {
                record.status = DonationStatus::Completed;
                if record.gateway_transaction_id.is_none() {
                    record.gateway_transaction_id = transaction_id.map(str::to_string);
                }
                record.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_if_pending(&self, donation_id: &str, _raw: &serde_json::Value) -> Result<bool> {
        let mut donations = self.donations.lock().unwrap();
        match donations.get_mut(donation_id) {
            Some(record) if record.status == DonationStatus::Pending => {
                record.status = DonationStatus::Failed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn completed_totals_for_donor(
        &self,
        email: &str,
    ) -> Result<(Decimal, i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let donations = self.donations.lock().unwrap();
        let mut total = Decimal::ZERO;
        let mut count = 0i64;
        let mut first_at: Option<DateTime<Utc>> = None;
        let mut last_at: Option<DateTime<Utc>> = None;
        for record in donations.values() {
            if record.donor_email == email && record.status == DonationStatus::Completed {
                total += record.amount;
                count += 1;
                first_at = match (first_at, record.completed_at) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                last_at = match (last_at, record.completed_at) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
        }
        Ok((total, count, first_at, last_at))
    }

    async fn completed_totals_for_campaign(&self, campaign_id: Uuid) -> Result<(Decimal, i64)> {
        let donations = self.donations.lock().unwrap();
        let mut total = Decimal::ZERO;
        let mut count = 0i64;
        for record in donations.values() {
            if record.campaign_id == Some(campaign_id) && record.status == DonationStatus::Completed {
                total += record.amount;
                count += 1;
            }
        }
        Ok((total, count))
    }
}

#[async_trait::async_trait]
impl DonorStore for MemoryStore {
    async fn upsert_contact(&self, email: &str, name: &str, phone: Option<&str>) -> Result<()> {
        let mut donors = self.donors.lock().unwrap();
        let record = donors.entry(email.to_string()).or_insert_with(|| DonorRecord {
            email: email.to_string(),
            name: String::new(),
            phone: None,
            total_donated: Decimal::ZERO,
            donation_count: 0,
            first_donation_at: None,
            last_donation_at: None,
        });
        record.name = name.to_string();
        if let Some(phone) = phone {
            record.phone = Some(phone.to_string());
        }
        Ok(())
    }

    async fn apply_completed(
        &self,
        email: &str,
        name: &str,
        amount: Decimal,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut donors = self.donors.lock().unwrap();
        let record = donors.entry(email.to_string()).or_insert_with(|| DonorRecord {
            email: email.to_string(),
            name: name.to_string(),
            phone: None,
            total_donated: Decimal::ZERO,
            donation_count: 0,
            first_donation_at: None,
            last_donation_at: None,
        });
        record.total_donated += amount;
        record.donation_count += 1;
        record.first_donation_at = record.first_donation_at.or(Some(completed_at));
        record.last_donation_at = Some(completed_at);
        Ok(())
    }

    async fn find(&self, email: &str) -> Result<Option<DonorRecord>> {
        Ok(self.donors.lock().unwrap().get(email).cloned())
    }

    async fn set_aggregates(
        &self,
        email: &str,
        total_donated: Decimal,
        donation_count: i64,
        first_donation_at: Option<DateTime<Utc>>,
        last_donation_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut donors = self.donors.lock().unwrap();
        if let Some(record) = donors.get_mut(email) {
            record.total_donated = total_donated;
            record.donation_count = donation_count;
            record.first_donation_at = first_donation_at;
            record.last_donation_at = last_donation_at;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CampaignStore for MemoryStore {
    async fn apply_completed(
        &self,
        campaign_id: Uuid,
        amount: Decimal,
    ) -> Result<Option<CampaignTotals>> {
        let mut campaigns = self.campaigns.lock().unwrap();
        Ok(campaigns.get_mut(&campaign_id).map(|totals| {
            totals.raised_amount += amount;
            totals.donation_count += 1;
            totals.clone()
        }))
    }

    async fn find_totals(&self, campaign_id: Uuid) -> Result<Option<CampaignTotals>> {
        Ok(self.campaigns.lock().unwrap().get(&campaign_id).cloned())
    }

    async fn set_aggregates(
        &self,
        campaign_id: Uuid,
        raised_amount: Decimal,
        donation_count: i64,
    ) -> Result<()> {
        let mut campaigns = self.campaigns.lock().unwrap();
        if let Some(totals) = campaigns.get_mut(&campaign_id) {
            totals.raised_amount = raised_amount;
            totals.donation_count = donation_count;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationStore for MemoryStore {
    async fn list_enabled_for_event(&self, event_type: &str) -> Result<Vec<NotificationSubscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.event_type == event_type)
            .cloned()
            .collect())
    }
}
