use crate::repo::donations_repo::DonationRecord;
use crate::repo::store::{CampaignStore, DonationStore, DonorStore};
use crate::service::notification_dispatcher::NotificationDispatcher;
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Applies donor and campaign aggregate deltas when a donation first reaches
/// `completed`. Callers guarantee at-most-once invocation per donation via the
/// compare-and-set on the donation row; a failure here is logged and surfaced,
/// never allowed to roll the donation back.
#[derive(Clone)]
pub struct Ledger {
    pub donations: Arc<dyn DonationStore>,
    pub donors: Arc<dyn DonorStore>,
    pub campaigns: Arc<dyn CampaignStore>,
    pub notifications: NotificationDispatcher,
}

impl Ledger {
    pub async fn on_completed(&self, donation: &DonationRecord) -> Result<()> {
        let completed_at = donation.completed_at.unwrap_or_else(Utc::now);
        self.donors
            .apply_completed(&donation.donor_email, &donation.donor_name, donation.amount, completed_at)
            .await?;

        self.notifications
            .emit(
                "donation.completed",
                json!({
                    "donation_id": donation.donation_id,
                    "campaign_id": donation.campaign_id,
                    "amount": donation.amount.to_string(),
                    "currency": donation.currency,
                    "gateway": donation.gateway,
                    "anonymous": donation.anonymous,
                }),
            )
            .await?;

        let Some(campaign_id) = donation.campaign_id else {
            return Ok(());
        };
        let Some(totals) = self.campaigns.apply_completed(campaign_id, donation.amount).await? else {
            tracing::warn!(%campaign_id, donation_id = %donation.donation_id, "completed donation references unknown campaign");
            return Ok(());
        };

        let before = totals.raised_amount - donation.amount;
        if goal_newly_reached(totals.goal_amount, before, totals.raised_amount) {
            self.notifications
                .emit(
                    "campaign.goal_reached",
                    json!({
                        "campaign_id": totals.campaign_id,
                        "title": totals.title,
                        "goal_amount": totals.goal_amount.to_string(),
                        "raised_amount": totals.raised_amount.to_string(),
                    }),
                )
                .await?;
        }

        Ok(())
    }

    /// Re-derives a donor's aggregates from completed donations; used to
    /// repair drift in the incrementally maintained counters.
    pub async fn recompute_donor(&self, email: &str) -> Result<()> {
        let (total, count, first_at, last_at) =
            self.donations.completed_totals_for_donor(email).await?;
        self.donors
            .set_aggregates(email, total, count, first_at, last_at)
            .await?;
        Ok(())
    }

    pub async fn recompute_campaign(&self, campaign_id: Uuid) -> Result<()> {
        let (total, count) = self
            .donations
            .completed_totals_for_campaign(campaign_id)
            .await?;
        self.campaigns
            .set_aggregates(campaign_id, total, count)
            .await?;
        Ok(())
    }
}

/// Goal-reached is a derived condition, evaluated on the crossing edge so the
/// signal fires exactly once.
pub fn goal_newly_reached(goal: Decimal, raised_before: Decimal, raised_after: Decimal) -> bool {
    goal > Decimal::ZERO && raised_before < goal && raised_after >= goal
}
