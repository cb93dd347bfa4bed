use crate::domain::donation::DonationStatus;
use crate::repo::store::DonationStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct NewDonation {
    pub donation_id: String,
    pub campaign_id: Option<Uuid>,
    pub form_id: Option<String>,
    pub donor_email: String,
    pub donor_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: String,
    pub is_recurring: bool,
    pub recurring_interval: Option<String>,
    pub anonymous: bool,
    pub donor_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DonationRecord {
    pub donation_id: String,
    pub campaign_id: Option<Uuid>,
    pub donor_email: String,
    pub donor_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
    pub poll_handle: Option<String>,
    pub status: DonationStatus,
    pub is_recurring: bool,
    pub anonymous: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DonationsRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl DonationStore for DonationsRepo {
    async fn insert_pending(&self, data: &NewDonation) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO donations (
                donation_id, campaign_id, form_id, donor_email, donor_name, amount, currency,
                gateway, status, is_recurring, recurring_interval, anonymous, donor_message
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, 'pending', $9, $10, $11, $12
            )
            ON CONFLICT (donation_id) DO NOTHING
            "#,
        )
        .bind(&data.donation_id)
        .bind(data.campaign_id)
        .bind(&data.form_id)
        .bind(&data.donor_email)
        .bind(&data.donor_name)
        .bind(data.amount)
        .bind(&data.currency)
        .bind(&data.gateway)
        .bind(data.is_recurring)
        .bind(&data.recurring_interval)
        .bind(data.anonymous)
        .bind(&data.donor_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find(&self, donation_id: &str) -> Result<Option<DonationRecord>> {
        let row = sqlx::query(
            r#"
            SELECT donation_id, campaign_id, donor_email, donor_name, amount, currency, gateway,
                   gateway_transaction_id, poll_handle, status, is_recurring, anonymous, completed_at
            FROM donations
            WHERE donation_id = $1
            "#,
        )
        .bind(donation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_row))
    }

    /// Newly issued values win over stored ones: a re-dispatch of a pending
    /// donation abandons the previous provider transaction, so the stored
    /// handle must follow the one the payer was actually given.
    async fn record_dispatch(
        &self,
        donation_id: &str,
        transaction_id: Option<&str>,
        poll_handle: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE donations
            SET gateway_transaction_id = COALESCE($2, gateway_transaction_id),
                poll_handle = COALESCE($3, poll_handle),
                gateway_response = $4,
                updated_at = now()
            WHERE donation_id = $1
            "#,
        )
        .bind(donation_id)
        .bind(transaction_id)
        .bind(poll_handle)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_if_pending(
        &self,
        donation_id: &str,
        transaction_id: Option<&str>,
        raw: &serde_json::Value,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE donations
            SET status = 'completed',
                gateway_transaction_id = COALESCE(gateway_transaction_id, $2),
                gateway_response = $3,
                completed_at = now(),
                updated_at = now()
            WHERE donation_id = $1 AND status = 'pending'
            "#,
        )
        .bind(donation_id)
        .bind(transaction_id)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_if_pending(&self, donation_id: &str, raw: &serde_json::Value) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE donations
            SET status = 'failed', gateway_response = $2, updated_at = now()
            WHERE donation_id = $1 AND status = 'pending'
            "#,
        )
        .bind(donation_id)
        .bind(raw)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn completed_totals_for_donor(
        &self,
        email: &str,
    ) -> Result<(Decimal, i64, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS cnt,
                   MIN(completed_at) AS first_at, MAX(completed_at) AS last_at
            FROM donations
            WHERE donor_email = $1 AND status = 'completed'
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("total"), row.get("cnt"), row.get("first_at"), row.get("last_at")))
    }

    async fn completed_totals_for_campaign(&self, campaign_id: Uuid) -> Result<(Decimal, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total, COUNT(*) AS cnt
            FROM donations
            WHERE campaign_id = $1 AND status = 'completed'
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("total"), row.get("cnt")))
    }
}

fn map_row(r: PgRow) -> DonationRecord {
    let status: String = r.get("status");
    DonationRecord {
        donation_id: r.get("donation_id"),
        campaign_id: r.get("campaign_id"),
        donor_email: r.get("donor_email"),
        donor_name: r.get("donor_name"),
        amount: r.get("amount"),
        currency: r.get("currency"),
        gateway: r.get("gateway"),
        gateway_transaction_id: r.get("gateway_transaction_id"),
        poll_handle: r.get("poll_handle"),
        status: DonationStatus::parse(&status),
        is_recurring: r.get("is_recurring"),
        anonymous: r.get("anonymous"),
        completed_at: r.get("completed_at"),
    }
}
