use crate::repo::store::CampaignStore;
use anyhow::Result;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CampaignTotals {
    pub campaign_id: Uuid,
    pub title: String,
    pub goal_amount: Decimal,
    pub raised_amount: Decimal,
    pub donation_count: i64,
}

#[derive(Clone)]
pub struct CampaignsRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl CampaignStore for CampaignsRepo {
    async fn apply_completed(
        &self,
        campaign_id: Uuid,
        amount: Decimal,
    ) -> Result<Option<CampaignTotals>> {
        let row = sqlx::query(
            r#"
            UPDATE campaigns
            SET raised_amount = raised_amount + $2,
                donation_count = donation_count + 1,
                updated_at = now()
            WHERE id = $1
            RETURNING id, title, goal_amount, raised_amount, donation_count
            "#,
        )
        .bind(campaign_id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_totals))
    }

    async fn find_totals(&self, campaign_id: Uuid) -> Result<Option<CampaignTotals>> {
        let row = sqlx::query(
            "SELECT id, title, goal_amount, raised_amount, donation_count FROM campaigns WHERE id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_totals))
    }

    async fn set_aggregates(
        &self,
        campaign_id: Uuid,
        raised_amount: Decimal,
        donation_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET raised_amount = $2, donation_count = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(raised_amount)
        .bind(donation_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn map_totals(r: sqlx::postgres::PgRow) -> CampaignTotals {
    CampaignTotals {
        campaign_id: r.get("id"),
        title: r.get("title"),
        goal_amount: r.get("goal_amount"),
        raised_amount: r.get("raised_amount"),
        donation_count: r.get("donation_count"),
    }
}
