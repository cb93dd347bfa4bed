use crate::repo::store::DonorStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct DonorRecord {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub total_donated: Decimal,
    pub donation_count: i64,
    pub first_donation_at: Option<DateTime<Utc>>,
    pub last_donation_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct DonorsRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl DonorStore for DonorsRepo {
    async fn upsert_contact(&self, email: &str, name: &str, phone: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO donors (email, name, phone)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name,
                phone = COALESCE(EXCLUDED.phone, donors.phone),
                updated_at = now()
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(phone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomic aggregate increment on completion; avoids read-modify-write in
    /// application code so concurrent completions for one donor cannot lose
    /// updates.
    async fn apply_completed(
        &self,
        email: &str,
        name: &str,
        amount: Decimal,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO donors (email, name, total_donated, donation_count, first_donation_at, last_donation_at)
            VALUES ($1, $2, $3, 1, $4, $4)
            ON CONFLICT (email) DO UPDATE
            SET total_donated = donors.total_donated + EXCLUDED.total_donated,
                donation_count = donors.donation_count + 1,
                first_donation_at = COALESCE(donors.first_donation_at, EXCLUDED.first_donation_at),
                last_donation_at = EXCLUDED.last_donation_at,
                updated_at = now()
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(amount)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, email: &str) -> Result<Option<DonorRecord>> {
        let row = sqlx::query(
            r#"
            SELECT email, name, phone, total_donated, donation_count, first_donation_at, last_donation_at
            FROM donors
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DonorRecord {
            email: r.get("email"),
            name: r.get("name"),
            phone: r.get("phone"),
            total_donated: r.get("total_donated"),
            donation_count: r.get("donation_count"),
            first_donation_at: r.get("first_donation_at"),
            last_donation_at: r.get("last_donation_at"),
        }))
    }

    async fn set_aggregates(
        &self,
        email: &str,
        total_donated: Decimal,
        donation_count: i64,
        first_donation_at: Option<DateTime<Utc>>,
        last_donation_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE donors
            SET total_donated = $2, donation_count = $3,
                first_donation_at = $4, last_donation_at = $5, updated_at = now()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(total_donated)
        .bind(donation_count)
        .bind(first_donation_at)
        .bind(last_donation_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
