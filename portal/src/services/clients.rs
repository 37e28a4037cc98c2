use atelier_models::auth::MemberRole;
use atelier_models::billing::{Client, SubscriptionTier};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::PortalError;

/// Maps a `clients` row by hand; the tier column is stored as text and the
/// derive cannot parse it into the enum.
pub(crate) fn client_from_row(row: &PgRow) -> Result<Client, PortalError> {
    let tier: String = row.try_get("subscription_tier")?;
    let subscription_tier = SubscriptionTier::parse(&tier).ok_or_else(|| {
        PortalError::Dependency(format!("Unrecognized subscription tier in storage: {}", tier))
    })?;

    Ok(Client {
        id: row.try_get("id")?,
        subscription_tier,
        ai_calls_used: row.try_get("ai_calls_used")?,
        ai_calls_limit: row.try_get("ai_calls_limit")?,
        domains_used: row.try_get("domains_used")?,
        domain_limit: row.try_get("domain_limit")?,
        active_coupon_id: row.try_get("active_coupon_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct ClientService {
    pool: PgPool,
}

impl ClientService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the workspace a fresh signup lands in and makes the user its
    /// owner. Tier and quota columns take their schema defaults.
    pub async fn create_for_user(&self, user_id: Uuid) -> Result<Client, PortalError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO clients (id)
            VALUES ($1)
            RETURNING id, subscription_tier, ai_calls_used, ai_calls_limit,
                      domains_used, domain_limit, active_coupon_id, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .fetch_one(&mut *tx)
        .await?;
        let client = client_from_row(&row)?;

        sqlx::query("INSERT INTO client_users (client_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(client.id)
            .bind(user_id)
            .bind(MemberRole::Owner.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(client)
    }

    /// The workspace the user belongs to. Membership is enforced by the
    /// join, so handlers never need a separate access check.
    pub async fn find_for_user(&self, user_id: Uuid) -> Result<Client, PortalError> {
        let row = sqlx::query(
            r#"
            SELECT c.id, c.subscription_tier, c.ai_calls_used, c.ai_calls_limit,
                   c.domains_used, c.domain_limit, c.active_coupon_id, c.created_at, c.updated_at
            FROM clients c
            JOIN client_users cu ON cu.client_id = c.id
            WHERE cu.user_id = $1
            ORDER BY cu.created_at
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortalError::NotFound("client"))?;

        client_from_row(&row)
    }

    pub async fn find_by_id(&self, client_id: Uuid) -> Result<Client, PortalError> {
        let row = sqlx::query(
            r#"
            SELECT id, subscription_tier, ai_calls_used, ai_calls_limit,
                   domains_used, domain_limit, active_coupon_id, created_at, updated_at
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortalError::NotFound("client"))?;

        client_from_row(&row)
    }
}
