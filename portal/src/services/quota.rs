use atelier_models::billing::{Client, DomainRecord, DomainStatus};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::PortalError;

/// Limit value meaning "no cap" on a metered resource.
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCheck {
    Allowed,
    Exceeded,
}

fn has_capacity(used: i32, limit: i32) -> bool {
    limit == UNLIMITED || used < limit
}

pub fn check_ai_quota(client: &Client) -> QuotaCheck {
    if has_capacity(client.ai_calls_used, client.ai_calls_limit) {
        QuotaCheck::Allowed
    } else {
        QuotaCheck::Exceeded
    }
}

pub fn check_domain_quota(client: &Client) -> QuotaCheck {
    if has_capacity(client.domains_used, client.domain_limit) {
        QuotaCheck::Allowed
    } else {
        QuotaCheck::Exceeded
    }
}

/// Lowercases and strips scheme, trailing dot and trailing slash. Anything
/// with whitespace or a path left over is not a domain.
fn normalize_domain(raw: &str) -> Result<String, PortalError> {
    let mut normalized = raw.trim().to_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = normalized.strip_prefix(scheme) {
            normalized = rest.to_string();
            break;
        }
    }
    let normalized = normalized.trim_end_matches('/').trim_end_matches('.');

    if normalized.is_empty()
        || normalized.contains(char::is_whitespace)
        || normalized.contains('/')
    {
        return Err(PortalError::Validation(
            "Not a valid domain name".to_string(),
        ));
    }
    Ok(normalized.to_string())
}

fn domain_from_row(row: &PgRow) -> Result<DomainRecord, PortalError> {
    let status: String = row.try_get("status")?;
    Ok(DomainRecord {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        domain: row.try_get("domain")?,
        status: DomainStatus::parse(&status),
        created_at: row.try_get("created_at")?,
        removed_at: row.try_get("removed_at")?,
    })
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AiUsage {
    pub calls_used: i32,
    pub calls_limit: i32,
}

/// Meters the two tenant resources with hard caps: registered domains and
/// AI calls. Every consuming write is a conditional update so concurrent
/// requests cannot push a counter past its limit.
pub struct QuotaService {
    pool: PgPool,
}

impl QuotaService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claims a domain for the client. The name is normalized first; one
    /// live registration may exist per domain across all clients.
    pub async fn register_domain(
        &self,
        client_id: Uuid,
        raw_domain: &str,
    ) -> Result<DomainRecord, PortalError> {
        let domain = normalize_domain(raw_domain)?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM client_domains WHERE domain = $1 AND status = 'active')",
        )
        .bind(&domain)
        .fetch_one(&self.pool)
        .await?;
        if taken {
            return Err(PortalError::DomainAlreadyInUse);
        }

        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            UPDATE clients
            SET domains_used = domains_used + 1, updated_at = NOW()
            WHERE id = $1 AND (domain_limit = -1 OR domains_used < domain_limit)
            "#,
        )
        .bind(client_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = $1)")
                    .bind(client_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return if exists {
                Err(PortalError::QuotaExceeded { resource: "domains" })
            } else {
                Err(PortalError::NotFound("client"))
            };
        }

        // The partial unique index backstops the pre-check under races.
        let row = sqlx::query(
            r#"
            INSERT INTO client_domains (id, client_id, domain)
            VALUES ($1, $2, $3)
            RETURNING id, client_id, domain, status, created_at, removed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(&domain)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortalError::DomainAlreadyInUse
            }
            other => PortalError::Database(other),
        })?;
        let record = domain_from_row(&row)?;

        tx.commit().await?;
        Ok(record)
    }

    /// Marks the registration removed and releases the slot. The domain row
    /// stays behind for history.
    pub async fn remove_domain(&self, client_id: Uuid, domain_id: Uuid) -> Result<(), PortalError> {
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query(
            r#"
            UPDATE client_domains
            SET status = 'removed', removed_at = NOW()
            WHERE id = $1 AND client_id = $2 AND status = 'active'
            "#,
        )
        .bind(domain_id)
        .bind(client_id)
        .execute(&mut *tx)
        .await?;
        if released.rows_affected() == 0 {
            return Err(PortalError::NotFound("domain"));
        }

        sqlx::query(
            r#"
            UPDATE clients
            SET domains_used = GREATEST(domains_used - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(client_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_domains(&self, client_id: Uuid) -> Result<Vec<DomainRecord>, PortalError> {
        let rows = sqlx::query(
            r#"
            SELECT id, client_id, domain, status, created_at, removed_at
            FROM client_domains
            WHERE client_id = $1 AND status = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(domain_from_row).collect()
    }

    /// Counts one AI call after the upstream request succeeded. If a
    /// concurrent request consumed the last slot in the meantime the call
    /// has already been served, so the miss is logged and swallowed instead
    /// of failing the response.
    pub async fn commit_ai_usage(&self, client_id: Uuid) -> Result<Option<AiUsage>, PortalError> {
        let committed = sqlx::query(
            r#"
            UPDATE clients
            SET ai_calls_used = ai_calls_used + 1, updated_at = NOW()
            WHERE id = $1 AND (ai_calls_limit = -1 OR ai_calls_used < ai_calls_limit)
            RETURNING ai_calls_used, ai_calls_limit
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        match committed {
            Some(row) => Ok(Some(AiUsage {
                calls_used: row.try_get("ai_calls_used")?,
                calls_limit: row.try_get("ai_calls_limit")?,
            })),
            None => {
                tracing::warn!(
                    client_id = %client_id,
                    "AI call served but quota was exhausted concurrently; usage not counted"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn client(ai_used: i32, ai_limit: i32, dom_used: i32, dom_limit: i32) -> Client {
        Client {
            id: Uuid::new_v4(),
            subscription_tier: atelier_models::billing::SubscriptionTier::Starter,
            ai_calls_used: ai_used,
            ai_calls_limit: ai_limit,
            domains_used: dom_used,
            domain_limit: dom_limit,
            active_coupon_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unlimited_limit_always_allows() {
        assert_eq!(check_ai_quota(&client(1_000_000, UNLIMITED, 0, 5)), QuotaCheck::Allowed);
        assert_eq!(check_domain_quota(&client(0, 100, 999, UNLIMITED)), QuotaCheck::Allowed);
    }

    #[test]
    fn capacity_runs_out_at_the_limit() {
        assert_eq!(check_ai_quota(&client(99, 100, 0, 5)), QuotaCheck::Allowed);
        assert_eq!(check_ai_quota(&client(100, 100, 0, 5)), QuotaCheck::Exceeded);
        assert_eq!(check_ai_quota(&client(101, 100, 0, 5)), QuotaCheck::Exceeded);
        assert_eq!(check_domain_quota(&client(0, 100, 5, 5)), QuotaCheck::Exceeded);
        assert_eq!(check_domain_quota(&client(0, 100, 0, 0)), QuotaCheck::Exceeded);
    }

    #[test]
    fn domains_are_normalized_before_use() {
        assert_eq!(normalize_domain("Example.COM").unwrap(), "example.com");
        assert_eq!(normalize_domain("  studio.example.com.  ").unwrap(), "studio.example.com");
        assert_eq!(normalize_domain("https://Example.com/").unwrap(), "example.com");
        assert_eq!(normalize_domain("http://example.com").unwrap(), "example.com");
    }

    #[test]
    fn junk_domains_are_rejected() {
        assert!(normalize_domain("   ").is_err());
        assert!(normalize_domain(".").is_err());
        assert!(normalize_domain("bad domain.com").is_err());
        assert!(normalize_domain("https://example.com/path").is_err());
    }
}
