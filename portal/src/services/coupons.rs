use atelier_models::billing::{
    Coupon, CouponStatus, CouponStatusView, CouponUsage, CouponView, Discount,
};
use chrono::{DateTime, Months, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::PortalError;
use crate::services::clients::client_from_row;
use crate::services::pricing::tier_price;

fn coupon_from_row(row: &PgRow) -> Result<Coupon, PortalError> {
    let discount_type: String = row.try_get("discount_type")?;
    let discount_amount: i64 = row.try_get("discount_amount")?;
    let status: String = row.try_get("status")?;

    Ok(Coupon {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        description: row.try_get("description")?,
        discount: Discount::from_columns(&discount_type, discount_amount),
        duration_months: row.try_get("duration_months")?,
        max_uses: row.try_get("max_uses")?,
        status: CouponStatus::parse(&status),
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn usage_from_row(row: &PgRow) -> Result<CouponUsage, PortalError> {
    let status: String = row.try_get("status")?;
    Ok(CouponUsage {
        id: row.try_get("id")?,
        coupon_id: row.try_get("coupon_id")?,
        client_id: row.try_get("client_id")?,
        discount_applied_cents: row.try_get("discount_applied_cents")?,
        months_remaining: row.try_get("months_remaining")?,
        expires_at: row.try_get("expires_at")?,
        status: CouponStatus::parse(&status),
        redeemed_at: row.try_get("redeemed_at")?,
    })
}

/// Smallest number of whole months that reaches `expires_at` from `now`, so
/// a usage redeemed for 3 months reads as 3 until the first month has fully
/// passed. Zero once expired.
fn months_until(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> i32 {
    let mut months: u32 = 0;
    while now + Months::new(months) < expires_at {
        months += 1;
        if months > 120 {
            break;
        }
    }
    months as i32
}

/// A client's live redemption joined with the coupon it came from.
pub(crate) struct ActiveCoupon {
    pub usage: CouponUsage,
    pub code: String,
    pub description: Option<String>,
}

/// Coupon lifecycle: marketing-page validation, one-shot redemption against
/// a client, and the client's current discount. Coupons themselves are
/// provisioned by agency staff, not through the portal API.
pub struct CouponService {
    pool: PgPool,
}

impl CouponService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_code(&self, code: &str) -> Result<Option<Coupon>, PortalError> {
        let row = sqlx::query(
            r#"
            SELECT id, code, description, discount_type, discount_amount,
                   duration_months, max_uses, status, expires_at, created_at
            FROM coupons
            WHERE code = $1
            "#,
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(coupon_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Unknown and expired codes both come back as `CouponInvalid`. A coupon
    /// past its deadline is flipped to expired here rather than by a
    /// background job.
    async fn fetch_usable(&self, code: &str) -> Result<Coupon, PortalError> {
        let coupon = self
            .fetch_by_code(code)
            .await?
            .ok_or(PortalError::CouponInvalid)?;

        match coupon.status {
            CouponStatus::Expired => Err(PortalError::CouponInvalid),
            CouponStatus::Active => {
                if let Some(expires_at) = coupon.expires_at {
                    if expires_at <= Utc::now() {
                        sqlx::query("UPDATE coupons SET status = 'expired' WHERE id = $1")
                            .bind(coupon.id)
                            .execute(&self.pool)
                            .await?;
                        return Err(PortalError::CouponInvalid);
                    }
                }
                Ok(coupon)
            }
        }
    }

    pub async fn validate(&self, code: &str) -> Result<CouponView, PortalError> {
        let coupon = self.fetch_usable(code).await?;

        let uses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coupon_usage WHERE coupon_id = $1")
            .bind(coupon.id)
            .fetch_one(&self.pool)
            .await?;
        if uses >= coupon.max_uses as i64 {
            return Err(PortalError::CouponExhausted);
        }

        Ok(CouponView {
            code: coupon.code,
            description: coupon.description,
            discount: coupon.discount,
            duration_months: coupon.duration_months,
        })
    }

    /// Applies the coupon to the client. The discount is resolved against
    /// the client's current monthly price and frozen on the usage row; later
    /// tier changes do not reprice it.
    pub async fn redeem(&self, client_id: Uuid, code: &str) -> Result<CouponStatusView, PortalError> {
        let coupon = self.fetch_usable(code).await?;

        let already: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM coupon_usage WHERE coupon_id = $1 AND client_id = $2)",
        )
        .bind(coupon.id)
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;
        if already {
            return Err(PortalError::CouponAlreadyRedeemed);
        }

        // One live discount per client; the old one must lapse first.
        if self.active_usage(client_id).await?.is_some() {
            return Err(PortalError::CouponConflict);
        }

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
        let client = client_from_row(&row)?;

        let base = tier_price(client.subscription_tier);
        let discount_applied = coupon.discount.applied_to(base).min(base);
        let expires_at = Utc::now() + Months::new(coupon.duration_months.max(0) as u32);

        let mut tx = self.pool.begin().await?;

        // The count guard keeps a sold-out coupon from going over max_uses;
        // the (coupon_id, client_id) unique key backstops double submits.
        let inserted = sqlx::query(
            r#"
            INSERT INTO coupon_usage
                (id, coupon_id, client_id, discount_applied_cents, months_remaining, expires_at)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE (SELECT COUNT(*) FROM coupon_usage WHERE coupon_id = $2) < $7
            RETURNING id, coupon_id, client_id, discount_applied_cents,
                      months_remaining, expires_at, status, redeemed_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(coupon.id)
        .bind(client_id)
        .bind(discount_applied)
        .bind(coupon.duration_months)
        .bind(expires_at)
        .bind(coupon.max_uses as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortalError::CouponAlreadyRedeemed
            }
            other => PortalError::Database(other),
        })?
        .ok_or(PortalError::CouponExhausted)?;
        let usage = usage_from_row(&inserted)?;

        // The pointer names the redemption, not the coupon; two clients on
        // the same code each point at their own usage row.
        sqlx::query("UPDATE clients SET active_coupon_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(usage.id)
            .bind(client_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CouponStatusView {
            code: coupon.code,
            description: coupon.description,
            discount_applied_cents: usage.discount_applied_cents,
            months_remaining: usage.months_remaining,
            expires_at: usage.expires_at,
        })
    }

    /// `None` when the client has no live discount; expired usages are
    /// settled on the way through.
    pub async fn current_status(
        &self,
        client_id: Uuid,
    ) -> Result<Option<CouponStatusView>, PortalError> {
        let active = match self.active_usage(client_id).await? {
            Some(active) => active,
            None => return Ok(None),
        };

        Ok(Some(CouponStatusView {
            code: active.code,
            description: active.description,
            discount_applied_cents: active.usage.discount_applied_cents,
            months_remaining: active.usage.months_remaining,
            expires_at: active.usage.expires_at,
        }))
    }

    /// The client's live redemption, if any. Expiry and the months-remaining
    /// countdown are settled lazily on read.
    pub(crate) async fn active_usage(&self, client_id: Uuid) -> Result<Option<ActiveCoupon>, PortalError> {
        let row = sqlx::query(
            r#"
            SELECT cu.id, cu.coupon_id, cu.client_id, cu.discount_applied_cents,
                   cu.months_remaining, cu.expires_at, cu.status, cu.redeemed_at,
                   c.code, c.description
            FROM coupon_usage cu
            JOIN coupons c ON c.id = cu.coupon_id
            WHERE cu.client_id = $1 AND cu.status = 'active'
            ORDER BY cu.redeemed_at DESC
            LIMIT 1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut usage = usage_from_row(&row)?;
        let code: String = row.try_get("code")?;
        let description: Option<String> = row.try_get("description")?;

        let now = Utc::now();
        if usage.expires_at <= now {
            sqlx::query("UPDATE coupon_usage SET status = 'expired', months_remaining = 0 WHERE id = $1")
                .bind(usage.id)
                .execute(&self.pool)
                .await?;
            sqlx::query(
                "UPDATE clients SET active_coupon_id = NULL, updated_at = NOW() WHERE id = $1 AND active_coupon_id = $2",
            )
            .bind(client_id)
            .bind(usage.id)
            .execute(&self.pool)
            .await?;
            return Ok(None);
        }

        let remaining = months_until(now, usage.expires_at);
        if remaining != usage.months_remaining {
            sqlx::query("UPDATE coupon_usage SET months_remaining = $1 WHERE id = $2")
                .bind(remaining)
                .bind(usage.id)
                .execute(&self.pool)
                .await?;
            usage.months_remaining = remaining;
        }

        Ok(Some(ActiveCoupon {
            usage,
            code,
            description,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_redemption_counts_full_duration() {
        let now = Utc::now();
        assert_eq!(months_until(now, now + Months::new(3)), 3);
    }

    #[test]
    fn months_remaining_steps_down_as_months_pass() {
        let now = Utc::now();
        let expires = now + Months::new(3);
        // A month and a day in, two whole months are left on the clock.
        let later = now + Months::new(1) + chrono::Duration::days(1);
        assert_eq!(months_until(later, expires), 2);
        let final_day = expires - chrono::Duration::days(1);
        assert_eq!(months_until(final_day, expires), 1);
    }

    #[test]
    fn expired_usage_counts_zero_months() {
        let now = Utc::now();
        assert_eq!(months_until(now, now), 0);
        assert_eq!(months_until(now, now - chrono::Duration::days(10)), 0);
    }
}
