use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Starter,
    Growth,
    Scale,
    Premier,
    Elite,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Growth => "growth",
            SubscriptionTier::Scale => "scale",
            SubscriptionTier::Premier => "premier",
            SubscriptionTier::Elite => "elite",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "starter" => Some(SubscriptionTier::Starter),
            "growth" => Some(SubscriptionTier::Growth),
            "scale" => Some(SubscriptionTier::Scale),
            "premier" => Some(SubscriptionTier::Premier),
            "elite" => Some(SubscriptionTier::Elite),
            "enterprise" => Some(SubscriptionTier::Enterprise),
            _ => None,
        }
    }
}

/// Coupon discount, tagged by kind. Percentage amounts are whole points
/// (10 means 10%) and are only resolved to cents against a concrete base
/// price, never stored pre-resolved on the coupon itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "amount", rename_all = "snake_case")]
pub enum Discount {
    FixedCents(i64),
    Percentage(i64),
}

impl Discount {
    /// Cents taken off the given monthly base price, rounding half up.
    pub fn applied_to(&self, base_cents: i64) -> i64 {
        match self {
            Discount::FixedCents(cents) => *cents,
            Discount::Percentage(points) => (base_cents * points + 50) / 100,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Discount::FixedCents(_) => "fixed_cents",
            Discount::Percentage(_) => "percentage",
        }
    }

    pub fn amount(&self) -> i64 {
        match self {
            Discount::FixedCents(cents) => *cents,
            Discount::Percentage(points) => *points,
        }
    }

    pub fn from_columns(type_name: &str, amount: i64) -> Self {
        match type_name {
            "percentage" => Discount::Percentage(amount),
            _ => Discount::FixedCents(amount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Active,
    Expired,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Active => "active",
            CouponStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "active" => CouponStatus::Active,
            _ => CouponStatus::Expired,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub subscription_tier: SubscriptionTier,
    pub ai_calls_used: i32,
    pub ai_calls_limit: i32,
    pub domains_used: i32,
    pub domain_limit: i32,
    pub active_coupon_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
    pub discount: Discount,
    pub duration_months: i32,
    pub max_uses: i32,
    pub status: CouponStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponUsage {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub client_id: Uuid,
    pub discount_applied_cents: i64,
    pub months_remaining: i32,
    pub expires_at: DateTime<Utc>,
    pub status: CouponStatus,
    pub redeemed_at: DateTime<Utc>,
}

/// What the marketing pricing page sees when it checks a code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponView {
    pub code: String,
    pub description: Option<String>,
    pub discount: Discount,
    pub duration_months: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponStatusView {
    pub code: String,
    pub description: Option<String>,
    pub discount_applied_cents: i64,
    pub months_remaining: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Active,
    Removed,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Active => "active",
            DomainStatus::Removed => "removed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "active" => DomainStatus::Active,
            _ => DomainStatus::Removed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: Uuid,
    pub client_id: Uuid,
    pub domain: String,
    pub status: DomainStatus,
    pub created_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PrepaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrepaymentStatus::Pending => "pending",
            PrepaymentStatus::Completed => "completed",
            PrepaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => PrepaymentStatus::Pending,
            "completed" => PrepaymentStatus::Completed,
            _ => PrepaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prepayment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub months: i32,
    pub base_price_cents: i64,
    pub amount_paid_cents: i64,
    pub amount_saved_cents: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub payment_order_id: String,
    pub status: PrepaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepaymentQuote {
    pub tier: SubscriptionTier,
    pub base_monthly_cents: i64,
    pub discount_cents: i64,
    pub monthly_price_cents: i64,
    pub three_month_total_cents: i64,
    pub prepayment_total_cents: i64,
    pub total_savings_cents: i64,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CouponCodeRequest {
    #[validate(length(min = 1, max = 64, message = "Coupon code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct AddDomainRequest {
    #[validate(length(min = 3, max = 253, message = "Domain must be between 3 and 253 characters"))]
    pub domain: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct PrepaymentQuoteRequest {
    #[validate(length(min = 1, message = "Tier is required"))]
    pub tier: String,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreatePrepaymentRequest {
    #[validate(length(min = 1, message = "Tier is required"))]
    pub tier: String,
    pub coupon_code: Option<String>,
    #[validate(url(message = "return_url must be a valid URL"))]
    pub return_url: String,
    #[validate(url(message = "cancel_url must be a valid URL"))]
    pub cancel_url: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CapturePrepaymentRequest {
    #[validate(length(min = 1, message = "Order id is required"))]
    pub order_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parse_round_trips() {
        for tier in [
            SubscriptionTier::Starter,
            SubscriptionTier::Growth,
            SubscriptionTier::Scale,
            SubscriptionTier::Premier,
            SubscriptionTier::Elite,
            SubscriptionTier::Enterprise,
        ] {
            assert_eq!(SubscriptionTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(SubscriptionTier::parse("platinum"), None);
    }

    #[test]
    fn fixed_discount_ignores_base() {
        let discount = Discount::FixedCents(2_500);
        assert_eq!(discount.applied_to(150_000), 2_500);
        assert_eq!(discount.applied_to(10), 2_500);
    }

    #[test]
    fn percentage_discount_rounds_half_up() {
        assert_eq!(Discount::Percentage(10).applied_to(150_000), 15_000);
        // 33% of 150 is 49.5, rounds up to 50
        assert_eq!(Discount::Percentage(33).applied_to(150), 50);
        // 33% of 99_999 is 32_999.67, rounds to 33_000
        assert_eq!(Discount::Percentage(33).applied_to(99_999), 33_000);
        assert_eq!(Discount::Percentage(0).applied_to(150_000), 0);
    }

    #[test]
    fn discount_serde_is_tagged() {
        let json = serde_json::to_value(Discount::Percentage(10)).unwrap();
        assert_eq!(json["type"], "percentage");
        assert_eq!(json["amount"], 10);

        let parsed: Discount =
            serde_json::from_value(serde_json::json!({"type": "fixed_cents", "amount": 500}))
                .unwrap();
        assert_eq!(parsed, Discount::FixedCents(500));
    }

    #[test]
    fn discount_column_mapping_round_trips() {
        let discount = Discount::Percentage(25);
        let rebuilt = Discount::from_columns(discount.type_name(), discount.amount());
        assert_eq!(rebuilt, discount);
    }
}
