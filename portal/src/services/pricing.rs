use atelier_models::billing::{Discount, PrepaymentQuote, SubscriptionTier};

pub const PREPAYMENT_MONTHS: i64 = 3;
pub const PREPAYMENT_DISCOUNT_PERCENT: i64 = 10;

/// Flat monthly list price in cents for each tier.
pub fn tier_price(tier: SubscriptionTier) -> i64 {
    match tier {
        SubscriptionTier::Starter => 100_000,
        SubscriptionTier::Growth => 150_000,
        SubscriptionTier::Scale => 300_000,
        SubscriptionTier::Premier => 500_000,
        SubscriptionTier::Elite => 750_000,
        SubscriptionTier::Enterprise => 1_000_000,
    }
}

/// Builds the three-month prepayment quote. An active redemption's frozen
/// cents win over a code supplied with the request; a supplied code is
/// resolved against the quoted tier's base price. The discount is clamped
/// so the monthly price never goes negative, and the prepayment knocks 10%
/// off the three-month total, rounded half up to a whole cent.
pub fn quote(
    tier: SubscriptionTier,
    active_discount_cents: Option<i64>,
    supplied_coupon: Option<Discount>,
) -> PrepaymentQuote {
    let base_monthly_cents = tier_price(tier);
    let resolved = match (active_discount_cents, supplied_coupon) {
        (Some(cents), _) => cents,
        (None, Some(discount)) => discount.applied_to(base_monthly_cents),
        (None, None) => 0,
    };
    let discount_cents = resolved.clamp(0, base_monthly_cents);
    let monthly_price_cents = base_monthly_cents - discount_cents;
    let three_month_total_cents = monthly_price_cents * PREPAYMENT_MONTHS;
    let prepayment_total_cents =
        (three_month_total_cents * (100 - PREPAYMENT_DISCOUNT_PERCENT) + 50) / 100;

    PrepaymentQuote {
        tier,
        base_monthly_cents,
        discount_cents,
        monthly_price_cents,
        three_month_total_cents,
        prepayment_total_cents,
        total_savings_cents: three_month_total_cents - prepayment_total_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_priced_in_ascending_order() {
        let prices: Vec<i64> = [
            SubscriptionTier::Starter,
            SubscriptionTier::Growth,
            SubscriptionTier::Scale,
            SubscriptionTier::Premier,
            SubscriptionTier::Elite,
            SubscriptionTier::Enterprise,
        ]
        .into_iter()
        .map(tier_price)
        .collect();

        assert_eq!(prices, vec![100_000, 150_000, 300_000, 500_000, 750_000, 1_000_000]);
        assert!(prices.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn starter_quote_without_discount() {
        let q = quote(SubscriptionTier::Starter, None, None);
        assert_eq!(q.base_monthly_cents, 100_000);
        assert_eq!(q.monthly_price_cents, 100_000);
        assert_eq!(q.three_month_total_cents, 300_000);
        assert_eq!(q.prepayment_total_cents, 270_000);
        assert_eq!(q.total_savings_cents, 30_000);
    }

    #[test]
    fn growth_quote_with_ten_percent_coupon() {
        let q = quote(SubscriptionTier::Growth, None, Some(Discount::Percentage(10)));
        assert_eq!(q.discount_cents, 15_000);
        assert_eq!(q.monthly_price_cents, 135_000);
        assert_eq!(q.three_month_total_cents, 405_000);
        assert_eq!(q.prepayment_total_cents, 364_500);
        assert_eq!(q.total_savings_cents, 40_500);
    }

    #[test]
    fn active_snapshot_wins_over_supplied_code() {
        let q = quote(
            SubscriptionTier::Growth,
            Some(20_000),
            Some(Discount::Percentage(50)),
        );
        assert_eq!(q.discount_cents, 20_000);
        assert_eq!(q.monthly_price_cents, 130_000);
    }

    #[test]
    fn oversized_discount_floors_the_price_at_zero() {
        let q = quote(SubscriptionTier::Starter, None, Some(Discount::FixedCents(150_000)));
        assert_eq!(q.discount_cents, 100_000);
        assert_eq!(q.monthly_price_cents, 0);
        assert_eq!(q.three_month_total_cents, 0);
        assert_eq!(q.prepayment_total_cents, 0);
        assert_eq!(q.total_savings_cents, 0);
    }

    #[test]
    fn negative_snapshot_is_ignored() {
        let q = quote(SubscriptionTier::Starter, Some(-500), None);
        assert_eq!(q.discount_cents, 0);
        assert_eq!(q.monthly_price_cents, 100_000);
    }

    #[test]
    fn prepayment_rounds_half_up() {
        // Monthly 33_335 puts the three-month total at 100_005; 90% of that
        // is 90_004.5 and the charge rounds up to 90_005.
        let q = quote(SubscriptionTier::Starter, Some(66_665), None);
        assert_eq!(q.three_month_total_cents, 100_005);
        assert_eq!(q.prepayment_total_cents, 90_005);
        assert_eq!(q.total_savings_cents, 10_000);
    }
}
