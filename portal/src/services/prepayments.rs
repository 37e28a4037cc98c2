use atelier_models::billing::{Prepayment, PrepaymentQuote, PrepaymentStatus};
use chrono::{Months, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::errors::PortalError;
use crate::services::payments::{CaptureStatus, PaymentProcessor};
use crate::services::pricing::PREPAYMENT_MONTHS;

fn prepayment_from_row(row: &PgRow) -> Result<Prepayment, PortalError> {
    let status: String = row.try_get("status")?;
    Ok(Prepayment {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        months: row.try_get("months")?,
        base_price_cents: row.try_get("base_price_cents")?,
        amount_paid_cents: row.try_get("amount_paid_cents")?,
        amount_saved_cents: row.try_get("amount_saved_cents")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
        payment_order_id: row.try_get("payment_order_id")?,
        status: PrepaymentStatus::parse(&status),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Three-month prepayments: a provider order plus a local row tracking what
/// was quoted and how the capture went.
pub struct PrepaymentService {
    pool: PgPool,
}

impl PrepaymentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the provider order for the quoted amount and records the
    /// pending prepayment. Returns the row and the approval URL the client
    /// is sent to.
    pub async fn create(
        &self,
        processor: &dyn PaymentProcessor,
        client_id: Uuid,
        payer_email: &str,
        quote: &PrepaymentQuote,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<(Prepayment, Option<String>), PortalError> {
        let description = format!(
            "Atelier {} plan, {} months prepaid",
            quote.tier.as_str(),
            PREPAYMENT_MONTHS
        );
        let order = processor
            .create_order(
                quote.prepayment_total_cents,
                &description,
                payer_email,
                return_url,
                cancel_url,
            )
            .await?;

        let starts_at = Utc::now();
        let ends_at = starts_at + Months::new(PREPAYMENT_MONTHS as u32);

        let row = sqlx::query(
            r#"
            INSERT INTO prepayments
                (id, client_id, months, base_price_cents, amount_paid_cents,
                 amount_saved_cents, starts_at, ends_at, payment_order_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, client_id, months, base_price_cents, amount_paid_cents,
                      amount_saved_cents, starts_at, ends_at, payment_order_id,
                      status, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(client_id)
        .bind(PREPAYMENT_MONTHS as i32)
        .bind(quote.three_month_total_cents)
        .bind(quote.prepayment_total_cents)
        .bind(quote.total_savings_cents)
        .bind(starts_at)
        .bind(ends_at)
        .bind(&order.order_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((prepayment_from_row(&row)?, order.approval_url))
    }

    /// Captures an approved order. Declines mark the row failed and surface
    /// as `PaymentDeclined`; capturing an already-completed row just returns
    /// it, so client-side retries are harmless. A failed row may be captured
    /// again, the provider permits a fresh funding attempt on the same order.
    pub async fn capture(
        &self,
        processor: &dyn PaymentProcessor,
        client_id: Uuid,
        order_id: &str,
    ) -> Result<Prepayment, PortalError> {
        let prepayment = self.find_by_order(client_id, order_id).await?;
        if prepayment.status == PrepaymentStatus::Completed {
            return Ok(prepayment);
        }

        let result = processor.capture_order(order_id).await?;
        match result.status {
            CaptureStatus::Completed => self.mark(prepayment.id, PrepaymentStatus::Completed).await,
            CaptureStatus::Declined => {
                self.mark(prepayment.id, PrepaymentStatus::Failed).await?;
                Err(PortalError::PaymentDeclined)
            }
        }
    }

    pub async fn find_by_order(
        &self,
        client_id: Uuid,
        order_id: &str,
    ) -> Result<Prepayment, PortalError> {
        let row = sqlx::query(
            r#"
            SELECT id, client_id, months, base_price_cents, amount_paid_cents,
                   amount_saved_cents, starts_at, ends_at, payment_order_id,
                   status, created_at, updated_at
            FROM prepayments
            WHERE payment_order_id = $1 AND client_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortalError::NotFound("prepayment"))?;

        prepayment_from_row(&row)
    }

    async fn mark(&self, id: Uuid, status: PrepaymentStatus) -> Result<Prepayment, PortalError> {
        let row = sqlx::query(
            r#"
            UPDATE prepayments
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, client_id, months, base_price_cents, amount_paid_cents,
                      amount_saved_cents, starts_at, ends_at, payment_order_id,
                      status, created_at, updated_at
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PortalError::NotFound("prepayment"))?;

        prepayment_from_row(&row)
    }
}
