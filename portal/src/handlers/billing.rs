use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use atelier_models::billing::{
    CapturePrepaymentRequest, CreatePrepaymentRequest, Discount, PrepaymentQuoteRequest,
    SubscriptionTier,
};

use crate::errors::PortalError;
use crate::services::middleware::extract_user_id;
use crate::services::notifications::{send_best_effort, Notice, NotificationSender};
use crate::services::payments::PaymentProcessor;
use crate::services::pricing;
use crate::services::{
    AuthMiddlewareFactory, ClientService, CouponService, PrepaymentService, UserService,
};

fn parse_tier(raw: &str) -> Result<SubscriptionTier, PortalError> {
    SubscriptionTier::parse(&raw.trim().to_lowercase())
        .ok_or_else(|| PortalError::UnknownTier(raw.to_string()))
}

/// Discount inputs for the pricing calculator: a live redemption's frozen
/// cents win; otherwise a code supplied with the request is validated and
/// carried over as a raw discount.
async fn resolve_discounts(
    pool: &PgPool,
    client_id: Uuid,
    coupon_code: Option<&str>,
) -> Result<(Option<i64>, Option<Discount>), PortalError> {
    let coupons = CouponService::new(pool.clone());
    if let Some(active) = coupons.active_usage(client_id).await? {
        return Ok((Some(active.usage.discount_applied_cents), None));
    }

    match coupon_code {
        Some(code) if !code.trim().is_empty() => {
            let view = coupons.validate(code).await?;
            Ok((None, Some(view.discount)))
        }
        _ => Ok((None, None)),
    }
}

pub async fn prepayment_quote(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    request: web::Json<PrepaymentQuoteRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let user_id = extract_user_id(&req)?;
    let tier = parse_tier(&request.tier)?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    let (active, supplied) =
        resolve_discounts(pool.get_ref(), client.id, request.coupon_code.as_deref()).await?;
    let quote = pricing::quote(tier, active, supplied);

    Ok(HttpResponse::Ok().json(quote))
}

pub async fn create_prepayment(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    processor: web::Data<dyn PaymentProcessor>,
    request: web::Json<CreatePrepaymentRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let user_id = extract_user_id(&req)?;
    let tier = parse_tier(&request.tier)?;
    let user = UserService::new(pool.get_ref().clone())
        .find_by_id(user_id)
        .await?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    let (active, supplied) =
        resolve_discounts(pool.get_ref(), client.id, request.coupon_code.as_deref()).await?;
    let quote = pricing::quote(tier, active, supplied);

    let prepayments = PrepaymentService::new(pool.get_ref().clone());
    let (prepayment, approval_url) = prepayments
        .create(
            processor.get_ref(),
            client.id,
            &user.email,
            &quote,
            &request.return_url,
            &request.cancel_url,
        )
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "prepayment": prepayment,
        "quote": quote,
        "approval_url": approval_url,
    })))
}

pub async fn capture_prepayment(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    processor: web::Data<dyn PaymentProcessor>,
    notifications: web::Data<dyn NotificationSender>,
    request: web::Json<CapturePrepaymentRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let user_id = extract_user_id(&req)?;
    let user = UserService::new(pool.get_ref().clone())
        .find_by_id(user_id)
        .await?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    let prepayments = PrepaymentService::new(pool.get_ref().clone());
    let prepayment = prepayments
        .capture(processor.get_ref(), client.id, &request.order_id)
        .await?;

    send_best_effort(
        notifications.get_ref(),
        Notice::payment_confirmation(&user.email, prepayment.amount_paid_cents, prepayment.months),
    )
    .await;

    Ok(HttpResponse::Ok().json(prepayment))
}

pub fn configure_billing_routes(
    cfg: &mut web::ServiceConfig,
    auth_middleware: AuthMiddlewareFactory,
) {
    cfg.service(
        web::scope("/api/billing")
            .wrap(auth_middleware)
            .route("/prepayment/quote", web::post().to(prepayment_quote))
            .route("/prepayment", web::post().to(create_prepayment))
            .route("/prepayment/capture", web::post().to(capture_prepayment)),
    );
}
