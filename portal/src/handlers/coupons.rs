use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use atelier_models::billing::CouponCodeRequest;

use crate::errors::PortalError;
use crate::services::middleware::extract_user_id;
use crate::services::notifications::{send_best_effort, Notice, NotificationSender};
use crate::services::{AuthMiddlewareFactory, ClientService, CouponService, UserService};

/// Public code check for the marketing pricing page.
pub async fn validate(
    pool: web::Data<PgPool>,
    request: web::Json<CouponCodeRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let coupons = CouponService::new(pool.get_ref().clone());
    let view = coupons.validate(&request.code).await?;

    Ok(HttpResponse::Ok().json(view))
}

pub async fn redeem(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    notifications: web::Data<dyn NotificationSender>,
    request: web::Json<CouponCodeRequest>,
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

    let coupons = CouponService::new(pool.get_ref().clone());
    let view = coupons.redeem(client.id, &request.code).await?;

    send_best_effort(
        notifications.get_ref(),
        Notice::coupon_redeemed(
            &user.email,
            &view.code,
            view.discount_applied_cents,
            view.months_remaining,
        ),
    )
    .await;

    Ok(HttpResponse::Ok().json(view))
}

pub async fn status(req: HttpRequest, pool: web::Data<PgPool>) -> Result<HttpResponse, PortalError> {
    let user_id = extract_user_id(&req)?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    let coupons = CouponService::new(pool.get_ref().clone());
    match coupons.current_status(client.id).await? {
        Some(view) => Ok(HttpResponse::Ok().json(json!({
            "active": true,
            "coupon": view,
        }))),
        None => Ok(HttpResponse::Ok().json(json!({ "active": false }))),
    }
}

/// Validation is public so the pricing page can check codes pre-signup;
/// redeem and status require a logged-in portal user.
pub fn configure_coupon_routes(
    cfg: &mut web::ServiceConfig,
    auth_middleware: AuthMiddlewareFactory,
) {
    cfg.service(
        web::scope("/api/coupons")
            .route("/validate", web::post().to(validate))
            .service(
                web::scope("")
                    .wrap(auth_middleware)
                    .route("/redeem", web::post().to(redeem))
                    .route("/status", web::get().to(status)),
            ),
    );
}
