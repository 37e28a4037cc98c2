use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use atelier_models::auth::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};

use crate::errors::PortalError;
use crate::services::middleware::extract_user_id;
use crate::services::notifications::{send_best_effort, Notice, NotificationSender};
use crate::services::rate_limit::LoginRateLimiter;
use crate::services::{AuthMiddlewareFactory, ClientService, TokenService, UserService};

/// Creates the account, its tenant workspace and the first bearer token in
/// one request, so a signup lands in a usable portal.
pub async fn register(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    notifications: web::Data<dyn NotificationSender>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let users = UserService::new(pool.get_ref().clone());
    let user = users.create_user(&request).await?;

    let clients = ClientService::new(pool.get_ref().clone());
    clients.create_for_user(user.id).await?;

    let issued = tokens.issue(user.id)?;

    send_best_effort(
        notifications.get_ref(),
        Notice::welcome(&user.email, &user.name),
    )
    .await;

    Ok(HttpResponse::Created().json(AuthResponse {
        user: UserProfile::from(user),
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

pub async fn login(
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
    limiter: web::Data<LoginRateLimiter>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    // The limiter counts attempts per submitted email, wrong or right, and
    // refuses before touching credentials once the window is full.
    let identifier = request.email.trim().to_lowercase();
    limiter.check_and_record(&identifier)?;

    let users = UserService::new(pool.get_ref().clone());
    let user = users
        .verify_credentials(&request.email, &request.password)
        .await?;

    limiter.clear(&identifier);
    let issued = tokens.issue(user.id)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: UserProfile::from(user),
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// Cheap liveness probe for the frontend's stored token.
pub async fn verify(req: HttpRequest) -> Result<HttpResponse, PortalError> {
    let user_id = extract_user_id(&req)?;
    Ok(HttpResponse::Ok().json(json!({
        "valid": true,
        "user_id": user_id,
    })))
}

/// Register and login stay public; the trailing empty scope catches the
/// rest of `/api/auth/*` behind the bearer check.
pub fn configure_auth_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddlewareFactory) {
    cfg.service(
        web::scope("/api/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .service(
                web::scope("")
                    .wrap(auth_middleware)
                    .route("/verify", web::post().to(verify)),
            ),
    );
}
