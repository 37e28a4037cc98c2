use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use atelier_config::AppConfig;
use atelier_models::ai::{ChatRequest, ChatResponse};

use crate::errors::PortalError;
use crate::services::inference::InferenceRunner;
use crate::services::middleware::extract_user_id;
use crate::services::notifications::{send_best_effort, Notice, NotificationSender};
use crate::services::quota::{check_ai_quota, QuotaCheck, UNLIMITED};
use crate::services::{AuthMiddlewareFactory, ClientService, QuotaService, UserService};

/// Quota-metered chat proxy. The counter moves only after the model call
/// succeeds, so a failed upstream request costs the client nothing.
pub async fn chat(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<AppConfig>,
    runner: web::Data<dyn InferenceRunner>,
    notifications: web::Data<dyn NotificationSender>,
    request: web::Json<ChatRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let user_id = extract_user_id(&req)?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    if check_ai_quota(&client) == QuotaCheck::Exceeded {
        return Err(PortalError::QuotaExceeded { resource: "ai_calls" });
    }

    let output = runner
        .run(&config.inference_model, &request.messages)
        .await?;

    let quota = QuotaService::new(pool.get_ref().clone());
    let usage = quota.commit_ai_usage(client.id).await?;
    let (calls_used, calls_limit) = match usage {
        Some(usage) => (usage.calls_used, usage.calls_limit),
        // Lost the race for the last slot; the reply already exists.
        None => (client.ai_calls_limit, client.ai_calls_limit),
    };

    // Heads-up the moment the final call in the allowance is spent.
    if calls_limit != UNLIMITED && calls_used == calls_limit {
        if let Ok(user) = UserService::new(pool.get_ref().clone()).find_by_id(user_id).await {
            send_best_effort(
                notifications.get_ref(),
                Notice::quota_warning(&user.email, "ai_calls", calls_used, calls_limit),
            )
            .await;
        }
    }

    Ok(HttpResponse::Ok().json(ChatResponse {
        reply: output.response_text,
        tokens_used: output.tokens_used,
        calls_used,
        calls_limit,
    }))
}

pub fn configure_ai_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddlewareFactory) {
    cfg.service(
        web::scope("/api/ai")
            .wrap(auth_middleware)
            .route("/chat", web::post().to(chat)),
    );
}
