use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use atelier_config::AppConfig;
use atelier_portal::handlers;
use atelier_portal::services::inference::{ChatCompletionsClient, InferenceRunner};
use atelier_portal::services::notifications::{MailerClient, NotificationSender};
use atelier_portal::services::payments::{PaymentProcessor, PaypalClient};
use atelier_portal::services::{AuthMiddlewareFactory, LoginRateLimiter, TokenService};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();
    let port = config.port;

    tracing::info!("📊 [Portal Service] Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("✅ [Portal Service] Database connected, migrations applied");

    // The signing key is shared between the token-issuing handlers and the
    // bearer middleware.
    let tokens = Arc::new(TokenService::new(&config.token_secret));
    let auth_middleware = AuthMiddlewareFactory::new(Arc::clone(&tokens));
    let tokens_data = web::Data::from(tokens);

    // One limiter for the whole process; worker-local state would shrink the
    // failure window by the number of workers.
    let limiter = web::Data::new(LoginRateLimiter::new());

    let payments: Arc<dyn PaymentProcessor> = Arc::new(PaypalClient::from_config(&config));
    let payments_data = web::Data::from(payments);
    let notifications: Arc<dyn NotificationSender> = Arc::new(MailerClient::from_config(&config));
    let notifications_data = web::Data::from(notifications);
    let inference: Arc<dyn InferenceRunner> = Arc::new(ChatCompletionsClient::from_config(&config));
    let inference_data = web::Data::from(inference);

    let config_data = web::Data::new(config);

    tracing::info!("🚀 [Portal Service] Starting on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(config_data.clone())
            .app_data(tokens_data.clone())
            .app_data(limiter.clone())
            .app_data(payments_data.clone())
            .app_data(notifications_data.clone())
            .app_data(inference_data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .route("/health", web::get().to(health_check))
            .configure(|cfg| configure_routes(cfg, auth_middleware.clone()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}

fn configure_routes(cfg: &mut web::ServiceConfig, auth_middleware: AuthMiddlewareFactory) {
    handlers::auth::configure_auth_routes(cfg, auth_middleware.clone());
    handlers::coupons::configure_coupon_routes(cfg, auth_middleware.clone());
    handlers::domains::configure_domain_routes(cfg, auth_middleware.clone());
    handlers::billing::configure_billing_routes(cfg, auth_middleware.clone());
    handlers::ai::configure_ai_routes(cfg, auth_middleware);
}

async fn health_check(pool: web::Data<PgPool>) -> actix_web::Result<web::Json<serde_json::Value>> {
    // Check database connection
    let db_status = match sqlx::query("SELECT 1 as test").fetch_one(pool.get_ref()).await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::error!("[Portal Service] Database health check failed: {}", e);
            "disconnected"
        }
    };

    Ok(web::Json(serde_json::json!({
        "status": "healthy",
        "service": "portal-service",
        "database": db_status,
        "timestamp": chrono::Utc::now()
    })))
}
