use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use atelier_models::billing::AddDomainRequest;

use crate::errors::PortalError;
use crate::services::middleware::extract_user_id;
use crate::services::quota::{check_domain_quota, QuotaCheck};
use crate::services::{AuthMiddlewareFactory, ClientService, QuotaService};

pub async fn list_domains(
    req: HttpRequest,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, PortalError> {
    let user_id = extract_user_id(&req)?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    let quota = QuotaService::new(pool.get_ref().clone());
    let domains = quota.list_domains(client.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "domains": domains,
        "domains_used": client.domains_used,
        "domain_limit": client.domain_limit,
    })))
}

pub async fn add_domain(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    request: web::Json<AddDomainRequest>,
) -> Result<HttpResponse, PortalError> {
    if let Err(validation_errors) = request.validate() {
        return Err(PortalError::Validation(validation_errors.to_string()));
    }

    let user_id = extract_user_id(&req)?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    // Fast refusal on stale counters; the conditional increment inside
    // register_domain is the authoritative gate.
    if check_domain_quota(&client) == QuotaCheck::Exceeded {
        return Err(PortalError::QuotaExceeded { resource: "domains" });
    }

    let quota = QuotaService::new(pool.get_ref().clone());
    let record = quota.register_domain(client.id, &request.domain).await?;

    Ok(HttpResponse::Created().json(record))
}

pub async fn remove_domain(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    let user_id = extract_user_id(&req)?;
    let client = ClientService::new(pool.get_ref().clone())
        .find_for_user(user_id)
        .await?;

    let quota = QuotaService::new(pool.get_ref().clone());
    quota.remove_domain(client.id, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub fn configure_domain_routes(
    cfg: &mut web::ServiceConfig,
    auth_middleware: AuthMiddlewareFactory,
) {
    cfg.service(
        web::scope("/api/domains")
            .wrap(auth_middleware)
            .route("", web::get().to(list_domains))
            .route("", web::post().to(add_domain))
            .route("/{id}", web::delete().to(remove_domain)),
    );
}
