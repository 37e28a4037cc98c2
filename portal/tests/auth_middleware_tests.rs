use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App, HttpRequest, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use atelier_portal::services::middleware::extract_user_id;
use atelier_portal::services::{AuthMiddlewareFactory, TokenService};

const SECRET: &str = "portal_test_token_secret";

// Minimal protected handler that echoes the authenticated user id.
async fn whoami(req: HttpRequest) -> actix_web::Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    Ok(HttpResponse::Ok().json(json!({ "user_id": user_id })))
}

#[actix_web::test]
async fn test_missing_token_is_rejected() {
    let tokens = Arc::new(TokenService::new(SECRET));
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(AuthMiddlewareFactory::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/whoami").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = test::read_body(resp).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("invalid_token"), "unexpected body: {}", text);
}

#[actix_web::test]
async fn test_non_bearer_authorization_is_rejected() {
    let tokens = Arc::new(TokenService::new(SECRET));
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(AuthMiddlewareFactory::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", "Token abcdef"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_garbage_bearer_token_is_rejected() {
    let tokens = Arc::new(TokenService::new(SECRET));
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(AuthMiddlewareFactory::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", "Bearer not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = test::read_body(resp).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("invalid_token"), "unexpected body: {}", text);
}

#[actix_web::test]
async fn test_valid_token_reaches_handler_with_user_id() {
    let tokens = Arc::new(TokenService::new(SECRET));
    let user_id = Uuid::new_v4();
    let issued = tokens.issue(user_id).expect("token issued");

    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(AuthMiddlewareFactory::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {}", issued.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["user_id"], json!(user_id));
}

#[actix_web::test]
async fn test_expired_token_is_rejected_as_expired() {
    // Sign with the same secret but a negative lifetime, so the signature is
    // valid and only the expiry fails.
    let expired_issuer = TokenService::with_ttl(SECRET, -600);
    let issued = expired_issuer
        .issue(Uuid::new_v4())
        .expect("token issued");

    let tokens = Arc::new(TokenService::new(SECRET));
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(AuthMiddlewareFactory::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {}", issued.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = test::read_body(resp).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("token_expired"), "unexpected body: {}", text);
}

#[actix_web::test]
async fn test_token_from_another_deployment_is_rejected() {
    let foreign_issuer = TokenService::new("some_other_deployment_secret");
    let issued = foreign_issuer
        .issue(Uuid::new_v4())
        .expect("token issued");

    let tokens = Arc::new(TokenService::new(SECRET));
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(AuthMiddlewareFactory::new(tokens))
                .route("/whoami", web::get().to(whoami)),
        ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/whoami")
        .insert_header(("Authorization", format!("Bearer {}", issued.token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body = test::read_body(resp).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("invalid_token"), "unexpected body: {}", text);
}
