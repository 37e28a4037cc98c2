use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atelier_models::ai::ChatMessage;
use atelier_portal::errors::PortalError;
use atelier_portal::services::inference::{ChatCompletionsClient, InferenceRunner};
use atelier_portal::services::notifications::{
    send_best_effort, MailerClient, Notice, NotificationSender,
};
use atelier_portal::services::payments::{CaptureStatus, PaymentProcessor, PaypalClient};

async fn mount_paypal_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-access-token",
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .mount(server)
        .await;
}

fn paypal(server: &MockServer) -> PaypalClient {
    PaypalClient::new(
        Client::new(),
        server.uri(),
        "client-id".to_string(),
        "client-secret".to_string(),
    )
}

#[actix_web::test]
async fn test_paypal_create_order_sends_decimal_amount_and_returns_approval_url() {
    let server = MockServer::start().await;
    mount_paypal_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header("Authorization", "Bearer test-access-token"))
        .and(body_partial_json(json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": { "currency_code": "USD", "value": "3645.00" }
            }],
            "payer": { "email_address": "studio@example.com" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-123",
            "status": "CREATED",
            "links": [
                { "rel": "self", "href": "https://paypal.test/orders/ORDER-123", "method": "GET" },
                { "rel": "approve", "href": "https://paypal.test/approve/ORDER-123", "method": "GET" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let order = paypal(&server)
        .create_order(
            364_500,
            "Growth plan, 3 months prepaid",
            "studio@example.com",
            "https://portal.example.com/billing/return",
            "https://portal.example.com/billing/cancel",
        )
        .await
        .expect("order created");

    assert_eq!(order.order_id, "ORDER-123");
    assert_eq!(
        order.approval_url.as_deref(),
        Some("https://paypal.test/approve/ORDER-123")
    );
}

#[actix_web::test]
async fn test_paypal_capture_completed_order() {
    let server = MockServer::start().await;
    mount_paypal_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-123/capture"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "ORDER-123",
            "status": "COMPLETED"
        })))
        .mount(&server)
        .await;

    let result = paypal(&server)
        .capture_order("ORDER-123")
        .await
        .expect("capture succeeds");

    assert_eq!(result.order_id, "ORDER-123");
    assert_eq!(result.status, CaptureStatus::Completed);
}

#[actix_web::test]
async fn test_paypal_capture_treats_unprocessable_as_decline() {
    let server = MockServer::start().await;
    mount_paypal_token(&server).await;

    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders/ORDER-9/capture"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "name": "UNPROCESSABLE_ENTITY",
            "details": [{ "issue": "INSTRUMENT_DECLINED" }]
        })))
        .mount(&server)
        .await;

    let result = paypal(&server)
        .capture_order("ORDER-9")
        .await
        .expect("a decline is a result, not an error");

    assert_eq!(result.status, CaptureStatus::Declined);
}

#[actix_web::test]
async fn test_paypal_outage_surfaces_as_dependency_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let result = paypal(&server)
        .create_order(
            270_000,
            "Starter plan, 3 months prepaid",
            "studio@example.com",
            "https://portal.example.com/billing/return",
            "https://portal.example.com/billing/cancel",
        )
        .await;

    assert!(matches!(result, Err(PortalError::Dependency(_))));
}

#[actix_web::test]
async fn test_mailer_send_returns_message_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("X-Api-Key", "mailer-key"))
        .and(body_partial_json(json!({
            "template": "welcome",
            "to": "studio@example.com"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "id": "msg-42" })))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = MailerClient::new(Client::new(), server.uri(), "mailer-key".to_string());
    let receipt = mailer
        .send(Notice::welcome("studio@example.com", "Test Studio"))
        .await
        .expect("notice accepted");

    assert_eq!(receipt.message_id.as_deref(), Some("msg-42"));
}

#[actix_web::test]
async fn test_mailer_outage_is_swallowed_by_best_effort_send() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mailer down"))
        .mount(&server)
        .await;

    let mailer = MailerClient::new(Client::new(), server.uri(), "mailer-key".to_string());

    let direct = mailer
        .send(Notice::quota_warning("studio@example.com", "ai_calls", 100, 100))
        .await;
    assert!(matches!(direct, Err(PortalError::Dependency(_))));

    // The advisory wrapper must not propagate the failure.
    send_best_effort(
        &mailer,
        Notice::quota_warning("studio@example.com", "ai_calls", 100, 100),
    )
    .await;
}

#[actix_web::test]
async fn test_chat_completions_returns_first_choice_and_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer inference-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Here is a tagline draft." },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 30, "total_tokens": 42 }
        })))
        .mount(&server)
        .await;

    let runner = ChatCompletionsClient::new(Client::new(), server.uri(), "inference-key".to_string());
    let messages = [ChatMessage {
        role: "user".to_string(),
        content: "Draft a tagline for the spring campaign".to_string(),
    }];
    let output = runner
        .run("gpt-4o-mini", &messages)
        .await
        .expect("completion returned");

    assert_eq!(output.response_text, "Here is a tagline draft.");
    assert_eq!(output.tokens_used, 42);
}

#[actix_web::test]
async fn test_chat_completions_with_no_choices_is_a_dependency_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "usage": { "total_tokens": 0 }
        })))
        .mount(&server)
        .await;

    let runner = ChatCompletionsClient::new(Client::new(), server.uri(), "inference-key".to_string());
    let messages = [ChatMessage {
        role: "user".to_string(),
        content: "Draft a tagline".to_string(),
    }];
    let result = runner.run("gpt-4o-mini", &messages).await;

    assert!(matches!(result, Err(PortalError::Dependency(_))));
}
