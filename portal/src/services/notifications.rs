use async_trait::async_trait;
use atelier_config::AppConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::PortalError;

/// A templated message for the agency's mailer service. Parameters are
/// free-form JSON interpolated into the template on the mailer side.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub template: &'static str,
    pub to: String,
    pub params: serde_json::Value,
}

impl Notice {
    pub fn welcome(to: &str, name: &str) -> Self {
        Self {
            template: "welcome",
            to: to.to_string(),
            params: json!({ "name": name }),
        }
    }

    pub fn coupon_redeemed(to: &str, code: &str, discount_cents: i64, months: i32) -> Self {
        Self {
            template: "coupon_redeemed",
            to: to.to_string(),
            params: json!({
                "code": code,
                "discount_cents": discount_cents,
                "months": months,
            }),
        }
    }

    pub fn payment_confirmation(to: &str, amount_cents: i64, months: i32) -> Self {
        Self {
            template: "payment_confirmation",
            to: to.to_string(),
            params: json!({
                "amount_cents": amount_cents,
                "months": months,
            }),
        }
    }

    pub fn quota_warning(to: &str, resource: &str, used: i32, limit: i32) -> Self {
        Self {
            template: "quota_warning",
            to: to.to_string(),
            params: json!({
                "resource": resource,
                "used": used,
                "limit": limit,
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotificationReceipt {
    pub message_id: Option<String>,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notice: Notice) -> Result<NotificationReceipt, PortalError>;
}

pub struct MailerClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MailerClient {
    pub fn new(client: Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            config.mailer_url.clone(),
            config.mailer_api_key.clone(),
        )
    }
}

#[derive(Debug, Deserialize, Default)]
struct MailerResponse {
    id: Option<String>,
}

#[async_trait]
impl NotificationSender for MailerClient {
    async fn send(&self, notice: Notice) -> Result<NotificationReceipt, PortalError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .json(&notice)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PortalError::Dependency(format!(
                "Mailer rejected {} notice: {}",
                notice.template, error_text
            )));
        }

        let body: MailerResponse = response.json().await.unwrap_or_default();
        Ok(NotificationReceipt {
            message_id: body.id,
        })
    }
}

/// Notices are advisory; a mailer outage must never fail the request that
/// triggered them.
pub async fn send_best_effort(sender: &dyn NotificationSender, notice: Notice) {
    let template = notice.template;
    if let Err(err) = sender.send(notice).await {
        tracing::warn!(template = template, error = %err, "Notice delivery failed");
    }
}
