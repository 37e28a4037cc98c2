use async_trait::async_trait;
use atelier_config::AppConfig;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::errors::PortalError;

const CURRENCY: &str = "USD";

/// Formats cents the way the payment API expects amounts: "3645.00".
fn cents_to_decimal(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub order_id: String,
    pub approval_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Completed,
    Declined,
}

#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub order_id: String,
    pub status: CaptureStatus,
}

/// Seam for the payment provider so billing flows can be exercised against
/// a stub in tests.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_order(
        &self,
        amount_cents: i64,
        description: &str,
        payer_email: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<PaymentOrder, PortalError>;

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PortalError>;
}

#[derive(Debug, Deserialize)]
struct PaypalAccessToken {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PaypalLink {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct PaypalOrder {
    id: String,
    status: String,
    #[serde(default)]
    links: Vec<PaypalLink>,
}

pub struct PaypalClient {
    client: Client,
    api_url: String,
    client_id: String,
    client_secret: String,
}

impl PaypalClient {
    pub fn new(client: Client, api_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            api_url,
            client_id,
            client_secret,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            config.paypal_api_url.clone(),
            config.paypal_client_id.clone(),
            config.paypal_client_secret.clone(),
        )
    }

    async fn access_token(&self) -> Result<String, PortalError> {
        let params = [("grant_type", "client_credentials")];

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.api_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PortalError::Dependency(format!(
                "PayPal token request failed: {}",
                error_text
            )));
        }

        let token: PaypalAccessToken = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentProcessor for PaypalClient {
    async fn create_order(
        &self,
        amount_cents: i64,
        description: &str,
        payer_email: &str,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<PaymentOrder, PortalError> {
        let access_token = self.access_token().await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "description": description,
                "amount": {
                    "currency_code": CURRENCY,
                    "value": cents_to_decimal(amount_cents),
                }
            }],
            "payer": {
                "email_address": payer_email,
            },
            "application_context": {
                "return_url": return_url,
                "cancel_url": cancel_url,
            }
        });

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.api_url))
            .bearer_auth(&access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PortalError::Dependency(format!(
                "PayPal order creation failed: {}",
                error_text
            )));
        }

        let order: PaypalOrder = response.json().await?;
        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href);

        Ok(PaymentOrder {
            order_id: order.id,
            approval_url,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult, PortalError> {
        let access_token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders/{}/capture", self.api_url, order_id))
            .bearer_auth(&access_token)
            .json(&json!({}))
            .send()
            .await?;

        // The provider reports an unfundable instrument as 422, which is a
        // decline, not an outage.
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(CaptureResult {
                order_id: order_id.to_string(),
                status: CaptureStatus::Declined,
            });
        }
        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PortalError::Dependency(format!(
                "PayPal capture failed: {}",
                error_text
            )));
        }

        let order: PaypalOrder = response.json().await?;
        let status = if order.status == "COMPLETED" {
            CaptureStatus::Completed
        } else {
            CaptureStatus::Declined
        };

        Ok(CaptureResult {
            order_id: order.id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_format_as_decimal_strings() {
        assert_eq!(cents_to_decimal(364_500), "3645.00");
        assert_eq!(cents_to_decimal(270_000), "2700.00");
        assert_eq!(cents_to_decimal(90_005), "900.05");
        assert_eq!(cents_to_decimal(50), "0.50");
        assert_eq!(cents_to_decimal(0), "0.00");
    }
}
