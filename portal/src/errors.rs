use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Seconds a limited caller should wait before retrying. Matches the length
/// of the login rate limiter's sliding window.
pub const RETRY_AFTER_SECS: u32 = 900;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Password too weak: {0}")]
    WeakPassword(String),
    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),
    #[error("{resource} quota exceeded")]
    QuotaExceeded { resource: &'static str },
    #[error("Domain is already in use")]
    DomainAlreadyInUse,
    #[error("Coupon is invalid or expired")]
    CouponInvalid,
    #[error("Coupon usage limit reached")]
    CouponExhausted,
    #[error("Coupon already redeemed by this client")]
    CouponAlreadyRedeemed,
    #[error("Another coupon is already active for this client")]
    CouponConflict,
    #[error("Payment was declined")]
    PaymentDeclined,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Too many attempts")]
    RateLimited,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Dependency error: {0}")]
    Dependency(String),
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        PortalError::Dependency(err.to_string())
    }
}

impl PortalError {
    /// Stable machine-readable reason code carried in every error body.
    pub fn reason(&self) -> &'static str {
        match self {
            PortalError::Validation(_) => "validation_failed",
            PortalError::WeakPassword(_) => "weak_password",
            PortalError::UnknownTier(_) => "unknown_tier",
            PortalError::QuotaExceeded { .. } => "quota_exceeded",
            PortalError::DomainAlreadyInUse => "domain_taken",
            PortalError::CouponInvalid => "coupon_invalid",
            PortalError::CouponExhausted => "coupon_exhausted",
            PortalError::CouponAlreadyRedeemed => "coupon_already_redeemed",
            PortalError::CouponConflict => "coupon_conflict",
            PortalError::PaymentDeclined => "payment_declined",
            PortalError::InvalidCredentials => "invalid_credentials",
            PortalError::InvalidSignature => "invalid_token",
            PortalError::TokenExpired => "token_expired",
            PortalError::RateLimited => "rate_limited",
            PortalError::NotFound(_) => "not_found",
            PortalError::Database(_) | PortalError::Dependency(_) => "dependency_failed",
        }
    }
}

impl ResponseError for PortalError {
    fn status_code(&self) -> StatusCode {
        match self {
            PortalError::Validation(_)
            | PortalError::WeakPassword(_)
            | PortalError::UnknownTier(_)
            | PortalError::QuotaExceeded { .. }
            | PortalError::DomainAlreadyInUse
            | PortalError::CouponInvalid
            | PortalError::CouponExhausted
            | PortalError::CouponAlreadyRedeemed
            | PortalError::CouponConflict
            | PortalError::PaymentDeclined => StatusCode::BAD_REQUEST,
            PortalError::InvalidCredentials
            | PortalError::InvalidSignature
            | PortalError::TokenExpired => StatusCode::UNAUTHORIZED,
            PortalError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Database(_) | PortalError::Dependency(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Internal failure detail is logged here and never echoed to callers
        let message = match self {
            PortalError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "An internal dependency failed".to_string()
            }
            PortalError::Dependency(e) => {
                tracing::error!("Dependency error: {}", e);
                "An internal dependency failed".to_string()
            }
            other => other.to_string(),
        };

        let mut builder = HttpResponse::build(self.status_code());
        if matches!(self, PortalError::RateLimited) {
            builder.insert_header(("Retry-After", RETRY_AFTER_SECS.to_string()));
        }
        builder.json(json!({
            "error": self.reason(),
            "message": message
        }))
    }
}
