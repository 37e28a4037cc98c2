use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PortalError;

/// Tokens live for 24 hours; there is no refresh flow, clients simply
/// re-authenticate.
pub const TOKEN_TTL_SECS: i64 = 86_400;

const TOKEN_HEADER: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    user_id: Uuid,
    exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies the portal's compact bearer tokens:
/// `base64url(header).base64url(payload).base64url(hmac_sha256)`.
pub struct TokenService {
    key: hmac::Key,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, TOKEN_TTL_SECS)
    }

    /// Custom lifetime, used by tests to mint already-expired tokens.
    pub fn with_ttl(secret: &str, ttl_secs: i64) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn issue(&self, user_id: Uuid) -> Result<IssuedToken, PortalError> {
        let expires_at = Utc::now() + Duration::seconds(self.ttl_secs);
        let payload = TokenPayload {
            user_id,
            exp: expires_at.timestamp(),
        };
        let payload_json = serde_json::to_vec(&payload)
            .map_err(|e| PortalError::Dependency(format!("Failed to encode token payload: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            general_purpose::URL_SAFE_NO_PAD.encode(payload_json)
        );
        let signature = hmac::sign(&self.key, signing_input.as_bytes());

        Ok(IssuedToken {
            token: format!(
                "{}.{}",
                signing_input,
                general_purpose::URL_SAFE_NO_PAD.encode(signature.as_ref())
            ),
            expires_at,
        })
    }

    /// Returns the embedded user id. The signature is checked before the
    /// expiry so a tampered expiry cannot revive a token; anything that is
    /// not structurally verifiable counts as a bad signature.
    pub fn verify(&self, token: &str) -> Result<Uuid, PortalError> {
        let mut parts = token.split('.');
        let (header, payload, signature) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(PortalError::InvalidSignature),
            };

        let received = general_purpose::URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| PortalError::InvalidSignature)?;
        let signing_input = format!("{}.{}", header, payload);
        let expected = hmac::sign(&self.key, signing_input.as_bytes());
        if !constant_time_eq::constant_time_eq(expected.as_ref(), &received) {
            return Err(PortalError::InvalidSignature);
        }

        let payload_json = general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| PortalError::InvalidSignature)?;
        let payload: TokenPayload =
            serde_json::from_slice(&payload_json).map_err(|_| PortalError::InvalidSignature)?;

        if payload.exp < Utc::now().timestamp() {
            return Err(PortalError::TokenExpired);
        }

        Ok(payload.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_for_token_service";

    #[test]
    fn issue_then_verify_returns_user_id() {
        let service = TokenService::new(SECRET);
        let user_id = Uuid::new_v4();
        let issued = service.issue(user_id).unwrap();
        assert_eq!(service.verify(&issued.token).unwrap(), user_id);
        let remaining = issued.expires_at.timestamp() - Utc::now().timestamp();
        assert!((TOKEN_TTL_SECS - 5..=TOKEN_TTL_SECS).contains(&remaining));
    }

    #[test]
    fn token_has_three_url_safe_parts() {
        let service = TokenService::new(SECRET);
        let issued = service.issue(Uuid::new_v4()).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();
        assert_eq!(parts.len(), 3);
        for part in parts {
            assert!(general_purpose::URL_SAFE_NO_PAD.decode(part).is_ok());
        }
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let service = TokenService::with_ttl(SECRET, -10);
        let issued = service.issue(Uuid::new_v4()).unwrap();
        let err = service.verify(&issued.token).unwrap_err();
        assert!(matches!(err, PortalError::TokenExpired));
    }

    #[test]
    fn wrong_secret_fails_signature_check() {
        let issued = TokenService::new(SECRET).issue(Uuid::new_v4()).unwrap();
        let other = TokenService::new("a_completely_different_secret");
        let err = other.verify(&issued.token).unwrap_err();
        assert!(matches!(err, PortalError::InvalidSignature));
    }

    #[test]
    fn tampered_payload_fails_signature_check() {
        let service = TokenService::new(SECRET);
        let issued = service.issue(Uuid::new_v4()).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let forged_payload = TokenPayload {
            user_id: Uuid::new_v4(),
            exp: (Utc::now() + Duration::days(365)).timestamp(),
        };
        let forged = general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&forged_payload).unwrap());
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        let err = service.verify(&tampered).unwrap_err();
        assert!(matches!(err, PortalError::InvalidSignature));
    }

    #[test]
    fn malformed_tokens_fail_signature_check() {
        let service = TokenService::new(SECRET);
        for token in ["", "justonepart", "two.parts", "a.b.c.d", "!!.??.==", "a.b.c"] {
            let err = service.verify(token).unwrap_err();
            assert!(
                matches!(err, PortalError::InvalidSignature),
                "token {:?} should fail as invalid",
                token
            );
        }
    }
}
