//! Signed callback tokens relayed to subscriber webhooks
//!
//! A subscriber receives `{"token": "<jwt>"}`. The JWT is HS256, keyed by the
//! subscriber's delivery secret, and expires five minutes after issue.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How long a subscriber has to accept a callback token
pub const TOKEN_VALIDITY_MINUTES: i64 = 5;

/// Placeholder status carried by every callback
pub const VERIFICATION_STATUS: &str = "Email verification will be initiated soon";

/// Identity data delivered to a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub client_id: String,
    pub user_id: String,
    pub fan: String,
    pub photo: String,
    pub name: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub email: String,
    pub region: String,
    pub date_of_birth: String,
    pub zone: String,
    pub gender: String,
    pub woreda: String,
    pub nationality: String,
    pub phone_number: String,
    pub verification_status: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CallbackClaims {
    #[serde(flatten)]
    payload: CallbackPayload,
    iat: i64,
    exp: i64,
}

/// A signed callback token
#[derive(Debug, Clone)]
pub struct CallbackToken {
    encoded: String,
    expires_at: DateTime<Utc>,
}

impl CallbackToken {
    /// Sign a payload now
    pub fn sign(payload: &CallbackPayload, secret: &str) -> Result<Self> {
        Self::sign_at(payload, secret, Utc::now())
    }

    /// Sign a payload as if issued at `issued_at`
    pub fn sign_at(payload: &CallbackPayload, secret: &str, issued_at: DateTime<Utc>) -> Result<Self> {
        let expires_at = issued_at + Duration::minutes(TOKEN_VALIDITY_MINUTES);
        let claims = CallbackClaims {
            payload: payload.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let encoded = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;

        Ok(Self { encoded, expires_at })
    }

    /// Verify a token received on a webhook and return its payload
    pub fn verify(token: &str, secret: &str) -> Result<CallbackPayload> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<CallbackClaims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
            _ => Error::Jwt(e),
        })?;

        Ok(data.claims.payload)
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn into_string(self) -> String {
        self.encoded
    }
}
