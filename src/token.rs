use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::{AppError, AuthFailure},
    models::{Role, User},
};

/// The only algorithm accepted on verification. Tokens whose header names any
/// other algorithm are rejected before the signature is considered.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims
///
/// Payload of every credential token. `sub` carries the user id in decimal, as
/// JWT subjects are strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Issued At, unix seconds.
    pub iat: i64,
    /// Expiration Time, unix seconds. The token is invalid from this instant on.
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// IssuedToken
///
/// A freshly signed token together with its expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed or signature invalid")]
    Invalid,
}

impl From<TokenError> for AuthFailure {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthFailure::Expired,
            TokenError::Invalid => AuthFailure::InvalidToken,
        }
    }
}

/// TokenService
///
/// Issues and verifies stateless HS256 tokens. Validity is a pure function of
/// the signature and the expiry; there is no server-side session record.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            // Out-of-range lifetimes saturate instead of panicking; `AppConfig`
            // rejects them before they get here.
            ttl: Duration::try_hours(ttl_hours).unwrap_or(Duration::MAX),
        }
    }

    pub fn issue(&self, user: &User) -> Result<IssuedToken, AppError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    /// Signs a token as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, user: &User, now: i64) -> Result<IssuedToken, AppError> {
        let expires_at = now
            .checked_add(self.ttl.num_seconds())
            .ok_or_else(|| AppError::Internal("token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: expires_at,
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verifies signature, algorithm and expiry against the clock value `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked below against `now`, with no leeway.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!(reason = ?e.kind(), "token rejected");
            TokenError::Invalid
        })?;
        let claims = data.claims;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.user_id().is_none() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}
