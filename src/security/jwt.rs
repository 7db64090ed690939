use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Username of the authenticated user
    pub user: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// JWT ID (unique identifier for this token)
    pub jti: String,
    /// Issuer
    pub iss: String,
}

/// Issues and checks signed tokens for authenticated users
#[cfg_attr(test, mockall::automock)]
pub trait TokenIssuer: Send + Sync {
    /// Issue a signed token carrying `username` as the `user` claim
    fn issue(&self, username: &str) -> Result<String>;

    /// Check a token's signature, issuer and expiry and return its claims
    fn validate(&self, token: &str) -> Result<Claims>;
}

/// HS256 token issuer keyed by a shared secret
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    validity: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &str, issuer: &str, validity: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            validity,
        }
    }

    pub fn from_config(security: &SecurityConfig, issuer: &str) -> Self {
        Self::new(&security.jwt_secret, issuer, Duration::hours(security.token_validity_hours))
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, username: &str) -> Result<String> {
        // Create token expiration time
        let now = Utc::now();
        let expires_at = now + self.validity;

        let claims = Claims {
            user: username.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to generate JWT token")?;

        debug!("Generated JWT token for user {}", username);
        Ok(token)
    }

    fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("Failed to validate JWT token")?;

        Ok(token_data.claims)
    }
}
