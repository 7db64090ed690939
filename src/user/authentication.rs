use log::{debug, info, warn};
use serde::Deserialize;

use crate::database::{Datastore, StoreError};
use crate::database::models::UserRecord;
use crate::security::{PasswordHasher, TokenIssuer};
use crate::user::ErrorKind;

/// Login request body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// Issued token and the record it was issued for
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub token: String,
    pub user: UserRecord,
}

/// User login error types
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Invalid credentials")]
    UnknownUser,

    #[error("You have been banned, contact admins.")]
    Banned,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Login failed: {0}")]
    Internal(String),
}

impl LoginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoginError::UnknownUser => ErrorKind::NotFound,
            LoginError::Banned => ErrorKind::Forbidden,
            LoginError::InvalidCredentials => ErrorKind::Unauthorized,
            LoginError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Message returned to the caller; internal causes stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            LoginError::Internal(_) => "Error during login. Please try again.".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the response reports a failed credential check
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, LoginError::UnknownUser | LoginError::InvalidCredentials)
    }
}

impl From<StoreError> for LoginError {
    fn from(e: StoreError) -> Self {
        LoginError::Internal(e.to_string())
    }
}

/// Authenticate a user and issue a token
///
/// The ban flag is checked before the password, so a banned user learns
/// about the ban whatever password was sent.
pub async fn login_user(
    store: &dyn Datastore,
    hasher: &dyn PasswordHasher,
    tokens: &dyn TokenIssuer,
    credentials: &LoginCredentials,
) -> Result<LoginSuccess, LoginError> {
    debug!("Login attempt for user: {}", credentials.username);

    let user = match store.find_by_username(&credentials.username).await? {
        Some(user) => user,
        None => {
            warn!("Login failed: unknown user {}", credentials.username);
            return Err(LoginError::UnknownUser);
        }
    };

    if user.is_banned {
        warn!("Login refused for banned user {}", user.username);
        return Err(LoginError::Banned);
    }

    let password_matches = hasher.verify(&credentials.password, &user.password_digest)
        .await
        .map_err(|e| LoginError::Internal(format!("Password verification error: {}", e)))?;

    if !password_matches {
        warn!("Login failed: wrong password for {}", user.username);
        return Err(LoginError::InvalidCredentials);
    }

    let token = tokens.issue(&user.username)
        .map_err(|e| LoginError::Internal(format!("Failed to issue token: {}", e)))?;

    info!("User logged in: {}", user.username);
    Ok(LoginSuccess { token, user })
}
