use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;

use crate::database::{Datastore, StoreError, UniqueField};
use crate::database::models::UserRecord;
use crate::security::PasswordHasher;
use crate::user::ErrorKind;
use crate::user::validation::{
    age_in_years, is_old_enough, is_reserved_username, parse_date_of_birth, InvalidDateOfBirth,
};

/// Fallback message when a failure carries no message of its own
pub const REGISTRATION_FALLBACK_MESSAGE: &str = "Error creating user. Please try again.";

/// Failure reported when there is no password to hash
pub const MISSING_PASSWORD_MESSAGE: &str = "data and salt arguments required";

/// Sign-up request body
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationPayload {
    pub username: String,
    #[serde(alias = "dateOfBirth")]
    pub dob: String,
    pub email: String,
    /// Only required once every other check has passed
    #[serde(default)]
    pub password: Option<String>,
}

/// User registration error types
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Users are not allowed to use Admin as username, Try different username")]
    ReservedUsername,

    #[error("User must be at least 13 years old to sign up")]
    Underage,

    #[error("User already exists with same username!")]
    UsernameExists,

    #[error("User already exists with same email!")]
    EmailExists,

    #[error("{0}")]
    InvalidPayload(String),

    #[error(transparent)]
    InvalidDateOfBirth(#[from] InvalidDateOfBirth),

    #[error("{0}")]
    Internal(String),
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::ReservedUsername
            | RegistrationError::Underage
            | RegistrationError::UsernameExists
            | RegistrationError::EmailExists => ErrorKind::Validation,
            RegistrationError::InvalidPayload(_)
            | RegistrationError::InvalidDateOfBirth(_)
            | RegistrationError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Message returned to the caller
    pub fn public_message(&self) -> String {
        let message = self.to_string();
        if message.is_empty() {
            REGISTRATION_FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl From<StoreError> for RegistrationError {
    fn from(e: StoreError) -> Self {
        match e {
            // Lost a race with a concurrent registration
            StoreError::Conflict(UniqueField::Username) => RegistrationError::UsernameExists,
            StoreError::Conflict(UniqueField::Email) => RegistrationError::EmailExists,
            other => RegistrationError::Internal(other.to_string()),
        }
    }
}

/// Register a new user
///
/// Checks run in a fixed order and stop at the first failure: reserved
/// username, minimum age, duplicate username, duplicate email. An
/// unreadable date of birth has no age, so it only fails once the record
/// is built. A missing password fails at the hashing step.
pub async fn register_user(
    store: &dyn Datastore,
    hasher: &dyn PasswordHasher,
    payload: &RegistrationPayload,
    today: NaiveDate,
) -> Result<UserRecord, RegistrationError> {
    debug!("Registering new user: {}", payload.username);

    let date_of_birth = parse_date_of_birth(&payload.dob);
    let age = date_of_birth.as_ref().ok().map(|dob| age_in_years(*dob, today));

    if is_reserved_username(&payload.username) {
        return Err(RegistrationError::ReservedUsername);
    }

    if let Some(age) = age {
        if !is_old_enough(age) {
            return Err(RegistrationError::Underage);
        }
    }

    if store.find_by_username(&payload.username).await?.is_some() {
        return Err(RegistrationError::UsernameExists);
    }

    if store.find_by_email(&payload.email).await?.is_some() {
        return Err(RegistrationError::EmailExists);
    }

    let date_of_birth = date_of_birth?;

    let password = payload.password.as_deref()
        .ok_or_else(|| RegistrationError::Internal(MISSING_PASSWORD_MESSAGE.to_string()))?;

    let password_digest = hasher.hash(password).await.map_err(|e| {
        RegistrationError::Internal(format!("Failed to hash password: {}", e))
    })?;

    let user = UserRecord::new(
        payload.username.clone(),
        date_of_birth,
        payload.email.clone(),
        password_digest,
    );

    store.insert(&user).await?;

    info!("User registered successfully: {}", user.username);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockDatastore;
    use crate::security::password::MockPasswordHasher;
    use mockall::predicate::eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn payload(username: &str, dob: &str) -> RegistrationPayload {
        RegistrationPayload {
            username: username.to_string(),
            dob: dob.to_string(),
            email: format!("{}@example.com", username.to_lowercase()),
            password: Some("correct horse".to_string()),
        }
    }

    fn existing(username: &str) -> UserRecord {
        UserRecord::new(
            username.to_string(),
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            "taken@example.com".to_string(),
            "digest".to_string(),
        )
    }

    #[tokio::test]
    async fn test_reserved_username_checked_before_store() {
        // No expectations: any store or hasher call would panic
        let store = MockDatastore::new();
        let hasher = MockPasswordHasher::new();

        // Also underage, but the reserved name wins
        let result = register_user(&store, &hasher, &payload("AdMiN", "2020-01-01"), today()).await;

        assert!(matches!(result, Err(RegistrationError::ReservedUsername)));
    }

    #[tokio::test]
    async fn test_underage_rejected_before_store() {
        let store = MockDatastore::new();
        let hasher = MockPasswordHasher::new();

        let result = register_user(&store, &hasher, &payload("kid", "2012-01-01"), today()).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.public_message(), "User must be at least 13 years old to sign up");
    }

    #[tokio::test]
    async fn test_thirteen_by_calendar_year_is_accepted() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_find_by_email().returning(|_| Ok(None));
        store.expect_insert().times(1).returning(|_| Ok(()));

        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().returning(|_| Ok("digest".to_string()));

        // Not yet 13 by the calendar, but 2024 - 2011 = 13
        let result = register_user(&store, &hasher, &payload("teen", "2011-12-31"), today()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username()
            .with(eq("alice"))
            .times(1)
            .returning(|name| Ok(Some(existing(name))));

        let hasher = MockPasswordHasher::new();

        let result = register_user(&store, &hasher, &payload("alice", "1990-01-01"), today()).await;

        let err = result.unwrap_err();
        assert!(matches!(err, RegistrationError::UsernameExists));
        assert_eq!(err.public_message(), "User already exists with same username!");
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_find_by_email()
            .with(eq("bob@example.com"))
            .returning(|_| Ok(Some(existing("someone-else"))));

        let hasher = MockPasswordHasher::new();

        let result = register_user(&store, &hasher, &payload("bob", "1990-01-01"), today()).await;

        assert!(matches!(result, Err(RegistrationError::EmailExists)));
    }

    #[tokio::test]
    async fn test_successful_registration_persists_unbanned_digest() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_find_by_email().returning(|_| Ok(None));
        store.expect_insert()
            .withf(|user| {
                user.username == "carol"
                    && user.email == "carol@example.com"
                    && user.password_digest == "hashed:correct horse"
                    && !user.is_banned
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash()
            .with(eq("correct horse"))
            .times(1)
            .returning(|p| Ok(format!("hashed:{}", p)));

        let user = register_user(&store, &hasher, &payload("carol", "1985-03-09"), today()).await.unwrap();

        assert_eq!(user.date_of_birth, NaiveDate::from_ymd_opt(1985, 3, 9).unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_dob_fails_after_duplicate_checks() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().times(1).returning(|_| Ok(None));
        store.expect_find_by_email().times(1).returning(|_| Ok(None));

        let hasher = MockPasswordHasher::new();

        let result = register_user(&store, &hasher, &payload("dave", "not a date"), today()).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.public_message(), "Invalid date of birth: not a date");
    }

    #[tokio::test]
    async fn test_insert_conflict_maps_to_duplicate() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_find_by_email().returning(|_| Ok(None));
        store.expect_insert().returning(|_| Err(StoreError::Conflict(UniqueField::Email)));

        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().returning(|_| Ok("digest".to_string()));

        let result = register_user(&store, &hasher, &payload("erin", "1990-01-01"), today()).await;

        assert!(matches!(result, Err(RegistrationError::EmailExists)));
    }

    #[tokio::test]
    async fn test_store_failure_passes_message_through() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username()
            .returning(|_| Err(StoreError::Connection("pool exhausted".to_string())));

        let hasher = MockPasswordHasher::new();

        let err = register_user(&store, &hasher, &payload("frank", "1990-01-01"), today()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.public_message(), "Connection error: pool exhausted");
    }

    #[tokio::test]
    async fn test_hash_failure_is_internal() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_find_by_email().returning(|_| Ok(None));

        let mut hasher = MockPasswordHasher::new();
        hasher.expect_hash().returning(|_| Err(anyhow::anyhow!("out of memory")));

        let err = register_user(&store, &hasher, &payload("grace", "1990-01-01"), today()).await.unwrap_err();

        assert_eq!(err.public_message(), "Failed to hash password: out of memory");
    }

    #[tokio::test]
    async fn test_missing_password_fails_after_duplicate_checks() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username()
            .returning(|name| Ok(Some(existing(name))));

        let hasher = MockPasswordHasher::new();

        let mut taken = payload("alice", "1990-01-01");
        taken.password = None;
        let result = register_user(&store, &hasher, &taken, today()).await;
        assert!(matches!(result, Err(RegistrationError::UsernameExists)));

        let mut store = MockDatastore::new();
        store.expect_find_by_username().times(1).returning(|_| Ok(None));
        store.expect_find_by_email().times(1).returning(|_| Ok(None));

        let mut fresh = payload("ivan", "1990-01-01");
        fresh.password = None;
        let err = register_user(&store, &hasher, &fresh, today()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.public_message(), MISSING_PASSWORD_MESSAGE);
    }

    #[tokio::test]
    async fn test_partial_dates_are_age_checked() {
        let store = MockDatastore::new();
        let hasher = MockPasswordHasher::new();

        let result = register_user(&store, &hasher, &payload("kid", "2020"), today()).await;
        assert!(matches!(result, Err(RegistrationError::Underage)));

        let result = register_user(&store, &hasher, &payload("kid", "2015-05"), today()).await;
        assert!(matches!(result, Err(RegistrationError::Underage)));
    }

    #[test]
    fn test_empty_internal_message_falls_back() {
        let err = RegistrationError::Internal(String::new());
        assert_eq!(err.public_message(), REGISTRATION_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_payload_accepts_date_of_birth_alias() {
        let body = r#"{"username":"h","dateOfBirth":"1990-01-01","email":"h@x.io","password":"p"}"#;
        let payload: RegistrationPayload = serde_json::from_str(body).unwrap();
        assert_eq!(payload.dob, "1990-01-01");
    }

    #[test]
    fn test_payload_without_password_still_parses() {
        let body = r#"{"username":"h","dob":"1990-01-01","email":"h@x.io"}"#;
        let payload: RegistrationPayload = serde_json::from_str(body).unwrap();
        assert!(payload.password.is_none());
    }
}
