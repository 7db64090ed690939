// Request handlers
// Turns request envelopes into calls on the user operations and maps
// their outcomes onto status codes and JSON bodies.

mod envelope;

pub use envelope::{Request, Response};

use std::sync::Arc;

use chrono::Utc;
use log::error;
use serde::Serialize;
use serde_json::json;

use crate::database::Datastore;
use crate::database::models::UserRecord;
use crate::security::{PasswordHasher, TokenIssuer};
use crate::user::{
    self, ErrorKind, LoginCredentials, LoginError, RegistrationError, RegistrationPayload,
};

/// Body of a successful login
#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    message: &'a str,
    passed: bool,
    token: &'a str,
    user: &'a UserRecord,
}

/// Entry points for the list, register and login operations
#[derive(Clone)]
pub struct UserController {
    store: Arc<dyn Datastore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    redact_password_digest: bool,
}

impl UserController {
    pub fn new(
        store: Arc<dyn Datastore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            redact_password_digest: false,
        }
    }

    /// Blank out password digests in listing and login responses
    pub fn with_redaction(mut self, redact_password_digest: bool) -> Self {
        self.redact_password_digest = redact_password_digest;
        self
    }

    fn present(&self, user: &UserRecord) -> UserRecord {
        if self.redact_password_digest {
            user.redacted()
        } else {
            user.clone()
        }
    }

    /// List every user
    pub async fn get_users(&self, _request: &Request) -> Response {
        match user::list_users(self.store.as_ref()).await {
            Ok(users) => {
                let users: Vec<UserRecord> = users.iter().map(|u| self.present(u)).collect();
                Response::json(200, &users)
            }
            Err(e) => {
                if e.kind() == ErrorKind::Infrastructure {
                    error!("Error fetching users: {}", e);
                }
                Response::message(e.kind().status_code(), &e.public_message())
            }
        }
    }

    /// Register a new user from a `{username, dob, email, password}` body
    pub async fn create_user(&self, request: &Request) -> Response {
        let result = match serde_json::from_str::<RegistrationPayload>(request.body_text()) {
            Ok(payload) => {
                let today = Utc::now().date_naive();
                user::register_user(self.store.as_ref(), self.hasher.as_ref(), &payload, today)
                    .await
                    .map(|_| ())
            }
            Err(e) => Err(RegistrationError::InvalidPayload(e.to_string())),
        };

        match result {
            Ok(()) => Response::message(201, "User created successfully"),
            Err(e) => {
                if e.kind() == ErrorKind::Infrastructure {
                    error!("Error creating user: {}", e);
                }
                Response::message(e.kind().status_code(), &e.public_message())
            }
        }
    }

    /// Check `{username, password}` and issue a token
    pub async fn login_user(&self, request: &Request) -> Response {
        let result = match serde_json::from_str::<LoginCredentials>(request.body_text()) {
            Ok(credentials) => {
                user::login_user(
                    self.store.as_ref(),
                    self.hasher.as_ref(),
                    self.tokens.as_ref(),
                    &credentials,
                ).await
            }
            Err(e) => Err(LoginError::Internal(format!("Invalid login payload: {}", e))),
        };

        match result {
            Ok(success) => {
                let user = self.present(&success.user);
                Response::json(200, &LoginBody {
                    message: "Login successful",
                    passed: true,
                    token: &success.token,
                    user: &user,
                })
            }
            Err(e) if e.is_credential_failure() => Response::json(
                e.kind().status_code(),
                &json!({ "message": e.public_message(), "passed": false }),
            ),
            Err(e) => {
                if e.kind() == ErrorKind::Infrastructure {
                    error!("Error during login: {}", e);
                }
                Response::message(e.kind().status_code(), &e.public_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MockDatastore, StoreError};
    use crate::security::jwt::MockTokenIssuer;
    use crate::security::password::MockPasswordHasher;
    use chrono::NaiveDate;

    fn controller(store: MockDatastore, hasher: MockPasswordHasher, tokens: MockTokenIssuer) -> UserController {
        UserController::new(Arc::new(store), Arc::new(hasher), Arc::new(tokens))
    }

    fn stored(username: &str) -> UserRecord {
        UserRecord::new(
            username.to_string(),
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            format!("{}@example.com", username),
            "stored-digest".to_string(),
        )
    }

    #[tokio::test]
    async fn test_listing_store_failure_is_500() {
        let mut store = MockDatastore::new();
        store.expect_find_all().returning(|| Err(StoreError::Query("boom".to_string())));

        let response = controller(store, MockPasswordHasher::new(), MockTokenIssuer::new())
            .get_users(&Request::default())
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body_json().unwrap(), json!({ "message": "Internal Server Error" }));
    }

    #[tokio::test]
    async fn test_listing_can_redact_digests() {
        let mut store = MockDatastore::new();
        store.expect_find_all().returning(|| Ok(vec![stored("alice")]));

        let response = controller(store, MockPasswordHasher::new(), MockTokenIssuer::new())
            .with_redaction(true)
            .get_users(&Request::default())
            .await;

        assert_eq!(response.status_code, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body[0]["username"], "alice");
        assert_eq!(body[0]["passwordDigest"], "");
    }

    #[tokio::test]
    async fn test_register_malformed_body_is_500_with_parse_message() {
        let response = controller(MockDatastore::new(), MockPasswordHasher::new(), MockTokenIssuer::new())
            .create_user(&Request::with_body("{not json"))
            .await;

        assert_eq!(response.status_code, 500);
        let message = response.body_json().unwrap()["message"].as_str().unwrap().to_string();
        assert!(!message.is_empty());
        assert_ne!(message, "User created successfully");
    }

    #[tokio::test]
    async fn test_register_missing_body_is_500() {
        let response = controller(MockDatastore::new(), MockPasswordHasher::new(), MockTokenIssuer::new())
            .create_user(&Request::default())
            .await;

        assert_eq!(response.status_code, 500);
    }

    #[tokio::test]
    async fn test_register_reserved_name_is_400() {
        let body = json!({
            "username": "Admin",
            "dob": "1980-01-01",
            "email": "root@example.com",
            "password": "pw",
        });

        let response = controller(MockDatastore::new(), MockPasswordHasher::new(), MockTokenIssuer::new())
            .create_user(&Request::with_body(body.to_string()))
            .await;

        assert_eq!(response.status_code, 400);
        assert_eq!(
            response.body_json().unwrap()["message"],
            "Users are not allowed to use Admin as username, Try different username"
        );
    }

    #[tokio::test]
    async fn test_register_missing_password_reports_duplicate_first() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|name| Ok(Some(stored(name))));

        let body = json!({ "username": "alice", "dob": "1990-01-01", "email": "a@example.com" });
        let response = controller(store, MockPasswordHasher::new(), MockTokenIssuer::new())
            .create_user(&Request::with_body(body.to_string()))
            .await;

        assert_eq!(response.status_code, 400);
        assert_eq!(response.body_json().unwrap()["message"], "User already exists with same username!");
    }

    #[tokio::test]
    async fn test_register_missing_password_is_500_after_checks() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_find_by_email().returning(|_| Ok(None));

        let body = json!({ "username": "bob", "dob": "1990-01-01", "email": "b@example.com" });
        let response = controller(store, MockPasswordHasher::new(), MockTokenIssuer::new())
            .create_user(&Request::with_body(body.to_string()))
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.body_json().unwrap(),
            json!({ "message": "data and salt arguments required" })
        );
    }

    #[tokio::test]
    async fn test_login_malformed_body_is_generic_500() {
        let response = controller(MockDatastore::new(), MockPasswordHasher::new(), MockTokenIssuer::new())
            .login_user(&Request::with_body(r#"{"username": 42}"#))
            .await;

        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.body_json().unwrap(),
            json!({ "message": "Error during login. Please try again." })
        );
    }

    #[tokio::test]
    async fn test_login_banned_body_has_no_passed_flag() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|name| {
            let mut user = stored(name);
            user.is_banned = true;
            Ok(Some(user))
        });

        let response = controller(store, MockPasswordHasher::new(), MockTokenIssuer::new())
            .login_user(&Request::with_body(r#"{"username":"alice","password":"x"}"#))
            .await;

        assert_eq!(response.status_code, 403);
        assert_eq!(
            response.body_json().unwrap(),
            json!({ "message": "You have been banned, contact admins." })
        );
    }

    #[tokio::test]
    async fn test_login_success_echoes_record() {
        let mut store = MockDatastore::new();
        store.expect_find_by_username().returning(|name| Ok(Some(stored(name))));

        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| Ok(true));

        let mut tokens = MockTokenIssuer::new();
        tokens.expect_issue().returning(|_| Ok("tok".to_string()));

        let response = controller(store, hasher, tokens)
            .login_user(&Request::with_body(r#"{"username":"alice","password":"x"}"#))
            .await;

        assert_eq!(response.status_code, 200);
        let body = response.body_json().unwrap();
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["passed"], true);
        assert_eq!(body["token"], "tok");
        assert_eq!(body["user"]["passwordDigest"], "stored-digest");
    }
}
