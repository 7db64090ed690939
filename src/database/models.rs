use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

/// User record as persisted in the `users` collection
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub date_of_birth: NaiveDate,
    pub email: String,
    pub password_digest: String,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(username: String, date_of_birth: NaiveDate, email: String, password_digest: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username,
            date_of_birth,
            email,
            password_digest,
            is_banned: false,
            created_at: Utc::now(),
        }
    }

    /// Copy of the record with the password digest blanked out
    pub fn redacted(&self) -> Self {
        Self {
            password_digest: String::new(),
            ..self.clone()
        }
    }
}
