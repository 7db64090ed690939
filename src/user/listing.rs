use log::debug;

use crate::database::{Datastore, StoreError};
use crate::database::models::UserRecord;
use crate::user::ErrorKind;

/// User listing error types
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("No users")]
    Empty,

    #[error("Failed to fetch users: {0}")]
    Internal(#[from] StoreError),
}

impl ListingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ListingError::Empty => ErrorKind::NotFound,
            ListingError::Internal(_) => ErrorKind::Infrastructure,
        }
    }

    /// Message returned to the caller; store errors are never surfaced
    pub fn public_message(&self) -> String {
        match self {
            ListingError::Empty => self.to_string(),
            ListingError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

/// Fetch every user; an empty collection is reported as not found
pub async fn list_users(store: &dyn Datastore) -> Result<Vec<UserRecord>, ListingError> {
    debug!("Fetching users");

    let users = store.find_all().await?;
    if users.is_empty() {
        return Err(ListingError::Empty);
    }

    debug!("Fetched {} users", users.len());
    Ok(users)
}
