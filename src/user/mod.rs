// User management module
// Registration, login and listing over the user collection. Each operation
// returns a typed error whose kind decides the response status.

mod registration;
mod authentication;
mod listing;
pub mod validation;

pub use registration::{register_user, RegistrationError, RegistrationPayload};
pub use authentication::{login_user, LoginCredentials, LoginError, LoginSuccess};
pub use listing::{list_users, ListingError};

/// Failure categories shared by every user operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected by a validation rule
    Validation,
    /// Nothing matched the request
    NotFound,
    /// Account is banned
    Forbidden,
    /// Credentials did not match
    Unauthorized,
    /// Datastore, hashing or token failure
    Infrastructure,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Infrastructure => 500,
        }
    }
}
