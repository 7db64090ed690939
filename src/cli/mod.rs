// Command-line dispatcher
// Reads request envelopes from a file or stdin and routes them to the
// matching handler.

use anyhow::{Result, Context};
use clap::ValueEnum;
use log::{debug, info};
use std::io::Read;
use std::sync::Arc;

use crate::config::Config;
use crate::database::SqliteDatastore;
use crate::handlers::{Request, Response, UserController};
use crate::security::{Argon2Hasher, Claims, JwtIssuer, TokenIssuer};

/// Handlers reachable through `invoke`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HandlerName {
    /// List every user
    List,
    /// Register a new user
    Register,
    /// Log a user in
    Login,
}

/// Wire the SQLite store, Argon2 hasher and JWT issuer described by `config`
pub fn build_controller(config: &Config) -> Result<UserController> {
    let store = SqliteDatastore::initialize(&config.database)
        .context("Failed to initialize datastore")?;

    let hasher = Argon2Hasher::new(
        config.security.password_memory_cost,
        config.security.password_pepper.as_deref(),
    );

    let tokens = JwtIssuer::from_config(&config.security, &config.app_name);

    Ok(UserController::new(Arc::new(store), Arc::new(hasher), Arc::new(tokens))
        .with_redaction(config.security.redact_password_digest))
}

/// Create the datastore schema without serving a request
pub fn init_datastore(config: &Config) -> Result<()> {
    SqliteDatastore::initialize(&config.database)?;
    info!("Datastore ready at {}", config.database.path);
    Ok(())
}

/// Read a request envelope from `path`, or stdin when no path is given
pub fn read_event(path: Option<&str>) -> Result<Request> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .context(format!("Failed to read event file: {}", path))?,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input).context("Failed to read event from stdin")?;
            input
        }
    };

    parse_event(&raw)
}

/// Parse a request envelope; blank input is a request without a body
pub fn parse_event(raw: &str) -> Result<Request> {
    if raw.trim().is_empty() {
        return Ok(Request::default());
    }

    serde_json::from_str(raw).context("Failed to parse request envelope")
}

/// Route a request to the named handler
pub async fn invoke(controller: &UserController, handler: HandlerName, request: &Request) -> Response {
    debug!("Invoking {:?} handler", handler);

    match handler {
        HandlerName::List => controller.get_users(request).await,
        HandlerName::Register => controller.create_user(request).await,
        HandlerName::Login => controller.login_user(request).await,
    }
}

/// Check a token against the configured secret and issuer
pub fn verify_token(config: &Config, token: &str) -> Result<Claims> {
    JwtIssuer::from_config(&config.security, &config.app_name).validate(token)
}
