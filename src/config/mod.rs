use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow::{Result, Context};
use log::debug;

/// Environment variable holding the token signing secret
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Maximum number of connections in the connection pool
    pub max_connections: u32,
}

/// Security configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    /// JWT secret key for token signing, overridden by `JWT_SECRET`
    pub jwt_secret: String,
    /// JWT token validity in hours
    pub token_validity_hours: i64,
    /// Argon2 memory cost in KiB
    pub password_memory_cost: u32,
    /// Optional pepper mixed into passwords before hashing
    pub password_pepper: Option<String>,
    /// Blank out password digests in login and listing responses
    #[serde(default)]
    pub redact_password_digest: bool,
}

/// Global application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Application name, used as the token issuer
    pub app_name: String,
    /// Application version
    pub version: String,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "user-auth-handlers".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseConfig {
                path: "data/users.db".to_string(),
                max_connections: 10,
            },
            security: SecurityConfig {
                jwt_secret: "change_me_in_production".to_string(),
                token_validity_hours: 24, // 1 day
                password_memory_cost: 19456,
                password_pepper: None,
                redact_password_digest: false,
            },
        }
    }
}

/// Load configuration from file, writing the defaults first if it is missing
pub fn load_config(path: &str) -> Result<Config> {
    // Check if file exists
    if !Path::new(path).exists() {
        debug!("No config at {}, writing defaults", path);
        let default_config = Config::default();
        save_config(path, &default_config)?;
        return Ok(default_config);
    }

    // Read the config file
    let mut file = File::open(path).context(format!("Failed to open config file: {}", path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).context("Failed to read config file")?;

    // Parse the config file
    let config: Config = match path.ends_with(".toml") {
        true => toml::from_str(&contents).context("Failed to parse TOML config")?,
        false => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
    };

    Ok(config)
}

/// Save configuration to file
pub fn save_config(path: &str, config: &Config) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    // Serialize the config
    let serialized = match path.ends_with(".toml") {
        true => toml::to_string_pretty(config).context("Failed to serialize config to TOML")?,
        false => serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?,
    };

    // Write to file
    std::fs::write(path, serialized).context(format!("Failed to write config to file: {}", path))?;

    Ok(())
}

/// Apply `JWT_SECRET` from the environment on top of the file configuration
pub fn apply_env_overrides(config: Config) -> Config {
    override_jwt_secret(config, std::env::var(JWT_SECRET_ENV).ok())
}

fn override_jwt_secret(mut config: Config, secret: Option<String>) -> Config {
    match secret {
        Some(secret) if !secret.is_empty() => {
            debug!("Using signing secret from {}", JWT_SECRET_ENV);
            config.security.jwt_secret = secret;
        }
        _ => {}
    }
    config
}
