use anyhow::{Result, Context};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};
use std::fmt;
use std::path::Path;
use log::{info, debug};

use crate::config::DatabaseConfig;

mod schema;
pub mod models;


use models::UserRecord;

/// Fields the store keeps unique across users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => write!(f, "username"),
            UniqueField::Email => write!(f, "email"),
        }
    }
}

/// Datastore error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("A user with the same {0} already exists")]
    Conflict(UniqueField),
}

/// Query and write primitives over the user collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Fetch every user, oldest first.
    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Fetch a user by exact username.
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fetch a user by exact email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Persist a new user.
    async fn insert(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Toggle the ban flag. Returns false when no such user exists.
    async fn set_banned(&self, username: &str, banned: bool) -> Result<bool, StoreError>;
}

/// SQLite-backed datastore sharing one connection pool
#[derive(Clone)]
pub struct SqliteDatastore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteDatastore {
    /// Open (or create) the database described by `config`
    pub fn initialize(config: &DatabaseConfig) -> Result<Self> {
        let db_path = &config.path;

        // Create directory if it doesn't exist
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .build(manager)
            .context("Failed to create database connection pool")?;

        // Get a connection to test and initialize the database
        let mut conn = pool.get().context("Failed to get a database connection")?;
        schema::create_schema(&mut conn).context("Failed to create database schema")?;

        debug!("Using database at {}", db_path);
        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    /// Run a blocking query on a pooled connection off the async executor
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| {
                StoreError::Connection(format!("Failed to get database connection: {}", e))
            })?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Connection(format!("Database task failed: {}", e)))?
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn find_all(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, date_of_birth, email, password_digest, is_banned, created_at
                 FROM users
                 ORDER BY rowid"
            ).map_err(|e| StoreError::Query(format!("Failed to prepare user listing: {}", e)))?;

            let users = stmt.query_map([], user_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| StoreError::Query(format!("Failed to list users: {}", e)))?;

            Ok(users)
        }).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let username = username.to_string();
        self.run(move |conn| find_one(conn, "username", &username)).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let email = email.to_string();
        self.run(move |conn| find_one(conn, "email", &email)).await
    }

    async fn insert(&self, user: &UserRecord) -> Result<(), StoreError> {
        let user = user.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (
                    id, username, date_of_birth, email,
                    password_digest, is_banned, created_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7
                )",
                params![
                    user.id,
                    user.username,
                    user.date_of_birth.format("%Y-%m-%d").to_string(),
                    user.email,
                    user.password_digest,
                    user.is_banned as i32,
                    user.created_at.to_rfc3339(),
                ]
            ).map_err(map_insert_error)?;

            Ok(())
        }).await
    }

    async fn set_banned(&self, username: &str, banned: bool) -> Result<bool, StoreError> {
        let username = username.to_string();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE users SET is_banned = ?1 WHERE username = ?2",
                params![banned as i32, username],
            ).map_err(|e| StoreError::Query(format!("Failed to update ban flag: {}", e)))?;

            Ok(updated > 0)
        }).await
    }
}

/// Fetch a single user matching `column`; `column` is never user input
fn find_one(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRecord>, StoreError> {
    let sql = format!(
        "SELECT id, username, date_of_birth, email, password_digest, is_banned, created_at
         FROM users
         WHERE {} = ?1",
        column
    );

    match conn.query_row(&sql, params![value], user_from_row) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Query(format!("Failed to get user by {}: {}", column, e))),
    }
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserRecord> {
    let date_of_birth: String = row.get(2)?;
    let created_at: String = row.get(6)?;

    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        date_of_birth: NaiveDate::parse_from_str(&date_of_birth, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2,
                rusqlite::types::Type::Text, Box::new(e)))?,
        email: row.get(3)?,
        password_digest: row.get(4)?,
        is_banned: row.get::<_, i32>(5)? != 0,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6,
                rusqlite::types::Type::Text, Box::new(e)))?,
    })
}

/// Translate UNIQUE violations into conflicts on the offending field
fn map_insert_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, Some(msg)) = &e {
        if err.code == rusqlite::ErrorCode::ConstraintViolation {
            if msg.contains("users.username") {
                return StoreError::Conflict(UniqueField::Username);
            }
            if msg.contains("users.email") {
                return StoreError::Conflict(UniqueField::Email);
            }
        }
    }

    StoreError::Query(format!("Failed to insert user: {}", e))
}
