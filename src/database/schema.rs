use anyhow::{Result, Context};
use log::debug;
use rusqlite::Connection;

/// Create the database schema
pub fn create_schema(conn: &mut Connection) -> Result<()> {
    debug!("Creating database schema");

    // Use a transaction to ensure the table and its indices are created together
    let tx = conn.transaction().context("Failed to start transaction for schema creation")?;

    // Create users table; UNIQUE backs up the registration pre-checks
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            date_of_birth TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_digest TEXT NOT NULL,
            is_banned INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    ).context("Failed to create users table")?;

    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_username ON users(username)",
        [],
    ).context("Failed to create username index")?;

    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        [],
    ).context("Failed to create email index")?;

    tx.commit().context("Failed to commit schema transaction")?;

    debug!("Database schema created");
    Ok(())
}
