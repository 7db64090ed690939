//! User registration, login and listing handlers over a single user
//! collection, with a SQLite datastore, Argon2 password digests and
//! HS256 tokens.

pub mod cli;
pub mod config;
pub mod database;
pub mod handlers;
pub mod security;
pub mod user;
