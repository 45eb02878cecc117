//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or create an atomic transaction as
//! the need arises and call through to the functions without any other changes.
//!
//! Timestamps are always bound from Rust, so that every stored value uses the same RFC 3339 text representation and
//! cursor comparisons in SQL order correctly.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod ach_files;
pub mod depositories;
pub mod file_transfer_configs;
pub mod micro_deposits;
pub mod transfers;

const SQLITE_DB_URL: &str = "sqlite://data/ach_gateway.db";

pub fn db_url() -> String {
    let result = env::var("AGW_DATABASE_URL").unwrap_or_else(|_| {
        info!("AGW_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
