//! Database layer for the chapter server
//!
//! Uses SQLite with sqlx.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;

mod chapter_progress;
mod chapter_state;
mod commanders;
mod config_entries;

pub use chapter_progress::*;
pub use chapter_state::*;
pub use commanders::*;
pub use config_entries::*;

/// Database connection pool type.
pub type DbPool = SqlitePool;

/// Create a database connection pool.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(50)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}

/// Initialize the database schema.
pub async fn init_database(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Fresh in-memory database with the schema applied.
///
/// A single connection that never expires, since every new connection to
/// `sqlite::memory:` would see its own empty database.
#[cfg(test)]
pub async fn test_pool() -> DbPool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_database(&pool).await.expect("migrations");
    pool
}
