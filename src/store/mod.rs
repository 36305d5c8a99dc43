// Fingerprint store: the content-addressed, per-scope state behind every
// duplicate decision.
//
// SQLite (rusqlite, "bundled") is the default backend; the file lives
// wherever RECYCLER_DB_PATH points (defaults to ./recycler.db). PostgreSQL
// is available behind the `postgres` feature, and MemoryStore keeps
// everything in-process.

pub mod memory;
pub mod models;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod queries;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
pub use models::{Namespace, ScopeStats};
pub use traits::FingerprintStore;

#[cfg(feature = "sqlite")]
use anyhow::{Context, Result};
#[cfg(feature = "sqlite")]
use rusqlite::Connection;
#[cfg(feature = "sqlite")]
use std::path::Path;

/// Open (or create) the SQLite database and run migrations.
#[cfg(feature = "sqlite")]
pub fn initialize_sqlite(db_path: &str) -> Result<sqlite::SqliteStore> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for database: {db_path}"))?;
        }
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;

    // WAL lets the stats command read while the bot is writing
    conn.pragma_update(None, "journal_mode", "WAL")?;

    schema::create_tables(&conn)?;

    Ok(sqlite::SqliteStore::new(conn))
}

/// Open an existing SQLite database (fails if it doesn't exist yet).
#[cfg(feature = "sqlite")]
pub fn open_sqlite(db_path: &str) -> Result<sqlite::SqliteStore> {
    if !Path::new(db_path).exists() {
        anyhow::bail!("Database not found at {db_path}. Run `recycler init` first.");
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database at {db_path}"))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // Cheap and idempotent: picks up migrations added since `init`.
    schema::create_tables(&conn)?;

    Ok(sqlite::SqliteStore::new(conn))
}

/// Connect to PostgreSQL and run migrations.
#[cfg(feature = "postgres")]
pub async fn connect_postgres(database_url: &str) -> anyhow::Result<postgres::PgStore> {
    postgres::PgStore::connect(database_url).await
}
