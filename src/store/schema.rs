// SQLite schema: table creation and migrations.
//
// A `schema_version` table records which schema revision the file is at,
// matching the Postgres backend's migration bookkeeping.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema revision, recorded in `schema_version`.
const SCHEMA_VERSION: i64 = 1;

/// Create all tables if they don't exist yet.
///
/// This is idempotent: safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Hosts whose links are never tracked (process-wide, not scoped)
        CREATE TABLE IF NOT EXISTS allowed_hosts (
            host TEXT PRIMARY KEY,
            added_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Raw URL strings already seen in a scope
        CREATE TABLE IF NOT EXISTS seen_links (
            scope TEXT NOT NULL,
            url TEXT NOT NULL,
            first_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope, url)
        );

        -- Perceptual image fingerprints already seen in a scope
        CREATE TABLE IF NOT EXISTS seen_images (
            scope TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            first_seen_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope, fingerprint)
        );

        -- One row per scope that has ever had a repost
        CREATE TABLE IF NOT EXISTS repost_counters (
            scope TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        );
        ",
    )
    .context("Failed to create database tables")?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, allowed_hosts, seen_links, seen_images, repost_counters
        assert_eq!(table_count(&conn).unwrap(), 5i64);
    }

    #[test]
    fn test_schema_version_recorded_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        let versions: Vec<i64> = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(versions, vec![SCHEMA_VERSION]);
    }

    #[test]
    fn test_counter_tracks_last_update() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO repost_counters (scope, count, updated_at) VALUES ('1', 1, datetime('now'))",
            [],
        )
        .unwrap();
        let updated: Option<String> = conn
            .query_row("SELECT updated_at FROM repost_counters WHERE scope = '1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(updated.is_some());
    }
}
