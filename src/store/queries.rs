// SQLite queries: every statement the SQLite backend runs.
//
// Kept as free functions over a Connection so they can be tested without
// the async wrapper.

use rusqlite::{params, Connection, OptionalExtension};

use super::models::ScopeStats;

// --- Seen links ---

pub fn contains_link(conn: &Connection, scope: &str, url: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM seen_links WHERE scope = ?1 AND url = ?2)",
        params![scope, url],
        |row| row.get(0),
    )
}

pub fn add_link(conn: &Connection, scope: &str, url: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO seen_links (scope, url) VALUES (?1, ?2)",
        params![scope, url],
    )?;
    Ok(())
}

// --- Seen images ---

pub fn contains_image(conn: &Connection, scope: &str, fingerprint: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM seen_images WHERE scope = ?1 AND fingerprint = ?2)",
        params![scope, fingerprint],
        |row| row.get(0),
    )
}

pub fn add_image(conn: &Connection, scope: &str, fingerprint: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO seen_images (scope, fingerprint) VALUES (?1, ?2)",
        params![scope, fingerprint],
    )?;
    Ok(())
}

// --- Repost counter ---

pub fn increment_repost_counter(conn: &Connection, scope: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO repost_counters (scope, count, updated_at)
         VALUES (?1, 1, datetime('now'))
         ON CONFLICT(scope) DO UPDATE SET
            count = count + 1,
            updated_at = datetime('now')",
        params![scope],
    )?;
    Ok(())
}

pub fn get_repost_count(conn: &Connection, scope: &str) -> rusqlite::Result<u64> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT count FROM repost_counters WHERE scope = ?1",
            params![scope],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0).max(0) as u64)
}

pub fn get_stats(conn: &Connection, scope: &str) -> rusqlite::Result<ScopeStats> {
    let link_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM seen_links WHERE scope = ?1",
        params![scope],
        |row| row.get(0),
    )?;
    let image_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM seen_images WHERE scope = ?1",
        params![scope],
        |row| row.get(0),
    )?;

    Ok(ScopeStats {
        link_count: link_count as u64,
        image_count: image_count as u64,
        repost_count: get_repost_count(conn, scope)?,
    })
}

// --- Allow-list ---

pub fn get_allowed_hosts(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT host FROM allowed_hosts ORDER BY host")?;
    let hosts = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(hosts)
}

pub fn allow_host(conn: &Connection, host: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO allowed_hosts (host) VALUES (?1)",
        params![host],
    )?;
    Ok(())
}

pub fn disallow_host(conn: &Connection, host: &str) -> rusqlite::Result<bool> {
    let removed = conn.execute("DELETE FROM allowed_hosts WHERE host = ?1", params![host])?;
    Ok(removed > 0)
}
