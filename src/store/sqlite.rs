// SqliteStore: rusqlite backend implementing the FingerprintStore trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across an .await, so a slow fetch in one message
// never blocks another message's store access for longer than one statement.

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::ScopeStats;
use super::queries;
use super::traits::FingerprintStore;
use crate::error::{StoreError, StoreResult};
use crate::scope::Scope;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Count user tables: reported by `recycler init`.
    pub async fn table_count(&self) -> anyhow::Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }
}

fn unavailable(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| StoreError::unavailable(operation, e)
}

#[async_trait]
impl FingerprintStore for SqliteStore {
    async fn contains_link(&self, scope: &Scope, url: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        queries::contains_link(&conn, scope.as_str(), url).map_err(unavailable("contains_link"))
    }

    async fn add_link(&self, scope: &Scope, url: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        queries::add_link(&conn, scope.as_str(), url).map_err(unavailable("add_link"))
    }

    async fn contains_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        queries::contains_image(&conn, scope.as_str(), fingerprint)
            .map_err(unavailable("contains_image"))
    }

    async fn add_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        queries::add_image(&conn, scope.as_str(), fingerprint).map_err(unavailable("add_image"))
    }

    async fn increment_repost_counter(&self, scope: &Scope) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        queries::increment_repost_counter(&conn, scope.as_str())
            .map_err(unavailable("increment_repost_counter"))
    }

    async fn stats(&self, scope: &Scope) -> StoreResult<ScopeStats> {
        let conn = self.conn.lock().await;
        queries::get_stats(&conn, scope.as_str()).map_err(unavailable("stats"))
    }

    async fn allowed_hosts(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn.lock().await;
        queries::get_allowed_hosts(&conn).map_err(unavailable("allowed_hosts"))
    }

    async fn allow_host(&self, host: &str) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        queries::allow_host(&conn, host).map_err(unavailable("allow_host"))
    }

    async fn disallow_host(&self, host: &str) -> StoreResult<bool> {
        let conn = self.conn.lock().await;
        queries::disallow_host(&conn, host).map_err(unavailable("disallow_host"))
    }
}
