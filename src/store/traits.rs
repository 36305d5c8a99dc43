// FingerprintStore trait: backend-agnostic async interface for all
// duplicate-detection state.
//
// Implementors: SqliteStore (wraps rusqlite), PgStore (wraps sqlx) and
// MemoryStore. Every method is scoped, and every write is idempotent or an
// atomic increment, so concurrent messages in the same scope never need an
// in-process lock around the store.

use async_trait::async_trait;

use super::models::ScopeStats;
use crate::error::StoreResult;
use crate::scope::Scope;

#[async_trait]
pub trait FingerprintStore: Send + Sync {
    // --- Seen links ---

    /// Whether this exact URL string was previously recorded in the scope.
    async fn contains_link(&self, scope: &Scope, url: &str) -> StoreResult<bool>;

    /// Record a URL. Adding an already-present URL is a no-op.
    async fn add_link(&self, scope: &Scope, url: &str) -> StoreResult<()>;

    // --- Seen images ---

    /// Whether this image fingerprint was previously recorded in the scope.
    async fn contains_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<bool>;

    /// Record an image fingerprint. Idempotent.
    async fn add_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<()>;

    // --- Repost counter ---

    /// Atomically add one to the scope's repost counter.
    async fn increment_repost_counter(&self, scope: &Scope) -> StoreResult<()>;

    /// Point-in-time counts for the scope. The three fields are read
    /// independently and need not be mutually consistent.
    async fn stats(&self, scope: &Scope) -> StoreResult<ScopeStats>;

    // --- Allow-list ---

    /// Every host in the persisted allow-list. Read once at startup.
    async fn allowed_hosts(&self) -> StoreResult<Vec<String>>;

    /// Add a host to the persisted allow-list. Idempotent.
    async fn allow_host(&self, host: &str) -> StoreResult<()>;

    /// Remove a host from the persisted allow-list. Returns whether it was present.
    async fn disallow_host(&self, host: &str) -> StoreResult<bool>;
}
