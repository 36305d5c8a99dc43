// PgStore: PostgreSQL backend implementing the FingerprintStore trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time. Set-adds are `ON CONFLICT DO NOTHING` and
// the counter is a single upsert, so Postgres serializes concurrent writers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::Postgres;

use super::models::ScopeStats;
use super::traits::FingerprintStore;
use crate::error::{StoreError, StoreResult};
use crate::scope::Scope;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

pub struct PgStore {
    pool: PgPool,
}

fn unavailable(operation: &'static str) -> impl FnOnce(sqlx_core::Error) -> StoreError {
    move |e| StoreError::unavailable(operation, e)
}

impl PgStore {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run all pending migrations under a session-level advisory lock so
    /// two instances starting together don't race. The lock and unlock must
    /// run on the same physical connection, so one is held for the duration.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "RECYCLER" as a big-endian i64.
        const MIGRATION_LOCK_KEY: i64 = 0x5245_4359_434C_4552_u64 as i64;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [(1, include_str!("../../migrations/postgres/0001_initial.sql"))];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .unwrap_or(false);

                if !applied {
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit().await?;
                }
            }

            Ok(())
        }
        .await;

        // Always release the lock, then surface any migration error.
        sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock")?;

        migration_result
    }

    async fn count(&self, sql: &'static str, scope: &Scope) -> StoreResult<u64> {
        let count: i64 = sqlx_core::query::query(sql)
            .bind(scope.as_str())
            .fetch_one(&self.pool)
            .await
            .map(|row| row.get::<i64, _>(0))
            .map_err(unavailable("stats"))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl FingerprintStore for PgStore {
    async fn contains_link(&self, scope: &Scope, url: &str) -> StoreResult<bool> {
        sqlx_core::query::query(
            "SELECT EXISTS(SELECT 1 FROM seen_links WHERE scope = $1 AND url = $2)",
        )
        .bind(scope.as_str())
        .bind(url)
        .fetch_one(&self.pool)
        .await
        .map(|row| row.get::<bool, _>(0))
        .map_err(unavailable("contains_link"))
    }

    async fn add_link(&self, scope: &Scope, url: &str) -> StoreResult<()> {
        sqlx_core::query::query(
            "INSERT INTO seen_links (scope, url) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(scope.as_str())
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(unavailable("add_link"))?;
        Ok(())
    }

    async fn contains_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<bool> {
        sqlx_core::query::query(
            "SELECT EXISTS(SELECT 1 FROM seen_images WHERE scope = $1 AND fingerprint = $2)",
        )
        .bind(scope.as_str())
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await
        .map(|row| row.get::<bool, _>(0))
        .map_err(unavailable("contains_image"))
    }

    async fn add_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<()> {
        sqlx_core::query::query(
            "INSERT INTO seen_images (scope, fingerprint) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(scope.as_str())
        .bind(fingerprint)
        .execute(&self.pool)
        .await
        .map_err(unavailable("add_image"))?;
        Ok(())
    }

    async fn increment_repost_counter(&self, scope: &Scope) -> StoreResult<()> {
        sqlx_core::query::query(
            "INSERT INTO repost_counters (scope, count, updated_at)
             VALUES ($1, 1, NOW())
             ON CONFLICT (scope) DO UPDATE SET
                count = repost_counters.count + 1,
                updated_at = NOW()",
        )
        .bind(scope.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable("increment_repost_counter"))?;
        Ok(())
    }

    async fn stats(&self, scope: &Scope) -> StoreResult<ScopeStats> {
        let link_count = self
            .count("SELECT COUNT(*) FROM seen_links WHERE scope = $1", scope)
            .await?;
        let image_count = self
            .count("SELECT COUNT(*) FROM seen_images WHERE scope = $1", scope)
            .await?;
        // COALESCE over an aggregate always yields one row, even for a
        // scope with no counter yet.
        let repost_count = self
            .count(
                "SELECT COALESCE(MAX(count), 0)::BIGINT FROM repost_counters WHERE scope = $1",
                scope,
            )
            .await?;

        Ok(ScopeStats {
            link_count,
            image_count,
            repost_count,
        })
    }

    async fn allowed_hosts(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx_core::query::query("SELECT host FROM allowed_hosts ORDER BY host")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("allowed_hosts"))?;
        Ok(rows.iter().map(|row| row.get::<String, _>(0)).collect())
    }

    async fn allow_host(&self, host: &str) -> StoreResult<()> {
        sqlx_core::query::query("INSERT INTO allowed_hosts (host) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(host)
            .execute(&self.pool)
            .await
            .map_err(unavailable("allow_host"))?;
        Ok(())
    }

    async fn disallow_host(&self, host: &str) -> StoreResult<bool> {
        let result = sqlx_core::query::query("DELETE FROM allowed_hosts WHERE host = $1")
            .bind(host)
            .execute(&self.pool)
            .await
            .map_err(unavailable("disallow_host"))?;
        Ok(result.rows_affected() > 0)
    }
}
