// MemoryStore: process-local FingerprintStore.
//
// Holds every namespace in one map keyed by (namespace, scope). Used by
// tests and by `recycler listen --ephemeral` when nothing should outlive
// the process.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::{Namespace, ScopeStats};
use super::traits::FingerprintStore;
use crate::error::StoreResult;
use crate::scope::Scope;

/// Scope key for the process-wide allow-list.
const GLOBAL: &str = "";

#[derive(Default)]
pub struct MemoryStore {
    sets: Mutex<HashMap<(Namespace, String), HashSet<String>>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the allow-list, as if the hosts had been persisted earlier.
    pub async fn with_allowed_hosts<I, S>(self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut sets = self.sets.lock().await;
            let allow = sets
                .entry((Namespace::AllowList, GLOBAL.to_string()))
                .or_default();
            allow.extend(hosts.into_iter().map(Into::into));
        }
        self
    }

    async fn contains(&self, ns: Namespace, scope: &str, member: &str) -> bool {
        let sets = self.sets.lock().await;
        sets.get(&(ns, scope.to_string()))
            .is_some_and(|set| set.contains(member))
    }

    async fn insert(&self, ns: Namespace, scope: &str, member: &str) {
        let mut sets = self.sets.lock().await;
        sets.entry((ns, scope.to_string()))
            .or_default()
            .insert(member.to_string());
    }

    async fn cardinality(&self, ns: Namespace, scope: &str) -> u64 {
        let sets = self.sets.lock().await;
        sets.get(&(ns, scope.to_string()))
            .map_or(0, |set| set.len() as u64)
    }
}

#[async_trait]
impl FingerprintStore for MemoryStore {
    async fn contains_link(&self, scope: &Scope, url: &str) -> StoreResult<bool> {
        Ok(self.contains(Namespace::SeenLinks, scope.as_str(), url).await)
    }

    async fn add_link(&self, scope: &Scope, url: &str) -> StoreResult<()> {
        self.insert(Namespace::SeenLinks, scope.as_str(), url).await;
        Ok(())
    }

    async fn contains_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<bool> {
        Ok(self
            .contains(Namespace::SeenImages, scope.as_str(), fingerprint)
            .await)
    }

    async fn add_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<()> {
        self.insert(Namespace::SeenImages, scope.as_str(), fingerprint)
            .await;
        Ok(())
    }

    async fn increment_repost_counter(&self, scope: &Scope) -> StoreResult<()> {
        let mut counters = self.counters.lock().await;
        *counters.entry(scope.as_str().to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn stats(&self, scope: &Scope) -> StoreResult<ScopeStats> {
        let link_count = self.cardinality(Namespace::SeenLinks, scope.as_str()).await;
        let image_count = self.cardinality(Namespace::SeenImages, scope.as_str()).await;
        let repost_count = self
            .counters
            .lock()
            .await
            .get(scope.as_str())
            .copied()
            .unwrap_or(0);

        Ok(ScopeStats {
            link_count,
            image_count,
            repost_count,
        })
    }

    async fn allowed_hosts(&self) -> StoreResult<Vec<String>> {
        let sets = self.sets.lock().await;
        let mut hosts: Vec<String> = sets
            .get(&(Namespace::AllowList, GLOBAL.to_string()))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        hosts.sort();
        Ok(hosts)
    }

    async fn allow_host(&self, host: &str) -> StoreResult<()> {
        self.insert(Namespace::AllowList, GLOBAL, host).await;
        Ok(())
    }

    async fn disallow_host(&self, host: &str) -> StoreResult<bool> {
        let mut sets = self.sets.lock().await;
        Ok(sets
            .get_mut(&(Namespace::AllowList, GLOBAL.to_string()))
            .is_some_and(|set| set.remove(host)))
    }
}
