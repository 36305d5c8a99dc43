// Link classification against the allow-list and the seen-links set.

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::Url;
use tracing::debug;

use super::Verdict;
use crate::error::StoreResult;
use crate::scope::Scope;
use crate::store::FingerprintStore;

/// Hosts whose links are never tracked.
///
/// An immutable snapshot taken at startup. Changing it means building a new
/// snapshot and handing it to a new classifier; nothing reloads implicitly.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    hosts: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot the persisted allow-list.
    pub async fn load(store: &dyn FingerprintStore) -> StoreResult<Self> {
        Ok(Self::new(store.allowed_hosts().await?))
    }

    /// Exact hostname match. URLs without a parseable host never match.
    pub fn permits(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| self.hosts.contains(&host))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Extract the hostname of a URL, lowercased by the URL parser.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

/// Classifies raw URL strings. Never writes to the store.
pub struct LinkClassifier {
    store: Arc<dyn FingerprintStore>,
    allow_list: AllowList,
}

impl LinkClassifier {
    pub fn new(store: Arc<dyn FingerprintStore>, allow_list: AllowList) -> Self {
        Self { store, allow_list }
    }

    pub async fn classify(&self, scope: &Scope, url: &str) -> StoreResult<Verdict> {
        if self.allow_list.permits(url) {
            debug!(scope = %scope, url, "Link host is allow-listed");
            return Ok(Verdict::Exempt);
        }

        if self.store.contains_link(scope, url).await? {
            Ok(Verdict::Duplicate)
        } else {
            Ok(Verdict::Fresh)
        }
    }
}
