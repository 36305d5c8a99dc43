// Data models shared by every store backend.

use serde::{Deserialize, Serialize};

/// The sets kept by a keyed backend such as MemoryStore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    AllowList,
    SeenLinks,
    SeenImages,
}

/// Point-in-time counts for one scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeStats {
    pub link_count: u64,
    pub image_count: u64,
    /// Zero when the scope has never had a repost.
    pub repost_count: u64,
}
