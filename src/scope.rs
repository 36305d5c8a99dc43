// Scope: the isolation boundary for all duplicate state.
//
// Every seen-link, seen-image and repost counter row is keyed by a scope.
// A community gets its own scope (its id as a decimal string); direct
// messages and anything else without a community share the default "0".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one community's slice of duplicate-detection state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// The synthetic scope used for scopeless (direct) messages.
    pub const DEFAULT_ID: &'static str = "0";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the scope for a message from its optional community id.
    pub fn from_community(community_id: Option<u64>) -> Self {
        match community_id {
            Some(id) => Self(id.to_string()),
            None => Self::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self(Self::DEFAULT_ID.to_string())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
