// Error taxonomy for per-item processing.
//
// None of these are fatal. The message evaluator consumes each one at the
// item level: the failed item drops out of detection and its siblings carry
// on. Startup, config and CLI code use anyhow instead.

use thiserror::Error;

/// The backing store could not be reached or rejected the operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable during {operation}: {cause}")]
    Unavailable { operation: &'static str, cause: String },
}

impl StoreError {
    pub fn unavailable(operation: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            operation,
            cause: cause.to_string(),
        }
    }
}

/// Fetching a link's content failed (network error or non-success status).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {cause}")]
    Request { url: String, cause: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// The fetched bytes could not be decoded as an image.
#[derive(Debug, Error)]
#[error("could not decode image: {0}")]
pub struct DecodeError(pub String);

/// Attaching the recycle marker to a message failed.
#[derive(Debug, Error)]
pub enum ReactionError {
    /// The platform refused the reaction (missing permission).
    #[error("reaction denied")]
    Denied,

    #[error("reaction failed: {0}")]
    Other(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
