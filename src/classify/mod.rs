// Classifiers: decide, per item, whether something is a repost.
//
// Classifiers only read the store. The one exception is image recording,
// which happens for every decoded image regardless of verdict. Persisting
// fresh links is the evaluator's job, after the whole message is judged.

pub mod image;
pub mod link;

pub use image::{ImageClassifier, ImageOutcome, ImagePolicy, Suppression};
pub use link::{AllowList, LinkClassifier};

use serde::Serialize;

/// Verdict for a single link or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Seen before in this scope. Flags the message.
    Duplicate,
    /// Not seen before. Persisted once the message has been judged.
    Fresh,
    /// Never tracked (allow-listed host). Never flags, never persisted.
    Exempt,
}

impl Verdict {
    pub fn is_duplicate(self) -> bool {
        self == Verdict::Duplicate
    }
}
