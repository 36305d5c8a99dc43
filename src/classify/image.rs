// Image classification by perceptual fingerprint.
//
// Small images (both sides under the minimum) and, optionally, animated
// images are never flagged: emoji, stickers and reaction GIFs get re-shared
// constantly and flagging them would be noise. Their fingerprints are still
// recorded, so a later full-size repost of the same picture is caught.

use std::sync::Arc;

use tracing::{debug, warn};

use super::Verdict;
use crate::error::StoreResult;
use crate::scope::Scope;
use crate::store::FingerprintStore;

/// Default minimum width/height, in pixels, for an image to be flaggable.
pub const DEFAULT_MIN_DIMENSION: u32 = 200;

/// Which images may be flagged at all.
#[derive(Debug, Clone)]
pub struct ImagePolicy {
    /// An image is exempt when BOTH width and height are below this.
    pub min_dimension: u32,
    /// Never flag animated images (GIFs).
    pub ignore_animated: bool,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            min_dimension: DEFAULT_MIN_DIMENSION,
            ignore_animated: false,
        }
    }
}

/// Why an image was forced to a non-duplicate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    BelowMinimumSize,
    Animated,
}

/// Result of classifying one decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Duplicate,
    Fresh,
    /// Policy says this image can never be a duplicate, whatever the store says.
    Suppressed(Suppression),
}

impl ImageOutcome {
    /// The flagging verdict: suppressed images count as fresh.
    pub fn verdict(self) -> Verdict {
        match self {
            ImageOutcome::Duplicate => Verdict::Duplicate,
            ImageOutcome::Fresh | ImageOutcome::Suppressed(_) => Verdict::Fresh,
        }
    }
}

pub struct ImageClassifier {
    store: Arc<dyn FingerprintStore>,
    policy: ImagePolicy,
}

impl ImageClassifier {
    pub fn new(store: Arc<dyn FingerprintStore>, policy: ImagePolicy) -> Self {
        Self { store, policy }
    }

    /// Classify an image against the fingerprints recorded so far. Never
    /// writes; pair with [`ImageClassifier::record`].
    pub async fn classify(
        &self,
        scope: &Scope,
        fingerprint: &str,
        width: u32,
        height: u32,
        animated: bool,
    ) -> StoreResult<ImageOutcome> {
        let outcome = if width < self.policy.min_dimension && height < self.policy.min_dimension {
            ImageOutcome::Suppressed(Suppression::BelowMinimumSize)
        } else if animated && self.policy.ignore_animated {
            ImageOutcome::Suppressed(Suppression::Animated)
        } else if self.store.contains_image(scope, fingerprint).await? {
            ImageOutcome::Duplicate
        } else {
            ImageOutcome::Fresh
        };

        debug!(scope = %scope, fingerprint, width, height, ?outcome, "Image classified");
        Ok(outcome)
    }

    /// Record a classified image's fingerprint, whatever its outcome.
    ///
    /// Only call once every image in the message has been classified, so
    /// that a message can't match against its own images. A failure only
    /// logs; the verdicts already made stand.
    pub async fn record(&self, scope: &Scope, fingerprint: &str) {
        if let Err(e) = self.store.add_image(scope, fingerprint).await {
            warn!(scope = %scope, fingerprint, error = %e, "Failed to record image fingerprint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn classifier(policy: ImagePolicy) -> (Arc<MemoryStore>, ImageClassifier) {
        let store = Arc::new(MemoryStore::new());
        let classifier = ImageClassifier::new(store.clone(), policy);
        (store, classifier)
    }

    #[tokio::test]
    async fn test_one_small_side_is_not_exempt() {
        let (_store, c) = classifier(ImagePolicy::default());
        let scope = Scope::default();
        // Only one side below the minimum: still flaggable.
        assert_eq!(
            c.classify(&scope, "aaaa", 150, 400, false).await.unwrap(),
            ImageOutcome::Fresh
        );
        c.record(&scope, "aaaa").await;
        assert_eq!(
            c.classify(&scope, "aaaa", 150, 400, false).await.unwrap(),
            ImageOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn test_animated_suppressed_only_when_policy_set() {
        let (_store, lenient) = classifier(ImagePolicy::default());
        let scope = Scope::default();
        lenient.record(&scope, "gif1").await;
        assert_eq!(
            lenient.classify(&scope, "gif1", 480, 270, true).await.unwrap(),
            ImageOutcome::Duplicate
        );

        let (store, strict) = classifier(ImagePolicy {
            ignore_animated: true,
            ..ImagePolicy::default()
        });
        strict.record(&scope, "gif2").await;
        assert_eq!(
            strict.classify(&scope, "gif2", 480, 270, true).await.unwrap(),
            ImageOutcome::Suppressed(Suppression::Animated)
        );
        assert!(store.contains_image(&scope, "gif2").await.unwrap());
    }

    #[tokio::test]
    async fn test_classify_does_not_record() {
        let (store, c) = classifier(ImagePolicy::default());
        let scope = Scope::default();
        c.classify(&scope, "bbbb", 640, 480, false).await.unwrap();
        assert!(!store.contains_image(&scope, "bbbb").await.unwrap());

        c.record(&scope, "bbbb").await;
        assert!(store.contains_image(&scope, "bbbb").await.unwrap());
    }

    #[test]
    fn test_suppressed_outcome_counts_as_fresh() {
        assert_eq!(
            ImageOutcome::Suppressed(Suppression::BelowMinimumSize).verdict(),
            Verdict::Fresh
        );
        assert_eq!(ImageOutcome::Duplicate.verdict(), Verdict::Duplicate);
    }
}
