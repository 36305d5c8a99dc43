// Message evaluation: the whole repost decision for one message.
//
// Phases, in order:
//   1. fetch every item (bounded concurrency) and decode the images
//   2. classify each item against the store, then record every decoded
//      image's fingerprint (lookups for the whole message come first)
//   3. if anything is a duplicate: recycle the message once and bump the
//      scope's counter once
//   4. persist the fresh links
//
// Writing only after every item has been classified is what keeps two copies
// of a new link or image in the same message from flagging each other. It
// gives no isolation between concurrent messages, and doesn't need to: two
// messages racing to introduce the same link both see it as fresh and both write it,
// which the idempotent set-add absorbs.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::chat::{self, ChatClient, MessageRef};
use crate::classify::{
    AllowList, ImageClassifier, ImageOutcome, ImagePolicy, LinkClassifier, Verdict,
};
use crate::error::{DecodeError, FetchError, StoreError};
use crate::fetch::{ContentFetcher, ContentKind};
use crate::imaging::{DecodedImage, ImageDecoder};
use crate::scope::Scope;
use crate::store::FingerprintStore;

/// Default number of items fetched at once for a single message.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// The visible side effect applied to a flagged message.
#[async_trait]
pub trait RecycleSignal: Send + Sync {
    async fn recycle(&self);
}

/// For evaluations with no chat message to mark (e.g. `recycler check`).
pub struct NoSignal;

#[async_trait]
impl RecycleSignal for NoSignal {
    async fn recycle(&self) {}
}

/// Marks a chat message with the recycle reaction (or fallback message).
pub struct ChatMarker<'a> {
    pub chat: &'a dyn ChatClient,
    pub message: MessageRef,
}

#[async_trait]
impl RecycleSignal for ChatMarker<'_> {
    async fn recycle(&self) {
        chat::mark_recycled(self.chat, &self.message).await;
    }
}

/// Why an item dropped out of detection.
#[derive(Debug)]
pub enum DropReason {
    Fetch(FetchError),
    Decode(DecodeError),
    Store(StoreError),
}

#[derive(Debug)]
pub enum ItemOutcome {
    Classified {
        kind: ContentKind,
        verdict: Verdict,
        /// Present for images.
        fingerprint: Option<String>,
    },
    /// Neither flagged nor recorded.
    Dropped(DropReason),
}

#[derive(Debug)]
pub struct ItemReport {
    pub url: String,
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn verdict(&self) -> Option<Verdict> {
        match &self.outcome {
            ItemOutcome::Classified { verdict, .. } => Some(*verdict),
            ItemOutcome::Dropped(_) => None,
        }
    }
}

/// Everything decided about one message.
#[derive(Debug)]
pub struct Evaluation {
    pub scope: Scope,
    pub items: Vec<ItemReport>,
    /// At least one item was a duplicate.
    pub flagged: bool,
}

impl Evaluation {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.items
            .iter()
            .filter(|item| item.verdict() == Some(verdict))
            .count()
    }

    pub fn dropped(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.verdict().is_none())
            .count()
    }
}

/// What phase 1 produced for one item.
enum Prepared {
    NonImage,
    Image { animated: bool, image: DecodedImage },
}

pub struct MessageEvaluator {
    store: Arc<dyn FingerprintStore>,
    fetcher: Arc<dyn ContentFetcher>,
    decoder: Arc<dyn ImageDecoder>,
    links: LinkClassifier,
    images: ImageClassifier,
    fetch_concurrency: usize,
}

impl MessageEvaluator {
    pub fn new(
        store: Arc<dyn FingerprintStore>,
        fetcher: Arc<dyn ContentFetcher>,
        decoder: Arc<dyn ImageDecoder>,
        allow_list: AllowList,
        policy: ImagePolicy,
    ) -> Self {
        Self {
            links: LinkClassifier::new(store.clone(), allow_list),
            images: ImageClassifier::new(store.clone(), policy),
            store,
            fetcher,
            decoder,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    /// Evaluate one message's items (text links, then attachments).
    ///
    /// Never fails: every per-item error is logged and the item dropped.
    pub async fn evaluate(
        &self,
        scope: &Scope,
        items: Vec<String>,
        signal: &dyn RecycleSignal,
    ) -> Evaluation {
        // Phase 1: fetch + decode
        let prepared = self.prepare_all(items).await;

        // Phase 2: classify (reads only)
        let mut reports = Vec::with_capacity(prepared.len());
        for (url, item) in prepared {
            let outcome = match item {
                Ok(item) => self.classify(scope, &url, item).await,
                Err(reason) => ItemOutcome::Dropped(reason),
            };
            match &outcome {
                ItemOutcome::Classified { verdict, .. } => {
                    debug!(scope = %scope, url = %url, ?verdict, "Item classified");
                }
                ItemOutcome::Dropped(reason) => {
                    warn!(scope = %scope, url = %url, reason = ?reason, "Dropping item");
                }
            }
            reports.push(ItemReport { url, outcome });
        }

        // Every classified image is recorded, whatever its verdict
        for report in &reports {
            if let ItemOutcome::Classified {
                fingerprint: Some(fingerprint),
                ..
            } = &report.outcome
            {
                self.images.record(scope, fingerprint).await;
            }
        }

        // Phase 3: one recycle per message, however many duplicates
        let flagged = reports
            .iter()
            .any(|r| r.verdict().is_some_and(Verdict::is_duplicate));
        if flagged {
            info!(
                scope = %scope,
                duplicates = reports.iter().filter(|r| r.verdict() == Some(Verdict::Duplicate)).count(),
                "Repost detected"
            );
            signal.recycle().await;
            if let Err(e) = self.store.increment_repost_counter(scope).await {
                warn!(scope = %scope, error = %e, "Failed to increment repost counter");
            }
        }

        // Phase 4: deferred persistence of fresh links
        for report in &reports {
            if report.verdict() == Some(Verdict::Fresh) {
                if let Err(e) = self.store.add_link(scope, &report.url).await {
                    warn!(scope = %scope, url = %report.url, error = %e, "Failed to record link");
                }
            }
        }

        Evaluation {
            scope: scope.clone(),
            items: reports,
            flagged,
        }
    }

    /// Fetch every item and decode images, preserving item order.
    async fn prepare_all(&self, items: Vec<String>) -> Vec<(String, Result<Prepared, DropReason>)> {
        stream::iter(items)
            .map(|url| async move {
                let prepared = self.prepare(&url).await;
                (url, prepared)
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await
    }

    async fn prepare(&self, url: &str) -> Result<Prepared, DropReason> {
        let fetched = self.fetcher.fetch(url).await.map_err(DropReason::Fetch)?;

        match fetched.kind {
            ContentKind::NonImage => Ok(Prepared::NonImage),
            ContentKind::Image { animated } => {
                let image = self.decode(fetched.body).await.map_err(DropReason::Decode)?;
                Ok(Prepared::Image { animated, image })
            }
        }
    }

    /// Decode on a blocking thread so large images don't stall the runtime.
    async fn decode(&self, body: Vec<u8>) -> Result<DecodedImage, DecodeError> {
        let decoder = Arc::clone(&self.decoder);
        tokio::task::spawn_blocking(move || decoder.decode(&body))
            .await
            .unwrap_or_else(|e| Err(DecodeError(format!("decoder task failed: {e}"))))
    }

    async fn classify(&self, scope: &Scope, url: &str, item: Prepared) -> ItemOutcome {
        let link = match self.links.classify(scope, url).await {
            Ok(verdict) => verdict,
            Err(e) => return ItemOutcome::Dropped(DropReason::Store(e)),
        };

        match item {
            Prepared::NonImage => ItemOutcome::Classified {
                kind: ContentKind::NonImage,
                verdict: link,
                fingerprint: None,
            },
            Prepared::Image { animated, image } => {
                let outcome = match self
                    .images
                    .classify(scope, &image.fingerprint, image.width, image.height, animated)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => return ItemOutcome::Dropped(DropReason::Store(e)),
                };
                ItemOutcome::Classified {
                    kind: ContentKind::Image { animated },
                    verdict: combine(link, outcome),
                    fingerprint: Some(image.fingerprint),
                }
            }
        }
    }
}

/// Merge the link verdict and the image outcome for an image item.
///
/// An allow-listed host wins outright. A policy-suppressed image can't flag
/// even if its URL was seen before. Otherwise either match is a duplicate.
pub fn combine(link: Verdict, image: ImageOutcome) -> Verdict {
    match (link, image) {
        (Verdict::Exempt, _) => Verdict::Exempt,
        (_, ImageOutcome::Suppressed(_)) => Verdict::Fresh,
        (Verdict::Duplicate, _) | (_, ImageOutcome::Duplicate) => Verdict::Duplicate,
        _ => Verdict::Fresh,
    }
}
