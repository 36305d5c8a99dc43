// Shared stub collaborators for the integration tests.
//
// No network, no real images: the fetcher serves canned responses and the
// decoder reads "WIDTHxHEIGHT:fingerprint" out of the body bytes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use recycler::chat::{ChatClient, Embed, MessageRef};
use recycler::classify::{AllowList, ImagePolicy};
use recycler::error::{DecodeError, FetchError, ReactionError, StoreError, StoreResult};
use recycler::evaluator::MessageEvaluator;
use recycler::fetch::{ContentFetcher, ContentKind, FetchedContent};
use recycler::imaging::{DecodedImage, ImageDecoder};
use recycler::scope::Scope;
use recycler::store::{FingerprintStore, MemoryStore, ScopeStats};

// --- Fetcher ---

#[derive(Clone)]
enum Canned {
    Page,
    Image { content_type: String, body: Vec<u8> },
    Fail,
}

#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, Canned>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Canned::Page);
        self
    }

    /// A still image of the given size and fingerprint.
    pub fn image(self, url: &str, width: u32, height: u32, fingerprint: &str) -> Self {
        self.image_with_type(url, "image/png", width, height, fingerprint)
    }

    pub fn gif(self, url: &str, width: u32, height: u32, fingerprint: &str) -> Self {
        self.image_with_type(url, "image/gif", width, height, fingerprint)
    }

    fn image_with_type(
        mut self,
        url: &str,
        content_type: &str,
        width: u32,
        height: u32,
        fingerprint: &str,
    ) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned::Image {
                content_type: content_type.to_string(),
                body: format!("{width}x{height}:{fingerprint}").into_bytes(),
            },
        );
        self
    }

    /// Claims to be an image but isn't one.
    pub fn broken_image(mut self, url: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Canned::Image {
                content_type: "image/jpeg".to_string(),
                body: b"garbage".to_vec(),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Canned::Fail);
        self
    }
}

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        match self.responses.get(url) {
            Some(Canned::Page) => Ok(FetchedContent {
                kind: ContentKind::from_content_type("text/html; charset=utf-8"),
                body: Vec::new(),
            }),
            Some(Canned::Image { content_type, body }) => Ok(FetchedContent {
                kind: ContentKind::from_content_type(content_type),
                body: body.clone(),
            }),
            Some(Canned::Fail) | None => Err(FetchError::Request {
                url: url.to_string(),
                cause: "connection refused".to_string(),
            }),
        }
    }
}

// --- Decoder ---

pub struct StubDecoder;

impl ImageDecoder for StubDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|e| DecodeError(e.to_string()))?;
        let parse = || -> Option<DecodedImage> {
            let (size, fingerprint) = text.split_once(':')?;
            let (w, h) = size.split_once('x')?;
            Some(DecodedImage {
                width: w.parse().ok()?,
                height: h.parse().ok()?,
                fingerprint: fingerprint.to_string(),
            })
        };
        parse().ok_or_else(|| DecodeError(format!("not an image: {text}")))
    }
}

// --- Chat ---

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Reaction { message_id: u64, emoji: String },
    Message { channel_id: u64, content: String, embed: Option<Embed> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactionMode {
    #[default]
    Allow,
    Deny,
    Fail,
}

#[derive(Default)]
pub struct RecordingChat {
    mode: ReactionMode,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingChat {
    pub fn new(mode: ReactionMode) -> Self {
        Self {
            mode,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> Result<(), ReactionError> {
        match self.mode {
            ReactionMode::Allow => {
                self.sent.lock().unwrap().push(Sent::Reaction {
                    message_id: message.message_id,
                    emoji: emoji.to_string(),
                });
                Ok(())
            }
            ReactionMode::Deny => Err(ReactionError::Denied),
            ReactionMode::Fail => Err(ReactionError::Other("unknown emoji".to_string())),
        }
    }

    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
        embed: Option<&Embed>,
    ) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(Sent::Message {
            channel_id,
            content: content.to_string(),
            embed: embed.cloned(),
        });
        Ok(())
    }
}

// --- Store ---

/// A MemoryStore that can be switched off to simulate an outage.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self, operation: &'static str) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::unavailable(operation, "connection reset"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FingerprintStore for FlakyStore {
    async fn contains_link(&self, scope: &Scope, url: &str) -> StoreResult<bool> {
        self.check("contains_link")?;
        self.inner.contains_link(scope, url).await
    }

    async fn add_link(&self, scope: &Scope, url: &str) -> StoreResult<()> {
        self.check("add_link")?;
        self.inner.add_link(scope, url).await
    }

    async fn contains_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<bool> {
        self.check("contains_image")?;
        self.inner.contains_image(scope, fingerprint).await
    }

    async fn add_image(&self, scope: &Scope, fingerprint: &str) -> StoreResult<()> {
        self.check("add_image")?;
        self.inner.add_image(scope, fingerprint).await
    }

    async fn increment_repost_counter(&self, scope: &Scope) -> StoreResult<()> {
        self.check("increment_repost_counter")?;
        self.inner.increment_repost_counter(scope).await
    }

    async fn stats(&self, scope: &Scope) -> StoreResult<ScopeStats> {
        self.check("stats")?;
        self.inner.stats(scope).await
    }

    async fn allowed_hosts(&self) -> StoreResult<Vec<String>> {
        self.check("allowed_hosts")?;
        self.inner.allowed_hosts().await
    }

    async fn allow_host(&self, host: &str) -> StoreResult<()> {
        self.check("allow_host")?;
        self.inner.allow_host(host).await
    }

    async fn disallow_host(&self, host: &str) -> StoreResult<bool> {
        self.check("disallow_host")?;
        self.inner.disallow_host(host).await
    }
}

// --- Assembly ---

pub fn evaluator(
    store: Arc<dyn FingerprintStore>,
    fetcher: StubFetcher,
    allow_list: AllowList,
    policy: ImagePolicy,
) -> MessageEvaluator {
    MessageEvaluator::new(
        store,
        Arc::new(fetcher),
        Arc::new(StubDecoder),
        allow_list,
        policy,
    )
}

pub fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
