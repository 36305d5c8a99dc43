// Chat platform boundary: inbound messages, outbound reactions and replies.
//
// The bot only ever looks at a message's text, attachments, author and
// community. Everything platform-specific sits behind ChatClient. The
// console adapter speaks JSON lines so the bot can be driven by any bridge
// process (or by hand) without linking a platform SDK.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ReactionError;
use crate::scope::Scope;

/// The marker attached to reposts.
pub const RECYCLE_EMOJI: &str = "♻️";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Author {
    pub id: u64,
    #[serde(default)]
    pub bot: bool,
}

/// An inbound chat message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IncomingMessage {
    pub id: u64,
    pub channel_id: u64,
    /// Community the message was posted in; absent for direct messages.
    #[serde(default)]
    pub guild_id: Option<u64>,
    pub author: Author,
    #[serde(default)]
    pub content: String,
    /// Attachment URLs, in attachment order.
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl IncomingMessage {
    pub fn scope(&self) -> Scope {
        Scope::from_community(self.guild_id)
    }

    pub fn reference(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }
}

/// Enough to address a message for a reaction or a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// A rich reply card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub author: String,
    pub colour: u32,
    pub fields: Vec<EmbedField>,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> Result<(), ReactionError>;

    async fn send_message(&self, channel_id: u64, content: &str, embed: Option<&Embed>)
        -> Result<()>;
}

/// Mark a message as a repost.
///
/// Tries a reaction first. If the platform denies it, posts the marker as a
/// plain message instead. Any other failure is logged and dropped; marking
/// must never abort message handling.
pub async fn mark_recycled(chat: &dyn ChatClient, message: &MessageRef) {
    match chat.add_reaction(message, RECYCLE_EMOJI).await {
        Ok(()) => {}
        Err(ReactionError::Denied) => {
            debug!(channel_id = message.channel_id, "Reaction denied, posting marker instead");
            if let Err(e) = chat
                .send_message(message.channel_id, RECYCLE_EMOJI, None)
                .await
            {
                warn!(channel_id = message.channel_id, error = %e, "Failed to post recycle marker");
            }
        }
        Err(e) => {
            debug!(message_id = message.message_id, error = %e, "Ignoring reaction failure");
        }
    }
}

// --- Console adapter ---

/// One outbound action, as written by [`ConsoleChat`].
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Action<'a> {
    React {
        channel_id: u64,
        message_id: u64,
        emoji: &'a str,
    },
    Send {
        channel_id: u64,
        content: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        embed: Option<&'a Embed>,
    },
}

/// ChatClient that writes each action as a JSON line to a writer (stdout
/// for `recycler listen`). Reactions always succeed.
pub struct ConsoleChat<W> {
    out: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> ConsoleChat<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    async fn emit(&self, action: &Action<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(action)?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }

    /// Take the writer back (used by tests to inspect what was emitted).
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ChatClient for ConsoleChat<W> {
    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> Result<(), ReactionError> {
        self.emit(&Action::React {
            channel_id: message.channel_id,
            message_id: message.message_id,
            emoji,
        })
        .await
        .map_err(|e| ReactionError::Other(e.to_string()))
    }

    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
        embed: Option<&Embed>,
    ) -> Result<()> {
        self.emit(&Action::Send {
            channel_id,
            content,
            embed,
        })
        .await
    }
}

/// Parse one inbound JSON line into a message.
pub fn parse_event(line: &str) -> Result<IncomingMessage> {
    serde_json::from_str(line).context("Malformed message event")
}
