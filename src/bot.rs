// The bot's message handler: everything that happens when a message lands.
//
// Bot authors are ignored. The configured admin can send `!rstats` for the
// scope's stats card or `!rkill` to stop the bot. Every other message (the
// admin's included) goes through the evaluator.

use tracing::{info, warn};

use crate::chat::{ChatClient, IncomingMessage};
use crate::evaluator::{ChatMarker, Evaluation, MessageEvaluator};
use crate::extract;
use crate::stats::StatsAggregator;

/// Prefix shared by all admin commands.
const COMMAND_PREFIX: &str = "!r";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stats,
    Kill,
}

impl Command {
    /// Parse an admin command. Only exact matches count.
    pub fn parse(content: &str) -> Option<Self> {
        match content {
            "!rstats" => Some(Command::Stats),
            "!rkill" => Some(Command::Kill),
            _ => None,
        }
    }
}

/// What handling a message amounted to.
#[derive(Debug)]
pub enum Handled {
    /// Authored by a bot; nothing was looked at.
    Ignored,
    /// The admin asked the bot to stop. The caller owns process exit.
    Shutdown,
    Evaluated(Evaluation),
}

pub struct Recycler {
    evaluator: MessageEvaluator,
    stats: StatsAggregator,
    admin_id: Option<u64>,
}

impl Recycler {
    pub fn new(evaluator: MessageEvaluator, stats: StatsAggregator, admin_id: Option<u64>) -> Self {
        Self {
            evaluator,
            stats,
            admin_id,
        }
    }

    pub async fn handle(&self, message: &IncomingMessage, chat: &dyn ChatClient) -> Handled {
        if message.author.bot {
            return Handled::Ignored;
        }

        if self.is_admin(message) && message.content.starts_with(COMMAND_PREFIX) {
            match Command::parse(&message.content) {
                Some(Command::Kill) => {
                    info!(admin_id = message.author.id, "Shutdown requested");
                    return Handled::Shutdown;
                }
                Some(Command::Stats) => self.post_stats(message, chat).await,
                None => {}
            }
        }

        let scope = message.scope();
        let items = extract::message_items(&message.content, &message.attachments);
        let marker = ChatMarker {
            chat,
            message: message.reference(),
        };
        Handled::Evaluated(self.evaluator.evaluate(&scope, items, &marker).await)
    }

    fn is_admin(&self, message: &IncomingMessage) -> bool {
        self.admin_id == Some(message.author.id)
    }

    async fn post_stats(&self, message: &IncomingMessage, chat: &dyn ChatClient) {
        let scope = message.scope();
        let report = match self.stats.report(&scope).await {
            Ok(report) => report,
            Err(e) => {
                warn!(scope = %scope, error = %e, "Failed to build stats report");
                return;
            }
        };

        let embed = report.to_embed();
        if let Err(e) = chat
            .send_message(message.channel_id, "Bot Stats", Some(&embed))
            .await
        {
            warn!(channel_id = message.channel_id, error = %e, "Failed to post stats");
        }
    }
}
