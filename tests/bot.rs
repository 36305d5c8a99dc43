// The message handler: bot filtering, admin commands, and marking reposts.

mod common;

use std::sync::Arc;

use chrono::Utc;

use common::{evaluator, ReactionMode, RecordingChat, Sent, StubFetcher};
use recycler::bot::{Handled, Recycler};
use recycler::chat::{Author, IncomingMessage, RECYCLE_EMOJI};
use recycler::classify::{AllowList, ImagePolicy, Verdict};
use recycler::scope::Scope;
use recycler::stats::StatsAggregator;
use recycler::store::{FingerprintStore, MemoryStore};

const ADMIN: u64 = 1000;
const GUILD: u64 = 77;
const CHANNEL: u64 = 9;

fn message(id: u64, author: u64, content: &str) -> IncomingMessage {
    IncomingMessage {
        id,
        channel_id: CHANNEL,
        guild_id: Some(GUILD),
        author: Author {
            id: author,
            bot: false,
        },
        content: content.to_string(),
        attachments: Vec::new(),
    }
}

async fn recycler_with(store: Arc<MemoryStore>, fetcher: StubFetcher) -> Recycler {
    let allow = AllowList::load(&*store).await.unwrap();
    let evaluator = evaluator(store.clone(), fetcher, allow, ImagePolicy::default());
    let stats = StatsAggregator::new(store, Utc::now());
    Recycler::new(evaluator, stats, Some(ADMIN))
}

fn fetcher() -> StubFetcher {
    StubFetcher::new()
        .page("https://news.example/story")
        .page("https://youtube.com/watch?v=abc")
        .image("https://cdn.example/meme.png", 500, 500, "fedcba9876543210")
}

fn evaluation(handled: Handled) -> recycler::evaluator::Evaluation {
    match handled {
        Handled::Evaluated(evaluation) => evaluation,
        other => panic!("expected an evaluation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_repost_gets_recycle_reaction() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::new(ReactionMode::Allow);

    recycler
        .handle(&message(1, 5, "look https://news.example/story"), &chat)
        .await;
    assert!(chat.sent().is_empty());

    let handled = recycler
        .handle(&message(2, 6, "old news: https://news.example/story"), &chat)
        .await;
    assert!(evaluation(handled).flagged);
    assert_eq!(
        chat.sent(),
        vec![Sent::Reaction {
            message_id: 2,
            emoji: RECYCLE_EMOJI.to_string(),
        }]
    );
}

#[tokio::test]
async fn test_denied_reaction_falls_back_to_message() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::new(ReactionMode::Deny);

    recycler
        .handle(&message(1, 5, "https://news.example/story"), &chat)
        .await;
    recycler
        .handle(&message(2, 5, "https://news.example/story"), &chat)
        .await;

    assert_eq!(
        chat.sent(),
        vec![Sent::Message {
            channel_id: CHANNEL,
            content: RECYCLE_EMOJI.to_string(),
            embed: None,
        }]
    );
}

#[tokio::test]
async fn test_other_reaction_errors_are_swallowed() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::new(ReactionMode::Fail);

    recycler
        .handle(&message(1, 5, "https://news.example/story"), &chat)
        .await;
    let handled = recycler
        .handle(&message(2, 5, "https://news.example/story"), &chat)
        .await;

    assert!(evaluation(handled).flagged);
    assert!(chat.sent().is_empty());
    // Still counted
    let scope = Scope::from_community(Some(GUILD));
    assert_eq!(store.stats(&scope).await.unwrap().repost_count, 1);
}

#[tokio::test]
async fn test_bot_messages_are_ignored() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    let mut from_bot = message(1, 5, "https://news.example/story");
    from_bot.author.bot = true;

    assert!(matches!(
        recycler.handle(&from_bot, &chat).await,
        Handled::Ignored
    ));
    let scope = Scope::from_community(Some(GUILD));
    assert_eq!(store.stats(&scope).await.unwrap().link_count, 0);
}

#[tokio::test]
async fn test_attachments_are_evaluated_after_text_links() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    let mut msg = message(1, 5, "context: https://news.example/story");
    msg.attachments = vec!["https://cdn.example/meme.png".to_string()];

    let evaluation = evaluation(recycler.handle(&msg, &chat).await);
    let urls: Vec<&str> = evaluation.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://news.example/story", "https://cdn.example/meme.png"]
    );
    assert_eq!(evaluation.count(Verdict::Fresh), 2);
}

#[tokio::test]
async fn test_direct_messages_use_default_scope() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    let mut dm = message(1, 5, "https://news.example/story");
    dm.guild_id = None;

    let evaluation = evaluation(recycler.handle(&dm, &chat).await);
    assert_eq!(evaluation.scope, Scope::default());
    assert_eq!(store.stats(&Scope::default()).await.unwrap().link_count, 1);
}

#[tokio::test]
async fn test_persisted_allow_list_is_honoured() {
    let store = Arc::new(MemoryStore::new().with_allowed_hosts(["youtube.com"]).await);
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    for id in 1..=2 {
        let evaluation = evaluation(
            recycler
                .handle(&message(id, 5, "https://youtube.com/watch?v=abc"), &chat)
                .await,
        );
        assert_eq!(evaluation.count(Verdict::Exempt), 1);
        assert!(!evaluation.flagged);
    }
    assert!(chat.sent().is_empty());
}

#[tokio::test]
async fn test_admin_stats_posts_embed() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    recycler
        .handle(&message(1, 5, "https://news.example/story"), &chat)
        .await;
    recycler
        .handle(&message(2, 5, "https://news.example/story"), &chat)
        .await;
    recycler.handle(&message(3, ADMIN, "!rstats"), &chat).await;

    let sent = chat.sent();
    let Some(Sent::Message {
        content,
        embed: Some(embed),
        ..
    }) = sent.last()
    else {
        panic!("expected a stats message, got {sent:?}");
    };
    assert_eq!(content, "Bot Stats");
    assert_eq!(embed.colour, 0x86ff00);

    let field = |name: &str| {
        embed
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.clone())
    };
    assert_eq!(field("Messages Recycled").as_deref(), Some("1"));
    assert_eq!(field("Links in Database").as_deref(), Some("1"));
    assert_eq!(field("Image Hashes in Database").as_deref(), Some("0"));
}

#[tokio::test]
async fn test_stats_command_ignored_for_non_admin() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    let handled = recycler.handle(&message(1, 5, "!rstats"), &chat).await;

    assert!(matches!(handled, Handled::Evaluated(_)));
    assert!(chat.sent().is_empty());
}

#[tokio::test]
async fn test_admin_kill_requests_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let recycler = recycler_with(store.clone(), fetcher()).await;
    let chat = RecordingChat::default();

    assert!(matches!(
        recycler.handle(&message(1, 5, "!rkill"), &chat).await,
        Handled::Evaluated(_)
    ));
    assert!(matches!(
        recycler.handle(&message(2, ADMIN, "!rkill"), &chat).await,
        Handled::Shutdown
    ));
}

#[tokio::test]
async fn test_no_admin_configured_disables_commands() {
    let store = Arc::new(MemoryStore::new());
    let evaluator = evaluator(
        store.clone(),
        fetcher(),
        AllowList::default(),
        ImagePolicy::default(),
    );
    let recycler = Recycler::new(evaluator, StatsAggregator::new(store, Utc::now()), None);
    let chat = RecordingChat::default();

    assert!(matches!(
        recycler.handle(&message(1, ADMIN, "!rkill"), &chat).await,
        Handled::Evaluated(_)
    ));
}
