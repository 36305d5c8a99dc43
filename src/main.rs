use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{info, warn};

use recycler::bot::{Handled, Recycler};
use recycler::chat::{self, ConsoleChat};
use recycler::classify::AllowList;
use recycler::config::Config;
use recycler::evaluator::{MessageEvaluator, NoSignal};
use recycler::fetch::HttpFetcher;
use recycler::imaging::AverageHashDecoder;
use recycler::output::terminal;
use recycler::scope::Scope;
use recycler::stats::StatsAggregator;
use recycler::store::{FingerprintStore, MemoryStore};

/// Recycler: flags links and images that were already posted in the same
/// community.
#[derive(Parser)]
#[command(name = "recycler", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run the bot: JSON-lines message events on stdin, actions on stdout
    Listen {
        /// Keep all state in memory instead of the database
        #[arg(long)]
        ephemeral: bool,
    },

    /// Check links as if they were posted in a message (records them too)
    Check {
        /// Links to check, in message order
        #[arg(required = true)]
        urls: Vec<String>,

        /// Scope (community id) to check against
        #[arg(long, default_value = Scope::DEFAULT_ID)]
        scope: String,
    },

    /// Show duplicate-detection stats for a scope
    Stats {
        /// Scope (community id) to report on
        #[arg(long, default_value = Scope::DEFAULT_ID)]
        scope: String,
    },

    /// Manage hosts whose links are never tracked (applies on next start)
    Allow {
        #[command(subcommand)]
        action: AllowAction,
    },
}

#[derive(Subcommand)]
enum AllowAction {
    /// Add a host to the allow-list
    Add { host: String },
    /// Remove a host from the allow-list
    Remove { host: String },
    /// List allow-listed hosts
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr: stdout carries the JSON-lines actions in `listen`
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("recycler=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => init_database(&config).await?,

        Commands::Listen { ephemeral } => {
            let store: Arc<dyn FingerprintStore> = if ephemeral {
                info!("Using in-memory store; nothing will be persisted");
                Arc::new(MemoryStore::new())
            } else {
                open_store(&config).await?
            };
            listen(&config, store).await?;
        }

        Commands::Check { urls, scope } => {
            let store = open_store(&config).await?;
            let evaluator = build_evaluator(&config, store).await?;
            let evaluation = evaluator
                .evaluate(&Scope::new(scope), urls, &NoSignal)
                .await;
            terminal::display_evaluation(&evaluation);
        }

        Commands::Stats { scope } => {
            let store = open_store(&config).await?;
            let scope = Scope::new(scope);
            let report = StatsAggregator::new(store, Utc::now())
                .report(&scope)
                .await?;
            terminal::display_report(&scope, &report);
        }

        Commands::Allow { action } => {
            let store = open_store(&config).await?;
            match action {
                AllowAction::Add { host } => {
                    let host = host.trim().to_ascii_lowercase();
                    store.allow_host(&host).await?;
                    println!("{} {host} added. Restart the bot to apply.", "✓".green());
                }
                AllowAction::Remove { host } => {
                    let host = host.trim().to_ascii_lowercase();
                    if store.disallow_host(&host).await? {
                        println!("{} {host} removed. Restart the bot to apply.", "✓".green());
                    } else {
                        println!("{host} was not on the allow-list.");
                    }
                }
                AllowAction::List => {
                    terminal::display_allow_list(&store.allowed_hosts().await?);
                }
            }
        }
    }

    Ok(())
}

/// Read message events until EOF or an admin shutdown. Each message is
/// handled on its own task, so a slow fetch never holds up the next message.
async fn listen(config: &Config, store: Arc<dyn FingerprintStore>) -> Result<()> {
    let evaluator = build_evaluator(config, store.clone()).await?;
    let stats = StatsAggregator::new(store, Utc::now());
    let recycler = Arc::new(Recycler::new(evaluator, stats, config.admin_id));
    let console = Arc::new(ConsoleChat::new(tokio::io::stdout()));
    let shutdown = Arc::new(Notify::new());

    info!("Listening for message events on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    loop {
        let line = tokio::select! {
            _ = shutdown.notified() => break,
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let message = match chat::parse_event(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Skipping malformed event");
                continue;
            }
        };

        let recycler = Arc::clone(&recycler);
        let console = Arc::clone(&console);
        let shutdown = Arc::clone(&shutdown);
        tasks.spawn(async move {
            if let Handled::Shutdown = recycler.handle(&message, &*console).await {
                shutdown.notify_one();
            }
        });

        // Reap finished tasks so the set doesn't grow without bound
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "Message handler panicked");
            }
        }
    }

    // Let in-flight messages finish so their writes land
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Message handler panicked");
        }
    }

    info!("Stopped");
    Ok(())
}

/// Snapshot the allow-list and assemble the evaluator.
async fn build_evaluator(
    config: &Config,
    store: Arc<dyn FingerprintStore>,
) -> Result<MessageEvaluator> {
    let allow_list = AllowList::load(store.as_ref())
        .await
        .context("Failed to load allow-list")?;
    if allow_list.is_empty() {
        info!("Allow-list is empty; every host is tracked");
    } else {
        info!(hosts = allow_list.len(), "Allow-list loaded");
    }

    let fetcher = HttpFetcher::new(config.fetch_timeout)?;

    Ok(MessageEvaluator::new(
        store,
        Arc::new(fetcher),
        Arc::new(AverageHashDecoder),
        allow_list,
        config.image_policy(),
    )
    .with_fetch_concurrency(config.fetch_concurrency))
}

/// Select the store backend based on configuration.
///
/// When DATABASE_URL is set and points to PostgreSQL, uses the Postgres backend
/// (requires the `postgres` feature). Otherwise, falls back to SQLite.
async fn open_store(config: &Config) -> Result<Arc<dyn FingerprintStore>> {
    match config.database_url.as_deref() {
        Some(url) if config.uses_postgres() => connect_postgres(url).await,
        _ => open_sqlite(&config.db_path),
    }
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> Result<Arc<dyn FingerprintStore>> {
    info!("Using PostgreSQL backend");
    Ok(Arc::new(recycler::store::connect_postgres(url).await?))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> Result<Arc<dyn FingerprintStore>> {
    anyhow::bail!(
        "DATABASE_URL points to PostgreSQL but the 'postgres' feature is not compiled in.\n\
         Rebuild with: cargo build --features postgres"
    )
}

#[cfg(feature = "sqlite")]
fn open_sqlite(db_path: &str) -> Result<Arc<dyn FingerprintStore>> {
    Ok(Arc::new(recycler::store::open_sqlite(db_path)?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_db_path: &str) -> Result<Arc<dyn FingerprintStore>> {
    anyhow::bail!("SQLite support is not compiled in. Set DATABASE_URL to a PostgreSQL URL.")
}

/// Create (or migrate) the configured database.
async fn init_database(config: &Config) -> Result<()> {
    if config.uses_postgres() {
        // Connecting runs the migrations
        let store = open_store(config).await?;
        let hosts = store.allowed_hosts().await?;
        println!("PostgreSQL database ready ({} allow-listed hosts).", hosts.len());
        return Ok(());
    }

    info!("Initializing Recycler database...");
    let table_count = initialize_sqlite(&config.db_path).await?;
    println!("Database initialized at: {}", config.db_path);
    println!("Tables created: {table_count}");
    println!("\nNext: add allow-listed hosts with `recycler allow add <host>`,");
    println!("then run `recycler listen`.");
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn initialize_sqlite(db_path: &str) -> Result<i64> {
    let store = recycler::store::initialize_sqlite(db_path)?;
    store.table_count().await
}

#[cfg(not(feature = "sqlite"))]
async fn initialize_sqlite(_db_path: &str) -> Result<i64> {
    anyhow::bail!("SQLite support is not compiled in. Set DATABASE_URL to a PostgreSQL URL.")
}
