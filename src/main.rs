use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tweet_relay::clock::{Clock, TokioClock};
use tweet_relay::config::{Config, EnvFile, LoggingConfig};
use tweet_relay::discord::embed::EmbedStyle;
use tweet_relay::discord::rest::DiscordRest;
use tweet_relay::discord::{DiscordCommandChannel, DiscordNotifier};
use tweet_relay::engine::{CommandListener, Poller};
use tweet_relay::feed::twitter::TwitterFeed;
use tweet_relay::store;

const DEFAULT_LOG_FILTER: &str = "tweet_relay=info";

struct Args {
    config_path: PathBuf,
    dry_run: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| PathBuf::from(&w[1]))
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    Args {
        config_path,
        dry_run: args.iter().any(|arg| arg == "--dry-run"),
    }
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    match &logging.file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let config = Config::load(&args.config_path)?;
    init_logging(&config.logging)?;

    // Load saved tokens from .env (real env vars take precedence)
    let env = EnvFile::default();
    env.apply();
    let bearer_token = Config::twitter_bearer_token(&env)?;
    let discord_token = Config::discord_token(&env)?;

    let feed = TwitterFeed::new(
        bearer_token,
        &config.twitter.api_base,
        Duration::from_millis(config.twitter.request_timeout_ms),
    )?;
    let rest = Arc::new(DiscordRest::new(discord_token, &config.discord.api_base)?);

    // The loop only starts once the destination channel is known to exist.
    let channel = rest
        .get_channel(config.discord.channel_id)
        .await
        .with_context(|| format!("failed to resolve channel {}", config.discord.channel_id))?;
    tracing::info!(
        channel_id = %channel.id,
        name = channel.name.as_deref().unwrap_or("?"),
        dry_run = args.dry_run,
        "destination channel resolved"
    );

    let (store, store_task) =
        store::spawn(&config.storage.tracklist_path, &config.storage.seen_path)?;

    let style = EmbedStyle::from_config(&config.twitter, &config.display)?;
    let notifier = DiscordNotifier::new(rest.clone(), config.discord.channel_id, style, args.dry_run);
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let cancel = CancellationToken::new();

    let commands = DiscordCommandChannel::new(rest.clone(), config.discord.command_channel());
    tracing::info!(channel_id = config.discord.command_channel(), "listening for commands");
    let listener = CommandListener::new(
        Arc::new(commands),
        config.discord.command_prefix.clone(),
        store.clone(),
        clock.clone(),
        config.discord.command_poll_interval(),
    );
    let listener_task = tokio::spawn(listener.run(cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            shutdown.cancel();
        }
    });

    let poller = Poller::new(
        Arc::new(feed),
        Arc::new(notifier),
        store,
        clock,
        config.poll.interval(),
    );
    poller.run(cancel).await;

    if let Err(e) = listener_task.await {
        tracing::error!("command listener panicked: {}", e);
    }
    // Last StoreHandle is gone once the poller and listener are dropped.
    drop(poller);
    if let Err(e) = store_task.await {
        tracing::error!("store task panicked: {}", e);
    }
    Ok(())
}
