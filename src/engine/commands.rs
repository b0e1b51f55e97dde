//! Operator commands (`track`, `untrack`, `list`) read from a chat channel.

use crate::clock::Clock;
use crate::discord::types::{snowflake, Message};
use crate::store::{StoreHandle, TrackOutcome, UntrackOutcome};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_HANDLE_LEN: usize = 15;
const FAILURE_REPLY: &str = "Something went wrong updating the tracklist. Check the logs.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Track(String),
    Untrack(String),
    List,
    /// Recognized command with a missing argument.
    Usage(String),
    InvalidHandle(String),
}

/// Strip a leading `@` and check the X handle charset.
pub fn normalize_handle(raw: &str) -> Option<String> {
    let handle = raw.trim().trim_start_matches('@');
    let valid = !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LEN
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| handle.to_string())
}

/// `None` when `content` isn't addressed to us.
pub fn parse(prefix: &str, content: &str) -> Option<Command> {
    let rest = content.trim().strip_prefix(prefix)?;
    let mut parts = rest.split_whitespace();
    let name = parts.next()?;
    let arg = parts.next();

    let with_handle = |make: fn(String) -> Command| match arg {
        None => Command::Usage(format!("Usage: {}{} <username>", prefix, name)),
        Some(raw) => match normalize_handle(raw) {
            Some(handle) => make(handle),
            None => Command::InvalidHandle(raw.to_string()),
        },
    };

    match name {
        "track" => Some(with_handle(Command::Track)),
        "untrack" => Some(with_handle(Command::Untrack)),
        "list" => Some(Command::List),
        _ => None,
    }
}

/// Apply `command` to the store and produce the reply text.
pub async fn execute(store: &StoreHandle, command: Command) -> String {
    match command {
        Command::Track(handle) => match store.track(&handle).await {
            Ok(TrackOutcome::Added) => {
                tracing::info!(handle = %handle, "now tracking");
                format!("Now tracking @{}.", handle)
            }
            Ok(TrackOutcome::AlreadyTracked) => format!("@{} is already being tracked.", handle),
            Err(e) => {
                tracing::error!(handle = %handle, "track failed: {:#}", e);
                FAILURE_REPLY.to_string()
            }
        },
        Command::Untrack(handle) => match store.untrack(&handle).await {
            Ok(UntrackOutcome::Removed) => {
                tracing::info!(handle = %handle, "stopped tracking");
                format!("Stopped tracking @{}.", handle)
            }
            Ok(UntrackOutcome::NotTracked) => format!("@{} is not being tracked.", handle),
            Err(e) => {
                tracing::error!(handle = %handle, "untrack failed: {:#}", e);
                FAILURE_REPLY.to_string()
            }
        },
        Command::List => match store.tracked().await {
            Ok(handles) if handles.is_empty() => "No users are being tracked.".to_string(),
            Ok(handles) => {
                let lines: Vec<String> = handles.iter().map(|h| format!("- @{}", h)).collect();
                format!("Currently tracking:\n{}", lines.join("\n"))
            }
            Err(e) => {
                tracing::error!("list failed: {:#}", e);
                FAILURE_REPLY.to_string()
            }
        },
        Command::Usage(usage) => usage,
        Command::InvalidHandle(raw) => format!("`{}` is not a valid handle.", raw),
    }
}

/// Reply for one chat message, skipping bots (including ourselves).
pub async fn respond(
    store: &StoreHandle,
    prefix: &str,
    msg: &Message,
    bot_id: Option<&str>,
) -> Option<String> {
    if msg.author.bot || bot_id == Some(msg.author.id.as_str()) {
        return None;
    }
    let command = parse(prefix, &msg.content)?;
    tracing::debug!(user = %msg.author.username, ?command, "command received");
    Some(execute(store, command).await)
}

/// Where commands are read from and replies go.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// The bot's own user id, so its replies aren't read back as commands.
    async fn bot_user_id(&self) -> Result<String>;

    /// Up to `limit` messages newer than `after`, or the newest `limit` when
    /// `after` is `None`. Order is unspecified.
    async fn messages(&self, after: Option<&str>, limit: u8) -> Result<Vec<Message>>;

    async fn reply(&self, content: String) -> Result<()>;
}

/// Polls the command channel and answers commands in order.
pub struct CommandListener {
    channel: Arc<dyn CommandChannel>,
    prefix: String,
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl CommandListener {
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        prefix: String,
        store: StoreHandle,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            channel,
            prefix,
            store,
            clock,
            interval,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let bot_id = match self.channel.bot_user_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("failed to fetch bot user: {:#}", e);
                None
            }
        };

        // Start after the newest existing message so history isn't replayed.
        let mut primed = false;
        let mut cursor: Option<String> = None;

        tracing::info!(prefix = %self.prefix, "command listener started");
        loop {
            let after = if primed { cursor.as_deref() } else { None };
            let limit = if primed { 50 } else { 1 };
            match self.channel.messages(after, limit).await {
                Ok(mut messages) => {
                    messages.sort_by_key(|m| snowflake(&m.id));
                    if let Some(last) = messages.last() {
                        cursor = Some(last.id.clone());
                    }
                    if primed {
                        for msg in &messages {
                            self.answer(msg, bot_id.as_deref()).await;
                        }
                    }
                    primed = true;
                }
                Err(e) => tracing::warn!("command poll failed: {:#}", e),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.interval) => {}
            }
        }
        tracing::info!("command listener stopped");
    }

    async fn answer(&self, msg: &Message, bot_id: Option<&str>) {
        let Some(reply) = respond(&self.store, &self.prefix, msg, bot_id).await else {
            return;
        };
        if let Err(e) = self.channel.reply(reply).await {
            tracing::warn!(message_id = %msg.id, "failed to send command reply: {:#}", e);
        }
    }
}
