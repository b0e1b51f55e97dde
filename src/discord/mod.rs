pub mod embed;
pub mod rest;
pub mod types;

use crate::engine::CommandChannel;
use crate::error::RelayError;
use crate::feed::types::Post;
use crate::notify::Notifier;
use async_trait::async_trait;
use embed::{build_post_embed, EmbedStyle};
use rest::DiscordRest;
use std::sync::Arc;
use types::{CreateMessage, Message};

/// Posts notifications as embeds into a single channel.
pub struct DiscordNotifier {
    rest: Arc<DiscordRest>,
    channel_id: u64,
    style: EmbedStyle,
    dry_run: bool,
}

impl DiscordNotifier {
    pub fn new(rest: Arc<DiscordRest>, channel_id: u64, style: EmbedStyle, dry_run: bool) -> Self {
        Self {
            rest,
            channel_id,
            style,
            dry_run,
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, handle: &str, post: &Post) -> Result<(), RelayError> {
        let embed = build_post_embed(handle, post, &self.style, chrono::Utc::now());

        if self.dry_run {
            tracing::info!(
                handle,
                post_id = %post.id,
                title = %embed.title,
                fields = embed.fields.len(),
                image = embed.image.is_some(),
                "DRY RUN: would send notification"
            );
            return Ok(());
        }

        let msg = self
            .rest
            .create_message(self.channel_id, &CreateMessage::embed(embed))
            .await
            .map_err(RelayError::Delivery)?;

        tracing::info!(handle, post_id = %post.id, message_id = %msg.id, "notification sent");
        Ok(())
    }
}

/// Reads operator commands from a channel and replies in the same channel.
pub struct DiscordCommandChannel {
    rest: Arc<DiscordRest>,
    channel_id: u64,
}

impl DiscordCommandChannel {
    pub fn new(rest: Arc<DiscordRest>, channel_id: u64) -> Self {
        Self { rest, channel_id }
    }
}

#[async_trait]
impl CommandChannel for DiscordCommandChannel {
    async fn bot_user_id(&self) -> anyhow::Result<String> {
        Ok(self.rest.current_user().await?.id)
    }

    async fn messages(&self, after: Option<&str>, limit: u8) -> anyhow::Result<Vec<Message>> {
        self.rest.get_messages(self.channel_id, after, limit).await
    }

    async fn reply(&self, content: String) -> anyhow::Result<()> {
        self.rest
            .create_message(self.channel_id, &CreateMessage::text(content))
            .await?;
        Ok(())
    }
}
