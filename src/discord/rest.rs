use super::types::*;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

pub struct DiscordRest {
    client: Client,
    token: String,
    base_url: String,
}

impl DiscordRest {
    pub fn new(token: String, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("tweet-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build Discord client")?;
        Ok(Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Resolve a channel; fails if the bot can't see it.
    pub async fn get_channel(&self, channel_id: u64) -> Result<Channel> {
        let path = format!("/channels/{}", channel_id);
        self.get_json(&path).await
    }

    /// The bot's own user, so its replies can be skipped by the command listener.
    pub async fn current_user(&self) -> Result<User> {
        self.get_json("/users/@me").await
    }

    pub async fn create_message(&self, channel_id: u64, msg: &CreateMessage) -> Result<Message> {
        let path = format!("/channels/{}/messages", channel_id);
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(msg)
            .send()
            .await
            .context("POST message failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("POST {} failed ({}): {}", path, status, body);
        }
        resp.json().await.context("failed to parse message response")
    }

    /// Messages newer than `after`, or the newest `limit` messages when `after`
    /// is `None`. Discord returns them newest-first.
    pub async fn get_messages(
        &self,
        channel_id: u64,
        after: Option<&str>,
        limit: u8,
    ) -> Result<Vec<Message>> {
        let mut path = format!("/channels/{}/messages?limit={}", channel_id, limit.clamp(1, 100));
        if let Some(after) = after {
            path.push_str(&format!("&after={}", after));
        }
        self.get_json(&path).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("GET request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {} failed ({}): {}", path, status, body);
        }
        resp.json().await.context("failed to parse response")
    }
}
