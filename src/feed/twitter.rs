use super::types::*;
use super::PostFeed;
use crate::error::RelayError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Assumed window when a 429 carries no reset header (X uses 15-minute windows).
const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

pub struct TwitterFeed {
    client: Client,
    bearer_token: String,
    base_url: String,
}

/// Time left until the unix-seconds `reset`, floored at zero.
pub fn rate_limit_wait(reset: i64, now: DateTime<Utc>) -> Duration {
    let remaining = reset - now.timestamp();
    Duration::from_secs(remaining.max(0) as u64)
}

fn parse_reset_header(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}

impl TwitterFeed {
    pub fn new(bearer_token: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tweet-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build X API client")?;
        Ok(Self {
            client,
            bearer_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send an authenticated GET. 429 is mapped to `RateLimited`; other
    /// transport failures to `Fetch`.
    async fn get(&self, handle: &str, url: &str) -> Result<Response, RelayError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .context("X API request failed")
            .map_err(|e| RelayError::fetch(handle, e))?;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_reset_header(resp.headers())
                .map(|reset| rate_limit_wait(reset, Utc::now()))
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW);
            return Err(RelayError::RateLimited { retry_after });
        }
        Ok(resp)
    }

    async fn lookup_user(&self, handle: &str) -> Result<Option<ApiUser>, RelayError> {
        let url = format!(
            "{}/2/users/by/username/{}?user.fields=name,profile_image_url",
            self.base_url, handle
        );
        let resp = self.get(handle, &url).await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::fetch(
                handle,
                anyhow::anyhow!("user lookup failed ({}): {}", status, body),
            ));
        }

        let parsed: UserLookupResponse = resp
            .json()
            .await
            .context("failed to parse user lookup response")
            .map_err(|e| RelayError::fetch(handle, e))?;
        Ok(parsed.data)
    }

    async fn latest_tweet(&self, handle: &str, user: &ApiUser) -> Result<Option<Post>, RelayError> {
        let url = format!(
            "{}/2/users/{}/tweets?max_results=5&exclude=replies\
             &tweet.fields=created_at,attachments\
             &expansions=attachments.media_keys\
             &media.fields=type,url,variants",
            self.base_url, user.id
        );
        let resp = self.get(handle, &url).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::fetch(
                handle,
                anyhow::anyhow!("timeline fetch failed ({}): {}", status, body),
            ));
        }

        let timeline: TimelineResponse = resp
            .json()
            .await
            .context("failed to parse timeline response")
            .map_err(|e| RelayError::fetch(handle, e))?;
        Ok(timeline.into_latest_post(user))
    }
}

#[async_trait]
impl PostFeed for TwitterFeed {
    async fn fetch_latest(&self, handle: &str) -> Result<Option<Post>, RelayError> {
        let Some(user) = self.lookup_user(handle).await? else {
            tracing::debug!(handle, "account not found");
            return Ok(None);
        };
        self.latest_tweet(handle, &user).await
    }
}
