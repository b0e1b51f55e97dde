pub mod twitter;
pub mod types;

use crate::error::RelayError;
use async_trait::async_trait;
use types::Post;

#[async_trait]
pub trait PostFeed: Send + Sync {
    /// Latest post for `handle`. `Ok(None)` covers both "no posts" and
    /// "no such account"; throttling surfaces as `RelayError::RateLimited`.
    async fn fetch_latest(&self, handle: &str) -> Result<Option<Post>, RelayError>;
}
