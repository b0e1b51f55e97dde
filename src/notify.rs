use crate::error::RelayError;
use crate::feed::types::Post;
use async_trait::async_trait;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `post` from the tracked account `handle` to the destination.
    async fn notify(&self, handle: &str, post: &Post) -> Result<(), RelayError>;
}
