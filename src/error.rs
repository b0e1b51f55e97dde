use std::time::Duration;

/// Failures that cross component boundaries (feed, notifier, store).
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("rate limited, retry in {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("fetch failed for @{handle}: {source:#}")]
    Fetch {
        handle: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("delivery failed: {0:#}")]
    Delivery(#[source] anyhow::Error),

    #[error("persistence failed: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl RelayError {
    pub fn fetch(handle: &str, source: anyhow::Error) -> Self {
        Self::Fetch {
            handle: handle.to_string(),
            source,
        }
    }
}
