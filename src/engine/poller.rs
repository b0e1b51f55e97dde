use crate::clock::Clock;
use crate::error::RelayError;
use crate::feed::PostFeed;
use crate::notify::Notifier;
use crate::store::StoreHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Scanning,
}

/// Outcome counts for one pass over the tracklist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub visited: usize,
    pub notified: usize,
    pub unchanged: usize,
    pub absent: usize,
    pub failed: usize,
    pub rate_limited: usize,
    /// Marked seen but the notifier reported an error.
    pub undelivered: usize,
}

pub struct Poller {
    feed: Arc<dyn PostFeed>,
    notifier: Arc<dyn Notifier>,
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    interval: Duration,
    state_tx: watch::Sender<PollState>,
}

impl Poller {
    pub fn new(
        feed: Arc<dyn PostFeed>,
        notifier: Arc<dyn Notifier>,
        store: StoreHandle,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(PollState::Idle);
        Self {
            feed,
            notifier,
            store,
            clock,
            interval,
            state_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_tx.subscribe()
    }

    /// Scan immediately, then again `interval` after each pass ends, until
    /// `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(interval_s = self.interval.as_secs(), "poll loop started");
        loop {
            match self.scan(&cancel).await {
                Ok(report) => tracing::info!(
                    visited = report.visited,
                    notified = report.notified,
                    unchanged = report.unchanged,
                    absent = report.absent,
                    failed = report.failed,
                    rate_limited = report.rate_limited,
                    undelivered = report.undelivered,
                    "scan complete"
                ),
                Err(e) => tracing::error!("scan aborted: {:#}", e),
            }

            if !self.pause(self.interval, &cancel).await {
                break;
            }
        }
        tracing::info!("poll loop stopped");
    }

    /// One pass over the tracklist as it stands on disk right now. Only a
    /// failure to read the stores aborts the pass; per-account errors are
    /// counted and skipped.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanReport, RelayError> {
        let snapshot = self.store.snapshot().await?;
        let mut report = ScanReport::default();

        self.state_tx.send_replace(PollState::Scanning);
        for handle in &snapshot.tracked {
            if cancel.is_cancelled() {
                break;
            }
            report.visited += 1;

            let post = match self.feed.fetch_latest(handle).await {
                Ok(Some(post)) => post,
                Ok(None) => {
                    tracing::debug!(handle = %handle, "no posts");
                    report.absent += 1;
                    continue;
                }
                Err(RelayError::RateLimited { retry_after }) => {
                    report.rate_limited += 1;
                    tracing::warn!(
                        handle = %handle,
                        wait_s = retry_after.as_secs(),
                        "rate limit reached, pausing"
                    );
                    if !self.pause(retry_after, cancel).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(handle = %handle, "{:#}", e);
                    continue;
                }
            };

            if snapshot.seen.get(handle) == Some(&post.id) {
                report.unchanged += 1;
                continue;
            }

            // Seen id is durable before delivery; a failed delivery is not retried.
            if let Err(e) = self.store.mark_seen(handle, &post.id).await {
                report.failed += 1;
                tracing::error!(handle = %handle, post_id = %post.id, "{:#}", e);
                continue;
            }

            match self.notifier.notify(handle, &post).await {
                Ok(()) => report.notified += 1,
                Err(e) => {
                    report.undelivered += 1;
                    tracing::warn!(handle = %handle, post_id = %post.id, "{:#}", e);
                }
            }
        }
        self.state_tx.send_replace(PollState::Idle);

        Ok(report)
    }

    /// Sleep on the injected clock. Returns false if cancelled first.
    async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = self.clock.sleep(duration) => true,
        }
    }
}
