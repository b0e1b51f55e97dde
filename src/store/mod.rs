//! Durable tracklist and seen-state, owned by a single task.
//!
//! Commands and the poll loop never touch the files directly: they send
//! requests through a `StoreHandle` and the store task applies them one at a
//! time, so writes can't interleave.

pub mod seen;
pub mod tracklist;

use crate::error::RelayError;
use anyhow::Result;
use seen::SeenState;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracklist::TrackList;

pub use tracklist::{TrackOutcome, UntrackOutcome};

/// Tracklist and seen ids as read at the start of a scan.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub tracked: Vec<String>,
    pub seen: BTreeMap<String, String>,
}

type Reply<T> = oneshot::Sender<Result<T>>;

enum StoreRequest {
    Track(String, Reply<TrackOutcome>),
    Untrack(String, Reply<UntrackOutcome>),
    List(Reply<Vec<String>>),
    Snapshot(Reply<Snapshot>),
    MarkSeen {
        handle: String,
        post_id: String,
        reply: Reply<()>,
    },
}

#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreRequest>,
}

struct StoreTask {
    tracklist_path: PathBuf,
    seen_path: PathBuf,
    tracklist: TrackList,
    seen: SeenState,
}

/// Load both stores and start the owning task. Fails fast if either file
/// exists but can't be read.
pub fn spawn(tracklist_path: &Path, seen_path: &Path) -> Result<(StoreHandle, JoinHandle<()>)> {
    let task = StoreTask {
        tracklist_path: tracklist_path.to_path_buf(),
        seen_path: seen_path.to_path_buf(),
        tracklist: TrackList::load(tracklist_path)?,
        seen: SeenState::load(seen_path)?,
    };
    tracing::info!(
        tracked = task.tracklist.handles().len(),
        seen = task.seen.entries().len(),
        "store loaded"
    );

    let (tx, rx) = mpsc::channel(32);
    let join = tokio::spawn(task.run(rx));
    Ok((StoreHandle { tx }, join))
}

impl StoreTask {
    async fn run(mut self, mut rx: mpsc::Receiver<StoreRequest>) {
        while let Some(req) = rx.recv().await {
            self.handle(req);
        }
        tracing::debug!("store task stopped");
    }

    fn handle(&mut self, req: StoreRequest) {
        match req {
            StoreRequest::Track(handle, reply) => {
                let _ = reply.send(
                    self.reload_tracklist()
                        .and_then(|()| self.tracklist.add(&handle)),
                );
            }
            StoreRequest::Untrack(handle, reply) => {
                let _ = reply.send(
                    self.reload_tracklist()
                        .and_then(|()| self.tracklist.remove(&handle)),
                );
            }
            StoreRequest::List(reply) => {
                let _ = reply.send(
                    self.reload_tracklist()
                        .map(|()| self.tracklist.handles().to_vec()),
                );
            }
            StoreRequest::Snapshot(reply) => {
                let _ = reply.send(self.reload().map(|()| Snapshot {
                    tracked: self.tracklist.handles().to_vec(),
                    seen: self.seen.entries().clone(),
                }));
            }
            StoreRequest::MarkSeen {
                handle,
                post_id,
                reply,
            } => {
                let _ = reply.send(self.seen.set(&handle, &post_id));
            }
        }
    }

    /// Pick up edits made to the files outside the process.
    fn reload(&mut self) -> Result<()> {
        self.reload_tracklist()?;
        self.seen = SeenState::load(&self.seen_path)?;
        Ok(())
    }

    /// Commands act on the file as it is now, not as of the last scan.
    fn reload_tracklist(&mut self) -> Result<()> {
        self.tracklist = TrackList::load(&self.tracklist_path)?;
        Ok(())
    }
}

impl StoreHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> StoreRequest,
    ) -> Result<T, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RelayError::Persistence(anyhow::anyhow!("store task is not running")))?;
        rx.await
            .map_err(|_| RelayError::Persistence(anyhow::anyhow!("store task dropped the request")))?
            .map_err(RelayError::Persistence)
    }

    pub async fn track(&self, handle: &str) -> Result<TrackOutcome, RelayError> {
        let handle = handle.to_string();
        self.request(|reply| StoreRequest::Track(handle, reply)).await
    }

    pub async fn untrack(&self, handle: &str) -> Result<UntrackOutcome, RelayError> {
        let handle = handle.to_string();
        self.request(|reply| StoreRequest::Untrack(handle, reply)).await
    }

    pub async fn tracked(&self) -> Result<Vec<String>, RelayError> {
        self.request(StoreRequest::List).await
    }

    /// Re-read both files and return their contents.
    pub async fn snapshot(&self) -> Result<Snapshot, RelayError> {
        self.request(StoreRequest::Snapshot).await
    }

    /// Returns once the id is on disk.
    pub async fn mark_seen(&self, handle: &str, post_id: &str) -> Result<(), RelayError> {
        let handle = handle.to_string();
        let post_id = post_id.to_string();
        self.request(|reply| StoreRequest::MarkSeen {
            handle,
            post_id,
            reply,
        })
        .await
    }
}
