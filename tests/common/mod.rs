#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tweet_relay::clock::Clock;
use tweet_relay::discord::types::{snowflake, Message, User};
use tweet_relay::engine::{CommandChannel, PollState};
use tweet_relay::error::RelayError;
use tweet_relay::feed::types::Post;
use tweet_relay::feed::PostFeed;
use tweet_relay::notify::Notifier;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Fetch(String),
    Sleep(Duration),
    Notify(String, String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn post(author: &str, id: &str, text: &str) -> Post {
    Post {
        id: id.to_string(),
        author: author.to_string(),
        author_name: None,
        author_avatar: None,
        text: text.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 3, 19, 10, 7, 0).unwrap(),
        media: Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Post(Post),
    Absent,
    RateLimited(Duration),
    Fail,
}

/// Feed that answers from a per-handle script; unknown handles are absent.
pub struct FakeFeed {
    script: Mutex<HashMap<String, Scripted>>,
    log: EventLog,
}

impl FakeFeed {
    pub fn new(log: EventLog) -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            log,
        }
    }

    pub fn set(&self, handle: &str, response: Scripted) {
        self.script.lock().unwrap().insert(handle.to_string(), response);
    }
}

#[async_trait]
impl PostFeed for FakeFeed {
    async fn fetch_latest(&self, handle: &str) -> Result<Option<Post>, RelayError> {
        self.log.lock().unwrap().push(Event::Fetch(handle.to_string()));
        let response = self
            .script
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .unwrap_or(Scripted::Absent);
        match response {
            Scripted::Post(post) => Ok(Some(post)),
            Scripted::Absent => Ok(None),
            Scripted::RateLimited(retry_after) => Err(RelayError::RateLimited { retry_after }),
            Scripted::Fail => Err(RelayError::fetch(handle, anyhow::anyhow!("HTTP 503"))),
        }
    }
}

/// Records deliveries. Optionally captures the seen-state file and the poll
/// state at the moment of each delivery.
pub struct RecordingNotifier {
    log: EventLog,
    pub sent: Mutex<Vec<(String, Post)>>,
    pub fail: AtomicBool,
    pub seen_path: Option<PathBuf>,
    pub seen_at_notify: Mutex<Vec<String>>,
    pub state_rx: Mutex<Option<watch::Receiver<PollState>>>,
    pub state_at_notify: Mutex<Vec<PollState>>,
}

impl RecordingNotifier {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            sent: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            seen_path: None,
            seen_at_notify: Mutex::new(Vec::new()),
            state_rx: Mutex::new(None),
            state_at_notify: Mutex::new(Vec::new()),
        }
    }

    pub fn with_seen_path(mut self, path: PathBuf) -> Self {
        self.seen_path = Some(path);
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, handle: &str, post: &Post) -> Result<(), RelayError> {
        self.log
            .lock()
            .unwrap()
            .push(Event::Notify(handle.to_string(), post.id.clone()));
        if let Some(path) = &self.seen_path {
            let content = std::fs::read_to_string(path).unwrap_or_default();
            self.seen_at_notify.lock().unwrap().push(content);
        }
        if let Some(rx) = self.state_rx.lock().unwrap().as_ref() {
            self.state_at_notify.lock().unwrap().push(*rx.borrow());
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::Delivery(anyhow::anyhow!("channel unavailable")));
        }
        self.sent
            .lock()
            .unwrap()
            .push((handle.to_string(), post.clone()));
        Ok(())
    }
}

/// Returns from every sleep immediately. After `cancel_after` sleeps it
/// cancels the token and never wakes, so loops stop at a known point.
pub struct FakeClock {
    log: EventLog,
    sleeps: AtomicUsize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeClock {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            sleeps: AtomicUsize::new(0),
            cancel_after: None,
        }
    }

    pub fn cancelling_after(log: EventLog, sleeps: usize, cancel: CancellationToken) -> Self {
        Self {
            log,
            sleeps: AtomicUsize::new(0),
            cancel_after: Some((sleeps, cancel)),
        }
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.log.lock().unwrap().push(Event::Sleep(duration));
        let count = self.sleeps.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, cancel)) = &self.cancel_after {
            if count >= *limit {
                cancel.cancel();
                std::future::pending::<()>().await;
            }
        }
        tokio::task::yield_now().await;
    }
}

pub fn chat(id: &str, author_id: &str, content: &str, bot: bool) -> Message {
    Message {
        id: id.to_string(),
        content: content.to_string(),
        author: User {
            id: author_id.to_string(),
            username: format!("user{}", author_id),
            bot,
        },
    }
}

/// In-memory channel. Answers newest-first like Discord; after each read the
/// next queued batch "arrives" so it shows up on the following poll.
pub struct FakeChannel {
    bot_id: String,
    history: Mutex<Vec<Message>>,
    arrivals: Mutex<VecDeque<Vec<Message>>>,
    pub reads: Mutex<Vec<Option<String>>>,
    pub replies: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn new(bot_id: &str, history: Vec<Message>) -> Self {
        Self {
            bot_id: bot_id.to_string(),
            history: Mutex::new(history),
            arrivals: Mutex::new(VecDeque::new()),
            reads: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, batch: Vec<Message>) {
        self.arrivals.lock().unwrap().push_back(batch);
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    async fn bot_user_id(&self) -> anyhow::Result<String> {
        Ok(self.bot_id.clone())
    }

    async fn messages(&self, after: Option<&str>, limit: u8) -> anyhow::Result<Vec<Message>> {
        self.reads.lock().unwrap().push(after.map(str::to_string));
        let floor = after.map(snowflake).unwrap_or(0);
        let mut found: Vec<Message> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|m| after.is_none() || snowflake(&m.id) > floor)
            .cloned()
            .collect();
        found.sort_by_key(|m| std::cmp::Reverse(snowflake(&m.id)));
        found.truncate(limit as usize);

        if let Some(batch) = self.arrivals.lock().unwrap().pop_front() {
            self.history.lock().unwrap().extend(batch);
        }
        Ok(found)
    }

    async fn reply(&self, content: String) -> anyhow::Result<()> {
        self.replies.lock().unwrap().push(content);
        Ok(())
    }
}
