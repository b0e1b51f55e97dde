use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub twitter: TwitterConfig,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    #[serde(default = "default_twitter_api")]
    pub api_base: String,
    /// Base for profile and status links in notifications.
    #[serde(default = "default_twitter_web")]
    pub web_base: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_twitter_api() -> String {
    "https://api.twitter.com".to_string()
}
fn default_twitter_web() -> String {
    "https://twitter.com".to_string()
}
fn default_request_timeout() -> u64 {
    10_000
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: default_twitter_api(),
            web_base: default_twitter_web(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    #[serde(default = "default_discord_api")]
    pub api_base: String,
    /// Destination channel for post notifications.
    pub channel_id: u64,
    /// Channel watched for operator commands. Defaults to `channel_id`.
    pub command_channel_id: Option<u64>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_command_poll")]
    pub command_poll_interval_s: u64,
}

fn default_discord_api() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_command_prefix() -> String {
    "!".to_string()
}
fn default_command_poll() -> u64 {
    3
}

impl DiscordConfig {
    pub fn command_channel(&self) -> u64 {
        self.command_channel_id.unwrap_or(self.channel_id)
    }

    pub fn command_poll_interval(&self) -> Duration {
        Duration::from_secs(self.command_poll_interval_s.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_s: u64,
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_s: default_poll_interval(),
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_s)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_tracklist_path")]
    pub tracklist_path: PathBuf,
    #[serde(default = "default_seen_path")]
    pub seen_path: PathBuf,
}

fn default_tracklist_path() -> PathBuf {
    PathBuf::from("tracked_users.txt")
}
fn default_seen_path() -> PathBuf {
    PathBuf::from("tweets.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tracklist_path: default_tracklist_path(),
            seen_path: default_seen_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// IANA zone name used for the "Posted At" field.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_footer_text")]
    pub footer_text: String,
    #[serde(default = "default_footer_icon")]
    pub footer_icon: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_footer_text() -> String {
    "Twitter Tracker Bot".to_string()
}
fn default_footer_icon() -> String {
    "https://i.imgur.com/wSTFkRM.png".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            footer_text: default_footer_text(),
            footer_icon: default_footer_icon(),
        }
    }
}

impl DisplayConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("invalid display timezone {:?}: {}", self.timezone, e))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Write logs here instead of stderr.
    pub file: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.display.tz()?;
        Ok(config)
    }

    pub fn twitter_bearer_token(env: &EnvFile) -> Result<String> {
        env.token("TWITTER_BEARER_TOKEN", "X API bearer token")
    }

    pub fn discord_token(env: &EnvFile) -> Result<String> {
        env.token("DISCORD_TOKEN", "Discord bot token")
    }
}

/// `KEY=VALUE` credentials file. Variables already set in the process win
/// over its entries.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl Default for EnvFile {
    fn default() -> Self {
        Self::new(ENV_FILE)
    }
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Export entries into the process environment. A missing file is fine.
    pub fn apply(&self) {
        for (key, value) in self.entries() {
            if std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }

    fn entries(&self) -> Vec<(String, String)> {
        let content = std::fs::read_to_string(&self.path).unwrap_or_default();
        parse_env_lines(&content)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Token from the environment, otherwise prompted for once and saved
    /// here for the next run.
    pub fn token(&self, var: &str, label: &str) -> Result<String> {
        if let Ok(value) = std::env::var(var) {
            let value = sanitize_key(&value);
            if !value.is_empty() {
                return Ok(value);
            }
        }
        let value = prompt(label)?;
        std::env::set_var(var, &value);
        if let Err(e) = self.save(var, &value) {
            tracing::warn!("failed to save {} to {}: {:#}", var, self.path.display(), e);
        }
        Ok(value)
    }

    /// Write `key`, replacing any earlier line for it. Comments and other
    /// keys are kept as they are.
    pub fn save(&self, key: &str, value: &str) -> Result<()> {
        let existing = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        let mut lines: Vec<String> = existing
            .lines()
            .filter(|line| env_line_key(line) != Some(key))
            .map(str::to_string)
            .collect();
        lines.push(format!("{}={}", key, value));
        std::fs::write(&self.path, lines.join("\n") + "\n")
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

fn env_line_key(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    line.split_once('=').map(|(key, _)| key.trim())
}

fn parse_env_lines(content: &str) -> Vec<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .lines()
        .map(|line| line.trim().trim_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"').trim_matches('\'')))
        .collect()
}

fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = sanitize_key(&input);
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}

/// Strip carriage returns, BOM and zero-width spaces from a pasted token.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
