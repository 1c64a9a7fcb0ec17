//! Configuration management for notice-watch
//!
//! This module handles loading and validating configuration from a TOML file
//! and environment variables. Endpoints and device identifiers used in the
//! listing payload are plain configuration data; nothing in the crawler
//! hard-codes them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// Default SMTP port (implicit TLS)
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Prefix for every environment variable override
const ENV_PREFIX: &str = "NOTICE_WATCH_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote notice board endpoints and request payload
    pub source: SourceConfig,

    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// Which notices count as new
    pub dedup: DedupConfig,

    /// Mail delivery configuration
    pub mail: MailConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Notice board endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Listing API endpoint (POST, JSON)
    pub list_url: String,

    /// Detail page endpoint (GET, HTML)
    pub detail_url: String,

    /// Area/community identifier
    pub cell_id: String,

    /// Listing action name sent in the request head
    pub action: String,

    /// Device fields echoed in the listing payload
    pub device: DeviceConfig,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            list_url: String::from("https://jkssl.linlehui001.com/pmcs/masterController/ctrl.json"),
            detail_url: String::from("http://182.92.161.166:8090/pmcs/htmController/ctrl.htm"),
            cell_id: String::from("7235161"),
            action: String::from("notice"),
            device: DeviceConfig::default(),
        }
    }
}

/// Fixed device identity the listing API expects in `datastatic`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub app_version: String,
    pub from_type: String,
    pub imei: String,
    pub ip: String,
    pub sys_version: String,
    pub tel: String,
    pub device_type: String,
    pub user_id: String,
    pub version_info: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            app_version: String::from("android-1.2.6"),
            from_type: String::from("0"),
            imei: String::from("010045025970362"),
            ip: String::from("10.1.2.46"),
            sys_version: String::from("android5.1.1"),
            tel: String::new(),
            device_type: String::from("0"),
            user_id: String::new(),
            version_info: String::from("skyblue"),
        }
    }
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of detail fetches in flight (0 = one task per notice, no cap)
    pub max_concurrent_requests: usize,

    /// Detail fetch rate limit in requests per second (0 = unlimited)
    pub requests_per_second: u32,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Deadline for the whole fetch phase in seconds
    pub run_deadline_secs: u64,

    /// User agent string
    pub user_agent: String,

    /// Accept-Language header value
    pub accept_language: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 0,
            requests_per_second: 0,
            request_timeout_secs: 30,
            run_deadline_secs: 300,
            user_agent: String::from(
                "Mozilla/5.0 (Linux; Android 5.0; SM-G900P Build/LRX21T) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/93.0.4577.82 Mobile Safari/537.36",
            ),
            accept_language: String::from(
                "zh-CN,zh;q=0.9,en;q=0.8,en-US;q=0.7,ko;q=0.6,zh-TW;q=0.5",
            ),
        }
    }
}

/// Dedup policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Persisted highest-id watermark
    Watermark,
    /// Trailing time window over the listing `addtime`
    Window,
}

impl std::str::FromStr for DedupMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "watermark" | "id" => Ok(Self::Watermark),
            "window" | "time" => Ok(Self::Window),
            other => Err(Error::config(format!("unknown dedup policy: {other}"))),
        }
    }
}

/// Dedup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Active policy
    pub policy: DedupMode,

    /// Watermark file (watermark policy only)
    pub watermark_path: PathBuf,

    /// Window length in seconds (window policy only)
    pub window_secs: u64,

    /// Format of the listing `addtime` field
    pub time_format: String,

    /// UTC offset, in hours, the board writes `addtime` in
    pub utc_offset_hours: i32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            policy: DedupMode::Watermark,
            watermark_path: PathBuf::from("./lastid.txt"),
            window_secs: 3600,
            time_format: String::from("%Y-%m-%d %H:%M:%S"),
            utc_offset_hours: 8,
        }
    }
}

/// Mail configuration as read from file/env (credentials may be missing)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP server as `host[:port]`
    pub host: Option<String>,

    /// SMTP username, also the sender address
    pub user: Option<String>,

    /// SMTP password
    pub password: Option<String>,

    /// Recipient address (defaults to the username)
    pub recipient: Option<String>,

    /// Display name in the From header
    pub sender_name: String,

    /// Pause between consecutive sends in seconds
    pub send_interval_secs: u64,

    /// SMTP command timeout in seconds
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            recipient: None,
            sender_name: String::from("物业小助手"),
            send_interval_secs: 10,
            timeout_secs: 30,
        }
    }
}

/// Fully resolved SMTP settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub recipient: String,
    pub sender_name: String,
    pub timeout: Duration,
}

impl MailConfig {
    /// Resolve host, user and password, failing if any is absent
    ///
    /// This is the precondition checked before any network work begins.
    pub fn resolve(&self) -> crate::error::Result<SmtpSettings> {
        let host = non_empty(&self.host).ok_or_else(|| Error::config("mail.host is not set"))?;
        let user = non_empty(&self.user).ok_or_else(|| Error::config("mail.user is not set"))?;
        let password =
            non_empty(&self.password).ok_or_else(|| Error::config("mail.password is not set"))?;

        let (host, port) = split_host_port(host)?;
        let recipient = non_empty(&self.recipient).unwrap_or(user).to_string();

        Ok(SmtpSettings {
            host,
            port,
            user: user.to_string(),
            password: password.to_string(),
            recipient,
            sender_name: self.sender_name.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Split `host[:port]`, defaulting to the implicit-TLS port
fn split_host_port(raw: &str) -> crate::error::Result<(String, u16)> {
    match raw.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::config(format!("invalid SMTP port in mail.host: {raw}")))?;
            if host.is_empty() {
                return Err(Error::config(format!("missing SMTP host in mail.host: {raw}")));
            }
            Ok((host.to_string(), port))
        }
        None => Ok((raw.to_string(), DEFAULT_SMTP_PORT)),
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Overlay `NOTICE_WATCH_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_var("LIST_URL") {
            self.source.list_url = v;
        }
        if let Some(v) = env_var("DETAIL_URL") {
            self.source.detail_url = v;
        }
        if let Some(v) = env_var("CELL_ID") {
            self.source.cell_id = v;
        }
        if let Some(v) = env_parse("MAX_CONCURRENT_REQUESTS")? {
            self.crawler.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("REQUESTS_PER_SECOND")? {
            self.crawler.requests_per_second = v;
        }
        if let Some(v) = env_parse("REQUEST_TIMEOUT")? {
            self.crawler.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("RUN_DEADLINE")? {
            self.crawler.run_deadline_secs = v;
        }
        if let Some(v) = env_var("DEDUP_POLICY") {
            self.dedup.policy = v.parse()?;
        }
        if let Some(v) = env_var("WATERMARK_PATH") {
            self.dedup.watermark_path = PathBuf::from(v);
        }
        if let Some(v) = env_parse("WINDOW_SECS")? {
            self.dedup.window_secs = v;
        }
        if let Some(v) = env_var("SMTP_HOST") {
            self.mail.host = Some(v);
        }
        if let Some(v) = env_var("SMTP_USER") {
            self.mail.user = Some(v);
        }
        if let Some(v) = env_var("SMTP_PASSWORD") {
            self.mail.password = Some(v);
        }
        if let Some(v) = env_var("MAIL_TO") {
            self.mail.recipient = Some(v);
        }
        if let Some(v) = env_parse("SEND_INTERVAL")? {
            self.mail.send_interval_secs = v;
        }
        if let Some(v) = env_var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env_var("LOG_FORMAT") {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.source.list_url.trim().is_empty() {
            anyhow::bail!("source.list_url must not be empty");
        }

        if self.source.detail_url.trim().is_empty() {
            anyhow::bail!("source.detail_url must not be empty");
        }

        if self.source.cell_id.trim().is_empty() {
            anyhow::bail!("source.cell_id must not be empty");
        }

        if self.crawler.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }

        if self.crawler.run_deadline_secs == 0 {
            anyhow::bail!("run_deadline_secs must be greater than 0");
        }

        if self.dedup.policy == DedupMode::Window && self.dedup.window_secs == 0 {
            anyhow::bail!("window_secs must be greater than 0 under the window policy");
        }

        if !(-14..=14).contains(&self.dedup.utc_offset_hours) {
            anyhow::bail!("utc_offset_hours must be within -14..=14");
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.request_timeout_secs)
    }

    /// Get the fetch-phase deadline as Duration
    #[must_use]
    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.crawler.run_deadline_secs)
    }

    /// Get the pause between mail sends as Duration
    #[must_use]
    pub fn send_interval(&self) -> Duration {
        Duration::from_secs(self.mail.send_interval_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {ENV_PREFIX}{name}: {v}"))
        })
        .transpose()
}
