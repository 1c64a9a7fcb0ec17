//! Tests for config loading
//!
//! Environment overrides are process-global, so every test that touches
//! `NOTICE_WATCH_*` variables runs serially.

use notice_watch::config::{Config, DedupMode, DEFAULT_SMTP_PORT};
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const VARS: &[&str] = &[
    "NOTICE_WATCH_CELL_ID",
    "NOTICE_WATCH_MAX_CONCURRENT_REQUESTS",
    "NOTICE_WATCH_DEDUP_POLICY",
    "NOTICE_WATCH_SMTP_HOST",
    "NOTICE_WATCH_SMTP_USER",
    "NOTICE_WATCH_SMTP_PASSWORD",
    "NOTICE_WATCH_SEND_INTERVAL",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults() {
    clear_env();
    let config = Config::from_env().unwrap();

    assert_eq!(config.source.cell_id, "7235161");
    assert_eq!(config.dedup.policy, DedupMode::Watermark);
    assert_eq!(config.crawler.max_concurrent_requests, 0);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.run_deadline(), Duration::from_secs(300));
    assert_eq!(config.send_interval(), Duration::from_secs(10));
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("NOTICE_WATCH_CELL_ID", "42");
    std::env::set_var("NOTICE_WATCH_MAX_CONCURRENT_REQUESTS", "4");
    std::env::set_var("NOTICE_WATCH_DEDUP_POLICY", "window");
    std::env::set_var("NOTICE_WATCH_SMTP_HOST", "smtp.example.com");
    std::env::set_var("NOTICE_WATCH_SMTP_USER", "bot@example.com");
    std::env::set_var("NOTICE_WATCH_SMTP_PASSWORD", "secret");
    std::env::set_var("NOTICE_WATCH_SEND_INTERVAL", "3");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.source.cell_id, "42");
    assert_eq!(config.crawler.max_concurrent_requests, 4);
    assert_eq!(config.dedup.policy, DedupMode::Window);
    assert_eq!(config.send_interval(), Duration::from_secs(3));

    let smtp = config.mail.resolve().unwrap();
    assert_eq!(smtp.host, "smtp.example.com");
    assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
    assert_eq!(smtp.recipient, "bot@example.com");
}

#[test]
#[serial]
fn test_invalid_env_value_rejected() {
    clear_env();
    std::env::set_var("NOTICE_WATCH_MAX_CONCURRENT_REQUESTS", "many");
    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_load_file_then_env() {
    clear_env();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[source]
cell_id = "1000"

[crawler]
max_concurrent_requests = 8
requests_per_second = 2

[dedup]
policy = "watermark"
watermark_path = "/tmp/notice-watch-lastid.txt"

[mail]
host = "smtp.example.com:587"
user = "bot@example.com"
password = "secret"
recipient = "me@example.com"
"#
    )
    .unwrap();

    std::env::set_var("NOTICE_WATCH_CELL_ID", "2000");
    let config = Config::load(Some(file.path())).unwrap();
    clear_env();

    assert_eq!(config.source.cell_id, "2000");
    assert_eq!(config.crawler.max_concurrent_requests, 8);
    assert_eq!(config.crawler.requests_per_second, 2);

    let smtp = config.mail.resolve().unwrap();
    assert_eq!(smtp.port, 587);
    assert_eq!(smtp.recipient, "me@example.com");
    assert_eq!(smtp.sender_name, "物业小助手");
}

#[test]
#[serial]
fn test_load_rejects_invalid_file() {
    clear_env();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[crawler]\nrequest_timeout_secs = 0").unwrap();

    assert!(Config::load(Some(file.path())).is_err());
}

#[test]
fn test_missing_mail_settings() {
    let config = Config::default();
    assert!(config.mail.resolve().is_err());
}
