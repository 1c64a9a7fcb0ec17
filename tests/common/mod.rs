//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use notice_watch::config::Config;
use notice_watch::notifications::channels::MailResult;
use notice_watch::notifications::{MailError, Notification, Notifier};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Mutex;

/// Detail page in the board's layout
pub fn detail_page(title: &str, signed_time: &str, author: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>公告详情</title></head>
<body>
<div class="notice">
    <div style="text-align:center; width:100%;" class="noticeTitle">
        <div><b>{title}</b></div>
        <div class="sign">
            <span class="signTime">{signed_time}</span>
            <span class="signTime">&nbsp;</span>
            <span class="signTime">{author}</span>
        </div>
    </div>
    <div class="notice-content" style="width:100%;">{body}</div>
</div>
</body>
</html>"#
    )
}

/// Listing response with `(id, addtime)` entries
pub fn listing(entries: &[(Value, &str)]) -> Value {
    let list: Vec<Value> = entries
        .iter()
        .map(|(id, addtime)| json!({"id": id, "addtime": addtime, "title": "ignored"}))
        .collect();

    json!({
        "head": {"resultCode": "0", "errorMsg": "OK!"},
        "body": {"list": list}
    })
}

/// Config pointing at a mock server, with mail settings filled in
pub fn test_config(server_uri: &str, watermark_path: &Path) -> Config {
    let mut config = Config::default();
    config.source.list_url = format!("{server_uri}/list");
    config.source.detail_url = format!("{server_uri}/detail");
    config.crawler.request_timeout_secs = 5;
    config.crawler.run_deadline_secs = 30;
    config.dedup.watermark_path = watermark_path.to_path_buf();
    config.mail.host = Some("smtp.example.com:465".to_string());
    config.mail.user = Some("bot@example.com".to_string());
    config.mail.password = Some("secret".to_string());
    config.mail.recipient = Some("me@example.com".to_string());
    config.mail.send_interval_secs = 0;
    config
}

/// Notifier that records every notification it is given
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail_all: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.subject.clone())
            .collect();
        subjects.sort();
        subjects
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> MailResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail_all {
            return Err(MailError::Unavailable("relay refused".to_string()));
        }
        Ok(())
    }
}
