//! End-to-end poll cycle tests
//!
//! The listing and detail endpoints are served by wiremock, the watermark
//! lives in a temp dir, and mail goes to a recording notifier.

mod common;

use chrono::{TimeZone, Utc};
use common::{detail_page, listing, test_config, RecordingNotifier};
use notice_watch::config::DedupMode;
use notice_watch::cycle::PollCycle;
use notice_watch::error::ErrorCategory;
use notice_watch::models::DispatchOutcome;
use notice_watch::storage::WatermarkStore;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_listing(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path("/detail"))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(
            title,
            "2021-09-30 10:00",
            "物业服务中心",
            "<p>各位业主：</p>\n    <p>请&nbsp;&nbsp;周知。</p>",
        )))
        .expect(1)
        .mount(server)
        .await;
}

/// Test new notices are fetched, persisted and mailed
#[tokio::test]
async fn test_cycle_sends_new_notices() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");
    fs::write(&watermark, "102").unwrap();

    mount_listing(
        &server,
        listing(&[
            (json!(105), "2021-09-30 10:00:00"),
            (json!("104"), "2021-09-29 10:00:00"),
            (json!(103), "2021-09-28 10:00:00"),
            (json!(102), "2021-09-27 10:00:00"),
        ]),
    )
    .await;
    mount_detail(&server, "105", "停水通知").await;
    mount_detail(&server, "103", "电梯检修").await;
    Mock::given(method("GET"))
        .and(path("/detail"))
        .and(query_param("id", "104"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = Arc::new(RecordingNotifier::default());
    let cycle = PollCycle::with_notifier(test_config(&server.uri(), &watermark), notifier.clone())
        .unwrap();
    assert_eq!(cycle.store().path(), Some(watermark.as_path()));
    let summary = cycle.run().await.unwrap();

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.completions, 3);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.watermark, Some(105));
    assert_eq!(summary.count("sent"), 2);
    assert_eq!(summary.count("skipped_empty"), 1);
    assert_eq!(fs::read_to_string(&watermark).unwrap(), "105");

    assert_eq!(
        notifier.subjects(),
        vec!["停水通知[2021-09-30 10:00]", "电梯检修[2021-09-30 10:00]"]
    );
    let sent = notifier.sent.lock().unwrap();
    assert!(sent.iter().all(|n| n.to == "me@example.com"));
    assert!(sent.iter().all(|n| n.body == "各位业主：请周知。"));
}

/// Test the watermark is the highest id, not the first one listed
#[tokio::test]
async fn test_cycle_watermark_is_true_max() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");

    mount_listing(
        &server,
        listing(&[
            (json!(103), "2021-09-30 10:00:00"),
            (json!(107), "2021-09-30 10:00:00"),
            (json!(105), "2021-09-30 10:00:00"),
        ]),
    )
    .await;
    for id in ["103", "107", "105"] {
        mount_detail(&server, id, &format!("公告{id}")).await;
    }

    let notifier = Arc::new(RecordingNotifier::default());
    let cycle = PollCycle::with_notifier(test_config(&server.uri(), &watermark), notifier.clone())
        .unwrap();
    let summary = cycle.run().await.unwrap();

    assert_eq!(summary.watermark, Some(107));
    assert_eq!(fs::read_to_string(&watermark).unwrap(), "107");
    assert_eq!(notifier.subjects().len(), 3);
}

/// Test nothing new means no detail fetches and no mail
#[tokio::test]
async fn test_cycle_idle() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");
    fs::write(&watermark, "200").unwrap();

    mount_listing(&server, listing(&[(json!(200), "2021-09-30 10:00:00")])).await;
    Mock::given(method("GET"))
        .and(path("/detail"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let notifier = Arc::new(RecordingNotifier::default());
    let cycle = PollCycle::with_notifier(test_config(&server.uri(), &watermark), notifier.clone())
        .unwrap();
    let summary = cycle.run().await.unwrap();

    assert!(summary.is_idle());
    assert!(summary.dispatch.is_empty());
    assert!(notifier.subjects().is_empty());
    assert_eq!(fs::read_to_string(&watermark).unwrap(), "200");
}

/// Test dry run leaves mail and watermark alone
#[tokio::test]
async fn test_cycle_dry_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");

    mount_listing(&server, listing(&[(json!(9), "2021-09-30 10:00:00")])).await;
    mount_detail(&server, "9", "停电通知").await;

    let notifier = Arc::new(RecordingNotifier::default());
    let cycle = PollCycle::with_notifier(test_config(&server.uri(), &watermark), notifier.clone())
        .unwrap()
        .with_dry_run(true);
    let summary = cycle.run().await.unwrap();

    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.watermark, None);
    assert_eq!(summary.dispatch[0].outcome, DispatchOutcome::DryRun);
    assert!(notifier.subjects().is_empty());
    assert!(!watermark.exists());
}

/// Test send failures are contained and the run still succeeds
#[tokio::test]
async fn test_cycle_send_failures_contained() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");

    mount_listing(
        &server,
        listing(&[
            (json!(2), "2021-09-30 10:00:00"),
            (json!(1), "2021-09-30 10:00:00"),
        ]),
    )
    .await;
    mount_detail(&server, "2", "二").await;
    mount_detail(&server, "1", "一").await;

    let notifier = Arc::new(RecordingNotifier::failing());
    let cycle = PollCycle::with_notifier(test_config(&server.uri(), &watermark), notifier.clone())
        .unwrap();
    let summary = cycle.run().await.unwrap();

    assert_eq!(summary.count("failed"), 2);
    assert_eq!(notifier.subjects().len(), 2);
    assert_eq!(fs::read_to_string(&watermark).unwrap(), "2");
}

/// Test the window policy ignores the watermark file entirely
#[tokio::test]
async fn test_cycle_window_policy() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");

    mount_listing(
        &server,
        listing(&[
            (json!(31), "2021-09-30 09:59:50"),
            (json!(30), "2021-09-30 08:00:00"),
        ]),
    )
    .await;
    mount_detail(&server, "31", "新公告").await;

    let mut config = test_config(&server.uri(), &watermark);
    config.dedup.policy = DedupMode::Window;
    config.dedup.window_secs = 3600;

    let notifier = Arc::new(RecordingNotifier::default());
    let cycle = PollCycle::with_notifier(config, notifier.clone()).unwrap();
    assert_eq!(cycle.store(), &WatermarkStore::Disabled);

    // 10:00 at +08:00
    let now = Utc.with_ymd_and_hms(2021, 9, 30, 2, 0, 0).unwrap();
    let summary = cycle.run_at(now).await.unwrap();

    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.watermark, None);
    assert_eq!(notifier.subjects(), vec!["新公告[2021-09-30 10:00]"]);
    assert!(!watermark.exists());
}

/// Test a listing failure aborts the run before anything is sent
#[tokio::test]
async fn test_cycle_listing_failure_is_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let watermark = dir.path().join("lastid.txt");
    fs::write(&watermark, "5").unwrap();

    Mock::given(method("POST"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let notifier = Arc::new(RecordingNotifier::default());
    let cycle = PollCycle::with_notifier(test_config(&server.uri(), &watermark), notifier.clone())
        .unwrap();
    let err = cycle.run().await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Network);
    assert!(notifier.subjects().is_empty());
    assert_eq!(fs::read_to_string(&watermark).unwrap(), "5");
}

/// Test missing mail credentials are rejected before any request
#[tokio::test]
async fn test_cycle_requires_mail_settings() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut config = test_config(&server.uri(), &dir.path().join("lastid.txt"));
    config.mail.password = None;

    let result = PollCycle::with_notifier(config, Arc::new(RecordingNotifier::default()));
    let err = result.err().unwrap();

    assert_eq!(err.category(), ErrorCategory::Config);
    assert!(server.received_requests().await.unwrap().is_empty());
}
