//! End-to-end tests against a real listening server.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use lightboard_core::ActiveSetSnapshot;
use lightboard_server::{LightboardServer, ServerConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Boot a test server on an ephemeral port.
async fn boot_server(config: ServerConfig) -> (String, LightboardServer, JoinHandle<()>) {
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    let server = LightboardServer::new(config, metrics);
    let (addr, handle) = server.listen().await.unwrap();
    (format!("http://{addr}"), server, handle)
}

async fn boot_default() -> (String, LightboardServer, JoinHandle<()>) {
    boot_server(ServerConfig::default()).await
}

/// Raw SSE reader: yields each frame (without its trailing blank line).
struct SseReader {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buf: String,
}

impl SseReader {
    async fn connect(base: &str) -> Self {
        let resp = reqwest::get(format!("{base}/api/active-buttons/stream"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );
        Self {
            body: resp.bytes_stream().boxed(),
            buf: String::new(),
        }
    }

    async fn next_frame(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let frame = self.buf[..pos].to_string();
                let _ = self.buf.drain(..pos + 2);
                return Some(frame);
            }
            let chunk = timeout(TIMEOUT, self.body.next()).await.ok()??.ok()?;
            self.buf.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    async fn next_snapshot(&mut self) -> ActiveSetSnapshot {
        let frame = self.next_frame().await.expect("stream ended");
        let payload = frame
            .strip_prefix("data: ")
            .unwrap_or_else(|| panic!("not a data frame: {frame:?}"));
        serde_json::from_str(payload).unwrap()
    }
}

async fn post(base: &str, body: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/active-buttons"))
        .header("content-type", "application/json")
        .body(body.to_owned())
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get(base: &str) -> Value {
    reqwest::get(format!("{base}/api/active-buttons"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn replace_dedups_and_sorts() {
    let (base, _server, _h) = boot_default().await;
    let (status, body) = post(&base, r#"{"activeIds":["b","a","a"]}"#).await;
    assert_eq!(status, 200);
    assert_eq!(body["activeIds"], json!(["a", "b"]));
    assert_eq!(get(&base).await["activeIds"], json!(["a", "b"]));
}

#[tokio::test]
async fn replace_with_empty_clears() {
    let (base, _server, _h) = boot_default().await;
    let _ = post(&base, r#"{"activeIds":["x"]}"#).await;
    let (status, _) = post(&base, r#"{"activeIds":[]}"#).await;
    assert_eq!(status, 200);
    assert_eq!(get(&base).await["activeIds"], json!([]));
}

#[tokio::test]
async fn each_replace_reaches_subscriber() {
    let (base, _server, _h) = boot_default().await;
    let mut sse = SseReader::connect(&base).await;
    assert!(sse.next_snapshot().await.is_empty());

    let _ = post(&base, r#"{"activeIds":["x"]}"#).await;
    assert_eq!(sse.next_snapshot().await.active_ids(), ["x"]);
    let _ = post(&base, r#"{"activeIds":["x"]}"#).await;
    assert_eq!(sse.next_snapshot().await.active_ids(), ["x"]);
}

#[tokio::test]
async fn idle_stream_gets_heartbeat_and_stays_open() {
    let config = ServerConfig {
        heartbeat_interval: Duration::from_millis(150),
        ..ServerConfig::default()
    };
    let (base, _server, _h) = boot_server(config).await;
    let mut sse = SseReader::connect(&base).await;
    let _ = sse.next_snapshot().await;

    assert_eq!(sse.next_frame().await.as_deref(), Some(": heartbeat"));
    assert_eq!(sse.next_frame().await.as_deref(), Some(": heartbeat"));

    let _ = post(&base, r#"{"activeIds":["alive"]}"#).await;
    loop {
        let frame = sse.next_frame().await.expect("stream ended");
        if let Some(payload) = frame.strip_prefix("data: ") {
            let snap: ActiveSetSnapshot = serde_json::from_str(payload).unwrap();
            assert_eq!(snap.active_ids(), ["alive"]);
            break;
        }
    }
}

#[tokio::test]
async fn invalid_payload_rejected_and_state_unchanged() {
    let (base, _server, _h) = boot_default().await;
    let _ = post(&base, r#"{"activeIds":["keep"]}"#).await;

    let (status, body) = post(&base, r#"{ "foo": 1 }"#).await;
    assert_eq!(status, 422);
    assert!(body["error"].is_string());

    let (status, body) = post(&base, "not json").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid JSON payload.");

    assert_eq!(get(&base).await["activeIds"], json!(["keep"]));
}

#[tokio::test]
async fn late_joiner_gets_current_state_first() {
    let (base, _server, _h) = boot_default().await;
    let _ = post(&base, r#"{"activeIds":["late","early"]}"#).await;

    let mut sse = SseReader::connect(&base).await;
    assert_eq!(sse.next_snapshot().await.active_ids(), ["early", "late"]);
}

#[tokio::test]
async fn fanout_reaches_every_stream() {
    let (base, server, _h) = boot_default().await;
    let mut readers = Vec::new();
    for _ in 0..3 {
        let mut sse = SseReader::connect(&base).await;
        let _ = sse.next_snapshot().await;
        readers.push(sse);
    }
    assert_eq!(server.store().subscriber_count(), 3);

    let _ = post(&base, r#"{"activeIds":["all"]}"#).await;
    for sse in &mut readers {
        assert_eq!(sse.next_snapshot().await.active_ids(), ["all"]);
    }
}

#[tokio::test]
async fn disconnect_releases_subscription() {
    let (base, server, _h) = boot_default().await;
    let mut sse = SseReader::connect(&base).await;
    let _ = sse.next_snapshot().await;
    assert_eq!(server.store().subscriber_count(), 1);

    drop(sse);

    // The server notices on its next write; a publish forces one.
    let released = timeout(TIMEOUT, async {
        loop {
            let _ = server.store().replace(["poke"]);
            if server.store().subscriber_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "subscription leaked after disconnect");
}

#[tokio::test]
async fn subscriber_cap_returns_503() {
    let config = ServerConfig {
        max_subscribers: 1,
        ..ServerConfig::default()
    };
    let (base, server, _h) = boot_server(config).await;
    let mut first = SseReader::connect(&base).await;
    let _ = first.next_snapshot().await;

    let resp = reqwest::get(format!("{base}/api/active-buttons/stream"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("limit"));
    assert_eq!(server.store().subscriber_count(), 1);
}

#[tokio::test]
async fn health_reports_subscribers() {
    let (base, _server, _h) = boot_default().await;
    let mut sse = SseReader::connect(&base).await;
    let _ = sse.next_snapshot().await;
    let _ = post(&base, r#"{"activeIds":["a","b","c"]}"#).await;

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["subscribers"], 1);
    assert_eq!(health["activeCount"], 3);
}

#[tokio::test]
async fn graceful_shutdown_ends_open_streams() {
    let (base, server, handle) = boot_default().await;
    let mut sse = SseReader::connect(&base).await;
    let _ = sse.next_snapshot().await;

    let drained = server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(Duration::from_secs(3)))
        .await;
    assert!(drained);
    assert!(sse.next_frame().await.is_none());
    assert_eq!(server.store().subscriber_count(), 0);
}
