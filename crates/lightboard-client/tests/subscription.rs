//! End-to-end subscription tests against real servers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::Router;
use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::get;
use futures::StreamExt;
use lightboard_client::{
    ClientConfig, ClientError, ClientSubscription, ConnectionStatus, SnapshotClient,
};
use lightboard_server::{LightboardServer, ServerConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);
const RETRY: Duration = Duration::from_millis(100);

async fn boot_lightboard(config: ServerConfig) -> (String, LightboardServer) {
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    let server = LightboardServer::new(config, metrics);
    let (addr, _handle) = server.listen().await.unwrap();
    (format!("http://{addr}"), server)
}

/// Serve `router` on an ephemeral port.
async fn boot_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let _ = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{addr}")
}

fn client(base: &str) -> SnapshotClient {
    SnapshotClient::new(&ClientConfig::new(base)).unwrap()
}

fn subscribe(base: &str) -> ClientSubscription {
    ClientSubscription::start(client(base), RETRY)
}

#[tokio::test]
async fn picks_up_current_state_on_start() {
    let (base, server) = boot_lightboard(ServerConfig::default()).await;
    let _ = server.store().replace(["b", "a"]);

    let mut sub = subscribe(&base);
    let state = timeout(TIMEOUT, sub.wait_for(|s| s.status == ConnectionStatus::Live))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.connects, 1);

    let state = timeout(TIMEOUT, sub.wait_for(|s| s.snapshot.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.active_ids(), ["a", "b"]);
    sub.shutdown().await;
}

#[tokio::test]
async fn follows_live_replacements() {
    let (base, server) = boot_lightboard(ServerConfig::default()).await;
    let mut sub = subscribe(&base);
    let _ = timeout(TIMEOUT, sub.wait_for(|s| s.status == ConnectionStatus::Live))
        .await
        .unwrap();

    let _ = client(&base).replace(["x", "y"]).await.unwrap();
    let state = timeout(TIMEOUT, sub.wait_for(|s| s.active_ids() == ["x", "y"]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.connects, 1);

    let _ = client(&base).replace(Vec::<String>::new()).await.unwrap();
    let _ = timeout(
        TIMEOUT,
        sub.wait_for(|s| s.snapshot.as_ref().is_some_and(|snap| snap.is_empty())),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(sub.active_ids().is_empty());
    sub.shutdown().await;
}

#[tokio::test]
async fn heartbeats_keep_connection_without_reconnect() {
    let config = ServerConfig {
        heartbeat_interval: Duration::from_millis(100),
        ..ServerConfig::default()
    };
    let (base, _server) = boot_lightboard(config).await;
    let mut sub = subscribe(&base);

    let state = timeout(TIMEOUT, sub.wait_for(|s| s.heartbeats >= 3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, ConnectionStatus::Live);
    assert_eq!(state.connects, 1);
    sub.shutdown().await;
}

#[tokio::test]
async fn reconnects_after_stream_ends() {
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let router = Router::new()
        .route(
            "/api/active-buttons",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route(
            "/api/active-buttons/stream",
            get(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    let frame = format!("data: {{\"activeIds\":[\"conn{n}\"],\"updatedAt\":{n}}}\n\n");
                    ([("content-type", "text/event-stream")], Body::from(frame))
                }
            }),
        );
    let base = boot_router(router).await;

    let mut sub = subscribe(&base);
    let state = timeout(TIMEOUT, sub.wait_for(|s| s.connects >= 3))
        .await
        .unwrap()
        .unwrap();
    assert!(state.snapshot.is_some());
    sub.shutdown().await;

    // Nothing is scheduled after teardown.
    let after_shutdown = connections.load(Ordering::SeqCst);
    tokio::time::sleep(RETRY * 4).await;
    assert_eq!(connections.load(Ordering::SeqCst), after_shutdown);
}

#[tokio::test]
async fn malformed_messages_are_ignored() {
    let router = Router::new().route(
        "/api/active-buttons/stream",
        get(|| async {
            let frames = [
                "data: not json\n\n",
                "data: {\"foo\":1}\n\n",
                "data: {\"activeIds\":[\"good\"],\"updatedAt\":5}\n\n",
                "data: [1,2,3]\n\n",
            ];
            let body = futures::stream::iter(
                frames.map(|f| Ok::<_, std::convert::Infallible>(f.to_string())),
            )
            .chain(futures::stream::pending());
            (
                [("content-type", "text/event-stream")],
                Body::from_stream(body),
            )
        }),
    );
    let base = boot_router(router).await;

    let mut sub = subscribe(&base);
    let state = timeout(TIMEOUT, sub.wait_for(|s| s.snapshot.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.active_ids(), ["good"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let state = sub.state();
    assert_eq!(state.active_ids(), ["good"]);
    assert_eq!(state.connects, 1);
    assert_eq!(state.status, ConnectionStatus::Live);
    sub.shutdown().await;
}

#[tokio::test]
async fn hung_snapshot_fetch_does_not_delay_stream() {
    let router = Router::new()
        .route(
            "/api/active-buttons",
            get(|| std::future::pending::<StatusCode>()),
        )
        .route(
            "/api/active-buttons/stream",
            get(|| async {
                let frame = "data: {\"activeIds\":[\"live\"],\"updatedAt\":7}\n\n";
                let body = futures::stream::iter([Ok::<_, std::convert::Infallible>(frame)])
                    .chain(futures::stream::pending());
                (
                    [("content-type", "text/event-stream")],
                    Body::from_stream(body),
                )
            }),
        );
    let base = boot_router(router).await;

    // The default request timeout is longer than TIMEOUT, so a fetch that
    // gated the stream would fail these waits.
    let mut sub = subscribe(&base);
    let state = timeout(TIMEOUT, sub.wait_for(|s| s.snapshot.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.status, ConnectionStatus::Live);
    assert_eq!(state.active_ids(), ["live"]);
    assert_eq!(state.connects, 1);

    // Teardown also cancels the fetch that is still in flight.
    timeout(TIMEOUT, sub.shutdown()).await.unwrap();
}

#[tokio::test]
async fn open_stream_gives_up_waiting_for_headers() {
    let router = Router::new().route(
        "/api/active-buttons/stream",
        get(|| std::future::pending::<StatusCode>()),
    );
    let base = boot_router(router).await;

    let config = ClientConfig::new(&base).with_request_timeout(Duration::from_millis(200));
    let client = SnapshotClient::new(&config).unwrap();
    let err = timeout(TIMEOUT, client.open_stream()).await.unwrap().unwrap_err();
    assert_matches!(err, ClientError::Timeout(limit) if limit == Duration::from_millis(200));
}

#[tokio::test]
async fn shutdown_closes_server_side_subscription() {
    let (base, server) = boot_lightboard(ServerConfig::default()).await;
    let mut sub = subscribe(&base);
    let _ = timeout(TIMEOUT, sub.wait_for(|s| s.status == ConnectionStatus::Live))
        .await
        .unwrap();
    assert_eq!(server.store().subscriber_count(), 1);

    let observer = sub.watch();
    sub.shutdown().await;
    assert_eq!(observer.borrow().status, ConnectionStatus::Closed);

    let released = timeout(TIMEOUT, async {
        while server.store().subscriber_count() > 0 {
            let _ = server.store().replace(["poke"]);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "server kept the subscription after client shutdown");
}

#[tokio::test]
async fn rejected_replace_surfaces_status_error() {
    let router = Router::new().route(
        "/api/active-buttons",
        get(|| async { StatusCode::OK }).post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                axum::Json(serde_json::json!({ "error": "bad ids" })),
            )
        }),
    );
    let base = boot_router(router).await;

    let err = client(&base).replace(["a"]).await.unwrap_err();
    assert_matches!(err, ClientError::Status { status: 422, ref message } if message == "bad ids");
}

#[tokio::test]
async fn fetch_roundtrips_against_server() {
    let (base, server) = boot_lightboard(ServerConfig::default()).await;
    let installed = client(&base).replace(["q", "p", "q"]).await.unwrap();
    assert_eq!(installed.active_ids(), ["p", "q"]);

    let fetched = client(&base).fetch().await.unwrap();
    assert_eq!(fetched, installed);
    assert_eq!(*server.store().get(), fetched);
}
