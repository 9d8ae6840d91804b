//! Dispatch gateway behavior against an in-process origin.

use axum::{
    Router,
    extract::Request as AxumRequest,
    http::{StatusCode as AxumStatus, header},
    response::IntoResponse,
};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use gameres_gate::config::GateConfig;
use gameres_gate::gateway::{
    self, DispatchGateway, LocalStore, MissNotifier, SupervisorMessage, Upstream,
};
use gameres_gate::proxy_body::{self, ProxyBody};
use gameres_gate::rules::RuleTable;
use gameres_gate::supervisor::Supervisor;

// ============================================================================
// Helpers
// ============================================================================

type Hits = Arc<Mutex<Vec<String>>>;

fn install_crypto() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Origin that records every path+query it sees. Paths containing
/// `map3` or `missing` are 404; `/echo-host` returns the Host header.
async fn spawn_origin() -> (SocketAddr, Hits) {
    let hits: Hits = Arc::new(Mutex::new(Vec::new()));
    let recorded = hits.clone();

    let app = Router::new().fallback(move |req: AxumRequest| {
        let recorded = recorded.clone();
        async move {
            let pq = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            recorded.lock().unwrap().push(pq.clone());

            if req.uri().path() == "/echo-host" {
                let host = req
                    .headers()
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                return (AxumStatus::OK, host).into_response();
            }
            if pq.contains("map3") || pq.contains("missing") {
                return AxumStatus::NOT_FOUND.into_response();
            }
            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .unwrap_or_default();
            (
                AxumStatus::OK,
                [(header::CONTENT_TYPE, "application/octet-stream")],
                format!("origin:{pq}:{}", String::from_utf8_lossy(&body)),
            )
                .into_response()
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn gateway_for(
    root: &Path,
    origin: &str,
) -> (DispatchGateway, mpsc::Receiver<SupervisorMessage>) {
    install_crypto();
    let (notifier, rx) = MissNotifier::channel(16);
    let gw = DispatchGateway::new(
        RuleTable::embedded().unwrap(),
        LocalStore::new(root),
        Upstream::new(origin).unwrap(),
        notifier,
    );
    (gw, rx)
}

fn get(path: &str) -> Request<ProxyBody> {
    Request::get(path).body(proxy_body::empty()).unwrap()
}

async fn body_string(body: ProxyBody) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn write_asset(root: &Path, rel: &str, contents: &[u8]) {
    let file = root.join(rel);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(file, contents).unwrap();
}

// ============================================================================
// Dispatch scenarios
// ============================================================================

#[tokio::test]
async fn test_local_file_served_without_upstream() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "resource/map1.json", br#"{"map":1}"#);
    let (addr, hits) = spawn_origin().await;
    let (gw, mut rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let response = gw.handle(get("/resource/map1.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache, no-store");
    assert_eq!(body_string(response.into_body()).await, r#"{"map":1}"#);

    assert!(hits.lock().unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_absent_file_falls_back_to_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, hits) = spawn_origin().await;
    let (gw, mut rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let response = gw.handle(get("/resource/map2.json?v=7")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response.into_body()).await,
        "origin:/resource/map2.json?v=7:"
    );

    assert_eq!(*hits.lock().unwrap(), vec!["/resource/map2.json?v=7"]);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_upstream_404_notifies_once_and_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, _hits) = spawn_origin().await;
    let (gw, mut rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let response = gw.handle(get("/resource/map3.json")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(
        rx.try_recv().unwrap(),
        SupervisorMessage::NotFound("/resource/map3.json".to_string())
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_force_proxy_ignores_local_copy() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "dll/engine.swf", b"stale local copy");
    write_asset(dir.path(), "public/dist/app.js", b"stale bundle");
    let (addr, hits) = spawn_origin().await;
    let (gw, mut rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let response = gw.handle(get("/dll/engine.swf")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response.into_body()).await, "origin:/dll/engine.swf:");

    let response = gw.handle(get("/public/dist/app.js")).await;
    assert_eq!(body_string(response.into_body()).await, "origin:/public/dist/app.js:");

    // Force-proxy 404s are not reported.
    let response = gw.handle(get("/dll/missing.swf")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(rx.try_recv().is_err());

    assert_eq!(hits.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_method_and_body_are_forwarded() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, _hits) = spawn_origin().await;
    let (gw, _rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let req = Request::builder()
        .method(Method::POST)
        .uri("/seer/report")
        .body(proxy_body::full("payload"))
        .unwrap();
    let response = gw.handle(req).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response.into_body()).await,
        "origin:/seer/report:payload"
    );
}

#[tokio::test]
async fn test_host_header_targets_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, _hits) = spawn_origin().await;
    let (gw, _rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let req = Request::get("/echo-host")
        .header("host", "127.0.0.1:9990")
        .body(proxy_body::empty())
        .unwrap();
    let response = gw.handle(req).await;
    assert_eq!(body_string(response.into_body()).await, addr.to_string());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);
    let (gw, mut rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let response = gw.handle(get("/resource/map9.json")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_traversal_is_not_served_locally() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "assets/inner.json", b"inner");
    std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();
    let (addr, hits) = spawn_origin().await;
    let assets = dir.path().join("assets");
    let store = LocalStore::new(&assets);
    let (gw, _rx) = gateway_for(&assets, &format!("http://{addr}"));

    for path in [
        "/%2e%2e/secret.txt",
        "/..%2Fsecret.txt",
        "/resource/..%2F..%2Fsecret.txt",
        "/%2e%2e%2fsecret.txt",
    ] {
        assert!(store.resolve(path).is_none(), "{path} resolved locally");
        let response = gw.handle(get(path)).await;
        assert_ne!(body_string(response.into_body()).await, "secret", "{path}");
    }
    assert_eq!(hits.lock().unwrap().len(), 4);
}

// ============================================================================
// Over the wire
// ============================================================================

#[tokio::test]
async fn test_serve_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    write_asset(dir.path(), "resource/map1.json", b"local-bytes");
    let (addr, _hits) = spawn_origin().await;
    let (gw, _rx) = gateway_for(dir.path(), &format!("http://{addr}"));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gw_addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(gateway::serve(listener, gw, shutdown.clone()));

    let client = reqwest::Client::new();
    let local = client
        .get(format!("http://{gw_addr}/resource/map1.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(local.status(), reqwest::StatusCode::OK);
    assert_eq!(local.text().await.unwrap(), "local-bytes");

    let proxied = client
        .get(format!("http://{gw_addr}/dll/engine.swf"))
        .send()
        .await
        .unwrap();
    assert_eq!(proxied.text().await.unwrap(), "origin:/dll/engine.swf:");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_supervisor_runs_both_servers() {
    install_crypto();
    let dir = tempfile::tempdir().unwrap();
    let (origin, _hits) = spawn_origin().await;
    write_asset(&dir.path().join("public"), "index.html", b"<html>seer</html>");

    let config = GateConfig {
        gateway_port: 0,
        static_port: 0,
        upstream: Some(format!("http://{origin}")),
        asset_root: dir.path().join("nieoasset"),
        static_root: dir.path().join("public"),
        ..GateConfig::default()
    };
    let shutdown = CancellationToken::new();
    let running = Supervisor::new(config).start(shutdown.clone()).await.unwrap();
    let client = reqwest::Client::new();

    let index = client
        .get(format!("http://{}/", running.static_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(index.text().await.unwrap(), "<html>seer</html>");

    let static_miss = client
        .get(format!("http://{}/resource/map3.json", running.static_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(static_miss.status(), reqwest::StatusCode::NOT_FOUND);

    let miss = client
        .get(format!("http://{}/resource/map3.json", running.gateway_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(miss.status(), reqwest::StatusCode::NOT_FOUND);
    drop(client);

    shutdown.cancel();
    let relayed = tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .unwrap();
    assert_eq!(relayed, 1);
}
