//! Mock upstream origin for manual runs against the gateway.
//!
//! Serves a few fixed assets, answers the login endpoint with a session,
//! and returns 404 for everything else.

use axum::{
    Json, Router,
    extract::Path,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .route("/dll/{*file}", get(dll))
        .route("/public/dist/{*file}", get(dist))
        .route("/seer/customer/login", post(login))
        .fallback(not_found);

    let port = std::env::var("MOCK_ORIGIN_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("mock origin listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind to {}: {}", addr, e);
        e
    })?;

    axum::serve(listener, app).await.map_err(|e| {
        tracing::error!("Server error: {}", e);
        e
    })?;

    Ok(())
}

async fn dll(Path(file): Path<String>) -> impl IntoResponse {
    tracing::info!(file, "dll requested");
    (
        [(header::CONTENT_TYPE, "application/x-shockwave-flash")],
        format!("origin-dll:{file}"),
    )
}

async fn dist(Path(file): Path<String>) -> impl IntoResponse {
    tracing::info!(file, "dist requested");
    format!("origin-dist:{file}")
}

async fn login() -> Json<serde_json::Value> {
    Json(json!({ "code": 200, "session": "mock-session-0001" }))
}

async fn not_found(uri: axum::http::Uri) -> StatusCode {
    tracing::info!(path = uri.path(), "not found");
    StatusCode::NOT_FOUND
}
