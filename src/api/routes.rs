//! API route definitions.

use super::state::AppState;
use crate::storage;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/incidents", get(list_incidents))
        .route("/blocklist", get(list_blocklist))
        .route("/blocklist/block", post(block))
        .route("/blocklist/unblock", post(unblock))
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

fn error_body(err: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "data": null, "meta": { "error": err.to_string() } }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": { "status": "ok", "version": env!("CARGO_PKG_VERSION") },
        "meta": meta()
    }))
}

#[derive(Deserialize)]
struct ListParams {
    limit: Option<usize>,
}

async fn list_incidents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    let pool = state.pool.clone();
    let limit = params.limit.unwrap_or(50);

    let result =
        tokio::task::spawn_blocking(move || storage::list_recent_incidents(&pool, limit)).await;
    match result {
        Ok(Ok(incidents)) => {
            let total = incidents.len();
            Json(json!({
                "data": incidents,
                "meta": { "total": total, "timestamp": chrono::Utc::now().to_rfc3339() }
            }))
        }
        Ok(Err(e)) => error_body(e),
        Err(e) => error_body(e),
    }
}

async fn list_blocklist(State(state): State<AppState>) -> Json<Value> {
    let pool = state.pool.clone();
    let result = tokio::task::spawn_blocking(move || storage::list_blocklist(&pool)).await;
    match result {
        Ok(Ok(ips)) => Json(json!({
            "data": { "blocked": ips },
            "meta": meta()
        })),
        Ok(Err(e)) => error_body(e),
        Err(e) => error_body(e),
    }
}

#[derive(Deserialize)]
struct BlockRequest {
    src_ip: String,
}

async fn block(State(state): State<AppState>, Json(req): Json<BlockRequest>) -> Json<Value> {
    let pool = state.pool.clone();
    let ip = req.src_ip.clone();
    let result = tokio::task::spawn_blocking(move || storage::block_ip(&pool, &ip)).await;
    match result {
        Ok(Ok(())) => Json(json!({ "data": { "blocked": req.src_ip }, "meta": meta() })),
        Ok(Err(e)) => error_body(e),
        Err(e) => error_body(e),
    }
}

async fn unblock(State(state): State<AppState>, Json(req): Json<BlockRequest>) -> Json<Value> {
    let pool = state.pool.clone();
    let ip = req.src_ip.clone();
    let result = tokio::task::spawn_blocking(move || storage::unblock_ip(&pool, &ip)).await;
    match result {
        Ok(Ok(())) => Json(json!({ "data": { "unblocked": req.src_ip }, "meta": meta() })),
        Ok(Err(e)) => error_body(e),
        Err(e) => error_body(e),
    }
}
