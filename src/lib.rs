//! authsentry -- brute-force and anomaly detection over authentication logs.
//!
//! This crate provides the core library for windowed feature extraction,
//! rule- and model-based flagging, incident aggregation, trend forecasting,
//! and the supporting storage, query, and API layers.

pub mod api;
pub mod config;
pub mod detect;
pub mod forecast;
pub mod ingest;
pub mod query;
pub mod storage;

use anyhow::Result;

/// Start the authsentry daemon: API server over the incident store.
pub async fn serve(bind: &str, db_path: &str) -> Result<()> {
    tracing::info!(%db_path, "Initializing database");
    let pool = storage::open_pool(db_path)?;

    let state = api::state::AppState { pool };
    let app = api::router(state);

    let addr: std::net::SocketAddr = bind.parse()?;
    tracing::info!(%addr, "authsentry listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
