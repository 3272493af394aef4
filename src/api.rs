//! Read-only HTTP API over the deposit ledger.

use crate::store::DepositStore;
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Serve `GET /api/deposits` and `GET /health` until the cancellation
/// token fires.
pub async fn run_server(
    host: String,
    port: u16,
    store: Arc<dyn DepositStore>,
    cancel: CancellationToken,
) {
    let app = Router::new()
        .route("/api/deposits", get(list_deposits))
        .route("/health", get(health))
        .with_state(store);

    let addr = format!("{host}:{port}");
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind API listener on {}: {}", addr, e);
            return;
        }
    };
    info!("HTTP API listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
    {
        error!("API server error: {}", e);
    }
}

async fn list_deposits(
    State(store): State<Arc<dyn DepositStore>>,
) -> Result<Json<Vec<crate::model::Deposit>>, StatusCode> {
    match store.list_all().await {
        Ok(deposits) => Ok(Json(deposits)),
        Err(e) => {
            error!("Failed to list deposits: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_ms: u64,
}

async fn health() -> Json<HealthResponse> {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Json(HealthResponse {
        status: "ok",
        timestamp_ms,
    })
}
