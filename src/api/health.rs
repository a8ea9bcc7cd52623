//! Health check endpoints

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::app::AppState;
use crate::services::ServerState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub state: ServerState,
    pub live_subscriptions: usize,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub database: bool,
}

/// Health check - returns OK while the server is accepting work
async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let lifecycle = *state.lifecycle.borrow();
    Json(HealthResponse {
        status: if lifecycle == ServerState::Listening {
            "healthy"
        } else {
            "draining"
        },
        version: env!("CARGO_PKG_VERSION"),
        state: lifecycle,
        live_subscriptions: state.subscriptions.live_connections(),
    })
}

/// Readiness check - verifies the database answers
async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    let db_ok = sqlx::query("SELECT 1")
        .fetch_one(state.db.pool())
        .await
        .is_ok();

    Json(ReadyResponse {
        ready: db_ok,
        database: db_ok,
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
