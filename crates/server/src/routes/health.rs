use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    engine: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = if state.context().is_closed() {
        "closed"
    } else {
        "ready"
    };
    Json(HealthResponse {
        status: "ok",
        engine,
    })
}
