use axum::extract::State;
use axum::Json;

use super::AppState;

pub async fn start(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.start();
    Json(serde_json::json!({"message": "Retry scheduler started"}))
}

pub async fn stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.stop();
    Json(serde_json::json!({"message": "Retry scheduler stopped"}))
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({"running": state.scheduler.is_running()}))
}
