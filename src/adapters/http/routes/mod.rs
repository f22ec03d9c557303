pub mod billing;
mod common;
pub mod gateway_webhook;
pub mod ops;

use axum::{Json, Router, routing::get};

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", gateway_webhook::router())
        .nest("/billing", billing::router())
        .nest("/ops", ops::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
