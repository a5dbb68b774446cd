//! Management endpoint handlers

pub mod autopilot;
pub mod state_store;

use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
