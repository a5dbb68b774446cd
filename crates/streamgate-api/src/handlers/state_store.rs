//! Read-only state store endpoint.
//!
//! `GET /readonlystatestore/{store}/{key}?serde={serdeClass}`
//!
//! Replies `{"<key>": "<value>"}` on a hit, `{"<key>": ""}` on confirmed
//! absence, and `{"message": "<text>"}` on any error — always HTTP 200.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::trace;

use streamgate_query::QueryRequest;

use crate::AppState;

const MESSAGE_KEY: &str = "message";

#[derive(Debug, Deserialize)]
pub struct StoreQueryParams {
    pub serde: Option<String>,
}

pub async fn find(
    State(state): State<AppState>,
    Path((store, key)): Path<(String, String)>,
    Query(params): Query<StoreQueryParams>,
) -> Json<HashMap<String, String>> {
    let Some(query) = &state.query else {
        return message("interactive queries are not available");
    };

    let request = QueryRequest {
        store_name: store,
        key: key.clone(),
        serde_class: params.serde,
    };

    match query.find_by_key(&request).await {
        Ok(Some(value)) => Json(HashMap::from([(key, render_value(&value))])),
        Ok(None) => Json(HashMap::from([(key, String::new())])),
        Err(e) => {
            trace!(error = %e, "interactive query failed");
            message(&e.to_string())
        }
    }
}

fn message(text: &str) -> Json<HashMap<String, String>> {
    Json(HashMap::from([(MESSAGE_KEY.to_string(), text.to_string())]))
}

/// Render a store value for the JSON reply.
///
/// Values are opaque bytes on the wire. Printable UTF-8 renders as-is;
/// otherwise fixed-width big-endian integers are recognized, with lossy
/// UTF-8 as the last resort.
fn render_value(value: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(value) {
        if !text.chars().any(char::is_control) {
            return text.to_string();
        }
    }
    if let Ok(raw) = <[u8; 8]>::try_from(value) {
        return i64::from_be_bytes(raw).to_string();
    }
    if let Ok(raw) = <[u8; 4]>::try_from(value) {
        return i32::from_be_bytes(raw).to_string();
    }
    String::from_utf8_lossy(value).into_owned()
}
