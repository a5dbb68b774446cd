//! Autopilot endpoint: manual scaling and status.
//!
//! `POST /autopilot` adds one stream thread, `DELETE /autopilot` removes
//! one; both forward the autopilot's error messages verbatim. Neither
//! bypasses the state machine. `GET /autopilot` reports the current state
//! and the latest lag snapshot.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use streamgate_autopilot::AutopilotError;

use crate::models::{AutopilotStatus, ErrorBody, ThreadChange};
use crate::AppState;

pub async fn add(State(state): State<AppState>) -> Response {
    let Some(autopilot) = &state.autopilot else {
        return unavailable();
    };
    match autopilot.add_stream_thread(autopilot.generic_timeout()).await {
        Ok(thread) => (StatusCode::OK, Json(ThreadChange { thread })).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn remove(State(state): State<AppState>) -> Response {
    let Some(autopilot) = &state.autopilot else {
        return unavailable();
    };
    match autopilot
        .remove_stream_thread(autopilot.generic_timeout())
        .await
    {
        Ok(thread) => (StatusCode::OK, Json(ThreadChange { thread })).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn status(State(state): State<AppState>) -> Response {
    let Some(autopilot) = &state.autopilot else {
        return unavailable();
    };

    let threads = autopilot
        .thread_info()
        .into_iter()
        .map(|(name, lag)| {
            let lag: HashMap<String, i64> = lag
                .into_iter()
                .map(|(partition, value)| (partition.to_string(), value))
                .collect();
            (name, lag)
        })
        .collect();

    let status = AutopilotStatus {
        state: autopilot.state().await.to_string(),
        desired_thread_count: autopilot.desired_thread_count(),
        target_thread_count: autopilot.target_thread_count(),
        threads,
    };
    (StatusCode::OK, Json(status)).into_response()
}

fn error_response(error: &AutopilotError) -> Response {
    let status = match error {
        AutopilotError::InvalidTransition { .. } => StatusCode::CONFLICT,
        AutopilotError::LockUnavailable | AutopilotError::Timeout(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            message: error.to_string(),
        }),
    )
        .into_response()
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            message: "autopilot is not available".to_string(),
        }),
    )
        .into_response()
}
