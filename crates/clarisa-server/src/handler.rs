//! HTTP request handlers.

use crate::server::AppState;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Envelope wrapping every trigger response.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub message: String,
    pub status: u16,
    pub data: Value,
    pub errors: Option<String>,
    pub timestamp: String,
    pub path: String,
}

impl ServerResponse {
    pub fn success(path: &Uri, message: impl Into<String>, data: Value) -> Self {
        Self::new(path, StatusCode::OK, message, data, None)
    }

    pub fn failure(
        path: &Uri,
        status: StatusCode,
        message: impl Into<String>,
        errors: impl Into<String>,
    ) -> Self {
        Self::new(path, status, message, Value::Null, Some(errors.into()))
    }

    fn new(
        path: &Uri,
        status: StatusCode,
        message: impl Into<String>,
        data: Value,
        errors: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            status: status.as_u16(),
            data,
            errors,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: path.to_string(),
        }
    }

    fn into_response_parts(self) -> (StatusCode, Json<Self>) {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("[GET]: {} status: {} - {:?}", self.path, self.status, self.errors);
        } else if status.is_client_error() || status.is_redirection() {
            warn!("[GET]: {} status: {} - {:?}", self.path, self.status, self.errors);
        }
        (status, Json(self))
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Run a replication cycle and report its outcome.
///
/// The cycle runs on its own task, so a client that goes away mid-cycle
/// does not interrupt it.
pub async fn handle_cloning(State(state): State<Arc<AppState>>, uri: Uri) -> impl IntoResponse {
    info!("Clarisa cloning requested");

    let Some(handle) = state.replicator.spawn_cycle() else {
        return ServerResponse::failure(
            &uri,
            StatusCode::CONFLICT,
            "A Clarisa replication cycle is already running",
            "cycle in progress",
        )
        .into_response_parts();
    };

    let response = match handle.await {
        Ok(Ok(report)) => match serde_json::to_value(&report) {
            Ok(data) => ServerResponse::success(&uri, "Clarisa's data was cloned", data),
            Err(e) => ServerResponse::failure(
                &uri,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to serialize the cycle report",
                e.to_string(),
            ),
        },
        Ok(Err(e)) => {
            let status = StatusCode::from_u16(e.to_http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            ServerResponse::failure(&uri, status, "Clarisa replication cycle failed", e.to_string())
        }
        Err(e) => ServerResponse::failure(
            &uri,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Clarisa replication task failed",
            e.to_string(),
        ),
    };

    response.into_response_parts()
}
