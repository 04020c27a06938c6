// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types and handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use egress_lite_processing::Error as EngineError;
use egress_lite_routing::Error as RoutingError;
use serde::Serialize;
use thiserror::Error;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NoPathFound(String),

    #[error("{0}")]
    StaleGraph(String),

    #[error("No graph has been built yet")]
    GraphNotBuilt,

    #[error("No exits detected")]
    NoExits,

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Join error")]
    Join(#[from] tokio::task::JoinError),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::InvalidGrid(_) => (StatusCode::BAD_REQUEST, "INVALID_GRID"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::NoPathFound(_) => (StatusCode::NOT_FOUND, "NO_PATH_FOUND"),
            ApiError::StaleGraph(_) => (StatusCode::CONFLICT, "STALE_GRAPH"),
            ApiError::GraphNotBuilt => (StatusCode::CONFLICT, "GRAPH_NOT_BUILT"),
            ApiError::NoExits => (StatusCode::UNPROCESSABLE_ENTITY, "NO_EXITS"),
            ApiError::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "CANCELLED"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Join(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TASK_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Grid(e) => ApiError::InvalidGrid(e.to_string()),
            EngineError::Routing(RoutingError::Cancelled) => ApiError::Cancelled,
            EngineError::Routing(e @ RoutingError::NoPathFound { .. }) => {
                ApiError::NoPathFound(e.to_string())
            }
            EngineError::Routing(e) => ApiError::InvalidRequest(e.to_string()),
            EngineError::NoExitsDetected => ApiError::NoExits,
            e @ EngineError::StaleGraphRequested { .. } => ApiError::StaleGraph(e.to_string()),
            EngineError::GraphNotBuilt => ApiError::GraphNotBuilt,
            EngineError::InvalidRequest(e) => ApiError::InvalidRequest(e),
            EngineError::Config(e) => ApiError::Internal(e),
        }
    }
}
