// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub cached_graphs: usize,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/api/v1/health", "Health check endpoint"),
    ("POST", "/api/v1/apply-wall-buffer", "Inflate walls by a cell radius"),
    ("POST", "/api/v1/update-cells", "Apply cell edits and re-buffer"),
    ("POST", "/api/v1/update-spaces", "Detect spaces and their outlines"),
    ("POST", "/api/v1/detect-exits", "Find doors opening onto the exterior"),
    ("POST", "/api/v1/create-graph", "Build or reuse the routing graph"),
    ("POST", "/api/v1/stair-connections", "Stair links of the current graph"),
    ("POST", "/api/v1/find-path", "Cheapest path to any goal"),
    ("POST", "/api/v1/escape-route", "Escape route of one space"),
    ("POST", "/api/v1/escape-routes", "Escape routes of many spaces"),
];

/// GET /api/v1/health - Health check endpoint.
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "egress-lite-server",
        cached_graphs: state.graphs.len(),
    })
}

/// GET / - API information endpoint.
pub async fn info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "egress-lite-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "Escape-route analysis for building grids",
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
