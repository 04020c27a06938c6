// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Path and escape-route endpoints.

use axum::{extract::State, Json};
use egress_lite_processing::requests::{
    self, EscapeRouteRequest, EscapeRouteResponse, EscapeRoutesRequest, EscapeRoutesResponse,
    FindPathRequest, FindPathResponse,
};
use egress_lite_routing::CancelToken;

use crate::error::ApiError;
use crate::AppState;

/// Cancels the analysis when the request future is dropped, e.g. by the
/// timeout layer or a client disconnect.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// POST /api/v1/find-path
pub async fn find_path(
    State(state): State<AppState>,
    Json(request): Json<FindPathRequest>,
) -> Result<Json<FindPathResponse>, ApiError> {
    let graphs = state.graphs.clone();
    let response =
        tokio::task::spawn_blocking(move || requests::find_route(request, &graphs)).await??;
    tracing::debug!(
        graph_key = %response.graph_key,
        cells = response.path.len(),
        cost = response.cost,
        "Path found"
    );
    Ok(Json(response))
}

/// POST /api/v1/escape-route
pub async fn escape_route(
    State(state): State<AppState>,
    Json(request): Json<EscapeRouteRequest>,
) -> Result<Json<EscapeRouteResponse>, ApiError> {
    let (engine, graphs) = (state.engine.clone(), state.graphs.clone());
    let guard = CancelOnDrop(CancelToken::new());
    let cancel = guard.0.clone();
    let response = tokio::task::spawn_blocking(move || {
        requests::escape_route(request, &graphs, &engine, &cancel)
    })
    .await??;
    drop(guard);
    Ok(Json(response))
}

/// POST /api/v1/escape-routes - Analyse many spaces; all detected spaces
/// when none are given.
pub async fn escape_routes(
    State(state): State<AppState>,
    Json(request): Json<EscapeRoutesRequest>,
) -> Result<Json<EscapeRoutesResponse>, ApiError> {
    let (engine, graphs) = (state.engine.clone(), state.graphs.clone());
    let guard = CancelOnDrop(CancelToken::new());
    let cancel = guard.0.clone();
    let response = tokio::task::spawn_blocking(move || {
        requests::escape_routes(request, &graphs, &engine, &cancel)
    })
    .await??;
    drop(guard);
    tracing::info!(
        graph_key = %response.graph_key,
        routes = response.escape_routes.len(),
        "Escape routes computed"
    );
    Ok(Json(response))
}
