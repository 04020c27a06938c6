// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Graph endpoints backed by the shared graph cache.

use axum::{extract::State, Json};
use egress_lite_processing::requests::{
    self, CreateGraphRequest, CreateGraphResponse, StairConnectionsRequest,
};
use egress_lite_routing::StairConnection;

use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/create-graph - Build the graph for a grid, or reuse the
/// cached one with the same content key.
pub async fn create_graph(
    State(state): State<AppState>,
    Json(request): Json<CreateGraphRequest>,
) -> Result<Json<CreateGraphResponse>, ApiError> {
    let (engine, graphs) = (state.engine.clone(), state.graphs.clone());
    let response =
        tokio::task::spawn_blocking(move || requests::create_graph(request, &graphs, &engine))
            .await??;
    tracing::info!(
        graph_key = %response.graph_key,
        status = %response.status,
        nodes = response.nodes,
        "Graph ready"
    );
    Ok(Json(response))
}

/// POST /api/v1/stair-connections
pub async fn stair_connections(
    State(state): State<AppState>,
    Json(request): Json<StairConnectionsRequest>,
) -> Result<Json<Vec<StairConnection>>, ApiError> {
    Ok(Json(requests::stair_connections(request, &state.graphs)?))
}
