// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Grid-level endpoints: buffering, edits, spaces and exits.
//!
//! None of these touch the graph cache.

use axum::{extract::State, Json};
use egress_lite_processing::requests::{
    self, BufferRequest, BufferResponse, CellUpdateRequest, ExitRequest, ExitsResponse,
    SpaceUpdateRequest, SpacesResponse,
};

use crate::error::ApiError;
use crate::AppState;

/// POST /api/v1/apply-wall-buffer
pub async fn apply_wall_buffer(
    State(state): State<AppState>,
    Json(request): Json<BufferRequest>,
) -> Result<Json<BufferResponse>, ApiError> {
    let engine = state.engine.clone();
    let response =
        tokio::task::spawn_blocking(move || requests::apply_wall_buffer(request, &engine))
            .await??;
    Ok(Json(response))
}

/// POST /api/v1/update-cells
pub async fn update_cells(
    State(state): State<AppState>,
    Json(request): Json<CellUpdateRequest>,
) -> Result<Json<BufferResponse>, ApiError> {
    let engine = state.engine.clone();
    let response =
        tokio::task::spawn_blocking(move || requests::update_cells(request, &engine)).await??;
    Ok(Json(response))
}

/// POST /api/v1/update-spaces
pub async fn update_spaces(
    State(state): State<AppState>,
    Json(request): Json<SpaceUpdateRequest>,
) -> Result<Json<SpacesResponse>, ApiError> {
    let engine = state.engine.clone();
    let response =
        tokio::task::spawn_blocking(move || requests::update_spaces(request, &engine)).await??;
    tracing::info!(spaces = response.spaces.len(), "Spaces updated");
    Ok(Json(response))
}

/// POST /api/v1/detect-exits
pub async fn detect_exits(
    State(state): State<AppState>,
    Json(request): Json<ExitRequest>,
) -> Result<Json<ExitsResponse>, ApiError> {
    let engine = state.engine.clone();
    let response =
        tokio::task::spawn_blocking(move || requests::detect_exit_cells(request, &engine))
            .await??;
    tracing::info!(exits = response.exits.len(), "Exits detected");
    Ok(Json(response))
}
