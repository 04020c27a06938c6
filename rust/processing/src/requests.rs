// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request and response structures of the external interface, and the
//! handlers that serve them.
//!
//! Grid-carrying requests embed the grid bundle fields at the top level
//! (`grids`, `grid_size`, `floors`, `bbox`, `unit_size`). Graph-dependent
//! requests run against a [`GraphCache`]; they may name the graph they
//! expect with `graph_key` and are rejected when it is no longer current.

use std::sync::Arc;

use egress_lite_grid::{
    buffer_building, detect_exits, detect_spaces, BufferConfig, BufferEdge, BufferMetric,
    BuildingGrid, CellEdit, CellRef, CellType, ExitConfig, FloorGrid, GridBundle, GridCoord,
    Space, SpaceConfig,
};
use egress_lite_routing::{find_path, CancelToken, GraphOptions, PathLengths, StairConnection};
use serde::{Deserialize, Serialize};

use crate::cache::{CachedGraph, GraphCache};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::escape::{analyse_space, analyse_spaces, EscapeContext, EscapeRoute};

type NestedGrids = Vec<Vec<Vec<CellType>>>;

/// Buffer request: grid bundle plus `wall_buffer` (cells).
#[derive(Debug, Clone, Deserialize)]
pub struct BufferRequest {
    #[serde(flatten)]
    pub bundle: GridBundle,
    #[serde(default)]
    pub wall_buffer: Option<u32>,
    #[serde(default)]
    pub metric: Option<BufferMetric>,
    #[serde(default)]
    pub edge: Option<BufferEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferResponse {
    pub original_grids: NestedGrids,
    pub buffered_grids: NestedGrids,
    pub grid_size: f64,
    pub wall_buffer: u32,
    /// Clear width guaranteed by the buffer, in metres.
    pub clear_width: f64,
}

/// Cell edits applied to a bundle, answered with the re-buffered grids.
#[derive(Debug, Clone, Deserialize)]
pub struct CellUpdateRequest {
    #[serde(flatten)]
    pub bundle: GridBundle,
    #[serde(default)]
    pub updates: Vec<CellEdit>,
    #[serde(default)]
    pub wall_buffer: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceUpdateRequest {
    #[serde(flatten)]
    pub bundle: GridBundle,
    #[serde(default)]
    pub include_empty_tiles: Option<bool>,
    #[serde(default)]
    pub wall_buffer: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacesResponse {
    pub spaces: Vec<Space>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExitRequest {
    #[serde(flatten)]
    pub bundle: GridBundle,
    #[serde(default)]
    pub floor_touching_boundary_is_exterior: Option<bool>,
    #[serde(default)]
    pub group_doors: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitsResponse {
    pub exits: Vec<GridCoord>,
}

/// Builds (or reuses) the graph for a grid.
///
/// `buffered_grids` are taken as-is when present; otherwise the bundle is
/// buffered with `wall_buffer`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGraphRequest {
    #[serde(flatten)]
    pub bundle: GridBundle,
    #[serde(default)]
    pub buffered_grids: Option<NestedGrids>,
    #[serde(default)]
    pub wall_buffer: Option<u32>,
    #[serde(default)]
    pub allow_diagonal: Option<bool>,
    #[serde(default)]
    pub minimize_cost: Option<bool>,
    #[serde(default)]
    pub stair_connections: Option<Vec<StairConnection>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGraphResponse {
    /// `created` or `cached`.
    pub status: String,
    pub graph_key: String,
    pub nodes: usize,
    pub edges: usize,
    pub vertical_edges: usize,
    pub skipped_stair_connections: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StairConnectionsRequest {
    #[serde(default)]
    pub floor: Option<usize>,
    #[serde(default)]
    pub graph_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindPathRequest {
    pub start: CellRef,
    pub goals: Vec<CellRef>,
    #[serde(default)]
    pub graph_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindPathResponse {
    pub path: Vec<GridCoord>,
    pub path_lengths: PathLengths,
    pub cost: f64,
    pub graph_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EscapeRouteRequest {
    pub space: Space,
    #[serde(default)]
    pub exits: Option<Vec<GridCoord>>,
    #[serde(default)]
    pub graph_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRouteResponse {
    pub escape_route: EscapeRoute,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EscapeRoutesRequest {
    #[serde(default)]
    pub spaces: Option<Vec<Space>>,
    #[serde(default)]
    pub exits: Option<Vec<GridCoord>>,
    #[serde(default)]
    pub graph_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRoutesResponse {
    pub escape_routes: Vec<EscapeRoute>,
    pub graph_key: String,
}

fn buffer_config(config: &EngineConfig, wall_buffer: Option<u32>) -> BufferConfig {
    BufferConfig {
        radius: wall_buffer.unwrap_or(config.buffer.radius),
        ..config.buffer
    }
}

fn buffered_response(
    original: &BuildingGrid,
    buffered: &BuildingGrid,
    radius: u32,
) -> BufferResponse {
    BufferResponse {
        original_grids: original.to_nested(),
        buffered_grids: buffered.to_nested(),
        grid_size: original.grid_size(),
        wall_buffer: radius,
        clear_width: egress_lite_grid::implied_clear_width(radius, original.grid_size()),
    }
}

pub fn apply_wall_buffer(request: BufferRequest, config: &EngineConfig) -> Result<BufferResponse> {
    let mut buffer = buffer_config(config, request.wall_buffer);
    buffer.metric = request.metric.unwrap_or(buffer.metric);
    buffer.edge = request.edge.unwrap_or(buffer.edge);

    let original = BuildingGrid::try_from(request.bundle)?;
    let buffered = buffer_building(&original, &buffer)?;
    Ok(buffered_response(&original, &buffered, buffer.radius))
}

pub fn update_cells(request: CellUpdateRequest, config: &EngineConfig) -> Result<BufferResponse> {
    let buffer = buffer_config(config, request.wall_buffer);
    let original = BuildingGrid::try_from(request.bundle)?.with_edits(&request.updates)?;
    let buffered = buffer_building(&original, &buffer)?;
    tracing::debug!(edits = request.updates.len(), "Cells updated");
    Ok(buffered_response(&original, &buffered, buffer.radius))
}

/// Detects spaces on the buffered grid.
pub fn update_spaces(request: SpaceUpdateRequest, config: &EngineConfig) -> Result<SpacesResponse> {
    let space_config = SpaceConfig {
        include_empty_tiles: request
            .include_empty_tiles
            .unwrap_or(config.spaces.include_empty_tiles),
        ..config.spaces
    };
    let original = BuildingGrid::try_from(request.bundle)?;
    let buffered = buffer_building(&original, &buffer_config(config, request.wall_buffer))?;
    let spaces = detect_spaces(&buffered, &space_config);
    tracing::debug!(spaces = spaces.len(), "Spaces detected");
    Ok(SpacesResponse { spaces })
}

pub fn detect_exit_cells(request: ExitRequest, config: &EngineConfig) -> Result<ExitsResponse> {
    let exit_config = ExitConfig {
        floor_touching_boundary_is_exterior: request
            .floor_touching_boundary_is_exterior
            .unwrap_or(config.exits.floor_touching_boundary_is_exterior),
        group_doors: request.group_doors.unwrap_or(config.exits.group_doors),
    };
    let grid = BuildingGrid::try_from(request.bundle)?;
    let exits = detect_exits(&grid, &exit_config);
    tracing::debug!(exits = exits.len(), "Exits detected");
    Ok(ExitsResponse { exits })
}

pub fn create_graph(
    request: CreateGraphRequest,
    cache: &GraphCache,
    config: &EngineConfig,
) -> Result<CreateGraphResponse> {
    let options = GraphOptions {
        allow_diagonal: request.allow_diagonal.unwrap_or(config.graph.allow_diagonal),
        minimize_cost: request.minimize_cost.unwrap_or(config.graph.minimize_cost),
        ..config.graph
    };
    let buffer = buffer_config(config, request.wall_buffer);

    let original = BuildingGrid::try_from(request.bundle)?;
    let buffered = match request.buffered_grids {
        // the width rule reads the radius, so it cannot be guessed here
        Some(_) if request.wall_buffer.is_none() => {
            return Err(Error::InvalidRequest(
                "buffered_grids requires the wall_buffer radius they were produced with".into(),
            ));
        }
        Some(grids) => {
            let floors = grids
                .into_iter()
                .map(FloorGrid::from_rows)
                .collect::<egress_lite_grid::Result<Vec<_>>>()?;
            original.with_grids(floors)?
        }
        None => buffer_building(&original, &buffer)?,
    };

    let (entry, hit) = cache.get_or_build(
        original,
        buffered,
        &options,
        request.stair_connections,
        &config.stairs,
        buffer.radius,
    )?;
    let stats = entry.graph.stats();
    Ok(CreateGraphResponse {
        status: if hit { "cached" } else { "created" }.to_string(),
        graph_key: entry.key.clone(),
        nodes: stats.nodes,
        edges: stats.edges,
        vertical_edges: stats.vertical_edges,
        skipped_stair_connections: stats.skipped_stair_connections,
    })
}

/// Stair connections in use by the cached graph, optionally for one floor.
pub fn stair_connections(
    request: StairConnectionsRequest,
    cache: &GraphCache,
) -> Result<Vec<StairConnection>> {
    let entry = cache.resolve(request.graph_key.as_deref())?;
    let mut connections = entry.graph.stair_connections();
    if let Some(floor) = request.floor {
        connections.retain(|c| c.touches_floor(floor));
    }
    Ok(connections)
}

pub fn find_route(request: FindPathRequest, cache: &GraphCache) -> Result<FindPathResponse> {
    let entry = cache.resolve(request.graph_key.as_deref())?;
    let goals: Vec<GridCoord> = request.goals.into_iter().map(GridCoord::from).collect();
    let result = find_path(&entry.graph, request.start.into(), &goals)?;
    Ok(FindPathResponse {
        path: result.path,
        path_lengths: result.lengths,
        cost: result.cost,
        graph_key: entry.key.clone(),
    })
}

fn exits_for(entry: &CachedGraph, exits: Option<Vec<GridCoord>>, config: &EngineConfig) -> Vec<GridCoord> {
    exits.unwrap_or_else(|| detect_exits(&entry.buffered, &config.exits))
}

fn context<'a>(entry: &'a Arc<CachedGraph>, config: &'a EngineConfig) -> EscapeContext<'a> {
    EscapeContext {
        buffered: &entry.buffered,
        graph: &entry.graph,
        buffer_radius: entry.buffer_radius,
        compliance: &config.compliance,
    }
}

pub fn escape_route(
    request: EscapeRouteRequest,
    cache: &GraphCache,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<EscapeRouteResponse> {
    let entry = cache.resolve(request.graph_key.as_deref())?;
    let exits = exits_for(&entry, request.exits, config);
    let escape_route = analyse_space(&context(&entry, config), &request.space, &exits, cancel)?;
    Ok(EscapeRouteResponse { escape_route })
}

/// Escape routes for the given spaces, or for every detected space.
pub fn escape_routes(
    request: EscapeRoutesRequest,
    cache: &GraphCache,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<EscapeRoutesResponse> {
    let entry = cache.resolve(request.graph_key.as_deref())?;
    let exits = exits_for(&entry, request.exits, config);
    let spaces = request
        .spaces
        .unwrap_or_else(|| detect_spaces(&entry.buffered, &config.spaces));
    let escape_routes = analyse_spaces(&context(&entry, config), &spaces, &exits, cancel)?;
    Ok(EscapeRoutesResponse {
        escape_routes,
        graph_key: entry.key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::Rule;
    use serde_json::json;

    fn ring() -> serde_json::Value {
        json!({
            "grids": [[
                ["wall", "door", "wall", "wall", "wall"],
                ["wall", "floor", "floor", "floor", "wall"],
                ["wall", "floor", "floor", "floor", "wall"],
                ["wall", "floor", "floor", "floor", "wall"],
                ["wall", "wall", "wall", "wall", "wall"]
            ]],
            "grid_size": 0.5
        })
    }

    fn with(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
        if let (Some(map), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }
        base
    }

    fn create(cache: &GraphCache, extra: serde_json::Value) -> CreateGraphResponse {
        let request: CreateGraphRequest = serde_json::from_value(with(ring(), extra)).unwrap();
        create_graph(request, cache, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn wall_buffer_marks_walla() {
        let request: BufferRequest =
            serde_json::from_value(with(ring(), json!({"wall_buffer": 1}))).unwrap();
        let response = apply_wall_buffer(request, &EngineConfig::default()).unwrap();
        assert_eq!(response.buffered_grids[0][1][1], CellType::Walla);
        assert_eq!(response.original_grids[0][1][1], CellType::Floor);
        // The centre is two cells from every wall.
        assert_eq!(response.buffered_grids[0][2][2], CellType::Floor);
        assert_eq!(response.clear_width, 1.0);
    }

    #[test]
    fn cell_updates_accept_type_alias() {
        let request: CellUpdateRequest = serde_json::from_value(with(
            ring(),
            json!({"updates": [{"floor": 0, "row": 2, "col": 2, "type": "wall"}]}),
        ))
        .unwrap();
        let response = update_cells(request, &EngineConfig::default()).unwrap();
        assert_eq!(response.original_grids[0][2][2], CellType::Wall);
    }

    #[test]
    fn invalid_bundle_is_a_grid_error() {
        let request: ExitRequest =
            serde_json::from_value(json!({"grids": [], "grid_size": 0.5})).unwrap();
        assert!(matches!(
            detect_exit_cells(request, &EngineConfig::default()),
            Err(Error::Grid(_))
        ));
    }

    #[test]
    fn spaces_and_exits_from_a_bundle() {
        let request: SpaceUpdateRequest = serde_json::from_value(ring()).unwrap();
        let spaces = update_spaces(request, &EngineConfig::default()).unwrap().spaces;
        assert_eq!(spaces.len(), 1);
        assert_eq!(spaces[0].id, "Space_0_1");

        let request: ExitRequest = serde_json::from_value(ring()).unwrap();
        let exits = detect_exit_cells(request, &EngineConfig::default()).unwrap();
        assert_eq!(
            serde_json::to_value(&exits).unwrap(),
            json!({"exits": [[0, 1, 0]]})
        );
    }

    #[test]
    fn create_graph_reports_cache_status() {
        let cache = GraphCache::default();
        let first = create(&cache, json!({"allow_diagonal": false}));
        assert_eq!(first.status, "created");
        assert_eq!(first.nodes, 10);
        let second = create(&cache, json!({"allow_diagonal": false}));
        assert_eq!(second.status, "cached");
        assert_eq!(second.graph_key, first.graph_key);
        let diagonal = create(&cache, json!({"allow_diagonal": true}));
        assert_ne!(diagonal.graph_key, first.graph_key);
    }

    #[test]
    fn find_path_uses_the_cached_graph() {
        let cache = GraphCache::default();
        let graph = create(&cache, json!({"minimize_cost": false}));
        let request: FindPathRequest = serde_json::from_value(json!({
            "start": {"row": 3, "col": 3, "floor": 0},
            "goals": [{"row": 0, "col": 1, "floor": 0}],
            "graph_key": graph.graph_key
        }))
        .unwrap();
        let response = find_route(request, &cache).unwrap();
        assert_eq!(response.path.first(), Some(&GridCoord::new(3, 3, 0)));
        assert_eq!(response.path.last(), Some(&GridCoord::new(0, 1, 0)));
        assert!((response.path_lengths.total_length - 2.5).abs() < 1e-9);
    }

    #[test]
    fn stale_graph_key_is_rejected() {
        let cache = GraphCache::default();
        let old = create(&cache, json!({}));
        create(&cache, json!({"wall_buffer": 1}));
        let request = EscapeRoutesRequest {
            graph_key: Some(old.graph_key),
            ..EscapeRoutesRequest::default()
        };
        let err = escape_routes(request, &cache, &EngineConfig::default(), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::StaleGraphRequested { .. }));
    }

    #[test]
    fn escape_routes_default_to_detected_spaces_and_exits() {
        let cache = GraphCache::default();
        create(&cache, json!({"minimize_cost": false}));
        let response = escape_routes(
            EscapeRoutesRequest::default(),
            &cache,
            &EngineConfig::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(response.escape_routes.len(), 1);
        let route = &response.escape_routes[0];
        assert_eq!(route.furthest_point, Some(GridCoord::new(3, 3, 0)));
        assert_eq!(route.optimal_exit, Some(GridCoord::new(0, 1, 0)));
        assert!((route.distance.unwrap() - 2.5).abs() < 1e-9);
        assert!(route.violations["daytime"].is_empty());
    }

    #[test]
    fn escape_route_for_a_client_space() {
        let cache = GraphCache::default();
        create(&cache, json!({"minimize_cost": false}));
        let request: EscapeRouteRequest = serde_json::from_value(json!({
            "space": {
                "id": "Room",
                "name": "Room",
                "floor": 0,
                "points": [[0.5, 0.5], [2.0, 0.5], [2.0, 2.0], [0.5, 2.0], [0.5, 0.5]]
            }
        }))
        .unwrap();
        let response =
            escape_route(request, &cache, &EngineConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(response.escape_route.space_id, "Room");
        assert!(response.escape_route.distance.is_some());
    }

    fn routes(cache: &GraphCache) -> Vec<EscapeRoute> {
        escape_routes(
            EscapeRoutesRequest::default(),
            cache,
            &EngineConfig::default(),
            &CancelToken::new(),
        )
        .unwrap()
        .escape_routes
    }

    fn clear_width_failures(route: &EscapeRoute) -> usize {
        route.violations["daytime"]
            .iter()
            .filter(|v| v.rule == Rule::ClearWidth)
            .count()
    }

    #[test]
    fn radius_change_on_a_wall_free_grid_rebuilds() {
        // nothing to inflate, so both radii give the same buffered grid
        let open = json!({
            "grids": [[
                ["door", "floor", "floor"],
                ["floor", "floor", "floor"]
            ]],
            "grid_size": 0.25
        });
        let cache = GraphCache::default();
        let config = EngineConfig::default();
        let create = |radius: u32| {
            let request: CreateGraphRequest =
                serde_json::from_value(with(open.clone(), json!({"wall_buffer": radius}))).unwrap();
            create_graph(request, &cache, &config).unwrap()
        };

        let wide = create(4);
        assert_eq!(wide.status, "created");
        assert_eq!(clear_width_failures(&routes(&cache)[0]), 0);

        let narrow = create(1);
        assert_eq!(narrow.status, "created");
        assert_ne!(narrow.graph_key, wide.graph_key);
        assert_eq!(clear_width_failures(&routes(&cache)[0]), 1);
    }

    #[test]
    fn client_buffered_grids_need_their_radius() {
        let buffered = json!([[
            ["wall", "door", "wall", "wall", "wall"],
            ["wall", "walla", "walla", "walla", "wall"],
            ["wall", "walla", "floor", "walla", "wall"],
            ["wall", "walla", "walla", "walla", "wall"],
            ["wall", "wall", "wall", "wall", "wall"]
        ]]);

        let request: CreateGraphRequest =
            serde_json::from_value(with(ring(), json!({"buffered_grids": buffered.clone()})))
                .unwrap();
        assert!(matches!(
            create_graph(request, &GraphCache::default(), &EngineConfig::default()),
            Err(Error::InvalidRequest(_))
        ));

        let cache = GraphCache::default();
        let created = create(&cache, json!({"buffered_grids": buffered, "wall_buffer": 1}));
        assert_eq!(created.status, "created");
        let entry = cache.resolve(Some(&created.graph_key)).unwrap();
        assert_eq!(entry.buffer_radius, 1);
        assert_eq!(entry.buffered.grids()[0].get(2, 2), Some(CellType::Floor));
        assert_eq!(entry.original.grids()[0].get(2, 2), Some(CellType::Floor));
        assert_eq!(entry.buffered.grids()[0].get(1, 1), Some(CellType::Walla));
    }

    #[test]
    fn stair_connections_without_graph() {
        let cache = GraphCache::default();
        assert!(matches!(
            stair_connections(StairConnectionsRequest::default(), &cache),
            Err(Error::GraphNotBuilt)
        ));
    }
}
