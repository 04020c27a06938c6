// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-space escape-route analysis.
//!
//! One exit field and one stair field are computed up front. Each space
//! then only reads them: its furthest point is the member cell with the
//! largest exit-field value, and its optimal path follows the field's next
//! hops. Spaces are processed in parallel and a failing space never aborts
//! the batch.

use std::time::Instant;

use egress_lite_grid::{BuildingGrid, GridCoord, Space};
use egress_lite_routing::{
    CancelToken, DistanceField, EgressGraph, FieldOptions, PathLengths,
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::compliance::{evaluate, ComplianceConfig, RouteMetrics, Violations};
use crate::error::{Error, Result};

/// Escape route of one space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRoute {
    pub space_id: String,
    pub space_name: String,
    pub floor: usize,
    /// Exit-field value at the furthest point; absent when no exit is reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Same-floor distance to the nearest connected stair, when the exit is
    /// on another floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_to_stair: Option<f64>,
    #[serde(default)]
    pub dead_end_length: f64,
    #[serde(default)]
    pub furthest_point: Option<GridCoord>,
    #[serde(default)]
    pub optimal_exit: Option<GridCoord>,
    #[serde(default)]
    pub optimal_path: Vec<GridCoord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_lengths: Option<PathLengths>,
    #[serde(default)]
    pub violations: Violations,
    /// Why this space could not be analysed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EscapeRoute {
    fn empty(space: &Space) -> Self {
        Self {
            space_id: space.id.clone(),
            space_name: space.name.clone(),
            floor: space.floor,
            distance: None,
            distance_to_stair: None,
            dead_end_length: 0.0,
            furthest_point: None,
            optimal_exit: None,
            optimal_path: Vec::new(),
            path_lengths: None,
            violations: Violations::new(),
            error: None,
        }
    }
}

/// Shared, read-only inputs of an analysis run.
#[derive(Debug, Clone, Copy)]
pub struct EscapeContext<'a> {
    /// The buffered grid the graph was built from.
    pub buffered: &'a BuildingGrid,
    pub graph: &'a EgressGraph,
    pub buffer_radius: u32,
    pub compliance: &'a ComplianceConfig,
}

/// Precomputed fields shared by every space.
struct Fields {
    exit: DistanceField,
    stair: DistanceField,
    exit_floors: FxHashSet<usize>,
    has_exits: bool,
}

/// Analyses every space against the given exits.
///
/// Exits that are not graph nodes are ignored. With no usable exit the
/// routes come back without a distance. A cancelled run returns
/// [`egress_lite_routing::Error::Cancelled`] and no routes.
pub fn analyse_spaces(
    ctx: &EscapeContext<'_>,
    spaces: &[Space],
    exits: &[GridCoord],
    cancel: &CancelToken,
) -> Result<Vec<EscapeRoute>> {
    let started = Instant::now();
    let fields = compute_fields(ctx, exits, cancel)?;

    let routes: Vec<EscapeRoute> = spaces
        .par_iter()
        .map(|space| analyse_one(ctx, &fields, space))
        .collect();

    if cancel.is_cancelled() {
        return Err(egress_lite_routing::Error::Cancelled.into());
    }

    let failed = routes.iter().filter(|r| r.error.is_some()).count();
    tracing::info!(
        spaces = routes.len(),
        failed,
        exits = exits.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Escape analysis complete"
    );
    Ok(routes)
}

/// Analyses a single space. Same semantics as [`analyse_spaces`].
pub fn analyse_space(
    ctx: &EscapeContext<'_>,
    space: &Space,
    exits: &[GridCoord],
    cancel: &CancelToken,
) -> Result<EscapeRoute> {
    let fields = compute_fields(ctx, exits, cancel)?;
    Ok(analyse_one(ctx, &fields, space))
}

fn compute_fields(
    ctx: &EscapeContext<'_>,
    exits: &[GridCoord],
    cancel: &CancelToken,
) -> Result<Fields> {
    let graph = ctx.graph;
    let mut exit_nodes = Vec::with_capacity(exits.len());
    for &exit in exits {
        match graph.node_index(exit) {
            Some(node) => exit_nodes.push(node),
            None => tracing::warn!(exit = ?exit, "Exit is not a graph node, ignoring"),
        }
    }
    exit_nodes.sort_unstable();
    exit_nodes.dedup();

    if exit_nodes.is_empty() {
        tracing::warn!(error = %Error::NoExitsDetected, "Routes will have no distance");
    }

    let exit = DistanceField::from_nodes(graph, &exit_nodes, &FieldOptions::default(), cancel)?;
    let stair = DistanceField::from_nodes(
        graph,
        &graph.connected_stairs(),
        &FieldOptions {
            horizontal_only: true,
        },
        cancel,
    )?;

    Ok(Fields {
        exit,
        stair,
        exit_floors: exit_nodes.iter().map(|&n| graph.coord(n).floor).collect(),
        has_exits: !exit_nodes.is_empty(),
    })
}

fn analyse_one(ctx: &EscapeContext<'_>, fields: &Fields, space: &Space) -> EscapeRoute {
    let graph = ctx.graph;
    let mut route = EscapeRoute::empty(space);

    let mut cells = space.resolve_cells(ctx.buffered);
    cells.sort_unstable();
    let nodes: Vec<usize> = cells.iter().filter_map(|&c| graph.node_index(c)).collect();
    if nodes.is_empty() {
        tracing::warn!(space = %space.id, "Space has no passable cells");
        route.error = Some(format!("space {} has no passable cells", space.id));
        return route;
    }

    // Ties keep the first cell in row-major order.
    let furthest = nodes
        .iter()
        .filter_map(|&n| fields.exit.distance(n).map(|d| (n, d)))
        .fold(None, |best: Option<(usize, f64)>, (n, d)| match best {
            Some((_, bd)) if bd >= d => best,
            _ => Some((n, d)),
        });

    let mut metrics = RouteMetrics {
        buffer_radius: ctx.buffer_radius,
        grid_size: graph.grid_size(),
        ..RouteMetrics::default()
    };

    match furthest {
        Some((node, distance)) => {
            let path = fields.exit.path_from(node).unwrap_or_else(|| vec![node]);
            let start = graph.coord(node);
            let exit = graph.coord(path[path.len() - 1]);

            route.distance = Some(distance);
            route.furthest_point = Some(start);
            route.optimal_exit = Some(exit);
            if exit.floor != start.floor {
                route.distance_to_stair = fields.stair.distance(node);
            }
            route.dead_end_length = dead_end_length(graph, &path);
            route.path_lengths = Some(PathLengths::measure(graph, &path));
            route.optimal_path = graph.coords(&path);
        }
        None => {
            let floor = space.floor;
            metrics.disconnected_floors = fields.has_exits
                && !fields.exit_floors.contains(&floor)
                && !graph.floor_has_vertical_edges(floor);
            tracing::debug!(
                space = %space.id,
                disconnected = metrics.disconnected_floors,
                "No reachable exit"
            );
        }
    }

    metrics.distance = route.distance;
    metrics.distance_to_stair = route.distance_to_stair;
    metrics.dead_end_length = route.dead_end_length;
    route.violations = evaluate(&metrics, ctx.compliance);
    route
}

/// Length of the corridor leading out of a terminus.
///
/// When the path starts on a node with at most one same-floor neighbour,
/// this is the length walked until the first node with three or more
/// same-floor neighbours. A path that reaches its exit or changes floor
/// before branching has no dead end.
pub fn dead_end_length(graph: &EgressGraph, path: &[usize]) -> f64 {
    let Some(&first) = path.first() else {
        return 0.0;
    };
    if graph.horizontal_degree(first) > 1 {
        return 0.0;
    }

    let mut walked = 0.0;
    for step in path.windows(2) {
        let Some(edge) = graph.edge_between(step[0], step[1]) else {
            return 0.0;
        };
        if edge.vertical {
            return 0.0;
        }
        walked += edge.length;
        if graph.horizontal_degree(step[1]) >= 3 {
            return walked;
        }
    }
    0.0
}
