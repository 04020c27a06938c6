// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Path search over the egress graph.
//!
//! Two modes share one graph:
//!
//! - [`find_path`]: A* from one start to the cheapest of several goals.
//! - [`DistanceField`]: multi-source Dijkstra seeded from every goal at
//!   once, giving each node its cost to the nearest goal and the next hop
//!   toward it.
//!
//! Among equal-cost routes (within [`COST_EPSILON`]) both modes prefer the
//! one visiting fewer cells.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use egress_lite_grid::{CellType, GridCoord};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::graph::EgressGraph;

/// Costs closer than this are treated as equal.
pub const COST_EPSILON: f64 = 1e-9;

const NO_NODE: usize = usize::MAX;

/// How often the field computation polls its cancel token.
const CANCEL_POLL_INTERVAL: usize = 256;

/// Physical length breakdown of a path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathLengths {
    /// Sum of edge lengths in metres.
    pub total_length: f64,
    /// Same-floor length per floor, keyed `floor_{index}`.
    pub floor_lengths: BTreeMap<String, f64>,
    /// Length walked before the first stair cell or floor change.
    pub stairway_distance: f64,
}

impl PathLengths {
    /// Measures a node path along the graph's edges.
    pub fn measure(graph: &EgressGraph, path: &[usize]) -> Self {
        let mut lengths = Self::default();
        let mut reached_stair = false;

        for step in path.windows(2) {
            let (a, b) = (step[0], step[1]);
            let length = graph.edge_between(a, b).map_or(0.0, |e| e.length);
            let (from, to) = (graph.node(a), graph.node(b));

            if from.coord.floor == to.coord.floor {
                *lengths
                    .floor_lengths
                    .entry(format!("floor_{}", from.coord.floor))
                    .or_default() += length;
                if !reached_stair {
                    lengths.stairway_distance += length;
                }
            } else {
                reached_stair = true;
            }
            if from.cell == CellType::Stair {
                reached_stair = true;
            }
            lengths.total_length += length;
        }
        lengths
    }
}

/// Result of a point-to-point search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    /// Start to goal, inclusive.
    pub path: Vec<GridCoord>,
    /// Weighted cost (lengths times entered-cell multipliers).
    pub cost: f64,
    pub lengths: PathLengths,
}

/// Priority queue entry (min-heap by priority, then hop count).
#[derive(Debug, Clone, PartialEq)]
struct SearchState {
    priority: f64,
    cost: f64,
    hops: u32,
    node: usize,
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap
        other
            .priority
            .partial_cmp(&self.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.hops.cmp(&self.hops))
    }
}

/// Whether `(cost, hops)` beats the best known `(best, best_hops)`.
#[inline]
fn improves(cost: f64, hops: u32, best: f64, best_hops: u32) -> bool {
    cost < best - COST_EPSILON || (cost <= best + COST_EPSILON && hops < best_hops)
}

fn reconstruct(prev: &[usize], goal: usize) -> Vec<usize> {
    let mut path = vec![goal];
    let mut current = goal;
    while prev[current] != NO_NODE {
        current = prev[current];
        path.push(current);
    }
    path.reverse();
    path
}

/// Finds the cheapest path from `start` to any of `goals`.
///
/// The heuristic is the planar distance to the nearest goal times the
/// smallest multiplier in use. It ignores floor height, so it never
/// overestimates and stays consistent across vertical edges.
pub fn find_path(graph: &EgressGraph, start: GridCoord, goals: &[GridCoord]) -> Result<PathResult> {
    let start_node = graph
        .node_index(start)
        .ok_or(Error::NodeNotInGraph(start))?;
    if goals.is_empty() {
        return Err(Error::EmptyGoalSet);
    }
    let goal_nodes = goals
        .iter()
        .map(|&g| graph.node_index(g).ok_or(Error::NodeNotInGraph(g)))
        .collect::<Result<Vec<_>>>()?;

    let n = graph.node_count();
    let mut is_goal = vec![false; n];
    for &g in &goal_nodes {
        is_goal[g] = true;
    }
    let goal_points: Vec<_> = goal_nodes.iter().map(|&g| graph.planar_position(g)).collect();
    let scale = graph.min_multiplier();
    let heuristic = |node: usize| {
        let p = graph.planar_position(node);
        goal_points
            .iter()
            .map(|g| g.distance_to(&p))
            .fold(f64::INFINITY, f64::min)
            * scale
    };

    let mut dist = vec![f64::INFINITY; n];
    let mut hops = vec![u32::MAX; n];
    let mut prev = vec![NO_NODE; n];
    let mut closed = vec![false; n];
    let mut heap = BinaryHeap::new();

    dist[start_node] = 0.0;
    hops[start_node] = 0;
    heap.push(SearchState {
        priority: heuristic(start_node),
        cost: 0.0,
        hops: 0,
        node: start_node,
    });

    while let Some(SearchState { cost, node, .. }) = heap.pop() {
        if closed[node] || cost > dist[node] + COST_EPSILON {
            continue;
        }
        closed[node] = true;

        if is_goal[node] {
            let nodes = reconstruct(&prev, node);
            return Ok(PathResult {
                path: graph.coords(&nodes),
                cost,
                lengths: PathLengths::measure(graph, &nodes),
            });
        }

        for (neighbour, edge) in graph.incident(node) {
            if closed[neighbour] {
                continue;
            }
            let next_cost = cost + graph.step_cost(edge, neighbour);
            let next_hops = hops[node] + 1;
            if improves(next_cost, next_hops, dist[neighbour], hops[neighbour]) {
                dist[neighbour] = next_cost;
                hops[neighbour] = next_hops;
                prev[neighbour] = node;
                heap.push(SearchState {
                    priority: next_cost + heuristic(neighbour),
                    cost: next_cost,
                    hops: next_hops,
                    node: neighbour,
                });
            }
        }
    }

    Err(Error::NoPathFound { start })
}

/// Distance field options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOptions {
    /// Ignore vertical (stair) edges.
    pub horizontal_only: bool,
}

/// Cost from every node to its nearest seed.
///
/// Computed in reverse: relaxing from a settled node `v` to a neighbour `u`
/// charges the cost of the move `u → v`, i.e. entering `v`. The field is
/// either complete or not returned at all.
#[derive(Debug, Clone)]
pub struct DistanceField {
    dist: Vec<f64>,
    hops: Vec<u32>,
    next: Vec<usize>,
    source: Vec<usize>,
}

impl DistanceField {
    /// Computes the field from seed cells.
    pub fn compute(
        graph: &EgressGraph,
        seeds: &[GridCoord],
        options: &FieldOptions,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let nodes = seeds
            .iter()
            .map(|&s| graph.node_index(s).ok_or(Error::NodeNotInGraph(s)))
            .collect::<Result<Vec<_>>>()?;
        Self::from_nodes(graph, &nodes, options, cancel)
    }

    /// Computes the field from seed node indices. No seeds gives a field
    /// where nothing is reachable.
    pub fn from_nodes(
        graph: &EgressGraph,
        seeds: &[usize],
        options: &FieldOptions,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let n = graph.node_count();
        let mut field = Self {
            dist: vec![f64::INFINITY; n],
            hops: vec![u32::MAX; n],
            next: vec![NO_NODE; n],
            source: vec![NO_NODE; n],
        };
        let mut settled = vec![false; n];
        let mut heap = BinaryHeap::new();

        for &seed in seeds {
            field.dist[seed] = 0.0;
            field.hops[seed] = 0;
            field.source[seed] = seed;
            heap.push(SearchState {
                priority: 0.0,
                cost: 0.0,
                hops: 0,
                node: seed,
            });
        }

        let mut pops = 0usize;
        while let Some(SearchState { cost, node, .. }) = heap.pop() {
            if pops % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            pops += 1;

            if settled[node] || cost > field.dist[node] + COST_EPSILON {
                continue;
            }
            settled[node] = true;

            for (neighbour, edge) in graph.incident(node) {
                if settled[neighbour] || (options.horizontal_only && edge.vertical) {
                    continue;
                }
                let next_cost = cost + graph.step_cost(edge, node);
                let next_hops = field.hops[node] + 1;
                if improves(
                    next_cost,
                    next_hops,
                    field.dist[neighbour],
                    field.hops[neighbour],
                ) {
                    field.dist[neighbour] = next_cost;
                    field.hops[neighbour] = next_hops;
                    field.next[neighbour] = node;
                    field.source[neighbour] = field.source[node];
                    heap.push(SearchState {
                        priority: next_cost,
                        cost: next_cost,
                        hops: next_hops,
                        node: neighbour,
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(field)
    }

    pub fn len(&self) -> usize {
        self.dist.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dist.is_empty()
    }

    /// Cost to the nearest seed, `None` when unreachable.
    pub fn distance(&self, node: usize) -> Option<f64> {
        let d = *self.dist.get(node)?;
        d.is_finite().then_some(d)
    }

    pub fn hops(&self, node: usize) -> Option<u32> {
        self.distance(node).map(|_| self.hops[node])
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        self.distance(node).is_some()
    }

    /// The seed this node routes to.
    pub fn nearest_source(&self, node: usize) -> Option<usize> {
        self.distance(node).map(|_| self.source[node])
    }

    /// Next node toward the nearest seed (`None` at a seed or when unreachable).
    pub fn next_hop(&self, node: usize) -> Option<usize> {
        match self.next.get(node) {
            Some(&n) if n != NO_NODE => Some(n),
            _ => None,
        }
    }

    /// Optimal node path from `node` to its nearest seed, inclusive.
    pub fn path_from(&self, node: usize) -> Option<Vec<usize>> {
        self.distance(node)?;
        let mut path = vec![node];
        let mut current = node;
        while let Some(next) = self.next_hop(current) {
            path.push(next);
            current = next;
        }
        Some(path)
    }
}
