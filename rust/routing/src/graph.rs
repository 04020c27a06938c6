// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Weighted multi-floor grid graph.
//!
//! Builds a graph from a buffered [`BuildingGrid`] where:
//! - **Nodes** = passable cells (anything but `wall` and `walla`) on every floor
//! - **Edges** = 4- or 8-neighbour moves on a floor, plus vertical edges for
//!   declared stair connections
//!
//! Edges are undirected and carry their physical length. The cost of a move
//! is that length times the multiplier of the cell being entered, so the
//! same edge can cost differently in each direction.

use std::f64::consts::SQRT_2;

use egress_lite_grid::{BuildingGrid, CellType, GridCoord, Point2D};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cost::GraphOptions;
use crate::error::Result;
use crate::stairs::StairConnection;

const NO_NODE: usize = usize::MAX;

/// A node of the egress graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphNode {
    pub coord: GridCoord,
    pub cell: CellType,
    /// Multiplier applied when a move enters this node.
    pub multiplier: f64,
}

/// An undirected edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    /// Physical length in metres.
    pub length: f64,
    /// Floor-to-floor edge from a stair connection.
    pub vertical: bool,
}

impl GraphEdge {
    pub fn other(&self, node: usize) -> usize {
        if self.source == node {
            self.target
        } else {
            self.source
        }
    }
}

/// Build statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub vertical_edges: usize,
    /// Stair connections dropped because an endpoint was not a stair node
    /// or the floors were not adjacent.
    pub skipped_stair_connections: usize,
}

/// Immutable egress graph over all floors.
#[derive(Debug, Clone)]
pub struct EgressGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Adjacency list: node index → (neighbour index, edge index).
    adjacency: Vec<SmallVec<[(usize, usize); 8]>>,
    /// Dense `(floor, row, col)` → node index, `NO_NODE` for blocked cells.
    lookup: Vec<usize>,
    rows: usize,
    cols: usize,
    floors: usize,
    grid_size: f64,
    options: GraphOptions,
    min_multiplier: f64,
    stats: GraphStats,
}

impl EgressGraph {
    /// Builds the graph from a buffered grid and its stair connections.
    pub fn build(
        grid: &BuildingGrid,
        stairs: &[StairConnection],
        options: &GraphOptions,
    ) -> Result<Self> {
        let costs = options.effective_costs();
        costs.validate()?;

        let (rows, cols, floors) = (grid.rows(), grid.cols(), grid.floor_count());
        let gs = grid.grid_size();
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            lookup: vec![NO_NODE; floors * rows * cols],
            rows,
            cols,
            floors,
            grid_size: gs,
            options: *options,
            min_multiplier: costs.min_multiplier(),
            stats: GraphStats::default(),
        };

        for (floor, floor_grid) in grid.grids().iter().enumerate() {
            for (row, col, cell) in floor_grid.iter() {
                if cell.is_blocked() {
                    continue;
                }
                let coord = GridCoord::new(row, col, floor);
                let idx = graph.nodes.len();
                let slot = graph.slot(coord);
                graph.lookup[slot] = idx;
                graph.nodes.push(GraphNode {
                    coord,
                    cell,
                    multiplier: costs.multiplier(cell),
                });
                graph.adjacency.push(SmallVec::new());
            }
        }

        // Forward half of the neighbourhood so every pair is visited once.
        let mut moves: SmallVec<[(i64, i64); 4]> = SmallVec::from_slice(&[(0, 1), (1, 0)]);
        if options.allow_diagonal {
            moves.extend_from_slice(&[(1, 1), (1, -1)]);
        }

        for node in 0..graph.nodes.len() {
            let coord = graph.nodes[node].coord;
            let (r, c) = (coord.row as i64, coord.col as i64);
            for &(dr, dc) in &moves {
                let Some(target) = graph.node_at(r + dr, c + dc, coord.floor) else {
                    continue;
                };
                let length = if dr != 0 && dc != 0 {
                    // No corner cutting: both orthogonal cells must be open.
                    if graph.node_at(r + dr, c, coord.floor).is_none()
                        || graph.node_at(r, c + dc, coord.floor).is_none()
                    {
                        continue;
                    }
                    SQRT_2 * gs
                } else {
                    gs
                };
                graph.add_edge(node, target, length, false);
            }
        }

        let mut linked = FxHashSet::default();
        for connection in stairs {
            let (a, b) = (connection.start, connection.end);
            let endpoints = graph.node_index(a).zip(graph.node_index(b));
            let valid = endpoints.filter(|&(na, nb)| {
                graph.nodes[na].cell == CellType::Stair
                    && graph.nodes[nb].cell == CellType::Stair
                    && a.floor.abs_diff(b.floor) == 1
            });
            let Some((na, nb)) = valid else {
                graph.stats.skipped_stair_connections += 1;
                continue;
            };
            if !linked.insert((na.min(nb), na.max(nb))) {
                continue;
            }
            let dr = (a.row as f64 - b.row as f64) * gs;
            let dc = (a.col as f64 - b.col as f64) * gs;
            let climb = grid.height_between(a.floor, b.floor);
            let length = (dr * dr + dc * dc + climb * climb).sqrt();
            graph.add_edge(na, nb, length, true);
        }

        graph.stats.nodes = graph.nodes.len();
        graph.stats.edges = graph.edges.len();
        graph.stats.vertical_edges = graph.edges.iter().filter(|e| e.vertical).count();
        Ok(graph)
    }

    fn add_edge(&mut self, source: usize, target: usize, length: f64, vertical: bool) {
        let idx = self.edges.len();
        self.edges.push(GraphEdge {
            source,
            target,
            length,
            vertical,
        });
        self.adjacency[source].push((target, idx));
        self.adjacency[target].push((source, idx));
    }

    #[inline]
    fn slot(&self, coord: GridCoord) -> usize {
        (coord.floor * self.rows + coord.row) * self.cols + coord.col
    }

    fn node_at(&self, row: i64, col: i64, floor: usize) -> Option<usize> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return None;
        }
        self.node_index(GridCoord::new(row as usize, col as usize, floor))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Node index of a cell, `None` when blocked or off-grid.
    pub fn node_index(&self, coord: GridCoord) -> Option<usize> {
        if coord.floor >= self.floors || coord.row >= self.rows || coord.col >= self.cols {
            return None;
        }
        let idx = self.lookup[self.slot(coord)];
        (idx != NO_NODE).then_some(idx)
    }

    pub fn node(&self, node: usize) -> &GraphNode {
        &self.nodes[node]
    }

    pub fn coord(&self, node: usize) -> GridCoord {
        self.nodes[node].coord
    }

    pub fn coords(&self, nodes: &[usize]) -> Vec<GridCoord> {
        nodes.iter().map(|&n| self.nodes[n].coord).collect()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn floor_count(&self) -> usize {
        self.floors
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    /// Smallest cost multiplier in use, for admissible heuristics.
    pub fn min_multiplier(&self) -> f64 {
        self.min_multiplier
    }

    /// Incident edges as `(neighbour, edge)` pairs.
    pub fn incident(&self, node: usize) -> impl Iterator<Item = (usize, &GraphEdge)> + '_ {
        self.adjacency[node]
            .iter()
            .map(move |&(neighbour, edge)| (neighbour, &self.edges[edge]))
    }

    /// Cost of moving along `edge` into `to`.
    #[inline]
    pub fn step_cost(&self, edge: &GraphEdge, to: usize) -> f64 {
        edge.length * self.nodes[to].multiplier
    }

    /// Edge joining two nodes, if any.
    pub fn edge_between(&self, a: usize, b: usize) -> Option<&GraphEdge> {
        self.adjacency[a]
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, e)| &self.edges[e])
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    /// Number of same-floor neighbours.
    pub fn horizontal_degree(&self, node: usize) -> usize {
        self.adjacency[node]
            .iter()
            .filter(|&&(_, e)| !self.edges[e].vertical)
            .count()
    }

    /// Planar world offset of a node from the grid origin, in metres.
    pub fn planar_position(&self, node: usize) -> Point2D {
        let c = self.nodes[node].coord;
        Point2D::new(c.col as f64 * self.grid_size, c.row as f64 * self.grid_size)
    }

    /// Stair cells with at least one vertical edge.
    pub fn connected_stairs(&self) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&n| self.incident(n).any(|(_, e)| e.vertical))
            .collect()
    }

    /// Whether any vertical edge leaves `floor`.
    pub fn floor_has_vertical_edges(&self, floor: usize) -> bool {
        self.edges.iter().any(|e| {
            e.vertical
                && (self.nodes[e.source].coord.floor == floor
                    || self.nodes[e.target].coord.floor == floor)
        })
    }

    /// Vertical edges as stair connections, lower floor first.
    pub fn stair_connections(&self) -> Vec<StairConnection> {
        let mut out: Vec<StairConnection> = self
            .edges
            .iter()
            .filter(|e| e.vertical)
            .map(|e| {
                let (a, b) = (self.nodes[e.source].coord, self.nodes[e.target].coord);
                if a.floor <= b.floor {
                    StairConnection::new(a, b)
                } else {
                    StairConnection::new(b, a)
                }
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Component id of every node. Ids are dense and assigned in node order,
    /// so the component holding node 0 is always 0.
    pub fn component_labels(&self) -> Vec<usize> {
        let mut labels = vec![NO_NODE; self.node_count()];
        let mut stack = Vec::new();
        let mut next = 0;
        for seed in 0..self.node_count() {
            if labels[seed] != NO_NODE {
                continue;
            }
            labels[seed] = next;
            stack.push(seed);
            while let Some(node) = stack.pop() {
                for (neighbour, _) in self.incident(node) {
                    if labels[neighbour] == NO_NODE {
                        labels[neighbour] = next;
                        stack.push(neighbour);
                    }
                }
            }
            next += 1;
        }
        labels
    }

    /// Mutually reachable cells, grouped by component id. Stair edges join
    /// cells of different floors into one component.
    pub fn connected_components(&self) -> Vec<Vec<GridCoord>> {
        let labels = self.component_labels();
        let count = labels.iter().max().map_or(0, |&last| last + 1);
        let mut components = vec![Vec::new(); count];
        for (node, &label) in labels.iter().enumerate() {
            components[label].push(self.nodes[node].coord);
        }
        components
    }
}
