// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stair connections between adjacent floors.
//!
//! Vertical graph edges only exist where a [`StairConnection`] says two stair
//! cells are physically linked. Connections normally come from the caller;
//! [`StairConnector`] derives a default set from the grid alone.

use egress_lite_grid::{BuildingGrid, CellType, GridCoord};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A declared link between stair cells on two adjacent floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StairConnection {
    pub start: GridCoord,
    pub end: GridCoord,
}

impl StairConnection {
    pub fn new(start: GridCoord, end: GridCoord) -> Self {
        Self { start, end }
    }

    /// Whether either endpoint lies on `floor`.
    pub fn touches_floor(&self, floor: usize) -> bool {
        self.start.floor == floor || self.end.floor == floor
    }
}

/// Default stair topology detector.
///
/// Stair cells are grouped by 3D flood fill (same-floor 4-neighbours and the
/// same cell on the floor above or below). Within a group, a lower and an
/// upper stair cell are linked when their planar offset equals the run of a
/// flight at `stair_angle_deg` (probed in `directions` headings) and the
/// straight line between them stays on stair cells. A floor pair where no
/// cell pair qualifies falls back to linking every lower stair cell with
/// every upper one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StairConnector {
    pub stair_angle_deg: f64,
    pub directions: u32,
}

impl Default for StairConnector {
    fn default() -> Self {
        Self {
            stair_angle_deg: 55.0,
            directions: 16,
        }
    }
}

impl StairConnector {
    /// Detects connections on a (buffered) building grid, sorted.
    pub fn detect(&self, grid: &BuildingGrid) -> Vec<StairConnection> {
        let mut connections = Vec::new();

        for group in stair_groups(grid) {
            let mut floors: Vec<usize> = group.iter().map(|c| c.floor).collect();
            floors.sort_unstable();
            floors.dedup();

            for pair in floors.windows(2) {
                let (lower, upper) = (pair[0], pair[1]);
                let lower_cells: Vec<GridCoord> =
                    group.iter().copied().filter(|c| c.floor == lower).collect();
                let upper_cells: Vec<GridCoord> =
                    group.iter().copied().filter(|c| c.floor == upper).collect();

                let offsets = self.run_offsets(grid, lower, upper);
                let before = connections.len();
                for &a in &lower_cells {
                    for &b in &upper_cells {
                        let offset = (b.row as i64 - a.row as i64, b.col as i64 - a.col as i64);
                        if offsets.contains(&offset) && line_on_stairs(grid, a, b) {
                            connections.push(StairConnection::new(a, b));
                        }
                    }
                }

                if connections.len() == before {
                    for &a in &lower_cells {
                        for &b in &upper_cells {
                            connections.push(StairConnection::new(a, b));
                        }
                    }
                }
            }
        }

        connections.sort_unstable();
        connections.dedup();
        connections
    }

    /// Planar cell offsets matching one flight between two floors.
    fn run_offsets(&self, grid: &BuildingGrid, lower: usize, upper: usize) -> FxHashSet<(i64, i64)> {
        let height = grid.height_between(lower, upper);
        let run = height / self.stair_angle_deg.to_radians().tan();
        let cells = (run / grid.grid_size()).round();
        let steps = self.directions.max(1);
        (0..steps)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / steps as f64;
                (
                    (cells * angle.cos()).round() as i64,
                    (cells * angle.sin()).round() as i64,
                )
            })
            .collect()
    }
}

/// Groups stair cells by 3D 4-connectivity.
fn stair_groups(grid: &BuildingGrid) -> Vec<Vec<GridCoord>> {
    let floors = grid.floor_count();
    let (rows, cols) = (grid.rows(), grid.cols());
    let mut seen = vec![false; floors * rows * cols];
    let idx = |c: GridCoord| (c.floor * rows + c.row) * cols + c.col;
    let is_stair = |c: GridCoord| grid.cell(c) == Some(CellType::Stair);

    let mut groups = Vec::new();
    for (floor, floor_grid) in grid.grids().iter().enumerate() {
        for (row, col, cell) in floor_grid.iter() {
            let seed = GridCoord::new(row, col, floor);
            if cell != CellType::Stair || seen[idx(seed)] {
                continue;
            }
            seen[idx(seed)] = true;
            let mut stack = vec![seed];
            let mut group = Vec::new();

            while let Some(c) = stack.pop() {
                group.push(c);
                let mut candidates = Vec::with_capacity(6);
                if c.row > 0 {
                    candidates.push(GridCoord::new(c.row - 1, c.col, c.floor));
                }
                if c.row + 1 < rows {
                    candidates.push(GridCoord::new(c.row + 1, c.col, c.floor));
                }
                if c.col > 0 {
                    candidates.push(GridCoord::new(c.row, c.col - 1, c.floor));
                }
                if c.col + 1 < cols {
                    candidates.push(GridCoord::new(c.row, c.col + 1, c.floor));
                }
                if c.floor > 0 {
                    candidates.push(GridCoord::new(c.row, c.col, c.floor - 1));
                }
                if c.floor + 1 < floors {
                    candidates.push(GridCoord::new(c.row, c.col, c.floor + 1));
                }
                for next in candidates {
                    if is_stair(next) && !seen[idx(next)] {
                        seen[idx(next)] = true;
                        stack.push(next);
                    }
                }
            }
            groups.push(group);
        }
    }
    groups
}

/// Every intermediate cell on the straight line from `a` to `b` must be a
/// stair on at least one of the two floors.
fn line_on_stairs(grid: &BuildingGrid, a: GridCoord, b: GridCoord) -> bool {
    let dr = b.row as f64 - a.row as f64;
    let dc = b.col as f64 - a.col as f64;
    let steps = dr.abs().max(dc.abs()) as usize;
    (1..steps).all(|i| {
        let t = i as f64 / steps as f64;
        let row = (a.row as f64 + t * dr).trunc() as usize;
        let col = (a.col as f64 + t * dc).trunc() as usize;
        grid.cell(GridCoord::new(row, col, a.floor)) == Some(CellType::Stair)
            || grid.cell(GridCoord::new(row, col, b.floor)) == Some(CellType::Stair)
    })
}
