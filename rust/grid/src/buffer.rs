// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall buffering (morphological dilation of wall cells)
//!
//! Every non-wall cell within `radius` of a wall becomes `walla`. Only true
//! `wall` cells seed the dilation, so buffering an already buffered grid
//! yields the same grid.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{BuildingGrid, CellType, FloorGrid};

/// Distance metric for the buffer neighbourhood.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferMetric {
    /// Square neighbourhood.
    #[default]
    Chebyshev,
    /// Disc neighbourhood (`dr² + dc² <= r²`).
    Euclidean,
}

/// How the outside of the grid is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferEdge {
    /// Off-grid is open space and never triggers buffering.
    #[default]
    Open,
    /// Off-grid behaves like wall.
    Wall,
}

/// Wall buffer parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Buffer radius in cells. Zero is the identity.
    pub radius: u32,
    pub metric: BufferMetric,
    pub edge: BufferEdge,
}

impl BufferConfig {
    pub fn with_radius(radius: u32) -> Self {
        Self {
            radius,
            ..Self::default()
        }
    }

    /// Clear width guaranteed by this buffer, in metres.
    pub fn implied_clear_width(&self, grid_size: f64) -> f64 {
        implied_clear_width(self.radius, grid_size)
    }

    fn offsets(&self) -> Vec<(i64, i64)> {
        let r = self.radius as i64;
        let mut offsets = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dr in -r..=r {
            for dc in -r..=r {
                if (dr, dc) == (0, 0) {
                    continue;
                }
                let inside = match self.metric {
                    BufferMetric::Chebyshev => true,
                    BufferMetric::Euclidean => dr * dr + dc * dc <= r * r,
                };
                if inside {
                    offsets.push((dr, dc));
                }
            }
        }
        offsets
    }

    fn near_edge(&self, grid: &FloorGrid, row: usize, col: usize) -> bool {
        // The nearest off-grid cell is always straight along an axis, so both
        // metrics agree on this distance.
        let to_edge = (row + 1)
            .min(grid.rows() - row)
            .min(col + 1)
            .min(grid.cols() - col);
        to_edge as u32 <= self.radius
    }
}

/// `2 × radius × grid_size`.
pub fn implied_clear_width(radius: u32, grid_size: f64) -> f64 {
    2.0 * radius as f64 * grid_size
}

/// Buffers a single floor.
pub fn buffer_floor(grid: &FloorGrid, config: &BufferConfig) -> FloorGrid {
    if config.radius == 0 {
        return grid.clone();
    }

    let mut out = grid.clone();
    let offsets = config.offsets();

    for (row, col, cell) in grid.iter() {
        if cell != CellType::Wall {
            continue;
        }
        for &(dr, dc) in &offsets {
            let (r, c) = (row as i64 + dr, col as i64 + dc);
            if let Some(target) = grid.get_signed(r, c) {
                if target != CellType::Wall {
                    out.set(r as usize, c as usize, CellType::Walla);
                }
            }
        }
    }

    if config.edge == BufferEdge::Wall {
        for (row, col, cell) in grid.iter() {
            if cell != CellType::Wall && config.near_edge(grid, row, col) {
                out.set(row, col, CellType::Walla);
            }
        }
    }

    out
}

/// Buffers every floor independently, keeping the building metadata.
pub fn buffer_building(grid: &BuildingGrid, config: &BufferConfig) -> Result<BuildingGrid> {
    let floors = grid
        .grids()
        .iter()
        .map(|floor| buffer_floor(floor, config))
        .collect();
    grid.with_grids(floors)
}
