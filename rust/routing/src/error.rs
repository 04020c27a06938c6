// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for graph construction and search.

use egress_lite_grid::{CellType, GridCoord};

/// Result type alias for routing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or searching the egress graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Start and every goal lie in disjoint components.
    #[error("no path from {start:?} to any goal")]
    NoPathFound { start: GridCoord },

    /// The cell is blocked or outside the grid.
    #[error("cell {0:?} is not a graph node")]
    NodeNotInGraph(GridCoord),

    #[error("goal set is empty")]
    EmptyGoalSet,

    /// The computation was aborted through its cancel token.
    #[error("search was cancelled")]
    Cancelled,

    #[error("cost multiplier for {cell:?} must be positive and finite, got {value}")]
    InvalidCostMultiplier { cell: CellType, value: f64 },
}
