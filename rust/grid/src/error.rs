// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for grid construction and editing.

use thiserror::Error;

/// Result type alias for grid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or editing occupancy grids.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The bundle has no floors, or a floor has no cells.
    #[error("grid has no cells")]
    EmptyGrid,

    /// Ragged rows, or floors with differing dimensions.
    #[error("invalid grid shape: {0}")]
    InvalidGridShape(String),

    /// The physical cell size is zero, negative or not finite.
    #[error("grid size must be a positive finite number, got {0}")]
    InvalidGridSize(f64),

    /// Floor descriptions do not line up with the floor grids.
    #[error("{grids} floor grids but {floors} floor descriptions")]
    FloorCountMismatch { grids: usize, floors: usize },

    /// A cell reference points outside the grid.
    #[error("cell ({row}, {col}) on floor {floor} is outside the grid")]
    CellOutOfBounds { row: usize, col: usize, floor: usize },
}
