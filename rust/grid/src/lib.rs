// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Egress-Lite Grid
//!
//! Occupancy grid model for multi-floor escape-route analysis.
//!
//! A building is a stack of equally sized floor grids whose cells carry one
//! of six labels (`empty`, `wall`, `door`, `stair`, `floor`, `walla`). This
//! crate validates grid bundles and provides the grid-level stages of the
//! analysis pipeline:
//!
//! - [`buffer`]: wall inflation to model minimum clear width
//! - [`spaces`]: segmentation into connected spaces with world-space outlines
//! - [`exits`]: detection of doors opening onto the exterior
//!
//! Every stage takes a grid by reference and returns new values. Grids are
//! never edited in place; [`BuildingGrid::with_edits`] produces a new
//! snapshot.

pub mod buffer;
pub mod error;
pub mod exits;
pub mod spaces;
pub mod types;

pub use buffer::{
    buffer_building, buffer_floor, implied_clear_width, BufferConfig, BufferEdge, BufferMetric,
};
pub use error::{Error, Result};
pub use exits::{detect_exits, ExitConfig};
pub use spaces::{detect_spaces, point_in_polygon, polygon_area, Space, SpaceConfig};
pub use types::{
    BoundingBox, BuildingGrid, CellEdit, CellRef, CellType, Floor, FloorGrid, GridBundle,
    GridCoord, Point2D, DEFAULT_FLOOR_HEIGHT,
};
