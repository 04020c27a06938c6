// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Egress-Lite Routing
//!
//! Weighted graph construction and shortest-path search over buffered
//! building grids.
//!
//! The [`EgressGraph`] has one node per passable cell and is immutable once
//! built; any grid change means building a new one. Searches come in two
//! modes: [`find_path`] for a single start, and [`DistanceField`] for the
//! cost from every node to its nearest goal in one pass.

pub mod cancel;
pub mod cost;
pub mod error;
pub mod graph;
pub mod search;
pub mod stairs;

pub use cancel::CancelToken;
pub use cost::{CostTable, GraphOptions};
pub use error::{Error, Result};
pub use graph::{EgressGraph, GraphEdge, GraphNode, GraphStats};
pub use search::{find_path, DistanceField, FieldOptions, PathLengths, PathResult, COST_EPSILON};
pub use stairs::{StairConnection, StairConnector};
