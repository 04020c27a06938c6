// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Egress-Lite Processing
//!
//! The escape-route analysis pipeline:
//!
//! ```text
//! grid -> buffer -> spaces + exits -> graph -> distance fields -> routes -> compliance
//! ```
//!
//! Two front doors share the same stages:
//!
//! - [`AnalysisSession`] keeps a source grid in process, tracks changes with
//!   a revision counter and rebuilds derived data on demand.
//! - [`requests`] serves the JSON request structures against a
//!   content-keyed [`GraphCache`], for use behind a server.
//!
//! ## Example
//!
//! ```rust,ignore
//! use egress_lite_grid::{BuildingGrid, FloorGrid};
//! use egress_lite_processing::{AnalysisSession, EngineConfig};
//! use egress_lite_routing::CancelToken;
//!
//! let floor = FloorGrid::from_ascii("#D#\n#_#\n###")?;
//! let grid = BuildingGrid::single_floor(floor, 0.5)?;
//! let mut session = AnalysisSession::new(grid, EngineConfig::default());
//! for route in session.escape_routes(&CancelToken::new())? {
//!     println!("{}: {:?}", route.space_name, route.distance);
//! }
//! ```

pub mod cache;
pub mod compliance;
pub mod config;
pub mod error;
pub mod escape;
pub mod requests;
pub mod session;

pub use cache::{graph_key, CachedGraph, GraphCache};
pub use compliance::{
    evaluate, ComplianceConfig, ComplianceProfile, RouteMetrics, Rule, Violation, Violations,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use escape::{analyse_space, analyse_spaces, dead_end_length, EscapeContext, EscapeRoute};
pub use session::{AnalysisSession, Snapshot};
