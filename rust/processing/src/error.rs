// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the analysis pipeline.

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the analysis pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid grid input or edit.
    #[error(transparent)]
    Grid(#[from] egress_lite_grid::Error),

    /// Graph construction or search failure.
    #[error(transparent)]
    Routing(#[from] egress_lite_routing::Error),

    /// No door on any floor opens onto the exterior.
    #[error("no exits detected")]
    NoExitsDetected,

    /// A derived result was requested for a grid state it was not built from.
    #[error("graph {found} does not match the current grid state {expected}")]
    StaleGraphRequested { expected: String, found: String },

    /// A graph-dependent operation ran before any graph was built.
    #[error("no graph has been built yet")]
    GraphNotBuilt,

    /// Request fields are individually valid but do not fit together.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Engine configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

