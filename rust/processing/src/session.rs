// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process analysis session.
//!
//! A session owns the source grid and the engine configuration. Every
//! change that affects derived data bumps a revision counter; derived data
//! (buffered grid, spaces, exits, graph) lives in an immutable [`Snapshot`]
//! tagged with the revision it was built from. The session is dirty while
//! the two differ, and [`AnalysisSession::refresh`] rebuilds the whole
//! pipeline in one go.

use std::sync::Arc;
use std::time::Instant;

use egress_lite_grid::{
    buffer_building, detect_exits, detect_spaces, BufferConfig, BuildingGrid, CellEdit,
    ExitConfig, GridCoord, Space, SpaceConfig,
};
use egress_lite_routing::{
    find_path, CancelToken, EgressGraph, GraphOptions, PathResult, StairConnection,
};

use crate::cache::graph_key;
use crate::compliance::ComplianceConfig;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::escape::{analyse_space, analyse_spaces, EscapeContext, EscapeRoute};

/// Everything derived from one revision of the source grid.
#[derive(Debug)]
pub struct Snapshot {
    pub revision: u64,
    pub original: Arc<BuildingGrid>,
    pub buffered: Arc<BuildingGrid>,
    pub spaces: Vec<Space>,
    pub exits: Vec<GridCoord>,
    pub stair_connections: Vec<StairConnection>,
    pub graph: Arc<EgressGraph>,
    pub graph_key: String,
    pub buffer_radius: u32,
}

/// Source grid plus lazily rebuilt derived data.
#[derive(Debug)]
pub struct AnalysisSession {
    config: EngineConfig,
    grid: Arc<BuildingGrid>,
    stair_override: Option<Vec<StairConnection>>,
    revision: u64,
    snapshot: Option<Arc<Snapshot>>,
}

impl AnalysisSession {
    pub fn new(grid: BuildingGrid, config: EngineConfig) -> Self {
        Self {
            config,
            grid: Arc::new(grid),
            stair_override: None,
            revision: 1,
            snapshot: None,
        }
    }

    pub fn grid(&self) -> &Arc<BuildingGrid> {
        &self.grid
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True when derived data is missing or older than the source.
    pub fn is_dirty(&self) -> bool {
        self.snapshot
            .as_ref()
            .map_or(true, |s| s.revision != self.revision)
    }

    fn mark_dirty(&mut self, reason: &'static str) {
        self.revision += 1;
        tracing::debug!(revision = self.revision, reason, "Session marked dirty");
    }

    pub fn set_grid(&mut self, grid: BuildingGrid) {
        self.grid = Arc::new(grid);
        self.mark_dirty("grid replaced");
    }

    /// Applies cell edits as a new source snapshot. Nothing changes on error.
    pub fn apply_edits(&mut self, edits: &[CellEdit]) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        let next = self.grid.with_edits(edits)?;
        self.grid = Arc::new(next);
        self.mark_dirty("cells edited");
        Ok(())
    }

    pub fn set_buffer(&mut self, buffer: BufferConfig) {
        if self.config.buffer != buffer {
            self.config.buffer = buffer;
            self.mark_dirty("buffer changed");
        }
    }

    pub fn set_graph_options(&mut self, options: GraphOptions) {
        if self.config.graph != options {
            self.config.graph = options;
            self.mark_dirty("graph options changed");
        }
    }

    /// Replaces the stair connections; `None` goes back to detecting them.
    pub fn set_stair_connections(&mut self, connections: Option<Vec<StairConnection>>) {
        self.stair_override = connections;
        self.mark_dirty("stair connections changed");
    }

    pub fn set_exit_config(&mut self, exits: ExitConfig) {
        if self.config.exits != exits {
            self.config.exits = exits;
            self.mark_dirty("exit rules changed");
        }
    }

    pub fn set_space_config(&mut self, spaces: SpaceConfig) {
        if self.config.spaces != spaces {
            self.config.spaces = spaces;
            self.mark_dirty("space rules changed");
        }
    }

    /// Thresholds are applied at query time, so this never dirties the session.
    pub fn set_compliance(&mut self, compliance: ComplianceConfig) {
        self.config.compliance = compliance;
    }

    /// Rebuilds derived data if the session is dirty.
    pub fn refresh(&mut self) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.snapshot.as_ref().filter(|s| s.revision == self.revision) {
            return Ok(Arc::clone(snapshot));
        }

        let started = Instant::now();
        let buffered = buffer_building(&self.grid, &self.config.buffer)?;
        let spaces = detect_spaces(&buffered, &self.config.spaces);
        let exits = detect_exits(&buffered, &self.config.exits);
        if exits.is_empty() {
            tracing::warn!(revision = self.revision, error = %Error::NoExitsDetected, "Rebuilt grid has no exits");
        }
        let stair_connections = match &self.stair_override {
            Some(connections) => connections.clone(),
            None => self.config.stairs.detect(&buffered),
        };
        let graph = EgressGraph::build(&buffered, &stair_connections, &self.config.graph)?;
        let key = graph_key(
            &self.grid,
            &buffered,
            self.config.buffer.radius,
            &self.config.graph,
            &stair_connections,
        );

        let stats = graph.stats();
        tracing::info!(
            revision = self.revision,
            graph_key = %key,
            spaces = spaces.len(),
            exits = exits.len(),
            nodes = stats.nodes,
            edges = stats.edges,
            vertical_edges = stats.vertical_edges,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Session rebuilt"
        );

        let snapshot = Arc::new(Snapshot {
            revision: self.revision,
            original: Arc::clone(&self.grid),
            buffered: Arc::new(buffered),
            spaces,
            exits,
            stair_connections,
            graph: Arc::new(graph),
            graph_key: key,
            buffer_radius: self.config.buffer.radius,
        });
        self.snapshot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The current snapshot without rebuilding.
    ///
    /// Fails with [`Error::StaleGraphRequested`] while the session is dirty
    /// instead of handing out data for an older grid.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let snapshot = self.snapshot.as_ref().ok_or(Error::GraphNotBuilt)?;
        self.ensure_current(snapshot)?;
        Ok(Arc::clone(snapshot))
    }

    /// Checks that a previously obtained snapshot still matches the source.
    pub fn ensure_current(&self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.revision == self.revision {
            return Ok(());
        }
        tracing::warn!(
            snapshot = snapshot.revision,
            current = self.revision,
            "Stale snapshot requested"
        );
        Err(Error::StaleGraphRequested {
            expected: format!("revision {}", self.revision),
            found: format!("revision {}", snapshot.revision),
        })
    }

    pub fn find_path(&mut self, start: GridCoord, goals: &[GridCoord]) -> Result<PathResult> {
        let snapshot = self.refresh()?;
        Ok(find_path(&snapshot.graph, start, goals)?)
    }

    /// Path from `start` to the nearest detected exit.
    pub fn path_to_exit(&mut self, start: GridCoord) -> Result<PathResult> {
        let snapshot = self.refresh()?;
        if snapshot.exits.is_empty() {
            return Err(Error::NoExitsDetected);
        }
        Ok(find_path(&snapshot.graph, start, &snapshot.exits)?)
    }

    /// Escape routes of every detected space against the detected exits.
    pub fn escape_routes(&mut self, cancel: &CancelToken) -> Result<Vec<EscapeRoute>> {
        let snapshot = self.refresh()?;
        let ctx = self.context(&snapshot);
        analyse_spaces(&ctx, &snapshot.spaces, &snapshot.exits, cancel)
    }

    /// Escape route of one space, detected or supplied by a client.
    pub fn escape_route(&mut self, space: &Space, cancel: &CancelToken) -> Result<EscapeRoute> {
        let snapshot = self.refresh()?;
        let ctx = self.context(&snapshot);
        analyse_space(&ctx, space, &snapshot.exits, cancel)
    }

    fn context<'a>(&'a self, snapshot: &'a Snapshot) -> EscapeContext<'a> {
        EscapeContext {
            buffered: &snapshot.buffered,
            graph: &snapshot.graph,
            buffer_radius: snapshot.buffer_radius,
            compliance: &self.config.compliance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egress_lite_grid::{CellType, FloorGrid};

    fn session() -> AnalysisSession {
        let grid = BuildingGrid::single_floor(
            FloorGrid::from_ascii(
                "#D###
                 #___#
                 #___#
                 #####",
            )
            .unwrap(),
            0.5,
        )
        .unwrap();
        AnalysisSession::new(grid, EngineConfig::default())
    }

    #[test]
    fn new_session_is_dirty_until_refreshed() {
        let mut s = session();
        assert!(s.is_dirty());
        assert!(matches!(s.snapshot(), Err(Error::GraphNotBuilt)));

        let snap = s.refresh().unwrap();
        assert!(!s.is_dirty());
        assert_eq!(snap.exits, vec![GridCoord::new(0, 1, 0)]);
        assert_eq!(snap.spaces.len(), 1);
        assert!(Arc::ptr_eq(&snap, &s.snapshot().unwrap()));
        // Clean refresh reuses the snapshot.
        assert!(Arc::ptr_eq(&snap, &s.refresh().unwrap()));
    }

    #[test]
    fn edits_make_old_snapshots_stale() {
        let mut s = session();
        let before = s.refresh().unwrap();
        s.apply_edits(&[CellEdit {
            floor: 0,
            row: 2,
            col: 2,
            cell_type: CellType::Wall,
        }])
        .unwrap();

        assert!(s.is_dirty());
        assert!(matches!(s.snapshot(), Err(Error::StaleGraphRequested { .. })));
        assert!(matches!(
            s.ensure_current(&before),
            Err(Error::StaleGraphRequested { .. })
        ));

        let after = s.refresh().unwrap();
        assert_ne!(before.graph_key, after.graph_key);
        assert_eq!(after.graph.node_count(), before.graph.node_count() - 1);
        // The old snapshot is untouched.
        assert_eq!(before.original.cell(GridCoord::new(2, 2, 0)), Some(CellType::Floor));
    }

    #[test]
    fn bad_edit_leaves_the_session_clean() {
        let mut s = session();
        s.refresh().unwrap();
        let err = s
            .apply_edits(&[CellEdit {
                floor: 3,
                row: 0,
                col: 0,
                cell_type: CellType::Wall,
            }])
            .unwrap_err();
        assert!(matches!(err, Error::Grid(_)));
        assert!(!s.is_dirty());
    }

    #[test]
    fn unchanged_settings_do_not_dirty() {
        let mut s = session();
        s.refresh().unwrap();
        s.set_buffer(BufferConfig::default());
        s.set_graph_options(GraphOptions::default());
        s.set_compliance(ComplianceConfig::default());
        assert!(!s.is_dirty());

        s.set_buffer(BufferConfig::with_radius(1));
        assert!(s.is_dirty());
    }

    #[test]
    fn escape_routes_follow_the_current_grid() {
        let mut s = session();
        s.set_graph_options(GraphOptions::distance_only());
        let routes = s.escape_routes(&CancelToken::new()).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].distance, Some(2.0));

        // Seal the door; the next query sees no exit.
        s.apply_edits(&[CellEdit {
            floor: 0,
            row: 0,
            col: 1,
            cell_type: CellType::Wall,
        }])
        .unwrap();
        let routes = s.escape_routes(&CancelToken::new()).unwrap();
        assert!(routes[0].distance.is_none());
        assert!(matches!(
            s.path_to_exit(GridCoord::new(1, 1, 0)),
            Err(Error::NoExitsDetected)
        ));
    }
}
