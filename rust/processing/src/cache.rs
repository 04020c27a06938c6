// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content-addressed graph cache.
//!
//! Graphs are keyed by a SHA-256 over everything they are built from, so a
//! request can only ever be answered from a graph that matches its grid.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use egress_lite_grid::BuildingGrid;
use egress_lite_routing::{EgressGraph, GraphOptions, StairConnection, StairConnector};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Default number of graphs kept in memory.
pub const DEFAULT_CAPACITY: usize = 8;

/// A built graph together with the grids it came from.
#[derive(Debug)]
pub struct CachedGraph {
    pub key: String,
    pub original: Arc<BuildingGrid>,
    pub buffered: Arc<BuildingGrid>,
    pub graph: Arc<EgressGraph>,
    /// Wall buffer radius the buffered grid was produced with.
    pub buffer_radius: u32,
}

fn hash_grid(hasher: &mut Sha256, grid: &BuildingGrid) {
    for dim in [grid.floor_count(), grid.rows(), grid.cols()] {
        hasher.update((dim as u64).to_le_bytes());
    }
    hasher.update(grid.grid_size().to_le_bytes());
    let bbox = grid.bbox();
    for v in [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y] {
        hasher.update(v.to_le_bytes());
    }
    for floor in grid.floors() {
        hasher.update(floor.elevation.to_le_bytes());
        hasher.update(floor.height.to_le_bytes());
    }
    for floor_grid in grid.grids() {
        let labels: Vec<u8> = floor_grid.cells().iter().map(|&c| c as u8).collect();
        hasher.update(&labels);
    }
}

/// Generate a graph key from both grids, the buffer radius, the options and
/// the stair links.
///
/// The radius and the original grid do not change the graph itself but are
/// carried in the entry and feed the width checks, so two requests differing
/// only there must not share an entry.
pub fn graph_key(
    original: &BuildingGrid,
    buffered: &BuildingGrid,
    buffer_radius: u32,
    options: &GraphOptions,
    stairs: &[StairConnection],
) -> String {
    let mut hasher = Sha256::new();

    hash_grid(&mut hasher, original);
    hash_grid(&mut hasher, buffered);
    hasher.update(buffer_radius.to_le_bytes());

    hasher.update([options.allow_diagonal as u8, options.minimize_cost as u8]);
    let costs = options.costs;
    for v in [costs.empty, costs.floor, costs.door, costs.stair] {
        hasher.update(v.to_le_bytes());
    }

    hasher.update((stairs.len() as u64).to_le_bytes());
    for link in stairs {
        for c in [link.start, link.end] {
            for v in [c.row, c.col, c.floor] {
                hasher.update((v as u64).to_le_bytes());
            }
        }
    }

    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: FxHashMap<String, Arc<CachedGraph>>,
    /// Least recently used first.
    order: VecDeque<String>,
    latest: Option<String>,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

/// In-memory LRU of built graphs.
#[derive(Debug)]
pub struct GraphCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl GraphCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Returns the graph for these grids, building it on a miss.
    ///
    /// Without explicit stair connections the default connector derives
    /// them from the buffered grid. The returned flag is true on a hit.
    pub fn get_or_build(
        &self,
        original: BuildingGrid,
        buffered: BuildingGrid,
        options: &GraphOptions,
        stairs: Option<Vec<StairConnection>>,
        connector: &StairConnector,
        buffer_radius: u32,
    ) -> Result<(Arc<CachedGraph>, bool)> {
        let stairs = stairs.unwrap_or_else(|| connector.detect(&buffered));
        let key = graph_key(&original, &buffered, buffer_radius, options, &stairs);

        {
            let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = inner.entries.get(&key).cloned() {
                inner.touch(&key);
                inner.latest = Some(key.clone());
                tracing::info!(graph_key = %key, "Graph cache HIT");
                return Ok((hit, true));
            }
        }

        tracing::info!(graph_key = %key, "Graph cache MISS - building");
        let started = Instant::now();
        let graph = EgressGraph::build(&buffered, &stairs, options)?;
        let stats = graph.stats();
        tracing::info!(
            graph_key = %key,
            nodes = stats.nodes,
            edges = stats.edges,
            vertical_edges = stats.vertical_edges,
            skipped_stair_connections = stats.skipped_stair_connections,
            build_ms = started.elapsed().as_millis() as u64,
            "Graph built"
        );

        let entry = Arc::new(CachedGraph {
            key: key.clone(),
            original: Arc::new(original),
            buffered: Arc::new(buffered),
            graph: Arc::new(graph),
            buffer_radius,
        });

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.entries.contains_key(&key) {
            inner.order.push_back(key.clone());
        }
        inner.entries.insert(key.clone(), Arc::clone(&entry));
        inner.touch(&key);
        inner.latest = Some(key);
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                tracing::debug!(graph_key = %evicted, "Evicting graph");
                inner.entries.remove(&evicted);
            }
        }
        Ok((entry, false))
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedGraph>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(key).cloned()
    }

    /// The graph of the most recent create request.
    pub fn latest(&self) -> Result<Arc<CachedGraph>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .latest
            .as_ref()
            .and_then(|k| inner.entries.get(k).cloned())
            .ok_or(Error::GraphNotBuilt)
    }

    /// Looks up the graph a request refers to.
    ///
    /// With a key, only that exact graph is acceptable; a key that is no
    /// longer current is rejected rather than answered from another graph.
    pub fn resolve(&self, key: Option<&str>) -> Result<Arc<CachedGraph>> {
        let latest = self.latest();
        match key {
            None => latest,
            Some(key) => match latest {
                Ok(current) if current.key == key => Ok(current),
                Ok(current) => {
                    tracing::warn!(requested = %key, current = %current.key, "Stale graph requested");
                    Err(Error::StaleGraphRequested {
                        expected: current.key.clone(),
                        found: key.to_string(),
                    })
                }
                Err(_) => Err(Error::StaleGraphRequested {
                    expected: String::new(),
                    found: key.to_string(),
                }),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
