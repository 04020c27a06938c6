// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration.

use std::path::Path;

use egress_lite_grid::{BufferConfig, ExitConfig, SpaceConfig};
use egress_lite_routing::{GraphOptions, StairConnector};
use serde::{Deserialize, Serialize};

use crate::compliance::ComplianceConfig;
use crate::error::{Error, Result};

/// All tunables of the analysis pipeline. Missing fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub buffer: BufferConfig,
    pub spaces: SpaceConfig,
    pub exits: ExitConfig,
    pub graph: GraphOptions,
    pub stairs: StairConnector,
    pub compliance: ComplianceConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Loads a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egress_lite_grid::BufferMetric;

    #[test]
    fn empty_object_is_the_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{
                "buffer": {"radius": 2, "metric": "euclidean"},
                "exits": {"group_doors": true},
                "graph": {"allow_diagonal": true}
            }"#,
        )
        .unwrap();
        assert_eq!(config.buffer.radius, 2);
        assert_eq!(config.buffer.metric, BufferMetric::Euclidean);
        assert!(config.exits.group_doors);
        assert!(config.graph.allow_diagonal);
        assert!(config.graph.minimize_cost);
        assert_eq!(config.spaces.min_cells, 1);
        assert_eq!(config.compliance.profiles.len(), 2);
    }

    #[test]
    fn bad_json_is_a_config_error() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"buffer": {"radius": -1}}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = EngineConfig::from_path("/nonexistent/egress.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/egress.json"));
    }
}
