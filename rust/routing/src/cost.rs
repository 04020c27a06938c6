// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traversal cost model.
//!
//! Entering a cell costs the edge length times the multiplier of the
//! entered cell's label. Doors and stairs default to 4 so routes avoid
//! needless door and stair traversal when cost minimization is on.

use egress_lite_grid::CellType;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-label cost multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostTable {
    pub empty: f64,
    pub floor: f64,
    pub door: f64,
    pub stair: f64,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            empty: 1.0,
            floor: 1.0,
            door: 4.0,
            stair: 4.0,
        }
    }
}

impl CostTable {
    /// All multipliers equal to one.
    pub const fn uniform() -> Self {
        Self {
            empty: 1.0,
            floor: 1.0,
            door: 1.0,
            stair: 1.0,
        }
    }

    /// Multiplier for a passable label. Blocked labels never become nodes;
    /// they report infinity.
    pub fn multiplier(&self, cell: CellType) -> f64 {
        match cell {
            CellType::Empty => self.empty,
            CellType::Floor => self.floor,
            CellType::Door => self.door,
            CellType::Stair => self.stair,
            CellType::Wall | CellType::Walla => f64::INFINITY,
        }
    }

    /// Smallest multiplier over passable labels.
    pub fn min_multiplier(&self) -> f64 {
        self.empty.min(self.floor).min(self.door).min(self.stair)
    }

    pub fn validate(&self) -> Result<()> {
        for (cell, value) in [
            (CellType::Empty, self.empty),
            (CellType::Floor, self.floor),
            (CellType::Door, self.door),
            (CellType::Stair, self.stair),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidCostMultiplier { cell, value });
            }
        }
        Ok(())
    }
}

/// Graph construction options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Add 8-neighbour moves (never cutting a blocked corner).
    pub allow_diagonal: bool,
    /// Apply the cost table; otherwise every multiplier is one.
    pub minimize_cost: bool,
    pub costs: CostTable,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            allow_diagonal: false,
            minimize_cost: true,
            costs: CostTable::default(),
        }
    }
}

impl GraphOptions {
    /// Options for pure shortest-distance routing.
    pub fn distance_only() -> Self {
        Self {
            minimize_cost: false,
            ..Self::default()
        }
    }

    /// The table actually applied when building the graph.
    pub fn effective_costs(&self) -> CostTable {
        if self.minimize_cost {
            self.costs
        } else {
            CostTable::uniform()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_penalise_doors_and_stairs() {
        let table = CostTable::default();
        assert_eq!(table.multiplier(CellType::Floor), 1.0);
        assert_eq!(table.multiplier(CellType::Door), 4.0);
        assert_eq!(table.multiplier(CellType::Stair), 4.0);
        assert!(table.multiplier(CellType::Walla).is_infinite());
        assert_eq!(table.min_multiplier(), 1.0);
    }

    #[test]
    fn cost_minimization_off_is_uniform() {
        let options = GraphOptions::distance_only();
        assert_eq!(options.effective_costs(), CostTable::uniform());
        assert_eq!(GraphOptions::default().effective_costs(), CostTable::default());
    }

    #[test]
    fn non_positive_multipliers_are_rejected() {
        let table = CostTable {
            door: 0.0,
            ..CostTable::default()
        };
        assert_eq!(
            table.validate(),
            Err(Error::InvalidCostMultiplier {
                cell: CellType::Door,
                value: 0.0
            })
        );
        assert!(CostTable::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let options: GraphOptions =
            serde_json::from_str(r#"{"allow_diagonal": true, "costs": {"door": 2.5}}"#).unwrap();
        assert!(options.allow_diagonal);
        assert!(options.minimize_cost);
        assert_eq!(options.costs.door, 2.5);
        assert_eq!(options.costs.stair, 4.0);
    }
}
