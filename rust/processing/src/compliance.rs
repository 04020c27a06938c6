// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Life-safety threshold checks.
//!
//! Evaluation is a pure function of already computed route metrics and the
//! configured profiles. Distance limits are strict: a value equal to its
//! limit passes.

use std::collections::BTreeMap;

use egress_lite_grid::implied_clear_width;
use serde::{Deserialize, Serialize};

/// Thresholds for one policy profile (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceProfile {
    /// Maximum travel to the nearest connected stair (evacuation route).
    pub max_distance_to_stair: f64,
    /// Maximum travel to the nearest exit.
    pub max_distance_to_exit: f64,
    /// Minimum clear width guaranteed by the wall buffer.
    pub min_clear_width: f64,
    pub max_dead_end_length: f64,
}

impl ComplianceProfile {
    pub fn daytime() -> Self {
        Self {
            max_distance_to_stair: 30.0,
            max_distance_to_exit: 45.0,
            min_clear_width: 0.8,
            max_dead_end_length: 15.0,
        }
    }

    pub fn nighttime() -> Self {
        Self {
            max_distance_to_stair: 20.0,
            max_distance_to_exit: 30.0,
            min_clear_width: 0.8,
            max_dead_end_length: 15.0,
        }
    }
}

/// Named profiles, evaluated independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceConfig {
    pub profiles: BTreeMap<String, ComplianceProfile>,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert("daytime".to_string(), ComplianceProfile::daytime());
        profiles.insert("nighttime".to_string(), ComplianceProfile::nighttime());
        Self { profiles }
    }
}

/// Rule that produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    DistanceToStair,
    DistanceToExit,
    ClearWidth,
    DeadEnd,
    /// The occupant's floor has no exit and no stair connection.
    DisconnectedFloors,
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: Rule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measured: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    pub message: String,
}

impl Violation {
    fn exceeded(rule: Rule, what: &str, measured: f64, limit: f64) -> Self {
        Self {
            rule,
            measured: Some(measured),
            limit: Some(limit),
            message: format!("{what} ({measured:.2}m) exceeds maximum ({limit}m)"),
        }
    }
}

/// Violations per profile name. Every configured profile has an entry.
pub type Violations = BTreeMap<String, Vec<Violation>>;

/// Route quantities the evaluator checks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteMetrics {
    /// Search distance from the furthest point to its exit.
    pub distance: Option<f64>,
    pub distance_to_stair: Option<f64>,
    pub dead_end_length: f64,
    /// Wall buffer radius (cells) the route was computed with.
    pub buffer_radius: u32,
    pub grid_size: f64,
    pub disconnected_floors: bool,
}

/// Checks route metrics against every configured profile.
///
/// A zero buffer radius means clearance was not modelled, so the width rule
/// is skipped.
pub fn evaluate(metrics: &RouteMetrics, config: &ComplianceConfig) -> Violations {
    config
        .profiles
        .iter()
        .map(|(name, profile)| (name.clone(), evaluate_profile(metrics, profile)))
        .collect()
}

fn evaluate_profile(metrics: &RouteMetrics, profile: &ComplianceProfile) -> Vec<Violation> {
    let mut violations = Vec::new();

    if let Some(d) = metrics.distance_to_stair {
        if d > profile.max_distance_to_stair {
            violations.push(Violation::exceeded(
                Rule::DistanceToStair,
                "Distance to evacuation route",
                d,
                profile.max_distance_to_stair,
            ));
        }
    }

    if let Some(d) = metrics.distance {
        if d > profile.max_distance_to_exit {
            violations.push(Violation::exceeded(
                Rule::DistanceToExit,
                "Distance to nearest exit",
                d,
                profile.max_distance_to_exit,
            ));
        }
    }

    if metrics.dead_end_length > profile.max_dead_end_length {
        violations.push(Violation::exceeded(
            Rule::DeadEnd,
            "Dead-end length",
            metrics.dead_end_length,
            profile.max_dead_end_length,
        ));
    }

    if metrics.buffer_radius > 0 {
        let width = implied_clear_width(metrics.buffer_radius, metrics.grid_size);
        if width < profile.min_clear_width {
            violations.push(Violation {
                rule: Rule::ClearWidth,
                measured: Some(width),
                limit: Some(profile.min_clear_width),
                message: format!(
                    "Clear width ({width:.2}m) is less than minimum ({}m)",
                    profile.min_clear_width
                ),
            });
        }
    }

    if metrics.disconnected_floors {
        violations.push(Violation {
            rule: Rule::DisconnectedFloors,
            measured: None,
            limit: None,
            message: "Floor has no exit and no stair connection to another floor".to_string(),
        });
    }

    violations
}
