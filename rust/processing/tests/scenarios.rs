// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline scenarios.

use approx::assert_relative_eq;
use egress_lite_grid::{
    BoundingBox, BufferConfig, BuildingGrid, Floor, FloorGrid, GridCoord, SpaceConfig,
};
use egress_lite_processing::{
    evaluate, AnalysisSession, ComplianceConfig, ComplianceProfile, EngineConfig, Error,
    RouteMetrics, Rule,
};
use egress_lite_routing::{find_path, CancelToken, EgressGraph, GraphOptions, StairConnection};

fn single_floor(drawing: &str, grid_size: f64) -> BuildingGrid {
    BuildingGrid::single_floor(FloorGrid::from_ascii(drawing).unwrap(), grid_size).unwrap()
}

fn two_floors() -> BuildingGrid {
    BuildingGrid::new(
        vec![
            FloorGrid::from_ascii("#D#\n#S#\n###").unwrap(),
            FloorGrid::from_ascii("###\n#S#\n#_#").unwrap(),
        ],
        0.5,
        vec![Floor::new(0.0, 3.5), Floor::new(3.5, 3.5)],
        BoundingBox::default(),
    )
    .unwrap()
}

fn stair_link() -> StairConnection {
    StairConnection::new(GridCoord::new(1, 1, 0), GridCoord::new(1, 1, 1))
}

fn distance_config() -> EngineConfig {
    EngineConfig {
        graph: GraphOptions::distance_only(),
        ..EngineConfig::default()
    }
}

#[test]
fn walled_room_with_one_door() {
    let grid = single_floor(
        "#D###
         #...#
         #...#
         #...#
         #####",
        0.5,
    );
    let config = EngineConfig {
        spaces: SpaceConfig {
            include_empty_tiles: true,
            ..SpaceConfig::default()
        },
        ..distance_config()
    };
    let mut session = AnalysisSession::new(grid, config);

    let snapshot = session.refresh().unwrap();
    assert_eq!(snapshot.exits, vec![GridCoord::new(0, 1, 0)]);
    assert_eq!(snapshot.spaces.len(), 1);

    let routes = session.escape_routes(&CancelToken::new()).unwrap();
    assert_eq!(routes.len(), 1);
    let route = &routes[0];
    assert_eq!(route.furthest_point, Some(GridCoord::new(3, 3, 0)));
    assert_eq!(route.optimal_exit, Some(GridCoord::new(0, 1, 0)));
    // Five orthogonal steps of half a metre.
    assert_relative_eq!(route.distance.unwrap(), 2.5);
    assert_eq!(route.optimal_path.len(), 6);
    assert_eq!(route.dead_end_length, 0.0);

    // Weighted: four steps onto empty cells, the last one onto the door (x4).
    session.set_graph_options(GraphOptions::default());
    let routes = session.escape_routes(&CancelToken::new()).unwrap();
    assert_relative_eq!(routes[0].distance.unwrap(), 4.0);
    assert_relative_eq!(routes[0].path_lengths.as_ref().unwrap().total_length, 2.5);
}

#[test]
fn stair_path_crosses_floors_once() {
    let grid = two_floors();
    let graph = EgressGraph::build(&grid, &[stair_link()], &GraphOptions::distance_only()).unwrap();
    assert_eq!(graph.stats().vertical_edges, 1);

    let result = find_path(&graph, GridCoord::new(2, 1, 1), &[GridCoord::new(0, 1, 0)]).unwrap();
    let floor_changes = result
        .path
        .windows(2)
        .filter(|w| w[0].floor != w[1].floor)
        .count();
    assert_eq!(floor_changes, 1);
    // Two half-metre steps plus the 3.5 m climb.
    assert_relative_eq!(result.cost, 4.5);
    assert_relative_eq!(result.lengths.total_length, 4.5);
    assert_relative_eq!(result.lengths.floor_lengths["floor_0"], 0.5);
    assert_relative_eq!(result.lengths.floor_lengths["floor_1"], 0.5);

    let weighted = EgressGraph::build(&grid, &[stair_link()], &GraphOptions::default()).unwrap();
    let result =
        find_path(&weighted, GridCoord::new(2, 1, 1), &[GridCoord::new(0, 1, 0)]).unwrap();
    // Stair, stair and door cells all enter at x4.
    assert_relative_eq!(result.cost, 18.0);
}

#[test]
fn upper_floor_routes_report_distance_to_stair() {
    let mut session = AnalysisSession::new(two_floors(), distance_config());
    session.set_stair_connections(Some(vec![stair_link()]));
    let routes = session.escape_routes(&CancelToken::new()).unwrap();
    assert_eq!(routes.len(), 2);

    let upper = routes.iter().find(|r| r.floor == 1).unwrap();
    assert_eq!(upper.furthest_point, Some(GridCoord::new(2, 1, 1)));
    assert_eq!(upper.optimal_exit, Some(GridCoord::new(0, 1, 0)));
    assert_relative_eq!(upper.distance.unwrap(), 4.5);
    assert_relative_eq!(upper.distance_to_stair.unwrap(), 0.5);

    let lower = routes.iter().find(|r| r.floor == 0).unwrap();
    assert!(lower.distance_to_stair.is_none());
}

#[test]
fn floor_without_stairs_or_exits_is_flagged() {
    let mut session = AnalysisSession::new(two_floors(), distance_config());
    session.set_stair_connections(Some(Vec::new()));
    let routes = session.escape_routes(&CancelToken::new()).unwrap();

    let upper = routes.iter().find(|r| r.floor == 1).unwrap();
    assert!(upper.distance.is_none());
    for profile in ["daytime", "nighttime"] {
        assert!(upper.violations[profile]
            .iter()
            .any(|v| v.rule == Rule::DisconnectedFloors));
    }
    let lower = routes.iter().find(|r| r.floor == 0).unwrap();
    assert!(lower.violations["daytime"].is_empty());
}

#[test]
fn buffer_seals_the_corridor() {
    let grid = single_floor(
        "###############
         #_____###_____#
         #_____###_____#
         #_____________#
         #_____###_____#
         #_____###_____#
         ###############",
        0.5,
    );
    let start = GridCoord::new(3, 3, 0);
    let goal = GridCoord::new(3, 11, 0);
    let mut session = AnalysisSession::new(grid, distance_config());

    let open = session.find_path(start, &[goal]).unwrap();
    assert_relative_eq!(open.cost, 4.0);

    session.set_buffer(BufferConfig::with_radius(1));
    let sealed = session.find_path(start, &[goal]);
    assert!(matches!(
        sealed,
        Err(Error::Routing(egress_lite_routing::Error::NoPathFound { .. }))
    ));

    // Both rooms survive the buffer; only the corridor is gone.
    let snapshot = session.snapshot().unwrap();
    assert!(snapshot.graph.node_index(start).is_some());
    assert!(snapshot.graph.node_index(goal).is_some());
}

#[test]
fn threshold_comparisons_are_strict() {
    let mut profiles = std::collections::BTreeMap::new();
    profiles.insert("daytime".to_string(), ComplianceProfile::daytime());
    let config = ComplianceConfig { profiles };

    let at_limit = RouteMetrics {
        distance: Some(45.0),
        distance_to_stair: Some(30.0),
        dead_end_length: 15.0,
        grid_size: 0.5,
        ..RouteMetrics::default()
    };
    assert!(evaluate(&at_limit, &config)["daytime"].is_empty());

    let above = RouteMetrics {
        distance_to_stair: Some(31.0),
        ..at_limit
    };
    let violations = evaluate(&above, &config);
    assert_eq!(violations["daytime"].len(), 1);
    assert_eq!(violations["daytime"][0].rule, Rule::DistanceToStair);
}

#[test]
fn exit_distance_at_the_limit_passes_end_to_end() {
    let corridor = |cells: usize| format!("D{}", "_".repeat(cells));

    let mut session = AnalysisSession::new(single_floor(&corridor(45), 1.0), distance_config());
    let routes = session.escape_routes(&CancelToken::new()).unwrap();
    assert_relative_eq!(routes[0].distance.unwrap(), 45.0);
    assert!(routes[0].violations["daytime"].is_empty());
    assert_eq!(routes[0].violations["nighttime"][0].rule, Rule::DistanceToExit);

    session.set_grid(single_floor(&corridor(46), 1.0));
    let routes = session.escape_routes(&CancelToken::new()).unwrap();
    let daytime = &routes[0].violations["daytime"];
    assert_eq!(daytime.len(), 1);
    assert_eq!(daytime[0].rule, Rule::DistanceToExit);
}
